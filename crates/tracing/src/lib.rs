//! Logging bootstrap for the ferrite workspace.
//!
//! Wraps [`tracing_subscriber`] setup so binaries and tests install their
//! subscriber the same way: an fmt layer with an
//! [`EnvFilter`](tracing_subscriber::EnvFilter) read from `RUST_LOG`.

#![doc(issue_tracker_base_url = "https://github.com/ferrite-node/ferrite/issues/")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

// Re-export tracing crates
pub use tracing;
pub use tracing_subscriber;

use tracing_subscriber::EnvFilter;

/// Initializes a stdout tracing subscriber for the current process.
///
/// Filter directives are read from `RUST_LOG`; `default_directives` applies
/// when the variable is unset or invalid.
///
/// # Panics
///
/// If a global subscriber is already installed.
pub fn init(default_directives: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives)),
        )
        .init();
}

/// Initializes a tracing subscriber for tests.
///
/// The filter is configurable via `RUST_LOG`.
///
/// # Note
///
/// The subscriber will silently fail if it could not be installed.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
