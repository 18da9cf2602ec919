//! Support for scheduling transaction requests across announcing peers.
//!
//! When a transaction is relayed by announcement, several peers typically
//! claim to know it at roughly the same time. Fetching it from all of them
//! wastes bandwidth; always fetching from the first or fastest announcer
//! hands adversaries an easy censorship race. The [`TxRequestTracker`] keeps
//! one record per (transaction, peer) announcement and schedules requests so
//! that:
//!
//! - at most one request per transaction is in flight at any time,
//! - each announcement only becomes selectable after its caller-chosen ready
//!   time, so callers can delay less trusted sources,
//! - the requested peer is picked by a secret-keyed priority that peers
//!   cannot predict or engineer, with preferred announcements outranking
//!   non-preferred ones,
//! - requests that silently time out are reported and the transaction is
//!   re-scheduled with a remaining candidate, if any.
//!
//! The tracker is a pure, synchronous state machine: it has no timers and
//! never reads a clock. Callers pass `now` on every time-dependent call and
//! poll [`TxRequestTracker::requestable`] whenever they want new request
//! targets.
//!
//! ```
//! use ferrite_txrequest::{PeerId, RequestTime, TxFetchPolicy, TxHash, TxRequestTracker};
//!
//! let policy = TxFetchPolicy::default();
//! let mut tracker = TxRequestTracker::new();
//! let (peer, hash) = (PeerId::from(1), TxHash::repeat_byte(0xab));
//! let now = RequestTime::ZERO;
//!
//! // The peer announced the transaction; it is preferred, so no extra delay.
//! tracker.announce(peer, hash, true, policy.ready_time(now, true, false));
//!
//! // Poll for request targets and mark the request as sent.
//! let poll = tracker.requestable(peer, now);
//! assert_eq!(poll.txs, vec![hash]);
//! tracker.request_sent(peer, hash, policy.expiry_time(now));
//!
//! // The peer answered; the tracker drops all interest in the transaction.
//! tracker.response_received(peer, hash);
//! assert!(tracker.is_empty());
//! ```

#![doc(issue_tracker_base_url = "https://github.com/ferrite-node/ferrite/issues/")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod announcement;
pub mod config;
mod priority;
mod tracker;
mod types;

pub use config::TxFetchPolicy;
pub use priority::Priority;
pub use tracker::{Requestable, TxRequestTracker};
pub use types::{PeerId, RequestTime, Sequence, TxHash};
