//! Identifier and logical-clock types used by the request tracker.

use derive_more::Display;
use std::{ops::Add, time::Duration};

/// Hash of the transaction whose relay is being scheduled.
pub type TxHash = alloy_primitives::B256;

/// Opaque identifier of a peer session.
///
/// Assigned by the network layer; the tracker attaches no meaning to it
/// beyond identity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerId(u64);

impl PeerId {
    /// Wraps a raw session identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for PeerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PeerId> for u64 {
    fn from(value: PeerId) -> Self {
        value.0
    }
}

/// Creation order of a candidate announcement.
///
/// Strictly increasing, assigned once when the announcement is first seen and
/// never reused. The output order of
/// [`requestable`](crate::TxRequestTracker::requestable) is defined entirely
/// by this number.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sequence(u64);

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Sequence> for u64 {
    fn from(value: Sequence) -> Self {
        value.0
    }
}

/// A point on the caller-supplied logical clock, in microseconds.
///
/// The tracker never reads wall time. Every operation that depends on time
/// takes a `RequestTime` from the caller, which makes the whole state machine
/// deterministic and testable without real elapsed time.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{_0}us")]
pub struct RequestTime(u64);

impl RequestTime {
    /// The zero point of the clock.
    pub const ZERO: Self = Self(0);

    /// The far end of the clock. Useful as a "never" ready or expiry time.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a time from microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the time as microseconds.
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Adds a duration, saturating at [`RequestTime::MAX`].
    pub fn saturating_add(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl From<Duration> for RequestTime {
    fn from(value: Duration) -> Self {
        Self::ZERO.saturating_add(value)
    }
}

impl Add<Duration> for RequestTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}
