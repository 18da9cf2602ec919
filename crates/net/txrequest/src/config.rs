//! Caller-side policy for driving the request tracker.
//!
//! The tracker itself enforces no delays, timeouts or caps: it only honors
//! the `ready_at`/`expires_at` values handed to it and exposes per-peer
//! counters. This module carries the knobs a network layer combines with
//! those counters when feeding the tracker.

use crate::{
    types::{PeerId, RequestTime},
    TxRequestTracker,
};
use std::time::Duration;

/// How long a sent request may stay in flight before it counts as silently
/// failed.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra announcement delay for non-preferred peers, giving preferred peers a
/// head start on the first request.
pub const DEFAULT_NONPREF_PEER_DELAY: Duration = Duration::from_secs(2);

/// Extra announcement delay for peers that already have too many requests in
/// flight.
pub const DEFAULT_OVERLOADED_PEER_DELAY: Duration = Duration::from_secs(2);

/// Default cap on in-flight requests per peer before it counts as overloaded.
pub const DEFAULT_MAX_IN_FLIGHT_PER_PEER: usize = 100;

/// Default cap on tracked announcements per peer.
pub const DEFAULT_MAX_ANNOUNCEMENTS_PER_PEER: usize = 5000;

/// Policy knobs for scheduling transaction requests.
///
/// The caps are advisory: exceeding peers should have further announcements
/// dropped *by the caller*, the tracker accepts whatever it is fed.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TxFetchPolicy {
    /// In-flight lifetime of a request until expiry.
    pub request_timeout: Duration,
    /// Extra announcement delay for non-preferred peers.
    pub nonpref_peer_delay: Duration,
    /// Extra announcement delay for overloaded peers.
    pub overloaded_peer_delay: Duration,
    /// In-flight requests per peer beyond which it counts as overloaded.
    pub max_in_flight_per_peer: usize,
    /// Announcements tracked per peer beyond which new ones should be
    /// dropped.
    pub max_announcements_per_peer: usize,
}

impl Default for TxFetchPolicy {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            nonpref_peer_delay: DEFAULT_NONPREF_PEER_DELAY,
            overloaded_peer_delay: DEFAULT_OVERLOADED_PEER_DELAY,
            max_in_flight_per_peer: DEFAULT_MAX_IN_FLIGHT_PER_PEER,
            max_announcements_per_peer: DEFAULT_MAX_ANNOUNCEMENTS_PER_PEER,
        }
    }
}

impl TxFetchPolicy {
    /// The `ready_at` to announce with: `now`, pushed back for non-preferred
    /// and overloaded peers.
    pub fn ready_time(&self, now: RequestTime, preferred: bool, overloaded: bool) -> RequestTime {
        let mut delay = Duration::ZERO;
        if !preferred {
            delay += self.nonpref_peer_delay;
        }
        if overloaded {
            delay += self.overloaded_peer_delay;
        }
        now + delay
    }

    /// The `expires_at` for a request sent at `now`.
    pub fn expiry_time(&self, now: RequestTime) -> RequestTime {
        now + self.request_timeout
    }

    /// Whether `peer` has reached the in-flight cap and should have its
    /// announcements delayed by [`ready_time`](Self::ready_time).
    pub fn is_overloaded(&self, tracker: &TxRequestTracker, peer: PeerId) -> bool {
        tracker.count_in_flight(peer) >= self.max_in_flight_per_peer
    }

    /// Whether another announcement from `peer` fits under the announcement
    /// cap.
    pub fn can_track(&self, tracker: &TxRequestTracker, peer: PeerId) -> bool {
        tracker.count_tracked(peer) < self.max_announcements_per_peer
    }
}
