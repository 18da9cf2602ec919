//! The per-(transaction, peer) announcement record.

use crate::{
    priority::Priority,
    types::{RequestTime, Sequence},
};
use derive_more::Display;

/// State of a single (transaction, peer) announcement.
///
/// Absence from the table is the implicit terminal state: completed
/// announcements are removed together with their transaction entry, never
/// kept as tombstones.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub(crate) enum AnnouncementState {
    /// Candidate whose intentional request delay has not yet elapsed.
    #[display("candidate-delayed")]
    CandidateDelayed {
        /// Time at which the candidate becomes eligible for selection.
        ready_at: RequestTime,
    },
    /// Candidate eligible for selection.
    #[display("candidate-ready")]
    CandidateReady,
    /// The elected candidate for its transaction: returned to its peer by the
    /// next poll unless something changes first.
    #[display("candidate-best")]
    CandidateBest,
    /// Converted into an in-flight request, awaiting a response until expiry.
    #[display("requested")]
    Requested {
        /// Time at which the in-flight request counts as silently failed.
        expires_at: RequestTime,
    },
    /// Resolved (served, superseded or abandoned), pending removal.
    #[display("completed")]
    Completed,
}

/// One (transaction, peer) relationship tracked by the table.
#[derive(Debug, Clone)]
pub(crate) struct Announcement {
    /// Creation order, assigned at first announcement and never changed.
    pub(crate) sequence: Sequence,
    /// Preference hint supplied with this specific announcement.
    pub(crate) preferred: bool,
    /// Selection key, precomputed once from the tracker secret.
    pub(crate) priority: Priority,
    /// Current lifecycle state.
    pub(crate) state: AnnouncementState,
}

impl Announcement {
    /// Whether the announcement is a candidate of any variant.
    pub(crate) const fn is_candidate(&self) -> bool {
        matches!(
            self.state,
            AnnouncementState::CandidateDelayed { .. } |
                AnnouncementState::CandidateReady |
                AnnouncementState::CandidateBest
        )
    }

    /// Whether the announcement is a candidate eligible for selection.
    pub(crate) const fn is_selectable(&self) -> bool {
        matches!(
            self.state,
            AnnouncementState::CandidateReady | AnnouncementState::CandidateBest
        )
    }

    /// Whether the announcement is an in-flight request.
    pub(crate) const fn is_requested(&self) -> bool {
        matches!(self.state, AnnouncementState::Requested { .. })
    }

    /// Whether the announcement is resolved and only awaits removal.
    pub(crate) const fn is_completed(&self) -> bool {
        matches!(self.state, AnnouncementState::Completed)
    }

    /// Whether the announcement holds its transaction's selection slot, i.e.
    /// is elected or in flight. At most one announcement per transaction may
    /// be selected at any time.
    pub(crate) const fn is_selected(&self) -> bool {
        matches!(
            self.state,
            AnnouncementState::CandidateBest | AnnouncementState::Requested { .. }
        )
    }
}
