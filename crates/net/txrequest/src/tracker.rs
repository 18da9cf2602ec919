//! The announcement table and its transition engine.

use crate::{
    announcement::{Announcement, AnnouncementState},
    priority::{Priority, PriorityComputer},
    types::{PeerId, RequestTime, Sequence, TxHash},
};
use alloy_primitives::B256;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// All announcements of a single transaction, keyed by announcing peer.
#[derive(Debug, Default)]
struct TxEntry {
    announcements: HashMap<PeerId, Announcement>,
}

impl TxEntry {
    /// Whether every remaining announcement is completed, i.e. the entry is
    /// ready to be purged. Holds vacuously for an emptied entry.
    fn is_resolved(&self) -> bool {
        self.announcements.values().all(Announcement::is_completed)
    }
}

/// Per-peer reverse index with cached counters, so disconnect handling and
/// the count accessors run proportional to the peer's own records.
#[derive(Debug, Default)]
struct PeerInfo {
    /// Transactions with an announcement from this peer, in any state.
    txs: HashSet<TxHash>,
    /// Announcements of this peer currently in flight.
    in_flight: usize,
    /// Announcements of this peer in a candidate state (any variant).
    candidates: usize,
}

/// Outcome of a [`TxRequestTracker::requestable`] poll.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Requestable {
    /// Transactions for which the queried peer is the elected candidate, in
    /// ascending announcement order (oldest first).
    pub txs: Vec<TxHash>,
    /// In-flight requests, across all peers, that expired during this poll.
    /// Sorted by announcement order.
    pub expired: Vec<(PeerId, TxHash)>,
}

/// Decides which peer to request an announced transaction from, and when.
///
/// Many peers may announce the same transaction. Requesting it from all of
/// them wastes bandwidth, requesting it from a fixed one lets that peer
/// censor it. The tracker keeps one [`Announcement`] per (transaction, peer)
/// pair and schedules requests under these rules:
///
/// - at most one request per transaction is in flight at any time;
/// - announcements only become selectable once their caller-chosen ready time
///   has passed, so callers can delay less trusted sources;
/// - among selectable candidates the winner is picked by a secret-keyed
///   priority, unpredictable to peers, with preferred announcements always
///   outranking non-preferred ones;
/// - in-flight requests that outlive their expiry are abandoned and the
///   transaction becomes eligible for re-selection.
///
/// The tracker owns no clock and spawns nothing: callers pass `now` on every
/// time-dependent call and poll [`requestable`](Self::requestable) as often
/// as they see fit. All operations are total; redundant or stale inputs are
/// accepted as no-ops.
#[derive(Debug)]
pub struct TxRequestTracker {
    /// Announcements indexed by (transaction, peer).
    txs: HashMap<TxHash, TxEntry>,
    /// Reverse index and cached per-peer counters.
    peers: HashMap<PeerId, PeerInfo>,
    /// Secret-keyed priority oracle.
    computer: PriorityComputer,
    /// Next unassigned sequence number.
    next_sequence: u64,
}

// === impl TxRequestTracker ===

impl TxRequestTracker {
    /// Creates a tracker with a freshly drawn random secret.
    pub fn new() -> Self {
        Self::with_computer(PriorityComputer::new())
    }

    /// Creates a tracker with the given priority secret.
    ///
    /// Selection among equal announcements is exactly reproducible across
    /// tracker instances sharing a secret; production callers should prefer
    /// [`TxRequestTracker::new`].
    pub fn with_secret(secret: B256) -> Self {
        Self::with_computer(PriorityComputer::with_secret(secret))
    }

    fn with_computer(computer: PriorityComputer) -> Self {
        Self { txs: HashMap::new(), peers: HashMap::new(), computer, next_sequence: 0 }
    }

    /// Derives the selection priority of a (transaction, peer, preferred)
    /// triple under this tracker's secret. Exposed for diagnostics and test
    /// harnesses; selection itself consumes precomputed priorities.
    pub fn compute_priority(&self, hash: &TxHash, peer: PeerId, preferred: bool) -> Priority {
        self.computer.compute(hash, peer, preferred)
    }

    /// Records that `peer` announced `hash`.
    ///
    /// Creates a candidate iff no announcement exists for this (transaction,
    /// peer) pair yet; otherwise this is a no-op, so the first announcement
    /// wins and keeps its sequence number, ready time and preference.
    ///
    /// The candidate starts out delayed and becomes selectable at the first
    /// [`requestable`](Self::requestable) poll whose `now` is at or past
    /// `ready_at`; a `ready_at` in the past therefore means "ready at the
    /// next poll".
    pub fn announce(&mut self, peer: PeerId, hash: TxHash, preferred: bool, ready_at: RequestTime) {
        let entry = self.txs.entry(hash).or_default();
        if entry.announcements.contains_key(&peer) {
            return
        }

        let sequence = Sequence::from(self.next_sequence);
        self.next_sequence += 1;
        let priority = self.computer.compute(&hash, peer, preferred);
        entry.announcements.insert(
            peer,
            Announcement {
                sequence,
                preferred,
                priority,
                state: AnnouncementState::CandidateDelayed { ready_at },
            },
        );

        let info = self.peers.entry(peer).or_default();
        info.txs.insert(hash);
        info.candidates += 1;

        trace!(target: "net::txrequest", %peer, %hash, preferred, %ready_at, %sequence, "new announcement");
    }

    /// Records that a request for `hash` was sent to `peer`, due to expire at
    /// `expires_at`.
    ///
    /// No-op unless the (transaction, peer) announcement is a candidate, of
    /// any variant: callers are free to request from a non-elected candidate.
    /// Any other peer's in-flight request for the same transaction is
    /// superseded, keeping at most one request per transaction in flight.
    pub fn request_sent(&mut self, peer: PeerId, hash: TxHash, expires_at: RequestTime) {
        let Some(entry) = self.txs.get_mut(&hash) else { return };
        let Some(ann) = entry.announcements.get(&peer) else { return };
        if !ann.is_candidate() {
            return
        }

        // Free the transaction's selection slot: a live request of another
        // peer is superseded, an elected candidate steps back to ready.
        for (&other, ann) in &mut entry.announcements {
            if other == peer {
                continue
            }
            match ann.state {
                AnnouncementState::Requested { .. } => {
                    ann.state = AnnouncementState::Completed;
                    let info = self
                        .peers
                        .get_mut(&other)
                        .expect("announced peer has an index entry");
                    info.in_flight -= 1;
                    debug!(target: "net::txrequest", peer=%other, %hash, "in-flight request superseded");
                }
                AnnouncementState::CandidateBest => {
                    ann.state = AnnouncementState::CandidateReady;
                }
                _ => {}
            }
        }

        let ann = entry
            .announcements
            .get_mut(&peer)
            .expect("announcement checked above");
        ann.state = AnnouncementState::Requested { expires_at };
        let info = self.peers.get_mut(&peer).expect("announced peer has an index entry");
        info.candidates -= 1;
        info.in_flight += 1;

        trace!(target: "net::txrequest", %peer, %hash, %expires_at, "request sent");
    }

    /// Records that `peer` answered for `hash`, be it with the transaction
    /// itself, a not-found notice, or anything else that resolves the
    /// relationship.
    ///
    /// Completes the announcement whatever state it is in, which covers late,
    /// duplicate and unsolicited responses; a no-op for untracked pairs.
    pub fn response_received(&mut self, peer: PeerId, hash: TxHash) {
        let Some(entry) = self.txs.get_mut(&hash) else { return };
        let Some(ann) = entry.announcements.get_mut(&peer) else { return };

        let info = self.peers.get_mut(&peer).expect("announced peer has an index entry");
        match ann.state {
            AnnouncementState::Completed => {}
            AnnouncementState::Requested { .. } => info.in_flight -= 1,
            _ => info.candidates -= 1,
        }
        ann.state = AnnouncementState::Completed;

        trace!(target: "net::txrequest", %peer, %hash, "response received");
        self.purge_if_resolved(hash);
    }

    /// Unconditionally drops every announcement of `peer`, in any state.
    ///
    /// Transactions announced solely by this peer disappear from the table in
    /// the same call.
    pub fn peer_disconnected(&mut self, peer: PeerId) {
        let Some(info) = self.peers.remove(&peer) else { return };
        let dropped = info.txs.len();

        for hash in info.txs {
            if let Some(entry) = self.txs.get_mut(&hash) {
                entry.announcements.remove(&peer);
            }
            self.purge_if_resolved(hash);
        }

        debug!(target: "net::txrequest", %peer, dropped, "peer disconnected");
    }

    /// Unconditionally drops every announcement of `hash`, across all peers.
    ///
    /// For transactions that are no longer worth fetching, e.g. ones that
    /// were confirmed or rejected in the meantime.
    pub fn forget_tx(&mut self, hash: TxHash) {
        let Some(entry) = self.txs.remove(&hash) else { return };

        for (peer, ann) in entry.announcements {
            let Some(info) = self.peers.get_mut(&peer) else {
                debug_assert!(false, "announced peer {peer} lost its index entry");
                continue
            };
            info.txs.remove(&hash);
            match ann.state {
                AnnouncementState::Requested { .. } => info.in_flight -= 1,
                AnnouncementState::Completed => {}
                _ => info.candidates -= 1,
            }
            if info.txs.is_empty() {
                self.peers.remove(&peer);
            }
        }

        trace!(target: "net::txrequest", %hash, "transaction forgotten");
    }

    /// The scheduling query: which transactions should be requested from
    /// `peer` right now?
    ///
    /// Before selecting, brings the whole table up to `now`, for every
    /// transaction:
    ///
    /// 1. the in-flight request, if any, is completed once `expires_at <=
    ///    now` and reported in [`Requestable::expired`], for all peers, not
    ///    only the queried one;
    /// 2. delayed candidates with `ready_at <= now` become ready;
    /// 3. with no live request, the strictly highest-priority ready candidate
    ///    is elected;
    /// 4. fully resolved transactions are purged.
    ///
    /// Returns the transactions whose elected candidate belongs to `peer`,
    /// oldest announcement first. Callers are expected to follow up with
    /// [`request_sent`](Self::request_sent) for each transaction they
    /// actually request.
    pub fn requestable(&mut self, peer: PeerId, now: RequestTime) -> Requestable {
        let mut expired: Vec<(Sequence, PeerId, TxHash)> = Vec::new();
        let mut resolved: Vec<TxHash> = Vec::new();

        for (&hash, entry) in &mut self.txs {
            // Expire the in-flight request if its deadline passed. Per
            // transaction at most one announcement can be requested.
            let mut expired_here = None;
            for (&p, ann) in &mut entry.announcements {
                let AnnouncementState::Requested { expires_at } = ann.state else { continue };
                if expires_at <= now {
                    ann.state = AnnouncementState::Completed;
                    expired_here = Some((ann.sequence, p));
                }
                break
            }
            if let Some((sequence, p)) = expired_here {
                let info = self.peers.get_mut(&p).expect("announced peer has an index entry");
                info.in_flight -= 1;
                expired.push((sequence, p, hash));
                trace!(target: "net::txrequest", peer=%p, %hash, "in-flight request expired");
            }

            // Promote delayed candidates whose ready time passed.
            for ann in entry.announcements.values_mut() {
                if let AnnouncementState::CandidateDelayed { ready_at } = ann.state {
                    if ready_at <= now {
                        ann.state = AnnouncementState::CandidateReady;
                    }
                }
            }

            // Elect the best ready candidate, unless a request is in flight.
            if !entry.announcements.values().any(Announcement::is_requested) {
                let best = entry
                    .announcements
                    .iter()
                    .filter(|(_, ann)| ann.is_selectable())
                    .max_by_key(|(_, ann)| ann.priority)
                    .map(|(&p, _)| p);
                if let Some(best) = best {
                    for (&p, ann) in &mut entry.announcements {
                        if ann.is_selectable() {
                            ann.state = if p == best {
                                AnnouncementState::CandidateBest
                            } else {
                                AnnouncementState::CandidateReady
                            };
                        }
                    }
                }
            }

            if entry.is_resolved() {
                resolved.push(hash);
            }
        }

        for hash in resolved {
            self.purge_if_resolved(hash);
        }

        // Collect the transactions elected for the queried peer, oldest
        // announcement first.
        let mut txs: Vec<(Sequence, TxHash)> = Vec::new();
        if let Some(info) = self.peers.get(&peer) {
            for &hash in &info.txs {
                let entry = self.txs.get(&hash).expect("peer index entry has a tracked tx");
                if let Some(ann) = entry.announcements.get(&peer) {
                    if matches!(ann.state, AnnouncementState::CandidateBest) {
                        txs.push((ann.sequence, hash));
                    }
                }
            }
        }
        txs.sort_unstable_by_key(|&(sequence, _)| sequence);
        expired.sort_unstable_by_key(|&(sequence, _, _)| sequence);

        Requestable {
            txs: txs.into_iter().map(|(_, hash)| hash).collect(),
            expired: expired.into_iter().map(|(_, peer, hash)| (peer, hash)).collect(),
        }
    }

    /// Number of announcements from `peer`, in any state.
    pub fn count_tracked(&self, peer: PeerId) -> usize {
        self.peers.get(&peer).map(|info| info.txs.len()).unwrap_or_default()
    }

    /// Number of in-flight requests to `peer`.
    pub fn count_in_flight(&self, peer: PeerId) -> usize {
        self.peers.get(&peer).map(|info| info.in_flight).unwrap_or_default()
    }

    /// Number of candidate announcements from `peer` (delayed, ready or
    /// elected).
    pub fn count_candidates(&self, peer: PeerId) -> usize {
        self.peers.get(&peer).map(|info| info.candidates).unwrap_or_default()
    }

    /// Total number of announcements across all transactions and peers.
    pub fn len(&self) -> usize {
        self.txs.values().map(|entry| entry.announcements.len()).sum()
    }

    /// Whether the tracker holds no announcements at all.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Purges the transaction if all of its remaining announcements are
    /// completed, scrubbing it from the peer index as it goes. Peers whose
    /// last transaction is removed lose their index entry, so the count
    /// accessors read zero for them again.
    fn purge_if_resolved(&mut self, hash: TxHash) {
        let Some(entry) = self.txs.get(&hash) else { return };
        if !entry.is_resolved() {
            return
        }

        let entry = self.txs.remove(&hash).expect("entry looked up above");
        for peer in entry.announcements.keys() {
            let drop_peer = match self.peers.get_mut(peer) {
                Some(info) => {
                    info.txs.remove(&hash);
                    info.txs.is_empty()
                }
                None => {
                    debug_assert!(false, "announced peer {peer} lost its index entry");
                    false
                }
            };
            if drop_peer {
                self.peers.remove(peer);
            }
        }
        trace!(target: "net::txrequest", %hash, "resolved transaction purged");
    }

    /// Audits the full table against its invariants and cached counters,
    /// panicking on any violation. Recomputes everything from the raw table;
    /// intended for test harnesses, not steady-state operation.
    pub fn sanity_check(&self) {
        let mut recomputed: HashMap<PeerId, PeerInfo> = HashMap::new();
        let mut sequences: HashSet<Sequence> = HashSet::new();

        for (hash, entry) in &self.txs {
            assert!(!entry.announcements.is_empty(), "tracked tx {hash} has no announcements");

            let mut selected = 0usize;
            let mut completed = 0usize;
            let mut best: Option<&Announcement> = None;

            for (&peer, ann) in &entry.announcements {
                assert!(sequences.insert(ann.sequence), "sequence {} assigned twice", ann.sequence);
                assert!(
                    u64::from(ann.sequence) < self.next_sequence,
                    "sequence {} at or above the allocation watermark",
                    ann.sequence
                );
                assert_eq!(
                    ann.priority,
                    self.computer.compute(hash, peer, ann.preferred),
                    "stored priority diverges from the oracle for tx {hash} peer {peer}"
                );

                let info = recomputed.entry(peer).or_default();
                info.txs.insert(*hash);
                match ann.state {
                    AnnouncementState::Requested { .. } => info.in_flight += 1,
                    AnnouncementState::Completed => completed += 1,
                    _ => info.candidates += 1,
                }
                if ann.is_selected() {
                    selected += 1;
                }
                if matches!(ann.state, AnnouncementState::CandidateBest) {
                    best = Some(ann);
                }
            }

            assert!(selected <= 1, "tx {hash} has {selected} selected announcements");
            assert!(
                completed < entry.announcements.len(),
                "fully resolved tx {hash} survived cleanup"
            );
            if let Some(best) = best {
                for ann in entry.announcements.values() {
                    if matches!(ann.state, AnnouncementState::CandidateReady) {
                        assert!(
                            best.priority > ann.priority,
                            "elected candidate of tx {hash} is not the highest-priority ready one"
                        );
                    }
                }
            }
        }

        assert_eq!(recomputed.len(), self.peers.len(), "peer index size diverges");
        for (peer, info) in &self.peers {
            let expected = recomputed.get(peer).unwrap_or_else(|| {
                panic!("peer {peer} indexed without announcements")
            });
            assert_eq!(info.txs, expected.txs, "tx set of peer {peer} diverges");
            assert_eq!(info.in_flight, expected.in_flight, "in-flight count of peer {peer} diverges");
            assert_eq!(
                info.candidates, expected.candidates,
                "candidate count of peer {peer} diverges"
            );
        }
    }

    /// Additional audit for the instant right after a
    /// [`requestable`](Self::requestable) poll at `now`: no delayed candidate
    /// may still be due for promotion and no in-flight request due for
    /// expiry. Intended for test harnesses.
    pub fn post_requestable_sanity_check(&self, now: RequestTime) {
        for (hash, entry) in &self.txs {
            for (peer, ann) in &entry.announcements {
                match ann.state {
                    AnnouncementState::CandidateDelayed { ready_at } => assert!(
                        ready_at > now,
                        "tx {hash} peer {peer} still delayed although ready since {ready_at}"
                    ),
                    AnnouncementState::Requested { expires_at } => assert!(
                        expires_at > now,
                        "tx {hash} peer {peer} still in flight although expired at {expires_at}"
                    ),
                    _ => {}
                }
            }
        }
    }
}

impl Default for TxRequestTracker {
    fn default() -> Self {
        Self::new()
    }
}
