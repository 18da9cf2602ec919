//! Differential test: random operation sequences replayed against a naive
//! reference model of the tracker.
//!
//! The model keeps a flat (transaction, peer) state matrix and reimplements
//! every rule in the most literal way possible; the tracker must agree with
//! it on poll output, expiry reports and all counters at every step.

use alloy_primitives::B256;
use ferrite_txrequest::{PeerId, Priority, RequestTime, TxHash, TxRequestTracker};
use rand::{rngs::StdRng, Rng, SeedableRng};

const NUM_TXS: usize = 16;
const NUM_PEERS: usize = 16;
const OPS_PER_SEED: usize = 4_000;
const SEEDS: u64 = 6;

fn hash(tx: usize) -> TxHash {
    TxHash::repeat_byte(tx as u8 + 1)
}

fn peer(p: usize) -> PeerId {
    PeerId::from(p as u64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Nothing,
    /// Candidate of any variant; `time` is its ready time.
    Candidate,
    /// In flight; `time` is its expiry time.
    Requested,
    Completed,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ann {
    state: State,
    time: RequestTime,
    sequence: u64,
    priority: Option<Priority>,
}

/// Naive reimplementation of the tracker's behavior over a fixed universe of
/// transactions and peers.
#[derive(Debug, Default)]
struct Model {
    anns: [[Ann; NUM_PEERS]; NUM_TXS],
    next_sequence: u64,
}

impl Model {
    fn announce(&mut self, p: usize, tx: usize, preferred: bool, ready_at: RequestTime, priority: Priority) {
        let ann = &mut self.anns[tx][p];
        if ann.state != State::Nothing {
            return
        }
        ann.state = State::Candidate;
        ann.time = ready_at;
        ann.sequence = self.next_sequence;
        ann.priority = Some(priority);
        self.next_sequence += 1;
    }

    fn request_sent(&mut self, p: usize, tx: usize, expires_at: RequestTime) {
        if self.anns[tx][p].state != State::Candidate {
            return
        }
        for other in 0..NUM_PEERS {
            if self.anns[tx][other].state == State::Requested {
                self.anns[tx][other].state = State::Completed;
            }
        }
        self.anns[tx][p].state = State::Requested;
        self.anns[tx][p].time = expires_at;
    }

    fn response_received(&mut self, p: usize, tx: usize) {
        if self.anns[tx][p].state == State::Nothing {
            return
        }
        self.anns[tx][p].state = State::Completed;
        self.cleanup(tx);
    }

    fn peer_disconnected(&mut self, p: usize) {
        for tx in 0..NUM_TXS {
            if self.anns[tx][p].state != State::Nothing {
                self.anns[tx][p].state = State::Nothing;
                self.cleanup(tx);
            }
        }
    }

    fn forget_tx(&mut self, tx: usize) {
        for p in 0..NUM_PEERS {
            self.anns[tx][p].state = State::Nothing;
        }
    }

    /// Drops a transaction's records once only completed ones remain.
    fn cleanup(&mut self, tx: usize) {
        let mut any = false;
        for p in 0..NUM_PEERS {
            match self.anns[tx][p].state {
                State::Nothing => {}
                State::Completed => any = true,
                _ => return,
            }
        }
        if any {
            for p in 0..NUM_PEERS {
                self.anns[tx][p].state = State::Nothing;
            }
        }
    }

    /// The peer whose candidate wins election for `tx` at `now`, unless a
    /// request is in flight.
    fn selected(&self, tx: usize, now: RequestTime) -> Option<usize> {
        let mut winner: Option<(usize, Priority)> = None;
        for p in 0..NUM_PEERS {
            let ann = &self.anns[tx][p];
            if ann.state == State::Requested {
                return None
            }
            if ann.state == State::Candidate && ann.time <= now {
                let priority = ann.priority.expect("candidates carry a priority");
                if winner.is_none_or(|(_, best)| priority > best) {
                    winner = Some((p, priority));
                }
            }
        }
        winner.map(|(p, _)| p)
    }

    /// Expected poll outcome: sequence-sorted requestable transactions for
    /// `p` and sequence-sorted expiry reports, applying the same expire,
    /// cleanup and select steps as the tracker.
    fn requestable(
        &mut self,
        p: usize,
        now: RequestTime,
    ) -> (Vec<TxHash>, Vec<(PeerId, TxHash)>) {
        let mut txs: Vec<(u64, TxHash)> = Vec::new();
        let mut expired: Vec<(u64, PeerId, TxHash)> = Vec::new();

        for tx in 0..NUM_TXS {
            for other in 0..NUM_PEERS {
                let ann = &mut self.anns[tx][other];
                if ann.state == State::Requested && ann.time <= now {
                    expired.push((ann.sequence, peer(other), hash(tx)));
                    ann.state = State::Completed;
                    break
                }
            }
            self.cleanup(tx);

            let ann = &self.anns[tx][p];
            if ann.state == State::Candidate && ann.time <= now && self.selected(tx, now) == Some(p)
            {
                txs.push((ann.sequence, hash(tx)));
            }
        }

        txs.sort_unstable();
        expired.sort_unstable_by_key(|&(sequence, _, _)| sequence);
        (
            txs.into_iter().map(|(_, hash)| hash).collect(),
            expired.into_iter().map(|(_, peer, hash)| (peer, hash)).collect(),
        )
    }

    fn count_tracked(&self, p: usize) -> usize {
        (0..NUM_TXS).filter(|&tx| self.anns[tx][p].state != State::Nothing).count()
    }

    fn count_in_flight(&self, p: usize) -> usize {
        (0..NUM_TXS).filter(|&tx| self.anns[tx][p].state == State::Requested).count()
    }

    fn count_candidates(&self, p: usize) -> usize {
        (0..NUM_TXS).filter(|&tx| self.anns[tx][p].state == State::Candidate).count()
    }
}

fn assert_counters_match(model: &Model, tracker: &TxRequestTracker) {
    let mut total = 0;
    for p in 0..NUM_PEERS {
        assert_eq!(tracker.count_tracked(peer(p)), model.count_tracked(p), "tracked, peer {p}");
        assert_eq!(
            tracker.count_in_flight(peer(p)),
            model.count_in_flight(p),
            "in flight, peer {p}"
        );
        assert_eq!(
            tracker.count_candidates(peer(p)),
            model.count_candidates(p),
            "candidates, peer {p}"
        );
        total += model.count_tracked(p);
    }
    assert_eq!(tracker.len(), total, "total announcement count");
    assert_eq!(tracker.is_empty(), total == 0);
}

#[test]
fn random_ops_match_the_reference_model() {
    ferrite_tracing::init_test_tracing();

    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tracker = TxRequestTracker::with_secret(B256::from(rng.random::<[u8; 32]>()));
        let mut model = Model::default();
        let mut now = RequestTime::from_micros(244_466_666);

        for step in 0..OPS_PER_SEED {
            match rng.random_range(0u32..100) {
                // Advance time, in anything from microseconds to minutes.
                0..=19 => {
                    let micros = 1u64 << rng.random_range(0..36);
                    now = now + std::time::Duration::from_micros(micros);
                }
                // Announce, with a ready time in the past or the future.
                20..=49 => {
                    let (p, tx) = (rng.random_range(0..NUM_PEERS), rng.random_range(0..NUM_TXS));
                    let preferred = rng.random::<bool>();
                    let offset = 1u64 << rng.random_range(0..30);
                    let ready_at = if rng.random::<bool>() {
                        now + std::time::Duration::from_micros(offset)
                    } else {
                        RequestTime::from_micros(now.as_micros().saturating_sub(offset))
                    };
                    let priority = tracker.compute_priority(&hash(tx), peer(p), preferred);
                    model.announce(p, tx, preferred, ready_at, priority);
                    tracker.announce(peer(p), hash(tx), preferred, ready_at);
                }
                // Mark a request as sent, valid target or not.
                50..=64 => {
                    let (p, tx) = (rng.random_range(0..NUM_PEERS), rng.random_range(0..NUM_TXS));
                    let expires_at =
                        now + std::time::Duration::from_micros(1 << rng.random_range(0..30));
                    model.request_sent(p, tx, expires_at);
                    tracker.request_sent(peer(p), hash(tx), expires_at);
                }
                // Record a response, solicited or not.
                65..=79 => {
                    let (p, tx) = (rng.random_range(0..NUM_PEERS), rng.random_range(0..NUM_TXS));
                    model.response_received(p, tx);
                    tracker.response_received(peer(p), hash(tx));
                }
                80..=84 => {
                    let p = rng.random_range(0..NUM_PEERS);
                    model.peer_disconnected(p);
                    tracker.peer_disconnected(peer(p));
                }
                85..=89 => {
                    let tx = rng.random_range(0..NUM_TXS);
                    model.forget_tx(tx);
                    tracker.forget_tx(hash(tx));
                }
                // Poll and compare.
                _ => {
                    let p = rng.random_range(0..NUM_PEERS);
                    let (expected_txs, expected_expired) = model.requestable(p, now);
                    let poll = tracker.requestable(peer(p), now);
                    assert_eq!(poll.txs, expected_txs, "seed {seed} step {step}");
                    assert_eq!(poll.expired, expected_expired, "seed {seed} step {step}");
                    tracker.post_requestable_sanity_check(now);
                }
            }

            if step % 97 == 0 {
                assert_counters_match(&model, &tracker);
                tracker.sanity_check();
            }
        }

        assert_counters_match(&model, &tracker);
        tracker.sanity_check();
    }
}
