//! Deterministic-but-unpredictable selection priorities.

use crate::types::{PeerId, TxHash};
use alloy_primitives::{keccak256, B256};
use rand::Rng;

/// Total-order selection key for the announcements of one transaction.
///
/// Higher compares as better. The top bit carries the preference class, so a
/// preferred announcement always outranks a non-preferred one for the same
/// transaction; order *within* a class is decided by a keyed hash that a peer
/// cannot predict without the tracker secret. The 256-bit domain makes ties
/// between distinct (transaction, peer) pairs unobservable in practice.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Priority(B256);

/// Computes announcement priorities, keyed with a per-tracker secret.
///
/// The secret is generated once per tracker instance and never derived from
/// externally observable input, so an adversarial peer cannot engineer which
/// peer wins the request race for a transaction it announces.
#[derive(Debug, Clone)]
pub(crate) struct PriorityComputer {
    secret: B256,
}

impl PriorityComputer {
    /// Creates a computer with a freshly drawn random secret.
    pub(crate) fn new() -> Self {
        Self { secret: B256::from(rand::rng().random::<[u8; 32]>()) }
    }

    /// Creates a computer with the given secret. Identical secrets reproduce
    /// identical priorities.
    pub(crate) const fn with_secret(secret: B256) -> Self {
        Self { secret }
    }

    /// Derives the priority of a (transaction, peer, preferred) triple.
    pub(crate) fn compute(&self, hash: &TxHash, peer: PeerId, preferred: bool) -> Priority {
        let mut input = [0u8; 73];
        input[..32].copy_from_slice(self.secret.as_slice());
        input[32..40].copy_from_slice(&u64::from(peer).to_le_bytes());
        input[40] = preferred as u8;
        input[41..].copy_from_slice(hash.as_slice());

        // Keyed wide hash, with the top bit overridden by the preference
        // class so preferred announcements sort above non-preferred ones.
        let mut digest = keccak256(input).0;
        if preferred {
            digest[0] |= 0x80;
        } else {
            digest[0] &= 0x7f;
        }
        Priority(B256::from(digest))
    }
}
