//! A single account-state partition.
//!
//! One [`ShardPartition`] holds the balance map, recent-transaction ring,
//! and state digest for one shard. The type itself is lock-free data — the
//! exclusive lock lives in the router, which owns one mutex per partition —
//! so every `&mut self` method here is, by construction, inside exactly one
//! partition's critical section.
//!
//! The cardinal invariant: `state_digest` is always the hash of the full
//! balance map in canonical (sorted-by-address) encoding, recomputed after
//! every committed mutation. It is never allowed to go stale, because the
//! external reconciler compares it across replicas and a stale digest reads
//! as divergence.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::config::RECENT_TX_RING_CAPACITY;
use crate::crypto::{self, Digest};
use crate::transaction::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from partition-level balance operations.
///
/// Everything except `StateCorruption` is a local, recoverable outcome: the
/// partition is untouched and the caller decides retry-vs-drop.
/// `StateCorruption` is fatal for the subsystem — a digest that no longer
/// matches the balance map means some mutation escaped the bookkeeping, and
/// continuing to settle against the partition would extend the damage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The sender cannot cover `amount + fee`. No mutation happened.
    #[error(
        "insufficient funds on shard {shard}: address {address} has {available}, needs {required}"
    )]
    InsufficientFunds {
        /// Shard holding the sender's balance.
        shard: u32,
        /// The sender.
        address: Address,
        /// Balance at the time of the check.
        available: u64,
        /// `amount + fee` that was requested.
        required: u64,
    },

    /// A credit (or debit arithmetic) would overflow u64. If you're hitting
    /// this, someone is moving more than 18.4 quintillion grains and it is
    /// not a legitimate transfer.
    #[error("balance overflow on shard {shard} for address {address}")]
    BalanceOverflow {
        /// Shard holding the affected balance.
        shard: u32,
        /// The affected account.
        address: Address,
    },

    /// The stored state digest no longer matches the balance map.
    #[error("state digest mismatch on shard {shard}: partition is corrupt")]
    StateCorruption {
        /// The corrupt shard.
        shard: u32,
    },
}

// ---------------------------------------------------------------------------
// ShardPartition
// ---------------------------------------------------------------------------

/// Balance map, recent-transaction ring, and state digest for one shard.
#[derive(Debug)]
pub struct ShardPartition {
    index: u32,
    balances: HashMap<Address, u64>,
    recent: VecDeque<Digest>,
    state_digest: Digest,
    transaction_count: u64,
}

impl ShardPartition {
    /// Creates an empty partition for the given shard index.
    pub fn new(index: u32) -> Self {
        let mut partition = Self {
            index,
            balances: HashMap::new(),
            recent: VecDeque::with_capacity(RECENT_TX_RING_CAPACITY),
            state_digest: Digest::ZERO,
            transaction_count: 0,
        };
        // Even the empty map gets a real digest, so replicas agree from
        // block zero.
        partition.state_digest = partition.compute_state_digest();
        partition
    }

    /// This partition's shard index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Balance of an address. Missing addresses read as zero — accounts are
    /// created implicitly on first credit.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// The current state digest.
    pub fn state_digest(&self) -> Digest {
        self.state_digest
    }

    /// Committed mutations so far.
    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// `true` if the recent-transaction ring holds this digest.
    pub fn recent_contains(&self, tx_id: &Digest) -> bool {
        self.recent.contains(tx_id)
    }

    /// Number of digests currently in the ring.
    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    /// Atomic same-shard settlement: debit `amount + fee` from `from` and
    /// credit `amount` to `to` in one committed step. The fee is burned.
    ///
    /// Fails as a whole with no mutation if the sender's balance is short
    /// or the receiver's balance would overflow. No intermediate state is
    /// ever observable: both legs commit, or neither does.
    pub fn debit_credit(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
        fee: u64,
        tx_id: Digest,
    ) -> Result<(), LedgerError> {
        let required = amount.checked_add(fee).ok_or(LedgerError::BalanceOverflow {
            shard: self.index,
            address: *from,
        })?;

        let available = self.balance_of(from);
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                shard: self.index,
                address: *from,
                available,
                required,
            });
        }

        // Pre-check the credit leg before touching anything. For a
        // self-transfer the receiver's starting point is the post-debit
        // balance of the same account.
        let to_base = if to == from {
            available - required
        } else {
            self.balance_of(to)
        };
        let to_after = to_base
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                shard: self.index,
                address: *to,
            })?;

        // Commit.
        self.balances.insert(*from, available - required);
        self.balances.insert(*to, to_after);
        self.record_mutation(tx_id);
        Ok(())
    }

    /// Phase 1 of cross-shard settlement: verify and deduct `required`
    /// (`amount + fee`) from the sender. On `InsufficientFunds` nothing
    /// else happens.
    pub fn debit_prepare(
        &mut self,
        from: &Address,
        required: u64,
        tx_id: Digest,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                shard: self.index,
                address: *from,
                available,
                required,
            });
        }

        self.balances.insert(*from, available - required);
        self.record_mutation(tx_id);
        Ok(())
    }

    /// Phase 2 of cross-shard settlement: credit the receiver.
    ///
    /// Unconditional with respect to balances — a transfer that reached
    /// phase 2 was authorized in phase 1 and must not bounce here. The only
    /// failure is u64 overflow, which indicates a broken caller rather than
    /// an underfunded one.
    pub fn credit_only(
        &mut self,
        to: &Address,
        amount: u64,
        tx_id: Digest,
    ) -> Result<(), LedgerError> {
        let current = self.balance_of(to);
        let after = current
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                shard: self.index,
                address: *to,
            })?;

        self.balances.insert(*to, after);
        self.record_mutation(tx_id);
        Ok(())
    }

    /// Seeds a genesis balance. Bypasses the transaction ring (there is no
    /// transaction), but still refreshes the state digest like any other
    /// committed mutation.
    pub fn credit_genesis(&mut self, address: &Address, amount: u64) -> Result<(), LedgerError> {
        let current = self.balance_of(address);
        let after = current
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                shard: self.index,
                address: *address,
            })?;
        self.balances.insert(*address, after);
        self.state_digest = self.compute_state_digest();
        Ok(())
    }

    /// Sum of every balance in this partition. Audit surface for the
    /// conservation checks.
    pub fn total_balance(&self) -> u128 {
        self.balances.values().map(|b| u128::from(*b)).sum()
    }

    /// Recomputes the state digest from scratch and compares it with the
    /// stored one. A mismatch means a mutation escaped `record_mutation`
    /// and the partition can no longer be trusted.
    pub fn audit(&self) -> Result<(), LedgerError> {
        if self.compute_state_digest() != self.state_digest {
            return Err(LedgerError::StateCorruption { shard: self.index });
        }
        Ok(())
    }

    /// Ring append (FIFO eviction at capacity) plus digest refresh — the
    /// tail of every committed mutation.
    fn record_mutation(&mut self, tx_id: Digest) {
        if self.recent.len() == RECENT_TX_RING_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(tx_id);
        self.transaction_count += 1;
        self.state_digest = self.compute_state_digest();
    }

    /// Canonical digest of the balance map: entries sorted by address
    /// bytes, each encoded as `address || balance_le`.
    fn compute_state_digest(&self) -> Digest {
        let mut entries: Vec<(&Address, &u64)> = self.balances.iter().collect();
        entries.sort_by_key(|(addr, _)| *addr);

        let mut hasher_input = Vec::with_capacity(entries.len() * 28);
        for (addr, balance) in entries {
            hasher_input.extend_from_slice(addr.as_bytes());
            hasher_input.extend_from_slice(&balance.to_le_bytes());
        }
        crypto::hash(&hasher_input)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
