//! In-memory pool of unconfirmed transactions (mempool).
//!
//! The pool is the single source of truth for "what is currently pending".
//! It provides:
//! - admission with duplicate-hash idempotence and replace-by-fee for
//!   same-sender/same-nonce transparent conflicts
//! - projected balances (transparent diff-based, confidential homomorphic)
//!   over an atomically-acquired snapshot of the pending set
//! - advisory nonce resolution for the transaction builder
//! - a fee-ordered candidate list for block templates, cached per chain tip
//!
//! Transactions must be validated by the caller before insertion (signatures
//! and proofs are the consensus layer's job); the pool checks structure,
//! duplicates, and nonce conflicts.
//!
//! # Concurrency
//!
//! Many threads (API, gossip, wallet builder, forging loop) share one pool.
//! Mutation takes a short write lock covering only the map update — never a
//! balance scan or serialization. Readers clone the `Arc`'d entries under a
//! read lock and scan the resulting snapshot; a reader never observes a
//! half-applied mutation, and admissions landing mid-scan are simply not in
//! that snapshot. The candidate cache is an `Arc` swapped whole, so an
//! in-flight reader keeps a consistent snapshot while a new one is installed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::elgamal::{self, Ciphertext};
use crate::error::MempoolError;
use crate::traits::ChainStateProvider;
use crate::transaction::{ConfidentialScript, Transaction, TransparentScript};
use crate::types::{AssetId, Hash256, KeyBytes};

/// Fee rate precision multiplier.
///
/// Fee-per-byte is stored as `fee * FEE_RATE_PRECISION / size`, giving
/// milli-umbrals per byte for fine-grained ordering.
const FEE_RATE_PRECISION: u128 = 1_000;

/// Compute fee rate in milli-umbrals per byte.
///
/// Uses u128 intermediate to prevent overflow for large fees.
fn compute_fee_per_byte(fee: u64, size: u64) -> u64 {
    if size == 0 {
        return u64::MAX;
    }
    let rate = (fee as u128) * FEE_RATE_PRECISION / (size as u128);
    rate.min(u64::MAX as u128) as u64
}

/// Current unix time in seconds; zero if the clock is before the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A transaction stored in the pool with admission-time metadata.
///
/// Immutable after construction: `fee_per_byte` is the fee actually embedded
/// in the transaction and is never recomputed, even if the fee schedule
/// changes while the entry is pending.
#[derive(Debug, Clone)]
pub struct PendingTx {
    /// The pending transaction.
    pub tx: Arc<Transaction>,
    /// Precomputed identity hash.
    pub hash: Hash256,
    /// Wall-clock admission time (unix seconds). Diagnostic use.
    pub added_at: u64,
    /// Chain height when admitted; used to detect staleness.
    pub chain_height: u64,
    /// Wire size in bytes.
    pub size: u64,
    /// Fee rate in milli-umbrals per byte, fixed at admission.
    fee_per_byte: u64,
}

impl PendingTx {
    /// Fee rate in milli-umbrals per byte.
    pub fn fee_per_byte(&self) -> u64 {
        self.fee_per_byte
    }
}

/// A sorted candidate list, tagged with the chain tip it was computed
/// against. Immutable once built.
#[derive(Debug)]
pub struct ResultSnapshot {
    /// Tip hash the snapshot was computed against.
    pub chain_hash: Hash256,
    /// Pending transactions in block-inclusion order.
    pub txs: Vec<Arc<PendingTx>>,
}

/// Cooperative cancellation flag for long-running confidential projections.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Projections observe this between transactions.
    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::Relaxed)
    }
}

/// The shared transaction pool.
///
/// Constructed once at node startup and passed by `Arc` to every
/// collaborator; there is no ambient singleton.
pub struct Mempool {
    /// Pending set: identity hash → entry.
    txs: RwLock<HashMap<Hash256, Arc<PendingTx>>>,
    /// Candidate cache, swapped whole. `None` after any invalidation.
    result: RwLock<Option<Arc<ResultSnapshot>>>,
    /// Bumped on every invalidation; lets a recompute detect mutations
    /// that landed after it snapshotted the pending set.
    generation: AtomicU64,
    /// Chain tip the pool currently tracks, as `(height, hash)`.
    tip: RwLock<(u64, Hash256)>,
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            txs: RwLock::new(HashMap::new()),
            result: RwLock::new(None),
            generation: AtomicU64::new(0),
            tip: RwLock::new((0, Hash256::ZERO)),
        }
    }

    // ------------------------------------------------------------------
    // Admission / removal
    // ------------------------------------------------------------------

    /// Admit a transaction into the pool.
    ///
    /// Returns `Ok(true)` on insertion and `Ok(false)` for a transaction
    /// already pending under the same identity hash (idempotent no-op),
    /// unless `replace` requests eviction-and-reinsert.
    ///
    /// A transparent transaction whose sender/nonce pair is already claimed
    /// by a different pending transaction is rejected with
    /// [`MempoolError::DuplicateNonce`], unless `replace` is set and the new
    /// transaction's fee-per-byte is strictly higher (replace-by-fee), in
    /// which case the incumbent is evicted.
    ///
    /// A failed admission leaves the pool exactly as it was. Any successful
    /// mutation invalidates the candidate cache.
    pub fn add_tx(
        &self,
        tx: Transaction,
        chain_height: u64,
        replace: bool,
    ) -> Result<bool, MempoolError> {
        tx.validate_structure()?;

        // All serialization happens before the lock is taken.
        let hash = tx.identity_hash();
        let size = tx.serialized_size();
        let fee = tx.fee()?;
        let fee_per_byte = compute_fee_per_byte(fee, size);

        let entry = Arc::new(PendingTx {
            tx: Arc::new(tx),
            hash,
            added_at: unix_now(),
            chain_height,
            size,
            fee_per_byte,
        });

        {
            let mut txs = self.txs.write();

            if txs.contains_key(&hash) {
                if !replace {
                    return Ok(false);
                }
                txs.remove(&hash);
            }

            if let (Some(sender), Some(nonce)) = (entry.tx.sender_key(), entry.tx.nonce()) {
                let conflict = txs
                    .values()
                    .find(|e| e.tx.nonce() == Some(nonce) && e.tx.sender_key() == Some(sender))
                    .cloned();
                if let Some(existing) = conflict {
                    if replace && fee_per_byte > existing.fee_per_byte {
                        txs.remove(&existing.hash);
                        debug!(
                            evicted = %existing.hash.short(),
                            replacement = %hash.short(),
                            "replace-by-fee eviction"
                        );
                    } else {
                        return Err(MempoolError::DuplicateNonce {
                            nonce,
                            existing: existing.hash.to_string(),
                        });
                    }
                }
            }

            txs.insert(hash, entry);
        }

        self.invalidate_result();
        debug!(tx = %hash.short(), height = chain_height, fee_per_byte, "admitted");
        Ok(true)
    }

    /// Remove a transaction by identity hash. Idempotent; removing a
    /// missing entry is not an error.
    pub fn remove_tx(&self, hash: &Hash256) -> Option<Arc<PendingTx>> {
        let removed = self.txs.write().remove(hash);
        if removed.is_some() {
            self.invalidate_result();
            debug!(tx = %hash.short(), "removed");
        }
        removed
    }

    /// Drop entries made obsolete by a newly connected block: transactions
    /// confirmed in the block, and transparent transactions whose nonce has
    /// fallen below the sender's new confirmed nonce (they can never
    /// confirm).
    pub fn remove_confirmed(&self, confirmed: &[Hash256], chain: &dyn ChainStateProvider) {
        let mut dropped = 0usize;
        {
            let mut txs = self.txs.write();
            for hash in confirmed {
                if txs.remove(hash).is_some() {
                    dropped += 1;
                }
            }

            let stale: Vec<Hash256> = txs
                .values()
                .filter(|e| {
                    match (e.tx.sender_key(), e.tx.nonce()) {
                        (Some(sender), Some(nonce)) => chain
                            .account(sender)
                            .is_some_and(|account| nonce < account.nonce),
                        _ => false,
                    }
                })
                .map(|e| e.hash)
                .collect();
            for hash in &stale {
                txs.remove(hash);
                dropped += 1;
            }
        }

        if dropped > 0 {
            self.invalidate_result();
            info!(dropped, "pool pruned after block connect");
        }
    }

    /// Register a chain tip move. Invalidates the candidate cache so the
    /// next template request recomputes against the new tip.
    pub fn update_chain_tip(&self, height: u64, hash: Hash256) {
        *self.tip.write() = (height, hash);
        self.invalidate_result();
        debug!(height, tip = %hash.short(), "chain tip updated");
    }

    /// Chain tip the pool currently tracks.
    pub fn chain_tip(&self) -> (u64, Hash256) {
        *self.tip.read()
    }

    fn invalidate_result(&self) {
        self.generation.fetch_add(1, AtomicOrdering::Release);
        *self.result.write() = None;
    }

    /// Install a freshly computed snapshot, unless the pool was mutated
    /// after `generation` was sampled. Installing over an intervening
    /// invalidation would tag a stale list with the current tip and hide
    /// the admission from every later caller, so a raced snapshot is
    /// discarded instead (the next request recomputes).
    fn install_result(&self, generation: u64, snapshot: Arc<ResultSnapshot>) -> bool {
        let mut slot = self.result.write();
        if self.generation.load(AtomicOrdering::Acquire) == generation {
            *slot = Some(snapshot);
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Snapshots and queries
    // ------------------------------------------------------------------

    /// Point-in-time snapshot of all pending entries (arbitrary order).
    pub fn pending_snapshot(&self) -> Vec<Arc<PendingTx>> {
        self.txs.read().values().cloned().collect()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.txs.read().contains_key(hash)
    }

    pub fn get(&self, hash: &Hash256) -> Option<Arc<PendingTx>> {
        self.txs.read().get(hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.txs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.read().is_empty()
    }

    /// Project a transparent account's available balance for one asset,
    /// as if every pending transaction touching it had already applied.
    ///
    /// Pure left-fold over one snapshot; concurrent admissions mid-scan are
    /// not observed. Underflow (pending spends exceeding `base`) is
    /// reported as [`MempoolError::InsufficientProjected`] carrying the raw
    /// numbers — whether that is fatal is the caller's policy.
    pub fn project_transparent_balance(
        &self,
        sender: &KeyBytes,
        asset: &AssetId,
        base: u64,
    ) -> Result<u64, MempoolError> {
        let mut available = base;
        for entry in self.pending_snapshot() {
            let Some(transparent) = entry.tx.as_transparent() else {
                continue;
            };
            for vin in &transparent.vin {
                if &vin.public_key == sender && &vin.asset == asset {
                    available = available.checked_sub(vin.amount).ok_or(
                        MempoolError::InsufficientProjected {
                            available,
                            required: vin.amount,
                        },
                    )?;
                }
            }
        }
        Ok(available)
    }

    /// Project confidential balances for a batch of public keys.
    ///
    /// For each key, folds the `(C[i], D)` commitment of every pending
    /// confidential payload whose asset matches and whose ring contains the
    /// key, by homomorphic ciphertext addition — never decryption.
    ///
    /// Tri-state output per key:
    /// - no base supplied, nothing pending touched it ⇒ `None` ("fetch the
    ///   confirmed state directly")
    /// - no base supplied, pending activity ⇒ fold onto the canonical zero
    ///   ciphertext for the key
    /// - base supplied ⇒ always `Some`, folded onto the base
    ///
    /// O(pending × payloads × ring size) per key. This scan dominates
    /// mempool query cost under confidential load; it is deliberately
    /// uncached, since per-key invalidation would cost more than the scan
    /// at expected pool sizes.
    ///
    /// `cancel` is observed between pending transactions; on cancellation
    /// the call returns [`MempoolError::Cancelled`] with no partial output.
    pub fn project_confidential_balances(
        &self,
        public_keys: &[KeyBytes],
        bases: Option<&[Option<Vec<u8>>]>,
        asset: &AssetId,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Option<Vec<u8>>>, MempoolError> {
        let snapshot = self.pending_snapshot();
        let mut output = Vec::with_capacity(public_keys.len());

        for (i, key) in public_keys.iter().enumerate() {
            let base = bases.and_then(|b| b.get(i)).and_then(|o| o.as_deref());
            let mut balance = match base {
                Some(bytes) => Ciphertext::deserialize(bytes)?,
                None => Ciphertext::zero_balance(&elgamal::decode_point(key)?),
            };

            let mut changed = false;
            for entry in &snapshot {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(MempoolError::Cancelled);
                    }
                }
                let Some(confidential) = entry.tx.as_confidential() else {
                    continue;
                };
                for payload in &confidential.payloads {
                    if &payload.asset != asset {
                        continue;
                    }
                    if let Some(pos) = payload.ring.iter().position(|k| k == key) {
                        let delta = Ciphertext::from_parts(&payload.commitments[pos], &payload.d)?;
                        balance = balance.add(&delta);
                        changed = true;
                    }
                }
            }

            if changed || base.is_some() {
                output.push(Some(balance.serialize().to_vec()));
            } else {
                output.push(None);
            }
        }

        Ok(output)
    }

    /// Single-key convenience wrapper around
    /// [`project_confidential_balances`](Self::project_confidential_balances).
    pub fn project_confidential_balance(
        &self,
        public_key: &KeyBytes,
        base: Option<&[u8]>,
        asset: &AssetId,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<Vec<u8>>, MempoolError> {
        let bases = [base.map(|b| b.to_vec())];
        let mut result =
            self.project_confidential_balances(&[*public_key], Some(&bases), asset, cancel)?;
        Ok(result.pop().flatten())
    }

    /// Next unclaimed nonce for a transparent sender, starting from the
    /// confirmed `base_nonce`.
    ///
    /// Advisory only: the returned nonce is not reserved, and a second call
    /// before the first transaction is admitted returns the same value.
    pub fn next_nonce(&self, sender: &KeyBytes, base_nonce: u64) -> u64 {
        let claimed: HashSet<u64> = self
            .pending_snapshot()
            .iter()
            .filter(|e| e.tx.sender_key() == Some(sender))
            .filter_map(|e| e.tx.nonce())
            .collect();

        let mut nonce = base_nonce;
        while claimed.contains(&nonce) {
            nonce += 1;
        }
        nonce
    }

    // ------------------------------------------------------------------
    // Candidate selection
    // ------------------------------------------------------------------

    /// Total order for block-template construction: fee-per-byte descending;
    /// equal-fee transparent pairs by ascending nonce (the lower nonce must
    /// confirm first for the higher to ever become valid). Other equal-fee
    /// pairs keep snapshot order (stable sort); callers must not depend on
    /// their relative order.
    pub fn sort_pending(txs: &mut [Arc<PendingTx>]) {
        txs.sort_by(|a, b| {
            b.fee_per_byte
                .cmp(&a.fee_per_byte)
                .then_with(|| match (a.tx.nonce(), b.tx.nonce()) {
                    (Some(na), Some(nb)) => na.cmp(&nb),
                    _ => std::cmp::Ordering::Equal,
                })
        });
    }

    /// Candidate transactions for the next block, in inclusion order.
    ///
    /// Serves the cached snapshot when its tip matches `chain_hash` (or on
    /// the wildcard `None`); otherwise recomputes from the current pending
    /// set against the currently registered tip, installs the new snapshot,
    /// and returns it. The second element is the tip the list was actually
    /// computed against — callers must check it rather than assume it
    /// matches what they asked for.
    pub fn next_transactions_to_include(
        &self,
        chain_hash: Option<&Hash256>,
    ) -> (Vec<Arc<Transaction>>, Hash256) {
        if let Some(cached) = self.result.read().clone() {
            if chain_hash.is_none_or(|h| *h == cached.chain_hash) {
                let txs = cached.txs.iter().map(|e| e.tx.clone()).collect();
                return (txs, cached.chain_hash);
            }
        }

        let generation = self.generation.load(AtomicOrdering::Acquire);
        let mut pending = self.pending_snapshot();
        Self::sort_pending(&mut pending);
        let (_, tip_hash) = *self.tip.read();

        let snapshot = Arc::new(ResultSnapshot { chain_hash: tip_hash, txs: pending });
        let txs = snapshot.txs.iter().map(|e| e.tx.clone()).collect();
        if self.install_result(generation, snapshot) {
            debug!(tip = %tip_hash.short(), "candidate snapshot recomputed");
        }
        (txs, tip_hash)
    }

    // ------------------------------------------------------------------
    // In-flight duplicate guards and spam accounting
    // ------------------------------------------------------------------

    /// Whether a pending transparent transaction of the given script kind
    /// already exists for this key. Used upstream to prevent duplicate
    /// in-flight unstake/delegate operations per account.
    pub fn exists_transparent_version(&self, key: &KeyBytes, script: TransparentScript) -> bool {
        self.pending_snapshot().iter().any(|e| {
            e.tx.as_transparent()
                .is_some_and(|t| t.script == script && e.tx.sender_key() == Some(key))
        })
    }

    /// Whether a pending confidential payload of the given script kind has
    /// this key in its ring.
    pub fn exists_confidential_version(&self, key: &KeyBytes, script: ConfidentialScript) -> bool {
        self.pending_snapshot().iter().any(|e| {
            e.tx.as_confidential().is_some_and(|c| {
                c.payloads
                    .iter()
                    .any(|p| p.script == script && p.ring.contains(key))
            })
        })
    }

    /// Number of pending transactions involving this key as an input-side
    /// participant: transparent transactions spending from it, plus
    /// confidential payloads whose ring contains it. Used for upstream
    /// rate limiting.
    pub fn count_input_txs(&self, key: &KeyBytes) -> u64 {
        let mut count = 0u64;
        for entry in self.pending_snapshot() {
            match (entry.tx.as_transparent(), entry.tx.as_confidential()) {
                (Some(t), _) => {
                    if t.vin.iter().any(|vin| &vin.public_key == key) {
                        count += 1;
                    }
                }
                (_, Some(c)) => {
                    count += c.payloads.iter().filter(|p| p.ring.contains(key)).count() as u64;
                }
                _ => {}
            }
        }
        count
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}
