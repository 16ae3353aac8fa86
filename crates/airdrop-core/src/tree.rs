//! Membership Tree
//!
//! Merkle commitment over the eligibility list. Encoding rules are fixed
//! and must match the verifier in the deployed airdrop contract exactly;
//! any divergence silently produces a different root and no proof will
//! ever validate.
//!
//! - Leaf: `keccak256(keccak256(abi.encode(address, uint256)))`. The
//!   double hash domain-separates leaves (double keccak over the 64-byte
//!   entry encoding) from internal nodes (single keccak over 64 bytes of
//!   child hashes).
//! - Internal node: `keccak256(min(a, b) || max(a, b))`. Sorted-pair
//!   hashing makes verification position-independent.
//! - Odd level: the unpaired last node is carried up unchanged. The
//!   duplicate-pairing rule is not used.

use crate::eligibility::{EligibilityEntry, EligibilityList};
use alloy::primitives::{keccak256, B256};
use alloy::sol_types::SolValue;
use thiserror::Error;

/// Errors from tree construction and proof generation
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Leaf index {index} out of range (leaf count {leaf_count})")]
    IndexOutOfRange { index: usize, leaf_count: usize },

    #[error("Cannot build a membership tree over an empty list")]
    EmptyList,
}

/// Immutable Merkle tree over the eligibility list.
///
/// Retains every level so inclusion proofs can be answered by leaf index.
/// `levels[0]` holds the leaf hashes; the last level holds the root.
#[derive(Debug, Clone)]
pub struct MembershipTree {
    levels: Vec<Vec<B256>>,
}

/// Hash of one eligibility entry under the canonical leaf encoding.
#[must_use]
pub fn leaf_hash(entry: &EligibilityEntry) -> B256 {
    let encoded = (entry.address, entry.amount).abi_encode();
    keccak256(keccak256(encoded))
}

/// Combine two child hashes in sorted order.
fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

impl MembershipTree {
    /// Build the tree over the full eligibility list, in list order.
    ///
    /// Deterministic: the same ordered list always yields the same root.
    ///
    /// # Errors
    /// Returns [`TreeError::EmptyList`] for an empty list.
    pub fn build(list: &EligibilityList) -> Result<Self, TreeError> {
        if list.is_empty() {
            return Err(TreeError::EmptyList);
        }

        let leaves: Vec<B256> = list.iter().map(leaf_hash).collect();
        let mut levels = vec![leaves];

        while levels.last().is_some_and(|level| level.len() > 1) {
            let level = levels.last().unwrap();
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for chunk in level.chunks(2) {
                match chunk {
                    [left, right] => next.push(hash_pair(*left, *right)),
                    // Odd node: carried up unchanged.
                    [last] => next.push(*last),
                    _ => unreachable!(),
                }
            }
            levels.push(next);
        }

        let tree = Self { levels };
        tracing::debug!(root = %tree.root(), leaves = tree.leaf_count(), "Membership tree built");
        Ok(tree)
    }

    /// The committed root.
    #[must_use]
    pub fn root(&self) -> B256 {
        // Non-empty by construction.
        self.levels.last().expect("tree has at least one level")[0]
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Leaf hash at an index, if in range.
    #[must_use]
    pub fn leaf(&self, index: usize) -> Option<B256> {
        self.levels[0].get(index).copied()
    }

    /// Generate the inclusion proof for the leaf at `index`: the ordered
    /// sibling hashes from the leaf up to (excluding) the root.
    ///
    /// # Errors
    /// Returns [`TreeError::IndexOutOfRange`] outside `[0, leaf_count)`.
    pub fn prove_index(&self, index: usize) -> Result<Vec<B256>, TreeError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(TreeError::IndexOutOfRange { index, leaf_count });
        }

        let mut proof = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            // A carried-up odd node has no sibling at this level.
            if let Some(hash) = level.get(sibling) {
                proof.push(*hash);
            }
            idx /= 2;
        }

        Ok(proof)
    }
}

/// Recompute the root from a leaf hash and a proof, mirroring the on-chain
/// walk: fold each sibling in with sorted-pair hashing and compare.
#[must_use]
pub fn verify_proof(root: B256, leaf: B256, proof: &[B256]) -> bool {
    let computed = proof
        .iter()
        .fold(leaf, |acc, sibling| hash_pair(acc, *sibling));
    computed == root
}
