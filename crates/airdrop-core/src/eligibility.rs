//! Eligibility List
//!
//! The static ground truth for who may claim and how much. Entries are
//! loaded from the deployment artifact and kept in file order: an entry's
//! position is its leaf index in the membership tree, so the list must
//! never be re-sorted independently of the published root.

use alloy::primitives::{Address, U256};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or querying the eligibility list
#[derive(Debug, Error)]
pub enum EligibilityError {
    #[error("Failed to read eligibility file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse eligibility file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid address at entry {index}: {value}")]
    InvalidAddress { index: usize, value: String },

    #[error("Invalid amount at entry {index}: {value}")]
    InvalidAmount { index: usize, value: String },

    #[error("Eligibility list is empty")]
    Empty,
}

/// One claimable allocation: an address and its total assigned amount
/// in base units (18 implied decimals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityEntry {
    pub address: Address,
    pub amount: U256,
}

/// The ordered eligibility list. Immutable after loading.
#[derive(Debug, Clone)]
pub struct EligibilityList {
    entries: Vec<EligibilityEntry>,
}

/// On-disk artifact format: `{"users": [["0x…", "<decimal amount>"], …]}`
#[derive(Deserialize)]
struct Artifact {
    users: Vec<(String, String)>,
}

impl EligibilityList {
    /// Load the list from the deployment artifact file.
    ///
    /// # Errors
    /// Returns an error on I/O failure, malformed JSON, an unparseable
    /// address or amount, or an empty list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EligibilityError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse the list from the artifact JSON.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, an unparseable address or
    /// amount, or an empty list.
    pub fn from_json_str(raw: &str) -> Result<Self, EligibilityError> {
        let artifact: Artifact = serde_json::from_str(raw)?;

        let mut entries = Vec::with_capacity(artifact.users.len());
        for (index, (address, amount)) in artifact.users.into_iter().enumerate() {
            let address: Address =
                address
                    .parse()
                    .map_err(|_| EligibilityError::InvalidAddress {
                        index,
                        value: address.clone(),
                    })?;
            let amount = U256::from_str_radix(&amount, 10).map_err(|_| {
                EligibilityError::InvalidAmount {
                    index,
                    value: amount.clone(),
                }
            })?;
            entries.push(EligibilityEntry { address, amount });
        }

        if entries.is_empty() {
            return Err(EligibilityError::Empty);
        }

        Ok(Self { entries })
    }

    /// Build a list directly from entries. Order is preserved.
    ///
    /// # Errors
    /// Returns [`EligibilityError::Empty`] for an empty entry list.
    pub fn from_entries(entries: Vec<EligibilityEntry>) -> Result<Self, EligibilityError> {
        if entries.is_empty() {
            return Err(EligibilityError::Empty);
        }
        Ok(Self { entries })
    }

    /// Entry at a leaf index, if in range.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&EligibilityEntry> {
        self.entries.get(index)
    }

    /// Leaf index of an address, if eligible. Address comparison is on the
    /// parsed 20-byte value, so checksummed and lowercased inputs match.
    #[must_use]
    pub fn index_of(&self, address: Address) -> Option<usize> {
        self.entries.iter().position(|e| e.address == address)
    }

    /// Number of entries (= leaf count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in leaf order.
    pub fn iter(&self) -> impl Iterator<Item = &EligibilityEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"{
        "users": [
            ["0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "1000000000000000000"],
            ["0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "2500000000000000000"]
        ]
    }"#;

    #[test]
    fn test_parse_artifact() {
        let list = EligibilityList::from_json_str(ARTIFACT).unwrap();
        assert_eq!(list.len(), 2);

        let first = list.entry(0).unwrap();
        assert_eq!(
            first.address,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(first.amount, U256::from(10).pow(U256::from(18)));
    }

    #[test]
    fn test_index_of_is_case_insensitive() {
        let list = EligibilityList::from_json_str(ARTIFACT).unwrap();

        let checksummed: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
            .parse()
            .unwrap();
        let lowercased: Address = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
            .parse()
            .unwrap();

        assert_eq!(list.index_of(checksummed), Some(1));
        assert_eq!(list.index_of(lowercased), Some(1));
    }

    #[test]
    fn test_index_of_unknown_address() {
        let list = EligibilityList::from_json_str(ARTIFACT).unwrap();
        assert_eq!(list.index_of(Address::ZERO), None);
    }

    #[test]
    fn test_order_is_preserved() {
        let list = EligibilityList::from_json_str(ARTIFACT).unwrap();
        // Leaf order is file order, not address order.
        assert!(list.entry(0).unwrap().address > list.entry(1).unwrap().address);
    }

    #[test]
    fn test_empty_list_rejected() {
        let result = EligibilityList::from_json_str(r#"{"users": []}"#);
        assert!(matches!(result, Err(EligibilityError::Empty)));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let raw = r#"{"users": [["not_an_address", "1"]]}"#;
        let result = EligibilityList::from_json_str(raw);
        assert!(matches!(
            result,
            Err(EligibilityError::InvalidAddress { index: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_amount_rejected() {
        let raw = r#"{"users": [["0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "1.5"]]}"#;
        let result = EligibilityList::from_json_str(raw);
        assert!(matches!(
            result,
            Err(EligibilityError::InvalidAmount { index: 0, .. })
        ));
    }
}
