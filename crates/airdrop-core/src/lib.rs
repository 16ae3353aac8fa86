//! # Airdrop Core Library
//!
//! Core logic for the Samoyed Merkle airdrop:
//! - the eligibility list (ordered `(address, amount)` entries)
//! - the membership Merkle tree and inclusion-proof generation
//! - exact-decimal token amount formatting and parsing
//!
//! The tree's root must match the root stored in the deployed airdrop
//! contract; every encoding choice in [`tree`] is part of that contract.

pub mod amount;
pub mod eligibility;
pub mod tree;

pub use amount::{format_amount, parse_amount, DECIMALS};
pub use eligibility::{EligibilityEntry, EligibilityError, EligibilityList};
pub use tree::{MembershipTree, TreeError};
