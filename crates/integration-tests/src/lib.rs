//! Integration tests for the airdrop workspace. See `tests/`.
