//! Integration test crate for sextant.
//!
//! This crate has no library code. Its tests drive the oracle end to end
//! across the math, oracle and pool crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p sextant-integration-tests
//! ```
