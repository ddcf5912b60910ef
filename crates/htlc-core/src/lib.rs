//! # htlc-core
//! Ledger-independent building blocks for hash time-locked contracts.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod interpreter;
pub mod script;
pub mod traits;
pub mod types;
