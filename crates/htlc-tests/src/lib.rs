//! Integration test suite for the HTLC engine.
//!
//! [`helpers::MemoryLedger`] stands in for every external collaborator (chain
//! index, lock lookup) and enforces the spend rules a real ledger would when
//! a signed transaction is applied, including relative-lock maturity.

pub mod helpers;
