//! # htlc-engine: hash time-locked contracts over pluggable ledgers.
//!
//! Builds two-branch locks, assembles the fund, claim and refund
//! transactions that move value through them, and signs those transactions
//! through an external key custodian. Every protocol rule is written once,
//! generically over [`LedgerModel`].
//!
//! # Modules
//!
//! - [`ledger`]: `LedgerModel` and the UTXO, account and sidechain adapters
//! - [`lock`]: lock building and strict decoding
//! - [`assembler`]: unsigned transaction assembly
//! - [`coin_selection`]: largest-first UTXO selection
//! - [`solver`]: witness construction per branch
//! - [`coordinator`]: signing coordination
//! - [`envelope`]: transport envelope
//! - [`validation`]: value conservation and spend verification
//! - [`config`]: `EngineConfig`
//! - [`error`]: `HtlcError`

pub mod assembler;
pub mod coin_selection;
pub mod config;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod solver;
pub mod transaction;
pub mod validation;

pub use assembler::{FundingSource, TransactionAssembler};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{SigningCoordinator, SolverInput};
pub use envelope::Envelope;
pub use error::HtlcError;
pub use ledger::{AccountLedger, FeeModel, LedgerModel, SidechainLedger, UtxoLedger};
pub use lock::{Lock, LockParameters};
pub use solver::{Branch, BranchSolver, Solution};
pub use transaction::{SignedTransaction, SigningObligation, SpendPath, TxKind, UnsignedTransaction};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_values_are_thread_safe() {
        assert_send_sync::<Lock<UtxoLedger>>();
        assert_send_sync::<UnsignedTransaction<AccountLedger>>();
        assert_send_sync::<SignedTransaction<SidechainLedger>>();
        assert_send_sync::<Envelope>();
        assert_send_sync::<HtlcError>();
        assert_send_sync::<EngineConfig>();
    }
}
