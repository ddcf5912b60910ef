//! Engine error taxonomy.

use htlc_core::error::{AddressError, CryptoError, DataError, ScriptError, TransactionError};
use thiserror::Error;

use crate::transaction::TxKind;

/// Errors returned by lock building, assembly, solving and signing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HtlcError {
    /// Lock parameters or call arguments are malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Bytecode is not the canonical lock shape for the ledger.
    #[error("malformed lock: {0}")]
    MalformedLock(String),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    /// No matching lock output at the referenced outpoint.
    #[error("lock output not found: {0}")]
    LockNotFound(String),

    /// A solver was invoked without naming the branch to satisfy.
    #[error("branch not specified")]
    AmbiguousBranch,

    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("unknown transaction kind: {0}")]
    UnknownKind(String),

    /// The preimage does not hash to the lock's secret hash.
    #[error("secret does not match the lock's secret hash")]
    SecretMismatch,

    /// An external collaborator failed. Never retried here.
    #[error("data unavailable: {0}")]
    DataUnavailable(#[from] DataError),

    /// The signer holds a different key than the obligation requires.
    #[error("signer key does not match the required key")]
    KeyMismatch,

    #[error("input sequence {found} does not claim the lock timeout {required}")]
    SequenceMismatch { required: u64, found: u64 },

    #[error("serialization: {0}")]
    Serialization(String),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl HtlcError {
    /// Errors that indicate corrupted input and must abort the operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HtlcError::MalformedLock(_) | HtlcError::UnknownKind(_))
    }

    pub(crate) fn kind_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        HtlcError::KindMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn wrong_kind(expected: TxKind, found: TxKind) -> Self {
        Self::kind_mismatch(expected, found)
    }
}
