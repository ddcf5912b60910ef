//! Ledger-neutral transaction types shared by every adapter.
//!
//! All values are integer base units of the spent asset. Inputs carry the
//! value they consume so conservation (`inputs == outputs + fee`) can be
//! checked without a chain lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{MAX_TX_BYTES, SEQUENCE_FINAL};
use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), lock digests and signature hashes
/// (ledger content hash), and asset identifiers.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a Hash256 from a slice, `None` unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifier of the asset an output carries.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct AssetId(pub Hash256);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// What an input consumes.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum InputSource {
    /// A previous output: an owned coin or a lock output.
    Outpoint(OutPoint),
    /// A debit from an account balance, ordered by the account nonce.
    Account {
        /// Public key owning the account.
        public_key: Vec<u8>,
        /// Account nonce this debit consumes.
        nonce: u64,
    },
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Outpoint(op) => write!(f, "{op}"),
            InputSource::Account { public_key, nonce } => {
                write!(f, "account:{}#{nonce}", hex::encode(public_key))
            }
        }
    }
}

/// A transaction input.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// What this input spends.
    pub source: InputSource,
    /// Value consumed, in base units.
    pub value: u64,
    /// Relative lock claim. [`SEQUENCE_FINAL`] disables it.
    pub sequence: u64,
    /// Witness stack proving the spend. Empty until signed.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    /// An unsigned input with no relative lock.
    pub fn new(source: InputSource, value: u64) -> Self {
        Self {
            source,
            value,
            sequence: SEQUENCE_FINAL,
            witness: Vec::new(),
        }
    }
}

/// A transaction output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in base units.
    pub value: u64,
    /// Asset carried by this output.
    pub asset: AssetId,
    /// Spending condition (key program or lock commitment).
    pub program: Vec<u8>,
}

/// A transaction moving value between key programs and locks.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Format version.
    pub version: u64,
    /// Inputs consuming coins, lock outputs or account balances.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 of the witness-stripped encoding).
    ///
    /// Witnesses are cleared first so that signing never changes the ID a
    /// follow-up transaction references.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let mut stripped = self.clone();
        for input in &mut stripped.inputs {
            input.witness.clear();
        }
        let encoded = stripped.encode()?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Canonical bincode encoding (standard config), witnesses included.
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    /// Decode the canonical encoding produced by [`encode`](Self::encode).
    ///
    /// Length prefixes are bounded by [`MAX_TX_BYTES`], so hostile input
    /// fails instead of allocating.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let config = bincode::config::standard().with_limit::<MAX_TX_BYTES>();
        let (tx, read) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| TransactionError::Serialization(e.to_string()))?;
        if read != bytes.len() {
            return Err(TransactionError::Serialization(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(tx)
    }

    /// Sum of all input values. Returns None on overflow.
    pub fn total_input_value(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value))
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Implied fee (`inputs - outputs`), `None` on overflow or deficit.
    pub fn implied_fee(&self) -> Option<u64> {
        self.total_input_value()?
            .checked_sub(self.total_output_value()?)
    }
}
