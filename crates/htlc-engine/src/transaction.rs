//! Unsigned and signed HTLC transactions.
//!
//! [`UnsignedTransaction`] pairs a transaction skeleton with its
//! [`SigningObligation`]s. Signing never mutates it: the coordinator builds a
//! new [`SignedTransaction`] from a copy with every witness applied.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use htlc_core::address::Network;
use htlc_core::types::{Hash256, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::HtlcError;
use crate::ledger::LedgerModel;

/// The three transactions that interact with a lock.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Owned funds into a lock.
    Fund,
    /// Lock to recipient, revealing the secret.
    Claim,
    /// Lock back to sender after the timeout.
    Refund,
}

impl TxKind {
    pub const ALL: [TxKind; 3] = [TxKind::Fund, TxKind::Claim, TxKind::Refund];

    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Fund => "fund",
            TxKind::Claim => "claim",
            TxKind::Refund => "refund",
        }
    }

    /// The spend path every obligation of this kind carries.
    pub fn spend_path(self) -> SpendPath {
        match self {
            TxKind::Fund => SpendPath::Direct,
            TxKind::Claim => SpendPath::Claim,
            TxKind::Refund => SpendPath::Refund,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = HtlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| HtlcError::UnknownKind(s.to_string()))
    }
}

/// Which condition an input's witness must satisfy.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum SpendPath {
    /// A key program or account debit.
    Direct,
    /// The lock's hash branch.
    Claim,
    /// The lock's timeout branch.
    Refund,
}

impl fmt::Display for SpendPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendPath::Direct => f.write_str("direct"),
            SpendPath::Claim => f.write_str("claim"),
            SpendPath::Refund => f.write_str("refund"),
        }
    }
}

/// A signature the transaction still needs.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct SigningObligation {
    pub input_index: usize,
    /// Signature hash of the finalized transaction for this input.
    pub message_digest: Hash256,
    /// Public key whose signature satisfies the input.
    pub required_key: Vec<u8>,
    /// Opaque hint for key custody (e.g. a derivation path).
    pub derivation_hint: Option<String>,
    pub path: SpendPath,
    /// Lock bytecode for lock spends, `None` for direct spends.
    pub lock_bytecode: Option<Vec<u8>>,
    /// Input sequence the digest commits to.
    pub sequence: u64,
}

/// A transaction awaiting signatures.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsignedTransaction<L: LedgerModel> {
    kind: TxKind,
    network: Network,
    fee: u64,
    tx: Transaction,
    obligations: Vec<SigningObligation>,
    _ledger: PhantomData<L>,
}

impl<L: LedgerModel> UnsignedTransaction<L> {
    pub(crate) fn new(
        kind: TxKind,
        network: Network,
        fee: u64,
        tx: Transaction,
        obligations: Vec<SigningObligation>,
    ) -> Self {
        Self {
            kind,
            network,
            fee,
            tx,
            obligations,
            _ledger: PhantomData,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn obligations(&self) -> &[SigningObligation] {
        &self.obligations
    }

    /// Envelope kind tag, e.g. `utxo_claim_unsigned`.
    pub fn kind_tag(&self) -> String {
        kind_tag(L::NAME, self.kind, false)
    }
}

impl<L: LedgerModel> fmt::Debug for UnsignedTransaction<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedTransaction")
            .field("kind", &self.kind_tag())
            .field("network", &self.network)
            .field("fee", &self.fee)
            .field("inputs", &self.tx.inputs.len())
            .field("outputs", &self.tx.outputs.len())
            .finish()
    }
}

/// A fully witnessed transaction, ready for broadcast.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction<L: LedgerModel> {
    kind: TxKind,
    network: Network,
    fee: u64,
    tx: Transaction,
    signatures: Vec<Vec<u8>>,
    _ledger: PhantomData<L>,
}

impl<L: LedgerModel> SignedTransaction<L> {
    pub(crate) fn new(
        kind: TxKind,
        network: Network,
        fee: u64,
        tx: Transaction,
        signatures: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            kind,
            network,
            fee,
            tx,
            signatures,
            _ledger: PhantomData,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Signatures in obligation order.
    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// Broadcastable bytes (canonical encoding, witnesses included).
    pub fn raw_bytes(&self) -> Result<Vec<u8>, HtlcError> {
        Ok(self.tx.encode()?)
    }

    pub fn txid(&self) -> Result<Hash256, HtlcError> {
        Ok(self.tx.txid()?)
    }

    /// Envelope kind tag, e.g. `account_refund_signed`.
    pub fn kind_tag(&self) -> String {
        kind_tag(L::NAME, self.kind, true)
    }
}

impl<L: LedgerModel> fmt::Debug for SignedTransaction<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("kind", &self.kind_tag())
            .field("network", &self.network)
            .field("fee", &self.fee)
            .field("signatures", &self.signatures.len())
            .finish()
    }
}

/// `<ledger>_<kind>_<unsigned|signed>`
pub fn kind_tag(ledger: &str, kind: TxKind, signed: bool) -> String {
    let state = if signed { "signed" } else { "unsigned" };
    format!("{ledger}_{kind}_{state}")
}

/// Split a kind tag for ledger `ledger` into `(kind, signed)`.
///
/// Anything that is not exactly `<ledger>_<fund|claim|refund>_<unsigned|signed>`
/// is [`HtlcError::UnknownKind`].
pub fn parse_kind_tag(ledger: &str, tag: &str) -> Result<(TxKind, bool), HtlcError> {
    let unknown = || HtlcError::UnknownKind(tag.to_string());
    let rest = tag
        .strip_prefix(ledger)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(unknown)?;
    let (kind, state) = rest.split_once('_').ok_or_else(unknown)?;
    let kind: TxKind = kind.parse().map_err(|_| unknown())?;
    let signed = match state {
        "unsigned" => false,
        "signed" => true,
        _ => return Err(unknown()),
    };
    Ok((kind, signed))
}
