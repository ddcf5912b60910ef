//! Transport envelope for unsigned and signed transactions.
//!
//! `raw_bytes` of an unsigned envelope is the bincode encoding of the
//! transaction together with its obligations, so a signer needs nothing else.
//! A signed envelope carries the broadcastable transaction bytes. Byte fields
//! are hex strings in JSON.
//!
//! Decoding treats the envelope as untrusted: lengths are bounded by
//! [`MAX_TX_BYTES`], and every obligation is recomputed from the decoded
//! transaction before anything reaches a signer.

use htlc_core::address::Network;
use htlc_core::constants::MAX_TX_BYTES;
use htlc_core::error::TransactionError;
use htlc_core::types::Transaction;
use serde::{Deserialize, Serialize};

use crate::error::HtlcError;
use crate::ledger::LedgerModel;
use crate::transaction::{
    SignedTransaction, SigningObligation, UnsignedTransaction, kind_tag, parse_kind_tag,
};
use crate::validation::{check_conservation, check_obligation};

/// Serialized form handed to and from a transport layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub fee: u64,
    pub network: Network,
    /// `<ledger>_<fund|claim|refund>_<unsigned|signed>`
    pub kind: String,
    #[serde(with = "hex_bytes")]
    pub raw_bytes: Vec<u8>,
    #[serde(with = "hex_list")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(bincode::Encode, bincode::Decode)]
struct UnsignedBody {
    tx: Transaction,
    obligations: Vec<SigningObligation>,
}

fn bincode_err(e: impl std::fmt::Display) -> HtlcError {
    HtlcError::Serialization(e.to_string())
}

impl Envelope {
    pub fn from_unsigned<L: LedgerModel>(unsigned: &UnsignedTransaction<L>) -> Result<Self, HtlcError> {
        let body = UnsignedBody {
            tx: unsigned.tx().clone(),
            obligations: unsigned.obligations().to_vec(),
        };
        let raw_bytes =
            bincode::encode_to_vec(&body, bincode::config::standard()).map_err(bincode_err)?;
        Ok(Self {
            fee: unsigned.fee(),
            network: unsigned.network(),
            kind: unsigned.kind_tag(),
            raw_bytes,
            signatures: Vec::new(),
        })
    }

    pub fn from_signed<L: LedgerModel>(signed: &SignedTransaction<L>) -> Result<Self, HtlcError> {
        Ok(Self {
            fee: signed.fee(),
            network: signed.network(),
            kind: signed.kind_tag(),
            raw_bytes: signed.raw_bytes()?,
            signatures: signed.signatures().to_vec(),
        })
    }

    /// Decode an unsigned envelope for ledger `L`.
    pub fn to_unsigned<L: LedgerModel>(&self) -> Result<UnsignedTransaction<L>, HtlcError> {
        let (kind, signed) = parse_kind_tag(L::NAME, &self.kind)?;
        if signed {
            return Err(HtlcError::kind_mismatch(kind_tag(L::NAME, kind, false), &self.kind));
        }

        let config = bincode::config::standard().with_limit::<MAX_TX_BYTES>();
        let (body, read): (UnsignedBody, usize) =
            bincode::decode_from_slice(&self.raw_bytes, config).map_err(bincode_err)?;
        if read != self.raw_bytes.len() {
            return Err(HtlcError::Serialization(format!(
                "{} trailing bytes",
                self.raw_bytes.len() - read
            )));
        }

        let expected = kind.spend_path();
        if let Some(ob) = body.obligations.iter().find(|ob| ob.path != expected) {
            return Err(HtlcError::kind_mismatch(expected, ob.path));
        }
        for ob in &body.obligations {
            check_obligation::<L>(&body.tx, ob)?;
        }
        check_conservation(&body.tx, self.fee)?;

        Ok(UnsignedTransaction::new(
            kind,
            self.network,
            self.fee,
            body.tx,
            body.obligations,
        ))
    }

    /// Decode a signed envelope for ledger `L`.
    pub fn to_signed<L: LedgerModel>(&self) -> Result<SignedTransaction<L>, HtlcError> {
        let (kind, signed) = parse_kind_tag(L::NAME, &self.kind)?;
        if !signed {
            return Err(HtlcError::kind_mismatch(kind_tag(L::NAME, kind, true), &self.kind));
        }
        let tx = Transaction::decode(&self.raw_bytes).map_err(|e| match e {
            TransactionError::Serialization(msg) => HtlcError::Serialization(msg),
            other => other.into(),
        })?;
        check_conservation(&tx, self.fee)?;
        Ok(SignedTransaction::new(
            kind,
            self.network,
            self.fee,
            tx,
            self.signatures.clone(),
        ))
    }

    pub fn to_json(&self) -> Result<String, HtlcError> {
        serde_json::to_string(self).map_err(|e| HtlcError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, HtlcError> {
        serde_json::from_str(json).map_err(|e| HtlcError::Serialization(e.to_string()))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(&text).map_err(D::Error::custom)
    }
}

mod hex_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&hex::encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|t| hex::decode(t).map_err(D::Error::custom))
            .collect()
    }
}
