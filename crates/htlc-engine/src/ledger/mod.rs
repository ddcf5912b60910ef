//! Per-ledger capabilities.
//!
//! Every protocol rule in this crate is written once, generically over
//! [`LedgerModel`]. An adapter only answers the questions that differ between
//! ledgers: key scheme, fee model, lock layout, content hash, native asset and
//! the largest relative timeout its sequence field can express.
//!
//! - [`UtxoLedger`]: secp256k1 keys, coin inputs, inline `IF/ELSE` lock, SHA-256
//! - [`AccountLedger`] and [`SidechainLedger`]: Ed25519 keys, account debits,
//!   parameters-first lock, SHA3-256

mod account;
mod utxo;

pub use account::{AccountLedger, SidechainLedger};
pub use utxo::UtxoLedger;

use std::fmt;

use htlc_core::address::{Network, hrp_for};
use htlc_core::constants::SECRET_HASH_LEN;
use htlc_core::crypto::KeyScheme;
use htlc_core::error::AddressError;
use htlc_core::script::{Opcode, ScriptBuilder};
use htlc_core::types::{AssetId, Hash256};

use crate::error::HtlcError;
use crate::lock::LockParameters;

/// How a ledger pays for transactions and sources funds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeModel {
    /// Coins are consumed whole; the fee is the input/output difference.
    Utxo,
    /// A balance is debited at a nonce; the fee is part of the debit.
    Account,
}

/// Capability surface of one ledger.
pub trait LedgerModel: Copy + Default + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    /// Name used for locator prefixes and envelope kinds.
    const NAME: &'static str;
    const KEY_SCHEME: KeyScheme;
    const FEE_MODEL: FeeModel;
    /// Asset id of the ledger's native coin.
    const NATIVE_ASSET: AssetId;
    /// Largest relative timeout (in blocks) the ledger's sequence field accepts.
    const MAX_TIMEOUT: u64;

    /// Hash used for lock digests and signature hashes.
    fn content_hash(data: &[u8]) -> Hash256;

    /// Canonical lock bytecode for validated parameters.
    fn encode_lock(params: &LockParameters) -> Vec<u8>;

    /// Extract parameters from bytecode without validating the layout byte for byte.
    ///
    /// Callers go through [`decode_lock`](Self::decode_lock).
    fn extract_lock(bytecode: &[u8]) -> Result<LockParameters, HtlcError>;

    /// Strictly decode lock bytecode: extract, validate, re-encode, compare.
    fn decode_lock(bytecode: &[u8]) -> Result<LockParameters, HtlcError> {
        let params = Self::extract_lock(bytecode)?;
        Self::validate(&params).map_err(|e| HtlcError::MalformedLock(e.to_string()))?;
        if Self::encode_lock(&params) != bytecode {
            return Err(HtlcError::MalformedLock(
                "bytecode is not the canonical encoding".into(),
            ));
        }
        Ok(params)
    }

    /// Check parameter shapes against this ledger.
    fn validate(params: &LockParameters) -> Result<(), HtlcError> {
        if params.secret_hash.len() != SECRET_HASH_LEN {
            return Err(HtlcError::InvalidParameter(format!(
                "secret hash must be {SECRET_HASH_LEN} bytes, got {}",
                params.secret_hash.len()
            )));
        }
        Self::KEY_SCHEME
            .validate_public_key(&params.recipient_key)
            .map_err(|_| key_error("recipient", Self::KEY_SCHEME))?;
        Self::KEY_SCHEME
            .validate_public_key(&params.sender_key)
            .map_err(|_| key_error("sender", Self::KEY_SCHEME))?;
        if params.timeout == 0 || params.timeout > Self::MAX_TIMEOUT {
            return Err(HtlcError::InvalidParameter(format!(
                "timeout must be in 1..={}, got {}",
                Self::MAX_TIMEOUT,
                params.timeout
            )));
        }
        Ok(())
    }

    /// Witness satisfying the claim branch. Lock bytecode goes last.
    fn claim_witness(preimage: &[u8], signature: Vec<u8>, lock: &[u8]) -> Vec<Vec<u8>> {
        vec![preimage.to_vec(), signature, vec![1], lock.to_vec()]
    }

    /// Witness satisfying the refund branch. Lock bytecode goes last.
    fn refund_witness(signature: Vec<u8>, lock: &[u8]) -> Vec<Vec<u8>> {
        vec![signature, Vec::new(), lock.to_vec()]
    }

    /// Witness for a plain key spend.
    fn direct_witness(signature: Vec<u8>) -> Vec<Vec<u8>> {
        vec![signature]
    }

    /// `<public_key> OP_CHECKSIG`
    fn key_program(public_key: &[u8]) -> Vec<u8> {
        ScriptBuilder::new()
            .push_slice(public_key)
            .push_opcode(Opcode::CheckSig)
            .into_bytes()
    }

    /// `OP_0 <digest>`, the commitment a fund output pays to.
    fn lock_program(digest: &Hash256) -> Vec<u8> {
        lock_commitment(digest)
    }

    fn hrp(network: Network) -> Result<&'static str, AddressError> {
        hrp_for(Self::NAME, network)
    }
}

fn key_error(role: &str, scheme: KeyScheme) -> HtlcError {
    HtlcError::InvalidParameter(format!("{role} key is not a valid {scheme} key"))
}

/// `OP_0 <32-byte digest>`
pub fn lock_commitment(digest: &Hash256) -> Vec<u8> {
    ScriptBuilder::new()
        .push_slice(&[])
        .push_slice(digest.as_bytes())
        .into_bytes()
}

/// The committed digest if `program` is a lock commitment.
pub fn committed_digest(program: &[u8]) -> Option<Hash256> {
    match program {
        [0x00, 0x20, rest @ ..] => Hash256::from_slice(rest),
        _ => None,
    }
}
