//! Lock building and strict lock decoding.
//!
//! A [`Lock`] is a pure function of its [`LockParameters`]: the bytecode is
//! produced by the ledger adapter, the digest is the ledger content hash of
//! the bytecode, and the locator is the digest rendered by an
//! [`AddressEncoder`]. Rebuilding from the same parameters always yields the
//! same bytes, digest and locator.

use std::fmt;
use std::marker::PhantomData;

use htlc_core::address::{Bech32Encoder, Network};
use htlc_core::script::disassemble;
use htlc_core::traits::AddressEncoder;
use htlc_core::types::Hash256;
use tracing::debug;

use crate::error::HtlcError;
use crate::ledger::LedgerModel;

/// Inputs to a lock. Keys use the ledger's native encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockParameters {
    /// SHA-256 of the secret.
    pub secret_hash: Vec<u8>,
    /// Key that may claim with the secret.
    pub recipient_key: Vec<u8>,
    /// Key that may refund after the timeout.
    pub sender_key: Vec<u8>,
    /// Relative timeout in blocks.
    pub timeout: u64,
}

/// A two-branch hash time lock for ledger `L`.
#[derive(Clone, PartialEq, Eq)]
pub struct Lock<L: LedgerModel> {
    params: LockParameters,
    bytecode: Vec<u8>,
    _ledger: PhantomData<L>,
}

impl<L: LedgerModel> Lock<L> {
    /// Build the canonical lock for `params`.
    pub fn build(params: LockParameters) -> Result<Self, HtlcError> {
        L::validate(&params)?;
        let bytecode = L::encode_lock(&params);
        debug!(
            ledger = L::NAME,
            timeout = params.timeout,
            len = bytecode.len(),
            "lock: built"
        );
        Ok(Self {
            params,
            bytecode,
            _ledger: PhantomData,
        })
    }

    /// Reconstruct a lock from bytecode, rejecting anything but the canonical shape.
    pub fn from_bytecode(bytecode: &[u8]) -> Result<Self, HtlcError> {
        let params = L::decode_lock(bytecode)?;
        Ok(Self {
            params,
            bytecode: bytecode.to_vec(),
            _ledger: PhantomData,
        })
    }

    pub fn parameters(&self) -> &LockParameters {
        &self.params
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Human-readable disassembly of the bytecode.
    pub fn opcode(&self) -> String {
        // Canonical bytecode always parses.
        disassemble(&self.bytecode).unwrap_or_else(|_| hex::encode(&self.bytecode))
    }

    /// Ledger content hash of the bytecode.
    pub fn digest(&self) -> Hash256 {
        L::content_hash(&self.bytecode)
    }

    /// Output program committing to this lock.
    pub fn program(&self) -> Vec<u8> {
        L::lock_program(&self.digest())
    }

    /// Locator rendered by `encoder`.
    pub fn locator(
        &self,
        network: Network,
        encoder: &dyn AddressEncoder,
    ) -> Result<String, HtlcError> {
        Ok(encoder.encode(&self.digest(), L::NAME, network)?)
    }

    /// Locator rendered by the bundled Bech32m encoder.
    pub fn address(&self, network: Network) -> Result<String, HtlcError> {
        self.locator(network, &Bech32Encoder)
    }
}

impl<L: LedgerModel> fmt::Debug for Lock<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("ledger", &L::NAME)
            .field("digest", &self.digest().to_string())
            .field("timeout", &self.params.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_keys::pair;
    use crate::ledger::{AccountLedger, SidechainLedger, UtxoLedger};
    use htlc_core::address::Locator;
    use htlc_core::crypto::sha256;
    use htlc_core::error::AddressError;

    fn params<L: LedgerModel>() -> LockParameters {
        LockParameters {
            secret_hash: sha256(b"Hello Meheret!").as_bytes().to_vec(),
            recipient_key: pair(L::KEY_SCHEME, 1).public_key(),
            sender_key: pair(L::KEY_SCHEME, 2).public_key(),
            timeout: 1000,
        }
    }

    fn roundtrip<L: LedgerModel>() {
        let lock = Lock::<L>::build(params::<L>()).unwrap();
        let back = Lock::<L>::from_bytecode(lock.bytecode()).unwrap();
        assert_eq!(back.bytecode(), lock.bytecode());
        assert_eq!(back.parameters(), lock.parameters());
        assert_eq!(back, lock);
    }

    #[test]
    fn roundtrip_all_ledgers() {
        roundtrip::<UtxoLedger>();
        roundtrip::<AccountLedger>();
        roundtrip::<SidechainLedger>();
    }

    #[test]
    fn deterministic_digest_and_locator() {
        let a = Lock::<UtxoLedger>::build(params::<UtxoLedger>()).unwrap();
        let b = Lock::<UtxoLedger>::build(params::<UtxoLedger>()).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(
            a.address(Network::Mainnet).unwrap(),
            b.address(Network::Mainnet).unwrap()
        );
    }

    #[test]
    fn digest_uses_ledger_hash() {
        let lock = Lock::<AccountLedger>::build(params::<AccountLedger>()).unwrap();
        assert_eq!(lock.digest(), AccountLedger::content_hash(lock.bytecode()));
        assert_ne!(lock.digest(), sha256(lock.bytecode()));
    }

    #[test]
    fn locator_decodes_to_digest() {
        let lock = Lock::<SidechainLedger>::build(params::<SidechainLedger>()).unwrap();
        let loc: Locator = lock.address(Network::Testnet).unwrap().parse().unwrap();
        assert_eq!(loc.digest(), lock.digest());
        assert_eq!(loc.ledger(), "sidechain");
        assert!(lock.address(Network::Testnet).unwrap().starts_with("tsc1"));
    }

    #[test]
    fn account_and_sidechain_locators_differ() {
        let a = Lock::<AccountLedger>::build(params::<AccountLedger>()).unwrap();
        let s = Lock::<SidechainLedger>::build(params::<SidechainLedger>()).unwrap();
        assert_eq!(a.digest(), s.digest());
        assert_ne!(
            a.address(Network::Mainnet).unwrap(),
            s.address(Network::Mainnet).unwrap()
        );
    }

    #[test]
    fn program_commits_to_digest() {
        let lock = Lock::<UtxoLedger>::build(params::<UtxoLedger>()).unwrap();
        assert_eq!(
            crate::ledger::committed_digest(&lock.program()),
            Some(lock.digest())
        );
    }

    #[test]
    fn opcode_is_disassembly() {
        let lock = Lock::<UtxoLedger>::build(params::<UtxoLedger>()).unwrap();
        assert!(lock.opcode().starts_with("OP_IF "));
    }

    #[test]
    fn build_rejects_bad_hash_length() {
        let mut p = params::<UtxoLedger>();
        p.secret_hash = vec![0; 20];
        assert!(matches!(
            Lock::<UtxoLedger>::build(p),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let mut p = params::<AccountLedger>();
        p.timeout = 0;
        assert!(matches!(
            Lock::<AccountLedger>::build(p),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn build_rejects_wrong_key_length() {
        let mut p = params::<AccountLedger>();
        p.recipient_key.push(0);
        assert!(matches!(
            Lock::<AccountLedger>::build(p),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn from_bytecode_rejects_garbage() {
        let err = Lock::<UtxoLedger>::from_bytecode(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, HtlcError::MalformedLock(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn from_bytecode_rejects_other_ledger_shape() {
        let account = Lock::<AccountLedger>::build(params::<AccountLedger>()).unwrap();
        assert!(matches!(
            Lock::<UtxoLedger>::from_bytecode(account.bytecode()),
            Err(HtlcError::MalformedLock(_))
        ));
    }

    #[test]
    fn locator_propagates_encoder_error() {
        struct Failing;
        impl AddressEncoder for Failing {
            fn encode(&self, _: &Hash256, _: &str, _: Network) -> Result<String, AddressError> {
                Err(AddressError::InvalidHrp)
            }
        }
        let lock = Lock::<UtxoLedger>::build(params::<UtxoLedger>()).unwrap();
        assert_eq!(
            lock.locator(Network::Mainnet, &Failing),
            Err(HtlcError::Address(AddressError::InvalidHrp))
        );
    }
}
