//! Witness construction for a single signing obligation.
//!
//! The solver never touches secret keys: it asks a [`DigestSigner`] for a
//! signature over the obligation's precomputed digest and arranges the
//! witness stack for the requested branch.

use std::fmt;
use std::marker::PhantomData;

use htlc_core::crypto::sha256;
use htlc_core::traits::DigestSigner;
use zeroize::Zeroizing;

use crate::error::HtlcError;
use crate::ledger::LedgerModel;
use crate::lock::Lock;
use crate::transaction::{SigningObligation, SpendPath};

/// Branch the caller intends to satisfy.
#[derive(Clone)]
pub enum Branch {
    Direct,
    /// Hash branch. The secret is wiped on drop.
    Claim { secret: Zeroizing<Vec<u8>> },
    Refund,
}

impl Branch {
    pub fn claim(secret: impl Into<Vec<u8>>) -> Self {
        Branch::Claim {
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn path(&self) -> SpendPath {
        match self {
            Branch::Direct => SpendPath::Direct,
            Branch::Claim { .. } => SpendPath::Claim,
            Branch::Refund => SpendPath::Refund,
        }
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Direct => f.write_str("Direct"),
            Branch::Claim { .. } => f.write_str("Claim { secret: <redacted> }"),
            Branch::Refund => f.write_str("Refund"),
        }
    }
}

/// Witness and signature for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub witness: Vec<Vec<u8>>,
    pub signature: Vec<u8>,
    /// Relative lock the witness depends on (refunds only).
    pub relative_lock: Option<u64>,
}

pub struct BranchSolver<L: LedgerModel>(PhantomData<L>);

impl<L: LedgerModel> BranchSolver<L> {
    /// Satisfy `obligation` along `branch` with a signature from `signer`.
    pub fn solve(
        obligation: &SigningObligation,
        signer: &dyn DigestSigner,
        branch: Option<&Branch>,
    ) -> Result<Solution, HtlcError> {
        let branch = branch.ok_or(HtlcError::AmbiguousBranch)?;
        if branch.path() != obligation.path {
            return Err(HtlcError::kind_mismatch(obligation.path, branch.path()));
        }
        if signer.scheme() != L::KEY_SCHEME || signer.public_key() != obligation.required_key {
            return Err(HtlcError::KeyMismatch);
        }

        let lock = match obligation.path {
            SpendPath::Direct => None,
            SpendPath::Claim | SpendPath::Refund => {
                let bytecode = obligation.lock_bytecode.as_deref().ok_or_else(|| {
                    HtlcError::MalformedLock(format!(
                        "{} obligation for input {} carries no lock",
                        obligation.path, obligation.input_index
                    ))
                })?;
                Some(Lock::<L>::from_bytecode(bytecode)?)
            }
        };

        // Checks that need no signature run first.
        let mut relative_lock = None;
        match (branch, &lock) {
            (Branch::Claim { secret }, Some(lock)) => {
                if sha256(secret).as_bytes()[..] != lock.parameters().secret_hash[..] {
                    return Err(HtlcError::SecretMismatch);
                }
            }
            (Branch::Refund, Some(lock)) => {
                let timeout = lock.parameters().timeout;
                if obligation.sequence != timeout {
                    return Err(HtlcError::SequenceMismatch {
                        required: timeout,
                        found: obligation.sequence,
                    });
                }
                relative_lock = Some(timeout);
            }
            _ => {}
        }

        let signature = signer.sign_digest(&obligation.message_digest)?;

        let witness = match (branch, &lock) {
            (Branch::Claim { secret }, Some(lock)) => {
                L::claim_witness(secret, signature.clone(), lock.bytecode())
            }
            (Branch::Refund, Some(lock)) => L::refund_witness(signature.clone(), lock.bytecode()),
            _ => L::direct_witness(signature.clone()),
        };

        Ok(Solution {
            witness,
            signature,
            relative_lock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_keys::pair;
    use crate::ledger::{AccountLedger, UtxoLedger};
    use crate::lock::LockParameters;
    use htlc_core::constants::SEQUENCE_FINAL;
    use htlc_core::crypto::KeyScheme;
    use htlc_core::error::DataError;
    use htlc_core::types::Hash256;

    const SECRET: &[u8] = b"Hello Meheret!";

    fn lock<L: LedgerModel>() -> Lock<L> {
        Lock::build(LockParameters {
            secret_hash: sha256(SECRET).as_bytes().to_vec(),
            recipient_key: pair(L::KEY_SCHEME, 1).public_key(),
            sender_key: pair(L::KEY_SCHEME, 2).public_key(),
            timeout: 1000,
        })
        .unwrap()
    }

    fn obligation<L: LedgerModel>(path: SpendPath, key_seed: u8, sequence: u64) -> SigningObligation {
        let lock = lock::<L>();
        SigningObligation {
            input_index: 0,
            message_digest: Hash256([0x42; 32]),
            required_key: pair(L::KEY_SCHEME, key_seed).public_key(),
            derivation_hint: None,
            path,
            lock_bytecode: (path != SpendPath::Direct).then(|| lock.bytecode().to_vec()),
            sequence,
        }
    }

    struct FailingSigner(Vec<u8>);

    impl DigestSigner for FailingSigner {
        fn scheme(&self) -> KeyScheme {
            KeyScheme::Ed25519
        }
        fn public_key(&self) -> Vec<u8> {
            self.0.clone()
        }
        fn sign_digest(&self, _: &Hash256) -> Result<Vec<u8>, DataError> {
            Err(DataError::Unavailable("hsm offline".into()))
        }
    }

    // --- Claim ---

    #[test]
    fn claim_witness_layout() {
        let ob = obligation::<UtxoLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        let signer = pair(KeyScheme::Secp256k1, 1);
        let sol = BranchSolver::<UtxoLedger>::solve(&ob, &signer, Some(&Branch::claim(SECRET))).unwrap();
        assert_eq!(sol.witness.len(), 4);
        assert_eq!(sol.witness[0], SECRET);
        assert_eq!(sol.witness[1], sol.signature);
        assert_eq!(sol.witness[2], vec![1]);
        assert_eq!(sol.witness[3], lock::<UtxoLedger>().bytecode());
        assert_eq!(sol.relative_lock, None);
    }

    #[test]
    fn wrong_secret_fails_before_signing() {
        let ob = obligation::<AccountLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        let signer = FailingSigner(pair(KeyScheme::Ed25519, 1).public_key());
        let err = BranchSolver::<AccountLedger>::solve(&ob, &signer, Some(&Branch::claim(b"nope".to_vec())))
            .unwrap_err();
        assert_eq!(err, HtlcError::SecretMismatch);
    }

    #[test]
    fn sender_cannot_solve_claim() {
        let ob = obligation::<AccountLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        let signer = pair(KeyScheme::Ed25519, 2);
        assert_eq!(
            BranchSolver::<AccountLedger>::solve(&ob, &signer, Some(&Branch::claim(SECRET))),
            Err(HtlcError::KeyMismatch)
        );
    }

    #[test]
    fn scheme_mismatch_is_key_mismatch() {
        let ob = obligation::<AccountLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        let signer = pair(KeyScheme::Secp256k1, 1);
        assert_eq!(
            BranchSolver::<AccountLedger>::solve(&ob, &signer, Some(&Branch::claim(SECRET))),
            Err(HtlcError::KeyMismatch)
        );
    }

    // --- Refund ---

    #[test]
    fn refund_witness_and_relative_lock() {
        let ob = obligation::<AccountLedger>(SpendPath::Refund, 2, 1000);
        let signer = pair(KeyScheme::Ed25519, 2);
        let sol = BranchSolver::<AccountLedger>::solve(&ob, &signer, Some(&Branch::Refund)).unwrap();
        assert_eq!(sol.witness.len(), 3);
        assert_eq!(sol.witness[0], sol.signature);
        assert!(sol.witness[1].is_empty());
        assert_eq!(sol.relative_lock, Some(1000));
    }

    #[test]
    fn refund_sequence_must_match_timeout() {
        let ob = obligation::<UtxoLedger>(SpendPath::Refund, 2, 999);
        let signer = pair(KeyScheme::Secp256k1, 2);
        assert_eq!(
            BranchSolver::<UtxoLedger>::solve(&ob, &signer, Some(&Branch::Refund)),
            Err(HtlcError::SequenceMismatch { required: 1000, found: 999 })
        );
    }

    // --- Branch selection ---

    #[test]
    fn missing_branch_is_ambiguous() {
        let ob = obligation::<UtxoLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        let signer = pair(KeyScheme::Secp256k1, 1);
        assert_eq!(
            BranchSolver::<UtxoLedger>::solve(&ob, &signer, None),
            Err(HtlcError::AmbiguousBranch)
        );
    }

    #[test]
    fn branch_must_match_path() {
        let ob = obligation::<UtxoLedger>(SpendPath::Refund, 2, 1000);
        let signer = pair(KeyScheme::Secp256k1, 2);
        assert!(matches!(
            BranchSolver::<UtxoLedger>::solve(&ob, &signer, Some(&Branch::claim(SECRET))),
            Err(HtlcError::KindMismatch { .. })
        ));
    }

    #[test]
    fn direct_is_signature_only() {
        let ob = obligation::<UtxoLedger>(SpendPath::Direct, 3, SEQUENCE_FINAL);
        let signer = pair(KeyScheme::Secp256k1, 3);
        let sol = BranchSolver::<UtxoLedger>::solve(&ob, &signer, Some(&Branch::Direct)).unwrap();
        assert_eq!(sol.witness, vec![sol.signature.clone()]);
    }

    #[test]
    fn corrupted_lock_is_fatal() {
        let mut ob = obligation::<UtxoLedger>(SpendPath::Claim, 1, SEQUENCE_FINAL);
        if let Some(code) = ob.lock_bytecode.as_mut() {
            code[0] ^= 0xff;
        }
        let signer = pair(KeyScheme::Secp256k1, 1);
        let err = BranchSolver::<UtxoLedger>::solve(&ob, &signer, Some(&Branch::claim(SECRET))).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn signer_failure_propagates() {
        let ob = obligation::<AccountLedger>(SpendPath::Refund, 2, 1000);
        let signer = FailingSigner(pair(KeyScheme::Ed25519, 2).public_key());
        assert!(matches!(
            BranchSolver::<AccountLedger>::solve(&ob, &signer, Some(&Branch::Refund)),
            Err(HtlcError::DataUnavailable(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let shown = format!("{:?}", Branch::claim(SECRET));
        assert!(!shown.contains("Meheret"));
    }
}
