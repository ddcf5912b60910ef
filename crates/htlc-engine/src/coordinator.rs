//! Signing coordination.
//!
//! Every obligation of an unsigned transaction is solved before any witness
//! is applied. The witnesses go onto a copy, and each input is verified
//! against the program it spends. The input transaction is never mutated, so
//! a failed signing attempt leaves nothing half-signed behind.

use std::marker::PhantomData;

use htlc_core::traits::DigestSigner;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::envelope::Envelope;
use crate::error::HtlcError;
use crate::ledger::LedgerModel;
use crate::solver::{Branch, BranchSolver};
use crate::transaction::{SignedTransaction, SpendPath, TxKind, UnsignedTransaction};
use crate::validation::verify_input;

/// Signer and branch material for one transaction kind.
pub enum SolverInput<'a> {
    Fund { signer: &'a dyn DigestSigner },
    Claim { signer: &'a dyn DigestSigner, secret: &'a [u8] },
    Refund { signer: &'a dyn DigestSigner },
}

impl SolverInput<'_> {
    pub fn kind(&self) -> TxKind {
        match self {
            SolverInput::Fund { .. } => TxKind::Fund,
            SolverInput::Claim { .. } => TxKind::Claim,
            SolverInput::Refund { .. } => TxKind::Refund,
        }
    }

    fn signer(&self) -> &dyn DigestSigner {
        match self {
            SolverInput::Fund { signer }
            | SolverInput::Claim { signer, .. }
            | SolverInput::Refund { signer } => *signer,
        }
    }

    fn branch(&self) -> Branch {
        match self {
            SolverInput::Fund { .. } => Branch::Direct,
            SolverInput::Claim { secret, .. } => Branch::Claim {
                secret: Zeroizing::new(secret.to_vec()),
            },
            SolverInput::Refund { .. } => Branch::Refund,
        }
    }
}

/// Applies signatures to unsigned transactions of ledger `L`.
pub struct SigningCoordinator<L: LedgerModel>(PhantomData<L>);

impl<L: LedgerModel> SigningCoordinator<L> {
    /// Sign `unsigned` with the material in `input`.
    pub fn sign(
        unsigned: &UnsignedTransaction<L>,
        input: &SolverInput<'_>,
    ) -> Result<SignedTransaction<L>, HtlcError> {
        if input.kind() != unsigned.kind() {
            return Err(HtlcError::wrong_kind(unsigned.kind(), input.kind()));
        }
        let signer = input.signer();
        let branch = input.branch();

        let solutions = unsigned
            .obligations()
            .iter()
            .map(|ob| BranchSolver::<L>::solve(ob, signer, Some(&branch)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = unsigned.tx().clone();
        let mut signatures = Vec::with_capacity(solutions.len());
        for (ob, solution) in unsigned.obligations().iter().zip(solutions) {
            let slot = tx.inputs.get_mut(ob.input_index).ok_or_else(|| {
                HtlcError::InvalidParameter(format!(
                    "obligation references missing input {}",
                    ob.input_index
                ))
            })?;
            slot.witness = solution.witness;
            signatures.push(solution.signature);
            if let Some(blocks) = solution.relative_lock {
                debug!(input = ob.input_index, blocks, "coordinator: refund waits on relative lock");
            }
        }

        if let Some(index) = tx.inputs.iter().position(|i| i.witness.is_empty()) {
            return Err(HtlcError::InvalidParameter(format!(
                "input {index} has no signing obligation"
            )));
        }

        for ob in unsigned.obligations() {
            let prev_program = match (ob.path, &ob.lock_bytecode) {
                (SpendPath::Direct, _) => L::key_program(&ob.required_key),
                (_, Some(lock)) => L::lock_program(&L::content_hash(lock)),
                (path, None) => {
                    return Err(HtlcError::MalformedLock(format!(
                        "{path} obligation carries no lock"
                    )));
                }
            };
            verify_input::<L>(&tx, ob.input_index, &prev_program, None)?;
        }

        let signed = SignedTransaction::new(
            unsigned.kind(),
            unsigned.network(),
            unsigned.fee(),
            tx,
            signatures,
        );
        info!(
            ledger = L::NAME,
            kind = %unsigned.kind(),
            txid = %signed.txid()?,
            inputs = signed.tx().inputs.len(),
            "coordinator: transaction signed"
        );
        Ok(signed)
    }

    pub fn sign_fund(
        unsigned: &UnsignedTransaction<L>,
        signer: &dyn DigestSigner,
    ) -> Result<SignedTransaction<L>, HtlcError> {
        Self::sign(unsigned, &SolverInput::Fund { signer })
    }

    pub fn sign_claim(
        unsigned: &UnsignedTransaction<L>,
        signer: &dyn DigestSigner,
        secret: &[u8],
    ) -> Result<SignedTransaction<L>, HtlcError> {
        Self::sign(unsigned, &SolverInput::Claim { signer, secret })
    }

    pub fn sign_refund(
        unsigned: &UnsignedTransaction<L>,
        signer: &dyn DigestSigner,
    ) -> Result<SignedTransaction<L>, HtlcError> {
        Self::sign(unsigned, &SolverInput::Refund { signer })
    }

    /// Sign a serialized unsigned envelope and return the signed envelope.
    pub fn sign_envelope(
        envelope: &Envelope,
        input: &SolverInput<'_>,
    ) -> Result<Envelope, HtlcError> {
        let unsigned = envelope.to_unsigned::<L>()?;
        let signed = Self::sign(&unsigned, input)?;
        Envelope::from_signed(&signed)
    }
}
