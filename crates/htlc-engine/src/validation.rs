//! Spend validation: the ledger-side view of whether a witness satisfies
//! the program it spends.
//!
//! - **Conservation** ([`check_conservation`]): `sum(inputs) == sum(outputs) + fee`
//! - **Obligations** ([`check_obligation`]): a decoded obligation's index,
//!   sequence and digest agree with the transaction it claims to sign
//! - **Script** ([`verify_input`], [`verify_transaction`]): runs each input's
//!   witness against the program it spends. Lock commitments (`OP_0 <digest>`)
//!   take the lock bytecode as the last witness item; it must hash to the
//!   committed digest and is executed over the remaining witness items.
//!
//! `age` is the number of blocks the spent output has been confirmed. It
//! enforces the relative-lock chain rule (`age >= sequence` for non-final
//! sequences). `None` skips the chain rule, which is what a signer can check
//! before broadcast.

use htlc_core::constants::SEQUENCE_FINAL;
use htlc_core::crypto::signing_hash;
use htlc_core::error::{ScriptError, TransactionError};
use htlc_core::interpreter::{self, SignatureChecker};
use htlc_core::types::Transaction;

use crate::error::HtlcError;
use crate::ledger::{LedgerModel, committed_digest};
use crate::transaction::{SigningObligation, SpendPath};

/// Check `sum(inputs) == sum(outputs) + fee`.
pub fn check_conservation(tx: &Transaction, fee: u64) -> Result<(), HtlcError> {
    let inputs = tx
        .total_input_value()
        .ok_or(TransactionError::ValueOverflow)?;
    let outputs = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;
    let expected = outputs
        .checked_add(fee)
        .ok_or(TransactionError::ValueOverflow)?;
    if inputs != expected {
        return Err(HtlcError::InvalidParameter(format!(
            "value not conserved: inputs {inputs} != outputs {outputs} + fee {fee}"
        )));
    }
    Ok(())
}

/// Check that `obligation` describes input `obligation.input_index` of `tx`:
/// the sequence matches the input's and the digest is the input's signature
/// hash over the lock bytecode (lock paths) or the required key's program.
pub fn check_obligation<L: LedgerModel>(
    tx: &Transaction,
    obligation: &SigningObligation,
) -> Result<(), HtlcError> {
    let index = obligation.input_index;
    let input = tx
        .inputs
        .get(index)
        .ok_or(TransactionError::InputIndexOutOfBounds {
            index,
            len: tx.inputs.len(),
        })?;
    if obligation.sequence != input.sequence {
        return Err(HtlcError::InvalidParameter(format!(
            "obligation for input {index} commits to sequence {}, input has {}",
            obligation.sequence, input.sequence
        )));
    }

    let script_code = match obligation.path {
        SpendPath::Direct => L::key_program(&obligation.required_key),
        SpendPath::Claim | SpendPath::Refund => {
            obligation.lock_bytecode.clone().ok_or_else(|| {
                HtlcError::MalformedLock(format!(
                    "{} obligation for input {index} carries no lock",
                    obligation.path
                ))
            })?
        }
    };
    let digest = signing_hash(tx, index, &script_code, L::content_hash)?;
    if digest != obligation.message_digest {
        return Err(HtlcError::InvalidParameter(format!(
            "obligation digest for input {index} does not match the transaction"
        )));
    }
    Ok(())
}

/// Signature and sequence checks bound to one input of one transaction.
pub struct InputChecker<'a, L: LedgerModel> {
    tx: &'a Transaction,
    index: usize,
    script_code: &'a [u8],
    _ledger: std::marker::PhantomData<L>,
}

impl<'a, L: LedgerModel> InputChecker<'a, L> {
    pub fn new(tx: &'a Transaction, index: usize, script_code: &'a [u8]) -> Self {
        Self {
            tx,
            index,
            script_code,
            _ledger: std::marker::PhantomData,
        }
    }
}

impl<L: LedgerModel> SignatureChecker for InputChecker<'_, L> {
    fn check_sig(&self, signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(digest) = signing_hash(self.tx, self.index, self.script_code, L::content_hash)
        else {
            return false;
        };
        L::KEY_SCHEME
            .verify(public_key, digest.as_bytes(), signature)
            .is_ok()
    }

    fn check_sequence(&self, required: i64) -> Result<(), ScriptError> {
        let sequence = self
            .tx
            .inputs
            .get(self.index)
            .map(|i| i.sequence)
            .unwrap_or(SEQUENCE_FINAL);
        let satisfied = u64::try_from(required).is_ok_and(|r| {
            sequence != SEQUENCE_FINAL && sequence <= L::MAX_TIMEOUT && r <= sequence
        });
        if satisfied {
            Ok(())
        } else {
            Err(ScriptError::UnsatisfiedLocktime { required })
        }
    }
}

/// Verify input `index` of `tx` against `prev_program`, the program of the
/// output (or account) it spends.
pub fn verify_input<L: LedgerModel>(
    tx: &Transaction,
    index: usize,
    prev_program: &[u8],
    age: Option<u64>,
) -> Result<(), HtlcError> {
    let input = tx
        .inputs
        .get(index)
        .ok_or(TransactionError::InputIndexOutOfBounds {
            index,
            len: tx.inputs.len(),
        })?;

    if input.sequence != SEQUENCE_FINAL {
        if let Some(age) = age {
            if age < input.sequence {
                return Err(ScriptError::ImmatureSpend {
                    age,
                    sequence: input.sequence,
                }
                .into());
            }
        }
    }

    match committed_digest(prev_program) {
        Some(digest) => {
            let (script, stack) = input
                .witness
                .split_last()
                .ok_or(ScriptError::EmptyWitness)?;
            if L::content_hash(script) != digest {
                return Err(ScriptError::ScriptHashMismatch.into());
            }
            let checker = InputChecker::<L>::new(tx, index, script);
            interpreter::verify(script, stack.to_vec(), &checker)?;
        }
        None => {
            let checker = InputChecker::<L>::new(tx, index, prev_program);
            interpreter::verify(prev_program, input.witness.clone(), &checker)?;
        }
    }
    Ok(())
}

/// Verify every input. `prev_programs[i]` is the program input `i` spends.
pub fn verify_transaction<L: LedgerModel>(
    tx: &Transaction,
    prev_programs: &[Vec<u8>],
    age: Option<u64>,
) -> Result<(), HtlcError> {
    if prev_programs.len() != tx.inputs.len() {
        return Err(HtlcError::InvalidParameter(format!(
            "{} spent programs for {} inputs",
            prev_programs.len(),
            tx.inputs.len()
        )));
    }
    for (index, program) in prev_programs.iter().enumerate() {
        verify_input::<L>(tx, index, program, age)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_keys::pair;
    use crate::ledger::{AccountLedger, UtxoLedger};
    use crate::lock::{Lock, LockParameters};
    use htlc_core::crypto::{KeyPair, sha256};
    use htlc_core::types::{AssetId, Hash256, InputSource, OutPoint, TxInput, TxOutput};

    fn spend_tx(value: u64, sequence: u64) -> Transaction {
        let mut input = TxInput::new(
            InputSource::Outpoint(OutPoint { txid: Hash256([0x33; 32]), index: 0 }),
            value,
        );
        input.sequence = sequence;
        Transaction {
            version: 2,
            inputs: vec![input],
            outputs: vec![TxOutput {
                value: value - 100,
                asset: AssetId(Hash256::ZERO),
                program: vec![0x51],
            }],
            lock_time: 0,
        }
    }

    fn lock<L: LedgerModel>(timeout: u64) -> (Lock<L>, KeyPair, KeyPair) {
        let recipient = pair(L::KEY_SCHEME, 1);
        let sender = pair(L::KEY_SCHEME, 2);
        let lock = Lock::<L>::build(LockParameters {
            secret_hash: sha256(b"secret").as_bytes().to_vec(),
            recipient_key: recipient.public_key(),
            sender_key: sender.public_key(),
            timeout,
        })
        .unwrap();
        (lock, recipient, sender)
    }

    fn sign<L: LedgerModel>(tx: &Transaction, script_code: &[u8], key: &KeyPair) -> Vec<u8> {
        let digest = signing_hash(tx, 0, script_code, L::content_hash).unwrap();
        key.sign(digest.as_bytes())
    }

    // --- Conservation ---

    #[test]
    fn conservation_holds() {
        assert!(check_conservation(&spend_tx(1_000, SEQUENCE_FINAL), 100).is_ok());
    }

    #[test]
    fn conservation_violated() {
        assert!(matches!(
            check_conservation(&spend_tx(1_000, SEQUENCE_FINAL), 99),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    // --- Obligations ---

    fn refund_obligation(tx: &Transaction, lock: &Lock<UtxoLedger>) -> SigningObligation {
        SigningObligation {
            input_index: 0,
            message_digest: signing_hash(tx, 0, lock.bytecode(), UtxoLedger::content_hash).unwrap(),
            required_key: lock.parameters().sender_key.clone(),
            derivation_hint: None,
            path: SpendPath::Refund,
            lock_bytecode: Some(lock.bytecode().to_vec()),
            sequence: tx.inputs[0].sequence,
        }
    }

    #[test]
    fn obligation_matches_its_transaction() {
        let (lock, _, _) = lock::<UtxoLedger>(10);
        let tx = spend_tx(10_000, 10);
        assert!(check_obligation::<UtxoLedger>(&tx, &refund_obligation(&tx, &lock)).is_ok());
    }

    #[test]
    fn obligation_for_missing_input_rejected() {
        let (lock, _, _) = lock::<UtxoLedger>(10);
        let tx = spend_tx(10_000, 10);
        let mut ob = refund_obligation(&tx, &lock);
        ob.input_index = 1;
        assert_eq!(
            check_obligation::<UtxoLedger>(&tx, &ob),
            Err(HtlcError::Transaction(TransactionError::InputIndexOutOfBounds {
                index: 1,
                len: 1
            }))
        );
    }

    #[test]
    fn obligation_sequence_must_match_input() {
        let (lock, _, _) = lock::<UtxoLedger>(10);
        let tx = spend_tx(10_000, 10);
        let mut ob = refund_obligation(&tx, &lock);
        ob.sequence = SEQUENCE_FINAL;
        assert!(matches!(
            check_obligation::<UtxoLedger>(&tx, &ob),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn obligation_digest_must_be_the_sighash() {
        let (lock, _, _) = lock::<UtxoLedger>(10);
        let tx = spend_tx(10_000, 10);
        let mut ob = refund_obligation(&tx, &lock);
        ob.message_digest = Hash256([0x5a; 32]);
        assert!(matches!(
            check_obligation::<UtxoLedger>(&tx, &ob),
            Err(HtlcError::InvalidParameter(_))
        ));

        // A digest computed with the other ledger's hash is just as foreign.
        let mut ob = refund_obligation(&tx, &lock);
        ob.message_digest =
            signing_hash(&tx, 0, lock.bytecode(), AccountLedger::content_hash).unwrap();
        assert!(check_obligation::<UtxoLedger>(&tx, &ob).is_err());
    }

    #[test]
    fn direct_obligation_uses_key_program() {
        let key = pair(UtxoLedger::KEY_SCHEME, 4);
        let tx = spend_tx(1_000, SEQUENCE_FINAL);
        let program = UtxoLedger::key_program(&key.public_key());
        let ob = SigningObligation {
            input_index: 0,
            message_digest: signing_hash(&tx, 0, &program, UtxoLedger::content_hash).unwrap(),
            required_key: key.public_key(),
            derivation_hint: None,
            path: SpendPath::Direct,
            lock_bytecode: None,
            sequence: SEQUENCE_FINAL,
        };
        assert!(check_obligation::<UtxoLedger>(&tx, &ob).is_ok());

        let mut other = ob.clone();
        other.required_key = pair(UtxoLedger::KEY_SCHEME, 5).public_key();
        assert!(check_obligation::<UtxoLedger>(&tx, &other).is_err());
    }

    #[test]
    fn lock_obligation_without_lock_rejected() {
        let (lock, _, _) = lock::<UtxoLedger>(10);
        let tx = spend_tx(10_000, 10);
        let mut ob = refund_obligation(&tx, &lock);
        ob.lock_bytecode = None;
        assert!(matches!(
            check_obligation::<UtxoLedger>(&tx, &ob),
            Err(HtlcError::MalformedLock(_))
        ));
    }

    // --- Key programs ---

    #[test]
    fn key_program_spend() {
        let key = pair(AccountLedger::KEY_SCHEME, 4);
        let program = AccountLedger::key_program(&key.public_key());
        let mut tx = spend_tx(1_000, SEQUENCE_FINAL);
        tx.inputs[0].witness = vec![sign::<AccountLedger>(&tx, &program, &key)];
        assert!(verify_input::<AccountLedger>(&tx, 0, &program, Some(0)).is_ok());
    }

    #[test]
    fn key_program_wrong_hash_function_fails() {
        let key = pair(UtxoLedger::KEY_SCHEME, 4);
        let program = UtxoLedger::key_program(&key.public_key());
        let mut tx = spend_tx(1_000, SEQUENCE_FINAL);
        // Signed over the SHA3 sighash, verified over the SHA-256 one.
        let digest = signing_hash(&tx, 0, &program, htlc_core::crypto::sha3_256).unwrap();
        tx.inputs[0].witness = vec![key.sign(digest.as_bytes())];
        assert!(verify_input::<UtxoLedger>(&tx, 0, &program, None).is_err());
    }

    // --- Lock spends ---

    fn claim_case<L: LedgerModel>() {
        let (lock, recipient, _) = lock::<L>(50);
        let mut tx = spend_tx(10_000, SEQUENCE_FINAL);
        let sig = sign::<L>(&tx, lock.bytecode(), &recipient);
        tx.inputs[0].witness = L::claim_witness(b"secret", sig.clone(), lock.bytecode());
        assert!(verify_input::<L>(&tx, 0, &lock.program(), Some(0)).is_ok());

        tx.inputs[0].witness = L::claim_witness(b"wrong", sig, lock.bytecode());
        assert!(verify_input::<L>(&tx, 0, &lock.program(), Some(0)).is_err());
    }

    #[test]
    fn claim_branch_both_shapes() {
        claim_case::<UtxoLedger>();
        claim_case::<AccountLedger>();
    }

    fn refund_case<L: LedgerModel>() {
        let (lock, _, sender) = lock::<L>(50);
        let mut tx = spend_tx(10_000, 50);
        let sig = sign::<L>(&tx, lock.bytecode(), &sender);
        tx.inputs[0].witness = L::refund_witness(sig, lock.bytecode());

        assert!(verify_input::<L>(&tx, 0, &lock.program(), Some(50)).is_ok());
        assert!(verify_input::<L>(&tx, 0, &lock.program(), None).is_ok());
        assert_eq!(
            verify_input::<L>(&tx, 0, &lock.program(), Some(49)),
            Err(HtlcError::Script(ScriptError::ImmatureSpend { age: 49, sequence: 50 }))
        );
    }

    #[test]
    fn refund_branch_both_shapes() {
        refund_case::<UtxoLedger>();
        refund_case::<AccountLedger>();
    }

    #[test]
    fn refund_with_final_sequence_fails_csv() {
        let (lock, _, sender) = lock::<UtxoLedger>(50);
        let mut tx = spend_tx(10_000, SEQUENCE_FINAL);
        let sig = sign::<UtxoLedger>(&tx, lock.bytecode(), &sender);
        tx.inputs[0].witness = UtxoLedger::refund_witness(sig, lock.bytecode());
        assert_eq!(
            verify_input::<UtxoLedger>(&tx, 0, &lock.program(), Some(1_000)),
            Err(HtlcError::Script(ScriptError::UnsatisfiedLocktime { required: 50 }))
        );
    }

    #[test]
    fn refund_with_short_sequence_fails_csv() {
        let (lock, _, sender) = lock::<AccountLedger>(50);
        let mut tx = spend_tx(10_000, 49);
        let sig = sign::<AccountLedger>(&tx, lock.bytecode(), &sender);
        tx.inputs[0].witness = AccountLedger::refund_witness(sig, lock.bytecode());
        assert!(verify_input::<AccountLedger>(&tx, 0, &lock.program(), None).is_err());
    }

    #[test]
    fn recipient_cannot_refund() {
        let (lock, recipient, _) = lock::<UtxoLedger>(10);
        let mut tx = spend_tx(10_000, 10);
        let sig = sign::<UtxoLedger>(&tx, lock.bytecode(), &recipient);
        tx.inputs[0].witness = UtxoLedger::refund_witness(sig, lock.bytecode());
        assert_eq!(
            verify_input::<UtxoLedger>(&tx, 0, &lock.program(), Some(10)),
            Err(HtlcError::Script(ScriptError::EvalFalse))
        );
    }

    #[test]
    fn substituted_lock_rejected() {
        let (funded, recipient, _) = lock::<UtxoLedger>(10);
        let (other, _, _) = lock::<UtxoLedger>(11);
        let mut tx = spend_tx(10_000, SEQUENCE_FINAL);
        let sig = sign::<UtxoLedger>(&tx, other.bytecode(), &recipient);
        tx.inputs[0].witness = UtxoLedger::claim_witness(b"secret", sig, other.bytecode());
        assert_eq!(
            verify_input::<UtxoLedger>(&tx, 0, &funded.program(), None),
            Err(HtlcError::Script(ScriptError::ScriptHashMismatch))
        );
    }

    #[test]
    fn empty_witness_on_lock() {
        let (lock, _, _) = lock::<AccountLedger>(10);
        let tx = spend_tx(10_000, SEQUENCE_FINAL);
        assert_eq!(
            verify_input::<AccountLedger>(&tx, 0, &lock.program(), None),
            Err(HtlcError::Script(ScriptError::EmptyWitness))
        );
    }

    #[test]
    fn verify_transaction_requires_matching_programs() {
        let tx = spend_tx(1_000, SEQUENCE_FINAL);
        assert!(matches!(
            verify_transaction::<UtxoLedger>(&tx, &[], None),
            Err(HtlcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn out_of_bounds_input() {
        let tx = spend_tx(1_000, SEQUENCE_FINAL);
        assert_eq!(
            verify_input::<UtxoLedger>(&tx, 3, &[], None),
            Err(HtlcError::Transaction(TransactionError::InputIndexOutOfBounds {
                index: 3,
                len: 1
            }))
        );
    }
}
