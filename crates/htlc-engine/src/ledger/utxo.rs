//! UTXO-style ledger: secp256k1 keys, coin inputs, inline branch lock.
//!
//! Lock layout:
//!
//! ```text
//! OP_IF
//!     <recipient_key> OP_CHECKSIGVERIFY OP_SHA256 <secret_hash> OP_EQUAL
//! OP_ELSE
//!     <timeout> OP_CHECKSEQUENCEVERIFY OP_DROP <sender_key> OP_CHECKSIG
//! OP_ENDIF
//! ```

use htlc_core::crypto::{KeyScheme, sha256};
use htlc_core::script::{Instruction, Opcode, ScriptBuilder, parse};
use htlc_core::types::{AssetId, Hash256};

use super::{FeeModel, LedgerModel};
use crate::error::HtlcError;
use crate::lock::LockParameters;

/// Relative timeouts are carried in a 16-bit sequence field.
const UTXO_MAX_TIMEOUT: u64 = 0xFFFF;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtxoLedger;

impl LedgerModel for UtxoLedger {
    const NAME: &'static str = "utxo";
    const KEY_SCHEME: KeyScheme = KeyScheme::Secp256k1;
    const FEE_MODEL: FeeModel = FeeModel::Utxo;
    const NATIVE_ASSET: AssetId = AssetId(Hash256::ZERO);
    const MAX_TIMEOUT: u64 = UTXO_MAX_TIMEOUT;

    fn content_hash(data: &[u8]) -> Hash256 {
        sha256(data)
    }

    fn encode_lock(params: &LockParameters) -> Vec<u8> {
        ScriptBuilder::new()
            .push_opcode(Opcode::If)
            .push_slice(&params.recipient_key)
            .push_opcode(Opcode::CheckSigVerify)
            .push_opcode(Opcode::Sha256)
            .push_slice(&params.secret_hash)
            .push_opcode(Opcode::Equal)
            .push_opcode(Opcode::Else)
            .push_int(params.timeout as i64)
            .push_opcode(Opcode::CheckSequenceVerify)
            .push_opcode(Opcode::Drop)
            .push_slice(&params.sender_key)
            .push_opcode(Opcode::CheckSig)
            .push_opcode(Opcode::EndIf)
            .into_bytes()
    }

    fn extract_lock(bytecode: &[u8]) -> Result<LockParameters, HtlcError> {
        let ins = parse(bytecode).map_err(|e| HtlcError::MalformedLock(e.to_string()))?;
        let [
            Instruction::Op(Opcode::If),
            Instruction::Push(recipient_key),
            Instruction::Op(Opcode::CheckSigVerify),
            Instruction::Op(Opcode::Sha256),
            Instruction::Push(secret_hash),
            Instruction::Op(Opcode::Equal),
            Instruction::Op(Opcode::Else),
            timeout,
            Instruction::Op(Opcode::CheckSequenceVerify),
            Instruction::Op(Opcode::Drop),
            Instruction::Push(sender_key),
            Instruction::Op(Opcode::CheckSig),
            Instruction::Op(Opcode::EndIf),
        ] = ins.as_slice()
        else {
            return Err(HtlcError::MalformedLock(format!(
                "not an inline lock ({} instructions)",
                ins.len()
            )));
        };

        let timeout = timeout
            .as_num(5)
            .map_err(|e| HtlcError::MalformedLock(format!("timeout: {e}")))?;
        let timeout = u64::try_from(timeout)
            .map_err(|_| HtlcError::MalformedLock("negative timeout".into()))?;

        Ok(LockParameters {
            secret_hash: secret_hash.clone(),
            recipient_key: recipient_key.clone(),
            sender_key: sender_key.clone(),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_keys::pair;
    use htlc_core::script::disassemble;

    fn params() -> LockParameters {
        LockParameters {
            secret_hash: sha256(b"Hello Meheret!").as_bytes().to_vec(),
            recipient_key: pair(KeyScheme::Secp256k1, 1).public_key(),
            sender_key: pair(KeyScheme::Secp256k1, 2).public_key(),
            timeout: 1000,
        }
    }

    #[test]
    fn layout_starts_with_if() {
        let code = UtxoLedger::encode_lock(&params());
        assert_eq!(code[0], Opcode::If as u8);
        assert_eq!(*code.last().unwrap(), Opcode::EndIf as u8);
        // 1 + 34 + 1 + 1 + 33 + 1 + 1 + 3 + 1 + 1 + 34 + 1 + 1
        assert_eq!(code.len(), 113);
    }

    #[test]
    fn disassembly_names_branches() {
        let text = disassemble(&UtxoLedger::encode_lock(&params())).unwrap();
        assert!(text.starts_with("OP_IF "));
        assert!(text.contains("OP_CHECKSIGVERIFY OP_SHA256"));
        assert!(text.contains("e803 OP_CHECKSEQUENCEVERIFY OP_DROP"));
        assert!(text.ends_with("OP_CHECKSIG OP_ENDIF"));
    }

    #[test]
    fn decode_roundtrip() {
        let p = params();
        assert_eq!(UtxoLedger::decode_lock(&UtxoLedger::encode_lock(&p)).unwrap(), p);
    }

    #[test]
    fn small_timeout_uses_opcode() {
        let mut p = params();
        p.timeout = 5;
        let code = UtxoLedger::encode_lock(&p);
        assert_eq!(UtxoLedger::decode_lock(&code).unwrap().timeout, 5);
    }

    #[test]
    fn decode_rejects_trailing_opcode() {
        let mut code = UtxoLedger::encode_lock(&params());
        code.push(Opcode::Drop as u8);
        assert!(matches!(UtxoLedger::decode_lock(&code), Err(HtlcError::MalformedLock(_))));
    }

    #[test]
    fn decode_rejects_swapped_opcode() {
        let mut code = UtxoLedger::encode_lock(&params());
        // CHECKSIGVERIFY right after the recipient key becomes CHECKSIG.
        code[35] = Opcode::CheckSig as u8;
        assert!(matches!(UtxoLedger::decode_lock(&code), Err(HtlcError::MalformedLock(_))));
    }

    #[test]
    fn decode_rejects_invalid_key() {
        let mut p = params();
        p.sender_key = vec![0x05; 33];
        let code = UtxoLedger::encode_lock(&p);
        assert!(matches!(UtxoLedger::decode_lock(&code), Err(HtlcError::MalformedLock(_))));
    }

    #[test]
    fn decode_rejects_oversized_timeout() {
        let mut p = params();
        p.timeout = UTXO_MAX_TIMEOUT + 1;
        let code = UtxoLedger::encode_lock(&p);
        assert!(matches!(UtxoLedger::decode_lock(&code), Err(HtlcError::MalformedLock(_))));
    }

    #[test]
    fn decode_rejects_account_layout() {
        let code = vec![Opcode::Depth as u8, Opcode::Op6 as u8];
        assert!(matches!(UtxoLedger::decode_lock(&code), Err(HtlcError::MalformedLock(_))));
    }
}
