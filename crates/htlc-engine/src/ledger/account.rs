//! Account-style ledgers: Ed25519 keys, nonce-ordered debits, parameters-first lock.
//!
//! The lock pushes its parameters first and then runs a fixed program over
//! them, so the parameters occupy a fixed prefix of the bytecode:
//!
//! ```text
//! <timeout> <sender_key> <recipient_key> <secret_hash>
//! OP_DEPTH OP_6 OP_GREATERTHANOREQUAL OP_VERIFY
//! OP_4 OP_ROLL
//! OP_IF
//!     OP_5 OP_ROLL OP_SHA256 OP_EQUALVERIFY
//!     OP_3 OP_ROLL OP_SWAP OP_CHECKSIGVERIFY OP_2DROP OP_1
//! OP_ELSE
//!     OP_2DROP OP_SWAP OP_CHECKSEQUENCEVERIFY OP_DROP OP_CHECKSIG
//! OP_ENDIF
//! ```

use htlc_core::crypto::{KeyScheme, sha3_256};
use htlc_core::script::{Instruction, Opcode, ScriptBuilder, parse};
use htlc_core::types::{AssetId, Hash256};

use super::{FeeModel, LedgerModel};
use crate::error::HtlcError;
use crate::lock::LockParameters;

const ACCOUNT_MAX_TIMEOUT: u64 = 0x7FFF_FFFF;

const ACCOUNT_NATIVE_ASSET: AssetId = AssetId(Hash256([0xff; 32]));

const PROGRAM: [Opcode; 24] = [
    Opcode::Depth,
    Opcode::Op6,
    Opcode::GreaterThanOrEqual,
    Opcode::Verify,
    Opcode::Op4,
    Opcode::Roll,
    Opcode::If,
    Opcode::Op5,
    Opcode::Roll,
    Opcode::Sha256,
    Opcode::EqualVerify,
    Opcode::Op3,
    Opcode::Roll,
    Opcode::Swap,
    Opcode::CheckSigVerify,
    Opcode::TwoDrop,
    Opcode::Op1,
    Opcode::Else,
    Opcode::TwoDrop,
    Opcode::Swap,
    Opcode::CheckSequenceVerify,
    Opcode::Drop,
    Opcode::CheckSig,
    Opcode::EndIf,
];

fn encode_parameters_first(params: &LockParameters) -> Vec<u8> {
    PROGRAM.iter().fold(
        ScriptBuilder::new()
            .push_int(params.timeout as i64)
            .push_slice(&params.sender_key)
            .push_slice(&params.recipient_key)
            .push_slice(&params.secret_hash),
        |b, op| b.push_opcode(*op),
    )
    .into_bytes()
}

fn extract_parameters_first(bytecode: &[u8]) -> Result<LockParameters, HtlcError> {
    let ins = parse(bytecode).map_err(|e| HtlcError::MalformedLock(e.to_string()))?;
    let [
        timeout,
        Instruction::Push(sender_key),
        Instruction::Push(recipient_key),
        Instruction::Push(secret_hash),
        program @ ..,
    ] = ins.as_slice()
    else {
        return Err(HtlcError::MalformedLock("missing parameter pushes".into()));
    };

    let expected = PROGRAM.iter().map(|op| Instruction::Op(*op));
    if !program.iter().cloned().eq(expected) {
        return Err(HtlcError::MalformedLock("unexpected lock program".into()));
    }

    let timeout = timeout
        .as_num(5)
        .map_err(|e| HtlcError::MalformedLock(format!("timeout: {e}")))?;
    let timeout =
        u64::try_from(timeout).map_err(|_| HtlcError::MalformedLock("negative timeout".into()))?;

    Ok(LockParameters {
        secret_hash: secret_hash.clone(),
        recipient_key: recipient_key.clone(),
        sender_key: sender_key.clone(),
        timeout,
    })
}

/// Primary account ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountLedger;

impl LedgerModel for AccountLedger {
    const NAME: &'static str = "account";
    const KEY_SCHEME: KeyScheme = KeyScheme::Ed25519;
    const FEE_MODEL: FeeModel = FeeModel::Account;
    const NATIVE_ASSET: AssetId = ACCOUNT_NATIVE_ASSET;
    const MAX_TIMEOUT: u64 = ACCOUNT_MAX_TIMEOUT;

    fn content_hash(data: &[u8]) -> Hash256 {
        sha3_256(data)
    }

    fn encode_lock(params: &LockParameters) -> Vec<u8> {
        encode_parameters_first(params)
    }

    fn extract_lock(bytecode: &[u8]) -> Result<LockParameters, HtlcError> {
        extract_parameters_first(bytecode)
    }
}

/// Sidechain of the account ledger. Same rules, separate locator namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SidechainLedger;

impl LedgerModel for SidechainLedger {
    const NAME: &'static str = "sidechain";
    const KEY_SCHEME: KeyScheme = KeyScheme::Ed25519;
    const FEE_MODEL: FeeModel = FeeModel::Account;
    const NATIVE_ASSET: AssetId = ACCOUNT_NATIVE_ASSET;
    const MAX_TIMEOUT: u64 = ACCOUNT_MAX_TIMEOUT;

    fn content_hash(data: &[u8]) -> Hash256 {
        sha3_256(data)
    }

    fn encode_lock(params: &LockParameters) -> Vec<u8> {
        encode_parameters_first(params)
    }

    fn extract_lock(bytecode: &[u8]) -> Result<LockParameters, HtlcError> {
        extract_parameters_first(bytecode)
    }
}
