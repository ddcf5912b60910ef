//! Error types for the HTLC core primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("value overflow")] ValueOverflow,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid secret key bytes")] InvalidSecretKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("truncated push at offset {0}")] TruncatedPush(usize),
    #[error("non-minimal push at offset {0}")] NonMinimalPush(usize),
    #[error("unsupported opcode 0x{0:02x}")] UnsupportedOpcode(u8),
    #[error("stack underflow")] StackUnderflow,
    #[error("element of {0} bytes exceeds the push limit")] PushSize(usize),
    #[error("invalid number encoding")] InvalidNumber,
    #[error("unbalanced conditional")] UnbalancedConditional,
    #[error("branch selector must be empty or 0x01")] NonMinimalIf,
    #[error("verify failed")] VerifyFailed,
    #[error("equalverify failed")] EqualVerifyFailed,
    #[error("checksigverify failed")] CheckSigVerifyFailed,
    #[error("relative lock not satisfied: requires {required}")] UnsatisfiedLocktime { required: i64 },
    #[error("spend not mature: age {age} < sequence {sequence}")] ImmatureSpend { age: u64, sequence: u64 },
    #[error("script digest does not match committed program")] ScriptHashMismatch,
    #[error("empty witness")] EmptyWitness,
    #[error("script evaluated to false")] EvalFalse,
    #[error("stack not clean after execution: {0} items")] CleanStack(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown ledger: {0}")] UnknownLedger(String),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
}

/// Failure reported by an external data collaborator (chain index, signer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("timed out after {millis} ms")] Timeout { millis: u64 },
    #[error("unavailable: {0}")] Unavailable(String),
}
