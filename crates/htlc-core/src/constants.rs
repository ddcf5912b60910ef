//! Protocol constants shared by every ledger adapter.

/// Transaction format version emitted by the assembler unless configured otherwise.
pub const TX_VERSION: u64 = 2;

/// Input sequence that disables relative-lock evaluation.
pub const SEQUENCE_FINAL: u64 = 0xFFFF_FFFF;

/// Length of a hash-lock commitment (SHA-256 digest).
pub const SECRET_HASH_LEN: usize = 32;

/// Ed25519 public key length.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Compressed SEC1 secp256k1 public key length.
pub const SECP256K1_PUBLIC_KEY_LEN: usize = 33;

/// Both supported schemes produce fixed 64-byte signatures.
pub const SIGNATURE_LEN: usize = 64;

/// Largest element the evaluator will push.
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Upper bound on the decoded size of a transaction or unsigned envelope body.
pub const MAX_TX_BYTES: usize = 1 << 20;

/// Locator payload version (witness version 0 style).
pub const LOCATOR_VERSION: u8 = 0;

/// Human-readable prefixes per ledger: `(ledger, mainnet, testnet)`.
pub const LEDGER_HRPS: &[(&str, &str, &str)] = &[
    ("utxo", "ut", "tut"),
    ("account", "ac", "tac"),
    ("sidechain", "sc", "tsc"),
];
