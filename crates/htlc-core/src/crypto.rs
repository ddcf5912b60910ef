//! Hash functions, key schemes and transaction signing hashes.
//!
//! Two signature schemes are supported:
//! - **Ed25519** (ed25519-dalek), 32-byte public keys
//! - **secp256k1 ECDSA** (k256, RFC 6979 deterministic nonces), 33-byte
//!   compressed SEC1 public keys
//!
//! Both produce fixed 64-byte signatures and both are deterministic, so
//! signing the same digest twice yields identical bytes.
//!
//! # Signing scheme
//!
//! Each input is signed over a **sighash** that commits to:
//! - Transaction version and lock_time
//! - Every input's source, value and sequence
//! - Every output (value, asset, program)
//! - The index of the input being signed and its script code
//!
//! Witnesses are excluded from the sighash so inputs can be signed in any
//! order and witnesses applied afterwards.

use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use std::fmt;

use crate::constants::{ED25519_PUBLIC_KEY_LEN, SECP256K1_PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::{CryptoError, DataError, TransactionError};
use crate::traits::DigestSigner;
use crate::types::{Hash256, InputSource, Transaction};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash256 {
    Hash256(Sha256::digest(data).into())
}

/// SHA3-256 of `data`.
pub fn sha3_256(data: &[u8]) -> Hash256 {
    Hash256(Sha3_256::digest(data).into())
}

/// Signature scheme used by a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    Ed25519,
    Secp256k1,
}

impl KeyScheme {
    /// Encoded public key length for this scheme.
    pub const fn public_key_len(self) -> usize {
        match self {
            KeyScheme::Ed25519 => ED25519_PUBLIC_KEY_LEN,
            KeyScheme::Secp256k1 => SECP256K1_PUBLIC_KEY_LEN,
        }
    }

    /// Check that `bytes` is a well-formed public key for this scheme.
    pub fn validate_public_key(self, bytes: &[u8]) -> Result<(), CryptoError> {
        match self {
            KeyScheme::Ed25519 => ed25519_verifying_key(bytes).map(|_| ()),
            KeyScheme::Secp256k1 => secp256k1_verifying_key(bytes).map(|_| ()),
        }
    }

    /// Verify a 64-byte signature over `message` under `public_key`.
    pub fn verify(
        self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(CryptoError::InvalidSignature);
        }
        match self {
            KeyScheme::Ed25519 => {
                let vk = ed25519_verifying_key(public_key)?;
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            KeyScheme::Secp256k1 => {
                let vk = secp256k1_verifying_key(public_key)?;
                let sig = k256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
        }
    }
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyScheme::Ed25519 => write!(f, "ed25519"),
            KeyScheme::Secp256k1 => write!(f, "secp256k1"),
        }
    }
}

fn ed25519_verifying_key(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    let arr: [u8; ED25519_PUBLIC_KEY_LEN] =
        bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
    ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)
}

fn secp256k1_verifying_key(bytes: &[u8]) -> Result<k256::ecdsa::VerifyingKey, CryptoError> {
    // Only the compressed form is canonical.
    if bytes.len() != SECP256K1_PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidPublicKey);
    }
    k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Signing keypair for either supported scheme.
///
/// Secret material is zeroized on drop by the underlying libraries.
#[derive(Clone)]
pub enum KeyPair {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate(scheme: KeyScheme) -> Self {
        let mut csprng = rand::rngs::OsRng;
        match scheme {
            KeyScheme::Ed25519 => {
                KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut csprng))
            }
            KeyScheme::Secp256k1 => {
                KeyPair::Secp256k1(k256::ecdsa::SigningKey::random(&mut csprng))
            }
        }
    }

    /// Create a keypair from 32-byte secret key material.
    ///
    /// Fails for secp256k1 when the bytes are zero or not below the curve order.
    pub fn from_secret_bytes(scheme: KeyScheme, bytes: [u8; 32]) -> Result<Self, CryptoError> {
        match scheme {
            KeyScheme::Ed25519 => Ok(KeyPair::Ed25519(ed25519_dalek::SigningKey::from_bytes(
                &bytes,
            ))),
            KeyScheme::Secp256k1 => k256::ecdsa::SigningKey::from_bytes((&bytes).into())
                .map(KeyPair::Secp256k1)
                .map_err(|_| CryptoError::InvalidSecretKey),
        }
    }

    /// The scheme this keypair signs with.
    pub fn scheme(&self) -> KeyScheme {
        match self {
            KeyPair::Ed25519(_) => KeyScheme::Ed25519,
            KeyPair::Secp256k1(_) => KeyScheme::Secp256k1,
        }
    }

    /// Encoded public key (32 bytes Ed25519, 33 bytes compressed secp256k1).
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            KeyPair::Ed25519(sk) => sk.verifying_key().to_bytes().to_vec(),
            // SEC1 output of a verifying key is the 33-byte compressed form.
            KeyPair::Secp256k1(sk) => sk.verifying_key().to_sec1_bytes().to_vec(),
        }
    }

    /// Sign a message, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            KeyPair::Ed25519(sk) => sk.sign(message).to_bytes().to_vec(),
            KeyPair::Secp256k1(sk) => {
                let sig: k256::ecdsa::Signature = sk.sign(message);
                sig.to_bytes().to_vec()
            }
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("scheme", &self.scheme())
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl DigestSigner for KeyPair {
    fn scheme(&self) -> KeyScheme {
        KeyPair::scheme(self)
    }

    fn public_key(&self) -> Vec<u8> {
        KeyPair::public_key(self)
    }

    fn sign_digest(&self, digest: &Hash256) -> Result<Vec<u8>, DataError> {
        Ok(self.sign(digest.as_bytes()))
    }
}

/// Compute the signing hash (sighash) for one input.
///
/// `script_code` is the program the input satisfies: the lock bytecode for
/// lock spends, the key program for direct spends. `hash` is the ledger's
/// content hash.
pub fn signing_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    hash: fn(&[u8]) -> Hash256,
) -> Result<Hash256, TransactionError> {
    if input_index >= tx.inputs.len() {
        return Err(TransactionError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = Vec::new();

    // Version
    data.extend_from_slice(&tx.version.to_le_bytes());

    // All inputs (no witnesses)
    data.extend_from_slice(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        match &input.source {
            InputSource::Outpoint(op) => {
                data.push(0);
                data.extend_from_slice(op.txid.as_bytes());
                data.extend_from_slice(&op.index.to_le_bytes());
            }
            InputSource::Account { public_key, nonce } => {
                data.push(1);
                data.extend_from_slice(&(public_key.len() as u64).to_le_bytes());
                data.extend_from_slice(public_key);
                data.extend_from_slice(&nonce.to_le_bytes());
            }
        }
        data.extend_from_slice(&input.value.to_le_bytes());
        data.extend_from_slice(&input.sequence.to_le_bytes());
    }

    // All outputs
    data.extend_from_slice(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        data.extend_from_slice(output.asset.0.as_bytes());
        data.extend_from_slice(&(output.program.len() as u64).to_le_bytes());
        data.extend_from_slice(&output.program);
    }

    // Lock time
    data.extend_from_slice(&tx.lock_time.to_le_bytes());

    // Input index and the program it satisfies
    data.extend_from_slice(&(input_index as u64).to_le_bytes());
    data.extend_from_slice(&(script_code.len() as u64).to_le_bytes());
    data.extend_from_slice(script_code);

    Ok(hash(&data))
}
