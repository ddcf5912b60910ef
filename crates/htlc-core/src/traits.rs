//! Interfaces to the collaborators the engine consumes but never implements.
//!
//! - [`SpendableSource`]: balances, coins and account nonces (chain index)
//! - [`LockResolver`]: looks up the output a claim or refund spends
//! - [`DigestSigner`]: key custody, signs precomputed digests
//! - [`AddressEncoder`]: renders a lock digest as a ledger locator
//!
//! Implementations are expected to bound their own I/O with a timeout and
//! report failures as [`DataError`]. The engine propagates those failures and
//! never retries.

use crate::address::Network;
use crate::crypto::KeyScheme;
use crate::error::{AddressError, DataError};
use crate::types::{AssetId, Hash256, OutPoint};

/// An owned coin available for funding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendableUtxo {
    pub outpoint: OutPoint,
    pub value: u64,
    pub asset: AssetId,
}

/// What a funding key can spend right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Spendable {
    /// UTXO ledgers: the unspent coins owned by the key.
    Utxos(Vec<SpendableUtxo>),
    /// Account ledgers: the balance and the next nonce to use.
    Account { balance: u64, nonce: u64 },
}

impl Spendable {
    /// Total spendable amount, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        match self {
            Spendable::Utxos(coins) => coins
                .iter()
                .try_fold(0u64, |acc, c| acc.checked_add(c.value)),
            Spendable::Account { balance, .. } => Some(*balance),
        }
    }
}

/// Balance and coin lookups for a funding key.
pub trait SpendableSource {
    /// Spendable holdings of `public_key` in `asset`.
    fn spendable(&self, public_key: &[u8], asset: &AssetId) -> Result<Spendable, DataError>;
}

/// A resolved lock output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockOutput {
    /// Locator of the lock the output pays to.
    pub locator: String,
    pub amount: u64,
    pub asset: AssetId,
}

/// Finds the output a claim or refund transaction spends.
pub trait LockResolver {
    /// Resolve `prior`. `Ok(None)` when no such output exists (or it is spent).
    fn find_lock_output(&self, prior: &OutPoint) -> Result<Option<LockOutput>, DataError>;
}

/// Signs 32-byte message digests with custody-held key material.
///
/// The engine never sees the secret key.
pub trait DigestSigner {
    /// Scheme of the held key.
    fn scheme(&self) -> KeyScheme;

    /// Encoded public key of the held key.
    fn public_key(&self) -> Vec<u8>;

    /// Sign `digest`, returning the raw signature bytes.
    fn sign_digest(&self, digest: &Hash256) -> Result<Vec<u8>, DataError>;
}

/// Renders lock digests as ledger locators.
pub trait AddressEncoder {
    fn encode(&self, digest: &Hash256, ledger: &str, network: Network)
    -> Result<String, AddressError>;
}
