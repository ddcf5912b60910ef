//! Shared helpers for the end-to-end and property tests.

use std::collections::HashMap;
use std::marker::PhantomData;

use htlc_core::address::{Bech32Encoder, Network};
use htlc_core::crypto::{KeyPair, KeyScheme};
use htlc_core::error::DataError;
use htlc_core::traits::{
    AddressEncoder, LockOutput, LockResolver, Spendable, SpendableSource, SpendableUtxo,
};
use htlc_core::types::{AssetId, Hash256, InputSource, OutPoint, Transaction, TxOutput};
use htlc_engine::ledger::{FeeModel, LedgerModel, committed_digest};
use htlc_engine::validation::verify_input;
use htlc_engine::{EngineConfig, HtlcError, TransactionAssembler};
use thiserror::Error;

/// Secret used throughout the swap scenarios.
pub const SECRET: &[u8] = b"Hello Meheret!";

/// Deterministic keypair from a seed byte (seed must be non-zero).
pub fn key(scheme: KeyScheme, seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes(scheme, [seed; 32]).unwrap()
}

/// Why [`MemoryLedger::apply`] refused a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("input {0} spends an unknown output")]
    MissingInput(usize),
    #[error("input {index} does not satisfy its program: {source}")]
    Script { index: usize, source: HtlcError },
    #[error("account debit of input {0} exceeds the balance")]
    Overdraft(usize),
    #[error("input {index} uses nonce {found}, expected {expected}")]
    BadNonce { index: usize, expected: u64, found: u64 },
    #[error("outputs exceed inputs")]
    Inflation,
}

#[derive(Clone, Debug)]
struct Entry {
    output: TxOutput,
    height: u64,
}

/// An in-memory ledger of kind `L`.
///
/// Tracks unspent outputs (with the height that created them) and account
/// balances. Applying a transaction runs every input through the spend
/// evaluator with its real age, so refunds before the timeout are rejected
/// the way a live chain would reject them.
pub struct MemoryLedger<L: LedgerModel> {
    network: Network,
    height: u64,
    outputs: HashMap<OutPoint, Entry>,
    accounts: HashMap<Vec<u8>, (u64, u64)>,
    mints: u64,
    _ledger: PhantomData<L>,
}

impl<L: LedgerModel> MemoryLedger<L> {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            height: 0,
            outputs: HashMap::new(),
            accounts: HashMap::new(),
            mints: 0,
            _ledger: PhantomData,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Advance the chain by `blocks`.
    pub fn mine(&mut self, blocks: u64) {
        self.height += blocks;
    }

    /// Give `public_key` a native coin (UTXO ledgers) or balance (account ledgers).
    pub fn credit(&mut self, public_key: &[u8], value: u64) {
        match L::FEE_MODEL {
            FeeModel::Utxo => {
                self.mints += 1;
                let outpoint = OutPoint {
                    txid: Hash256::from_bytes(mint_id(self.mints)),
                    index: 0,
                };
                self.outputs.insert(
                    outpoint,
                    Entry {
                        output: TxOutput {
                            value,
                            asset: L::NATIVE_ASSET,
                            program: L::key_program(public_key),
                        },
                        height: self.height,
                    },
                );
            }
            FeeModel::Account => {
                self.accounts.entry(public_key.to_vec()).or_insert((0, 0)).0 += value;
            }
        }
    }

    /// Spendable native value held by `public_key`.
    pub fn balance(&self, public_key: &[u8]) -> u64 {
        let program = L::key_program(public_key);
        let coins: u64 = self
            .outputs
            .values()
            .filter(|e| e.output.program == program)
            .map(|e| e.output.value)
            .sum();
        coins + self.accounts.get(public_key).map_or(0, |(b, _)| *b)
    }

    pub fn nonce(&self, public_key: &[u8]) -> u64 {
        self.accounts.get(public_key).map_or(0, |(_, n)| *n)
    }

    pub fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.outputs.contains_key(outpoint)
    }

    pub fn assembler<'a>(&'a self, config: &'a EngineConfig) -> TransactionAssembler<'a, L> {
        TransactionAssembler::new(config, self, self, &Bech32Encoder)
    }

    /// Validate and apply `tx` at the current height. Returns its txid.
    pub fn apply(&mut self, tx: &Transaction) -> Result<Hash256, Rejection> {
        let total_in = tx.total_input_value().ok_or(Rejection::Inflation)?;
        let total_out = tx.total_output_value().ok_or(Rejection::Inflation)?;
        if total_out > total_in {
            return Err(Rejection::Inflation);
        }

        for (index, input) in tx.inputs.iter().enumerate() {
            let script_err = |source| Rejection::Script { index, source };
            match &input.source {
                InputSource::Outpoint(op) => {
                    let entry = self.outputs.get(op).ok_or(Rejection::MissingInput(index))?;
                    if entry.output.value != input.value {
                        return Err(Rejection::MissingInput(index));
                    }
                    let age = self.height - entry.height;
                    verify_input::<L>(tx, index, &entry.output.program, Some(age))
                        .map_err(script_err)?;
                }
                InputSource::Account { public_key, nonce } => {
                    let (balance, expected) =
                        self.accounts.get(public_key).copied().unwrap_or((0, 0));
                    if *nonce != expected {
                        return Err(Rejection::BadNonce { index, expected, found: *nonce });
                    }
                    if balance < input.value {
                        return Err(Rejection::Overdraft(index));
                    }
                    verify_input::<L>(tx, index, &L::key_program(public_key), None)
                        .map_err(script_err)?;
                }
            }
        }

        let txid = tx.txid().map_err(|e| Rejection::Script {
            index: 0,
            source: e.into(),
        })?;

        for input in &tx.inputs {
            match &input.source {
                InputSource::Outpoint(op) => {
                    self.outputs.remove(op);
                }
                InputSource::Account { public_key, .. } => {
                    let account = self.accounts.entry(public_key.clone()).or_insert((0, 0));
                    account.0 -= input.value;
                    account.1 += 1;
                }
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            if L::FEE_MODEL == FeeModel::Account {
                if let Some(owner) = key_owner::<L>(&output.program) {
                    if output.asset == L::NATIVE_ASSET {
                        self.accounts.entry(owner).or_insert((0, 0)).0 += output.value;
                        continue;
                    }
                }
            }
            self.outputs.insert(
                OutPoint { txid, index: index as u64 },
                Entry { output: output.clone(), height: self.height },
            );
        }
        Ok(txid)
    }
}

fn mint_id(n: u64) -> [u8; 32] {
    let mut id = [0xee; 32];
    id[..8].copy_from_slice(&n.to_le_bytes());
    id
}

/// Recover the key of a `<pk> OP_CHECKSIG` program.
fn key_owner<L: LedgerModel>(program: &[u8]) -> Option<Vec<u8>> {
    if program.len() < 3 {
        return None;
    }
    let candidate = program[1..program.len() - 1].to_vec();
    (L::key_program(&candidate) == program).then_some(candidate)
}

impl<L: LedgerModel> SpendableSource for MemoryLedger<L> {
    fn spendable(&self, public_key: &[u8], asset: &AssetId) -> Result<Spendable, DataError> {
        match L::FEE_MODEL {
            FeeModel::Utxo => {
                let program = L::key_program(public_key);
                let coins = self
                    .outputs
                    .iter()
                    .filter(|(_, e)| e.output.program == program && e.output.asset == *asset)
                    .map(|(op, e)| SpendableUtxo {
                        outpoint: op.clone(),
                        value: e.output.value,
                        asset: e.output.asset,
                    })
                    .collect();
                Ok(Spendable::Utxos(coins))
            }
            FeeModel::Account => {
                let (balance, nonce) = self.accounts.get(public_key).copied().unwrap_or((0, 0));
                let balance = if *asset == L::NATIVE_ASSET { balance } else { 0 };
                Ok(Spendable::Account { balance, nonce })
            }
        }
    }
}

impl<L: LedgerModel> LockResolver for MemoryLedger<L> {
    fn find_lock_output(&self, prior: &OutPoint) -> Result<Option<LockOutput>, DataError> {
        let Some(entry) = self.outputs.get(prior) else {
            return Ok(None);
        };
        let Some(digest) = committed_digest(&entry.output.program) else {
            return Ok(None);
        };
        let locator = Bech32Encoder
            .encode(&digest, L::NAME, self.network)
            .map_err(|e| DataError::Unavailable(e.to_string()))?;
        Ok(Some(LockOutput {
            locator,
            amount: entry.output.value,
            asset: entry.output.asset,
        }))
    }
}

/// A lock collaborator that always fails, for error propagation tests.
pub struct Offline;

impl SpendableSource for Offline {
    fn spendable(&self, _: &[u8], _: &AssetId) -> Result<Spendable, DataError> {
        Err(DataError::Timeout { millis: 5_000 })
    }
}

impl LockResolver for Offline {
    fn find_lock_output(&self, _: &OutPoint) -> Result<Option<LockOutput>, DataError> {
        Err(DataError::Timeout { millis: 5_000 })
    }
}
