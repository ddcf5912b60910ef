//! Transaction assembly for the three lock interactions.
//!
//! 1. Validate arguments and fetch external state (coins, balance, lock output)
//! 2. Build the complete transaction structure
//! 3. Re-check value conservation
//! 4. Compute one signing obligation per input over the final structure
//!
//! Obligations are computed last: any later change to the transaction would
//! invalidate every digest.

use std::marker::PhantomData;

use htlc_core::constants::SEQUENCE_FINAL;
use htlc_core::crypto::signing_hash;
use htlc_core::traits::{AddressEncoder, LockResolver, Spendable, SpendableSource};
use htlc_core::types::{AssetId, InputSource, OutPoint, Transaction, TxInput, TxOutput};
use tracing::debug;

use crate::coin_selection::CoinSelector;
use crate::config::EngineConfig;
use crate::error::HtlcError;
use crate::ledger::{FeeModel, LedgerModel};
use crate::lock::Lock;
use crate::transaction::{SigningObligation, SpendPath, TxKind, UnsignedTransaction};
use crate::validation::check_conservation;

/// Key whose holdings fund a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingSource {
    pub public_key: Vec<u8>,
    /// Passed through to the fund obligations for key custody.
    pub derivation_hint: Option<String>,
}

impl FundingSource {
    pub fn new(public_key: Vec<u8>) -> Self {
        Self {
            public_key,
            derivation_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.derivation_hint = Some(hint.into());
        self
    }
}

/// Builds unsigned fund, claim and refund transactions for ledger `L`.
pub struct TransactionAssembler<'a, L: LedgerModel> {
    config: &'a EngineConfig,
    spendable: &'a dyn SpendableSource,
    resolver: &'a dyn LockResolver,
    encoder: &'a dyn AddressEncoder,
    _ledger: PhantomData<L>,
}

impl<'a, L: LedgerModel> TransactionAssembler<'a, L> {
    pub fn new(
        config: &'a EngineConfig,
        spendable: &'a dyn SpendableSource,
        resolver: &'a dyn LockResolver,
        encoder: &'a dyn AddressEncoder,
    ) -> Self {
        Self {
            config,
            spendable,
            resolver,
            encoder,
            _ledger: PhantomData,
        }
    }

    /// Move `amount` of `asset` from `source` into `lock`.
    pub fn build_fund(
        &self,
        source: &FundingSource,
        lock: &Lock<L>,
        amount: u64,
        asset: &AssetId,
        fee: u64,
    ) -> Result<UnsignedTransaction<L>, HtlcError> {
        if amount == 0 {
            return Err(HtlcError::InvalidParameter("amount must be non-zero".into()));
        }
        self.check_key("source", &source.public_key)?;
        self.check_asset(asset)?;
        let need = amount
            .checked_add(fee)
            .ok_or_else(|| HtlcError::InvalidParameter("amount plus fee overflows".into()))?;

        let lock_output = TxOutput {
            value: amount,
            asset: *asset,
            program: lock.program(),
        };

        let holdings = self.spendable.spendable(&source.public_key, asset)?;
        let (inputs, outputs) = match (L::FEE_MODEL, holdings) {
            (FeeModel::Utxo, Spendable::Utxos(coins)) => {
                let selection = CoinSelector::select(
                    &coins,
                    asset,
                    amount,
                    fee,
                    self.config.max_fund_inputs,
                )?;
                let inputs = selection
                    .selected
                    .iter()
                    .map(|c| TxInput::new(InputSource::Outpoint(c.outpoint.clone()), c.value))
                    .collect();
                let mut outputs = vec![lock_output];
                if selection.change > 0 {
                    outputs.push(TxOutput {
                        value: selection.change,
                        asset: *asset,
                        program: L::key_program(&source.public_key),
                    });
                }
                (inputs, outputs)
            }
            (FeeModel::Account, Spendable::Account { balance, nonce }) => {
                if balance < need {
                    return Err(HtlcError::InsufficientFunds { have: balance, need });
                }
                let input = TxInput::new(
                    InputSource::Account {
                        public_key: source.public_key.clone(),
                        nonce,
                    },
                    need,
                );
                (vec![input], vec![lock_output])
            }
            (model, _) => {
                return Err(HtlcError::DataUnavailable(
                    htlc_core::error::DataError::Unavailable(format!(
                        "spendable source returned holdings for the wrong fee model ({model:?})"
                    )),
                ));
            }
        };

        let tx = self.finish(inputs, outputs);
        check_conservation(&tx, fee)?;

        let script_code = L::key_program(&source.public_key);
        let obligations = (0..tx.inputs.len())
            .map(|index| {
                Ok(SigningObligation {
                    input_index: index,
                    message_digest: signing_hash(&tx, index, &script_code, L::content_hash)?,
                    required_key: source.public_key.clone(),
                    derivation_hint: source.derivation_hint.clone(),
                    path: SpendPath::Direct,
                    lock_bytecode: None,
                    sequence: tx.inputs[index].sequence,
                })
            })
            .collect::<Result<Vec<_>, HtlcError>>()?;

        debug!(
            ledger = L::NAME,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            amount,
            fee,
            "assembler: built fund transaction"
        );
        Ok(UnsignedTransaction::new(
            TxKind::Fund,
            self.config.network,
            fee,
            tx,
            obligations,
        ))
    }

    /// Release the lock output at `prior` to `destination` with the secret.
    pub fn build_claim(
        &self,
        prior: &OutPoint,
        lock: &Lock<L>,
        destination: &[u8],
        amount: u64,
        asset: &AssetId,
        fee: u64,
    ) -> Result<UnsignedTransaction<L>, HtlcError> {
        self.build_spend(TxKind::Claim, prior, lock, destination, amount, asset, fee)
    }

    /// Return the lock output at `prior` to `destination` after the timeout.
    pub fn build_refund(
        &self,
        prior: &OutPoint,
        lock: &Lock<L>,
        destination: &[u8],
        amount: u64,
        asset: &AssetId,
        fee: u64,
    ) -> Result<UnsignedTransaction<L>, HtlcError> {
        self.build_spend(TxKind::Refund, prior, lock, destination, amount, asset, fee)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_spend(
        &self,
        kind: TxKind,
        prior: &OutPoint,
        lock: &Lock<L>,
        destination: &[u8],
        amount: u64,
        asset: &AssetId,
        fee: u64,
    ) -> Result<UnsignedTransaction<L>, HtlcError> {
        if amount == 0 {
            return Err(HtlcError::InvalidParameter("amount must be non-zero".into()));
        }
        self.check_key("destination", destination)?;
        self.check_asset(asset)?;

        let resolved = self
            .resolver
            .find_lock_output(prior)?
            .ok_or_else(|| HtlcError::LockNotFound(prior.to_string()))?;
        let locator = lock.locator(self.config.network, self.encoder)?;
        if resolved.locator != locator {
            return Err(HtlcError::LockNotFound(format!(
                "{prior} pays to {}, not {locator}",
                resolved.locator
            )));
        }
        if resolved.asset != *asset {
            return Err(HtlcError::InvalidParameter(format!(
                "lock output holds asset {}, not {asset}",
                resolved.asset
            )));
        }
        if resolved.amount != amount {
            return Err(HtlcError::InvalidParameter(format!(
                "lock output holds {}, not {amount}",
                resolved.amount
            )));
        }
        if fee >= amount {
            return Err(HtlcError::InsufficientFunds {
                have: amount,
                need: fee.saturating_add(1),
            });
        }

        let params = lock.parameters();
        let (path, sequence, required_key) = match kind {
            TxKind::Claim => (SpendPath::Claim, SEQUENCE_FINAL, &params.recipient_key),
            TxKind::Refund => (SpendPath::Refund, params.timeout, &params.sender_key),
            TxKind::Fund => return Err(HtlcError::wrong_kind(TxKind::Claim, kind)),
        };

        let input = TxInput {
            source: InputSource::Outpoint(prior.clone()),
            value: amount,
            sequence,
            witness: Vec::new(),
        };
        let output = TxOutput {
            value: amount - fee,
            asset: *asset,
            program: L::key_program(destination),
        };

        let tx = self.finish(vec![input], vec![output]);
        check_conservation(&tx, fee)?;

        let obligation = SigningObligation {
            input_index: 0,
            message_digest: signing_hash(&tx, 0, lock.bytecode(), L::content_hash)?,
            required_key: required_key.clone(),
            derivation_hint: None,
            path,
            lock_bytecode: Some(lock.bytecode().to_vec()),
            sequence,
        };

        debug!(
            ledger = L::NAME,
            %kind,
            %prior,
            amount,
            fee,
            "assembler: built lock spend"
        );
        Ok(UnsignedTransaction::new(
            kind,
            self.config.network,
            fee,
            tx,
            vec![obligation],
        ))
    }

    fn finish(&self, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
        Transaction {
            version: self.config.tx_version,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    fn check_key(&self, role: &str, key: &[u8]) -> Result<(), HtlcError> {
        L::KEY_SCHEME.validate_public_key(key).map_err(|_| {
            HtlcError::InvalidParameter(format!("{role} is not a valid {} key", L::KEY_SCHEME))
        })
    }

    fn check_asset(&self, asset: &AssetId) -> Result<(), HtlcError> {
        if L::FEE_MODEL == FeeModel::Utxo && *asset != L::NATIVE_ASSET {
            return Err(HtlcError::InvalidParameter(format!(
                "{} ledger only carries its native asset",
                L::NAME
            )));
        }
        Ok(())
    }
}
