//! Coin selection for UTXO fund transactions.
//!
//! Largest-first: coins are sorted by value descending (outpoint as a
//! tiebreaker, so the result is deterministic for a given coin set) and
//! taken greedily until `target + fee` is covered or the input cap is hit.

use htlc_core::error::TransactionError;
use htlc_core::traits::SpendableUtxo;
use htlc_core::types::AssetId;

use crate::error::HtlcError;

/// Coins chosen to fund a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    pub selected: Vec<SpendableUtxo>,
    /// Sum of selected coin values.
    pub total: u64,
    /// `total - target - fee`, returned to the funder.
    pub change: u64,
}

pub struct CoinSelector;

impl CoinSelector {
    /// Select coins of `asset` covering `target + fee` with at most `max_inputs` coins.
    pub fn select(
        coins: &[SpendableUtxo],
        asset: &AssetId,
        target: u64,
        fee: u64,
        max_inputs: usize,
    ) -> Result<CoinSelection, HtlcError> {
        if target == 0 {
            return Err(HtlcError::InvalidParameter("amount must be non-zero".into()));
        }
        let needed = target
            .checked_add(fee)
            .ok_or_else(|| HtlcError::InvalidParameter("amount plus fee overflows".into()))?;

        let mut candidates: Vec<&SpendableUtxo> =
            coins.iter().filter(|c| c.asset == *asset && c.value > 0).collect();
        candidates.sort_by(|a, b| {
            b.value
                .cmp(&a.value)
                .then_with(|| a.outpoint.txid.cmp(&b.outpoint.txid))
                .then_with(|| a.outpoint.index.cmp(&b.outpoint.index))
        });

        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for coin in candidates.into_iter().take(max_inputs) {
            selected.push(coin.clone());
            total = total
                .checked_add(coin.value)
                .ok_or(HtlcError::Transaction(TransactionError::ValueOverflow))?;
            if total >= needed {
                return Ok(CoinSelection {
                    selected,
                    total,
                    change: total - needed,
                });
            }
        }

        Err(HtlcError::InsufficientFunds {
            have: total,
            need: needed,
        })
    }
}
