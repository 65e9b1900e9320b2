use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::fixed::{FixedPoint, SCALE};
use crate::utils::time::current_time;

/// Highest precision an asset may declare.
pub const MAX_DECIMALS: u8 = 18;

/// Defines the category of the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Native,
    Token,
    NonFungible,
    Synthetic,
    Stable,
}

/// A registered currency or token, with its metadata and transfer policy.
///
/// Amounts everywhere are integers in the asset's smallest unit, as declared
/// by `decimals` (US cents for USD with decimals 2, satoshis for BTC with 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Short unique identifier ("USD", "BTC").
    pub id: String,
    pub kind: AssetKind,
    /// Human symbol for display.
    pub symbol: String,
    /// Human readable name ("United States Dollar").
    pub name: String,
    /// Precision, 0..=18.
    pub decimals: u8,
    pub total_supply: Option<u64>,
    pub issuer: Option<String>,
    pub created_at: i64,
    /// Per-transaction cap in smallest units. None = unlimited.
    pub max_transaction_amount: Option<i64>,
    /// Daily aggregate cap. Informational only; not enforced by the kernel.
    pub daily_limit: Option<i64>,
    pub frozen: bool,
    pub requires_approval: bool,
    pub whitelist_only: bool,
}

impl Asset {
    pub fn new(id: &str, kind: AssetKind, symbol: &str, name: &str, decimals: u8) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(LedgerError::InvalidAsset("id cannot be empty".into()));
        }
        if decimals > MAX_DECIMALS {
            return Err(LedgerError::InvalidAsset(format!(
                "decimals {} exceeds maximum of {}",
                decimals, MAX_DECIMALS
            )));
        }
        Ok(Self {
            id: id.to_string(),
            kind,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            total_supply: None,
            issuer: None,
            created_at: current_time(),
            max_transaction_amount: None,
            daily_limit: None,
            frozen: false,
            requires_approval: false,
            whitelist_only: false,
        })
    }

    pub fn with_transaction_limit(mut self, limit: i64) -> Self {
        self.max_transaction_amount = Some(limit);
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    pub fn with_total_supply(mut self, supply: u64) -> Self {
        self.total_supply = Some(supply);
        self
    }
}

/// A mapping of asset id to [`Asset`]. Ids are unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    assets: HashMap<String, Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, asset: Asset) -> Result<()> {
        if self.assets.contains_key(&asset.id) {
            return Err(LedgerError::AssetExists(asset.id));
        }
        tracing::debug!(asset = %asset.id, "asset registered");
        self.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn freeze(&mut self, id: &str) -> Result<()> {
        self.set_frozen(id, true)
    }

    pub fn unfreeze(&mut self, id: &str) -> Result<()> {
        self.set_frozen(id, false)
    }

    fn set_frozen(&mut self, id: &str, frozen: bool) -> Result<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| LedgerError::AssetNotFound(id.to_string()))?;
        asset.frozen = frozen;
        tracing::info!(asset = %id, frozen, "asset freeze state changed");
        Ok(())
    }

    pub fn set_transaction_limit(&mut self, id: &str, limit: i64) -> Result<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| LedgerError::AssetNotFound(id.to_string()))?;
        asset.max_transaction_amount = Some(limit);
        Ok(())
    }

    /// Policy gate applied before any transaction touches the ledger.
    ///
    /// Rejection order: unknown asset, frozen asset, per-transaction cap.
    pub fn validate_transaction(&self, asset_id: &str, amount: i64) -> Result<()> {
        let asset = self
            .assets
            .get(asset_id)
            .ok_or_else(|| LedgerError::AssetNotFound(asset_id.to_string()))?;
        if asset.frozen {
            return Err(LedgerError::AssetFrozen(asset_id.to_string()));
        }
        if let Some(limit) = asset.max_transaction_amount {
            if amount > limit {
                return Err(LedgerError::TransactionAmountTooLarge {
                    asset: asset_id.to_string(),
                    amount,
                    limit,
                });
            }
        }
        Ok(())
    }
}

/// A quoted conversion rate between two assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_asset: String,
    pub to_asset: String,
    pub rate: FixedPoint,
    pub updated_at: i64,
}

/// Advisory conversion table.
///
/// Conversion never authorises a cross-asset transaction; the kernel rejects
/// those outright. This exists for reporting in a common denomination.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRates {
    rates: HashMap<(String, String), ExchangeRate>,
}

impl ExchangeRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, from: &str, to: &str, rate: FixedPoint) {
        self.rates.insert(
            (from.to_string(), to.to_string()),
            ExchangeRate {
                from_asset: from.to_string(),
                to_asset: to.to_string(),
                rate,
                updated_at: current_time(),
            },
        );
    }

    pub fn rate(&self, from: &str, to: &str) -> Option<&ExchangeRate> {
        self.rates.get(&(from.to_string(), to.to_string()))
    }

    /// `floor(amount * rate)` in the target asset's smallest unit.
    ///
    /// Returns `None` when no rate is quoted or the product overflows.
    pub fn convert(&self, from: &str, to: &str, amount: i64) -> Option<i64> {
        let quote = self.rate(from, to)?;
        let wide = (amount as i128 * quote.rate.raw() as i128).div_euclid(SCALE as i128);
        i64::try_from(wide).ok()
    }
}
