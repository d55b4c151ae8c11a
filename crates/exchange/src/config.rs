//! Configuration loading for the exchange core
//!
//! Supports JSON configuration files for:
//! - Engine, order book and conditional monitor settings
//! - Currencies and trading pairs
//! - Accounts with opening deposits

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use bourse_conditional::MonitorConfig;
use bourse_core::{Currency, TradingPair};
use bourse_matching::EngineConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration for the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name/identifier
    #[serde(default = "default_exchange_name")]
    pub name: String,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub book: BookSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Buffered events per subscriber before it starts lagging
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub currencies: Vec<CurrencyConfig>,

    #[serde(default)]
    pub pairs: Vec<PairConfig>,

    /// Accounts funded at startup
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

fn default_exchange_name() -> String {
    "Bourse".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: default_exchange_name(),
            engine: EngineSettings::default(),
            book: BookSettings::default(),
            monitor: MonitorSettings::default(),
            event_capacity: default_event_capacity(),
            currencies: Vec::new(),
            pairs: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// BTC, ETH and USDT with BTC_USDT and ETH_USDT markets
    pub fn with_default_markets() -> Self {
        Self {
            currencies: vec![
                CurrencyConfig::new("BTC", 8),
                CurrencyConfig::new("ETH", 8),
                CurrencyConfig::new("USDT", 6),
            ],
            pairs: vec![PairConfig::new("BTC", "USDT"), PairConfig::new("ETH", "USDT")],
            ..Default::default()
        }
    }

    /// Reject reference data the registry and ledger would refuse later
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidSettings(
                "event_capacity must be positive".into(),
            ));
        }
        if self.engine.lock_timeout_ms == 0 || self.engine.pair_lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidSettings(
                "lock timeouts must be positive".into(),
            ));
        }
        if self.engine.market_buy_buffer < Decimal::ZERO {
            return Err(ConfigError::InvalidSettings(
                "market_buy_buffer must not be negative".into(),
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSettings(
                "poll_interval_ms must be positive".into(),
            ));
        }

        let mut currencies = HashSet::new();
        for currency in &self.currencies {
            if currency.symbol.is_empty() {
                return Err(ConfigError::InvalidCurrency("empty symbol".into()));
            }
            if !currencies.insert(currency.symbol.as_str()) {
                return Err(ConfigError::InvalidCurrency(format!(
                    "duplicate currency {}",
                    currency.symbol
                )));
            }
        }

        let mut pairs = HashSet::new();
        for pair in &self.pairs {
            let symbol = TradingPair::symbol_for(&pair.base, &pair.quote);
            if pair.base == pair.quote {
                return Err(ConfigError::InvalidMarket(format!(
                    "{} trades a currency against itself",
                    symbol
                )));
            }
            for currency in [&pair.base, &pair.quote] {
                if !currencies.contains(currency.as_str()) {
                    return Err(ConfigError::InvalidMarket(format!(
                        "{} references unknown currency {}",
                        symbol, currency
                    )));
                }
            }
            for fee in [pair.maker_fee, pair.taker_fee].into_iter().flatten() {
                if fee < Decimal::ZERO || fee >= Decimal::ONE {
                    return Err(ConfigError::InvalidMarket(format!(
                        "{} fee rate {} outside [0, 1)",
                        symbol, fee
                    )));
                }
            }
            if let (Some(min), Some(max)) = (pair.min_order_size, pair.max_order_size) {
                if min > max {
                    return Err(ConfigError::InvalidMarket(format!(
                        "{} min_order_size {} exceeds max_order_size {}",
                        symbol, min, max
                    )));
                }
            }
            if !pairs.insert(symbol.clone()) {
                return Err(ConfigError::InvalidMarket(format!("duplicate pair {}", symbol)));
            }
        }

        for account in &self.accounts {
            for deposit in &account.deposits {
                if !currencies.contains(deposit.currency.as_str()) {
                    return Err(ConfigError::InvalidAccount(format!(
                        "{} deposits unknown currency {}",
                        account.user_id, deposit.currency
                    )));
                }
                if deposit.amount <= Decimal::ZERO {
                    return Err(ConfigError::InvalidAccount(format!(
                        "{} deposit of {} {} is not positive",
                        account.user_id, deposit.amount, deposit.currency
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Matching engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Row lock wait for orders and balances
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Wait for a pair's matching lock
    #[serde(default = "default_pair_lock_timeout_ms")]
    pub pair_lock_timeout_ms: u64,
    #[serde(default = "default_market_buy_buffer")]
    pub market_buy_buffer: Decimal,
    #[serde(default)]
    pub fee_account: Option<String>,
}

fn default_lock_timeout_ms() -> u64 {
    250
}

fn default_pair_lock_timeout_ms() -> u64 {
    2000
}

fn default_market_buy_buffer() -> Decimal {
    Decimal::new(5, 2)
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            pair_lock_timeout_ms: default_pair_lock_timeout_ms(),
            market_buy_buffer: default_market_buy_buffer(),
            fee_account: None,
        }
    }
}

impl EngineSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            row_lock_timeout: self.lock_timeout(),
            pair_lock_timeout: Duration::from_millis(self.pair_lock_timeout_ms),
            market_buy_buffer: self.market_buy_buffer,
            fee_account: self.fee_account.clone(),
        }
    }
}

/// Order book index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSettings {
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn default_cache_ttl_ms() -> u64 {
    2000
}

impl Default for BookSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

/// Conditional order monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub event_driven: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            event_driven: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl MonitorSettings {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            event_driven: self.event_driven,
        }
    }
}

/// Currency reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub deposit_enabled: bool,
    #[serde(default = "default_true")]
    pub withdrawal_enabled: bool,
    #[serde(default)]
    pub min_deposit: Decimal,
    #[serde(default)]
    pub min_withdrawal: Decimal,
    #[serde(default)]
    pub withdrawal_fee: Decimal,
}

fn default_decimals() -> u32 {
    8
}

impl CurrencyConfig {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            decimals,
            is_active: true,
            deposit_enabled: true,
            withdrawal_enabled: true,
            min_deposit: Decimal::ZERO,
            min_withdrawal: Decimal::ZERO,
            withdrawal_fee: Decimal::ZERO,
        }
    }

    pub fn to_domain(&self) -> Currency {
        let mut currency = Currency::new(self.symbol.clone(), self.decimals)
            .with_limits(self.min_deposit, self.min_withdrawal)
            .with_withdrawal_fee(self.withdrawal_fee);
        if let Some(name) = &self.name {
            currency = currency.with_name(name.clone());
        }
        currency.is_active = self.is_active;
        currency.is_deposit_enabled = self.deposit_enabled;
        currency.is_withdrawal_enabled = self.withdrawal_enabled;
        currency
    }
}

/// Trading pair reference data; unset fields keep the pair defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub min_order_size: Option<Decimal>,
    #[serde(default)]
    pub max_order_size: Option<Decimal>,
    #[serde(default)]
    pub price_precision: Option<u32>,
    #[serde(default)]
    pub quantity_precision: Option<u32>,
    #[serde(default)]
    pub maker_fee: Option<Decimal>,
    #[serde(default)]
    pub taker_fee: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl PairConfig {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            min_order_size: None,
            max_order_size: None,
            price_precision: None,
            quantity_precision: None,
            maker_fee: None,
            taker_fee: None,
            is_active: true,
        }
    }

    pub fn to_domain(&self) -> TradingPair {
        let mut pair = TradingPair::new(self.base.clone(), self.quote.clone());

        // Apply optional overrides
        let min = self.min_order_size.unwrap_or(pair.min_order_size);
        let max = self.max_order_size.unwrap_or(pair.max_order_size);
        pair = pair.with_order_size_limits(min, max);

        let price_precision = self.price_precision.unwrap_or(pair.price_precision);
        let quantity_precision = self.quantity_precision.unwrap_or(pair.quantity_precision);
        pair = pair.with_precision(price_precision, quantity_precision);

        let maker_fee = self.maker_fee.unwrap_or(pair.maker_fee);
        let taker_fee = self.taker_fee.unwrap_or(pair.taker_fee);
        pair = pair.with_fees(maker_fee, taker_fee);

        pair.is_active = self.is_active;
        pair
    }
}

/// Account funded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub user_id: String,
    #[serde(default)]
    pub deposits: Vec<DepositConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositConfig {
    pub currency: String,
    pub amount: Decimal,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid currency config: {0}")]
    InvalidCurrency(String),

    #[error("invalid market config: {0}")]
    InvalidMarket(String),

    #[error("invalid account config: {0}")]
    InvalidAccount(String),
}
