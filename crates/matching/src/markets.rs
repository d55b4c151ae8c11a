use bourse_core::{Currency, MarketStats, Price, Symbol, TradingPair};
use bourse_ports::{ExchangeError, ExchangeResult};
use dashmap::DashMap;
use log::info;
use rust_decimal::Decimal;

/// Currencies and trading pairs known to this exchange
///
/// Built once at start-up and shared by handle; there is no global registry.
#[derive(Debug, Default)]
pub struct MarketRegistry {
    currencies: DashMap<Symbol, Currency>,
    pairs: DashMap<Symbol, TradingPair>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_currency(&self, currency: Currency) -> ExchangeResult<()> {
        if self.currencies.contains_key(&currency.symbol) {
            return Err(ExchangeError::InvalidState(format!(
                "currency {} already registered",
                currency.symbol
            )));
        }
        info!("Registered currency: symbol={}", currency.symbol);
        self.currencies.insert(currency.symbol.clone(), currency);
        Ok(())
    }

    pub fn register_pair(&self, pair: TradingPair) -> ExchangeResult<()> {
        if pair.base == pair.quote {
            return Err(ExchangeError::InvalidState(format!(
                "pair {} must trade two different currencies",
                pair.symbol
            )));
        }
        for symbol in [&pair.base, &pair.quote] {
            if !self.currencies.contains_key(symbol) {
                return Err(ExchangeError::NotFound(format!("currency {}", symbol)));
            }
        }
        if pair.min_order_size > pair.max_order_size {
            return Err(ExchangeError::InvalidState(format!(
                "pair {} has min order size above max",
                pair.symbol
            )));
        }
        for rate in [pair.maker_fee, pair.taker_fee] {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(ExchangeError::InvalidState(format!(
                    "pair {} fee rate {} outside [0, 1)",
                    pair.symbol, rate
                )));
            }
        }
        if self.pairs.contains_key(&pair.symbol) {
            return Err(ExchangeError::InvalidState(format!(
                "pair {} already registered",
                pair.symbol
            )));
        }

        info!(
            "Registered pair: symbol={}, maker_fee={}, taker_fee={}",
            pair.symbol, pair.maker_fee, pair.taker_fee
        );
        self.pairs.insert(pair.symbol.clone(), pair);
        Ok(())
    }

    pub fn currency(&self, symbol: &str) -> ExchangeResult<Currency> {
        self.currencies
            .get(symbol)
            .map(|c| c.value().clone())
            .ok_or_else(|| ExchangeError::NotFound(format!("currency {}", symbol)))
    }

    pub fn pair(&self, symbol: &str) -> ExchangeResult<TradingPair> {
        self.pairs
            .get(symbol)
            .map(|p| p.value().clone())
            .ok_or_else(|| ExchangeError::NotFound(format!("trading pair {}", symbol)))
    }

    pub fn pairs(&self) -> Vec<TradingPair> {
        self.pairs.iter().map(|p| p.value().clone()).collect()
    }

    pub fn active_pairs(&self) -> Vec<TradingPair> {
        self.pairs
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.value().clone())
            .collect()
    }

    /// Best-effort last-price update after a trade
    pub fn record_last_price(&self, symbol: &str, price: Price) {
        if let Some(mut pair) = self.pairs.get_mut(symbol) {
            pair.stats.last_price = Some(price);
        }
    }

    /// Replace a pair's 24h statistics (stats job)
    pub fn update_stats(&self, symbol: &str, stats: MarketStats) -> ExchangeResult<()> {
        let mut pair = self
            .pairs
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::NotFound(format!("trading pair {}", symbol)))?;
        pair.stats = stats;
        Ok(())
    }
}
