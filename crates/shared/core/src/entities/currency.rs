use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Amount, Symbol};

/// Currency reference data, maintained by operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: Symbol,
    pub name: String,
    pub decimals: u32,
    pub is_active: bool,
    pub is_deposit_enabled: bool,
    pub is_withdrawal_enabled: bool,
    pub min_deposit: Amount,
    pub min_withdrawal: Amount,
    /// Flat fee debited on top of every withdrawal
    pub withdrawal_fee: Amount,
}

impl Currency {
    /// Active currency with deposits and withdrawals enabled and no fees
    pub fn new(symbol: impl Into<Symbol>, decimals: u32) -> Self {
        let symbol = symbol.into();
        Self {
            name: symbol.clone(),
            symbol,
            decimals,
            is_active: true,
            is_deposit_enabled: true,
            is_withdrawal_enabled: true,
            min_deposit: Decimal::ZERO,
            min_withdrawal: Decimal::ZERO,
            withdrawal_fee: Decimal::ZERO,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_withdrawal_fee(mut self, fee: Amount) -> Self {
        self.withdrawal_fee = fee;
        self
    }

    pub fn with_limits(mut self, min_deposit: Amount, min_withdrawal: Amount) -> Self {
        self.min_deposit = min_deposit;
        self.min_withdrawal = min_withdrawal;
        self
    }

    pub fn can_deposit(&self) -> bool {
        self.is_active && self.is_deposit_enabled
    }

    pub fn can_withdraw(&self) -> bool {
        self.is_active && self.is_withdrawal_enabled
    }
}
