use bourse_core::{
    Amount, BalanceKey, EntryType, OrderId, Quantity, Reference, TradeFees, TradeId, TradingPair,
    UserId,
};
use bourse_ledger::Ledger;
use bourse_ports::ExchangeResult;
use rust_decimal::Decimal;

/// Everything the ledger needs to settle one match
#[derive(Debug, Clone)]
pub(crate) struct Settlement<'a> {
    pub pair: &'a TradingPair,
    pub trade_id: TradeId,
    pub buyer: &'a str,
    pub seller: &'a str,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub quantity: Quantity,
    pub quote_quantity: Amount,
    pub fees: TradeFees,
    /// Reserve left over on a buy order this trade completes
    pub buyer_release: Amount,
    /// Reserve left over on a sell order this trade completes
    pub seller_release: Amount,
}

/// Move funds for one match in a single ledger transaction
///
/// Buyer: deduct locked quote, credit base net of the buyer fee.
/// Seller: deduct locked base, credit quote net of the seller fee.
/// Fee credits and reserve releases ride in the same transaction, so either
/// every entry is written or none is.
pub(crate) fn settle(
    ledger: &Ledger,
    settlement: &Settlement<'_>,
    fee_account: Option<&UserId>,
) -> ExchangeResult<()> {
    let pair = settlement.pair;
    let buyer_quote = BalanceKey::new(settlement.buyer, pair.quote.clone());
    let buyer_base = BalanceKey::new(settlement.buyer, pair.base.clone());
    let seller_base = BalanceKey::new(settlement.seller, pair.base.clone());
    let seller_quote = BalanceKey::new(settlement.seller, pair.quote.clone());

    let mut keys = vec![
        buyer_quote.clone(),
        buyer_base.clone(),
        seller_base.clone(),
        seller_quote.clone(),
    ];
    let fee_keys = fee_account.map(|account| {
        (
            BalanceKey::new(account.clone(), pair.base.clone()),
            BalanceKey::new(account.clone(), pair.quote.clone()),
        )
    });
    if let Some((fee_base, fee_quote)) = &fee_keys {
        keys.push(fee_base.clone());
        keys.push(fee_quote.clone());
    }

    let trade_ref = Some(Reference::trade(settlement.trade_id));
    let fees = settlement.fees;

    ledger.transaction(&keys, |tx| {
        tx.deduct_locked(
            &buyer_quote,
            settlement.quote_quantity,
            EntryType::TradeBuy,
            trade_ref.clone(),
        )?;
        tx.credit(
            &buyer_base,
            settlement.quantity - fees.buyer_fee,
            EntryType::TradeBuy,
            trade_ref.clone(),
        )?;
        tx.deduct_locked(
            &seller_base,
            settlement.quantity,
            EntryType::TradeSell,
            trade_ref.clone(),
        )?;
        tx.credit(
            &seller_quote,
            settlement.quote_quantity - fees.seller_fee,
            EntryType::TradeSell,
            trade_ref.clone(),
        )?;

        if settlement.buyer_release > Decimal::ZERO {
            tx.unlock(
                &buyer_quote,
                settlement.buyer_release,
                Some(Reference::order(settlement.buy_order_id)),
            )?;
        }
        if settlement.seller_release > Decimal::ZERO {
            tx.unlock(
                &seller_base,
                settlement.seller_release,
                Some(Reference::order(settlement.sell_order_id)),
            )?;
        }

        if let Some((fee_base, fee_quote)) = &fee_keys {
            if fees.buyer_fee > Decimal::ZERO {
                tx.credit(fee_base, fees.buyer_fee, EntryType::Fee, trade_ref.clone())?;
            }
            if fees.seller_fee > Decimal::ZERO {
                tx.credit(fee_quote, fees.seller_fee, EntryType::Fee, trade_ref.clone())?;
            }
        }
        Ok(())
    })
}
