// ─────────────────────────────────────────────────────────────────────────────
// USD valuation reconciliation
// ─────────────────────────────────────────────────────────────────────────────
//
// A market's USD contribution to the protocol is recorded on the market.
// When it is recomputed the old contribution is subtracted from the protocol
// and the new one added, same as the rolling window stores do with evicted
// buckets.

use substreams::scalar::BigDecimal;

use crate::schema::{LendingProtocol, Market, Token};

/// `parent = parent - previous + new`, an absent previous value counts as zero
pub fn reconcile_usd(parent: &mut BigDecimal, previous: Option<&BigDecimal>, new: &BigDecimal) {
    let previous = previous.cloned().unwrap_or_else(BigDecimal::zero);
    *parent = parent.clone() - previous + new.clone();
}

/// Recompute the market's point-in-time USD fields at `price` and move the
/// protocol totals by the difference
pub fn revalue_market(market: &mut Market, protocol: &mut LendingProtocol, price: &BigDecimal, decimals: u64) {
    market.input_token_price_usd = price.clone();

    let supplied_usd = market.input_token_balance.to_decimal(decimals) * price.clone();
    let borrowed_usd = market.borrowed_token_balance.to_decimal(decimals) * price.clone();

    reconcile_usd(
        &mut protocol.total_value_locked_usd,
        Some(&market.total_value_locked_usd),
        &supplied_usd,
    );
    market.total_value_locked_usd = supplied_usd.clone();

    reconcile_usd(
        &mut protocol.total_deposit_balance_usd,
        Some(&market.total_deposit_balance_usd),
        &supplied_usd,
    );
    market.total_deposit_balance_usd = supplied_usd;

    reconcile_usd(
        &mut protocol.total_borrow_balance_usd,
        Some(&market.total_borrow_balance_usd),
        &borrowed_usd,
    );
    market.total_borrow_balance_usd = borrowed_usd;
}

/// Remember the last price seen for a token
pub fn record_token_price(token: &mut Token, price: &BigDecimal, block_number: u64) {
    token.last_price_usd = price.clone();
    token.last_price_block_number = block_number;
}
