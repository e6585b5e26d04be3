// ─────────────────────────────────────────────────────────────────────────────
// Leaf event → market and protocol deltas
// ─────────────────────────────────────────────────────────────────────────────
//
// Every function here mutates the market and its protocol together. Callers
// persist both afterwards.
//
// Cumulative fields only ever receive non-negative additions. Point-in-time
// balances follow the event direction and are not clamped.

use substreams::log;
use substreams::scalar::{BigDecimal, BigInt};

use crate::constants::PERCENTAGE_BASE;
use crate::schema::{LeafKind, LendingProtocol, Market};

/// Protocol-side / supply-side split of a revenue amount
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RevenueSplit {
    pub protocol_side_usd: BigDecimal,
    pub supply_side_usd: BigDecimal,
}

impl RevenueSplit {
    pub fn total_usd(&self) -> BigDecimal {
        self.protocol_side_usd.clone() + self.supply_side_usd.clone()
    }
}

/// Apply a deposit/withdraw/borrow/repay/liquidate/flash loan.
///
/// Only the magnitudes of `amount` and `amount_usd` are used; the kind gives
/// the direction. Returns the signed change applied to the market's token
/// balance.
pub fn apply_leaf_event(
    market: &mut Market,
    protocol: &mut LendingProtocol,
    kind: LeafKind,
    amount: &BigInt,
    amount_usd: &BigDecimal,
) -> BigInt {
    let amount = &amount.absolute();
    let usd = magnitude(amount_usd);
    let delta = match kind {
        LeafKind::Deposit => {
            market.input_token_balance = market.input_token_balance.clone() + amount.clone();
            add(&mut market.cumulative_deposit_usd, &usd);
            add(&mut protocol.cumulative_deposit_usd, &usd);
            add(&mut market.total_deposit_balance_usd, &usd);
            add(&mut protocol.total_deposit_balance_usd, &usd);
            amount.clone()
        }
        LeafKind::Withdraw => {
            market.input_token_balance = market.input_token_balance.clone() - amount.clone();
            sub(&mut market.total_deposit_balance_usd, &usd);
            sub(&mut protocol.total_deposit_balance_usd, &usd);
            amount.neg()
        }
        LeafKind::Borrow => {
            market.borrowed_token_balance = market.borrowed_token_balance.clone() + amount.clone();
            add(&mut market.cumulative_borrow_usd, &usd);
            add(&mut protocol.cumulative_borrow_usd, &usd);
            add(&mut market.total_borrow_balance_usd, &usd);
            add(&mut protocol.total_borrow_balance_usd, &usd);
            amount.clone()
        }
        LeafKind::Repay => {
            market.borrowed_token_balance = market.borrowed_token_balance.clone() - amount.clone();
            sub(&mut market.total_borrow_balance_usd, &usd);
            sub(&mut protocol.total_borrow_balance_usd, &usd);
            amount.neg()
        }
        LeafKind::Liquidate => {
            // the liquidator repays part of the liquidatee's debt
            market.borrowed_token_balance = market.borrowed_token_balance.clone() - amount.clone();
            add(&mut market.cumulative_liquidate_usd, &usd);
            add(&mut protocol.cumulative_liquidate_usd, &usd);
            sub(&mut market.total_borrow_balance_usd, &usd);
            sub(&mut protocol.total_borrow_balance_usd, &usd);
            amount.neg()
        }
        LeafKind::Flashloan => {
            // borrowed and returned within the transaction
            add(&mut market.cumulative_flashloan_usd, &usd);
            add(&mut protocol.cumulative_flashloan_usd, &usd);
            BigInt::zero()
        }
        LeafKind::Swap => {
            log::info!("[apply_leaf_event] swaps go through apply_swap, ignoring on {}", market.id);
            return BigInt::zero();
        }
    };

    market.counts.record(kind);
    protocol.counts.record(kind);
    check_balances(market, kind.as_str());

    delta
}

/// `amount_usd * liquidation_penalty / 100`
pub fn liquidation_profit_usd(amount_usd: &BigDecimal, liquidation_penalty: &BigDecimal) -> BigDecimal {
    magnitude(amount_usd) * liquidation_penalty.clone() / BigDecimal::from(PERCENTAGE_BASE)
}

/// One side of a swap
#[derive(Clone, Debug)]
pub struct SwapLeg {
    pub token: String,
    pub amount: BigInt,
    pub amount_usd: BigDecimal,
}

/// Apply a swap through the market: per-side volumes, balances for legs in
/// the market's input token, and the fee split by the reserve factor
pub fn apply_swap(
    market: &mut Market,
    protocol: &mut LendingProtocol,
    leg_in: &SwapLeg,
    leg_out: &SwapLeg,
    fee_usd: &BigDecimal,
) -> (BigDecimal, RevenueSplit) {
    let usd_in = magnitude(&leg_in.amount_usd);
    let usd_out = magnitude(&leg_out.amount_usd);

    add(&mut market.cumulative_volume_in_usd, &usd_in);
    add(&mut market.cumulative_volume_out_usd, &usd_out);

    let volume_usd = swap_volume_usd(&usd_in, &usd_out);
    add(&mut market.cumulative_volume_usd, &volume_usd);
    add(&mut protocol.cumulative_volume_usd, &volume_usd);

    if leg_in.token == market.input_token {
        market.input_token_balance = market.input_token_balance.clone() + leg_in.amount.absolute();
    }
    if leg_out.token == market.input_token {
        market.input_token_balance = market.input_token_balance.clone() - leg_out.amount.absolute();
    }

    market.counts.record(LeafKind::Swap);
    protocol.counts.record(LeafKind::Swap);
    check_balances(market, LeafKind::Swap.as_str());

    let split = apply_revenue(market, protocol, fee_usd);
    (volume_usd, split)
}

/// Average of both legs; when one leg could not be priced the other is used
fn swap_volume_usd(usd_in: &BigDecimal, usd_out: &BigDecimal) -> BigDecimal {
    match (usd_in.is_zero(), usd_out.is_zero()) {
        (true, _) => usd_out.clone(),
        (_, true) => usd_in.clone(),
        _ => (usd_in.clone() + usd_out.clone()) / BigDecimal::from(2u64),
    }
}

/// Split revenue by the market's reserve factor and add it to both levels.
///
/// `total == protocol_side + supply_side` holds by construction.
pub fn apply_revenue(
    market: &mut Market,
    protocol: &mut LendingProtocol,
    total_revenue_usd: &BigDecimal,
) -> RevenueSplit {
    let total = magnitude(total_revenue_usd);
    let protocol_side_usd = total.clone() * market.reserve_factor.clone();
    let supply_side_usd = total.clone() - protocol_side_usd.clone();

    add(&mut market.cumulative_protocol_side_revenue_usd, &protocol_side_usd);
    add(&mut market.cumulative_supply_side_revenue_usd, &supply_side_usd);
    add(&mut market.cumulative_total_revenue_usd, &total);

    add(&mut protocol.cumulative_protocol_side_revenue_usd, &protocol_side_usd);
    add(&mut protocol.cumulative_supply_side_revenue_usd, &supply_side_usd);
    add(&mut protocol.cumulative_total_revenue_usd, &total);

    RevenueSplit {
        protocol_side_usd,
        supply_side_usd,
    }
}

/// Accrued interest grows the outstanding debt and is booked as revenue
pub fn apply_interest_accrual(
    market: &mut Market,
    protocol: &mut LendingProtocol,
    interest: &BigInt,
    interest_usd: &BigDecimal,
) -> RevenueSplit {
    market.borrowed_token_balance = market.borrowed_token_balance.clone() + interest.absolute();
    check_balances(market, "ACCRUE");
    apply_revenue(market, protocol, interest_usd)
}

fn check_balances(market: &Market, context: &str) {
    if market.input_token_balance < BigInt::zero() {
        log::info!(
            "[check_balances] {} left input balance negative on {}: {}",
            context,
            market.id,
            market.input_token_balance
        );
    }
    if market.borrowed_token_balance < BigInt::zero() {
        log::info!(
            "[check_balances] {} left borrowed balance negative on {}: {}",
            context,
            market.id,
            market.borrowed_token_balance
        );
    }
}

fn magnitude(value: &BigDecimal) -> BigDecimal {
    if *value < BigDecimal::zero() {
        return value.clone().absolute();
    }
    value.clone()
}

fn add(field: &mut BigDecimal, amount: &BigDecimal) {
    *field = field.clone() + amount.clone();
}

fn sub(field: &mut BigDecimal, amount: &BigDecimal) {
    *field = field.clone() - amount.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn market() -> Market {
        Market {
            id: "0xmarket".to_string(),
            input_token: "0xusdc".to_string(),
            reserve_factor: dec("0.1"),
            liquidation_penalty: dec("8"),
            ..Default::default()
        }
    }

    #[test]
    fn deposit_and_withdraw() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        let delta = apply_leaf_event(&mut market, &mut protocol, LeafKind::Deposit, &BigInt::from(1_000u64), &dec("2000"));
        assert_eq!(delta, BigInt::from(1_000u64));

        let delta = apply_leaf_event(&mut market, &mut protocol, LeafKind::Withdraw, &BigInt::from(400u64), &dec("800"));
        assert_eq!(delta, BigInt::from(-400i64));

        assert_eq!(market.input_token_balance, BigInt::from(600u64));
        assert_eq!(market.total_deposit_balance_usd, dec("1200"));
        assert_eq!(market.cumulative_deposit_usd, dec("2000"));
        assert_eq!(protocol.total_deposit_balance_usd, dec("1200"));
        assert_eq!(protocol.cumulative_deposit_usd, dec("2000"));
        assert_eq!(market.counts.deposit_count, 1);
        assert_eq!(protocol.counts.withdraw_count, 1);
        assert_eq!(protocol.counts.transaction_count, 2);
    }

    #[test]
    fn cumulative_fields_never_decrease() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        apply_leaf_event(&mut market, &mut protocol, LeafKind::Borrow, &BigInt::from(10u64), &dec("10"));
        let after_borrow = protocol.cumulative_borrow_usd.clone();

        // a negative USD amount on a borrow is treated as its magnitude
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Borrow, &BigInt::from(5u64), &dec("-5"));
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Repay, &BigInt::from(15u64), &dec("15"));

        assert!(protocol.cumulative_borrow_usd >= after_borrow);
        assert_eq!(protocol.cumulative_borrow_usd, dec("15"));
        assert!(protocol.total_borrow_balance_usd.is_zero());
    }

    #[test]
    fn signed_amounts_follow_the_kind() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        apply_leaf_event(&mut market, &mut protocol, LeafKind::Deposit, &BigInt::from(1_000u64), &dec("2000"));
        let delta = apply_leaf_event(&mut market, &mut protocol, LeafKind::Withdraw, &BigInt::from(-400i64), &dec("-800"));
        assert_eq!(delta, BigInt::from(-400i64));
        assert_eq!(market.input_token_balance, BigInt::from(600u64));
        assert_eq!(market.total_deposit_balance_usd, dec("1200"));

        apply_leaf_event(&mut market, &mut protocol, LeafKind::Borrow, &BigInt::from(-50i64), &dec("-100"));
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Repay, &BigInt::from(-20i64), &dec("-40"));
        assert_eq!(market.borrowed_token_balance, BigInt::from(30u64));
        assert_eq!(market.total_borrow_balance_usd, dec("60"));
        assert_eq!(market.cumulative_borrow_usd, dec("100"));
    }

    #[test]
    fn flashloan_counts_volume_without_moving_balances() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Deposit, &BigInt::from(100u64), &dec("100"));

        let delta = apply_leaf_event(&mut market, &mut protocol, LeafKind::Flashloan, &BigInt::from(5_000u64), &dec("5000"));
        assert!(delta.is_zero());
        assert_eq!(market.input_token_balance, BigInt::from(100u64));
        assert_eq!(market.total_deposit_balance_usd, dec("100"));
        assert_eq!(market.cumulative_flashloan_usd, dec("5000"));
        assert_eq!(protocol.cumulative_flashloan_usd, dec("5000"));
        assert_eq!(market.counts.flashloan_count, 1);
        assert_eq!(protocol.counts.transaction_count, 2);
    }

    #[test]
    fn overdrawn_balance_is_recorded_not_clamped() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        apply_leaf_event(&mut market, &mut protocol, LeafKind::Withdraw, &BigInt::from(5u64), &dec("5"));
        assert_eq!(market.input_token_balance, BigInt::from(-5i64));
        assert_eq!(market.total_deposit_balance_usd, dec("-5"));
    }

    #[test]
    fn liquidation_reduces_debt_and_reports_profit() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Borrow, &BigInt::from(100u64), &dec("100"));
        apply_leaf_event(&mut market, &mut protocol, LeafKind::Liquidate, &BigInt::from(50u64), &dec("50"));

        assert_eq!(market.borrowed_token_balance, BigInt::from(50u64));
        assert_eq!(market.total_borrow_balance_usd, dec("50"));
        assert_eq!(protocol.cumulative_liquidate_usd, dec("50"));
        assert_eq!(liquidation_profit_usd(&dec("50"), &market.liquidation_penalty), dec("4"));
    }

    #[test]
    fn revenue_split_identity() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        let split = apply_interest_accrual(&mut market, &mut protocol, &BigInt::from(7u64), &dec("123.45"));
        assert_eq!(split.protocol_side_usd, dec("12.345"));
        assert_eq!(split.total_usd(), dec("123.45"));
        assert_eq!(market.borrowed_token_balance, BigInt::from(7u64));

        apply_revenue(&mut market, &mut protocol, &dec("10"));
        assert_eq!(
            protocol.cumulative_total_revenue_usd,
            protocol.cumulative_supply_side_revenue_usd.clone()
                + protocol.cumulative_protocol_side_revenue_usd.clone()
        );
        assert_eq!(market.cumulative_total_revenue_usd, dec("133.45"));
    }

    #[test]
    fn swap_volumes_and_fees() {
        let mut market = market();
        let mut protocol = LendingProtocol::default();

        let leg_in = SwapLeg {
            token: "0xusdc".to_string(),
            amount: BigInt::from(1_000u64),
            amount_usd: dec("1000"),
        };
        let leg_out = SwapLeg {
            token: "0xdai".to_string(),
            amount: BigInt::from(990u64),
            amount_usd: dec("990"),
        };

        let (volume, split) = apply_swap(&mut market, &mut protocol, &leg_in, &leg_out, &dec("3"));
        assert_eq!(volume, dec("995"));
        assert_eq!(market.cumulative_volume_in_usd, dec("1000"));
        assert_eq!(market.cumulative_volume_out_usd, dec("990"));
        assert_eq!(protocol.cumulative_volume_usd, dec("995"));
        assert_eq!(market.input_token_balance, BigInt::from(1_000u64));
        assert_eq!(split.protocol_side_usd, dec("0.3"));
        assert_eq!(split.supply_side_usd, dec("2.7"));
        assert_eq!(protocol.counts.swap_count, 1);

        let unpriced_out = SwapLeg {
            amount_usd: BigDecimal::zero(),
            ..leg_out
        };
        let (volume, _) = apply_swap(&mut market, &mut protocol, &leg_in, &unpriced_out, &BigDecimal::zero());
        assert_eq!(volume, dec("1000"));
    }
}
