// ─────────────────────────────────────────────────────────────────────────────
// Inbound event records
// ─────────────────────────────────────────────────────────────────────────────
//
// Events arrive already decoded. Addresses may be in any case; the processor
// normalizes them before they become entity ids.

use substreams::scalar::{BigDecimal, BigInt};

use crate::schema::{RateSide, RateType, RewardSide};

/// Block and log position of an event
#[derive(Clone, Debug, PartialEq)]
pub struct EventMeta {
    pub contract: String,
    pub block_number: u64,
    pub timestamp: u64,
    pub tx_hash: String,
    pub log_index: u32,
}

impl EventMeta {
    /// `{tx_hash}-{log_index}`, shared by transaction records and replay receipts
    pub fn event_id(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LendingEvent {
    /// A market was added to the protocol. Tokens not given are resolved
    /// through the chain reader or left at the zero address.
    MarketListed {
        market: String,
        input_token: Option<String>,
        output_token: Option<String>,
    },
    Deposit {
        market: String,
        account: String,
        amount: BigInt,
        /// Receipt tokens minted to the depositor
        output_amount: BigInt,
    },
    Withdraw {
        market: String,
        account: String,
        amount: BigInt,
        /// Receipt tokens burned
        output_amount: BigInt,
    },
    Borrow {
        market: String,
        account: String,
        amount: BigInt,
    },
    Repay {
        market: String,
        account: String,
        amount: BigInt,
    },
    Liquidate {
        market: String,
        liquidator: String,
        liquidatee: String,
        /// Debt repaid by the liquidator, in the market's input token
        amount: BigInt,
    },
    Swap {
        market: String,
        sender: String,
        recipient: String,
        token_in: String,
        amount_in: BigInt,
        token_out: String,
        amount_out: BigInt,
        /// Fee charged in `token_in`
        fee: BigInt,
    },
    /// Borrowed and repaid within one transaction
    Flashloan {
        market: String,
        account: String,
        amount: BigInt,
        /// Premium paid on top of `amount`, booked as revenue
        fee: BigInt,
    },
    /// Interest accrued on the market's borrows, in the input token
    RevenueAccrued {
        market: String,
        interest: BigInt,
    },
    ReserveFactorUpdated {
        market: String,
        reserve_factor: BigDecimal,
    },
    LiquidationPenaltyUpdated {
        market: String,
        liquidation_penalty: BigDecimal,
    },
    InterestRateUpdated {
        market: String,
        side: RateSide,
        rate_type: RateType,
        rate: BigDecimal,
    },
    /// A rewards controller set the emission of one reward token for one
    /// side of the market
    RewardEmissionUpdated {
        market: String,
        side: RewardSide,
        reward_token: String,
        /// Raw reward token units per second
        emission_per_second: BigInt,
    },
    /// Revalue a market at the current price without any balance change
    PriceSync {
        market: String,
    },
}

impl LendingEvent {
    pub fn market(&self) -> &str {
        match self {
            LendingEvent::MarketListed { market, .. }
            | LendingEvent::Deposit { market, .. }
            | LendingEvent::Withdraw { market, .. }
            | LendingEvent::Borrow { market, .. }
            | LendingEvent::Repay { market, .. }
            | LendingEvent::Liquidate { market, .. }
            | LendingEvent::Swap { market, .. }
            | LendingEvent::Flashloan { market, .. }
            | LendingEvent::RevenueAccrued { market, .. }
            | LendingEvent::ReserveFactorUpdated { market, .. }
            | LendingEvent::LiquidationPenaltyUpdated { market, .. }
            | LendingEvent::InterestRateUpdated { market, .. }
            | LendingEvent::RewardEmissionUpdated { market, .. }
            | LendingEvent::PriceSync { market } => market,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LendingEvent::MarketListed { .. } => "MarketListed",
            LendingEvent::Deposit { .. } => "Deposit",
            LendingEvent::Withdraw { .. } => "Withdraw",
            LendingEvent::Borrow { .. } => "Borrow",
            LendingEvent::Repay { .. } => "Repay",
            LendingEvent::Liquidate { .. } => "Liquidate",
            LendingEvent::Swap { .. } => "Swap",
            LendingEvent::Flashloan { .. } => "Flashloan",
            LendingEvent::RevenueAccrued { .. } => "RevenueAccrued",
            LendingEvent::ReserveFactorUpdated { .. } => "ReserveFactorUpdated",
            LendingEvent::LiquidationPenaltyUpdated { .. } => "LiquidationPenaltyUpdated",
            LendingEvent::InterestRateUpdated { .. } => "InterestRateUpdated",
            LendingEvent::RewardEmissionUpdated { .. } => "RewardEmissionUpdated",
            LendingEvent::PriceSync { .. } => "PriceSync",
        }
    }
}
