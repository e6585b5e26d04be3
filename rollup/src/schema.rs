// ─────────────────────────────────────────────────────────────────────────────
// Entities persisted by the rollup engine
// ─────────────────────────────────────────────────────────────────────────────
//
// Every entity is addressed by `(ENTITY_TYPE, id)` in the store. Ids are
// deterministic so replays always land on the same rows:
//
//   LendingProtocol        {protocol_address}
//   Market                 {market_address}
//   MarketDailySnapshot    {market_address}-{day}
//   MarketHourlySnapshot   {market_address}-{hour}
//   ProtocolDailySnapshot  {protocol_address}-{day}
//   ProtocolHourlySnapshot {protocol_address}-{hour}
//   TransactionRecord      {tx_hash}-{log_index}
//   Account                {address}
//   DailyActiveAccount     {day}-{address}
//   HourlyActiveAccount    {hour}-{address}
//   RewardToken            {DEPOSIT|BORROW}-{token}
//   InterestRate           {LENDER|BORROWER}-{VARIABLE|STABLE|FIXED}-{market}

use std::fmt::Debug;
use std::marker::PhantomData;

use substreams::scalar::{BigDecimal, BigInt};

use crate::rewards::RewardEmissions;

/// A row the store can load and save
pub trait Entity: Clone + 'static {
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($entity:ty, $name:expr) => {
        impl Entity for $entity {
            const ENTITY_TYPE: &'static str = $name;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

/// Bucket width marker for snapshot and active-account entities
pub trait Period: Clone + Debug + Default + PartialEq + 'static {
    const SECONDS: u64;
    const MARKET_SNAPSHOT: &'static str;
    const PROTOCOL_SNAPSHOT: &'static str;
    const ACTIVE_ACCOUNT: &'static str;

    fn bucket(timestamp: u64) -> u64;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Daily;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hourly;

impl Period for Daily {
    const SECONDS: u64 = rollup_common::SECONDS_PER_DAY;
    const MARKET_SNAPSHOT: &'static str = "MarketDailySnapshot";
    const PROTOCOL_SNAPSHOT: &'static str = "ProtocolDailySnapshot";
    const ACTIVE_ACCOUNT: &'static str = "DailyActiveAccount";

    fn bucket(timestamp: u64) -> u64 {
        rollup_common::day_bucket(timestamp)
    }
}

impl Period for Hourly {
    const SECONDS: u64 = rollup_common::SECONDS_PER_HOUR;
    const MARKET_SNAPSHOT: &'static str = "MarketHourlySnapshot";
    const PROTOCOL_SNAPSHOT: &'static str = "ProtocolHourlySnapshot";
    const ACTIVE_ACCOUNT: &'static str = "HourlyActiveAccount";

    fn bucket(timestamp: u64) -> u64 {
        rollup_common::hour_bucket(timestamp)
    }
}

/// Leaf transaction kinds carried by inbound events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidate,
    Swap,
    Flashloan,
}

impl LeafKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeafKind::Deposit => "DEPOSIT",
            LeafKind::Withdraw => "WITHDRAW",
            LeafKind::Borrow => "BORROW",
            LeafKind::Repay => "REPAY",
            LeafKind::Liquidate => "LIQUIDATE",
            LeafKind::Swap => "SWAP",
            LeafKind::Flashloan => "FLASHLOAN",
        }
    }
}

/// Per-kind transaction counters, used both as lifetime totals and as
/// windowed counters inside a snapshot bucket
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionCounts {
    pub transaction_count: i32,
    pub deposit_count: i32,
    pub withdraw_count: i32,
    pub borrow_count: i32,
    pub repay_count: i32,
    pub liquidation_count: i32,
    pub swap_count: i32,
    pub flashloan_count: i32,
}

impl TransactionCounts {
    pub fn record(&mut self, kind: LeafKind) {
        match kind {
            LeafKind::Deposit => self.deposit_count += 1,
            LeafKind::Withdraw => self.withdraw_count += 1,
            LeafKind::Borrow => self.borrow_count += 1,
            LeafKind::Repay => self.repay_count += 1,
            LeafKind::Liquidate => self.liquidation_count += 1,
            LeafKind::Swap => self.swap_count += 1,
            LeafKind::Flashloan => self.flashloan_count += 1,
        }
        self.transaction_count += 1;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LendingProtocol {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub network: String,
    pub schema_version: String,
    pub subgraph_version: String,
    pub methodology_version: String,

    pub total_value_locked_usd: BigDecimal,
    pub total_deposit_balance_usd: BigDecimal,
    pub total_borrow_balance_usd: BigDecimal,

    pub cumulative_deposit_usd: BigDecimal,
    pub cumulative_borrow_usd: BigDecimal,
    pub cumulative_liquidate_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_flashloan_usd: BigDecimal,
    pub cumulative_supply_side_revenue_usd: BigDecimal,
    pub cumulative_protocol_side_revenue_usd: BigDecimal,
    pub cumulative_total_revenue_usd: BigDecimal,

    pub cumulative_unique_users: i32,
    pub cumulative_unique_depositors: i32,
    pub cumulative_unique_borrowers: i32,
    pub cumulative_unique_liquidators: i32,
    pub cumulative_unique_liquidatees: i32,
    pub cumulative_unique_flashloaners: i32,

    pub total_pool_count: i32,
    pub market_ids: Vec<String>,
    pub counts: TransactionCounts,

    pub last_update_timestamp: u64,
    pub last_update_block_number: u64,
}

impl_entity!(LendingProtocol, "LendingProtocol");

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Market {
    pub id: String,
    pub protocol: String,
    pub name: String,
    pub is_active: bool,

    pub input_token: String,
    /// Receipt token; the zero address until the market reports one
    pub output_token: String,

    pub input_token_balance: BigInt,
    pub output_token_supply: BigInt,
    pub borrowed_token_balance: BigInt,
    pub input_token_price_usd: BigDecimal,

    /// This market's recorded contribution to the protocol TVL
    pub total_value_locked_usd: BigDecimal,
    pub total_deposit_balance_usd: BigDecimal,
    pub total_borrow_balance_usd: BigDecimal,

    pub cumulative_deposit_usd: BigDecimal,
    pub cumulative_borrow_usd: BigDecimal,
    pub cumulative_liquidate_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_volume_in_usd: BigDecimal,
    pub cumulative_volume_out_usd: BigDecimal,
    pub cumulative_flashloan_usd: BigDecimal,
    pub cumulative_supply_side_revenue_usd: BigDecimal,
    pub cumulative_protocol_side_revenue_usd: BigDecimal,
    pub cumulative_total_revenue_usd: BigDecimal,

    /// Protocol-side fraction of interest and fees
    pub reserve_factor: BigDecimal,
    /// Liquidation bonus in percent
    pub liquidation_penalty: BigDecimal,

    pub rates: Vec<String>,
    pub rewards: RewardEmissions,

    pub cumulative_unique_users: i32,
    pub cumulative_unique_depositors: i32,
    pub cumulative_unique_borrowers: i32,
    pub cumulative_unique_liquidators: i32,
    pub cumulative_unique_liquidatees: i32,
    pub cumulative_unique_flashloaners: i32,
    pub counts: TransactionCounts,

    pub created_timestamp: u64,
    pub created_block_number: u64,
}

impl_entity!(Market, "Market");

/// Counters accumulated only inside one snapshot bucket
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketActivity {
    pub deposit_usd: BigDecimal,
    pub withdraw_usd: BigDecimal,
    pub borrow_usd: BigDecimal,
    pub repay_usd: BigDecimal,
    pub liquidate_usd: BigDecimal,
    pub volume_usd: BigDecimal,
    pub flashloan_usd: BigDecimal,
    pub supply_side_revenue_usd: BigDecimal,
    pub protocol_side_revenue_usd: BigDecimal,
    pub total_revenue_usd: BigDecimal,
    pub active_users: i32,
    pub counts: TransactionCounts,
}

impl BucketActivity {
    /// USD amounts are magnitudes; direction is carried by the kind
    pub fn record_leaf(&mut self, kind: LeafKind, amount_usd: &BigDecimal) {
        let field = match kind {
            LeafKind::Deposit => &mut self.deposit_usd,
            LeafKind::Withdraw => &mut self.withdraw_usd,
            LeafKind::Borrow => &mut self.borrow_usd,
            LeafKind::Repay => &mut self.repay_usd,
            LeafKind::Liquidate => &mut self.liquidate_usd,
            LeafKind::Swap => &mut self.volume_usd,
            LeafKind::Flashloan => &mut self.flashloan_usd,
        };
        *field = field.clone() + amount_usd.clone();
        self.counts.record(kind);
    }

    pub fn record_revenue(&mut self, protocol_side_usd: &BigDecimal, supply_side_usd: &BigDecimal) {
        self.protocol_side_revenue_usd =
            self.protocol_side_revenue_usd.clone() + protocol_side_usd.clone();
        self.supply_side_revenue_usd =
            self.supply_side_revenue_usd.clone() + supply_side_usd.clone();
        self.total_revenue_usd = self.total_revenue_usd.clone()
            + protocol_side_usd.clone()
            + supply_side_usd.clone();
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarketSnapshot<P: Period> {
    pub id: String,
    pub market: String,
    pub protocol: String,
    pub bucket: u64,
    pub timestamp: u64,
    pub block_number: u64,

    pub input_token_balance: BigInt,
    pub borrowed_token_balance: BigInt,
    pub input_token_price_usd: BigDecimal,
    pub total_value_locked_usd: BigDecimal,
    pub total_deposit_balance_usd: BigDecimal,
    pub total_borrow_balance_usd: BigDecimal,
    pub cumulative_deposit_usd: BigDecimal,
    pub cumulative_borrow_usd: BigDecimal,
    pub cumulative_liquidate_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_volume_in_usd: BigDecimal,
    pub cumulative_volume_out_usd: BigDecimal,
    pub cumulative_flashloan_usd: BigDecimal,
    pub cumulative_supply_side_revenue_usd: BigDecimal,
    pub cumulative_protocol_side_revenue_usd: BigDecimal,
    pub cumulative_total_revenue_usd: BigDecimal,
    pub cumulative_unique_users: i32,
    pub cumulative_unique_depositors: i32,
    pub cumulative_unique_borrowers: i32,
    pub cumulative_unique_liquidators: i32,
    pub cumulative_unique_liquidatees: i32,
    pub cumulative_unique_flashloaners: i32,
    /// Lifetime counters of the market at the last refresh
    pub counts: TransactionCounts,
    pub rewards: RewardEmissions,

    pub activity: BucketActivity,

    pub _period: PhantomData<P>,
}

impl<P: Period> MarketSnapshot<P> {
    /// Copy the market's point-in-time and cumulative fields
    pub fn sync_from(&mut self, market: &Market, timestamp: u64, block_number: u64) {
        self.timestamp = timestamp;
        self.block_number = block_number;
        self.input_token_balance = market.input_token_balance.clone();
        self.borrowed_token_balance = market.borrowed_token_balance.clone();
        self.input_token_price_usd = market.input_token_price_usd.clone();
        self.total_value_locked_usd = market.total_value_locked_usd.clone();
        self.total_deposit_balance_usd = market.total_deposit_balance_usd.clone();
        self.total_borrow_balance_usd = market.total_borrow_balance_usd.clone();
        self.cumulative_deposit_usd = market.cumulative_deposit_usd.clone();
        self.cumulative_borrow_usd = market.cumulative_borrow_usd.clone();
        self.cumulative_liquidate_usd = market.cumulative_liquidate_usd.clone();
        self.cumulative_volume_usd = market.cumulative_volume_usd.clone();
        self.cumulative_volume_in_usd = market.cumulative_volume_in_usd.clone();
        self.cumulative_volume_out_usd = market.cumulative_volume_out_usd.clone();
        self.cumulative_flashloan_usd = market.cumulative_flashloan_usd.clone();
        self.cumulative_supply_side_revenue_usd = market.cumulative_supply_side_revenue_usd.clone();
        self.cumulative_protocol_side_revenue_usd =
            market.cumulative_protocol_side_revenue_usd.clone();
        self.cumulative_total_revenue_usd = market.cumulative_total_revenue_usd.clone();
        self.cumulative_unique_users = market.cumulative_unique_users;
        self.cumulative_unique_depositors = market.cumulative_unique_depositors;
        self.cumulative_unique_borrowers = market.cumulative_unique_borrowers;
        self.cumulative_unique_liquidators = market.cumulative_unique_liquidators;
        self.cumulative_unique_liquidatees = market.cumulative_unique_liquidatees;
        self.cumulative_unique_flashloaners = market.cumulative_unique_flashloaners;
        self.counts = market.counts.clone();
        self.rewards = market.rewards.clone();
    }
}

impl<P: Period> Entity for MarketSnapshot<P> {
    const ENTITY_TYPE: &'static str = P::MARKET_SNAPSHOT;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type MarketDailySnapshot = MarketSnapshot<Daily>;
pub type MarketHourlySnapshot = MarketSnapshot<Hourly>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProtocolSnapshot<P: Period> {
    pub id: String,
    pub protocol: String,
    pub bucket: u64,
    pub timestamp: u64,
    pub block_number: u64,

    pub total_value_locked_usd: BigDecimal,
    pub total_deposit_balance_usd: BigDecimal,
    pub total_borrow_balance_usd: BigDecimal,
    pub cumulative_deposit_usd: BigDecimal,
    pub cumulative_borrow_usd: BigDecimal,
    pub cumulative_liquidate_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_flashloan_usd: BigDecimal,
    pub cumulative_supply_side_revenue_usd: BigDecimal,
    pub cumulative_protocol_side_revenue_usd: BigDecimal,
    pub cumulative_total_revenue_usd: BigDecimal,
    pub cumulative_unique_users: i32,
    pub cumulative_unique_depositors: i32,
    pub cumulative_unique_borrowers: i32,
    pub cumulative_unique_liquidators: i32,
    pub cumulative_unique_liquidatees: i32,
    pub cumulative_unique_flashloaners: i32,
    pub total_pool_count: i32,
    /// Lifetime counters of the protocol at the last refresh
    pub counts: TransactionCounts,

    pub activity: BucketActivity,

    pub _period: PhantomData<P>,
}

impl<P: Period> ProtocolSnapshot<P> {
    pub fn sync_from(&mut self, protocol: &LendingProtocol, timestamp: u64, block_number: u64) {
        self.timestamp = timestamp;
        self.block_number = block_number;
        self.total_value_locked_usd = protocol.total_value_locked_usd.clone();
        self.total_deposit_balance_usd = protocol.total_deposit_balance_usd.clone();
        self.total_borrow_balance_usd = protocol.total_borrow_balance_usd.clone();
        self.cumulative_deposit_usd = protocol.cumulative_deposit_usd.clone();
        self.cumulative_borrow_usd = protocol.cumulative_borrow_usd.clone();
        self.cumulative_liquidate_usd = protocol.cumulative_liquidate_usd.clone();
        self.cumulative_volume_usd = protocol.cumulative_volume_usd.clone();
        self.cumulative_flashloan_usd = protocol.cumulative_flashloan_usd.clone();
        self.cumulative_supply_side_revenue_usd =
            protocol.cumulative_supply_side_revenue_usd.clone();
        self.cumulative_protocol_side_revenue_usd =
            protocol.cumulative_protocol_side_revenue_usd.clone();
        self.cumulative_total_revenue_usd = protocol.cumulative_total_revenue_usd.clone();
        self.cumulative_unique_users = protocol.cumulative_unique_users;
        self.cumulative_unique_depositors = protocol.cumulative_unique_depositors;
        self.cumulative_unique_borrowers = protocol.cumulative_unique_borrowers;
        self.cumulative_unique_liquidators = protocol.cumulative_unique_liquidators;
        self.cumulative_unique_liquidatees = protocol.cumulative_unique_liquidatees;
        self.cumulative_unique_flashloaners = protocol.cumulative_unique_flashloaners;
        self.total_pool_count = protocol.total_pool_count;
        self.counts = protocol.counts.clone();
    }
}

impl<P: Period> Entity for ProtocolSnapshot<P> {
    const ENTITY_TYPE: &'static str = P::PROTOCOL_SNAPSHOT;

    fn id(&self) -> &str {
        &self.id
    }
}

pub type ProtocolDailySnapshot = ProtocolSnapshot<Daily>;
pub type ProtocolHourlySnapshot = ProtocolSnapshot<Hourly>;

/// Immutable record of one leaf event
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRecord {
    pub id: String,
    pub kind: LeafKind,
    pub hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub timestamp: u64,
    pub protocol: String,
    pub market: String,
    pub account: String,
    /// Liquidatee for liquidations, recipient for swaps
    pub counterparty: Option<String>,
    pub asset: String,
    /// Signed token amount as applied to the market balance. Flash loans
    /// leave balances untouched and carry the borrowed amount.
    pub amount: BigInt,
    pub amount_usd: BigDecimal,
    pub profit_usd: Option<BigDecimal>,
}

impl_entity!(TransactionRecord, "TransactionRecord");

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u64,
    pub last_price_usd: BigDecimal,
    pub last_price_block_number: u64,
}

impl_entity!(Token, "Token");

/// Side of a two-stream incentive program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardSide {
    Deposit,
    Borrow,
}

impl RewardSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardSide::Deposit => "DEPOSIT",
            RewardSide::Borrow => "BORROW",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RewardToken {
    pub id: String,
    pub token: String,
    pub side: RewardSide,
}

impl_entity!(RewardToken, "RewardToken");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateSide {
    Lender,
    Borrower,
}

impl RateSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSide::Lender => "LENDER",
            RateSide::Borrower => "BORROWER",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateType {
    Variable,
    Stable,
    Fixed,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Variable => "VARIABLE",
            RateType::Stable => "STABLE",
            RateType::Fixed => "FIXED",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterestRate {
    pub id: String,
    pub market: String,
    pub side: RateSide,
    pub rate_type: RateType,
    /// Annualized percentage
    pub rate: BigDecimal,
}

impl_entity!(InterestRate, "InterestRate");

/// Permanent marker: the address has been seen by the protocol
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub id: String,
}

impl_entity!(Account, "Account");

/// Marker: the address was active inside one bucket
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveAccount<P: Period> {
    pub id: String,
    pub _period: PhantomData<P>,
}

impl<P: Period> Entity for ActiveAccount<P> {
    const ENTITY_TYPE: &'static str = P::ACTIVE_ACCOUNT;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Marker for role-scoped first-time detection (`{scope}-{role}-{address}`)
#[derive(Clone, Debug, PartialEq)]
pub struct UsageMarker {
    pub id: String,
}

impl_entity!(UsageMarker, "UsageMarker");

/// Marker for an event that has been fully processed (`{tx_hash}-{log_index}`)
#[derive(Clone, Debug, PartialEq)]
pub struct EventReceipt {
    pub id: String,
    pub block_number: u64,
}

impl_entity!(EventReceipt, "EventReceipt");

/// Moving-window block speed estimate for per-block reward rates
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockRateTracker {
    pub id: String,
    /// `(timestamp, block_number)` samples, oldest first
    pub samples: Vec<(u64, u64)>,
    pub blocks_per_day: BigDecimal,
}

impl_entity!(BlockRateTracker, "BlockRateTracker");
