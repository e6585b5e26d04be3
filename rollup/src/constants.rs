// ─────────────────────────────────────────────────────────────────────────────
// Constants shared across the rollup engine
// ─────────────────────────────────────────────────────────────────────────────

pub use rollup_common::{SECONDS_PER_DAY, SECONDS_PER_HOUR, ZERO_ADDRESS};

/// Placeholder for identity strings an external read could not resolve
pub const UNKNOWN: &str = "unknown";

/// Decimals assumed for a token whose `decimals()` call reverted
pub const DEFAULT_DECIMALS: u64 = 18;

/// Percentage base used by liquidation penalties
pub const PERCENTAGE_BASE: u64 = 100;

/// Singleton id of the block-speed tracker
pub const BLOCK_RATE_TRACKER_ID: &str = "BLOCK_RATE_TRACKER";

/// Only record a new block sample when it is at least this far from the last one
pub const BLOCK_SAMPLE_INTERVAL_SECONDS: u64 = 600;

/// Moving window used to estimate block speed
pub const BLOCK_RATE_WINDOW_SECONDS: u64 = 86_400;

/// Upper bound of stored block samples (window / interval)
pub const BLOCK_SAMPLE_CAPACITY: usize = 144;

/// Fixed reward slot for the deposit-side incentive stream
pub const REWARD_DEPOSIT_INDEX: usize = 0;

/// Fixed reward slot for the borrow-side incentive stream
pub const REWARD_BORROW_INDEX: usize = 1;

/// Chain-reader method names used by the registry and reward calculator
pub mod methods {
    pub const NAME: &str = "name";
    pub const SYMBOL: &str = "symbol";
    pub const DECIMALS: &str = "decimals";
    pub const UNDERLYING: &str = "underlying";
    pub const SUPPLY_REWARD_SPEEDS: &str = "supplyRewardSpeeds";
    pub const BORROW_REWARD_SPEEDS: &str = "borrowRewardSpeeds";
}
