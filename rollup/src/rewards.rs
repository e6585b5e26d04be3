// ─────────────────────────────────────────────────────────────────────────────
// Reward emissions
// ─────────────────────────────────────────────────────────────────────────────
//
// On-chain reward speeds are a token amount per second (or per block). The
// market exposes them as a daily emission amount plus its USD value, with
// token ids, amounts and USD values index-aligned.

use rollup_common::{safe_div, uint256_to_bigint, SECONDS_PER_DAY};
use substreams::log;
use substreams::scalar::{BigDecimal, BigInt};

use crate::chain::{ChainReader, PriceOracle};
use crate::config::RewardInterval;
use crate::constants::{
    methods, BLOCK_RATE_TRACKER_ID, BLOCK_SAMPLE_CAPACITY, BLOCK_SAMPLE_INTERVAL_SECONDS,
    REWARD_BORROW_INDEX, REWARD_DEPOSIT_INDEX,
};
use crate::registry::Registry;
use crate::schema::{BlockRateTracker, Market, RewardSide};
use crate::store::EntityStore;

/// `rate * bucket_seconds / 10^decimals`
pub fn emissions_per_bucket(rate: &BigInt, bucket_seconds: u64, decimals: u64) -> BigDecimal {
    rate.to_decimal(decimals) * BigDecimal::from(bucket_seconds)
}

/// `rate * blocks_per_bucket / 10^decimals`
pub fn emissions_per_blocks(rate: &BigInt, blocks_per_bucket: &BigDecimal, decimals: u64) -> BigDecimal {
    rate.to_decimal(decimals) * blocks_per_bucket.clone()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RewardState {
    #[default]
    Uninitialized,
    /// Deposit and borrow slots exist with zero emissions
    Initialized,
    Updated,
}

/// Reward token ids with their emission amounts and USD values.
///
/// The three arrays are only mutated together, so their lengths always match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RewardEmissions {
    state: RewardState,
    fixed_slots: bool,
    tokens: Vec<String>,
    amounts: Vec<BigDecimal>,
    amounts_usd: Vec<BigDecimal>,
}

impl RewardEmissions {
    pub fn state(&self) -> RewardState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn amounts(&self) -> &[BigDecimal] {
        &self.amounts
    }

    pub fn amounts_usd(&self) -> &[BigDecimal] {
        &self.amounts_usd
    }

    /// Lay out `[0] = deposit, [1] = borrow` with zero emissions.
    /// No-op once initialized.
    pub fn initialize_slots(&mut self, deposit_reward: String, borrow_reward: String) {
        if self.state != RewardState::Uninitialized {
            return;
        }

        self.tokens = vec![deposit_reward, borrow_reward];
        self.amounts = vec![BigDecimal::zero(), BigDecimal::zero()];
        self.amounts_usd = vec![BigDecimal::zero(), BigDecimal::zero()];
        self.fixed_slots = true;
        self.state = RewardState::Initialized;
    }

    /// Overwrite one slot; `false` when the slot does not exist
    pub fn set_slot(&mut self, index: usize, amount: BigDecimal, amount_usd: BigDecimal) -> bool {
        if index >= self.tokens.len() {
            return false;
        }

        self.amounts[index] = amount;
        self.amounts_usd[index] = amount_usd;
        self.state = RewardState::Updated;
        true
    }

    /// Update the token's entry in place, or insert it.
    ///
    /// New tokens keep the token list sorted. With fixed slots they are
    /// appended after the deposit/borrow pair instead.
    pub fn upsert(&mut self, token: &str, amount: BigDecimal, amount_usd: BigDecimal) {
        if let Some(index) = self.tokens.iter().position(|existing| existing == token) {
            self.set_slot(index, amount, amount_usd);
            return;
        }

        let index = if self.fixed_slots {
            self.tokens.len()
        } else {
            self.tokens.partition_point(|existing| existing.as_str() < token)
        };
        self.tokens.insert(index, token.to_string());
        self.amounts.insert(index, amount);
        self.amounts_usd.insert(index, amount_usd);
        self.state = RewardState::Updated;
    }
}

// ─── Market reward update ────────────────────────────────────────────────────

/// Refresh the deposit/borrow emissions of a market.
///
/// Before the program's activation block (or without a program) the market
/// is left untouched and `Uninitialized` is returned.
pub fn update_market_rewards<S, R, P>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    market: &mut Market,
    block_number: u64,
    timestamp: u64,
) -> RewardState
where
    S: EntityStore,
    R: ChainReader,
    P: PriceOracle,
{
    let program = match registry.config().rewards.clone() {
        Some(program) => program,
        None => return RewardState::Uninitialized,
    };
    if block_number < program.activation_block {
        return RewardState::Uninitialized;
    }

    if market.rewards.state() == RewardState::Uninitialized {
        let deposit = registry.reward_token(RewardSide::Deposit, &program.deposit_token);
        let borrow = registry.reward_token(RewardSide::Borrow, &program.borrow_token);
        market.rewards.initialize_slots(deposit.id, borrow.id);
    }

    let blocks_per_day = match program.interval {
        RewardInterval::Block => {
            let seconds_per_block = registry.config().seconds_per_block.clone();
            Some(record_block(
                registry.store_mut(),
                timestamp,
                block_number,
                &seconds_per_block,
            ))
        }
        RewardInterval::Timestamp => None,
    };

    let streams = [
        (
            REWARD_DEPOSIT_INDEX,
            methods::SUPPLY_REWARD_SPEEDS,
            program.deposit_token.as_str(),
        ),
        (
            REWARD_BORROW_INDEX,
            methods::BORROW_REWARD_SPEEDS,
            program.borrow_token.as_str(),
        ),
    ];

    for (index, method, reward_token) in streams {
        let rate = read_reward_speed(registry.reader(), &program.distributor, method, &market.id, block_number);
        let decimals = registry.token(reward_token, block_number).decimals;

        let amount = match &blocks_per_day {
            Some(blocks) => emissions_per_blocks(&rate, blocks, decimals),
            None => emissions_per_bucket(&rate, SECONDS_PER_DAY, decimals),
        };

        let price = match oracle.price_usd(reward_token, block_number) {
            Some(price) => price,
            None => {
                log::info!(
                    "[update_market_rewards] no price for reward token {} at block {}",
                    reward_token,
                    block_number
                );
                BigDecimal::zero()
            }
        };
        let amount_usd = amount.clone() * price;

        market.rewards.set_slot(index, amount, amount_usd);
    }

    market.rewards.state()
}

/// Record an emission pushed by a rewards controller event.
///
/// The reward token's entry is updated in place or inserted through
/// [`RewardEmissions::upsert`], so one market can carry several reward
/// tokens per side.
pub fn apply_reward_emission<S, R, P>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    market: &mut Market,
    side: RewardSide,
    reward_token: &str,
    emission_per_second: &BigInt,
    block_number: u64,
) where
    S: EntityStore,
    R: ChainReader,
    P: PriceOracle,
{
    let reward = registry.reward_token(side, reward_token);
    let decimals = registry.token(reward_token, block_number).decimals;

    let amount = emissions_per_bucket(&emission_per_second.absolute(), SECONDS_PER_DAY, decimals);
    let price = match oracle.price_usd(reward_token, block_number) {
        Some(price) => price,
        None => {
            log::info!(
                "[apply_reward_emission] no price for reward token {} at block {}",
                reward_token,
                block_number
            );
            BigDecimal::zero()
        }
    };
    let amount_usd = amount.clone() * price;

    market.rewards.upsert(&reward.id, amount, amount_usd);
}

fn read_reward_speed<R: ChainReader>(
    reader: &R,
    distributor: &str,
    method: &str,
    market: &str,
    block_number: u64,
) -> BigInt {
    match reader
        .call(distributor, method, &[market.to_string()], block_number)
        .and_then(|data| data.get(0..32).map(uint256_to_bigint))
    {
        Some(rate) => rate,
        None => {
            log::info!(
                "[read_reward_speed] {}({}) reverted at block {}, using 0",
                method,
                market,
                block_number
            );
            BigInt::zero()
        }
    }
}

// ─── Block speed ─────────────────────────────────────────────────────────────

/// Record a `(timestamp, block)` sample and return the estimated blocks per day.
///
/// Samples are taken at most every `BLOCK_SAMPLE_INTERVAL_SECONDS` and the
/// oldest is evicted past `BLOCK_SAMPLE_CAPACITY`, giving a moving 24h window.
/// Until two samples exist the estimate comes from `seconds_per_block`.
pub fn record_block<S: EntityStore>(
    store: &mut S,
    timestamp: u64,
    block_number: u64,
    seconds_per_block: &BigDecimal,
) -> BigDecimal {
    let mut tracker = store
        .load::<BlockRateTracker>(BLOCK_RATE_TRACKER_ID)
        .unwrap_or_else(|| BlockRateTracker {
            id: BLOCK_RATE_TRACKER_ID.to_string(),
            samples: Vec::with_capacity(BLOCK_SAMPLE_CAPACITY),
            blocks_per_day: safe_div(&BigDecimal::from(SECONDS_PER_DAY), seconds_per_block),
        });

    let due = match tracker.samples.last() {
        Some((last_timestamp, _)) => {
            timestamp >= last_timestamp.saturating_add(BLOCK_SAMPLE_INTERVAL_SECONDS)
        }
        None => true,
    };

    if due {
        tracker.samples.push((timestamp, block_number));
        if tracker.samples.len() > BLOCK_SAMPLE_CAPACITY {
            tracker.samples.remove(0);
        }

        if let (Some(first), Some(last)) = (tracker.samples.first(), tracker.samples.last()) {
            let elapsed = last.0.saturating_sub(first.0);
            let blocks = last.1.saturating_sub(first.1);
            if elapsed > 0 && blocks > 0 {
                tracker.blocks_per_day = BigDecimal::from(blocks) * BigDecimal::from(SECONDS_PER_DAY)
                    / BigDecimal::from(elapsed);
            }
        }
        store.save(&tracker);
    }

    tracker.blocks_per_day
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::store::MemoryStore;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn emission_math() {
        // 0.5 tokens/s with 18 decimals → 43200 tokens/day
        let rate = BigInt::from(500_000_000_000_000_000u64);
        assert_eq!(emissions_per_bucket(&rate, SECONDS_PER_DAY, 18), dec("43200"));
        assert_eq!(emissions_per_bucket(&rate, 3_600, 18), dec("1800"));

        let per_block = BigInt::from(2_000_000u64);
        assert_eq!(emissions_per_blocks(&per_block, &dec("7200"), 6), dec("14400"));
    }

    #[test]
    fn slots_stay_aligned() {
        let mut rewards = RewardEmissions::default();
        assert_eq!(rewards.state(), RewardState::Uninitialized);
        assert!(!rewards.set_slot(REWARD_BORROW_INDEX, dec("1"), dec("1")));

        rewards.initialize_slots("DEPOSIT-0xcomp".to_string(), "BORROW-0xcomp".to_string());
        assert_eq!(rewards.state(), RewardState::Initialized);
        assert_eq!(rewards.amounts(), &[BigDecimal::zero(), BigDecimal::zero()]);

        assert!(rewards.set_slot(REWARD_BORROW_INDEX, dec("10"), dec("25")));
        assert_eq!(rewards.state(), RewardState::Updated);
        assert_eq!(rewards.tokens()[REWARD_DEPOSIT_INDEX], "DEPOSIT-0xcomp");
        assert_eq!(rewards.amounts()[REWARD_BORROW_INDEX], dec("10"));
        assert_eq!(rewards.amounts_usd()[REWARD_BORROW_INDEX], dec("25"));

        // re-initializing keeps existing values
        rewards.initialize_slots("DEPOSIT-0xother".to_string(), "BORROW-0xother".to_string());
        assert_eq!(rewards.tokens()[REWARD_DEPOSIT_INDEX], "DEPOSIT-0xcomp");

        rewards.upsert("DEPOSIT-0xaave", dec("1"), dec("2"));
        assert_eq!(rewards.tokens()[REWARD_DEPOSIT_INDEX], "DEPOSIT-0xcomp");
        assert_eq!(rewards.len(), 3);
        assert_eq!(rewards.amounts().len(), rewards.amounts_usd().len());
    }

    #[test]
    fn upsert_keeps_tokens_sorted() {
        let mut rewards = RewardEmissions::default();
        rewards.upsert("DEPOSIT-0xb", dec("2"), dec("20"));
        rewards.upsert("BORROW-0xa", dec("1"), dec("10"));
        rewards.upsert("DEPOSIT-0xa", dec("3"), dec("30"));
        rewards.upsert("BORROW-0xa", dec("4"), dec("40"));

        assert_eq!(rewards.tokens(), &["BORROW-0xa", "DEPOSIT-0xa", "DEPOSIT-0xb"]);
        assert_eq!(rewards.amounts(), &[dec("4"), dec("3"), dec("2")]);
        assert_eq!(rewards.amounts_usd(), &[dec("40"), dec("30"), dec("20")]);
    }

    #[test]
    fn block_rate_tracker_estimates_from_samples() {
        let mut store = MemoryStore::new();
        let default = dec("12");

        // no samples yet: 86400 / 12
        assert_eq!(record_block(&mut store, 1_000, 100, &default), dec("7200"));

        // too close to the last sample, ignored
        assert_eq!(record_block(&mut store, 1_100, 110, &default), dec("7200"));

        // 50 blocks in 600s → 2s blocks
        assert_eq!(record_block(&mut store, 1_600, 400, &default), dec("43200"));

        let tracker: BlockRateTracker = store.load(BLOCK_RATE_TRACKER_ID).unwrap();
        assert_eq!(tracker.samples, vec![(1_000, 100), (1_600, 400)]);
    }

    #[test]
    fn tracker_evicts_oldest_sample() {
        let mut store = MemoryStore::new();
        let default = dec("12");
        for i in 0..(BLOCK_SAMPLE_CAPACITY as u64 + 5) {
            record_block(&mut store, i * BLOCK_SAMPLE_INTERVAL_SECONDS, i * 50, &default);
        }

        let tracker: BlockRateTracker = store.load(BLOCK_RATE_TRACKER_ID).unwrap();
        assert_eq!(tracker.samples.len(), BLOCK_SAMPLE_CAPACITY);
        assert_eq!(tracker.samples[0], (5 * BLOCK_SAMPLE_INTERVAL_SECONDS, 250));
        assert_eq!(tracker.blocks_per_day, dec("7200"));
    }

    // ─── State machine ───────────────────────────────────────────────────────

    const PROTOCOL: &str = "0x486af39519b4dc9a7fccd318217352830e8ad9b4";
    const DISTRIBUTOR: &str = "0x3d9819210a31b4961b30ef54be2aed79b9c9cd3b";
    const COMP: &str = "0xc00e94cb662c3520282e6f5717214004a7f26888";
    const MARKET: &str = "0x5d3a536e4d6dbd6114cc1ead35777bab948e3643";

    struct Speeds;

    impl ChainReader for Speeds {
        fn call(&self, contract: &str, method: &str, args: &[String], _: u64) -> Option<Vec<u8>> {
            let mut word = vec![0u8; 32];
            match (contract, method) {
                (DISTRIBUTOR, methods::SUPPLY_REWARD_SPEEDS) if args[0] == MARKET => {
                    // 1e16 per second
                    word[24..].copy_from_slice(&10_000_000_000_000_000u64.to_be_bytes());
                    Some(word)
                }
                (COMP, methods::DECIMALS) => {
                    word[31] = 18;
                    Some(word)
                }
                _ => None,
            }
        }
    }

    struct CompPrice;

    impl PriceOracle for CompPrice {
        fn price_usd(&self, token: &str, _: u64) -> Option<BigDecimal> {
            (token == COMP).then(|| dec("50"))
        }
    }

    fn config() -> ProtocolConfig {
        ProtocolConfig::from_params(&format!(
            r#"{{"protocolId": "{PROTOCOL}", "name": "Compound", "slug": "compound", "network": "mainnet",
                "rewards": {{"activationBlock": 1000, "distributor": "{DISTRIBUTOR}",
                             "depositToken": "{COMP}", "borrowToken": "{COMP}", "interval": "timestamp"}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn rewards_are_gated_by_activation_block() {
        let config = config();
        let mut store = MemoryStore::new();
        let mut registry = Registry::new(&mut store, &Speeds, &config);
        let mut market = registry.market(MARKET, 10, 1);

        let state = update_market_rewards(&mut registry, &CompPrice, &mut market, 999, 1);
        assert_eq!(state, RewardState::Uninitialized);
        assert!(market.rewards.is_empty());

        let state = update_market_rewards(&mut registry, &CompPrice, &mut market, 1_000, 1);
        assert_eq!(state, RewardState::Updated);
        assert_eq!(
            market.rewards.tokens(),
            &[format!("DEPOSIT-{COMP}"), format!("BORROW-{COMP}")]
        );

        // 0.01 COMP/s → 864 COMP/day at $50
        assert_eq!(market.rewards.amounts()[REWARD_DEPOSIT_INDEX], dec("864"));
        assert_eq!(market.rewards.amounts_usd()[REWARD_DEPOSIT_INDEX], dec("43200"));

        // borrow speed reverted → zero, slot still present
        assert!(market.rewards.amounts()[REWARD_BORROW_INDEX].is_zero());
        assert!(market.rewards.amounts_usd()[REWARD_BORROW_INDEX].is_zero());
    }

    #[test]
    fn pushed_emissions_are_upserted_in_token_order() {
        const OP: &str = "0x4200000000000000000000000000000000000042";

        let config = ProtocolConfig::from_params(&format!(
            r#"{{"protocolId": "{PROTOCOL}", "name": "Aave", "slug": "aave", "network": "optimism"}}"#
        ))
        .unwrap();
        let mut store = MemoryStore::new();
        let mut registry = Registry::new(&mut store, &Speeds, &config);
        let mut market = registry.market(MARKET, 10, 1);

        // 1e16/s of an 18-decimals token → 864/day
        let rate = BigInt::from(10_000_000_000_000_000u64);
        apply_reward_emission(&mut registry, &CompPrice, &mut market, RewardSide::Deposit, COMP, &rate, 10);
        apply_reward_emission(&mut registry, &CompPrice, &mut market, RewardSide::Borrow, COMP, &rate, 10);
        // OP reverts decimals() and has no price: 18 decimals, zero USD
        apply_reward_emission(&mut registry, &CompPrice, &mut market, RewardSide::Borrow, OP, &rate, 10);

        assert_eq!(
            market.rewards.tokens(),
            &[format!("BORROW-{OP}"), format!("BORROW-{COMP}"), format!("DEPOSIT-{COMP}")]
        );
        assert_eq!(market.rewards.amounts()[2], dec("864"));
        assert_eq!(market.rewards.amounts_usd()[2], dec("43200"));
        assert!(market.rewards.amounts_usd()[0].is_zero());

        // a new emission for an existing token overwrites its entry
        apply_reward_emission(&mut registry, &CompPrice, &mut market, RewardSide::Deposit, COMP, &BigInt::zero(), 11);
        assert_eq!(market.rewards.len(), 3);
        assert!(market.rewards.amounts()[2].is_zero());
        assert_eq!(market.rewards.state(), RewardState::Updated);
        assert!(registry.store().exists::<crate::schema::RewardToken>(&format!("BORROW-{OP}")));
    }
}
