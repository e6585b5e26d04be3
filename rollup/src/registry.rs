// ─────────────────────────────────────────────────────────────────────────────
// Get-or-create for the aggregate hierarchy
// ─────────────────────────────────────────────────────────────────────────────
//
// protocol → market → daily/hourly snapshot. Creating a child creates its
// owner first, so a snapshot never points at a missing market or protocol.

use substreams::log;
use substreams::scalar::BigDecimal;

use crate::chain::{read_address, read_decimals, read_name, read_symbol, ChainReader};
use crate::config::ProtocolConfig;
use crate::constants::methods;
use crate::schema::{
    Entity, InterestRate, LendingProtocol, Market, MarketSnapshot, Period, ProtocolSnapshot,
    RateSide, RateType, RewardSide, RewardToken, Token,
};
use crate::store::EntityStore;

/// An entity that can be built from a key when it does not exist yet
pub trait Aggregate: Entity {
    type Key;

    fn entity_id(key: &Self::Key) -> String;

    /// Build the zero-valued entity. May create and save owners.
    fn create<S: EntityStore, R: ChainReader>(
        key: &Self::Key,
        registry: &mut Registry<'_, S, R>,
    ) -> Self;
}

pub struct Registry<'a, S: EntityStore, R: ChainReader> {
    store: &'a mut S,
    reader: &'a R,
    config: &'a ProtocolConfig,
}

impl<'a, S: EntityStore, R: ChainReader> Registry<'a, S, R> {
    pub fn new(store: &'a mut S, reader: &'a R, config: &'a ProtocolConfig) -> Self {
        Self {
            store,
            reader,
            config,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        self.config
    }

    pub fn reader(&self) -> &R {
        self.reader
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut *self.store
    }

    pub fn save<E: Entity>(&mut self, entity: &E) {
        self.store.save(entity);
    }

    /// Load by id; when absent construct, persist and return
    pub fn get_or_create<A: Aggregate>(&mut self, key: &A::Key) -> A {
        let id = A::entity_id(key);
        if let Some(existing) = self.store.load::<A>(&id) {
            return existing;
        }

        let created = A::create(key, self);
        self.store.save(&created);
        created
    }

    pub fn protocol(&mut self) -> LendingProtocol {
        let protocol_id = self.config.protocol_id.clone();
        self.get_or_create::<LendingProtocol>(&protocol_id)
    }

    pub fn market(&mut self, market: &str, block_number: u64, timestamp: u64) -> Market {
        self.get_or_create::<Market>(&MarketKey {
            market: market.to_string(),
            input_token: None,
            block_number,
            timestamp,
        })
    }

    pub fn token(&mut self, token: &str, block_number: u64) -> Token {
        self.get_or_create::<Token>(&TokenKey {
            token: token.to_string(),
            block_number,
        })
    }

    pub fn market_snapshot<P: Period>(
        &mut self,
        market: &str,
        timestamp: u64,
        block_number: u64,
    ) -> MarketSnapshot<P> {
        self.get_or_create::<MarketSnapshot<P>>(&SnapshotKey {
            owner: market.to_string(),
            timestamp,
            block_number,
        })
    }

    pub fn protocol_snapshot<P: Period>(
        &mut self,
        timestamp: u64,
        block_number: u64,
    ) -> ProtocolSnapshot<P> {
        let owner = self.config.protocol_id.clone();
        self.get_or_create::<ProtocolSnapshot<P>>(&SnapshotKey {
            owner,
            timestamp,
            block_number,
        })
    }

    pub fn reward_token(&mut self, side: RewardSide, token: &str) -> RewardToken {
        self.get_or_create::<RewardToken>(&(side, token.to_string()))
    }

    /// Overwrite the rate in place and register its id on the market once
    pub fn update_interest_rate(
        &mut self,
        market: &mut Market,
        side: RateSide,
        rate_type: RateType,
        rate: BigDecimal,
    ) -> InterestRate {
        let id = interest_rate_id(side, rate_type, &market.id);
        let mut interest_rate = self.store.load::<InterestRate>(&id).unwrap_or(InterestRate {
            id: id.clone(),
            market: market.id.clone(),
            side,
            rate_type,
            rate: BigDecimal::zero(),
        });
        interest_rate.rate = rate;
        self.store.save(&interest_rate);

        if !market.rates.contains(&id) {
            market.rates.push(id);
        }
        interest_rate
    }
}

pub fn interest_rate_id(side: RateSide, rate_type: RateType, market: &str) -> String {
    format!("{}-{}-{market}", side.as_str(), rate_type.as_str())
}

pub fn snapshot_id<P: Period>(owner: &str, timestamp: u64) -> String {
    format!("{owner}-{}", P::bucket(timestamp))
}

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MarketKey {
    pub market: String,
    /// Known input token; when `None` it is read through `underlying()`
    pub input_token: Option<String>,
    pub block_number: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct TokenKey {
    pub token: String,
    pub block_number: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotKey {
    pub owner: String,
    pub timestamp: u64,
    pub block_number: u64,
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

impl Aggregate for LendingProtocol {
    type Key = String;

    fn entity_id(key: &String) -> String {
        key.clone()
    }

    fn create<S: EntityStore, R: ChainReader>(key: &String, registry: &mut Registry<'_, S, R>) -> Self {
        let config = registry.config();
        log::info!("[LendingProtocol::create] {} ({})", config.name, key);

        LendingProtocol {
            id: key.clone(),
            name: config.name.clone(),
            slug: config.slug.clone(),
            network: config.network.clone(),
            schema_version: config.schema_version.clone(),
            subgraph_version: config.subgraph_version.clone(),
            methodology_version: config.methodology_version.clone(),
            ..Default::default()
        }
    }
}

impl Aggregate for Market {
    type Key = MarketKey;

    fn entity_id(key: &MarketKey) -> String {
        key.market.clone()
    }

    fn create<S: EntityStore, R: ChainReader>(
        key: &MarketKey,
        registry: &mut Registry<'_, S, R>,
    ) -> Self {
        let input_token = match &key.input_token {
            Some(token) => token.clone(),
            None => read_address(
                registry.reader(),
                &key.market,
                methods::UNDERLYING,
                &[],
                key.block_number,
            ),
        };
        let token = registry.token(&input_token, key.block_number);

        let mut protocol = registry.protocol();
        protocol.total_pool_count += 1;
        protocol.market_ids.push(key.market.clone());
        registry.save(&protocol);

        log::info!(
            "[Market::create] {} input token {} ({}), pool count {}",
            key.market,
            input_token,
            token.symbol,
            protocol.total_pool_count
        );

        let config = registry.config();
        Market {
            id: key.market.clone(),
            protocol: protocol.id,
            name: token.name,
            is_active: true,
            input_token,
            output_token: rollup_common::ZERO_ADDRESS.to_string(),
            reserve_factor: config.default_reserve_factor.clone(),
            liquidation_penalty: config.default_liquidation_penalty.clone(),
            created_timestamp: key.timestamp,
            created_block_number: key.block_number,
            ..Default::default()
        }
    }
}

impl Aggregate for Token {
    type Key = TokenKey;

    fn entity_id(key: &TokenKey) -> String {
        key.token.clone()
    }

    fn create<S: EntityStore, R: ChainReader>(key: &TokenKey, registry: &mut Registry<'_, S, R>) -> Self {
        let reader = registry.reader();
        Token {
            id: key.token.clone(),
            name: read_name(reader, &key.token, key.block_number),
            symbol: read_symbol(reader, &key.token, key.block_number),
            decimals: read_decimals(reader, &key.token, key.block_number),
            last_price_usd: BigDecimal::zero(),
            last_price_block_number: 0,
        }
    }
}

impl<P: Period> Aggregate for MarketSnapshot<P> {
    type Key = SnapshotKey;

    fn entity_id(key: &SnapshotKey) -> String {
        snapshot_id::<P>(&key.owner, key.timestamp)
    }

    fn create<S: EntityStore, R: ChainReader>(
        key: &SnapshotKey,
        registry: &mut Registry<'_, S, R>,
    ) -> Self {
        let market = registry.market(&key.owner, key.block_number, key.timestamp);

        let mut snapshot = MarketSnapshot::<P> {
            id: Self::entity_id(key),
            market: market.id.clone(),
            protocol: market.protocol.clone(),
            bucket: P::bucket(key.timestamp),
            ..Default::default()
        };
        snapshot.sync_from(&market, key.timestamp, key.block_number);
        snapshot
    }
}

impl<P: Period> Aggregate for ProtocolSnapshot<P> {
    type Key = SnapshotKey;

    fn entity_id(key: &SnapshotKey) -> String {
        snapshot_id::<P>(&key.owner, key.timestamp)
    }

    fn create<S: EntityStore, R: ChainReader>(
        key: &SnapshotKey,
        registry: &mut Registry<'_, S, R>,
    ) -> Self {
        let protocol = registry.get_or_create::<LendingProtocol>(&key.owner);

        let mut snapshot = ProtocolSnapshot::<P> {
            id: Self::entity_id(key),
            protocol: protocol.id.clone(),
            bucket: P::bucket(key.timestamp),
            ..Default::default()
        };
        snapshot.sync_from(&protocol, key.timestamp, key.block_number);
        snapshot
    }
}

impl Aggregate for RewardToken {
    type Key = (RewardSide, String);

    fn entity_id((side, token): &(RewardSide, String)) -> String {
        format!("{}-{token}", side.as_str())
    }

    fn create<S: EntityStore, R: ChainReader>(
        key: &(RewardSide, String),
        _registry: &mut Registry<'_, S, R>,
    ) -> Self {
        RewardToken {
            id: Self::entity_id(key),
            token: key.1.clone(),
            side: key.0,
        }
    }
}
