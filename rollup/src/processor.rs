// ─────────────────────────────────────────────────────────────────────────────
// Event processor
// ─────────────────────────────────────────────────────────────────────────────
//
// One event at a time, in chain order:
//
//   1. skip if the `{tx_hash}-{log_index}` receipt exists
//   2. get-or-create market and protocol
//   3. apply the event's deltas (propagator)
//   4. revalue the market at the current price (reconciler)
//   5. refresh reward emissions
//   6. count users, write the transaction record
//   7. save market + protocol, refresh daily/hourly snapshots
//   8. save the receipt
//
// Addresses are validated before anything is written, so a rejected event
// leaves the store untouched.

use rollup_common::{format_bigdecimal, is_zero_address};
use substreams::log;
use substreams::scalar::{BigDecimal, BigInt};

use crate::chain::{ChainReader, PriceOracle};
use crate::config::{
    is_valid_liquidation_penalty, is_valid_reserve_factor, parse_address, ProtocolConfig,
};
use crate::error::Error;
use crate::events::{EventMeta, LendingEvent};
use crate::propagator::{
    apply_interest_accrual, apply_leaf_event, apply_revenue, apply_swap, liquidation_profit_usd,
    SwapLeg,
};
use crate::reconciler::{record_token_price, revalue_market};
use crate::registry::{MarketKey, Registry};
use crate::rewards::{apply_reward_emission, update_market_rewards};
use crate::schema::{EventReceipt, LeafKind, LendingProtocol, Market, TransactionRecord};
use crate::snapshots::{refresh_snapshots, BucketDelta};
use crate::store::EntityStore;
use crate::usage::{track_user, Role};

pub struct Indexer<S, R, P> {
    store: S,
    reader: R,
    oracle: P,
    config: ProtocolConfig,
}

impl<S: EntityStore, R: ChainReader, P: PriceOracle> Indexer<S, R, P> {
    pub fn new(config: ProtocolConfig, store: S, reader: R, oracle: P) -> Self {
        Self {
            store,
            reader,
            oracle,
            config,
        }
    }

    pub fn from_params(params: &str, store: S, reader: R, oracle: P) -> Result<Self, Error> {
        Ok(Self::new(ProtocolConfig::from_params(params)?, store, reader, oracle))
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn oracle_mut(&mut self) -> &mut P {
        &mut self.oracle
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Process one event. Returns `false` when it was already processed.
    pub fn handle(&mut self, meta: &EventMeta, event: &LendingEvent) -> Result<bool, Error> {
        let event_id = meta.event_id();
        if self.store.exists::<EventReceipt>(&event_id) {
            log::debug!("[handle] {} {} already processed, skipping", event.name(), event_id);
            return Ok(false);
        }

        let mut registry = Registry::new(&mut self.store, &self.reader, &self.config);
        let oracle = &self.oracle;

        match event {
            LendingEvent::MarketListed {
                market,
                input_token,
                output_token,
            } => list_market(
                &mut registry,
                meta,
                market,
                input_token.as_deref(),
                output_token.as_deref(),
            )?,
            LendingEvent::Deposit {
                market,
                account,
                amount,
                output_amount,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Deposit,
                    market,
                    account,
                    liquidatee: None,
                    amount,
                    output_delta: Some(output_amount.absolute()),
                    fee: None,
                },
            )?,
            LendingEvent::Withdraw {
                market,
                account,
                amount,
                output_amount,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Withdraw,
                    market,
                    account,
                    liquidatee: None,
                    amount,
                    output_delta: Some(output_amount.absolute().neg()),
                    fee: None,
                },
            )?,
            LendingEvent::Borrow {
                market,
                account,
                amount,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Borrow,
                    market,
                    account,
                    liquidatee: None,
                    amount,
                    output_delta: None,
                    fee: None,
                },
            )?,
            LendingEvent::Repay {
                market,
                account,
                amount,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Repay,
                    market,
                    account,
                    liquidatee: None,
                    amount,
                    output_delta: None,
                    fee: None,
                },
            )?,
            LendingEvent::Liquidate {
                market,
                liquidator,
                liquidatee,
                amount,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Liquidate,
                    market,
                    account: liquidator,
                    liquidatee: Some(liquidatee.as_str()),
                    amount,
                    output_delta: None,
                    fee: None,
                },
            )?,
            LendingEvent::Swap {
                market,
                sender,
                recipient,
                token_in,
                amount_in,
                token_out,
                amount_out,
                fee,
            } => handle_swap(
                &mut registry,
                oracle,
                meta,
                Swap {
                    market,
                    sender,
                    recipient,
                    token_in,
                    amount_in,
                    token_out,
                    amount_out,
                    fee,
                },
            )?,
            LendingEvent::Flashloan {
                market,
                account,
                amount,
                fee,
            } => handle_leaf(
                &mut registry,
                oracle,
                meta,
                Leaf {
                    kind: LeafKind::Flashloan,
                    market,
                    account,
                    liquidatee: None,
                    amount,
                    output_delta: None,
                    fee: Some(fee),
                },
            )?,
            LendingEvent::RevenueAccrued { market, interest } => {
                accrue_revenue(&mut registry, oracle, meta, market, interest)?
            }
            LendingEvent::ReserveFactorUpdated {
                market,
                reserve_factor,
            } => update_market(&mut registry, meta, market, |market, _| {
                if is_valid_reserve_factor(reserve_factor) {
                    market.reserve_factor = reserve_factor.clone();
                } else {
                    log::info!(
                        "[handle] reserve factor {} outside [0, 1] on {}, keeping {}",
                        reserve_factor,
                        market.id,
                        market.reserve_factor
                    );
                }
            })?,
            LendingEvent::LiquidationPenaltyUpdated {
                market,
                liquidation_penalty,
            } => update_market(&mut registry, meta, market, |market, _| {
                if is_valid_liquidation_penalty(liquidation_penalty) {
                    market.liquidation_penalty = liquidation_penalty.clone();
                } else {
                    log::info!(
                        "[handle] negative liquidation penalty {} on {}, keeping {}",
                        liquidation_penalty,
                        market.id,
                        market.liquidation_penalty
                    );
                }
            })?,
            LendingEvent::InterestRateUpdated {
                market,
                side,
                rate_type,
                rate,
            } => update_market(&mut registry, meta, market, |market, registry| {
                registry.update_interest_rate(market, *side, *rate_type, rate.clone());
            })?,
            LendingEvent::RewardEmissionUpdated {
                market,
                side,
                reward_token,
                emission_per_second,
            } => {
                let reward_token = parse_address(reward_token)?;
                update_market(&mut registry, meta, market, |market, registry| {
                    apply_reward_emission(
                        registry,
                        oracle,
                        market,
                        *side,
                        &reward_token,
                        emission_per_second,
                        meta.block_number,
                    );
                })?
            }
            LendingEvent::PriceSync { market } => sync_price(&mut registry, oracle, meta, market)?,
        }

        registry.save(&EventReceipt {
            id: event_id,
            block_number: meta.block_number,
        });
        Ok(true)
    }

    /// Process a batch in chain order (block number, then log index).
    /// Returns how many events were applied.
    pub fn handle_all(&mut self, mut events: Vec<(EventMeta, LendingEvent)>) -> Result<usize, Error> {
        events.sort_by_key(|(meta, _)| (meta.block_number, meta.log_index));

        let mut applied = 0;
        for (meta, event) in &events {
            if self.handle(meta, event)? {
                applied += 1;
            }
        }
        Ok(applied)
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

struct Leaf<'e> {
    kind: LeafKind,
    market: &'e str,
    account: &'e str,
    liquidatee: Option<&'e str>,
    amount: &'e BigInt,
    /// Signed change of the receipt token supply
    output_delta: Option<BigInt>,
    /// Flash loan premium, in the input token
    fee: Option<&'e BigInt>,
}

fn handle_leaf<S: EntityStore, R: ChainReader, P: PriceOracle>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    meta: &EventMeta,
    leaf: Leaf<'_>,
) -> Result<(), Error> {
    let market_id = parse_address(leaf.market)?;
    let account = parse_address(leaf.account)?;
    let liquidatee = leaf.liquidatee.map(parse_address).transpose()?;

    let mut market = registry.market(&market_id, meta.block_number, meta.timestamp);
    let mut protocol = registry.protocol();

    let (price, decimals) = token_price(registry, oracle, &market.input_token, meta.block_number);
    let amount_usd = leaf.amount.absolute().to_decimal(decimals) * price.clone();

    let delta = apply_leaf_event(&mut market, &mut protocol, leaf.kind, leaf.amount, &amount_usd);
    if let Some(output_delta) = leaf.output_delta {
        market.output_token_supply = market.output_token_supply.clone() + output_delta;
    }
    let revenue = leaf.fee.map(|fee| {
        let fee_usd = fee.absolute().to_decimal(decimals) * price.clone();
        apply_revenue(&mut market, &mut protocol, &fee_usd)
    });
    revalue_market(&mut market, &mut protocol, &price, decimals);
    update_market_rewards(registry, oracle, &mut market, meta.block_number, meta.timestamp);

    track_user(
        registry.store_mut(),
        &mut protocol,
        &mut market,
        &account,
        Role::for_kind(leaf.kind),
    );
    if let Some(liquidatee) = &liquidatee {
        track_user(
            registry.store_mut(),
            &mut protocol,
            &mut market,
            liquidatee,
            Some(Role::Liquidatee),
        );
    }

    let profit_usd = match leaf.kind {
        LeafKind::Liquidate => Some(liquidation_profit_usd(&amount_usd, &market.liquidation_penalty)),
        _ => None,
    };
    let recorded_amount = match leaf.kind {
        LeafKind::Flashloan => leaf.amount.absolute(),
        _ => delta,
    };
    registry.save(&TransactionRecord {
        id: meta.event_id(),
        kind: leaf.kind,
        hash: meta.tx_hash.clone(),
        log_index: meta.log_index,
        block_number: meta.block_number,
        timestamp: meta.timestamp,
        protocol: protocol.id.clone(),
        market: market.id.clone(),
        account: account.clone(),
        counterparty: liquidatee.clone(),
        asset: market.input_token.clone(),
        amount: recorded_amount,
        amount_usd: amount_usd.clone(),
        profit_usd,
    });

    let mut bucket = BucketDelta::leaf(leaf.kind, amount_usd).with_account(&account);
    if let Some(revenue) = revenue {
        bucket = bucket.with_revenue(revenue);
    }
    if let Some(liquidatee) = &liquidatee {
        bucket = bucket.with_account(liquidatee);
    }
    commit(registry, meta, market, protocol, &bucket);
    Ok(())
}

struct Swap<'e> {
    market: &'e str,
    sender: &'e str,
    recipient: &'e str,
    token_in: &'e str,
    amount_in: &'e BigInt,
    token_out: &'e str,
    amount_out: &'e BigInt,
    fee: &'e BigInt,
}

fn handle_swap<S: EntityStore, R: ChainReader, P: PriceOracle>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    meta: &EventMeta,
    swap: Swap<'_>,
) -> Result<(), Error> {
    let market_id = parse_address(swap.market)?;
    let sender = parse_address(swap.sender)?;
    let recipient = parse_address(swap.recipient)?;
    let token_in = parse_address(swap.token_in)?;
    let token_out = parse_address(swap.token_out)?;

    let mut market = registry.market(&market_id, meta.block_number, meta.timestamp);
    let mut protocol = registry.protocol();

    let (price_in, decimals_in) = token_price(registry, oracle, &token_in, meta.block_number);
    let (price_out, decimals_out) = token_price(registry, oracle, &token_out, meta.block_number);

    let leg_in = SwapLeg {
        token: token_in.clone(),
        amount: swap.amount_in.clone(),
        amount_usd: swap.amount_in.absolute().to_decimal(decimals_in) * price_in.clone(),
    };
    let leg_out = SwapLeg {
        token: token_out.clone(),
        amount: swap.amount_out.clone(),
        amount_usd: swap.amount_out.absolute().to_decimal(decimals_out) * price_out.clone(),
    };
    let fee_usd = swap.fee.absolute().to_decimal(decimals_in) * price_in.clone();

    let (volume_usd, revenue) = apply_swap(&mut market, &mut protocol, &leg_in, &leg_out, &fee_usd);

    let (price, decimals) = if market.input_token == token_in {
        (price_in, decimals_in)
    } else if market.input_token == token_out {
        (price_out, decimals_out)
    } else {
        token_price(registry, oracle, &market.input_token, meta.block_number)
    };
    revalue_market(&mut market, &mut protocol, &price, decimals);
    update_market_rewards(registry, oracle, &mut market, meta.block_number, meta.timestamp);

    track_user(registry.store_mut(), &mut protocol, &mut market, &sender, None);

    registry.save(&TransactionRecord {
        id: meta.event_id(),
        kind: LeafKind::Swap,
        hash: meta.tx_hash.clone(),
        log_index: meta.log_index,
        block_number: meta.block_number,
        timestamp: meta.timestamp,
        protocol: protocol.id.clone(),
        market: market.id.clone(),
        account: sender.clone(),
        counterparty: Some(recipient),
        asset: token_in,
        amount: swap.amount_in.absolute(),
        amount_usd: volume_usd.clone(),
        profit_usd: None,
    });

    let bucket = BucketDelta::leaf(LeafKind::Swap, volume_usd)
        .with_revenue(revenue)
        .with_account(&sender);
    commit(registry, meta, market, protocol, &bucket);
    Ok(())
}

fn accrue_revenue<S: EntityStore, R: ChainReader, P: PriceOracle>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    meta: &EventMeta,
    market: &str,
    interest: &BigInt,
) -> Result<(), Error> {
    let market_id = parse_address(market)?;

    let mut market = registry.market(&market_id, meta.block_number, meta.timestamp);
    let mut protocol = registry.protocol();

    let (price, decimals) = token_price(registry, oracle, &market.input_token, meta.block_number);
    let interest_usd = interest.absolute().to_decimal(decimals) * price.clone();

    let revenue = apply_interest_accrual(&mut market, &mut protocol, interest, &interest_usd);
    revalue_market(&mut market, &mut protocol, &price, decimals);

    commit(registry, meta, market, protocol, &BucketDelta::default().with_revenue(revenue));
    Ok(())
}

fn list_market<S: EntityStore, R: ChainReader>(
    registry: &mut Registry<'_, S, R>,
    meta: &EventMeta,
    market: &str,
    input_token: Option<&str>,
    output_token: Option<&str>,
) -> Result<(), Error> {
    let market_id = parse_address(market)?;
    let input_token = input_token.map(parse_address).transpose()?;
    let output_token = output_token.map(parse_address).transpose()?;

    let mut market = registry.get_or_create::<Market>(&MarketKey {
        market: market_id,
        input_token: input_token.clone(),
        block_number: meta.block_number,
        timestamp: meta.timestamp,
    });

    // a market first seen through another event may still carry the sentinel
    if let Some(token) = input_token {
        if is_zero_address(&market.input_token) && !is_zero_address(&token) {
            market.name = registry.token(&token, meta.block_number).name;
            market.input_token = token;
        }
    }
    if let Some(token) = output_token {
        market.output_token = token;
    }
    market.is_active = true;

    log::info!("[list_market] {} listed with input token {}", market.id, market.input_token);

    let protocol = registry.protocol();
    commit(registry, meta, market, protocol, &BucketDelta::default());
    Ok(())
}

fn update_market<S, R, F>(
    registry: &mut Registry<'_, S, R>,
    meta: &EventMeta,
    market: &str,
    update: F,
) -> Result<(), Error>
where
    S: EntityStore,
    R: ChainReader,
    F: FnOnce(&mut Market, &mut Registry<'_, S, R>),
{
    let market_id = parse_address(market)?;

    let mut market = registry.market(&market_id, meta.block_number, meta.timestamp);
    update(&mut market, &mut *registry);

    let protocol = registry.protocol();
    commit(registry, meta, market, protocol, &BucketDelta::default());
    Ok(())
}

fn sync_price<S: EntityStore, R: ChainReader, P: PriceOracle>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    meta: &EventMeta,
    market: &str,
) -> Result<(), Error> {
    let market_id = parse_address(market)?;

    let mut market = registry.market(&market_id, meta.block_number, meta.timestamp);
    let mut protocol = registry.protocol();

    let (price, decimals) = token_price(registry, oracle, &market.input_token, meta.block_number);
    revalue_market(&mut market, &mut protocol, &price, decimals);
    update_market_rewards(registry, oracle, &mut market, meta.block_number, meta.timestamp);

    commit(registry, meta, market, protocol, &BucketDelta::default());
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Current USD price and decimals of a token.
///
/// An unavailable price falls back to the last price seen for the token,
/// zero if it was never priced.
fn token_price<S: EntityStore, R: ChainReader, P: PriceOracle>(
    registry: &mut Registry<'_, S, R>,
    oracle: &P,
    token: &str,
    block_number: u64,
) -> (BigDecimal, u64) {
    let mut token = registry.token(token, block_number);

    match oracle.price_usd(&token.id, block_number) {
        Some(price) => {
            record_token_price(&mut token, &price, block_number);
            registry.save(&token);
            (price, token.decimals)
        }
        None => {
            log::info!(
                "[token_price] no price for {} at block {}, using last known {}",
                token.id,
                block_number,
                format_bigdecimal(&token.last_price_usd)
            );
            (token.last_price_usd, token.decimals)
        }
    }
}

fn commit<S: EntityStore, R: ChainReader>(
    registry: &mut Registry<'_, S, R>,
    meta: &EventMeta,
    market: Market,
    mut protocol: LendingProtocol,
    delta: &BucketDelta,
) {
    protocol.last_update_timestamp = meta.timestamp;
    protocol.last_update_block_number = meta.block_number;

    registry.save(&market);
    registry.save(&protocol);
    refresh_snapshots(
        registry,
        &market,
        &protocol,
        meta.timestamp,
        meta.block_number,
        delta,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::methods;
    use crate::schema::{MarketDailySnapshot, RewardSide, Token};
    use crate::store::MemoryStore;
    use std::str::FromStr;

    const PROTOCOL: &str = "0x3d9819210a31b4961b30ef54be2aed79b9c9cd3b";
    const MARKET: &str = "0x39aa39c021dfbae8fac545936693ac917d5e7563";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";

    /// Every token reports 0 decimals so raw amounts read as whole units;
    /// everything else reverts
    struct WholeUnits;

    impl ChainReader for WholeUnits {
        fn call(&self, _: &str, method: &str, _: &[String], _: u64) -> Option<Vec<u8>> {
            (method == methods::DECIMALS).then(|| vec![0u8; 32])
        }
    }

    struct Price(Option<BigDecimal>);

    impl PriceOracle for Price {
        fn price_usd(&self, _: &str, _: u64) -> Option<BigDecimal> {
            self.0.clone()
        }
    }

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn meta(block_number: u64, log_index: u32) -> EventMeta {
        EventMeta {
            contract: MARKET.to_string(),
            block_number,
            timestamp: 1_600_000_000 + block_number * 12,
            tx_hash: format!("0xtx{block_number}"),
            log_index,
        }
    }

    fn indexer() -> Indexer<MemoryStore, WholeUnits, Price> {
        Indexer::from_params(
            &format!(
                r#"{{"protocolId": "{PROTOCOL}", "name": "Compound", "slug": "compound", "network": "mainnet"}}"#
            ),
            MemoryStore::new(),
            WholeUnits,
            Price(Some(dec("2"))),
        )
        .unwrap()
    }

    fn listed(indexer: &mut Indexer<MemoryStore, WholeUnits, Price>) {
        indexer
            .handle(
                &meta(1, 0),
                &LendingEvent::MarketListed {
                    market: MARKET.to_string(),
                    input_token: Some(USDC.to_string()),
                    output_token: Some(MARKET.to_string()),
                },
            )
            .unwrap();
    }

    #[test]
    fn replayed_event_is_skipped() {
        let mut indexer = indexer();
        listed(&mut indexer);

        let deposit = LendingEvent::Deposit {
            market: MARKET.to_string(),
            account: ALICE.to_string(),
            amount: BigInt::from(10u64),
            output_amount: BigInt::from(500u64),
        };
        assert!(indexer.handle(&meta(2, 3), &deposit).unwrap());
        assert!(!indexer.handle(&meta(2, 3), &deposit).unwrap());

        let market: Market = indexer.store().load(MARKET).unwrap();
        assert_eq!(market.input_token_balance, BigInt::from(10u64));
        assert_eq!(market.output_token_supply, BigInt::from(500u64));
        assert_eq!(market.counts.deposit_count, 1);
    }

    #[test]
    fn invalid_address_is_rejected_without_writes() {
        let mut indexer = indexer();
        let result = indexer.handle(
            &meta(2, 0),
            &LendingEvent::Borrow {
                market: "not-an-address".to_string(),
                account: ALICE.to_string(),
                amount: BigInt::from(1u64),
            },
        );

        assert!(matches!(result, Err(Error::InvalidAddress(_))));
        assert!(!indexer.store().exists::<LendingProtocol>(PROTOCOL));
        assert!(!indexer.store().exists::<EventReceipt>("0xtx2-0"));
    }

    #[test]
    fn missing_price_uses_last_known() {
        let mut indexer = indexer();
        listed(&mut indexer);

        let deposit = |amount: u64| LendingEvent::Deposit {
            market: MARKET.to_string(),
            account: ALICE.to_string(),
            amount: BigInt::from(amount),
            output_amount: BigInt::zero(),
        };
        indexer.handle(&meta(2, 0), &deposit(100)).unwrap();

        indexer.oracle_mut().0 = None;
        indexer.handle(&meta(3, 0), &deposit(100)).unwrap();

        let market: Market = indexer.store().load(MARKET).unwrap();
        let token: Token = indexer.store().load(USDC).unwrap();
        assert_eq!(token.last_price_usd, dec("2"));
        assert_eq!(token.last_price_block_number, 2);
        assert_eq!(market.input_token_price_usd, dec("2"));
    }

    #[test]
    fn liquidation_records_profit() {
        let mut indexer = indexer();
        listed(&mut indexer);
        indexer
            .handle(
                &meta(2, 0),
                &LendingEvent::LiquidationPenaltyUpdated {
                    market: MARKET.to_string(),
                    liquidation_penalty: dec("8"),
                },
            )
            .unwrap();
        indexer
            .handle(
                &meta(3, 1),
                &LendingEvent::Liquidate {
                    market: MARKET.to_string(),
                    liquidator: ALICE.to_string(),
                    liquidatee: "0x0000000000000000000000000000000000000b0b".to_string(),
                    amount: BigInt::from(50u64),
                },
            )
            .unwrap();

        let record: TransactionRecord = indexer.store().load("0xtx3-1").unwrap();
        assert_eq!(record.kind, LeafKind::Liquidate);
        assert_eq!(record.amount_usd, dec("100"));
        assert_eq!(record.profit_usd, Some(dec("8")));

        let protocol: LendingProtocol = indexer.store().load(PROTOCOL).unwrap();
        assert_eq!(protocol.cumulative_unique_liquidators, 1);
        assert_eq!(protocol.cumulative_unique_liquidatees, 1);
        assert_eq!(protocol.cumulative_unique_users, 2);
    }

    #[test]
    fn out_of_range_reserve_factor_is_ignored() {
        let mut indexer = indexer();
        listed(&mut indexer);

        let reserve_factor = |value: &str| LendingEvent::ReserveFactorUpdated {
            market: MARKET.to_string(),
            reserve_factor: dec(value),
        };
        indexer.handle(&meta(2, 0), &reserve_factor("0.25")).unwrap();
        indexer.handle(&meta(3, 0), &reserve_factor("1.5")).unwrap();
        indexer.handle(&meta(4, 0), &reserve_factor("-0.5")).unwrap();
        indexer
            .handle(
                &meta(5, 0),
                &LendingEvent::RevenueAccrued {
                    market: MARKET.to_string(),
                    interest: BigInt::from(10u64),
                },
            )
            .unwrap();

        let market: Market = indexer.store().load(MARKET).unwrap();
        assert_eq!(market.reserve_factor, dec("0.25"));
        assert_eq!(market.cumulative_protocol_side_revenue_usd, dec("5"));
        assert_eq!(market.cumulative_supply_side_revenue_usd, dec("15"));
        assert_eq!(market.cumulative_total_revenue_usd, dec("20"));

        let protocol: LendingProtocol = indexer.store().load(PROTOCOL).unwrap();
        assert!(protocol.cumulative_supply_side_revenue_usd >= BigDecimal::zero());
        assert!(protocol.cumulative_protocol_side_revenue_usd >= BigDecimal::zero());
    }

    #[test]
    fn negative_liquidation_penalty_is_ignored() {
        let mut indexer = indexer();
        listed(&mut indexer);
        indexer
            .handle(
                &meta(2, 0),
                &LendingEvent::LiquidationPenaltyUpdated {
                    market: MARKET.to_string(),
                    liquidation_penalty: dec("-8"),
                },
            )
            .unwrap();

        let market: Market = indexer.store().load(MARKET).unwrap();
        assert!(market.liquidation_penalty.is_zero());
    }

    #[test]
    fn flashloan_is_recorded_and_counted() {
        let mut indexer = indexer();
        listed(&mut indexer);
        indexer
            .handle(
                &meta(2, 0),
                &LendingEvent::ReserveFactorUpdated {
                    market: MARKET.to_string(),
                    reserve_factor: dec("0.1"),
                },
            )
            .unwrap();

        let flashloan = LendingEvent::Flashloan {
            market: MARKET.to_string(),
            account: ALICE.to_string(),
            amount: BigInt::from(1_000u64),
            fee: BigInt::from(5u64),
        };
        indexer.handle(&meta(3, 0), &flashloan).unwrap();
        indexer.handle(&meta(3, 1), &flashloan).unwrap();

        let record: TransactionRecord = indexer.store().load("0xtx3-1").unwrap();
        assert_eq!(record.kind, LeafKind::Flashloan);
        assert_eq!(record.amount, BigInt::from(1_000u64));
        assert_eq!(record.amount_usd, dec("2000"));

        let market: Market = indexer.store().load(MARKET).unwrap();
        assert!(market.input_token_balance.is_zero());
        assert_eq!(market.cumulative_flashloan_usd, dec("4000"));
        assert_eq!(market.counts.flashloan_count, 2);
        assert_eq!(market.cumulative_unique_flashloaners, 1);
        assert_eq!(market.cumulative_total_revenue_usd, dec("20"));
        assert_eq!(market.cumulative_protocol_side_revenue_usd, dec("2"));

        let protocol: LendingProtocol = indexer.store().load(PROTOCOL).unwrap();
        assert_eq!(protocol.cumulative_flashloan_usd, dec("4000"));
        assert_eq!(protocol.cumulative_unique_flashloaners, 1);
        assert_eq!(protocol.cumulative_unique_users, 1);

        let bucket = rollup_common::day_bucket(meta(3, 0).timestamp);
        let daily: MarketDailySnapshot = indexer.store().load(&format!("{MARKET}-{bucket}")).unwrap();
        assert_eq!(daily.activity.flashloan_usd, dec("4000"));
        assert_eq!(daily.activity.counts.flashloan_count, 2);
        assert_eq!(daily.activity.total_revenue_usd, dec("20"));
        assert_eq!(daily.cumulative_unique_flashloaners, 1);
        assert_eq!(daily.counts, market.counts);
    }

    #[test]
    fn reward_emission_event_updates_market_rewards() {
        const REWARD: &str = "0x4200000000000000000000000000000000000042";
        let mut indexer = indexer();
        listed(&mut indexer);

        indexer
            .handle(
                &meta(2, 0),
                &LendingEvent::RewardEmissionUpdated {
                    market: MARKET.to_string(),
                    side: RewardSide::Deposit,
                    reward_token: REWARD.to_uppercase(),
                    emission_per_second: BigInt::from(3u64),
                },
            )
            .unwrap();

        // 3 whole tokens/s at $2
        let market: Market = indexer.store().load(MARKET).unwrap();
        assert_eq!(market.rewards.tokens(), &[format!("DEPOSIT-{REWARD}")]);
        assert_eq!(market.rewards.amounts(), &[dec("259200")]);
        assert_eq!(market.rewards.amounts_usd(), &[dec("518400")]);

        let daily: MarketDailySnapshot = indexer
            .store()
            .load(&format!("{MARKET}-{}", rollup_common::day_bucket(meta(2, 0).timestamp)))
            .unwrap();
        assert_eq!(daily.rewards, market.rewards);
    }

    #[test]
    fn handle_all_sorts_into_chain_order() {
        let mut indexer = indexer();
        let events = vec![
            (
                meta(5, 0),
                LendingEvent::Withdraw {
                    market: MARKET.to_string(),
                    account: ALICE.to_string(),
                    amount: BigInt::from(4u64),
                    output_amount: BigInt::zero(),
                },
            ),
            (
                meta(4, 0),
                LendingEvent::Deposit {
                    market: MARKET.to_string(),
                    account: ALICE.to_string(),
                    amount: BigInt::from(10u64),
                    output_amount: BigInt::zero(),
                },
            ),
        ];

        assert_eq!(indexer.handle_all(events).unwrap(), 2);

        let record: TransactionRecord = indexer.store().load("0xtx5-0").unwrap();
        assert_eq!(record.amount, BigInt::from(-4i64));
        assert_eq!(record.amount_usd, dec("8"));
        let market: Market = indexer.store().load(MARKET).unwrap();
        assert_eq!(market.input_token_balance, BigInt::from(6u64));
    }
}
