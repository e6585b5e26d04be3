// ─────────────────────────────────────────────────────────────────────────────
// Daily / hourly snapshot refresh
// ─────────────────────────────────────────────────────────────────────────────
//
// After an event the owner's state is copied into the snapshot of the
// current bucket and the event's windowed activity is added on top. Windowed
// counters start at zero when a bucket's snapshot is created and only grow.

use substreams::scalar::BigDecimal;

use crate::chain::ChainReader;
use crate::propagator::RevenueSplit;
use crate::registry::Registry;
use crate::schema::{BucketActivity, Daily, Hourly, LeafKind, LendingProtocol, Market, Period};
use crate::store::EntityStore;
use crate::usage::{register_active, register_market_active};

/// What an event contributed to the current buckets
#[derive(Clone, Debug, Default)]
pub struct BucketDelta {
    pub leaf: Option<(LeafKind, BigDecimal)>,
    pub revenue: Option<RevenueSplit>,
    pub accounts: Vec<String>,
}

impl BucketDelta {
    pub fn leaf(kind: LeafKind, amount_usd: BigDecimal) -> Self {
        Self {
            leaf: Some((kind, amount_usd)),
            ..Default::default()
        }
    }

    pub fn with_revenue(mut self, revenue: RevenueSplit) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        if !self.accounts.iter().any(|existing| existing == account) {
            self.accounts.push(account.to_string());
        }
        self
    }

    fn apply(&self, activity: &mut BucketActivity) {
        if let Some((kind, amount_usd)) = &self.leaf {
            activity.record_leaf(*kind, amount_usd);
        }
        if let Some(revenue) = &self.revenue {
            activity.record_revenue(&revenue.protocol_side_usd, &revenue.supply_side_usd);
        }
    }
}

/// Refresh the daily and hourly snapshots of the market and its protocol
pub fn refresh_snapshots<S: EntityStore, R: ChainReader>(
    registry: &mut Registry<'_, S, R>,
    market: &Market,
    protocol: &LendingProtocol,
    timestamp: u64,
    block_number: u64,
    delta: &BucketDelta,
) {
    refresh_market::<Daily, S, R>(registry, market, timestamp, block_number, delta);
    refresh_market::<Hourly, S, R>(registry, market, timestamp, block_number, delta);
    refresh_protocol::<Daily, S, R>(registry, protocol, timestamp, block_number, delta);
    refresh_protocol::<Hourly, S, R>(registry, protocol, timestamp, block_number, delta);
}

fn refresh_market<P: Period, S: EntityStore, R: ChainReader>(
    registry: &mut Registry<'_, S, R>,
    market: &Market,
    timestamp: u64,
    block_number: u64,
    delta: &BucketDelta,
) {
    let mut snapshot = registry.market_snapshot::<P>(&market.id, timestamp, block_number);
    snapshot.sync_from(market, timestamp, block_number);
    delta.apply(&mut snapshot.activity);

    for account in &delta.accounts {
        if register_market_active::<P, S>(registry.store_mut(), &market.id, account, timestamp) {
            snapshot.activity.active_users += 1;
        }
    }

    registry.save(&snapshot);
}

fn refresh_protocol<P: Period, S: EntityStore, R: ChainReader>(
    registry: &mut Registry<'_, S, R>,
    protocol: &LendingProtocol,
    timestamp: u64,
    block_number: u64,
    delta: &BucketDelta,
) {
    let mut snapshot = registry.protocol_snapshot::<P>(timestamp, block_number);
    snapshot.sync_from(protocol, timestamp, block_number);
    delta.apply(&mut snapshot.activity);

    for account in &delta.accounts {
        if register_active::<P, S>(registry.store_mut(), account, timestamp) {
            snapshot.activity.active_users += 1;
        }
    }

    registry.save(&snapshot);
}
