// ─────────────────────────────────────────────────────────────────────────────
// Unique and active user tracking
// ─────────────────────────────────────────────────────────────────────────────
//
// Users are counted through existence markers: the first save of a marker is
// what bumps a counter, so replaying the same address never double counts.

use std::marker::PhantomData;

use crate::schema::{Account, ActiveAccount, LeafKind, LendingProtocol, Market, Period, UsageMarker};
use crate::store::EntityStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Depositor,
    Borrower,
    Liquidator,
    Liquidatee,
    Flashloaner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Depositor => "depositor",
            Role::Borrower => "borrower",
            Role::Liquidator => "liquidator",
            Role::Liquidatee => "liquidatee",
            Role::Flashloaner => "flashloaner",
        }
    }

    /// Role of the account initiating a leaf event, if it has one
    pub fn for_kind(kind: LeafKind) -> Option<Role> {
        match kind {
            LeafKind::Deposit => Some(Role::Depositor),
            LeafKind::Borrow => Some(Role::Borrower),
            LeafKind::Liquidate => Some(Role::Liquidator),
            LeafKind::Flashloan => Some(Role::Flashloaner),
            LeafKind::Withdraw | LeafKind::Repay | LeafKind::Swap => None,
        }
    }
}

/// `true` the first time the address is seen by the protocol
pub fn register_account<S: EntityStore>(store: &mut S, address: &str) -> bool {
    if store.exists::<Account>(address) {
        return false;
    }
    store.save(&Account {
        id: address.to_string(),
    });
    true
}

/// `true` the first time the address is seen inside the bucket of `timestamp`
pub fn register_active<P: Period, S: EntityStore>(store: &mut S, address: &str, timestamp: u64) -> bool {
    let id = format!("{}-{address}", P::bucket(timestamp));
    if store.exists::<ActiveAccount<P>>(&id) {
        return false;
    }
    store.save(&ActiveAccount::<P> {
        id,
        _period: PhantomData,
    });
    true
}

/// `true` the first time the address is active on this market inside the bucket
pub fn register_market_active<P: Period, S: EntityStore>(
    store: &mut S,
    market: &str,
    address: &str,
    timestamp: u64,
) -> bool {
    register_marker(
        store,
        format!("{}-{market}-{}-{address}", P::ACTIVE_ACCOUNT, P::bucket(timestamp)),
    )
}

fn register_marker<S: EntityStore>(store: &mut S, id: String) -> bool {
    if store.exists::<UsageMarker>(&id) {
        return false;
    }
    store.save(&UsageMarker { id });
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageOutcome {
    pub new_protocol_user: bool,
    pub new_market_user: bool,
}

/// Count the address as a user (and in its role) on the protocol and market
pub fn track_user<S: EntityStore>(
    store: &mut S,
    protocol: &mut LendingProtocol,
    market: &mut Market,
    address: &str,
    role: Option<Role>,
) -> UsageOutcome {
    let outcome = UsageOutcome {
        new_protocol_user: register_account(store, address),
        new_market_user: register_marker(store, format!("{}-user-{address}", market.id)),
    };

    if outcome.new_protocol_user {
        protocol.cumulative_unique_users += 1;
    }
    if outcome.new_market_user {
        market.cumulative_unique_users += 1;
    }

    if let Some(role) = role {
        if register_marker(store, format!("{}-{address}", role.as_str())) {
            *protocol_role_counter(protocol, role) += 1;
        }
        if register_marker(store, format!("{}-{}-{address}", market.id, role.as_str())) {
            *market_role_counter(market, role) += 1;
        }
    }

    outcome
}

fn protocol_role_counter(protocol: &mut LendingProtocol, role: Role) -> &mut i32 {
    match role {
        Role::Depositor => &mut protocol.cumulative_unique_depositors,
        Role::Borrower => &mut protocol.cumulative_unique_borrowers,
        Role::Liquidator => &mut protocol.cumulative_unique_liquidators,
        Role::Liquidatee => &mut protocol.cumulative_unique_liquidatees,
        Role::Flashloaner => &mut protocol.cumulative_unique_flashloaners,
    }
}

fn market_role_counter(market: &mut Market, role: Role) -> &mut i32 {
    match role {
        Role::Depositor => &mut market.cumulative_unique_depositors,
        Role::Borrower => &mut market.cumulative_unique_borrowers,
        Role::Liquidator => &mut market.cumulative_unique_liquidators,
        Role::Liquidatee => &mut market.cumulative_unique_liquidatees,
        Role::Flashloaner => &mut market.cumulative_unique_flashloaners,
    }
}
