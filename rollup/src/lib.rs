// Lending Rollup Engine
//
// Incremental aggregation for lending/pool protocols. Every decoded event is
// folded into a hierarchy of aggregate entities:
//
//   LendingProtocol
//   ├── ProtocolDailySnapshot / ProtocolHourlySnapshot
//   └── Market
//       └── MarketDailySnapshot / MarketHourlySnapshot
//
// IMPORTANT: Value conventions
// ----------------------------
// 1. Token balances are kept in RAW TOKEN UNITS (not decimal-adjusted).
//    USD values are decimal-adjusted with the token's `decimals()`.
//
// 2. Cumulative USD fields only grow. Point-in-time USD fields
//    (TVL, deposit balance, borrow balance) are recomputed from
//    balance * price and reconciled into the protocol totals.
//
// 3. Unresolvable external data never fails an event: reverted reads use
//    the zero address / "unknown" / 18 decimals, and missing prices use the
//    last known price (or zero).

pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod processor;
pub mod propagator;
pub mod reconciler;
pub mod registry;
pub mod rewards;
pub mod schema;
pub mod snapshots;
pub mod store;
pub mod usage;

pub use chain::{ChainReader, OracleChain, PriceOracle};
pub use config::{ProtocolConfig, RewardInterval, RewardProgram};
pub use error::Error;
pub use events::{EventMeta, LendingEvent};
pub use processor::Indexer;
pub use store::{EntityStore, MemoryStore};
