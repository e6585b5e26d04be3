use serde_json::Error as JSON_ERROR;
use thiserror::Error;

/// Errors surfaced by the rollup engine.
///
/// Degraded external data (reverted calls, missing prices) never ends up
/// here: those paths substitute defaults and keep processing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Params(#[from] JSON_ERROR),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
