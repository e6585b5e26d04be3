// ─────────────────────────────────────────────────────────────────────────────
// External collaborators: contract reads and USD prices
// ─────────────────────────────────────────────────────────────────────────────

use rollup_common::{decode_abi_string, word_to_address, word_to_u64, ZERO_ADDRESS};
use substreams::log;
use substreams::scalar::BigDecimal;

use crate::constants::{methods, DEFAULT_DECIMALS, UNKNOWN};

/// Read-only contract calls at a given block.
///
/// Returns the raw ABI return data, or `None` when the call reverted.
pub trait ChainReader {
    fn call(&self, contract: &str, method: &str, args: &[String], block: u64) -> Option<Vec<u8>>;
}

/// USD price source. `None` means the price is unavailable at that block.
pub trait PriceOracle {
    fn price_usd(&self, token: &str, block: u64) -> Option<BigDecimal>;
}

/// Oracles tried in priority order; the first available price wins
#[derive(Default)]
pub struct OracleChain {
    oracles: Vec<Box<dyn PriceOracle>>,
}

impl OracleChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, oracle: impl PriceOracle + 'static) -> Self {
        self.oracles.push(Box::new(oracle));
        self
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}

impl PriceOracle for OracleChain {
    fn price_usd(&self, token: &str, block: u64) -> Option<BigDecimal> {
        self.oracles
            .iter()
            .find_map(|oracle| oracle.price_usd(token, block))
    }
}

// ─── Defaulting reads ────────────────────────────────────────────────────────
//
// Every call site names its fallback. A revert is logged and the sentinel is
// returned so processing continues.

pub fn read_name<R: ChainReader>(reader: &R, token: &str, block: u64) -> String {
    read_string(reader, token, methods::NAME, block)
}

pub fn read_symbol<R: ChainReader>(reader: &R, token: &str, block: u64) -> String {
    read_string(reader, token, methods::SYMBOL, block)
}

pub fn read_decimals<R: ChainReader>(reader: &R, token: &str, block: u64) -> u64 {
    match reader
        .call(token, methods::DECIMALS, &[], block)
        .and_then(|data| word_to_u64(data.get(0..32)?))
    {
        Some(decimals) => decimals,
        None => {
            log::info!(
                "[read_decimals] call reverted for {} at block {}, using {}",
                token,
                block,
                DEFAULT_DECIMALS
            );
            DEFAULT_DECIMALS
        }
    }
}

/// Read an address-returning method, falling back to the zero address
pub fn read_address<R: ChainReader>(
    reader: &R,
    contract: &str,
    method: &str,
    args: &[String],
    block: u64,
) -> String {
    match reader
        .call(contract, method, args, block)
        .and_then(|data| word_to_address(data.get(0..32)?))
    {
        Some(address) => address,
        None => {
            log::info!(
                "[read_address] {}.{} reverted at block {}, using zero address",
                contract,
                method,
                block
            );
            ZERO_ADDRESS.to_string()
        }
    }
}

fn read_string<R: ChainReader>(reader: &R, contract: &str, method: &str, block: u64) -> String {
    match reader
        .call(contract, method, &[], block)
        .and_then(|data| decode_abi_string(&data))
    {
        Some(value) => value,
        None => {
            log::info!(
                "[read_string] {}.{} reverted at block {}, using \"{}\"",
                contract,
                method,
                block,
                UNKNOWN
            );
            UNKNOWN.to_string()
        }
    }
}
