// ─────────────────────────────────────────────────────────────────────────────
// Protocol configuration parsed from module params
// ─────────────────────────────────────────────────────────────────────────────

use std::str::FromStr;

use rollup_common::normalize_address;
use serde::Deserialize;
use substreams::scalar::BigDecimal;

use crate::error::Error;

/// Whether an on-chain reward rate is expressed per second or per block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardInterval {
    Timestamp,
    Block,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    protocol_id: String,
    name: String,
    slug: String,
    network: String,
    #[serde(default = "default_version")]
    schema_version: String,
    #[serde(default = "default_version")]
    subgraph_version: String,
    #[serde(default = "default_version")]
    methodology_version: String,
    #[serde(default)]
    default_reserve_factor: Option<String>,
    #[serde(default)]
    default_liquidation_penalty: Option<String>,
    #[serde(default)]
    seconds_per_block: Option<String>,
    #[serde(default)]
    rewards: Option<RawRewardProgram>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRewardProgram {
    activation_block: u64,
    distributor: String,
    deposit_token: String,
    borrow_token: String,
    interval: RewardInterval,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Incentive program shared by every market of the protocol
#[derive(Debug, Clone)]
pub struct RewardProgram {
    /// Reward speeds do not exist before this block
    pub activation_block: u64,
    /// Contract answering `supplyRewardSpeeds(market)` / `borrowRewardSpeeds(market)`
    pub distributor: String,
    pub deposit_token: String,
    pub borrow_token: String,
    pub interval: RewardInterval,
}

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub protocol_id: String,
    pub name: String,
    pub slug: String,
    pub network: String,
    pub schema_version: String,
    pub subgraph_version: String,
    pub methodology_version: String,
    /// Protocol-side share of interest and swap fees for newly created markets
    pub default_reserve_factor: BigDecimal,
    /// Liquidation bonus in percent for newly created markets
    pub default_liquidation_penalty: BigDecimal,
    /// Starting guess for block speed before enough samples exist
    pub seconds_per_block: BigDecimal,
    pub rewards: Option<RewardProgram>,
}

impl ProtocolConfig {
    /// Parse the JSON params string handed to the module.
    ///
    /// ```json
    /// {"protocolId": "0x3d98...", "name": "Compound", "slug": "compound",
    ///  "network": "mainnet", "defaultReserveFactor": "0.1"}
    /// ```
    pub fn from_params(params: &str) -> Result<Self, Error> {
        let raw: RawConfig = serde_json::from_str(params)?;

        let protocol_id = normalize_address(&raw.protocol_id)
            .ok_or_else(|| Error::InvalidAddress(raw.protocol_id.clone()))?;

        let rewards = match raw.rewards {
            Some(program) => Some(RewardProgram {
                activation_block: program.activation_block,
                distributor: parse_address(&program.distributor)?,
                deposit_token: parse_address(&program.deposit_token)?,
                borrow_token: parse_address(&program.borrow_token)?,
                interval: program.interval,
            }),
            None => None,
        };

        let default_reserve_factor = parse_decimal(
            "defaultReserveFactor",
            raw.default_reserve_factor.as_deref(),
            "0",
        )?;
        if !is_valid_reserve_factor(&default_reserve_factor) {
            return Err(Error::InvalidConfig(format!(
                "defaultReserveFactor must be within [0, 1]: {default_reserve_factor}"
            )));
        }

        let default_liquidation_penalty = parse_decimal(
            "defaultLiquidationPenalty",
            raw.default_liquidation_penalty.as_deref(),
            "0",
        )?;
        if !is_valid_liquidation_penalty(&default_liquidation_penalty) {
            return Err(Error::InvalidConfig(format!(
                "defaultLiquidationPenalty must not be negative: {default_liquidation_penalty}"
            )));
        }

        Ok(Self {
            protocol_id,
            name: raw.name,
            slug: raw.slug,
            network: raw.network,
            schema_version: raw.schema_version,
            subgraph_version: raw.subgraph_version,
            methodology_version: raw.methodology_version,
            default_reserve_factor,
            default_liquidation_penalty,
            seconds_per_block: parse_decimal(
                "secondsPerBlock",
                raw.seconds_per_block.as_deref(),
                "12",
            )?,
            rewards,
        })
    }
}

pub(crate) fn parse_address(value: &str) -> Result<String, Error> {
    normalize_address(value).ok_or_else(|| Error::InvalidAddress(value.to_string()))
}

/// Reserve factors are a fraction of revenue: `0 <= rf <= 1`
pub(crate) fn is_valid_reserve_factor(value: &BigDecimal) -> bool {
    *value >= BigDecimal::zero() && *value <= BigDecimal::one()
}

pub(crate) fn is_valid_liquidation_penalty(value: &BigDecimal) -> bool {
    *value >= BigDecimal::zero()
}

fn parse_decimal(field: &str, value: Option<&str>, default: &str) -> Result<BigDecimal, Error> {
    let value = value.unwrap_or(default);
    BigDecimal::from_str(value)
        .map_err(|_| Error::InvalidConfig(format!("{field} is not a decimal: {value}")))
}
