use alloy::primitives::U256;
use serde::Deserialize;

use super::{enums::FeeAmount, state::UniswapV3State};
use crate::{
    evm::protocol::utils::uniswap::tick_list::{TickInfo, TickList},
    models::{deserialize_integer, PoolInfo, PoolSnapshot},
    protocol::{
        errors::InvalidSnapshotError,
        models::{SimulationConfig, TryFromSnapshot},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    #[serde(deserialize_with = "deserialize_integer")]
    liquidity: u128,
    #[serde(rename = "sqrtPriceX96", deserialize_with = "deserialize_integer")]
    sqrt_price_x96: U256,
    #[serde(default)]
    tick_spacing: Option<u16>,
    tick: i32,
    ticks: Vec<ExtraTick>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtraTick {
    index: i32,
    #[serde(deserialize_with = "deserialize_integer")]
    liquidity_gross: u128,
    #[serde(deserialize_with = "deserialize_integer")]
    liquidity_net: i128,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticExtra {
    #[serde(default)]
    tick_spacing: Option<u16>,
}

/// Converts the snapshot `swapFee` into pips.
///
/// Whole numbers are already pips; fractions below one are a share of the input.
fn fee_pips(swap_fee: f64) -> Result<u32, InvalidSnapshotError> {
    if !swap_fee.is_finite() || swap_fee < 0.0 {
        return Err(InvalidSnapshotError::ValueError(format!("swap fee {swap_fee}")));
    }
    let pips = if swap_fee < 1.0 { (swap_fee * 1e6).round() } else { swap_fee };
    if pips.fract() != 0.0 || pips >= 1e6 {
        return Err(InvalidSnapshotError::ValueError(format!(
            "swap fee {swap_fee} is not a valid pip amount"
        )));
    }
    Ok(pips as u32)
}

impl TryFromSnapshot for UniswapV3State {
    /// Decodes a concentrated-liquidity `PoolSnapshot`. Errors with an `InvalidSnapshotError`
    /// if the venue payload is malformed or the tick spacing cannot be determined.
    fn try_from_snapshot(
        snapshot: &PoolSnapshot,
        config: &SimulationConfig,
    ) -> Result<Self, InvalidSnapshotError> {
        if snapshot.extra.is_empty() {
            return Err(InvalidSnapshotError::MissingAttribute("extra".to_string()));
        }
        let extra: Extra = serde_json::from_str(&snapshot.extra)?;
        let static_extra: StaticExtra = if snapshot.static_extra.is_empty() {
            StaticExtra::default()
        } else {
            serde_json::from_str(&snapshot.static_extra)?
        };

        let fee = fee_pips(snapshot.swap_fee)?;

        let tick_spacing = extra
            .tick_spacing
            .or(static_extra.tick_spacing)
            .or_else(|| {
                FeeAmount::try_from(fee)
                    .ok()
                    .map(FeeAmount::tick_spacing)
            })
            .ok_or_else(|| InvalidSnapshotError::MissingAttribute("tickSpacing".to_string()))?;

        let ticks = extra
            .ticks
            .iter()
            .map(|t| TickInfo::new(t.index, t.liquidity_gross, t.liquidity_net))
            .collect();
        let ticks = TickList::new(tick_spacing, ticks)?;

        let info = PoolInfo::from_snapshot(snapshot)?;

        UniswapV3State::new(
            info,
            extra.liquidity,
            extra.sqrt_price_x96,
            fee,
            extra.tick,
            ticks,
            config,
        )
    }
}
