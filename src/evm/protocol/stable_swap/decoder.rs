use alloy::primitives::U256;
use serde::Deserialize;

use super::{
    math::{DEFAULT_A_PRECISION, FEE_DENOMINATOR},
    state::{Amplification, StableSwapState},
};
use crate::{
    models::{deserialize_integer, deserialize_optional_integer, PoolInfo, PoolSnapshot},
    protocol::{
        errors::InvalidSnapshotError,
        models::{Clock, SimulationConfig, TryFromSnapshot},
    },
};

const MAX_DECIMALS: u32 = 18;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    #[serde(rename = "initialA", deserialize_with = "deserialize_integer")]
    initial_a: U256,
    #[serde(rename = "futureA", deserialize_with = "deserialize_integer")]
    future_a: U256,
    #[serde(rename = "initialATime", default, deserialize_with = "deserialize_optional_integer")]
    initial_a_time: Option<u64>,
    #[serde(rename = "futureATime", default, deserialize_with = "deserialize_optional_integer")]
    future_a_time: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_integer")]
    swap_fee: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct Integer(#[serde(deserialize_with = "deserialize_integer")] U256);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticExtra {
    #[serde(default)]
    precision_multipliers: Option<Vec<Integer>>,
    #[serde(default, deserialize_with = "deserialize_optional_integer")]
    a_precision: Option<U256>,
}

/// Converts the snapshot `swapFee` into units of the fee denominator.
fn fee_from_snapshot(swap_fee: f64) -> Result<U256, InvalidSnapshotError> {
    let denominator = FEE_DENOMINATOR as f64;
    if !swap_fee.is_finite() || swap_fee < 0.0 {
        return Err(InvalidSnapshotError::ValueError(format!("swap fee {swap_fee}")));
    }
    let units = if swap_fee < 1.0 { (swap_fee * denominator).round() } else { swap_fee };
    if units.fract() != 0.0 || units >= denominator {
        return Err(InvalidSnapshotError::ValueError(format!("swap fee {swap_fee} out of range")));
    }
    Ok(U256::from(units as u64))
}

fn multipliers_from_decimals(info: &PoolInfo) -> Result<[U256; 2], InvalidSnapshotError> {
    let mut multipliers = [U256::ZERO; 2];
    for (multiplier, token) in multipliers.iter_mut().zip(&info.tokens) {
        if token.decimals > MAX_DECIMALS {
            return Err(InvalidSnapshotError::ValueError(format!(
                "token {} has {} decimals",
                token.address, token.decimals
            )));
        }
        *multiplier = U256::from(10u64).pow(U256::from(MAX_DECIMALS - token.decimals));
    }
    Ok(multipliers)
}

impl TryFromSnapshot for StableSwapState {
    /// Decodes a StableSwap `PoolSnapshot`, deriving precision multipliers from token decimals
    /// when the snapshot does not carry them.
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

        let info = PoolInfo::from_snapshot(snapshot)?;
        if info.tokens.len() != 2 {
            return Err(InvalidSnapshotError::ValueError(format!(
                "stable swap pools hold two tokens, got {}",
                info.tokens.len()
            )));
        }

        let precision_multipliers = match static_extra.precision_multipliers {
            Some(multipliers) => match multipliers.as_slice() {
                [m0, m1] => [m0.0, m1.0],
                other => {
                    return Err(InvalidSnapshotError::LengthMismatch {
                        tokens: info.tokens.len(),
                        reserves: other.len(),
                    })
                }
            },
            None => multipliers_from_decimals(&info)?,
        };

        let swap_fee = match extra.swap_fee {
            Some(fee) => fee,
            None => fee_from_snapshot(snapshot.swap_fee)?,
        };

        let amplification = Amplification {
            initial_a: extra.initial_a,
            future_a: extra.future_a,
            initial_a_time: extra.initial_a_time.unwrap_or_default(),
            future_a_time: extra.future_a_time.unwrap_or_default(),
            a_precision: static_extra
                .a_precision
                .unwrap_or(U256::from(DEFAULT_A_PRECISION)),
        };

        let clock = config
            .clock
            .clone()
            .unwrap_or(Clock::Fixed(snapshot.timestamp));

        StableSwapState::new(info, amplification, swap_fee, precision_multipliers, clock, config)
    }
}
