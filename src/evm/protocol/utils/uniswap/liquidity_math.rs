use crate::protocol::errors::SimulationError;

/// Applies a signed liquidity delta, failing instead of wrapping below zero or above `u128::MAX`.
pub fn add_liquidity_delta(liquidity: u128, delta: i128) -> Result<u128, SimulationError> {
    let updated = if delta < 0 {
        liquidity.checked_sub(delta.unsigned_abs())
    } else {
        liquidity.checked_add(delta as u128)
    };
    updated.ok_or_else(|| {
        SimulationError::Overflow(format!("liquidity {liquidity} with delta {delta}"))
    })
}
