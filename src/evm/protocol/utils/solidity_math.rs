//! Full-precision `a * b / denominator`, as done by Uniswap's `FullMath` library.
use alloy::primitives::{U256, U512};

use crate::{
    evm::protocol::safe_math::{safe_add_u256, u512_to_u256},
    protocol::errors::SimulationError,
};

/// Computes `floor(a * b / denominator)` without losing the high bits of the product.
///
/// Fails if `denominator` is zero or the quotient does not fit into 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, SimulationError> {
    if denominator.is_zero() {
        return Err(SimulationError::Overflow("mul_div by zero".to_string()));
    }
    let product = U512::from(a) * U512::from(b);
    u512_to_u256(product / U512::from(denominator))
}

/// Same as [`mul_div`] but rounds the quotient up.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, SimulationError> {
    let result = mul_div(a, b, denominator)?;
    if a.mul_mod(b, denominator).is_zero() {
        Ok(result)
    } else {
        safe_add_u256(result, U256::from(1u64))
    }
}
