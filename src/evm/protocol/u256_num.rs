//! Conversions between the public `BigUint` amounts and the fixed-width kernel types.
use alloy::primitives::U256;
use num_bigint::BigUint;

use crate::protocol::errors::SimulationError;

/// Converts a U256 into the nearest `f64`.
///
/// Only the 64 most significant bits take part in the conversion, which is
/// well below the precision `f64` can represent anyway.
pub fn u256_to_f64(x: U256) -> f64 {
    let bits = x.bit_len();
    if bits <= 64 {
        return x.as_limbs()[0] as f64;
    }
    let shift = bits - 64;
    let head = (x >> shift).as_limbs()[0];
    head as f64 * 2f64.powi(shift as i32)
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_le(&value.to_le_bytes::<32>())
}

/// Converts a `BigUint` into a U256, failing if it needs more than 256 bits.
pub fn biguint_to_u256(value: &BigUint) -> Result<U256, SimulationError> {
    if value.bits() > 256 {
        return Err(SimulationError::Overflow(format!("{value} does not fit into U256")));
    }
    Ok(U256::from_le_slice(&value.to_bytes_le()))
}
