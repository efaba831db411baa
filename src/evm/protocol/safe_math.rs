//! Safe Math
//!
//! Checked arithmetic on the 256-bit alloy integer types. Any operation that
//! would wrap, underflow or divide by zero yields
//! [`SimulationError::Overflow`] instead of a silently truncated value.
//!
//! Division is always flooring, matching EVM `DIV` semantics.
use alloy::primitives::{I256, U256, U512};

use crate::protocol::errors::SimulationError;

pub fn safe_mul_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_mul(b)
        .ok_or_else(|| overflow("mul", a, b))
}

pub fn safe_div_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    if b.is_zero() {
        return Err(SimulationError::Overflow(format!("division of {a} by zero")));
    }
    Ok(a / b)
}

pub fn safe_add_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_add(b)
        .ok_or_else(|| overflow("add", a, b))
}

pub fn safe_sub_u256(a: U256, b: U256) -> Result<U256, SimulationError> {
    a.checked_sub(b)
        .ok_or_else(|| overflow("sub", a, b))
}

/// Ceiling division `a / b`, rounding away from zero on a non-zero remainder.
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, SimulationError> {
    let quotient = safe_div_u256(a, b)?;
    if (a % b).is_zero() {
        Ok(quotient)
    } else {
        safe_add_u256(quotient, U256::from(1u64))
    }
}

pub fn safe_add_i256(a: I256, b: I256) -> Result<I256, SimulationError> {
    a.checked_add(b)
        .ok_or_else(|| SimulationError::Overflow(format!("I256 add {a} + {b}")))
}

pub fn safe_sub_i256(a: I256, b: I256) -> Result<I256, SimulationError> {
    a.checked_sub(b)
        .ok_or_else(|| SimulationError::Overflow(format!("I256 sub {a} - {b}")))
}

/// Interprets an unsigned amount as a positive signed one.
pub fn u256_to_i256(value: U256) -> Result<I256, SimulationError> {
    I256::try_from(value)
        .map_err(|_| SimulationError::Overflow(format!("{value} does not fit into I256")))
}

/// Narrows a 512-bit intermediate back to the 256-bit word width.
pub fn u512_to_u256(value: U512) -> Result<U256, SimulationError> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return Err(SimulationError::Overflow(format!("{value} does not fit into U256")));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

fn overflow(op: &str, a: U256, b: U256) -> SimulationError {
    SimulationError::Overflow(format!("U256 {op} of {a} and {b}"))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    fn u256(s: &str) -> U256 {
        U256::from_str(s).unwrap()
    }

    #[rstest]
    #[case::overflow(U256::MAX, u256("2"), None)]
    #[case::ok(u256("3"), u256("2"), Some(u256("6")))]
    fn test_safe_mul_u256(#[case] a: U256, #[case] b: U256, #[case] expected: Option<U256>) {
        assert_eq!(safe_mul_u256(a, b).ok(), expected);
    }

    #[rstest]
    #[case::overflow(U256::MAX, u256("1"), None)]
    #[case::ok(u256("3"), u256("2"), Some(u256("5")))]
    fn test_safe_add_u256(#[case] a: U256, #[case] b: U256, #[case] expected: Option<U256>) {
        assert_eq!(safe_add_u256(a, b).ok(), expected);
    }

    #[rstest]
    #[case::underflow(u256("0"), u256("2"), None)]
    #[case::ok(u256("10"), u256("2"), Some(u256("8")))]
    fn test_safe_sub_u256(#[case] a: U256, #[case] b: U256, #[case] expected: Option<U256>) {
        assert_eq!(safe_sub_u256(a, b).ok(), expected);
    }

    #[rstest]
    #[case::by_zero(u256("1"), u256("0"), None)]
    #[case::floors(u256("11"), u256("2"), Some(u256("5")))]
    fn test_safe_div_u256(#[case] a: U256, #[case] b: U256, #[case] expected: Option<U256>) {
        assert_eq!(safe_div_u256(a, b).ok(), expected);
    }

    #[rstest]
    #[case::exact(u256("10"), u256("2"), u256("5"))]
    #[case::rounds_up(u256("11"), u256("2"), u256("6"))]
    #[case::zero(u256("0"), u256("7"), u256("0"))]
    fn test_div_rounding_up(#[case] a: U256, #[case] b: U256, #[case] expected: U256) {
        assert_eq!(div_rounding_up(a, b).unwrap(), expected);
    }

    #[test]
    fn test_signed_overflow_is_reported() {
        assert!(matches!(safe_add_i256(I256::MAX, I256::ONE), Err(SimulationError::Overflow(_))));
        assert!(matches!(safe_sub_i256(I256::MIN, I256::ONE), Err(SimulationError::Overflow(_))));
        assert_eq!(
            safe_sub_i256(I256::ZERO, I256::ONE).unwrap(),
            I256::MINUS_ONE
        );
    }

    #[test]
    fn test_u256_to_i256_rejects_top_bit() {
        assert!(u256_to_i256(U256::MAX).is_err());
        assert_eq!(u256_to_i256(U256::from(42u64)).unwrap(), I256::try_from(42i64).unwrap());
    }

    #[test]
    fn test_u512_to_u256() {
        assert_eq!(u512_to_u256(U512::from(U256::MAX)).unwrap(), U256::MAX);
        assert!(u512_to_u256(U512::from(U256::MAX) + U512::from(1u64)).is_err());
    }
}
