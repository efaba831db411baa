use alloy::primitives::U256;

use crate::protocol::errors::SimulationError;

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

/// `2^128 / sqrt(1.0001)^(2^i)` for every bit `i` of an absolute tick, as Q128.128.
const RATIO_BY_BIT: [u128; 20] = [
    0xfffcb933bd6fad37aa2d162d1a594001,
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

/// Returns `sqrt(1.0001^tick) * 2^96`, rounded up, exactly as `TickMath.getSqrtRatioAtTick`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, SimulationError> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(SimulationError::OutOfRange(format!("tick {tick} outside of tick bounds")));
    }

    let mut ratio =
        if abs_tick & 1 != 0 { U256::from(RATIO_BY_BIT[0]) } else { U256::from(1u64) << 128 };
    for (bit, factor) in RATIO_BY_BIT.iter().enumerate().skip(1) {
        if abs_tick & (1 << bit) != 0 {
            ratio = ratio.wrapping_mul(U256::from(*factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    let round_up = !(ratio & U256::from(u32::MAX)).is_zero();
    Ok((ratio >> 32) + U256::from(round_up as u64))
}

/// Returns the greatest tick whose sqrt ratio is less than or equal to `sqrt_price`.
pub fn get_tick_at_sqrt_ratio(sqrt_price: U256) -> Result<i32, SimulationError> {
    if sqrt_price < MIN_SQRT_RATIO || sqrt_price >= MAX_SQRT_RATIO {
        return Err(SimulationError::OutOfRange(format!(
            "sqrt price {sqrt_price} outside of price bounds"
        )));
    }

    let (mut low, mut high) = (MIN_TICK, MAX_TICK);
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if get_sqrt_ratio_at_tick(mid)? <= sqrt_price {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::min(MIN_TICK, MIN_SQRT_RATIO)]
    #[case::max(MAX_TICK, MAX_SQRT_RATIO)]
    #[case::zero(0, U256::from(1u64) << 96)]
    #[case::one(1, U256::from_str("79232123823359799118286999568").unwrap())]
    #[case::minus_one(-1, U256::from_str("79224201403219477170569942574").unwrap())]
    #[case::minus_50000(-50000, U256::from_str("6504256538020985011912221507").unwrap())]
    #[case::plus_50000(50000, U256::from_str("965075977353221155028623082916").unwrap())]
    #[case::wbtc_weth(255830, U256::from_str("28436733218039095181458317217601181").unwrap())]
    fn test_get_sqrt_ratio_at_tick(#[case] tick: i32, #[case] expected: U256) {
        assert_eq!(get_sqrt_ratio_at_tick(tick).unwrap(), expected);
    }

    #[rstest]
    #[case::below_min(MIN_TICK - 1)]
    #[case::above_max(MAX_TICK + 1)]
    fn test_get_sqrt_ratio_at_tick_out_of_bounds(#[case] tick: i32) {
        assert!(matches!(get_sqrt_ratio_at_tick(tick), Err(SimulationError::OutOfRange(_))));
    }

    #[rstest]
    #[case::min(MIN_TICK)]
    #[case::negative(-50000)]
    #[case::zero(0)]
    #[case::positive(255830)]
    #[case::near_max(MAX_TICK - 1)]
    fn test_tick_round_trip(#[case] tick: i32) {
        let ratio = get_sqrt_ratio_at_tick(tick).unwrap();
        assert_eq!(get_tick_at_sqrt_ratio(ratio).unwrap(), tick);
        if tick > MIN_TICK {
            assert_eq!(get_tick_at_sqrt_ratio(ratio - U256::from(1u64)).unwrap(), tick - 1);
        }
    }

    #[test]
    fn test_get_tick_at_sqrt_ratio_bounds() {
        assert!(get_tick_at_sqrt_ratio(MIN_SQRT_RATIO - U256::from(1u64)).is_err());
        assert!(get_tick_at_sqrt_ratio(MAX_SQRT_RATIO).is_err());
        assert_eq!(
            get_tick_at_sqrt_ratio(MAX_SQRT_RATIO - U256::from(1u64)).unwrap(),
            MAX_TICK - 1
        );
    }
}
