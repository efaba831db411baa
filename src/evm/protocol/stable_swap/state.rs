use alloy::primitives::{Address, U256};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::trace;

use super::math::{self, FEE_DENOMINATOR, MAX_LOOP_LIMIT};
use crate::{
    evm::protocol::{
        safe_math::{div_rounding_up, safe_add_u256, safe_div_u256, safe_mul_u256, safe_sub_u256},
        u256_num::{biguint_to_u256, u256_to_biguint, u256_to_f64},
    },
    models::PoolInfo,
    protocol::{
        errors::{InvalidSnapshotError, SimulationError},
        models::{Clock, SimulationConfig},
        pool_sim::{PoolSim, StateDelta, SwapQuote, VenueMetadata},
    },
};

/// Amplification schedule of a StableSwap pool.
///
/// Values are scaled by `a_precision`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Amplification {
    pub initial_a: U256,
    pub future_a: U256,
    pub initial_a_time: u64,
    pub future_a_time: u64,
    pub a_precision: U256,
}

impl Amplification {
    pub fn constant(a: U256, a_precision: U256) -> Self {
        Amplification {
            initial_a: a,
            future_a: a,
            initial_a_time: 0,
            future_a_time: 0,
            a_precision,
        }
    }
}

/// Two-coin StableSwap pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StableSwapState {
    info: PoolInfo,
    amplification: Amplification,
    /// Fee in units of [`FEE_DENOMINATOR`].
    swap_fee: U256,
    precision_multipliers: [U256; 2],
    /// Evaluated on every quote to place the amplification ramp.
    clock: Clock,
    gas: u64,
    strict_convergence: bool,
}

#[derive(Debug)]
struct ExactIn {
    amount_out: U256,
    fee: U256,
    net_amount_in: U256,
}

#[derive(Debug)]
struct ExactOut {
    amount_in: U256,
    fee: U256,
}

impl StableSwapState {
    pub fn new(
        info: PoolInfo,
        amplification: Amplification,
        swap_fee: U256,
        precision_multipliers: [U256; 2],
        clock: Clock,
        config: &SimulationConfig,
    ) -> Result<Self, InvalidSnapshotError> {
        if info.tokens.len() != 2 {
            return Err(InvalidSnapshotError::ValueError(format!(
                "stable swap pools hold two tokens, got {}",
                info.tokens.len()
            )));
        }
        if swap_fee >= U256::from(FEE_DENOMINATOR) {
            return Err(InvalidSnapshotError::ValueError(format!(
                "swap fee {swap_fee} is not below 100%"
            )));
        }
        if precision_multipliers
            .iter()
            .any(|m| m.is_zero())
        {
            return Err(InvalidSnapshotError::ValueError("zero precision multiplier".to_string()));
        }
        if amplification.a_precision.is_zero() ||
            amplification.initial_a.is_zero() ||
            amplification.future_a.is_zero()
        {
            return Err(InvalidSnapshotError::ValueError(format!(
                "amplification {amplification:?} must be positive"
            )));
        }
        Ok(StableSwapState {
            info,
            amplification,
            swap_fee,
            precision_multipliers,
            clock,
            gas: config.stable_swap_gas,
            strict_convergence: config.strict_convergence,
        })
    }

    /// Amplification coefficient in effect at the clock's current time.
    pub fn amplification(&self) -> Result<U256, SimulationError> {
        let amp = &self.amplification;
        let now = self.clock.now();
        math::ramp_a(amp.initial_a, amp.future_a, amp.initial_a_time, amp.future_a_time, now)
    }

    /// Reserves normalized to a common precision.
    fn xp(&self) -> Result<[U256; 2], SimulationError> {
        let reserve0 = biguint_to_u256(&self.info.reserves[0])?;
        let reserve1 = biguint_to_u256(&self.info.reserves[1])?;
        Ok([
            safe_mul_u256(reserve0, self.precision_multipliers[0])?,
            safe_mul_u256(reserve1, self.precision_multipliers[1])?,
        ])
    }

    fn invariant(&self, amp: U256, xp: &[U256; 2]) -> Result<U256, SimulationError> {
        math::compute_d(amp, self.amplification.a_precision, xp[0], xp[1], MAX_LOOP_LIMIT)?
            .settle("d", self.strict_convergence)
    }

    fn solve_y(&self, amp: U256, x: U256, d: U256) -> Result<U256, SimulationError> {
        math::get_y(amp, self.amplification.a_precision, x, d, MAX_LOOP_LIMIT)?
            .settle("y", self.strict_convergence)
    }

    /// Output for an input that has already been charged its fee.
    fn output_for_net_input(
        &self,
        index_in: usize,
        index_out: usize,
        net_amount_in: U256,
    ) -> Result<U256, SimulationError> {
        let amp = self.amplification()?;
        let xp = self.xp()?;
        let d = self.invariant(amp, &xp)?;

        let x = safe_add_u256(
            xp[index_in],
            safe_mul_u256(net_amount_in, self.precision_multipliers[index_in])?,
        )?;
        let y = self.solve_y(amp, x, d)?;

        // rounds in the pool's favor
        let dy = safe_sub_u256(safe_sub_u256(xp[index_out], y)?, U256::from(1u64)).map_err(|_| {
            SimulationError::InsufficientLiquidity(format!(
                "pool {} cannot pay out",
                self.info.address
            ))
        })?;
        safe_div_u256(dy, self.precision_multipliers[index_out])
    }

    fn exact_in(
        &self,
        index_in: usize,
        index_out: usize,
        amount_in: U256,
    ) -> Result<ExactIn, SimulationError> {
        let fee =
            safe_div_u256(safe_mul_u256(amount_in, self.swap_fee)?, U256::from(FEE_DENOMINATOR))?;
        let net_amount_in = safe_sub_u256(amount_in, fee)?;

        let amount_out = self.output_for_net_input(index_in, index_out, net_amount_in)?;
        if amount_out.is_zero() {
            return Err(SimulationError::ZeroOutput);
        }
        let reserve_out = biguint_to_u256(&self.info.reserves[index_out])?;
        if amount_out >= reserve_out {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "output {amount_out} exhausts reserve {reserve_out}"
            )));
        }
        Ok(ExactIn { amount_out, fee, net_amount_in })
    }

    fn exact_out(
        &self,
        index_in: usize,
        index_out: usize,
        amount_out: U256,
    ) -> Result<ExactOut, SimulationError> {
        let reserve_out = biguint_to_u256(&self.info.reserves[index_out])?;
        if amount_out >= reserve_out {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "output {amount_out} exhausts reserve {reserve_out}"
            )));
        }
        let amp = self.amplification()?;
        let xp = self.xp()?;
        let d = self.invariant(amp, &xp)?;

        let y = safe_sub_u256(
            xp[index_out],
            safe_mul_u256(amount_out, self.precision_multipliers[index_out])?,
        )?;
        let x = self.solve_y(amp, y, d)?;
        let dx = safe_add_u256(safe_sub_u256(x, xp[index_in])?, U256::from(1u64))?;

        let net_amount_in = div_rounding_up(dx, self.precision_multipliers[index_in])?;
        let fee_denominator = U256::from(FEE_DENOMINATOR);
        let amount_in = div_rounding_up(
            safe_mul_u256(net_amount_in, fee_denominator)?,
            safe_sub_u256(fee_denominator, self.swap_fee)?,
        )?;
        let fee = safe_div_u256(safe_mul_u256(amount_in, self.swap_fee)?, fee_denominator)?;
        Ok(ExactOut { amount_in, fee })
    }
}

impl PoolSim for StableSwapState {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn fee(&self) -> f64 {
        u256_to_f64(self.swap_fee) / FEE_DENOMINATOR as f64
    }

    fn spot_price(&self, base: &Address, quote: &Address) -> Result<f64, SimulationError> {
        let (index_base, index_quote) = self.info.resolve_pair(base, quote)?;
        let base_decimals = self.info.tokens[index_base].decimals;
        let quote_decimals = self.info.tokens[index_quote].decimals;

        let unit = U256::from(10u64)
            .checked_pow(U256::from(base_decimals))
            .ok_or_else(|| SimulationError::Overflow(format!("10^{base_decimals}")))?;
        let amount_out = self.output_for_net_input(index_base, index_quote, unit)?;
        Ok(u256_to_f64(amount_out) / 10f64.powi(quote_decimals as i32))
    }

    fn quote_exact_input(
        &self,
        token_in: &Address,
        amount_in: &BigUint,
        token_out: &Address,
    ) -> Result<SwapQuote, SimulationError> {
        let (index_in, index_out) = self.info.resolve_pair(token_in, token_out)?;
        if amount_in.is_zero() {
            return Err(SimulationError::ZeroOrNegativeAmount);
        }
        let result = self.exact_in(index_in, index_out, biguint_to_u256(amount_in)?)?;
        trace!(?amount_in, ?index_in, ?index_out, ?result, "STABLE SWAP");

        Ok(SwapQuote {
            amount_in: amount_in.clone(),
            amount_out: u256_to_biguint(result.amount_out),
            fee: u256_to_biguint(result.fee),
            gas: self.gas,
            remaining: BigUint::zero(),
            delta: StateDelta::StableSwap {
                index_in,
                index_out,
                reserve_in_added: u256_to_biguint(result.net_amount_in),
                reserve_out_removed: u256_to_biguint(result.amount_out),
            },
        })
    }

    fn quote_exact_output(
        &self,
        token_out: &Address,
        amount_out: &BigUint,
        token_in: &Address,
    ) -> Result<SwapQuote, SimulationError> {
        let (index_in, index_out) = self.info.resolve_pair(token_in, token_out)?;
        if amount_out.is_zero() {
            return Err(SimulationError::ZeroOrNegativeAmount);
        }
        let result = self.exact_out(index_in, index_out, biguint_to_u256(amount_out)?)?;
        trace!(?amount_out, ?index_in, ?index_out, ?result, "STABLE SWAP EXACT OUT");

        Ok(SwapQuote {
            amount_in: u256_to_biguint(result.amount_in),
            amount_out: amount_out.clone(),
            fee: u256_to_biguint(result.fee),
            gas: self.gas,
            remaining: BigUint::zero(),
            delta: StateDelta::StableSwap {
                index_in,
                index_out,
                reserve_in_added: u256_to_biguint(safe_sub_u256(result.amount_in, result.fee)?),
                reserve_out_removed: amount_out.clone(),
            },
        })
    }

    fn get_limits(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<(BigUint, BigUint), SimulationError> {
        let (index_in, index_out) = self.info.resolve_pair(token_in, token_out)?;
        // the input needed grows without bound as the output approaches the full reserve
        let max_out = &self.info.reserves[index_out] * 99u32 / 100u32;
        if max_out.is_zero() {
            return Ok((BigUint::zero(), BigUint::zero()));
        }
        let max_in = self
            .exact_out(index_in, index_out, biguint_to_u256(&max_out)?)?
            .amount_in;
        Ok((u256_to_biguint(max_in), max_out))
    }

    fn commit(&mut self, delta: &StateDelta) -> Result<(), SimulationError> {
        let StateDelta::StableSwap { index_in, index_out, reserve_in_added, reserve_out_removed } =
            delta
        else {
            return Err(SimulationError::IncompatibleDelta(format!(
                "{delta:?} applied to stable swap pool {}",
                self.info.address
            )));
        };
        if index_in == index_out || *index_in > 1 || *index_out > 1 {
            return Err(SimulationError::IncompatibleDelta(format!(
                "token indexes {index_in}, {index_out} for pool {}",
                self.info.address
            )));
        }
        if reserve_out_removed > &self.info.reserves[*index_out] {
            return Err(SimulationError::InsufficientLiquidity(format!(
                "removing {reserve_out_removed} from reserve {}",
                self.info.reserves[*index_out]
            )));
        }
        self.info.reserves[*index_in] += reserve_in_added;
        self.info.reserves[*index_out] -= reserve_out_removed;
        Ok(())
    }

    fn metadata(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<VenueMetadata, SimulationError> {
        let (index_in, index_out) = self.info.resolve_pair(token_in, token_out)?;
        Ok(VenueMetadata::StableSwap {
            pool: self.info.address.clone(),
            exchange: self.info.exchange.clone(),
            token_in_index: index_in,
            token_out_index: index_out,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        str::FromStr,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc,
        },
    };

    use alloy::primitives::address;
    use rstest::rstest;

    use super::*;
    use crate::models::Token;

    pub(crate) const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
    pub(crate) const SUSD: Address = address!("57Ab1ec28D129707052df4dF418D58a2D46d5f51");
    const USDC: Address = address!("A0b86991c6218b36c1d19d4a2e9eB0cE3606eB48");

    fn big(s: &str) -> BigUint {
        BigUint::from_str(s).unwrap()
    }

    fn u256(s: &str) -> U256 {
        U256::from_str(s).unwrap()
    }

    fn pool_with(
        tokens: Vec<Token>,
        reserves: [&str; 2],
        precision_multipliers: [U256; 2],
        config: &SimulationConfig,
    ) -> StableSwapState {
        let info = PoolInfo::new(
            "0xa5407eae9ba41422680e2e00537571bcc53efbfd",
            "curve-stable-plain",
            tokens,
            reserves.iter().map(|r| big(r)).collect(),
        )
        .unwrap();
        StableSwapState::new(
            info,
            Amplification::constant(U256::from(200_000u64), U256::from(100u64)),
            U256::from(6u64),
            precision_multipliers,
            Clock::Fixed(0),
            config,
        )
        .unwrap()
    }

    pub(crate) fn golden_pool(reserves: [&str; 2]) -> StableSwapState {
        pool_with(
            vec![Token::new(DAI, "DAI", 18), Token::new(SUSD, "sUSD", 18)],
            reserves,
            [U256::from(1u64), U256::from(1u64)],
            &SimulationConfig::default(),
        )
    }

    const FIRST_POOL: [&str; 2] = ["53038106898661241621939", "75247964820990618778857"];
    const SECOND_POOL: [&str; 2] = ["53332989360391363843011", "74994257625190868514451"];

    #[rstest]
    #[case::first_pool(FIRST_POOL, DAI, SUSD, "1000031964522011533")]
    #[case::second_pool(SECOND_POOL, DAI, SUSD, "1000029391004839352")]
    #[case::second_pool_reverse(SECOND_POOL, SUSD, DAI, "999850607765728933")]
    fn test_quote_exact_input(
        #[case] reserves: [&str; 2],
        #[case] token_in: Address,
        #[case] token_out: Address,
        #[case] expected: &str,
    ) {
        let pool = golden_pool(reserves);
        let quote = pool
            .quote_exact_input(&token_in, &big("1000000000000000000"), &token_out)
            .unwrap();

        assert_eq!(quote.amount_out, big(expected));
        assert_eq!(quote.fee, big("60000000000000"));
        assert_eq!(quote.gas, 130_000);
        assert!(!quote.is_partial());
    }

    #[rstest]
    #[case::first_pool(FIRST_POOL, DAI, SUSD, "1000000000000000000")]
    #[case::first_pool_large(FIRST_POOL, DAI, SUSD, "1000000000000000000000")]
    #[case::first_pool_huge(FIRST_POOL, DAI, SUSD, "50000000000000000000000")]
    #[case::second_pool(SECOND_POOL, DAI, SUSD, "1000000000000000000")]
    #[case::second_pool_reverse(SECOND_POOL, SUSD, DAI, "1000000000000000000")]
    fn test_exact_output_inverts_exact_input(
        #[case] reserves: [&str; 2],
        #[case] token_in: Address,
        #[case] token_out: Address,
        #[case] amount_in: &str,
    ) {
        let pool = golden_pool(reserves);
        let forward = pool
            .quote_exact_input(&token_in, &big(amount_in), &token_out)
            .unwrap();
        let backward = pool
            .quote_exact_output(&token_out, &forward.amount_out, &token_in)
            .unwrap();

        assert_eq!(backward.amount_in, big(amount_in));
        assert_eq!(backward.amount_out, forward.amount_out);
    }

    #[test]
    fn test_exact_output_covers_requested_amount() {
        let pool = golden_pool(FIRST_POOL);
        let requested = big("777777777777777777777");
        let quote = pool
            .quote_exact_output(&SUSD, &requested, &DAI)
            .unwrap();
        let filled = pool
            .quote_exact_input(&DAI, &quote.amount_in, &SUSD)
            .unwrap();

        assert!(filled.amount_out >= requested);
    }

    #[rstest]
    #[case::whole_reserve("75247964820990618778857")]
    #[case::beyond_reserve("75247964820990618778858")]
    fn test_exact_output_beyond_reserve(#[case] amount_out: &str) {
        let pool = golden_pool(FIRST_POOL);
        let err = pool
            .quote_exact_output(&SUSD, &big(amount_out), &DAI)
            .unwrap_err();
        assert!(matches!(err, SimulationError::InsufficientLiquidity(_)));
    }

    #[test]
    fn test_huge_input_stays_below_reserve() {
        let pool = golden_pool(FIRST_POOL);
        let quote = pool
            .quote_exact_input(&DAI, &big("1000000000000000000000000000000"), &SUSD)
            .unwrap();
        assert_eq!(quote.amount_out, big("75247964820990618712873"));
        assert!(quote.amount_out < pool.info().reserves[1]);
    }

    #[rstest]
    #[case::unknown_token(Address::ZERO, SUSD, "1", SimulationError::UnknownToken(Address::ZERO))]
    #[case::same_token(
        DAI,
        DAI,
        "1",
        SimulationError::UnsupportedPair { token_in: DAI, token_out: DAI }
    )]
    #[case::zero_amount(DAI, SUSD, "0", SimulationError::ZeroOrNegativeAmount)]
    #[case::dust(DAI, SUSD, "1", SimulationError::ZeroOutput)]
    fn test_quote_rejections(
        #[case] token_in: Address,
        #[case] token_out: Address,
        #[case] amount: &str,
        #[case] expected: SimulationError,
    ) {
        let pool = golden_pool(FIRST_POOL);
        assert_eq!(
            pool.quote_exact_input(&token_in, &big(amount), &token_out)
                .unwrap_err(),
            expected
        );
    }

    #[test]
    fn test_commit_applies_delta() {
        let mut pool = golden_pool(FIRST_POOL);
        let quote = pool
            .quote_exact_input(&DAI, &big("1000000000000000000"), &SUSD)
            .unwrap();

        pool.commit(&quote.delta).unwrap();

        assert_eq!(
            pool.info().reserves,
            vec![big("53039106838661241621939"), big("75246964789026096767324")]
        );
        let next = pool
            .quote_exact_input(&DAI, &big("1000000000000000000"), &SUSD)
            .unwrap();
        assert_eq!(next.amount_out, big("1000031955217105837"));
    }

    #[test]
    fn test_commit_rejects_invalid_deltas() {
        let mut pool = golden_pool(FIRST_POOL);
        let overdraw = StateDelta::StableSwap {
            index_in: 0,
            index_out: 1,
            reserve_in_added: big("1"),
            reserve_out_removed: big("75247964820990618778858"),
        };
        assert!(matches!(pool.commit(&overdraw), Err(SimulationError::InsufficientLiquidity(_))));

        let foreign = StateDelta::ConcentratedLiquidity {
            sqrt_price: U256::from(1u64),
            liquidity: 1,
            tick: 0,
        };
        assert!(matches!(pool.commit(&foreign), Err(SimulationError::IncompatibleDelta(_))));
        assert_eq!(pool, golden_pool(FIRST_POOL));
    }

    #[rstest]
    #[case::dai_for_susd(DAI, SUSD, "75167371778883288722557", "74495485172780712591068")]
    #[case::susd_for_dai(SUSD, DAI, "53460893572224341272635", "52507725829674629205719")]
    fn test_get_limits(
        #[case] token_in: Address,
        #[case] token_out: Address,
        #[case] max_in: &str,
        #[case] max_out: &str,
    ) {
        let pool = golden_pool(FIRST_POOL);
        let limits = pool.get_limits(&token_in, &token_out).unwrap();
        assert_eq!(limits, (big(max_in), big(max_out)));

        let filled = pool
            .quote_exact_input(&token_in, &limits.0, &token_out)
            .unwrap();
        assert!(filled.amount_out >= limits.1);
    }

    #[test]
    fn test_mixed_decimals() {
        let pool = pool_with(
            vec![Token::new(USDC, "USDC", 6), Token::new(DAI, "DAI", 18)],
            ["1000000000000", "1100000000000000000000000"],
            [u256("1000000000000"), U256::from(1u64)],
            &SimulationConfig::default(),
        );

        let quote = pool
            .quote_exact_input(&USDC, &big("1000000000"), &DAI)
            .unwrap();
        assert_eq!(quote.amount_out, big("999963669470130073729"));

        let reverse = pool
            .quote_exact_input(&DAI, &big("1000000000000000000000"), &USDC)
            .unwrap();
        assert_eq!(reverse.amount_out, big("999915848"));

        let back = pool
            .quote_exact_output(&USDC, &reverse.amount_out, &DAI)
            .unwrap();
        approx::assert_relative_eq!(
            u256_to_f64(biguint_to_u256(&back.amount_in).unwrap()),
            1e21,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_amplification_ramp_follows_clock() {
        let time = Arc::new(AtomicU64::new(1_250));
        let source = Arc::clone(&time);
        let pool = StableSwapState::new(
            golden_pool(FIRST_POOL).info.clone(),
            Amplification {
                initial_a: U256::from(10_000u64),
                future_a: U256::from(20_000u64),
                initial_a_time: 1_000,
                future_a_time: 2_000,
                a_precision: U256::from(100u64),
            },
            U256::from(6u64),
            [U256::from(1u64), U256::from(1u64)],
            Clock::live(move || source.load(Ordering::SeqCst)),
            &SimulationConfig::default(),
        )
        .unwrap();
        let shared = &pool;

        assert_eq!(shared.amplification().unwrap(), U256::from(12_500u64));
        let early = shared
            .quote_exact_input(&DAI, &big("1000000000000000000000"), &SUSD)
            .unwrap();

        time.store(3_000, Ordering::SeqCst);
        assert_eq!(shared.amplification().unwrap(), U256::from(20_000u64));
        let late = shared
            .quote_exact_input(&DAI, &big("1000000000000000000000"), &SUSD)
            .unwrap();

        assert_eq!(early.amount_out, big("1001332957858276952094"));
        assert_eq!(late.amount_out, big("1000811812876766058759"));
    }

    #[test]
    fn test_spot_price_and_fee() {
        let pool = golden_pool(FIRST_POOL);

        approx::assert_relative_eq!(
            pool.spot_price(&DAI, &SUSD).unwrap(),
            1.00009197,
            max_relative = 1e-8
        );
        approx::assert_relative_eq!(
            pool.spot_price(&SUSD, &DAI).unwrap(),
            0.99990803,
            max_relative = 1e-8
        );
        approx::assert_ulps_eq!(pool.fee(), 0.00006);
    }

    #[test]
    fn test_metadata() {
        let pool = golden_pool(FIRST_POOL);
        let metadata = pool.metadata(&SUSD, &DAI).unwrap();
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            serde_json::json!({
                "kind": "stableSwap",
                "pool": "0xa5407eae9ba41422680e2e00537571bcc53efbfd",
                "exchange": "curve-stable-plain",
                "tokenInIndex": 1,
                "tokenOutIndex": 0,
            })
        );
    }

    #[rstest]
    #[case::fee_too_high(U256::from(100_000u64), [U256::from(1u64), U256::from(1u64)])]
    #[case::zero_multiplier(U256::from(6u64), [U256::ZERO, U256::from(1u64)])]
    fn test_invalid_parameters(#[case] swap_fee: U256, #[case] multipliers: [U256; 2]) {
        let info = golden_pool(FIRST_POOL).info.clone();
        assert!(StableSwapState::new(
            info,
            Amplification::constant(U256::from(200_000u64), U256::from(100u64)),
            swap_fee,
            multipliers,
            Clock::Fixed(0),
            &SimulationConfig::default(),
        )
        .is_err());
    }
}
