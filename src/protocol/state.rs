//! The closed set of supported venues and the snapshot dispatch table.
use std::{fmt, str::FromStr};

use alloy::primitives::Address;
use num_bigint::BigUint;

use crate::{
    evm::protocol::{stable_swap::state::StableSwapState, uniswap_v3::state::UniswapV3State},
    models::{PoolInfo, PoolSnapshot},
    protocol::{
        errors::{InvalidSnapshotError, SimulationError},
        models::{SimulationConfig, TryFromSnapshot},
        pool_sim::{PoolSim, StateDelta, SwapQuote, VenueMetadata},
    },
};

/// Pricing engine selected by a snapshot's `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolType {
    ConcentratedLiquidity,
    StableSwap,
}

impl FromStr for PoolType {
    type Err = InvalidSnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniswap-v3" | "pancake-v3" | "sushiswap-v3" => Ok(PoolType::ConcentratedLiquidity),
            "stable-swap" | "curve-stable-plain" => Ok(PoolType::StableSwap),
            other => Err(InvalidSnapshotError::UnknownPoolType(other.to_string())),
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolType::ConcentratedLiquidity => write!(f, "concentrated-liquidity"),
            PoolType::StableSwap => write!(f, "stable-swap"),
        }
    }
}

/// A pool simulator of any supported venue.
#[enum_delegate::implement(PoolSim)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSimulator {
    ConcentratedLiquidity(UniswapV3State),
    StableSwap(StableSwapState),
}

impl PoolSimulator {
    /// Builds the simulator matching the snapshot's `type` tag.
    pub fn from_snapshot(
        snapshot: &PoolSnapshot,
        config: &SimulationConfig,
    ) -> Result<Self, InvalidSnapshotError> {
        match snapshot.pool_type.parse::<PoolType>()? {
            PoolType::ConcentratedLiquidity => Ok(PoolSimulator::ConcentratedLiquidity(
                UniswapV3State::try_from_snapshot(snapshot, config)?,
            )),
            PoolType::StableSwap => {
                Ok(PoolSimulator::StableSwap(StableSwapState::try_from_snapshot(snapshot, config)?))
            }
        }
    }

    pub fn pool_type(&self) -> PoolType {
        match self {
            PoolSimulator::ConcentratedLiquidity(_) => PoolType::ConcentratedLiquidity,
            PoolSimulator::StableSwap(_) => PoolType::StableSwap,
        }
    }

    /// Deep copy that can be committed to without affecting `self`.
    pub fn clone_state(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, str::FromStr, thread};

    use alloy::primitives::address;
    use rstest::rstest;

    use super::*;
    use crate::evm::protocol::{
        stable_swap::decoder::tests::curve_snapshot, uniswap_v3::decoder::tests::pancake_snapshot,
    };

    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
    const SUSD: Address = address!("57Ab1ec28D129707052df4dF418D58a2D46d5f51");

    fn big(s: &str) -> BigUint {
        BigUint::from_str(s).unwrap()
    }

    #[rstest]
    #[case::uniswap("uniswap-v3", PoolType::ConcentratedLiquidity)]
    #[case::pancake("pancake-v3", PoolType::ConcentratedLiquidity)]
    #[case::sushi("sushiswap-v3", PoolType::ConcentratedLiquidity)]
    #[case::plain("curve-stable-plain", PoolType::StableSwap)]
    #[case::generic("stable-swap", PoolType::StableSwap)]
    fn test_parse_pool_type(#[case] tag: &str, #[case] expected: PoolType) {
        assert_eq!(tag.parse::<PoolType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_pool_type() {
        let mut snapshot = pancake_snapshot();
        snapshot.pool_type = "uniswap-v2".to_string();
        assert!(matches!(
            PoolSimulator::from_snapshot(&snapshot, &SimulationConfig::default()),
            Err(InvalidSnapshotError::UnknownPoolType(tag)) if tag == "uniswap-v2"
        ));
    }

    #[test]
    fn test_dispatch_matches_venue() {
        let config = SimulationConfig::default();
        let cl = PoolSimulator::from_snapshot(&pancake_snapshot(), &config).unwrap();
        let stable = PoolSimulator::from_snapshot(&curve_snapshot(), &config).unwrap();

        assert_eq!(cl.pool_type(), PoolType::ConcentratedLiquidity);
        assert_eq!(stable.pool_type(), PoolType::StableSwap);
        assert_eq!(
            cl.quote_exact_input(&WETH, &big("1000000000000000000"), &USDC)
                .unwrap()
                .amount_out,
            big("2477620399")
        );
        assert_eq!(
            stable
                .quote_exact_input(&DAI, &big("1000000000000000000"), &SUSD)
                .unwrap()
                .amount_out,
            big("1000031964522011533")
        );
        assert_eq!(stable.info().address, "0xa5407eae9ba41422680e2e00537571bcc53efbfd");
    }

    #[test]
    fn test_clone_state_is_independent() {
        let config = SimulationConfig::default();
        let original = PoolSimulator::from_snapshot(&curve_snapshot(), &config).unwrap();
        let quote = original
            .quote_exact_input(&DAI, &big("1000000000000000000000"), &SUSD)
            .unwrap();

        let mut scratch = original.clone_state();
        scratch.commit(&quote.delta).unwrap();

        assert_ne!(scratch, original);
        assert_eq!(
            original
                .quote_exact_input(&DAI, &big("1000000000000000000000"), &SUSD)
                .unwrap(),
            quote
        );
    }

    #[test]
    fn test_concurrent_quotes_are_identical() {
        let config = SimulationConfig::default();
        let pools = [
            (PoolSimulator::from_snapshot(&pancake_snapshot(), &config).unwrap(), WETH, USDC),
            (PoolSimulator::from_snapshot(&curve_snapshot(), &config).unwrap(), DAI, SUSD),
        ];
        let threads = 2 * thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);
        let amount = big("1000000000000000000");

        for (pool, token_in, token_out) in &pools {
            let expected = pool
                .quote_exact_input(token_in, &amount, token_out)
                .unwrap();
            let results: Vec<SwapQuote> = thread::scope(|scope| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        scope.spawn(|| {
                            pool.quote_exact_input(token_in, &amount, token_out)
                                .unwrap()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .collect()
            });

            assert_eq!(results.len(), threads);
            assert!(results.iter().all(|r| r == &expected));
        }
    }

    #[test]
    fn test_metadata_through_enum() {
        let pool = PoolSimulator::from_snapshot(&pancake_snapshot(), &SimulationConfig::default())
            .unwrap();
        assert!(matches!(
            pool.metadata(&USDC, &WETH).unwrap(),
            VenueMetadata::ConcentratedLiquidity {
                zero_for_one: true,
                tick_spacing: 1,
                fee_pips: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_foreign_delta_rejected() {
        let mut pool =
            PoolSimulator::from_snapshot(&pancake_snapshot(), &SimulationConfig::default())
                .unwrap();
        let delta = StateDelta::StableSwap {
            index_in: 0,
            index_out: 1,
            reserve_in_added: big("1"),
            reserve_out_removed: big("1"),
        };
        assert!(matches!(pool.commit(&delta), Err(SimulationError::IncompatibleDelta(_))));
    }

    #[test]
    fn test_simulators_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PoolSimulator>();
        assert_send_sync::<PoolInfo>();
    }
}
