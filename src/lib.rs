//! Off-chain pricing core of a multi-venue liquidity aggregator.
//!
//! Pools are built from [`models::PoolSnapshot`] records into a
//! [`protocol::state::PoolSimulator`], which quotes swaps locally with the same integer
//! arithmetic as the on-chain contracts. Quoting never mutates a simulator; accepted swaps are
//! applied through [`protocol::pool_sim::PoolSim::commit`].
pub mod evm;
pub mod models;
pub mod protocol;

// Re-exports
pub use num_bigint;
pub use protocol::{
    errors::{InvalidSnapshotError, SimulationError},
    models::{Clock, SimulationConfig},
    pool_sim::{PoolSim, StateDelta, SwapQuote, VenueMetadata},
    state::{PoolSimulator, PoolType},
};
