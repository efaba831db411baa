//! Error types returned by pool simulators and their decoders.
use alloy::primitives::Address;
use thiserror::Error;

/// Failure of a single quote or commit call.
///
/// Every variant is returned to the immediate caller. A failed quote never
/// alters the simulator it was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("Token {0} is not part of this pool")]
    UnknownToken(Address),
    #[error("Swap amount must be strictly positive")]
    ZeroOrNegativeAmount,
    #[error("Pool cannot route {token_in} -> {token_out}")]
    UnsupportedPair { token_in: Address, token_out: Address },
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),
    #[error("Out of range: {0}")]
    OutOfRange(String),
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
    #[error("Swap produces no output")]
    ZeroOutput,
    #[error("{solver} did not converge within {iterations} iterations")]
    ConvergenceExhausted { solver: &'static str, iterations: usize },
    #[error("Incompatible state delta: {0}")]
    IncompatibleDelta(String),
}

/// Raised when a pool snapshot cannot be turned into a simulator.
#[derive(Debug, Error)]
pub enum InvalidSnapshotError {
    #[error("Missing attribute {0}")]
    MissingAttribute(String),
    #[error("Value error {0}")]
    ValueError(String),
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported pool type {0}")]
    UnknownPoolType(String),
    #[error("Pool lists {tokens} tokens but {reserves} reserves")]
    LengthMismatch { tokens: usize, reserves: usize },
}

/// Failure reported by an external collaborator (pool lister, multicall reader).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Decode error: {0}")]
    Decode(String),
}
