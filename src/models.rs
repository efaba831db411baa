//! Pool snapshot records as delivered by the pool-list and tracker collaborators.
use std::{fmt::Display, str::FromStr};

use alloy::primitives::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::protocol::errors::{InvalidSnapshotError, SimulationError};

/// Token entry of a [`PoolSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    pub decimals: u32,
    #[serde(default = "default_swappable")]
    pub swappable: bool,
}

fn default_swappable() -> bool {
    true
}

/// Venue-agnostic wire record of one pool.
///
/// `extra` and `static_extra` are JSON documents whose schema depends on `pool_type`.
/// They stay strings on the wire and are parsed once, when the simulator is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub address: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub block_number: u64,
    pub reserves: Vec<String>,
    pub tokens: Vec<TokenSnapshot>,
    #[serde(default)]
    pub swap_fee: f64,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub static_extra: String,
}

/// Reads an integer written either as a JSON string or as a bare JSON number.
///
/// Bare numbers are read from their raw text, so values beyond `u64` keep every digit.
pub(crate) fn deserialize_integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    let text = raw.get().trim();
    let digits = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    digits
        .parse::<T>()
        .map_err(|err| serde::de::Error::custom(format!("integer {digits}: {err}")))
}

pub(crate) fn deserialize_optional_integer<'de, D, T>(
    deserializer: D,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    deserialize_integer(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u32,
    /// Whether the pool currently accepts swaps into or out of this token.
    pub swappable: bool,
}

impl Token {
    pub fn new(address: Address, symbol: &str, decimals: u32) -> Self {
        Token { address, symbol: symbol.to_string(), decimals, swappable: true }
    }
}

impl TryFrom<&TokenSnapshot> for Token {
    type Error = InvalidSnapshotError;

    fn try_from(value: &TokenSnapshot) -> Result<Self, Self::Error> {
        let address = Address::from_str(&value.address).map_err(|err| {
            InvalidSnapshotError::ValueError(format!("token address {}: {err}", value.address))
        })?;
        Ok(Token {
            address,
            symbol: value.symbol.clone(),
            decimals: value.decimals,
            swappable: value.swappable,
        })
    }
}

/// The parsed, venue-agnostic part of a pool: identity, ordered tokens and reserves.
///
/// The position of a token in `tokens` is its canonical index; `reserves` uses the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub address: String,
    pub exchange: String,
    pub tokens: Vec<Token>,
    pub reserves: Vec<BigUint>,
}

impl PoolInfo {
    pub fn new(
        address: &str,
        exchange: &str,
        tokens: Vec<Token>,
        reserves: Vec<BigUint>,
    ) -> Result<Self, InvalidSnapshotError> {
        if tokens.len() != reserves.len() {
            return Err(InvalidSnapshotError::LengthMismatch {
                tokens: tokens.len(),
                reserves: reserves.len(),
            });
        }
        if tokens.len() < 2 {
            return Err(InvalidSnapshotError::ValueError(format!(
                "pool {address} needs at least two tokens"
            )));
        }
        Ok(PoolInfo {
            address: address.to_string(),
            exchange: exchange.to_string(),
            tokens,
            reserves,
        })
    }

    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, InvalidSnapshotError> {
        let tokens = snapshot
            .tokens
            .iter()
            .map(Token::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let reserves = snapshot
            .reserves
            .iter()
            .map(|r| {
                BigUint::from_str(r)
                    .map_err(|_| InvalidSnapshotError::ValueError(format!("reserve {r}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        PoolInfo::new(&snapshot.address, &snapshot.exchange, tokens, reserves)
    }

    pub fn index_of(&self, token: &Address) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| &t.address == token)
    }

    /// Resolves the canonical indexes of a swap pair.
    pub fn resolve_pair(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<(usize, usize), SimulationError> {
        let index_in = self
            .index_of(token_in)
            .ok_or(SimulationError::UnknownToken(*token_in))?;
        let index_out = self
            .index_of(token_out)
            .ok_or(SimulationError::UnknownToken(*token_out))?;
        if index_in == index_out ||
            !self.tokens[index_in].swappable ||
            !self.tokens[index_out].swappable
        {
            return Err(SimulationError::UnsupportedPair {
                token_in: *token_in,
                token_out: *token_out,
            });
        }
        Ok((index_in, index_out))
    }
}
