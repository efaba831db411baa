//! Async collaborators that deliver pool snapshots and batched on-chain reads.
//!
//! Only the interfaces live here. Transports are provided by the embedding application.
use std::collections::HashMap;

use alloy::primitives::Address;
use async_trait::async_trait;
use futures::future::try_join_all;
use itertools::{Either, Itertools};
use metrics::counter;
use tracing::{debug, warn};

use crate::{
    models::PoolSnapshot,
    protocol::{
        errors::{InvalidSnapshotError, SourceError},
        models::SimulationConfig,
        state::PoolSimulator,
    },
};

/// Opaque pagination token handed out by a [`PoolLister`].
pub type Cursor = String;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoolPage {
    pub pools: Vec<PoolSnapshot>,
    /// `None` on the last page.
    pub next: Option<Cursor>,
}

/// Paginated source of pool snapshots.
#[async_trait]
pub trait PoolLister: Send + Sync {
    async fn fetch_page(
        &self,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<PoolPage, SourceError>;
}

/// Walks every page of `lister` and builds a simulator per supported snapshot, keyed by pool
/// address.
///
/// Snapshots of unsupported venues are ignored. Malformed ones are logged, counted and skipped
/// so a single bad pool never blocks discovery of the others.
pub async fn discover_pools<L>(
    lister: &L,
    config: &SimulationConfig,
    page_limit: usize,
) -> Result<HashMap<String, PoolSimulator>, SourceError>
where
    L: PoolLister + ?Sized,
{
    let mut simulators = HashMap::new();
    let mut cursor: Option<Cursor> = None;
    let mut skipped = 0usize;

    loop {
        let page = lister
            .fetch_page(cursor.clone(), page_limit)
            .await?;

        for snapshot in &page.pools {
            match PoolSimulator::from_snapshot(snapshot, config) {
                Ok(simulator) => {
                    simulators.insert(snapshot.address.clone(), simulator);
                }
                Err(InvalidSnapshotError::UnknownPoolType(pool_type)) => {
                    debug!(pool = %snapshot.address, %pool_type, "UnsupportedPoolType");
                }
                Err(e) => {
                    warn!(
                        pool = %snapshot.address,
                        block = snapshot.block_number,
                        error = %e,
                        "StateDecodingFailure"
                    );
                    counter!("pool_decode_failures", "pool_type" => snapshot.pool_type.clone())
                        .increment(1);
                    skipped += 1;
                }
            }
        }

        match page.next {
            Some(next) if cursor.as_ref() == Some(&next) => {
                return Err(SourceError::Decode(format!("cursor {next} did not advance")));
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(n = simulators.len(), skipped, "DiscoveredPools");
    Ok(simulators)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub call_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Vec<u8>,
}

/// Executes many read-only calls in one round trip, reporting each call's outcome.
#[async_trait]
pub trait MulticallReader: Send + Sync {
    async fn aggregate(&self, calls: Vec<Call>) -> Result<Vec<CallResult>, SourceError>;
}

/// Outcome of an aggregate read, by call index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitResults {
    pub successes: Vec<(usize, Vec<u8>)>,
    pub failures: Vec<usize>,
}

/// Partitions aggregate results into per-call successes and failures.
///
/// A failed call never fails its siblings; only a result count that does not match the call
/// count is an error.
pub fn split_results(
    calls: &[Call],
    results: Vec<CallResult>,
) -> Result<SplitResults, SourceError> {
    if calls.len() != results.len() {
        return Err(SourceError::Decode(format!(
            "{} results for {} calls",
            results.len(),
            calls.len()
        )));
    }
    let (successes, failures) = results
        .into_iter()
        .enumerate()
        .partition_map(|(index, result)| {
            if result.success {
                Either::Left((index, result.return_data))
            } else {
                Either::Right(index)
            }
        });
    Ok(SplitResults { successes, failures })
}

/// Runs `calls` as concurrent aggregate requests of at most `batch_size` calls each and
/// returns the results in call order.
pub async fn aggregate_in_batches<R>(
    reader: &R,
    calls: Vec<Call>,
    batch_size: usize,
) -> Result<Vec<CallResult>, SourceError>
where
    R: MulticallReader + ?Sized,
{
    if batch_size == 0 {
        return Err(SourceError::Transport("batch size must be positive".to_string()));
    }
    let batches = calls
        .chunks(batch_size)
        .map(|batch| reader.aggregate(batch.to_vec()));
    let results = try_join_all(batches).await?;
    Ok(results.into_iter().flatten().collect())
}
