//! Block timestamp resolution.
//!
//! Many logs share a block, so block numbers are deduplicated before any lookup
//! and each distinct block costs exactly one request. The resulting map lives
//! for a single pipeline run.

use std::collections::{BTreeSet, HashMap};

use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    error::{Error, Result},
    vault::source::{LogSource, RawEvent},
};

/// Block number to UTC timestamp (seconds) for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTimestamps(HashMap<u64, u64>);

impl BlockTimestamps {
    /// Timestamp of `block`.
    ///
    /// A block missing here was never part of the resolved set, which is fatal
    /// for the scan.
    pub fn get(&self, block: u64) -> Result<u64> {
        self.0
            .get(&block)
            .copied()
            .ok_or(Error::MissingTimestamp(block))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves the timestamp of every block referenced by `events`.
///
/// Lookups run concurrently, at most `max_concurrency` at a time. Any failed
/// lookup fails the whole resolution, so a successful result covers every block.
pub async fn resolve<'a, S>(
    source: &S,
    events: impl IntoIterator<Item = &'a RawEvent>,
    max_concurrency: usize,
) -> Result<BlockTimestamps>
where
    S: LogSource,
{
    let blocks: BTreeSet<u64> = events.into_iter().map(|event| event.block_number).collect();
    log::debug!("resolving timestamps of {} blocks", blocks.len());

    let timestamps: HashMap<u64, u64> = stream::iter(blocks.iter().copied())
        .map(|number| async move {
            let timestamp = source.block_timestamp(number).await?;
            Ok::<_, Error>((number, timestamp))
        })
        .buffer_unordered(max_concurrency.max(1))
        .try_collect()
        .await?;

    Ok(BlockTimestamps(timestamps))
}
