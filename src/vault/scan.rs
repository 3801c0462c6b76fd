//! Chunked range scanner.
//!
//! Nodes cap `eth_getLogs` by block span or by result size, so a scan over
//! `[from, head]` is split into consecutive sub-ranges of at most `chunk_size`
//! blocks. Every (sub-range, query) pair is one request; at most
//! `max_concurrency` requests are in flight, but results always come back in
//! range order.
//!
//! There are no retries: the first failing request aborts the scan, since
//! silently missing a window would understate the vault's flows.

use std::iter;

use alloy::sol_types::SolEvent;
use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    Address,
    error::{Error, Result},
    evm::{ERC20, Vault, topic::encode_address},
    vault::source::{LogBatch, LogQuery, LogSource},
};

/// Splits `[from, to]` into consecutive inclusive sub-ranges of at most `chunk_size` blocks.
///
/// Sub-ranges are produced lazily. Yields nothing when `from > to` or
/// `chunk_size` is zero.
pub fn chunk_range(from: u64, to: u64, chunk_size: u64) -> impl Iterator<Item = (u64, u64)> {
    let end_of = move |start: u64| start.saturating_add(chunk_size - 1).min(to);
    let first = (chunk_size > 0 && from <= to).then(|| (from, end_of(from)));
    iter::successors(first, move |&(_, end)| {
        (end < to).then(|| (end + 1, end_of(end + 1)))
    })
}

/// Inflow and outflow queries of `vault` on the `asset` token.
///
/// Inflows are transfers with the vault as indexed recipient (`topic2`), outflows
/// are transfers with the vault as indexed sender (`topic1`).
pub fn flow_queries(asset: Address, vault: Address) -> [LogQuery; 2] {
    let transfers = LogQuery::new(asset).events([ERC20::Transfer::SIGNATURE_HASH]);
    let vault = encode_address(vault);
    [transfers.clone().topic2(vault), transfers.topic1(vault)]
}

/// Deposit, withdraw and mission events emitted by the vault.
pub fn vault_query(vault: Address) -> LogQuery {
    LogQuery::new(vault).events([
        Vault::Deposit::SIGNATURE_HASH,
        Vault::Withdraw::SIGNATURE_HASH,
        Vault::MissionCompleted::SIGNATURE_HASH,
    ])
}

/// Logs gathered by a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub from_block: u64,
    /// Head block at the time of the scan.
    pub to_block: u64,
    /// One batch per query, concatenated in range order.
    pub logs: Vec<LogBatch>,
}

/// Runs log queries over a block range in bounded chunks.
pub struct Scanner<'a, S> {
    source: &'a S,
    chunk_size: u64,
    max_concurrency: usize,
}

impl<'a, S> Scanner<'a, S>
where
    S: LogSource,
{
    pub fn new(source: &'a S, chunk_size: u64, max_concurrency: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Scans `[from_block, head]`.
    pub async fn scan(&self, from_block: u64, queries: &[LogQuery]) -> Result<Scan> {
        let head = self.source.head().await?;
        let logs = self.scan_range(from_block, head, queries).await?;
        Ok(Scan {
            from_block,
            to_block: head,
            logs,
        })
    }

    /// Scans `[from_block, to_block]`, returning one batch of logs per query.
    pub async fn scan_range(
        &self,
        from_block: u64,
        to_block: u64,
        queries: &[LogQuery],
    ) -> Result<Vec<LogBatch>> {
        log::debug!(
            "scanning blocks {from_block}..={to_block} in chunks of {} blocks",
            self.chunk_size
        );

        let source = self.source;
        let chunks = chunk_range(from_block, to_block, self.chunk_size);
        let requests = chunks.flat_map(|(start, end)| {
            queries
                .iter()
                .enumerate()
                .map(move |(index, query)| (index, query.with_range(start, end)))
        });

        stream::iter(requests)
            .map(|(index, query)| async move {
                let batch = source.logs(&query).await.inspect_err(|err| {
                    log::error!(
                        "fetching logs in {}..={}: {err}",
                        query.from_block,
                        query.to_block
                    )
                })?;
                Ok::<_, Error>((index, batch))
            })
            .buffered(self.max_concurrency)
            .try_fold(
                vec![LogBatch::default(); queries.len()],
                |mut logs, (index, batch)| async move {
                    logs[index].extend(batch);
                    Ok::<_, Error>(logs)
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy::primitives::address;

    use super::*;
    use crate::vault::source::mock::{self, MockSource};

    const VAULT: Address = address!("0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2");
    const ASSET: Address = address!("0xd077a400968890eacc75cdc901f0356c943e4fdb");
    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");
    const BOB: Address = address!("0x2222222222222222222222222222222222222222");

    fn chunks(from: u64, to: u64, chunk_size: u64) -> Vec<(u64, u64)> {
        chunk_range(from, to, chunk_size).collect()
    }

    #[test]
    fn test_chunk_range() {
        assert_eq!(
            chunks(0, 12_000, 5_000),
            vec![(0, 4_999), (5_000, 9_999), (10_000, 12_000)]
        );
        assert_eq!(chunks(7, 7, 5_000), vec![(7, 7)]);
        assert_eq!(chunks(0, 9_999, 5_000), vec![(0, 4_999), (5_000, 9_999)]);
        assert_eq!(chunks(10, 9, 5_000), vec![]);
        assert_eq!(chunks(0, 10, 0), vec![]);
        assert_eq!(
            chunks(u64::MAX - 1, u64::MAX, 5_000),
            vec![(u64::MAX - 1, u64::MAX)]
        );
    }

    #[test]
    fn test_chunk_range_is_lazy() {
        // one-block chunks over the whole chain
        let mut ranges = chunk_range(0, u64::MAX, 1);
        assert_eq!(ranges.next(), Some((0, 0)));
        assert_eq!(ranges.next(), Some((1, 1)));
        assert_eq!(ranges.nth(9), Some((11, 11)));
    }

    #[test]
    fn test_chunks_cover_range() {
        let ranges = chunks(123, 98_765, 1_000);
        assert_eq!(ranges.first().map(|r| r.0), Some(123));
        assert_eq!(ranges.last().map(|r| r.1), Some(98_765));
        for window in ranges.windows(2) {
            assert_eq!(window[0].1 + 1, window[1].0);
        }
        assert!(ranges.iter().all(|(start, end)| end - start < 1_000));
    }

    #[tokio::test]
    async fn test_scan_splits_inflow_and_outflow() {
        let events = vec![
            mock::transfer(ASSET, ALICE, VAULT, 100, 12_000),
            mock::transfer(ASSET, VAULT, BOB, 40, 3),
            mock::transfer(ASSET, ALICE, VAULT, 50, 10),
            // unrelated transfer
            mock::transfer(ASSET, ALICE, BOB, 7, 11),
            mock::transfer(ASSET, BOB, VAULT, 30, 6_000),
        ];
        let source = MockSource::new(12_500, events.clone(), 1_700_000_000);

        let scanner = Scanner::new(&source, 5_000, 4);
        let scan = scanner.scan(0, &flow_queries(ASSET, VAULT)).await.unwrap();

        assert_eq!(scan.to_block, 12_500);
        assert_eq!(scan.logs.len(), 2);
        // range order across chunks
        assert_eq!(
            scan.logs[0].events,
            vec![events[2].clone(), events[4].clone(), events[0].clone()]
        );
        assert_eq!(scan.logs[1].events, vec![events[1].clone()]);
        assert_eq!(scan.logs[0].pending, 0);
        // 3 chunks, 2 queries each
        assert_eq!(source.log_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_scan_starts_after_head() {
        let source = MockSource::new(100, vec![], 0);
        let scan = Scanner::new(&source, 5_000, 4)
            .scan(200, &flow_queries(ASSET, VAULT))
            .await
            .unwrap();
        assert_eq!(scan.logs, vec![LogBatch::default(), LogBatch::default()]);
        assert_eq!(source.log_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_requests_in_flight_are_bounded() {
        let source = MockSource::new(50_000, vec![], 0);
        let scan = Scanner::new(&source, 1_000, 3)
            .scan(0, &flow_queries(ASSET, VAULT))
            .await
            .unwrap();

        assert_eq!(scan.logs.len(), 2);
        assert_eq!(source.log_calls.load(Ordering::SeqCst), 102);
        let peak = source.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "{peak} requests in flight");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_aborts_scan() {
        let events = vec![mock::transfer(ASSET, ALICE, VAULT, 100, 10)];
        let mut source = MockSource::new(20_000, events, 0);
        source.fail_at = Some(15_000);

        let err = Scanner::new(&source, 5_000, 2)
            .scan(0, &flow_queries(ASSET, VAULT))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("query timeout"));
    }
}
