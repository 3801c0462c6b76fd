//! RPC log source.
//!
//! The pipeline talks to the chain through two small adapter traits:
//! [`LogSource`] for logs and block metadata, and [`VaultReader`] for the read
//! methods of the vault and its asset. [`RpcSource`] implements both on top of any
//! Alloy provider; tests swap in an in-memory source.

use std::future::Future;

use alloy::{
    primitives::{Bytes, LogData},
    rpc::types::{Filter, Log},
};
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    Address, B256, U256,
    error::{Error, Result},
    evm::{DynProvider, ERC20, Provider, Vault},
};

/// One log entry as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Emitting contract.
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
}

impl RawEvent {
    /// Event signature hash.
    #[inline]
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    /// Topics and data in the shape expected by the `sol!` decoders.
    pub fn log_data(&self) -> LogData {
        LogData::new_unchecked(self.topics.clone(), self.data.clone())
    }
}

/// A log the node returned without a block number or transaction hash.
#[derive(Debug, Clone, derive_more::Display)]
#[display("pending log from {address} has no block number or transaction hash")]
pub struct PendingLog {
    pub address: Address,
}

impl std::error::Error for PendingLog {}

impl TryFrom<Log> for RawEvent {
    type Error = PendingLog;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        let address = log.inner.address;
        let (Some(block_number), Some(transaction_hash)) = (log.block_number, log.transaction_hash)
        else {
            return Err(PendingLog { address });
        };

        Ok(Self {
            address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
            block_number,
            transaction_hash,
        })
    }
}

/// An `eth_getLogs` query over an inclusive block range.
///
/// Each topic position holds a set of accepted values; an empty set matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub topics: [Vec<B256>; 4],
}

impl LogQuery {
    /// Query for logs emitted by `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Accept any of these event signatures.
    pub fn events(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.topics[0] = signatures.into_iter().collect();
        self
    }

    /// Require `value` as the first indexed topic.
    pub fn topic1(mut self, value: B256) -> Self {
        self.topics[1] = vec![value];
        self
    }

    /// Require `value` as the second indexed topic.
    pub fn topic2(mut self, value: B256) -> Self {
        self.topics[2] = vec![value];
        self
    }

    /// Require `value` as the third indexed topic.
    pub fn topic3(mut self, value: B256) -> Self {
        self.topics[3] = vec![value];
        self
    }

    /// Same query over another block range.
    pub fn with_range(&self, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            ..self.clone()
        }
    }

    /// Converts the query into an Alloy filter.
    pub fn to_filter(&self) -> Filter {
        let [topic0, topic1, topic2, topic3] = self.topics.clone();
        let mut filter = Filter::new()
            .address(self.address)
            .from_block(self.from_block)
            .to_block(self.to_block);
        if !topic0.is_empty() {
            filter = filter.event_signature(topic0);
        }
        if !topic1.is_empty() {
            filter = filter.topic1(topic1);
        }
        if !topic2.is_empty() {
            filter = filter.topic2(topic2);
        }
        if !topic3.is_empty() {
            filter = filter.topic3(topic3);
        }
        filter
    }
}

/// Logs returned for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    /// Confirmed logs, in node order.
    pub events: Vec<RawEvent>,
    /// Logs dropped because they carried no block number or transaction hash.
    pub pending: usize,
}

impl LogBatch {
    /// Appends `other` after the logs already in the batch.
    pub fn extend(&mut self, other: LogBatch) {
        self.events.extend(other.events);
        self.pending += other.pending;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<RawEvent>> for LogBatch {
    fn from(events: Vec<RawEvent>) -> Self {
        Self { events, pending: 0 }
    }
}

/// Log and block metadata access.
pub trait LogSource: Send + Sync {
    /// Current head block.
    fn head(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Logs matching `query`, in node order.
    fn logs(&self, query: &LogQuery) -> impl Future<Output = Result<LogBatch>> + Send;

    /// Timestamp (UTC seconds) of block `number`.
    fn block_timestamp(&self, number: u64) -> impl Future<Output = Result<u64>> + Send;
}

/// Live vault totals.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTotals {
    #[serde_as(as = "DisplayFromStr")]
    pub total_shares: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub total_assets: U256,
}

/// Read methods of the vault and its asset token.
pub trait VaultReader: Send + Sync {
    /// `totalShares()` and `totalAssets()` read together.
    fn totals(&self, vault: Address) -> impl Future<Output = Result<VaultTotals>> + Send;

    /// Share balance of `user` in `vault`.
    fn shares_of(&self, vault: Address, user: Address)
    -> impl Future<Output = Result<U256>> + Send;

    /// ERC-20 balance of `holder`.
    fn balance_of(&self, token: Address, holder: Address)
    -> impl Future<Output = Result<U256>> + Send;

    /// ERC-20 decimals.
    fn decimals(&self, token: Address) -> impl Future<Output = Result<u8>> + Send;
}

/// [`LogSource`] and [`VaultReader`] backed by an Alloy provider.
#[derive(Clone)]
pub struct RpcSource<P>
where
    P: Provider,
{
    provider: P,
}

impl RpcSource<DynProvider> {
    /// Connects to the given RPC URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = crate::evm::connect(url).await?;
        Ok(Self::new(provider))
    }
}

impl<P> RpcSource<P>
where
    P: Provider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the root provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> LogSource for RpcSource<P>
where
    P: Provider,
{
    async fn head(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn logs(&self, query: &LogQuery) -> Result<LogBatch> {
        let logs = self.provider.get_logs(&query.to_filter()).await?;
        let mut batch = LogBatch {
            events: Vec::with_capacity(logs.len()),
            pending: 0,
        };
        for entry in logs {
            match RawEvent::try_from(entry) {
                Ok(event) => batch.events.push(event),
                Err(err) => {
                    log::warn!("skipping log: {err}");
                    batch.pending += 1;
                }
            }
        }
        Ok(batch)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(number.into())
            .await?
            .ok_or(Error::MissingBlock(number))?;
        Ok(block.header.timestamp)
    }
}

impl<P> VaultReader for RpcSource<P>
where
    P: Provider,
{
    async fn totals(&self, vault: Address) -> Result<VaultTotals> {
        let vault = Vault::new(vault, self.provider.clone());
        let (total_shares, total_assets) = self
            .provider
            .multicall()
            .add(vault.totalShares())
            .add(vault.totalAssets())
            .aggregate()
            .await?;
        Ok(VaultTotals {
            total_shares,
            total_assets,
        })
    }

    async fn shares_of(&self, vault: Address, user: Address) -> Result<U256> {
        let vault = Vault::new(vault, self.provider.clone());
        Ok(vault.sharesOf(user).call().await?)
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let token = ERC20::new(token, self.provider.clone());
        Ok(token.balanceOf(holder).call().await?)
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let token = ERC20::new(token, self.provider.clone());
        Ok(token.decimals().call().await?)
    }
}
