//! Scan configuration.
//!
//! Every value is supplied from outside (flags, environment, a config file) and
//! validated once, before a [`Client`](crate::vault::Client) is created. A
//! missing RPC URL, vault address, asset address or start block is fatal.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    Address,
    error::{Error, Result},
    evm::check_decimals,
};

/// Default number of blocks per `eth_getLogs` sub-range.
pub const DEFAULT_CHUNK_SIZE: u64 = 5_000;

/// Default number of RPC requests in flight within one stage (log queries or
/// block lookups).
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Validated configuration for a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Vault contract.
    pub vault: Address,
    /// Underlying asset token.
    pub asset: Address,
    /// Asset decimals. Read from the token when absent.
    pub decimals: Option<u8>,
    /// First block scanned (inclusive).
    pub start_block: u64,
    /// Maximum number of blocks per log query.
    pub chunk_size: u64,
    /// Maximum number of concurrent requests per stage.
    pub max_concurrency: usize,
}

impl Config {
    /// Starts a new builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Unvalidated configuration.
///
/// Fields are optional so the builder can be filled from several sources and
/// deserialized from partial documents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ConfigBuilder {
    pub rpc_url: Option<String>,
    pub vault: Option<Address>,
    pub asset: Option<Address>,
    pub decimals: Option<u8>,
    pub start_block: Option<u64>,
    pub chunk_size: Option<u64>,
    pub max_concurrency: Option<usize>,
}

impl ConfigBuilder {
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn vault(mut self, vault: Address) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn asset(mut self, asset: Address) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = Some(block);
        self
    }

    pub fn chunk_size(mut self, blocks: u64) -> Self {
        self.chunk_size = Some(blocks);
        self
    }

    pub fn max_concurrency(mut self, requests: usize) -> Self {
        self.max_concurrency = Some(requests);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingConfig`] when the RPC URL, an address or the start block is absent
    /// - [`Error::InvalidConfig`] for an unparsable URL, a zero address, a zero chunk size,
    ///   a zero concurrency limit or more than [`MAX_DECIMALS`](crate::evm::MAX_DECIMALS) decimals
    pub fn build(self) -> Result<Config> {
        let rpc_url = self.rpc_url.ok_or(Error::MissingConfig("rpc_url"))?;
        let rpc_url = Url::parse(&rpc_url)
            .map_err(|err| Error::InvalidConfig(format!("rpc_url {rpc_url:?}: {err}")))?;
        let vault = non_zero("vault", self.vault)?;
        let asset = non_zero("asset", self.asset)?;
        let start_block = self.start_block.ok_or(Error::MissingConfig("start_block"))?;

        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }

        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(Error::InvalidConfig("max_concurrency must be positive".into()));
        }

        if let Some(decimals) = self.decimals {
            check_decimals(decimals).map_err(|err| Error::InvalidConfig(err.to_string()))?;
        }

        Ok(Config {
            rpc_url,
            vault,
            asset,
            decimals: self.decimals,
            start_block,
            chunk_size,
            max_concurrency,
        })
    }
}

fn non_zero(name: &'static str, address: Option<Address>) -> Result<Address> {
    match address {
        None => Err(Error::MissingConfig(name)),
        Some(address) if address.is_zero() => {
            Err(Error::InvalidConfig(format!("{name} is the zero address")))
        }
        Some(address) => Ok(address),
    }
}
