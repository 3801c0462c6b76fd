//! Vault analytics pipeline.
//!
//! Stages run one after another, each one concurrent internally:
//!
//! 1. [`scan`]: chunked `eth_getLogs` over `[start_block, head]`.
//! 2. [`timestamps`]: one block lookup per distinct block.
//! 3. [`events`]: decoding into [`ResolvedEvent`]s.
//! 4. [`daily`], [`window`] and [`activity`]: pure derivations.
//!
//! [`convert`] is independent of the scan and works on live vault totals.
//!
//! # Example
//!
//! ```no_run
//! use vaultscan::{Config, vault::Client};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .rpc_url("http://localhost:8545")
//!     .vault("0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2".parse()?)
//!     .asset("0xd077a400968890eacc75cdc901f0356c943e4fdb".parse()?)
//!     .start_block(1_000_000)
//!     .build()?;
//!
//! let client = Client::connect(config).await?;
//! let summary = client.analytics().await?;
//! println!("tvl: {}", summary.tvl_display()?);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod analytics;
pub mod convert;
pub mod daily;
pub mod events;
pub mod scan;
pub mod source;
pub mod timestamps;
pub mod window;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

pub use activity::{ActivityRecord, MissionStatus, MissionWeights, UserProfile};
pub use analytics::AnalyticsSummary;
pub use convert::ConversionQuote;
pub use events::{Decoded, ResolvedEvent};
pub use source::{LogSource, RpcSource, VaultReader, VaultTotals};

use crate::{
    Address, U256,
    config::Config,
    error::Result,
    evm::{DynProvider, check_decimals, from_units, to_units},
    vault::{
        analytics::SummaryInput,
        scan::{Scanner, flow_queries, vault_query},
    },
};

/// A user's share balance and its current asset value.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub user: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub shares: U256,
    #[serde_as(as = "DisplayFromStr")]
    pub assets: U256,
    /// `assets` in display units.
    pub value: Decimal,
}

/// The direct TVL estimator: what the vault reports and what it holds.
///
/// Independent of the net-flow TVL of [`AnalyticsSummary`]; the two are not
/// reconciled.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectTvl {
    #[serde_as(as = "DisplayFromStr")]
    pub total_assets: U256,
    /// Asset token balance of the vault contract.
    #[serde_as(as = "DisplayFromStr")]
    pub asset_balance: U256,
    pub decimals: u8,
}

/// Vault client.
pub struct Client<S> {
    source: S,
    config: Config,
}

impl Client<RpcSource<DynProvider>> {
    /// Connects to the configured RPC endpoint.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = RpcSource::connect(config.rpc_url.as_str()).await?;
        Ok(Self::new(source, config))
    }
}

impl<S> Client<S>
where
    S: LogSource + VaultReader,
{
    pub fn new(source: S, config: Config) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn scanner(&self) -> Scanner<'_, S> {
        Scanner::new(&self.source, self.config.chunk_size, self.config.max_concurrency)
    }

    /// Asset decimals, from the configuration or from the token.
    ///
    /// Tokens with more than [`MAX_DECIMALS`](crate::evm::MAX_DECIMALS) decimals
    /// are rejected.
    pub async fn decimals(&self) -> Result<u8> {
        match self.config.decimals {
            Some(decimals) => check_decimals(decimals),
            None => check_decimals(self.source.decimals(self.config.asset).await?),
        }
    }

    /// Flow analytics with the 7-day window ending now.
    pub async fn analytics(&self) -> Result<AnalyticsSummary> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.analytics_at(now).await
    }

    /// Flow analytics with the 7-day window ending at `now` (UTC seconds).
    pub async fn analytics_at(&self, now: u64) -> Result<AnalyticsSummary> {
        let decimals = self.decimals().await?;
        let queries = flow_queries(self.config.asset, self.config.vault);
        let scan = self.scanner().scan(self.config.start_block, &queries).await?;

        let mut logs = scan.logs.into_iter();
        let inflow = logs.next().unwrap_or_default();
        let outflow = logs.next().unwrap_or_default();
        log::info!(
            "scanned blocks {}..={}: {} inflows, {} outflows",
            scan.from_block,
            scan.to_block,
            inflow.len(),
            outflow.len()
        );

        let timestamps = timestamps::resolve(
            &self.source,
            inflow.events.iter().chain(&outflow.events),
            self.config.max_concurrency,
        )
        .await?;
        let inflow = events::decode_batch(&inflow, &timestamps)?;
        let outflow = events::decode_batch(&outflow, &timestamps)?;

        analytics::summarize(SummaryInput {
            inflow: &inflow,
            outflow: &outflow,
            from_block: scan.from_block,
            to_block: scan.to_block,
            decimals,
            now,
        })
    }

    /// Every Deposit, Withdraw and MissionCompleted event of the vault.
    pub async fn vault_events(&self) -> Result<Decoded> {
        let scan = self
            .scanner()
            .scan(self.config.start_block, &[vault_query(self.config.vault)])
            .await?;
        let logs = scan.logs.into_iter().next().unwrap_or_default();
        log::info!(
            "scanned blocks {}..={}: {} vault events",
            scan.from_block,
            scan.to_block,
            logs.len()
        );

        let timestamps =
            timestamps::resolve(&self.source, &logs.events, self.config.max_concurrency).await?;
        events::decode_batch(&logs, &timestamps)
    }

    /// Deposits and withdrawals of `user`, newest first.
    pub async fn activity(&self, user: Address) -> Result<Vec<ActivityRecord>> {
        let decimals = self.decimals().await?;
        let decoded = self.vault_events().await?;
        activity::extract(user, &decoded.events, decimals)
    }

    /// Missions and points of `user`.
    pub async fn profile(&self, user: Address, weights: &MissionWeights) -> Result<UserProfile> {
        let decimals = self.decimals().await?;
        let decoded = self.vault_events().await?;
        activity::profile(user, &decoded.events, decimals, weights)
    }

    /// Current vault totals.
    pub async fn totals(&self) -> Result<VaultTotals> {
        self.source.totals(self.config.vault).await
    }

    /// Shares to burn for withdrawing `assets` display units, at current totals.
    pub async fn quote_withdraw(&self, assets: Decimal) -> Result<ConversionQuote> {
        let decimals = self.decimals().await?;
        let requested = to_units(assets, decimals)?;
        let totals = self.totals().await?;
        ConversionQuote::new(requested, totals)
    }

    /// Share balance of `user` valued at current totals.
    pub async fn position(&self, user: Address) -> Result<Position> {
        let decimals = self.decimals().await?;
        let shares = self.source.shares_of(self.config.vault, user).await?;
        let totals = self.totals().await?;
        let assets = convert::shares_to_assets(shares, totals.total_shares, totals.total_assets)?;
        Ok(Position {
            user,
            shares,
            assets,
            value: from_units(assets, decimals)?,
        })
    }

    /// Direct TVL reads.
    pub async fn direct_tvl(&self) -> Result<DirectTvl> {
        let decimals = self.decimals().await?;
        let totals = self.totals().await?;
        let asset_balance = self
            .source
            .balance_of(self.config.asset, self.config.vault)
            .await?;
        Ok(DirectTvl {
            total_assets: totals.total_assets,
            asset_balance,
            decimals,
        })
    }
}
