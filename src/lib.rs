//! # vaultscan
//!
//! Flow analytics and share accounting for an on-chain savings vault.
//!
//! The crate reads the vault's history straight from a JSON-RPC node: ERC-20
//! `Transfer` logs of the underlying asset in and out of the vault, plus the
//! vault's own `Deposit`, `Withdraw` and `MissionCompleted` events. From those it
//! derives day-bucketed inflow/outflow, a net-flow TVL, trailing 7-day metrics and
//! per-user activity, missions and points. It also sizes withdrawals by converting
//! asset amounts into vault shares without ever under-burning.
//!
//! ## Quick Navigation
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Validated scan configuration |
//! | [`evm`] | Providers, contract bindings, topic codec, unit conversion |
//! | [`vault`] | The [`Client`](vault::Client) and the pipeline stages |
//! | [`vault::scan`] | Chunked `eth_getLogs` scanner |
//! | [`vault::daily`] | UTC day buckets and running TVL |
//! | [`vault::window`] | Trailing 7-day volume and depositors |
//! | [`vault::activity`] | Per-user activity feed, missions and points |
//! | [`vault::convert`] | Share/asset conversion |
//!
//! ## Getting Started
//!
//! ```no_run
//! use vaultscan::{Config, dec, vault::Client};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .rpc_url("https://public-en.node.kaia.io")
//!     .vault("0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2".parse()?)
//!     .asset("0xd077a400968890eacc75cdc901f0356c943e4fdb".parse()?)
//!     .start_block(180_000_000)
//!     .build()?;
//! let client = Client::connect(config).await?;
//!
//! let summary = client.analytics().await?;
//! for day in &summary.days {
//!     println!("{}: +{} -{} tvl {}", day.date, day.inflow, day.outflow, day.tvl);
//! }
//!
//! let quote = client.quote_withdraw(dec!(25)).await?;
//! println!("burn {} shares", quote.implied_shares);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   raw logs   ┌────────────────────┐  (log, timestamp)
//! │ Range Scanner│─────────────▶│ Timestamp Resolver │──────────┐
//! └──────────────┘              └────────────────────┘          │
//!                                                               ▼
//!                    ┌────────────────┬────────────────┬─────────────────┐
//!                    │ Daily Buckets  │ Window Metrics │ User Activity   │
//!                    └────────────────┴────────────────┴─────────────────┘
//!
//! ┌──────────────┐  live totals  ┌──────────────────────┐
//! │ Vault Reader │──────────────▶│ Share/Asset Converter│
//! └──────────────┘               └──────────────────────┘
//! ```
//!
//! Every run rebuilds its state from scratch; nothing is cached between runs
//! and no retries are attempted. A failed RPC request fails the whole stage.
//!
//! ### Amounts
//!
//! On-chain amounts stay [`U256`] in the asset's minor unit and serialize as
//! decimal strings. Display amounts use [`rust_decimal::Decimal`].

pub mod config;
pub mod error;
pub mod evm;
pub mod vault;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exported primitive types from Alloy.
pub use alloy::primitives::{Address, B256, I256, U256, address};
/// Re-exported decimal type from rust_decimal.
///
/// Used for display amounts.
pub use rust_decimal::{Decimal, dec};
