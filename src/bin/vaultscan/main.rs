//! Vault analytics from the command line.
//!
//! Every command prints JSON on stdout. Configuration comes from flags, falling
//! back to `VAULTSCAN_*` environment variables (a `.env` file is loaded first).
//!
//! ```bash
//! export VAULTSCAN_RPC_URL=https://public-en.node.kaia.io
//! export VAULTSCAN_VAULT=0x5c7e4d1a1b2f04a52f9e8e0c3e4b9d07a3c1f6b2
//! export VAULTSCAN_ASSET=0xd077a400968890eacc75cdc901f0356c943e4fdb
//! export VAULTSCAN_START_BLOCK=180000000
//!
//! vaultscan analytics
//! vaultscan activity 0x1111111111111111111111111111111111111111
//! vaultscan quote 25.5
//! ```

use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use serde::Serialize;
use vaultscan::{
    Address, Decimal,
    config::ConfigBuilder,
    evm::DynProvider,
    vault::{Client, MissionWeights, RpcSource},
};

type RpcClient = Client<RpcSource<DynProvider>>;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    /// Log level written to stderr.
    #[arg(long, global = true, env = "VAULTSCAN_LOG", default_value = "info")]
    log_level: log::Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON-RPC endpoint.
    #[arg(long, global = true, env = "VAULTSCAN_RPC_URL")]
    rpc_url: Option<String>,
    /// Vault contract address.
    #[arg(long, global = true, env = "VAULTSCAN_VAULT")]
    vault: Option<Address>,
    /// Underlying asset token address.
    #[arg(long, global = true, env = "VAULTSCAN_ASSET")]
    asset: Option<Address>,
    /// Asset decimals. Read from the token when omitted.
    #[arg(long, global = true, env = "VAULTSCAN_DECIMALS")]
    decimals: Option<u8>,
    /// First block to scan.
    #[arg(long, global = true, env = "VAULTSCAN_START_BLOCK")]
    start_block: Option<u64>,
    /// Blocks per log query.
    #[arg(long, global = true, env = "VAULTSCAN_CHUNK_SIZE")]
    chunk_size: Option<u64>,
    /// Concurrent requests per stage.
    #[arg(long, global = true, env = "VAULTSCAN_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,
}

impl From<ConfigArgs> for ConfigBuilder {
    fn from(args: ConfigArgs) -> Self {
        Self {
            rpc_url: args.rpc_url,
            vault: args.vault,
            asset: args.asset,
            decimals: args.decimals,
            start_block: args.start_block,
            chunk_size: args.chunk_size,
            max_concurrency: args.max_concurrency,
        }
    }
}

#[enum_dispatch]
trait Run {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()>;
}

#[derive(Subcommand)]
#[enum_dispatch(Run)]
enum Commands {
    /// Daily flows, net-flow TVL and 7-day metrics
    Analytics(AnalyticsCmd),
    /// Deposits and withdrawals of a user, newest first
    Activity(ActivityCmd),
    /// Missions and points of a user
    Profile(ProfileCmd),
    /// Shares to burn for withdrawing an asset amount
    Quote(QuoteCmd),
    /// Share balance of a user and its asset value
    Position(PositionCmd),
    /// Direct TVL reads from the vault and the asset token
    Tvl(TvlCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    let _ = simple_logger::init_with_level(args.log_level);

    let config = ConfigBuilder::from(args.config).build()?;
    log::debug!(
        "vault {} asset {} from block {}",
        config.vault,
        config.asset,
        config.start_block
    );

    let client = Client::connect(config).await?;
    args.command.run(&client).await
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Args)]
struct AnalyticsCmd {
    /// End of the 7-day window as UTC seconds. Defaults to now.
    #[arg(long)]
    at: Option<u64>,
}

impl Run for AnalyticsCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        let summary = match self.at {
            Some(now) => client.analytics_at(now).await?,
            None => client.analytics().await?,
        };
        print_json(&summary)
    }
}

#[derive(Args)]
struct ActivityCmd {
    user: Address,
}

impl Run for ActivityCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        print_json(&client.activity(self.user).await?)
    }
}

#[derive(Args)]
struct ProfileCmd {
    user: Address,
    /// Points for the first deposit.
    #[arg(long, default_value = "100")]
    first_deposit_points: Decimal,
    /// Points for three deposits of 10 units or more.
    #[arg(long, default_value = "300")]
    steady_saver_points: Decimal,
    /// Points for a single deposit of 1000 units or more.
    #[arg(long, default_value = "500")]
    whale_points: Decimal,
    /// Points per deposited asset unit.
    #[arg(long, default_value = "1")]
    unit_points: Decimal,
}

impl Run for ProfileCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        let weights = MissionWeights {
            first_deposit: self.first_deposit_points,
            steady_saver: self.steady_saver_points,
            whale: self.whale_points,
            per_unit: self.unit_points,
        };
        print_json(&client.profile(self.user, &weights).await?)
    }
}

#[derive(Args)]
struct QuoteCmd {
    /// Asset amount in display units, e.g. `25.5`.
    assets: Decimal,
}

impl Run for QuoteCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        print_json(&client.quote_withdraw(self.assets).await?)
    }
}

#[derive(Args)]
struct PositionCmd {
    user: Address,
}

impl Run for PositionCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        print_json(&client.position(self.user).await?)
    }
}

#[derive(Args)]
struct TvlCmd;

impl Run for TvlCmd {
    async fn run(&self, client: &RpcClient) -> anyhow::Result<()> {
        print_json(&client.direct_tvl().await?)
    }
}
