use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use nft_staking_dashboard::dashboard::Dashboard;
use nft_staking_dashboard::plan::PlanIndex;
use nft_staking_dashboard::{
    AlchemyIndexClient, DashboardView, Poller, PollerHandle, PollerSettings, RpcStakingClient,
    StakingActions, StakingConfig, StakingError,
};

/// Staking dashboard for a tiered NFT collection
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Wallet whose positions are shown
    #[arg(short, long, env = "STAKING_OWNER")]
    owner: String,

    /// Tier page, e.g. /StarterStake or Diamond
    #[arg(short, long, default_value = "/StarterStake")]
    route: String,

    /// Account that signs writes (overrides STAKING_SENDER)
    #[arg(long)]
    sender: Option<String>,

    /// Print views as JSON instead of a one-line summary
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep polling and print the view whenever it changes (default)
    Watch {
        /// Print the first complete view and exit
        #[arg(long)]
        once: bool,
    },

    /// List the tier pages and their token id ranges
    Tiers,

    /// Stake wallet tokens under a plan
    Stake {
        /// Comma separated token ids
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<u64>,

        /// 0 = 3 months, 1 = 6 months, 2 = 12 months
        #[arg(short, long, default_value_t = 0)]
        plan: u64,
    },

    /// Unstake tokens whose lock has ended
    Unstake {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<u64>,
    },

    /// Claim rewards for every staked token on the page
    Claim,

    /// Approve the staking contract for the collection
    Approve,
}

fn parse_address(raw: &str) -> Result<Address, StakingError> {
    Address::from_str(raw.trim()).map_err(|e| StakingError::InvalidAddress(format!("{}: {}", raw, e)))
}

fn print_view(view: &DashboardView, json: bool) {
    if json {
        match serde_json::to_string_pretty(view) {
            Ok(text) => println!("{}", text),
            Err(e) => log::error!("Failed to serialise view: {}", e),
        }
        return;
    }

    println!(
        "[{}] {} {} pending | {} staked | {} available",
        view.tier.name(),
        view.pending_rewards,
        view.reward_symbol,
        view.active_count,
        view.available.len()
    );
    for card in &view.staked {
        println!(
            "  staked    #{:<8} {:<9} {:<20} {}",
            card.token_id,
            card.tier.map(|t| t.name()).unwrap_or("Unknown"),
            card.plan_label,
            card.lock.human_readable
        );
    }
    for card in &view.available {
        println!(
            "  available #{:<8} {:<9} {:?}",
            card.token_id,
            card.tier.map(|t| t.name()).unwrap_or("Unknown"),
            card.action
        );
    }
}

/// Wait until both sources have reported for the current wallet
async fn wait_until_loaded(handle: &PollerHandle) -> Result<DashboardView, StakingError> {
    let mut views = handle.subscribe();
    let loaded = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let view = views.borrow_and_update().clone();
            if view.owner.is_some() && view.has_snapshot && view.has_wallet_assets {
                return Some(view);
            }
            if views.changed().await.is_err() {
                return None;
            }
        }
    })
    .await;

    match loaded {
        Ok(Some(view)) => Ok(view),
        Ok(None) => Err(StakingError::Rpc("Poller stopped before loading".to_string())),
        Err(_) => Err(StakingError::Rpc("Timed out waiting for chain and index data".to_string())),
    }
}

async fn watch(handle: &PollerHandle, json: bool) -> Result<(), StakingError> {
    let mut views = handle.subscribe();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let view = views.borrow_and_update().clone();
                if view.has_snapshot {
                    print_view(&view, json);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = StakingConfig::from_env()?;
    if let Some(sender) = &args.sender {
        config.sender = Some(parse_address(sender)?);
    }
    config.validate()?;

    if let Some(Commands::Tiers) = args.command {
        for view in config.tier_views() {
            let (lo, hi) = view.tier.range();
            println!("{:<14} {:>9} - {:<9} {}", view.route(), lo, hi, view.tier.asset());
        }
        return Ok(());
    }

    let owner = parse_address(&args.owner)?;
    let tier_view = config
        .view_for_route(&args.route)
        .ok_or_else(|| StakingError::Config(format!("Unknown tier route: {}", args.route)))?;

    let client = Arc::new(RpcStakingClient::from_config(&config));
    let index = Arc::new(AlchemyIndexClient::from_config(&config));
    let poller = Poller::new(
        client.clone(),
        index,
        Dashboard::new(tier_view, &config.reward_symbol),
        PollerSettings::from_config(&config),
    );
    let (handle, task) = poller.spawn();
    handle.switch_owner(owner);

    let actions = StakingActions::new(client, handle.clone());
    let result: Result<(), StakingError> = async {
        match args.command {
            None | Some(Commands::Watch { once: false }) => watch(&handle, args.json).await?,
            Some(Commands::Watch { once: true }) => {
                print_view(&wait_until_loaded(&handle).await?, args.json)
            }
            Some(Commands::Tiers) => {}
            Some(Commands::Stake { ids, plan }) => {
                let plan = PlanIndex::try_from(plan)?;
                wait_until_loaded(&handle).await?;
                println!("{}", actions.stake(&ids, plan).await?.tx_hash);
            }
            Some(Commands::Unstake { ids }) => {
                wait_until_loaded(&handle).await?;
                println!("{}", actions.unstake(&ids).await?.tx_hash);
            }
            Some(Commands::Claim) => {
                wait_until_loaded(&handle).await?;
                println!("{}", actions.claim_all().await?.tx_hash);
            }
            Some(Commands::Approve) => println!("{}", actions.approve().await?.tx_hash),
        }
        Ok(())
    }
    .await;

    handle.shutdown();
    if let Err(e) = task.await {
        log::error!("Poller task ended abnormally: {}", e);
    }
    result?;
    Ok(())
}
