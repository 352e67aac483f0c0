//! Reward Transaction Orchestrator
//!
//! Server-side subsystem that executes reward intents (XP awards,
//! achievement mints) as signed transactions against an EVM chain.
//! The binary wires the stack and offers a small operational runner:
//! deployment checks, role grants, one-off awards, and status reads.

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rewarder_core::{AchievementTier, ActivityType, ChainSettings, RewardOrchestrator, TuningConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rewarder_core=debug,rewarder_chain=debug")),
        )
        .init();

    let settings = ChainSettings::from_env()?;
    let tuning = TuningConfig::from_env();
    tuning.log_config();

    info!("Starting reward orchestrator");
    info!(chain_id = settings.chain_id, rpc = %settings.rpc_url, "Target chain");

    let orchestrator = RewardOrchestrator::initialize(&settings, &tuning).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("check");

    match command {
        "check" => run_deployment_check(&orchestrator, &settings).await,
        "grant-minter" => {
            let address = require_arg(&args, 1, "grant-minter <address>")?;
            let response = orchestrator.xp().grant_minter_role(address).await;
            print_json(&response)
        }
        "award-xp" => {
            let address = require_arg(&args, 1, "award-xp <address> <activity>")?;
            let activity: ActivityType = require_arg(&args, 2, "award-xp <address> <activity>")?
                .parse()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let response = orchestrator.xp().award_xp(address, activity).await;
            print_json(&response)
        }
        "award-custom-xp" => {
            let usage = "award-custom-xp <address> <amount> <activity>";
            let address = require_arg(&args, 1, usage)?;
            let amount = parse_u256(require_arg(&args, 2, usage)?)?;
            let activity: ActivityType = require_arg(&args, 3, usage)?
                .parse()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let response = orchestrator
                .xp()
                .award_custom_xp(address, amount, activity)
                .await;
            print_json(&response)
        }
        "update-rate" => {
            let usage = "update-rate <activity> <rate>";
            let activity: ActivityType = require_arg(&args, 1, usage)?
                .parse()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let rate = parse_u256(require_arg(&args, 2, usage)?)?;
            let response = orchestrator.xp().update_reward_rate(activity, rate).await;
            print_json(&response)
        }
        "mint-achievement" => {
            let usage = "mint-achievement <address> <tier> <ipfs-hash> <description>";
            let address = require_arg(&args, 1, usage)?;
            let tier: AchievementTier = require_arg(&args, 2, usage)?
                .parse()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let ipfs_hash = require_arg(&args, 3, usage)?;
            let description = require_arg(&args, 4, usage)?;
            let response = orchestrator
                .achievements()
                .mint_achievement(address, tier, ipfs_hash, description)
                .await;
            print_json(&response)
        }
        "award-by-xp" => {
            let usage = "award-by-xp <address> <total-xp> <ipfs-hash>";
            let address = require_arg(&args, 1, usage)?;
            let total_xp: u64 = require_arg(&args, 2, usage)?
                .parse()
                .map_err(|_| anyhow::anyhow!("total-xp must be a non-negative integer"))?;
            let ipfs_hash = require_arg(&args, 3, usage)?;
            let response = orchestrator
                .achievements()
                .award_achievement_by_xp(address, total_xp, ipfs_hash)
                .await;
            print_json(&response)
        }
        "achievements" => {
            let address = require_arg(&args, 1, "achievements <address>")?;
            let detailed = orchestrator.achievements().achievements_detailed(address).await?;
            let listing: Vec<serde_json::Value> = detailed
                .into_iter()
                .map(|(token_id, view)| {
                    serde_json::json!({
                        "token_id": token_id.to_string(),
                        "achievement": view,
                    })
                })
                .collect();
            print_json(&listing)
        }
        "balance" => {
            let address = require_arg(&args, 1, "balance <address>")?;
            let balance = orchestrator.xp().xp_balance(address).await?;
            print_json(&balance)
        }
        "status" => {
            let hash = require_arg(&args, 1, "status <tx-hash>")?;
            let record = orchestrator.transaction_status(hash).await?;
            print_json(&record)
        }
        "transactions" => {
            let address = require_arg(&args, 1, "transactions <address>")?;
            let records = orchestrator.address_transactions(address).await?;
            print_json(&records)
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: rewarder [check|grant-minter <addr>|award-xp <addr> <activity>|award-custom-xp <addr> <amount> <activity>|update-rate <activity> <rate>|mint-achievement <addr> <tier> <ipfs> <desc>|award-by-xp <addr> <xp> <ipfs>|achievements <addr>|balance <addr>|status <hash>|transactions <addr>]");
            std::process::exit(2);
        }
    }
}

fn parse_u256(raw: &str) -> Result<alloy::primitives::U256> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Expected a non-negative integer, got {raw}"))
}

fn require_arg<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Usage: rewarder {usage}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Verify the deployment end to end: chain id, contract bytecode, signer
/// funding, and the signer's roles on both contract families.
async fn run_deployment_check(
    orchestrator: &RewardOrchestrator,
    settings: &ChainSettings,
) -> Result<()> {
    let provider = orchestrator.provider();

    let block = provider.block_number().await?;
    info!(block, chain_id = settings.chain_id, "Chain reachable");

    let mut healthy = true;

    for (name, address) in orchestrator.contract_addresses() {
        let code = provider.get_code(address).await?;
        if code.is_empty() {
            warn!(contract = name, address = %address, "No bytecode at contract address");
            healthy = false;
        } else {
            info!(contract = name, address = %address, code_bytes = code.len(), "Contract deployed");
        }
    }

    let signer = orchestrator.signer();
    let balance = signer.native_balance().await?;
    info!(address = %signer.address(), balance = %balance, "Signer funding");
    if balance.is_zero() {
        warn!("Signer has no native balance; submissions will fail with insufficient funds");
        healthy = false;
    }

    let roles = orchestrator.signer_roles().await;
    info!(
        xp_minter = ?roles.xp_minter,
        xp_admin = ?roles.xp_admin,
        achievement_minter = ?roles.achievement_minter,
        achievement_admin = ?roles.achievement_admin,
        "Signer roles"
    );
    if roles.xp_minter == Some(false) {
        warn!("Signer lacks MINTER_ROLE on the XP contract; awards will be rejected");
        healthy = false;
    }

    print_json(&roles)?;

    if healthy {
        info!("Deployment check passed");
        Ok(())
    } else {
        anyhow::bail!("Deployment check found problems (see warnings above)")
    }
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╦═╗┌─┐┬ ┬┌─┐┬─┐┌┬┐┌─┐┬─┐
    ╠╦╝├┤ │││├─┤├┬┘ ││├┤ ├┬┘
    ╩╚═└─┘└┴┘┴ ┴┴└──┴┘└─┘┴└─
    Reward Orchestrator v0.1.0
    "#
    );
}
