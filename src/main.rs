mod cli;

use std::sync::Arc;

use claim_orchestrator::{
    accounts::{AccountStore, SqliteAccountStore},
    claim::{ClaimExecutor, ClaimResult, ClaimService, Dispatcher, Scheduler, StrategyRegistry},
    config::Config,
    credentials::EnvCredentialResolver,
    storage::{ClaimLedger, Database, SqliteLedger},
    utils, ClaimError, Result,
};
use clap::Parser;
use cli::{AccountCommands, Cli, Commands};
use colored::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("claim_orchestrator=debug,sweep_claim=debug,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init => initialize(&config),
        Commands::Sites => list_sites(&config),
        Commands::Accounts { command } => manage_accounts(&config, command),
        Commands::Claim { account_id } => claim_one(&config, account_id).await,
        Commands::ClaimAll { verbose } => claim_all(&config, verbose).await,
        Commands::Run { interval } => run_scheduler(&config, interval).await,
        Commands::History {
            account_id,
            limit,
            format,
        } => show_history(&config, account_id, limit, &format).await,
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

struct Orchestrator {
    db: Arc<Database>,
    service: Arc<ClaimService>,
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let db = Arc::new(Database::new(&config.database.path)?);

    let registry = StrategyRegistry::from_config(config, Arc::new(EnvCredentialResolver))?;
    let ledger: Arc<dyn ClaimLedger> = Arc::new(SqliteLedger::new(db.clone()));
    let store: Arc<dyn AccountStore> = Arc::new(SqliteAccountStore::new(db.clone()));

    let executor = ClaimExecutor::new(Arc::new(registry), ledger, config.retry_policy());
    let dispatcher = Dispatcher::new(Arc::new(executor), config.orchestrator.worker_pool_size);

    Ok(Orchestrator {
        db,
        service: Arc::new(ClaimService::new(store, dispatcher)),
    })
}

fn initialize(config: &Config) -> Result<()> {
    println!("{}", "Initializing claim orchestrator...".green());
    let db = Database::new(&config.database.path)?;
    println!("{}", "✓ Database initialized".green());

    for site in &config.sites {
        db.upsert_site(&site.name, &site.base_url)?;
    }
    println!("{}", format!("✓ {} sites registered", config.sites.len()).green());

    println!("\n{}", "Configuration:".cyan());
    println!("  Database:       {}", config.database.path);
    println!("  Workers:        {}", config.orchestrator.worker_pool_size);
    println!("  Interval:       {}s", config.orchestrator.schedule_interval_secs);
    println!("  Max retries:    {}", config.orchestrator.max_retries);
    println!(
        "  Backoff:        {}ms .. {}ms",
        config.orchestrator.base_backoff_ms, config.orchestrator.max_backoff_ms
    );

    println!("\n{}", "Next steps:".cyan());
    println!("  {} to add an account", "sweep-claim accounts add".yellow());
    println!("  {} to claim everything now", "sweep-claim claim-all".yellow());
    println!("  {} to start the scheduler", "sweep-claim run".yellow());
    Ok(())
}

fn list_sites(config: &Config) -> Result<()> {
    let registry = StrategyRegistry::from_config(config, Arc::new(EnvCredentialResolver))?;
    if registry.is_empty() {
        println!("{}", "No sites configured. Add [[sites]] entries to your config.".yellow());
        return Ok(());
    }

    let db = Database::new(&config.database.path)?;
    let stored = db.list_sites()?;

    utils::print_table_border(84);
    utils::print_table_row(&["Site", "Base URL", "Login", "Registered"], &[20, 40, 6, 10]);
    utils::print_table_border(84);
    for site in &config.sites {
        let registered = match stored.iter().find(|s| s.name == site.name) {
            Some(record) if record.base_url == site.base_url => "yes".green().to_string(),
            Some(_) => "stale url".yellow().to_string(),
            None => "no".red().to_string(),
        };
        utils::print_table_row(
            &[&site.name, &site.base_url, &format!("{:?}", site.login_mode), &registered],
            &[20, 40, 6, 10],
        );
    }
    utils::print_table_border(84);

    let unconfigured: Vec<&str> = stored
        .iter()
        .filter(|record| registry.resolve(&record.name).is_err())
        .map(|record| record.name.as_str())
        .collect();
    if !unconfigured.is_empty() {
        println!(
            "{}",
            format!(
                "Sites in the database without a strategy: {}",
                unconfigured.join(", ")
            )
            .yellow()
        );
    }
    if stored.len() < config.sites.len() {
        println!("Run {} to register configured sites", "sweep-claim init".yellow());
    }
    Ok(())
}

fn manage_accounts(config: &Config, command: AccountCommands) -> Result<()> {
    let db = Database::new(&config.database.path)?;

    match command {
        AccountCommands::List => {
            let accounts = db.list_accounts()?;
            if accounts.is_empty() {
                println!("No accounts stored");
                return Ok(());
            }

            utils::print_table_border(80);
            utils::print_table_row(&["ID", "Site", "Username", "Credential"], &[6, 20, 24, 24]);
            utils::print_table_border(80);
            for account in &accounts {
                utils::print_table_row(
                    &[
                        &account.id.to_string(),
                        &account.site_name,
                        &account.username,
                        &account.credential_ref,
                    ],
                    &[6, 20, 24, 24],
                );
            }
            utils::print_table_border(80);
        }
        AccountCommands::Add {
            site,
            username,
            credential_ref,
        } => {
            if !config.sites.iter().any(|s| s.name == site) {
                println!(
                    "{}",
                    format!("Warning: no strategy configured for site '{}'", site).yellow()
                );
            }
            let id = db.add_account(&site, &username, &credential_ref)?;
            info!("Stored account {} for {}", id, site);
            println!("{}", format!("✓ Account {} added", id).green());
        }
    }

    Ok(())
}

fn print_result(result: &ClaimResult) {
    println!(
        "Account {}: {} (attempts: {})",
        result.account_id,
        utils::format_status(result.status),
        result.attempts
    );
    if result.is_success() {
        println!("Claimed: {}", utils::format_amount(result.amount_claimed));
    }
    if let Some(failure) = &result.error {
        println!("Reason:  {} ({})", failure.reason, failure.kind);
    }
    if let Some(ledger_error) = &result.ledger_error {
        println!(
            "{}",
            format!("WARNING: result not saved to ledger: {}", ledger_error).red()
        );
    }
}

async fn claim_one(config: &Config, account_id: i64) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let result = orchestrator.service.dispatch_one(account_id).await?;
    print_result(&result);
    Ok(())
}

async fn claim_all(config: &Config, verbose: bool) -> Result<()> {
    println!("{}", "Claiming for all accounts...".cyan());
    let orchestrator = build_orchestrator(config)?;
    let summary = orchestrator.service.dispatch_all().await?;

    if verbose && !summary.results.is_empty() {
        utils::print_table_border(90);
        utils::print_table_row(&["Account", "Status", "Amount", "Attempts", "Detail"], &[8, 10, 10, 8, 50]);
        utils::print_table_border(90);

        let mut results = summary.results.clone();
        results.sort_by_key(|r| r.account_id);
        for result in &results {
            utils::print_table_row(
                &[
                    &result.account_id.to_string(),
                    &utils::format_status(result.status),
                    &format!("{:.2}", result.amount_claimed),
                    &result.attempts.to_string(),
                    &utils::format_failure(result),
                ],
                &[8, 10, 10, 8, 50],
            );
        }
        utils::print_table_border(90);
    }

    summary.print_summary();
    println!("Success rate: {:.1}%", summary.success_rate());
    Ok(())
}

async fn run_scheduler(config: &Config, interval: Option<u64>) -> Result<()> {
    let interval = interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.schedule_interval());

    let orchestrator = build_orchestrator(config)?;
    let scheduler = Scheduler::new(orchestrator.service.clone(), interval);

    println!("{}", "Starting claim scheduler...".green());
    println!("Interval: {} seconds", interval.as_secs());
    println!("Press Ctrl-C to stop after the current batch");

    scheduler.start().await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ClaimError::Other(anyhow::anyhow!("failed to listen for Ctrl-C: {}", e)))?;

    println!("{}", "Stopping; waiting for any in-flight batch...".yellow());
    scheduler.stop().await;
    Ok(())
}

async fn show_history(config: &Config, account_id: i64, limit: usize, format: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    if orchestrator.db.get_account(account_id)?.is_none() {
        return Err(ClaimError::AccountNotFound(account_id));
    }

    let ledger = SqliteLedger::new(orchestrator.db.clone());
    let history = ledger.history(account_id, limit).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No claims recorded for account {}", account_id);
        return Ok(());
    }

    println!("{}", format!("Recent claims for account {}:", account_id).yellow());
    utils::print_table_border(100);
    utils::print_table_row(&["Completed", "Status", "Amount", "Attempts", "Detail"], &[24, 10, 10, 8, 40]);
    utils::print_table_border(100);
    for result in &history {
        utils::print_table_row(
            &[
                &utils::format_timestamp(&result.completed_at),
                &utils::format_status(result.status),
                &format!("{:.2}", result.amount_claimed),
                &result.attempts.to_string(),
                &utils::format_failure(result),
            ],
            &[24, 10, 10, 8, 40],
        );
    }
    utils::print_table_border(100);
    Ok(())
}
