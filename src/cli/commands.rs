use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sweep-claim")]
#[command(about = "Scheduled free-coin claims across many site accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to an extra configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and register configured sites
    Init,

    /// List sites that have a claim strategy
    Sites,

    /// Manage claimable accounts
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Claim for a single account now
    Claim {
        /// Account id
        account_id: i64,
    },

    /// Claim for every account now
    ClaimAll {
        /// Show per-account results
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the claim scheduler until interrupted
    Run {
        /// Override the schedule interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show recent claim results for an account
    History {
        /// Account id
        account_id: i64,

        /// Maximum number of rows
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// List stored accounts
    List,

    /// Store a new account
    Add {
        /// Site name, as configured under [[sites]]
        #[arg(short, long)]
        site: String,

        #[arg(short, long)]
        username: String,

        /// Where the password lives, e.g. env:CHUMBA_PASSWORD
        #[arg(long)]
        credential_ref: String,
    },
}
