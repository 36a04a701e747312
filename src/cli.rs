use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)] // default handled in main.rs
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the notification relay and the site data API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Keep the live transaction feed static
        #[arg(long)]
        reduced_motion: bool,
    },
    /// Connect the configured watch address and print its capabilities
    Connect {
        /// Overrides `[tron] watch_address`
        #[arg(long)]
        address: Option<String>,
    },
    /// Run the allowance flow for the configured spender
    Approve {
        #[arg(long)]
        address: Option<String>,
        /// Allowance in whole tokens, e.g. 1000 or 12.5
        #[arg(long, default_value = "1000")]
        amount: f64,
    },
    /// Show the current allowance of an owner towards the configured spender
    Allowance {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Price a swap the way the trading widget does
    Quote {
        #[arg(long, default_value = "USDT")]
        from: String,
        #[arg(long, default_value = "TVLP")]
        to: String,
        #[arg(long)]
        amount: f64,
    },
    /// Show or change the persisted interface language
    Lang {
        /// en, fr or de
        code: Option<String>,
        /// Translate a key in the active language
        #[arg(long)]
        key: Option<String>,
    },
}
