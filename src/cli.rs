use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notice-watch", version)]
#[command(about = "Watches the Qingdao HRSS notice board for new announcements", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ./notice-watch.json, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the environment, then pick a mode from a menu (default)
    Launch {
        /// Never wait for a key press
        #[arg(long)]
        no_pause: bool,
    },

    /// Run the startup self-check
    Check {
        /// Only report problems
        #[arg(short, long)]
        silent: bool,
    },

    /// Scrape the notice board
    Scrape(ScrapeArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Keep running and check on an interval
    #[arg(long, conflicts_with = "once")]
    pub daemon: bool,

    /// Run a single check (the default)
    #[arg(long)]
    pub once: bool,

    /// Skip the silent self-check before scraping
    #[arg(long)]
    pub skip_check: bool,
}
