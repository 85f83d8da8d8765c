// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, load the config, set up logging
//   and hand off to the launcher, the self-check or the monitor.
// - The launcher reports a bad config file on its console like any other
//   launcher failure.
// - Every path ends in an explicit exit code.

use clap::Parser;
use notice_watch::api::SiteClient;
use notice_watch::check::SelfCheck;
use notice_watch::cli::{Cli, Commands, ScrapeArgs};
use notice_watch::config::Config;
use notice_watch::error::{EXIT_FAILURE, EXIT_OK};
use notice_watch::interrupt::Interrupts;
use notice_watch::launcher::{Console, Launcher, SystemRunner};
use notice_watch::logging::{self, LogTarget};
use notice_watch::monitor::{DaemonExit, Monitor};
use notice_watch::notifier::Notifier;
use notice_watch::store::Store;
use notice_watch::ui::TerminalConsole;
use std::path::Path;

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config_file = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Launch { no_pause: false }) {
        Commands::Launch { no_pause } => launch(config_file, no_pause, cli.verbose),
        Commands::Check { silent } => {
            let config = Config::load(config_file)?;
            logging::init(&config.logging.level, cli.verbose, LogTarget::Stderr)?;
            let report = SelfCheck::new(&config, silent).run();
            Ok(if report.passed() { EXIT_OK } else { EXIT_FAILURE })
        }
        Commands::Scrape(args) => scrape(&Config::load(config_file)?, &args, cli.verbose),
    }
}

fn launch(config_file: Option<&Path>, no_pause: bool, verbose: bool) -> anyhow::Result<i32> {
    let mut console = TerminalConsole::new(!no_pause);
    // Same error-then-pause treatment as every other launcher failure.
    let config = match Config::load(config_file) {
        Ok(config) => config,
        Err(e) => {
            console.error(&e.to_string());
            console.pause();
            return Ok(EXIT_FAILURE);
        }
    };
    logging::init(&config.logging.level, verbose, LogTarget::Stderr)?;

    let workdir = std::env::current_dir()?;
    let mut launcher = Launcher::new(
        &config.launcher,
        workdir.clone(),
        console,
        SystemRunner::new(workdir),
    );
    if let Some(path) = config_file {
        launcher = launcher.with_config_file(std::path::absolute(path)?);
    }
    Ok(launcher.run())
}

fn scrape(config: &Config, args: &ScrapeArgs, verbose: bool) -> anyhow::Result<i32> {
    logging::init(
        &config.logging.level,
        verbose,
        LogTarget::StdoutAndFile(&config.storage.log_file),
    )?;

    if !args.skip_check {
        println!("Running self-check...");
        if !SelfCheck::new(config, true).run().passed() {
            println!("Self-check failed, exiting");
            println!("Run `notice-watch check` for details");
            return Ok(EXIT_FAILURE);
        }
        println!("Self-check passed, starting scraper");
        println!("{}", "-".repeat(50));
    }

    let client = SiteClient::new(&config.target_url, &config.request)?;
    let notifier = Notifier::new(&config.notification)?;
    let monitor = Monitor::new(
        client,
        notifier,
        Store::new(&config.storage),
        &config.target_url,
        &config.scrape,
    );

    if args.daemon {
        let interrupts = Interrupts::listen()?;
        return Ok(match monitor.run_daemon(&interrupts) {
            DaemonExit::Interrupted => EXIT_OK,
            DaemonExit::TooManyErrors => EXIT_FAILURE,
        });
    }

    match monitor.run_once() {
        Ok(_) => Ok(EXIT_OK),
        Err(e) => {
            log::error!("check pass failed: {e}");
            Ok(EXIT_FAILURE)
        }
    }
}
