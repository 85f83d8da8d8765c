// Startup self-check: verifies the environment before the monitor runs.
// Each check returns Ok(true) on pass, Ok(false) on a reported failure and
// Err on an unexpected error; both failures count against the run.

use crate::api::SiteClient;
use crate::config::Config;
use crate::notifier::{Notifier, Notify, MONITOR_TITLE};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Platform,
    Directories,
    Configuration,
    Network,
    Notification,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Platform,
        CheckKind::Directories,
        CheckKind::Configuration,
        CheckKind::Network,
        CheckKind::Notification,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CheckKind::Platform => "platform",
            CheckKind::Directories => "directories",
            CheckKind::Configuration => "configuration",
            CheckKind::Network => "network",
            CheckKind::Notification => "notification",
        }
    }
}

/// Result of a full self-check run.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub failed: Vec<CheckKind>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> String {
        self.failed
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct SelfCheck<'a> {
    config: &'a Config,
    silent: bool,
}

impl<'a> SelfCheck<'a> {
    pub fn new(config: &'a Config, silent: bool) -> Self {
        SelfCheck { config, silent }
    }

    fn step(&self, msg: &str) {
        if !self.silent {
            log::info!("{msg}");
        }
    }

    /// Run every check in order and collect the failures.
    pub fn run(&self) -> CheckReport {
        if !self.silent {
            log::info!("notice-watch startup self-check");
            log::info!("{}", "=".repeat(50));
        }

        let mut report = CheckReport::default();
        for kind in CheckKind::ALL {
            match self.run_one(kind) {
                Ok(true) => {}
                Ok(false) => report.failed.push(kind),
                Err(e) => {
                    log::error!("{} check errored: {e:#}", kind.name());
                    report.failed.push(kind);
                }
            }
        }

        if !self.silent {
            log::info!("{}", "=".repeat(50));
        }
        if report.passed() {
            if self.silent {
                log::info!("self-check passed");
            } else {
                log::info!("all checks passed, ready to go");
                log::info!("start monitoring with: notice-watch scrape --daemon");
            }
        } else {
            log::error!("self-check failed: {}", report.failed_names());
            log::info!("fix the problems above and run again");
        }
        report
    }

    pub fn run_one(&self, kind: CheckKind) -> Result<bool> {
        match kind {
            CheckKind::Platform => Ok(self.check_platform()),
            CheckKind::Directories => self.check_directories(),
            CheckKind::Configuration => Ok(self.check_configuration()),
            CheckKind::Network => self.check_network(),
            CheckKind::Notification => self.check_notification(),
        }
    }

    fn check_platform(&self) -> bool {
        self.step("checking platform...");
        self.step(&format!("   {} {}", std::env::consts::OS, std::env::consts::ARCH));
        if cfg!(windows) {
            self.step("platform ok");
        } else if !self.silent {
            log::warn!("not running on Windows; desktop notifications may be unavailable");
        }
        true
    }

    fn check_directories(&self) -> Result<bool> {
        self.step("checking directories...");
        for dir in [self.config.data_dir(), self.config.log_dir()] {
            self.ensure_dir(&dir)?;
            self.step(&format!("   {}", dir.display()));
        }
        self.step("directories ok");
        Ok(true)
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            self.step(&format!("   creating {}", dir.display()));
        }
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
    }

    fn check_configuration(&self) -> bool {
        self.step("checking configuration...");
        match self.config.validate() {
            Ok(()) => {
                self.step("configuration ok");
                true
            }
            Err(e) => {
                log::error!("   {e}");
                false
            }
        }
    }

    fn check_network(&self) -> Result<bool> {
        self.step("checking network...");
        let origin = url::Url::parse(&self.config.target_url)
            .context("target_url is not a valid URL")?
            .origin()
            .ascii_serialization();
        let client = SiteClient::new(&self.config.target_url, &self.config.request)?;
        let spinner = crate::ui::spinner(&format!("contacting {origin}"));
        let reached = client.reachable(&origin, NETWORK_TIMEOUT);
        spinner.finish_and_clear();
        match reached {
            Ok(status) if status == reqwest::StatusCode::OK => {
                self.step("target site reachable");
                Ok(true)
            }
            Ok(status) => {
                log::warn!("target site returned status {status}");
                Ok(false)
            }
            Err(e) => {
                log::error!("network check failed: {e}");
                Ok(false)
            }
        }
    }

    fn check_notification(&self) -> Result<bool> {
        self.step("checking notifications...");
        let notifier = Notifier::new(&self.config.notification)?;
        if notifier.send_desktop(MONITOR_TITLE, "系统自检完成，通知功能正常") {
            self.step("test notification sent");
        } else if !self.silent {
            log::warn!("test notification not delivered; monitoring still works");
        }
        Ok(true)
    }
}
