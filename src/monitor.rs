// The scraper proper: one check pass, and the daemon loop that repeats it.
//
// A pass fetches the listing page, extracts announcements, compares them
// with the stored snapshot, notifies about the unseen ones and saves the
// merged result. The daemon runs passes on a fixed interval, backing off
// after failures and giving up after `MAX_CONSECUTIVE_ERRORS` in a row.

use crate::api::PageSource;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::interrupt::Waiter;
use crate::model::Announcement;
use crate::notifier::{Notify, MONITOR_TITLE};
use crate::parse::{parse_announcements, LinkFilter};
use crate::store::Store;
use std::time::Duration;

pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;
const NETWORK_BACKOFF_STEP_SECS: u64 = 60;
const NETWORK_BACKOFF_CAP_SECS: u64 = 300;
const OTHER_BACKOFF_SECS: u64 = 60;

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub found: usize,
    pub new: Vec<Announcement>,
    pub stored: usize,
}

/// How the daemon loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonExit {
    /// Stopped by Ctrl+C.
    Interrupted,
    /// Gave up after too many consecutive failures.
    TooManyErrors,
}

pub struct Monitor<'a, S, N> {
    source: S,
    notifier: N,
    store: Store,
    target_url: &'a str,
    scrape: &'a ScrapeConfig,
}

impl<'a, S: PageSource, N: Notify> Monitor<'a, S, N> {
    pub fn new(source: S, notifier: N, store: Store, target_url: &'a str, scrape: &'a ScrapeConfig) -> Self {
        Monitor {
            source,
            notifier,
            store,
            target_url,
            scrape,
        }
    }

    fn now(&self) -> String {
        chrono::Local::now().format(&self.scrape.date_format).to_string()
    }

    /// Run a single check pass.
    pub fn run_once(&self) -> Result<PassReport, ScrapeError> {
        log::info!("starting check pass");

        let html = self.source.fetch_page()?;

        log::info!("parsing announcements");
        let filter = LinkFilter::new(self.target_url, &self.scrape.keywords);
        let current = parse_announcements(&html, &filter, &self.now());
        if current.is_empty() {
            log::warn!("no announcements found on the page");
        } else {
            log::info!("found {} announcements", current.len());
        }

        let mut snapshot = self.store.load();
        let fresh: Vec<Announcement> = snapshot.unseen(&current).into_iter().cloned().collect();

        self.announce(&fresh);

        snapshot.merge(fresh.clone(), self.scrape.max_announcements, self.now());
        self.store.save(&snapshot)?;

        log::info!("check pass complete");
        Ok(PassReport {
            found: current.len(),
            new: fresh,
            stored: snapshot.total_count,
        })
    }

    fn announce(&self, fresh: &[Announcement]) {
        if fresh.is_empty() {
            log::info!("no new announcements");
            return;
        }
        log::info!("found {} new announcements:", fresh.len());
        for ann in fresh {
            log::info!("- {}", ann.title);
            log::info!("  link: {}", ann.url);
        }
        if self.notifier.notify_new(fresh) {
            log::info!("notification delivered");
        } else {
            log::warn!("notification not delivered; check the notification settings");
        }
    }

    /// Repeat [`run_once`](Self::run_once) until interrupted or until too
    /// many passes fail in a row.
    pub fn run_daemon<W: Waiter>(&self, waiter: &W) -> DaemonExit {
        let interval = self.scrape.check_interval_secs;
        log::info!("starting daemon mode");
        log::info!("check interval: {} seconds ({} minutes)", interval, interval / 60);
        log::info!("press Ctrl+C to stop");

        self.notifier
            .send_desktop(MONITOR_TITLE, "监控系统已启动，将定期检查新通知");

        let mut errors = 0u32;
        let exit = loop {
            if waiter.interrupted() {
                break DaemonExit::Interrupted;
            }
            let pause = match self.run_once() {
                Ok(_) => {
                    errors = 0;
                    log::info!("waiting {interval} seconds until the next check");
                    Duration::from_secs(interval)
                }
                Err(e) => {
                    errors += 1;
                    let network = e.is_network();
                    if network {
                        log::error!("network error ({errors}/{MAX_CONSECUTIVE_ERRORS}): {e}");
                    } else {
                        log::error!("runtime error ({errors}/{MAX_CONSECUTIVE_ERRORS}): {e}");
                    }
                    if errors >= MAX_CONSECUTIVE_ERRORS {
                        log::error!("too many consecutive errors, stopping");
                        break DaemonExit::TooManyErrors;
                    }
                    backoff(network, errors)
                }
            };
            if waiter.wait(pause) {
                break DaemonExit::Interrupted;
            }
        };

        if exit == DaemonExit::Interrupted {
            log::info!("stop requested, shutting down");
            self.notifier.send_desktop(MONITOR_TITLE, "监控系统已停止");
        }
        exit
    }
}

/// Delay before retrying after the `errors`-th consecutive failure.
pub fn backoff(network: bool, errors: u32) -> Duration {
    if network {
        let secs = NETWORK_BACKOFF_STEP_SECS.saturating_mul(u64::from(errors));
        Duration::from_secs(secs.min(NETWORK_BACKOFF_CAP_SECS))
    } else {
        Duration::from_secs(OTHER_BACKOFF_SECS)
    }
}
