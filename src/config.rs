// Configuration: one JSON document with a section per concern.
// Every field has a default so an absent or partial file is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "notice-watch.json";
/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "NOTICE_WATCH_CONFIG";

const DEFAULT_TARGET_URL: &str = "https://hrss.qingdao.gov.cn/ztzl_47/zcpd_47/tzgg_47/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing page that is polled for announcements.
    pub target_url: String,
    pub request: RequestConfig,
    pub storage: StorageConfig,
    pub scrape: ScrapeConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
    pub launcher: LauncherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_secs: u64,
    /// Total attempts per fetch, not additional ones.
    pub retries: u32,
    pub delay_secs: u64,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_file: PathBuf,
    pub log_file: PathBuf,
    pub backup_enabled: bool,
    pub backup_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub check_interval_secs: u64,
    pub max_announcements: usize,
    /// A link is an announcement when its text contains any of these.
    pub keywords: Vec<String>,
    pub date_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub desktop_enabled: bool,
    pub wechat_enabled: bool,
    pub wechat_webhook: String,
    pub dingtalk_enabled: bool,
    pub dingtalk_webhook: String,
    pub telegram_enabled: bool,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    /// Bot API root; `/bot<token>/sendMessage` is appended.
    pub telegram_api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Must exist in the working directory for the launcher to proceed.
    pub marker_file: PathBuf,
    /// Optional environment activation script; its directory goes on PATH.
    pub activate_script: PathBuf,
    /// argv of the self-check program.
    pub self_check: Vec<String>,
    /// argv of the scraper program; the mode flag is appended.
    pub scraper: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_url: DEFAULT_TARGET_URL.to_string(),
            request: RequestConfig::default(),
            storage: StorageConfig::default(),
            scrape: ScrapeConfig::default(),
            notification: NotificationConfig::default(),
            logging: LoggingConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        let headers = [
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            ),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("Upgrade-Insecure-Requests", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        RequestConfig {
            timeout_secs: 30,
            retries: 3,
            delay_secs: 1,
            headers,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_file: PathBuf::from("data/announcements.json"),
            log_file: PathBuf::from("logs/scraper.log"),
            backup_enabled: true,
            backup_count: 7,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            check_interval_secs: 1200,
            max_announcements: 50,
            keywords: ["通知", "公告", "关于", "职称", "评审", "报送"]
                .into_iter()
                .map(String::from)
                .collect(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            desktop_enabled: true,
            wechat_enabled: false,
            wechat_webhook: "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=YOUR_KEY"
                .to_string(),
            dingtalk_enabled: false,
            dingtalk_webhook: "https://oapi.dingtalk.com/robot/send?access_token=YOUR_TOKEN"
                .to_string(),
            telegram_enabled: false,
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            marker_file: PathBuf::from("scraper.py"),
            activate_script: [".venv", "Scripts", "activate.bat"].iter().collect(),
            self_check: vec!["python".to_string(), "startup_check.py".to_string()],
            scraper: vec!["python".to_string(), "scraper.py".to_string()],
        }
    }
}

impl Config {
    /// Resolve and load the configuration.
    ///
    /// An explicit path (flag or `NOTICE_WATCH_CONFIG`) must exist. Without
    /// one, `./notice-watch.json` and then the per-user config directory are
    /// tried, falling back to the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            return Self::from_file(&path);
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Config::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("notice-watch").join("config.json"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the settings the scraper relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.target_url).map_err(|e| ConfigError::Invalid {
            field: "target_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "target_url",
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if self.scrape.check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scrape.check_interval_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.scrape.max_announcements == 0 {
            return Err(ConfigError::Invalid {
                field: "scrape.max_announcements",
                reason: "must be greater than zero".into(),
            });
        }
        if self.request.retries == 0 {
            return Err(ConfigError::Invalid {
                field: "request.retries",
                reason: "at least one attempt is required".into(),
            });
        }
        Ok(())
    }

    /// Directory holding the data file.
    pub fn data_dir(&self) -> PathBuf {
        parent_or_cwd(&self.storage.data_file)
    }

    /// Directory holding the log file.
    pub fn log_dir(&self) -> PathBuf {
        parent_or_cwd(&self.storage.log_file)
    }
}

fn parent_or_cwd(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
