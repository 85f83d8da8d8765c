// Error types shared across the crate.
// Each layer gets its own enum so callers can match on what went wrong;
// the binary edge folds everything into `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit code for a clean run, including choosing "exit" in the menu.
pub const EXIT_OK: i32 = 0;
/// Process exit code for every user-facing failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid header `{0}`")]
    Header(String),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode data file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a single scrape pass. The daemon backs off longer on
/// `Network` than on `Other`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScrapeError {
    pub fn is_network(&self) -> bool {
        matches!(self, ScrapeError::Network(_))
    }
}

/// Everything that ends the launcher early. All variants are terminal and
/// exit with [`EXIT_FAILURE`]; only the message differs.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{} not found in the current directory; run the launcher from the project directory", .0.display())]
    MissingMarker(PathBuf),
    #[error("startup self-check failed (exit status {0})")]
    SelfCheckFailed(i32),
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("no program configured for {0}")]
    EmptyCommand(&'static str),
    #[error("invalid choice {0:?}; enter 1, 2 or 3")]
    InvalidChoice(String),
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}
