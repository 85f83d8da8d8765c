// Logging setup on top of `env_logger`.
// Records look like `2025-01-20 16:06:00 - notice_watch::monitor - INFO - message`.

use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Where log records go.
pub enum LogTarget<'a> {
    /// Standard error only; keeps stdout free for menus and prompts.
    Stderr,
    /// Standard output and an append-only log file.
    StdoutAndFile(&'a Path),
}

/// Install the global logger. `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, verbose: bool, target: LogTarget<'_>) -> Result<()> {
    let filter = if verbose {
        LevelFilter::Debug
    } else {
        level.parse().unwrap_or(LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter).format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.target(),
            record.level(),
            record.args()
        )
    });
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    match target {
        LogTarget::Stderr => {
            builder.target(env_logger::Target::Stderr);
        }
        LogTarget::StdoutAndFile(path) => {
            let file = open_log_file(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
        }
    }

    // A second init (tests, repeated calls) is harmless.
    let _ = builder.try_init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Writes every record to stdout and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.flush()
    }
}
