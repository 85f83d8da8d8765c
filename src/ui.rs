// UI layer: the terminal side of the launcher, built on `dialoguer` and
// `console`. When stdin is not a terminal it falls back to plain line
// reading so the launcher can be scripted.

use crate::launcher::Console;
use crossterm::style::Stylize;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

pub struct TerminalConsole {
    pause_enabled: bool,
    interactive: bool,
}

impl TerminalConsole {
    /// `pause_enabled = false` turns every "press any key" into a no-op.
    pub fn new(pause_enabled: bool) -> Self {
        TerminalConsole {
            pause_enabled,
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl Console for TerminalConsole {
    fn info(&mut self, msg: &str) {
        println!("{} {}", "•".cyan(), msg);
    }

    fn success(&mut self, msg: &str) {
        println!("{} {}", "✓".green(), msg);
    }

    fn warn(&mut self, msg: &str) {
        println!("{} {}", "!".yellow(), msg);
    }

    fn error(&mut self, msg: &str) {
        println!("{} {}", "✗".red().bold(), msg);
    }

    fn show_menu(&mut self) {
        println!();
        println!("{}", "Select a mode:".bold());
        println!("  1. Run a single check");
        println!("  2. Start monitoring (daemon)");
        println!("  3. Exit");
        println!();
    }

    fn read_choice(&mut self) -> io::Result<String> {
        if self.interactive {
            return Input::<String>::new()
                .with_prompt("Enter 1-3")
                .allow_empty(true)
                .interact_text();
        }
        print!("Enter 1-3: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(strip_line_ending(&line).to_string())
    }

    fn pause(&mut self) {
        if !self.pause_enabled || !self.interactive {
            return;
        }
        println!("Press any key to continue...");
        // Any key, including ones that fail to decode, ends the pause.
        let _ = console::Term::stdout().read_key();
    }
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Spinner on stderr for short blocking calls; hidden when stderr is not a
/// terminal.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
