// Library root
// ------------
// The binary (`main.rs`) is a thin dispatcher over these modules.
//
// Module responsibilities:
// - `launcher`: the interactive launcher flow (marker file, virtual env,
//   self-check program, mode menu, scraper program).
// - `ui`: terminal implementation of the launcher's console.
// - `check`: the startup self-check.
// - `api`: blocking HTTP access to the notice board.
// - `parse`, `model`, `store`: turning a page into announcements and
//   remembering which ones were already seen.
// - `monitor`: the single check pass and the daemon loop around it.
// - `notifier`: desktop and webhook notifications.
// - `config`, `logging`, `error`, `interrupt`, `cli`: plumbing.
pub mod api;
pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod launcher;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod notifier;
pub mod parse;
pub mod store;
pub mod ui;

#[cfg(test)]
mod test_support;
