// The interactive launcher.
//
// Runs from the project directory: checks the marker file, applies the
// optional virtual environment, runs the self-check program, asks which
// mode to start and runs the scraper program with `--once` or `--daemon`.
// Every failure prints a message, pauses and exits with status 1.
//
// The flow talks to the outside world only through `Console` and
// `ProcessRunner`, so each branch can be driven from tests.

use crate::config::{LauncherConfig, CONFIG_ENV};
use crate::error::{LaunchError, EXIT_FAILURE, EXIT_OK};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The three menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Once,
    Daemon,
    Exit,
}

impl MenuChoice {
    /// Flag passed to the scraper program, `None` for [`MenuChoice::Exit`].
    pub fn scraper_flag(self) -> Option<&'static str> {
        match self {
            MenuChoice::Once => Some("--once"),
            MenuChoice::Daemon => Some("--daemon"),
            MenuChoice::Exit => None,
        }
    }
}

impl FromStr for MenuChoice {
    type Err = LaunchError;

    /// Exact match on `"1"`, `"2"` or `"3"`; anything else is invalid.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(MenuChoice::Once),
            "2" => Ok(MenuChoice::Daemon),
            "3" => Ok(MenuChoice::Exit),
            other => Err(LaunchError::InvalidChoice(other.to_string())),
        }
    }
}

/// Environment changes applied to every child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    pub set: Vec<(OsString, OsString)>,
    pub remove: Vec<OsString>,
}

impl EnvOverlay {
    pub fn apply(&self, cmd: &mut std::process::Command) {
        for key in &self.remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.set {
            cmd.env(key, value);
        }
    }

    /// What sourcing a virtual environment's activation script does: the
    /// script's directory goes first on `PATH`, `VIRTUAL_ENV` points at the
    /// environment root and `PYTHONHOME` is cleared.
    pub fn activate(script: &Path) -> io::Result<Self> {
        let script = std::path::absolute(script)?;
        let bin_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let root = bin_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| bin_dir.clone());

        let mut paths = vec![bin_dir];
        if let Some(current) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&current));
        }
        let path = std::env::join_paths(paths)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        Ok(EnvOverlay {
            set: vec![
                (OsString::from("VIRTUAL_ENV"), root.into_os_string()),
                (OsString::from("PATH"), path),
            ],
            remove: vec![OsString::from("PYTHONHOME")],
        })
    }
}

/// Starts child programs and waits for them.
pub trait ProcessRunner {
    /// Run `argv` to completion and return its exit code.
    fn run(&mut self, argv: &[String], env: &EnvOverlay) -> Result<i32, LaunchError>;
}

/// Everything the launcher shows to or reads from the user.
pub trait Console {
    fn info(&mut self, msg: &str);
    fn success(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
    /// Print the three options.
    fn show_menu(&mut self);
    /// Read one line, without its line ending.
    fn read_choice(&mut self) -> io::Result<String>;
    /// Wait for the user to acknowledge.
    fn pause(&mut self);
}

pub struct Launcher<'a, C, R> {
    config: &'a LauncherConfig,
    workdir: PathBuf,
    console: C,
    runner: R,
    config_file: Option<PathBuf>,
}

impl<'a, C: Console, R: ProcessRunner> Launcher<'a, C, R> {
    pub fn new(config: &'a LauncherConfig, workdir: PathBuf, console: C, runner: R) -> Self {
        Launcher {
            config,
            workdir,
            console,
            runner,
            config_file: None,
        }
    }

    /// Hand `path` to both child programs through `NOTICE_WATCH_CONFIG`, so
    /// a config given on the launcher's command line reaches them too.
    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Run the whole flow and return the process exit code.
    pub fn run(&mut self) -> i32 {
        match self.run_inner() {
            Ok(()) => EXIT_OK,
            Err(e) => {
                log::debug!("launcher stopped: {e:?}");
                self.console.error(&e.to_string());
                self.console.pause();
                e.exit_code()
            }
        }
    }

    fn run_inner(&mut self) -> Result<(), LaunchError> {
        let config = self.config;
        self.check_marker()?;
        let mut env = self.environment();
        if let Some(path) = &self.config_file {
            env.set.push((OsString::from(CONFIG_ENV), path.clone().into_os_string()));
        }

        self.console.info("Running startup self-check...");
        let status = self.run_program(&config.self_check, None, &env, "the self-check")?;
        if status != 0 {
            return Err(LaunchError::SelfCheckFailed(status));
        }
        self.console.success("Self-check passed");

        self.console.show_menu();
        let line = self.console.read_choice().map_err(LaunchError::Input)?;
        let choice: MenuChoice = line.parse()?;

        let Some(flag) = choice.scraper_flag() else {
            self.console.info("Bye");
            return Ok(());
        };

        match choice {
            MenuChoice::Daemon => self.console.info("Starting monitor, press Ctrl+C to stop"),
            _ => self.console.info("Running a single check"),
        }
        match self.run_program(&config.scraper, Some(flag), &env, "the scraper") {
            Ok(0) => {}
            Ok(code) => self.console.warn(&format!("Scraper exited with status {code}")),
            Err(e) => self.console.warn(&e.to_string()),
        }

        self.console.success("Done");
        self.console.pause();
        Ok(())
    }

    fn check_marker(&self) -> Result<(), LaunchError> {
        let marker = self.workdir.join(&self.config.marker_file);
        if marker.is_file() {
            Ok(())
        } else {
            Err(LaunchError::MissingMarker(self.config.marker_file.clone()))
        }
    }

    fn environment(&mut self) -> EnvOverlay {
        let script = self.workdir.join(&self.config.activate_script);
        if !script.is_file() {
            self.console.warn(&format!(
                "{} not found, using the interpreter on PATH",
                self.config.activate_script.display()
            ));
            return EnvOverlay::default();
        }
        match EnvOverlay::activate(&script) {
            Ok(env) => {
                self.console.info("Virtual environment activated");
                env
            }
            Err(e) => {
                self.console.warn(&format!("could not activate the virtual environment: {e}"));
                EnvOverlay::default()
            }
        }
    }

    fn run_program(
        &mut self,
        base: &[String],
        flag: Option<&str>,
        env: &EnvOverlay,
        what: &'static str,
    ) -> Result<i32, LaunchError> {
        if base.is_empty() {
            return Err(LaunchError::EmptyCommand(what));
        }
        let mut argv = base.to_vec();
        argv.extend(flag.map(String::from));
        self.runner.run(&argv, env)
    }
}

/// Runs programs for real, in the launcher's working directory with
/// inherited stdio.
pub struct SystemRunner {
    workdir: PathBuf,
    interrupts: Option<crate::interrupt::Interrupts>,
}

impl SystemRunner {
    pub fn new(workdir: PathBuf) -> Self {
        SystemRunner {
            workdir,
            interrupts: None,
        }
    }

    /// From the first child on, Ctrl+C is left to the child: the launcher
    /// keeps running so it can report completion.
    fn ignore_interrupts(&mut self) {
        if self.interrupts.is_some() {
            return;
        }
        match crate::interrupt::Interrupts::listen() {
            Ok(listener) => self.interrupts = Some(listener),
            Err(e) => log::warn!("could not install Ctrl+C handler: {e:#}"),
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&mut self, argv: &[String], env: &EnvOverlay) -> Result<i32, LaunchError> {
        let (program, args) = argv.split_first().ok_or(LaunchError::EmptyCommand("a child process"))?;
        self.ignore_interrupts();

        let mut cmd = std::process::Command::new(program);
        cmd.args(args).current_dir(&self.workdir);
        env.apply(&mut cmd);

        log::debug!("running {argv:?}");
        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        let mut guard = ChildGuard(Some(child));
        let status = guard.wait().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        Ok(status.code().unwrap_or(EXIT_FAILURE))
    }
}

/// Kills and reaps the child if it is still running when dropped, so no
/// exit path leaves it behind.
struct ChildGuard(Option<std::process::Child>);

impl ChildGuard {
    fn wait(&mut self) -> io::Result<std::process::ExitStatus> {
        match self.0.as_mut() {
            Some(child) => {
                let status = child.wait()?;
                self.0 = None;
                Ok(status)
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "child already reaped")),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            log::warn!("killing child process {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeRunner {
        calls: Vec<Vec<String>>,
        envs: Vec<EnvOverlay>,
        statuses: VecDeque<i32>,
    }

    impl ProcessRunner for &mut FakeRunner {
        fn run(&mut self, argv: &[String], env: &EnvOverlay) -> Result<i32, LaunchError> {
            self.calls.push(argv.to_vec());
            self.envs.push(env.clone());
            Ok(self.statuses.pop_front().unwrap_or(0))
        }
    }

    #[derive(Default)]
    struct ScriptedConsole {
        input: Option<String>,
        lines: Vec<String>,
        menus: usize,
        pauses: usize,
    }

    impl Console for &mut ScriptedConsole {
        fn info(&mut self, msg: &str) {
            self.lines.push(format!("info: {msg}"));
        }
        fn success(&mut self, msg: &str) {
            self.lines.push(format!("ok: {msg}"));
        }
        fn warn(&mut self, msg: &str) {
            self.lines.push(format!("warn: {msg}"));
        }
        fn error(&mut self, msg: &str) {
            self.lines.push(format!("error: {msg}"));
        }
        fn show_menu(&mut self) {
            self.menus += 1;
        }
        fn read_choice(&mut self) -> io::Result<String> {
            Ok(self.input.take().unwrap_or_default())
        }
        fn pause(&mut self) {
            self.pauses += 1;
        }
    }

    fn config() -> LauncherConfig {
        LauncherConfig {
            marker_file: PathBuf::from("scraper.py"),
            activate_script: [".venv", "Scripts", "activate.bat"].iter().collect(),
            self_check: vec!["python".into(), "startup_check.py".into()],
            scraper: vec!["python".into(), "scraper.py".into()],
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scraper.py"), "").unwrap();
        dir
    }

    fn launch(
        dir: &Path,
        input: &str,
        statuses: &[i32],
    ) -> (i32, FakeRunner, ScriptedConsole) {
        let config = config();
        let mut runner = FakeRunner {
            statuses: statuses.iter().copied().collect(),
            ..FakeRunner::default()
        };
        let mut console = ScriptedConsole {
            input: Some(input.to_string()),
            ..ScriptedConsole::default()
        };
        let code = Launcher::new(&config, dir.to_path_buf(), &mut console, &mut runner).run();
        (code, runner, console)
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_menu_choices_exactly() {
        assert_eq!("1".parse::<MenuChoice>().unwrap(), MenuChoice::Once);
        assert_eq!("2".parse::<MenuChoice>().unwrap(), MenuChoice::Daemon);
        assert_eq!("3".parse::<MenuChoice>().unwrap(), MenuChoice::Exit);
        for bad in ["4", "", "abc", " 1", "1 ", "01"] {
            assert!(matches!(
                bad.parse::<MenuChoice>(),
                Err(LaunchError::InvalidChoice(_))
            ));
        }
    }

    #[test]
    fn missing_marker_exits_without_running_anything() {
        let dir = tempfile::tempdir().unwrap();
        let (code, runner, console) = launch(dir.path(), "1", &[]);
        assert_eq!(code, 1);
        assert!(runner.calls.is_empty());
        assert_eq!(console.pauses, 1);
        assert!(console.lines.iter().any(|l| l.contains("scraper.py not found")));
    }

    #[test]
    fn failed_self_check_never_runs_scraper() {
        let dir = project();
        let (code, runner, console) = launch(dir.path(), "1", &[2]);
        assert_eq!(code, 1);
        assert_eq!(runner.calls, vec![argv(&["python", "startup_check.py"])]);
        assert_eq!(console.menus, 0);
        assert!(console.lines.iter().any(|l| l.contains("self-check failed")));
    }

    #[test]
    fn passing_self_check_shows_menu() {
        let dir = project();
        let (_, _, console) = launch(dir.path(), "3", &[0]);
        assert_eq!(console.menus, 1);
    }

    #[test]
    fn choice_one_runs_once() {
        let dir = project();
        let (code, runner, console) = launch(dir.path(), "1", &[0, 0]);
        assert_eq!(code, 0);
        assert_eq!(runner.calls[1], argv(&["python", "scraper.py", "--once"]));
        assert_eq!(console.pauses, 1);
        assert!(console.lines.iter().any(|l| l == "ok: Done"));
    }

    #[test]
    fn choice_two_runs_daemon() {
        let dir = project();
        let (code, runner, _) = launch(dir.path(), "2", &[0, 0]);
        assert_eq!(code, 0);
        assert_eq!(runner.calls[1], argv(&["python", "scraper.py", "--daemon"]));
    }

    #[test]
    fn interrupted_scraper_still_completes() {
        let dir = project();
        let (code, runner, console) = launch(dir.path(), "2", &[0, 130]);
        assert_eq!(code, 0);
        assert_eq!(runner.calls.len(), 2);
        assert!(console.lines.iter().any(|l| l.contains("status 130")));
        assert!(console.lines.iter().any(|l| l == "ok: Done"));
    }

    #[test]
    fn choice_three_exits_cleanly() {
        let dir = project();
        let (code, runner, console) = launch(dir.path(), "3", &[0]);
        assert_eq!(code, 0);
        assert_eq!(runner.calls.len(), 1);
        assert_eq!(console.pauses, 0);
    }

    #[test]
    fn invalid_choice_exits_with_failure() {
        for input in ["4", "", "abc"] {
            let dir = project();
            let (code, runner, console) = launch(dir.path(), input, &[0]);
            assert_eq!(code, 1, "input {input:?}");
            assert_eq!(runner.calls.len(), 1, "input {input:?}");
            assert_eq!(console.pauses, 1);
        }
    }

    #[test]
    fn missing_venv_warns_and_uses_plain_environment() {
        let dir = project();
        let (_, runner, console) = launch(dir.path(), "3", &[0]);
        assert!(console.lines.iter().any(|l| l.starts_with("warn:") && l.contains("activate.bat")));
        assert_eq!(runner.envs[0], EnvOverlay::default());
    }

    #[test]
    fn venv_is_applied_to_children() {
        let dir = project();
        let scripts = dir.path().join(".venv").join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(scripts.join("activate.bat"), "").unwrap();

        let (_, runner, _) = launch(dir.path(), "1", &[0, 0]);
        let env = &runner.envs[1];
        let venv = env
            .set
            .iter()
            .find(|(k, _)| k == "VIRTUAL_ENV")
            .map(|(_, v)| PathBuf::from(v))
            .unwrap();
        assert!(venv.ends_with(".venv"));
        let path = env.set.iter().find(|(k, _)| k == "PATH").map(|(_, v)| v.clone()).unwrap();
        let first = std::env::split_paths(&path).next().unwrap();
        assert!(first.ends_with(Path::new(".venv").join("Scripts")));
        assert_eq!(env.remove, vec![OsString::from("PYTHONHOME")]);
    }

    #[test]
    fn config_file_is_forwarded_to_both_children() {
        let dir = project();
        let config = config();
        let mut runner = FakeRunner::default();
        let mut console = ScriptedConsole {
            input: Some("1".into()),
            ..ScriptedConsole::default()
        };
        let file = dir.path().join("custom.json");

        let code = Launcher::new(&config, dir.path().to_path_buf(), &mut console, &mut runner)
            .with_config_file(file.clone())
            .run();
        assert_eq!(code, 0);
        assert_eq!(runner.envs.len(), 2);
        for env in &runner.envs {
            assert!(env
                .set
                .contains(&(OsString::from(CONFIG_ENV), file.clone().into_os_string())));
        }
    }
}
