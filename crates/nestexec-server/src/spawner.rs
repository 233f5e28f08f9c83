//! Process spawning capability.

use std::io;
use std::process::{Child, Command, Stdio};

/// Environment variables passed through to launched processes.
///
/// Everything else in the server's environment is cleared before spawn.
pub const ALLOWED_ENV_VARS: &[&str] = &["PATH", "HOME", "LANG", "TERM"];

/// Starts a child process with piped stdin, stdout, and stderr.
pub trait Spawner: Send + Sync {
    fn spawn(&self, cmd: &str, args: &[String]) -> io::Result<Child>;
}

/// Spawns real OS processes with a cleared environment.
#[derive(Debug, Clone)]
pub struct OsSpawner {
    allowed_env: Vec<String>,
}

impl OsSpawner {
    pub fn new() -> Self {
        Self {
            allowed_env: ALLOWED_ENV_VARS.iter().map(|key| key.to_string()).collect(),
        }
    }

    /// Replace the inherited environment allowlist.
    pub fn with_allowed_env<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_env = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_env(&self) -> &[String] {
        &self.allowed_env
    }
}

impl Default for OsSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner for OsSpawner {
    fn spawn(&self, cmd: &str, args: &[String]) -> io::Result<Child> {
        let mut command = Command::new(cmd);
        command.args(args);

        command.env_clear();
        for key in &self.allowed_env {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}
