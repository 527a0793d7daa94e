use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Exit code and combined stdout/stderr of one shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub code: i32,
    pub output: Option<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs shell command lines, one at a time.
///
/// `shown` is what may be logged or printed; it differs from `command`
/// when the line carries a password.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, shown: &str) -> Result<CommandOutput>;
}

/// Executes through `sh -c` and waits for the command to finish.
pub struct ShellRunner {
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, shown: &str) -> Result<CommandOutput> {
        debug!("Running: {}", shown);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let child = cmd.output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| Error::CommandTimeout {
                    command: shown.to_string(),
                    timeout,
                })??,
            None => child.await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        // Killed by a signal: no exit code.
        let code = output.status.code().unwrap_or(-1);
        debug!("Exit code {} for: {}", code, shown);

        Ok(CommandOutput {
            code,
            output: (!combined.is_empty()).then_some(combined),
        })
    }
}

/// Prints commands instead of running them.
#[derive(Default)]
pub struct DryRunRunner {
    seen: Mutex<Vec<String>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display lines of every command "run" so far.
    #[cfg(test)]
    pub fn commands(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, _command: &str, shown: &str) -> Result<CommandOutput> {
        info!("[dry-run] {}", shown);
        println!("{}", shown);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(shown.to_string());
        }
        Ok(CommandOutput {
            code: 0,
            output: None,
        })
    }
}

/// Answers every command through a closure and records what was asked.
#[cfg(test)]
pub(crate) struct ScriptedRunner<F> {
    respond: F,
    calls: Mutex<Vec<String>>,
}

#[cfg(test)]
impl<F> ScriptedRunner<F>
where
    F: Fn(&str) -> CommandOutput + Send + Sync,
{
    pub(crate) fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl<F> CommandRunner for ScriptedRunner<F>
where
    F: Fn(&str) -> CommandOutput + Send + Sync,
{
    async fn run(&self, command: &str, _shown: &str) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.to_string());
        Ok((self.respond)(command))
    }
}

#[cfg(test)]
pub(crate) fn ok() -> CommandOutput {
    CommandOutput {
        code: 0,
        output: None,
    }
}

#[cfg(test)]
pub(crate) fn failed(code: i32, output: &str) -> CommandOutput {
    CommandOutput {
        code,
        output: Some(output.to_string()),
    }
}
