use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Timeout for renew/reload commands
const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// An external program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

/// Runs the renew and reload steps
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes and streams their output into the log
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &ExternalCommand) -> std::io::Result<CommandOutput> {
        debug!(command = %command, "Spawning");
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let out = timeout(COMMAND_TIMEOUT, child).await.map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} timed out after {}s", command, COMMAND_TIMEOUT.as_secs()),
            )
        })??;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            info!(program = %command.program, "{}", line);
        }

        Ok(CommandOutput {
            success: out.status.success(),
            code: out.status.code(),
            output,
        })
    }
}
