mod cli;
mod prompt;
mod record;
mod rotate;

use anyhow::anyhow;
use clap::Parser;
use cli::{Cli, Command};
use cs_common::EnvConfig;
use cs_rotation::RotationError;
use std::io;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// A fatal error and the exit status it maps to
pub struct Fatal {
    code: u8,
    error: anyhow::Error,
}

impl Fatal {
    pub fn config(error: impl Into<anyhow::Error>) -> Self {
        Self {
            code: 2,
            error: error.into(),
        }
    }

    pub fn lookup(error: impl Into<anyhow::Error>) -> Self {
        Self {
            code: 3,
            error: error.into(),
        }
    }

    pub fn other(error: impl Into<anyhow::Error>) -> Self {
        Self {
            code: 1,
            error: error.into(),
        }
    }
}

impl From<RotationError> for Fatal {
    fn from(e: RotationError) -> Self {
        Self {
            code: e.exit_code(),
            error: e.into(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,certswap=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(mut cli: Cli) -> Result<(), Fatal> {
    let env = EnvConfig::load(cli.env_file.as_deref()).map_err(Fatal::config)?;
    let timeout = cli.http_timeout();

    if let Some(Command::Record(args)) = &cli.command {
        return record::run(args, &env, timeout).await;
    }

    if cli.rotate.interactive {
        let proceed = prompt::run_wizard(&mut cli.rotate, &env, io::stdin().lock(), io::stdout())
            .map_err(|e| Fatal::other(anyhow!("interactive prompt failed: {}", e)))?;
        if !proceed {
            return Ok(());
        }
    }

    rotate::run(&cli.rotate, &env, timeout).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(fatal) => {
            error!("{:#}", fatal.error);
            ExitCode::from(fatal.code)
        }
    }
}
