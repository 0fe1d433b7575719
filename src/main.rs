// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use docker_rpmbuild::cli::{Cli, Invocation};
use docker_rpmbuild::{BuildContext, DockerEngine, Packager};
use std::process::ExitCode;
use tracing::error;

/// Exit code for a failed build or run
const EXIT_BUILD_FAILED: u8 = 1;
/// Exit code for unusable arguments or configuration
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = cli.log_filter();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let invocation = match cli.resolve() {
        Ok(invocation) => invocation,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            error!("Container build failed!");
            ExitCode::from(EXIT_BUILD_FAILED)
        }
    }
}

fn run(invocation: Invocation) -> Result<()> {
    let engine =
        DockerEngine::connect(&invocation.docker).context("Failed to connect to docker")?;

    let mut packager = Packager::new(BuildContext::new(invocation.recipe), engine);
    packager
        .run(&invocation.output)
        .with_context(|| format!("Building on {}", packager))?;

    Ok(())
}
