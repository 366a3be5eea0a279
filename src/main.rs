// Copyright 2026 Posrelay Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use posrelay::config::Config;
use posrelay::diagnostics::DebugSink;
use posrelay::pipeline;
use posrelay::session::chromium::ChromiumEngine;

#[derive(Parser)]
#[command(
    name = "posrelay",
    about = "Posrelay — capture a POS inventory feed and relay it to a webhook",
    version,
    after_help = "Configuration comes from the environment (POS_EMAIL, POS_PASSWORD, \
GAS_WEBHOOK_URL, GAS_SHARED_SECRET, and optional GENRE_ID, POS_BASE, POS_LOGIN_URL, \
POSRELAY_DEBUG_DIR). Flags override single values for one-off runs.\n\
Exit codes: 0 delivered, 1 auth/unexpected failure, 2 no payload, 3 webhook refused."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    quiet: bool,

    /// Override the target genre/category id
    #[arg(long)]
    genre_id: Option<String>,

    /// Override the POS base origin
    #[arg(long)]
    base: Option<String>,

    /// Override the login entry URL
    #[arg(long)]
    login_url: Option<String>,

    /// Directory for debug artifacts
    #[arg(long)]
    debug_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "posrelay=debug"
    } else if cli.quiet {
        "posrelay=warn"
    } else {
        "posrelay=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .init();

    let mut config = Config::from_env()?;
    if let Some(genre_id) = cli.genre_id {
        config.genre_id = genre_id;
    }
    if let Some(base) = cli.base {
        config.base_origin = url::Url::parse(&base)?;
    }
    if let Some(login_url) = cli.login_url {
        config.login_url = Some(url::Url::parse(&login_url)?);
    }
    if let Some(debug_dir) = cli.debug_dir {
        config.debug_dir = debug_dir.into();
    }
    config.log_summary();

    let sink = DebugSink::create(&config.debug_dir)?;
    let mut engine = ChromiumEngine::launch().await?;

    // The browser goes down before the verdict goes out.
    let outcome = pipeline::run_and_shutdown(&config, &mut engine, &sink).await;

    match outcome {
        Ok(report) => {
            info!(
                records = report.records,
                webhook_status = report.receipt.status,
                "run complete"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = %err, exit_code = err.exit_code(), "run failed");
            std::process::exit(err.exit_code());
        }
    }
}
