//! paysched - scheduled payment runner
//!
//! Loads configuration, then either fires the job on its cron cadence until
//! Ctrl-C or runs a single round with `--once`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use paysched_core::RunReport;
use paysched_daemon::{logging, AppContext, LogFormat};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "paysched", version, about)]
struct Cli {
    /// Config file (TOML or JSON). Probed from standard locations if omitted.
    #[arg(long, env = "PAYSCHED_CONFIG")]
    config: Option<PathBuf>,

    /// Run one round immediately and exit.
    #[arg(long)]
    once: bool,

    /// Log output format.
    #[arg(long, env = "PAYSCHED_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so it can feed both the CLI and the logger.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(error) => debug!(%error, "No .env loaded"),
    }

    let config = paysched_infra::config::load(cli.config).context("loading configuration")?;
    let ctx = AppContext::new(config).context("building application context")?;

    if cli.once {
        return run_once(&ctx).await;
    }

    ctx.start().await.context("starting scheduler")?;
    info!(cadence = %ctx.config.cadence, "paysched running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutdown requested");
    ctx.shutdown().await.context("stopping scheduler")?;
    Ok(())
}

async fn run_once(ctx: &AppContext) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling round");
            on_signal.cancel();
        }
    });

    match ctx.run_once(&cancel).await {
        RunReport::Completed(result) => {
            info!(result = %serde_json::to_string(&result)?, "Round complete");
            Ok(())
        }
        RunReport::Skipped(reason) => bail!("round skipped: {reason:?}"),
        RunReport::FetchFailed(error) => bail!("fetching pending items failed: {error}"),
    }
}
