use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attachment_binding::{config::Config, AppState};

#[derive(Debug, Parser)]
#[command(
    name = "attachment-reconcile",
    about = "Delete stored attachments that no record references"
)]
struct Args {
    /// Category to sweep; repeat for several (default: every category)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Report orphans without deleting them
    #[arg(long)]
    dry_run: bool,

    /// Override RECONCILE_GRACE_SECONDS for this run
    #[arg(long, value_name = "SECONDS")]
    grace_seconds: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "attachment-reconcile starting");

    let config = Config::load()?;
    let grace = args
        .grace_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.reconcile_grace());

    let state = AppState::open(config)?;

    let categories: Vec<String> = if args.categories.is_empty() {
        state
            .categories
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        args.categories
    };

    let summary = state
        .reconcile_many(categories.as_slice(), grace, args.dry_run)
        .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.errors.is_empty() {
        tracing::error!(
            errors = summary.errors.len(),
            "Some categories could not be reconciled"
        );
        return Ok(ExitCode::FAILURE);
    }

    let failed = summary.failed();
    if failed > 0 {
        tracing::error!(failed, "Some orphaned attachments could not be deleted");
        return Ok(ExitCode::from(2));
    }

    info!("Reconciliation finished");
    Ok(ExitCode::SUCCESS)
}
