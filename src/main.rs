mod error;
mod adapters;
mod execution;
mod price_engine;
mod settlement;
mod bootstrap;
mod config;

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::AppResult;
use crate::price_engine::aggregator::unix_now;
use crate::settlement::models::{GroupOutcome, RunSummary};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,stream_oracle=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn report(label: &str, result: &AppResult<RunSummary>) -> bool {
    match result {
        Ok(summary) => {
            for outcome in &summary.outcomes {
                match outcome {
                    GroupOutcome::Settled {
                        key,
                        stream_ids,
                        scaled_price,
                        transaction_hash,
                    } => info!(
                        "  settled {:?} on {} at {} (price {}, tx {})",
                        stream_ids, key.settlement_target, key.next_due, scaled_price, transaction_hash
                    ),
                    GroupOutcome::Failed { key, reason } => error!(
                        "  failed {} at {}: {}",
                        key.settlement_target, key.next_due, reason
                    ),
                }
            }
            info!(
                "✓ {} pipeline finished: {} due, {} settled, {} failed",
                label,
                summary.due_groups,
                summary.settled(),
                summary.failed()
            );
            true
        }
        Err(e) => {
            error!("❌ {} pipeline could not run: {}", label, e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    info!("🚀 Starting stream price oracle");

    dotenv::dotenv().ok();
    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipelines = match bootstrap::initialize_pipelines(&config) {
        Ok(pipelines) => pipelines,
        Err(e) => {
            error!("❌ Failed to initialize: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Both chains run independently; one failing never cancels the other
    let now = unix_now();
    let (optimism, mainnet) = tokio::join!(
        pipelines.optimism.run(now),
        pipelines.mainnet.run(now),
    );

    let optimism_ok = report(pipelines.optimism.label(), &optimism);
    let mainnet_ok = report(pipelines.mainnet.label(), &mainnet);

    if optimism_ok && mainnet_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
