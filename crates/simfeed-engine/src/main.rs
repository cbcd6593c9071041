//! Simfeed engine binary.
//!
//! Wires together configuration, the shared store, the observer server, the
//! optional NATS publisher, and the update scheduler, then ticks until the
//! run ends.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load the simulation document (`SIMFEED_CONFIG`, the first argument,
//!    or `data_config.json`)
//! 3. Apply environment overrides
//! 4. Start the observer server
//! 5. Connect to NATS when configured
//! 6. Start the scheduler and wait for Ctrl-C or the tick limit
//! 7. Shut the server down and log the result

mod error;
mod nats_publisher;

use std::path::PathBuf;
use std::sync::Arc;

use simfeed_core::config::{ConfigSource, load};
use simfeed_core::scheduler::{FanOut, Publisher, UpdateScheduler};
use simfeed_observer::{AppState, ServerConfig, ServerError};
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::nats_publisher::NatsPublisher;

/// Document loaded when neither `SIMFEED_CONFIG` nor an argument names one.
const DEFAULT_CONFIG_PATH: &str = "data_config.json";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded, the observer cannot
/// bind, or the scheduler task fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("simfeed-engine starting");

    run().await?;
    Ok(())
}

async fn run() -> Result<(), AppError> {
    // 2. Load the simulation document.
    let config_path = config_path();
    info!(path = %config_path.display(), "Loading configuration");
    let (store, mut config) = load(ConfigSource::Path(&config_path))?;

    // 3. Environment overrides.
    config.apply_env_overrides();
    info!(
        update_interval_secs = config.update_interval_secs(),
        seed = ?config.seed,
        max_ticks = config.max_ticks,
        collections = store.len(),
        "Configuration ready"
    );

    let store = store.into_shared();
    let app_state = Arc::new(AppState::new(Arc::clone(&store)));

    // 4. Start the observer server.
    let server_config = ServerConfig::from(&config.server);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_state = Arc::clone(&app_state);
    let mut server_task = tokio::spawn(async move {
        simfeed_observer::start_server(&server_config, server_state, async move {
            let _ = shutdown_rx.await;
        })
        .await
    });

    // 5. Connect to NATS when configured.
    let mut publisher = FanOut::new().with(Arc::clone(&app_state) as Arc<dyn Publisher>);
    let mut nats_task = None;
    if let Some(section) = &config.nats {
        match NatsPublisher::connect(section).await {
            Ok((nats, task)) => {
                info!(prefix = %section.subject_prefix, "NATS publishing enabled");
                publisher = publisher.with(Arc::new(nats));
                nats_task = Some(task);
            }
            Err(e) => {
                warn!(error = %e, "NATS unavailable, continuing without broker publishing");
            }
        }
    }

    // 6. Start the scheduler.
    let scheduler = UpdateScheduler::from_config(store, &config, Arc::new(publisher));
    let handle = scheduler.start();
    let control = handle.control();

    let stop_control = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
            stop_control.request_stop();
        }
    });

    let run = handle.join();
    tokio::pin!(run);

    let (summary, served) = tokio::select! {
        summary = &mut run => {
            // 7. Shut the server down.
            let _ = shutdown_tx.send(());
            (summary?, server_task.await)
        }
        served = &mut server_task => {
            warn!("Observer server exited, stopping scheduler");
            control.request_stop();
            (run.await?, served)
        }
    };
    server_outcome(served)?;

    if let Some(task) = nats_task {
        task.await?;
    }

    if let Some(report) = &summary.last_report {
        info!(
            tick = report.tick,
            items_visited = report.items_visited,
            fields_updated = report.fields_updated,
            skipped = report.skipped(),
            "Last tick"
        );
    }
    info!(
        end_reason = ?summary.end_reason,
        total_ticks = summary.total_ticks,
        "simfeed-engine shutdown complete"
    );

    Ok(())
}

/// Pick the document path: `SIMFEED_CONFIG`, then the first argument, then
/// [`DEFAULT_CONFIG_PATH`].
fn config_path() -> PathBuf {
    std::env::var_os("SIMFEED_CONFIG")
        .or_else(|| std::env::args_os().nth(1))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

fn server_outcome(served: Result<Result<(), ServerError>, JoinError>) -> Result<(), AppError> {
    served??;
    Ok(())
}
