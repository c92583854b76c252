use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foliosync::application::sync_service::SyncService;
use foliosync::config::SyncConfig;
use foliosync::domain::repositories::transaction_source::TransactionSource;
use foliosync::infrastructure::gateway::HttpLedgerGateway;
use foliosync::infrastructure::json_source::JsonFileSource;
use foliosync::task_runner::{run_periodic, RunnerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foliosync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SyncConfig::from_env()?;
    info!(?config, "starting ledger sync sidecar");

    let gateway = Arc::new(HttpLedgerGateway::new(&config)?);
    let service = Arc::new(SyncService::new(gateway));
    let source = Arc::new(JsonFileSource::new(config.source_dir.clone()));

    let runner_config = RunnerConfig {
        interval: Duration::from_secs(config.sync_interval_seconds),
        max_consecutive_failures: 10,
        initial_retry_delay: Duration::from_secs(5),
        max_retry_delay: Duration::from_secs(300),
    };

    let accounts = config.account_ids.clone();
    run_periodic("ledger-sync", runner_config, move || {
        let service = service.clone();
        let source = source.clone();
        let accounts = accounts.clone();
        async move {
            for account_id in &accounts {
                let transactions = match source.load(account_id).await {
                    Ok(transactions) => transactions,
                    Err(e) => {
                        warn!(account_id, %e, "transaction source unavailable, account skipped");
                        continue;
                    }
                };
                match service.sync_account(account_id, transactions).await {
                    Ok(report) if report.is_noop() => {
                        info!(account_id, "ledger already in sync");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(account_id, %e, "sync pass aborted");
                        return Err(e.to_string());
                    }
                }
            }
            Ok(())
        }
    })
    .await;

    Ok(())
}
