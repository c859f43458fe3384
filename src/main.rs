#![allow(clippy::result_large_err)]

use coin_ledger::{
    config::{database, economy, users},
    core::{Ledger, store},
    errors::Result,
};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load economy settings
    let economy = economy::load_default_economy_config()
        .inspect_err(|e| error!("Failed to load economy settings: {}", e))?;
    info!("Economy settings loaded.");

    // 4. Open the database and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the store catalog on first start
    store::seed_store_items(&db, &economy.store_items).await?;

    let ledger = Arc::new(Ledger::new(db, Arc::new(economy)));

    // 6. Flag bot accounts so they cannot receive transfers
    for bot_id in users::get_bot_user_ids()? {
        ledger.register_bot(&bot_id).await?;
    }

    // 7. Catch up on work missed while offline, then schedule it
    run_interest(&ledger).await;
    run_settlement(&ledger).await;
    let mut scheduler = start_scheduler(Arc::clone(&ledger)).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.shutdown().await?;

    Ok(())
}

/// Starts the interest and settlement jobs on their configured cron schedules.
async fn start_scheduler(ledger: Arc<Ledger>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job_ledger = Arc::clone(&ledger);
    let interest_job = Job::new_async(ledger.config().interest_cron.as_str(), move |_uuid, _lock| {
        let ledger = Arc::clone(&job_ledger);
        Box::pin(async move { run_interest(&ledger).await })
    })?;

    let job_ledger = Arc::clone(&ledger);
    let settlement_job =
        Job::new_async(ledger.config().settlement_cron.as_str(), move |_uuid, _lock| {
            let ledger = Arc::clone(&job_ledger);
            Box::pin(async move { run_settlement(&ledger).await })
        })?;

    scheduler.add(interest_job).await?;
    scheduler.add(settlement_job).await?;
    scheduler.start().await?;

    info!(
        interest = %ledger.config().interest_cron,
        settlement = %ledger.config().settlement_cron,
        "Scheduler started"
    );
    Ok(scheduler)
}

async fn run_interest(ledger: &Ledger) {
    match ledger
        .run_daily_interest_if_due(ledger.config().bank_interest_rate)
        .await
    {
        Ok(Some(report)) => info!(
            "Paid {} coins of interest to {} accounts ({} errors)",
            report.total_interest, report.accounts_credited, report.errors
        ),
        Ok(None) => {}
        Err(e) => error!("Error applying daily interest: {}", e),
    }
}

async fn run_settlement(ledger: &Ledger) {
    match ledger.settle_matured_investments().await {
        Ok(report) if report.settlements.is_empty() && report.errors == 0 => {}
        Ok(report) => info!(
            "Settled investments: {} completed, {} failed, {} errors",
            report.completed(),
            report.failed(),
            report.errors
        ),
        Err(e) => error!("Error settling investments: {}", e),
    }
}
