//! Shared test utilities for the coin ledger.
//!
//! This module provides helpers for setting up in-memory databases, a ledger
//! driven by a manual clock and a seeded RNG, and funded accounts.

use crate::{
    config::economy::EconomyConfig,
    core::{
        accounts,
        clock::ManualClock,
        journal::{self, JournalEntry, TransactionKind},
        ledger::Ledger,
    },
    entities::account,
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::Arc;

/// Seed used by every test ledger.
pub const TEST_SEED: u64 = 42;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed starting instant for clock-driven tests: 2024-01-01 12:00 UTC.
#[must_use]
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Sets up a ledger with default economy settings.
/// Returns (ledger, clock) so tests can move time forward.
pub async fn setup_ledger() -> Result<(Ledger, Arc<ManualClock>)> {
    setup_ledger_with(EconomyConfig::default()).await
}

/// Sets up a ledger with custom economy settings.
pub async fn setup_ledger_with(config: EconomyConfig) -> Result<(Ledger, Arc<ManualClock>)> {
    let db = setup_test_db().await?;
    let clock = Arc::new(ManualClock::new(test_start()));
    let ledger = Ledger::new(db, Arc::new(config))
        .with_clock(clock.clone())
        .with_seed(TEST_SEED);
    Ok((ledger, clock))
}

/// Credits `amount` to a wallet with a matching `earn` journal entry, bypassing
/// cooldowns. Keeps the account reconcilable.
pub async fn fund_wallet(ledger: &Ledger, user_id: &str, amount: i64) -> Result<account::Model> {
    let txn = ledger.db().begin().await?;
    let account = accounts::adjust_wallet(&txn, user_id, amount, ledger.now()).await?;
    journal::append(
        &txn,
        JournalEntry::new(user_id, TransactionKind::Earn, amount, "Test funding"),
        ledger.now(),
    )
    .await?;
    txn.commit().await?;
    Ok(account)
}

/// Funds a wallet and deposits part of it, so the bank holds `bank`.
pub async fn fund_bank(ledger: &Ledger, user_id: &str, bank: i64) -> Result<account::Model> {
    fund_wallet(ledger, user_id, bank).await?;
    Ok(ledger.deposit(user_id, bank).await?.account)
}
