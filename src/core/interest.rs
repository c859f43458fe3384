//! Daily bank interest
//!
//! Credits `floor(bank_balance * rate)` to every account with a positive bank
//! balance. Each account is credited in its own database transaction so one bad
//! row cannot block the rest of the run. The date of the last run is kept in the
//! `system_state` table; the scheduled job claims the day before paying, so a
//! crash mid-run skips the remaining accounts instead of paying anyone twice.

use crate::{
    core::{
        accounts,
        journal::{self, JournalEntry, TransactionKind},
        ledger::Ledger,
        random,
    },
    entities::{Account, SystemState, account, system_state},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, info, warn};

const LAST_INTEREST_RUN_KEY: &str = "last_interest_run";

/// Represents the result of one interest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestReport {
    /// Accounts that received interest
    pub accounts_credited: usize,
    /// Sum of all interest paid
    pub total_interest: i64,
    /// Accounts whose interest rounded down to zero
    pub skipped: usize,
    /// Accounts that could not be credited (logged)
    pub errors: usize,
}

/// Retrieves the date of the last interest run from the `system_state` table.
///
/// # Returns
/// * `Ok(Some(date))` - Last run date if it exists
/// * `Ok(None)` - Interest has never been paid
pub async fn last_interest_run<C>(db: &C) -> Result<Option<NaiveDate>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_INTEREST_RUN_KEY))
        .one(db)
        .await?;

    match state {
        // Stored as YYYY-MM-DD
        Some(s) => NaiveDate::parse_from_str(&s.value, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::Config {
                message: format!("Failed to parse last interest run date: {e}"),
            }),
        None => Ok(None),
    }
}

/// Claims `date` as the latest interest day. Returns `false` if it (or a later day)
/// was already claimed, possibly by a concurrent caller.
///
/// The first run inserts the state row with `ON CONFLICT DO NOTHING`; later runs
/// move the stored date forward with a single guarded `UPDATE`. Dates are stored
/// as `YYYY-MM-DD`, so string order is date order.
async fn claim_interest_day<C>(db: &C, date: NaiveDate, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let value = date.format("%Y-%m-%d").to_string();

    let inserted = SystemState::insert(system_state::ActiveModel {
        key: Set(LAST_INTEREST_RUN_KEY.to_string()),
        value: Set(value.clone()),
        updated_at: Set(now.naive_utc()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(system_state::Column::Key)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    if inserted == 1 {
        return Ok(true);
    }

    let updated = SystemState::update_many()
        .col_expr(system_state::Column::Value, Expr::value(value.clone()))
        .col_expr(system_state::Column::UpdatedAt, Expr::value(now.naive_utc()))
        .filter(system_state::Column::Key.eq(LAST_INTEREST_RUN_KEY))
        .filter(system_state::Column::Value.lt(value))
        .exec(db)
        .await?;
    Ok(updated.rows_affected == 1)
}

impl Ledger {
    /// Pays one round of interest at `rate` to every account with money in the bank.
    ///
    /// # Errors
    /// `InvalidRate` unless `rate` is in `[0, 1]`; storage errors while listing
    /// accounts. Failures on individual accounts are counted, not returned.
    pub async fn apply_daily_interest(&self, rate: f64) -> Result<InterestReport> {
        random::ensure_probability(rate)?;
        let now = self.now();

        let holders = Account::find()
            .filter(account::Column::BankBalance.gt(0))
            .order_by_asc(account::Column::UserId)
            .all(&self.db)
            .await?;

        let mut report = InterestReport::default();
        for holder in holders {
            match self.credit_interest(&holder.user_id, rate, now).await {
                Ok(0) => report.skipped += 1,
                Ok(interest) => {
                    report.accounts_credited += 1;
                    report.total_interest += interest;
                }
                Err(e) => {
                    warn!("Failed to pay interest to {}: {}", holder.user_id, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            credited = report.accounts_credited,
            total = report.total_interest,
            errors = report.errors,
            "daily interest applied"
        );
        Ok(report)
    }

    /// Credits one account; returns the interest paid.
    async fn credit_interest(&self, user_id: &str, rate: f64, now: DateTime<Utc>) -> Result<i64> {
        let txn = self.db.begin().await?;
        let Some(current) = accounts::find(&txn, user_id).await? else {
            return Ok(0);
        };
        let interest = random::floor_mul(current.bank_balance, rate);
        if interest <= 0 {
            return Ok(0);
        }

        accounts::adjust_bank(&txn, user_id, interest, now).await?;
        journal::append(
            &txn,
            JournalEntry::new(
                user_id,
                TransactionKind::Interest,
                interest,
                format!("Daily interest at {:.2}%", rate * 100.0),
            ),
            now,
        )
        .await?;
        txn.commit().await?;
        Ok(interest)
    }

    /// Applies interest unless it has already been applied today (UTC).
    ///
    /// The day is claimed with one compare-and-swap statement before anything is
    /// paid, so concurrent callers (or processes sharing the database) pay at most
    /// once per day.
    ///
    /// # Returns
    /// * `Ok(Some(report))` - Interest was paid
    /// * `Ok(None)` - Already paid today
    pub async fn run_daily_interest_if_due(&self, rate: f64) -> Result<Option<InterestReport>> {
        random::ensure_probability(rate)?;
        let now = self.now();
        let today = now.date_naive();

        if !claim_interest_day(&self.db, today, now).await? {
            debug!("Interest already applied for {}", today);
            return Ok(None);
        }

        self.apply_daily_interest(rate).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::Clock;
    use crate::core::journal::{SortOrder, TransactionFilter};
    use crate::test_utils::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_interest_credits_bank_and_journals() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_bank(&ledger, "alice", 1_000).await?;
        ledger.account("bob").await?;

        let report = ledger.apply_daily_interest(0.02).await?;
        assert_eq!(report.accounts_credited, 1);
        assert_eq!(report.total_interest, 20);
        assert_eq!(report.errors, 0);

        let alice = ledger.account("alice").await?;
        assert_eq!(alice.bank_balance, 1_020);
        assert_eq!(alice.wallet_balance, 0);

        // Zero bank balance is untouched and gets no entry
        let bob = ledger.account("bob").await?;
        assert_eq!(bob.bank_balance, 0);
        assert_eq!(journal::count_for_user(ledger.db(), "bob").await?, 0);

        let entries = journal::query(
            ledger.db(),
            &TransactionFilter::default().with_kind(TransactionKind::Interest),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_interest_rounding_down_to_zero_is_skipped() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;
        fund_bank(&ledger, "alice", 10).await?;

        let report = ledger.apply_daily_interest(0.02).await?;
        assert_eq!(report.accounts_credited, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(ledger.account("alice").await?.bank_balance, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_interest_rejects_invalid_rate() -> Result<()> {
        let (ledger, _clock) = setup_ledger().await?;

        assert!(matches!(
            ledger.apply_daily_interest(-0.1).await,
            Err(Error::InvalidRate { .. })
        ));
        assert!(matches!(
            ledger.apply_daily_interest(f64::NAN).await,
            Err(Error::InvalidRate { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_run_if_due_pays_once_per_day() -> Result<()> {
        let (ledger, clock) = setup_ledger().await?;
        fund_bank(&ledger, "alice", 1_000).await?;
        assert!(last_interest_run(ledger.db()).await?.is_none());

        let first = ledger.run_daily_interest_if_due(0.02).await?;
        assert_eq!(first.unwrap().total_interest, 20);
        assert_eq!(
            last_interest_run(ledger.db()).await?,
            Some(clock.now().date_naive())
        );

        clock.advance(Duration::hours(6));
        assert!(ledger.run_daily_interest_if_due(0.02).await?.is_none());
        assert_eq!(ledger.account("alice").await?.bank_balance, 1_020);

        clock.advance(Duration::days(1));
        let next = ledger.run_daily_interest_if_due(0.02).await?;
        assert_eq!(next.unwrap().total_interest, 20);
        assert_eq!(ledger.account("alice").await?.bank_balance, 1_040);

        // Single state row is updated in place
        let rows = SystemState::find()
            .filter(system_state::Column::Key.eq(LAST_INTEREST_RUN_KEY))
            .count(ledger.db())
            .await?;
        assert_eq!(rows, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_claim_moves_forward_only() -> Result<()> {
        let db = setup_test_db().await?;
        let now = test_start();
        let today = now.date_naive();

        assert!(claim_interest_day(&db, today, now).await?);
        assert!(!claim_interest_day(&db, today, now).await?);
        assert!(!claim_interest_day(&db, today - Duration::days(1), now).await?);
        assert!(claim_interest_day(&db, today + Duration::days(1), now).await?);
        assert_eq!(last_interest_run(&db).await?, Some(today + Duration::days(1)));

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_pay_once_per_day() -> Result<()> {
        // File-backed so the pool hands out several connections
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.sqlite").display());
        let db = sea_orm::Database::connect(&url).await?;
        crate::config::database::create_tables(&db).await?;

        let clock = Arc::new(crate::core::clock::ManualClock::new(test_start()));
        let ledger = Ledger::new(db, Arc::new(crate::config::economy::EconomyConfig::default()))
            .with_clock(clock.clone())
            .with_seed(TEST_SEED);
        fund_bank(&ledger, "alice", 1_000).await?;
        assert!(ledger.run_daily_interest_if_due(0.02).await?.is_some());

        clock.advance(Duration::days(1));
        let ledger = Arc::new(ledger);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.run_daily_interest_if_due(0.02).await
            }));
        }

        let mut runs_paid = 0;
        for handle in handles {
            if handle.await.unwrap()?.is_some() {
                runs_paid += 1;
            }
        }

        assert_eq!(runs_paid, 1);
        assert_eq!(ledger.account("alice").await?.bank_balance, 1_040);

        Ok(())
    }
}
