//! Account store - Durable access to per-user balances with upsert-on-first-touch.
//!
//! Every balance change is a single guarded `UPDATE` statement
//! (`SET wallet_balance = wallet_balance - x WHERE wallet_balance >= x`), so a debit
//! can never drive a balance negative even when several writers race. A guard that
//! matches no row is reported as `InsufficientFunds`; nothing is ever clamped here.
//!
//! All functions are generic over `ConnectionTrait` so the ledger can run them
//! inside a database transaction.

use crate::{
    entities::{Account, account},
    errors::{Bucket, Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*, sea_query::{Expr, OnConflict}};
use tracing::debug;

const fn balance_column(bucket: Bucket) -> account::Column {
    match bucket {
        Bucket::Wallet => account::Column::WalletBalance,
        Bucket::Bank => account::Column::BankBalance,
    }
}

const fn balance_of(account: &account::Model, bucket: Bucket) -> i64 {
    match bucket {
        Bucket::Wallet => account.wallet_balance,
        Bucket::Bank => account.bank_balance,
    }
}

/// Finds an account without creating it.
pub async fn find<C>(db: &C, user_id: &str) -> Result<Option<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn fetch<C>(db: &C, user_id: &str) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    find(db, user_id).await?.ok_or_else(|| {
        Error::Database(DbErr::RecordNotFound(format!("account {user_id}")))
    })
}

/// Returns the user's account, inserting a zero-balance record created at `now`
/// if none exists.
///
/// The insert uses `ON CONFLICT DO NOTHING`, so two callers creating the same
/// account at once both end up reading the single stored row.
pub async fn get_or_create<C>(db: &C, user_id: &str, now: DateTime<Utc>) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find(db, user_id).await? {
        return Ok(existing);
    }

    let new_account = account::ActiveModel {
        user_id: Set(user_id.to_string()),
        wallet_balance: Set(0),
        bank_balance: Set(0),
        total_earned: Set(0),
        total_spent: Set(0),
        last_earn: Set(None),
        last_daily: Set(None),
        last_weekly: Set(None),
        last_crime: Set(None),
        is_bot: Set(false),
        created_at: Set(now),
    };
    Account::insert(new_account)
        .on_conflict(
            OnConflict::column(account::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    debug!("Created account for {}", user_id);

    fetch(db, user_id).await
}

/// Marks an account as a bot (or a player), creating it if needed.
pub async fn register<C>(
    db: &C,
    user_id: &str,
    is_bot: bool,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let account = get_or_create(db, user_id, now).await?;
    if account.is_bot == is_bot {
        return Ok(account);
    }
    let mut active: account::ActiveModel = account.into();
    active.is_bot = Set(is_bot);
    active.update(db).await.map_err(Into::into)
}

async fn adjust<C>(
    db: &C,
    user_id: &str,
    bucket: Bucket,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let account = get_or_create(db, user_id, now).await?;
    if delta == 0 {
        return Ok(account);
    }

    let column = balance_column(bucket);
    let updated = if delta > 0 {
        Account::update_many()
            .col_expr(column, Expr::col(column).add(delta))
            .col_expr(
                account::Column::TotalEarned,
                Expr::col(account::Column::TotalEarned).add(delta),
            )
            .filter(account::Column::UserId.eq(user_id))
            .exec(db)
            .await?
    } else {
        let debit = delta
            .checked_neg()
            .ok_or(Error::InvalidAmount { amount: delta })?;
        Account::update_many()
            .col_expr(column, Expr::col(column).sub(debit))
            .col_expr(
                account::Column::TotalSpent,
                Expr::col(account::Column::TotalSpent).add(debit),
            )
            .filter(account::Column::UserId.eq(user_id))
            .filter(column.gte(debit))
            .exec(db)
            .await?
    };

    if updated.rows_affected == 0 {
        let current = fetch(db, user_id).await?;
        return Err(Error::InsufficientFunds {
            bucket,
            available: balance_of(&current, bucket),
            required: -delta,
        });
    }

    fetch(db, user_id).await
}

/// Applies `delta` to the wallet. Credits add to `total_earned`, debits to `total_spent`.
///
/// # Errors
/// `InsufficientFunds` if the wallet would go negative; the account is left unchanged.
pub async fn adjust_wallet<C>(
    db: &C,
    user_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    adjust(db, user_id, Bucket::Wallet, delta, now).await
}

/// Applies `delta` to the bank balance, with the same rules as [`adjust_wallet`].
pub async fn adjust_bank<C>(
    db: &C,
    user_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    adjust(db, user_id, Bucket::Bank, delta, now).await
}

/// Moves `amount` between the two buckets of one account in a single statement, so
/// no reader can see the funds in both buckets or in neither. Lifetime counters are
/// untouched because net worth does not change.
async fn move_between<C>(
    db: &C,
    user_id: &str,
    from: Bucket,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }
    get_or_create(db, user_id, now).await?;

    let source = balance_column(from);
    let target = match from {
        Bucket::Wallet => balance_column(Bucket::Bank),
        Bucket::Bank => balance_column(Bucket::Wallet),
    };
    let updated = Account::update_many()
        .col_expr(source, Expr::col(source).sub(amount))
        .col_expr(target, Expr::col(target).add(amount))
        .filter(account::Column::UserId.eq(user_id))
        .filter(source.gte(amount))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        let current = fetch(db, user_id).await?;
        return Err(Error::InsufficientFunds {
            bucket: from,
            available: balance_of(&current, from),
            required: amount,
        });
    }

    fetch(db, user_id).await
}

/// Moves `amount` from the wallet into the bank.
pub async fn transfer_wallet_to_bank<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    move_between(db, user_id, Bucket::Wallet, amount, now).await
}

/// Moves `amount` from the bank into the wallet.
pub async fn transfer_bank_to_wallet<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    move_between(db, user_id, Bucket::Bank, amount, now).await
}
