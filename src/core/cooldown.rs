//! Cooldown tracker - Gates repeatable earn actions per user and per action.
//!
//! The last successful use of each action is stored on the account row, so
//! cooldowns survive restarts and are shared by every process using the
//! database. Acquisition is a compare-and-swap: the new timestamp is written only
//! if the stored one is still the value that was checked. Expiry is lazy; nothing
//! runs when a cooldown ends.

use crate::{
    core::accounts,
    entities::{Account, account},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{prelude::*, sea_query::Expr};
use std::fmt;

/// Actions that are rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownAction {
    /// `work` / generic earning
    Earn,
    /// Daily bonus
    Daily,
    /// Weekly bonus
    Weekly,
    /// Crime attempt
    Crime,
}

impl CooldownAction {
    /// Interval the live bot uses for this action.
    #[must_use]
    pub fn default_interval(self) -> Duration {
        match self {
            Self::Earn => Duration::minutes(5),
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::days(7),
            Self::Crime => Duration::minutes(10),
        }
    }

    const fn column(self) -> account::Column {
        match self {
            Self::Earn => account::Column::LastEarn,
            Self::Daily => account::Column::LastDaily,
            Self::Weekly => account::Column::LastWeekly,
            Self::Crime => account::Column::LastCrime,
        }
    }

    /// Last successful use recorded on `account`.
    #[must_use]
    pub const fn last_used(self, account: &account::Model) -> Option<DateTime<Utc>> {
        match self {
            Self::Earn => account.last_earn,
            Self::Daily => account.last_daily,
            Self::Weekly => account.last_weekly,
            Self::Crime => account.last_crime,
        }
    }
}

impl fmt::Display for CooldownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Earn => "earn",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Crime => "crime",
        };
        f.write_str(name)
    }
}

/// Whether an action can be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// No active cooldown
    Idle,
    /// Cooling down until `expires_at`
    Cooling {
        /// When the action becomes available again
        expires_at: DateTime<Utc>,
    },
}

impl CooldownState {
    /// Derives the state from the last use. `Cooling` turns into `Idle` once
    /// `now >= expires_at`.
    #[must_use]
    pub fn at(last_used: Option<DateTime<Utc>>, interval: Duration, now: DateTime<Utc>) -> Self {
        match last_used {
            Some(last) if now < last + interval => Self::Cooling {
                expires_at: last + interval,
            },
            _ => Self::Idle,
        }
    }

    /// Time left until the action is available, if cooling.
    #[must_use]
    pub fn remaining(self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::Cooling { expires_at } => Some(expires_at - now),
        }
    }
}

/// Records `now` as the last use of `action` if the cooldown has elapsed.
///
/// # Errors
/// `OnCooldown` with the remaining time if the action was used less than
/// `interval` ago. State is not modified in that case. Losing the
/// compare-and-swap to a concurrent caller also reports `OnCooldown`, with the
/// full interval remaining.
pub async fn try_acquire<C>(
    db: &C,
    user_id: &str,
    action: CooldownAction,
    interval: Duration,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let account = accounts::get_or_create(db, user_id, now).await?;
    let last_used = action.last_used(&account);

    if let Some(remaining) = CooldownState::at(last_used, interval, now).remaining(now) {
        return Err(Error::OnCooldown { action, remaining });
    }

    let column = action.column();
    let guard = match last_used {
        Some(previous) => column.eq(previous),
        None => column.is_null(),
    };
    let updated = Account::update_many()
        .col_expr(column, Expr::value(now))
        .filter(account::Column::UserId.eq(user_id))
        .filter(guard)
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::OnCooldown {
            action,
            remaining: interval,
        });
    }
    Ok(())
}

/// Read-only view of the remaining cooldown, `None` when the action is available.
pub async fn remaining<C>(
    db: &C,
    user_id: &str,
    action: CooldownAction,
    interval: Duration,
    now: DateTime<Utc>,
) -> Result<Option<Duration>>
where
    C: ConnectionTrait,
{
    let last_used = accounts::find(db, user_id)
        .await?
        .and_then(|account| action.last_used(&account));
    Ok(CooldownState::at(last_used, interval, now).remaining(now))
}
