//! Investment business logic
//!
//! A user can hold one active investment at a time. Opening one moves the
//! principal out of the wallet; settling it after maturity either pays
//! `floor(principal * multiplier)` back (completed) or pays nothing (failed).
//! The status change is a guarded update on `status = 'active'`, so a position
//! is settled exactly once even if a user command and the scheduled job race.

use crate::{
    config::economy::InvestmentProfile,
    core::{
        accounts,
        journal::{self, JournalEntry, TransactionId, TransactionKind},
        ledger::{Ledger, ensure_user_id},
        random::{self, AmountRange},
    },
    entities::{Investment, account, investment},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::{fmt, str::FromStr};
use tracing::{debug, info, instrument, warn};

/// Lifecycle state of an investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentStatus {
    /// Principal locked, awaiting settlement
    Active,
    /// Paid out
    Completed,
    /// Principal lost
    Failed,
}

impl InvestmentStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidChoice {
                kind: "investment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of settling one investment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// The investment after settlement
    pub investment: investment::Model,
    /// Amount credited to the wallet (0 when failed)
    pub payout: i64,
    /// `payout - principal`
    pub profit: i64,
    /// Owner's account after settlement
    pub account: account::Model,
    /// `investment_close` entry
    pub transaction_id: TransactionId,
}

impl Settlement {
    /// Whether the position paid out.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.investment.status == InvestmentStatus::Completed.as_str()
    }
}

/// Summary of a batch settlement run.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    /// Positions settled in this run
    pub settlements: Vec<Settlement>,
    /// Positions that could not be settled (logged)
    pub errors: usize,
}

impl SettlementReport {
    /// Number of positions that paid out.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.settlements.iter().filter(|s| s.succeeded()).count()
    }

    /// Number of positions that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.settlements.len() - self.completed()
    }
}

/// The user's active investment, if any.
pub async fn active_investment<C>(db: &C, user_id: &str) -> Result<Option<investment::Model>>
where
    C: ConnectionTrait,
{
    Investment::find()
        .filter(investment::Column::UserId.eq(user_id))
        .filter(investment::Column::Status.eq(InvestmentStatus::Active.as_str()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Every investment a user has opened, newest first.
pub async fn investments_of<C>(db: &C, user_id: &str) -> Result<Vec<investment::Model>>
where
    C: ConnectionTrait,
{
    Investment::find()
        .filter(investment::Column::UserId.eq(user_id))
        .order_by_desc(investment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks an active investment settled and pays it out.
async fn settle_position<C>(
    db: &C,
    position: investment::Model,
    failed: bool,
    now: DateTime<Utc>,
) -> Result<Settlement>
where
    C: ConnectionTrait,
{
    let status = if failed {
        InvestmentStatus::Failed
    } else {
        InvestmentStatus::Completed
    };

    let updated = Investment::update_many()
        .col_expr(investment::Column::Status, Expr::value(status.as_str()))
        .col_expr(investment::Column::SettledAt, Expr::value(Some(now)))
        .filter(investment::Column::Id.eq(position.id))
        .filter(investment::Column::Status.eq(InvestmentStatus::Active.as_str()))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::NoActiveInvestment);
    }

    let payout = if failed {
        0
    } else {
        random::floor_mul(position.principal, position.multiplier)
    };
    let profit = payout - position.principal;

    let account = accounts::adjust_wallet(db, &position.user_id, payout, now).await?;
    let (amount, description) = if failed {
        (0, format!("Investment #{} failed", position.id))
    } else {
        (profit, format!("Investment #{} matured", position.id))
    };
    let transaction_id = journal::append(
        db,
        JournalEntry::new(
            &position.user_id,
            TransactionKind::InvestmentClose,
            amount,
            description,
        ),
        now,
    )
    .await?;

    let investment = investment::Model {
        status: status.as_str().to_string(),
        settled_at: Some(now),
        ..position
    };
    Ok(Settlement {
        investment,
        payout,
        profit,
        account,
        transaction_id,
    })
}

impl Ledger {
    /// Locks `principal` from the wallet until `now + maturity`.
    ///
    /// Positions opened this way carry no risk in scheduled settlement; only an
    /// explicit `settle_investment(user, true)` fails them.
    ///
    /// # Errors
    /// - `InvalidAmount` if the principal is outside the configured bounds or
    ///   the maturity is negative
    /// - `InvalidRate` for a negative or non-finite multiplier
    /// - `AlreadyInvested` if the user already has an active position
    /// - `InsufficientFunds` if the wallet cannot cover the principal
    #[instrument(skip(self))]
    pub async fn open_investment(
        &self,
        user_id: &str,
        principal: i64,
        multiplier: f64,
        maturity: Duration,
    ) -> Result<investment::Model> {
        self.open_position(user_id, principal, multiplier, maturity, 0.0, None)
            .await
    }

    /// Opens a position with the return, maturity and risk drawn from a named
    /// investment profile.
    ///
    /// # Errors
    /// `UnknownProfile` if no profile has that name, otherwise as
    /// [`Ledger::open_investment`].
    #[instrument(skip(self))]
    pub async fn invest(
        &self,
        user_id: &str,
        principal: i64,
        profile: &str,
    ) -> Result<investment::Model> {
        let profile: InvestmentProfile =
            self.config
                .profile(profile)
                .cloned()
                .ok_or_else(|| Error::UnknownProfile {
                    name: profile.to_string(),
                })?;

        let (multiplier, days) = self.with_rng(|rng| -> Result<_> {
            Ok((
                random::uniform_f64(rng, profile.min_return, profile.max_return)?,
                AmountRange::new(profile.min_days, profile.max_days)?.sample(rng)?,
            ))
        })?;

        self.open_position(
            user_id,
            principal,
            multiplier,
            Duration::days(days),
            profile.risk,
            Some(&profile.name),
        )
        .await
    }

    async fn open_position(
        &self,
        user_id: &str,
        principal: i64,
        multiplier: f64,
        maturity: Duration,
        risk: f64,
        profile: Option<&str>,
    ) -> Result<investment::Model> {
        ensure_user_id(user_id)?;
        if principal < self.config.investment_min_amount
            || principal > self.config.investment_max_amount
        {
            return Err(Error::InvalidAmount { amount: principal });
        }
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(Error::InvalidRate { rate: multiplier });
        }
        if maturity < Duration::zero() {
            return Err(Error::InvalidAmount {
                amount: maturity.num_seconds(),
            });
        }
        random::ensure_probability(risk)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        if let Some(existing) = active_investment(&txn, user_id).await? {
            return Err(Error::AlreadyInvested {
                matures_at: existing.matures_at,
            });
        }

        accounts::adjust_wallet(&txn, user_id, -principal, now).await?;
        let position = investment::ActiveModel {
            user_id: Set(user_id.to_string()),
            principal: Set(principal),
            multiplier: Set(multiplier),
            risk: Set(risk),
            profile: Set(profile.map(ToString::to_string)),
            status: Set(InvestmentStatus::Active.as_str().to_string()),
            opened_at: Set(now),
            matures_at: Set(now + maturity),
            settled_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        journal::append(
            &txn,
            JournalEntry::new(
                user_id,
                TransactionKind::InvestmentOpen,
                -principal,
                format!("Investment #{} opened", position.id),
            ),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(
            user_id,
            principal,
            multiplier,
            matures_at = %position.matures_at,
            "investment opened"
        );
        Ok(position)
    }

    /// Settles the user's active investment once it has matured.
    ///
    /// # Errors
    /// `NoActiveInvestment` if there is nothing to settle, `NotMatured` before
    /// `matures_at`.
    #[instrument(skip(self))]
    pub async fn settle_investment(&self, user_id: &str, failed: bool) -> Result<Settlement> {
        let now = self.now();

        let txn = self.db.begin().await?;
        let position = active_investment(&txn, user_id)
            .await?
            .ok_or(Error::NoActiveInvestment)?;
        if now < position.matures_at {
            return Err(Error::NotMatured {
                matures_at: position.matures_at,
                remaining: position.matures_at - now,
            });
        }
        let settlement = settle_position(&txn, position, failed, now).await?;
        txn.commit().await?;

        info!(
            user_id,
            payout = settlement.payout,
            profit = settlement.profit,
            "investment settled"
        );
        Ok(settlement)
    }

    /// Settles every matured active investment. Each position fails with its own
    /// `risk` probability and is settled in its own transaction; a position that
    /// cannot be settled is logged and skipped.
    pub async fn settle_matured_investments(&self) -> Result<SettlementReport> {
        let now = self.now();
        let matured = Investment::find()
            .filter(investment::Column::Status.eq(InvestmentStatus::Active.as_str()))
            .filter(investment::Column::MaturesAt.lte(now))
            .order_by_asc(investment::Column::Id)
            .all(&self.db)
            .await?;

        let mut report = SettlementReport::default();
        for position in matured {
            let id = position.id;
            match self.settle_matured(position, now).await {
                Ok(settlement) => report.settlements.push(settlement),
                Err(e) => {
                    warn!("Failed to settle investment #{}: {}", id, e);
                    report.errors += 1;
                }
            }
        }

        debug!(
            "Settled {} investments ({} errors)",
            report.settlements.len(),
            report.errors
        );
        Ok(report)
    }

    async fn settle_matured(
        &self,
        position: investment::Model,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let failed = self.with_rng(|rng| random::roll(rng, position.risk))?;
        let txn = self.db.begin().await?;
        let settlement = settle_position(&txn, position, failed, now).await?;
        txn.commit().await?;
        Ok(settlement)
    }
}
