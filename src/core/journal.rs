//! Transaction journal - Append-only record of every balance change.
//!
//! The journal never touches account balances. The ledger appends an entry in the
//! same database transaction as the mutation it describes, so an entry exists if
//! and only if the mutation committed. Entries are ordered by their
//! auto-increment `id`, which is also creation order when timestamps collide.

use crate::{
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Order, QueryOrder, QuerySelect, Set, prelude::*};
use std::{fmt, str::FromStr};

/// Largest LIMIT `SQLite` accepts, used when only an offset is requested.
const UNBOUNDED: u64 = i64::MAX.unsigned_abs();

/// Identifier of a journal entry.
pub type TransactionId = i64;

/// Category of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Cooldown-gated earning (`work`)
    Earn,
    /// Daily bonus
    Daily,
    /// Weekly bonus
    Weekly,
    /// Crime reward
    CrimeSuccess,
    /// Crime fine
    CrimeFail,
    /// Wallet to bank
    Deposit,
    /// Bank to wallet
    Withdrawal,
    /// Outgoing transfer
    TransferSent,
    /// Incoming transfer
    TransferReceived,
    /// Won wager, amount is the net profit
    WagerWin,
    /// Lost wager
    WagerLoss,
    /// Principal locked into an investment
    InvestmentOpen,
    /// Investment settled, amount is the profit
    InvestmentClose,
    /// Bank interest
    Interest,
    /// Store purchase
    Purchase,
    /// Item sold back to the store
    Sale,
}

impl TransactionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Earn,
        Self::Daily,
        Self::Weekly,
        Self::CrimeSuccess,
        Self::CrimeFail,
        Self::Deposit,
        Self::Withdrawal,
        Self::TransferSent,
        Self::TransferReceived,
        Self::WagerWin,
        Self::WagerLoss,
        Self::InvestmentOpen,
        Self::InvestmentClose,
        Self::Interest,
        Self::Purchase,
        Self::Sale,
    ];

    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::CrimeSuccess => "crime_success",
            Self::CrimeFail => "crime_fail",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::TransferSent => "transfer_sent",
            Self::TransferReceived => "transfer_received",
            Self::WagerWin => "wager_win",
            Self::WagerLoss => "wager_loss",
            Self::InvestmentOpen => "investment_open",
            Self::InvestmentClose => "investment_close",
            Self::Interest => "interest",
            Self::Purchase => "purchase",
            Self::Sale => "sale",
        }
    }

    /// Whether the entry's amount equals the change in the user's net worth.
    ///
    /// Deposits and withdrawals only move money between buckets. Investment
    /// entries are reconciled from the investments table instead, because the
    /// closing entry records profit rather than the payout.
    #[must_use]
    pub const fn moves_net_worth(self) -> bool {
        !matches!(
            self,
            Self::Deposit | Self::Withdrawal | Self::InvestmentOpen | Self::InvestmentClose
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidChoice {
                kind: "transaction kind",
                value: s.to_string(),
            })
    }
}

/// A journal entry about to be appended.
#[derive(Debug, Clone)]
pub struct JournalEntry<'a> {
    /// Account the amount applies to
    pub user_id: &'a str,
    /// Counterparty, for transfers
    pub related_user_id: Option<&'a str>,
    /// Category
    pub kind: TransactionKind,
    /// Signed delta applied to the account
    pub amount: i64,
    /// Free-text annotation
    pub description: String,
}

impl<'a> JournalEntry<'a> {
    /// Entry without a counterparty.
    pub fn new(
        user_id: &'a str,
        kind: TransactionKind,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            related_user_id: None,
            kind,
            amount,
            description: description.into(),
        }
    }

    /// Sets the counterparty.
    #[must_use]
    pub const fn with_related(mut self, related_user_id: &'a str) -> Self {
        self.related_user_id = Some(related_user_id);
        self
    }
}

/// Appends an entry and returns its id.
pub async fn append<C>(db: &C, entry: JournalEntry<'_>, now: DateTime<Utc>) -> Result<TransactionId>
where
    C: ConnectionTrait,
{
    let model = transaction::ActiveModel {
        user_id: Set(entry.user_id.to_string()),
        related_user_id: Set(entry.related_user_id.map(ToString::to_string)),
        kind: Set(entry.kind.as_str().to_string()),
        amount: Set(entry.amount),
        description: Set(entry.description),
        created_at: Set(now),
        ..Default::default()
    };
    let inserted = model.insert(db).await?;
    Ok(inserted.id)
}

/// Optional criteria for [`query`]. `since` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only this user's entries
    pub user_id: Option<String>,
    /// Only this kind
    pub kind: Option<TransactionKind>,
    /// Entries created at or after
    pub since: Option<DateTime<Utc>>,
    /// Entries created before
    pub until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Filter for one user's entries.
    #[must_use]
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    /// Restricts to one kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Result ordering by entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Creation order
    #[default]
    Oldest,
    /// Most recent first
    Newest,
}

/// Reads journal entries matching `filter`.
pub async fn query<C>(
    db: &C,
    filter: &TransactionFilter,
    order: SortOrder,
    limit: Option<u64>,
    offset: u64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let mut select = Transaction::find();
    if let Some(user_id) = &filter.user_id {
        select = select.filter(transaction::Column::UserId.eq(user_id.as_str()));
    }
    if let Some(kind) = filter.kind {
        select = select.filter(transaction::Column::Kind.eq(kind.as_str()));
    }
    if let Some(since) = filter.since {
        select = select.filter(transaction::Column::CreatedAt.gte(since));
    }
    if let Some(until) = filter.until {
        select = select.filter(transaction::Column::CreatedAt.lt(until));
    }

    let direction = match order {
        SortOrder::Oldest => Order::Asc,
        SortOrder::Newest => Order::Desc,
    };

    let mut select = select.order_by(transaction::Column::Id, direction);
    // SQLite rejects OFFSET without LIMIT
    if offset > 0 {
        select = select.limit(limit.unwrap_or(UNBOUNDED)).offset(offset);
    } else if let Some(limit) = limit {
        select = select.limit(limit);
    }

    select.all(db).await.map_err(Into::into)
}

/// A user's most recent entries, newest first.
pub async fn history<C>(db: &C, user_id: &str, limit: u64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    query(
        db,
        &TransactionFilter::for_user(user_id),
        SortOrder::Newest,
        Some(limit),
        0,
    )
    .await
}

/// Number of entries recorded for a user.
pub async fn count_for_user<C>(db: &C, user_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .count(db)
        .await
        .map_err(Into::into)
}
