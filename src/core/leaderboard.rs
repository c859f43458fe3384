//! Leaderboard and audit queries
//!
//! Read-only views over the account table: rankings (bot accounts are never
//! ranked), a per-user summary, and a reconciliation check that the journal and
//! the lifetime counters both explain the current balances.

use crate::{
    core::{
        accounts,
        investment::{self, InvestmentStatus},
        journal::{self, TransactionKind},
        random,
        store::{self, InventoryLine},
    },
    entities::{Account, Transaction, account, investment as investment_entity, transaction},
    errors::{Error, Result},
};
use sea_orm::{
    Order, QueryOrder, QuerySelect,
    prelude::*,
    sea_query::{Expr, SimpleExpr},
};
use std::{fmt, str::FromStr};

/// What a leaderboard ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardOrder {
    /// Wallet balance
    Wallet,
    /// Bank balance
    Bank,
    /// Wallet plus bank
    #[default]
    NetWorth,
    /// Lifetime earnings
    TotalEarned,
}

impl LeaderboardOrder {
    fn sort_expr(self) -> SimpleExpr {
        match self {
            Self::Wallet => Expr::col(account::Column::WalletBalance).into(),
            Self::Bank => Expr::col(account::Column::BankBalance).into(),
            Self::NetWorth => net_worth_expr(),
            Self::TotalEarned => Expr::col(account::Column::TotalEarned).into(),
        }
    }

    /// The ranked value for an account.
    #[must_use]
    pub const fn value_of(self, account: &account::Model) -> i64 {
        match self {
            Self::Wallet => account.wallet_balance,
            Self::Bank => account.bank_balance,
            Self::NetWorth => account.wallet_balance + account.bank_balance,
            Self::TotalEarned => account.total_earned,
        }
    }
}

impl fmt::Display for LeaderboardOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wallet => "wallet",
            Self::Bank => "bank",
            Self::NetWorth => "net_worth",
            Self::TotalEarned => "total_earned",
        })
    }
}

impl FromStr for LeaderboardOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wallet" => Ok(Self::Wallet),
            "bank" => Ok(Self::Bank),
            "net_worth" | "networth" | "total" => Ok(Self::NetWorth),
            "total_earned" | "earned" => Ok(Self::TotalEarned),
            other => Err(Error::InvalidChoice {
                kind: "leaderboard order",
                value: other.to_string(),
            }),
        }
    }
}

fn net_worth_expr() -> SimpleExpr {
    Expr::col(account::Column::WalletBalance).add(Expr::col(account::Column::BankBalance))
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    /// Ranked value
    pub value: i64,
    /// The account
    pub account: account::Model,
}

/// Top `limit` non-bot accounts by `order`, highest first. Ties are broken by user id.
pub async fn top_accounts<C>(
    db: &C,
    order: LeaderboardOrder,
    limit: u64,
) -> Result<Vec<LeaderboardEntry>>
where
    C: ConnectionTrait,
{
    let rows = Account::find()
        .filter(account::Column::IsBot.eq(false))
        .order_by(order.sort_expr(), Order::Desc)
        .order_by_asc(account::Column::UserId)
        .limit(limit)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, account)| LeaderboardEntry {
            rank: i + 1,
            value: order.value_of(&account),
            account,
        })
        .collect())
}

/// Everything worth showing on a profile card.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    /// The account
    pub account: account::Model,
    /// Wallet plus bank
    pub net_worth: i64,
    /// Net worth rank among non-bot accounts, `None` for bots
    pub rank: Option<u64>,
    /// Journal entries recorded for the user
    pub transaction_count: u64,
    /// Open investment, if any
    pub active_investment: Option<investment_entity::Model>,
    /// Items owned
    pub inventory: Vec<InventoryLine>,
}

/// Builds the summary for a user, or `None` if the account does not exist.
pub async fn account_summary<C>(db: &C, user_id: &str) -> Result<Option<AccountSummary>>
where
    C: ConnectionTrait,
{
    let Some(account) = accounts::find(db, user_id).await? else {
        return Ok(None);
    };
    let net_worth = account.net_worth();

    let rank = if account.is_bot {
        None
    } else {
        let richer = Account::find()
            .filter(account::Column::IsBot.eq(false))
            .filter(Expr::expr(net_worth_expr()).gt(net_worth))
            .count(db)
            .await?;
        Some(richer + 1)
    };

    Ok(Some(AccountSummary {
        net_worth,
        rank,
        transaction_count: journal::count_for_user(db, user_id).await?,
        active_investment: investment::active_investment(db, user_id).await?,
        inventory: store::inventory_of(db, user_id).await?,
        account,
    }))
}

/// Audit of one account against its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Account audited
    pub user_id: String,
    /// Wallet plus bank
    pub net_worth: i64,
    /// `total_earned - total_spent`
    pub counter_net: i64,
    /// Sum of journal amounts over kinds that move net worth
    pub journal_net: i64,
    /// Net effect of the user's investments on net worth
    pub investment_net: i64,
}

impl Reconciliation {
    /// Whether both the counters and the journal explain the balances.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.counter_net == self.net_worth && self.journal_net + self.investment_net == self.net_worth
    }
}

/// Net worth effect of one investment: the principal while it is locked or lost,
/// the profit once it has paid out.
fn investment_effect(position: &investment_entity::Model) -> i64 {
    if position.status == InvestmentStatus::Completed.as_str() {
        random::floor_mul(position.principal, position.multiplier) - position.principal
    } else {
        -position.principal
    }
}

/// Checks that the user's journal and lifetime counters agree with their balances.
pub async fn reconcile<C>(db: &C, user_id: &str) -> Result<Reconciliation>
where
    C: ConnectionTrait,
{
    let account = accounts::find(db, user_id).await?;
    let (net_worth, counter_net) = account.as_ref().map_or((0, 0), |a| {
        (a.net_worth(), a.total_earned - a.total_spent)
    });

    let kinds: Vec<&str> = TransactionKind::ALL
        .into_iter()
        .filter(|kind| kind.moves_net_worth())
        .map(TransactionKind::as_str)
        .collect();
    let journal_net = Transaction::find()
        .select_only()
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Kind.is_in(kinds))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten()
        .unwrap_or(0);

    let investment_net = investment::investments_of(db, user_id)
        .await?
        .iter()
        .map(investment_effect)
        .sum();

    Ok(Reconciliation {
        user_id: user_id.to_string(),
        net_worth,
        counter_net,
        journal_net,
        investment_net,
    })
}
