//! Account entity - One row per user holding wallet/bank balances and lifetime stats.
//!
//! Cooldown timestamps live on the same row so they survive restarts and are
//! shared by every process that talks to the database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Platform user identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Spendable funds, never negative
    pub wallet_balance: i64,
    /// Protected, interest-bearing funds, never negative
    pub bank_balance: i64,
    /// Lifetime sum of all credits
    pub total_earned: i64,
    /// Lifetime sum of all debits
    pub total_spent: i64,
    /// Last successful `earn`
    pub last_earn: Option<DateTimeUtc>,
    /// Last successful daily claim
    pub last_daily: Option<DateTimeUtc>,
    /// Last successful weekly claim
    pub last_weekly: Option<DateTimeUtc>,
    /// Last crime attempt
    pub last_crime: Option<DateTimeUtc>,
    /// Bot accounts may hold balances but never receive transfers
    pub is_bot: bool,
    /// When the account was first referenced
    pub created_at: DateTimeUtc,
}

impl Model {
    /// `wallet_balance + bank_balance`, used for ranking.
    #[must_use]
    pub const fn net_worth(&self) -> i64 {
        self.wallet_balance + self.bank_balance
    }
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many journal entries
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One account has many investments over its lifetime
    #[sea_orm(has_many = "super::investment::Entity")]
    Investments,
    /// One account has many inventory rows
    #[sea_orm(has_many = "super::inventory::Entity")]
    Inventory,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::investment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investments.def()
    }
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
