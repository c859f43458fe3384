//! Transaction entity - The append-only journal of balance changes.
//!
//! `kind` is stored as a short string (`"earn"`, `"transfer_sent"`, ...); see
//! [`crate::core::journal::TransactionKind`] for the full set.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Monotonic sequence number, defines creation order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account the amount was applied to
    pub user_id: String,
    /// Counterparty for transfers
    pub related_user_id: Option<String>,
    /// Category of the event
    pub kind: String,
    /// Signed delta applied to the subject account
    pub amount: i64,
    /// Free-text annotation
    pub description: String,
    /// When the entry was appended
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::UserId",
        to = "super::account::Column::UserId"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
