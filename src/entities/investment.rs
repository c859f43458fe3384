//! Investment entity - A locked principal that pays `principal * multiplier` at maturity
//! unless it fails.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the position
    pub user_id: String,
    /// Amount taken from the wallet when opened
    pub principal: i64,
    /// Payout factor applied on successful settlement
    pub multiplier: f64,
    /// Probability in `[0, 1]` that scheduled settlement marks the position failed
    pub risk: f64,
    /// Named profile used to open the position, if any
    pub profile: Option<String>,
    /// `"active"`, `"completed"` or `"failed"`
    pub status: String,
    /// When the position was opened
    pub opened_at: DateTimeUtc,
    /// Earliest settlement time
    pub matures_at: DateTimeUtc,
    /// When the position left the active state
    pub settled_at: Option<DateTimeUtc>,
}

/// Defines relationships between Investment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each investment belongs to one account
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
