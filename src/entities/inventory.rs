//! Inventory entity - How many of each store item a user owns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory database model, keyed by `(user_id, item_id)`
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    /// Owner
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Store item
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_id: i64,
    /// Units owned, never negative
    pub quantity: i64,
}

/// Defines relationships between Inventory and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each row belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::UserId",
        to = "super::account::Column::UserId"
    )]
    Account,
    /// Each row refers to one store item
    #[sea_orm(
        belongs_to = "super::store_item::Entity",
        from = "Column::ItemId",
        to = "super::store_item::Column::Id"
    )]
    StoreItem,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::store_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoreItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
