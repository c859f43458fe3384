//! Store item entity - Items users can buy from (and sell back to) the store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_items")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across the store
    #[sea_orm(unique)]
    pub name: String,
    /// Purchase price in coins
    pub price: i64,
    /// Emoji shown next to the item
    pub emoji: String,
}

/// Defines relationships between `StoreItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One item appears in many inventories
    #[sea_orm(has_many = "super::inventory::Entity")]
    Inventory,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
