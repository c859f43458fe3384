//! Market listing entity - Items a user has put up for sale to other users.
//!
//! Listed units are held in escrow: they leave the seller's inventory when the
//! listing is created and return only if it is cancelled.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Market listing database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "market_listings")]
pub struct Model {
    /// Listing number shown to buyers
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account selling the items
    pub seller_id: String,
    /// Store item being sold
    pub item_id: i64,
    /// Asking price per unit
    pub price: i64,
    /// Units still for sale, always positive
    pub quantity: i64,
    /// When the listing was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `MarketListing` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each listing belongs to its seller
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::SellerId",
        to = "super::account::Column::UserId"
    )]
    Seller,
    /// Each listing offers one store item
    #[sea_orm(
        belongs_to = "super::store_item::Entity",
        from = "Column::ItemId",
        to = "super::store_item::Column::Id"
    )]
    StoreItem,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl Related<super::store_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoreItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
