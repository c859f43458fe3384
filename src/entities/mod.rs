//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod inventory;
pub mod investment;
pub mod market_listing;
pub mod store_item;
pub mod system_state;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use inventory::{Column as InventoryColumn, Entity as Inventory, Model as InventoryModel};
pub use investment::{
    Column as InvestmentColumn, Entity as Investment, Model as InvestmentModel,
};
pub use market_listing::{
    Column as MarketListingColumn, Entity as MarketListing, Model as MarketListingModel,
};
pub use store_item::{Column as StoreItemColumn, Entity as StoreItem, Model as StoreItemModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
