//! Store business logic
//!
//! The catalog is a table of named items with a price. Buying moves coins out of
//! the wallet and adds to the user's inventory; selling removes items and pays
//! back half the price (rounded down) per unit. Inventory rows whose quantity
//! reaches zero are deleted.

use crate::{
    config::economy::StoreItemConfig,
    core::{
        accounts,
        journal::{self, JournalEntry, TransactionId, TransactionKind},
        ledger::{Ledger, ensure_positive, ensure_user_id},
    },
    entities::{
        Inventory, MarketListing, StoreItem, account, inventory, market_listing, store_item,
    },
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func},
};
use tracing::{debug, info, instrument};

/// One line of a user's inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLine {
    /// The item
    pub item: store_item::Model,
    /// Units owned
    pub quantity: i64,
}

/// Result of [`Ledger::purchase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    /// Item bought
    pub item: store_item::Model,
    /// Units bought
    pub quantity: i64,
    /// Coins paid
    pub cost: i64,
    /// Units owned after the purchase
    pub owned: i64,
    /// Buyer's account after the purchase
    pub account: account::Model,
    /// `purchase` entry
    pub transaction_id: TransactionId,
}

/// Result of [`Ledger::sell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    /// Item sold
    pub item: store_item::Model,
    /// Units sold
    pub quantity: i64,
    /// Coins received
    pub payout: i64,
    /// Units still owned
    pub owned: i64,
    /// Seller's account after the sale
    pub account: account::Model,
    /// `sale` entry
    pub transaction_id: TransactionId,
}

/// Coins paid back per unit when selling an item.
#[must_use]
pub const fn sell_price(item: &store_item::Model) -> i64 {
    item.price / 2
}

/// Lists the catalog, cheapest first.
pub async fn list_items<C>(db: &C) -> Result<Vec<store_item::Model>>
where
    C: ConnectionTrait,
{
    StoreItem::find()
        .order_by_asc(store_item::Column::Price)
        .order_by_asc(store_item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an item by name, ignoring case.
pub async fn find_item<C>(db: &C, name: &str) -> Result<Option<store_item::Model>>
where
    C: ConnectionTrait,
{
    StoreItem::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(store_item::Column::Name)))
                .eq(name.trim().to_lowercase()),
        )
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) async fn require_item<C>(db: &C, name: &str) -> Result<store_item::Model>
where
    C: ConnectionTrait,
{
    find_item(db, name).await?.ok_or_else(|| Error::ItemNotFound {
        name: name.to_string(),
    })
}

/// Adds an item to the catalog.
///
/// # Errors
/// `InvalidItem` for an empty name, a non-positive price or a name already in use.
pub async fn add_item<C>(db: &C, name: &str, price: i64, emoji: &str) -> Result<store_item::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidItem {
            reason: "item name cannot be empty".to_string(),
        });
    }
    if price <= 0 {
        return Err(Error::InvalidItem {
            reason: format!("price must be positive, got {price}"),
        });
    }
    if find_item(db, name).await?.is_some() {
        return Err(Error::InvalidItem {
            reason: format!("an item named '{name}' already exists"),
        });
    }

    let item = store_item::ActiveModel {
        name: Set(name.to_string()),
        price: Set(price),
        emoji: Set(emoji.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!("Added store item {} at {}", item.name, item.price);
    Ok(item)
}

/// Removes an item from the catalog along with every inventory and market listing
/// holding it.
pub async fn remove_item<C>(db: &C, name: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let item = require_item(db, name).await?;
    MarketListing::delete_many()
        .filter(market_listing::Column::ItemId.eq(item.id))
        .exec(db)
        .await?;
    Inventory::delete_many()
        .filter(inventory::Column::ItemId.eq(item.id))
        .exec(db)
        .await?;
    StoreItem::delete_by_id(item.id).exec(db).await?;
    Ok(())
}

/// Creates the configured items if the catalog is empty. Returns how many were added.
pub async fn seed_store_items<C>(db: &C, items: &[StoreItemConfig]) -> Result<usize>
where
    C: ConnectionTrait,
{
    if StoreItem::find().count(db).await? > 0 {
        debug!("Store already has items, skipping seed");
        return Ok(0);
    }
    for item in items {
        add_item(db, &item.name, item.price, &item.emoji).await?;
    }
    info!("Seeded {} store items", items.len());
    Ok(items.len())
}

/// Everything a user owns, in catalog order.
pub async fn inventory_of<C>(db: &C, user_id: &str) -> Result<Vec<InventoryLine>>
where
    C: ConnectionTrait,
{
    let rows = Inventory::find()
        .filter(inventory::Column::UserId.eq(user_id))
        .find_also_related(StoreItem)
        .order_by_asc(inventory::Column::ItemId)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(line, item)| {
            item.map(|item| InventoryLine {
                item,
                quantity: line.quantity,
            })
        })
        .collect())
}

async fn owned_quantity<C>(db: &C, user_id: &str, item_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    Ok(Inventory::find_by_id((user_id.to_string(), item_id))
        .one(db)
        .await?
        .map_or(0, |line| line.quantity))
}

/// Adds units to a user's inventory and returns how many they now own.
pub(crate) async fn add_to_inventory<C>(
    db: &C,
    user_id: &str,
    item_id: i64,
    quantity: i64,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let updated = Inventory::update_many()
        .col_expr(
            inventory::Column::Quantity,
            Expr::col(inventory::Column::Quantity).add(quantity),
        )
        .filter(inventory::Column::UserId.eq(user_id))
        .filter(inventory::Column::ItemId.eq(item_id))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        inventory::ActiveModel {
            user_id: Set(user_id.to_string()),
            item_id: Set(item_id),
            quantity: Set(quantity),
        }
        .insert(db)
        .await?;
    }
    owned_quantity(db, user_id, item_id).await
}

/// Removes units from a user's inventory with a guarded decrement and returns how
/// many remain. A row that reaches zero is deleted.
///
/// # Errors
/// `InsufficientItems` if the user owns fewer than `quantity` units.
pub(crate) async fn take_from_inventory<C>(
    db: &C,
    user_id: &str,
    item: &store_item::Model,
    quantity: i64,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let updated = Inventory::update_many()
        .col_expr(
            inventory::Column::Quantity,
            Expr::col(inventory::Column::Quantity).sub(quantity),
        )
        .filter(inventory::Column::UserId.eq(user_id))
        .filter(inventory::Column::ItemId.eq(item.id))
        .filter(inventory::Column::Quantity.gte(quantity))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::InsufficientItems {
            item: item.name.clone(),
            owned: owned_quantity(db, user_id, item.id).await?,
            requested: quantity,
        });
    }
    Inventory::delete_many()
        .filter(inventory::Column::UserId.eq(user_id))
        .filter(inventory::Column::ItemId.eq(item.id))
        .filter(inventory::Column::Quantity.lte(0))
        .exec(db)
        .await?;
    owned_quantity(db, user_id, item.id).await
}

impl Ledger {
    /// Buys `quantity` units of the named item.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive quantity, `ItemNotFound`, or
    /// `InsufficientFunds` if the wallet cannot cover `price * quantity`.
    #[instrument(skip(self))]
    pub async fn purchase(
        &self,
        user_id: &str,
        item_name: &str,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        ensure_user_id(user_id)?;
        ensure_positive(quantity)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        let item = require_item(&txn, item_name).await?;
        let cost = item
            .price
            .checked_mul(quantity)
            .ok_or(Error::InvalidAmount { amount: quantity })?;

        let account = accounts::adjust_wallet(&txn, user_id, -cost, now).await?;

        let owned = add_to_inventory(&txn, user_id, item.id, quantity).await?;

        let transaction_id = journal::append(
            &txn,
            JournalEntry::new(
                user_id,
                TransactionKind::Purchase,
                -cost,
                format!("Bought {quantity}x {}", item.name),
            ),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(user_id, item = %item.name, quantity, cost, "item purchased");
        Ok(PurchaseReceipt {
            item,
            quantity,
            cost,
            owned,
            account,
            transaction_id,
        })
    }

    /// Sells `quantity` units back to the store at half price.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive quantity, `ItemNotFound`, or
    /// `InsufficientItems` if the user owns fewer units.
    #[instrument(skip(self))]
    pub async fn sell(&self, user_id: &str, item_name: &str, quantity: i64) -> Result<SaleReceipt> {
        ensure_user_id(user_id)?;
        ensure_positive(quantity)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        let item = require_item(&txn, item_name).await?;
        let payout = sell_price(&item)
            .checked_mul(quantity)
            .ok_or(Error::InvalidAmount { amount: quantity })?;

        let owned = take_from_inventory(&txn, user_id, &item, quantity).await?;

        let account = accounts::adjust_wallet(&txn, user_id, payout, now).await?;
        let transaction_id = journal::append(
            &txn,
            JournalEntry::new(
                user_id,
                TransactionKind::Sale,
                payout,
                format!("Sold {quantity}x {}", item.name),
            ),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(user_id, item = %item.name, quantity, payout, "item sold");
        Ok(SaleReceipt {
            item,
            quantity,
            payout,
            owned,
            account,
            transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::economy::EconomyConfig;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    async fn seeded_ledger() -> Result<(Ledger, std::sync::Arc<crate::core::clock::ManualClock>)> {
        let (ledger, clock) = setup_ledger().await?;
        seed_store_items(ledger.db(), &EconomyConfig::default().store_items).await?;
        Ok((ledger, clock))
    }

    #[tokio::test]
    async fn test_add_item_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_item(&db, "   ", 10, "").await;
        assert!(matches!(result, Err(Error::InvalidItem { .. })));

        let result = add_item(&db, "Cake", 0, "🍰").await;
        assert!(matches!(result, Err(Error::InvalidItem { .. })));

        let result = add_item(&db, "Cake", -5, "🍰").await;
        assert!(matches!(result, Err(Error::InvalidItem { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_only_fills_empty_store() -> Result<()> {
        let db = setup_test_db().await?;
        let items = EconomyConfig::default().store_items;

        assert_eq!(seed_store_items(&db, &items).await?, 3);
        assert_eq!(seed_store_items(&db, &items).await?, 0);

        let catalog = list_items(&db).await?;
        let names: Vec<_> = catalog.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Cookie", "Coffee", "Trophy"]);

        assert_eq!(find_item(&db, "coffee").await?.unwrap().price, 25);
        assert!(matches!(
            add_item(&db, "COOKIE", 5, "").await,
            Err(Error::InvalidItem { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_and_sell() -> Result<()> {
        let (ledger, _clock) = seeded_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;

        let bought = ledger.purchase("alice", "cookie", 3).await?;
        assert_eq!(bought.cost, 30);
        assert_eq!(bought.owned, 3);
        assert_eq!(bought.account.wallet_balance, 70);

        let bought = ledger.purchase("alice", "Cookie", 2).await?;
        assert_eq!(bought.owned, 5);

        let sold = ledger.sell("alice", "Cookie", 4).await?;
        assert_eq!(sold.payout, 20);
        assert_eq!(sold.owned, 1);
        assert_eq!(sold.account.wallet_balance, 70);

        let inventory = inventory_of(ledger.db(), "alice").await?;
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].item.name, "Cookie");
        assert_eq!(inventory[0].quantity, 1);

        // Selling the last unit removes the row
        ledger.sell("alice", "Cookie", 1).await?;
        assert!(inventory_of(ledger.db(), "alice").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_failures_change_nothing() -> Result<()> {
        let (ledger, _clock) = seeded_ledger().await?;
        fund_wallet(&ledger, "alice", 50).await?;
        let entries = journal::count_for_user(ledger.db(), "alice").await?;

        assert!(matches!(
            ledger.purchase("alice", "Trophy", 1).await,
            Err(Error::InsufficientFunds {
                available: 50,
                required: 100,
                ..
            })
        ));
        assert!(matches!(
            ledger.purchase("alice", "Yacht", 1).await,
            Err(Error::ItemNotFound { .. })
        ));
        assert!(matches!(
            ledger.purchase("alice", "Cookie", 0).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));

        assert_eq!(ledger.account("alice").await?.wallet_balance, 50);
        assert!(inventory_of(ledger.db(), "alice").await?.is_empty());
        assert_eq!(journal::count_for_user(ledger.db(), "alice").await?, entries);

        Ok(())
    }

    #[tokio::test]
    async fn test_sell_more_than_owned() -> Result<()> {
        let (ledger, _clock) = seeded_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;
        ledger.purchase("alice", "Coffee", 2).await?;

        match ledger.sell("alice", "Coffee", 3).await {
            Err(Error::InsufficientItems {
                item,
                owned,
                requested,
            }) => {
                assert_eq!(item, "Coffee");
                assert_eq!(owned, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientItems, got {other:?}"),
        }
        assert!(matches!(
            ledger.sell("alice", "Trophy", 1).await,
            Err(Error::InsufficientItems { owned: 0, .. })
        ));
        assert_eq!(ledger.account("alice").await?.wallet_balance, 50);

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_item_clears_inventories() -> Result<()> {
        let (ledger, _clock) = seeded_ledger().await?;
        fund_wallet(&ledger, "alice", 100).await?;
        ledger.purchase("alice", "Coffee", 1).await?;

        remove_item(ledger.db(), "coffee").await?;
        assert!(find_item(ledger.db(), "Coffee").await?.is_none());
        assert!(inventory_of(ledger.db(), "alice").await?.is_empty());
        assert!(matches!(
            remove_item(ledger.db(), "Coffee").await,
            Err(Error::ItemNotFound { .. })
        ));

        Ok(())
    }
}
