//! Player marketplace
//!
//! Users list items from their inventory at an asking price; listed units are
//! escrowed out of the inventory until they are bought or the listing is
//! cancelled. A purchase moves coins wallet to wallet, so unlike the store it
//! never creates money: the buyer's `purchase` entry and the seller's `sale`
//! entry cancel out and name each other as counterparty.

use crate::{
    core::{
        accounts,
        journal::{self, JournalEntry, TransactionId, TransactionKind},
        ledger::{Ledger, ensure_positive, ensure_user_id},
        store::{add_to_inventory, require_item, take_from_inventory},
    },
    entities::{MarketListing, StoreItem, account, market_listing, store_item},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// A listing together with the item it offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    /// The listing
    pub listing: market_listing::Model,
    /// Item for sale
    pub item: store_item::Model,
}

impl ListingLine {
    /// Price of every unit still listed.
    #[must_use]
    pub const fn total_value(&self) -> i64 {
        self.listing.price.saturating_mul(self.listing.quantity)
    }
}

/// Result of [`Ledger::buy_listing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPurchase {
    /// Listing bought from
    pub listing_id: i64,
    /// Item bought
    pub item: store_item::Model,
    /// Units bought
    pub quantity: i64,
    /// Coins paid to the seller
    pub cost: i64,
    /// Units left on the listing, 0 once it is sold out
    pub remaining: i64,
    /// Buyer after the purchase
    pub buyer: account::Model,
    /// Seller after the purchase
    pub seller: account::Model,
    /// Buyer's `purchase` entry
    pub purchase_id: TransactionId,
    /// Seller's `sale` entry
    pub sale_id: TransactionId,
}

/// Result of [`Ledger::cancel_listing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledListing {
    /// The removed listing
    pub listing: market_listing::Model,
    /// Item returned
    pub item: store_item::Model,
    /// Units the seller owns after the return
    pub owned: i64,
}

/// Every open listing, oldest first.
pub async fn list_listings<C>(db: &C) -> Result<Vec<ListingLine>>
where
    C: ConnectionTrait,
{
    let rows = MarketListing::find()
        .find_also_related(StoreItem)
        .order_by_asc(market_listing::Column::Id)
        .all(db)
        .await?;
    Ok(with_items(rows))
}

/// A seller's open listings, oldest first.
pub async fn listings_of<C>(db: &C, seller_id: &str) -> Result<Vec<ListingLine>>
where
    C: ConnectionTrait,
{
    let rows = MarketListing::find()
        .filter(market_listing::Column::SellerId.eq(seller_id))
        .find_also_related(StoreItem)
        .order_by_asc(market_listing::Column::Id)
        .all(db)
        .await?;
    Ok(with_items(rows))
}

fn with_items(
    rows: Vec<(market_listing::Model, Option<store_item::Model>)>,
) -> Vec<ListingLine> {
    rows.into_iter()
        .filter_map(|(listing, item)| item.map(|item| ListingLine { listing, item }))
        .collect()
}

async fn require_listing<C>(db: &C, listing_id: i64) -> Result<ListingLine>
where
    C: ConnectionTrait,
{
    MarketListing::find_by_id(listing_id)
        .find_also_related(StoreItem)
        .one(db)
        .await?
        .and_then(|(listing, item)| item.map(|item| ListingLine { listing, item }))
        .ok_or(Error::ListingNotFound { id: listing_id })
}

impl Ledger {
    /// Lists `quantity` units of an owned item at `price` each. The units leave the
    /// seller's inventory until sold or cancelled.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive price or quantity, `ItemNotFound`, or
    /// `InsufficientItems` if the seller owns fewer units.
    #[instrument(skip(self))]
    pub async fn list_item(
        &self,
        seller_id: &str,
        item_name: &str,
        price: i64,
        quantity: i64,
    ) -> Result<ListingLine> {
        ensure_user_id(seller_id)?;
        ensure_positive(price)?;
        ensure_positive(quantity)?;
        let now = self.now();

        let txn = self.db.begin().await?;
        let item = require_item(&txn, item_name).await?;
        take_from_inventory(&txn, seller_id, &item, quantity).await?;
        let listing = market_listing::ActiveModel {
            seller_id: Set(seller_id.to_string()),
            item_id: Set(item.id),
            price: Set(price),
            quantity: Set(quantity),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(seller_id, item = %item.name, price, quantity, listing_id = listing.id, "item listed");
        Ok(ListingLine { listing, item })
    }

    /// Buys `quantity` units (all of them for `None`) from a listing. The buyer's
    /// wallet pays the seller's wallet directly.
    ///
    /// # Errors
    /// - `ListingNotFound`
    /// - `InvalidTarget` when buying from your own listing
    /// - `InvalidAmount` for a non-positive quantity
    /// - `InsufficientItems` if fewer units are listed
    /// - `InsufficientFunds` if the buyer's wallet is short; nothing changes
    #[instrument(skip(self))]
    pub async fn buy_listing(
        &self,
        buyer_id: &str,
        listing_id: i64,
        quantity: Option<i64>,
    ) -> Result<MarketPurchase> {
        ensure_user_id(buyer_id)?;
        if let Some(quantity) = quantity {
            ensure_positive(quantity)?;
        }
        let now = self.now();

        let txn = self.db.begin().await?;
        let ListingLine { listing, item } = require_listing(&txn, listing_id).await?;
        if listing.seller_id == buyer_id {
            return Err(Error::InvalidTarget {
                reason: "cannot buy your own listing".to_string(),
            });
        }
        let quantity = quantity.unwrap_or(listing.quantity);
        let cost = listing
            .price
            .checked_mul(quantity)
            .ok_or(Error::InvalidAmount { amount: quantity })?;

        let updated = MarketListing::update_many()
            .col_expr(
                market_listing::Column::Quantity,
                Expr::col(market_listing::Column::Quantity).sub(quantity),
            )
            .filter(market_listing::Column::Id.eq(listing.id))
            .filter(market_listing::Column::Quantity.gte(quantity))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::InsufficientItems {
                item: item.name,
                owned: listing.quantity,
                requested: quantity,
            });
        }
        let remaining = listing.quantity - quantity;
        if remaining == 0 {
            MarketListing::delete_by_id(listing.id).exec(&txn).await?;
        }

        let seller_id = listing.seller_id.as_str();
        let (buyer, seller) = if buyer_id < seller_id {
            let buyer = accounts::adjust_wallet(&txn, buyer_id, -cost, now).await?;
            let seller = accounts::adjust_wallet(&txn, seller_id, cost, now).await?;
            (buyer, seller)
        } else {
            let seller = accounts::adjust_wallet(&txn, seller_id, cost, now).await?;
            let buyer = accounts::adjust_wallet(&txn, buyer_id, -cost, now).await?;
            (buyer, seller)
        };
        add_to_inventory(&txn, buyer_id, item.id, quantity).await?;

        let purchase_id = journal::append(
            &txn,
            JournalEntry::new(
                buyer_id,
                TransactionKind::Purchase,
                -cost,
                format!("Bought {quantity}x {} from listing #{}", item.name, listing.id),
            )
            .with_related(seller_id),
            now,
        )
        .await?;
        let sale_id = journal::append(
            &txn,
            JournalEntry::new(
                seller_id,
                TransactionKind::Sale,
                cost,
                format!("Sold {quantity}x {} on listing #{}", item.name, listing.id),
            )
            .with_related(buyer_id),
            now,
        )
        .await?;
        txn.commit().await?;

        info!(buyer_id, seller_id, listing_id, quantity, cost, "listing bought");
        Ok(MarketPurchase {
            listing_id,
            item,
            quantity,
            cost,
            remaining,
            buyer,
            seller,
            purchase_id,
            sale_id,
        })
    }

    /// Removes one of the user's listings and returns the unsold units to their
    /// inventory.
    ///
    /// # Errors
    /// `ListingNotFound`, or `InvalidTarget` if the listing belongs to someone else.
    #[instrument(skip(self))]
    pub async fn cancel_listing(
        &self,
        seller_id: &str,
        listing_id: i64,
    ) -> Result<CancelledListing> {
        ensure_user_id(seller_id)?;

        let txn = self.db.begin().await?;
        let ListingLine { listing, item } = require_listing(&txn, listing_id).await?;
        if listing.seller_id != seller_id {
            return Err(Error::InvalidTarget {
                reason: format!("listing #{listing_id} belongs to another user"),
            });
        }

        let deleted = MarketListing::delete_many()
            .filter(market_listing::Column::Id.eq(listing.id))
            .filter(market_listing::Column::SellerId.eq(seller_id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(Error::ListingNotFound { id: listing_id });
        }
        let owned = add_to_inventory(&txn, seller_id, item.id, listing.quantity).await?;
        txn.commit().await?;

        info!(seller_id, listing_id, quantity = listing.quantity, "listing cancelled");
        Ok(CancelledListing {
            listing,
            item,
            owned,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::economy::EconomyConfig;
    use crate::core::{
        journal::{SortOrder, TransactionFilter},
        leaderboard, store,
    };
    use crate::test_utils::*;

    /// Alice owns 5 cookies, bob has 100 coins.
    async fn setup_market() -> Result<Ledger> {
        let (ledger, _clock) = setup_ledger().await?;
        store::seed_store_items(ledger.db(), &EconomyConfig::default().store_items).await?;
        fund_wallet(&ledger, "alice", 50).await?;
        ledger.purchase("alice", "Cookie", 5).await?;
        fund_wallet(&ledger, "bob", 100).await?;
        Ok(ledger)
    }

    #[tokio::test]
    async fn test_listing_escrows_inventory() -> Result<()> {
        let ledger = setup_market().await?;

        let line = ledger.list_item("alice", "cookie", 15, 3).await?;
        assert_eq!(line.item.name, "Cookie");
        assert_eq!(line.listing.quantity, 3);
        assert_eq!(line.total_value(), 45);

        let inventory = store::inventory_of(ledger.db(), "alice").await?;
        assert_eq!(inventory[0].quantity, 2);
        assert_eq!(listings_of(ledger.db(), "alice").await?, vec![line.clone()]);
        assert_eq!(list_listings(ledger.db()).await?.len(), 1);
        assert!(listings_of(ledger.db(), "bob").await?.is_empty());

        assert!(matches!(
            ledger.list_item("alice", "Cookie", 15, 3).await,
            Err(Error::InsufficientItems {
                owned: 2,
                requested: 3,
                ..
            })
        ));
        assert!(matches!(
            ledger.list_item("alice", "Cookie", 0, 1).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            ledger.list_item("alice", "Yacht", 10, 1).await,
            Err(Error::ItemNotFound { .. })
        ));
        assert_eq!(listings_of(ledger.db(), "alice").await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_then_full_purchase() -> Result<()> {
        let ledger = setup_market().await?;
        let listing = ledger.list_item("alice", "Cookie", 15, 4).await?.listing;

        let bought = ledger.buy_listing("bob", listing.id, Some(1)).await?;
        assert_eq!(bought.cost, 15);
        assert_eq!(bought.remaining, 3);
        assert_eq!(bought.buyer.wallet_balance, 85);
        assert_eq!(bought.seller.wallet_balance, 15);
        assert_eq!(listings_of(ledger.db(), "alice").await?[0].listing.quantity, 3);

        let bought = ledger.buy_listing("bob", listing.id, None).await?;
        assert_eq!(bought.quantity, 3);
        assert_eq!(bought.cost, 45);
        assert_eq!(bought.remaining, 0);
        assert!(listings_of(ledger.db(), "alice").await?.is_empty());

        let inventory = store::inventory_of(ledger.db(), "bob").await?;
        assert_eq!(inventory[0].quantity, 4);
        assert_eq!(ledger.account("alice").await?.wallet_balance, 60);
        assert_eq!(ledger.account("bob").await?.wallet_balance, 40);

        let sales = journal::query(
            ledger.db(),
            &TransactionFilter::for_user("alice").with_kind(TransactionKind::Sale),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(sales.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![15, 45]);
        assert_eq!(sales[0].related_user_id.as_deref(), Some("bob"));

        let purchases = journal::query(
            ledger.db(),
            &TransactionFilter::for_user("bob").with_kind(TransactionKind::Purchase),
            SortOrder::Oldest,
            None,
            0,
        )
        .await?;
        assert_eq!(purchases.len(), 2);
        assert_eq!(purchases[1].amount, -45);
        assert_eq!(purchases[1].related_user_id.as_deref(), Some("alice"));

        assert!(leaderboard::reconcile(ledger.db(), "alice").await?.is_balanced());
        assert!(leaderboard::reconcile(ledger.db(), "bob").await?.is_balanced());

        assert!(matches!(
            ledger.buy_listing("bob", listing.id, None).await,
            Err(Error::ListingNotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_purchases_change_nothing() -> Result<()> {
        let ledger = setup_market().await?;
        let listing = ledger.list_item("alice", "Cookie", 40, 3).await?.listing;
        let entries = journal::count_for_user(ledger.db(), "bob").await?;

        assert!(matches!(
            ledger.buy_listing("alice", listing.id, Some(1)).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            ledger.buy_listing("bob", listing.id, Some(4)).await,
            Err(Error::InsufficientItems {
                owned: 3,
                requested: 4,
                ..
            })
        ));
        assert!(matches!(
            ledger.buy_listing("bob", listing.id, Some(0)).await,
            Err(Error::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            ledger.buy_listing("bob", listing.id, None).await,
            Err(Error::InsufficientFunds {
                available: 100,
                required: 120,
                ..
            })
        ));

        assert_eq!(ledger.account("bob").await?.wallet_balance, 100);
        assert_eq!(ledger.account("alice").await?.wallet_balance, 0);
        assert!(store::inventory_of(ledger.db(), "bob").await?.is_empty());
        assert_eq!(listings_of(ledger.db(), "alice").await?[0].listing.quantity, 3);
        assert_eq!(journal::count_for_user(ledger.db(), "bob").await?, entries);

        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_returns_units() -> Result<()> {
        let ledger = setup_market().await?;
        let listing = ledger.list_item("alice", "Cookie", 15, 5).await?.listing;
        assert!(store::inventory_of(ledger.db(), "alice").await?.is_empty());

        assert!(matches!(
            ledger.cancel_listing("bob", listing.id).await,
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            ledger.cancel_listing("alice", listing.id + 1).await,
            Err(Error::ListingNotFound { .. })
        ));

        let cancelled = ledger.cancel_listing("alice", listing.id).await?;
        assert_eq!(cancelled.owned, 5);
        assert_eq!(cancelled.listing.quantity, 5);
        assert!(listings_of(ledger.db(), "alice").await?.is_empty());
        assert_eq!(store::inventory_of(ledger.db(), "alice").await?[0].quantity, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_removing_item_drops_its_listings() -> Result<()> {
        let ledger = setup_market().await?;
        ledger.list_item("alice", "Cookie", 15, 2).await?;

        store::remove_item(ledger.db(), "Cookie").await?;
        assert!(list_listings(ledger.db()).await?.is_empty());

        Ok(())
    }
}
