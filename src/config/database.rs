//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models
//! without hand-written SQL.

use crate::entities::{
    Account, Inventory, Investment, MarketListing, StoreItem, SystemState, Transaction,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema, sea_query::Index};
use std::path::Path;
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/coin_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// File path of an `SQLite` URL, `None` for in-memory databases and other backends.
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

/// Establishes a connection to the database named by [`get_database_url`], creating
/// the parent directory of an `SQLite` file if needed.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(parent) = sqlite_file_path(&database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables (if missing) using `SeaORM`'s schema generation from entity
/// definitions, plus the secondary indexes the journal and investment queries use.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Account),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(Investment),
        schema.create_table_from_entity(StoreItem),
        schema.create_table_from_entity(Inventory),
        schema.create_table_from_entity(MarketListing),
        schema.create_table_from_entity(SystemState),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    let indexes = [
        Index::create()
            .if_not_exists()
            .name("idx_transactions_user_id")
            .table(Transaction)
            .col(crate::entities::TransactionColumn::UserId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_created_at")
            .table(Transaction)
            .col(crate::entities::TransactionColumn::CreatedAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_investments_user_status")
            .table(Investment)
            .col(crate::entities::InvestmentColumn::UserId)
            .col(crate::entities::InvestmentColumn::Status)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_market_listings_seller_id")
            .table(MarketListing)
            .col(crate::entities::MarketListingColumn::SellerId)
            .to_owned(),
    ];
    for index in &indexes {
        db.execute(builder.build(index)).await?;
    }

    info!("Database tables ensured");
    Ok(())
}
