/// Database configuration and connection management
pub mod database;

/// Economy tuning loaded from economy.toml and environment overrides
pub mod economy;

/// Bot account IDs from environment variables
pub mod users;
