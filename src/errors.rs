//! Unified error type for the ledger.
//!
//! Business-rule failures (insufficient funds, cooldowns, investment state
//! violations) are ordinary variants carrying the numbers a chat layer needs to
//! render a message. `Database` is the only variant that represents an
//! unexpected fault.

use crate::core::cooldown::CooldownAction;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

/// Which balance bucket a debit was attempted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Spendable funds
    Wallet,
    /// Protected, interest-bearing funds
    Bank,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wallet => write!(f, "wallet"),
            Self::Bank => write!(f, "bank"),
        }
    }
}

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A debit would drive a balance negative.
    #[error("Insufficient funds in {bucket}: available {available}, required {required}")]
    InsufficientFunds {
        /// Bucket that was debited
        bucket: Bucket,
        /// Balance at the time of the attempt
        available: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// Amount is zero, negative, or outside a configured bound.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// An inclusive range with `min > max`.
    #[error("Invalid range: {min}..={max}")]
    InvalidRange {
        /// Lower bound
        min: i64,
        /// Upper bound
        max: i64,
    },

    /// A rate, probability or multiplier that is not finite or out of bounds.
    #[error("Invalid rate: {rate}")]
    InvalidRate {
        /// The rejected value
        rate: f64,
    },

    /// The action was attempted before its interval elapsed.
    #[error("{action} is on cooldown for another {}s", .remaining.num_seconds())]
    OnCooldown {
        /// The gated action
        action: CooldownAction,
        /// Time left until the action is available again
        remaining: Duration,
    },

    /// Transfer to self, to a bot account, or to an unusable identifier.
    #[error("Invalid target: {reason}")]
    InvalidTarget {
        /// Why the target was rejected
        reason: String,
    },

    /// The user already holds an active investment.
    #[error("An investment is already active until {matures_at}")]
    AlreadyInvested {
        /// Maturity of the existing investment
        matures_at: DateTime<Utc>,
    },

    /// Settlement requested without an active investment.
    #[error("No active investment")]
    NoActiveInvestment,

    /// Settlement requested before maturity.
    #[error("Investment matures at {matures_at}")]
    NotMatured {
        /// When the investment becomes eligible
        matures_at: DateTime<Utc>,
        /// Time left until maturity
        remaining: Duration,
    },

    /// No store item with that name.
    #[error("Item not found: {name}")]
    ItemNotFound {
        /// Name that was looked up
        name: String,
    },

    /// A store item definition was rejected (empty name, duplicate, bad price).
    #[error("Invalid store item: {reason}")]
    InvalidItem {
        /// Why the item was rejected
        reason: String,
    },

    /// No investment profile with that name.
    #[error("Unknown investment profile: {name}")]
    UnknownProfile {
        /// Name that was looked up
        name: String,
    },

    /// Selling more items than owned.
    #[error("Only {owned} x {item} owned, {requested} requested")]
    InsufficientItems {
        /// Item name
        item: String,
        /// Quantity in the inventory
        owned: i64,
        /// Quantity the caller tried to sell
        requested: i64,
    },

    /// User-supplied choice (coin side, dice range, sort key...) that is not recognized.
    #[error("Unknown {kind}: '{value}'")]
    InvalidChoice {
        /// What was being chosen, e.g. `"coin side"`
        kind: &'static str,
        /// The rejected input
        value: String,
    },

    /// No marketplace listing with that id.
    #[error("Listing #{id} not found")]
    ListingNotFound {
        /// Listing that was looked up
        id: i64,
    },

    /// Storage failure. The enclosing database transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    #[error("I/O error: {0}")]
    #[allow(missing_docs)]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    #[allow(missing_docs)]
    EnvVar(#[from] std::env::VarError),

    /// Failure creating or running scheduled jobs.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

impl Error {
    /// Returns true for expected, user-facing outcomes as opposed to faults.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Config { .. }
                | Self::Io(_)
                | Self::EnvVar(_)
                | Self::Scheduler(_)
        )
    }

    /// How much more money the failed debit needed, if this is `InsufficientFunds`.
    #[must_use]
    pub const fn shortfall(&self) -> Option<i64> {
        match self {
            Self::InsufficientFunds {
                available,
                required,
                ..
            } => Some(*required - *available),
            _ => None,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
