//! Core module - Framework-agnostic economy logic.
//! The account store, cooldown tracker and journal are the leaves; the ledger
//! engine composes them and is the only place balances are mutated. Investments,
//! interest, the store, the player market and games extend the engine with
//! further `impl Ledger` blocks.

pub mod accounts;
pub mod clock;
pub mod cooldown;
pub mod games;
pub mod interest;
pub mod investment;
pub mod journal;
pub mod leaderboard;
pub mod ledger;
pub mod market;
pub mod random;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::Ledger;
