//! Economy tuning loaded from `economy.toml` and the environment.
//!
//! Every value has a default matching the live bot, so the file is optional.
//! Environment variables (usually from `.env`) override the file. The store
//! catalog seeded on first start is also declared here as `[[store_items]]`.

use crate::core::random::AmountRange;
use crate::errors::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::{path::Path, str::FromStr};
use tracing::{debug, info};

/// A named risk/return profile for investments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvestmentProfile {
    /// Lookup key, e.g. `"conservative"`
    pub name: String,
    /// Shortest maturity in days
    pub min_days: i64,
    /// Longest maturity in days
    pub max_days: i64,
    /// Lowest payout multiplier
    pub min_return: f64,
    /// Highest payout multiplier
    pub max_return: f64,
    /// Probability that the position fails at settlement
    pub risk: f64,
}

/// A store item created when the store table is empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreItemConfig {
    /// Display name
    pub name: String,
    /// Price in coins
    pub price: i64,
    /// Emoji shown next to the name
    #[serde(default)]
    pub emoji: String,
}

/// All tunable economy parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Smallest `work` payout
    pub earn_min: i64,
    /// Largest `work` payout
    pub earn_max: i64,
    /// Seconds between `work` uses
    pub earn_cooldown_secs: i64,
    /// Smallest daily bonus
    pub daily_bonus_min: i64,
    /// Largest daily bonus
    pub daily_bonus_max: i64,
    /// Smallest weekly bonus
    pub weekly_bonus_min: i64,
    /// Largest weekly bonus
    pub weekly_bonus_max: i64,
    /// Probability that a crime succeeds
    pub crime_success_rate: f64,
    /// Smallest crime reward
    pub crime_reward_min: i64,
    /// Largest crime reward
    pub crime_reward_max: i64,
    /// Smallest crime fine
    pub crime_fine_min: i64,
    /// Largest crime fine
    pub crime_fine_max: i64,
    /// Seconds between crime attempts
    pub crime_cooldown_secs: i64,
    /// Daily bank interest rate
    pub bank_interest_rate: f64,
    /// Smallest investment principal
    pub investment_min_amount: i64,
    /// Largest investment principal
    pub investment_max_amount: i64,
    /// Available investment profiles
    pub investment_profiles: Vec<InvestmentProfile>,
    /// Cron expression for the daily interest job
    pub interest_cron: String,
    /// Cron expression for the investment settlement job
    pub settlement_cron: String,
    /// Items seeded into an empty store
    pub store_items: Vec<StoreItemConfig>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            earn_min: 1,
            earn_max: 50,
            earn_cooldown_secs: 300,
            daily_bonus_min: 50,
            daily_bonus_max: 100,
            weekly_bonus_min: 200,
            weekly_bonus_max: 500,
            crime_success_rate: 0.75,
            crime_reward_min: 25,
            crime_reward_max: 150,
            crime_fine_min: 10,
            crime_fine_max: 75,
            crime_cooldown_secs: 600,
            bank_interest_rate: 0.02,
            investment_min_amount: 100,
            investment_max_amount: 10_000,
            investment_profiles: default_profiles(),
            interest_cron: "0 0 0 * * *".to_string(),
            settlement_cron: "0 */5 * * * *".to_string(),
            store_items: vec![
                StoreItemConfig {
                    name: "Cookie".to_string(),
                    price: 10,
                    emoji: "🍪".to_string(),
                },
                StoreItemConfig {
                    name: "Coffee".to_string(),
                    price: 25,
                    emoji: "☕".to_string(),
                },
                StoreItemConfig {
                    name: "Trophy".to_string(),
                    price: 100,
                    emoji: "🏆".to_string(),
                },
            ],
        }
    }
}

fn default_profiles() -> Vec<InvestmentProfile> {
    vec![
        InvestmentProfile {
            name: "conservative".to_string(),
            min_days: 1,
            max_days: 3,
            min_return: 1.05,
            max_return: 1.15,
            risk: 0.1,
        },
        InvestmentProfile {
            name: "balanced".to_string(),
            min_days: 2,
            max_days: 5,
            min_return: 0.8,
            max_return: 1.8,
            risk: 0.25,
        },
        InvestmentProfile {
            name: "aggressive".to_string(),
            min_days: 3,
            max_days: 7,
            min_return: 0.5,
            max_return: 3.0,
            risk: 0.4,
        },
    ]
}

impl EconomyConfig {
    /// Range for `work` payouts.
    #[must_use]
    pub const fn earn_range(&self) -> AmountRange {
        AmountRange::new_unchecked(self.earn_min, self.earn_max)
    }

    /// Range for the daily bonus.
    #[must_use]
    pub const fn daily_range(&self) -> AmountRange {
        AmountRange::new_unchecked(self.daily_bonus_min, self.daily_bonus_max)
    }

    /// Range for the weekly bonus.
    #[must_use]
    pub const fn weekly_range(&self) -> AmountRange {
        AmountRange::new_unchecked(self.weekly_bonus_min, self.weekly_bonus_max)
    }

    /// Range for crime rewards.
    #[must_use]
    pub const fn crime_reward_range(&self) -> AmountRange {
        AmountRange::new_unchecked(self.crime_reward_min, self.crime_reward_max)
    }

    /// Range for crime fines.
    #[must_use]
    pub const fn crime_fine_range(&self) -> AmountRange {
        AmountRange::new_unchecked(self.crime_fine_min, self.crime_fine_max)
    }

    /// Interval between `work` uses.
    #[must_use]
    pub fn earn_cooldown(&self) -> Duration {
        Duration::seconds(self.earn_cooldown_secs)
    }

    /// Interval between crime attempts.
    #[must_use]
    pub fn crime_cooldown(&self) -> Duration {
        Duration::seconds(self.crime_cooldown_secs)
    }

    /// Looks up an investment profile by name, case-insensitively.
    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&InvestmentProfile> {
        self.investment_profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Applies overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "EARN_MIN", &mut self.earn_min)?;
        override_value(&lookup, "EARN_MAX", &mut self.earn_max)?;
        override_value(&lookup, "EARN_COOLDOWN_SECS", &mut self.earn_cooldown_secs)?;
        override_value(&lookup, "DAILY_BONUS_MIN", &mut self.daily_bonus_min)?;
        override_value(&lookup, "DAILY_BONUS_MAX", &mut self.daily_bonus_max)?;
        override_value(&lookup, "WEEKLY_BONUS_MIN", &mut self.weekly_bonus_min)?;
        override_value(&lookup, "WEEKLY_BONUS_MAX", &mut self.weekly_bonus_max)?;
        override_value(&lookup, "CRIME_SUCCESS_RATE", &mut self.crime_success_rate)?;
        override_value(&lookup, "CRIME_REWARD_MIN", &mut self.crime_reward_min)?;
        override_value(&lookup, "CRIME_REWARD_MAX", &mut self.crime_reward_max)?;
        override_value(&lookup, "CRIME_FINE_MIN", &mut self.crime_fine_min)?;
        override_value(&lookup, "CRIME_FINE_MAX", &mut self.crime_fine_max)?;
        override_value(&lookup, "CRIME_COOLDOWN_SECS", &mut self.crime_cooldown_secs)?;
        override_value(&lookup, "BANK_INTEREST_RATE", &mut self.bank_interest_rate)?;
        override_value(&lookup, "INVESTMENT_MIN_AMOUNT", &mut self.investment_min_amount)?;
        override_value(&lookup, "INVESTMENT_MAX_AMOUNT", &mut self.investment_max_amount)?;
        override_value(&lookup, "INTEREST_CRON", &mut self.interest_cron)?;
        override_value(&lookup, "SETTLEMENT_CRON", &mut self.settlement_cron)?;
        Ok(())
    }

    /// Checks that ranges are ordered and rates are probabilities.
    pub fn validate(&self) -> Result<()> {
        ensure_ordered("EARN", self.earn_min, self.earn_max)?;
        ensure_ordered("DAILY_BONUS", self.daily_bonus_min, self.daily_bonus_max)?;
        ensure_ordered("WEEKLY_BONUS", self.weekly_bonus_min, self.weekly_bonus_max)?;
        ensure_ordered("CRIME_REWARD", self.crime_reward_min, self.crime_reward_max)?;
        ensure_ordered("CRIME_FINE", self.crime_fine_min, self.crime_fine_max)?;
        ensure_ordered(
            "INVESTMENT_AMOUNT",
            self.investment_min_amount,
            self.investment_max_amount,
        )?;
        ensure_probability("CRIME_SUCCESS_RATE", self.crime_success_rate)?;
        ensure_probability("BANK_INTEREST_RATE", self.bank_interest_rate)?;

        if self.earn_min < 0 || self.crime_fine_min < 0 || self.investment_min_amount <= 0 {
            return Err(config_error("amount bounds must be positive"));
        }
        if self.earn_cooldown_secs < 0 || self.crime_cooldown_secs < 0 {
            return Err(config_error("cooldowns must not be negative"));
        }

        for profile in &self.investment_profiles {
            if profile.min_days < 0 || profile.min_days > profile.max_days {
                return Err(config_error(&format!(
                    "investment profile '{}' has an invalid day range",
                    profile.name
                )));
            }
            if !(profile.min_return.is_finite() && profile.max_return.is_finite())
                || profile.min_return < 0.0
                || profile.min_return > profile.max_return
            {
                return Err(config_error(&format!(
                    "investment profile '{}' has an invalid return range",
                    profile.name
                )));
            }
            ensure_probability(&format!("{} risk", profile.name), profile.risk)?;
        }

        if self.store_items.iter().any(|item| item.price <= 0) {
            return Err(config_error("store item prices must be positive"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

fn ensure_ordered(name: &str, min: i64, max: i64) -> Result<()> {
    if min >= max {
        return Err(config_error(&format!(
            "{name}_MIN must be less than {name}_MAX ({min} >= {max})"
        )));
    }
    Ok(())
}

fn ensure_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error(&format!(
            "{name} must be between 0 and 1, got {value}"
        )));
    }
    Ok(())
}

fn override_value<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| config_error(&format!("Failed to parse {key}={raw}: {e}")))?;
        debug!("Economy setting {} overridden from environment", key);
    }
    Ok(())
}

/// Parses economy settings from TOML text. Missing keys keep their defaults.
pub fn parse_economy_config(contents: &str) -> Result<EconomyConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse economy config: {e}"),
    })
}

/// Loads economy settings: the TOML file if it exists, then environment overrides,
/// then validation.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read or parsed
/// - An environment override does not parse
/// - The resulting settings are inconsistent
pub fn load_economy_config<P: AsRef<Path>>(path: P) -> Result<EconomyConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read config file {}: {e}", path.display()),
        })?;
        parse_economy_config(&contents)?
    } else {
        info!("{} not found, using default economy settings", path.display());
        EconomyConfig::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Loads economy settings from the default location (`./economy.toml`).
pub fn load_default_economy_config() -> Result<EconomyConfig> {
    load_economy_config("economy.toml")
}
