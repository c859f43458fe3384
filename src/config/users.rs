//! Bot account configuration loaded from environment variables.
//!
//! Accounts listed in `BOT_USER_IDS` (comma separated) are flagged as bots at
//! startup so they can never receive transfers.

use crate::errors::Result;
use std::env::{self, VarError};

/// Parses a comma-separated list of user IDs, skipping blanks and duplicates.
#[must_use]
pub fn parse_user_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Gets the user IDs configured as bot accounts via `BOT_USER_IDS`.
///
/// # Returns
///
/// The configured IDs, or an empty list when the variable is unset.
///
/// # Errors
/// `EnvVar` if the variable is set but not valid unicode.
pub fn get_bot_user_ids() -> Result<Vec<String>> {
    match env::var("BOT_USER_IDS") {
        Ok(raw) => Ok(parse_user_ids(&raw)),
        Err(VarError::NotPresent) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_ids_trims_and_dedupes() {
        let ids = parse_user_ids(" 123, 456 ,,123,789 ");
        assert_eq!(ids, vec!["123", "456", "789"]);
    }

    #[test]
    fn test_parse_user_ids_empty() {
        assert!(parse_user_ids("").is_empty());
        assert!(parse_user_ids(" , ").is_empty());
    }
}
