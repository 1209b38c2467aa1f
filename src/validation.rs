//! # Input Validation Module
//!
//! Validation helpers shared by the conversation handlers and the webhook
//! server: Telegram identifier format checks and budget parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Telegram user IDs are 7-15 digit numbers
    static ref TELEGRAM_ID_PATTERN: Regex =
        Regex::new(r"^[0-9]{7,15}$").expect("Telegram id pattern should be valid");
}

/// Check that a Telegram ID string is in the expected 7-15 digit format.
pub fn is_valid_telegram_id(telegram_id: &str) -> bool {
    TELEGRAM_ID_PATTERN.is_match(telegram_id)
}

/// Parse a budget amount from user input.
///
/// Accepts plain numbers ("500", "500.00"), a comma decimal separator
/// ("500,00"), a dollar sign ("$500"), and combinations of those. Returns
/// `None` for anything that does not parse to a number >= 0.
pub fn parse_cost(text: &str) -> Option<f64> {
    let normalized = text.replace(',', ".").replace('$', "");
    let cost = normalized.trim().parse::<f64>().ok()?;
    if cost >= 0.0 {
        Some(cost)
    } else {
        None
    }
}
