//! Form-level input validation
//!
//! Client-side checks run before any state mutation. Failures are
//! typed errors the caller surfaces to the user; nothing here panics.

use crate::{Error, Result};

/// Phone numbers need a leading country code and 7-15 subscriber digits
pub fn phone(value: &str) -> Result<()> {
    let trimmed = value.trim();
    if !trimmed.starts_with('+') {
        return Err(Error::Validation(
            "Please enter a valid phone number including country code.".to_string(),
        ));
    }
    let ok_chars = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '(' | ')' | '-'));
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    // 1-3 digit country code plus a 7-15 digit number
    if !ok_chars || !(8..=18).contains(&digits) {
        return Err(Error::Validation(
            "Please enter a valid phone number.".to_string(),
        ));
    }
    Ok(())
}

/// Amounts must be positive and finite
pub fn amount(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Validation(
            "Amount must be a positive number.".to_string(),
        ));
    }
    Ok(())
}

/// Wallet addresses are 0x-prefixed 40-hex-char strings
pub fn wallet_address(value: &str) -> Result<()> {
    let hex = value.strip_prefix("0x").unwrap_or("");
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Validation(
            "Please enter a valid Ethereum wallet address.".to_string(),
        ));
    }
    Ok(())
}
