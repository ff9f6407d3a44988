//! Display formatting and input parsing helpers
//!
//! Pure functions shared by the page views and the CLI.

use alloy_primitives::{
    utils::{format_ether as format_ether_full, parse_ether},
    Address, U256,
};

use crate::error::{Error, Result};

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Shorten an address to `0x1234...abcd` (checksummed)
pub fn format_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Render a remaining-time value in seconds
///
/// Shows the two most significant units, or `Expired` at zero.
pub fn format_time(seconds: u64) -> String {
    if seconds == 0 {
        return "Expired".to_string();
    }

    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Render a wei amount as ether without trailing zeros
pub fn format_ether(wei: U256) -> String {
    let full = format_ether_full(wei);
    match full.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => full,
    }
}

/// Parse a duration in (possibly fractional) days into whole seconds
pub fn parse_duration_days(input: &str) -> Result<u64> {
    let invalid = || Error::Validation("Please enter a valid duration in days".to_string());

    let days: f64 = input.trim().parse().map_err(|_| invalid())?;
    if !days.is_finite() || days <= 0.0 {
        return Err(invalid());
    }

    let seconds = (days * SECONDS_PER_DAY as f64).floor();
    if seconds < 1.0 || seconds >= u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(seconds as u64)
}

/// Parse an optional funding amount in ether into wei
///
/// Empty, zero, negative or non-numeric input means "no funding".
pub fn parse_funding(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    let positive = trimmed
        .parse::<f64>()
        .map(|v| v.is_finite() && v > 0.0)
        .unwrap_or(false);
    if !positive {
        return Ok(U256::ZERO);
    }

    parse_ether(trimmed)
        .map_err(|e| Error::Validation(format!("Invalid funding amount {}: {}", trimmed, e)))
}

/// Parse a required positive ether amount into wei
pub fn parse_amount(input: &str) -> Result<U256> {
    let wei = parse_funding(input)?;
    if wei.is_zero() {
        return Err(Error::Validation(format!(
            "Amount must be a positive number of ETH, got '{}'",
            input.trim()
        )));
    }
    Ok(wei)
}
