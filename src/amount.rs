//! Fixed-point amount conversion
//!
//! Balances and transfer values are carried as base-unit integers (Wei for
//! the native coin, token-specific units otherwise) and shown to the user as
//! fixed-point decimal strings. Conversions are exact in both directions:
//! excess fractional digits are rejected, never rounded away.

use primitive_types::U256;

use crate::error::{Result, WalletError};

/// Number of decimal places of the native coin.
pub const COIN_DECIMALS: u32 = 18;

/// Number of decimal places in a "gwei-style" gas price input.
pub const GAS_PRICE_DECIMALS: u32 = 9;

/// Render a base-unit amount as a decimal string.
///
/// Inserts a decimal point `decimals` digits from the right. Never uses
/// scientific notation. Trailing fractional zeros are dropped (they carry no
/// information), so the output is the canonical decimal form of the amount.
pub fn to_decimal(base_units: U256, decimals: u32) -> String {
    let digits = base_units.to_string();
    if decimals == 0 {
        return digits;
    }

    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let split = padded.len() - decimals;
    let (int_part, frac_part) = padded.split_at(split);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Parse a decimal string into a base-unit amount.
///
/// Fails with [`WalletError::PrecisionError`] if the input carries more
/// fractional digits than `decimals`, and [`WalletError::FormatError`] on
/// anything that is not an unsigned decimal number. No rounding ever occurs.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256> {
    let trimmed = amount.trim();

    let format_err = || WalletError::FormatError {
        amount: amount.to_string(),
    };

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(format_err());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(format_err());
    }

    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > decimals as usize {
        return Err(WalletError::PrecisionError {
            amount: amount.to_string(),
            decimals,
        });
    }

    let scale = U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(format_err)?;
    let frac_scale = U256::from(10u64)
        .checked_pow(U256::from(decimals - frac_trimmed.len() as u32))
        .ok_or_else(format_err)?;

    let int_value = if int_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(int_part).map_err(|_| format_err())?
    };
    let frac_value = if frac_trimmed.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(frac_trimmed).map_err(|_| format_err())?
    };

    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value.checked_mul(frac_scale)?))
        .ok_or_else(format_err)
}
