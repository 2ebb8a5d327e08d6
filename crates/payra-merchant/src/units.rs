//! Conversions between human token amounts and base units.
//!
//! Both directions work on decimal strings and [`U256`] so no precision is
//! lost to floating point.

use alloy::primitives::U256;

use crate::PayraError;

/// Fractional digits used by [`from_wei`] callers that do not pick one.
pub const DEFAULT_DISPLAY_PRECISION: u8 = 2;

fn pow10(exp: u8) -> Result<U256, PayraError> {
    U256::from(10u64)
        .checked_pow(U256::from(exp))
        .ok_or_else(|| PayraError::AbiError(format!("10^{exp} does not fit in uint256")))
}

/// Scale a decimal amount such as `"12.5"` by `10^decimals`.
///
/// Fractional digits beyond `decimals` are truncated. Negative, empty and
/// non-numeric inputs are rejected.
pub fn to_wei(amount: &str, decimals: u8) -> Result<U256, PayraError> {
    let amount = amount.trim();
    let invalid = || PayraError::AbiError(format!("invalid token amount: {amount:?}"));
    if amount.starts_with('-') {
        return Err(PayraError::AbiError(format!(
            "negative amount {amount} cannot be converted"
        )));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    let keep = fraction.len().min(decimals as usize);
    digits.push_str(&fraction[..keep]);
    digits.extend(std::iter::repeat('0').take(decimals as usize - keep));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10)
        .map_err(|_| PayraError::AbiError(format!("amount {amount} overflows uint256")))
}

/// Render base units as a fixed-point string with `precision` fractional
/// digits, rounding half up.
pub fn from_wei(amount_wei: U256, decimals: u8, precision: u8) -> Result<String, PayraError> {
    let (scaled, frac_digits) = if precision >= decimals {
        let shifted = amount_wei
            .checked_mul(pow10(precision - decimals)?)
            .ok_or_else(|| PayraError::AbiError("amount overflows uint256".to_string()))?;
        (shifted, precision)
    } else {
        let step = pow10(decimals - precision)?;
        let half = step / U256::from(2u64);
        let mut rounded = amount_wei / step;
        if amount_wei % step >= step - half {
            // step >= 10, so the quotient is far below U256::MAX.
            rounded += U256::from(1u64);
        }
        (rounded, precision)
    };

    if frac_digits == 0 {
        return Ok(scaled.to_string());
    }
    let unit = pow10(frac_digits)?;
    let whole = scaled / unit;
    let fraction = scaled % unit;
    Ok(format!(
        "{whole}.{:0>width$}",
        fraction.to_string(),
        width = frac_digits as usize
    ))
}
