// src/units.rs
//! Fixed-point reward amounts and token-id parsing
//!
//! Reward values are kept as `U256` with 18 implied decimals the whole way
//! through; they only become decimal strings here, at render time.

use alloy_primitives::U256;

use crate::error::{Result, StakingError};

/// Decimals used by the reward token
pub const REWARD_DECIMALS: u8 = 18;

/// Fractional digits shown on the dashboard
pub const DISPLAY_DECIMALS: u8 = 6;

fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

fn split(value: U256, decimals: u8) -> (U256, String) {
    let base = scale(decimals);
    let whole = value / base;
    let frac = value % base;
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    (whole, frac)
}

/// Exact decimal rendering with trailing zeros trimmed, e.g. `1.25`
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let (whole, frac) = split(value, decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

/// Decimal rendering with exactly `shown` fractional digits, truncated (never rounded up)
pub fn format_fixed(value: U256, decimals: u8, shown: u8) -> String {
    if shown == 0 || decimals == 0 {
        let (whole, _) = split(value, decimals);
        return whole.to_string();
    }
    let (whole, frac) = split(value, decimals);
    let mut frac: String = frac.chars().take(shown as usize).collect();
    while frac.len() < shown as usize {
        frac.push('0');
    }
    format!("{}.{}", whole, frac)
}

/// Parse a `0x` hex or decimal string into a `U256`
pub fn parse_u256(raw: &str) -> Result<U256> {
    let s = raw.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_digits) if !hex_digits.is_empty() => U256::from_str_radix(hex_digits, 16),
        Some(_) => return Err(StakingError::Decode(format!("Empty hex number: {:?}", raw))),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|e| StakingError::Decode(format!("Invalid number {:?}: {}", raw, e)))
}

/// Narrow a `U256` to `u64`, failing instead of truncating
pub fn u256_to_u64(value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(StakingError::Decode(format!("{} does not fit in u64", value)));
    }
    Ok(value.as_limbs()[0])
}

/// Token ids arrive hex-encoded from the index and as words from the chain
pub fn parse_token_id(raw: &str) -> Result<u64> {
    u256_to_u64(parse_u256(raw)?)
}
