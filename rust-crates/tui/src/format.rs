use alloy::primitives::{
    Address,
    I256,
    U256,
};
use deployments::TokenRecord;

pub const ETHER_DECIMALS: u8 = 18;

fn pow10(exp: usize) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Render a base-unit amount as a decimal with `places` fractional digits,
/// rounding half up.
pub fn format_amount(value: U256, decimals: u8, places: usize) -> String {
    let decimals = usize::from(decimals);
    let (integer, fraction) = if places >= decimals {
        let unit = pow10(decimals);
        let fraction = (value % unit) * pow10(places - decimals);
        (value / unit, fraction)
    } else {
        let step = pow10(decimals - places);
        let rounded = value.saturating_add(step / U256::from(2u64)) / step;
        let unit = pow10(places);
        (rounded / unit, rounded % unit)
    };
    if places == 0 {
        integer.to_string()
    } else {
        format!("{integer}.{:0>places$}", fraction.to_string())
    }
}

pub fn format_signed_amount(value: I256, decimals: u8, places: usize) -> String {
    let magnitude = format_amount(value.unsigned_abs(), decimals, places);
    if value.is_negative() {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

pub fn format_ether(value: U256, places: usize) -> String {
    format_amount(value, ETHER_DECIMALS, places)
}

fn truncate_hex(hex: &str) -> String {
    if hex.len() <= 8 {
        return format!("0x{hex}");
    }
    format!("0x{}...{}", &hex[..4], &hex[hex.len() - 4..])
}

/// `0x1234...abcd`
pub fn truncate_address(address: &Address) -> String {
    truncate_hex(&hex::encode(address.as_slice()))
}

pub fn truncate_hash(hash: &str) -> String {
    truncate_hex(hash.trim_start_matches("0x"))
}

pub fn format_timeout(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds} seconds")
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else if seconds < 86_400 {
        format!("{} hours", seconds / 3600)
    } else {
        format!("{} days", seconds / 86_400)
    }
}

pub fn token_symbol(token: &Address, supported: &[TokenRecord]) -> String {
    supported
        .iter()
        .find(|record| {
            record
                .address
                .parse::<Address>()
                .is_ok_and(|address| address == *token)
        })
        .map(|record| record.symbol.clone())
        .unwrap_or_else(|| truncate_address(token))
}

pub fn token_decimals(token: &Address, supported: &[TokenRecord]) -> u8 {
    supported
        .iter()
        .find(|record| {
            record
                .address
                .parse::<Address>()
                .is_ok_and(|address| address == *token)
        })
        .map(|record| record.decimals)
        .unwrap_or(ETHER_DECIMALS)
}
