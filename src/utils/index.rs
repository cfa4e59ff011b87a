/// Number of decimal places in a bitcoin amount.
pub const BTC_DECIMALS: u32 = 8;

pub fn format_token_amount(amount: u128, decimals: u32) -> String {
    format!(
        "{:.*}",
        decimals as usize,
        amount as f64 / 10f64.powi(decimals as i32)
    )
}

/// Format satoshis as a BTC string, e.g. `0.00150000`.
pub fn format_btc_amount(amount_sat: u64) -> String {
    format_token_amount(amount_sat as u128, BTC_DECIMALS)
}

/// Convert a node-reported BTC value to satoshis, rounding to the nearest satoshi.
pub fn btc_to_sat(value_btc: f64) -> u64 {
    (value_btc * 10f64.powi(BTC_DECIMALS as i32)).round().max(0.0) as u64
}
