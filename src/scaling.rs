//! Conversion between decimal prices and the on-chain 10^8-scaled integer.

use bigdecimal::{BigDecimal, ToPrimitive};
use tracing::warn;

use crate::constants::{MAX_SAFE_SCALED_PRICE, PRICE_SCALE_FACTOR};
use crate::symbols::CanonicalSymbol;

/// Scales a decimal price to the on-chain integer representation, clamping
/// (with a warning) rather than overflowing, and returning `None` for
/// non-positive prices so the caller can skip them entirely.
pub fn scale_price(symbol: &CanonicalSymbol, price: &BigDecimal) -> Option<i64> {
    if *price <= BigDecimal::from(0) {
        warn!(%symbol, %price, "skipping non-positive price");
        return None;
    }

    let scaled = (price * BigDecimal::from(PRICE_SCALE_FACTOR)).round(0);
    let Some(scaled_i64) = scaled.to_i64() else {
        warn!(%symbol, %price, "price scaling overflowed i64; clamping to MAX_SAFE_SCALED_PRICE");
        return Some(MAX_SAFE_SCALED_PRICE);
    };

    if scaled_i64 > MAX_SAFE_SCALED_PRICE {
        warn!(
            %symbol,
            %price,
            clamped_to = MAX_SAFE_SCALED_PRICE,
            "price exceeded MAX_SAFE_SCALED_PRICE; clamping"
        );
        Some(MAX_SAFE_SCALED_PRICE)
    } else {
        Some(scaled_i64)
    }
}

/// Inverse of [`scale_price`], used by tests and by operator tooling that
/// needs to display a scaled on-chain value as a decimal.
pub fn descale_price(scaled: i64) -> BigDecimal {
    BigDecimal::from(scaled) / BigDecimal::from(PRICE_SCALE_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scale_then_descale_round_trips_for_typical_prices() {
        let symbol = CanonicalSymbol::new("BTC", "USDT");
        let price = BigDecimal::from_str("50123.45678901").unwrap();
        let scaled = scale_price(&symbol, &price).unwrap();
        let descaled = descale_price(scaled);
        assert_eq!(descaled, price);
    }

    // S5: an absurdly large price clamps to MAX_SAFE_SCALED_PRICE.
    #[test]
    fn s5_overflowing_price_clamps_to_max_safe() {
        let symbol = CanonicalSymbol::new("BTC", "USDT");
        let price = BigDecimal::from_str("100000000000000").unwrap(); // 1e14
        let scaled = scale_price(&symbol, &price).unwrap();
        assert_eq!(scaled, MAX_SAFE_SCALED_PRICE);
    }

    #[test]
    fn non_positive_price_is_skipped() {
        let symbol = CanonicalSymbol::new("BTC", "USDT");
        assert!(scale_price(&symbol, &BigDecimal::from(0)).is_none());
        assert!(scale_price(&symbol, &BigDecimal::from(-5)).is_none());
    }
}
