//! Per-symbol outlier rejection, price aggregation, and confidence scoring.
//!
//! Implements the adaptive median-absolute-deviation filter: observations far
//! from the median are dropped before the final price is computed, with the
//! multiplier tightening as sample size grows.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::Utc;
use tracing::warn;

use crate::symbols::CanonicalSymbol;
use crate::types::{AggregatedPrice, RawPriceQuote};

/// `k` multiplier applied to the MAD; `None` means "no filtering".
fn threshold_multiplier(sample_size: usize) -> Option<f64> {
    match sample_size {
        0 | 1 | 2 => None,
        3 => Some(2.5),
        4 | 5 => Some(3.0),
        _ => Some(2.0),
    }
}

/// Aggregates every symbol's observation list independently. A symbol with no
/// observations is simply absent from the input map and therefore absent from
/// the output — callers must not pass empty lists (see `aggregate_one`).
pub fn aggregate_all(
    grouped: HashMap<CanonicalSymbol, Vec<RawPriceQuote>>,
) -> Vec<AggregatedPrice> {
    let mut results = Vec::with_capacity(grouped.len());
    for (symbol, quotes) in grouped {
        if quotes.is_empty() {
            warn!(%symbol, "aggregator received an empty observation list; dropping symbol");
            continue;
        }
        results.push(aggregate_one(symbol, quotes));
    }
    results
}

/// Aggregates one symbol's quotes. Panics are never used here; an
/// already-empty list is the caller's bug, handled by `aggregate_all` instead.
pub fn aggregate_one(symbol: CanonicalSymbol, mut quotes: Vec<RawPriceQuote>) -> AggregatedPrice {
    quotes.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.source.cmp(&b.source)));

    let prices: Vec<f64> = quotes.iter().map(|q| to_f64(&q.price)).collect();
    let median = median_of(&prices);
    let mad = mad_of(&prices, median);

    let retained_indices = select_retained(&prices, median, mad, quotes.len());
    let mut retained: Vec<RawPriceQuote> = retained_indices.iter().map(|&i| quotes[i].clone()).collect();

    if retained.is_empty() {
        warn!(%symbol, "outlier filter emptied the retained set; falling back to raw median");
        retained = quotes.clone();
    }

    retained.sort_by(|a, b| a.source.cmp(&b.source));

    let price = authoritative_price(&retained);
    let confidence = confidence_score(&retained, &price);
    let computed_at = retained
        .iter()
        .map(|q| q.observed_at)
        .max()
        .unwrap_or_else(Utc::now);

    let retained_sources: Vec<String> = retained.iter().map(|q| q.source.clone()).collect();
    let rejected_sources: Vec<String> = quotes
        .iter()
        .filter(|q| !retained_sources.contains(&q.source))
        .map(|q| q.source.clone())
        .collect();

    AggregatedPrice {
        symbol,
        price,
        confidence,
        source_data: retained,
        sources_rejected: rejected_sources,
        computed_at,
    }
}

fn select_retained(prices: &[f64], median: f64, mad: f64, sample_size: usize) -> Vec<usize> {
    let Some(k) = threshold_multiplier(sample_size) else {
        return (0..prices.len()).collect();
    };

    if mad == 0.0 {
        return (0..prices.len()).collect();
    }

    let threshold = k * mad;
    (0..prices.len())
        .filter(|&i| (prices[i] - median).abs() <= threshold)
        .collect()
}

fn authoritative_price(retained: &[RawPriceQuote]) -> BigDecimal {
    let total_volume = retained
        .iter()
        .filter_map(|q| q.volume_24h.clone())
        .filter(|v| *v > BigDecimal::from(0))
        .fold(BigDecimal::from(0), |acc, v| acc + v);

    if total_volume > BigDecimal::from(0) {
        let weighted_sum = retained.iter().fold(BigDecimal::from(0), |acc, q| {
            let volume = q.volume_24h.clone().unwrap_or_else(|| BigDecimal::from(0));
            acc + q.price.clone() * volume
        });
        weighted_sum / total_volume
    } else {
        let sum = retained
            .iter()
            .fold(BigDecimal::from(0), |acc, q| acc + q.price.clone());
        sum / BigDecimal::from(retained.len() as i64)
    }
}

fn confidence_score(retained: &[RawPriceQuote], price: &BigDecimal) -> u8 {
    match retained.len() {
        0 => 0,
        1 => 60,
        2 => 80,
        _ => {
            let cv = coefficient_of_variation(retained, price);
            if cv <= 0.01 {
                100
            } else {
                let penalty = (cv.min(0.05) * 400.0).round() as i32;
                (90 - penalty).clamp(70, 95) as u8
            }
        }
    }
}

fn coefficient_of_variation(retained: &[RawPriceQuote], mean_price: &BigDecimal) -> f64 {
    let mean = to_f64(mean_price);
    if mean == 0.0 {
        return 0.0;
    }
    let values: Vec<f64> = retained.iter().map(|q| to_f64(&q.price)).collect();
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

fn median_of(sorted_prices: &[f64]) -> f64 {
    let len = sorted_prices.len();
    if len % 2 == 1 {
        sorted_prices[len / 2]
    } else {
        (sorted_prices[len / 2 - 1] + sorted_prices[len / 2]) / 2.0
    }
}

fn mad_of(sorted_prices: &[f64], median: f64) -> f64 {
    let mut deviations: Vec<f64> = sorted_prices.iter().map(|p| (p - median).abs()).collect();
    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
    median_of(&deviations)
}

fn to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn quote(source: &str, price: &str, volume: Option<&str>) -> RawPriceQuote {
        RawPriceQuote {
            source: source.to_string(),
            symbol: CanonicalSymbol::new("BTC", "USDT"),
            price: BigDecimal::from_str(price).unwrap(),
            volume_24h: volume.map(|v| BigDecimal::from_str(v).unwrap()),
            observed_at: Utc::now(),
        }
    }

    // S1: three sources agree closely; volume-weighted average applies.
    #[test]
    fn s1_three_sources_agree_closely() {
        let quotes = vec![
            quote("binance", "50000", Some("10")),
            quote("coinbase", "50100", Some("0")),
            quote("okex", "49900", Some("0")),
        ];

        let result = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), quotes);

        assert_eq!(result.source_data.len(), 3);
        assert_eq!(result.price, BigDecimal::from_str("50000").unwrap());
        assert_eq!(result.confidence, 100);
    }

    // S2: one clear outlier is rejected; remaining two average to 50050.
    #[test]
    fn s2_one_outlier_rejected() {
        let quotes = vec![
            quote("binance", "50000", None),
            quote("coinbase", "50100", None),
            quote("okex", "60000", None),
        ];

        let result = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), quotes);

        assert_eq!(result.source_data.len(), 2);
        assert_eq!(result.price, BigDecimal::from_str("50050").unwrap());
        assert_eq!(result.confidence, 80);
        assert_eq!(result.sources_rejected, vec!["okex".to_string()]);
    }

    // S3: a single source is accepted outright with confidence 60.
    #[test]
    fn s3_single_source() {
        let quotes = vec![quote("binance", "50000", None)];
        let result = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), quotes);

        assert_eq!(result.price, BigDecimal::from_str("50000").unwrap());
        assert_eq!(result.confidence, 60);
    }

    // S4 (collector-level NoDataCollected / empty-batch behavior) is exercised
    // in collector.rs and the aggregator's aggregate_all, not here: a symbol
    // with zero observations never reaches aggregate_one.
    #[test]
    fn aggregate_all_drops_symbols_with_no_observations() {
        let mut grouped = HashMap::new();
        grouped.insert(CanonicalSymbol::new("BTC", "USDT"), vec![]);
        let results = aggregate_all(grouped);
        assert!(results.is_empty());
    }

    #[test]
    fn identical_observations_follow_the_exact_confidence_table() {
        let one = aggregate_one(
            CanonicalSymbol::new("BTC", "USDT"),
            vec![quote("binance", "50000", None)],
        );
        assert_eq!(one.confidence, 60);

        let two = aggregate_one(
            CanonicalSymbol::new("BTC", "USDT"),
            vec![quote("binance", "50000", None), quote("coinbase", "50000", None)],
        );
        assert_eq!(two.confidence, 80);

        let three = aggregate_one(
            CanonicalSymbol::new("BTC", "USDT"),
            vec![
                quote("binance", "50000", None),
                quote("coinbase", "50000", None),
                quote("okex", "50000", None),
            ],
        );
        assert_eq!(three.confidence, 100);
    }

    #[test]
    fn aggregated_price_lies_within_retained_range() {
        let quotes = vec![
            quote("binance", "100", None),
            quote("coinbase", "110", None),
            quote("okex", "105", None),
        ];
        let result = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), quotes);
        assert!(result.price >= BigDecimal::from_str("100").unwrap());
        assert!(result.price <= BigDecimal::from_str("110").unwrap());
    }

    #[test]
    fn outlier_filter_is_idempotent_on_already_retained_set() {
        let quotes = vec![
            quote("binance", "50000", None),
            quote("coinbase", "50100", None),
            quote("okex", "60000", None),
        ];
        let first = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), quotes);

        let retained_quotes: Vec<RawPriceQuote> = first
            .source_data
            .iter()
            .map(|q| quote(&q.source, if q.source == "binance" { "50000" } else { "50100" }, None))
            .collect();
        let second = aggregate_one(CanonicalSymbol::new("BTC", "USDT"), retained_quotes);

        assert_eq!(first.price, second.price);
        assert_eq!(first.confidence, second.confidence);
    }
}
