//! Integration test for the collect -> aggregate -> scale -> partition chain,
//! using in-memory observations rather than live network adapters.

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::Utc;
use neo_price_feed_core::aggregator::aggregate_all;
use neo_price_feed_core::scaling::scale_price;
use neo_price_feed_core::submitter::partition;
use neo_price_feed_core::symbols::CanonicalSymbol;
use neo_price_feed_core::types::RawPriceQuote;

fn quote(symbol: &str, source: &str, price: &str, volume: Option<&str>) -> RawPriceQuote {
    RawPriceQuote {
        source: source.to_string(),
        symbol: CanonicalSymbol::new(symbol, "USDT"),
        price: BigDecimal::from_str(price).unwrap(),
        volume_24h: volume.map(|v| BigDecimal::from_str(v).unwrap()),
        observed_at: Utc::now(),
    }
}

#[test]
fn full_pipeline_from_raw_quotes_to_scaled_sub_batches() {
    let mut grouped: HashMap<CanonicalSymbol, Vec<RawPriceQuote>> = HashMap::new();

    grouped.insert(
        CanonicalSymbol::new("BTC", "USDT"),
        vec![
            quote("BTC", "binance", "50000", Some("10")),
            quote("BTC", "coinbase", "50100", None),
            quote("BTC", "okex", "49900", None),
        ],
    );
    grouped.insert(
        CanonicalSymbol::new("ETH", "USDT"),
        vec![quote("ETH", "binance", "3000", None)],
    );

    let aggregated = aggregate_all(grouped);
    assert_eq!(aggregated.len(), 2);

    for price in &aggregated {
        let scaled = scale_price(&price.symbol, &price.price);
        assert!(scaled.is_some());
    }

    let sub_batches = partition(aggregated, 50);
    assert_eq!(sub_batches.len(), 1);
    assert_eq!(sub_batches[0].prices.len(), 2);
}

// S4: an empty observation map yields no aggregated prices at all.
#[test]
fn s4_empty_input_yields_no_aggregated_prices() {
    let grouped: HashMap<CanonicalSymbol, Vec<RawPriceQuote>> = HashMap::new();
    let aggregated = aggregate_all(grouped);
    assert!(aggregated.is_empty());
}

#[test]
fn batch_partitioning_never_exceeds_configured_size() {
    let mut grouped: HashMap<CanonicalSymbol, Vec<RawPriceQuote>> = HashMap::new();
    for i in 0..7 {
        let symbol = format!("SYM{i}");
        grouped.insert(
            CanonicalSymbol::new(&symbol, "USDT"),
            vec![quote(&symbol, "binance", "100", None)],
        );
    }

    let aggregated = aggregate_all(grouped);
    let sub_batches = partition(aggregated, 3);

    assert!(sub_batches.iter().all(|b| b.prices.len() <= 3));
    assert_eq!(sub_batches.iter().map(|b| b.prices.len()).sum::<usize>(), 7);
}
