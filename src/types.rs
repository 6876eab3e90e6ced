//! Shared value types passed between the collector, aggregator, and submitter.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::symbols::CanonicalSymbol;

/// A single price observation from one source, before aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPriceQuote {
    pub source: String,
    pub symbol: CanonicalSymbol,
    pub price: BigDecimal,
    pub volume_24h: Option<BigDecimal>,
    pub observed_at: DateTime<Utc>,
}

/// The aggregator's output for one symbol: a single price with a confidence
/// score and the full provenance of the observations that were retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: CanonicalSymbol,
    pub price: BigDecimal,
    pub confidence: u8,
    pub source_data: Vec<RawPriceQuote>,
    pub sources_rejected: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl AggregatedPrice {
    pub fn sample_size(&self) -> usize {
        self.source_data.len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.source_data.iter().map(|q| q.source.clone()).collect()
    }
}

/// An `AggregatedPrice` scaled to the on-chain fixed-point integer
/// representation (10^8 units), ready to be packed into a batch script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaledPrice {
    pub symbol: CanonicalSymbol,
    pub scaled_value: i64,
    pub confidence: u8,
}
