//! Canonical trading-pair symbols and per-source mapping tables.
//!
//! Every source adapter speaks its own symbol dialect (`BTCUSDT`, `BTC-USD`,
//! `bitcoin`, ...). Adapters translate to and from this canonical form so the
//! collector and aggregator never see a source-specific string.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalSymbol(String);

impl CanonicalSymbol {
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!("{}/{}", base.to_uppercase(), quote.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps canonical symbols to a source's native symbol string, and back.
#[derive(Debug, Clone, Default)]
pub struct SymbolMapping {
    to_native: HashMap<CanonicalSymbol, String>,
    from_native: HashMap<String, CanonicalSymbol>,
}

impl SymbolMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canonical: CanonicalSymbol, native: impl Into<String>) {
        let native = native.into();
        self.from_native.insert(native.clone(), canonical.clone());
        self.to_native.insert(canonical, native);
    }

    pub fn native_symbol(&self, canonical: &CanonicalSymbol) -> Option<&str> {
        self.to_native.get(canonical).map(String::as_str)
    }

    pub fn canonical_symbol(&self, native: &str) -> Option<&CanonicalSymbol> {
        self.from_native.get(native)
    }

    pub fn supported_symbols(&self) -> Vec<CanonicalSymbol> {
        let mut symbols: Vec<_> = self.to_native.keys().cloned().collect();
        symbols.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        symbols
    }
}

/// The default set of canonical pairs this oracle ships mappings for. Source
/// adapters load their own subset from this list based on what each exchange
/// actually lists.
pub fn default_canonical_symbols() -> Vec<CanonicalSymbol> {
    [
        ("BTC", "USDT"),
        ("ETH", "USDT"),
        ("NEO", "USDT"),
        ("GAS", "USDT"),
        ("BNB", "USDT"),
        ("SOL", "USDT"),
    ]
    .into_iter()
    .map(|(base, quote)| CanonicalSymbol::new(base, quote))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_symbol_normalizes_case() {
        let symbol = CanonicalSymbol::new("btc", "usdt");
        assert_eq!(symbol.as_str(), "BTC/USDT");
        assert_eq!(symbol.base(), "BTC");
        assert_eq!(symbol.quote(), "USDT");
    }

    #[test]
    fn mapping_resolves_both_directions() {
        let mut mapping = SymbolMapping::new();
        let btc = CanonicalSymbol::new("BTC", "USDT");
        mapping.insert(btc.clone(), "BTCUSDT");

        assert_eq!(mapping.native_symbol(&btc), Some("BTCUSDT"));
        assert_eq!(mapping.canonical_symbol("BTCUSDT"), Some(&btc));
    }

    #[test]
    fn unmapped_symbol_returns_none() {
        let mapping = SymbolMapping::new();
        let unknown = CanonicalSymbol::new("XYZ", "USDT");
        assert!(mapping.native_symbol(&unknown).is_none());
    }
}
