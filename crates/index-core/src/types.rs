use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One symbol's market snapshot for one trading day.
///
/// Produced by the ingestion pipeline and treated as immutable here. A row is
/// usable for index computation only when `close` is present and at least one
/// of the two capitalization fields is set; the store layer filters on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: String,
    pub date: NaiveDate,
    pub sector: String,
    pub subsector: Option<String>,
    pub close: f64,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_proxy: Option<f64>,
    /// Forward-looking labeled return. Analytics only, never used for weighting.
    pub future_return_1d: Option<f64>,
}

/// Identifies one index series: a sector, or a (sector, subsector) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub sector: String,
    pub subsector: Option<String>,
}

impl SeriesKey {
    pub fn sector(sector: impl Into<String>) -> Self {
        Self {
            sector: sector.into(),
            subsector: None,
        }
    }

    pub fn subsector(sector: impl Into<String>, subsector: impl Into<String>) -> Self {
        Self {
            sector: sector.into(),
            subsector: Some(subsector.into()),
        }
    }

    pub fn is_subsector(&self) -> bool {
        self.subsector.is_some()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsector {
            Some(sub) => write!(f, "{}/{}", self.sector, sub),
            None => write!(f, "{}", self.sector),
        }
    }
}

/// Normalized constituent weights anchored at one baseline date.
///
/// Weights sum to 1 across all constituents that had a nonzero blended
/// capitalization on the anchor date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightTable {
    pub anchor: NaiveDate,
    weights: HashMap<String, f64>,
}

impl WeightTable {
    pub fn new(anchor: NaiveDate, weights: HashMap<String, f64>) -> Self {
        Self { anchor, weights }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.weights.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }
}

/// Result of advancing the chain-linked index by one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub index_value: f64,
    pub total_volume: f64,
    pub constituents: i64,
    /// Unweighted mean of the contributing symbols' daily returns.
    pub average_return: Option<f64>,
    /// Weight-blended forward-labeled return. Analytics only.
    pub weighted_return: Option<f64>,
    /// Percentage change versus the previous index value.
    pub return_vs_previous: Option<f64>,
}

/// Rolling indicator values for one date of an index series.
///
/// Vector slots correspond positionally to the configured window lists.
/// `None` marks a window still in warmup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub volatility: Vec<Option<f64>>,
    pub momentum: Option<f64>,
    pub sma: Vec<Option<f64>>,
    pub long_sma: Option<f64>,
    pub ema: Vec<Option<f64>>,
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_key_display() {
        assert_eq!(SeriesKey::sector("Financials").to_string(), "Financials");
        assert_eq!(
            SeriesKey::subsector("Financials", "Banks").to_string(),
            "Financials/Banks"
        );
    }

    #[test]
    fn round_to_decimals() {
        assert_eq!(round_to(1040.004, 2), 1040.0);
        assert_eq!(round_to(1040.006, 2), 1040.01);
        assert_eq!(round_to(0.123456, 5), 0.12346);
        assert_eq!(round_to(-0.125, 2), -0.13);
    }

    #[test]
    fn weight_table_lookup() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let table = WeightTable::new(anchor, HashMap::from([("AAA".to_string(), 0.6)]));
        assert_eq!(table.get("AAA"), Some(0.6));
        assert_eq!(table.get("ZZZ"), None);
        assert_eq!(table.len(), 1);
    }
}
