use chrono::NaiveDate;
use index_core::SeriesKey;
use serde::{Deserialize, Serialize};

/// One persisted row of `sector_index_table`.
///
/// Exactly one record exists per (sector, subsector, date); re-running over
/// an already-computed range overwrites these columns in place. Sector-level
/// rows have `subsector = None` (stored as the empty string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexRecord {
    pub sector: String,
    pub subsector: Option<String>,
    pub is_subsector: bool,
    pub date: NaiveDate,
    pub index_value: f64,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub num_constituents: Option<i64>,
    pub average_return: Option<f64>,
    pub weighted_return: Option<f64>,
    pub return_vs_previous: Option<f64>,
    pub volatility_5d: Option<f64>,
    pub volatility_10d: Option<f64>,
    pub volatility_20d: Option<f64>,
    pub volatility_40d: Option<f64>,
    pub momentum_14d: Option<f64>,
    pub sma_5: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_125: Option<f64>,
    pub sma_200: Option<f64>,
    pub sma_200_weekly: Option<f64>,
    pub ema_5: Option<f64>,
    pub ema_10: Option<f64>,
    pub ema_20: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_125: Option<f64>,
    pub ema_200: Option<f64>,
    /// Subsector rows only: share of the parent sector's capitalization.
    pub influence_weight: Option<f64>,
    /// Anchor date of the weight table that produced this row.
    pub weight_anchor: Option<NaiveDate>,
}

impl IndexRecord {
    pub fn series(&self) -> SeriesKey {
        SeriesKey {
            sector: self.sector.clone(),
            subsector: self.subsector.clone(),
        }
    }
}
