use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Convex blend of true market cap and the price-volume proxy.
///
/// True market cap is often missing upstream, so every capitalization figure
/// in the engine goes through this single blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub true_cap: f64,
    pub proxy_cap: f64,
}

impl BlendWeights {
    pub fn blended(&self, market_cap: Option<f64>, market_cap_proxy: Option<f64>) -> f64 {
        self.true_cap * market_cap.unwrap_or(0.0) + self.proxy_cap * market_cap_proxy.unwrap_or(0.0)
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            true_cap: 0.3,
            proxy_cap: 0.7,
        }
    }
}

/// Window lists for the rolling indicator calculator.
///
/// The persisted schema has fixed indicator columns, so the list lengths must
/// match the column counts (4 volatility, 5 SMA, 6 EMA); values land
/// positionally in those columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub volatility_windows: Vec<usize>,
    pub momentum_lag: usize,
    pub sma_windows: Vec<usize>,
    /// Very long SMA approximating 200 weekly bars from daily data.
    pub long_sma_window: usize,
    pub ema_windows: Vec<usize>,
    /// Minimum trailing history (in periods) reloaded from the store before
    /// computing indicators for new dates. Must cover the largest window so
    /// the order-dependent indicators match a full recomputation.
    pub lookback_floor: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            volatility_windows: vec![5, 10, 20, 40],
            momentum_lag: 14,
            sma_windows: vec![5, 20, 50, 125, 200],
            long_sma_window: 1000,
            ema_windows: vec![5, 10, 20, 50, 125, 200],
            lookback_floor: 1000,
        }
    }
}

impl IndicatorConfig {
    pub fn largest_window(&self) -> usize {
        self.volatility_windows
            .iter()
            .chain(self.sma_windows.iter())
            .chain(self.ema_windows.iter())
            .chain(std::iter::once(&self.long_sma_window))
            .chain(std::iter::once(&self.momentum_lag))
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// All tunables of the index engine, passed explicitly into each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub blend: BlendWeights,
    /// Index value assigned to the baseline date of a new series.
    pub index_scale: f64,
    /// Decimal places of the chain-linked index value.
    pub value_decimals: u32,
    /// Decimal places of returns, indicators and influence weights.
    pub metric_decimals: u32,
    /// Calendar days of raw observations loaded before the resume point to
    /// seed carry-forward prices for symbols silent around the boundary.
    pub resume_buffer_days: i64,
    /// Upper bound on wall-clock time per series before the batch moves on.
    pub series_timeout_secs: u64,
    pub indicators: IndicatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blend: BlendWeights::default(),
            index_scale: 1000.0,
            value_decimals: 2,
            metric_decimals: 5,
            resume_buffer_days: 30,
            series_timeout_secs: 300,
            indicators: IndicatorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let blend_sum = self.blend.true_cap + self.blend.proxy_cap;
        if self.blend.true_cap < 0.0 || self.blend.proxy_cap < 0.0 || (blend_sum - 1.0).abs() > 1e-9
        {
            return Err(EngineError::InvalidConfig(format!(
                "blend weights must be a convex combination, got {}/{}",
                self.blend.true_cap, self.blend.proxy_cap
            )));
        }
        if self.index_scale <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "index_scale must be positive, got {}",
                self.index_scale
            )));
        }
        let ind = &self.indicators;
        if ind.volatility_windows.len() != 4 || ind.sma_windows.len() != 5 || ind.ema_windows.len() != 6
        {
            return Err(EngineError::InvalidConfig(
                "indicator window lists must match the persisted columns (4 volatility, 5 SMA, 6 EMA)"
                    .to_string(),
            ));
        }
        if ind.momentum_lag == 0 || ind.long_sma_window == 0 {
            return Err(EngineError::InvalidConfig(
                "momentum lag and long SMA window must be nonzero".to_string(),
            ));
        }
        if ind.lookback_floor < ind.largest_window() {
            return Err(EngineError::InvalidConfig(format!(
                "lookback_floor ({}) must cover the largest window ({})",
                ind.lookback_floor,
                ind.largest_window()
            )));
        }
        if self.resume_buffer_days < 1 {
            return Err(EngineError::InvalidConfig(
                "resume_buffer_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn blended_cap_handles_missing_fields() {
        let blend = BlendWeights::default();
        assert_eq!(blend.blended(Some(100.0), Some(50.0)), 65.0);
        assert_eq!(blend.blended(None, Some(50.0)), 35.0);
        assert_eq!(blend.blended(Some(100.0), None), 30.0);
        assert_eq!(blend.blended(None, None), 0.0);
    }

    #[test]
    fn rejects_non_convex_blend() {
        let mut cfg = EngineConfig::default();
        cfg.blend = BlendWeights {
            true_cap: 0.4,
            proxy_cap: 0.7,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_shallow_lookback_floor() {
        let mut cfg = EngineConfig::default();
        cfg.indicators.lookback_floor = 250;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_window_counts() {
        let mut cfg = EngineConfig::default();
        cfg.indicators.sma_windows = vec![5, 20];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn largest_window_spans_all_lists() {
        let ind = IndicatorConfig::default();
        assert_eq!(ind.largest_window(), 1000);
    }
}
