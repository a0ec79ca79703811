use index_core::{IndicatorConfig, IndicatorRow};

/// Period-over-period returns, aligned to the input. The first slot is `None`.
pub fn period_returns(values: &[f64]) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    for i in 1..values.len() {
        if values[i - 1] != 0.0 {
            result[i] = Some(values[i] / values[i - 1] - 1.0);
        }
    }
    result
}

/// Simple moving average, aligned to the input series.
///
/// Slot `i` holds the mean of the trailing `window` values once the window is
/// full, `None` during warmup.
pub fn rolling_sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window == 0 {
        return result;
    }
    for i in window - 1..values.len() {
        let sum: f64 = values[i + 1 - window..=i].iter().sum();
        result[i] = Some(sum / window as f64);
    }
    result
}

/// Exponential moving average with α = 2/(window+1), seeded from the first
/// value. Defined for every slot once a first value exists.
pub fn rolling_ema(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window == 0 || values.is_empty() {
        return result;
    }
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut ema = values[0];
    result[0] = Some(ema);
    for i in 1..values.len() {
        ema = alpha * values[i] + (1.0 - alpha) * ema;
        result[i] = Some(ema);
    }
    result
}

/// Rolling sample standard deviation of period-over-period returns.
///
/// Slot `i` holds the stddev (ddof = 1) of the trailing `window` returns once
/// all of them exist, matching a rolling std over a pct-change series.
pub fn rolling_volatility(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window < 2 || values.len() <= window {
        return result;
    }
    let returns = period_returns(values);
    for i in window..values.len() {
        let slice = &returns[i + 1 - window..=i];
        if slice.iter().any(|r| r.is_none()) {
            continue;
        }
        let rs: Vec<f64> = slice.iter().map(|r| r.unwrap_or(0.0)).collect();
        let mean = rs.iter().sum::<f64>() / window as f64;
        let variance =
            rs.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        result[i] = Some(variance.sqrt());
    }
    result
}

/// Percentage change over a fixed lag.
pub fn momentum(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if lag == 0 {
        return result;
    }
    for i in lag..values.len() {
        if values[i - lag] != 0.0 {
            result[i] = Some(values[i] / values[i - lag] - 1.0);
        }
    }
    result
}

/// One `IndicatorRow` per input value, across all configured windows.
///
/// The input must be the full trailing history of the series, not just a new
/// tail: the EMA and the long SMA are order-dependent, so feeding a truncated
/// series diverges from a full recomputation.
pub fn indicator_rows(values: &[f64], config: &IndicatorConfig) -> Vec<IndicatorRow> {
    let volatility: Vec<Vec<Option<f64>>> = config
        .volatility_windows
        .iter()
        .map(|&w| rolling_volatility(values, w))
        .collect();
    let momentum_series = momentum(values, config.momentum_lag);
    let sma: Vec<Vec<Option<f64>>> = config
        .sma_windows
        .iter()
        .map(|&w| rolling_sma(values, w))
        .collect();
    let long_sma = rolling_sma(values, config.long_sma_window);
    let ema: Vec<Vec<Option<f64>>> = config
        .ema_windows
        .iter()
        .map(|&w| rolling_ema(values, w))
        .collect();

    (0..values.len())
        .map(|i| IndicatorRow {
            volatility: volatility.iter().map(|series| series[i]).collect(),
            momentum: momentum_series[i],
            sma: sma.iter().map(|series| series[i]).collect(),
            long_sma: long_sma[i],
            ema: ema.iter().map(|series| series[i]).collect(),
        })
        .collect()
}
