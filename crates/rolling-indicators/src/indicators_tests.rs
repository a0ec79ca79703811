use super::indicators::*;
use index_core::IndicatorConfig;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn sample_series() -> Vec<f64> {
    vec![
        1000.0, 1010.0, 1005.0, 1020.0, 1030.0, 1025.0, 1040.0, 1050.0, 1045.0, 1060.0,
        1070.0, 1065.0, 1080.0, 1090.0, 1085.0, 1100.0, 1110.0, 1105.0, 1120.0, 1130.0,
    ]
}

#[test]
fn sma_warmup_and_values() {
    let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let result = rolling_sma(&data, 3);

    assert_eq!(result.len(), data.len());
    assert_eq!(result[0], None);
    assert_eq!(result[1], None);
    assert_close(result[2].unwrap(), 2.0);
    assert_close(result[3].unwrap(), 3.0);
    assert_close(result[4].unwrap(), 4.0);
}

#[test]
fn sma_window_larger_than_series() {
    let data = vec![1.0, 2.0];
    let result = rolling_sma(&data, 5);
    assert!(result.iter().all(|v| v.is_none()));
}

#[test]
fn ema_seeds_from_first_value() {
    let data = vec![22.0, 24.0, 23.0];
    let result = rolling_ema(&data, 3);

    // alpha = 2/(3+1) = 0.5
    assert_close(result[0].unwrap(), 22.0);
    assert_close(result[1].unwrap(), 23.0);
    assert_close(result[2].unwrap(), 23.0);
}

#[test]
fn ema_defined_for_every_slot() {
    let data = sample_series();
    let result = rolling_ema(&data, 200);
    assert!(result.iter().all(|v| v.is_some()));
}

#[test]
fn ema_tracks_uptrend() {
    let data: Vec<f64> = (1..=30).map(|i| i as f64).collect();
    let result = rolling_ema(&data, 5);
    for i in 1..result.len() {
        assert!(result[i].unwrap() > result[i - 1].unwrap());
    }
}

#[test]
fn period_returns_alignment() {
    let data = vec![100.0, 110.0, 99.0];
    let result = period_returns(&data);

    assert_eq!(result[0], None);
    assert_close(result[1].unwrap(), 0.1);
    assert_close(result[2].unwrap(), -0.1);
}

#[test]
fn volatility_of_known_returns() {
    // Returns: 1.0, 0.5. Sample stddev = |1.0 - 0.5| / sqrt(2).
    let data = vec![1.0, 2.0, 3.0];
    let result = rolling_volatility(&data, 2);

    assert_eq!(result[0], None);
    assert_eq!(result[1], None);
    assert_close(result[2].unwrap(), 0.25 * std::f64::consts::SQRT_2);
}

#[test]
fn volatility_zero_for_constant_returns() {
    // Constant +10% per period.
    let data = vec![100.0, 110.0, 121.0, 133.1, 146.41];
    let result = rolling_volatility(&data, 3);

    assert_close(result[4].unwrap(), 0.0);
}

#[test]
fn volatility_warmup_excludes_first_return() {
    let data = sample_series();
    let result = rolling_volatility(&data, 5);

    // First window with five real returns ends at index 5.
    assert!(result[..5].iter().all(|v| v.is_none()));
    assert!(result[5].is_some());
}

#[test]
fn momentum_lag_values() {
    let data: Vec<f64> = (1..=20).map(|i| i as f64 * 10.0).collect();
    let result = momentum(&data, 14);

    assert!(result[..14].iter().all(|v| v.is_none()));
    assert_close(result[14].unwrap(), 150.0 / 10.0 - 1.0);
    assert_close(result[19].unwrap(), 200.0 / 60.0 - 1.0);
}

#[test]
fn indicator_rows_align_with_input() {
    let data = sample_series();
    let config = IndicatorConfig::default();
    let rows = indicator_rows(&data, &config);

    assert_eq!(rows.len(), data.len());
    for row in &rows {
        assert_eq!(row.volatility.len(), config.volatility_windows.len());
        assert_eq!(row.sma.len(), config.sma_windows.len());
        assert_eq!(row.ema.len(), config.ema_windows.len());
    }

    // 5-period SMA fills from index 4; long SMA never fills on 20 points.
    assert_eq!(rows[3].sma[0], None);
    assert!(rows[4].sma[0].is_some());
    assert!(rows.iter().all(|r| r.long_sma.is_none()));
}

#[test]
fn tail_only_input_diverges_from_full_history() {
    // The order-dependent EMA must be fed the whole series: recomputing from
    // a truncated tail gives a different value for the same date.
    let data = sample_series();
    let config = IndicatorConfig::default();

    let full = indicator_rows(&data, &config);
    let tail = indicator_rows(&data[10..], &config);

    let full_last = full.last().unwrap().ema[5].unwrap();
    let tail_last = tail.last().unwrap().ema[5].unwrap();
    assert!((full_last - tail_last).abs() > 1e-6);
}
