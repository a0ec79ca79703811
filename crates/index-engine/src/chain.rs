use chrono::NaiveDate;
use index_core::{round_to, DayOutcome, EngineConfig, Observation, WeightTable};
use std::collections::HashMap;

/// Advances the chain-linked index by one trading day.
///
/// A symbol contributes when it is present today, has a known previous close
/// and a nonzero baseline weight. The accumulated index return is divided by
/// the active weight mass, so a day where part of the universe is silent is
/// scaled rather than read as a crash. Returns `None` when nothing
/// contributed; the caller leaves the chain untouched for that date.
pub fn advance_day(
    date: NaiveDate,
    prev_value: f64,
    weights: &WeightTable,
    prev_closes: &HashMap<String, f64>,
    today: &[Observation],
    config: &EngineConfig,
) -> Option<DayOutcome> {
    let mut index_return = 0.0;
    let mut active_mass = 0.0;
    let mut total_volume = 0.0;
    let mut return_sum = 0.0;
    let mut weighted_return = 0.0;
    let mut has_labeled_return = false;
    let mut constituents = 0i64;

    for obs in today {
        let Some(weight) = weights.get(&obs.symbol) else {
            continue;
        };
        let Some(&prev_close) = prev_closes.get(&obs.symbol) else {
            continue;
        };
        if weight <= 0.0 || prev_close <= 0.0 {
            continue;
        }

        let daily_return = obs.close / prev_close - 1.0;
        index_return += weight * daily_return;
        active_mass += weight;
        return_sum += daily_return;
        total_volume += obs.volume.unwrap_or(0.0);
        constituents += 1;

        if let Some(labeled) = obs.future_return_1d {
            weighted_return += weight * labeled;
            has_labeled_return = true;
        }
    }

    if constituents == 0 || active_mass <= 0.0 {
        return None;
    }

    let normalized_return = index_return / active_mass;
    let index_value = round_to(prev_value * (1.0 + normalized_return), config.value_decimals);
    let return_vs_previous = if prev_value != 0.0 {
        Some((index_value / prev_value - 1.0) * 100.0)
    } else {
        None
    };

    Some(DayOutcome {
        date,
        index_value,
        total_volume,
        constituents,
        average_return: Some(return_sum / constituents as f64),
        weighted_return: has_labeled_return.then_some(weighted_return),
        return_vs_previous,
    })
}

/// Folds a day's observations into the carry-forward close map.
///
/// Symbols absent today keep their last-known close until they reappear, so
/// the chain never requires a symbol to have data on every single day.
pub fn carry_forward_closes(prev_closes: &mut HashMap<String, f64>, today: &[Observation]) {
    for obs in today {
        prev_closes.insert(obs.symbol.clone(), obs.close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index_core::WeightTable;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn obs(symbol: &str, date: NaiveDate, close: f64, volume: f64) -> Observation {
        Observation {
            symbol: symbol.to_string(),
            date,
            sector: "Financials".to_string(),
            subsector: None,
            close,
            volume: Some(volume),
            market_cap: None,
            market_cap_proxy: Some(close * volume),
            future_return_1d: None,
        }
    }

    fn financials_weights() -> WeightTable {
        WeightTable::new(
            d(1),
            HashMap::from([
                ("A".to_string(), 0.5),
                ("B".to_string(), 0.3),
                ("C".to_string(), 0.2),
            ]),
        )
    }

    #[test]
    fn full_universe_day() {
        // A +10%, B +0%, C -5% with weights 0.5/0.3/0.2 compounds by 1.04.
        let weights = financials_weights();
        let prev_closes = HashMap::from([
            ("A".to_string(), 10.0),
            ("B".to_string(), 20.0),
            ("C".to_string(), 5.0),
        ]);
        let today = vec![
            obs("A", d(2), 11.0, 100.0),
            obs("B", d(2), 20.0, 200.0),
            obs("C", d(2), 4.75, 300.0),
        ];

        let outcome = advance_day(
            d(2),
            1000.0,
            &weights,
            &prev_closes,
            &today,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.index_value, 1040.0);
        assert_eq!(outcome.constituents, 3);
        assert_eq!(outcome.total_volume, 600.0);
        assert!((outcome.return_vs_previous.unwrap() - 4.0).abs() < 1e-9);
        let avg = (0.1 + 0.0 - 0.05) / 3.0;
        assert!((outcome.average_return.unwrap() - avg).abs() < 1e-12);
        assert_eq!(outcome.weighted_return, None);
    }

    #[test]
    fn partial_day_normalizes_by_active_mass() {
        // C is silent; A and B both +5%. Active mass 0.8, so the index still
        // moves +5% instead of appearing to lose C's share.
        let weights = financials_weights();
        let prev_closes = HashMap::from([
            ("A".to_string(), 11.0),
            ("B".to_string(), 20.0),
            ("C".to_string(), 4.75),
        ]);
        let today = vec![obs("A", d(3), 11.55, 100.0), obs("B", d(3), 21.0, 200.0)];

        let outcome = advance_day(
            d(3),
            1040.0,
            &weights,
            &prev_closes,
            &today,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.index_value, 1092.0);
        assert_eq!(outcome.constituents, 2);
    }

    #[test]
    fn symbol_without_previous_close_is_excluded() {
        let weights = financials_weights();
        let prev_closes = HashMap::from([("A".to_string(), 10.0)]);
        let today = vec![obs("A", d(2), 10.0, 100.0), obs("C", d(2), 5.0, 300.0)];

        let outcome = advance_day(
            d(2),
            1000.0,
            &weights,
            &prev_closes,
            &today,
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.constituents, 1);
        assert_eq!(outcome.index_value, 1000.0);
    }

    #[test]
    fn no_contributors_yields_none() {
        let weights = financials_weights();
        let prev_closes = HashMap::new();
        let today = vec![obs("A", d(2), 11.0, 100.0)];

        assert!(advance_day(
            d(2),
            1000.0,
            &weights,
            &prev_closes,
            &today,
            &EngineConfig::default(),
        )
        .is_none());
    }

    #[test]
    fn weighted_return_uses_labeled_returns_only() {
        let weights = financials_weights();
        let prev_closes = HashMap::from([("A".to_string(), 10.0), ("B".to_string(), 20.0)]);
        let mut a = obs("A", d(2), 11.0, 100.0);
        a.future_return_1d = Some(0.02);
        let b = obs("B", d(2), 20.0, 200.0);

        let outcome = advance_day(
            d(2),
            1000.0,
            &weights,
            &prev_closes,
            &[a, b],
            &EngineConfig::default(),
        )
        .unwrap();

        assert!((outcome.weighted_return.unwrap() - 0.5 * 0.02).abs() < 1e-12);
    }

    #[test]
    fn carry_forward_keeps_silent_symbols() {
        let mut closes = HashMap::from([("A".to_string(), 10.0), ("C".to_string(), 4.75)]);
        carry_forward_closes(&mut closes, &[obs("A", d(3), 11.0, 100.0)]);

        assert_eq!(closes.get("A"), Some(&11.0));
        assert_eq!(closes.get("C"), Some(&4.75));
    }
}
