use chrono::NaiveDate;
use index_core::{BlendWeights, Observation, WeightTable};
use std::collections::HashMap;
use tracing::warn;

/// Builds the normalized weight table for one series at an anchor date.
///
/// Each constituent's weight is its blended capitalization divided by the
/// total across all constituents observed on the anchor date. Returns `None`
/// when no constituent has capitalization data, in which case the series is
/// skipped for this baseline; other series are unaffected.
pub fn baseline_weights(
    anchor: NaiveDate,
    observations: &[Observation],
    blend: &BlendWeights,
) -> Option<WeightTable> {
    let mut caps: HashMap<String, f64> = HashMap::new();
    let mut total = 0.0;

    for obs in observations.iter().filter(|o| o.date == anchor) {
        let cap = blend.blended(obs.market_cap, obs.market_cap_proxy);
        if cap > 0.0 {
            caps.insert(obs.symbol.clone(), cap);
            total += cap;
        }
    }

    if total <= 0.0 {
        warn!("no blended capitalization at anchor {}, skipping baseline", anchor);
        return None;
    }

    let weights = caps.into_iter().map(|(s, cap)| (s, cap / total)).collect();
    Some(WeightTable::new(anchor, weights))
}
