use tracing::warn;

/// Relates a subsector's blended capitalization to its parent sector's on the
/// same date.
///
/// `None` when the parent sector record is missing or carries no
/// capitalization: the subsector row is still persisted, with a null
/// influence, and the gap is logged by the caller. A value above 1 indicates
/// a data-quality problem upstream and is passed through unclipped so it
/// stays visible.
pub fn influence_weight(subsector_cap: f64, sector_cap: Option<f64>) -> Option<f64> {
    match sector_cap {
        Some(cap) if cap > 0.0 => {
            let influence = subsector_cap / cap;
            if influence > 1.0 {
                warn!(
                    subsector_cap,
                    sector_cap = cap,
                    "subsector capitalization exceeds its parent sector"
                );
            }
            Some(influence)
        }
        _ => None,
    }
}
