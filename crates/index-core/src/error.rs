use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Why a series produced no rows in a run. Non-fatal: the batch continues
/// with the next series and reports every skip in the terminal summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    /// No usable observations exist for the series.
    NoObservations,
    /// Every constituent lacked capitalization data at the baseline date.
    ZeroBaselineCap,
    /// No trading day after the resume point had data.
    NoNewTradingDays,
    /// The series is already persisted through today and no override date was
    /// supplied.
    CaughtUp,
    /// The per-series timeout elapsed.
    TimedOut,
    /// The series transaction failed and was rolled back.
    PersistenceFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoObservations => write!(f, "no usable observations"),
            SkipReason::ZeroBaselineCap => write!(f, "zero baseline capitalization"),
            SkipReason::NoNewTradingDays => write!(f, "no new trading days"),
            SkipReason::CaughtUp => {
                write!(f, "already up to date (pass --start-date or --force to recompute)")
            }
            SkipReason::TimedOut => write!(f, "series timeout elapsed"),
            SkipReason::PersistenceFailed(e) => write!(f, "persistence failed: {}", e),
        }
    }
}
