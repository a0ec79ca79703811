use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use index_core::{round_to, DayOutcome, EngineConfig, EngineError, SeriesKey, SkipReason};
use index_engine::{advance_day, baseline_weights, carry_forward_closes, influence_weight};
use index_store::{observations, records, Db, IndexRecord};
use rolling_indicators::indicator_rows;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, warn};

/// Parameters of one batch invocation, resolved by the binary.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound of the date walk; injected so runs are reproducible.
    pub today: NaiveDate,
    /// When a series is already caught up, recompute from the previous
    /// trading weekday instead of refusing.
    pub force: bool,
    /// Operator override: replay the chain from this date, recomputing and
    /// overwriting any rows it covers.
    pub start_date: Option<NaiveDate>,
    /// Restrict the batch to these sectors (and their subsectors).
    pub sectors: Option<Vec<String>>,
    /// Compute and trace everything, write nothing.
    pub dry_run: bool,
}

/// What happened to one series during a run.
#[derive(Debug)]
pub enum SeriesOutcome {
    Updated(usize),
    Skipped(SkipReason),
}

/// Terminal report: which series advanced and which were skipped, with
/// reasons. No series is ever dropped silently.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub updated: Vec<(SeriesKey, usize)>,
    pub skipped: Vec<(SeriesKey, SkipReason)>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "run complete: {} series updated, {} skipped",
            self.updated.len(),
            self.skipped.len()
        );
        for (series, rows) in &self.updated {
            info!("  {}: {} row(s)", series, rows);
        }
        for (series, reason) in &self.skipped {
            warn!("  {} skipped: {}", series, reason);
        }
    }
}

enum ChainStart {
    FullBuild,
    Resume { anchor: NaiveDate, prev_value: f64 },
}

/// Drives every series from its resume point to the present: baseline →
/// chain → indicators → influence → one transaction of idempotent upserts.
pub struct Coordinator {
    db: Db,
    config: EngineConfig,
}

impl Coordinator {
    pub fn new(db: Db, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { db, config })
    }

    /// Runs the batch: sector series first, then subsectors, so influence
    /// lookups find their parent rows. Each series gets its own timeout and
    /// its own failure domain; one bad series never aborts the run.
    pub async fn run(&self, opts: &RunOptions) -> Result<RunSummary> {
        let pool = self.db.pool();
        let wanted = |sector: &str| {
            opts.sectors
                .as_ref()
                .map(|list| list.iter().any(|s| s == sector))
                .unwrap_or(true)
        };

        let mut series_keys: Vec<SeriesKey> = observations::distinct_sectors(pool)
            .await?
            .into_iter()
            .filter(|s| wanted(s))
            .map(SeriesKey::sector)
            .collect();
        series_keys.extend(
            observations::distinct_subsectors(pool)
                .await?
                .into_iter()
                .filter(|k| wanted(&k.sector)),
        );

        let mut summary = RunSummary::default();
        let timeout = std::time::Duration::from_secs(self.config.series_timeout_secs);

        for series in series_keys {
            info!("processing {}", series);
            match tokio::time::timeout(timeout, self.process_series(&series, opts)).await {
                Err(_) => {
                    warn!("{}: timed out after {:?}", series, timeout);
                    summary.skipped.push((series, SkipReason::TimedOut));
                }
                Ok(Err(e)) => {
                    error!("{}: transaction rolled back: {:#}", series, e);
                    summary
                        .skipped
                        .push((series, SkipReason::PersistenceFailed(e.to_string())));
                }
                Ok(Ok(SeriesOutcome::Updated(rows))) => summary.updated.push((series, rows)),
                Ok(Ok(SeriesOutcome::Skipped(reason))) => {
                    warn!("{} skipped: {}", series, reason);
                    summary.skipped.push((series, reason));
                }
            }
        }

        summary.log();
        Ok(summary)
    }

    /// Advances one series to `opts.today` and upserts the new rows.
    async fn process_series(
        &self,
        series: &SeriesKey,
        opts: &RunOptions,
    ) -> Result<SeriesOutcome> {
        let pool = self.db.pool();
        let config = &self.config;

        // Resolve the resume point. The chain replays from the day after the
        // latest record preceding the effective start date; with no such
        // record the whole history is rebuilt.
        let chain_start = match records::last_record(pool, series).await? {
            None => ChainStart::FullBuild,
            Some(last) => {
                let start = match opts.start_date {
                    Some(start) => start,
                    None if last.date >= opts.today => {
                        if !opts.force {
                            return Ok(SeriesOutcome::Skipped(SkipReason::CaughtUp));
                        }
                        let fallback = previous_trading_weekday(opts.today);
                        info!(
                            "{}: caught up through {}, forced recompute from {}",
                            series, last.date, fallback
                        );
                        fallback
                    }
                    None => last.date + Duration::days(1),
                };
                match records::recent_values(pool, series, start, 1).await?.pop() {
                    Some((anchor, prev_value)) => ChainStart::Resume { anchor, prev_value },
                    None => ChainStart::FullBuild,
                }
            }
        };

        let (observations, resumed_at) = match &chain_start {
            ChainStart::FullBuild => {
                (observations::load_observations(pool, series, None).await?, None)
            }
            ChainStart::Resume { anchor, prev_value } => {
                let buffer_start = *anchor - Duration::days(config.resume_buffer_days);
                (
                    observations::load_observations(pool, series, Some(buffer_start)).await?,
                    Some((*anchor, *prev_value)),
                )
            }
        };
        if observations.is_empty() {
            return Ok(SeriesOutcome::Skipped(SkipReason::NoObservations));
        }

        let anchor = resumed_at
            .map(|(anchor, _)| anchor)
            .unwrap_or(observations[0].date);

        // Re-baselining at the resume point is a deliberate simplification;
        // the anchor is persisted per row so any drift versus a full rebuild
        // stays diagnosable.
        let Some(weights) = baseline_weights(anchor, &observations, &config.blend) else {
            return Ok(SeriesOutcome::Skipped(SkipReason::ZeroBaselineCap));
        };

        let mut by_date: BTreeMap<NaiveDate, Vec<index_core::Observation>> = BTreeMap::new();
        for obs in observations {
            by_date.entry(obs.date).or_default().push(obs);
        }

        // Seed carry-forward closes from everything up to the anchor, so
        // symbols silent around the resume boundary keep their last price.
        let mut prev_closes: HashMap<String, f64> = HashMap::new();
        for (_, day_obs) in by_date.range(..=anchor) {
            carry_forward_closes(&mut prev_closes, day_obs);
        }

        let mut outcomes: Vec<DayOutcome> = Vec::new();
        let mut prev_value = match resumed_at {
            Some((_, value)) => value,
            None => {
                let anchor_obs = by_date.get(&anchor).map(Vec::as_slice).unwrap_or(&[]);
                let baseline_volume: f64 = anchor_obs
                    .iter()
                    .filter(|o| weights.get(&o.symbol).is_some())
                    .map(|o| o.volume.unwrap_or(0.0))
                    .sum();
                outcomes.push(DayOutcome {
                    date: anchor,
                    index_value: round_to(config.index_scale, config.value_decimals),
                    total_volume: baseline_volume,
                    constituents: weights.len() as i64,
                    average_return: None,
                    weighted_return: None,
                    return_vs_previous: None,
                });
                config.index_scale
            }
        };

        let mut day = anchor + Duration::days(1);
        while day <= opts.today {
            if day.weekday().num_days_from_monday() >= 5 {
                day += Duration::days(1);
                continue;
            }
            if let Some(todays) = by_date.get(&day) {
                if let Some(outcome) =
                    advance_day(day, prev_value, &weights, &prev_closes, todays, config)
                {
                    prev_value = outcome.index_value;
                    outcomes.push(outcome);
                }
                carry_forward_closes(&mut prev_closes, todays);
            }
            day += Duration::days(1);
        }

        if outcomes.is_empty() {
            return Ok(SeriesOutcome::Skipped(SkipReason::NoNewTradingDays));
        }

        self.persist_outcomes(series, &weights.anchor, outcomes, opts)
            .await
    }

    /// Computes indicators over history + new values, resolves per-date caps
    /// and influence, and writes the records.
    async fn persist_outcomes(
        &self,
        series: &SeriesKey,
        weight_anchor: &NaiveDate,
        outcomes: Vec<DayOutcome>,
        opts: &RunOptions,
    ) -> Result<SeriesOutcome> {
        let pool = self.db.pool();
        let config = &self.config;
        let first_new = outcomes[0].date;

        // Indicator continuity needs the trailing history, not just the new
        // tail; the lookback floor covers the largest configured window.
        let history = records::recent_values(
            pool,
            series,
            first_new,
            config.indicators.lookback_floor as i64,
        )
        .await?;
        let mut values: Vec<f64> = history.iter().map(|(_, v)| *v).collect();
        values.extend(outcomes.iter().map(|o| o.index_value));
        let rows = indicator_rows(&values, &config.indicators);
        let new_rows = &rows[history.len()..];

        let dp = config.metric_decimals;
        let mut new_records = Vec::with_capacity(outcomes.len());
        for (outcome, indicators) in outcomes.iter().zip(new_rows) {
            let market_cap =
                observations::blended_capitalization(pool, series, outcome.date, &config.blend)
                    .await?;

            let influence = if series.is_subsector() {
                let sector_cap =
                    records::sector_market_cap_on(pool, &series.sector, outcome.date).await?;
                let influence =
                    influence_weight(market_cap.unwrap_or(0.0), sector_cap).map(|v| round_to(v, dp));
                if influence.is_none() {
                    warn!(
                        "{}: no sector record on {}, persisting null influence",
                        series, outcome.date
                    );
                }
                influence
            } else {
                None
            };

            info!(
                "{} {}: index = {:.2}, return = {:?}%, influence = {:?}",
                series, outcome.date, outcome.index_value, outcome.return_vs_previous, influence
            );

            new_records.push(IndexRecord {
                sector: series.sector.clone(),
                subsector: series.subsector.clone(),
                is_subsector: series.is_subsector(),
                date: outcome.date,
                index_value: outcome.index_value,
                market_cap,
                total_volume: Some(outcome.total_volume),
                num_constituents: Some(outcome.constituents),
                average_return: outcome.average_return.map(|v| round_to(v, dp)),
                weighted_return: outcome.weighted_return.map(|v| round_to(v, dp)),
                return_vs_previous: outcome
                    .return_vs_previous
                    .map(|v| round_to(v, config.value_decimals)),
                volatility_5d: indicators.volatility[0].map(|v| round_to(v, dp)),
                volatility_10d: indicators.volatility[1].map(|v| round_to(v, dp)),
                volatility_20d: indicators.volatility[2].map(|v| round_to(v, dp)),
                volatility_40d: indicators.volatility[3].map(|v| round_to(v, dp)),
                momentum_14d: indicators.momentum.map(|v| round_to(v, dp)),
                sma_5: indicators.sma[0].map(|v| round_to(v, dp)),
                sma_20: indicators.sma[1].map(|v| round_to(v, dp)),
                sma_50: indicators.sma[2].map(|v| round_to(v, dp)),
                sma_125: indicators.sma[3].map(|v| round_to(v, dp)),
                sma_200: indicators.sma[4].map(|v| round_to(v, dp)),
                sma_200_weekly: indicators.long_sma.map(|v| round_to(v, dp)),
                ema_5: indicators.ema[0].map(|v| round_to(v, dp)),
                ema_10: indicators.ema[1].map(|v| round_to(v, dp)),
                ema_20: indicators.ema[2].map(|v| round_to(v, dp)),
                ema_50: indicators.ema[3].map(|v| round_to(v, dp)),
                ema_125: indicators.ema[4].map(|v| round_to(v, dp)),
                ema_200: indicators.ema[5].map(|v| round_to(v, dp)),
                influence_weight: influence,
                weight_anchor: Some(*weight_anchor),
            });
        }

        if opts.dry_run {
            info!("{}: dry run, {} row(s) not written", series, new_records.len());
            return Ok(SeriesOutcome::Updated(new_records.len()));
        }

        let existing = records::count_records_from(pool, series, first_new).await?;
        let before = records::count_records(pool, series).await?;
        records::upsert_records(pool, &new_records).await?;
        let after = records::count_records(pool, series).await?;

        let inserted = after - before;
        let expected = new_records.len() as i64 - existing;
        if inserted != expected {
            warn!(
                "{}: expected {} insert(s), confirmed {}",
                series, expected, inserted
            );
        }

        Ok(SeriesOutcome::Updated(new_records.len()))
    }
}

/// Most recent weekday strictly before `date`.
pub fn previous_trading_weekday(date: NaiveDate) -> NaiveDate {
    let mut day = date - Duration::days(1);
    while day.weekday().num_days_from_monday() >= 5 {
        day -= Duration::days(1);
    }
    day
}
