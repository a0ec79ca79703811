use anyhow::Result;
use chrono::NaiveDate;
use index_core::SeriesKey;
use sqlx::SqlitePool;

use crate::models::IndexRecord;

// Sector-level rows store the empty string in the subsector column so the
// unique key fires on conflict; NULLIF maps it back to None on the way out.
const RECORD_COLUMNS: &str = "sector, NULLIF(subsector, '') AS subsector, is_subsector, date, \
     index_value, market_cap, total_volume, num_constituents, average_return, weighted_return, \
     return_vs_previous, volatility_5d, volatility_10d, volatility_20d, volatility_40d, \
     momentum_14d, sma_5, sma_20, sma_50, sma_125, sma_200, sma_200_weekly, \
     ema_5, ema_10, ema_20, ema_50, ema_125, ema_200, influence_weight, weight_anchor";

fn subsector_key(series: &SeriesKey) -> &str {
    series.subsector.as_deref().unwrap_or("")
}

/// Latest persisted record of a series, the resume point for incremental runs.
pub async fn last_record(pool: &SqlitePool, series: &SeriesKey) -> Result<Option<IndexRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM sector_index_table \
         WHERE sector = ? AND subsector = ? ORDER BY date DESC LIMIT 1"
    );
    let record = sqlx::query_as::<_, IndexRecord>(&sql)
        .bind(&series.sector)
        .bind(subsector_key(series))
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

/// Trailing index values strictly before `before`, ascending, at most `limit`
/// rows. Feeds the indicator calculator its history window.
pub async fn recent_values(
    pool: &SqlitePool,
    series: &SeriesKey,
    before: NaiveDate,
    limit: i64,
) -> Result<Vec<(NaiveDate, f64)>> {
    let mut rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
        "SELECT date, index_value FROM sector_index_table \
         WHERE sector = ? AND subsector = ? AND date < ? \
         ORDER BY date DESC LIMIT ?",
    )
    .bind(&series.sector)
    .bind(subsector_key(series))
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

/// Full persisted series, date-ordered.
pub async fn load_series(pool: &SqlitePool, series: &SeriesKey) -> Result<Vec<IndexRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM sector_index_table \
         WHERE sector = ? AND subsector = ? ORDER BY date"
    );
    let records = sqlx::query_as::<_, IndexRecord>(&sql)
        .bind(&series.sector)
        .bind(subsector_key(series))
        .fetch_all(pool)
        .await?;
    Ok(records)
}

pub async fn count_records(pool: &SqlitePool, series: &SeriesKey) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sector_index_table WHERE sector = ? AND subsector = ?",
    )
    .bind(&series.sector)
    .bind(subsector_key(series))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Rows of a series dated `from` or later. The updater uses it to verify how
/// many of a batch's rows were genuinely new.
pub async fn count_records_from(
    pool: &SqlitePool,
    series: &SeriesKey,
    from: NaiveDate,
) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sector_index_table \
         WHERE sector = ? AND subsector = ? AND date >= ?",
    )
    .bind(&series.sector)
    .bind(subsector_key(series))
    .bind(from)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Aggregate market cap of the sector-level record on one date. The influence
/// linker reads it when processing that sector's subsectors.
pub async fn sector_market_cap_on(
    pool: &SqlitePool,
    sector: &str,
    date: NaiveDate,
) -> Result<Option<f64>> {
    let row: Option<(Option<f64>,)> = sqlx::query_as(
        "SELECT market_cap FROM sector_index_table \
         WHERE sector = ? AND subsector = '' AND date = ?",
    )
    .bind(sector)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|(cap,)| cap))
}

/// Writes a batch of records in one transaction of idempotent upserts.
///
/// On conflict with an existing (sector, subsector, date) row every computed
/// column is overwritten, never duplicated; a failure rolls the whole batch
/// back so a series is either fully advanced or untouched.
pub async fn upsert_records(pool: &SqlitePool, records: &[IndexRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO sector_index_table (
                sector, subsector, is_subsector, date,
                index_value, market_cap, total_volume, num_constituents,
                average_return, weighted_return, return_vs_previous,
                volatility_5d, volatility_10d, volatility_20d, volatility_40d,
                momentum_14d,
                sma_5, sma_20, sma_50, sma_125, sma_200, sma_200_weekly,
                ema_5, ema_10, ema_20, ema_50, ema_125, ema_200,
                influence_weight, weight_anchor
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (sector, subsector, date) DO UPDATE SET
                is_subsector = excluded.is_subsector,
                index_value = excluded.index_value,
                market_cap = excluded.market_cap,
                total_volume = excluded.total_volume,
                num_constituents = excluded.num_constituents,
                average_return = excluded.average_return,
                weighted_return = excluded.weighted_return,
                return_vs_previous = excluded.return_vs_previous,
                volatility_5d = excluded.volatility_5d,
                volatility_10d = excluded.volatility_10d,
                volatility_20d = excluded.volatility_20d,
                volatility_40d = excluded.volatility_40d,
                momentum_14d = excluded.momentum_14d,
                sma_5 = excluded.sma_5,
                sma_20 = excluded.sma_20,
                sma_50 = excluded.sma_50,
                sma_125 = excluded.sma_125,
                sma_200 = excluded.sma_200,
                sma_200_weekly = excluded.sma_200_weekly,
                ema_5 = excluded.ema_5,
                ema_10 = excluded.ema_10,
                ema_20 = excluded.ema_20,
                ema_50 = excluded.ema_50,
                ema_125 = excluded.ema_125,
                ema_200 = excluded.ema_200,
                influence_weight = excluded.influence_weight,
                weight_anchor = excluded.weight_anchor
            "#,
        )
        .bind(&record.sector)
        .bind(record.subsector.as_deref().unwrap_or(""))
        .bind(record.is_subsector)
        .bind(record.date)
        .bind(record.index_value)
        .bind(record.market_cap)
        .bind(record.total_volume)
        .bind(record.num_constituents)
        .bind(record.average_return)
        .bind(record.weighted_return)
        .bind(record.return_vs_previous)
        .bind(record.volatility_5d)
        .bind(record.volatility_10d)
        .bind(record.volatility_20d)
        .bind(record.volatility_40d)
        .bind(record.momentum_14d)
        .bind(record.sma_5)
        .bind(record.sma_20)
        .bind(record.sma_50)
        .bind(record.sma_125)
        .bind(record.sma_200)
        .bind(record.sma_200_weekly)
        .bind(record.ema_5)
        .bind(record.ema_10)
        .bind(record.ema_20)
        .bind(record.ema_50)
        .bind(record.ema_125)
        .bind(record.ema_200)
        .bind(record.influence_weight)
        .bind(record.weight_anchor)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
