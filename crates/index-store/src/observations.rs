use anyhow::Result;
use chrono::NaiveDate;
use index_core::{BlendWeights, Observation, SeriesKey};
use sqlx::SqlitePool;

/// Usability filter shared by every observation query: a row contributes only
/// when it has a close and at least one capitalization field.
const USABLE: &str = "close IS NOT NULL AND (market_cap IS NOT NULL OR market_cap_proxy IS NOT NULL)";

#[derive(sqlx::FromRow)]
struct ObservationRow {
    symbol: String,
    date: NaiveDate,
    sector: String,
    subsector: Option<String>,
    close: f64,
    volume: Option<f64>,
    market_cap: Option<f64>,
    market_cap_proxy: Option<f64>,
    future_return_1d: Option<f64>,
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Observation {
            symbol: row.symbol,
            date: row.date,
            sector: row.sector,
            subsector: row.subsector,
            close: row.close,
            volume: row.volume,
            market_cap: row.market_cap,
            market_cap_proxy: row.market_cap_proxy,
            future_return_1d: row.future_return_1d,
        }
    }
}

/// Loads the usable observations of one series, date-ordered, optionally
/// restricted to `from` onward (resume buffer).
pub async fn load_observations(
    pool: &SqlitePool,
    series: &SeriesKey,
    from: Option<NaiveDate>,
) -> Result<Vec<Observation>> {
    let mut sql = format!(
        "SELECT symbol, date, sector, subsector, close, volume, market_cap, \
         market_cap_proxy, future_return_1d \
         FROM stock_market_table WHERE {USABLE}"
    );
    sql.push_str(match series.subsector {
        Some(_) => " AND subsector = ?",
        None => " AND sector = ?",
    });
    if from.is_some() {
        sql.push_str(" AND date >= ?");
    }
    sql.push_str(" ORDER BY date, symbol");

    let mut query = sqlx::query_as::<_, ObservationRow>(&sql);
    query = match &series.subsector {
        Some(sub) => query.bind(sub.clone()),
        None => query.bind(series.sector.clone()),
    };
    if let Some(from) = from {
        query = query.bind(from);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Total blended capitalization of a series on one date, or `None` when no
/// usable row exists.
pub async fn blended_capitalization(
    pool: &SqlitePool,
    series: &SeriesKey,
    date: NaiveDate,
    blend: &BlendWeights,
) -> Result<Option<f64>> {
    let sql = format!(
        "SELECT SUM(? * COALESCE(market_cap, 0) + ? * COALESCE(market_cap_proxy, 0)) \
         FROM stock_market_table WHERE {USABLE} AND date = ? AND {}",
        match series.subsector {
            Some(_) => "subsector = ?",
            None => "sector = ?",
        }
    );

    let mut query = sqlx::query_as::<_, (Option<f64>,)>(&sql)
        .bind(blend.true_cap)
        .bind(blend.proxy_cap)
        .bind(date);
    query = match &series.subsector {
        Some(sub) => query.bind(sub.clone()),
        None => query.bind(series.sector.clone()),
    };

    let (cap,) = query.fetch_one(pool).await?;
    Ok(cap)
}

/// Distinct sectors present in the observation table.
pub async fn distinct_sectors(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT sector FROM stock_market_table ORDER BY sector")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

/// Distinct (sector, subsector) pairs present in the observation table.
pub async fn distinct_subsectors(pool: &SqlitePool) -> Result<Vec<SeriesKey>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT sector, subsector FROM stock_market_table \
         WHERE subsector IS NOT NULL ORDER BY sector, subsector",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(sector, sub)| SeriesKey::subsector(sector, sub))
        .collect())
}
