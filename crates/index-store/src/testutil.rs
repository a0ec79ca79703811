use chrono::NaiveDate;
use sqlx::SqlitePool;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_observation(
    pool: &SqlitePool,
    symbol: &str,
    date: NaiveDate,
    sector: &str,
    subsector: Option<&str>,
    close: Option<f64>,
    volume: Option<f64>,
    market_cap: Option<f64>,
    market_cap_proxy: Option<f64>,
) {
    sqlx::query(
        "INSERT INTO stock_market_table \
         (symbol, date, sector, subsector, close, volume, market_cap, market_cap_proxy) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(symbol)
    .bind(date)
    .bind(sector)
    .bind(subsector)
    .bind(close)
    .bind(volume)
    .bind(market_cap)
    .bind(market_cap_proxy)
    .execute(pool)
    .await
    .unwrap();
}
