//! SQLite relational sink.
//!
//! SQLite has no schemas, so the configured schema becomes a table name prefix:
//! `stocks` + `daily_ticker` is stored as `stocks_daily_ticker`.

use crate::domain::config_validation as check;
use crate::domain::daily_record::{DailyRecord, StoredRecord};
use crate::domain::error::PipelineError;
use crate::domain::loader::{LoadBatch, LoadMode};
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::SinkPort;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    table: String,
}

fn db_err(e: r2d2::Error) -> PipelineError {
    PipelineError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PipelineError {
    PipelineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(value: &str, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(value.len(), rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteAdapter {
    /// `schema` and `table` must already be validated identifiers.
    pub fn from_config(
        config: &dyn ConfigPort,
        schema: &str,
        table: &str,
    ) -> Result<Self, PipelineError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PipelineError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = check::positive_int(config, "sqlite", "pool_size", 4)?;
        let pool_size = u32::try_from(pool_size).unwrap_or(u32::MAX);

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        Ok(Self {
            pool,
            table: format!("{schema}_{table}"),
        })
    }

    pub fn in_memory(schema: &str, table: &str) -> Result<Self, PipelineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        Ok(Self {
            pool,
            table: format!("{schema}_{table}"),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PipelineError> {
        self.pool.get().map_err(db_err)
    }
}

impl SinkPort for SqliteAdapter {
    fn ensure_schema(&self) -> Result<(), PipelineError> {
        let conn = self.conn()?;
        let table = &self.table;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume INTEGER,
                date_time_dag_run TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_date_symbol ON {table}(date, symbol);"
        ))
        .map_err(query_err)?;
        debug!(table = %table, "schema ensured");
        Ok(())
    }

    fn insert_batch(&self, batch: &LoadBatch, mode: LoadMode) -> Result<usize, PipelineError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let stamp = batch
            .committed_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        for record in &batch.records {
            let date = record.date.format("%Y-%m-%d").to_string();
            if mode == LoadMode::Upsert {
                tx.execute(
                    &format!("DELETE FROM {} WHERE symbol = ?1 AND date = ?2", self.table),
                    params![record.symbol, date],
                )
                .map_err(query_err)?;
            }
            tx.execute(
                &format!(
                    "INSERT INTO {} (symbol, date, open, high, low, close, volume, date_time_dag_run)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    self.table
                ),
                params![
                    record.symbol,
                    date,
                    record.open,
                    record.high,
                    record.low,
                    record.close,
                    record.volume,
                    stamp
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(batch.len())
    }

    fn query_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StoredRecord>, PipelineError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT symbol, date, open, high, low, close, volume, date_time_dag_run
             FROM {}
             WHERE date >= ?1 AND date < ?2
             ORDER BY date ASC, symbol ASC, date_time_dag_run ASC",
            self.table
        );

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string()
                ],
                |row| {
                    let date_str: String = row.get(1)?;
                    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                        .map_err(|e| conversion_err(&date_str, e))?;
                    let stamp_str: String = row.get(7)?;
                    let committed_at = DateTime::parse_from_rfc3339(&stamp_str)
                        .map_err(|e| conversion_err(&stamp_str, e))?
                        .with_timezone(&Utc);
                    Ok(StoredRecord {
                        record: DailyRecord {
                            symbol: row.get(0)?,
                            date,
                            open: row.get(2)?,
                            high: row.get(3)?,
                            low: row.get(4)?,
                            close: row.get(5)?,
                            volume: row.get(6)?,
                        },
                        committed_at,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_window::RunWindow;
    use chrono::TimeZone;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap()
    }

    fn batch(day: u32, stamp: i64, high: f64) -> LoadBatch {
        let full = DailyRecord {
            symbol: "AMZN".into(),
            date: date(day),
            open: Some(120.0),
            high: Some(high),
            low: Some(119.0),
            close: Some(121.0),
            volume: Some(1000),
        };
        LoadBatch {
            window: RunWindow::new(date(day)).unwrap(),
            committed_at: Utc.timestamp_opt(stamp, 0).unwrap(),
            records: vec![full, DailyRecord::empty("GOOG", date(day))],
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory("stocks", "daily_ticker").unwrap();
        adapter.ensure_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig, "stocks", "daily_ticker") {
            Err(PipelineError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn table_name_is_prefixed_with_schema() {
        let adapter = SqliteAdapter::in_memory("stocks", "daily_ticker").unwrap();
        assert_eq!(adapter.table_name(), "stocks_daily_ticker");
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let adapter = adapter();
        adapter.ensure_schema().unwrap();
    }

    #[test]
    fn insert_and_query_preserves_nulls_and_stamp() {
        let adapter = adapter();
        assert_eq!(adapter.insert_batch(&batch(5, 1_686_000_000, 122.0), LoadMode::Append).unwrap(), 2);

        let rows = adapter.query_range(date(5), date(10)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.symbol, "AMZN");
        assert_eq!(rows[0].record.volume, Some(1000));
        assert!(rows[1].record.is_empty());
        assert_eq!(rows[0].committed_at, rows[1].committed_at);
        assert_eq!(rows[0].committed_at, Utc.timestamp_opt(1_686_000_000, 0).unwrap());
    }

    #[test]
    fn append_keeps_every_run() {
        let adapter = adapter();
        adapter.insert_batch(&batch(5, 100, 122.0), LoadMode::Append).unwrap();
        adapter.insert_batch(&batch(5, 200, 122.0), LoadMode::Append).unwrap();
        let rows = adapter.query_range(date(5), date(6)).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].committed_at < rows[1].committed_at);
    }

    #[test]
    fn upsert_replaces_same_symbol_and_date() {
        let adapter = adapter();
        adapter.insert_batch(&batch(5, 100, 122.0), LoadMode::Append).unwrap();
        adapter.insert_batch(&batch(5, 200, 130.0), LoadMode::Upsert).unwrap();
        let rows = adapter.query_range(date(5), date(6)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.high, Some(130.0));
    }

    #[test]
    fn query_range_excludes_end() {
        let adapter = adapter();
        adapter.insert_batch(&batch(5, 100, 122.0), LoadMode::Append).unwrap();
        adapter.insert_batch(&batch(9, 100, 122.0), LoadMode::Append).unwrap();
        assert_eq!(adapter.query_range(date(5), date(9)).unwrap().len(), 2);
        assert_eq!(adapter.query_range(date(5), date(10)).unwrap().len(), 4);
    }
}
