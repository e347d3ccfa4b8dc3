//! PostgreSQL relational sink.

use crate::domain::config_validation as check;
use crate::domain::daily_record::{DailyRecord, StoredRecord};
use crate::domain::error::PipelineError;
use crate::domain::loader::{LoadBatch, LoadMode};
use crate::ports::config_port::ConfigPort;
use crate::ports::sink_port::SinkPort;
use chrono::{NaiveDate, NaiveDateTime};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Config, NoTls};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::debug;

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
    schema: String,
    table: String,
}

fn query_err(e: postgres::Error) -> PipelineError {
    PipelineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Creation races between concurrent runs surface as one of these.
fn is_already_exists(e: &postgres::Error) -> bool {
    matches!(
        e.code(),
        Some(code) if *code == SqlState::DUPLICATE_SCHEMA
            || *code == SqlState::DUPLICATE_TABLE
            || *code == SqlState::UNIQUE_VIOLATION
    )
}

fn connection_config(config: &dyn ConfigPort) -> Result<Config, PipelineError> {
    if let Some(conninfo) = config.get_string("database", "conninfo") {
        return conninfo
            .parse::<Config>()
            .map_err(|e| PipelineError::ConfigInvalid {
                section: "database".into(),
                key: "conninfo".into(),
                reason: e.to_string(),
            });
    }

    let host = config
        .get_string("database", "host")
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: "database".into(),
            key: "conninfo".into(),
        })?;
    let mut pg = Config::new();
    pg.host(&host)
        .port(check::port(config, "database", "port", 5432)?);
    if let Some(user) = config.get_string("database", "user") {
        pg.user(&user);
    }
    if let Some(password) = config.get_string("database", "password") {
        pg.password(password);
    }
    if let Some(dbname) = config.get_string("database", "dbname") {
        pg.dbname(&dbname);
    }
    Ok(pg)
}

impl PostgresAdapter {
    /// `schema` and `table` must already be validated identifiers.
    pub fn from_config(
        config: &dyn ConfigPort,
        schema: &str,
        table: &str,
    ) -> Result<Self, PipelineError> {
        let pg = connection_config(config)?;
        let pool_size = check::positive_int(config, "database", "pool_size", 4)?;
        let pool_size = u32::try_from(pool_size).unwrap_or(u32::MAX);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(pg, NoTls))
            .map_err(|e| PipelineError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, PipelineError> {
        self.pool.get().map_err(|e| PipelineError::Database {
            reason: e.to_string(),
        })
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl SinkPort for PostgresAdapter {
    fn ensure_schema(&self) -> Result<(), PipelineError> {
        let mut client = self.conn()?;
        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    symbol text,
                    date date,
                    open double precision,
                    high double precision,
                    low double precision,
                    close double precision,
                    volume bigint,
                    date_time_dag_run timestamp
                )",
                self.qualified()
            ),
        ];
        for statement in &statements {
            match client.batch_execute(statement) {
                Ok(()) => {}
                Err(e) if is_already_exists(&e) => {
                    debug!(error = %e, "relation already exists");
                }
                Err(e) => return Err(query_err(e)),
            }
        }
        Ok(())
    }

    fn insert_batch(&self, batch: &LoadBatch, mode: LoadMode) -> Result<usize, PipelineError> {
        let mut client = self.conn()?;
        let mut tx = client.transaction().map_err(query_err)?;
        let stamp: NaiveDateTime = batch.committed_at.naive_utc();
        let table = self.qualified();
        let delete = format!("DELETE FROM {table} WHERE symbol = $1 AND date = $2");
        let insert = format!(
            "INSERT INTO {table} (symbol, date, open, high, low, close, volume, date_time_dag_run)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );

        for record in &batch.records {
            if mode == LoadMode::Upsert {
                tx.execute(&delete, &[&record.symbol, &record.date])
                    .map_err(query_err)?;
            }
            let params: &[&(dyn ToSql + Sync)] = &[
                &record.symbol,
                &record.date,
                &record.open,
                &record.high,
                &record.low,
                &record.close,
                &record.volume,
                &stamp,
            ];
            tx.execute(&insert, params).map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(batch.len())
    }

    fn query_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StoredRecord>, PipelineError> {
        let mut client = self.conn()?;
        let query = format!(
            "SELECT symbol, date, open, high, low, close, volume, date_time_dag_run
             FROM {}
             WHERE date >= $1 AND date < $2
             ORDER BY date ASC, symbol ASC, date_time_dag_run ASC",
            self.qualified()
        );
        let rows = client.query(&query, &[&start, &end]).map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let stamp: NaiveDateTime = row.get(7);
                StoredRecord {
                    record: DailyRecord {
                        symbol: row.get(0),
                        date: row.get(1),
                        open: row.get(2),
                        high: row.get(3),
                        low: row.get(4),
                        close: row.get(5),
                        volume: row.get(6),
                    },
                    committed_at: stamp.and_utc(),
                }
            })
            .collect())
    }
}
