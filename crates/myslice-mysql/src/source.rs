//! Blocking MySQL collaborator over a single connection.

use std::sync::OnceLock;

use futures::TryStreamExt;
use parking_lot::Mutex;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use myslice_core::{QueryExecutor, ResultSet, Row, SchemaSource, Select};

use crate::config::MySqlConfig;
use crate::error::{Error, Result};

/// A MySQL database reached through one connection.
///
/// The driver is async; a private current-thread runtime blocks on each call.
/// Every statement runs on the same connection so that a snapshot opened with
/// [`begin_snapshot`](QueryExecutor::begin_snapshot) covers all of them.
pub struct MySqlSource {
    rt: Runtime,
    conn: Mutex<Option<MySqlConnection>>,
    max_allowed_packet: OnceLock<usize>,
}

impl MySqlSource {
    /// Connect using the given configuration.
    pub fn connect(config: &MySqlConfig) -> Result<Self> {
        let rt = Builder::new_current_thread().enable_all().build()?;
        let options = config.connect_options()?;
        let conn = rt.block_on(options.connect())?;
        info!(host = %options.get_host(), "connected to MySQL");

        Ok(Self {
            rt,
            conn: Mutex::new(Some(conn)),
            max_allowed_packet: OnceLock::new(),
        })
    }

    /// Run raw SQL and collect every row as text.
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        debug!(sql, "query");
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Protocol("connection closed".to_string()))?;
        let rows = self.rt.block_on(sqlx::raw_sql(sql).fetch_all(conn))?;
        to_result_set(&rows)
    }

    /// Run raw SQL that returns no rows.
    pub fn run(&self, sql: &str) -> Result<()> {
        debug!(sql, "run");
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Protocol("connection closed".to_string()))?;
        self.rt.block_on(sqlx::raw_sql(sql).execute(conn))?;
        Ok(())
    }

    /// First column of the first row as text.
    fn single_value(&self, sql: &str) -> Result<String> {
        self.query(sql)?
            .rows
            .first()
            .and_then(|row| row.get_str(0))
            .map(|value| value.into_owned())
            .ok_or_else(|| Error::Protocol(format!("`{sql}` returned no value")))
    }

    /// Close the connection gracefully.
    pub fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            self.rt.block_on(conn.close())?;
        }
        Ok(())
    }
}

/// Convert driver rows into raw text values.
fn to_result_set(rows: &[MySqlRow]) -> Result<ResultSet> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows.iter().map(to_row).collect::<Result<Vec<_>>>()?;
    Ok(ResultSet::new(columns, rows))
}

/// Raw bytes of every column of a driver row, `None` for NULL.
fn to_row(row: &MySqlRow) -> Result<Row> {
    let values = (0..row.len())
        .map(|i| row.try_get_unchecked::<Option<Vec<u8>>, _>(i))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Row(values))
}

impl SchemaSource for MySqlSource {
    fn list_tables(&self) -> myslice_core::Result<Vec<String>> {
        let result = self.query("SHOW TABLES")?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get_str(0).map(|name| name.into_owned()))
            .collect())
    }

    fn create_table_lines(&self, table: &str) -> myslice_core::Result<Vec<String>> {
        let sql = format!(
            "SHOW CREATE TABLE {}",
            myslice_core::quote::quote_identifier(table)
        );
        let result = self.query(&sql)?;
        let create = result
            .rows
            .first()
            .and_then(|row| row.get_str(1))
            .ok_or_else(|| Error::Protocol(format!("no DDL returned for `{table}`")))?;
        Ok(create.lines().map(str::to_string).collect())
    }
}

impl QueryExecutor for MySqlSource {
    fn execute(&self, sql: &str) -> myslice_core::Result<ResultSet> {
        Ok(self.query(sql)?)
    }

    fn select_each(
        &self,
        query: &Select,
        visit: &mut dyn FnMut(&Row) -> myslice_core::Result<()>,
    ) -> myslice_core::Result<()> {
        let sql = query.to_string();
        debug!(sql = %sql, "streaming select");
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Protocol("connection closed".to_string()))?;

        self.rt.block_on(async {
            let mut rows = sqlx::raw_sql(&sql).fetch(conn);
            while let Some(row) = rows.try_next().await.map_err(Error::Database)? {
                visit(&to_row(&row)?)?;
            }
            Ok::<_, myslice_core::Error>(())
        })
    }

    fn max_allowed_packet(&self) -> myslice_core::Result<usize> {
        if let Some(bytes) = self.max_allowed_packet.get() {
            return Ok(*bytes);
        }
        let value = self.single_value("SELECT @@max_allowed_packet")?;
        let bytes = value.trim().parse().map_err(|_| {
            Error::Protocol(format!("invalid max_allowed_packet `{value}`"))
        })?;
        Ok(*self.max_allowed_packet.get_or_init(|| bytes))
    }

    fn server_version(&self) -> myslice_core::Result<String> {
        Ok(self.single_value("SELECT VERSION()")?)
    }

    fn begin_snapshot(&self) -> myslice_core::Result<()> {
        Ok(self.run("START TRANSACTION WITH CONSISTENT SNAPSHOT")?)
    }

    fn rollback(&self) -> myslice_core::Result<()> {
        Ok(self.run("ROLLBACK")?)
    }
}
