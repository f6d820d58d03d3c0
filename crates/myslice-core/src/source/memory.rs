//! In-memory collaborator for tests and embedding.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::{parse_key, Filter, QueryExecutor, ResultSet, Row, SchemaSource, Select};
use crate::catalog::parse::column_names;
use crate::error::Error;

/// Default `max_allowed_packet` of the in-memory server (16 MiB).
pub const DEFAULT_MAX_ALLOWED_PACKET: usize = 16 * 1024 * 1024;

type Predicate = Box<dyn Fn(&RowView<'_>) -> bool>;

/// A table held by [`MemorySource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTable {
    /// `CREATE TABLE` statement.
    pub create_sql: String,
    /// Column names, derived from the DDL.
    pub columns: Vec<String>,
    /// Table rows in insertion order.
    pub rows: Vec<Row>,
}

impl MemoryTable {
    /// Create an empty table from its DDL.
    pub fn new(create_sql: impl Into<String>) -> Self {
        let create_sql = create_sql.into();
        let columns = column_names(&create_sql);
        Self {
            create_sql,
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row of text values, `None` for NULL.
    pub fn with_row<'a>(mut self, values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        self.rows.push(Row::from_text(values));
        self
    }
}

/// Read access to one row by column name, handed to registered predicates.
pub struct RowView<'a> {
    columns: &'a [String],
    row: &'a Row,
}

impl RowView<'_> {
    /// Value of a column as text, `None` for NULL or unknown columns.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.row.get(index).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Value of a column as an integer key.
    pub fn key(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(|v| parse_key(v.as_bytes()))
    }
}

/// A database held entirely in memory.
///
/// Understands the structured [`Select`]s generated by the engine. Raw SQL
/// predicates and raw queries must be registered up front with
/// [`with_predicate`](Self::with_predicate) and [`with_query`](Self::with_query).
pub struct MemorySource {
    tables: Vec<(String, MemoryTable)>,
    predicates: HashMap<String, Predicate>,
    queries: HashMap<String, ResultSet>,
    max_allowed_packet: usize,
    executed: RefCell<Vec<String>>,
    in_snapshot: Cell<bool>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            predicates: HashMap::new(),
            queries: HashMap::new(),
            max_allowed_packet: DEFAULT_MAX_ALLOWED_PACKET,
            executed: RefCell::new(Vec::new()),
            in_snapshot: Cell::new(false),
        }
    }

    /// Add a table. Tables are listed in insertion order.
    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.tables.push((name.into(), table));
        self
    }

    /// Register how a raw SQL predicate evaluates against a row.
    pub fn with_predicate(
        mut self,
        sql: impl Into<String>,
        predicate: impl Fn(&RowView<'_>) -> bool + 'static,
    ) -> Self {
        self.predicates.insert(sql.into(), Box::new(predicate));
        self
    }

    /// Register the result of a raw query.
    pub fn with_query(mut self, sql: impl Into<String>, result: ResultSet) -> Self {
        self.queries.insert(sql.into(), result);
        self
    }

    /// Set the `max_allowed_packet` reported to the dump writer.
    pub fn with_max_allowed_packet(mut self, bytes: usize) -> Self {
        self.max_allowed_packet = bytes;
        self
    }

    /// Every statement run so far, rendered as SQL.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Check if a snapshot is open.
    pub fn in_snapshot(&self) -> bool {
        self.in_snapshot.get()
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, Error> {
        self.tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
            .ok_or_else(|| Error::Query(format!("Table '{name}' doesn't exist")))
    }

    fn matches(&self, filter: &Filter, view: &RowView<'_>) -> Result<bool, Error> {
        match filter {
            Filter::All => Ok(true),
            Filter::In { column, values } => {
                Ok(view.key(column).is_some_and(|key| values.contains(&key)))
            }
            Filter::And(parts) => {
                for part in parts {
                    if !self.matches(part, view)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Raw(sql) => match self.predicates.get(sql) {
                Some(predicate) => Ok(predicate(view)),
                None => Err(Error::Query(format!("unsupported predicate `{sql}`"))),
            },
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaSource for MemorySource {
    fn list_tables(&self) -> Result<Vec<String>, Error> {
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    fn create_table_lines(&self, table: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .table(table)?
            .create_sql
            .lines()
            .map(str::to_string)
            .collect())
    }
}

impl QueryExecutor for MemorySource {
    fn execute(&self, sql: &str) -> Result<ResultSet, Error> {
        self.executed.borrow_mut().push(sql.to_string());
        self.queries
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::Query(format!("unsupported query `{sql}`")))
    }

    fn select(&self, query: &Select) -> Result<ResultSet, Error> {
        self.executed.borrow_mut().push(query.to_string());
        let table = self.table(&query.table)?;

        let mut rows = Vec::new();
        for row in &table.rows {
            let view = RowView {
                columns: &table.columns,
                row,
            };
            if self.matches(&query.filter, &view)? {
                rows.push(row.clone());
            }
        }

        if let Some(order_by) = &query.order_by {
            let mut parts = order_by.split_whitespace();
            let column = parts.next().unwrap_or_default().trim_matches('`');
            let descending = parts.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
            let index = table
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| Error::Query(format!("Unknown column '{column}'")))?;
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(index), b.get(index));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        if query.columns.is_empty() {
            return Ok(ResultSet::new(table.columns.clone(), rows));
        }
        let indexes = query
            .columns
            .iter()
            .map(|column| {
                table
                    .columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| Error::Query(format!("Unknown column '{column}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let projected = rows
            .iter()
            .map(|row| Row(indexes.iter().map(|i| row.get(*i).map(<[u8]>::to_vec)).collect()))
            .collect();
        Ok(ResultSet::new(query.columns.clone(), projected))
    }

    fn max_allowed_packet(&self) -> Result<usize, Error> {
        Ok(self.max_allowed_packet)
    }

    fn server_version(&self) -> Result<String, Error> {
        Ok(format!("{}-memory", env!("CARGO_PKG_VERSION")))
    }

    fn begin_snapshot(&self) -> Result<(), Error> {
        self.executed
            .borrow_mut()
            .push("START TRANSACTION WITH CONSISTENT SNAPSHOT".to_string());
        self.in_snapshot.set(true);
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        self.executed.borrow_mut().push("ROLLBACK".to_string());
        self.in_snapshot.set(false);
        Ok(())
    }
}

/// Numeric comparison when both sides are integers, bytewise otherwise.
fn compare_values(a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a.and_then(parse_key), b.and_then(parse_key)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::KeySet;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_table(
                "member",
                MemoryTable::new(
                    "CREATE TABLE `member` (\n  `id` int NOT NULL,\n  `org_id` int DEFAULT NULL,\n  `name` varchar(20) NOT NULL,\n  PRIMARY KEY (`id`)\n)",
                )
                .with_row([Some("1"), Some("10"), Some("ann")])
                .with_row([Some("2"), Some("20"), Some("bob")])
                .with_row([Some("3"), None, Some("cat")]),
            )
            .with_predicate("name <> 'bob'", |row| row.get("name") != Some("bob"))
    }

    #[test]
    fn test_schema_source() {
        let src = source();
        assert_eq!(src.list_tables().unwrap(), ["member"]);
        assert_eq!(src.create_table_lines("member").unwrap().len(), 6);
        assert!(src.create_table_lines("nope").is_err());
    }

    #[test]
    fn test_select_in_filter() {
        let src = source();
        let keys: KeySet = [10, 30].into_iter().collect();
        let rs = src
            .select(&Select::column("member", "id").with_filter(Filter::In {
                column: "org_id".into(),
                values: keys,
            }))
            .unwrap();
        assert_eq!(rs.columns, ["id"]);
        assert_eq!(rs.key_set("member", "id").unwrap().len(), 1);
    }

    #[test]
    fn test_select_raw_predicate_order_and_limit() {
        let src = source();
        let rs = src
            .select(
                &Select::column("member", "id")
                    .with_filter(Filter::Raw("name <> 'bob'".into()))
                    .with_order_by("id DESC")
                    .with_limit(1),
            )
            .unwrap();
        assert_eq!(rs.rows, [Row::from_text([Some("3")])]);

        let err = src
            .select(&Select::all("member").with_filter(Filter::Raw("1=1".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_select_column_list() {
        let src = source();
        let rs = src
            .select(&Select::columns("member", ["name", "id"]).with_limit(2))
            .unwrap();
        assert_eq!(rs.columns, ["name", "id"]);
        assert_eq!(
            rs.rows,
            [
                Row::from_text([Some("ann"), Some("1")]),
                Row::from_text([Some("bob"), Some("2")]),
            ]
        );

        let err = src.select(&Select::columns("member", ["shape"])).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_select_each_visits_rows_in_order() {
        let src = source();
        let mut seen = Vec::new();
        src.select_each(&Select::column("member", "id"), &mut |row| {
            seen.push(row.get_str(0).unwrap_or_default().into_owned());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, ["1", "2", "3"]);
    }

    #[test]
    fn test_snapshot_and_log() {
        let src = source();
        src.begin_snapshot().unwrap();
        assert!(src.in_snapshot());
        src.select(&Select::all("member")).unwrap();
        src.rollback().unwrap();
        assert!(!src.in_snapshot());
        assert_eq!(
            src.executed(),
            [
                "START TRANSACTION WITH CONSISTENT SNAPSHOT",
                "SELECT * FROM `member`",
                "ROLLBACK"
            ]
        );
    }
}
