//! SQL dump writer.
//!
//! Output follows the layout of `mysqldump`: a header with session pragmas,
//! then per table the DDL block and the data block, then the restore pragmas.
//! Data rows are packed greedily into multi-row `INSERT` statements that stay
//! below the server's `max_allowed_packet` minus [`PACKET_SAFETY_MARGIN`].

use std::io::Write;
use std::ops::AddAssign;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::catalog::parse::column_names;
use crate::catalog::{Catalog, FieldRef, Table, TableId};
use crate::error::Error;
use crate::quote::quote_identifier;
use crate::source::{QueryExecutor, SchemaSource, Select};

/// Bytes kept free below `max_allowed_packet` for each `INSERT` statement.
pub const PACKET_SAFETY_MARGIN: usize = 1000;

const HEADER_PRAGMAS: &str = "\
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET @OLD_CHARACTER_SET_RESULTS=@@CHARACTER_SET_RESULTS */;
/*!40101 SET @OLD_COLLATION_CONNECTION=@@COLLATION_CONNECTION */;
/*!40101 SET NAMES utf8 */;
/*!40103 SET @OLD_TIME_ZONE=@@TIME_ZONE */;
/*!40103 SET TIME_ZONE='+00:00' */;
/*!40014 SET @OLD_UNIQUE_CHECKS=@@UNIQUE_CHECKS, UNIQUE_CHECKS=0 */;
/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;
/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;
/*!40111 SET @OLD_SQL_NOTES=@@SQL_NOTES, SQL_NOTES=0 */;
";

const FOOTER_PRAGMAS: &str = "\
/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;

/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;
/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;
/*!40014 SET UNIQUE_CHECKS=@OLD_UNIQUE_CHECKS */;
/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;
/*!40101 SET CHARACTER_SET_RESULTS=@OLD_CHARACTER_SET_RESULTS */;
/*!40101 SET COLLATION_CONNECTION=@OLD_COLLATION_CONNECTION */;
/*!40111 SET SQL_NOTES=@OLD_SQL_NOTES */;
";

/// Connection details shown in the dump header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpHeader {
    /// Database host.
    pub host: String,
    /// Database (schema) name.
    pub database: String,
}

impl DumpHeader {
    /// Create a header.
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
        }
    }
}

/// Counters for the data written by a dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpStats {
    /// Rows written.
    pub rows: u64,
    /// `INSERT` statements written.
    pub statements: u64,
    /// Bytes of `INSERT` statements written.
    pub bytes: u64,
}

impl AddAssign for DumpStats {
    fn add_assign(&mut self, other: Self) {
        self.rows += other.rows;
        self.statements += other.statements;
        self.bytes += other.bytes;
    }
}

impl Catalog {
    /// Dump every table in catalog order, framed by the header and footer.
    pub fn dump<S: SchemaSource + QueryExecutor + ?Sized>(
        &self,
        source: &S,
        header: &DumpHeader,
        out: &mut dyn Write,
    ) -> Result<DumpStats, Error> {
        self.dump_at(source, header, out, Local::now().naive_local())
    }

    /// Same as [`dump`](Self::dump) with a fixed completion time.
    pub fn dump_at<S: SchemaSource + QueryExecutor + ?Sized>(
        &self,
        source: &S,
        header: &DumpHeader,
        out: &mut dyn Write,
        completed_at: NaiveDateTime,
    ) -> Result<DumpStats, Error> {
        write!(
            out,
            "-- Myslice Dump\n--\n-- Host: {}    Database: {}\n\
             -- ------------------------------------------------------\n\
             -- Server version {}\n\n",
            header.host,
            header.database,
            source.server_version()?
        )?;
        out.write_all(HEADER_PRAGMAS.as_bytes())?;

        let mut total = DumpStats::default();
        for table in self.tables() {
            total += self.dump_table(source, table.id, out)?;
        }

        out.write_all(FOOTER_PRAGMAS.as_bytes())?;
        writeln!(
            out,
            "\n-- Dump completed on {}",
            completed_at.format("%Y-%m-%d %H:%M:%S")
        )?;

        info!(
            database = %self.name,
            tables = self.table_count(),
            rows = total.rows,
            statements = total.statements,
            "dump completed"
        );
        Ok(total)
    }

    /// Dump one table: DDL block, then its retained rows as `INSERT`s.
    pub fn dump_table<S: SchemaSource + QueryExecutor + ?Sized>(
        &self,
        source: &S,
        id: TableId,
        out: &mut dyn Write,
    ) -> Result<DumpStats, Error> {
        let table = self.table(id);
        let create_lines = match table.cached_create_lines() {
            Some(lines) => lines,
            None => table.cache_create_lines(source.create_table_lines(&table.name)?),
        };
        table.write_create(create_lines, out)?;
        table.write_data_prefix(out)?;

        let stats = if table.field_count() == 0 {
            warn!(table = %table.name, "no dumpable columns, data skipped");
            DumpStats::default()
        } else {
            self.write_rows(source, table, create_lines, out)?
        };

        table.write_data_postfix(out)?;
        info!(
            table = %table.name,
            rows = stats.rows,
            statements = stats.statements,
            "dumped"
        );
        Ok(stats)
    }

    /// Stream the retained rows of a table as packed `INSERT` statements.
    ///
    /// Only columns known to the catalog are selected, so a column whose type
    /// could not be mapped is left out of the dump instead of failing it. The
    /// statements then name their columns so they still load.
    fn write_rows<S: QueryExecutor + ?Sized>(
        &self,
        source: &S,
        table: &Table,
        create_lines: &[String],
        out: &mut dyn Write,
    ) -> Result<DumpStats, Error> {
        let budget = source.max_allowed_packet()?.saturating_sub(PACKET_SAFETY_MARGIN);
        let declared = column_names(&create_lines.join("\n")).len();
        let prefix = if declared == table.field_count() {
            format!("INSERT INTO {} VALUES\n", quote_identifier(&table.name))
        } else {
            let columns: Vec<String> = table.fields().map(|f| quote_identifier(&f.name)).collect();
            warn!(
                table = %table.name,
                skipped = declared.saturating_sub(table.field_count()),
                "dumping without unmapped columns"
            );
            format!(
                "INSERT INTO {} ({}) VALUES\n",
                quote_identifier(&table.name),
                columns.join(",")
            )
        };
        let fields: Vec<FieldRef> = table
            .field_ids()
            .map(|field| FieldRef::new(table.id, field))
            .collect();

        let select = Select::columns(&table.name, table.fields().map(|f| f.name.as_str()))
            .with_filter(table.retained_filter());
        debug!(sql = %select, "selecting rows to dump");

        let mut stats = DumpStats::default();
        let mut statement_len = 0;
        let mut row_sql = Vec::new();
        source.select_each(&select, &mut |row| {
            row_sql.clear();
            row_sql.push(b'(');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    row_sql.push(b',');
                }
                self.write_literal(source, *field, row.get(i), &mut row_sql);
            }
            row_sql.push(b')');

            if stats.rows == 0 {
                out.write_all(prefix.as_bytes())?;
                statement_len = prefix.len();
                stats.statements += 1;
            } else if statement_len + 2 + row_sql.len() < budget {
                out.write_all(b",\n")?;
                statement_len += 2;
            } else {
                // a row larger than the budget still gets a statement of its own
                stats.bytes += statement_len as u64 + 2;
                out.write_all(b";\n")?;
                out.write_all(prefix.as_bytes())?;
                statement_len = prefix.len();
                stats.statements += 1;
            }
            out.write_all(&row_sql)?;
            statement_len += row_sql.len();
            stats.rows += 1;
            Ok(())
        })?;

        if stats.rows > 0 {
            out.write_all(b";\n")?;
            stats.bytes += statement_len as u64 + 2;
        }
        Ok(stats)
    }
}

impl Table {
    fn write_create(&self, create_lines: &[String], out: &mut dyn Write) -> std::io::Result<()> {
        let name = quote_identifier(&self.name);
        write!(
            out,
            "\n--\n-- Table structure for table {name}\n--\n\n\
             DROP TABLE IF EXISTS {name};\n\
             /*!40101 SET @saved_cs_client     = @@character_set_client */;\n\
             /*!40101 SET character_set_client = utf8 */;\n"
        )?;
        writeln!(out, "{};", create_lines.join("\n"))?;
        out.write_all(b"/*!40101 SET character_set_client = @saved_cs_client */;\n")
    }

    fn write_data_prefix(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let name = quote_identifier(&self.name);
        write!(
            out,
            "\n--\n-- Dumping data for table {name}\n--\n\n\
             LOCK TABLES {name} WRITE;\n\
             /*!40000 ALTER TABLE {name} DISABLE KEYS */;\n"
        )
    }

    fn write_data_postfix(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let name = quote_identifier(&self.name);
        write!(
            out,
            "/*!40000 ALTER TABLE {name} ENABLE KEYS */;\nUNLOCK TABLES;\n"
        )
    }
}
