//! The catalog: every table of one database.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::{debug, info, warn};

use super::field::Field;
use super::foreign_key::ForeignKey;
use super::parse::{parse_field_line, parse_foreign_key_line, FieldLine};
use super::table::Table;
use super::types::{FieldRef, FkRef, QuotingClass, TableId};
use crate::error::{Error, SchemaError};
use crate::source::SchemaSource;

/// Non-fatal problems collected while parsing the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Skipped lines, constraints and fields.
    pub warnings: Vec<SchemaError>,
}

impl ParseReport {
    fn warn(&mut self, error: SchemaError) {
        warn!(%error, "skipping DDL");
        self.warnings.push(error);
    }

    /// Check if the parse was clean.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// The catalog of tables, fields and foreign keys of one database.
///
/// Built once per run; afterwards only field restrictions mutate.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Database name.
    pub name: String,
    /// Database-level orphan policy: expunge rows whose nullable foreign key
    /// points at an excluded row (true) or keep them with the column nulled.
    pub expunge_orphans: bool,
    tables: Vec<Table>,
    table_index: HashMap<String, TableId>,
    table_order: Vec<TableId>,
    pub(crate) restrict_count: u32,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expunge_orphans: true,
            tables: Vec::new(),
            table_index: HashMap::new(),
            table_order: Vec::new(),
            restrict_count: 0,
        }
    }

    /// Create or return a table. Idempotent; keeps first-seen order.
    pub fn add_table(&mut self, name: &str) -> TableId {
        if let Some(id) = self.table_index.get(name) {
            return *id;
        }
        let id = TableId(self.tables.len());
        self.tables.push(Table::new(id, name));
        self.table_index.insert(name.to_string(), id);
        self.table_order.push(id);
        id
    }

    /// Get a table by id.
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    /// Get a mutable table by id.
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    /// Look up a table id by name.
    pub fn table_id(&self, name: &str) -> Result<TableId, Error> {
        self.table_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Look up a table by name.
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.table_index.get(name).map(|id| self.table(*id))
    }

    /// Tables in catalog order (sorted by name after [`parse_tables`](Self::parse_tables)).
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.table_order.iter().map(|id| self.table(*id))
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Resolve `table.field` to a field reference.
    pub fn field_ref(&self, table: &str, field: &str) -> Result<FieldRef, Error> {
        let table_id = self.table_id(table)?;
        let field_id = self.table(table_id).require_field(field)?;
        Ok(FieldRef::new(table_id, field_id))
    }

    /// Get a field by reference.
    pub fn field(&self, field: FieldRef) -> &Field {
        self.table(field.table).field(field.field)
    }

    /// Get a mutable field by reference.
    pub fn field_mut(&mut self, field: FieldRef) -> &mut Field {
        self.table_mut(field.table).field_mut(field.field)
    }

    /// Get a foreign key by reference.
    pub fn foreign_key(&self, fk: FkRef) -> &ForeignKey {
        &self.table(fk.table).foreign_keys()[fk.index]
    }

    /// Number of restriction events so far.
    pub fn restrict_count(&self) -> u32 {
        self.restrict_count
    }

    /// `table.field` label for log lines.
    pub fn field_label(&self, field: FieldRef) -> String {
        format!(
            "{}.{}",
            self.table(field.table).name,
            self.field(field).name
        )
    }

    /// Add a foreign key edge from `local` to `foreign`.
    ///
    /// The local table owns the edge; the foreign table records a back-reference.
    pub fn add_foreign_key(&mut self, fk: ForeignKey) -> FkRef {
        let local = fk.local;
        let foreign_table = fk.foreign.table;
        let index = self.table_mut(local.table).push_foreign_key(fk);
        let fk_ref = FkRef {
            table: local.table,
            index,
        };
        self.field_mut(local).fk = Some(index);
        self.table_mut(foreign_table).push_referencing_fk(fk_ref);
        fk_ref
    }

    /// Resolve the orphan policy of a field: field, then table, then database.
    pub fn expunge_orphans_for(&self, field: FieldRef) -> bool {
        self.field(field)
            .expunge_orphans_override()
            .or_else(|| self.table(field.table).expunge_orphans_override())
            .unwrap_or(self.expunge_orphans)
    }

    /// Discover and parse every table reported by the source.
    ///
    /// Tables referenced by foreign keys are parsed recursively when first seen.
    /// The table order is then sorted by name so dump order does not depend on
    /// discovery order.
    pub fn parse_tables<S: SchemaSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<ParseReport, Error> {
        let mut report = ParseReport::default();
        for name in source.list_tables()? {
            self.goc_table(source, &name, &mut report)?;
        }

        let tables = &self.tables;
        self.table_order
            .sort_by(|a, b| tables[a.0].name.cmp(&tables[b.0].name));

        info!(
            database = %self.name,
            tables = self.tables.len(),
            warnings = report.warnings.len(),
            "schema parsed"
        );
        Ok(report)
    }

    /// Get a table, parsing it from the source if it is not yet known.
    ///
    /// The table is registered before its foreign keys are parsed, so self and
    /// mutual references terminate.
    pub fn goc_table<S: SchemaSource + ?Sized>(
        &mut self,
        source: &S,
        name: &str,
        report: &mut ParseReport,
    ) -> Result<TableId, Error> {
        if let Some(id) = self.table_index.get(name) {
            return Ok(*id);
        }

        let id = self.add_table(name);
        let lines = source.create_table_lines(name)?;
        self.table(id).cache_create_lines(lines);
        self.parse_fields(id, report);
        self.parse_foreign_keys(source, id, report)?;
        Ok(id)
    }

    /// Populate fields and primary key of a table from its cached DDL.
    fn parse_fields(&mut self, id: TableId, report: &mut ParseReport) {
        let lines = self
            .table(id)
            .cached_create_lines()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let table = &mut self.tables[id.0];

        for line in &lines {
            match parse_field_line(line) {
                FieldLine::Column(decl) => {
                    let Some(quoting) = QuotingClass::from_column_type(&decl.column_type) else {
                        report.warn(SchemaError::UnknownColumnType {
                            table: table.name.clone(),
                            field: decl.name,
                            column_type: decl.column_type,
                        });
                        continue;
                    };
                    let nullable = decl.nullable();
                    let field = table.goc_field(&decl.name, &decl.column_type, quoting);
                    field.column_type = decl.column_type;
                    field.quoting = quoting;
                    field.size = decl.size;
                    field.options = decl.options;
                    field.nullable = nullable;
                }
                FieldLine::PrimaryKey(names) => {
                    for name in names {
                        if let Err(error) = table.add_pk_field(&name) {
                            report.warn(error);
                        }
                    }
                }
                FieldLine::Unparsable => report.warn(SchemaError::UnparsableLine {
                    table: table.name.clone(),
                    line: line.clone(),
                }),
                FieldLine::Other => {}
            }
        }

        debug!(
            table = %table.name,
            fields = table.field_count(),
            pk_fields = table.pk_fields().len(),
            "fields parsed"
        );
    }

    /// Parse the `CONSTRAINT ... FOREIGN KEY` lines of a table, recursing into
    /// referenced tables.
    fn parse_foreign_keys<S: SchemaSource + ?Sized>(
        &mut self,
        source: &S,
        id: TableId,
        report: &mut ParseReport,
    ) -> Result<(), Error> {
        let lines = self
            .table(id)
            .cached_create_lines()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let table_name = self.table(id).name.clone();

        for line in &lines {
            let decl = match parse_foreign_key_line(&table_name, line) {
                Ok(Some(decl)) => decl,
                Ok(None) => continue,
                Err(error) => {
                    report.warn(error);
                    continue;
                }
            };

            let Some(local_field) = self.table(id).field_id(&decl.local_field) else {
                report.warn(SchemaError::UnknownField {
                    table: table_name.clone(),
                    field: decl.local_field,
                });
                continue;
            };

            let foreign_table = self.goc_table(source, &decl.foreign_table, report)?;
            let Some(foreign_field) = self.table(foreign_table).field_id(&decl.foreign_field)
            else {
                report.warn(SchemaError::UnknownField {
                    table: decl.foreign_table,
                    field: decl.foreign_field,
                });
                continue;
            };

            let fk = ForeignKey::new(
                decl.name,
                FieldRef::new(id, local_field),
                FieldRef::new(foreign_table, foreign_field),
            )
            .with_on_delete(decl.on_delete)
            .with_on_update(decl.on_update);
            self.add_foreign_key(fk);
        }

        Ok(())
    }

    /// `local -> foreign` label of a foreign key.
    pub fn foreign_key_label(&self, fk: &ForeignKey) -> String {
        format!(
            "{} -> {}",
            self.field_label(fk.local),
            self.field_label(fk.foreign)
        )
    }

    /// Human-readable listing of every table, its fields and foreign keys.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for table in self.tables() {
            let _ = write!(out, "\n\nTable: {}\n\n", table.name);
            for field in table.fields() {
                let _ = writeln!(out, "{}", field.describe());
            }
            if !table.foreign_keys().is_empty() {
                out.push('\n');
                for fk in table.foreign_keys() {
                    let _ = writeln!(
                        out,
                        "{} ON DELETE {} ON UPDATE {}",
                        self.foreign_key_label(fk),
                        fk.on_delete,
                        fk.on_update
                    );
                }
            }
            if !table.referencing_fks().is_empty() {
                out.push('\n');
                for fk in table.referencing_fks() {
                    let _ = writeln!(out, "{}", self.foreign_key_label(self.foreign_key(*fk)));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RefAction;
    use crate::source::{MemorySource, MemoryTable};

    fn source() -> MemorySource {
        MemorySource::new()
            .with_table(
                "member",
                MemoryTable::new(
                    "CREATE TABLE `member` (\n  `id` int(11) NOT NULL,\n  `org_id` int(11) NOT NULL,\n  `name` varchar(50) DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  KEY `org_id` (`org_id`),\n  CONSTRAINT `member_org_fk` FOREIGN KEY (`org_id`) REFERENCES `org` (`id`) ON DELETE CASCADE\n) ENGINE=InnoDB",
                ),
            )
            .with_table(
                "org",
                MemoryTable::new(
                    "CREATE TABLE `org` (\n  `id` int(11) NOT NULL,\n  `parent_id` int(11) DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  CONSTRAINT `org_parent_fk` FOREIGN KEY (`parent_id`) REFERENCES `org` (`id`)\n) ENGINE=InnoDB",
                ),
            )
    }

    #[test]
    fn test_add_table_is_idempotent() {
        let mut catalog = Catalog::new("db");
        let a = catalog.add_table("a");
        let b = catalog.add_table("b");
        assert_eq!(catalog.add_table("a"), a);
        assert_ne!(a, b);
        assert_eq!(catalog.table_count(), 2);
    }

    #[test]
    fn test_parse_tables_builds_graph() {
        let mut catalog = Catalog::new("db");
        let report = catalog.parse_tables(&source()).unwrap();
        assert!(report.is_clean(), "{:?}", report.warnings);

        let names: Vec<_> = catalog.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["member", "org"]);

        let member = catalog.table_by_name("member").unwrap();
        assert_eq!(member.field_count(), 3);
        assert_eq!(member.foreign_keys().len(), 1);
        assert_eq!(member.foreign_keys()[0].on_delete, RefAction::Cascade);
        assert!(!member.field_by_name("org_id").unwrap().nullable);
        assert!(member.field_by_name("name").unwrap().nullable);

        let org = catalog.table_by_name("org").unwrap();
        // member.org_id and the self reference org.parent_id
        assert_eq!(org.referencing_fks().len(), 2);
        assert_eq!(org.pk_fields().len(), 1);
    }

    #[test]
    fn test_foreign_key_links_field() {
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&source()).unwrap();

        let local = catalog.field_ref("member", "org_id").unwrap();
        let index = catalog.field(local).foreign_key_index().unwrap();
        let fk = catalog.foreign_key(FkRef {
            table: local.table,
            index,
        });
        assert_eq!(catalog.foreign_key_label(fk), "member.org_id -> org.id");
    }

    #[test]
    fn test_parse_reports_bad_lines() {
        let source = MemorySource::new().with_table(
            "t",
            MemoryTable::new(
                "CREATE TABLE `t` (\n  `id` int NOT NULL,\n  `shape` geometry NOT NULL,\n  `x`\n  PRIMARY KEY (`id`),\n  CONSTRAINT `c` FOREIGN KEY (`a`, `b`) REFERENCES `u` (`a`, `b`)\n)",
            ),
        );
        let mut catalog = Catalog::new("db");
        let report = catalog.parse_tables(&source).unwrap();

        assert_eq!(report.warnings.len(), 3);
        assert!(matches!(
            &report.warnings[0],
            SchemaError::UnknownColumnType { field, column_type, .. }
                if field == "shape" && column_type == "geometry"
        ));
        assert!(matches!(&report.warnings[1], SchemaError::UnparsableLine { .. }));
        assert!(matches!(
            &report.warnings[2],
            SchemaError::UnparsableForeignKey { .. }
        ));
        assert!(catalog.table_by_name("t").unwrap().field_by_name("shape").is_none());
    }

    #[test]
    fn test_orphan_policy_resolution() {
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&source()).unwrap();
        let field = catalog.field_ref("member", "name").unwrap();

        assert!(catalog.expunge_orphans_for(field));

        catalog.expunge_orphans = false;
        assert!(!catalog.expunge_orphans_for(field));

        catalog.table_mut(field.table).set_expunge_orphans(true);
        assert!(catalog.expunge_orphans_for(field));

        catalog.field_mut(field).set_expunge_orphans(false);
        assert!(!catalog.expunge_orphans_for(field));
    }

    #[test]
    fn test_describe_lists_keys() {
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&source()).unwrap();
        let text = catalog.describe();

        assert!(text.contains("Table: member"));
        assert!(text.contains("member.org_id -> org.id ON DELETE CASCADE ON UPDATE RESTRICT"));
        assert!(text.contains("org.parent_id -> org.id"));
    }
}
