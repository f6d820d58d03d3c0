//! Line grammar for MySQL `SHOW CREATE TABLE` output.

use std::sync::LazyLock;

use regex::Regex;

use super::foreign_key::RefAction;
use crate::error::SchemaError;

static COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+`([^`]+)` ([^ (,]+)(\(([^)]*)\))?( (.+?))?,?$").expect("valid column regex")
});

static PRIMARY_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PRIMARY KEY +\(([^)]+)\)").expect("valid primary key regex"));

static FOREIGN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"CONSTRAINT `([^`]+)` FOREIGN KEY \(`([^`]+)`\) REFERENCES `([^`]+)` \(`([^`]+)`\)",
    )
    .expect("valid foreign key regex")
});

static REF_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" ON (DELETE|UPDATE) (RESTRICT|CASCADE|SET NULL|NO ACTION|SET DEFAULT)")
        .expect("valid referential action regex")
});

/// A parsed column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnDecl {
    pub name: String,
    pub column_type: String,
    pub size: Option<u32>,
    pub options: Option<String>,
}

impl ColumnDecl {
    /// Nullable unless the options say `NOT NULL`.
    pub fn nullable(&self) -> bool {
        !self
            .options
            .as_deref()
            .is_some_and(|o| o.contains("NOT NULL"))
    }
}

/// A parsed `CONSTRAINT ... FOREIGN KEY` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ForeignKeyDecl {
    pub name: String,
    pub local_field: String,
    pub foreign_table: String,
    pub foreign_field: String,
    pub on_delete: RefAction,
    pub on_update: RefAction,
}

/// Classification of one line of a table body, for the fields pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldLine {
    Column(ColumnDecl),
    PrimaryKey(Vec<String>),
    /// A line that looks like a column declaration but does not parse.
    Unparsable,
    /// Index, constraint, header or footer line.
    Other,
}

pub(crate) fn parse_field_line(line: &str) -> FieldLine {
    if let Some(caps) = COLUMN_RE.captures(line) {
        return FieldLine::Column(ColumnDecl {
            name: caps[1].to_string(),
            column_type: caps[2].to_string(),
            size: caps.get(4).and_then(|m| parse_size(m.as_str())),
            options: caps.get(6).map(|m| m.as_str().to_string()),
        });
    }

    if let Some(caps) = PRIMARY_KEY_RE.captures(line) {
        let names = caps[1]
            .split(',')
            .map(|pk| pk.trim().trim_matches('`').to_string())
            .filter(|pk| !pk.is_empty())
            .collect();
        return FieldLine::PrimaryKey(names);
    }

    if line.trim_start().starts_with('`') {
        FieldLine::Unparsable
    } else {
        FieldLine::Other
    }
}

/// Parse a `CONSTRAINT` line of `table`. `Ok(None)` for lines that are not
/// constraints.
pub(crate) fn parse_foreign_key_line(
    table: &str,
    line: &str,
) -> Result<Option<ForeignKeyDecl>, SchemaError> {
    if !line.contains("CONSTRAINT") {
        return Ok(None);
    }
    let caps = FOREIGN_KEY_RE
        .captures(line)
        .ok_or_else(|| SchemaError::UnparsableForeignKey {
            table: table.to_string(),
            line: line.to_string(),
        })?;

    let mut decl = ForeignKeyDecl {
        name: caps[1].to_string(),
        local_field: caps[2].to_string(),
        foreign_table: caps[3].to_string(),
        foreign_field: caps[4].to_string(),
        on_delete: RefAction::default(),
        on_update: RefAction::default(),
    };

    for action in REF_ACTION_RE.captures_iter(line) {
        let parsed: RefAction = action[2].parse()?;
        match &action[1] {
            "DELETE" => decl.on_delete = parsed,
            _ => decl.on_update = parsed,
        }
    }

    Ok(Some(decl))
}

/// Column names declared in a `CREATE TABLE` statement, in order.
pub(crate) fn column_names(create_sql: &str) -> Vec<String> {
    create_sql
        .lines()
        .filter_map(|line| match parse_field_line(line) {
            FieldLine::Column(decl) => Some(decl.name),
            _ => None,
        })
        .collect()
}

/// Leading integer of a size spec: `11` -> 11, `10,2` -> 10, `'a','b'` -> None.
fn parse_size(spec: &str) -> Option<u32> {
    spec.split(',').next()?.trim().parse().ok()
}
