//! Slicing plans: orphan policies plus an ordered list of restriction steps.
//!
//! Plans are JSON documents:
//!
//! ```json
//! {
//!   "expunge_orphans": false,
//!   "tables": { "payment": { "fields": { "order_id": { "expunge_orphans": true } } } },
//!   "steps": [
//!     { "kind": "truncate", "table": "session" },
//!     { "kind": "limit_pks", "table": "organisation", "keys": ["${org_id}"] }
//!   ]
//! }
//! ```
//!
//! `${name}` placeholders in step strings are filled in by [`Plan::substitute`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{Catalog, KeySet};
use crate::error::Error;
use crate::source::{Filter, QueryExecutor};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

fn default_true() -> bool {
    true
}

/// A complete slicing plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Database-level orphan policy for nullable foreign keys.
    #[serde(default = "default_true")]
    pub expunge_orphans: bool,

    /// Per-table policy overrides.
    #[serde(default)]
    pub tables: BTreeMap<String, TablePolicy>,

    /// Restriction steps, run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            expunge_orphans: true,
            tables: BTreeMap::new(),
            steps: Vec::new(),
        }
    }
}

/// Orphan policy overrides of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablePolicy {
    /// Table-level orphan policy.
    #[serde(default)]
    pub expunge_orphans: Option<bool>,

    /// Per-field overrides.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldPolicy>,
}

/// Orphan policy override of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldPolicy {
    /// Field-level orphan policy.
    #[serde(default)]
    pub expunge_orphans: Option<bool>,
}

/// A primary key value, either literal or still holding placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    /// Literal key.
    Int(i64),
    /// Text key, resolved after substitution.
    Text(String),
}

impl KeySpec {
    fn resolve(&self) -> Result<i64, Error> {
        match self {
            KeySpec::Int(key) => Ok(*key),
            KeySpec::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| Error::Plan(format!("`{text}` is not an integer key"))),
        }
    }
}

/// One restriction step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Remove every row of a table.
    Truncate {
        /// Table name.
        table: String,
    },

    /// Keep only the listed primary keys.
    LimitPks {
        /// Table name.
        table: String,
        /// Primary keys to keep.
        keys: Vec<KeySpec>,
    },

    /// Keep the rows matching a raw SQL predicate.
    Limit {
        /// Table name.
        table: String,
        /// SQL `WHERE` expression.
        predicate: String,
        /// Optional `ORDER BY` expression.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_by: Option<String>,
        /// Optional row limit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },

    /// Keep the primary keys returned by the first column of a query.
    LimitQuery {
        /// Table name.
        table: String,
        /// SQL query.
        sql: String,
    },

    /// Restrict one field to the retained primary keys of another table.
    ///
    /// Used for components of composite primary keys, which the cascade
    /// cannot reach on its own. Restricting a table's single primary key
    /// cascades like `limit_pks`.
    RestrictField {
        /// Table of the field.
        table: String,
        /// Field to restrict.
        field: String,
        /// Table whose retained primary keys are copied.
        from_table: String,
    },
}

impl Step {
    /// Short name of the step kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Truncate { .. } => "truncate",
            Step::LimitPks { .. } => "limit_pks",
            Step::Limit { .. } => "limit",
            Step::LimitQuery { .. } => "limit_query",
            Step::RestrictField { .. } => "restrict_field",
        }
    }

    /// Table the step restricts.
    pub fn table(&self) -> &str {
        match self {
            Step::Truncate { table }
            | Step::LimitPks { table, .. }
            | Step::Limit { table, .. }
            | Step::LimitQuery { table, .. }
            | Step::RestrictField { table, .. } => table,
        }
    }

    fn substitute(&mut self, vars: &HashMap<String, String>) -> Result<(), Error> {
        match self {
            Step::Truncate { table } => substitute_in(table, vars),
            Step::LimitPks { table, keys } => {
                substitute_in(table, vars)?;
                for key in keys {
                    if let KeySpec::Text(text) = key {
                        substitute_in(text, vars)?;
                    }
                }
                Ok(())
            }
            Step::Limit {
                table,
                predicate,
                order_by,
                ..
            } => {
                substitute_in(table, vars)?;
                substitute_in(predicate, vars)?;
                if let Some(order_by) = order_by {
                    substitute_in(order_by, vars)?;
                }
                Ok(())
            }
            Step::LimitQuery { table, sql } => {
                substitute_in(table, vars)?;
                substitute_in(sql, vars)
            }
            Step::RestrictField {
                table,
                field,
                from_table,
            } => {
                substitute_in(table, vars)?;
                substitute_in(field, vars)?;
                substitute_in(from_table, vars)
            }
        }
    }

    fn run<E: QueryExecutor + ?Sized>(
        &self,
        catalog: &mut Catalog,
        executor: &E,
        trigger: &str,
    ) -> Result<(), Error> {
        let table = catalog.table_id(self.table())?;
        match self {
            Step::Truncate { .. } => catalog.truncate(executor, table),
            Step::LimitPks { keys, .. } => {
                let keys = keys
                    .iter()
                    .map(KeySpec::resolve)
                    .collect::<Result<KeySet, _>>()?;
                catalog.limit_pks(executor, table, &keys, trigger)
            }
            Step::Limit {
                predicate,
                order_by,
                limit,
                ..
            } => {
                let keys = catalog.limited_pks(
                    executor,
                    table,
                    Filter::Raw(predicate.clone()),
                    order_by.as_deref(),
                    *limit,
                )?;
                catalog.limit_pks(executor, table, &keys, trigger)
            }
            Step::LimitQuery { table: name, sql } => {
                let keys = executor.execute(sql)?.key_set(name, "query")?;
                catalog.limit_pks(executor, table, &keys, trigger)
            }
            Step::RestrictField {
                table: name,
                field,
                from_table,
            } => {
                let field = catalog.field_ref(name, field)?;
                let from = catalog.table_id(from_table)?;
                let Some(keys) = catalog.table(from).retained_pks().cloned() else {
                    warn!(
                        from_table = %from_table,
                        field = %catalog.field_label(field),
                        "source table is unrestricted, nothing to copy"
                    );
                    return Ok(());
                };
                catalog.restrict(executor, field, &keys)?;
                Ok(())
            }
        }
    }
}

/// Replace every `${name}` in `text` with its value from `vars`.
fn substitute_in(text: &mut String, vars: &HashMap<String, String>) -> Result<(), Error> {
    if let Some(missing) = PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|name| !vars.contains_key(name))
    {
        return Err(Error::Plan(format!("no value for placeholder `${{{missing}}}`")));
    }

    let replaced = PLACEHOLDER_RE.replace_all(text, |caps: &Captures<'_>| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    *text = replaced.into_owned();
    Ok(())
}

impl Plan {
    /// Parse a plan from JSON text.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Plan(e.to_string()))
    }

    /// Read a plan from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| Error::Plan(format!("{}: {e}", path.display())))
    }

    /// Fill in `${name}` placeholders of every step.
    pub fn substitute(mut self, vars: &HashMap<String, String>) -> Result<Self, Error> {
        for step in &mut self.steps {
            step.substitute(vars)?;
        }
        Ok(self)
    }

    /// Install the orphan policies on the catalog.
    pub fn apply_policies(&self, catalog: &mut Catalog) -> Result<(), Error> {
        catalog.expunge_orphans = self.expunge_orphans;
        for (name, policy) in &self.tables {
            let id = catalog.table_id(name)?;
            if let Some(expunge) = policy.expunge_orphans {
                catalog.table_mut(id).set_expunge_orphans(expunge);
            }
            for (field, field_policy) in &policy.fields {
                let field = catalog.field_ref(name, field)?;
                if let Some(expunge) = field_policy.expunge_orphans {
                    catalog.field_mut(field).set_expunge_orphans(expunge);
                }
            }
        }
        Ok(())
    }

    /// Run every step in order against the catalog.
    ///
    /// Policies must already be installed with [`apply_policies`](Self::apply_policies).
    pub fn run<E: QueryExecutor + ?Sized>(
        &self,
        catalog: &mut Catalog,
        executor: &E,
    ) -> Result<(), Error> {
        for (i, step) in self.steps.iter().enumerate() {
            let trigger = format!("plan step {} ({})", i + 1, step.kind());
            info!(step = i + 1, kind = step.kind(), table = step.table(), "running step");
            step.run(catalog, executor, &trigger)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, MemoryTable, ResultSet, Row};

    const PLAN: &str = r#"{
        "expunge_orphans": false,
        "tables": {
            "member": { "fields": { "org_id": { "expunge_orphans": true } } }
        },
        "steps": [
            { "kind": "truncate", "table": "session" },
            { "kind": "limit_pks", "table": "org", "keys": [1, "${org_id}"] },
            { "kind": "limit", "table": "member", "predicate": "name <> '${skip}'", "limit": 10 },
            { "kind": "limit_query", "table": "org", "sql": "SELECT id FROM org" },
            { "kind": "restrict_field", "table": "member", "field": "org_id", "from_table": "org" }
        ]
    }"#;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_json() {
        let plan = Plan::from_json(PLAN).unwrap();

        assert!(!plan.expunge_orphans);
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(
            plan.steps[1],
            Step::LimitPks {
                table: "org".into(),
                keys: vec![KeySpec::Int(1), KeySpec::Text("${org_id}".into())],
            }
        );
        assert_eq!(plan.steps[4].kind(), "restrict_field");
        assert_eq!(plan.steps[4].table(), "member");
    }

    #[test]
    fn test_defaults_and_unknown_fields() {
        let plan = Plan::from_json("{}").unwrap();
        assert_eq!(plan, Plan::default());

        let err = Plan::from_json(r#"{ "stepz": [] }"#).unwrap_err();
        assert!(matches!(err, Error::Plan(_)));

        let err = Plan::from_json(r#"{ "steps": [{ "kind": "drop", "table": "t" }] }"#)
            .unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
    }

    #[test]
    fn test_substitute() {
        let plan = Plan::from_json(PLAN)
            .unwrap()
            .substitute(&vars(&[("org_id", "7"), ("skip", "bob")]))
            .unwrap();

        assert_eq!(
            plan.steps[1],
            Step::LimitPks {
                table: "org".into(),
                keys: vec![KeySpec::Int(1), KeySpec::Text("7".into())],
            }
        );
        assert!(matches!(
            &plan.steps[2],
            Step::Limit { predicate, .. } if predicate == "name <> 'bob'"
        ));
    }

    #[test]
    fn test_substitute_missing_placeholder() {
        let err = Plan::from_json(PLAN)
            .unwrap()
            .substitute(&vars(&[("org_id", "7")]))
            .unwrap_err();
        assert!(matches!(err, Error::Plan(msg) if msg.contains("${skip}")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, PLAN).unwrap();

        assert_eq!(Plan::load(&path).unwrap(), Plan::from_json(PLAN).unwrap());
        assert!(matches!(
            Plan::load(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_table(
                "org",
                MemoryTable::new(
                    "CREATE TABLE `org` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n)",
                )
                .with_row([Some("1")])
                .with_row([Some("2")])
                .with_row([Some("3")]),
            )
            .with_table(
                "member",
                MemoryTable::new(
                    "CREATE TABLE `member` (\n  `id` int NOT NULL,\n  `org_id` int DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  CONSTRAINT `m_org` FOREIGN KEY (`org_id`) REFERENCES `org` (`id`)\n)",
                )
                .with_row([Some("10"), Some("1")])
                .with_row([Some("11"), Some("2")])
                .with_row([Some("12"), None]),
            )
            .with_query(
                "SELECT id FROM org WHERE id > 1",
                ResultSet::new(vec!["id".into()], vec![Row::from_text([Some("2")])]),
            )
    }

    fn retained(catalog: &Catalog, table: &str) -> Option<Vec<i64>> {
        catalog
            .table_by_name(table)
            .unwrap()
            .retained_pks()
            .map(|keys| keys.iter().copied().collect())
    }

    #[test]
    fn test_apply_policies() {
        let src = source();
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&src).unwrap();

        let plan = Plan::from_json(
            r#"{ "expunge_orphans": false,
                 "tables": { "member": { "fields": { "org_id": { "expunge_orphans": true } } } } }"#,
        )
        .unwrap();
        plan.apply_policies(&mut catalog).unwrap();

        let org_id = catalog.field_ref("member", "org_id").unwrap();
        assert!(!catalog.expunge_orphans);
        assert!(catalog.expunge_orphans_for(org_id));

        let plan = Plan::from_json(r#"{ "tables": { "nope": {} } }"#).unwrap();
        assert!(matches!(
            plan.apply_policies(&mut catalog),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn test_run_steps() {
        let src = source();
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&src).unwrap();

        let plan = Plan::from_json(
            r#"{ "steps": [
                { "kind": "limit_query", "table": "org", "sql": "SELECT id FROM org WHERE id > 1" }
            ] }"#,
        )
        .unwrap();
        plan.apply_policies(&mut catalog).unwrap();
        plan.run(&mut catalog, &src).unwrap();

        assert_eq!(retained(&catalog, "org"), Some(vec![2]));
        assert_eq!(retained(&catalog, "member"), Some(vec![11]));
    }

    #[test]
    fn test_run_keeps_orphans_when_disabled() {
        let src = source();
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&src).unwrap();

        let plan = Plan::from_json(
            r#"{ "expunge_orphans": false,
                 "steps": [{ "kind": "limit_pks", "table": "org", "keys": ["${org}"] }] }"#,
        )
        .unwrap()
        .substitute(&vars(&[("org", "1")]))
        .unwrap();
        plan.apply_policies(&mut catalog).unwrap();
        plan.run(&mut catalog, &src).unwrap();

        assert_eq!(retained(&catalog, "org"), Some(vec![1]));
        assert_eq!(retained(&catalog, "member"), None);
    }

    #[test]
    fn test_restrict_field_on_single_key_cascades() {
        let src = source().with_table(
            "twin",
            MemoryTable::new("CREATE TABLE `twin` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n)")
                .with_row([Some("1")]),
        );
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&src).unwrap();

        let plan = Plan::from_json(
            r#"{ "steps": [
                { "kind": "limit_pks", "table": "twin", "keys": [1] },
                { "kind": "restrict_field", "table": "org", "field": "id", "from_table": "twin" }
            ] }"#,
        )
        .unwrap();
        plan.run(&mut catalog, &src).unwrap();

        assert_eq!(retained(&catalog, "org"), Some(vec![1]));
        assert_eq!(retained(&catalog, "member"), Some(vec![10]));
    }

    #[test]
    fn test_run_rejects_bad_key() {
        let src = source();
        let mut catalog = Catalog::new("db");
        catalog.parse_tables(&src).unwrap();

        let plan = Plan::from_json(
            r#"{ "steps": [{ "kind": "limit_pks", "table": "org", "keys": ["abc"] }] }"#,
        )
        .unwrap();
        assert!(matches!(plan.run(&mut catalog, &src), Err(Error::Plan(_))));
    }
}
