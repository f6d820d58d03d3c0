//! Schema description output.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use myslice_core::Catalog;
use serde_json::{json, Value};

/// Output format for `--describe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescribeFormat {
    /// ASCII tables
    Table,
    /// JSON document
    Json,
    /// Plain text listing
    Text,
}

impl std::fmt::Display for DescribeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescribeFormat::Table => write!(f, "table"),
            DescribeFormat::Json => write!(f, "json"),
            DescribeFormat::Text => write!(f, "text"),
        }
    }
}

/// Describe every table of the catalog.
pub fn describe(catalog: &Catalog, format: DescribeFormat) -> String {
    match format {
        DescribeFormat::Table => describe_tables(catalog),
        DescribeFormat::Json => serde_json::to_string_pretty(&describe_json(catalog))
            .unwrap_or_else(|_| "{}".to_string()),
        DescribeFormat::Text => catalog.describe(),
    }
}

fn describe_tables(catalog: &Catalog) -> String {
    let mut output = String::new();

    for table in catalog.tables() {
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(&format!("Table: {}\n", table.name));

        let mut fields = Table::new();
        fields.set_header(vec!["Field", "Type", "PK", "Nullable", "Quoted", "Options"]);
        for field in table.fields() {
            fields.add_row(vec![
                Cell::new(&field.name),
                Cell::new(field.type_with_size()),
                Cell::new(if field.pk { "yes" } else { "" }),
                Cell::new(if field.nullable { "yes" } else { "" }),
                Cell::new(if field.quoting.is_quoted() { "yes" } else { "" }),
                Cell::new(field.options.as_deref().unwrap_or("")),
            ]);
        }
        output.push_str(&fields.to_string());

        if !table.foreign_keys().is_empty() || !table.referencing_fks().is_empty() {
            let mut fks = Table::new();
            fks.set_header(vec!["Foreign key", "Direction", "On delete", "On update"]);
            for fk in table.foreign_keys() {
                fks.add_row(vec![
                    Cell::new(catalog.foreign_key_label(fk)),
                    Cell::new("out"),
                    Cell::new(fk.on_delete),
                    Cell::new(fk.on_update),
                ]);
            }
            for fk in table.referencing_fks() {
                let fk = catalog.foreign_key(*fk);
                fks.add_row(vec![
                    Cell::new(catalog.foreign_key_label(fk)),
                    Cell::new("in"),
                    Cell::new(fk.on_delete),
                    Cell::new(fk.on_update),
                ]);
            }
            output.push('\n');
            output.push_str(&fks.to_string());
        }
    }

    if output.is_empty() {
        output = "No tables".to_string();
    }
    output
}

fn describe_json(catalog: &Catalog) -> Value {
    let tables: Vec<Value> = catalog
        .tables()
        .map(|table| {
            let fields: Vec<Value> = table
                .fields()
                .map(|field| {
                    json!({
                        "name": field.name,
                        "type": field.column_type,
                        "size": field.size,
                        "pk": field.pk,
                        "nullable": field.nullable,
                        "quoting": field.quoting.to_string(),
                        "options": field.options,
                    })
                })
                .collect();
            let foreign_keys: Vec<Value> = table
                .foreign_keys()
                .iter()
                .map(|fk| {
                    json!({
                        "name": fk.name,
                        "local": catalog.field_label(fk.local),
                        "foreign": catalog.field_label(fk.foreign),
                        "on_delete": fk.on_delete.to_string(),
                        "on_update": fk.on_update.to_string(),
                    })
                })
                .collect();
            json!({
                "name": table.name,
                "fields": fields,
                "foreign_keys": foreign_keys,
            })
        })
        .collect();

    json!({ "database": catalog.name, "tables": tables })
}
