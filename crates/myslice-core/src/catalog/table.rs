//! Table definitions.

use std::cell::OnceCell;
use std::collections::HashMap;

use super::field::Field;
use super::foreign_key::ForeignKey;
use super::types::{FieldId, FkRef, KeySet, QuotingClass, TableId};
use crate::error::{Error, SchemaError};
use crate::source::Filter;

/// A table of the catalog.
#[derive(Debug, Clone)]
pub struct Table {
    /// Position in the owning catalog.
    pub id: TableId,
    /// Table name.
    pub name: String,
    fields: Vec<Field>,
    field_index: HashMap<String, FieldId>,
    pk_fields: Vec<FieldId>,
    foreign_keys: Vec<ForeignKey>,
    referencing_fks: Vec<FkRef>,
    expunge_orphans: Option<bool>,
    restrict_count: u32,
    create_lines: OnceCell<Vec<String>>,
}

impl Table {
    /// Create an empty table.
    pub fn new(id: TableId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fields: Vec::new(),
            field_index: HashMap::new(),
            pk_fields: Vec::new(),
            foreign_keys: Vec::new(),
            referencing_fks: Vec::new(),
            expunge_orphans: None,
            restrict_count: 0,
            create_lines: OnceCell::new(),
        }
    }

    /// Get or create a field by name. New fields are appended in declaration order.
    pub fn goc_field(
        &mut self,
        name: &str,
        column_type: &str,
        quoting: QuotingClass,
    ) -> &mut Field {
        let id = match self.field_index.get(name) {
            Some(id) => *id,
            None => {
                let id = FieldId(self.fields.len());
                self.fields
                    .push(Field::new(self.id, name, column_type, quoting));
                self.field_index.insert(name.to_string(), id);
                id
            }
        };
        &mut self.fields[id.0]
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Field ids in declaration order.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len()).map(FieldId)
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Get a field by id.
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    /// Get a mutable field by id.
    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.0]
    }

    /// Look up a field id by name.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.field_index.get(name).copied()
    }

    /// Look up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.field_id(name).map(|id| self.field(id))
    }

    /// Look up a field id by name, failing with [`Error::UnknownField`].
    pub fn require_field(&self, name: &str) -> Result<FieldId, Error> {
        self.field_id(name).ok_or_else(|| Error::UnknownField {
            table: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// Mark an existing field as part of the primary key.
    pub fn add_pk_field(&mut self, name: &str) -> Result<FieldId, SchemaError> {
        let id = self.field_id(name).ok_or_else(|| SchemaError::UnknownField {
            table: self.name.clone(),
            field: name.to_string(),
        })?;
        if !self.pk_fields.contains(&id) {
            self.pk_fields.push(id);
        }
        self.fields[id.0].pk = true;
        Ok(id)
    }

    /// Primary key fields in key order.
    pub fn pk_fields(&self) -> &[FieldId] {
        &self.pk_fields
    }

    /// The single primary key field used by the restriction cascade.
    ///
    /// Fails with [`Error::MultiplePrimaryKeys`] unless there is exactly one.
    pub fn pk_field(&self) -> Result<FieldId, Error> {
        match self.pk_fields.as_slice() {
            [pk] => Ok(*pk),
            other => Err(Error::MultiplePrimaryKeys {
                table: self.name.clone(),
                count: other.len(),
            }),
        }
    }

    /// Foreign keys owned by this table.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Foreign keys of other tables pointing at this table.
    pub fn referencing_fks(&self) -> &[FkRef] {
        &self.referencing_fks
    }

    pub(crate) fn push_foreign_key(&mut self, fk: ForeignKey) -> usize {
        self.foreign_keys.push(fk);
        self.foreign_keys.len() - 1
    }

    pub(crate) fn push_referencing_fk(&mut self, fk: FkRef) {
        self.referencing_fks.push(fk);
    }

    /// Override the orphan policy for every field of this table.
    pub fn set_expunge_orphans(&mut self, expunge: bool) {
        self.expunge_orphans = Some(expunge);
    }

    /// Table-level orphan policy override, if set.
    pub fn expunge_orphans_override(&self) -> Option<bool> {
        self.expunge_orphans
    }

    /// Number of times this table was restricted.
    pub fn restrict_count(&self) -> u32 {
        self.restrict_count
    }

    pub(crate) fn bump_restrict_count(&mut self) {
        self.restrict_count += 1;
    }

    /// Check if the single primary key has a restriction.
    pub fn is_limited_by_pks(&self) -> bool {
        self.pk_field()
            .map(|pk| self.field(pk).is_restricted())
            .unwrap_or(false)
    }

    /// Retained primary key set, if the table has a single restricted PK.
    pub fn retained_pks(&self) -> Option<&KeySet> {
        self.pk_field()
            .ok()
            .and_then(|pk| self.field(pk).restricted_values())
    }

    /// Filter selecting the retained rows.
    ///
    /// Every restricted primary key component contributes an `IN` filter;
    /// an unrestricted table selects everything.
    pub fn retained_filter(&self) -> Filter {
        let mut parts: Vec<Filter> = self
            .pk_fields
            .iter()
            .map(|id| self.field(*id))
            .filter_map(|f| f.restricted_values().map(|values| f.filter(values)))
            .collect();

        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// Cached `CREATE TABLE` lines, if already fetched.
    pub fn cached_create_lines(&self) -> Option<&[String]> {
        self.create_lines.get().map(Vec::as_slice)
    }

    /// Cache the `CREATE TABLE` lines. The first value wins.
    pub(crate) fn cache_create_lines(&self, lines: Vec<String>) -> &[String] {
        self.create_lines.get_or_init(|| lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> Table {
        let mut t = Table::new(TableId(0), "member");
        t.goc_field("id", "int", QuotingClass::Numeric);
        t.goc_field("org_id", "int", QuotingClass::Numeric);
        t.goc_field("name", "varchar", QuotingClass::StringQuoted);
        t
    }

    #[test]
    fn test_goc_field_is_idempotent() {
        let mut t = member();
        t.goc_field("org_id", "bigint", QuotingClass::Numeric);

        assert_eq!(t.field_count(), 3);
        assert_eq!(t.field_by_name("org_id").unwrap().column_type, "int");
        let names: Vec<_> = t.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "org_id", "name"]);
    }

    #[test]
    fn test_pk_field() {
        let mut t = member();
        assert!(matches!(
            t.pk_field(),
            Err(Error::MultiplePrimaryKeys { count: 0, .. })
        ));

        let id = t.add_pk_field("id").unwrap();
        assert_eq!(t.pk_field().unwrap(), id);
        assert!(t.field(id).pk);

        t.add_pk_field("org_id").unwrap();
        assert!(matches!(
            t.pk_field(),
            Err(Error::MultiplePrimaryKeys { count: 2, .. })
        ));
    }

    #[test]
    fn test_add_pk_field_requires_declared_column() {
        let mut t = member();
        assert_eq!(
            t.add_pk_field("nope"),
            Err(SchemaError::UnknownField {
                table: "member".into(),
                field: "nope".into()
            })
        );
    }

    #[test]
    fn test_retained_filter() {
        let mut t = member();
        let id = t.add_pk_field("id").unwrap();
        assert_eq!(t.retained_filter(), Filter::All);
        assert!(!t.is_limited_by_pks());

        t.field_mut(id).restricted_values = Some([1, 2].into_iter().collect());
        assert!(t.is_limited_by_pks());
        assert_eq!(t.retained_filter().to_string(), "`id` IN (1,2)");
    }

    #[test]
    fn test_retained_filter_composite() {
        let mut t = member();
        let id = t.add_pk_field("id").unwrap();
        let org = t.add_pk_field("org_id").unwrap();
        t.field_mut(id).restricted_values = Some([1].into_iter().collect());
        t.field_mut(org).restricted_values = Some([7].into_iter().collect());

        assert!(!t.is_limited_by_pks());
        assert_eq!(
            t.retained_filter().to_string(),
            "`id` IN (1) AND `org_id` IN (7)"
        );
    }

    #[test]
    fn test_create_lines_cache_first_wins() {
        let t = member();
        assert!(t.cached_create_lines().is_none());
        t.cache_create_lines(vec!["a".into()]);
        t.cache_create_lines(vec!["b".into()]);
        assert_eq!(t.cached_create_lines().unwrap(), ["a".to_string()]);
    }
}
