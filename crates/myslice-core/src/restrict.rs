//! Restriction engine: primary key sets narrowed along foreign keys.
//!
//! Restricting a table's primary key set shrinks every table holding a
//! foreign key into it, recursively, until no field reports a change:
//!
//! - A primary key field intersects its retained set with the candidates and
//!   reports whether the set changed.
//! - A foreign key field is converted into a primary key restriction of its own
//!   table by selecting the rows whose value is in the allowed set, unless it
//!   is nullable and its orphan policy keeps orphans.
//!
//! Sets only ever shrink, so cyclic foreign key graphs terminate without a
//! visited set.

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, FieldRef, KeySet, TableId};
use crate::error::Error;
use crate::source::{Filter, QueryExecutor, Select};

impl Catalog {
    /// Restrict a field to `values`.
    ///
    /// Returns `false` when a primary key field's retained set did not change
    /// (fixed point) and `true` otherwise:
    ///
    /// - The single primary key of a table is limited like
    ///   [`limit_pks`](Self::limit_pks), cascading to every referencing table.
    /// - A component of a composite primary key is narrowed in place.
    /// - Any other field is turned into a primary key restriction of its table
    ///   and always returns `true`.
    pub fn restrict<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        field: FieldRef,
        values: &KeySet,
    ) -> Result<bool, Error> {
        if self.field(field).pk {
            if self.table(field.table).pk_field().ok() == Some(field.field) {
                let trigger = self.field_label(field);
                return self.cascade_pks(executor, field.table, values, &trigger);
            }
            return Ok(self.restrict_pk(field, values));
        }

        if self.field(field).nullable && !self.expunge_orphans_for(field) {
            debug!(
                field = %self.field_label(field),
                "keeping orphans of nullable foreign key"
            );
            return Ok(true);
        }

        let trigger = self.field_label(field);
        let filter = self.field(field).filter(values);
        match self.limit(executor, field.table, filter, &trigger) {
            Err(Error::MultiplePrimaryKeys { table, count }) => {
                warn!(
                    %table,
                    count,
                    trigger = %trigger,
                    "cannot cascade into table without a single primary key, branch abandoned"
                );
            }
            other => other?,
        }
        Ok(true)
    }

    /// Intersect a primary key field's retained set with `values`.
    fn restrict_pk(&mut self, field: FieldRef, values: &KeySet) -> bool {
        let f = self.field_mut(field);
        match &f.restricted_values {
            Some(current) => {
                let narrowed: KeySet = current.intersection(values).copied().collect();
                if narrowed.len() == current.len() {
                    return false;
                }
                f.restricted_values = Some(narrowed);
            }
            None => f.restricted_values = Some(values.clone()),
        }
        true
    }

    /// Limit a table to the given primary keys and cascade to every table
    /// referencing it.
    pub fn limit_pks<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        table: TableId,
        pk_values: &KeySet,
        trigger: &str,
    ) -> Result<(), Error> {
        self.cascade_pks(executor, table, pk_values, trigger)?;
        Ok(())
    }

    /// Narrow a table's single primary key and, if it changed, restrict the
    /// local field of every referencing foreign key to the retained set.
    fn cascade_pks<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        table: TableId,
        pk_values: &KeySet,
        trigger: &str,
    ) -> Result<bool, Error> {
        self.restrict_count += 1;
        self.table_mut(table).bump_restrict_count();
        info!(
            table = %self.table(table).name,
            count = self.restrict_count,
            rows = pk_values.len(),
            trigger,
            "limited"
        );

        let pk = FieldRef::new(table, self.table(table).pk_field()?);
        if !self.restrict_pk(pk, pk_values) {
            return Ok(false);
        }

        let retained = self.field(pk).restricted_values().cloned().unwrap_or_default();
        let referencing = self.table(table).referencing_fks().to_vec();
        for fk in referencing {
            let local = self.foreign_key(fk).local;
            self.restrict(executor, local, &retained)?;
        }
        Ok(true)
    }

    /// Limit a table to the rows matching a filter.
    pub fn limit<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        table: TableId,
        filter: Filter,
        trigger: &str,
    ) -> Result<(), Error> {
        let pk_values = self.limited_pks(executor, table, filter, None, None)?;
        self.limit_pks(executor, table, &pk_values, trigger)
    }

    /// Limit a table with a raw SQL predicate.
    pub fn limit_where<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        table: TableId,
        predicate: &str,
        trigger: &str,
    ) -> Result<(), Error> {
        self.limit(executor, table, Filter::Raw(predicate.to_string()), trigger)
    }

    /// Primary keys of the rows matching a filter.
    pub fn limited_pks<E: QueryExecutor + ?Sized>(
        &self,
        executor: &E,
        table: TableId,
        filter: Filter,
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<KeySet, Error> {
        let t = self.table(table);
        let pk = t.field(t.pk_field()?);

        let mut select = Select::column(&t.name, &pk.name).with_filter(filter);
        if let Some(order_by) = order_by {
            select = select.with_order_by(order_by);
        }
        if let Some(limit) = limit {
            select = select.with_limit(limit);
        }
        debug!(sql = %select, "selecting limited keys");

        executor.select(&select)?.key_set(&t.name, &pk.name)
    }

    /// Remove every row of a table, cascading to referencing tables.
    pub fn truncate<E: QueryExecutor + ?Sized>(
        &mut self,
        executor: &E,
        table: TableId,
    ) -> Result<(), Error> {
        self.limit_pks(executor, table, &KeySet::new(), "manual truncate")
    }
}
