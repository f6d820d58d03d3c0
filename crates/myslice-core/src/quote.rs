//! SQL literal and identifier quoting.

use crate::catalog::{Catalog, FieldRef, FkRef, QuotingClass};
use crate::source::{parse_key, QueryExecutor};

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Escape bytes for use inside a single-quoted MySQL string literal.
///
/// Same character set as `mysql_real_escape_string`: NUL, newline, carriage
/// return, backslash, both quote characters and Control-Z.
pub fn escape_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 8 + 2);
    for &b in raw {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
    out
}

impl Catalog {
    /// Append the SQL literal for `raw` as a value of `field` to `out`.
    ///
    /// NULL input becomes `NULL`. So does a nullable foreign key value that the
    /// referenced table no longer retains: such orphans were kept by the orphan
    /// policy and are nulled to stay referentially consistent. Otherwise string
    /// columns are escaped and quoted and numeric columns are copied verbatim.
    pub fn write_literal<E: QueryExecutor + ?Sized>(
        &self,
        executor: &E,
        field: FieldRef,
        raw: Option<&[u8]>,
        out: &mut Vec<u8>,
    ) {
        let Some(raw) = raw else {
            out.extend_from_slice(b"NULL");
            return;
        };

        if self.is_orphaned(field, raw) {
            out.extend_from_slice(b"NULL");
            return;
        }

        match self.field(field).quoting {
            QuotingClass::StringQuoted => {
                out.push(b'\'');
                out.extend_from_slice(&executor.escape_string(raw));
                out.push(b'\'');
            }
            QuotingClass::Numeric => out.extend_from_slice(raw),
        }
    }

    /// SQL literal for `raw` as a value of `field`.
    pub fn quote<E: QueryExecutor + ?Sized>(
        &self,
        executor: &E,
        field: FieldRef,
        raw: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_literal(executor, field, raw, &mut out);
        out
    }

    /// Check if `raw` is a nullable foreign key value whose referenced row is
    /// excluded from the subset.
    fn is_orphaned(&self, field: FieldRef, raw: &[u8]) -> bool {
        let f = self.field(field);
        if !f.nullable {
            return false;
        }
        let Some(index) = f.foreign_key_index() else {
            return false;
        };
        let fk = self.foreign_key(FkRef {
            table: field.table,
            index,
        });
        match self.field(fk.foreign).restricted_values() {
            // values that are not integers can never be in the retained set
            Some(retained) => !parse_key(raw).is_some_and(|key| retained.contains(&key)),
            None => false,
        }
    }
}
