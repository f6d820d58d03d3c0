//! The slicing pipeline: parse, restrict, dump.

use std::io::Write;

use myslice_core::{Catalog, DumpHeader, DumpStats, Plan, QueryExecutor, SchemaSource};
use tracing::{info, warn};

use crate::config::SliceConfig;
use crate::error::Result;

/// Parse the schema and install the orphan policies of the configuration.
pub fn load_catalog<S: SchemaSource + ?Sized>(
    source: &S,
    database: &str,
    config: &SliceConfig,
) -> Result<Catalog> {
    let mut catalog = Catalog::new(database);
    let report = catalog.parse_tables(source)?;
    if !report.is_clean() {
        warn!(
            warnings = report.warnings.len(),
            "schema parsed with warnings, affected lines were skipped"
        );
    }

    config.plan.apply_policies(&mut catalog)?;
    if let Some(expunge) = config.expunge_orphans {
        catalog.expunge_orphans = expunge;
    }
    Ok(catalog)
}

/// Run the plan inside a consistent snapshot and dump the result.
///
/// The snapshot is rolled back whether or not the run succeeds.
pub fn run_slice<S: SchemaSource + QueryExecutor + ?Sized>(
    source: &S,
    catalog: &mut Catalog,
    plan: &Plan,
    header: &DumpHeader,
    out: &mut dyn Write,
) -> Result<DumpStats> {
    source.begin_snapshot()?;
    let result = plan
        .run(catalog, source)
        .and_then(|()| catalog.dump(source, header, out));
    let rollback = source.rollback();

    let stats = result?;
    rollback?;
    out.flush()?;

    info!(
        restrictions = catalog.restrict_count(),
        rows = stats.rows,
        statements = stats.statements,
        bytes = stats.bytes,
        "slice written"
    );
    Ok(stats)
}
