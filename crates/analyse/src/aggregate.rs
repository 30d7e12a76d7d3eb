//! Block scans producing attribute summaries

use crate::collector::{AttrStats, AttrStatsCollector, IS_ARRAY, KEY, VALUE};
use crate::error::Result;
use crate::paths::{paths_for_version, ScopeAttributePath};
use crate::summary::{BlockSummary, GenericAttrSummary};
use parquetquery::{ColumnIterator, JoinIterator, NotNullPredicate, ParquetFile, RowIterator};
use std::collections::HashMap;
use storage::BlockMeta;
use tracing::{debug, info, warn};

/// Sums attribute sizes and value counts of one scope's key/value columns.
///
/// Any column error aborts the scan; no partial summary is returned.
pub fn aggregate_attributes(
    file: &ParquetFile,
    definition_level: usize,
    key_path: &str,
    value_path: &str,
    is_array_path: Option<&str>,
) -> Result<GenericAttrSummary> {
    let mut iters: Vec<Box<dyn RowIterator<Box<AttrStats>>>> = vec![
        Box::new(ColumnIterator::new(file.clone(), key_path, None, KEY)?),
        Box::new(ColumnIterator::new(file.clone(), value_path, None, VALUE)?),
    ];
    if let Some(path) = is_array_path {
        iters.push(Box::new(ColumnIterator::new(file.clone(), path, None, IS_ARRAY)?));
    }

    let mut join = JoinIterator::new(definition_level, iters, AttrStatsCollector::new());
    let mut summary = GenericAttrSummary::new();

    while let Some(mut row) = join.next()? {
        for (_, stats) in row.other_entries.drain(..) {
            summary.record(&stats);
            join.predicate_mut().put(stats);
        }
    }

    let collector = join.predicate();
    debug!(
        key = key_path,
        kept = collector.kept(),
        dropped = collector.dropped(),
        attributes = summary.attributes.len(),
        arrays = summary.array_attributes.len(),
        "Aggregated attributes"
    );

    Ok(summary)
}

/// Scans the dedicated columns a block assigns to this scope.
///
/// Names come from the block meta in slot order; assignments beyond the
/// version's slot count are skipped.
pub fn aggregate_dedicated_columns(
    file: &ParquetFile,
    meta: &BlockMeta,
    path: &ScopeAttributePath,
) -> Result<GenericAttrSummary> {
    let mut summary = GenericAttrSummary::new();
    let Some(scope) = path.dedicated_scope else {
        return Ok(summary);
    };

    for (slot, column) in meta.dedicated_columns_for(scope).enumerate() {
        let Some(column_path) = path.dedicated_column_paths.get(slot) else {
            warn!(
                block = %meta.block_id,
                scope = %scope,
                name = %column.name,
                slot,
                "No spare column for dedicated attribute"
            );
            continue;
        };

        let (bytes, values) = aggregate_single_column(file, column_path)?;
        summary.total_bytes += bytes;
        summary.attributes.insert(column.name.clone(), bytes);
        summary.cardinality.insert(column.name.clone(), values);
    }

    Ok(summary)
}

/// Byte total and value counts of the non-null values of a column
fn aggregate_single_column(
    file: &ParquetFile,
    column_path: &str,
) -> Result<(u64, HashMap<String, u64>)> {
    let mut iter = ColumnIterator::new(
        file.clone(),
        column_path,
        Some(Box::new(NotNullPredicate)),
        VALUE,
    )?;

    let mut bytes = 0;
    let mut values: HashMap<String, u64> = HashMap::new();
    while let Some((_, value)) = iter.next_value()? {
        bytes += value.byte_len();
        *values.entry(value.to_string()).or_default() += 1;
    }

    Ok((bytes, values))
}

/// Summary of one scope with its dedicated columns merged in
pub fn aggregate_scope(
    file: &ParquetFile,
    meta: &BlockMeta,
    path: &ScopeAttributePath,
) -> Result<GenericAttrSummary> {
    let mut summary = aggregate_attributes(
        file,
        path.definition_level,
        &path.key_path,
        &path.value_path,
        path.is_array_path.as_deref(),
    )?;

    let dedicated = aggregate_dedicated_columns(file, meta, path)?;
    summary.merge_dedicated(dedicated);
    Ok(summary)
}

/// Analyses the span, resource and (when stored) event attributes of a block
pub fn analyse_block(file: &ParquetFile, meta: &BlockMeta) -> Result<BlockSummary> {
    let paths = paths_for_version(&meta.version)?;
    info!(
        block = %meta.block_id,
        version = %paths.version,
        row_groups = file.metadata().num_row_groups(),
        "Scanning block"
    );

    let span = aggregate_scope(file, meta, &paths.span)?;
    let resource = aggregate_scope(file, meta, &paths.resource)?;
    let event = paths
        .event
        .as_ref()
        .map(|path| aggregate_scope(file, meta, path))
        .transpose()?;

    info!(
        block = %meta.block_id,
        span_bytes = span.total_bytes,
        resource_bytes = resource.total_bytes,
        "Finished block"
    );

    Ok(BlockSummary {
        span,
        resource,
        event,
    })
}
