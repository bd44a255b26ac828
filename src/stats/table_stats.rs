//! Per-table statistics for scan costing and selectivity estimation.

use std::sync::Arc;

use super::histogram::{IntHistogram, StringHistogram};
use crate::buffer::BufferError;
use crate::engine::Engine;
use crate::executor::Op;
use crate::heap::{HeapFile, HeapScan};
use crate::storage::TableId;
use crate::tuple::{Field, FieldType, TupleDesc};
use crate::tx::TransactionId;

/// Number of histogram buckets per column.
pub const NUM_HIST_BINS: usize = 100;

/// Default cost charged per page of sequential I/O.
pub const DEFAULT_IO_COST_PER_PAGE: f64 = 1000.0;

/// Histogram for one column, tagged by the column's type.
enum ColumnStats {
    Int(IntHistogram),
    Str(StringHistogram),
}

/// Statistics over one table: per-column histograms, the tuple count,
/// and a scan cost model.
///
/// Building runs two scans of the table under a fresh transaction: one
/// to find each integer column's min and max, one to populate the
/// histograms. The transaction commits once the build finishes, so its
/// read locks do not outlive the build.
pub struct TableStats {
    file: Arc<HeapFile>,
    columns: Vec<ColumnStats>,
    total_tuples: i64,
    io_cost_per_page: f64,
}

impl TableStats {
    /// Builds statistics for `table`.
    ///
    /// # Errors
    ///
    /// Propagates scan failures (lock timeouts, pool errors).
    pub fn build(
        engine: &Engine,
        table: TableId,
        io_cost_per_page: f64,
    ) -> Result<TableStats, BufferError> {
        let file = engine.catalog().file(table)?;
        let desc = file.desc().clone();
        let tid = TransactionId::new();

        let result = Self::scan_and_build(engine, &file, &desc, tid, io_cost_per_page);
        match &result {
            Ok(_) => engine.commit(tid)?,
            Err(_) => engine.abort(tid)?,
        }
        result
    }

    fn scan_and_build(
        engine: &Engine,
        file: &Arc<HeapFile>,
        desc: &TupleDesc,
        tid: TransactionId,
        io_cost_per_page: f64,
    ) -> Result<TableStats, BufferError> {
        let num_fields = desc.num_fields();

        // First pass: integer column ranges.
        let mut min = vec![i32::MAX; num_fields];
        let mut max = vec![i32::MIN; num_fields];
        let mut scan = HeapScan::new(Arc::clone(file), Arc::clone(engine.pool()), tid);
        scan.open();
        while let Some(tuple) = scan.next()? {
            for (i, field) in tuple.fields().iter().enumerate() {
                if let Field::Int(v) = field {
                    min[i] = min[i].min(*v);
                    max[i] = max[i].max(*v);
                }
            }
        }

        let mut columns: Vec<ColumnStats> = (0..num_fields)
            .map(|i| match desc.field_type(i) {
                FieldType::Int => {
                    ColumnStats::Int(IntHistogram::new(NUM_HIST_BINS, min[i], max[i]))
                }
                FieldType::String => ColumnStats::Str(StringHistogram::new(NUM_HIST_BINS)),
            })
            .collect();

        // Second pass: populate.
        let mut total_tuples = 0;
        scan.rewind();
        while let Some(tuple) = scan.next()? {
            total_tuples += 1;
            for (column, field) in columns.iter_mut().zip(tuple.fields()) {
                match (column, field) {
                    (ColumnStats::Int(h), Field::Int(v)) => h.add_value(*v),
                    (ColumnStats::Str(h), Field::String(s)) => h.add_value(s),
                    _ => {}
                }
            }
        }
        scan.close();

        Ok(TableStats {
            file: Arc::clone(file),
            columns,
            total_tuples,
            io_cost_per_page,
        })
    }

    /// Estimated cost of a full sequential scan: every page costs one
    /// page I/O, however few tuples it holds.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.io_cost_per_page * self.file.num_pages() as f64
    }

    /// Estimated number of tuples surviving a predicate of the given
    /// selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> i64 {
        (selectivity * self.total_tuples as f64).round() as i64
    }

    /// Estimated selectivity of `column op constant`.
    ///
    /// A type mismatch between the column's histogram and the constant
    /// answers 1.0, the safe over-estimate.
    pub fn estimate_selectivity(&self, column: usize, op: Op, constant: &Field) -> f64 {
        match (&self.columns[column], constant) {
            (ColumnStats::Int(h), Field::Int(v)) => h.estimate_selectivity(op, *v),
            (ColumnStats::Str(h), Field::String(s)) => h.estimate_selectivity(op, s),
            _ => 1.0,
        }
    }

    /// Returns the total number of tuples in the table.
    pub fn total_tuples(&self) -> i64 {
        self.total_tuples
    }
}
