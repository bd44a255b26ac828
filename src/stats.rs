//! Selectivity estimation: per-column histograms and table statistics.

mod histogram;
mod table_stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use table_stats::{TableStats, DEFAULT_IO_COST_PER_PAGE, NUM_HIST_BINS};
