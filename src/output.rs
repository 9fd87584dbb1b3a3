//! Result types: ledger rows, per-page outcomes, and run statistics.

use crate::error::ProductError;
use serde::{Deserialize, Serialize};

/// One row of the final `productos.csv` ledger.
///
/// Field names match the CSV header (`codigo,nombre,precio,imagen_clean,
/// imagen_superres`). Image references are paths relative to the output
/// root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub codigo: String,
    pub nombre: String,
    pub precio: String,
    pub imagen_clean: String,
    pub imagen_superres: String,
}

/// Terminal state of one page task.
///
/// A page never fails as a whole: service failures degrade to zero
/// products, and per-product faults land in `failures` while siblings
/// keep processing.
#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    /// Page file name (diagnostic only).
    pub page: String,
    /// Ledger rows produced by this page, in service emission order.
    pub records: Vec<ProductRecord>,
    /// Products skipped or partially lost on this page.
    pub failures: Vec<ProductError>,
    /// Wall-clock time for the page, vision call included.
    pub duration_ms: u64,
}

/// Statistics for a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Pages discovered in the input directory.
    pub pages_total: usize,
    /// Pages that yielded zero products. A failed service call and a
    /// genuinely empty page both count here.
    pub pages_empty: usize,
    /// Products materialised and appended to the ledger.
    pub products_extracted: usize,
    /// Products skipped or failed across all pages.
    pub products_failed: usize,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
}

/// Everything a finished run produced, besides the files on disk.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    /// All ledger rows, in page-name order (rows within a page keep the
    /// service's emission order).
    pub records: Vec<ProductRecord>,
    /// Every absorbed per-product failure across the run.
    pub failures: Vec<ProductError>,
    pub stats: RunStats,
}
