//! Consolidated CSV ledger of every extracted product.
//!
//! The ledger is the run's summary artifact: one row per materialised
//! product with its code, name, price and the root-relative paths of its
//! two image artifacts. The file is built in memory and published with a
//! temp-file-plus-rename so readers never observe a half-written ledger.

use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::output::ProductRecord;

/// Column order of `productos.csv`. Written even for an empty run.
pub const LEDGER_HEADER: [&str; 5] = [
    "codigo",
    "nombre",
    "precio",
    "imagen_clean",
    "imagen_superres",
];

fn render(records: &[ProductRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LEDGER_HEADER)?;
    for r in records {
        writer.write_record([
            &r.codigo,
            &r.nombre,
            &r.precio,
            &r.imagen_clean,
            &r.imagen_superres,
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
}

/// Write the ledger atomically to `path`.
pub async fn write_ledger(path: &Path, records: &[ProductRecord]) -> Result<(), ExtractError> {
    let fail = |detail: String| ExtractError::LedgerWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let bytes = render(records).map_err(|e| fail(e.to_string()))?;

    let tmp = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| fail(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| fail(e.to_string()))?;

    debug!(path = %path.display(), rows = records.len(), "ledger written");
    Ok(())
}
