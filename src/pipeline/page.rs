//! Per-page processing: one vision call, then artifact generation for every
//! detected product.
//!
//! Failures are absorbed per product: a bad payload or a failed write drops
//! that product into [`PageOutcome::failures`] while its siblings keep
//! going. Only a full set of artifacts earns a ledger row.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{ExtractionConfig, OutputLayout};
use crate::error::ProductError;
use crate::output::{PageOutcome, ProductRecord};
use crate::pipeline::{artifacts, client, rotate, sheet};
use crate::pipeline::parse::Product;
use crate::vision::VisionService;

/// Process one catalog page end to end.
///
/// Never fails: every error degrades to an empty or partial
/// [`PageOutcome`].
pub async fn process_page(
    page_path: &Path,
    config: &ExtractionConfig,
    layout: &OutputLayout,
    service: &Arc<dyn VisionService>,
    total_pages: usize,
) -> PageOutcome {
    let page = page_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| page_path.display().to_string());

    if let Some(cb) = &config.progress_callback {
        cb.on_page_start(&page, total_pages);
    }
    info!("Processing page: {page}");
    let start = Instant::now();

    let response = client::extract_products(service, page_path).await;

    let mut records = Vec::new();
    let mut failures = response.rejected;
    let mut seen = HashSet::new();

    for product in &response.products {
        if !seen.insert(product.code.clone()) {
            warn!(
                page = %page,
                code = %product.code,
                "duplicate codigo on page, artifacts will be overwritten"
            );
        }
        match materialize_product(product, config, layout).await {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(page = %page, "{e}");
                failures.push(e);
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        page = %page,
        products = records.len(),
        failures = failures.len(),
        duration_ms,
        "page complete"
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_page_done(&page, total_pages, records.len(), failures.len());
    }

    PageOutcome {
        page,
        records,
        failures,
        duration_ms,
    }
}

/// Generate the full artifact set for one product and return its ledger row.
///
/// Artifact order matters only in that the inline payloads are decoded
/// before anything touches disk, so a corrupt product leaves no partial
/// files behind from the decode step itself.
async fn materialize_product(
    product: &Product,
    config: &ExtractionConfig,
    layout: &OutputLayout,
) -> Result<ProductRecord, ProductError> {
    let code = product.code.as_str();

    let decode = |b64: &str, artifact: &str| {
        artifacts::decode_payload(b64).map_err(|e| ProductError::DecodeFailed {
            code: code.to_string(),
            artifact: artifact.to_string(),
            detail: e.to_string(),
        })
    };
    let clean_bytes = decode(&product.clean_b64, "clean")?;
    let superres_bytes = decode(&product.superres_b64, "super-resolution")?;

    // Decoded once, reused for both the sheet and the rotation stage.
    let raster =
        artifacts::decode_raster(&superres_bytes).map_err(|e| ProductError::RasterFailed {
            code: code.to_string(),
            detail: e.to_string(),
        })?;

    let write = |path: std::path::PathBuf, bytes: Vec<u8>| async move {
        artifacts::write_bytes(&path, &bytes)
            .await
            .map_err(|e| ProductError::WriteFailed {
                code: code.to_string(),
                path,
                detail: e.to_string(),
            })
    };
    write(layout.clean_image_path(code), clean_bytes).await?;
    write(layout.superres_path(code), superres_bytes).await?;

    if config.rotation {
        let frames_dir = layout.frames_dir(code);
        let video_path = layout.video_path(code);
        let frame_source = raster.clone();
        let owned_code = code.to_string();
        tokio::task::spawn_blocking(move || {
            let frames = rotate::render_frames(&frame_source);
            rotate::write_frames(&frames_dir, &frames).map_err(|e| ProductError::WriteFailed {
                code: owned_code.clone(),
                path: frames_dir.clone(),
                detail: e.to_string(),
            })?;
            rotate::encode_video(&frames, &video_path).map_err(|e| ProductError::VideoFailed {
                code: owned_code,
                detail: e.to_string(),
            })
        })
        .await
        .map_err(|e| ProductError::VideoFailed {
            code: code.to_string(),
            detail: format!("rotation task failed: {e}"),
        })??;
    }

    let sheet_bytes = {
        let owned_code = code.to_string();
        let (name, price) = (product.name.clone(), product.price.clone());
        tokio::task::spawn_blocking(move || sheet::render_sheet(&owned_code, &name, &price, &raster))
            .await
            .map_err(|e| ProductError::SheetFailed {
                code: code.to_string(),
                detail: format!("sheet task failed: {e}"),
            })??
    };
    write(layout.sheet_path(code), sheet_bytes).await?;

    let record_json =
        serde_json::to_vec_pretty(&product.raw).map_err(|e| ProductError::WriteFailed {
            code: code.to_string(),
            path: layout.record_path(code),
            detail: e.to_string(),
        })?;
    write(layout.record_path(code), record_json).await?;

    Ok(ProductRecord {
        codigo: code.to_string(),
        nombre: product.name.clone(),
        precio: product.price.clone(),
        imagen_clean: layout.clean_image_ref(code),
        imagen_superres: layout.superres_ref(code),
    })
}
