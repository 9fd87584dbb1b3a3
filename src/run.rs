//! Run orchestration: discover pages, fan out page tasks, merge outcomes,
//! write the ledger.
//!
//! Pages are processed with bounded concurrency; each page task returns its
//! own [`PageOutcome`] and the ledger rows are merged sequentially here
//! after all tasks finish, so no page task ever touches shared mutable
//! state. Outcomes are merged in page-name order, which makes two runs over
//! the same input produce byte-identical ledgers.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::ledger;
use crate::output::{PageOutcome, RunOutput, RunStats};
use crate::pipeline::{discover, page};
use crate::vision;

/// Extract every catalog page under `input_dir` and materialise all product
/// artifacts beneath the configured output root.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunOutput)` on success, even if some pages or products failed
/// (check `output.failures` and `output.stats`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal conditions: missing input
/// directory, unconfigurable vision provider, output provisioning failure,
/// or a failed ledger write. Per-page and per-product failures degrade to
/// partial output instead.
pub async fn run(
    input_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunOutput, ExtractError> {
    let total_start = Instant::now();
    let input_dir = input_dir.as_ref();
    info!("Starting extraction: {}", input_dir.display());

    // ── Step 1: Discover pages ───────────────────────────────────────────
    let pages = discover::list_pages(input_dir).await?;
    let total_pages = pages.len();
    info!("Found {total_pages} page images");

    // ── Step 2: Provision the output tree ────────────────────────────────
    let layout = config.layout();
    layout.provision().await?;

    // ── Step 3: Resolve the vision service ───────────────────────────────
    let service = vision::resolve_service(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    // ── Step 4: Process pages concurrently ───────────────────────────────
    let mut outcomes: Vec<PageOutcome> = stream::iter(pages.iter())
        .map(|path| page::process_page(path, config, &layout, &service, total_pages))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // Merge in page-name order for deterministic ledger output.
    outcomes.sort_by(|a, b| a.page.cmp(&b.page));

    // ── Step 5: Merge outcomes ───────────────────────────────────────────
    let mut records = Vec::new();
    let mut failures = Vec::new();
    let mut pages_empty = 0usize;
    let mut first_page_for_code: HashMap<String, String> = HashMap::new();
    for outcome in outcomes {
        if outcome.records.is_empty() {
            pages_empty += 1;
        }
        for record in &outcome.records {
            if let Some(earlier) = first_page_for_code.get(&record.codigo) {
                warn!(
                    code = %record.codigo,
                    "codigo appears on pages '{earlier}' and '{}', artifacts were overwritten",
                    outcome.page
                );
            } else {
                first_page_for_code.insert(record.codigo.clone(), outcome.page.clone());
            }
        }
        debug!(
            page = %outcome.page,
            products = outcome.records.len(),
            duration_ms = outcome.duration_ms,
            "merged page outcome"
        );
        records.extend(outcome.records);
        failures.extend(outcome.failures);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, records.len());
    }

    // ── Step 6: Write the ledger ─────────────────────────────────────────
    ledger::write_ledger(&layout.ledger_path(), &records).await?;

    let stats = RunStats {
        pages_total: total_pages,
        pages_empty,
        products_extracted: records.len(),
        products_failed: failures.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} products from {} pages, {}ms total",
        stats.products_extracted, stats.pages_total, stats.total_duration_ms
    );

    Ok(RunOutput {
        records,
        failures,
        stats,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    input_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run(input_dir, config))
}
