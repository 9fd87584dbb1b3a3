//! Progress-callback trait for per-page run events.
//!
//! Inject an [`Arc<dyn ExtractionProgress>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each page.
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal progress bar, a database record, or a
//! channel without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because pages are processed
//! concurrently.

use std::sync::Arc;

/// Called by the run as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_page_start` and `on_page_done` may be called
/// concurrently from different tasks; implementations must synchronise any
/// shared mutable state.
pub trait ExtractionProgress: Send + Sync {
    /// Called once after page discovery, before any vision call.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the vision request is sent for a page.
    fn on_page_start(&self, page: &str, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page reaches its terminal state.
    ///
    /// `products` counts materialised products; `failures` counts products
    /// that were skipped or lost artifacts on this page.
    fn on_page_done(&self, page: &str, total_pages: usize, products: usize, failures: usize) {
        let _ = (page, total_pages, products, failures);
    }

    /// Called once after every page has been attempted, before the ledger
    /// is written.
    fn on_run_complete(&self, total_pages: usize, total_products: usize) {
        let _ = (total_pages, total_products);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ExtractionProgress for NoopProgress {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgress>;
