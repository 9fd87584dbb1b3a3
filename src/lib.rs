//! # pages2products
//!
//! Digitize scanned catalog pages into per-product artifacts using Vision
//! Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Paper catalogs hold thousands of products with no machine-readable
//! source. Classical OCR + contour detection breaks on dense catalog
//! layouts — overlapping product photos, decorative text, price tags in
//! arbitrary positions. Instead this crate hands each scanned page to a VLM
//! that locates, segments and cleans every product in one call, then
//! materialises a full artifact set per product on disk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images (png/jpg)
//!  │
//!  ├─ 1. Discover  enumerate page files, sorted by name
//!  ├─ 2. Vision    concurrent VLM calls → JSON `productos` list per page
//!  ├─ 3. Parse     validate each entry (codigo, inline image payloads)
//!  ├─ 4. Artifacts clean PNG + super-res PNG + technical-sheet PDF
//!  │               + JSON record (+ optional 36-frame 360° video)
//!  └─ 5. Ledger    consolidated productos.csv over all pages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pages2products::{run, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .output_root("output")
//!         .rotation(false)
//!         .build()?;
//!     let output = run("scans/", &config).await?;
//!     println!(
//!         "{} products from {} pages",
//!         output.stats.products_extracted, output.stats.pages_total
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pages2products` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! pages2products = { version = "0.3", default-features = false }
//! ```
//!
//! ## Rotation videos
//!
//! The optional rotation stage ([`ExtractionConfigBuilder::rotation`])
//! renders 36 frames per product and encodes them into an H.264 video. It
//! shells out to an `ffmpeg` binary, which must be on `PATH` at run time.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod vision;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, OutputLayout};
pub use error::{ExtractError, ProductError};
pub use output::{PageOutcome, ProductRecord, RunOutput, RunStats};
pub use progress::{ExtractionProgress, NoopProgress, ProgressCallback};
pub use run::{run, run_sync};
pub use vision::VisionService;
