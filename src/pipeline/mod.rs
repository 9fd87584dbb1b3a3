//! Pipeline stages for catalog-page extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different sheet renderer) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ client ──▶ parse ──▶ page ──▶ artifacts / rotate / sheet
//! (dir scan)  (vision)   (validate)  (per-product fan-in)   (files)
//! ```
//!
//! 1. [`discover`]  — list page images in the input directory
//! 2. [`client`]    — one vision call per page; every failure degrades to
//!    zero products
//! 3. [`parse`]     — normalise the reply and validate each product before
//!    any file I/O
//! 4. [`page`]      — drive per-product materialisation with fault
//!    isolation
//! 5. [`artifacts`] — inline-payload decode and file writes
//! 6. [`rotate`]    — 36 rotation frames + H.264 video (optional stage)
//! 7. [`sheet`]     — single-page technical-sheet PDF

pub mod artifacts;
pub mod client;
pub mod discover;
pub mod page;
pub mod parse;
pub mod rotate;
pub mod sheet;
