//! Error types for the pages2products library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed at all
//!   (input directory missing, provider not configured, ledger write
//!   failed). Returned as `Err(ExtractError)` from [`crate::run::run`].
//!
//! * [`ProductError`] — **Non-fatal**: a single detected product failed
//!   (bad inline payload, artifact write failure) but the rest of the page
//!   is fine. Stored inside [`crate::output::PageOutcome`] so callers can
//!   inspect partial success rather than losing a whole page to one bad
//!   product.
//!
//! Failures are contained at the smallest reasonable boundary: service
//! call, then product, then page. Nothing aborts the whole run except the
//! final ledger write.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pages2products library.
///
/// Product-level failures use [`ProductError`] and are stored in
/// [`crate::output::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory was not found at the given path.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputDirNotFound { path: PathBuf },

    /// The input path exists but is not a directory.
    #[error("Input path '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// Could not enumerate the input directory.
    #[error("Failed to list input directory '{path}': {source}")]
    InputListFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision service call failed (network, API error).
    ///
    /// Absorbed at the extraction-client boundary: the affected page
    /// degrades to zero products and this error never reaches the caller
    /// of [`crate::run::run`].
    #[error("Vision service call failed: {detail}")]
    ServiceCallFailed { detail: String },

    /// The vision service call exceeded the configured timeout.
    #[error("Vision service call timed out after {secs}s")]
    ServiceTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create an output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputSetupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the final ledger file.
    #[error("Failed to write ledger '{path}': {detail}")]
    LedgerWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single detected product.
///
/// Stored in [`crate::output::PageOutcome::failures`] when a product is
/// skipped or loses an artifact. Sibling products on the same page keep
/// processing.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ProductError {
    /// The product had no usable `codigo` after trimming.
    #[error("Page '{page}': product skipped, empty codigo")]
    MissingCode { page: String },

    /// A `productos` element did not match the expected shape.
    #[error("Page '{page}': malformed product entry: {detail}")]
    MalformedEntry { page: String, detail: String },

    /// An inline image payload was not valid base64.
    #[error("Product '{code}': {artifact} payload is not valid base64: {detail}")]
    DecodeFailed {
        code: String,
        artifact: String,
        detail: String,
    },

    /// Decoded payload bytes are not a decodable image.
    #[error("Product '{code}': super-resolution payload is not a valid image: {detail}")]
    RasterFailed { code: String, detail: String },

    /// An artifact file could not be written.
    #[error("Product '{code}': failed to write '{path}': {detail}")]
    WriteFailed {
        code: String,
        path: PathBuf,
        detail: String,
    },

    /// Technical-sheet generation failed.
    #[error("Product '{code}': technical sheet failed: {detail}")]
    SheetFailed { code: String, detail: String },

    /// Rotation-video encoding failed.
    #[error("Product '{code}': rotation video failed: {detail}")]
    VideoFailed { code: String, detail: String },
}

impl ProductError {
    /// The product code this failure belongs to, when one was known.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProductError::MissingCode { .. } | ProductError::MalformedEntry { .. } => None,
            ProductError::DecodeFailed { code, .. }
            | ProductError::RasterFailed { code, .. }
            | ProductError::WriteFailed { code, .. }
            | ProductError::SheetFailed { code, .. }
            | ProductError::VideoFailed { code, .. } => Some(code),
        }
    }
}
