//! Artifact codec: inline payloads in, files and rasters out.
//!
//! The service transports image bytes as base64 text inside its JSON
//! reply. This module decodes those payloads and writes them to disk in a
//! single call, and decodes the bytes to an in-memory raster for the
//! stages that need pixels (sheet embedding, frame rotation).
//!
//! Payloads are decoded to memory exactly once and the raster is reused
//! by every stage that needs pixels; the file write is a separate,
//! independent step, so nothing is ever read back from disk.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::path::Path;

/// Decode an inline base64 payload to raw bytes.
pub fn decode_payload(b64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(b64.trim())
}

/// Encode raw bytes back to the inline transport form.
///
/// The counterpart of [`decode_payload`]; round-tripping is byte-exact.
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Write artifact bytes to `path` in one call.
///
/// Parent directories are provisioned by
/// [`crate::config::OutputLayout::provision`] before any page task runs,
/// except per-product frame folders which the rotation stage creates.
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

/// Decode image bytes (PNG/JPEG) to an in-memory raster.
pub fn decode_raster(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}
