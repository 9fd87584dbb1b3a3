//! Prompts for the vision extraction call.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the JSON contract the service must
//!    return is described in exactly one place; the parser in
//!    [`crate::pipeline::parse`] mirrors it field for field.
//!
//! 2. **Testability** — unit tests can inspect the prompt without a live
//!    model, so contract drift between prompt and parser is easy to catch.
//!
//! Callers can override the system prompt via
//! [`crate::config::ExtractionConfig::system_prompt`]; the extraction
//! instruction itself is fixed.

/// Default system prompt for the vision extraction call.
///
/// Used when `ExtractionConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert product segmentation and \
reconstruction engine for scanned retail catalog pages. You locate every product, cut it \
cleanly from the page, and rebuild it on a white background.";

/// Fixed instruction sent with every page image.
///
/// Describes the exact JSON shape the pipeline parses. The field names
/// (`productos`, `codigo`, …) are part of the wire contract and must not
/// change independently of [`crate::pipeline::parse`].
pub const EXTRACTION_PROMPT: &str = r#"Analyse this catalog page and return every product visible on it.

Respond with a single JSON document of exactly this shape:

{
 "productos":[
    {
      "codigo":"",
      "nombre":"",
      "precio":"",
      "bbox":{"x":0,"y":0,"w":0,"h":0},
      "mask":[[0,1,0]],
      "clean_b64":"<base64 PNG>",
      "superres_b64":"<base64 PNG>"
    }
 ]
}

Rules:
- codigo is the reference code printed next to the product.
- nombre is the product's display name.
- precio is the price exactly as printed, currency symbols included.
- bbox must tightly enclose the product on the page, in page pixels.
- mask is the pixel mask of the product within bbox (0 = background, 1 = product).
- clean_b64 is the product cropped and composited onto a clean white background.
- superres_b64 is the upscaled rendition of the clean image.
- Output ONLY the JSON document. No commentary, no markdown fences."#;
