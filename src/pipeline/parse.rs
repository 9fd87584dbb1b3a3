//! Reply parsing and per-product schema validation.
//!
//! ## The never-raise contract
//!
//! Whatever the service sends back — an empty body, prose, invalid JSON, a
//! JSON document without `productos` — parsing yields an
//! [`ExtractionResponse`], never an error. A malformed reply is the same
//! as an empty page. This keeps the failure boundary at the page level:
//! one garbled reply cannot abort the run.
//!
//! ## Why validate before any I/O?
//!
//! A missing `codigo` caught during a file write would leave partial
//! artifacts behind. Instead each `productos` element is deserialised
//! into a typed [`RawProduct`] and promoted to a
//! [`Product`] only if it carries a non-empty code and both inline
//! payloads; rejects are tagged [`ProductError`]s so the page report shows
//! exactly what was dropped and why.

use crate::error::ProductError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Validated output of one vision call: always a sequence, possibly empty,
/// never null.
#[derive(Debug, Default)]
pub struct ExtractionResponse {
    /// Products that passed schema validation, in emission order.
    pub products: Vec<Product>,
    /// Entries the service emitted but validation rejected.
    pub rejected: Vec<ProductError>,
}

impl ExtractionResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Integer rectangle locating a product on its source page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// One validated catalog product, fully consumed within its page task.
#[derive(Debug, Clone)]
pub struct Product {
    /// Trimmed, non-empty; primary key for every derived file name.
    pub code: String,
    pub name: String,
    pub price: String,
    pub bbox: Option<BoundingBox>,
    /// Segmentation mask rows (0 = background, 1 = product).
    pub mask: Vec<Vec<u8>>,
    pub clean_b64: String,
    pub superres_b64: String,
    /// The product's original JSON value, preserved verbatim for the
    /// `json360/<code>.json` record.
    pub raw: Value,
}

/// Wire shape of one `productos` element. Lenient on optional metadata,
/// strict on field types.
#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(default)]
    codigo: String,
    #[serde(default)]
    nombre: String,
    #[serde(default)]
    precio: String,
    #[serde(default)]
    bbox: Option<BoundingBox>,
    #[serde(default)]
    mask: Vec<Vec<u8>>,
    #[serde(default)]
    clean_b64: String,
    #[serde(default)]
    superres_b64: String,
}

// Models routinely disobey "no fences" and wrap the JSON document anyway.
static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip one outer ```/```json fence pair, if present.
fn strip_reply_fences(input: &str) -> &str {
    match RE_OUTER_FENCE.captures(input) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(input),
        None => input,
    }
}

/// Parse a raw reply body into an [`ExtractionResponse`].
///
/// `page` is used only for log lines and reject tags.
pub fn parse_reply(body: &str, page: &str) -> ExtractionResponse {
    let cleaned = strip_reply_fences(body.trim());

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!("Page '{}': reply is not valid JSON ({}), treating as empty", page, e);
            return ExtractionResponse::empty();
        }
    };

    let items = match value.get("productos").and_then(Value::as_array) {
        Some(items) => items,
        None => {
            warn!("Page '{}': reply has no 'productos' list, treating as empty", page);
            return ExtractionResponse::empty();
        }
    };

    let mut response = ExtractionResponse::empty();
    for item in items {
        match serde_json::from_value::<RawProduct>(item.clone()) {
            Ok(raw) => match validate(raw, item.clone(), page) {
                Ok(product) => response.products.push(product),
                Err(e) => {
                    warn!("{}", e);
                    response.rejected.push(e);
                }
            },
            Err(e) => {
                let err = ProductError::MalformedEntry {
                    page: page.to_string(),
                    detail: e.to_string(),
                };
                warn!("{}", err);
                response.rejected.push(err);
            }
        }
    }

    debug!(
        "Page '{}': {} product(s) validated, {} rejected",
        page,
        response.products.len(),
        response.rejected.len()
    );
    response
}

/// Promote a wire-shaped product to a validated [`Product`].
fn validate(raw: RawProduct, raw_value: Value, page: &str) -> Result<Product, ProductError> {
    let code = raw.codigo.trim();
    if code.is_empty() {
        return Err(ProductError::MissingCode {
            page: page.to_string(),
        });
    }
    if raw.clean_b64.is_empty() {
        return Err(ProductError::MalformedEntry {
            page: page.to_string(),
            detail: format!("product '{code}' has no clean_b64 payload"),
        });
    }
    if raw.superres_b64.is_empty() {
        return Err(ProductError::MalformedEntry {
            page: page.to_string(),
            detail: format!("product '{code}' has no superres_b64 payload"),
        });
    }

    Ok(Product {
        code: code.to_string(),
        name: raw.nombre.trim().to_string(),
        price: raw.precio.trim().to_string(),
        bbox: raw.bbox,
        mask: raw.mask,
        clean_b64: raw.clean_b64,
        superres_b64: raw.superres_b64,
        raw: raw_value,
    })
}
