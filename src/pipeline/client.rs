//! Vision extraction client: one page image in, a validated product list
//! out.
//!
//! Every failure mode — unreadable page file, network error, timeout,
//! garbled reply — degrades to "zero products found for this page" and is
//! logged. **This call never raises past its own boundary**; the fan-out
//! layer's page-level isolation is the failure boundary, so there is no
//! retry here.

use crate::pipeline::parse::{self, ExtractionResponse};
use crate::vision::VisionService;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Run one extraction request for `page_path`.
///
/// The page file is read in full, base64-encoded, and sent with the fixed
/// instruction template; the reply is parsed and validated by
/// [`crate::pipeline::parse`].
pub async fn extract_products(
    service: &Arc<dyn VisionService>,
    page_path: &Path,
) -> ExtractionResponse {
    let page_name = page_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| page_path.display().to_string());

    let bytes = match tokio::fs::read(page_path).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Page '{}': cannot read page image ({}), zero products", page_name, e);
            return ExtractionResponse::empty();
        }
    };

    let page_b64 = STANDARD.encode(&bytes);
    debug!("Page '{}': {} bytes encoded for the vision call", page_name, page_b64.len());

    let body = match service.extract(&page_b64).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Page '{}': vision call failed ({}), zero products", page_name, e);
            return ExtractionResponse::empty();
        }
    };

    parse::parse_reply(&body, &page_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use futures::future::BoxFuture;

    struct Canned(&'static str);

    impl VisionService for Canned {
        fn extract<'a>(&'a self, _page_b64: &'a str) -> BoxFuture<'a, Result<String, ExtractError>> {
            Box::pin(async move { Ok(self.0.to_string()) })
        }
    }

    struct Failing;

    impl VisionService for Failing {
        fn extract<'a>(&'a self, _page_b64: &'a str) -> BoxFuture<'a, Result<String, ExtractError>> {
            Box::pin(async move {
                Err(ExtractError::ServiceCallFailed {
                    detail: "connection reset".into(),
                })
            })
        }
    }

    #[tokio::test]
    async fn unreadable_page_degrades_to_empty() {
        let service: Arc<dyn VisionService> = Arc::new(Canned("{\"productos\":[]}"));
        let resp = extract_products(&service, Path::new("/no/such/page.png")).await;
        assert!(resp.products.is_empty());
    }

    #[tokio::test]
    async fn service_failure_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("p.png");
        std::fs::write(&page, b"fake image bytes").unwrap();

        let service: Arc<dyn VisionService> = Arc::new(Failing);
        let resp = extract_products(&service, &page).await;
        assert!(resp.products.is_empty());
        assert!(resp.rejected.is_empty());
    }

    #[tokio::test]
    async fn canned_reply_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("p.png");
        std::fs::write(&page, b"fake image bytes").unwrap();

        let service: Arc<dyn VisionService> = Arc::new(Canned(
            r#"{"productos":[{"codigo":"X1","nombre":"n","precio":"1",
                 "clean_b64":"aGk=","superres_b64":"aGk="}]}"#,
        ));
        let resp = extract_products(&service, &page).await;
        assert_eq!(resp.products.len(), 1);
        assert_eq!(resp.products[0].code, "X1");
    }
}
