//! End-to-end pipeline tests with a stubbed vision service.
//!
//! Each test drives [`pages2products::run`] against a temp input directory
//! and asserts on the artifact tree and ledger it produces. The vision
//! service is stubbed per page content, so no network or API key is needed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::BoxFuture;
use serde_json::json;

use pages2products::{run, ExtractError, ExtractionConfig, VisionService};

/// Replies keyed by the decoded page bytes the service receives.
struct MappedService {
    replies: HashMap<Vec<u8>, String>,
}

impl VisionService for MappedService {
    fn extract<'a>(&'a self, page_b64: &'a str) -> BoxFuture<'a, Result<String, ExtractError>> {
        Box::pin(async move {
            let bytes = STANDARD
                .decode(page_b64)
                .map_err(|e| ExtractError::ServiceCallFailed {
                    detail: e.to_string(),
                })?;
            match self.replies.get(&bytes) {
                Some(reply) => Ok(reply.clone()),
                None => Err(ExtractError::ServiceCallFailed {
                    detail: "no canned reply for this page".to_string(),
                }),
            }
        })
    }
}

fn png_b64() -> String {
    let img = image::RgbaImage::from_pixel(6, 6, image::Rgba([200, 30, 90, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    STANDARD.encode(buf)
}

fn reply(products: &[(&str, &str, &str)]) -> String {
    let png = png_b64();
    let items: Vec<_> = products
        .iter()
        .map(|(code, name, price)| {
            json!({
                "codigo": code,
                "nombre": name,
                "precio": price,
                "clean_b64": png,
                "superres_b64": png,
            })
        })
        .collect();
    json!({ "productos": items }).to_string()
}

/// Write a page file and register its canned service reply.
fn page(input: &Path, name: &str, replies: &mut HashMap<Vec<u8>, String>, body: String) {
    let content = format!("scan:{name}").into_bytes();
    std::fs::write(input.join(name), &content).unwrap();
    replies.insert(content, body);
}

/// Collects WARN-level events (fields flattened to text) so tests can
/// assert a warning actually fired.
#[derive(Clone, Default)]
struct WarnCapture(Arc<std::sync::Mutex<Vec<String>>>);

impl WarnCapture {
    fn joined(&self) -> String {
        self.0.lock().unwrap().join("\n")
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCapture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() == tracing::Level::WARN {
            struct Collect(String);
            impl tracing::field::Visit for Collect {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    use std::fmt::Write;
                    let _ = write!(self.0, "{}={:?} ", field.name(), value);
                }
            }
            let mut collect = Collect(String::new());
            event.record(&mut collect);
            self.0.lock().unwrap().push(collect.0);
        }
    }
}

fn config(output: &Path, service: MappedService) -> ExtractionConfig {
    ExtractionConfig::builder()
        .output_root(output)
        .service(Arc::new(service))
        .build()
        .unwrap()
}

#[tokio::test]
async fn two_pages_produce_merged_ledger_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "page_001.png", &mut replies, reply(&[("A1", "Widget", "9.99")]));
    page(&input, "page_002.png", &mut replies, reply(&[("B2", "Gadget", "4"), ("C3", "Bolt", "1")]));

    let result = run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();

    assert_eq!(result.stats.pages_total, 2);
    assert_eq!(result.stats.products_extracted, 3);
    assert_eq!(result.stats.products_failed, 0);

    // Rows merged in page-name order.
    let codes: Vec<_> = result.records.iter().map(|r| r.codigo.as_str()).collect();
    assert_eq!(codes, ["A1", "B2", "C3"]);

    let csv = std::fs::read_to_string(output.join("productos.csv")).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "codigo,nombre,precio,imagen_clean,imagen_superres");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("images/A1.png"));

    for code in ["A1", "B2", "C3"] {
        assert!(output.join("images").join(format!("{code}.png")).is_file());
        assert!(output
            .join("images_superres")
            .join(format!("{code}_sr.png"))
            .is_file());
        assert!(output.join("pdf").join(format!("{code}.pdf")).is_file());
        assert!(output.join("json360").join(format!("{code}.json")).is_file());
    }
}

#[tokio::test]
async fn failing_page_degrades_to_zero_products() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "a.png", &mut replies, reply(&[("A1", "Kept", "1")]));
    // b.png gets no canned reply, so the service errors for it.
    std::fs::write(input.join("b.png"), b"scan:b.png:unmapped").unwrap();
    page(&input, "c.png", &mut replies, reply(&[("C1", "AlsoKept", "2")]));

    let result = run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();

    assert_eq!(result.stats.pages_total, 3);
    assert_eq!(result.stats.pages_empty, 1);
    assert_eq!(result.stats.products_extracted, 2);
    let codes: Vec<_> = result.records.iter().map(|r| r.codigo.as_str()).collect();
    assert_eq!(codes, ["A1", "C1"]);
}

#[tokio::test]
async fn empty_run_writes_header_only_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "blank.png", &mut replies, json!({"productos": []}).to_string());

    let result = run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();

    assert_eq!(result.stats.products_extracted, 0);
    assert_eq!(result.stats.pages_empty, 1);

    let csv = std::fs::read_to_string(output.join("productos.csv")).unwrap();
    assert_eq!(csv.trim_end(), "codigo,nombre,precio,imagen_clean,imagen_superres");
    // Provisioned but empty artifact directories.
    assert_eq!(std::fs::read_dir(output.join("images")).unwrap().count(), 0);
}

#[tokio::test]
async fn rerun_produces_byte_identical_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "p1.png", &mut replies, reply(&[("X1", "One", "1")]));
    page(&input, "p2.png", &mut replies, reply(&[("X2", "Two", "2")]));
    let replies2 = replies.clone();

    run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();
    let first = std::fs::read(output.join("productos.csv")).unwrap();

    run(&input, &config(&output, MappedService { replies: replies2 }))
        .await
        .unwrap();
    let second = std::fs::read(output.join("productos.csv")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn duplicate_code_across_pages_keeps_both_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "p1.png", &mut replies, reply(&[("DUP", "First", "1")]));
    page(&input, "p2.png", &mut replies, reply(&[("DUP", "Second", "2")]));

    let capture = WarnCapture::default();
    let _guard = {
        use tracing_subscriber::layer::SubscriberExt;
        tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()))
    };
    let result = run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();

    // Both ledger rows survive; the on-disk artifacts are last-writer-wins.
    assert_eq!(result.records.len(), 2);
    let names: Vec<_> = result.records.iter().map(|r| r.nombre.as_str()).collect();
    assert_eq!(names, ["First", "Second"]);
    assert!(output.join("images").join("DUP.png").is_file());

    // The cross-page collision warning names both pages involved.
    let warns = capture.joined();
    assert!(warns.contains("codigo appears on pages"), "got: {warns}");
    assert!(warns.contains("p1.png"), "got: {warns}");
    assert!(warns.contains("p2.png"), "got: {warns}");
}

#[tokio::test]
async fn rotation_stage_is_off_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "p1.png", &mut replies, reply(&[("A1", "Flat", "3")]));

    run(&input, &config(&output, MappedService { replies }))
        .await
        .unwrap();

    assert!(!output.join("360").exists());
    assert!(!output.join("videos").exists());
}

#[tokio::test]
async fn missing_input_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("out"), MappedService {
        replies: HashMap::new(),
    });
    let err = run(dir.path().join("nope"), &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::InputDirNotFound { .. }));
}

// Exercises the full rotation stage including the external ffmpeg encode.
// Gated behind an env var since ffmpeg is a runtime-only dependency.
#[tokio::test]
async fn rotation_stage_renders_frames_and_video() {
    if std::env::var("P2P_TEST_FFMPEG").is_err() {
        eprintln!("skipping: set P2P_TEST_FFMPEG=1 (requires ffmpeg on PATH)");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scans");
    let output = dir.path().join("out");
    std::fs::create_dir(&input).unwrap();

    let mut replies = HashMap::new();
    page(&input, "p1.png", &mut replies, reply(&[("R1", "Spin", "7")]));

    let config = ExtractionConfig::builder()
        .output_root(&output)
        .rotation(true)
        .service(Arc::new(MappedService { replies }))
        .build()
        .unwrap();

    let result = run(&input, &config).await.unwrap();
    assert_eq!(result.stats.products_extracted, 1);

    let frames: Vec<_> = std::fs::read_dir(output.join("360").join("R1"))
        .unwrap()
        .collect();
    assert_eq!(frames.len(), 36);
    assert!(output.join("videos").join("R1_360.mp4").is_file());
    // Rotation variant keeps super-res beside the clean image.
    assert!(output.join("images").join("R1_sr.png").is_file());
    assert_eq!(result.records[0].imagen_superres, "images/R1_sr.png");
}
