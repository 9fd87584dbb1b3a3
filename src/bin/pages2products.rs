//! CLI binary for pages2products.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pages2products::{run, ExtractionConfig, ExtractionProgress, ProgressCallback, RunOutput};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Designed to work correctly when pages complete
/// out-of-order (concurrent mode).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<String, Instant>>,
    /// Count of product-level failures across the run.
    failures: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called after page discovery).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgress for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        // Switch from spinner-only style to full progress bar now that we
        // know the actual page count.
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting extraction of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: &str, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page.to_string(), Instant::now());
        self.bar.set_message(page.to_string());
    }

    fn on_page_done(&self, page: &str, _total: usize, products: usize, failures: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(page)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.failures.fetch_add(failures, Ordering::SeqCst);

        let tick = if failures == 0 { green("✓") } else { cyan("⚠") };
        let fail_note = if failures > 0 {
            red(&format!("  {failures} failed"))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} {:<28}  {:<12}{}  {}",
            tick,
            page,
            dim(&format!("{products} products")),
            fail_note,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, total_products: usize) {
        let failed = self.failures.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} products extracted from {} pages",
                green("✔"),
                bold(&total_products.to_string()),
                total_pages
            );
        } else {
            eprintln!(
                "{} {} products extracted from {} pages  ({} failed)",
                cyan("⚠"),
                bold(&total_products.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (writes under ./output)
  pages2products scans/

  # Custom output root
  pages2products scans/ -o catalog_out

  # Extended variant: 36-frame 360° rotation + H.264 video per product
  pages2products scans/ --rotation

  # Use a specific model
  pages2products --model gpt-4.1 --provider openai scans/

  # Machine-readable result on stdout
  pages2products --json scans/ > result.json

OUTPUT LAYOUT (under the output root):
  productos.csv            consolidated ledger, one row per product
  images/<code>.png        background-removed product image
  images_superres/<code>_sr.png   upscaled image (beside images/ with --rotation)
  360/<code>/frame_<angle>.png    36 rotation frames (--rotation only)
  videos/<code>_360.mp4    rotation video, 24 fps H.264 (--rotation only)
  json360/<code>.json      raw service record, pretty-printed
  pdf/<code>.pdf           A4 technical sheet

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         pages2products scans/

  The --rotation stage shells out to `ffmpeg`, which must be on PATH.
"#;

/// Extract per-product assets from scanned catalog pages using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pages2products",
    version,
    about = "Extract per-product assets from scanned catalog pages using Vision LLMs",
    long_about = "Digitize scanned catalog pages: a Vision Language Model locates and segments \
every product on each page, and the pipeline materialises per-product artifacts (clean image, \
super-resolution image, technical-sheet PDF, JSON record, optional 360° rotation video) plus a \
consolidated CSV ledger. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory of scanned catalog page images (png/jpg).
    input: PathBuf,

    /// Output root for all generated artifacts.
    #[arg(short, long, env = "P2P_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Directory for timestamped run logs.
    #[arg(long, env = "P2P_LOGS", default_value = "logs")]
    logs: PathBuf,

    /// Vision LLM model ID (e.g. gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Number of concurrent page extractions (one vision call each).
    #[arg(short, long, env = "P2P_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Generate 36 rotation frames and a 360° H.264 video per product.
    #[arg(long, env = "P2P_ROTATION")]
    rotation: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "P2P_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "P2P_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "P2P_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Per-page vision call timeout in seconds.
    #[arg(long, env = "P2P_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON (RunOutput) on stdout instead of a summary.
    #[arg(long, env = "P2P_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "P2P_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "P2P_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "P2P_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs on stderr when the progress bar is
    // active; the bar provides all the feedback that matters to the user.
    // The run log file always captures everything at the chosen level.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    std::fs::create_dir_all(&cli.logs)
        .with_context(|| format!("Failed to create log directory {:?}", cli.logs))?;
    let log_path = cli
        .logs
        .join(chrono::Local::now().format("run_%Y%m%d_%H%M%S.log").to_string());
    let log_file = Arc::new(
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file {:?}", log_path))?,
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    // The progress bar is initialised with a spinner (no page count yet);
    // `on_run_start` resizes it to the correct total once discovery ran.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgress>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = run(&cli.input, &config).await.context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&cli, &output);
    }

    Ok(())
}

fn print_summary(cli: &Cli, output: &RunOutput) {
    let s = &output.stats;
    eprintln!(
        "{}  {} products / {} pages  {}ms  →  {}",
        if s.products_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        s.products_extracted,
        s.pages_total,
        s.total_duration_ms,
        bold(&cli.output.join("productos.csv").display().to_string()),
    );
    if s.pages_empty > 0 {
        eprintln!("   {} pages yielded no products", dim(&s.pages_empty.to_string()));
    }
    if s.products_failed > 0 {
        eprintln!("   {} products failed:", red(&s.products_failed.to_string()));
        for failure in &output.failures {
            eprintln!("     {}", dim(&failure.to_string()));
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {path:?}"))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .output_root(&cli.output)
        .concurrency(cli.concurrency)
        .rotation(cli.rotation)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder doesn't have dedicated CLI plumbing for.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_flag_reads_documented_env_var() {
        // The after-help text documents EDGEQUAKE_LLM_PROVIDER; the flag
        // must pick up that exact name, and an explicit flag still wins.
        assert!(AFTER_HELP.contains("EDGEQUAKE_LLM_PROVIDER"));

        std::env::set_var("EDGEQUAKE_LLM_PROVIDER", "ollama");
        let from_env = Cli::try_parse_from(["pages2products", "scans"]).unwrap();
        let from_flag =
            Cli::try_parse_from(["pages2products", "--provider", "anthropic", "scans"]).unwrap();
        std::env::remove_var("EDGEQUAKE_LLM_PROVIDER");

        assert_eq!(from_env.provider.as_deref(), Some("ollama"));
        assert_eq!(from_flag.provider.as_deref(), Some("anthropic"));
    }
}
