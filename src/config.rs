//! Configuration types for a catalog-extraction run.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across page tasks, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use crate::vision::VisionService;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pages2products::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .output_root("out")
///     .concurrency(4)
///     .rotation(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Root directory for all generated artifacts. Default: `output`.
    ///
    /// The run provisions `images/`, `json360/`, `pdf/` (plus `360/` and
    /// `videos/` when `rotation` is on, or `images_superres/` when it is
    /// off) beneath this root before any page task starts.
    pub output_root: PathBuf,

    /// Number of concurrent page extractions. Default: 8.
    ///
    /// Each page issues exactly one vision call, so this bounds outbound
    /// API concurrency and open file descriptors. Launching every page at
    /// once exhausts rate limits and descriptors on thousand-page runs,
    /// so fan-out is capped here.
    pub concurrency: usize,

    /// Vision model identifier, e.g. "gpt-4.1". If None, uses the
    /// provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Fully custom vision service. Takes precedence over everything else;
    /// this is the seam test suites use to stub the external service.
    pub service: Option<Arc<dyn VisionService>>,

    /// Sampling temperature for the vision completion. Default: 0.0.
    ///
    /// Pinned to the most deterministic value: the reply is a structured
    /// JSON contract, and any creativity only corrupts it.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Per-call timeout on the vision request in seconds. Default: 60.
    ///
    /// A timed-out page degrades to zero products, like every other
    /// service failure; other pages keep running.
    pub api_timeout_secs: u64,

    /// Enable the 360° rotation stage (36 frames + H.264 video per
    /// product). Default: false.
    ///
    /// Requires an `ffmpeg` binary on PATH at run time. Also selects the
    /// super-resolution artifact location: `images/<code>_sr.png` when on,
    /// `images_superres/<code>_sr.png` when off.
    pub rotation: bool,

    /// Custom system prompt for the vision call. If None, uses the
    /// built-in default.
    pub system_prompt: Option<String>,

    /// Optional progress callback fired per page.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            concurrency: 8,
            model: None,
            provider_name: None,
            provider: None,
            service: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 60,
            rotation: false,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("output_root", &self.output_root)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("service", &self.service.as_ref().map(|_| "<dyn VisionService>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("rotation", &self.rotation)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The on-disk layout derived from `output_root` and `rotation`.
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_root, self.rotation)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn service(mut self, service: Arc<dyn VisionService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn rotation(mut self, v: bool) -> Self {
        self.config.rotation = v;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Output layout ────────────────────────────────────────────────────────

/// The artifact directory tree for one run.
///
/// All derived file names are keyed by the product `codigo`; two products
/// sharing a code race to the same paths (last writer wins, logged by the
/// pipeline).
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    images: PathBuf,
    superres: PathBuf,
    frames: PathBuf,
    videos: PathBuf,
    json: PathBuf,
    pdf: PathBuf,
    rotation: bool,
}

impl OutputLayout {
    fn new(root: &Path, rotation: bool) -> Self {
        let images = root.join("images");
        // With the rotation stage, super-res images live next to the clean
        // ones; without it they get their own directory.
        let superres = if rotation {
            images.clone()
        } else {
            root.join("images_superres")
        };
        Self {
            root: root.to_path_buf(),
            images,
            superres,
            frames: root.join("360"),
            videos: root.join("videos"),
            json: root.join("json360"),
            pdf: root.join("pdf"),
            rotation,
        }
    }

    /// Create every directory the run will write into (idempotent).
    pub async fn provision(&self) -> Result<(), ExtractError> {
        let mut dirs = vec![&self.images, &self.superres, &self.json, &self.pdf];
        if self.rotation {
            dirs.push(&self.frames);
            dirs.push(&self.videos);
        }
        for dir in dirs {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ExtractError::OutputSetupFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    pub fn clean_image_path(&self, code: &str) -> PathBuf {
        self.images.join(format!("{code}.png"))
    }

    pub fn superres_path(&self, code: &str) -> PathBuf {
        self.superres.join(format!("{code}_sr.png"))
    }

    /// Per-product subfolder holding the 36 rotation frames.
    pub fn frames_dir(&self, code: &str) -> PathBuf {
        self.frames.join(code)
    }

    pub fn video_path(&self, code: &str) -> PathBuf {
        self.videos.join(format!("{code}_360.mp4"))
    }

    pub fn record_path(&self, code: &str) -> PathBuf {
        self.json.join(format!("{code}.json"))
    }

    pub fn sheet_path(&self, code: &str) -> PathBuf {
        self.pdf.join(format!("{code}.pdf"))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("productos.csv")
    }

    /// Clean-image reference stored in the ledger, relative to the root.
    pub fn clean_image_ref(&self, code: &str) -> String {
        format!("images/{code}.png")
    }

    /// Super-res reference stored in the ledger, relative to the root.
    pub fn superres_ref(&self, code: &str) -> String {
        if self.rotation {
            format!("images/{code}_sr.png")
        } else {
            format!("images_superres/{code}_sr.png")
        }
    }
}
