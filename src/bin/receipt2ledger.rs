//! CLI binary for receipt2ledger.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CaptureConfig`, shows a spinner while the vendor operation is polled,
//! and prints the normalized receipt as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use receipt2ledger::{
    capture, CaptureConfig, CaptureProgressCallback, InMemoryRepository, LocalDirStorage,
    ReceiptRepository,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────

/// Terminal spinner tracking the capture state machine.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CaptureProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, byte_len: usize) {
        self.bar
            .set_message(format!("Uploading image ({byte_len} bytes)…"));
    }

    fn on_uploaded(&self, key: &str) {
        self.bar.set_message(format!("Stored as {key}"));
    }

    fn on_submitted(&self, _operation_url: &str) {
        self.bar.set_message("Analysis submitted, waiting…");
    }

    fn on_poll_attempt(&self, attempt: u32, budget: u32) {
        self.bar
            .set_message(format!("Waiting for analysis (attempt {attempt}/{budget})…"));
    }

    fn on_analyzed(&self, poll_attempts: u32) {
        self.bar
            .set_message(format!("Analyzed after {poll_attempts} attempt(s), normalizing…"));
    }

    fn on_complete(&self, _terminal_state: &str) {
        self.bar.finish_and_clear();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────

/// Capture a receipt image into a normalized expense record.
#[derive(Parser, Debug)]
#[command(name = "receipt2ledger", version, about)]
struct Cli {
    /// Path to the receipt image (JPEG or PNG).
    image: PathBuf,

    /// Analysis vendor endpoint, e.g. https://<resource>.cognitiveservices.azure.com
    #[arg(long, env = "DI_ENDPOINT")]
    endpoint: String,

    /// Vendor subscription key.
    #[arg(long, env = "DI_KEY", hide_env_values = true)]
    api_key: String,

    /// Analysis model identifier.
    #[arg(long, env = "DI_MODEL_ID", default_value = "prebuilt-receipt")]
    model: String,

    /// Declared MIME type; inferred from the file extension when omitted.
    #[arg(long)]
    content_type: Option<String>,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Maximum poll attempts before the capture times out.
    #[arg(long, default_value_t = 30)]
    max_attempts: u32,

    /// Directory the image blob is stored under.
    #[arg(long, default_value = "./receipt-store")]
    storage_dir: PathBuf,

    /// Public base URL a file server exposes the storage directory at.
    /// The vendor must be able to fetch the image through this URL.
    #[arg(long, env = "R2L_PUBLIC_BASE_URL")]
    public_base_url: String,

    /// Category label filed with the receipt.
    #[arg(long, default_value = "uncategorized")]
    category: String,

    /// User the receipt is filed under.
    #[arg(long, default_value = "local")]
    user: String,

    /// Write the receipt JSON to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress the spinner (still prints the result).
    #[arg(short, long)]
    quiet: bool,
}

fn infer_content_type(path: &PathBuf) -> Result<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        other => bail!(
            "Cannot infer content type from extension {:?}; pass --content-type",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let bytes = std::fs::read(&cli.image)
        .with_context(|| format!("reading {}", cli.image.display()))?;
    let content_type = match &cli.content_type {
        Some(ct) => ct.clone(),
        None => infer_content_type(&cli.image)?.to_string(),
    };
    let filename_hint = cli
        .image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("receipt")
        .to_string();

    let storage = Arc::new(LocalDirStorage::new(&cli.storage_dir, &cli.public_base_url));

    let mut builder = CaptureConfig::builder()
        .endpoint(&cli.endpoint)
        .api_key(&cli.api_key)
        .model_id(&cli.model)
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .max_poll_attempts(cli.max_attempts)
        .storage(storage);
    if !cli.quiet {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    let config = builder.build().context("invalid configuration")?;

    let output = match capture(&bytes, &content_type, &filename_hint, &config).await {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{} capture failed ({})", red("✘"), e.terminal_state());
            return Err(e.into());
        }
    };

    // File the receipt the way the application's persistence layer would.
    let repo = InMemoryRepository::new();
    let stored = repo
        .save(&cli.user, &cli.category, output.receipt.clone())
        .await
        .context("filing receipt")?;

    let json = serde_json::to_string_pretty(&stored)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} wrote {}", green("✔"), path.display());
        }
        None => println!("{json}"),
    }

    eprintln!(
        "{} {} filed under '{}'  {}",
        green("✔"),
        bold(&output.receipt.store_name),
        stored.category,
        dim(&format!(
            "{} poll attempts, {}ms total",
            output.stats.poll_attempts, output.stats.total_duration_ms
        )),
    );

    Ok(())
}
