//! CLI binary for slugsaver.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slugsaver::{
    extract_to_dir, DealsError, ExtractionConfig, ExtractionProgressCallback, FlyerVariant,
    ProgressCallback, RunOutput, WrittenFiles,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all flyers plus a log line per
/// flyer. A single flyer can take minutes, so the spinner keeps ticking
/// while the request is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the flyer currently being processed.
    current_start: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} flyers  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current_start: Mutex::new(None),
        })
    }

    fn take_elapsed_secs(&self) -> f64 {
        self.current_start
            .lock()
            .ok()
            .and_then(|mut start| start.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} input(s)…"))
        ));
    }

    fn on_file_skipped(&self, path: &Path, reason: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("–"),
            file_label(path),
            dim(reason)
        ));
        self.bar.inc(1);
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        if let Ok(mut start) = self.current_start.lock() {
            *start = Some(Instant::now());
        }
        self.bar.set_message(file_label(path));
    }

    fn on_file_complete(&self, index: usize, total: usize, path: &Path, records: usize) {
        let secs = self.take_elapsed_secs();
        self.bar.println(format!(
            "  {} [{:>2}/{:<2}] {:<32}  {}  {}",
            green("✓"),
            index,
            total,
            file_label(path),
            dim(&format!("{records:>4} deals")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let secs = self.take_elapsed_secs();

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 100 {
            let mut s: String = error.chars().take(99).collect();
            s.push('…');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} [{:>2}/{:<2}] {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            file_label(path),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, extracted: usize, failed: usize, skipped: usize) {
        self.bar.finish_and_clear();
        let mark = if extracted == 0 {
            red("✘")
        } else if failed > 0 {
            cyan("⚠")
        } else {
            green("✔")
        };
        eprintln!(
            "{} {} flyer(s) extracted  ({} failed, {} skipped)",
            mark,
            bold(&extracted.to_string()),
            failed,
            skipped
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All flyers in a folder, generic layout → out/deals.json, out/deals.csv
  slugsaver --api-key sk-ant-... flyers/*.pdf

  # Safeway flyers → out_safeway/ with a searchable index_safeway.html
  slugsaver --store safeway 'safeway/week*.pdf'

  # Custom output directory and a larger output budget
  slugsaver --outdir deals/2024-06 --max-tokens 12000 weekly.pdf

  # Try a different prompt
  slugsaver --prompt-file my_prompt.txt flyer.pdf

OUTPUT FILES:
  Store      Directory     Files
  ─────────  ────────────  ────────────────────────────────────────────────
  generic    out/          deals.json, deals.csv
  safeway    out_safeway/  deals_safeway.json, deals_safeway.csv, index_safeway.html

  Records without any price are dropped. Prices are rounded to cents.
  Open index_safeway.html through a local web server (it fetches the JSON).

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (same as --api-key)
  SLUGSAVER_STORE         Flyer layout (generic, safeway)
  SLUGSAVER_OUTDIR        Output directory
  SLUGSAVER_MODEL         Model ID
  RUST_LOG                Override log filter (e.g. slugsaver=debug)
"#;

/// Extract grocery deals from flyer PDFs using a multimodal LLM.
#[derive(Parser, Debug)]
#[command(
    name = "slugsaver",
    version,
    about = "Extract grocery deals from flyer PDFs using a multimodal LLM",
    long_about = "Send each flyer PDF to the Anthropic Messages API, repair and normalise the \
JSON it answers with, and write the combined deals as JSON and CSV. Flyers are processed one \
at a time; a flyer that fails is reported and skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Flyer PDF paths or glob patterns.
    #[arg(required = true, num_args = 1..)]
    pdfs: Vec<String>,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Output directory. Default: out (generic) or out_safeway (safeway).
    #[arg(long, env = "SLUGSAVER_OUTDIR")]
    outdir: Option<PathBuf>,

    /// Flyer layout: generic or safeway.
    #[arg(long, env = "SLUGSAVER_STORE", value_enum, default_value = "generic")]
    store: StoreArg,

    /// Model ID.
    #[arg(long, env = "SLUGSAVER_MODEL", default_value = slugsaver::config::DEFAULT_MODEL)]
    model: String,

    /// Max output tokens per flyer. Default: 8000 (generic) or 15000 (safeway).
    #[arg(long, env = "SLUGSAVER_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Messages API base URL.
    #[arg(long, env = "SLUGSAVER_BASE_URL", default_value = slugsaver::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-flyer API call timeout in seconds.
    #[arg(long, env = "SLUGSAVER_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "SLUGSAVER_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "SLUGSAVER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLUGSAVER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLUGSAVER_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StoreArg {
    Generic,
    Safeway,
}

impl From<StoreArg> for FlyerVariant {
    fn from(v: StoreArg) -> Self {
        match v {
            StoreArg::Generic => FlyerVariant::Generic,
            StoreArg::Safeway => FlyerVariant::Safeway,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    match extract_to_dir(&cli.pdfs, &config).await {
        Ok((output, written)) => {
            if !cli.quiet {
                print_summary(&output, &written);
            }
            Ok(())
        }
        Err(DealsError::NoDeals { failed, skipped }) => {
            eprintln!("\n{} {}", red("✘"), bold("No deals extracted!"));
            if failed + skipped > 0 {
                eprintln!("   {} failed, {} skipped", failed, skipped);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Extraction failed"),
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .variant(cli.store.into())
        .model(cli.model.clone())
        .api_key(cli.api_key.clone())
        .base_url(cli.base_url.clone())
        .api_timeout_secs(cli.api_timeout);

    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref dir) = cli.outdir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &RunOutput, written: &WrittenFiles) {
    let stats = &output.stats;
    eprintln!(
        "{}  {} deals  ({} without a price dropped)  {}ms",
        if stats.failed_files == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        bold(&output.deals.len().to_string()),
        stats.records_dropped,
        stats.total_duration_ms,
    );
    for path in [Some(&written.json), Some(&written.csv), written.html.as_ref()]
        .into_iter()
        .flatten()
    {
        eprintln!("   Wrote {}", bold(&path.display().to_string()));
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
    );
    for report in output.failures() {
        if let Some(e) = report.error() {
            eprintln!("   {} {}: {}", red("✗"), report.path.display(), e);
        }
    }
}
