//! # slugsaver
//!
//! Extract structured grocery deals from weekly flyer PDFs using a
//! multimodal LLM.
//!
//! ## Why this crate?
//!
//! Supermarket flyers are laid out for people, not parsers: prices float
//! next to the wrong product, "2 for $5" and "Buy One Get One" need
//! arithmetic, and sizes hide inside product names. Instead of scraping
//! text out of the PDF, the whole document is sent to a model that reads
//! it as a shopper would and answers with a JSON array of deals. This
//! crate then repairs whatever the model got wrong at the syntax level and
//! writes clean JSON and CSV (plus a small search page for store flyers).
//!
//! ## Pipeline Overview
//!
//! ```text
//! flyer.pdf …
//!  │
//!  ├─ 1. Input      expand globs, skip missing / non-PDF paths
//!  ├─ 2. Encode     PDF bytes → base64 document block
//!  ├─ 3. Extract    one Messages API call per flyer (sequential)
//!  ├─ 4. Normalise  strip fences, repair truncation, coerce prices
//!  └─ 5. Write      drop unpriced records → JSON + CSV (+ HTML)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slugsaver::{extract_to_dir, ExtractionConfig, FlyerVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from ANTHROPIC_API_KEY when not set on the builder
//!     let config = ExtractionConfig::builder()
//!         .variant(FlyerVariant::Safeway)
//!         .build()?;
//!     let (output, written) = extract_to_dir(&["flyers/*.pdf"], &config).await?;
//!     eprintln!("{} deals → {}", output.deals.len(), written.json.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slugsaver` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! slugsaver = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, FlyerVariant};
pub use error::{DealsError, FileError};
pub use extract::{extract_deals, extract_file, extract_to_dir, FileExtraction};
pub use output::{Deal, DealType, FileReport, FileStatus, RunOutput, RunStats, WrittenFiles};
pub use pipeline::encode::DocumentPayload;
pub use pipeline::llm::{AnthropicExtractor, Completion, Extractor};
pub use pipeline::write::write_outputs;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
