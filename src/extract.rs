//! Run-level entry points: many flyers in, one deal list out.
//!
//! Flyers are processed strictly one after another. A failure on one flyer
//! (unreadable file, rejected request, unparseable answer) is recorded in
//! its [`FileReport`] and the run moves on; none of that flyer's records
//! are kept. Only setup problems and "nothing to write" are fatal.

use crate::config::ExtractionConfig;
use crate::error::{DealsError, FileError};
use crate::output::{Deal, FileReport, FileStatus, RunOutput, RunStats, WrittenFiles};
use crate::pipeline::llm::{AnthropicExtractor, Extractor};
use crate::pipeline::{encode, input, normalize, write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// What one successfully extracted flyer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FileExtraction {
    /// Normalised records, before the price filter.
    pub deals: Vec<Deal>,
    pub truncation_recovered: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Extract deals from every flyer matched by `inputs`.
///
/// Each input is a path or glob pattern. The returned [`RunOutput`] holds
/// the priced deals from all successful flyers, in input order, plus one
/// [`FileReport`] per expanded path.
///
/// # Errors
/// Returns `Err(DealsError)` only when no extractor can be configured.
/// An empty deal list is *not* an error here; see [`extract_to_dir`].
pub async fn extract_deals<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<RunOutput, DealsError> {
    let run_start = Instant::now();

    // ── Step 1: Get/create extractor ─────────────────────────────────────
    let extractor = resolve_extractor(config)?;
    debug!("Using extractor '{}'", extractor.name());

    // ── Step 2: Expand inputs ────────────────────────────────────────────
    let paths = input::expand_inputs(inputs);
    let total = paths.len();
    info!(
        "Processing {} input(s) as {} flyers with {}",
        total, config.variant, config.model
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 3: Process flyers one at a time ─────────────────────────────
    let mut collected: Vec<Deal> = Vec::new();
    let mut files: Vec<FileReport> = Vec::with_capacity(total);

    for (i, path) in paths.iter().enumerate() {
        let index = i + 1;
        let file_start = Instant::now();

        if let Err(e) = input::check_candidate(path) {
            warn!("Skipping {}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_skipped(path, &e.to_string());
            }
            files.push(FileReport {
                path: path.clone(),
                status: FileStatus::Skipped(e),
                duration_ms: 0,
            });
            continue;
        }

        info!("[{}/{}] Processing {}", index, total, path.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(index, total, path);
        }

        let status = match extract_file(path, config, extractor.as_ref()).await {
            Ok(extraction) => {
                let records = extraction.deals.len();
                if extraction.truncation_recovered {
                    warn!(
                        "Response for {} was truncated; recovered {} complete records",
                        path.display(),
                        records
                    );
                }
                info!("Extracted {} records from {}", records, path.display());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_complete(index, total, path, records);
                }
                collected.extend(extraction.deals);
                FileStatus::Extracted {
                    records,
                    truncation_recovered: extraction.truncation_recovered,
                    input_tokens: extraction.input_tokens,
                    output_tokens: extraction.output_tokens,
                }
            }
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(index, total, path, &e.to_string());
                }
                FileStatus::Failed(e)
            }
        };

        files.push(FileReport {
            path: path.clone(),
            status,
            duration_ms: file_start.elapsed().as_millis() as u64,
        });
    }

    // ── Step 4: Filter and aggregate ─────────────────────────────────────
    let records_extracted = collected.len();
    let (deals, records_dropped) = write::retain_priced(collected);

    let stats = compute_stats(&files, records_extracted, records_dropped, run_start);

    info!(
        "Run complete: {} deals from {}/{} files ({} failed, {} skipped), {}ms",
        deals.len(),
        stats.extracted_files,
        stats.total_files,
        stats.failed_files,
        stats.skipped_files,
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.extracted_files, stats.failed_files, stats.skipped_files);
    }

    Ok(RunOutput {
        deals,
        files,
        stats,
    })
}

/// Extract deals and write the output files into `config.output_dir`.
///
/// # Errors
/// * [`DealsError::NoDeals`] when no priced deal survived; nothing is written.
/// * Any setup or write error from [`extract_deals`] and
///   [`write::write_outputs`].
pub async fn extract_to_dir<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<(RunOutput, WrittenFiles), DealsError> {
    let output = extract_deals(inputs, config).await?;
    if output.is_empty() {
        return Err(DealsError::NoDeals {
            failed: output.stats.failed_files,
            skipped: output.stats.skipped_files,
        });
    }
    let written = write::write_outputs(&output.deals, config.variant, &config.output_dir).await?;
    Ok((output, written))
}

/// Run one flyer through encode → complete → normalise.
///
/// The path is not vetted here; callers that take user input should run
/// [`input::check_candidate`] first.
pub async fn extract_file(
    path: &Path,
    config: &ExtractionConfig,
    extractor: &dyn Extractor,
) -> Result<FileExtraction, FileError> {
    let document = encode::encode_pdf(path).await?;
    let completion = extractor
        .complete(&document, config.effective_prompt())
        .await?;
    if completion.hit_token_limit {
        debug!(
            "{} hit the {} token limit",
            path.display(),
            config.max_tokens
        );
    }

    let normalized = normalize::normalize_response(&completion.text, config.variant)?;
    Ok(FileExtraction {
        deals: normalized.deals,
        truncation_recovered: normalized.truncation_recovered,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the extractor, from most-specific to least-specific:
///
/// 1. **Pre-built extractor** (`config.extractor`), used as-is.
/// 2. **Configured key** (`config.api_key`) for the Anthropic client.
/// 3. **Environment** (`ANTHROPIC_API_KEY`).
fn resolve_extractor(config: &ExtractionConfig) -> Result<Arc<dyn Extractor>, DealsError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(Arc::new(AnthropicExtractor::new(key, config)?));
    }

    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(Arc::new(AnthropicExtractor::new(&key, config)?)),
        _ => Err(DealsError::ExtractorNotConfigured {
            hint: format!("No API key found. Pass --api-key or set {API_KEY_ENV}."),
        }),
    }
}

fn compute_stats(
    files: &[FileReport],
    records_extracted: usize,
    records_dropped: usize,
    run_start: Instant,
) -> RunStats {
    let (total_input_tokens, total_output_tokens) =
        files.iter().fold((0u64, 0u64), |(i, o), f| match f.status {
            FileStatus::Extracted {
                input_tokens,
                output_tokens,
                ..
            } => (i + input_tokens, o + output_tokens),
            _ => (i, o),
        });

    RunStats {
        total_files: files.len(),
        extracted_files: files.iter().filter(|f| f.is_extracted()).count(),
        failed_files: files.iter().filter(|f| f.is_failed()).count(),
        skipped_files: files.iter().filter(|f| f.is_skipped()).count(),
        records_extracted,
        records_dropped,
        total_input_tokens,
        total_output_tokens,
        total_duration_ms: run_start.elapsed().as_millis() as u64,
    }
}
