//! Output types: deal records and the per-run report.
//!
//! A run produces a [`RunOutput`]: the aggregated [`Deal`] records that
//! survived the price filter, one [`FileReport`] per input path (in input
//! order) and summary [`RunStats`]. The value is returned rather than kept
//! in global state, so callers decide what to print and what to write.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Promotion type tag emitted by the store-specific prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealType {
    /// "Buy one get one": sale price is half the regular price.
    #[serde(rename = "BOGO")]
    Bogo,
    /// "N for $M": sale price is M/N.
    #[serde(rename = "multi_buy")]
    MultiBuy,
    /// Plain member/sale price.
    #[serde(rename = "regular")]
    Regular,
}

impl DealType {
    /// The tag as written to JSON and CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Bogo => "BOGO",
            DealType::MultiBuy => "multi_buy",
            DealType::Regular => "regular",
        }
    }

    /// Lenient parse of a model-supplied tag (`"bogo"`, `"Multi-Buy"`, …).
    pub fn parse_loose(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "bogo" | "buyonegetone" => Some(DealType::Bogo),
            "multibuy" => Some(DealType::MultiBuy),
            "regular" => Some(DealType::Regular),
            _ => None,
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One promoted product, normalised from model output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Deal {
    /// Product name without size information.
    #[serde(default)]
    pub item: String,

    /// Sale price in dollars, rounded to cents.
    #[serde(default)]
    pub sale_price: Option<f64>,

    /// Regular price in dollars, rounded to cents.
    #[serde(default)]
    pub reg_price: Option<f64>,

    /// Pricing unit such as `LB` or `EA`.
    #[serde(default)]
    pub unit: Option<String>,

    /// Package size such as `32oz` or `3ct`.
    #[serde(default)]
    pub size: Option<String>,

    /// Promotion type (store-specific variant only).
    #[serde(default)]
    pub deal_type: Option<DealType>,

    /// Store the flyer belongs to (store-specific variant only).
    #[serde(default)]
    pub store: Option<String>,

    /// Any further keys the model emitted, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Deal {
    /// True when at least one price field is present.
    pub fn has_price(&self) -> bool {
        self.sale_price.is_some() || self.reg_price.is_some()
    }
}

/// Outcome for a single input path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Path as expanded from the input arguments.
    pub path: PathBuf,
    /// What happened to it.
    pub status: FileStatus,
    /// Wall-clock time spent on this file, in milliseconds.
    pub duration_ms: u64,
}

/// Per-file status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileStatus {
    /// The model answered and the answer was normalised.
    Extracted {
        /// Records produced by the normaliser (before the price filter).
        records: usize,
        /// True when the truncated-array repair had to be applied.
        truncation_recovered: bool,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Rejected during input selection; no request was made.
    Skipped(FileError),
    /// Attempted and failed; none of its records were kept.
    Failed(FileError),
}

impl FileReport {
    pub fn is_extracted(&self) -> bool {
        matches!(self.status, FileStatus::Extracted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, FileStatus::Skipped(_))
    }

    /// The error, if the file was skipped or failed.
    pub fn error(&self) -> Option<&FileError> {
        match &self.status {
            FileStatus::Skipped(e) | FileStatus::Failed(e) => Some(e),
            FileStatus::Extracted { .. } => None,
        }
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Paths after glob expansion.
    pub total_files: usize,
    pub extracted_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    /// Records produced by the normaliser across all extracted files.
    pub records_extracted: usize,
    /// Records removed by the price filter.
    pub records_dropped: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// Priced deals from every successfully extracted file, in input order.
    pub deals: Vec<Deal>,
    /// One report per expanded input path, in input order.
    pub files: Vec<FileReport>,
    pub stats: RunStats,
}

impl RunOutput {
    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    /// Reports for files that were attempted and failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_failed())
    }
}

/// Paths written by [`crate::pipeline::write::write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    /// Only written for the store-specific variant.
    pub html: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deal_type_loose_parse() {
        assert_eq!(DealType::parse_loose("BOGO"), Some(DealType::Bogo));
        assert_eq!(DealType::parse_loose("bogo"), Some(DealType::Bogo));
        assert_eq!(DealType::parse_loose("multi_buy"), Some(DealType::MultiBuy));
        assert_eq!(DealType::parse_loose("Multi-Buy"), Some(DealType::MultiBuy));
        assert_eq!(DealType::parse_loose(" regular "), Some(DealType::Regular));
        assert_eq!(DealType::parse_loose("clearance"), None);
    }

    #[test]
    fn deal_type_serialises_with_tag_spelling() {
        assert_eq!(serde_json::to_value(DealType::Bogo).unwrap(), json!("BOGO"));
        assert_eq!(
            serde_json::to_value(DealType::MultiBuy).unwrap(),
            json!("multi_buy")
        );
    }

    #[test]
    fn has_price_requires_one_price() {
        let mut d = Deal {
            item: "Milk".into(),
            ..Default::default()
        };
        assert!(!d.has_price());
        d.reg_price = Some(3.49);
        assert!(d.has_price());
    }

    #[test]
    fn deal_keeps_unknown_keys() {
        let d: Deal = serde_json::from_value(json!({
            "item": "Eggs",
            "sale_price": 2.99,
            "limit": "2 per household"
        }))
        .unwrap();
        assert_eq!(d.extra.get("limit"), Some(&json!("2 per household")));
        assert_eq!(d.reg_price, None);
    }
}
