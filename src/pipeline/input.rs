//! Input resolution: expand glob arguments and vet each candidate flyer.
//!
//! Every argument is treated as a glob pattern first. When a pattern
//! matches nothing (or is not a valid pattern) the argument is kept as a
//! literal path, so a plain filename with brackets in it still works and a
//! typo surfaces as "does not exist" rather than vanishing silently.
//!
//! Candidates that fail [`check_candidate`] are skipped with a diagnostic;
//! selection problems are never fatal for the run.

use crate::error::FileError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand each argument as a glob pattern, falling back to the literal path.
///
/// Matches keep the glob crate's ordering (alphabetical per pattern);
/// patterns keep their argument order. Duplicates are not removed.
pub fn expand_inputs<S: AsRef<str>>(patterns: &[S]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches = glob_matches(pattern);
        if matches.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            debug!("Pattern '{}' matched {} paths", pattern, matches.len());
            paths.extend(matches);
        }
    }
    paths
}

fn glob_matches(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(entries) => entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Unreadable path while expanding '{}': {}", pattern, e);
                    None
                }
            })
            .collect(),
        Err(e) => {
            debug!("'{}' is not a glob pattern ({}); using it literally", pattern, e);
            Vec::new()
        }
    }
}

/// True when the path ends in `.pdf`, in any letter case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Decide whether a candidate path should be sent for extraction.
///
/// Checks, in order: existence, `.pdf` extension, regular file, and the
/// `%PDF` magic bytes. A file too short to hold the header is left for
/// the service to judge.
pub fn check_candidate(path: &Path) -> Result<(), FileError> {
    if !path.exists() {
        return Err(FileError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if !has_pdf_extension(path) {
        return Err(FileError::NotPdfExtension {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(FileError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let mut file = std::fs::File::open(path).map_err(|e| FileError::ReadFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(FileError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    Ok(())
}
