//! Normalisation: turn untrusted model output into typed [`Deal`] records.
//!
//! The prompt asks for a bare JSON array, but models still wrap it in
//! markdown fences, run out of output tokens half-way through a record, or
//! leave a dangling comma before the closing bracket. Each of those quirks
//! is handled by one small pure function here so it can be tested on its
//! own:
//!
//! 1. [`strip_code_fences`] — keep only the fenced body, `json` fence first
//! 2. [`repair_truncated_array`] — cut back to the last complete record and
//!    re-close the array
//! 3. [`remove_trailing_commas`] — drop commas right before `]` or `}`
//! 4. [`parse_records`] — parse the array of objects (failure is fatal for
//!    the file)
//! 5. [`build_deal`] — coerce prices to cents, fix the `save_price` typo,
//!    tag the store
//!
//! Prices derived by the model (multi-buy division, BOGO halving) are taken
//! as given; nothing here re-checks the arithmetic. Records without any
//! price are kept at this stage and dropped by the writer.

use crate::config::FlyerVariant;
use crate::error::FileError;
use crate::output::{Deal, DealType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::str::CharIndices;
use tracing::{debug, warn};

/// Records parsed from one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub deals: Vec<Deal>,
    /// True when [`repair_truncated_array`] had to cut the text.
    pub truncation_recovered: bool,
}

/// Run every normalisation step over a raw completion.
pub fn normalize_response(raw: &str, variant: FlyerVariant) -> Result<Normalized, FileError> {
    let unfenced = strip_code_fences(raw.trim());
    let repair = repair_truncated_array(unfenced);
    let cleaned = remove_trailing_commas(&repair.text);
    let records = parse_records(&cleaned)?;

    let deals: Vec<Deal> = records
        .into_iter()
        .map(|record| build_deal(record, variant))
        .collect();
    debug!("Normalised {} records", deals.len());

    Ok(Normalized {
        deals,
        truncation_recovered: repair.recovered,
    })
}

// ── Step 1: Strip markdown fences ────────────────────────────────────────────

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// A bare language tag on the first line of a fenced body (```` ```JSON ````).
static RE_LANG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_+-]*[ \t]*\r?\n").unwrap());

/// Keep only the content of the first fenced block.
///
/// A `json`-tagged fence wins over an earlier bare one. A block whose closing
/// fence never arrived (truncated output) keeps everything after the opener.
/// Text without fences is returned unchanged, which makes the function
/// idempotent.
pub fn strip_code_fences(input: &str) -> &str {
    let body_start = match input.find(JSON_FENCE) {
        Some(i) => i + JSON_FENCE.len(),
        None => match input.find(FENCE) {
            Some(i) => i + FENCE.len(),
            None => return input,
        },
    };

    let rest = &input[body_start..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };

    let body = match RE_LANG_LINE.find(body) {
        Some(m) => &body[m.end()..],
        None => body,
    };
    body.trim()
}

// ── Shared: JSON-aware character scan ────────────────────────────────────────

/// Walks a JSON-ish string, flagging which characters sit outside string
/// literals. Tolerates unterminated strings (everything after the opening
/// quote is reported as non-structural).
struct JsonScanner<'a> {
    chars: CharIndices<'a>,
    in_string: bool,
    escaped: bool,
}

impl<'a> JsonScanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.char_indices(),
            in_string: false,
            escaped: false,
        }
    }
}

impl Iterator for JsonScanner<'_> {
    /// `(byte offset, char, outside a string literal)`
    type Item = (usize, char, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let (i, c) = self.chars.next()?;
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return Some((i, c, false));
        }
        if c == '"' {
            self.in_string = true;
            return Some((i, c, false));
        }
        Some((i, c, true))
    }
}

// ── Step 2: Repair a truncated array ─────────────────────────────────────────

/// Result of [`repair_truncated_array`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationRepair {
    /// Text to hand to the parser.
    pub text: String,
    /// True when the text was cut and re-closed.
    pub recovered: bool,
}

/// Re-close a JSON array that was cut off mid-record.
///
/// If the trimmed text already ends with `]` it is returned as-is.
/// Otherwise the text is cut right after the last `}` that closes a
/// top-level record of the array and a `]` is appended. Text that is not an
/// array, or has no complete record, is returned unchanged and left for the
/// parser to reject. This is a heuristic and does not guarantee the result
/// parses.
pub fn repair_truncated_array(input: &str) -> TruncationRepair {
    let trimmed = input.trim();
    let unchanged = || TruncationRepair {
        text: trimmed.to_string(),
        recovered: false,
    };

    if trimmed.ends_with(']') || !trimmed.starts_with('[') {
        return unchanged();
    }

    let mut depth = 0usize;
    let mut last_record_end = None;
    for (i, c, structural) in JsonScanner::new(trimmed) {
        if !structural {
            continue;
        }
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if c == '}' && depth == 1 {
                    last_record_end = Some(i);
                }
            }
            _ => {}
        }
    }

    match last_record_end {
        Some(end) => {
            let mut text = String::with_capacity(end + 2);
            text.push_str(&trimmed[..=end]);
            text.push(']');
            TruncationRepair {
                text,
                recovered: true,
            }
        }
        None => unchanged(),
    }
}

// ── Step 3: Remove trailing commas ───────────────────────────────────────────

/// Drop commas that, ignoring whitespace, directly precede `]` or `}`.
///
/// Commas inside string literals are never touched.
pub fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_comma: Option<usize> = None;

    for (_, c, structural) in JsonScanner::new(input) {
        if structural {
            match c {
                ',' => {
                    pending_comma = Some(out.len());
                    out.push(c);
                    continue;
                }
                ']' | '}' => {
                    if let Some(at) = pending_comma.take() {
                        out.remove(at);
                    }
                }
                c if c.is_whitespace() => {}
                _ => pending_comma = None,
            }
        } else {
            pending_comma = None;
        }
        out.push(c);
    }
    out
}

// ── Step 4: Parse ────────────────────────────────────────────────────────────

/// Parse the cleaned text into record objects.
///
/// A top-level object wrapping exactly one array (`{"deals": [...]}`) is
/// unwrapped. Array elements that are not objects are skipped.
pub fn parse_records(input: &str) -> Result<Vec<Map<String, Value>>, FileError> {
    let value: Value = serde_json::from_str(input).map_err(|e| FileError::MalformedResponse {
        detail: format!("{e} (response starts with {:?})", preview(input)),
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => unwrap_single_array(map)?,
        other => {
            return Err(FileError::MalformedResponse {
                detail: format!("expected a JSON array, found {}", json_kind(&other)),
            })
        }
    };

    let total = items.len();
    let records: Vec<Map<String, Value>> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            other => {
                warn!("Skipping non-object array element ({})", json_kind(&other));
                None
            }
        })
        .collect();
    if records.len() < total {
        debug!("Kept {}/{} array elements", records.len(), total);
    }
    Ok(records)
}

fn unwrap_single_array(map: Map<String, Value>) -> Result<Vec<Value>, FileError> {
    let mut arrays = map.into_iter().filter_map(|(key, v)| match v {
        Value::Array(items) => Some((key, items)),
        _ => None,
    });
    match (arrays.next(), arrays.next()) {
        (Some((key, items)), None) => {
            debug!("Unwrapping array under key '{}'", key);
            Ok(items)
        }
        _ => Err(FileError::MalformedResponse {
            detail: "expected a JSON array, found an object".into(),
        }),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(s: &str) -> String {
    s.chars().take(60).collect()
}

// ── Step 5: Build typed records ──────────────────────────────────────────────

/// Misspelling of `sale_price` the store-specific prompt occasionally yields.
const MISSPELLED_SALE_PRICE: &str = "save_price";

/// Turn one parsed object into a [`Deal`].
///
/// Prices are coerced to `f64` rounded to cents (`null` stays `None`).
/// For the store-specific variant the `save_price` typo is folded into
/// `sale_price` and `store` is forced to the variant's store name. Unknown
/// keys are preserved in [`Deal::extra`].
pub fn build_deal(mut record: Map<String, Value>, variant: FlyerVariant) -> Deal {
    if variant.is_store_specific() {
        fix_misspelled_sale_price(&mut record);
    }

    let item = record
        .remove("item")
        .and_then(coerce_text)
        .unwrap_or_default();
    let sale_price = record
        .remove("sale_price")
        .and_then(|v| coerce_price("sale_price", &item, v));
    let reg_price = record
        .remove("reg_price")
        .and_then(|v| coerce_price("reg_price", &item, v));
    let unit = record.remove("unit").and_then(coerce_text);
    let size = record.remove("size").and_then(coerce_text);

    let deal_type = if variant.is_store_specific() {
        record.remove("deal_type").and_then(|v| coerce_deal_type(&item, v))
    } else {
        None
    };

    let mut store = record.remove("store").and_then(coerce_text);
    if let Some(name) = variant.store_name() {
        store = Some(name.to_string());
    }

    Deal {
        item,
        sale_price,
        reg_price,
        unit,
        size,
        deal_type,
        store,
        extra: record,
    }
}

/// Fold `save_price` into `sale_price`; the typo key is always removed.
fn fix_misspelled_sale_price(record: &mut Map<String, Value>) {
    let Some(value) = record.remove(MISSPELLED_SALE_PRICE) else {
        return;
    };
    let sale_missing = record.get("sale_price").is_none_or(Value::is_null);
    if sale_missing {
        debug!("Renaming '{}' to 'sale_price'", MISSPELLED_SALE_PRICE);
        record.insert("sale_price".to_string(), value);
    } else {
        debug!(
            "Dropping '{}'; 'sale_price' already present",
            MISSPELLED_SALE_PRICE
        );
    }
}

/// Round a dollar amount to cents.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Coerce a price value. `null`, empty, unparseable and negative values
/// become `None`; the latter two are logged.
fn coerce_price(field: &str, item: &str, value: Value) -> Option<f64> {
    let parsed = match &value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };

    match parsed.map(round_to_cents) {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            warn!("Discarding {} {} for '{}'", field, value, item);
            None
        }
    }
}

/// Coerce a short text field; numbers and booleans are stringified.
fn coerce_text(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn coerce_deal_type(item: &str, value: Value) -> Option<DealType> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let parsed = DealType::parse_loose(&s);
            if parsed.is_none() {
                debug!("Unknown deal_type '{}' for '{}'", s, item);
            }
            parsed
        }
        other => {
            debug!("Unexpected deal_type {} for '{}'", other, item);
            None
        }
    }
}
