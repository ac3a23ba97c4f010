//! Output writing: price filter plus JSON, CSV and HTML renderers.
//!
//! Renderers are pure `&[Deal] -> String` functions; [`write_outputs`] is
//! the only part that touches the filesystem. Every file is written to a
//! `.tmp` sibling first and renamed into place, so a crash never leaves a
//! half-written deals file behind.

use crate::config::FlyerVariant;
use crate::error::DealsError;
use crate::output::{Deal, WrittenFiles};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Split deals into those with at least one price and the count dropped.
pub fn retain_priced(deals: Vec<Deal>) -> (Vec<Deal>, usize) {
    let before = deals.len();
    let kept: Vec<Deal> = deals.into_iter().filter(Deal::has_price).collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        debug!("Dropped {} records without any price", dropped);
    }
    (kept, dropped)
}

// ── JSON ─────────────────────────────────────────────────────────────────────

/// Keys always written from typed fields; the same keys in `extra` are skipped.
const TYPED_KEYS: [&str; 5] = ["item", "sale_price", "reg_price", "unit", "size"];

/// A deal as laid out in the JSON file for a given variant.
struct DealRecord<'a> {
    deal: &'a Deal,
    variant: FlyerVariant,
}

impl Serialize for DealRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let d = self.deal;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("item", &d.item)?;
        map.serialize_entry("sale_price", &d.sale_price)?;
        map.serialize_entry("reg_price", &d.reg_price)?;
        map.serialize_entry("unit", &d.unit)?;
        map.serialize_entry("size", &d.size)?;
        if self.variant.is_store_specific() {
            map.serialize_entry("deal_type", &d.deal_type)?;
        }
        if let Some(store) = &d.store {
            map.serialize_entry("store", store)?;
        }
        for (key, value) in &d.extra {
            let written = match key.as_str() {
                "deal_type" => self.variant.is_store_specific(),
                "store" => d.store.is_some(),
                k => TYPED_KEYS.contains(&k),
            };
            if !written {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// Pretty-printed JSON array of deals.
pub fn render_json(deals: &[Deal], variant: FlyerVariant) -> Result<String, DealsError> {
    let records: Vec<DealRecord<'_>> = deals
        .iter()
        .map(|deal| DealRecord { deal, variant })
        .collect();
    let mut json = serde_json::to_string_pretty(&records)?;
    json.push('\n');
    Ok(json)
}

// ── CSV ──────────────────────────────────────────────────────────────────────

const CSV_COLUMNS: [&str; 6] = ["store", "item", "size", "unit", "sale_price", "reg_price"];

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map(|p| format!("{p:.2}")).unwrap_or_default()
}

/// CSV with a fixed column set; the store-specific variant adds `deal_type`.
pub fn render_csv(deals: &[Deal], variant: FlyerVariant) -> String {
    let with_deal_type = variant.is_store_specific();

    let mut csv = CSV_COLUMNS.join(",");
    if with_deal_type {
        csv.push_str(",deal_type");
    }
    csv.push('\n');

    for d in deals {
        let mut row = vec![
            escape_csv(d.store.as_deref().unwrap_or("")),
            escape_csv(&d.item),
            escape_csv(d.size.as_deref().unwrap_or("")),
            escape_csv(d.unit.as_deref().unwrap_or("")),
            format_price(d.sale_price),
            format_price(d.reg_price),
        ];
        if with_deal_type {
            row.push(d.deal_type.map(|t| t.as_str().to_string()).unwrap_or_default());
        }
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

// ── HTML ─────────────────────────────────────────────────────────────────────

const HTML_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>SlugSaver - __STORE__</title>
<style>
body { font-family: system-ui, sans-serif; margin: 24px; }
input { width: 100%; padding: 10px; font-size: 16px; }
table { width: 100%; border-collapse: collapse; margin-top: 16px; }
th, td { padding: 8px; border-bottom: 1px solid #eee; text-align: left; }
th { background: #fafafa; }
.badge { background: #ff6b6b; color: white; padding: 2px 6px; border-radius: 6px; font-size: 12px; }
</style>
</head>
<body>
<h1>SlugSaver - __STORE__ Deals</h1>
<input id="q" placeholder="Search..." autofocus>
<table>
<thead><tr><th>Item</th><th>Size</th><th>Sale</th><th>Reg</th><th>Store</th><th>Unit</th></tr></thead>
<tbody id="rows"></tbody>
</table>
<script>
const rowsEl = document.getElementById('rows');
const input = document.getElementById('q');
let data = [];
function esc(v) {
  return String(v == null ? '' : v)
    .replace(/&/g, '&amp;').replace(/</g, '&lt;').replace(/>/g, '&gt;')
    .replace(/"/g, '&quot;').replace(/'/g, '&#39;');
}
function money(v) { return v == null ? '' : '$' + Number(v).toFixed(2); }
function render(q) {
  const qq = q.toLowerCase();
  rowsEl.innerHTML = data
    .filter(r => !qq || String(r.item).toLowerCase().includes(qq))
    .map(r => `<tr><td>${esc(r.item)}</td><td>${esc(r.size)}</td><td>${money(r.sale_price)}</td><td>${money(r.reg_price)}</td><td><span class="badge">${esc(r.store)}</span></td><td>${esc(r.unit)}</td></tr>`)
    .join('');
}
fetch('__JSON_FILE__').then(r => r.json()).then(j => { data = j; render(input.value); });
input.addEventListener('input', e => render(e.target.value));
</script>
</body>
</html>
"#;

/// Static search page for the store-specific variant; `None` otherwise.
///
/// The page loads the JSON file from its own directory at view time, so it
/// never embeds deal data.
pub fn render_html(variant: FlyerVariant) -> Option<String> {
    variant.html_file_name()?;
    let store = variant.store_name()?;
    Some(
        HTML_TEMPLATE
            .replace("__STORE__", store)
            .replace("__JSON_FILE__", variant.json_file_name()),
    )
}

// ── Files ────────────────────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomic write: write to temp, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), DealsError> {
    let tmp = tmp_path(path);
    let write_err = |source| DealsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)
}

/// Write the variant's output files into `dir`.
///
/// # Errors
/// * [`DealsError::NoDeals`] when `deals` is empty; nothing is written.
/// * [`DealsError::OutputDirFailed`] / [`DealsError::OutputWriteFailed`] on I/O failure.
pub async fn write_outputs(
    deals: &[Deal],
    variant: FlyerVariant,
    dir: &Path,
) -> Result<WrittenFiles, DealsError> {
    if deals.is_empty() {
        return Err(DealsError::NoDeals {
            failed: 0,
            skipped: 0,
        });
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DealsError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let json_path = dir.join(variant.json_file_name());
    write_atomic(&json_path, &render_json(deals, variant)?).await?;
    info!("Wrote {} ({} items)", json_path.display(), deals.len());

    let csv_path = dir.join(variant.csv_file_name());
    write_atomic(&csv_path, &render_csv(deals, variant)).await?;
    info!("Wrote {}", csv_path.display());

    let html_path = match (variant.html_file_name(), render_html(variant)) {
        (Some(name), Some(html)) => {
            let path = dir.join(name);
            write_atomic(&path, &html).await?;
            info!("Wrote {}", path.display());
            Some(path)
        }
        _ => None,
    };

    Ok(WrittenFiles {
        json: json_path,
        csv: csv_path,
        html: html_path,
    })
}
