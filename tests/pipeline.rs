//! Integration tests for the extraction run with a scripted extractor.
//!
//! The mock hands out one canned answer per call, in call order. Flyers are
//! processed sequentially, so call order is input order.

use async_trait::async_trait;
use slugsaver::{
    extract_deals, extract_to_dir, Completion, DealsError, DocumentPayload, ExtractionConfig,
    ExtractionProgressCallback, Extractor, FileError, FileStatus, FlyerVariant,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct ScriptedExtractor {
    answers: Mutex<VecDeque<Result<Completion, FileError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    fn new(answers: Vec<Result<Completion, FileError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn complete(
        &self,
        _document: &DocumentPayload,
        prompt: &str,
    ) -> Result<Completion, FileError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FileError::EmptyCompletion {
                provider: "scripted".into(),
            }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn ok(text: &str) -> Result<Completion, FileError> {
    Ok(Completion::from_text(text))
}

fn transport_failure() -> Result<Completion, FileError> {
    Err(FileError::Transport {
        provider: "scripted".into(),
        detail: "connection reset".into(),
    })
}

fn write_pdf(dir: &Path, name: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, b"%PDF-1.4\n%%EOF\n").unwrap();
    p.to_string_lossy().into_owned()
}

fn config_with(
    extractor: Arc<ScriptedExtractor>,
    variant: FlyerVariant,
    out: &Path,
) -> ExtractionConfig {
    ExtractionConfig::builder()
        .variant(variant)
        .output_dir(out)
        .extractor(extractor)
        .build()
        .unwrap()
}

const THREE_DEALS: &str = r#"[
  {"item":"Bananas","sale_price":0.49,"reg_price":0.69,"unit":"LB","size":null},
  {"item":"Cheerios","sale_price":3,"reg_price":5.49,"unit":"EA","size":"12oz"},
  {"item":"Yogurt","sale_price":1.25,"reg_price":null,"unit":"EA","size":"5.3oz"}
]"#;

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failing_flyer_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_pdf(dir.path(), "a_good.pdf");
    let bad = write_pdf(dir.path(), "b_bad.pdf");
    let out = dir.path().join("out");

    let extractor = ScriptedExtractor::new(vec![ok(THREE_DEALS), transport_failure()]);
    let config = config_with(extractor.clone(), FlyerVariant::Generic, &out);

    let (output, written) = extract_to_dir(&[good, bad], &config).await.unwrap();

    assert_eq!(extractor.calls(), 2);
    assert_eq!(output.deals.len(), 3);
    assert_eq!(output.failures().count(), 1);
    assert_eq!(output.stats.extracted_files, 1);
    assert_eq!(output.stats.failed_files, 1);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written.json).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);
    assert_eq!(json[1]["sale_price"], serde_json::json!(3.0));

    let csv = std::fs::read_to_string(&written.csv).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert_eq!(csv.lines().next(), Some("store,item,size,unit,sale_price,reg_price"));
    assert_eq!(written.html, None);
    assert_eq!(written.json, out.join("deals.json"));
}

#[tokio::test]
async fn safeway_run_writes_all_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "safeway.pdf");
    let out = dir.path().join("out_safeway");

    let extractor = ScriptedExtractor::new(vec![ok(
        r#"```json
[{"item":"Chips","save_price":3.5,"reg_price":null,"unit":"EA","size":"8oz"},
 {"item":"Soup","sale_price":1.25,"reg_price":null,"unit":"EA","size":null,"deal_type":"multi_buy"},
 {"item":"Cereal","sale_price":2.5,"reg_price":5.0,"unit":"EA","size":null,"deal_type":"BOGO"},
 {"item":"Steak","sale_price":8.99,"reg_"#,
    )]);
    let config = config_with(extractor, FlyerVariant::Safeway, &out);

    let (output, written) = extract_to_dir(&[flyer], &config).await.unwrap();

    assert_eq!(output.deals.len(), 3);
    assert!(matches!(
        output.files[0].status,
        FileStatus::Extracted {
            records: 3,
            truncation_recovered: true,
            ..
        }
    ));
    assert!(output
        .deals
        .iter()
        .all(|d| d.store.as_deref() == Some("Safeway")));
    assert_eq!(output.deals[0].sale_price, Some(3.5));

    let html = written.html.expect("html written");
    assert_eq!(html, out.join("index_safeway.html"));
    assert!(std::fs::read_to_string(html)
        .unwrap()
        .contains("deals_safeway.json"));

    let csv = std::fs::read_to_string(&written.csv).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "store,item,size,unit,sale_price,reg_price,deal_type");
    assert_eq!(lines[1], "Safeway,Chips,8oz,EA,3.50,,");
    assert_eq!(lines[3], "Safeway,Cereal,,EA,2.50,5.00,BOGO");
}

// ── Selection ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bad_inputs_are_skipped_without_a_request() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_pdf(dir.path(), "flyer.pdf");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").unwrap();
    let missing = dir.path().join("missing.pdf");

    let extractor = ScriptedExtractor::new(vec![ok(THREE_DEALS)]);
    let config = config_with(extractor.clone(), FlyerVariant::Generic, dir.path());

    let inputs = vec![
        missing.to_string_lossy().into_owned(),
        notes.to_string_lossy().into_owned(),
        good,
    ];
    let output = extract_deals(&inputs, &config).await.unwrap();

    assert_eq!(extractor.calls(), 1);
    assert_eq!(output.stats.total_files, 3);
    assert_eq!(output.stats.skipped_files, 2);
    assert!(matches!(
        output.files[0].status,
        FileStatus::Skipped(FileError::NotFound { .. })
    ));
    assert!(matches!(
        output.files[1].status,
        FileStatus::Skipped(FileError::NotPdfExtension { .. })
    ));
    assert_eq!(output.deals.len(), 3);
}

#[tokio::test]
async fn glob_patterns_expand_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "week2.pdf");
    write_pdf(dir.path(), "week1.pdf");

    let extractor = ScriptedExtractor::new(vec![
        ok(r#"[{"item":"First","sale_price":1.0}]"#),
        ok(r#"[{"item":"Second","sale_price":2.0}]"#),
    ]);
    let config = config_with(extractor, FlyerVariant::Generic, dir.path());

    let pattern = format!("{}/week*.pdf", dir.path().display());
    let output = extract_deals(&[pattern], &config).await.unwrap();

    let names: Vec<_> = output
        .files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["week1.pdf", "week2.pdf"]);
    let items: Vec<_> = output.deals.iter().map(|d| d.item.as_str()).collect();
    assert_eq!(items, vec!["First", "Second"]);
}

// ── Filtering and empty results ──────────────────────────────────────────────

#[tokio::test]
async fn unpriced_records_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "flyer.pdf");

    let extractor = ScriptedExtractor::new(vec![ok(
        r#"[{"item":"A","sale_price":1},{"item":"$2 OFF Coffee","sale_price":null,"reg_price":null},{"item":"C","reg_price":4}]"#,
    )]);
    let config = config_with(extractor, FlyerVariant::Generic, dir.path());

    let output = extract_deals(&[flyer], &config).await.unwrap();
    assert_eq!(output.stats.records_extracted, 3);
    assert_eq!(output.stats.records_dropped, 1);
    let items: Vec<_> = output.deals.iter().map(|d| d.item.as_str()).collect();
    assert_eq!(items, vec!["A", "C"]);
}

#[tokio::test]
async fn overflowing_prices_do_not_survive_the_filter() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "flyer.pdf");
    let out = dir.path().join("out");

    let extractor = ScriptedExtractor::new(vec![ok(r#"[{"item":"Glitch","sale_price":1e307}]"#)]);
    let config = config_with(extractor, FlyerVariant::Generic, &out);

    let err = extract_to_dir(&[flyer], &config).await.unwrap_err();
    assert!(matches!(err, DealsError::NoDeals { failed: 0, skipped: 0 }), "got {err:?}");
    assert!(!out.exists());
}

#[tokio::test]
async fn generic_run_keeps_model_deal_type_in_json() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "flyer.pdf");
    let out = dir.path().join("out");

    let extractor = ScriptedExtractor::new(vec![ok(
        r#"[{"item":"A","sale_price":1,"deal_type":"BOGO","limit":2}]"#,
    )]);
    let config = config_with(extractor, FlyerVariant::Generic, &out);

    let (_, written) = extract_to_dir(&[flyer], &config).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written.json).unwrap()).unwrap();
    assert_eq!(json[0]["deal_type"], "BOGO");
    assert_eq!(json[0]["limit"], 2);
}

#[tokio::test]
async fn nothing_extracted_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "flyer.pdf");
    let out = dir.path().join("out");

    let extractor = ScriptedExtractor::new(vec![ok("I'm sorry, I can't read this flyer.")]);
    let config = config_with(extractor, FlyerVariant::Generic, &out);

    let err = extract_to_dir(&[flyer, "nope.pdf".to_string()], &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DealsError::NoDeals { failed: 1, skipped: 1 }),
        "got {err:?}"
    );
    assert!(!out.exists());
}

#[tokio::test]
async fn malformed_answer_counts_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_pdf(dir.path(), "a.pdf");
    let b = write_pdf(dir.path(), "b.pdf");

    let extractor = ScriptedExtractor::new(vec![ok("{{{{"), ok(THREE_DEALS)]);
    let config = config_with(extractor, FlyerVariant::Generic, dir.path());

    let output = extract_deals(&[a, b], &config).await.unwrap();
    assert!(matches!(
        output.files[0].status,
        FileStatus::Failed(FileError::MalformedResponse { .. })
    ));
    assert_eq!(output.deals.len(), 3);
}

// ── Configuration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_prompt_reaches_the_extractor() {
    let dir = tempfile::tempdir().unwrap();
    let flyer = write_pdf(dir.path(), "flyer.pdf");

    let extractor = ScriptedExtractor::new(vec![ok("[]")]);
    let config = ExtractionConfig::builder()
        .prompt("List the deals as JSON.")
        .extractor(extractor.clone())
        .build()
        .unwrap();

    extract_deals(&[flyer], &config).await.unwrap();
    assert_eq!(
        extractor.prompts.lock().unwrap().as_slice(),
        ["List the deals as JSON.".to_string()]
    );
}

#[tokio::test]
async fn missing_credentials_are_fatal() {
    if std::env::var("ANTHROPIC_API_KEY").is_ok_and(|k| !k.trim().is_empty()) {
        println!("SKIP — ANTHROPIC_API_KEY is set in the environment");
        return;
    }
    let config = ExtractionConfig::default();
    let err = extract_deals(&["flyer.pdf"], &config).await.unwrap_err();
    assert!(matches!(err, DealsError::ExtractorNotConfigured { .. }));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }
}

fn name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ExtractionProgressCallback for EventLog {
    fn on_run_start(&self, total_files: usize) {
        self.push(format!("run_start {total_files}"));
    }
    fn on_file_skipped(&self, path: &Path, _reason: &str) {
        self.push(format!("skip {}", name(path)));
    }
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        self.push(format!("start {index}/{total} {}", name(path)));
    }
    fn on_file_complete(&self, index: usize, _total: usize, _path: &Path, records: usize) {
        self.push(format!("complete {index} {records}"));
    }
    fn on_file_error(&self, index: usize, _total: usize, _path: &Path, _error: &str) {
        self.push(format!("error {index}"));
    }
    fn on_run_complete(&self, extracted: usize, failed: usize, skipped: usize) {
        self.push(format!("run_complete {extracted} {failed} {skipped}"));
    }
}

#[tokio::test]
async fn progress_events_follow_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_pdf(dir.path(), "a.pdf");
    let b = write_pdf(dir.path(), "b.pdf");
    let missing = PathBuf::from("gone.pdf").to_string_lossy().into_owned();

    let log = Arc::new(EventLog::default());
    let extractor = ScriptedExtractor::new(vec![ok(THREE_DEALS), transport_failure()]);
    let config = ExtractionConfig::builder()
        .extractor(extractor)
        .progress_callback(log.clone())
        .build()
        .unwrap();

    extract_deals(&[a, missing, b], &config).await.unwrap();

    let events = log.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "run_start 3",
            "start 1/3 a.pdf",
            "complete 1 3",
            "skip gone.pdf",
            "start 3/3 b.pdf",
            "error 3",
            "run_complete 1 1 1",
        ]
    );
}
