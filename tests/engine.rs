//! End-to-end tests for the conversion engine.
//!
//! Everything here runs against real files in temporary directories. Fake
//! capabilities are plain closures registered through [`FnCapability`].

use edgequake_convert::{
    capabilities, Capability, CapabilityOutcome, CapabilityRegistry, ConversionEngine,
    ConversionRequest, EngineConfig, FailureKind, FnCapability, FormatId, NormalizationAction,
    Phase, ProgressSink, QualityTier,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────

fn fmt(s: &str) -> FormatId {
    FormatId::parse(s).unwrap()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Entries left behind in `dir`.
fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

/// Config whose intermediates land in `scratch`.
fn config_in(scratch: &Path) -> EngineConfig {
    EngineConfig::builder().temp_dir(scratch).build().unwrap()
}

/// Built-ins plus the given extra capabilities.
fn engine_with(config: EngineConfig, extra: Vec<(&str, &str, Arc<dyn Capability>)>) -> ConversionEngine {
    let mut registry = CapabilityRegistry::new();
    capabilities::register_builtin(&mut registry).unwrap();
    for (source, target, cap) in extra {
        registry.register(fmt(source), fmt(target), "test", cap).unwrap();
    }
    ConversionEngine::new(registry, config)
}

fn copying(name: &str) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(name, |input: &Path, output: &Path| {
        match std::fs::copy(input, output) {
            Ok(n) => CapabilityOutcome::ok(format!("copied {n} bytes")),
            Err(e) => CapabilityOutcome::failed(e.to_string()),
        }
    }))
}

fn failing(name: &str, message: &'static str) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(name, move |_: &Path, _: &Path| {
        CapabilityOutcome::failed(message)
    }))
}

/// Claims success without writing anything.
fn silent(name: &str) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(name, |_: &Path, _: &Path| {
        CapabilityOutcome::ok("done")
    }))
}

fn writing(name: &str, content: &'static str) -> Arc<dyn Capability> {
    Arc::new(FnCapability::new(name, move |_: &Path, output: &Path| {
        match std::fs::write(output, content) {
            Ok(()) => CapabilityOutcome::ok("written"),
            Err(e) => CapabilityOutcome::failed(e.to_string()),
        }
    }))
}

/// Minimal docx-shaped archive with stored (uncompressed) entries.
fn docx_bytes(payload: &str) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(payload.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, Phase, u8)>>,
    completed: Mutex<Vec<(String, bool)>>,
    batch: Mutex<Option<(usize, usize)>>,
}

impl ProgressSink for RecordingSink {
    fn emit_progress(&self, request_id: &str, phase: Phase, percent: u8) {
        self.events
            .lock()
            .unwrap()
            .push((request_id.to_string(), phase, percent));
    }

    fn on_request_complete(&self, request_id: &str, success: bool) {
        self.completed
            .lock()
            .unwrap()
            .push((request_id.to_string(), success));
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        *self.batch.lock().unwrap() = Some((total, succeeded));
    }
}

/// Raises the cancel flag once the first request has finished.
struct CancelAfterFirst {
    cancel: Arc<AtomicBool>,
}

impl ProgressSink for CancelAfterFirst {
    fn on_request_complete(&self, _request_id: &str, _success: bool) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

// ── Conversion ───────────────────────────────────────────────────────────

#[test]
fn test_direct_builtin_conversion() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = write(dir.path(), "people.csv", b"name,age\nalice,30\nbob,41\n");
    let output = dir.path().join("people.json");

    let engine = engine_with(config_in(scratch.path()), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("csv"), &fmt("json"));

    assert!(outcome.success, "{}", outcome.log);
    assert!(outcome.failure.is_none());
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json[1]["name"], "bob");
    assert_eq!(outcome.log.steps().count(), 1);
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn test_multi_hop_leaves_no_intermediates() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = write(dir.path(), "table.tsv", b"id\tlabel\n1\tone\n2\ttwo\n");
    let output = dir.path().join("table.json");

    let engine = engine_with(config_in(scratch.path()), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("tsv"), &fmt("json"));

    assert!(outcome.success, "{}", outcome.log);
    let route: Vec<&str> = outcome
        .path
        .as_ref()
        .unwrap()
        .formats()
        .iter()
        .map(FormatId::as_str)
        .collect();
    assert_eq!(route, ["tsv", "csv", "json"]);
    assert_eq!(outcome.log.steps().count(), 2);
    assert!(
        leftovers(scratch.path()).is_empty(),
        "leftovers: {:?}",
        leftovers(scratch.path())
    );
}

#[test]
fn test_step_failure_names_step_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = write(dir.path(), "in.a", b"payload");
    let output = dir.path().join("out.d");

    let engine = engine_with(
        config_in(scratch.path()),
        vec![
            ("a", "b", copying("a-to-b")),
            ("b", "c", copying("b-to-c")),
            ("c", "d", failing("c-to-d", "renderer crashed")),
        ],
    );
    let outcome = engine.convert_file(&input, &output, &fmt("a"), &fmt("d"));

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::StepFailed { step: 3 }));
    let failed = outcome.log.failed_step().unwrap();
    assert_eq!(failed.index, 3);
    assert_eq!(failed.capability.as_deref(), Some("c-to-d"));
    assert!(failed.message.contains("renderer crashed"));
    assert_eq!(outcome.log.steps().filter(|s| s.success).count(), 2);

    let text = outcome.log.to_string();
    assert!(text.contains("step 3"), "{text}");
    assert!(text.contains("FAILED"), "{text}");

    assert!(!output.exists());
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn test_direct_capability_preferred_over_route() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "in.a", b"payload");
    let output = dir.path().join("out.c");

    let engine = engine_with(
        EngineConfig::default(),
        vec![
            ("a", "b", copying("a-to-b")),
            ("b", "c", copying("b-to-c")),
            ("a", "c", copying("a-to-c")),
        ],
    );
    let outcome = engine.convert_file(&input, &output, &fmt("a"), &fmt("c"));

    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(outcome.path.unwrap().hops(), 1);
    let step = outcome.log.steps().next().unwrap();
    assert_eq!(step.capability.as_deref(), Some("a-to-c"));
}

#[test]
fn test_capability_missing() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "data.csv", b"a,b\n1,2\n");
    let output = dir.path().join("data.pdf");

    let engine = engine_with(EngineConfig::default(), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("csv"), &fmt("pdf"));

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::CapabilityMissing));
    assert_eq!(outcome.log.steps().count(), 0);
    assert!(!output.exists());
}

#[test]
fn test_success_without_output_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "in.x", b"payload");
    let output = dir.path().join("out.y");

    let engine = engine_with(EngineConfig::default(), vec![("x", "y", silent("liar"))]);
    let outcome = engine.convert_file(&input, &output, &fmt("x"), &fmt("y"));

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::StepFailed { step: 1 }));
    let step = outcome.log.failed_step().unwrap();
    assert!(step.message.contains("wrote no output"), "{}", step.message);
}

#[test]
fn test_empty_input_is_rejected_before_any_step() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "empty.csv", b"");
    let output = dir.path().join("empty.json");

    let engine = engine_with(EngineConfig::default(), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("csv"), &fmt("json"));

    assert!(!outcome.success);
    assert_eq!(
        outcome.failure,
        Some(FailureKind::Validation {
            code: "empty".into()
        })
    );
    assert_eq!(outcome.log.steps().count(), 0);
}

#[test]
fn test_missing_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(EngineConfig::default(), vec![]);
    let outcome = engine.convert_file(
        &dir.path().join("nope.csv"),
        &dir.path().join("out.json"),
        &fmt("csv"),
        &fmt("json"),
    );
    assert_eq!(
        outcome.failure,
        Some(FailureKind::Validation {
            code: "not_found".into()
        })
    );
}

#[test]
fn test_identity_conversion_copies() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "a.csv", b"x,y\n1,2\n");
    let output = dir.path().join("b.csv");

    let engine = engine_with(EngineConfig::default(), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("csv"), &fmt("csv"));

    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(std::fs::read(&output).unwrap(), b"x,y\n1,2\n");
    assert_eq!(outcome.path.unwrap().hops(), 0);
}

#[test]
fn test_identity_conversion_onto_itself_keeps_content() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "same.csv", b"x,y\n1,2\n");

    let engine = engine_with(EngineConfig::default(), vec![]);
    let outcome = engine.convert_file(&path, &path, &fmt("csv"), &fmt("csv"));

    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(std::fs::read(&path).unwrap(), b"x,y\n1,2\n");
    let step = outcome.log.steps().next().unwrap();
    assert!(step.message.contains("same file"), "{}", step.message);

    // Same file reached through a different spelling of the path.
    let dotted = dir.path().join(".").join("same.csv");
    let outcome = engine.convert_file(&path, &dotted, &fmt("csv"), &fmt("csv"));
    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(std::fs::read(&path).unwrap(), b"x,y\n1,2\n");
}

#[test]
fn test_text_input_starting_with_magic_word_converts() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "tags.csv", b"ID3,title\nv2,Intro\n");
    let output = dir.path().join("tags.json");

    let engine = engine_with(EngineConfig::default(), vec![]);
    let report = engine.pre_conversion_check(&input, &fmt("csv"), &fmt("json"));
    assert!(report.ok(), "{}", report.reason());

    let outcome = engine.convert_file(&input, &output, &fmt("csv"), &fmt("json"));
    assert!(outcome.success, "{}", outcome.log);
    assert!(std::fs::read_to_string(&output).unwrap().contains("\"ID3\": \"v2\""));
}

#[test]
fn test_corrupt_intermediate_is_caught_when_verifying() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = write(dir.path(), "in.a", b"payload");
    let output = dir.path().join("out.csv");

    let config = EngineConfig::builder()
        .temp_dir(scratch.path())
        .verify_intermediates(true)
        .build()
        .unwrap();
    let engine = engine_with(config, vec![("a", "json", writing("a-to-json", "{broken"))]);
    let outcome = engine.convert_file(&input, &output, &fmt("a"), &fmt("csv"));

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::StepFailed { step: 1 }));
    assert!(outcome.log.to_string().contains("rejected"));
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn test_concurrent_requests_share_one_engine() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let engine = Arc::new(engine_with(config_in(scratch.path()), vec![]));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let input = write(dir.path(), &format!("in{i}.tsv"), format!("n\n{i}\n").as_bytes());
            let output = dir.path().join(format!("out{i}.json"));
            std::thread::spawn(move || {
                let outcome = engine.convert_file(&input, &output, &fmt("tsv"), &fmt("json"));
                (outcome.success, std::fs::read_to_string(&output).unwrap_or_default())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (success, json) = handle.join().unwrap();
        assert!(success);
        assert!(json.contains(&format!("\"{i}\"")), "{json}");
    }
    assert!(leftovers(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_convert_file_async() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "notes.md", b"# Title\n\nSome *text*.\n");
    let output = dir.path().join("notes.html");

    let engine = Arc::new(engine_with(EngineConfig::default(), vec![]));
    let outcome = engine
        .convert_file_async(input, output.clone(), fmt("md"), fmt("html"))
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.log);
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("<h1>Title</h1>"), "{html}");
}

// ── Normalization ────────────────────────────────────────────────────────

#[test]
fn test_caller_input_untouched_by_default() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let original = b"caf\xe9 au lait\n".to_vec();
    let input = write(dir.path(), "menu.txt", &original);
    let output = dir.path().join("menu.html");

    let engine = engine_with(config_in(scratch.path()), vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("txt"), &fmt("html"));

    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(std::fs::read(&input).unwrap(), original);
    assert!(!dir.path().join("menu.txt.bak").exists());
    assert!(std::fs::read_to_string(&output).unwrap().contains("café"));
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn test_in_place_normalization_keeps_backup_for_undo() {
    let dir = TempDir::new().unwrap();
    let original = b"caf\xe9\n".to_vec();
    let input = write(dir.path(), "menu.txt", &original);
    let output = dir.path().join("menu.html");

    let config = EngineConfig::builder().normalize_in_place(true).build().unwrap();
    let engine = engine_with(config, vec![]);
    let outcome = engine.convert_file(&input, &output, &fmt("txt"), &fmt("html"));

    assert!(outcome.success, "{}", outcome.log);
    assert_eq!(std::fs::read_to_string(&input).unwrap(), "café\n");
    assert!(dir.path().join("menu.txt.bak").exists());

    assert!(engine.undo_normalization(&input));
    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn test_normalization_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "legacy.txt", b"na\xefve r\xe9sum\xe9\n");
    let engine = engine_with(EngineConfig::default(), vec![]);

    let first = engine.normalize_to_canonical(&input, None).unwrap();
    assert_eq!(first.action, NormalizationAction::Normalized);
    let after_first = std::fs::read(&input).unwrap();
    assert_eq!(String::from_utf8(after_first.clone()).unwrap(), "naïve résumé\n");

    let second = engine.normalize_to_canonical(&input, None).unwrap();
    assert_eq!(second.action, NormalizationAction::Noop);
    assert_eq!(std::fs::read(&input).unwrap(), after_first);
}

#[test]
fn test_binary_files_are_never_rewritten() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(EngineConfig::default(), vec![]);

    let mut zip_like = b"PK\x03\x04".to_vec();
    zip_like.extend_from_slice(&[0x14, 0x00, 0x00, 0x00, 0xE9, 0xFF, 0x00, 0x01]);
    let jpeg_like = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

    for (name, bytes) in [("archive.txt", zip_like), ("photo.txt", jpeg_like)] {
        let path = write(dir.path(), name, &bytes);
        let record = engine.normalize_to_canonical(&path, None).unwrap();
        assert_eq!(record.action, NormalizationAction::SkippedBinary, "{name}");
        assert_eq!(std::fs::read(&path).unwrap(), bytes, "{name}");
        assert!(record.backup.is_none());
    }
}

#[test]
fn test_failed_normalization_does_not_stop_conversion() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    // UTF-16LE byte-order mark followed by an odd number of bytes.
    let original = b"\xFF\xFEh\x00i\x00!".to_vec();
    let input = write(dir.path(), "odd.txt", &original);
    let output = dir.path().join("odd.raw");

    let engine = engine_with(config_in(scratch.path()), vec![("txt", "raw", copying("txt-to-raw"))]);
    let outcome = engine.convert_file(&input, &output, &fmt("txt"), &fmt("raw"));

    assert!(outcome.success, "{}", outcome.log);
    assert!(outcome.log.to_string().contains("normalization failed"), "{}", outcome.log);
    let step = outcome.log.steps().next().unwrap();
    assert_eq!(step.capability.as_deref(), Some("txt-to-raw"));
    assert!(step.success);
    assert_eq!(std::fs::read(&output).unwrap(), original);
    assert_eq!(std::fs::read(&input).unwrap(), original);
    assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn test_undo_leaves_foreign_backup_alone() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "report.csv", b"current\n");
    let users = write(dir.path(), "report.csv.bak", b"user's old copy\n");
    let engine = engine_with(EngineConfig::default(), vec![]);

    assert!(!engine.undo_normalization(&path));
    assert_eq!(std::fs::read(&path).unwrap(), b"current\n");
    assert_eq!(std::fs::read(&users).unwrap(), b"user's old copy\n");

    // Normalizing next to it picks a fresh backup name.
    std::fs::write(&path, b"caf\xe9\n").unwrap();
    let record = engine.normalize_to_canonical(&path, None).unwrap();
    assert_eq!(record.backup, Some(dir.path().join("report.csv.bak.1")));
    assert_eq!(std::fs::read(&users).unwrap(), b"user's old copy\n");
    assert!(engine.undo_normalization(&path));
    assert_eq!(std::fs::read(&path).unwrap(), b"caf\xe9\n");
}

#[test]
fn test_undo_without_backup_is_graceful() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "plain.txt", b"already utf-8\n");
    let engine = engine_with(EngineConfig::default(), vec![]);
    assert!(!engine.undo_normalization(&path));
    assert_eq!(std::fs::read(&path).unwrap(), b"already utf-8\n");
}

// ── Integrity ────────────────────────────────────────────────────────────

#[test]
fn test_complete_docx_passes() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "report.docx", &docx_bytes("<w:document>PAYLOAD</w:document>"));
    let engine = engine_with(EngineConfig::default(), vec![]);

    let report = engine.pre_conversion_check(&path, &fmt("docx"), &fmt("pdf"));
    assert!(report.ok(), "{}", report.reason());
    let sums = report.checksums.as_ref().unwrap();
    assert_eq!(sums.sha256.len(), 64);
    assert_eq!(sums.md5.len(), 32);
}

#[test]
fn test_damaged_docx_entry_is_corrupted() {
    let dir = TempDir::new().unwrap();
    let mut bytes = docx_bytes("<w:document>PAYLOAD</w:document>");
    let at = bytes
        .windows(7)
        .position(|w| w == b"PAYLOAD")
        .unwrap();
    bytes[at] ^= 0xFF;
    let path = write(dir.path(), "report.docx", &bytes);
    let engine = engine_with(EngineConfig::default(), vec![]);

    let report = engine.pre_conversion_check(&path, &fmt("docx"), &fmt("pdf"));
    assert!(!report.ok());
    assert_eq!(report.failure.as_ref().unwrap().code(), "corrupted");
}

#[test]
fn test_truncated_docx_is_rejected() {
    let dir = TempDir::new().unwrap();
    let bytes = docx_bytes("<w:document>PAYLOAD</w:document>");
    let path = write(dir.path(), "report.docx", &bytes[..bytes.len() / 2]);
    let engine = engine_with(EngineConfig::default(), vec![]);

    let report = engine.pre_conversion_check(&path, &fmt("docx"), &fmt("pdf"));
    assert!(!report.ok());
    let code = report.failure.as_ref().unwrap().code();
    assert!(matches!(code, "invalid_structure" | "corrupted"), "{code}");
}

// ── Pricing ──────────────────────────────────────────────────────────────

#[test]
fn test_cost_grows_with_size() {
    let engine = engine_with(EngineConfig::default(), vec![]);
    let sizes = [1_000, 2_000_000, 20_000_000, 80_000_000, 500_000_000];
    let credits: Vec<u32> = sizes
        .iter()
        .map(|&s| {
            engine
                .conversion_cost(&fmt("docx"), &fmt("pdf"), s, QualityTier::Standard)
                .0
        })
        .collect();
    assert!(credits.windows(2).all(|w| w[0] <= w[1]), "{credits:?}");
    assert!(credits[0] < credits[4], "{credits:?}");
}

#[test]
fn test_csv_to_pdf_is_priced_and_routed_through_html() {
    let engine = engine_with(EngineConfig::default(), vec![]);
    let (pdf, _) = engine.conversion_cost(&fmt("csv"), &fmt("pdf"), 2048, QualityTier::Standard);
    let (html, _) = engine.conversion_cost(&fmt("csv"), &fmt("html"), 2048, QualityTier::Standard);
    assert!(pdf > html, "pdf={pdf} html={html}");

    let options = engine.analyze_conversion_options(&fmt("csv"), &fmt("pdf"));
    let steps: Vec<&str> = options
        .optimized
        .as_ref()
        .unwrap()
        .steps
        .iter()
        .map(FormatId::as_str)
        .collect();
    assert_eq!(steps, ["csv", "html", "pdf"]);
}

// ── Batch ────────────────────────────────────────────────────────────────

#[test]
fn test_batch_reports_every_phase_in_order() {
    let dir = TempDir::new().unwrap();
    let good = write(dir.path(), "good.csv", b"a,b\n1,2\n");
    let requests = vec![
        ConversionRequest::new(&good, dir.path().join("out/good.json"), fmt("csv"), fmt("json"))
            .with_id("first"),
        ConversionRequest::new(
            dir.path().join("missing.csv"),
            dir.path().join("out/missing.json"),
            fmt("csv"),
            fmt("json"),
        )
        .with_id("second"),
    ];

    let engine = engine_with(EngineConfig::default(), vec![]);
    let sink = RecordingSink::default();
    let results = engine.convert_batch(&requests, &sink);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].request_id, "first");
    assert!(results[0].success, "{}", results[0].log);
    assert_eq!(results[1].request_id, "second");
    assert!(!results[1].success);

    let expected_sha = edgequake_convert::integrity::checksum::compute(&dir.path().join("out/good.json"))
        .unwrap()
        .sha256;
    assert_eq!(results[0].output_sha256.as_deref(), Some(expected_sha.as_str()));
    assert!(results[1].output_sha256.is_none());

    let events = sink.events.lock().unwrap();
    for id in ["first", "second"] {
        let mine: Vec<(Phase, u8)> = events
            .iter()
            .filter(|(rid, _, _)| rid == id)
            .map(|(_, phase, pct)| (*phase, *pct))
            .collect();
        assert_eq!(
            mine,
            vec![
                (Phase::Preprocess, 0),
                (Phase::Preprocess, 10),
                (Phase::Convert, 10),
                (Phase::Convert, 90),
                (Phase::Postprocess, 90),
                (Phase::Postprocess, 100),
            ]
        );
    }
    // Requests never interleave.
    let last_first = events.iter().rposition(|(id, _, _)| id == "first").unwrap();
    let first_second = events.iter().position(|(id, _, _)| id == "second").unwrap();
    assert!(last_first < first_second);

    assert_eq!(
        *sink.completed.lock().unwrap(),
        vec![("first".to_string(), true), ("second".to_string(), false)]
    );
    assert_eq!(*sink.batch.lock().unwrap(), Some((2, 1)));
}

#[test]
fn test_batch_cancel_stops_unstarted_requests() {
    let dir = TempDir::new().unwrap();
    let requests: Vec<ConversionRequest> = (0..3)
        .map(|i| {
            let input = write(dir.path(), &format!("{i}.csv"), b"a\n1\n");
            ConversionRequest::new(input, dir.path().join(format!("{i}.json")), fmt("csv"), fmt("json"))
                .with_id(format!("r{i}"))
        })
        .collect();

    let engine = engine_with(EngineConfig::default(), vec![]);
    let cancel = Arc::new(AtomicBool::new(false));
    let sink = CancelAfterFirst {
        cancel: Arc::clone(&cancel),
    };
    let results = engine.convert_batch_until(&requests, &sink, &cancel);

    assert_eq!(results.len(), 3);
    assert!(results[0].success, "{}", results[0].log);
    for r in &results[1..] {
        assert!(!r.success);
        assert_eq!(r.failure, Some(FailureKind::Cancelled));
    }
    assert!(dir.path().join("0.json").exists());
    assert!(!dir.path().join("1.json").exists());
    assert!(!dir.path().join("2.json").exists());
}

#[test]
fn test_engine_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConversionEngine>();
    assert_send_sync::<RecordingSink>();
}
