//! Sequential batch runner.
//!
//! Requests run strictly one after another. Each one crosses three phases
//! and the sink hears about every boundary:
//!
//! | Event | Percent |
//! |-------|---------|
//! | preprocess start / end | 0 / 10 |
//! | convert start / end | 10 / 90 |
//! | postprocess start / end | 90 / 100 |
//!
//! The cancel flag is read before each request starts; a request that has
//! started always runs to completion.

use super::executor::Executor;
use crate::error::FailureKind;
use crate::integrity::checksum;
use crate::output::{ConversionRequest, ConversionResult};
use crate::progress::{Phase, ProgressSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, warn};

const PREPROCESS_START: u8 = 0;
const PREPROCESS_END: u8 = 10;
const CONVERT_END: u8 = 90;
const POSTPROCESS_END: u8 = 100;

pub(crate) fn run_batch(
    executor: &Executor<'_>,
    requests: &[ConversionRequest],
    sink: &dyn ProgressSink,
    cancel: Option<&AtomicBool>,
) -> Vec<ConversionResult> {
    info!("Starting batch of {} requests", requests.len());
    sink.on_batch_start(requests.len());

    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        let result = if cancel.is_some_and(|c| c.load(Ordering::SeqCst)) {
            ConversionResult::cancelled(&request.id)
        } else {
            run_one(executor, request, sink)
        };
        sink.on_request_complete(&result.request_id, result.success);
        results.push(result);
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    info!("Batch finished: {}/{} succeeded", succeeded, results.len());
    sink.on_batch_complete(results.len(), succeeded);
    results
}

fn run_one(
    executor: &Executor<'_>,
    request: &ConversionRequest,
    sink: &dyn ProgressSink,
) -> ConversionResult {
    let start = Instant::now();
    let id = request.id.as_str();

    // ── Preprocess ───────────────────────────────────────────────────────
    sink.emit_progress(id, Phase::Preprocess, PREPROCESS_START);
    if let Some(parent) = request.output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Cannot create output directory {}: {}", parent.display(), e);
            }
        }
    }
    sink.emit_progress(id, Phase::Preprocess, PREPROCESS_END);

    // ── Convert ──────────────────────────────────────────────────────────
    sink.emit_progress(id, Phase::Convert, PREPROCESS_END);
    let outcome = executor.convert_file(
        &request.input,
        &request.output,
        &request.source,
        &request.target,
    );
    sink.emit_progress(id, Phase::Convert, CONVERT_END);

    // ── Postprocess ──────────────────────────────────────────────────────
    sink.emit_progress(id, Phase::Postprocess, CONVERT_END);
    let mut success = outcome.success;
    let mut failure = outcome.failure;
    let mut log = outcome.log;
    let mut output_sha256 = None;

    if success {
        match std::fs::metadata(&request.output) {
            Ok(m) if m.len() > 0 => match checksum::compute(&request.output) {
                Ok(sums) => {
                    log.note(format!("output sha256 {}", sums.sha256));
                    output_sha256 = Some(sums.sha256);
                }
                Err(e) => {
                    log.note(format!("output unreadable: {e}"));
                    success = false;
                    failure = Some(FailureKind::Validation {
                        code: "unreadable".into(),
                    });
                }
            },
            Ok(_) => {
                log.note("output is empty");
                success = false;
                failure = Some(FailureKind::Validation {
                    code: "empty".into(),
                });
            }
            Err(_) => {
                log.note("output is missing");
                success = false;
                failure = Some(FailureKind::Validation {
                    code: "not_found".into(),
                });
            }
        }
    }
    sink.emit_progress(id, Phase::Postprocess, POSTPROCESS_END);

    ConversionResult {
        request_id: request.id.clone(),
        success,
        log,
        failure,
        path: outcome.path,
        output_sha256,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
