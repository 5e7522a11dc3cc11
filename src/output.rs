//! Request and result types for conversions.

use crate::error::FailureKind;
use crate::format::FormatId;
use crate::path::ConversionPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Caller-chosen identifier echoed in progress events and results.
    pub id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub source: FormatId,
    pub target: FormatId,
}

impl ConversionRequest {
    /// Request with a random UUID v4 id.
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        source: FormatId,
        target: FormatId,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input: input.into(),
            output: output.into(),
            source,
            target,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Result of invoking one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-indexed position in the route.
    pub index: usize,
    pub source: FormatId,
    pub target: FormatId,
    /// Name of the capability that ran, if one was found.
    pub capability: Option<String>,
    pub success: bool,
    pub message: String,
    /// File the step wrote to.
    pub artifact: PathBuf,
    pub duration_ms: u64,
}

/// Everything that happened during one `convert_file` call, in order.
///
/// `Display` renders the aggregated plain-text log: one line per event and
/// one line per attempted step, the failing step last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionLog {
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    Note { message: String },
    Step(StepResult),
}

impl ConversionLog {
    pub fn note(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry::Note {
            message: message.into(),
        });
    }

    pub fn step(&mut self, step: StepResult) {
        self.entries.push(LogEntry::Step(step));
    }

    /// Attempted steps, in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &StepResult> {
        self.entries.iter().filter_map(|e| match e {
            LogEntry::Step(s) => Some(s),
            LogEntry::Note { .. } => None,
        })
    }

    /// The first failed step, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps().find(|s| !s.success)
    }
}

impl fmt::Display for ConversionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match entry {
                LogEntry::Note { message } => write!(f, "{message}")?,
                LogEntry::Step(s) => write!(
                    f,
                    "step {} {} → {} [{}]: {} ({} ms){}",
                    s.index,
                    s.source,
                    s.target,
                    s.capability.as_deref().unwrap_or("none"),
                    if s.success { "ok" } else { "FAILED" },
                    s.duration_ms,
                    if s.message.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", s.message)
                    }
                )?,
            }
        }
        Ok(())
    }
}

/// Outcome of a single `convert_file` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub success: bool,
    pub log: ConversionLog,
    /// Set exactly when `success` is false.
    pub failure: Option<FailureKind>,
    /// Route that was executed or attempted.
    pub path: Option<ConversionPath>,
}

impl ConversionOutcome {
    pub(crate) fn succeeded(log: ConversionLog, path: ConversionPath) -> Self {
        Self {
            success: true,
            log,
            failure: None,
            path: Some(path),
        }
    }

    pub(crate) fn failed(
        log: ConversionLog,
        failure: FailureKind,
        path: Option<ConversionPath>,
    ) -> Self {
        Self {
            success: false,
            log,
            failure: Some(failure),
            path,
        }
    }

    /// `(success, aggregated log text)`.
    pub fn into_pair(self) -> (bool, String) {
        (self.success, self.log.to_string())
    }
}

/// Result of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub request_id: String,
    pub success: bool,
    pub log: ConversionLog,
    pub failure: Option<FailureKind>,
    pub path: Option<ConversionPath>,
    /// SHA-256 of the final output, recorded during post-processing.
    pub output_sha256: Option<String>,
    pub duration_ms: u64,
}

impl ConversionResult {
    pub(crate) fn cancelled(request_id: &str) -> Self {
        let mut log = ConversionLog::default();
        log.note("batch cancelled before this request started");
        Self {
            request_id: request_id.to_string(),
            success: false,
            log,
            failure: Some(FailureKind::Cancelled),
            path: None,
            output_sha256: None,
            duration_ms: 0,
        }
    }
}
