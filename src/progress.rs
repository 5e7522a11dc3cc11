//! Progress-sink trait for per-request batch events.
//!
//! Pass a `&dyn ProgressSink` to [`crate::ConversionEngine::convert_batch`]
//! to receive phase-boundary events as each request moves through
//! pre-processing, conversion and post-processing. Hosts that hand the sink
//! to another thread keep it in a [`SharedProgressSink`].
//!
//! The library knows nothing about where events go: forward them to a
//! terminal progress bar, a channel, or a database row.
//!
//! # Example
//!
//! ```rust
//! use edgequake_convert::{Phase, ProgressSink};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingSink {
//!     events: AtomicUsize,
//! }
//!
//! impl ProgressSink for CountingSink {
//!     fn emit_progress(&self, request_id: &str, phase: Phase, percent: u8) {
//!         self.events.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{request_id}: {phase} {percent}%");
//!     }
//! }
//!
//! let sink = CountingSink { events: AtomicUsize::new(0) };
//! sink.emit_progress("req-1", Phase::Convert, 10);
//! assert_eq!(sink.events.load(Ordering::SeqCst), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stage of a single request inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preprocess,
    Convert,
    Postprocess,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Preprocess => "preprocess",
            Phase::Convert => "convert",
            Phase::Postprocess => "postprocess",
        })
    }
}

/// Receives batch progress events.
///
/// Implementations must be `Send + Sync` so a sink can be shared with a
/// batch running on a blocking worker thread. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// A phase boundary was crossed for `request_id`.
    ///
    /// `percent` is the request's overall progress, `0..=100`, and is
    /// non-decreasing for a given request.
    fn emit_progress(&self, request_id: &str, phase: Phase, percent: u8) {
        let _ = (request_id, phase, percent);
    }

    /// Called once before the first request.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called once a request has a final result.
    fn on_request_complete(&self, request_id: &str, success: bool) {
        let _ = (request_id, success);
    }

    /// Called once after every request was attempted or cancelled.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A sink that discards everything.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

/// Shared sink handle.
pub type SharedProgressSink = Arc<dyn ProgressSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, Phase, u8)>>,
    }

    impl ProgressSink for RecordingSink {
        fn emit_progress(&self, request_id: &str, phase: Phase, percent: u8) {
            self.events
                .lock()
                .unwrap()
                .push((request_id.to_string(), phase, percent));
        }
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let sink = NoopProgressSink;
        sink.on_batch_start(2);
        sink.emit_progress("a", Phase::Preprocess, 0);
        sink.on_request_complete("a", true);
        sink.on_batch_complete(2, 1);
    }

    #[test]
    fn recording_sink_receives_events() {
        let sink = RecordingSink::default();
        sink.emit_progress("r1", Phase::Preprocess, 0);
        sink.emit_progress("r1", Phase::Convert, 10);
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ("r1".to_string(), Phase::Convert, 10));
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Phase::Postprocess).unwrap(),
            "\"postprocess\""
        );
        assert_eq!(Phase::Preprocess.to_string(), "preprocess");
    }

    #[test]
    fn arc_dyn_sink_works() {
        let sink: SharedProgressSink = Arc::new(NoopProgressSink);
        sink.emit_progress("x", Phase::Convert, 50);
    }
}
