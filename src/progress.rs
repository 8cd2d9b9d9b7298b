//! Progress-sink trait for pipeline observability events.
//!
//! Inject an `Arc<dyn ProgressSink>` via
//! [`crate::config::ExtractionConfigBuilder::progress`] to receive real-time
//! events as the pipeline classifies, plans, and extracts pages.
//!
//! # Why a sink trait instead of channels?
//!
//! The sink is the least-invasive integration point: callers can forward
//! events to an SSE stream, a broadcast channel, a database job record, or a
//! terminal progress bar without the library knowing how the host
//! application communicates. Every method is fire-and-forget: the pipeline
//! never blocks on a sink and tolerates zero subscribers (the default is
//! [`NoopProgressSink`]). All methods have no-op defaults so implementors
//! only override what they care about.

use crate::pricing::TokenUsage;
use serde::Serialize;
use std::sync::Arc;

/// Metadata for one completed model call, emitted after every call
/// regardless of whether it produced usable output.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCallEvent {
    /// Model identifier the call was accounted under.
    pub model: String,
    /// Pipeline stage: `classify`, `plan`, or `extract`.
    pub stage: String,
    /// 1-based attempt number within the retry budget.
    pub attempt: u32,
    /// Whether this attempt was a JSON-repair call (text-only, no images).
    pub repair: bool,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
    /// Whether the model returned any text at all.
    pub produced_text: bool,
}

/// Summary emitted once when a document run finishes.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteEvent {
    /// Pages in the rasterized document.
    pub total_pages: usize,
    /// Product rows in the final output.
    pub extracted_rows: usize,
}

/// Receives pipeline events. Implementations must be `Send + Sync`.
pub trait ProgressSink: Send + Sync {
    /// Free-form progress narration ("classifying pages", batch skips, ...).
    fn on_log(&self, message: &str) {
        let _ = message;
    }

    /// Emitted after every model call with per-call metadata.
    fn on_model_call(&self, event: &ModelCallEvent) {
        let _ = event;
    }

    /// Emitted after every model call with the run's cumulative usage.
    fn on_token_update(&self, usage: &TokenUsage) {
        let _ = usage;
    }

    /// Emitted when a call reported reasoning ("thoughts") tokens.
    fn on_thoughts(&self, model: &str, thoughts_tokens: u64) {
        let _ = (model, thoughts_tokens);
    }

    /// Emitted when a run fails with a fatal error, before it propagates.
    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// Emitted once when a document run completes.
    fn on_complete(&self, event: &CompleteEvent) {
        let _ = event;
    }
}

/// The default sink: discards every event.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type SharedProgressSink = Arc<dyn ProgressSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        logs: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn on_log(&self, _message: &str) {
            self.logs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_model_call(&self, _event: &ModelCallEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_sink_accepts_all_events() {
        let sink = NoopProgressSink;
        sink.on_log("hello");
        sink.on_model_call(&ModelCallEvent {
            model: "m".into(),
            stage: "classify".into(),
            attempt: 1,
            repair: false,
            duration_ms: 5,
            produced_text: true,
        });
        sink.on_token_update(&TokenUsage::default());
        sink.on_thoughts("m", 12);
        sink.on_error("boom");
        sink.on_complete(&CompleteEvent {
            total_pages: 3,
            extracted_rows: 7,
        });
    }

    #[test]
    fn overridden_methods_receive_events() {
        let sink = CountingSink {
            logs: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        };
        sink.on_log("one");
        sink.on_log("two");
        sink.on_model_call(&ModelCallEvent {
            model: "m".into(),
            stage: "extract".into(),
            attempt: 1,
            repair: false,
            duration_ms: 1,
            produced_text: false,
        });
        // Default methods still work alongside overridden ones.
        sink.on_error("ignored");

        assert_eq!(sink.logs.load(Ordering::SeqCst), 2);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }
}
