//! Progress reporting for an optimization run.
//!
//! `EventSink` is a single-method trait; transport (SSE framing, a UI push, an
//! in-memory log) is left entirely to the implementor.

use crate::judge::MetricScores;
use crate::pareto::PromptCandidate;

/// One progress record. Every variant carries `iteration` (0 for seed/start events).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start { iteration: u32, message: String },
    SeedEvaluated { iteration: u32, message: String, batch_score: f64 },
    IterationStart { iteration: u32, message: String },
    SampleGenerated { iteration: u32, message: String, sample_index: usize },
    SampleJudged { iteration: u32, message: String, sample_index: usize, metrics: MetricScores },
    IterationAccepted {
        iteration: u32,
        message: String,
        batch_score: f64,
        improved_score: f64,
        best_score: f64,
        metrics: MetricScores,
        candidate_prompt: String,
    },
    IterationRejected { iteration: u32, message: String, batch_score: f64, improved_score: f64 },
    IterationError { iteration: u32, message: String },
    ReflectionFailed { iteration: u32, message: String },
    Complete {
        iteration: u32,
        message: String,
        final_prompt: String,
        best_score: f64,
        collection_size: usize,
        candidates: Vec<PromptCandidate>,
    },
    Error { iteration: u32, message: String, reason: &'static str },
}

/// Delivers events to whatever the host wants: an in-memory log, a channel, a UI
/// push. Called sequentially and synchronously — the loop never assumes anything
/// about asynchronous delivery ordering beyond the call order.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// An in-memory sink, the default for tests and hosts that just want the final log.
#[derive(Debug, Default)]
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event log mutex poisoned").clone()
    }
}

impl EventSink for VecEventSink {
    fn emit(&self, event: Event) {
        self.events.lock().expect("event log mutex poisoned").push(event);
    }
}

/// Forwards events over an unbounded channel, for a host that wants to consume the
/// stream asynchronously (e.g. to drive an SSE transport).
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<Event>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event) {
        // A closed receiver means the host stopped listening; dropping the event is
        // the correct behavior since there is nowhere left to deliver it.
        let _ = self.sender.send(event);
    }
}
