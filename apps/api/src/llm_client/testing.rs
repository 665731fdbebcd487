//! Scripted `Completer` used by pipeline, queue and route tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Completer, CompletionOutcome};

/// A single observed upstream call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub credential: String,
    pub user_prompt: String,
}

/// Replays queued outcomes in order; once the script runs out it repeats `default`.
pub struct ScriptedCompleter {
    script: Mutex<VecDeque<CompletionOutcome>>,
    default: CompletionOutcome,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    panics_left: AtomicUsize,
}

impl ScriptedCompleter {
    pub fn always(outcome: CompletionOutcome) -> Self {
        Self::scripted(Vec::new(), outcome)
    }

    pub fn replying(text: &str) -> Self {
        Self::always(CompletionOutcome::Success {
            raw_text: text.to_string(),
        })
    }

    pub fn scripted(script: Vec<CompletionOutcome>, default: CompletionOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            panics_left: AtomicUsize::new(0),
        }
    }

    /// Each call sleeps this long (virtual time under `start_paused`).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The first `count` calls panic after being recorded.
    pub fn with_panics(self, count: usize) -> Self {
        self.panics_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, _system: &str, user: &str, credential: &str) -> CompletionOutcome {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            credential: credential.to_string(),
            user_prompt: user.to_string(),
        });

        if self
            .panics_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("scripted completer panic");
        }

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }
}
