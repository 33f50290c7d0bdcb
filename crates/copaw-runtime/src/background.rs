//! Fire-and-forget background summarization queue.
//!
//! [`BackgroundSummaryQueue`] is an explicit task/queue handle: `enqueue`
//! returns immediately, a worker task consumes jobs one at a time, and
//! failures are logged and swallowed; they never affect the synchronously
//! committed summary path. Results are surfaced on an out-of-band channel
//! drained by the conversation's single writer; the worker never mutates
//! shared state directly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use copaw_context::compaction::BackgroundSummaries;
use copaw_context::summarizer::Summarizer;
use copaw_core::message::Message;

/// One queued summarization job.
struct SummaryJob {
    messages: Vec<Message>,
}

/// A completed background summary, delivered out-of-band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundSummary {
    /// The summary text.
    pub text: String,
    /// How many messages were summarized.
    pub message_count: usize,
}

/// Queue handle plus the result channel for one conversation.
pub struct BackgroundSummaryQueue {
    jobs: mpsc::UnboundedSender<SummaryJob>,
    results: mpsc::UnboundedReceiver<BackgroundSummary>,
}

impl BackgroundSummaryQueue {
    /// Spawn the worker task and return the queue handle.
    ///
    /// The worker runs until the handle is dropped.
    #[must_use]
    pub fn spawn(summarizer: Arc<dyn Summarizer>) -> Self {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<SummaryJob>();
        let (results_tx, results_rx) = mpsc::unbounded_channel::<BackgroundSummary>();

        drop(tokio::spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                let message_count = job.messages.len();
                match summarizer.summarize(&job.messages, "").await {
                    Ok(text) => {
                        debug!(message_count, "background summary complete");
                        let _ = results_tx.send(BackgroundSummary {
                            text,
                            message_count,
                        });
                    }
                    Err(err) => {
                        // Fail silently and independently; the worker stays up.
                        warn!(error = %err, message_count, "background summarization failed");
                    }
                }
            }
        }));

        Self {
            jobs: jobs_tx,
            results: results_rx,
        }
    }

    /// Drain any completed summaries without waiting.
    ///
    /// Called by the conversation's writer, keeping result application
    /// inside the single-writer discipline.
    pub fn try_drain(&mut self) -> Vec<BackgroundSummary> {
        let mut out = Vec::new();
        while let Ok(summary) = self.results.try_recv() {
            out.push(summary);
        }
        out
    }

    /// Await the next completed summary. Returns `None` once the worker has
    /// shut down and the channel is drained.
    pub async fn next_result(&mut self) -> Option<BackgroundSummary> {
        self.results.recv().await
    }
}

impl BackgroundSummaries for BackgroundSummaryQueue {
    fn enqueue(&self, messages: Vec<Message>) {
        if self.jobs.send(SummaryJob { messages }).is_err() {
            warn!("background summary worker is gone, dropping job");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
