//! Prompt queue runner
//!
//! Feeds a block of queued prompts through the single-prompt generation
//! pipeline one at a time, waiting for each generation to finish before
//! starting the next.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::status::StatusSink;

/// How often the runner polls the pipeline for idleness
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between finishing one item and submitting the next
pub const QUEUE_ITEM_DELAY: Duration = Duration::from_secs(1);

/// A generation exceeding this bound is treated as complete (and logged)
/// so the runner never hangs indefinitely
pub const QUEUE_STALL_BOUND: Duration = Duration::from_secs(5 * 60);

/// The single-prompt generation pipeline the runner drives
#[async_trait]
pub trait PromptPipeline: Send + Sync {
    /// Submit one prompt. Failures are the pipeline's concern (it surfaces
    /// them to the user); the runner proceeds either way.
    async fn submit(&self, prompt: &str);

    /// Whether a generation is currently in flight
    fn is_generating(&self) -> bool;
}

#[derive(Default)]
struct RunnerState {
    queue: VecDeque<String>,
    total: usize,
    processing: bool,
    /// Bumped on every start; a drain task carrying an older epoch is stale
    /// and must exit instead of touching the new queue
    epoch: u64,
}

/// Sequential prompt queue processor
pub struct PromptQueueRunner {
    pipeline: Arc<dyn PromptPipeline>,
    status: Arc<dyn StatusSink>,
    state: Mutex<RunnerState>,
}

impl PromptQueueRunner {
    pub fn new(pipeline: Arc<dyn PromptPipeline>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            pipeline,
            status,
            state: Mutex::new(RunnerState::default()),
        }
    }

    /// Split `block` into non-empty trimmed lines and begin sequential
    /// processing. Reports "Queue is empty" and no-ops when there is
    /// nothing to process.
    pub fn start(self: &Arc<Self>, block: &str) {
        let prompts: VecDeque<String> = block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        if prompts.is_empty() {
            self.status.status("Queue is empty");
            return;
        }

        let total = prompts.len();
        let epoch = {
            let Ok(mut state) = self.state.lock() else { return };
            if state.processing {
                log::warn!("Queue is already being processed");
                return;
            }
            state.queue = prompts;
            state.total = total;
            state.processing = true;
            state.epoch = state.epoch.wrapping_add(1);
            state.epoch
        };

        self.status
            .status(&format!("Queue: 0/{} prompts processed", total));

        let runner = self.clone();
        tokio::spawn(async move {
            runner.run(epoch).await;
        });
    }

    /// Clear the remaining queue and halt further processing. Idempotent;
    /// does not cancel an in-flight generation.
    pub fn stop(&self) {
        let Ok(mut state) = self.state.lock() else { return };
        state.queue.clear();
        state.processing = false;
        drop(state);

        self.status.status("Queue processing stopped");
    }

    /// Whether the runner is currently draining a queue
    pub fn is_processing(&self) -> bool {
        self.state.lock().map(|s| s.processing).unwrap_or(false)
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        // If a generation is already in flight when the queue starts,
        // defer the first pop until the pipeline reports idle
        self.wait_for_pipeline_idle().await;

        loop {
            let (prompt, processed, total) = {
                let Ok(mut state) = self.state.lock() else { return };
                if state.epoch != epoch || !state.processing {
                    // Stopped, or superseded by a later start while this
                    // task was awaiting a generation
                    return;
                }
                match state.queue.pop_front() {
                    Some(prompt) => {
                        let processed = state.total - state.queue.len();
                        (prompt, processed, state.total)
                    }
                    None => break,
                }
            };

            self.status.status(&format!(
                "Queue: {}/{} prompts processed",
                processed, total
            ));

            self.pipeline.submit(&prompt).await;
            self.wait_for_pipeline_idle().await;

            tokio::time::sleep(QUEUE_ITEM_DELAY).await;
        }

        let completed = {
            let Ok(mut state) = self.state.lock() else { return };
            if state.epoch == epoch && state.processing {
                state.processing = false;
                true
            } else {
                false
            }
        };

        // Only a drain that finished its own queue reports completion;
        // a stopped or superseded one stays silent
        if completed {
            self.status.status("Queue processing completed");
        }
    }

    /// Poll until the pipeline reports idle, bounded by the stall limit
    async fn wait_for_pipeline_idle(&self) {
        let start = tokio::time::Instant::now();

        while self.pipeline.is_generating() {
            if start.elapsed() > QUEUE_STALL_BOUND {
                log::warn!("Generation exceeded the stall bound, moving on");
                return;
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
        }
    }
}
