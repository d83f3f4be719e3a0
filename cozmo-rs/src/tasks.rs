//! Async task tracking.
//!
//! A command dispatched with `async=true` detaches its device-side completion
//! from the script: the engine registers the actuator's [`Completion`] handle
//! with the [`TaskTracker`] and moves on.  Before the run ends (and before the
//! actuator is disconnected) the runner calls [`TaskTracker::await_all`].
//!
//! Completion is signalled from the actuator side through the matching
//! [`CompletionNotifier`].  The tracker never completes a task on its own.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::Pos;

// ── Completion handles ────────────────────────────────────────────────────────

/// Create a linked notifier / handle pair.
pub fn completion_pair() -> (CompletionNotifier, Completion) {
    let (tx, rx) = watch::channel(false);
    (CompletionNotifier { tx }, Completion { rx })
}

/// Actuator-side half: signals that the device action finished.
///
/// Dropping the notifier without calling [`complete`](Self::complete) also
/// releases any waiter.
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: watch::Sender<bool>,
}

impl CompletionNotifier {
    pub fn complete(self) {
        // No receiver left is fine: nobody is waiting.
        let _ = self.tx.send(true);
    }
}

/// Engine-side half: an opaque handle on an in-flight device action.
#[derive(Debug)]
pub struct Completion {
    rx: watch::Receiver<bool>,
}

impl Completion {
    /// A handle that is already complete.
    pub fn done() -> Self {
        let (notifier, completion) = completion_pair();
        notifier.complete();
        completion
    }

    pub fn is_done(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until the notifier fires or is dropped.
    pub async fn wait(&mut self) {
        // An error means the sender is gone, which also counts as done.
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

// ── AsyncTask ─────────────────────────────────────────────────────────────────

/// An outstanding fire-and-forget device action.
#[derive(Debug)]
pub struct AsyncTask {
    /// Tracker-assigned identifier, unique within a run.
    pub id: u32,
    /// Command name, for diagnostics.
    pub command: String,
    /// Script position that dispatched it.
    pub at: Pos,
    pub dispatched: Instant,
    /// Actuator's estimate of how long the action takes, if known.
    pub estimate: Option<Duration>,
    completion: Completion,
}

impl AsyncTask {
    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }
}

/// Outcome of [`TaskTracker::await_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwaitSummary {
    pub completed: usize,
    pub abandoned: usize,
}

// ── TaskTracker ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct TaskTracker {
    tasks: Vec<AsyncTask>,
    next_id: u32,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self { tasks: Vec::new(), next_id: 1 }
    }

    /// Record an outstanding action.  Never blocks.
    ///
    /// Tasks that already finished are dropped first.  Returns the new id.
    pub fn register(
        &mut self,
        command: impl Into<String>,
        at: Pos,
        estimate: Option<Duration>,
        completion: Completion,
    ) -> u32 {
        self.prune();
        let id = self.next_id;
        self.next_id += 1;
        let command = command.into();
        log::debug!("{at}: tracking async {command} (task {id})");
        self.tasks.push(AsyncTask {
            id,
            command,
            at,
            dispatched: Instant::now(),
            estimate,
            completion,
        });
        id
    }

    /// Drop records of finished tasks.
    pub fn prune(&mut self) {
        self.tasks.retain(|t| !t.is_done());
    }

    /// Number of tasks not yet known to be finished.
    pub fn outstanding(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_done()).count()
    }

    pub fn tasks(&self) -> &[AsyncTask] {
        &self.tasks
    }

    /// Wait for every outstanding task, with one overall deadline.
    ///
    /// Tasks still running at the deadline are abandoned (the device action
    /// itself is not cancelled).  The tracker is empty afterwards.
    pub async fn await_all(&mut self, timeout: Duration) -> AwaitSummary {
        let mut summary = AwaitSummary::default();
        if self.tasks.is_empty() {
            return summary;
        }
        let pending = self.outstanding();
        if pending > 0 {
            log::info!("waiting for {pending} async task(s) to finish");
        }

        // A timeout too large to represent as an instant means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        for mut task in self.tasks.drain(..) {
            if task.is_done() {
                summary.completed += 1;
                continue;
            }
            let finished = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, task.completion.wait()).await,
                None => Ok(task.completion.wait().await),
            };
            match finished {
                Ok(()) => {
                    log::debug!("task {} ({}) finished", task.id, task.command);
                    summary.completed += 1;
                }
                Err(_) => {
                    log::warn!(
                        "{}: abandoning async {} after {:.1}s",
                        task.at,
                        task.command,
                        task.dispatched.elapsed().as_secs_f64()
                    );
                    summary.abandoned += 1;
                }
            }
        }
        summary
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
