//! Command dispatch.
//!
//! The [`Dispatcher`] owns the actuator and the task tracker.  It connects
//! lazily before the first online command, hands each prepared [`Action`] to
//! the actuator and then applies the command's [`DispatchPolicy`]:
//!
//! - `async=true`: register the completion handle and return at once.
//! - otherwise: block until the handle completes or `wait` elapses, whichever
//!   is first; with no handle, block for the full `wait`.  A handle still
//!   running after `wait` is handed to the tracker.

use std::time::Duration;

use crate::actuator::Actuator;
use crate::command::{self, Action, DispatchPolicy, PrepareError, Prepared};
use crate::error::{Pos, ScriptError};
use crate::script::lexer::parse_invocation;
use crate::tasks::{AwaitSummary, TaskTracker};

/// Tokenize and validate one expanded command line.
pub fn prepare_line(text: &str, at: &Pos) -> Result<Prepared, ScriptError> {
    let inv = parse_invocation(text)
        .ok_or_else(|| ScriptError::structural(at, "empty command after substitution"))?;
    command::prepare(&inv).map_err(|e| match e {
        PrepareError::UnknownCommand(name) => ScriptError::UnknownCommand { at: at.clone(), name },
        PrepareError::BadArguments { command, message } => {
            ScriptError::BadArguments { at: at.clone(), command, message }
        }
    })
}

pub struct Dispatcher<A: Actuator> {
    actuator: A,
    tracker: TaskTracker,
    dispatched: usize,
}

impl<A: Actuator> Dispatcher<A> {
    pub fn new(actuator: A) -> Self {
        Self { actuator, tracker: TaskTracker::new(), dispatched: 0 }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn into_actuator(self) -> A {
        self.actuator
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Number of commands handed to the actuator so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    fn ensure_connected(&mut self, command: &str, at: &Pos) -> Result<(), ScriptError> {
        if self.actuator.is_connected() {
            return Ok(());
        }
        log::debug!("{at}: connecting before {command}");
        self.actuator.connect().map_err(|e| ScriptError::Dispatch {
            at: at.clone(),
            command: command.to_owned(),
            message: e.to_string(),
        })
    }

    /// Dispatch one prepared command.
    pub async fn dispatch(&mut self, cmd: &Prepared, at: &Pos) -> Result<(), ScriptError> {
        let name = cmd.action.name();
        log::info!(">>> {}", cmd.invocation);

        if !cmd.action.is_offline() {
            self.ensure_connected(name, at)?;
        }
        self.dispatched += 1;
        if cmd.action == Action::Connect {
            return Ok(());
        }

        let handle = self.actuator.perform(&cmd.action).map_err(|e| ScriptError::Dispatch {
            at: at.clone(),
            command: name.to_owned(),
            message: e.to_string(),
        })?;
        let estimate = cmd.action.estimate();

        match (cmd.policy, handle) {
            (None, None) => {}
            (None, Some(h)) => {
                self.tracker.register(name, at.clone(), estimate, h);
            }
            (Some(DispatchPolicy { async_mode: true, .. }), h) => {
                if let Some(h) = h {
                    self.tracker.register(name, at.clone(), estimate, h);
                }
            }
            (Some(DispatchPolicy { wait, .. }), None) => {
                if !wait.is_zero() {
                    log::debug!("{at}: {name}: waiting {:.1}s", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                }
            }
            (Some(DispatchPolicy { wait, .. }), Some(mut h)) => {
                if !h.is_done() && tokio::time::timeout(wait, h.wait()).await.is_err() {
                    log::debug!("{at}: {name} still running after {:.1}s", wait.as_secs_f64());
                    self.tracker.register(name, at.clone(), estimate, h);
                }
            }
        }
        Ok(())
    }

    /// `sleep <seconds>`.
    pub async fn sleep(&mut self, secs: Duration, at: &Pos) {
        log::debug!("{at}: sleep {:.3}s", secs.as_secs_f64());
        tokio::time::sleep(secs).await;
    }

    /// Await outstanding tasks, then disconnect.  Safe to call on any path.
    pub async fn shutdown(&mut self, await_timeout: Duration) -> AwaitSummary {
        let summary = self.tracker.await_all(await_timeout).await;
        if summary.abandoned > 0 {
            log::warn!("{} async task(s) did not finish in time", summary.abandoned);
        }
        if self.actuator.is_connected() {
            self.actuator.disconnect();
        }
        summary
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
