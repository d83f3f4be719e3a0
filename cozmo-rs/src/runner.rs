//! Run lifecycle: load, compile, execute, await, disconnect.
//!
//! [`Runner`] is the surface the binary (or any embedding) talks to.  Every
//! run starts from a fresh [`Interpreter`]; the actuator and its connection
//! persist across runs.  Outstanding async tasks are always awaited and the
//! actuator disconnected before a [`RunResult`] is returned, whether the
//! script succeeded or not.

use std::path::Path;

use crate::actuator::Actuator;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::ScriptError;
use crate::script::loader::{self, ScriptLine, COMMAND_LINE_SOURCE};
use crate::script::{Interpreter, Program};
use crate::tasks::AwaitSummary;

/// Outcome of one run.
#[derive(Debug)]
pub struct RunResult {
    /// 0 on success, otherwise [`ScriptError::exit_code`].
    pub exit_code: i32,
    pub error: Option<ScriptError>,
    /// What happened to async tasks at shutdown.
    pub tasks: AwaitSummary,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Runner<A: Actuator> {
    config: Config,
    dispatcher: Dispatcher<A>,
}

impl<A: Actuator> Runner<A> {
    pub fn new(config: Config, actuator: A) -> Self {
        Runner { config, dispatcher: Dispatcher::new(actuator) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn actuator(&self) -> &A {
        self.dispatcher.actuator()
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        self.dispatcher.actuator_mut()
    }

    pub fn into_actuator(self) -> A {
        self.dispatcher.into_actuator()
    }

    /// Total commands dispatched over the runner's lifetime.
    pub fn dispatched(&self) -> usize {
        self.dispatcher.dispatched()
    }

    /// Load the script at `path` (with its includes) and execute it.
    pub async fn load_and_run(&mut self, path: &Path) -> RunResult {
        log::debug!("loading {}", path.display());
        let loaded = loader::load_file(path);
        self.execute(loaded).await
    }

    /// Execute a single command line.
    pub async fn run_inline(&mut self, line: &str) -> RunResult {
        self.run_lines(&[line.to_owned()]).await
    }

    /// Execute in-memory lines as one program.
    pub async fn run_lines(&mut self, lines: &[String]) -> RunResult {
        let loaded = loader::load_lines(COMMAND_LINE_SOURCE, lines);
        self.execute(loaded).await
    }

    async fn execute(&mut self, loaded: Result<Vec<ScriptLine>, ScriptError>) -> RunResult {
        let outcome = match loaded.and_then(Program::compile) {
            Ok(prog) => {
                let mut interp = Interpreter::new(self.config.limits());
                interp.run(&prog, &mut self.dispatcher).await
            }
            Err(e) => Err(e),
        };

        let tasks = self.dispatcher.shutdown(self.config.await_timeout).await;

        match outcome {
            Ok(()) => RunResult { exit_code: 0, error: None, tasks },
            Err(e) => {
                log::debug!("run failed ({:?}): {e}", e.category());
                RunResult { exit_code: e.exit_code(), error: Some(e), tasks }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
