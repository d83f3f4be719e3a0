//! Script error taxonomy.
//!
//! Every error that can stop a run is a [`ScriptError`].  Errors raised while
//! a script is being loaded or executed carry the [`Pos`] of the offending
//! line so they can be reported as `file:line: message`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

// ── Position ──────────────────────────────────────────────────────────────────

/// Source position of a script line: file and 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    pub file: Arc<PathBuf>,
    pub line: usize,
}

impl Pos {
    pub fn new(file: Arc<PathBuf>, line: usize) -> Self {
        Pos { file, line }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

// ── Category ──────────────────────────────────────────────────────────────────

/// Coarse error class used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The script file itself could not be read.
    Io,
    /// Load-time problems: block structure, includes, unknown commands,
    /// malformed headers and arguments.
    Structural,
    /// Runtime safety ceilings (loop iterations, call depth).
    Safety,
    /// The actuator rejected or failed a command.
    Dispatch,
}

impl Category {
    pub fn exit_code(self) -> i32 {
        match self {
            Category::Io => 1,
            Category::Structural => 2,
            Category::Safety => 3,
            Category::Dispatch => 4,
        }
    }
}

// ── ScriptError ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("cannot read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{at}: include file not found: {}", path.display())]
    MissingInclude { at: Pos, path: PathBuf },

    #[error("{at}: circular include: {}", render_chain(chain))]
    CircularInclude { at: Pos, chain: Vec<PathBuf> },

    #[error("{at}: {message}")]
    Structural { at: Pos, message: String },

    #[error("{at}: unknown command '{name}'")]
    UnknownCommand { at: Pos, name: String },

    #[error("{at}: unknown subroutine '{name}'")]
    UnknownSubroutine { at: Pos, name: String },

    #[error("{at}: {command}: {message}")]
    BadArguments { at: Pos, command: String, message: String },

    #[error("{at}: malformed loop header: {message}")]
    BadLoopHeader { at: Pos, message: String },

    #[error("{at}: safety limit: loop exceeded {limit} iterations")]
    IterationLimit { at: Pos, limit: u32 },

    #[error("{at}: safety limit: call depth exceeded {limit}")]
    CallDepth { at: Pos, limit: usize },

    #[error("{at}: {command} failed: {message}")]
    Dispatch { at: Pos, command: String, message: String },
}

impl ScriptError {
    pub fn structural(at: &Pos, message: impl Into<String>) -> Self {
        ScriptError::Structural { at: at.clone(), message: message.into() }
    }

    pub fn category(&self) -> Category {
        match self {
            ScriptError::Io { .. } => Category::Io,
            ScriptError::MissingInclude { .. }
            | ScriptError::CircularInclude { .. }
            | ScriptError::Structural { .. }
            | ScriptError::UnknownCommand { .. }
            | ScriptError::UnknownSubroutine { .. }
            | ScriptError::BadArguments { .. }
            | ScriptError::BadLoopHeader { .. } => Category::Structural,
            ScriptError::IterationLimit { .. } | ScriptError::CallDepth { .. } => {
                Category::Safety
            }
            ScriptError::Dispatch { .. } => Category::Dispatch,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Position of the offending line, when the error has one.
    pub fn pos(&self) -> Option<&Pos> {
        match self {
            ScriptError::Io { .. } => None,
            ScriptError::MissingInclude { at, .. }
            | ScriptError::CircularInclude { at, .. }
            | ScriptError::Structural { at, .. }
            | ScriptError::UnknownCommand { at, .. }
            | ScriptError::UnknownSubroutine { at, .. }
            | ScriptError::BadArguments { at, .. }
            | ScriptError::BadLoopHeader { at, .. }
            | ScriptError::IterationLimit { at, .. }
            | ScriptError::CallDepth { at, .. }
            | ScriptError::Dispatch { at, .. } => Some(at),
        }
    }
}

fn render_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
