//! Script loading and include resolution.
//!
//! Loading is the first of two phases: the root script and everything it
//! transitively includes are read and flattened into one ordered list of
//! [`ScriptLine`]s before any statement runs.  Each line keeps the file and
//! line number it came from.
//!
//! Includes are expanded with an explicit stack of open files.  A target that
//! is already on the stack is a cycle; including the same file twice from
//! different places is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Pos, ScriptError};

use super::lexer::{split_keyword, split_words};

/// Source name used for lines that did not come from a file.
pub const COMMAND_LINE_SOURCE: &str = "<command-line>";

/// One logical line of the flattened script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub source: Arc<PathBuf>,
    /// 1-based line number within `source`.
    pub line: usize,
    pub text: String,
}

impl ScriptLine {
    pub fn pos(&self) -> Pos {
        Pos::new(Arc::clone(&self.source), self.line)
    }
}

// ── Open-file stack ───────────────────────────────────────────────────────────

struct OpenFile {
    /// Name used in diagnostics.
    source: Arc<PathBuf>,
    /// Canonical path for cycle detection; `None` for in-memory sources.
    canonical: Option<PathBuf>,
    /// Directory relative includes resolve against, as the path was written.
    base_dir: PathBuf,
    lines: Vec<String>,
    next: usize,
}

impl OpenFile {
    fn read(path: &Path, canonical: PathBuf) -> Result<Self, ScriptError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ScriptError::Io { path: path.to_path_buf(), source })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(OpenFile {
            source: Arc::new(path.to_path_buf()),
            canonical: Some(canonical),
            base_dir,
            lines: text.lines().map(str::to_owned).collect(),
            next: 0,
        })
    }
}

/// Load `path` and everything it includes.
pub fn load_file(path: &Path) -> Result<Vec<ScriptLine>, ScriptError> {
    let canonical = fs::canonicalize(path)
        .map_err(|source| ScriptError::Io { path: path.to_path_buf(), source })?;
    let root = OpenFile::read(path, canonical)?;
    flatten(root)
}

/// Flatten in-memory lines (e.g. commands given on the command line).
///
/// Relative includes resolve against the current directory.
pub fn load_lines(source: &str, lines: &[String]) -> Result<Vec<ScriptLine>, ScriptError> {
    let root = OpenFile {
        source: Arc::new(PathBuf::from(source)),
        canonical: None,
        base_dir: std::env::current_dir().unwrap_or_default(),
        lines: lines.to_vec(),
        next: 0,
    };
    flatten(root)
}

fn flatten(root: OpenFile) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(top) = stack.last_mut() {
        let Some(raw) = top.lines.get(top.next) else {
            log::trace!("finished {}", top.source.display());
            stack.pop();
            continue;
        };
        top.next += 1;
        let line = top.next;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let at = Pos::new(Arc::clone(&top.source), line);
        let Some(target) = include_target(text) else {
            out.push(ScriptLine { source: Arc::clone(&top.source), line, text: text.to_owned() });
            continue;
        };
        let target = target.ok_or_else(|| ScriptError::structural(&at, "include requires a path"))?;

        let joined = top.base_dir.join(&target);
        let canonical = match fs::canonicalize(&joined) {
            Ok(p) if p.is_file() => p,
            _ => return Err(ScriptError::MissingInclude { at, path: joined }),
        };

        if stack.iter().any(|f| f.canonical.as_ref() == Some(&canonical)) {
            let mut chain: Vec<PathBuf> = stack
                .iter()
                .map(|f| f.canonical.clone().unwrap_or_else(|| f.source.to_path_buf()))
                .skip_while(|p| *p != canonical)
                .collect();
            chain.push(canonical);
            return Err(ScriptError::CircularInclude { at, chain });
        }

        log::debug!("{at}: including {}", joined.display());
        stack.push(OpenFile::read(&joined, canonical)?);
    }

    Ok(out)
}

/// If `text` is an `include` line, return its target.
///
/// `Some(None)` means the keyword was present without a path.
fn include_target(text: &str) -> Option<Option<PathBuf>> {
    let (kw, rest) = split_keyword(text);
    if !kw.eq_ignore_ascii_case("include") {
        return None;
    }
    if rest.is_empty() {
        return Some(None);
    }
    // A quoted path may contain spaces; an unquoted one is the rest of the line.
    let path = if rest.starts_with('"') {
        split_words(rest).into_iter().next().unwrap_or_default()
    } else {
        rest.to_owned()
    };
    Some(Some(PathBuf::from(path)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
