//! Statement classification and the structural pre-scan.
//!
//! [`Program::compile`] is the second loading phase.  It classifies every
//! flattened [`ScriptLine`] as a [`Stmt`] and then walks the whole sequence
//! once to:
//!
//! - match every block header with its terminator (strict nesting),
//! - register `def` … `enddef` subroutines so forward calls work,
//! - check that every `call` names a defined subroutine,
//! - validate command lines that contain no variables.
//!
//! Any problem found here is fatal before a single command is dispatched.
//! Keywords are matched case-insensitively; command names are not.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::command::{self, Prepared};
use crate::dispatch::prepare_line;
use crate::error::{Pos, ScriptError};

use super::expand::{has_substitutions, is_valid_name};
use super::expr::eval_term;
use super::lexer::split_keyword;
use super::loader::ScriptLine;

/// One classified script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `set name value` or `set name=value`
    Set { name: String, value: String },
    /// `for var in start..end [step n]`
    ForRange { var: String, start: String, end: String, step: Option<String> },
    /// `for var in a b c`
    ForList { var: String, items: String },
    EndFor,
    /// `while cond`
    While { cond: String },
    EndWhile,
    /// `if cond`
    If { cond: String },
    Else,
    EndIf,
    /// `def name`
    Def { name: String },
    EndDef,
    /// `call name [args...]`
    Call { name: String, args: String },
    /// `sleep seconds`
    Sleep { secs: String },
    /// A device command.  `prepared` is filled in when the line has no
    /// substitutions and could be validated up front.
    Command { text: String, prepared: Option<Prepared> },
}

impl Stmt {
    fn keyword(&self) -> &'static str {
        match self {
            Stmt::Set { .. } => "set",
            Stmt::ForRange { .. } | Stmt::ForList { .. } => "for",
            Stmt::EndFor => "endfor",
            Stmt::While { .. } => "while",
            Stmt::EndWhile => "endwhile",
            Stmt::If { .. } => "if",
            Stmt::Else => "else",
            Stmt::EndIf => "endif",
            Stmt::Def { .. } => "def",
            Stmt::EndDef => "enddef",
            Stmt::Call { .. } => "call",
            Stmt::Sleep { .. } => "sleep",
            Stmt::Command { .. } => "command",
        }
    }
}

/// A registered subroutine: indices of its `def` and `enddef` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    pub name: String,
    pub def: usize,
    pub end: usize,
}

/// A compiled, structurally valid script.
#[derive(Debug, Clone)]
pub struct Program {
    lines: Vec<ScriptLine>,
    stmts: Vec<Stmt>,
    /// Header ↔ terminator links; `else` links to its `endif`.
    partner: Vec<Option<usize>>,
    /// `if` header → its `else`.
    else_of: HashMap<usize, usize>,
    subs: HashMap<String, Subroutine>,
}

impl Program {
    pub fn compile(lines: Vec<ScriptLine>) -> Result<Program, ScriptError> {
        let stmts = lines.iter().map(parse_line).collect::<Result<Vec<_>, _>>()?;
        let mut prog = Program {
            partner: vec![None; stmts.len()],
            lines,
            stmts,
            else_of: HashMap::new(),
            subs: HashMap::new(),
        };
        prog.match_blocks()?;
        prog.check_calls()?;
        log::debug!(
            "compiled {} statement(s), {} subroutine(s)",
            prog.stmts.len(),
            prog.subs.len()
        );
        Ok(prog)
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn stmt(&self, i: usize) -> &Stmt {
        &self.stmts[i]
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn line(&self, i: usize) -> &ScriptLine {
        &self.lines[i]
    }

    pub fn pos(&self, i: usize) -> Pos {
        self.lines[i].pos()
    }

    /// Matching terminator of a header (or header of a terminator).
    pub fn partner(&self, i: usize) -> Option<usize> {
        self.partner.get(i).copied().flatten()
    }

    pub fn else_of(&self, if_at: usize) -> Option<usize> {
        self.else_of.get(&if_at).copied()
    }

    pub fn subroutine(&self, name: &str) -> Option<&Subroutine> {
        self.subs.get(name)
    }

    pub fn subroutines(&self) -> impl Iterator<Item = &Subroutine> {
        self.subs.values()
    }

    // ── Pre-scan ──────────────────────────────────────────────────────────────

    fn match_blocks(&mut self) -> Result<(), ScriptError> {
        let mut open: Vec<usize> = Vec::new();

        for i in 0..self.stmts.len() {
            match &self.stmts[i] {
                Stmt::ForRange { .. } | Stmt::ForList { .. } | Stmt::While { .. } | Stmt::If { .. } => {
                    open.push(i);
                }
                Stmt::Def { name } => {
                    if let Some(&outer) = open.last() {
                        return Err(ScriptError::structural(
                            &self.pos(i),
                            format!(
                                "def {name}: subroutines must be defined at top level \
                                 (inside '{}' opened at {})",
                                self.stmts[outer].keyword(),
                                self.pos(outer)
                            ),
                        ));
                    }
                    open.push(i);
                }
                Stmt::Else => {
                    let Some(&head) = open.last() else {
                        return Err(ScriptError::structural(&self.pos(i), "'else' without matching 'if'"));
                    };
                    if !matches!(self.stmts[head], Stmt::If { .. }) {
                        return Err(self.mismatch(i, head));
                    }
                    if let Some(prev) = self.else_of.get(&head) {
                        return Err(ScriptError::structural(
                            &self.pos(i),
                            format!("duplicate 'else' (first at {})", self.pos(*prev)),
                        ));
                    }
                    self.else_of.insert(head, i);
                }
                Stmt::EndFor | Stmt::EndWhile | Stmt::EndIf | Stmt::EndDef => {
                    let Some(head) = open.pop() else {
                        return Err(ScriptError::structural(
                            &self.pos(i),
                            format!(
                                "'{}' without matching '{}'",
                                self.stmts[i].keyword(),
                                opener_of(&self.stmts[i])
                            ),
                        ));
                    };
                    if !closes(&self.stmts[head], &self.stmts[i]) {
                        return Err(self.mismatch(i, head));
                    }
                    self.partner[head] = Some(i);
                    self.partner[i] = Some(head);
                    if let Some(&e) = self.else_of.get(&head) {
                        self.partner[e] = Some(i);
                    }
                    if let Stmt::Def { name } = &self.stmts[head] {
                        let sub = Subroutine { name: name.clone(), def: head, end: i };
                        if let Some(prev) = self.subs.insert(name.clone(), sub) {
                            log::warn!(
                                "{}: subroutine '{name}' redefined (previous definition at {})",
                                self.pos(head),
                                self.pos(prev.def)
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(&head) = open.first() {
            let kw = self.stmts[head].keyword();
            return Err(ScriptError::structural(
                &self.pos(head),
                format!("'{kw}' is never closed (expected '{}')", terminator_of(&self.stmts[head])),
            ));
        }
        Ok(())
    }

    fn mismatch(&self, at: usize, head: usize) -> ScriptError {
        ScriptError::structural(
            &self.pos(at),
            format!(
                "'{}' does not match '{}' opened at {}",
                self.stmts[at].keyword(),
                self.stmts[head].keyword(),
                self.pos(head)
            ),
        )
    }

    fn check_calls(&self) -> Result<(), ScriptError> {
        for (i, stmt) in self.stmts.iter().enumerate() {
            if let Stmt::Call { name, .. } = stmt {
                if !self.subs.contains_key(name) {
                    return Err(ScriptError::UnknownSubroutine { at: self.pos(i), name: name.clone() });
                }
            }
        }
        Ok(())
    }
}

fn closes(head: &Stmt, end: &Stmt) -> bool {
    matches!(
        (head, end),
        (Stmt::ForRange { .. } | Stmt::ForList { .. }, Stmt::EndFor)
            | (Stmt::While { .. }, Stmt::EndWhile)
            | (Stmt::If { .. }, Stmt::EndIf)
            | (Stmt::Def { .. }, Stmt::EndDef)
    )
}

fn terminator_of(head: &Stmt) -> &'static str {
    match head {
        Stmt::While { .. } => "endwhile",
        Stmt::If { .. } => "endif",
        Stmt::Def { .. } => "enddef",
        _ => "endfor",
    }
}

fn opener_of(end: &Stmt) -> &'static str {
    match end {
        Stmt::EndWhile => "while",
        Stmt::EndIf => "if",
        Stmt::EndDef => "def",
        _ => "for",
    }
}

// ── Line classification ───────────────────────────────────────────────────────

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("statement regex is valid"))
}

fn set_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^([A-Za-z0-9_]+)\s*=?\s*(.*)$")
}

fn for_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)^([A-Za-z0-9_]+)\s+in(?:\s+(.*))?$")
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)^(.+?)\s*\.\.\s*(.+?)(?:\s+step\s+(.+))?$")
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^([A-Za-z0-9_]+)(?:\s+(.*))?$")
}

/// Classify one line.
pub fn parse_line(line: &ScriptLine) -> Result<Stmt, ScriptError> {
    let at = line.pos();
    let (kw, rest) = split_keyword(&line.text);
    let kw_lower = kw.to_ascii_lowercase();

    let bare = |stmt: Stmt| -> Result<Stmt, ScriptError> {
        if rest.is_empty() {
            Ok(stmt)
        } else {
            Err(ScriptError::structural(&at, format!("unexpected text after '{kw_lower}': {rest}")))
        }
    };
    let required = |what: &str| -> Result<String, ScriptError> {
        if rest.is_empty() {
            Err(ScriptError::structural(&at, format!("'{kw_lower}' requires {what}")))
        } else {
            Ok(rest.to_owned())
        }
    };

    match kw_lower.as_str() {
        "set" => {
            let caps = set_re()
                .captures(rest)
                .ok_or_else(|| ScriptError::structural(&at, "malformed set: expected 'set name value'"))?;
            Ok(Stmt::Set { name: caps[1].to_owned(), value: caps[2].trim().to_owned() })
        }
        "for" => parse_for(rest, &at),
        "endfor" => bare(Stmt::EndFor),
        "while" => Ok(Stmt::While { cond: required("a condition")? }),
        "endwhile" => bare(Stmt::EndWhile),
        "if" => Ok(Stmt::If { cond: required("a condition")? }),
        "else" => bare(Stmt::Else),
        "endif" => bare(Stmt::EndIf),
        "def" => {
            if !is_valid_name(rest) {
                return Err(ScriptError::structural(
                    &at,
                    format!("malformed def: expected 'def <name>', got 'def {rest}'"),
                ));
            }
            Ok(Stmt::Def { name: rest.to_owned() })
        }
        "enddef" => bare(Stmt::EndDef),
        "call" => {
            let caps = call_re()
                .captures(rest)
                .ok_or_else(|| ScriptError::structural(&at, "malformed call: expected 'call <name> [args...]'"))?;
            Ok(Stmt::Call {
                name: caps[1].to_owned(),
                args: caps.get(2).map_or("", |m| m.as_str()).trim().to_owned(),
            })
        }
        "sleep" => {
            let secs = required("a number of seconds")?;
            if !has_substitutions(&secs) {
                parse_seconds(&secs).map_err(|message| ScriptError::BadArguments {
                    at: at.clone(),
                    command: "sleep".into(),
                    message,
                })?;
            }
            Ok(Stmt::Sleep { secs })
        }
        "include" => Err(ScriptError::structural(&at, "include was not resolved by the loader")),
        _ => {
            let prepared = if has_substitutions(&line.text) {
                // Arguments wait for runtime, but a literal name is checked now.
                if !has_substitutions(kw) && !kw.contains('"') && command::lookup(kw).is_none() {
                    return Err(ScriptError::UnknownCommand { at, name: kw.to_owned() });
                }
                None
            } else {
                Some(prepare_line(&line.text, &at)?)
            };
            Ok(Stmt::Command { text: line.text.clone(), prepared })
        }
    }
}

fn parse_for(rest: &str, at: &Pos) -> Result<Stmt, ScriptError> {
    let bad = |message: String| ScriptError::BadLoopHeader { at: at.clone(), message };

    let caps = for_re()
        .captures(rest)
        .ok_or_else(|| bad(format!("expected 'for <var> in ...', got 'for {rest}'")))?;
    let var = caps[1].to_owned();
    let spec = caps.get(2).map_or("", |m| m.as_str()).trim();
    if spec.is_empty() {
        return Err(bad(format!("for {var}: nothing to iterate over")));
    }

    let Some(range) = range_re().captures(spec) else {
        return Ok(Stmt::ForList { var, items: spec.to_owned() });
    };
    let start = range[1].trim().to_owned();
    let end = range[2].trim().to_owned();
    let step = range.get(3).map(|m| m.as_str().trim().to_owned());

    for bound in [&start, &end] {
        if !has_substitutions(bound) {
            parse_bound(bound).map_err(bad)?;
        }
    }
    if let Some(step) = step.as_deref().filter(|s| !has_substitutions(s)) {
        if parse_bound(step).map_err(bad)? == 0 {
            return Err(bad("step must not be zero".into()));
        }
    }
    Ok(Stmt::ForRange { var, start, end, step })
}

/// Evaluate an (expanded) range bound to an integer.
pub fn parse_bound(text: &str) -> Result<i64, String> {
    eval_term(text)
        .as_int()
        .ok_or_else(|| format!("range bound '{text}' is not an integer"))
}

/// Parse a `sleep` duration in seconds.
pub fn parse_seconds(text: &str) -> Result<Duration, String> {
    eval_term(text)
        .as_number()
        .and_then(|x| Duration::try_from_secs_f64(x).ok())
        .ok_or_else(|| format!("expected a non-negative number of seconds, got '{text}'"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
