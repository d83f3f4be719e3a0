//! Control-flow engine.
//!
//! The [`Interpreter`] executes a compiled [`Program`] with a single
//! instruction pointer and a stack of block [`Frame`]s.  Block headers push a
//! frame, terminators pop it or jump back, and `call` pushes a frame that
//! records where to resume.  `def` bodies are skipped during normal flow and
//! only entered through `call`.
//!
//! Variables live in one global scope.  Inside a call, `$1`..`$N` resolve to
//! the call's arguments first.  Every loop frame counts its iterations and
//! the run aborts with a safety error when an iteration past the limit would
//! start.

use std::collections::HashMap;

use crate::actuator::Actuator;
use crate::dispatch::{prepare_line, Dispatcher};
use crate::error::{Pos, ScriptError};

use super::expand::expand;
use super::expr::{eval_condition, eval_value, EvalContext};
use super::lexer::split_words;
use super::stmt::{parse_bound, parse_seconds, Program, Stmt};
use super::value::Value;

// ── Limits ────────────────────────────────────────────────────────────────────

/// Safety ceilings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum iterations of any single loop frame.
    pub iterations: u32,
    /// Maximum nesting of subroutine calls.
    pub call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { iterations: 1000, call_depth: 64 }
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Frame {
    ForRange { head: usize, var: String, cursor: i64, end: i64, step: i64, iterations: u32 },
    ForList { head: usize, var: String, items: Vec<String>, cursor: usize },
    While { head: usize, iterations: u32 },
    If { head: usize, branch_active: bool, else_seen: bool },
    Call { name: String, return_to: usize, params: Vec<String> },
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// Interpreter state for one run.
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: HashMap<String, Value>,
    frames: Vec<Frame>,
    limits: Limits,
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        Interpreter { limits, ..Self::default() }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Look up a global variable.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    fn call_depth(&self) -> usize {
        self.frames.iter().filter(|f| matches!(f, Frame::Call { .. })).count()
    }

    /// Execute `prog` from the top, dispatching commands through `d`.
    pub async fn run<A: Actuator>(
        &mut self,
        prog: &Program,
        d: &mut Dispatcher<A>,
    ) -> Result<(), ScriptError> {
        let mut ip = 0;
        while ip < prog.len() {
            ip = self.step(prog, ip, d).await?;
        }
        Ok(())
    }

    /// Execute the statement at `ip`; returns the next instruction pointer.
    async fn step<A: Actuator>(
        &mut self,
        prog: &Program,
        ip: usize,
        d: &mut Dispatcher<A>,
    ) -> Result<usize, ScriptError> {
        let at = prog.pos(ip);
        let jump = |i: usize| {
            prog.partner(i)
                .ok_or_else(|| ScriptError::structural(&prog.pos(i), "unmatched block"))
        };

        match prog.stmt(ip) {
            Stmt::Set { name, value } => {
                let v = eval_value(value, self);
                log::debug!("{at}: set {name} = {v}");
                self.globals.insert(name.clone(), v);
                Ok(ip + 1)
            }

            // ── for ───────────────────────────────────────────────────────────
            Stmt::ForRange { var, start, end, step } => {
                let bound = |text: &str| {
                    parse_bound(&expand(text, &*self))
                        .map_err(|message| ScriptError::BadLoopHeader { at: at.clone(), message })
                };
                let start = bound(start)?;
                let end = bound(end)?;
                let step = match step {
                    Some(s) => bound(s)?,
                    None if end >= start => 1,
                    None => -1,
                };
                if step == 0 {
                    return Err(ScriptError::BadLoopHeader {
                        at,
                        message: "step must not be zero".into(),
                    });
                }
                if !in_range(start, end, step) {
                    log::trace!("{at}: empty range {start}..{end} step {step}");
                    return Ok(jump(ip)? + 1);
                }
                self.check_iterations(1, &at)?;
                self.globals.insert(var.clone(), Value::Int(start));
                self.frames.push(Frame::ForRange {
                    head: ip,
                    var: var.clone(),
                    cursor: start,
                    end,
                    step,
                    iterations: 1,
                });
                Ok(ip + 1)
            }
            Stmt::ForList { var, items } => {
                let items = split_words(&expand(items, self));
                let Some(first) = items.first() else {
                    return Ok(jump(ip)? + 1);
                };
                self.check_iterations(1, &at)?;
                self.globals.insert(var.clone(), Value::Str(first.clone()));
                self.frames.push(Frame::ForList { head: ip, var: var.clone(), items, cursor: 0 });
                Ok(ip + 1)
            }
            Stmt::EndFor => {
                let limit = self.limits.iterations;
                let (head, next) = match self.frames.last_mut() {
                    Some(Frame::ForRange { head, var, cursor, end, step, iterations }) => {
                        let next = cursor.checked_add(*step).filter(|n| in_range(*n, *end, *step));
                        match next {
                            Some(n) => {
                                *iterations += 1;
                                if *iterations > limit {
                                    let at = prog.pos(*head);
                                    return Err(ScriptError::IterationLimit { at, limit });
                                }
                                *cursor = n;
                                (*head, Some((var.clone(), Value::Int(n))))
                            }
                            None => (*head, None),
                        }
                    }
                    Some(Frame::ForList { head, var, items, cursor }) => {
                        *cursor += 1;
                        match items.get(*cursor) {
                            Some(item) => {
                                if *cursor as u64 + 1 > limit as u64 {
                                    let at = prog.pos(*head);
                                    return Err(ScriptError::IterationLimit { at, limit });
                                }
                                (*head, Some((var.clone(), Value::Str(item.clone()))))
                            }
                            None => (*head, None),
                        }
                    }
                    _ => return Err(ScriptError::structural(&at, "'endfor' outside a for loop")),
                };
                match next {
                    Some((var, value)) => {
                        self.globals.insert(var, value);
                        Ok(head + 1)
                    }
                    None => {
                        log::trace!("{at}: for loop at {} done", prog.pos(head));
                        self.frames.pop();
                        Ok(ip + 1)
                    }
                }
            }

            // ── while ─────────────────────────────────────────────────────────
            Stmt::While { cond } => {
                let reentry = matches!(self.frames.last(), Some(Frame::While { head, .. }) if *head == ip);
                let holds = eval_condition(cond, self);
                if !holds {
                    if reentry {
                        self.frames.pop();
                    }
                    return Ok(jump(ip)? + 1);
                }
                if reentry {
                    if let Some(Frame::While { iterations, .. }) = self.frames.last_mut() {
                        *iterations += 1;
                        let n = *iterations;
                        self.check_iterations(n, &at)?;
                    }
                } else {
                    self.check_iterations(1, &at)?;
                    self.frames.push(Frame::While { head: ip, iterations: 1 });
                }
                Ok(ip + 1)
            }
            Stmt::EndWhile => jump(ip),

            // ── if / else ─────────────────────────────────────────────────────
            Stmt::If { cond } => {
                let holds = eval_condition(cond, self);
                log::trace!("{at}: if {cond} -> {holds}");
                match (holds, prog.else_of(ip)) {
                    (true, _) => {
                        self.frames.push(Frame::If { head: ip, branch_active: true, else_seen: false });
                        Ok(ip + 1)
                    }
                    (false, Some(else_at)) => {
                        self.frames.push(Frame::If { head: ip, branch_active: true, else_seen: true });
                        Ok(else_at + 1)
                    }
                    (false, None) => Ok(jump(ip)? + 1),
                }
            }
            Stmt::Else => {
                // Only reached from the taken `then` branch.
                match self.frames.last_mut() {
                    Some(Frame::If { branch_active, else_seen, .. }) if *branch_active && !*else_seen => {
                        *branch_active = false;
                        *else_seen = true;
                    }
                    _ => return Err(ScriptError::structural(&at, "'else' outside an if block")),
                }
                jump(ip)
            }
            Stmt::EndIf => match self.frames.pop() {
                Some(Frame::If { head, .. }) => {
                    log::trace!("{at}: end of if at {}", prog.pos(head));
                    Ok(ip + 1)
                }
                _ => Err(ScriptError::structural(&at, "'endif' outside an if block")),
            },

            // ── subroutines ───────────────────────────────────────────────────
            Stmt::Def { .. } => Ok(jump(ip)? + 1),
            Stmt::EndDef => match self.frames.pop() {
                Some(Frame::Call { name, return_to, .. }) => {
                    log::trace!("{at}: return from {name}");
                    Ok(return_to)
                }
                _ => Err(ScriptError::structural(&at, "'enddef' reached outside a call")),
            },
            Stmt::Call { name, args } => {
                let sub = prog
                    .subroutine(name)
                    .ok_or_else(|| ScriptError::UnknownSubroutine { at: at.clone(), name: name.clone() })?;
                if self.call_depth() >= self.limits.call_depth {
                    return Err(ScriptError::CallDepth { at, limit: self.limits.call_depth });
                }
                let params = split_words(&expand(args, self));
                log::debug!("{at}: call {name} {params:?}");
                self.frames.push(Frame::Call { name: name.clone(), return_to: ip + 1, params });
                Ok(sub.def + 1)
            }

            // ── actions ───────────────────────────────────────────────────────
            Stmt::Sleep { secs } => {
                let secs = parse_seconds(&expand(secs, self)).map_err(|message| {
                    ScriptError::BadArguments { at: at.clone(), command: "sleep".into(), message }
                })?;
                d.sleep(secs, &at).await;
                Ok(ip + 1)
            }
            Stmt::Command { prepared: Some(cmd), .. } => {
                d.dispatch(cmd, &at).await?;
                Ok(ip + 1)
            }
            Stmt::Command { text, prepared: None } => {
                let cmd = prepare_line(&expand(text, self), &at)?;
                d.dispatch(&cmd, &at).await?;
                Ok(ip + 1)
            }
        }
    }

    fn check_iterations(&self, n: u32, at: &Pos) -> Result<(), ScriptError> {
        if n > self.limits.iterations {
            return Err(ScriptError::IterationLimit { at: at.clone(), limit: self.limits.iterations });
        }
        Ok(())
    }
}

/// Whether `n` lies within the (inclusive, direction-aware) range ending at `end`.
fn in_range(n: i64, end: i64, step: i64) -> bool {
    if step > 0 {
        n <= end
    } else {
        n >= end
    }
}

impl EvalContext for Interpreter {
    fn get_var(&self, name: &str) -> Option<Value> {
        if let Ok(n) = name.parse::<usize>() {
            if let Some(p) = n.checked_sub(1).and_then(|i| self.positional_params().get(i)) {
                return Some(Value::Str(p.clone()));
            }
        }
        self.globals.get(name).cloned()
    }

    fn positional_params(&self) -> &[String] {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match f {
                Frame::Call { params, .. } => Some(params.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
