//! Conditions and arithmetic terms.
//!
//! Loop and conditional headers, and the value side of `set`, are evaluated
//! here after variable substitution.  The grammar is deliberately small:
//!
//! ```text
//! condition := term [ cmp-op term ]          cmp-op := == != > < >= <=
//! term      := arith | text
//! arith     := additive over numbers, + - * / %, unary -, ( )
//! ```
//!
//! A term that is not a well-formed arithmetic expression (or whose
//! evaluation fails, e.g. division by zero) is taken literally as text.
//! Comparisons are numeric when both sides are numeric-looking, otherwise they
//! compare strings.  A condition without an operator is tested for
//! truthiness (see [`Value::as_bool`]).

use std::cmp::Ordering;

use super::expand::expand;
use super::value::Value;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Variable access used by substitution and evaluation.
///
/// The [`Interpreter`](super::interp::Interpreter) implements this to expose
/// the global scope and the active call's positional parameters.
pub trait EvalContext {
    /// Look up a variable.  Numeric names resolve against the active call's
    /// positional parameters first, then the global scope.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Positional parameters of the active subroutine call (empty at top level).
    fn positional_params(&self) -> &[String];
}

// ── Comparison operators ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

/// Find the leftmost comparison operator outside quotes.
///
/// Returns `(lhs, op, rhs)`.
pub fn split_comparison(src: &str) -> Option<(&str, CmpOp, &str)> {
    let bytes = src.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        let next = bytes.get(i + 1).copied();
        let found = match (b, next) {
            (b'"' | b'\'', _) => {
                quote = Some(b);
                None
            }
            (b'=', Some(b'=')) => Some((CmpOp::Eq, 2)),
            (b'!', Some(b'=')) => Some((CmpOp::Ne, 2)),
            (b'>', Some(b'=')) => Some((CmpOp::Ge, 2)),
            (b'<', Some(b'=')) => Some((CmpOp::Le, 2)),
            (b'>', _) => Some((CmpOp::Gt, 1)),
            (b'<', _) => Some((CmpOp::Lt, 1)),
            _ => None,
        };
        if let Some((op, len)) = found {
            return Some((&src[..i], op, &src[i + len..]));
        }
        i += 1;
    }
    None
}

// ── Public entry points ───────────────────────────────────────────────────────

/// Substitute variables in `src`, then evaluate it as a condition.
///
/// Substitution happens first, so an operator inside a variable's value
/// takes part in the comparison: with `m` set to `a>b`, `$m == x` compares
/// `a` against `b == x`.  Quote the reference (`"$m" == x`) to keep the
/// value as one term.
pub fn eval_condition(src: &str, ctx: &dyn EvalContext) -> bool {
    condition_value(&expand(src, ctx))
}

/// Substitute variables in `src`, then evaluate it as a single term.
pub fn eval_value(src: &str, ctx: &dyn EvalContext) -> Value {
    eval_term(&expand(src, ctx))
}

/// Evaluate an already-expanded condition.
pub fn condition_value(src: &str) -> bool {
    match split_comparison(src) {
        Some((lhs, op, rhs)) => {
            let l = eval_term(lhs);
            let r = eval_term(rhs);
            op.holds(l.cmp_value(&r))
        }
        None => eval_term(src).as_bool(),
    }
}

/// Evaluate an already-expanded term: arithmetic if it parses as such,
/// otherwise the (unquoted) text itself, kept verbatim.
pub fn eval_term(src: &str) -> Value {
    let text = unquote(src.trim());
    eval_arith(text).unwrap_or_else(|| Value::Str(text.to_owned()))
}

/// Strip one pair of matching surrounding quotes.
pub fn unquote(s: &str) -> &str {
    let b = s.as_bytes();
    if b.len() >= 2 && (b[0] == b'"' || b[0] == b'\'') && b[b.len() - 1] == b[0] {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Evaluate `src` as numeric arithmetic.  `None` if it is not arithmetic or
/// the evaluation fails.
pub fn eval_arith(src: &str) -> Option<Value> {
    let tokens = Lexer::new(src).tokenize()?;
    // A lone number is a literal and keeps its spelling (`007`, `1.50`).
    if tokens.len() <= 2 {
        return None;
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_additive().ok()?;
    if parser.peek() != &Token::Eof {
        return None;
    }
    expr.eval().ok()
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Value),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn read_number(&mut self) -> Option<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.')) {
            self.pos += 1;
        }
        let s = std::str::from_utf8(&self.src[start..self.pos]).ok()?;
        if let Ok(n) = s.parse::<i64>() {
            Some(Token::Num(Value::Int(n)))
        } else {
            s.parse::<f64>().ok().map(|x| Token::Num(Value::Float(x)))
        }
    }

    /// Tokenize the whole input; `None` on any byte outside the grammar.
    fn tokenize(mut self) -> Option<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t')) {
                self.pos += 1;
            }
            let tok = match self.peek() {
                None => {
                    tokens.push(Token::Eof);
                    return Some(tokens);
                }
                Some(b'0'..=b'9' | b'.') => self.read_number()?,
                Some(c) => {
                    self.pos += 1;
                    match c {
                        b'+' => Token::Plus,
                        b'-' => Token::Minus,
                        b'*' => Token::Star,
                        b'/' => Token::Slash,
                        b'%' => Token::Percent,
                        b'(' => Token::LParen,
                        b')' => Token::RParen,
                        _ => return None,
                    }
                }
            };
            tokens.push(tok);
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self) -> Result<Value, String> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Neg(inner) => inner.eval()?.arith_neg(),
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval()?;
                let r = rhs.eval()?;
                match op {
                    BinOp::Add => l.arith_add(&r),
                    BinOp::Sub => l.arith_sub(&r),
                    BinOp::Mul => l.arith_mul(&r),
                    BinOp::Div => l.arith_div(&r),
                    BinOp::Rem => l.arith_rem(&r),
                }
            }
        }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Num(v) => Ok(Expr::Literal(v)),
            Token::LParen => {
                let inner = self.parse_additive()?;
                match self.advance() {
                    Token::RParen => Ok(inner),
                    t => Err(format!("expected ')', got {t:?}")),
                }
            }
            t => Err(format!("unexpected token {t:?}")),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
