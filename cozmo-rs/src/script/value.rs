//! Runtime value type for script variables.
//!
//! Scripts are untyped: every variable is text at heart, but values that look
//! like numbers are kept in numeric form so loop counters and arithmetic
//! terms do not round-trip through strings.  Comparison falls back to string
//! ordering when either side is not numeric.

use std::cmp::Ordering;
use std::fmt;

/// A script variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl Value {
    /// Classify `s`: integers and floats become numeric, anything else stays text.
    pub fn parse(s: &str) -> Value {
        let t = s.trim();
        if let Ok(n) = t.parse::<i64>() {
            Value::Int(n)
        } else if let Some(x) = parse_float(t) {
            Value::Float(x)
        } else {
            Value::Str(s.to_owned())
        }
    }

    /// Build a numeric value, collapsing integral floats to `Int`.
    pub fn from_number(x: f64) -> Value {
        if x.fract() == 0.0 && x.abs() < 9.0e15 {
            Value::Int(x as i64)
        } else {
            Value::Float(x)
        }
    }

    /// Script truthiness: empty, `0`, `false`, `no` and `off` are false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => {
                let s = s.trim();
                !(s.is_empty()
                    || s == "0"
                    || s.eq_ignore_ascii_case("false")
                    || s.eq_ignore_ascii_case("no")
                    || s.eq_ignore_ascii_case("off"))
            }
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Str(s) => parse_float(s.trim()),
        }
    }

    /// Integer view of the value; floats must be integral.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            Value::Float(_) => None,
            Value::Str(s) => match Value::parse(s) {
                Value::Str(_) => None,
                v => v.as_int(),
            },
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    fn operands(&self, rhs: &Value) -> Result<(f64, f64), String> {
        match (self.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(format!("non-numeric operand in '{self}' and '{rhs}'")),
        }
    }

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.operands(rhs)?;
        Ok(Value::from_number(a + b))
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.operands(rhs)?;
        Ok(Value::from_number(a - b))
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.operands(rhs)?;
        Ok(Value::from_number(a * b))
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.operands(rhs)?;
        if b == 0.0 {
            return Err("division by zero".into());
        }
        Ok(Value::from_number(a / b))
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = self.operands(rhs)?;
        if b == 0.0 {
            return Err("modulo by zero".into());
        }
        Ok(Value::from_number(a % b))
    }

    pub fn arith_neg(&self) -> Result<Value, String> {
        match self.as_number() {
            Some(x) => Ok(Value::from_number(-x)),
            None => Err(format!("cannot negate '{self}'")),
        }
    }

    /// Relational comparison: numeric when both sides are numeric-looking,
    /// otherwise plain string ordering.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        match (self.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.to_string().cmp(&rhs.to_string()),
        }
    }
}

/// Parse a float, rejecting the textual forms (`inf`, `nan`) Rust accepts.
fn parse_float(s: &str) -> Option<f64> {
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
