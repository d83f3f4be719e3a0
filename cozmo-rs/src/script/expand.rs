//! Variable substitution.
//!
//! Runs over a raw script line before it is split into arguments:
//!
//! | Sequence   | Meaning                                               |
//! |------------|-------------------------------------------------------|
//! | `$name`    | Variable `name` (longest run of `[A-Za-z0-9_]`)       |
//! | `${name}`  | Same, delimited form (`${n}x` keeps the `x`)          |
//! | `$1`, `$2` | Positional parameter of the active subroutine call    |
//! | `$#`       | Number of positional parameters                       |
//! | `$*`       | All positional parameters joined with spaces          |
//! | `$$`       | Literal `$`                                           |
//!
//! Unset variables expand to the empty string.  A `$` that does not start any
//! of the sequences above is copied through unchanged.

use super::expr::EvalContext;

/// Expand all substitution sequences in `src`.
pub fn expand(src: &str, ctx: &dyn EvalContext) -> String {
    if !src.contains('$') {
        return src.to_owned();
    }

    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('#') => {
                chars.next();
                out.push_str(&ctx.positional_params().len().to_string());
            }
            Some('*') => {
                chars.next();
                out.push_str(&ctx.positional_params().join(" "));
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed && !name.is_empty() && name.chars().all(is_name_char) {
                    out.push_str(&lookup_var(&name, ctx));
                } else {
                    // Not a substitution: keep the text as written.
                    out.push_str("${");
                    out.push_str(&name);
                    if closed {
                        out.push('}');
                    }
                }
            }
            Some(c) if is_name_char(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                out.push_str(&lookup_var(&name, ctx));
            }
            _ => out.push('$'),
        }
    }

    out
}

/// Returns `true` if `src` contains anything [`expand`] would substitute.
pub fn has_substitutions(src: &str) -> bool {
    let mut chars = src.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' {
            match chars.peek() {
                Some(&c) if is_name_char(c) || matches!(c, '$' | '#' | '*' | '{') => return true,
                _ => {}
            }
        }
    }
    false
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` if `name` is a legal variable name for `set` and `for`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

fn lookup_var(name: &str, ctx: &dyn EvalContext) -> String {
    ctx.get_var(name).map(|v| v.to_string()).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
