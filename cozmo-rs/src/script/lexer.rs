//! Line tokenizer.
//!
//! Splits an (already expanded) script line into words.  Words are separated
//! by whitespace; a double-quoted run is one word with the quotes removed and
//! `\"` / `\\` unescaped inside it.  Single quotes are ordinary characters so
//! text like `say I'm Cozmo` needs no quoting.
//!
//! A word whose unquoted prefix up to the first `=` is a plain name is an
//! option (`speed=50`, `file="my song.mp3"`); every other word is positional.

use std::borrow::Cow;
use std::fmt;

use super::expand::is_valid_name;

/// One word of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    Positional(String),
    Option(String, String),
}

/// A fully tokenized command: name, positional arguments and `key=value` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
    /// Options in the order written.  A repeated key keeps every occurrence;
    /// the dispatcher applies them in order, so the last one wins.
    pub opts: Vec<(String, String)>,
}

impl Invocation {
    pub fn opt(&self, key: &str) -> Option<&str> {
        self.opts.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for a in &self.args {
            write!(f, " {}", quote_if_needed(a))?;
        }
        for (k, v) in &self.opts {
            write!(f, " {k}={}", quote_if_needed(v))?;
        }
        Ok(())
    }
}

fn quote_if_needed(s: &str) -> Cow<'_, str> {
    if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"' || c == '=') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
}

/// Split `src` into raw word texts, honouring double quotes.
///
/// An unterminated quote runs to the end of the line.
pub fn split_words(src: &str) -> Vec<String> {
    split_tagged(src)
        .into_iter()
        .map(|w| match w {
            Word::Positional(s) => s,
            Word::Option(k, v) => format!("{k}={v}"),
        })
        .collect()
}

/// Split `src` into positional words and options.
pub fn split_tagged(src: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut chars = src.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut text = String::new();
        // Byte length of the unquoted prefix; `=` only counts inside it.
        let mut eq_at: Option<usize> = None;
        let mut seen_quote = false;

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            if c == '"' {
                seen_quote = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' if matches!(chars.peek(), Some('"' | '\\')) => {
                            if let Some(esc) = chars.next() {
                                text.push(esc);
                            }
                        }
                        _ => text.push(q),
                    }
                }
                continue;
            }
            if c == '=' && eq_at.is_none() && !seen_quote {
                eq_at = Some(text.len());
            }
            text.push(c);
        }

        match eq_at {
            Some(i) if is_valid_name(&text[..i]) => {
                let value = text[i + 1..].to_owned();
                text.truncate(i);
                words.push(Word::Option(text, value));
            }
            _ => words.push(Word::Positional(text)),
        }
    }

    words
}

/// Tokenize a command line.  Returns `None` for a line with no words.
pub fn parse_invocation(src: &str) -> Option<Invocation> {
    let mut words = split_tagged(src).into_iter();
    let name = match words.next()? {
        Word::Positional(s) => s,
        Word::Option(k, v) => format!("{k}={v}"),
    };
    let mut inv = Invocation { name, ..Default::default() };
    for w in words {
        match w {
            Word::Positional(s) => inv.args.push(s),
            Word::Option(k, v) => inv.opts.push((k, v)),
        }
    }
    Some(inv)
}

/// Split a line into its first word and the trimmed remainder.
pub fn split_keyword(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim_start()),
        None => (line, ""),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
