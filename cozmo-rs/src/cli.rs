//! Command-line argument parsing.
//!
//! Usage:
//!   cozmo [-v] [-c <config>] -s <script>
//!   cozmo [-v] [-c <config>] <command> [<arg>…]
//!   cozmo [-v] [-c <config>] "<command> [<arg>…]" ["<command> …"]…
//!   cozmo -h

use std::path::PathBuf;

pub const USAGE: &str = "Usage: cozmo [-v] [-c <config>] -s|--script <file>\n       cozmo [-v] [-c <config>] <command> [<arg>...]\n       cozmo [-v] [-c <config>] \"<command> [<arg>...]\" [\"<command> ...\"]...\n       cozmo -h|--help";

/// Script syntax summary printed by `-h` after the command table.
pub const SCRIPT_HELP: &str = r#"Scripts (one command per line, # starts a comment):
  include "lib/moves.txt"       splice another file (relative to this one)
  set name value | set n=5      variables, used as $name or ${name}
  for i in 1..5 [step 2]        counted loop          ... endfor
  for c in red green blue       list loop             ... endfor
  while $n > 0                  condition loop        ... endwhile
  if $n >= 2 ... else ... endif operators: == != > < >= <=
  def greet ... enddef          subroutine; call greet arg1 arg2 ($1, $2, $#, $*)
  sleep 1.5                     pause for seconds
  <command> async=true          continue without waiting; wait=<s> caps blocking

Examples:
  cozmo "say Hello" "move 100" "turn 90"
  cozmo lights color=red
  cozmo -s dance.txt"#;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Explicit rc file (`-c <file>`).
    pub config: Option<PathBuf>,
    /// Debug logging (`-v`).
    pub verbose: bool,
    /// Print usage and the command table (`-h`).
    pub help: bool,
    /// What to run.
    pub mode: RunMode,
}

/// What the binary executes.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Nothing given; only valid together with `-h`.
    #[default]
    None,
    /// `-s <file>`: run a script file.
    Script(PathBuf),
    /// Positional words: command lines run in order as one program.
    Commands(Vec<String>),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut script: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        // First non-flag argument starts the inline command; everything after
        // it belongs to the command (`cozmo move 100 speed=-50`).
        if !arg.starts_with('-') || arg == "-" {
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        match arg {
            "--help" => args.help = true,
            "--verbose" => args.verbose = true,
            "--script" => script = Some(PathBuf::from(value_of(argv, &mut i, "--script")?)),
            "--config" => args.config = Some(PathBuf::from(value_of(argv, &mut i, "--config")?)),
            _ if arg.starts_with("--") => return Err(format!("unknown option: {arg}")),
            _ => {
                // Short flags may be combined: `-vs script.txt`.
                let chars: Vec<char> = arg[1..].chars().collect();
                let mut j = 0;
                while j < chars.len() {
                    match chars[j] {
                        'h' => args.help = true,
                        'v' => args.verbose = true,
                        c @ ('s' | 'c') => {
                            let value = if j + 1 < chars.len() {
                                // Embedded: -s<file>
                                let s: String = chars[j + 1..].iter().collect();
                                j = chars.len();
                                s
                            } else {
                                value_of(argv, &mut i, &format!("-{c}"))?
                            };
                            if c == 's' {
                                script = Some(PathBuf::from(value));
                            } else {
                                args.config = Some(PathBuf::from(value));
                            }
                        }
                        c => return Err(format!("unknown option: -{c}")),
                    }
                    j += 1;
                }
            }
        }
        i += 1;
    }

    args.mode = match (script, positional.is_empty()) {
        (Some(_), false) => return Err("give either a script or a command, not both".to_owned()),
        (Some(path), true) => RunMode::Script(path),
        (None, false) => RunMode::Commands(command_lines(&positional)),
        (None, true) if args.help => RunMode::None,
        (None, true) => return Err("no script or command given".to_owned()),
    };

    Ok(args)
}

/// Take the value following the flag at `argv[*i]`.
fn value_of(argv: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    argv.get(*i).cloned().ok_or_else(|| format!("{flag} requires an argument"))
}

/// Turn positional words into command lines.
///
/// When the first word already holds a whole command (`"say Hello"`), every
/// word is its own line: `cozmo "say Hello" "move 100"`.  Otherwise the words
/// form one line: `cozmo move 100 speed=50`.
fn command_lines(words: &[String]) -> Vec<String> {
    if words[0].trim().contains(char::is_whitespace) {
        words.to_vec()
    } else {
        vec![join_command(words)]
    }
}

/// Rebuild one command line from shell words, re-quoting words the shell
/// already unquoted so `cozmo say "hello there"` stays a single argument.
fn join_command(words: &[String]) -> String {
    words
        .iter()
        .map(|w| {
            if w.is_empty() || w.contains(char::is_whitespace) {
                match w.split_once('=') {
                    Some((k, v)) if crate::script::expand::is_valid_name(k) => {
                        format!("{k}=\"{}\"", escape(v))
                    }
                    _ => format!("\"{}\"", escape(w)),
                }
            } else {
                w.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
