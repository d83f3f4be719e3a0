//! The closed set of device commands.
//!
//! [`COMMANDS`] describes every command: its positional arguments, its
//! `key=value` options with defaults, and whether it is async-capable.
//! [`prepare`] checks an [`Invocation`] against that table and turns it into
//! a typed [`Action`] plus the [`DispatchPolicy`] it should run under.
//!
//! An option's type is the type of its default: booleans accept
//! `true/false yes/no on/off 1/0`, integer and float options must parse as
//! such, and options without a default take any text.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::script::lexer::Invocation;

// ── Command table ─────────────────────────────────────────────────────────────

/// Default for one option; also fixes the option's type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    /// Free text with no default.
    Unset,
}

impl fmt::Display for OptDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptDefault::Bool(b) => write!(f, "{b}"),
            OptDefault::Int(n) => write!(f, "{n}"),
            OptDefault::Float(x) => write!(f, "{x:?}"),
            OptDefault::Str(s) => write!(f, "{s}"),
            OptDefault::Unset => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Required positional arguments, by name.
    pub args: &'static [&'static str],
    pub opts: &'static [(&'static str, OptDefault)],
    /// Accepts any number of extra positional words.
    pub varargs: bool,
    /// Default `wait=` in seconds; `Some` marks an async-capable command.
    pub wait: Option<f64>,
    /// Runs without a robot connection.
    pub offline: bool,
    pub desc: &'static str,
}

impl CommandSpec {
    pub fn is_async_capable(&self) -> bool {
        self.wait.is_some()
    }

    /// Find an option by key, including the implicit `async` and `wait`.
    fn option(&self, key: &str) -> Option<(&'static str, OptDefault)> {
        if let Some(&(k, d)) = self.opts.iter().find(|(k, _)| *k == key) {
            return Some((k, d));
        }
        match (key, self.wait) {
            ("async", Some(_)) => Some(("async", OptDefault::Bool(false))),
            ("wait", Some(w)) => Some(("wait", OptDefault::Float(w))),
            _ => None,
        }
    }
}

const NO_OPTS: &[(&str, OptDefault)] = &[];
const SEARCH: &[(&str, OptDefault)] = &[("search", OptDefault::Unset)];

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "connect",
        args: &[],
        opts: NO_OPTS,
        varargs: false,
        wait: None,
        offline: false,
        desc: "Connect to robot",
    },
    CommandSpec {
        name: "status",
        args: &[],
        opts: NO_OPTS,
        varargs: false,
        wait: None,
        offline: false,
        desc: "Show robot status",
    },
    CommandSpec {
        name: "wait",
        args: &[],
        opts: NO_OPTS,
        varargs: false,
        wait: None,
        offline: false,
        desc: "Wait for robot to stabilize",
    },
    CommandSpec {
        name: "say",
        args: &["text"],
        opts: &[
            ("volume", OptDefault::Int(65535)),
            ("voice", OptDefault::Str("en-us")),
            ("speed", OptDefault::Int(150)),
            ("pitch", OptDefault::Int(50)),
            ("amplitude", OptDefault::Int(100)),
        ],
        varargs: true,
        wait: Some(30.0),
        offline: false,
        desc: "Text-to-speech",
    },
    CommandSpec {
        name: "volume",
        args: &["level"],
        opts: NO_OPTS,
        varargs: false,
        wait: None,
        offline: false,
        desc: "Set volume (0-65535)",
    },
    CommandSpec {
        name: "move",
        args: &["distance"],
        opts: &[("speed", OptDefault::Int(100))],
        varargs: false,
        wait: Some(10.0),
        offline: false,
        desc: "Move forward/backward (mm, mm/s)",
    },
    CommandSpec {
        name: "turn",
        args: &["angle"],
        opts: NO_OPTS,
        varargs: false,
        wait: Some(2.0),
        offline: false,
        desc: "Turn in place by angle (degrees)",
    },
    CommandSpec {
        name: "goto",
        args: &["x", "y"],
        opts: &[("angle", OptDefault::Int(0))],
        varargs: false,
        wait: Some(10.0),
        offline: false,
        desc: "Go to position (mm, degrees)",
    },
    CommandSpec {
        name: "head",
        args: &[],
        opts: &[("angle", OptDefault::Str("middle"))],
        varargs: true,
        wait: Some(2.0),
        offline: false,
        desc: "Set head angle (down, lower, middle, upper, up or radians)",
    },
    CommandSpec {
        name: "lift",
        args: &["speed"],
        opts: &[("duration", OptDefault::Float(1.0))],
        varargs: false,
        wait: Some(2.0),
        offline: false,
        desc: "Move lift",
    },
    CommandSpec {
        name: "lights",
        args: &[],
        opts: &[("color", OptDefault::Str("blue")), ("colors", OptDefault::Unset)],
        varargs: false,
        wait: None,
        offline: false,
        desc: "Set backpack LED color(s)",
    },
    CommandSpec {
        name: "ir",
        args: &[],
        opts: &[("enable", OptDefault::Bool(true))],
        varargs: false,
        wait: None,
        offline: false,
        desc: "IR head light",
    },
    CommandSpec {
        name: "cliff",
        args: &[],
        opts: &[("enable", OptDefault::Bool(true)), ("reaction", OptDefault::Str("backup"))],
        varargs: false,
        wait: None,
        offline: false,
        desc: "Cliff detection settings",
    },
    CommandSpec {
        name: "calibrate",
        args: &[],
        opts: &[("head", OptDefault::Bool(true)), ("lift", OptDefault::Bool(true))],
        varargs: false,
        wait: None,
        offline: false,
        desc: "Calibrate motors",
    },
    CommandSpec {
        name: "animate",
        args: &["name"],
        opts: NO_OPTS,
        varargs: false,
        wait: Some(30.0),
        offline: false,
        desc: "Play animation",
    },
    CommandSpec {
        name: "anim-group",
        args: &["group"],
        opts: NO_OPTS,
        varargs: false,
        wait: Some(30.0),
        offline: false,
        desc: "Play animation group",
    },
    CommandSpec {
        name: "list-anims",
        args: &[],
        opts: SEARCH,
        varargs: false,
        wait: None,
        offline: true,
        desc: "List available animations",
    },
    CommandSpec {
        name: "list-groups",
        args: &[],
        opts: SEARCH,
        varargs: false,
        wait: None,
        offline: true,
        desc: "List available animation groups",
    },
    CommandSpec {
        name: "list-sounds",
        args: &[],
        opts: SEARCH,
        varargs: false,
        wait: None,
        offline: true,
        desc: "List available sounds",
    },
    CommandSpec {
        name: "play-sound",
        args: &[],
        opts: &[("name", OptDefault::Unset), ("file", OptDefault::Unset)],
        varargs: true,
        wait: Some(30.0),
        offline: false,
        desc: "Play sound by name or file",
    },
    CommandSpec {
        name: "camera",
        args: &[],
        opts: &[("output", OptDefault::Str("camera_capture.jpg"))],
        varargs: false,
        wait: None,
        offline: false,
        desc: "Capture image",
    },
    CommandSpec {
        name: "battery",
        args: &[],
        opts: &[("mode", OptDefault::Str("icon")), ("duration", OptDefault::Float(5.0))],
        varargs: false,
        wait: None,
        offline: false,
        desc: "Show battery (icon, voltage, percent, text, raw)",
    },
    CommandSpec {
        name: "screen",
        args: &["text"],
        opts: &[
            ("duration", OptDefault::Float(5.0)),
            ("size", OptDefault::Int(12)),
            ("x", OptDefault::Int(5)),
            ("y", OptDefault::Int(10)),
        ],
        varargs: true,
        wait: None,
        offline: false,
        desc: "Display text on the face screen",
    },
];

/// Look up a command by exact (case-sensitive) name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

// ── Typed option values ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum OptValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Options of one invocation with defaults filled in.
#[derive(Debug)]
struct Opts {
    values: HashMap<&'static str, OptValue>,
}

impl Opts {
    fn resolve(spec: &CommandSpec, given: &[(String, String)]) -> Result<Opts, String> {
        let mut values = HashMap::new();
        let all = spec
            .opts
            .iter()
            .copied()
            .chain(spec.option("async"))
            .chain(spec.option("wait"));
        for (key, default) in all {
            let v = match default {
                OptDefault::Bool(b) => OptValue::Bool(b),
                OptDefault::Int(n) => OptValue::Int(n),
                OptDefault::Float(x) => OptValue::Float(x),
                OptDefault::Str(s) => OptValue::Str(s.to_owned()),
                OptDefault::Unset => continue,
            };
            values.insert(key, v);
        }

        for (key, raw) in given {
            let Some((static_key, default)) = spec.option(key) else {
                return Err(format!("unknown option '{key}'"));
            };
            let v = match default {
                OptDefault::Bool(_) => OptValue::Bool(parse_bool(raw)?),
                OptDefault::Int(_) => OptValue::Int(
                    raw.trim()
                        .parse()
                        .map_err(|_| format!("{key}: expected an integer, got '{raw}'"))?,
                ),
                OptDefault::Float(_) => OptValue::Float(parse_f64(key, raw)?),
                OptDefault::Str(_) | OptDefault::Unset => OptValue::Str(raw.clone()),
            };
            values.insert(static_key, v);
        }
        Ok(Opts { values })
    }

    fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(OptValue::Bool(true)))
    }

    fn int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(OptValue::Int(n)) => *n,
            _ => 0,
        }
    }

    fn float(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(OptValue::Float(x)) => *x,
            Some(OptValue::Int(n)) => *n as f64,
            _ => 0.0,
        }
    }

    fn str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// Parse a script boolean.
pub fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("cannot parse '{s}' as boolean")),
    }
}

fn parse_f64(what: &str, s: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .ok_or_else(|| format!("{what}: expected a number, got '{s}'"))
}

// ── Action ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    White,
    Off,
}

impl LedColor {
    fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(LedColor::Red),
            "green" => Ok(LedColor::Green),
            "blue" => Ok(LedColor::Blue),
            "white" => Ok(LedColor::White),
            "off" => Ok(LedColor::Off),
            _ => Err(format!("unknown color '{s}' (red, green, blue, white, off)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliffReaction {
    Stop,
    Backup,
    Animate,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryMode {
    Icon,
    Voltage,
    Percent,
    Text,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    Name(String),
    File(PathBuf),
}

/// Number of backpack LEDs addressed by `lights colors=...`.
pub const BACKPACK_LEDS: usize = 5;

/// A validated device action, ready for the actuator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Connect,
    Status,
    Wait,
    Say { text: String, volume: u16, voice: String, speed: i64, pitch: i64, amplitude: i64 },
    Volume { level: u16 },
    Move { distance_mm: f64, speed_mmps: f64 },
    Turn { degrees: f64 },
    GoTo { x_mm: f64, y_mm: f64, angle_deg: f64 },
    Head { radians: f64 },
    Lift { speed: f64, duration: f64 },
    Lights { colors: Vec<LedColor> },
    Ir { enable: bool },
    Cliff { enable: bool, reaction: CliffReaction },
    Calibrate { head: bool, lift: bool },
    Animate { name: String },
    AnimGroup { group: String },
    ListAnims { search: Option<String> },
    ListGroups { search: Option<String> },
    ListSounds { search: Option<String> },
    PlaySound { source: SoundSource },
    Camera { output: PathBuf },
    Battery { mode: BatteryMode, duration: f64 },
    Screen { text: String, duration: f64, size: i64, x: i64, y: i64 },
}

impl Action {
    /// The command name this action was built from.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::Status => "status",
            Action::Wait => "wait",
            Action::Say { .. } => "say",
            Action::Volume { .. } => "volume",
            Action::Move { .. } => "move",
            Action::Turn { .. } => "turn",
            Action::GoTo { .. } => "goto",
            Action::Head { .. } => "head",
            Action::Lift { .. } => "lift",
            Action::Lights { .. } => "lights",
            Action::Ir { .. } => "ir",
            Action::Cliff { .. } => "cliff",
            Action::Calibrate { .. } => "calibrate",
            Action::Animate { .. } => "animate",
            Action::AnimGroup { .. } => "anim-group",
            Action::ListAnims { .. } => "list-anims",
            Action::ListGroups { .. } => "list-groups",
            Action::ListSounds { .. } => "list-sounds",
            Action::PlaySound { .. } => "play-sound",
            Action::Camera { .. } => "camera",
            Action::Battery { .. } => "battery",
            Action::Screen { .. } => "screen",
        }
    }

    pub fn is_offline(&self) -> bool {
        lookup(self.name()).is_some_and(|c| c.offline)
    }

    /// Rough device-side duration of an async-capable action.
    pub fn estimate(&self) -> Option<Duration> {
        let secs = match self {
            Action::Say { text, speed, .. } => {
                let words = text.split_whitespace().count().max(1) as f64;
                0.5 + words * 60.0 / (*speed).max(1) as f64
            }
            Action::Move { distance_mm, speed_mmps } => {
                distance_mm.abs() / speed_mmps.abs().max(1.0)
            }
            Action::Turn { degrees } => degrees.abs() / 90.0,
            Action::GoTo { x_mm, y_mm, .. } => x_mm.hypot(*y_mm) / 100.0 + 1.0,
            Action::Head { .. } => 0.5,
            Action::Lift { duration, .. } => *duration,
            Action::Animate { .. } | Action::AnimGroup { .. } => 2.0,
            Action::PlaySound { .. } => 1.5,
            _ => return None,
        };
        Some(Duration::from_secs_f64(secs.clamp(0.0, 3600.0)))
    }
}

// ── Prepared commands ─────────────────────────────────────────────────────────

/// How an async-capable command is awaited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    /// Register the completion and continue immediately.
    pub async_mode: bool,
    /// Longest time to block when not async.
    pub wait: Duration,
}

/// A command that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub invocation: Invocation,
    pub action: Action,
    /// `None` for commands that are not async-capable.
    pub policy: Option<DispatchPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareError {
    UnknownCommand(String),
    BadArguments { command: String, message: String },
}

/// Validate `inv` against the command table.
pub fn prepare(inv: &Invocation) -> Result<Prepared, PrepareError> {
    let spec = lookup(&inv.name).ok_or_else(|| PrepareError::UnknownCommand(inv.name.clone()))?;
    let bad = |message: String| PrepareError::BadArguments { command: inv.name.clone(), message };

    if inv.args.len() < spec.args.len() {
        return Err(bad(format!(
            "requires {} argument(s): {}",
            spec.args.len(),
            spec.args.iter().map(|a| format!("<{a}>")).collect::<Vec<_>>().join(" ")
        )));
    }
    if inv.args.len() > spec.args.len() && !spec.varargs {
        return Err(bad(format!("too many arguments (expected {})", spec.args.len())));
    }

    let opts = Opts::resolve(spec, &inv.opts).map_err(bad)?;
    let action = build_action(spec, &inv.args, &opts).map_err(bad)?;

    let policy = match spec.wait {
        Some(_) => {
            let wait = opts.float("wait");
            if wait < 0.0 {
                return Err(bad(format!("wait must not be negative, got {wait}")));
            }
            let wait = Duration::try_from_secs_f64(wait)
                .map_err(|e| bad(format!("wait: {e}")))?;
            Some(DispatchPolicy { async_mode: opts.bool("async"), wait })
        }
        None => None,
    };

    Ok(Prepared { invocation: inv.clone(), action, policy })
}

/// Resolve a head position alias or a number of radians.
pub fn head_angle(s: &str) -> Result<f64, String> {
    Ok(match s.trim().to_ascii_lowercase().as_str() {
        "down" | "bottom" => -0.44,
        "lower" => -0.20,
        "middle" | "neutral" | "center" => 0.17,
        "upper" => 0.45,
        "up" | "top" => 0.78,
        other => parse_f64("angle", other)?,
    })
}

fn arg_f64(args: &[String], idx: usize, what: &str) -> Result<f64, String> {
    parse_f64(what, args.get(idx).map(String::as_str).unwrap_or(""))
}

fn build_action(spec: &CommandSpec, args: &[String], opts: &Opts) -> Result<Action, String> {
    let search = || opts.str("search").map(str::to_owned);
    Ok(match spec.name {
        "connect" => Action::Connect,
        "status" => Action::Status,
        "wait" => Action::Wait,
        "say" => Action::Say {
            text: args.join(" "),
            volume: opts.int("volume").clamp(0, u16::MAX as i64) as u16,
            voice: opts.str("voice").unwrap_or("en-us").to_owned(),
            speed: opts.int("speed"),
            pitch: opts.int("pitch"),
            amplitude: opts.int("amplitude"),
        },
        "volume" => {
            let level: i64 = args[0]
                .trim()
                .parse()
                .map_err(|_| format!("level: expected an integer, got '{}'", args[0]))?;
            Action::Volume { level: level.clamp(0, u16::MAX as i64) as u16 }
        }
        "move" => Action::Move {
            distance_mm: arg_f64(args, 0, "distance")?,
            speed_mmps: opts.float("speed"),
        },
        "turn" => Action::Turn { degrees: arg_f64(args, 0, "angle")? },
        "goto" => Action::GoTo {
            x_mm: arg_f64(args, 0, "x")?,
            y_mm: arg_f64(args, 1, "y")?,
            angle_deg: opts.float("angle"),
        },
        "head" => {
            let which = match args.first() {
                Some(a) => a.as_str(),
                None => opts.str("angle").unwrap_or("middle"),
            };
            Action::Head { radians: head_angle(which)? }
        }
        "lift" => Action::Lift {
            speed: arg_f64(args, 0, "speed")?,
            duration: opts.float("duration"),
        },
        "lights" => {
            let colors = match opts.str("colors") {
                Some(list) => {
                    let colors =
                        list.split(',').map(LedColor::parse).collect::<Result<Vec<_>, _>>()?;
                    if colors.len() != BACKPACK_LEDS {
                        return Err(format!(
                            "colors: expected {BACKPACK_LEDS} comma-separated colors, got {}",
                            colors.len()
                        ));
                    }
                    colors
                }
                None => vec![LedColor::parse(opts.str("color").unwrap_or("blue"))?],
            };
            Action::Lights { colors }
        }
        "ir" => Action::Ir { enable: opts.bool("enable") },
        "cliff" => {
            let reaction = match opts.str("reaction").unwrap_or("backup").to_ascii_lowercase().as_str() {
                "stop" => CliffReaction::Stop,
                "backup" => CliffReaction::Backup,
                "animate" => CliffReaction::Animate,
                "none" => CliffReaction::None,
                other => {
                    return Err(format!(
                        "reaction: unknown value '{other}' (stop, backup, animate, none)"
                    ))
                }
            };
            Action::Cliff { enable: opts.bool("enable"), reaction }
        }
        "calibrate" => Action::Calibrate { head: opts.bool("head"), lift: opts.bool("lift") },
        "animate" => Action::Animate { name: args[0].clone() },
        "anim-group" => Action::AnimGroup { group: args[0].clone() },
        "list-anims" => Action::ListAnims { search: search() },
        "list-groups" => Action::ListGroups { search: search() },
        "list-sounds" => Action::ListSounds { search: search() },
        "play-sound" => {
            let source = match (opts.str("file"), opts.str("name"), args.first()) {
                (Some(file), _, _) => SoundSource::File(PathBuf::from(file)),
                (None, Some(name), _) => SoundSource::Name(name.to_owned()),
                (None, None, Some(arg)) if std::path::Path::new(arg).exists() => {
                    SoundSource::File(PathBuf::from(arg))
                }
                (None, None, Some(arg)) => SoundSource::Name(arg.clone()),
                (None, None, None) => return Err("needs a sound name or file".into()),
            };
            Action::PlaySound { source }
        }
        "camera" => Action::Camera {
            output: PathBuf::from(opts.str("output").unwrap_or("camera_capture.jpg")),
        },
        "battery" => {
            let mode = match opts.str("mode").unwrap_or("icon").to_ascii_lowercase().as_str() {
                "icon" => BatteryMode::Icon,
                "voltage" => BatteryMode::Voltage,
                "percent" => BatteryMode::Percent,
                "text" => BatteryMode::Text,
                "raw" => BatteryMode::Raw,
                other => {
                    return Err(format!(
                        "mode: unknown value '{other}' (icon, voltage, percent, text, raw)"
                    ))
                }
            };
            Action::Battery { mode, duration: opts.float("duration") }
        }
        "screen" => Action::Screen {
            text: args.join(" "),
            duration: opts.float("duration"),
            size: opts.int("size"),
            x: opts.int("x"),
            y: opts.int("y"),
        },
        other => return Err(format!("no handler for '{other}'")),
    })
}

// ── Help ──────────────────────────────────────────────────────────────────────

/// One line per command, for `--help`.
pub fn help_table() -> String {
    let mut out = String::new();
    for c in COMMANDS {
        let mut args: Vec<String> = c.args.iter().map(|a| format!("<{a}>")).collect();
        if c.varargs {
            args.push("...".into());
        }
        let mut opts: Vec<String> = c
            .opts
            .iter()
            .filter(|(_, d)| *d != OptDefault::Unset)
            .map(|(k, d)| format!("[{k}={d}]"))
            .collect();
        if let Some(w) = c.wait {
            opts.push(format!("[async=false] [wait={w}]"));
        }
        out.push_str(&format!(
            "  {:12} {:20} {:40} - {}\n",
            c.name,
            args.join(" "),
            opts.join(" "),
            c.desc
        ));
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::parse_invocation;

    fn prep(line: &str) -> Result<Prepared, PrepareError> {
        prepare(&parse_invocation(line).unwrap())
    }

    fn action(line: &str) -> Action {
        prep(line).unwrap().action
    }

    fn bad_message(line: &str) -> String {
        match prep(line) {
            Err(PrepareError::BadArguments { message, .. }) => message,
            other => panic!("expected BadArguments for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_case_sensitive() {
        assert_eq!(prep("dance").unwrap_err(), PrepareError::UnknownCommand("dance".into()));
        assert_eq!(prep("SAY hi").unwrap_err(), PrepareError::UnknownCommand("SAY".into()));
    }

    #[test]
    fn say_joins_words_and_fills_defaults() {
        assert_eq!(
            action("say Hello   there voice=de speed=120"),
            Action::Say {
                text: "Hello there".into(),
                volume: 65535,
                voice: "de".into(),
                speed: 120,
                pitch: 50,
                amplitude: 100,
            }
        );
    }

    #[test]
    fn arity_checks() {
        assert!(bad_message("say").contains("requires 1"));
        assert!(bad_message("goto 100").contains("<x> <y>"));
        assert!(bad_message("move 10 20").contains("too many"));
        assert!(bad_message("status now").contains("too many"));
    }

    #[test]
    fn option_typing() {
        assert_eq!(action("ir enable=off"), Action::Ir { enable: false });
        assert_eq!(action("ir enable=YES"), Action::Ir { enable: true });
        assert!(bad_message("ir enable=maybe").contains("boolean"));
        assert!(bad_message("move 10 speed=fast").contains("integer"));
        assert!(bad_message("lift 1 duration=long").contains("number"));
        assert!(bad_message("lights brightness=5").contains("unknown option 'brightness'"));
        // `async` is only known to async-capable commands.
        assert!(bad_message("lights async=true").contains("unknown option 'async'"));
    }

    #[test]
    fn policy_defaults_per_command() {
        let p = prep("move 100").unwrap().policy.unwrap();
        assert_eq!(p, DispatchPolicy { async_mode: false, wait: Duration::from_secs(10) });
        let p = prep("head up").unwrap().policy.unwrap();
        assert_eq!(p.wait, Duration::from_secs(2));
        let p = prep("anim-group DanceMambo async=true wait=1.5").unwrap().policy.unwrap();
        assert!(p.async_mode);
        assert_eq!(p.wait, Duration::from_millis(1500));
        assert!(prep("lights").unwrap().policy.is_none());
        assert!(bad_message("turn 90 wait=-1").contains("negative"));
    }

    #[test]
    fn head_aliases() {
        assert_eq!(action("head down"), Action::Head { radians: -0.44 });
        assert_eq!(action("head Top"), Action::Head { radians: 0.78 });
        assert_eq!(action("head"), Action::Head { radians: 0.17 });
        assert_eq!(action("head angle=lower"), Action::Head { radians: -0.20 });
        assert_eq!(action("head 0.3"), Action::Head { radians: 0.3 });
        assert!(bad_message("head sideways").contains("number"));
    }

    #[test]
    fn lights_single_and_individual() {
        assert_eq!(action("lights"), Action::Lights { colors: vec![LedColor::Blue] });
        assert_eq!(action("lights color=RED"), Action::Lights { colors: vec![LedColor::Red] });
        assert_eq!(
            action("lights colors=red,off,blue,white,green"),
            Action::Lights {
                colors: vec![
                    LedColor::Red,
                    LedColor::Off,
                    LedColor::Blue,
                    LedColor::White,
                    LedColor::Green
                ]
            }
        );
        assert!(bad_message("lights colors=red,blue").contains("expected 5"));
        assert!(bad_message("lights color=purple").contains("unknown color"));
    }

    #[test]
    fn play_sound_sources() {
        assert_eq!(
            action("play-sound name=meow"),
            Action::PlaySound { source: SoundSource::Name("meow".into()) }
        );
        assert_eq!(
            action("play-sound file=\"my song.mp3\""),
            Action::PlaySound { source: SoundSource::File("my song.mp3".into()) }
        );
        assert_eq!(
            action("play-sound no_such_file_here.wav"),
            Action::PlaySound { source: SoundSource::Name("no_such_file_here.wav".into()) }
        );
        assert!(bad_message("play-sound").contains("name or file"));
    }

    #[test]
    fn play_sound_existing_path_is_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("beep.wav");
        std::fs::write(&p, b"RIFF").unwrap();
        let line = format!("play-sound \"{}\"", p.display());
        assert_eq!(action(&line), Action::PlaySound { source: SoundSource::File(p) });
    }

    #[test]
    fn enumerated_options() {
        assert_eq!(
            action("cliff enable=false reaction=stop"),
            Action::Cliff { enable: false, reaction: CliffReaction::Stop }
        );
        assert!(bad_message("cliff reaction=panic").contains("reaction"));
        assert_eq!(
            action("battery mode=voltage duration=2"),
            Action::Battery { mode: BatteryMode::Voltage, duration: 2.0 }
        );
        assert!(bad_message("battery mode=loud").contains("mode"));
    }

    #[test]
    fn numeric_arguments() {
        assert_eq!(action("volume 70000"), Action::Volume { level: 65535 });
        assert!(bad_message("volume loud").contains("integer"));
        assert_eq!(action("turn -90"), Action::Turn { degrees: -90.0 });
        assert!(bad_message("turn left").contains("angle"));
        assert_eq!(
            action("goto 200 100 angle=45"),
            Action::GoTo { x_mm: 200.0, y_mm: 100.0, angle_deg: 45.0 }
        );
    }

    #[test]
    fn offline_and_estimates() {
        assert!(action("list-sounds search=meow").is_offline());
        assert!(!action("status").is_offline());
        assert_eq!(
            action("list-anims search=bored"),
            Action::ListAnims { search: Some("bored".into()) }
        );
        assert_eq!(action("move 200 speed=100").estimate(), Some(Duration::from_secs(2)));
        assert_eq!(action("lights").estimate(), None);
    }

    #[test]
    fn every_command_has_a_handler() {
        for c in COMMANDS {
            let mut line = c.name.to_owned();
            for _ in c.args {
                line.push_str(" 1");
            }
            if c.name == "play-sound" {
                line.push_str(" name=x");
            }
            let prepared = prep(&line).unwrap_or_else(|e| panic!("{line}: {e:?}"));
            assert_eq!(prepared.action.name(), c.name);
            assert_eq!(prepared.policy.is_some(), c.is_async_capable());
        }
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_table();
        for c in COMMANDS {
            assert!(help.contains(c.name));
        }
        assert!(help.contains("[speed=100]"));
    }
}
