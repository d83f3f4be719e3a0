//! Run the `cozmo` binary and check exit codes and diagnostics.
//!
//! Scripts here stick to commands without a device-side duration so the
//! simulated robot never makes the binary wait in real time.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `cozmo` binary built by this Cargo workspace.
fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cozmo"))
}

/// Run the binary with `args`, isolated from the user's config and log filter.
fn run(args: &[&str], config: Option<&Path>) -> Output {
    let mut cmd = Command::new(binary());
    cmd.args(args).env_remove("RUST_LOG");
    match config {
        Some(path) => cmd.env("COZMO_CONFIG", path),
        None => cmd.env("COZMO_CONFIG", "/nonexistent/cozmo.conf"),
    };
    cmd.output().unwrap_or_else(|e| panic!("cannot run {}: {e}", binary().display()))
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("script.txt");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    let out = run(&["-h"], None);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for name in ["say", "anim-group", "play-sound", "list-sounds", "battery"] {
        assert!(text.contains(name), "help is missing {name}:\n{text}");
    }
    for syntax in ["include", "endfor", "endwhile", "enddef", "async=true"] {
        assert!(text.contains(syntax), "help is missing {syntax}:\n{text}");
    }
}

#[test]
fn inline_command_succeeds_and_logs_dispatch() {
    let out = run(&["lights", "color=green"], None);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    assert!(stderr(&out).contains(">>> lights color=green"));
}

#[test]
fn each_quoted_argument_is_a_command() {
    let out = run(&["lights color=red", "ir enable=false", "lights color=off"], None);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    let log = stderr(&out);
    let red = log.find(">>> lights color=red").expect("first command logged");
    let ir = log.find(">>> ir enable=false").expect("second command logged");
    let off = log.find(">>> lights color=off").expect("third command logged");
    assert!(red < ir && ir < off, "{log}");
}

#[test]
fn unknown_command_exits_2() {
    let out = run(&["fly", "away"], None);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("unknown command 'fly'"));
}

#[test]
fn missing_script_exits_1() {
    let out = run(&["-s", "/no/such/script.txt"], None);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn bad_usage_exits_2() {
    let out = run(&["-z"], None);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("Usage"));
}

#[test]
fn script_file_runs_to_completion() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "# colours\nfor c in red green blue\nlights color=$c\nendfor\n");
    let out = run(&["-s", path.to_str().unwrap()], None);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
    let log = stderr(&out);
    assert!(log.contains(">>> lights color=red"));
    assert!(log.contains(">>> lights color=blue"));
}

#[test]
fn config_limits_apply_and_safety_exits_3() {
    let dir = TempDir::new().unwrap();
    let conf = dir.path().join("cozmo.conf");
    std::fs::write(&conf, "iteration_limit = 2\nbogus = 1\n").unwrap();
    let path = script(&dir, "for i in 1..3\nlights color=red\nendfor\n");

    let out = run(&["-s", path.to_str().unwrap()], Some(&conf));
    assert_eq!(out.status.code(), Some(3));
    let log = stderr(&out);
    assert!(log.contains("unknown setting 'bogus'"), "{log}");
    assert!(log.contains("loop exceeded 2 iterations"), "{log}");

    // An explicit -c wins over the environment.
    let other = dir.path().join("other.conf");
    std::fs::write(&other, "iteration_limit = 5\n").unwrap();
    let out = run(&["-c", other.to_str().unwrap(), "-s", path.to_str().unwrap()], Some(&conf));
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
}
