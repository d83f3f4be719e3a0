//! End-to-end behaviour of scripts run through the public `Runner`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cozmo::actuator::{Actuator, CompletionMode, SimulatedActuator};
use cozmo::command::{Action, LedColor};
use cozmo::config::Config;
use cozmo::error::ScriptError;
use cozmo::runner::{RunResult, Runner};
use tempfile::TempDir;
use tokio::time::Instant;

fn runner() -> Runner<SimulatedActuator> {
    Runner::new(Config::default(), SimulatedActuator::with_mode(CompletionMode::Instant))
}

fn lines(src: &str) -> Vec<String> {
    src.lines().map(str::to_owned).collect()
}

/// Text of every `say` the actuator performed.
fn said(r: &Runner<SimulatedActuator>) -> Vec<String> {
    r.actuator()
        .transcript()
        .iter()
        .filter_map(|a| match a {
            Action::Say { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

async fn run(src: &str) -> (RunResult, Runner<SimulatedActuator>) {
    let mut r = runner();
    let res = r.run_lines(&lines(src)).await;
    (res, r)
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, body).unwrap();
    path
}

// ── Loops ─────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn range_iterations_follow_the_arithmetic_sequence() {
    for (a, b, s) in [(1i64, 10i64, 3i64), (0, 0, 1), (5, -5, -2), (2, 20, 6), (-3, 3, 1)] {
        let (res, r) = run(&format!("for v in {a}..{b} step {s}\nsay $v\nendfor")).await;
        assert!(res.is_success(), "{a}..{b} step {s}: {:?}", res.error);
        let expected: Vec<String> = (0..=((b - a) / s)).map(|k| (a + k * s).to_string()).collect();
        assert_eq!(said(&r), expected, "{a}..{b} step {s}");
        assert_eq!(said(&r).len() as i64, (b - a) / s + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn range_without_step_infers_direction() {
    let (_, r) = run("for v in 3..1\nsay $v\nendfor").await;
    assert_eq!(said(&r), vec!["3", "2", "1"]);
}

#[tokio::test(start_paused = true)]
async fn while_countdown_runs_five_times() {
    let src = "set count 5\nwhile $count > 0\nsay $count\nset count $count-1\nendwhile\nsay done";
    let (res, r) = run(src).await;
    assert!(res.is_success());
    assert_eq!(said(&r), vec!["5", "4", "3", "2", "1", "done"]);
}

#[tokio::test(start_paused = true)]
async fn loop_ceiling_stops_at_iteration_1001() {
    let (res, r) = run("for i in 1..2000\nsay $i\nendfor").await;
    assert_eq!(res.exit_code, 3);
    match res.error {
        Some(ScriptError::IterationLimit { at, limit }) => {
            assert_eq!(limit, 1000);
            assert_eq!(at.line, 1);
        }
        other => panic!("expected iteration limit, got {other:?}"),
    }
    let s = said(&r);
    assert_eq!(s.len(), 1000);
    assert_eq!(s.first().map(String::as_str), Some("1"));
    assert_eq!(s.last().map(String::as_str), Some("1000"));
}

#[tokio::test(start_paused = true)]
async fn loop_ceiling_is_configurable() {
    let config = Config { iteration_limit: 3, ..Config::default() };
    let mut r = Runner::new(config, SimulatedActuator::with_mode(CompletionMode::Instant));
    let res = r.run_lines(&lines("for c in a b c d\nsay $c\nendfor")).await;
    assert_eq!(res.exit_code, 3);
    assert_eq!(said(&r), vec!["a", "b", "c"]);
}

// ── Conditionals ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn if_else_runs_exactly_one_branch() {
    for (x, branch) in [("7", "big"), ("3", "small"), ("5", "small")] {
        let src = format!("set x {x}\nif $x > 5\nsay big\nlights color=red\nelse\nsay small\nendif");
        let (res, r) = run(&src).await;
        assert!(res.is_success());
        assert_eq!(said(&r), vec![branch]);
        let lights = r.actuator().names().iter().filter(|n| **n == "lights").count();
        assert_eq!(lights, usize::from(branch == "big"));
    }
}

#[tokio::test(start_paused = true)]
async fn string_comparison_fallback() {
    let (_, r) = run("set who cozmo\nif $who == cozmo\nsay yes\nendif\nif $who < 5\nsay no\nendif").await;
    assert_eq!(said(&r), vec!["yes"]);
}

// ── Subroutines ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn call_dispatches_body_in_order_then_returns() {
    let src = "def greet\nsay Hello!\nlights color=blue\nenddef\nsay first\ncall greet\nsay after";
    let (res, r) = run(src).await;
    assert!(res.is_success());
    assert_eq!(r.actuator().names(), vec!["say", "say", "lights", "say"]);
    assert_eq!(said(&r), vec!["first", "Hello!", "after"]);
    assert_eq!(r.actuator().transcript()[2], Action::Lights { colors: vec![LedColor::Blue] });
}

#[tokio::test(start_paused = true)]
async fn call_binds_positional_arguments() {
    let src = "def announce\nsay [$1|$2] $# args\nenddef\ncall announce Important message";
    let (res, r) = run(src).await;
    assert!(res.is_success());
    assert_eq!(said(&r), vec!["[Important|message] 2 args"]);
}

#[tokio::test(start_paused = true)]
async fn runaway_recursion_hits_call_depth() {
    let config = Config { call_depth_limit: 5, ..Config::default() };
    let mut r = Runner::new(config, SimulatedActuator::with_mode(CompletionMode::Instant));
    let res = r.run_lines(&lines("def f\nsay in\ncall f\nenddef\ncall f")).await;
    assert_eq!(res.exit_code, 3);
    assert!(matches!(res.error, Some(ScriptError::CallDepth { limit: 5, .. })));
    assert_eq!(said(&r).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn unknown_subroutine_is_rejected_before_running() {
    let (res, r) = run("say hi\ncall missing").await;
    assert_eq!(res.exit_code, 2);
    assert!(matches!(res.error, Some(ScriptError::UnknownSubroutine { ref name, .. }) if name == "missing"));
    assert_eq!(r.dispatched(), 0);
}

// ── Variables ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn set_then_say_round_trip() {
    let (res, r) = run("set x 3\nsay $x").await;
    assert!(res.is_success());
    assert_eq!(r.actuator().names(), vec!["say"]);
    assert_eq!(said(&r), vec!["3"]);
}

#[tokio::test(start_paused = true)]
async fn unset_variables_expand_to_nothing() {
    let (res, r) = run("say [$nobody]").await;
    assert!(res.is_success());
    assert_eq!(said(&r), vec!["[]"]);
}

// ── Includes ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn includes_are_spliced_in_place() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "parts/common file.txt", "# shared\nsay middle\ninclude leaf.txt\n");
    write(dir.path(), "parts/leaf.txt", "say leaf\n");
    let root = write(dir.path(), "main.txt", "say start\ninclude \"parts/common file.txt\"\nsay end\n");

    let mut r = runner();
    let res = r.load_and_run(&root).await;
    assert!(res.is_success(), "{:?}", res.error);
    assert_eq!(said(&r), vec!["start", "middle", "leaf", "end"]);
}

#[tokio::test(start_paused = true)]
async fn circular_include_dispatches_nothing() {
    let dir = TempDir::new().unwrap();
    let root = write(dir.path(), "root.txt", "say before\ninclude \"a.txt\"\nsay after\n");
    write(dir.path(), "a.txt", "include \"root.txt\"\n");

    let mut r = runner();
    let res = r.load_and_run(&root).await;
    assert_eq!(res.exit_code, 2);
    match &res.error {
        Some(ScriptError::CircularInclude { at, chain }) => {
            assert!(at.file().ends_with("a.txt"));
            assert_eq!(chain.len(), 3);
            assert!(chain[0].ends_with("root.txt") && chain[2].ends_with("root.txt"));
        }
        other => panic!("expected circular include, got {other:?}"),
    }
    assert_eq!(r.dispatched(), 0);
    assert!(r.actuator().transcript().is_empty());
    assert_eq!(r.actuator().connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_include_names_the_line() {
    let dir = TempDir::new().unwrap();
    let root = write(dir.path(), "root.txt", "say a\n\ninclude nowhere.txt\n");
    let mut r = runner();
    let res = r.load_and_run(&root).await;
    assert_eq!(res.exit_code, 2);
    let err = res.error.unwrap();
    assert!(matches!(err, ScriptError::MissingInclude { .. }));
    assert!(err.to_string().contains("root.txt:3"), "{err}");
    assert_eq!(r.dispatched(), 0);
}

#[tokio::test(start_paused = true)]
async fn errors_in_included_files_keep_their_position() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "inc.txt", "say ok\n\nmove fast\n");
    let root = write(dir.path(), "root.txt", "include inc.txt\n");
    let mut r = runner();
    let res = r.load_and_run(&root).await;
    let err = res.error.unwrap();
    let at = err.pos().unwrap();
    assert!(at.file().ends_with("inc.txt"));
    assert_eq!(at.line, 3);
}

// ── Fail-fast behaviour ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn structural_errors_prevent_any_dispatch() {
    for src in ["say hi\nendwhile", "say hi\nfor i in 1..3", "say hi\ndance", "say hi\nmove", "say hi\nfor i in 1..x\nendfor", "say hi\nset x 1\nfly $x"] {
        let (res, r) = run(src).await;
        assert_eq!(res.exit_code, 2, "{src:?}");
        assert_eq!(r.dispatched(), 0, "{src:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn dispatch_failure_halts_the_run() {
    let mut r = Runner::new(
        Config::default(),
        SimulatedActuator::with_mode(CompletionMode::Instant).fail_on("turn", "wheel jammed"),
    );
    let res = r.run_lines(&lines("say a\nturn 90\nsay b")).await;
    assert_eq!(res.exit_code, 4);
    assert_eq!(res.error.unwrap().to_string(), "<command-line>:2: turn failed: wheel jammed");
    assert_eq!(said(&r), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn connection_failure_is_a_dispatch_error() {
    let mut r = Runner::new(Config::default(), SimulatedActuator::new().fail_connect("no robot found"));
    let res = r.run_lines(&lines("list-anims\nsay hi")).await;
    assert_eq!(res.exit_code, 4);
    assert_eq!(r.actuator().names(), vec!["list-anims"]);
}

// ── Timing ────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn sync_commands_wait_for_completion_and_sleep_blocks() {
    let mut r = Runner::new(Config::default(), SimulatedActuator::new());
    let start = Instant::now();
    let res = r.run_lines(&lines("move 100 speed=50\nsleep 1.5\nturn 90")).await;
    assert!(res.is_success());
    // move: 2s, sleep: 1.5s, turn: 1s
    assert_eq!(start.elapsed(), Duration::from_millis(4500));
}

#[tokio::test(start_paused = true)]
async fn async_commands_overlap_and_are_awaited_at_the_end() {
    let mut r = Runner::new(Config::default(), SimulatedActuator::new());
    let start = Instant::now();
    let res = r
        .run_lines(&lines("turn 360 async=true\nlift 1 duration=3 async=true\nlights color=green"))
        .await;
    assert!(res.is_success());
    assert_eq!(res.tasks.completed, 2);
    assert_eq!(res.tasks.abandoned, 0);
    // Both run concurrently; shutdown waits for the longer one (4s turn).
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert!(!r.actuator().is_connected());
}
