use proptest::prelude::*;

use cozmo::script::expand::expand;
use cozmo::script::expr::{eval_condition, EvalContext};
use cozmo::script::lexer::{parse_invocation, split_tagged, split_words};
use cozmo::script::loader::{load_lines, COMMAND_LINE_SOURCE};
use cozmo::script::{Interpreter, Limits, Program, Value};

struct Vars(Vec<String>);

impl EvalContext for Vars {
    fn get_var(&self, name: &str) -> Option<Value> {
        (name == "x").then(|| Value::Int(42))
    }

    fn positional_params(&self) -> &[String] {
        &self.0
    }
}

/// Run a script through `Program::compile` and report what it said.
fn said(src: &str) -> Vec<String> {
    use cozmo::actuator::{CompletionMode, SimulatedActuator};
    use cozmo::command::Action;
    use cozmo::dispatch::Dispatcher;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    rt.block_on(async {
        let lines: Vec<String> = src.lines().map(str::to_owned).collect();
        let prog = Program::compile(load_lines(COMMAND_LINE_SOURCE, &lines).unwrap()).unwrap();
        let mut d = Dispatcher::new(SimulatedActuator::with_mode(CompletionMode::Instant));
        let mut interp = Interpreter::new(Limits { iterations: 10_000, call_depth: 8 });
        interp.run(&prog, &mut d).await.unwrap();
        d.actuator()
            .transcript()
            .iter()
            .filter_map(|a| match a {
                Action::Say { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A range loop visits start, start+step, … up to end, inclusive.
    #[test]
    fn range_iteration_count(a in -50i64..50, len in 0i64..60, s in 1i64..7, down in any::<bool>()) {
        let (b, s) = if down { (a - len, -s) } else { (a + len, s) };
        let out = said(&format!("for v in {a}..{b} step {s}\nsay $v\nendfor"));
        let expected: Vec<String> = (0..=(b - a) / s).map(|k| (a + k * s).to_string()).collect();
        prop_assert_eq!(out.len() as i64, (b - a) / s + 1);
        prop_assert_eq!(out, expected);
    }

    /// A step whose sign disagrees with the range runs zero times.
    #[test]
    fn range_with_opposing_step_is_empty(a in -50i64..50, len in 1i64..60, s in 1i64..7) {
        let out = said(&format!("for v in {a}..{} step -{s}\nsay $v\nendfor", a + len));
        prop_assert!(out.is_empty());
    }
}

proptest! {
    /// The tokenizer never panics and never yields an empty command name.
    #[test]
    fn tokenizer_does_not_panic(s in "\\PC*") {
        let _ = split_tagged(&s);
        let _ = split_words(&s);
        if let Some(inv) = parse_invocation(&s) {
            prop_assert!(!inv.name.is_empty() || s.contains('"'));
        }
    }

    /// Expansion never panics, and text without `$` is left alone.
    #[test]
    fn expander_does_not_panic(s in "\\PC*") {
        let ctx = Vars(vec!["one".into(), "two".into()]);
        let out = expand(&s, &ctx);
        if !s.contains('$') {
            prop_assert_eq!(out, s);
        }
    }

    /// Conditions always evaluate to some boolean.
    #[test]
    fn conditions_do_not_panic(s in "[ -~]{0,40}") {
        let ctx = Vars(Vec::new());
        let _ = eval_condition(&s, &ctx);
    }

    /// Plain words survive tokenization unchanged.
    #[test]
    fn plain_words_round_trip(words in prop::collection::vec("[A-Za-z0-9_.,!-]{1,12}", 0..8)) {
        let line = words.join(" ");
        prop_assert_eq!(split_words(&line), words);
    }
}
