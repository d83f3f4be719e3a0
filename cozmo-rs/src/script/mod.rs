//! Command-script language.
//!
//! A script is a line-oriented list of device commands plus a handful of
//! engine keywords:
//!
//! - Variable substitution (`$name`, `${name}`, `$1`, `$#`, `$*`, `$$`)
//! - Integer/float arithmetic and single comparisons
//! - `set`, `sleep`, `include`
//! - Control flow: `for` … `endfor` (ranges and word lists),
//!   `while` … `endwhile`, `if` … `else` … `endif`
//! - Subroutines: `def` … `enddef`, invoked with `call name args…`
//!
//! Loading happens in two phases: [`loader`] flattens includes into one line
//! list, then [`Program::compile`] classifies every line and matches blocks.
//! The [`Interpreter`] executes the result.
//!
//! # Quick start
//!
//! ```rust
//! use cozmo::script::{Interpreter, Program};
//! use cozmo::script::loader::load_lines;
//!
//! let src = vec!["set x 6".to_string(), "set y $x*7".to_string()];
//! let lines = load_lines("<command-line>", &src).unwrap();
//! let prog = Program::compile(lines).unwrap();
//! assert_eq!(prog.len(), 2);
//! let _interp = Interpreter::default();
//! ```

pub mod expand;
pub mod expr;
pub mod interp;
pub mod lexer;
pub mod loader;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use interp::{Interpreter, Limits};
pub use stmt::Program;
pub use value::Value;
