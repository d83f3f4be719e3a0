//! Cozmo command-script interpreter.
//!
//! Scripts are loaded and flattened ([`script::loader`]), compiled into a
//! [`script::Program`], and executed by the [`script::Interpreter`], which
//! hands device commands to a [`dispatch::Dispatcher`] in front of an
//! [`actuator::Actuator`].  [`runner::Runner`] ties the phases together.

pub mod actuator;
pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod runner;
pub mod script;
pub mod tasks;
