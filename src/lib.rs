//! A small interactive command shell.
//!
//! The crate implements the command execution core of `bsh`: it reads a line,
//! splits it into arguments, runs the `cd` built-in in-process or forks and
//! executes an external program, and waits for it before prompting again.
//! An interrupt (`SIGINT`) abandons the current prompt cycle without
//! terminating the shell.
//!
//! The main entry point is [`Shell`], which owns one interactive session. The
//! public modules [`command`], [`interrupt`] and [`io_adapters`] expose the
//! seams used to plug in other line readers, launchers and built-ins.

mod builtin;
pub mod command;
pub mod config;
mod dispatch;
pub mod error;
pub mod external;
pub mod interrupt;
mod interpreter;
pub mod io_adapters;
pub mod lexer;

pub use config::Config;
pub use dispatch::{Dispatcher, Route};
pub use error::ShellError;
/// Just a convenient re-export of the interactive session.
///
/// See [`Shell`] for the high-level API.
pub use interpreter::{SessionState, Shell, PROMPT};
