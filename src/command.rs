use crate::error::ShellError;
use crate::external::ChildOutcome;
use anyhow::Result;
use std::ffi::CString;
use std::io::Write;
use std::ops::Range;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// One parsed input line: the raw buffer plus the byte spans of its arguments.
///
/// The first argument names the program or built-in. Indexing past the last
/// argument yields `None`, which plays the role of the terminator. A line made
/// only of delimiters produces an empty command that must not be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    line: String,
    spans: Vec<Range<usize>>,
}

impl Command {
    pub(crate) fn new(line: String, spans: Vec<Range<usize>>) -> Self {
        Self { line, spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Name of the program or built-in, `None` for an empty line.
    pub fn program(&self) -> Option<&str> {
        self.arg(0)
    }

    /// The argument at `index`, or `None` once past the end.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.spans.get(index).map(|span| &self.line[span.clone()])
    }

    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|span| &self.line[span.clone()])
    }

    /// Converts the arguments into the NUL-terminated strings `execvp` expects.
    pub fn to_argv(&self) -> Result<Vec<CString>, ShellError> {
        self.args()
            .map(|arg| {
                CString::new(arg).map_err(|_| ShellError::NulByte {
                    program: self.program().unwrap_or_default().to_string(),
                })
            })
            .collect()
    }
}

/// What the line reader produced for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// The operator interrupted the prompt (Ctrl-C in raw terminal mode).
    Interrupted,
    /// End of input (Ctrl-D or a closed stream).
    Eof,
}

/// Source of operator input.
pub trait LineReader {
    /// Shows `prompt` and blocks until a line, an interrupt or end of input.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;

    /// Whether the reader itself moves the cursor to a fresh line before
    /// reporting [`ReadOutcome::Interrupted`] or [`ReadOutcome::Eof`].
    fn ends_line(&self) -> bool {
        false
    }
}

/// Runs external commands and waits for them.
pub trait Launcher {
    /// Spawns `command` and blocks until the child exits or stops.
    fn launch(&mut self, command: &Command) -> Result<ChildOutcome, ShellError>;
}

/// Object-safe trait for a command that runs inside the shell process.
pub trait ExecutableCommand {
    /// Executes the command; failures are written to `stderr`.
    fn execute(self: Box<Self>, stderr: &mut dyn Write) -> Result<ExitCode>;
}

/// Factory that tries to create a built-in from a parsed command.
///
/// Returns `None` when the factory doesn't recognize the program name.
pub trait CommandFactory {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>>;
}
