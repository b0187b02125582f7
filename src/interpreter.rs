use crate::command::{ExitCode, Launcher, LineReader, ReadOutcome};
use crate::dispatch::{Dispatcher, Route};
use crate::error::ShellError;
use crate::external::ForkExec;
use crate::interrupt::{InterruptContext, Interrupted};
use crate::lexer;
use std::io::Write;
use tracing::{debug, warn};

/// Prompt shown before every line.
pub const PROMPT: &str = "bsh> ";

/// Where the session is in its interrupt protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No cycle has armed the interrupt context yet.
    AwaitingRecoveryPoint,
    /// A cycle is reading or executing a command.
    PromptActive,
    /// The current cycle was abandoned by an interrupt.
    Restarting,
    /// End of input was reached.
    Exited,
}

enum Flow {
    Next,
    Exit,
}

enum Abort {
    Interrupted,
    Fatal(ShellError),
}

impl From<Interrupted> for Abort {
    fn from(_: Interrupted) -> Self {
        Abort::Interrupted
    }
}

/// One interactive shell session.
///
/// The session owns the line reader, the dispatcher, the launcher for
/// external programs and its interrupt context. Each prompt cycle arms the
/// context, reads a line, splits it, and either runs a built-in or launches
/// and waits for an external program. An interrupt observed at any checkpoint
/// abandons the cycle and the next prompt follows.
pub struct Shell {
    reader: Box<dyn LineReader>,
    dispatcher: Dispatcher,
    launcher: Box<dyn Launcher>,
    interrupts: InterruptContext,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
    state: SessionState,
}

impl Shell {
    /// Create a session reading from `reader` that launches with [`ForkExec`]
    /// and writes to the process's standard streams.
    pub fn new(reader: Box<dyn LineReader>, interrupts: InterruptContext) -> Self {
        Self {
            reader,
            dispatcher: Dispatcher::default(),
            launcher: Box::new(ForkExec::default()),
            interrupts,
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
            state: SessionState::AwaitingRecoveryPoint,
        }
    }

    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Redirect the shell's own output (newlines and error reports).
    pub fn with_output(mut self, stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run prompt cycles until end of input.
    ///
    /// Returns the exit status for the shell process (0), or the fatal error
    /// that ended the session.
    pub fn run(&mut self) -> Result<ExitCode, ShellError> {
        loop {
            match self.cycle() {
                Ok(Flow::Next) => {}
                Ok(Flow::Exit) => {
                    self.state = SessionState::Exited;
                    debug!("end of input");
                    return Ok(0);
                }
                Err(Abort::Interrupted) => {
                    self.state = SessionState::Restarting;
                    debug!("cycle interrupted, restarting");
                    self.newline();
                }
                Err(Abort::Fatal(err)) => return Err(err),
            }
        }
    }

    fn cycle(&mut self) -> Result<Flow, Abort> {
        self.interrupts.arm();
        self.state = SessionState::PromptActive;

        let line = match self.reader.read_line(PROMPT) {
            Ok(ReadOutcome::Line(line)) => line,
            Ok(ReadOutcome::Interrupted) => {
                if self.reader.ends_line() {
                    self.state = SessionState::Restarting;
                    return Ok(Flow::Next);
                }
                return Err(Abort::Interrupted);
            }
            Ok(ReadOutcome::Eof) => {
                self.end_of_input();
                return Ok(Flow::Exit);
            }
            Err(err) => {
                warn!("line reader failed: {:#}", err);
                self.report(&err);
                self.end_of_input();
                return Ok(Flow::Exit);
            }
        };
        self.interrupts.checkpoint()?;

        let command = lexer::tokenize(line);
        self.interrupts.checkpoint()?;
        let Some(program) = command.program() else {
            return Ok(Flow::Next);
        };
        debug!(program, argc = command.len(), "dispatching");

        match self.dispatcher.resolve(&command) {
            Route::Builtin(builtin) => match builtin.execute(&mut self.stderr) {
                Ok(code) => debug!(program, code, "builtin finished"),
                Err(err) => self.report(&err),
            },
            Route::External => {
                // The line editor may have put its own SIGINT handler in place.
                self.interrupts.reassert().map_err(Abort::Fatal)?;
                match self.launcher.launch(&command) {
                    Ok(outcome) => debug!(program, ?outcome, "external command finished"),
                    Err(err) if err.is_fatal() => return Err(Abort::Fatal(err)),
                    Err(err) => self.report(&err),
                }
            }
        }
        self.interrupts.checkpoint()?;

        Ok(Flow::Next)
    }

    fn end_of_input(&mut self) {
        if !self.reader.ends_line() {
            self.newline();
        }
    }

    fn newline(&mut self) {
        let _ = writeln!(self.stdout);
        let _ = self.stdout.flush();
    }

    fn report(&mut self, err: &dyn std::fmt::Display) {
        let _ = writeln!(self.stderr, "{}", err);
        let _ = self.stderr.flush();
    }
}
