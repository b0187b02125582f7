use nix::errno::Errno;
use rustyline::error::ReadlineError;
use std::fmt;

/// Failures the shell reports to the operator.
///
/// Every variant renders as `name: reason`, where the reason is the OS
/// description of the error number. Only [`ShellError::is_fatal`] variants end
/// the session; everything else is reported and the next prompt follows.
#[derive(Debug)]
pub enum ShellError {
    /// `fork` failed; the shell cannot run external programs any more.
    Fork(Errno),
    /// The `SIGINT` handler could not be installed.
    Signal(Errno),
    /// The interrupt wake pipe could not be created.
    Pipe(Errno),
    /// The `cd` built-in could not change to `path`.
    ChangeDir { path: Option<String>, errno: Errno },
    /// An argument of `program` holds an interior nul byte and cannot be passed to `execvp`.
    NulByte { program: String },
    /// Waiting for the child failed for a reason other than `EINTR`.
    Wait(Errno),
    /// The line reader failed for a reason other than end of input or interrupt.
    Readline(ReadlineError),
}

impl ShellError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShellError::Fork(_) | ShellError::Signal(_) | ShellError::Pipe(_)
        )
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShellError::Fork(errno) => write!(f, "fork failed: {}", errno.desc()),
            ShellError::Signal(errno) => write!(f, "sigaction: {}", errno.desc()),
            ShellError::Pipe(errno) => write!(f, "pipe: {}", errno.desc()),
            ShellError::ChangeDir {
                path: Some(path),
                errno,
            } => write!(f, "{}: {}", path, errno.desc()),
            ShellError::ChangeDir { path: None, errno } => write!(f, "{}", errno.desc()),
            ShellError::NulByte { program } => {
                write!(f, "{}: argument contains a nul byte", program)
            }
            ShellError::Wait(errno) => write!(f, "waitpid: {}", errno.desc()),
            ShellError::Readline(err) => write!(f, "bsh: {}", err),
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShellError::Readline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReadlineError> for ShellError {
    fn from(err: ReadlineError) -> Self {
        ShellError::Readline(err)
    }
}
