use crate::command::{Command, Launcher};
use crate::error::ShellError;
use crate::interrupt;
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::c_char;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::ptr;
use tracing::{debug, trace};

/// How a waited-for child changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    Exited(i32),
    Signaled(Signal),
    Stopped(Signal),
}

/// Launches external programs with `fork`, `execvp` and `waitpid`.
///
/// One child at a time: [`Launcher::launch`] returns only after the child has
/// exited, been killed, or stopped.
#[derive(Debug, Default)]
pub struct ForkExec {
    /// Installed as the child's standard error when set.
    stderr: Option<OwnedFd>,
}

impl ForkExec {
    /// A launcher whose children write their standard error to `fd`.
    pub fn with_stderr(fd: OwnedFd) -> Self {
        Self { stderr: Some(fd) }
    }
}

impl Launcher for ForkExec {
    fn launch(&mut self, command: &Command) -> Result<ChildOutcome, ShellError> {
        let argv = command.to_argv()?;
        let Some(program) = argv.first() else {
            return Ok(ChildOutcome::Exited(0));
        };
        // Everything the child touches is built here: it must not allocate.
        let mut arg_ptrs: Vec<*const c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
        arg_ptrs.push(ptr::null());
        let mut failure_prefix = program.as_bytes().to_vec();
        failure_prefix.extend_from_slice(b": ");
        let stderr_fd = self.stderr.as_ref().map(AsRawFd::as_raw_fd);

        // SAFETY: the child branch only calls dup2, sigaction, execvp, write
        // and _exit, all async-signal-safe, on memory prepared above.
        match unsafe { unistd::fork() } {
            Err(errno) => Err(ShellError::Fork(errno)),
            Ok(ForkResult::Child) => unsafe { exec_child(&arg_ptrs, &failure_prefix, stderr_fd) },
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = %child, program = ?program, "spawned child");
                let outcome = wait_for(child)?;
                debug!(pid = %child, ?outcome, "child changed state");
                Ok(outcome)
            }
        }
    }
}

/// Replace the child's image with the program in `argv`, or report why not and exit.
///
/// # Safety
///
/// Must only run in a freshly forked child. `argv` must be a null-terminated
/// array of pointers to nul-terminated strings that outlive the call.
unsafe fn exec_child(argv: &[*const c_char], failure_prefix: &[u8], stderr: Option<RawFd>) -> ! {
    unsafe {
        if let Some(fd) = stderr {
            libc::dup2(fd, libc::STDERR_FILENO);
        }
        let _ = interrupt::restore_default();

        libc::execvp(argv[0], argv.as_ptr());

        let reason = Errno::last().desc().as_bytes();
        for part in [failure_prefix, reason, &b"\n"[..]] {
            libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len());
        }
        libc::_exit(1)
    }
}

/// Block until `child` exits or stops. Interrupted waits are resumed.
fn wait_for(child: Pid) -> Result<ChildOutcome, ShellError> {
    loop {
        match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ChildOutcome::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ChildOutcome::Signaled(signal)),
            Ok(WaitStatus::Stopped(_, signal)) => return Ok(ChildOutcome::Stopped(signal)),
            Ok(status) => trace!(?status, "ignoring wait status"),
            Err(Errno::EINTR) => trace!("wait interrupted, resuming"),
            Err(errno) => return Err(ShellError::Wait(errno)),
        }
    }
}
