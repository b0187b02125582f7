//! Interrupt handling for the prompt loop.
//!
//! The `SIGINT` handler never transfers control. It only records a request,
//! and only when the session has armed its context. The loop observes the
//! request at its checkpoints and abandons the current cycle. A blocking read
//! can also watch the context's wake pipe, which becomes readable as soon as
//! a request is recorded.

use crate::error::ShellError;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd;
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

/// Flags shared between the signal handler and the main loop.
#[derive(Debug)]
struct Flags {
    armed: AtomicBool,
    requested: AtomicBool,
    /// Raw write end of the wake pipe, -1 until the pipe exists.
    wake_fd: AtomicI32,
    wake: OnceLock<(File, OwnedFd)>,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            armed: AtomicBool::new(false),
            requested: AtomicBool::new(false),
            wake_fd: AtomicI32::new(-1),
            wake: OnceLock::new(),
        }
    }
}

impl Flags {
    /// Runs inside the signal handler: atomics and `write(2)` only.
    fn deliver(&self) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }
        self.requested.store(true, Ordering::SeqCst);
        let fd = self.wake_fd.load(Ordering::SeqCst);
        if fd >= 0 {
            let byte = 1u8;
            // SAFETY: one byte from a live local into a non-blocking pipe.
            unsafe { libc::write(fd, (&byte as *const u8).cast(), 1) };
        }
    }

    fn open_wake_pipe(&self) -> Result<(), ShellError> {
        if self.wake.get().is_some() {
            return Ok(());
        }
        let (read, write) =
            unistd::pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK).map_err(ShellError::Pipe)?;
        let raw = write.as_raw_fd();
        if self.wake.set((File::from(read), write)).is_ok() {
            self.wake_fd.store(raw, Ordering::SeqCst);
        }
        Ok(())
    }

    fn drain_wake(&self) {
        if let Some((read, _)) = self.wake.get() {
            let mut buf = [0u8; 64];
            let mut read = read;
            while matches!(read.read(&mut buf), Ok(n) if n > 0) {}
        }
    }
}

/// Flags the installed handler writes to. Set once, before the handler exists.
static PROCESS_FLAGS: OnceLock<Arc<Flags>> = OnceLock::new();

extern "C" fn handle_sigint(_signo: c_int) {
    if let Some(flags) = PROCESS_FLAGS.get() {
        flags.deliver();
    }
}

fn install_handler() -> Result<(), ShellError> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only touches atomics and writes to a pipe.
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map_err(ShellError::Signal)?;
    Ok(())
}

/// Marker returned by [`InterruptContext::checkpoint`] when the cycle must be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Cancellation context of one shell session.
///
/// Cloning yields another handle to the same flags.
#[derive(Debug, Clone, Default)]
pub struct InterruptContext {
    flags: Arc<Flags>,
    installed: bool,
}

impl InterruptContext {
    /// Install the process `SIGINT` handler and return the context it feeds.
    ///
    /// Line editors may install their own `SIGINT` handler when they are
    /// created, so call this after the reader exists. Calling it again
    /// returns a handle to the same flags.
    pub fn install() -> Result<Self, ShellError> {
        let flags = PROCESS_FLAGS.get_or_init(Arc::default).clone();
        flags.open_wake_pipe()?;
        install_handler()?;
        tracing::debug!("SIGINT handler installed");
        Ok(Self {
            flags,
            installed: true,
        })
    }

    /// A context not connected to any signal; interrupts arrive through [`Self::interrupt`].
    pub fn detached() -> Self {
        Self::default()
    }

    /// Give the context a wake pipe so blocking reads can watch for interrupts.
    pub fn with_wake_pipe(self) -> Result<Self, ShellError> {
        self.flags.open_wake_pipe()?;
        Ok(self)
    }

    /// Put the shell's handler back in case something replaced it.
    ///
    /// Does nothing for a detached context.
    pub fn reassert(&self) -> Result<(), ShellError> {
        if self.installed {
            install_handler()?;
        }
        Ok(())
    }

    /// Establish a fresh recovery point for the cycle that is about to start.
    ///
    /// Any request left over from the previous cycle is dropped.
    pub fn arm(&self) {
        self.flags.requested.store(false, Ordering::SeqCst);
        self.flags.drain_wake();
        self.flags.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.flags.armed.load(Ordering::SeqCst)
    }

    /// Whether an interrupt is pending, without consuming it.
    pub fn is_requested(&self) -> bool {
        self.flags.requested.load(Ordering::SeqCst)
    }

    /// Read end of the wake pipe, readable once an interrupt is pending.
    pub fn wake_fd(&self) -> Option<BorrowedFd<'_>> {
        self.flags.wake.get().map(|(read, _)| read.as_fd())
    }

    /// Deliver an interrupt through the same path the signal handler takes.
    pub fn interrupt(&self) {
        self.flags.deliver();
    }

    /// Consume a pending interrupt request.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.flags.requested.swap(false, Ordering::SeqCst) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Put `SIGINT` back to its default disposition.
///
/// Called in a freshly forked child so the external program is interrupted
/// the ordinary way. Builds the action on the stack and calls `sigaction`.
pub fn restore_default() -> nix::Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: installing the default disposition has no handler to reason about.
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::Readline;
    use crate::test_support::lock_signals;
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

    fn wake_readable(ctx: &InterruptContext) -> bool {
        let Some(fd) = ctx.wake_fd() else {
            return false;
        };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        poll(&mut fds, PollTimeout::ZERO).unwrap() > 0
    }

    #[test]
    fn interrupt_before_arming_is_ignored() {
        let ctx = InterruptContext::detached().with_wake_pipe().unwrap();
        assert!(!ctx.is_armed());
        ctx.interrupt();
        assert_eq!(ctx.checkpoint(), Ok(()));
        assert!(!wake_readable(&ctx));

        ctx.arm();
        assert_eq!(ctx.checkpoint(), Ok(()));
    }

    #[test]
    fn armed_interrupt_is_observed_once() {
        let ctx = InterruptContext::detached();
        ctx.arm();
        ctx.interrupt();
        assert!(ctx.is_requested());
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
        assert_eq!(ctx.checkpoint(), Ok(()));
        assert!(ctx.is_armed());
    }

    #[test]
    fn arming_drops_stale_requests_and_wakeups() {
        let ctx = InterruptContext::detached().with_wake_pipe().unwrap();
        ctx.arm();
        ctx.interrupt();
        assert!(wake_readable(&ctx));
        ctx.arm();
        assert_eq!(ctx.checkpoint(), Ok(()));
        assert!(!wake_readable(&ctx));
    }

    #[test]
    fn clones_share_flags() {
        let ctx = InterruptContext::detached();
        let handle = ctx.clone();
        ctx.arm();
        handle.interrupt();
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
    }

    #[test]
    fn installed_handler_records_raised_sigint() {
        let _lock = lock_signals();
        let ctx = InterruptContext::install().expect("install handler");
        ctx.arm();
        signal::raise(Signal::SIGINT).expect("raise SIGINT");
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
        assert!(wake_readable(&ctx));

        let again = InterruptContext::install().expect("reinstall handler");
        again.interrupt();
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
    }

    #[test]
    fn handler_installed_after_line_editor_receives_sigint() {
        let _lock = lock_signals();
        let _reader = Readline::new(false).expect("create line editor");
        let ctx = InterruptContext::install().expect("install handler");
        ctx.arm();
        signal::raise(Signal::SIGINT).expect("raise SIGINT");
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
    }

    #[test]
    fn reassert_restores_a_replaced_handler() {
        let _lock = lock_signals();
        let ctx = InterruptContext::install().expect("install handler");
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        unsafe { signal::sigaction(Signal::SIGINT, &ignore) }.unwrap();

        ctx.reassert().expect("reassert handler");
        ctx.arm();
        signal::raise(Signal::SIGINT).expect("raise SIGINT");
        assert_eq!(ctx.checkpoint(), Err(Interrupted));
    }
}
