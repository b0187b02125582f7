use crate::command::{LineReader, ReadOutcome};
use crate::error::ShellError;
use crate::interrupt::InterruptContext;
use anyhow::Result;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, IsTerminal, Read, Result as IoResult, Write};
use std::os::fd::AsFd;
use std::rc::Rc;

/// Interactive line reader backed by `rustyline`.
///
/// On a terminal, rustyline puts the cursor on a fresh line itself when the
/// operator presses Ctrl-C or Ctrl-D, and reports Ctrl-C as an interrupt
/// because the terminal is in raw mode.
pub struct Readline {
    editor: DefaultEditor,
    history: bool,
    terminal: bool,
}

impl Readline {
    pub fn new(history: bool) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new().map_err(ShellError::from)?,
            history,
            terminal: std::io::stdin().is_terminal(),
        })
    }
}

impl LineReader for Readline {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if self.history && !line.trim().is_empty() {
                    self.editor
                        .add_history_entry(line.as_str())
                        .map_err(ShellError::from)?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(ShellError::from(err).into()),
        }
    }

    fn ends_line(&self) -> bool {
        self.terminal
    }
}

/// Line reader for input that is not a terminal.
///
/// Waits on the input and on the interrupt context's wake pipe together, so
/// an interrupt abandons a read that is still waiting for its line instead of
/// swallowing the line that arrives next.
pub struct FdLines {
    input: File,
    interrupts: InterruptContext,
    prompt_out: Box<dyn Write>,
    pending: Vec<u8>,
    eof: bool,
}

impl FdLines {
    /// Read from a duplicate of standard input, prompting on standard output.
    pub fn stdin(interrupts: InterruptContext) -> Result<Self> {
        let input = std::io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::new(
            File::from(input),
            interrupts,
            Box::new(std::io::stdout()),
        ))
    }

    pub fn new(input: File, interrupts: InterruptContext, prompt_out: Box<dyn Write>) -> Self {
        Self {
            input,
            interrupts,
            prompt_out,
            pending: Vec::new(),
            eof: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Block until input is readable or an interrupt is pending.
    /// Returns `false` for an interrupt.
    fn wait_readable(&self) -> Result<bool> {
        let input = self.input.as_fd();
        let mut fds = vec![PollFd::new(input, PollFlags::POLLIN)];
        if let Some(wake) = self.interrupts.wake_fd() {
            fds.push(PollFd::new(wake, PollFlags::POLLIN));
        }
        loop {
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => break,
                Err(Errno::EINTR) if self.interrupts.is_requested() => return Ok(false),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(std::io::Error::from(errno).into()),
            }
        }
        let woken = fds
            .get(1)
            .and_then(|fd| fd.revents())
            .is_some_and(|r| r.contains(PollFlags::POLLIN));
        Ok(!woken)
    }

    fn fill(&mut self) -> Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl LineReader for FdLines {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(ReadOutcome::Line(line));
            }
            if self.eof {
                if self.pending.is_empty() {
                    return Ok(ReadOutcome::Eof);
                }
                let rest = std::mem::take(&mut self.pending);
                return Ok(ReadOutcome::Line(String::from_utf8_lossy(&rest).into_owned()));
            }
            if !self.wait_readable()? {
                self.pending.clear();
                return Ok(ReadOutcome::Interrupted);
            }
            self.fill()?;
        }
    }
}

/// Memory-backed line reader that replays prepared outcomes.
///
/// Once the script runs out it reports end of input. Prompts are recorded so
/// callers can count how many times the shell asked for input.
pub struct MemLines {
    script: VecDeque<ReadOutcome>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl MemLines {
    /// A reader yielding each of `lines` in order, then end of input.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_outcomes(lines.into_iter().map(|l| ReadOutcome::Line(l.into())))
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ReadOutcome>) -> Self {
        Self {
            script: outcomes.into_iter().collect(),
            prompts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Return the shared list of prompts shown so far.
    pub fn prompts(&self) -> Rc<RefCell<Vec<String>>> {
        self.prompts.clone()
    }
}

impl LineReader for MemLines {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.script.pop_front().unwrap_or(ReadOutcome::Eof))
    }
}

/// Writer that collects everything into a buffer shared with the caller.
#[derive(Default)]
pub struct MemWriter {
    sink: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// A fresh writer plus the handle its output can be read back through.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let writer = Self::default();
        let handle = Rc::clone(&writer.sink);
        (writer, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.sink.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::fcntl::OFlag;
    use nix::unistd::pipe2;

    fn pipe_reader(interrupts: InterruptContext) -> (FdLines, File, Rc<RefCell<Vec<u8>>>) {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).unwrap();
        let (prompt_out, prompts) = MemWriter::with_handle();
        let reader = FdLines::new(File::from(read), interrupts, Box::new(prompt_out));
        (reader, File::from(write), prompts)
    }

    #[test]
    fn mem_lines_replays_then_reports_eof() {
        let mut reader = MemLines::new(["ls", "cd /"]);
        let prompts = reader.prompts();

        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("ls".into()));
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("cd /".into()));
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Eof);
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Eof);
        assert_eq!(prompts.borrow().len(), 4);
        assert!(!reader.ends_line());
    }

    #[test]
    fn mem_writer_shares_buffer() {
        let (mut writer, handle) = MemWriter::with_handle();
        write!(writer, "bsh").unwrap();
        writer.write_all(b"\n").unwrap();
        assert_eq!(handle.borrow().as_slice(), b"bsh\n");
    }

    #[test]
    fn fd_lines_splits_lines_and_keeps_unterminated_tail() {
        let (mut reader, mut input, prompts) = pipe_reader(InterruptContext::detached());
        input.write_all(b"ls -l\r\ncd /\necho tail").unwrap();
        drop(input);

        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("ls -l".into()));
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("cd /".into()));
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("echo tail".into()));
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Eof);
        assert_eq!(prompts.borrow().as_slice(), "p> ".repeat(4).as_bytes());
        assert!(!reader.ends_line());
    }

    #[test]
    fn interrupt_while_waiting_for_input_does_not_eat_the_next_line() {
        let interrupts = InterruptContext::detached().with_wake_pipe().unwrap();
        let (mut reader, mut input, _) = pipe_reader(interrupts.clone());

        interrupts.arm();
        interrupts.interrupt();
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Interrupted);

        interrupts.arm();
        input.write_all(b"echo kept\n").unwrap();
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Line("echo kept".into()));
    }

    #[test]
    fn interrupt_from_another_thread_wakes_a_blocked_read() {
        let interrupts = InterruptContext::detached().with_wake_pipe().unwrap();
        let (mut reader, _input, _) = pipe_reader(interrupts.clone());
        interrupts.arm();

        let remote = interrupts.clone();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            remote.interrupt();
        });
        assert_eq!(reader.read_line("p> ").unwrap(), ReadOutcome::Interrupted);
        waker.join().unwrap();
    }
}
