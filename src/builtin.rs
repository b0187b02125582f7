use crate::command::{Command, CommandFactory, ExecutableCommand, ExitCode};
use crate::dispatch::Factory;
use crate::error::ShellError;
use anyhow::Result;
use std::io::Write;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are built from the parsed [`Command`] and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    fn from_command(command: &Command) -> Self;

    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self) -> Result<ExitCode, ShellError>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stderr: &mut dyn Write) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{}", e)?;
                Ok(1)
            }
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        if command.program() == Some(T::name()) {
            Some(Box::new(T::from_command(command)))
        } else {
            None
        }
    }
}

/// Change the current working directory.
///
/// Only the first argument is used. Without one, an empty path goes to
/// `chdir` and the platform decides what happens.
#[derive(Debug)]
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_command(command: &Command) -> Self {
        Self {
            target: command.arg(1).map(str::to_string),
        }
    }

    fn execute(self) -> Result<ExitCode, ShellError> {
        let path = self.target.as_deref().unwrap_or("");
        nix::unistd::chdir(path).map_err(|errno| ShellError::ChangeDir {
            path: self.target.clone(),
            errno,
        })?;
        tracing::debug!(path, "changed directory");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::test_support::{lock_current_dir, make_unique_temp_dir};
    use std::env as stdenv;
    use std::fs;

    fn run(line: &str) -> (ExitCode, String) {
        let command = tokenize(line.to_string());
        let cmd = Factory::<Cd>::default()
            .try_create(&command)
            .expect("cd should be recognized");
        let mut err = Vec::new();
        let code = cmd.execute(&mut err).unwrap();
        (code, String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir("cd_abs").expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let (code, err) = run(&format!("cd {}", canonical_temp.display()));

        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);

        assert_eq!(code, 0);
        assert_eq!(err, "");
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_relative_and_extra_arguments_ignored() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir("cd_rel").expect("failed to create temp dir");
        fs::create_dir_all(temp.join("inner")).unwrap();
        let orig = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(&temp).unwrap();

        let (code, err) = run("cd inner ignored");

        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let expected = fs::canonicalize(temp.join("inner")).unwrap();
        let _ = fs::remove_dir_all(&temp);

        assert_eq!(code, 0);
        assert_eq!(err, "");
        assert_eq!(new_cwd, expected);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let name = format!("nonexistent_dir_for_bsh_test_{}", std::process::id());
        let (code, err) = run(&format!("cd {}", name));

        assert_eq!(code, 1);
        assert_eq!(err, format!("{}: No such file or directory\n", name));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_without_target_leaves_directory() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let (code, err) = run("cd");

        assert_eq!(code, 1);
        assert_eq!(err, "No such file or directory\n");
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_other_names_are_not_cd() {
        let command = tokenize("cdx /tmp".to_string());
        assert!(Factory::<Cd>::default().try_create(&command).is_none());
    }
}
