use crate::command::{Command, CommandFactory, ExecutableCommand};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports built-ins defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Where a parsed command goes.
pub enum Route {
    /// Run in the shell process; never spawns.
    Builtin(Box<dyn ExecutableCommand>),
    /// Hand to the launcher.
    External,
}

/// Decides whether a command is a built-in or an external program.
///
/// Factories are queried in registration order and the first one that
/// recognizes the program name wins.
pub struct Dispatcher {
    builtins: Vec<Box<dyn CommandFactory>>,
}

impl Dispatcher {
    pub fn new(builtins: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { builtins }
    }

    /// Register another built-in; it is consulted after the existing ones.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        self.builtins.push(factory);
    }

    pub fn resolve(&self, command: &Command) -> Route {
        self.builtins
            .iter()
            .find_map(|factory| factory.try_create(command))
            .map_or(Route::External, Route::Builtin)
    }
}

impl Default for Dispatcher {
    /// The built-in set: `cd`.
    fn default() -> Self {
        use crate::builtin::Cd;
        Self::new(vec![Box::new(Factory::<Cd>::default())])
    }
}
