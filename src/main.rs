use anyhow::Result;
use argh::FromArgs;
use bsh::command::{ExitCode, LineReader};
use bsh::interrupt::InterruptContext;
use bsh::io_adapters::{FdLines, Readline};
use std::io::IsTerminal;
use bsh::{Config, Shell};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// An interactive command shell. Type `cd <dir>` or any program name; Ctrl-C
/// abandons the current line, Ctrl-D exits.
struct Args {
    #[argh(positional, greedy)]
    /// ignored; the shell takes no arguments.
    _args: Vec<String>,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &Config) -> Result<ExitCode> {
    // rustyline installs its own SIGINT handler on a terminal, so ours goes in after it.
    let (reader, interrupts) = if std::io::stdin().is_terminal() {
        let reader: Box<dyn LineReader> = Box::new(Readline::new(config.history)?);
        (reader, InterruptContext::install()?)
    } else {
        let interrupts = InterruptContext::install()?;
        let reader: Box<dyn LineReader> = Box::new(FdLines::stdin(interrupts.clone())?);
        (reader, interrupts)
    };
    let mut shell = Shell::new(reader, interrupts);
    Ok(shell.run()?)
}

fn main() {
    let _args: Args = argh::from_env();
    let config = Config::from_env();
    init_tracing(&config);
    tracing::debug!(?config, "starting");

    let code = match run(&config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}
