use anyhow::{Context, Result};
use argh::FromArgs;
use log::LevelFilter;
use sigshell::{DEFAULT_PROMPT, Interpreter, ShellSession, SignalPolicy};
use std::io;

#[derive(FromArgs)]
/// A minimal interactive shell demonstrating POSIX job control.
struct Args {
    #[argh(option)]
    /// another command name to launch with Ctrl+C ignored; may be repeated
    protect: Vec<String>,

    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt printed before each command line
    prompt: String,

    #[argh(switch)]
    /// do not print the greeting at startup
    no_banner: bool,

    #[argh(switch, short = 'v')]
    /// log job-control steps to standard error
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let session = ShellSession::initialize();
    log::debug!(
        "session: process group {}, interactive {}",
        session.pgid(),
        session.is_interactive()
    );

    let policy = SignalPolicy::default().with_extra(args.protect);
    let mut sh = Interpreter::new(&session, policy).with_prompt(args.prompt);

    if !args.no_banner {
        Interpreter::banner(&mut io::stdout()).context("cannot print banner")?;
    }
    sh.repl().context("interactive loop failed")?;
    Ok(())
}
