use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Conventional process exit code: 0 for success, anything else for failure.
pub type ExitCode = i32;

/// What the dispatcher did with a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a builtin; the caller should launch it as a job.
    NotBuiltin,
    /// Handled here; read the next command line.
    Continue,
    /// Handled here; the shell should exit.
    Exit,
}

/// Commands the shell runs in-process instead of launching.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`).
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command. Return 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

type Runner = fn(&[&str], &mut dyn Write, &mut dyn Write, &mut Environment) -> ExitCode;

fn lookup(name: &str) -> Option<Runner> {
    let builtins: [(&str, Runner); 3] = [
        (Exit::name(), run::<Exit> as Runner),
        (Help::name(), run::<Help> as Runner),
        (Cd::name(), run::<Cd> as Runner),
    ];
    builtins
        .into_iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, runner)| runner)
}

/// Parse and execute `T`, turning argument and execution errors into output.
fn run<T: BuiltinCommand>(
    args: &[&str],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> ExitCode {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => match cmd.execute(stdout, env) {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(stderr, "{:#}", e);
                1
            }
        },
        Err(EarlyExit { output, status }) => {
            let sink: &mut dyn Write = if status.is_ok() { &mut *stdout } else { &mut *stderr };
            let _ = writeln!(sink, "{}", output.trim_end());
            if status.is_ok() { 0 } else { 1 }
        }
    }
}

/// Run `argv` if it names a builtin.
pub fn dispatch(
    argv: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> Dispatch {
    let Some(name) = argv.first() else {
        return Dispatch::Continue;
    };
    let Some(runner) = lookup(name) else {
        return Dispatch::NotBuiltin;
    };

    let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
    let code = runner(&args, stdout, stderr, env);
    log::debug!("builtin {} finished with {}", name, code);

    if env.should_exit {
        Dispatch::Exit
    } else {
        Dispatch::Continue
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        // launched programs inherit the process working directory
        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "Goodbye!")?;
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Describe the shell and its builtins.
pub struct Help {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

const HELP_TEXT: &str = "
=== Custom Signal Handling Shell ===
Features:
  - Ctrl+C in shell shows message instead of exiting
  - 'sleep' commands ignore Ctrl+C (SIGINT protected)
  - Ctrl+Z suspends process directly (proper job control set up)

Built-in commands:
  help     - Show this help message
  exit     - Exit the shell
  cd <dir> - Change directory

Try these:
  sleep 10     - Try pressing Ctrl+C (won't work!)
  ls -la       - Try pressing Ctrl+C (will work)
  cat          - Try pressing Ctrl+Z (will suspend)
";

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", HELP_TEXT)?;
        Ok(0)
    }
}
