use crate::builtin::{self, Dispatch};
use crate::env::Environment;
use crate::launcher::Launcher;
use crate::parser;
use crate::session::ShellSession;
use crate::signals::SignalPolicy;
use crate::terminal::Terminal;
use log::warn;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result};
use std::io::{self, Write};

pub const DEFAULT_PROMPT: &str = "sigshell> ";

/// The interactive shell: reads command lines, runs builtins in-process and
/// launches everything else as a foreground job.
///
/// Example
/// ```no_run
/// use sigshell::{Interpreter, ShellSession, SignalPolicy};
/// let session = ShellSession::initialize();
/// let mut sh = Interpreter::new(&session, SignalPolicy::default());
/// sh.repl().unwrap();
/// ```
pub struct Interpreter<'a> {
    env: Environment,
    policy: SignalPolicy,
    launcher: Launcher<'a>,
    prompt: String,
}

impl<'a> Interpreter<'a> {
    pub fn new(session: &'a ShellSession, policy: SignalPolicy) -> Self {
        Self::with_launcher(Launcher::new(session), policy)
    }

    /// Create an interpreter handing off `terminal` instead of the controlling one.
    pub fn with_terminal(
        session: &'a ShellSession,
        terminal: Box<dyn Terminal>,
        policy: SignalPolicy,
    ) -> Self {
        Self::with_launcher(Launcher::with_terminal(session, terminal), policy)
    }

    fn with_launcher(launcher: Launcher<'a>, policy: SignalPolicy) -> Self {
        Self {
            env: Environment::new(),
            policy,
            launcher,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn launcher(&self) -> &Launcher<'a> {
        &self.launcher
    }

    /// Print the greeting shown before the first prompt.
    pub fn banner(out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "\n=== Custom Signal Handling Shell ===")?;
        writeln!(out, "Type 'help' for usage information.")?;
        writeln!(out, "Type 'exit' to quit.\n")
    }

    /// Run a single command line.
    ///
    /// Launch failures are reported on `stderr`; they never stop the shell.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Dispatch {
        let argv = parser::split_into_tokens(line);
        if argv.is_empty() {
            return Dispatch::Continue;
        }

        match builtin::dispatch(&argv, stdout, stderr, &mut self.env) {
            Dispatch::NotBuiltin => {}
            handled => return handled,
        }

        let protected = self.policy.is_protected(&argv[0]);
        if let Err(e) = self.launcher.launch(&argv, protected, &self.env, stdout) {
            let _ = writeln!(stderr, "{}", e);
        }
        let _ = stdout.flush();
        Dispatch::Continue
    }

    /// Read-eval-print loop, until `exit` or end of input.
    ///
    /// Ctrl+C at the prompt only prints a reminder; the line editor sees it
    /// as a key press because the shell ignores SIGINT.
    pub fn repl(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let stdout = &mut io::stdout();
                    let stderr = &mut io::stderr();
                    if self.execute_line(&line, stdout, stderr) == Dispatch::Exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("\n[Shell] Use 'exit' command to quit the shell.");
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    warn!("cannot read command line: {}", err);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
