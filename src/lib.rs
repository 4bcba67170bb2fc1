//! A minimal interactive command launcher with POSIX job control.
//!
//! Every command runs in a process group of its own. While the shell waits
//! for it, that group owns the controlling terminal, so Ctrl+C and Ctrl+Z
//! reach the command and not the shell. Commands on a small allow-list are
//! started with SIGINT ignored.
//!
//! The pieces, leaves first:
//! - [`SignalPolicy`]: which commands ignore interrupts, and the dispositions
//!   of the shell and of each child.
//! - [`TerminalArbiter`]: hands the terminal to a job and back.
//! - [`Launcher`]: forks, execs and supervises one job at a time.
//! - [`Outcome`]: what became of a job, and how that is reported.
//! - [`ShellSession`]: job-control state established once at startup.
//!
//! [`Interpreter`] ties them to a line editor and a handful of builtins.

pub mod builtin;
pub mod env;
pub mod error;
mod interpreter;
pub mod job;
pub mod launcher;
pub mod parser;
pub mod session;
pub mod signals;
pub mod terminal;

pub use error::LaunchError;
pub use interpreter::{DEFAULT_PROMPT, Interpreter};
pub use job::{Job, Outcome};
pub use launcher::Launcher;
pub use session::ShellSession;
pub use signals::SignalPolicy;
pub use terminal::TerminalArbiter;
