//! Ownership of the controlling terminal.
//!
//! The terminal is handed to a job right before the shell waits for it and
//! taken back right after, whatever happened to the job. [`TerminalArbiter`]
//! is the only code that changes the foreground process group after startup.

use crate::session::ShellSession;
use log::{debug, warn};
use nix::unistd::{Pid, tcgetpgrp, tcsetpgrp};
use std::io;

/// A terminal whose foreground process group can be switched.
pub trait Terminal {
    /// Make `pgid` the foreground process group.
    fn set_foreground(&self, pgid: Pid) -> nix::Result<()>;

    /// The current foreground process group.
    fn foreground(&self) -> nix::Result<Pid>;
}

/// The controlling terminal, reached through standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControllingTerminal;

impl Terminal for ControllingTerminal {
    fn set_foreground(&self, pgid: Pid) -> nix::Result<()> {
        tcsetpgrp(io::stdin(), pgid)
    }

    fn foreground(&self) -> nix::Result<Pid> {
        tcgetpgrp(io::stdin())
    }
}

/// Hands the terminal back and forth between the shell and its job.
///
/// When the session is not interactive both handoffs are no-ops and the
/// terminal is never touched.
pub struct TerminalArbiter {
    terminal: Box<dyn Terminal>,
    shell_pgid: Pid,
    interactive: bool,
    owner: Pid,
}

impl TerminalArbiter {
    /// Create an arbiter for `session` driving the controlling terminal.
    pub fn new(session: &ShellSession) -> Self {
        Self::with_terminal(session, Box::new(ControllingTerminal))
    }

    pub fn with_terminal(session: &ShellSession, terminal: Box<dyn Terminal>) -> Self {
        Self {
            terminal,
            shell_pgid: session.pgid(),
            interactive: session.is_interactive(),
            owner: session.pgid(),
        }
    }

    /// The process group currently granted the terminal.
    pub fn owner(&self) -> Pid {
        self.owner
    }

    /// Give the terminal to `pgid`.
    ///
    /// A refused transfer is logged and otherwise ignored: the shell ignores
    /// SIGTTIN and SIGTTOU, so nothing gets suspended because of it.
    pub fn grant(&mut self, pgid: Pid) {
        if !self.interactive {
            return;
        }
        self.owner = pgid;
        match self.terminal.set_foreground(pgid) {
            Ok(()) => debug!("terminal granted to process group {}", pgid),
            Err(e) => warn!("cannot grant terminal to process group {}: {}", pgid, e),
        }
    }

    /// Take the terminal back for the shell's own process group.
    pub fn reclaim(&mut self) {
        if !self.interactive {
            return;
        }
        self.owner = self.shell_pgid;
        match self.terminal.set_foreground(self.shell_pgid) {
            Ok(()) => debug!("terminal reclaimed by shell group {}", self.shell_pgid),
            Err(e) => warn!("cannot reclaim terminal for shell group {}: {}", self.shell_pgid, e),
        }
    }

    /// Grant the terminal to `pgid` until the returned guard is dropped.
    ///
    /// Dropping the guard reclaims the terminal, so every exit from the
    /// enclosing scope, `?` and panics included, hands it back to the shell.
    pub fn foreground(&mut self, pgid: Pid) -> ForegroundGuard<'_> {
        self.grant(pgid);
        ForegroundGuard { arbiter: self }
    }
}

/// Reclaims the terminal for the shell when dropped.
pub struct ForegroundGuard<'a> {
    arbiter: &'a mut TerminalArbiter,
}

impl ForegroundGuard<'_> {
    pub fn owner(&self) -> Pid {
        self.arbiter.owner()
    }
}

impl Drop for ForegroundGuard<'_> {
    fn drop(&mut self) {
        self.arbiter.reclaim();
    }
}
