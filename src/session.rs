use crate::signals::SignalPolicy;
use crate::terminal::{ControllingTerminal, Terminal};
use log::{debug, warn};
use nix::sys::signal::{Signal, killpg};
use nix::sys::termios::{Termios, tcgetattr};
use nix::unistd::{Pid, getpgrp, getpid, isatty, setpgid};
use std::io;

/// Job-control state of the running shell, established once at startup.
///
/// The session is never mutated after [`ShellSession::initialize`] returns. It
/// is handed by reference to whatever needs the shell's process group.
#[derive(Debug, Clone)]
pub struct ShellSession {
    pgid: Pid,
    interactive: bool,
    saved_modes: Option<Termios>,
}

impl ShellSession {
    /// Set up job control for the current process.
    ///
    /// When standard input is not a terminal nothing is changed and the
    /// session runs without job control. Otherwise this waits until the shell
    /// is in the foreground, installs the shell's standing signal
    /// dispositions, moves the shell into its own process group, claims the
    /// terminal for it and snapshots the terminal modes.
    ///
    /// An OS refusal at any step is logged and initialization carries on.
    pub fn initialize() -> Self {
        if !isatty(io::stdin()).unwrap_or(false) {
            debug!("standard input is not a terminal, job control disabled");
            return Self::detached();
        }

        let terminal = ControllingTerminal;
        wait_for_foreground(&terminal);

        SignalPolicy::apply_to_shell();

        let pid = getpid();
        let pgid = match setpgid(pid, pid) {
            Ok(()) => pid,
            Err(e) => {
                // a session leader cannot change its group but already leads one
                warn!("cannot put shell {} in its own process group: {}", pid, e);
                getpgrp()
            }
        };

        if let Err(e) = terminal.set_foreground(pgid) {
            warn!("cannot claim terminal for process group {}: {}", pgid, e);
        }

        let saved_modes = match tcgetattr(io::stdin()) {
            Ok(modes) => Some(modes),
            Err(e) => {
                warn!("cannot save terminal modes: {}", e);
                None
            }
        };

        debug!("shell session ready in process group {}", pgid);
        Self {
            pgid,
            interactive: true,
            saved_modes,
        }
    }

    /// A session without job control, sharing the caller's process group.
    pub fn detached() -> Self {
        Self {
            pgid: getpgrp(),
            interactive: false,
            saved_modes: None,
        }
    }

    /// The process group the shell runs in.
    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    /// Whether job control is active.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Terminal modes saved at startup, if the shell runs on a terminal.
    pub fn saved_modes(&self) -> Option<&Termios> {
        self.saved_modes.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(pgid: Pid, interactive: bool) -> Self {
        Self {
            pgid,
            interactive,
            saved_modes: None,
        }
    }
}

/// Stop ourselves until the terminal's foreground group is ours.
///
/// Protects against being started as a background job: SIGTTIN suspends the
/// whole group until the parent shell brings it to the foreground.
fn wait_for_foreground(terminal: &dyn Terminal) {
    loop {
        let pgrp = getpgrp();
        match terminal.foreground() {
            Ok(foreground) if foreground == pgrp => return,
            Ok(foreground) => {
                debug!("process group {} is in the background of {}", pgrp, foreground);
                if let Err(e) = killpg(pgrp, Signal::SIGTTIN) {
                    warn!("cannot stop process group {}: {}", pgrp, e);
                    return;
                }
            }
            Err(e) => {
                warn!("cannot read the terminal's foreground group: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::tests::RecordingTerminal;
    use crate::test_support::lock_processes;
    use nix::sys::signal::kill;
    use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    #[test]
    fn test_foreground_group_returns_at_once() {
        let (terminal, log) = RecordingTerminal::with_handle();
        terminal.set_foreground(getpgrp()).unwrap();

        wait_for_foreground(&terminal);

        assert_eq!(*log.borrow(), vec![getpgrp()]);
    }

    #[test]
    fn test_unreadable_terminal_gives_up_without_stopping() {
        let (terminal, log) = RecordingTerminal::with_handle();

        // nothing recorded, so reading the foreground group fails with ENOTTY
        wait_for_foreground(&terminal);

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_background_group_stops_itself() {
        let _lock = lock_processes();
        let (terminal, _log) = RecordingTerminal::with_handle();
        terminal.set_foreground(Pid::from_raw(1)).unwrap();

        // SAFETY: the child only calls async-signal-safe functions.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                // its own group, so SIGTTIN stops nobody else
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                wait_for_foreground(&terminal);
                unsafe { libc::_exit(0) }
            }
            ForkResult::Parent { child } => {
                let _ = setpgid(child, child);
                let status = waitpid(child, Some(WaitPidFlag::WUNTRACED)).expect("waitpid");
                let _ = kill(child, Signal::SIGKILL);
                let _ = waitpid(child, None);
                assert_eq!(status, WaitStatus::Stopped(child, Signal::SIGTTIN));
            }
        }
    }

    #[test]
    fn test_detached_session_shares_caller_group() {
        let session = ShellSession::detached();
        assert!(!session.is_interactive());
        assert_eq!(session.pgid(), getpgrp());
        assert!(session.saved_modes().is_none());
    }

    #[test]
    fn test_initialize_without_terminal_is_a_no_op() {
        if isatty(io::stdin()).unwrap_or(false) {
            // would take over the test runner's terminal
            return;
        }
        let before = getpgrp();
        let session = ShellSession::initialize();
        assert!(!session.is_interactive());
        assert_eq!(session.pgid(), before);
        assert_eq!(getpgrp(), before);
    }
}
