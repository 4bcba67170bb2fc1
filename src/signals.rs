//! Signal dispositions for the shell and for the programs it launches.
//!
//! Dispositions are set at exactly two points: once for the shell itself when
//! the session is initialized, and once inside every freshly forked child
//! before it replaces its image with the target program.

use log::{debug, warn};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

/// Command names launched with interrupt requests ignored unless overridden.
pub const DEFAULT_PROTECTED: &[&str] = &["sleep", "critical"];

/// Signals the shell ignores for as long as it owns the terminal.
///
/// SIGTTIN and SIGTTOU keep `tcsetpgrp` from suspending the shell while it is
/// momentarily in the background. SIGTSTP and SIGQUIT keep the keyboard from
/// stopping or killing it. SIGINT at the prompt is picked up by the line
/// editor as a key press instead.
const SHELL_IGNORED: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Decides which commands get protection from interrupt requests.
#[derive(Debug, Clone)]
pub struct SignalPolicy {
    protected: Vec<String>,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED.iter().copied())
    }
}

impl SignalPolicy {
    /// Create a policy protecting exactly the given command names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add command names on top of the current allow-list.
    pub fn with_extra<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.protected.contains(&name) {
                self.protected.push(name);
            }
        }
        self
    }

    /// Whether `command` should run with interrupt requests ignored.
    ///
    /// The match is exact on the name as typed, so `/bin/sleep` is not the
    /// same command as `sleep`.
    pub fn is_protected(&self, command: &str) -> bool {
        self.protected.iter().any(|name| name == command)
    }

    pub fn protected_names(&self) -> impl Iterator<Item = &str> {
        self.protected.iter().map(String::as_str)
    }

    /// Set the standing dispositions of the shell process.
    ///
    /// Failures are logged and otherwise ignored: a shell with default
    /// dispositions still works, only less comfortably.
    pub fn apply_to_shell() {
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        for &signal in SHELL_IGNORED {
            // SAFETY: installing SIG_IGN runs no code in signal context.
            match unsafe { sigaction(signal, &ignore) } {
                Ok(_) => debug!("shell now ignores {}", signal),
                Err(e) => warn!("cannot ignore {} in the shell: {}", signal, e),
            }
        }
    }

    /// Set the dispositions of a child between `fork` and `exec`.
    ///
    /// SIGINT is ignored when `protected`, otherwise reset to the default.
    /// SIGTSTP is always reset to the default so the program can be
    /// suspended even though the shell ignores it. Both survive `exec`.
    ///
    /// Only `sigaction` is called here, which keeps this safe to run in a
    /// child forked from a multi-threaded parent.
    pub fn apply_to_child(protected: bool) -> nix::Result<()> {
        let interrupt = if protected {
            SigHandler::SigIgn
        } else {
            SigHandler::SigDfl
        };
        let interrupt = SigAction::new(interrupt, SaFlags::empty(), SigSet::empty());
        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());

        // SAFETY: SIG_IGN and SIG_DFL run no code in signal context.
        unsafe {
            sigaction(Signal::SIGTSTP, &default)?;
            sigaction(Signal::SIGINT, &interrupt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lock_processes;
    use nix::sys::signal::raise;
    use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    #[test]
    fn test_default_policy_protects_sleep_and_critical() {
        let policy = SignalPolicy::default();
        assert!(policy.is_protected("sleep"));
        assert!(policy.is_protected("critical"));
        assert!(!policy.is_protected("ls"));
        assert!(!policy.is_protected("cat"));
    }

    #[test]
    fn test_lookup_is_exact() {
        let policy = SignalPolicy::default();
        assert!(!policy.is_protected("/bin/sleep"));
        assert!(!policy.is_protected("Sleep"));
        assert!(!policy.is_protected("sleep "));
        assert!(!policy.is_protected(""));
    }

    #[test]
    fn test_extra_names_extend_the_list() {
        let policy = SignalPolicy::default().with_extra(["make", "sleep"]);
        assert!(policy.is_protected("make"));
        assert!(policy.is_protected("sleep"));
        assert_eq!(policy.protected_names().count(), 3);
    }

    #[test]
    fn test_empty_policy_protects_nothing() {
        let policy = SignalPolicy::new(Vec::<String>::new());
        assert!(!policy.is_protected("sleep"));
    }

    /// Forks, applies the child dispositions, then interrupts itself.
    fn interrupt_after_apply(protected: bool) -> WaitStatus {
        let _lock = lock_processes();
        // SAFETY: the child only calls async-signal-safe functions.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let code = match SignalPolicy::apply_to_child(protected) {
                    Ok(()) => 0,
                    Err(_) => 2,
                };
                let _ = raise(Signal::SIGINT);
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => waitpid(child, None).expect("waitpid"),
        }
    }

    #[test]
    fn test_protected_child_survives_interrupt() {
        match interrupt_after_apply(true) {
            WaitStatus::Exited(_, 0) => {}
            other => panic!("protected child should exit normally, got {:?}", other),
        }
    }

    #[test]
    fn test_shell_dispositions_ignore_job_control_signals() {
        let _lock = lock_processes();
        // SAFETY: the child only calls async-signal-safe functions.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                SignalPolicy::apply_to_shell();
                for &signal in SHELL_IGNORED {
                    let _ = raise(signal);
                }
                unsafe { libc::_exit(0) }
            }
            ForkResult::Parent { child } => {
                match waitpid(child, Some(WaitPidFlag::WUNTRACED)).expect("waitpid") {
                    WaitStatus::Exited(_, 0) => {}
                    other => {
                        let _ = nix::sys::signal::kill(child, Signal::SIGKILL);
                        let _ = waitpid(child, None);
                        panic!("shell dispositions should ignore all five signals, got {:?}", other);
                    }
                }
            }
        }
    }

    #[test]
    fn test_unprotected_child_dies_on_interrupt() {
        match interrupt_after_apply(false) {
            WaitStatus::Signaled(_, Signal::SIGINT, _) => {}
            other => panic!("unprotected child should die by SIGINT, got {:?}", other),
        }
    }
}
