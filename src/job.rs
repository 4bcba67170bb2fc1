//! The single foreground job and the interpretation of its wait status.

use crate::error::LaunchError;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use std::io::{self, Write};

/// What became of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not yet waited for.
    Running,
    /// Suspended by a stop signal. There is no way to resume it from the
    /// shell, so once reported it is forgotten.
    Stopped(Signal),
    /// Exited normally with the given code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(Signal),
}

impl Outcome {
    /// Classify the result of a `waitpid` call made with `WUNTRACED`.
    ///
    /// Exactly one of `Stopped`, `Exited` or `Signaled` is produced. Statuses
    /// such a wait cannot yield (continued, ptrace events, still alive) are
    /// rejected rather than guessed at.
    pub fn classify(status: WaitStatus) -> Result<Self, LaunchError> {
        match status {
            WaitStatus::Stopped(_, signal) => Ok(Outcome::Stopped(signal)),
            WaitStatus::Exited(_, code) => Ok(Outcome::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Ok(Outcome::Signaled(signal)),
            other => Err(LaunchError::UnexpectedStatus(format!("{:?}", other))),
        }
    }

    /// Classify a raw `int` status as filled in by `waitpid(2)`.
    pub fn from_raw(pid: Pid, raw: i32) -> Result<Self, LaunchError> {
        let status = WaitStatus::from_raw(pid, raw)
            .map_err(|e| LaunchError::UnexpectedStatus(format!("{:#x}: {}", raw, e)))?;
        Self::classify(status)
    }

    /// Whether the process is gone for good.
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Exited(_) | Outcome::Signaled(_))
    }

    /// Write the user-visible status lines for this outcome of process `pid`.
    ///
    /// A clean exit and a job still running print nothing.
    pub fn report(&self, pid: Pid, out: &mut dyn Write) -> io::Result<()> {
        match *self {
            Outcome::Running | Outcome::Exited(0) => Ok(()),
            Outcome::Stopped(_) => {
                writeln!(out, "\n[Shell] Process {} suspended.", pid)?;
                writeln!(
                    out,
                    "[Shell] Use 'kill -CONT {}' to resume it (or a job control command in a real shell).",
                    pid
                )
            }
            Outcome::Exited(code) => writeln!(out, "[Shell] Process exited with status {}", code),
            Outcome::Signaled(signal) => {
                writeln!(out, "[Shell] Process terminated by signal {}", signal as i32)
            }
        }
    }
}

/// The one command currently launched from the shell.
///
/// The process id doubles as the id of the process group the job leads.
#[derive(Debug)]
pub struct Job {
    pub pid: Pid,
    pub argv: Vec<String>,
    pub sigint_protected: bool,
    pub outcome: Outcome,
}

impl Job {
    pub fn new(pid: Pid, argv: Vec<String>, sigint_protected: bool) -> Self {
        Self {
            pid,
            argv,
            sigint_protected,
            outcome: Outcome::Running,
        }
    }

    /// The process group the job runs in.
    pub fn pgid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Record the outcome of the wait and report it.
    pub fn finish(&mut self, status: WaitStatus, out: &mut dyn Write) -> Result<Outcome, LaunchError> {
        let outcome = Outcome::classify(status)?;
        self.outcome = outcome;
        if let Err(e) = outcome.report(self.pid, out) {
            log::warn!("cannot report status of {}: {}", self.pid, e);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID: i32 = 4242;

    fn classify_raw(raw: i32) -> Outcome {
        Outcome::from_raw(Pid::from_raw(PID), raw).expect("classifiable status")
    }

    fn report(outcome: Outcome) -> String {
        let mut out = Vec::new();
        outcome.report(Pid::from_raw(PID), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_classify_clean_exit() {
        assert_eq!(classify_raw(0), Outcome::Exited(0));
    }

    #[test]
    fn test_classify_failing_exit() {
        assert_eq!(classify_raw(1 << 8), Outcome::Exited(1));
        assert_eq!(classify_raw(127 << 8), Outcome::Exited(127));
    }

    #[test]
    fn test_classify_signal_termination() {
        assert_eq!(
            classify_raw(Signal::SIGKILL as i32),
            Outcome::Signaled(Signal::SIGKILL)
        );
        // core dump bit set
        assert_eq!(
            classify_raw(Signal::SIGSEGV as i32 | 0x80),
            Outcome::Signaled(Signal::SIGSEGV)
        );
    }

    #[test]
    fn test_classify_stop() {
        assert_eq!(
            classify_raw(((Signal::SIGTSTP as i32) << 8) | 0x7f),
            Outcome::Stopped(Signal::SIGTSTP)
        );
    }

    #[test]
    fn test_classify_rejects_continued() {
        let pid = Pid::from_raw(PID);
        assert!(matches!(
            Outcome::classify(WaitStatus::Continued(pid)),
            Err(LaunchError::UnexpectedStatus(_))
        ));
        assert!(Outcome::classify(WaitStatus::StillAlive).is_err());
    }

    #[test]
    fn test_finished_states() {
        assert!(Outcome::Exited(3).is_finished());
        assert!(Outcome::Signaled(Signal::SIGTERM).is_finished());
        assert!(!Outcome::Stopped(Signal::SIGSTOP).is_finished());
        assert!(!Outcome::Running.is_finished());
    }

    #[test]
    fn test_report_clean_exit_is_silent() {
        assert_eq!(report(Outcome::Exited(0)), "");
        assert_eq!(report(Outcome::Running), "");
    }

    #[test]
    fn test_report_failing_exit() {
        assert_eq!(
            report(Outcome::Exited(1)),
            "[Shell] Process exited with status 1\n"
        );
    }

    #[test]
    fn test_report_signal() {
        assert_eq!(
            report(Outcome::Signaled(Signal::SIGINT)),
            "[Shell] Process terminated by signal 2\n"
        );
    }

    #[test]
    fn test_report_stop_mentions_pid() {
        let text = report(Outcome::Stopped(Signal::SIGTSTP));
        assert!(text.starts_with("\n[Shell] Process 4242 suspended.\n"));
        assert!(text.contains("kill -CONT 4242"));
    }

    #[test]
    fn test_job_finish_records_outcome() {
        let pid = Pid::from_raw(PID);
        let mut job = Job::new(pid, vec!["false".to_string()], false);
        assert_eq!(job.outcome, Outcome::Running);
        assert_eq!(job.pgid(), pid);
        assert_eq!(job.name(), "false");

        let mut out = Vec::new();
        let outcome = job.finish(WaitStatus::Exited(pid, 1), &mut out).unwrap();
        assert_eq!(outcome, Outcome::Exited(1));
        assert_eq!(job.outcome, Outcome::Exited(1));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[Shell] Process exited with status 1\n"
        );
    }
}
