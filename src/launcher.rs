//! Launching a program as a foreground job and supervising it.

use crate::env::Environment;
use crate::error::LaunchError;
use crate::job::{Job, Outcome};
use crate::session::ShellSession;
use crate::signals::SignalPolicy;
use crate::terminal::{Terminal, TerminalArbiter};
use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{AccessFlags, ForkResult, Pid, access, execve, fork, getpid, setpgid, write};
use std::borrow::Cow;
use std::ffi::{CStr, CString, OsStr};
use std::io::Write;
use std::os::fd::BorrowedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Runs one command at a time in its own process group.
///
/// The terminal is granted to the job for as long as the shell waits for it
/// and reclaimed on every way out of the wait.
pub struct Launcher<'a> {
    session: &'a ShellSession,
    arbiter: TerminalArbiter,
}

impl<'a> Launcher<'a> {
    pub fn new(session: &'a ShellSession) -> Self {
        Self {
            session,
            arbiter: TerminalArbiter::new(session),
        }
    }

    /// Create a launcher handing off a terminal other than the controlling one.
    pub fn with_terminal(session: &'a ShellSession, terminal: Box<dyn Terminal>) -> Self {
        Self {
            session,
            arbiter: TerminalArbiter::with_terminal(session, terminal),
        }
    }

    pub fn session(&self) -> &ShellSession {
        self.session
    }

    /// The process group currently granted the terminal.
    pub fn terminal_owner(&self) -> Pid {
        self.arbiter.owner()
    }

    /// Run `argv` in the foreground until it exits, dies or stops.
    ///
    /// Status lines go to `out`. Errors concern this launch only; the shell
    /// state is the same afterwards as before.
    pub fn launch(
        &mut self,
        argv: &[String],
        protected: bool,
        env: &Environment,
        out: &mut dyn Write,
    ) -> Result<Outcome, LaunchError> {
        // pending output must not show up after the child's
        let _ = out.flush();
        let mut job = self.spawn(argv, protected, env)?;
        if protected {
            let _ = writeln!(
                out,
                "[Shell] Process {} is protected from SIGINT (Ctrl+C won't work)",
                job.pid
            );
        }
        self.supervise(&mut job, out)
    }

    /// Fork a child running `argv` in a new process group.
    ///
    /// The program is looked up in `PATH` before forking, so a missing
    /// command never creates a process.
    pub fn spawn(
        &self,
        argv: &[String],
        protected: bool,
        env: &Environment,
    ) -> Result<Job, LaunchError> {
        let name = argv.first().ok_or(LaunchError::EmptyCommand)?;
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let program = find_command_path(OsStr::new(&search_paths), Path::new(name))
            .ok_or_else(|| LaunchError::NotFound(name.clone()))?;

        // Everything the child needs is allocated before forking.
        let program = CString::new(program.as_os_str().as_bytes())?;
        let args = argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let vars = env
            .assignments()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;
        let script_args = script_arguments(&program, &args);

        // SAFETY: the child only calls async-signal-safe functions before exec.
        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => {
                let child_argv = ChildArgv {
                    program: &program,
                    args: &args,
                    script_args: &script_args,
                    vars: &vars,
                };
                exec_child(child_argv, protected)
            }
            ForkResult::Parent { child } => {
                // Also done by the child. Whichever runs first wins, the other
                // may see EACCES once the child has exec'd.
                if let Err(e) = setpgid(child, child) {
                    debug!("setpgid({}) from the shell: {}", child, e);
                }
                debug!("spawned {:?} as process group {}", argv, child);
                Ok(Job::new(child, argv.to_vec(), protected))
            }
        }
    }

    /// Wait for `job` to exit or stop, then classify and report the result.
    pub fn supervise(&mut self, job: &mut Job, out: &mut dyn Write) -> Result<Outcome, LaunchError> {
        let status = {
            let _foreground = self.arbiter.foreground(job.pgid());
            wait_for(job.pid)
        };
        job.finish(status?, out)
    }
}

/// Block until `pid` terminates or stops.
fn wait_for(pid: Pid) -> Result<WaitStatus, LaunchError> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(LaunchError::Wait(e)),
            Ok(status) => return Ok(status),
        }
    }
}

/// Shell that runs executable files lacking a `#!` line.
const SCRIPT_SHELL: &CStr = c"/bin/sh";

/// Everything `exec_child` hands to `execve`, built before forking.
struct ChildArgv<'a> {
    program: &'a CStr,
    args: &'a [CString],
    script_args: &'a [CString],
    vars: &'a [CString],
}

/// Arguments for running `program` as a shell script: `sh program args...`.
fn script_arguments(program: &CStr, args: &[CString]) -> Vec<CString> {
    let mut script_args = Vec::with_capacity(args.len() + 1);
    script_args.push(CString::from(c"sh"));
    script_args.push(program.to_owned());
    script_args.extend(args.iter().skip(1).cloned());
    script_args
}

/// Render the child's protection notice into `buf` without allocating.
fn protection_notice(pid: i32, buf: &mut [u8; 64]) -> &[u8] {
    const PREFIX: &[u8] = b"[Child] This process will ignore Ctrl+C (PID: ";
    const SUFFIX: &[u8] = b")\n";

    let mut digits = [0u8; 10];
    let mut value = pid.unsigned_abs();
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }

    let mut len = 0;
    for part in [PREFIX, &digits[start..], SUFFIX] {
        buf[len..len + part.len()].copy_from_slice(part);
        len += part.len();
    }
    &buf[..len]
}

/// The child half of a launch. Never returns.
fn exec_child(argv: ChildArgv<'_>, protected: bool) -> ! {
    // SAFETY: the standard descriptors stay open for the life of the child.
    let (stdout, stderr) = unsafe {
        (
            BorrowedFd::borrow_raw(libc::STDOUT_FILENO),
            BorrowedFd::borrow_raw(libc::STDERR_FILENO),
        )
    };

    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    let _ = SignalPolicy::apply_to_child(protected);
    if protected {
        let mut buf = [0u8; 64];
        let _ = write(stdout, protection_notice(getpid().as_raw(), &mut buf));
    }

    let mut errno = match execve(argv.program, argv.args, argv.vars) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    if errno == Errno::ENOEXEC {
        // no interpreter line: run it as a shell script, like execvp does
        errno = match execve(SCRIPT_SHELL, argv.script_args, argv.vars) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };
    }
    let _ = write(stderr, b"Command execution failed: ");
    let _ = write(stderr, errno.desc().as_bytes());
    let _ = write(stderr, b"\n");
    // SAFETY: _exit skips atexit handlers and stdio flushing inherited from
    // the shell, which must not run twice.
    unsafe { libc::_exit(1) }
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - `./foo`: returned if it exists in the current directory.
/// - Single component: the first executable match in `search_paths` (PATH).
/// - Several components (`bin/sh`): returned if it exists relative to the
///   current directory.
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    if path.starts_with("./") && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file() && access(path.as_path(), AccessFlags::X_OK).is_ok())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
