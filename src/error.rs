use nix::errno::Errno;
use std::ffi::NulError;
use thiserror::Error;

/// Reasons a single launch can fail.
///
/// None of these are fatal to the shell: the interactive loop reports them and
/// reads the next command line.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("no command specified to run")]
    EmptyCommand,
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("argument contains an interior NUL byte: {0}")]
    InvalidArgument(#[from] NulError),
    #[error("fork failed: {0}")]
    Fork(#[source] Errno),
    #[error("waitpid failed: {0}")]
    Wait(#[source] Errno),
    #[error("unexpected wait status: {0}")]
    UnexpectedStatus(String),
}
