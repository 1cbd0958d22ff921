use std::ffi::NulError;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating one command line.
///
/// Whether the shell survives an error is decided by [`Error::is_fatal`].
#[derive(Debug, Error)]
pub enum Error {
	#[error("empty command")]
	EmptyCommand,

	#[error("missing command before or after '|'")]
	EmptyStage,

	#[error("only one '|' is supported")]
	TooManyStages,

	#[error("argument contains a nul byte: {0}")]
	Nul(#[from] NulError),

	#[error("cannot create process: {0}")]
	Fork(#[source] Errno),

	#[error("cannot create pipe: {0}")]
	Pipe(#[source] Errno),

	#[error("cannot close descriptor {fd}: {source}")]
	Close { fd: i32, source: Errno },

	#[error("cannot wait for process {pid}: {source}")]
	Wait { pid: Pid, source: Errno },

	#[error("cannot set disposition of {signal}: {source}")]
	Signal { signal: Signal, source: Errno },
}

impl Error {
	/// Fatal errors come from the orchestration machinery itself and end the shell.
	/// The others only concern the line being processed.
	pub fn is_fatal(&self) -> bool {
		match *self {
			Error::EmptyCommand | Error::EmptyStage | Error::TooManyStages | Error::Nul(..) => false,
			Error::Fork(..) | Error::Pipe(..) | Error::Close { .. } | Error::Wait { .. } | Error::Signal { .. } => true,
		}
	}
}
