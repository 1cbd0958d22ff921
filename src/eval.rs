use std::ffi::{CStr,CString};
use std::os::raw::c_char;
use std::os::fd::{AsRawFd,BorrowedFd,IntoRawFd,OwnedFd};

use nix::errno::Errno;
use nix::unistd::{self,ForkResult,Pid};
use tracing::{debug,info};

use crate::error::{Error,Result};
use crate::global;
use crate::job::{self,Fork,Job,JobBuilder,SystemFork};
use crate::parser;
use crate::types::Shape;

/// Argument vector converted before fork, down to the null-terminated pointer
/// array, so the child execs without allocating. The shell runs reaper threads,
/// and a forked child of a threaded process may find the allocator locked.
#[derive(Debug)]
pub struct Argv {
	args: Vec<CString>,
	ptrs: Vec<*const c_char>,
}

impl Argv {
	pub fn new(tokens: &[String]) -> Result<Argv> {
		if tokens.is_empty() {
			return Err(Error::EmptyCommand);
		}
		let args: std::result::Result<Vec<CString>, _> = tokens.iter().map(|t| CString::new(t.as_bytes())).collect();
		let args = args?;
		// CString data lives on the heap, so the pointers survive moving `args`
		let mut ptrs: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();
		ptrs.push(std::ptr::null());
		Ok(Argv { args: args, ptrs: ptrs })
	}

	fn program(&self) -> &CStr {
		&self.args[0]
	}
}

/// A child that could not replace its image with the requested program.
#[derive(Debug, Clone, Copy)]
pub struct LoadError {
	errno: Errno,
}

impl LoadError {
	fn status(&self) -> i32 {
		match self.errno {
			Errno::ENOENT => 127,
			_ => 126,
		}
	}
}

/// Replaces the image of the current process. Only ever returns on failure.
fn load(argv: &Argv) -> LoadError {
	// SAFETY: `ptrs` points into `args` and ends with a null pointer.
	unsafe { libc::execvp(argv.ptrs[0], argv.ptrs.as_ptr()) };
	LoadError { errno: Errno::last() }
}

#[derive(Debug, Clone, Copy)]
enum End { Read, Write }

/// One anonymous pipe joining the two stages of a pipeline.
#[derive(Debug)]
pub struct Channel {
	read: OwnedFd,
	write: OwnedFd,
}

impl Channel {
	pub fn open() -> Result<Channel> {
		let (read, write) = unistd::pipe().map_err(Error::Pipe)?;
		Ok(Channel { read: read, write: write })
	}

	/// Child side: installs one end as stdin or stdout, then closes both originals.
	fn attach(self, end: End) -> nix::Result<()> {
		let (fd, target) = match end {
			End::Read => (self.read.as_raw_fd(), libc::STDIN_FILENO),
			End::Write => (self.write.as_raw_fd(), libc::STDOUT_FILENO),
		};
		unistd::dup2(fd, target)?;
		for raw in [self.read.into_raw_fd(), self.write.into_raw_fd()] {
			if raw != target {
				unistd::close(raw)?;
			}
		}
		Ok(())
	}

	/// Parent side: closes both ends. The parent never touches the data.
	pub fn close(self) -> Result<()> {
		close_fd(self.read)?;
		close_fd(self.write)
	}
}

fn close_fd(fd: OwnedFd) -> Result<()> {
	let raw = fd.into_raw_fd();
	unistd::close(raw).map_err(|e| Error::Close { fd: raw, source: e })
}

fn report(program: &CStr, what: &[u8], errno: Errno) {
	// SAFETY: stderr stays open for the lifetime of the child.
	let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
	let parts: [&[u8]; 6] = [b"ish: ", program.to_bytes(), b": ", what, errno.desc().as_bytes(), b"\n"];
	for part in parts {
		let _ = unistd::write(stderr, part);
	}
}

/// Child side of a fork. Resets signals, wires the pipe end if any, then execs.
fn exec_command(state: &global::State, argv: &Argv, redirect: Option<(Channel, End)>) -> ! {
	let status = if let Err(e) = state.dispositions.reset_in_child() {
		report(argv.program(), b"cannot reset signals: ", e);
		126
	} else if let Some(Err(e)) = redirect.map(|(channel, end)| channel.attach(end)) {
		report(argv.program(), b"cannot redirect: ", e);
		126
	} else {
		let e = load(argv);
		report(argv.program(), b"", e.errno);
		e.status()
	};
	unsafe { libc::_exit(status as libc::c_int) }
}

fn launch<F: Fork>(state: &global::State, argv: &Argv, job_builder: &mut JobBuilder<F>) -> Result<()> {
	match job_builder.push_fork()? {
		ForkResult::Parent { .. } => Ok(()),
		ForkResult::Child => exec_command(state, argv, None),
	}
}

fn spawn_pipeline<F: Fork>(state: &global::State, left: &Argv, right: &Argv,
                           job_builder: &mut JobBuilder<F>) -> Result<()> {
	let channel = Channel::open()?;
	if let ForkResult::Child = job_builder.push_fork()? {
		exec_command(state, left, Some((channel, End::Write)));
	}
	if let ForkResult::Child = job_builder.push_fork()? {
		exec_command(state, right, Some((channel, End::Read)));
	}
	channel.close()
}

#[derive(Debug)]
pub enum Outcome {
	/// A foreground job ran to completion.
	Finished(Job),
	/// A background job was started and handed to the reaper.
	Detached(Vec<Pid>),
}

fn spawn_background<F: Fork>(state: &mut global::State, forker: F, tokens: &[String]) -> Result<Outcome> {
	let argv = Argv::new(tokens)?;
	let mut job_builder = JobBuilder::new(forker, 1, true);
	launch(state, &argv, &mut job_builder)?;
	let job = job_builder.build();
	let pids = job.pids();
	info!(pids = ?pids, "background job started");
	state.reaper.adopt(job);
	Ok(Outcome::Detached(pids))
}

/// Runs a classified command with the given process creation primitive.
///
/// Foreground jobs run with SIGINT ignored in the shell; the previous action is
/// back in place on every return path.
pub fn eval_with<F: Fork>(state: &mut global::State, forker: F, shape: Shape) -> Result<Outcome> {
	if let Shape::Simple { argv, background: true } = shape {
		return spawn_background(state, forker, argv);
	}

	let foreground = state.dispositions.enter_foreground_job()?;
	let mut job_builder = JobBuilder::new(forker, 2, false);
	match shape {
		Shape::Simple { argv, .. } => {
			launch(state, &Argv::new(argv)?, &mut job_builder)?;
		},
		Shape::Piped { left, right } => {
			let (left, right) = (Argv::new(left)?, Argv::new(right)?);
			spawn_pipeline(state, &left, &right, &mut job_builder)?;
		},
	}
	let job = job_builder.build();
	debug!(pids = ?job.pids(), "foreground job started");
	let job = job::wait(job)?;
	foreground.exit()?;
	Ok(Outcome::Finished(job))
}

/// Processes one tokenized command line with the given process creation primitive.
pub fn eval_line_with<F: Fork>(state: &mut global::State, forker: F, tokens: &[String]) -> Result<Outcome> {
	let shape = parser::classify(tokens, state.markers)?;
	eval_with(state, forker, shape)
}

pub fn eval_line(state: &mut global::State, tokens: &[String]) -> Result<Outcome> {
	eval_line_with(state, SystemFork, tokens)
}
