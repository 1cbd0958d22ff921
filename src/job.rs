use std::sync::{Arc,Mutex,MutexGuard};
use std::thread;

use nix::errno::Errno;
use nix::sys::wait::{waitpid,WaitStatus};
use nix::unistd::{self,ForkResult,Pid};
use tracing::{debug,warn};

use crate::error::{Error,Result};

/// Process creation primitive. Swapped out in tests to simulate failures.
pub trait Fork {
	fn fork(&mut self) -> nix::Result<ForkResult>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFork;

impl Fork for SystemFork {
	fn fork(&mut self) -> nix::Result<ForkResult> {
		// SAFETY: the child only touches signal actions and descriptors before
		// exec or _exit, and never returns into shell logic.
		unsafe { unistd::fork() }
	}
}

pub trait WaitStatusExt {
	/// Exit code in shell convention, `128 + signal` for a killed process.
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// Processes created for one command line, in pipeline order.
#[derive(Debug)]
pub struct Job {
	pub processes: Vec<Process>,
	pub background: bool,
}

impl Job {
	/// Status of the last stage, which is what the shell reports.
	pub fn code(&self) -> Option<i32> {
		self.processes.last().and_then(|pr| pr.status.code())
	}

	pub fn pids(&self) -> Vec<Pid> {
		self.processes.iter().map(|pr| pr.pid).collect()
	}
}

#[derive(Debug)]
pub struct JobBuilder<F: Fork> {
	forker: F,
	imp: Job,
}

impl<F: Fork> JobBuilder<F> {
	pub fn new(forker: F, size_hint: usize, background: bool) -> JobBuilder<F> {
		JobBuilder {
			forker: forker,
			imp: Job { processes: Vec::with_capacity(size_hint), background: background },
		}
	}

	/// Forks one more process of the job. The parent records its handle.
	pub fn push_fork(&mut self) -> Result<ForkResult> {
		let r = self.forker.fork().map_err(Error::Fork)?;
		if let ForkResult::Parent { child } = r {
			self.imp.processes.push(Process { pid: child, status: WaitStatus::StillAlive });
		}
		Ok(r)
	}

	pub fn build(self) -> Job {
		assert!(!self.imp.processes.is_empty());
		self.imp
	}
}

fn wait_one(pid: Pid) -> Result<WaitStatus> {
	loop {
		match waitpid(pid, None) {
			Ok(status) => return Ok(status),
			Err(Errno::EINTR) => continue,
			Err(e) => return Err(Error::Wait { pid: pid, source: e }),
		}
	}
}

/// Blocks until every process of a foreground job has terminated.
///
/// Processes are waited in order. The first failure is returned at once and
/// the remaining handles are left alone, since the caller treats it as fatal.
pub fn wait(mut job: Job) -> Result<Job> {
	assert!(!job.background);
	for pr in job.processes.iter_mut() {
		pr.status = wait_one(pr.pid)?;
		debug!(pid = %pr.pid, status = ?pr.status, "process finished");
	}
	Ok(job)
}

/// Collects background children as soon as they terminate.
///
/// Every adopted pid gets a detached thread blocked in `waitpid` on that pid
/// alone, so foreground statuses are never stolen. Statuses are only logged.
#[derive(Debug, Default)]
pub struct Reaper {
	pending: Arc<Mutex<Vec<Pid>>>,
}

fn reap_one(pid: Pid) {
	loop {
		match waitpid(pid, None) {
			Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
				debug!(pid = %pid, status = ?status, "background process reaped");
				return;
			},
			Ok(_) | Err(Errno::EINTR) => continue,
			Err(e) => {
				warn!(pid = %pid, "dropping background process: {}", e);
				return;
			},
		}
	}
}

impl Reaper {
	pub fn new() -> Reaper {
		Reaper::default()
	}

	pub fn adopt(&mut self, job: Job) {
		assert!(job.background);
		for pid in job.pids() {
			self.pending_mut().push(pid);
			let pending = Arc::clone(&self.pending);
			let spawned = thread::Builder::new()
				.name(format!("reap-{}", pid))
				.spawn(move || {
					reap_one(pid);
					pending.lock().unwrap_or_else(|e| e.into_inner()).retain(|&p| p != pid);
				});
			if let Err(e) = spawned {
				warn!(pid = %pid, "cannot start reaper thread: {}", e);
				self.pending_mut().retain(|&p| p != pid);
			}
		}
	}

	fn pending_mut(&self) -> MutexGuard<'_, Vec<Pid>> {
		self.pending.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Background pids that have not terminated yet.
	pub fn pending(&self) -> Vec<Pid> {
		self.pending_mut().clone()
	}
}
