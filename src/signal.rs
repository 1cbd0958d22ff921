//! Signal dispositions of the shell and of the children it forks.
//!
//! The shell itself ignores SIGINT only while a foreground job is outstanding.
//! Children get back the SIGINT action the shell inherited at startup, so the
//! user can still interrupt a runaway job.

use nix::sys::signal::{sigaction,SaFlags,SigAction,SigHandler,SigSet,Signal};
use tracing::{debug,error};

use crate::error::{Error,Result};

fn action(handler: SigHandler) -> SigAction {
	SigAction::new(handler, SaFlags::empty(), SigSet::empty())
}

fn set(signal: Signal, new: &SigAction) -> nix::Result<SigAction> {
	// SAFETY: only SIG_DFL, SIG_IGN or actions previously returned by sigaction
	// are installed, none of which run Rust code in signal context.
	unsafe { sigaction(signal, new) }
}

fn replace(signal: Signal, new: &SigAction) -> Result<SigAction> {
	set(signal, new).map_err(|e| Error::Signal { signal: signal, source: e })
}

/// Process-wide signal configuration owned by the shell.
#[derive(Debug)]
pub struct Dispositions {
	startup_interrupt: SigAction,
	at_rest_child: SigAction,
}

impl Dispositions {
	/// Captures the inherited SIGINT action and puts SIGCHLD in its at-rest state.
	///
	/// SIGCHLD is kept at its default action. An ignored SIGCHLD would make the
	/// kernel discard every child, including the foreground ones we wait for, so
	/// background children are collected by [`crate::job::Reaper`] instead.
	pub fn install() -> Result<Dispositions> {
		let startup_interrupt = replace(Signal::SIGINT, &action(SigHandler::SigIgn))?;
		replace(Signal::SIGINT, &startup_interrupt)?;
		let at_rest_child = action(SigHandler::SigDfl);
		let inherited_child = replace(Signal::SIGCHLD, &at_rest_child)?;
		debug!(interrupt = ?startup_interrupt.handler(), inherited_child = ?inherited_child.handler(),
		       "signal dispositions installed");
		Ok(Dispositions { startup_interrupt: startup_interrupt, at_rest_child: at_rest_child })
	}

	/// Makes the shell immune to SIGINT until the returned guard is exited or dropped.
	pub fn enter_foreground_job(&self) -> Result<ForegroundJob> {
		let prior = replace(Signal::SIGINT, &action(SigHandler::SigIgn))?;
		debug!("SIGINT ignored for foreground job");
		Ok(ForegroundJob { prior: Some(prior) })
	}

	/// Restores the dispositions a freshly forked child should exec with.
	///
	/// Runs between fork and exec, so it must not allocate or log.
	pub fn reset_in_child(&self) -> nix::Result<()> {
		set(Signal::SIGINT, &self.startup_interrupt)?;
		set(Signal::SIGCHLD, &self.at_rest_child)?;
		// the Rust runtime ignores SIGPIPE, which must not leak into programs
		set(Signal::SIGPIPE, &action(SigHandler::SigDfl))?;
		Ok(())
	}
}

/// Scope of a foreground job. Holds the SIGINT action to put back.
#[derive(Debug)]
#[must_use]
pub struct ForegroundJob {
	prior: Option<SigAction>,
}

impl ForegroundJob {
	/// Restores the SIGINT action captured on entry.
	pub fn exit(mut self) -> Result<()> {
		self.restore()
	}

	fn restore(&mut self) -> Result<()> {
		match self.prior.take() {
			Some(prior) => {
				replace(Signal::SIGINT, &prior)?;
				debug!("SIGINT disposition restored");
				Ok(())
			},
			None => Ok(()),
		}
	}
}

impl Drop for ForegroundJob {
	fn drop(&mut self) {
		if let Err(e) = self.restore() {
			error!("{}", e);
		}
	}
}
