mod config;
mod error;
mod eval;
mod global;
mod job;
mod parser;
mod signal;
mod types;

use std::{env,io,process};
use io::{BufRead,IsTerminal};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use eval::Outcome;

/// Status reported for a line the shell itself refused to run.
const STATUS_USAGE: i32 = 2;

fn init_logging(args: &config::Args) {
	let filter = env::var("RUST_LOG").unwrap_or_else(|_| args.log_level().to_string());
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::new(filter))
		.with_writer(io::stderr)
		.with_target(false)
		.compact()
		.init();
}

/// Runs one input line. Returns the status to remember, or `None` for a blank line.
///
/// Only fatal errors are returned; anything else is reported and the loop goes on.
fn run_line(state: &mut global::State, line: &str) -> error::Result<Option<i32>> {
	run_line_with(state, job::SystemFork, line)
}

fn run_line_with<F: job::Fork>(state: &mut global::State, forker: F, line: &str) -> error::Result<Option<i32>> {
	let tokens = parser::split_tokens(line);
	if tokens.is_empty() {
		return Ok(None);
	}
	match eval::eval_line_with(state, forker, &tokens) {
		Ok(Outcome::Finished(job)) => Ok(job.code()),
		Ok(Outcome::Detached(pids)) => {
			debug!(pids = ?pids, "not waiting for background job");
			Ok(Some(0))
		},
		Err(e) if !e.is_fatal() => {
			eprintln!("ish: {}", e);
			Ok(Some(STATUS_USAGE))
		},
		Err(e) => Err(e),
	}
}

fn interactive(state: &mut global::State, prompt: &str) -> anyhow::Result<i32> {
	let mut rl = DefaultEditor::new()?;
	let mut last = 0;
	loop {
		match rl.readline(prompt) {
			Ok(line) => {
				rl.add_history_entry(line.as_str())?;
				if let Some(s) = run_line(state, &line)? {
					last = s;
				}
			},
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => break,
			Err(e) => return Err(e.into()),
		}
	}
	Ok(last)
}

fn batch(state: &mut global::State) -> anyhow::Result<i32> {
	let mut last = 0;
	for line in io::stdin().lock().lines() {
		if let Some(s) = run_line(state, &line?)? {
			last = s;
		}
	}
	Ok(last)
}

fn run(args: config::Args) -> anyhow::Result<i32> {
	let mut state = global::State::new(args.markers())?;
	if let Some(ref line) = args.command {
		return Ok(run_line(&mut state, line)?.unwrap_or(0));
	}
	let status = if io::stdin().is_terminal() {
		interactive(&mut state, &args.prompt)?
	} else {
		batch(&mut state)?
	};
	if !state.reaper.pending().is_empty() {
		debug!(pids = ?state.reaper.pending(), "leaving background jobs running");
	}
	Ok(status)
}

/// Turns the outcome of a whole session into the process exit status.
fn exit_status(result: anyhow::Result<i32>) -> i32 {
	match result {
		Ok(status) => status,
		Err(e) => {
			eprintln!("ish: {:#}", e);
			1
		},
	}
}

fn main() {
	let args: config::Args = argh::from_env();
	init_logging(&args);
	process::exit(exit_status(run(args)));
}

#[cfg(test)]
mod tests {
	use super::*;
	use nix::errno::Errno;
	use crate::job::tests::FailingFork;
	use crate::signal::tests::lock;
	use crate::types::Markers;

	#[test]
	fn failed_fork_ends_the_session() {
		let _l = lock();
		let mut state = global::State::new(Markers::Exact).unwrap();
		let e = match run_line_with(&mut state, FailingFork(Errno::EAGAIN), "echo hi") {
			Err(e) => e,
			r => panic!("unexpected {:?}", r),
		};
		assert!(e.is_fatal());
		assert_eq!(exit_status(Err(e.into())), 1);
	}

	#[test]
	fn failed_fork_in_pipeline_ends_the_session() {
		let _l = lock();
		let mut state = global::State::new(Markers::Exact).unwrap();
		let r = run_line_with(&mut state, FailingFork(Errno::ENOMEM), "ls | wc -l");
		assert!(matches!(r, Err(error::Error::Fork(Errno::ENOMEM))));
	}

	#[test]
	fn recoverable_errors_keep_the_session() {
		let _l = lock();
		let mut state = global::State::new(Markers::Exact).unwrap();
		assert_eq!(run_line_with(&mut state, FailingFork(Errno::EAGAIN), "a | b | c").unwrap(), Some(STATUS_USAGE));
		assert_eq!(run_line_with(&mut state, FailingFork(Errno::EAGAIN), "   ").unwrap(), None);
	}

	#[test]
	fn session_status_passes_through() {
		assert_eq!(exit_status(Ok(0)), 0);
		assert_eq!(exit_status(Ok(130)), 130);
	}
}
