use argh::FromArgs;

use crate::types::Markers;

pub const DEFAULT_PROMPT: &str = "ish> ";

/// A minimal shell: simple commands, one pipe, and background jobs.
#[derive(FromArgs, Debug)]
pub struct Args {
	/// run a single command line and exit with its status
	#[argh(option, short = 'c')]
	pub command: Option<String>,

	/// prompt shown when reading from a terminal
	#[argh(option, default = "DEFAULT_PROMPT.to_string()")]
	pub prompt: String,

	/// treat any token starting with '|' or '&' as a marker
	#[argh(switch)]
	pub prefix_markers: bool,

	/// log job and signal handling to stderr
	#[argh(switch, short = 'v')]
	pub verbose: bool,
}

impl Args {
	pub fn markers(&self) -> Markers {
		if self.prefix_markers { Markers::Prefix } else { Markers::Exact }
	}

	/// Filter used when RUST_LOG is not set.
	pub fn log_level(&self) -> &'static str {
		if self.verbose { "debug" } else { "warn" }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Args {
		Args::from_args(&["ish"], args).unwrap()
	}

	#[test]
	fn defaults() {
		let a = parse(&[]);
		assert_eq!(a.command, None);
		assert_eq!(a.prompt, DEFAULT_PROMPT);
		assert_eq!(a.markers(), Markers::Exact);
		assert_eq!(a.log_level(), "warn");
	}

	#[test]
	fn flags() {
		let a = parse(&["-c", "ls | wc", "--prefix-markers", "-v", "--prompt", "$ "]);
		assert_eq!(a.command.as_deref(), Some("ls | wc"));
		assert_eq!(a.prompt, "$ ");
		assert_eq!(a.markers(), Markers::Prefix);
		assert_eq!(a.log_level(), "debug");
	}
}
