use tracing::debug;

use crate::error::{Error,Result};
use crate::types::{Markers,Shape};

/// Splits a raw input line into tokens. Quoting is not supported.
pub fn split_tokens(line: &str) -> Vec<String> {
	line.split_whitespace().map(str::to_owned).collect()
}

/// Classifies a tokenized command line.
///
/// The trailing background marker is stripped first, then the remainder is
/// scanned for a pipe separator. A pipeline carrying a trailing marker runs in
/// the foreground.
pub fn classify<'a>(tokens: &'a [String], markers: Markers) -> Result<Shape<'a>> {
	let mut line = tokens;
	let mut background = false;
	if let Some((last, rest)) = line.split_last() {
		if markers.is_background(last) {
			line = rest;
			background = true;
		}
	}
	if line.is_empty() {
		return Err(Error::EmptyCommand);
	}

	match line.iter().position(|t| markers.is_pipe(t)) {
		None => Ok(Shape::Simple { argv: line, background: background }),
		Some(i) => {
			let (left, right) = (&line[.. i], &line[i + 1 ..]);
			if left.is_empty() || right.is_empty() {
				return Err(Error::EmptyStage);
			}
			if right.iter().any(|t| markers.is_pipe(t)) {
				return Err(Error::TooManyStages);
			}
			if background {
				debug!("background marker ignored for pipeline");
			}
			Ok(Shape::Piped { left: left, right: right })
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn toks(line: &str) -> Vec<String> {
		split_tokens(line)
	}

	#[test]
	fn simple_command() {
		let t = toks("echo hi");
		assert_eq!(classify(&t, Markers::Exact).unwrap(), Shape::Simple { argv: &t[..], background: false });
	}

	#[test]
	fn trailing_ampersand_is_stripped() {
		let t = toks("sleep 5 &");
		match classify(&t, Markers::Exact).unwrap() {
			Shape::Simple { argv, background } => {
				assert_eq!(argv, &t[.. 2]);
				assert!(background);
			},
			s => panic!("unexpected shape {:?}", s),
		}
	}

	#[test]
	fn ampersand_only_counts_at_the_end() {
		let t = toks("echo & hi");
		assert_eq!(classify(&t, Markers::Exact).unwrap(), Shape::Simple { argv: &t[..], background: false });
	}

	#[test]
	fn pipe_splits_in_two() {
		let t = toks("ls | wc -l");
		assert_eq!(classify(&t, Markers::Exact).unwrap(), Shape::Piped { left: &t[.. 1], right: &t[2 ..] });
	}

	#[test]
	fn pipeline_with_ampersand_runs_in_foreground() {
		let t = toks("ls | wc -l &");
		// a Piped shape has no background flag to carry the stripped marker
		assert_eq!(classify(&t, Markers::Exact).unwrap(), Shape::Piped { left: &t[.. 1], right: &t[2 .. 4] });
	}

	#[test]
	fn lone_marker_is_empty() {
		let t = toks("&");
		assert!(matches!(classify(&t, Markers::Exact), Err(Error::EmptyCommand)));
		assert!(matches!(classify(&[], Markers::Exact), Err(Error::EmptyCommand)));
	}

	#[test]
	fn dangling_pipe_is_rejected() {
		assert!(matches!(classify(&toks("| wc"), Markers::Exact), Err(Error::EmptyStage)));
		assert!(matches!(classify(&toks("ls |"), Markers::Exact), Err(Error::EmptyStage)));
		assert!(matches!(classify(&toks("ls | &"), Markers::Exact), Err(Error::EmptyStage)));
	}

	#[test]
	fn second_pipe_is_rejected() {
		assert!(matches!(classify(&toks("a | b | c"), Markers::Exact), Err(Error::TooManyStages)));
	}

	#[test]
	fn exact_markers_ignore_lookalikes() {
		let t = toks("echo |x &foo");
		assert_eq!(classify(&t, Markers::Exact).unwrap(), Shape::Simple { argv: &t[..], background: false });
	}

	#[test]
	fn prefix_markers_match_first_character() {
		let t = toks("echo |x wc &foo");
		assert_eq!(classify(&t, Markers::Prefix).unwrap(), Shape::Piped { left: &t[.. 1], right: &t[2 .. 3] });
		let t = toks("sleep 1 &&");
		match classify(&t, Markers::Prefix).unwrap() {
			Shape::Simple { argv, background } => {
				assert_eq!(argv.len(), 2);
				assert!(background);
			},
			s => panic!("unexpected shape {:?}", s),
		}
	}

	#[test]
	fn split_ignores_extra_whitespace() {
		assert_eq!(split_tokens("  ls\t-l  \n"), vec!["ls".to_string(), "-l".to_string()]);
		assert!(split_tokens("   ").is_empty());
	}
}
