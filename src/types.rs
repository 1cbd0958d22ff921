/// Shape of one command line after classification.
///
/// Both variants borrow from the token vector handed to the classifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Shape<'a> {
	Simple { argv: &'a [String], background: bool },
	Piped { left: &'a [String], right: &'a [String] },
}

/// How the pipe and background markers are recognized.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Markers {
	/// The whole token must be `|` or `&`.
	Exact,
	/// Only the first character is checked, so `&foo` and `|x` count as markers.
	Prefix,
}

impl Markers {
	fn matches(self, token: &str, marker: char) -> bool {
		match self {
			Markers::Exact => token.len() == marker.len_utf8() && token.starts_with(marker),
			Markers::Prefix => token.starts_with(marker),
		}
	}

	pub fn is_background(self, token: &str) -> bool {
		self.matches(token, '&')
	}

	pub fn is_pipe(self, token: &str) -> bool {
		self.matches(token, '|')
	}
}

impl Default for Markers {
	fn default() -> Markers {
		Markers::Exact
	}
}
