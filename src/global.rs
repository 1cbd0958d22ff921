use crate::error::Result;
use crate::job::Reaper;
use crate::signal::Dispositions;
use crate::types::Markers;

/// Everything the shell keeps between command lines.
#[derive(Debug)]
pub struct State {
	pub dispositions: Dispositions,
	pub reaper: Reaper,
	pub markers: Markers,
}

impl State {
	pub fn new(markers: Markers) -> Result<State> {
		let dispositions = Dispositions::install()?;
		Ok(State { dispositions: dispositions, reaper: Reaper::new(), markers: markers })
	}
}
