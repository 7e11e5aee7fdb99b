/// Fatal engine errors. Read-only violations and values that cannot be
/// observed are reported as diagnostics, never as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(
		"maximum recursive updates exceeded: a job ran more than {limit} times in one flush, \
		 it is probably mutating state it depends on"
	)]
	RecursionLimit { limit: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
