mod compose;

pub use compose::{build_args, push_args, run_args, RunOptions};

use std::process::{Command, Stdio};

use crate::config::ImageSpec;

/// Errors that can occur when interacting with the docker CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Could not connect to Docker. Is the docker daemon running?")]
	NotRunning,

	#[error("`docker {0}` exited with {1}")]
	Failed(&'static str, std::process::ExitStatus),

	#[error("Failed to run command: {0}")]
	Spawn(#[from] std::io::Error),
}

impl Error {
	/// The process exit code to surface. Docker's own exit status passes
	/// through unchanged.
	#[must_use]
	pub fn exit_code(&self) -> i32 {
		match self {
			Self::Failed(_, status) => status.code().unwrap_or(1),
			Self::NotRunning | Self::Spawn(_) => 1,
		}
	}
}

/// A thin wrapper around the docker CLI.
pub struct Docker {}

impl Docker {
	/// Check if the docker daemon is running.
	///
	/// # Errors
	///
	/// Returns an error if the docker daemon is not running.
	pub fn check_connection() -> Result<(), Error> {
		let status = Command::new("docker")
			.arg("info")
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()?;

		if !status.success() {
			return Err(Error::NotRunning);
		}

		Ok(())
	}

	/// Build the image from `<BASE>.Dockerfile` in the current directory.
	///
	/// # Errors
	///
	/// Returns an error if docker cannot be spawned or the build fails.
	pub fn build(spec: &ImageSpec) -> Result<(), Error> {
		Self::exec("build", &build_args(spec))
	}

	/// Push the image to the registry.
	///
	/// # Errors
	///
	/// Returns an error if docker cannot be spawned or the push fails.
	pub fn push(spec: &ImageSpec) -> Result<(), Error> {
		Self::exec("push", &push_args(spec))
	}

	/// Run the image with access to the host's procfs.
	///
	/// # Errors
	///
	/// Returns an error if docker cannot be spawned or the container exits
	/// with a failure.
	pub fn run(spec: &ImageSpec, opts: &RunOptions) -> Result<(), Error> {
		Self::exec("run", &run_args(spec, opts))
	}

	// Stdio is inherited so docker's own output and progress reach the user.
	fn exec(name: &'static str, args: &[String]) -> Result<(), Error> {
		let status = Command::new("docker")
			.args(args)
			.stdin(Stdio::inherit())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.status()?;

		if !status.success() {
			return Err(Error::Failed(name, status));
		}

		Ok(())
	}
}
