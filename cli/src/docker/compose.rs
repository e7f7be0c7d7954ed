use airflow_stats_core::{HOST_PROCFS_PATH, PROCFS_PATH_ENV};

use crate::config::ImageSpec;

/// Extra, optional knobs for `docker run`. The privileged flag set itself is
/// not negotiable; the exporter cannot read foreign processes without it.
#[derive(Debug, Default)]
pub struct RunOptions {
	/// HOST:CONTAINER port mapping for the metrics endpoint.
	pub publish: Option<String>,
}

/// Arguments for `docker build`, minus the leading program name.
#[must_use]
pub fn build_args(spec: &ImageSpec) -> Vec<String> {
	vec![
		"build".to_string(),
		"--file".to_string(),
		spec.dockerfile(),
		"--tag".to_string(),
		spec.image_name(),
		".".to_string(),
	]
}

/// Arguments for `docker push`.
#[must_use]
pub fn push_args(spec: &ImageSpec) -> Vec<String> {
	vec!["push".to_string(), spec.image_name()]
}

/// Arguments for `docker run`. The host's procfs is mounted read-only and
/// the exporter is pointed at it via the environment.
#[must_use]
pub fn run_args(spec: &ImageSpec, opts: &RunOptions) -> Vec<String> {
	let mut args = vec![
		"run".to_string(),
		"--rm".to_string(),
		"--privileged".to_string(),
		"--cap-add".to_string(),
		"SYS_PTRACE".to_string(),
		"--volume".to_string(),
		format!("/proc:{HOST_PROCFS_PATH}:ro"),
		"--env".to_string(),
		format!("{PROCFS_PATH_ENV}={HOST_PROCFS_PATH}"),
	];

	if let Some(publish) = &opts.publish {
		args.push("--publish".to_string());
		args.push(publish.clone());
	}

	args.push(spec.image_name());
	args
}
