use std::{collections::HashMap, env, path::PathBuf};

use airflow_stats_core::{DEFAULT_PORT, PROCFS_PATH_ENV};

/// Exporter configuration, read from the environment. `CUSTOM_PROCFS_PATH`
/// points at the host's procfs when running containerized.
#[derive(Debug, Clone)]
pub struct Config {
	pub port: u16,
	pub procfs_path: PathBuf,
	pub prefix: Option<String>,
	pub labels: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("PORT is not a valid port number: {0}")]
	Port(#[from] std::num::ParseIntError),

	#[error("METRICS_LABELS entry is not KEY=VALUE: {0:?}")]
	Label(String),
}

impl Default for Config {
	fn default() -> Self {
		Self {
			port: DEFAULT_PORT,
			procfs_path: PathBuf::from("/proc"),
			prefix: None,
			labels: HashMap::new(),
		}
	}
}

impl Config {
	/// Read the configuration from the environment.
	///
	/// # Errors
	///
	/// This function will return an error if `PORT` is not a valid port
	/// number or a `METRICS_LABELS` entry is not of the form `KEY=VALUE`.
	pub fn from_env() -> Result<Self, Error> {
		Ok(Self {
			port: env::var("PORT").map_or(Ok(DEFAULT_PORT), |port| port.parse())?,
			procfs_path: env::var(PROCFS_PATH_ENV)
				.map_or_else(|_| PathBuf::from("/proc"), PathBuf::from),
			prefix: env::var("METRICS_PREFIX")
				.ok()
				.filter(|prefix| !prefix.is_empty()),
			labels: env::var("METRICS_LABELS")
				.ok()
				.map_or_else(|| Ok(HashMap::new()), |raw| parse_labels(&raw))?,
		})
	}
}

/// Parse a `key=value` comma list into constant labels applied to every
/// exported metric.
fn parse_labels(raw: &str) -> Result<HashMap<String, String>, Error> {
	raw.split(',')
		.map(str::trim)
		.filter(|entry| !entry.is_empty())
		.map(|entry| {
			entry
				.split_once('=')
				.map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
				.ok_or_else(|| Error::Label(entry.to_string()))
		})
		.collect()
}
