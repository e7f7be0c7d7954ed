#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub use stats::ProcessStats;
pub use task::AirflowTask;

pub mod stats;
pub mod task;

/// Docker Hub repository the image is published under.
pub const IMAGE_REPO: &str = "mastak/airflow_operator_stats";

/// Environment variable pointing the exporter at an alternate procfs root.
pub const PROCFS_PATH_ENV: &str = "CUSTOM_PROCFS_PATH";

/// Where the host's `/proc` is bind-mounted inside the container.
pub const HOST_PROCFS_PATH: &str = "/host-proc";

/// Default port for the metrics endpoint.
pub const DEFAULT_PORT: u16 = 9173;
