#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use airflow_operator_stats::{config::Config, start};

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("airflow_operator_stats=info")),
		)
		.init();

	start(Config::from_env()?).await
}
