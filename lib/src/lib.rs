#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Extension;

use crate::{collector::Collector, config::Config, shutdown::Shutdown};

pub mod collector;
pub mod config;
pub mod procfs;
mod routes;
mod shutdown;

/// Start the exporter with the given configuration.
///
/// # Errors
///
/// This function will return an error if the metric registry cannot be built
/// or if the server fails to start.
pub async fn start(config: Config) -> Result<()> {
	let mut shutdown = Shutdown::new()?;
	let collector = Arc::new(Collector::new(&config)?);

	let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
	let app = routes::handler()
		.layer(Extension(collector))
		.layer(shutdown.extension());

	tracing::info!("Listening on {addr}");
	axum::Server::bind(&addr)
		.serve(app.into_make_service())
		.with_graceful_shutdown(shutdown.handle())
		.await?;

	Ok(())
}
