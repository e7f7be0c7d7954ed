use axum::Router;

mod metrics;
mod system;

pub fn handler() -> Router {
	Router::new()
		.merge(system::handler())
		.merge(metrics::handler())
}
