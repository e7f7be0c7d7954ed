use std::sync::Arc;

use axum::{
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Extension, Router,
};

use crate::collector::Collector;

pub fn handler() -> Router {
	Router::new().route("/metrics", get(metrics))
}

/// Every scrape triggers a fresh scan, so gauges always reflect the process
/// table at scrape time.
async fn metrics(Extension(collector): Extension<Arc<Collector>>) -> Response {
	match collector.collect().and_then(|_| collector.encode()) {
		Ok(body) => (
			[(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
			body,
		)
			.into_response(),
		Err(error) => {
			tracing::error!("Failed to collect stats: {error}");
			(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
		},
	}
}
