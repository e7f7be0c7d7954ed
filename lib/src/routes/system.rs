use std::sync::Arc;

use axum::{
	routing::{get, post},
	Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::{collector::Collector, shutdown::Agent as Shutdown};

pub fn handler() -> Router {
	Router::new()
		.route("/", get(root))
		.route("/health-check", get(health_check))
		.route("/shutdown", post(shutdown))
}

#[allow(clippy::unused_async)]
async fn root() -> Json<Value> {
	Json(json!({ "metrics_url": "/metrics" }))
}

#[allow(clippy::unused_async)]
async fn health_check(Extension(collector): Extension<Arc<Collector>>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"processes_last_scan": collector.last_seen(),
	}))
}

async fn shutdown(Extension(shutdown): Extension<Shutdown>) -> Json<Value> {
	shutdown.start().await;

	Json(json!(""))
}
