use std::{
	future::Future,
	sync::atomic::{AtomicBool, Ordering},
};

use axum::Extension;
use tokio::{signal, sync::mpsc};

static CREATED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("shutdown handler already created")]
pub struct AlreadyCreatedError;

/// Owns the shutdown channel. Trips on SIGINT/SIGTERM, or on request from an
/// [`Agent`].
#[derive(Debug)]
pub struct Shutdown {
	sender: mpsc::Sender<()>,
	receiver: mpsc::Receiver<()>,
}

/// Cloneable handle for requesting shutdown from request handlers.
#[derive(Debug, Clone)]
pub struct Agent {
	sender: mpsc::Sender<()>,
}

impl Agent {
	pub async fn start(&self) {
		tracing::info!("Shutdown requested");
		self.sender.send(()).await.ok();
	}
}

impl Shutdown {
	/// Register the signal handlers. Only one instance may exist per
	/// process.
	///
	/// # Errors
	///
	/// This function will return an error if a handler was already created.
	pub fn new() -> Result<Self, AlreadyCreatedError> {
		if CREATED.swap(true, Ordering::SeqCst) {
			return Err(AlreadyCreatedError);
		}

		let (tx, rx) = mpsc::channel(1);

		let signal_tx = tx.clone();
		tokio::spawn(async move {
			wait_for_signal().await;
			signal_tx.send(()).await.ok();
		});

		Ok(Self {
			sender: tx,
			receiver: rx,
		})
	}

	pub fn handle(&mut self) -> impl Future<Output = ()> + '_ {
		let recv = self.receiver.recv();

		async move {
			recv.await;
		}
	}

	pub fn extension(&self) -> Extension<Agent> {
		Extension(Agent {
			sender: self.sender.clone(),
		})
	}
}

async fn wait_for_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}

	tracing::info!("Received shutdown signal");
}
