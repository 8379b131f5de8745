#![forbid(unsafe_code)]
#![deny(clippy::allow_attributes, unsafe_op_in_unsafe_fn)]

pub mod authz;
pub mod config;
mod error;
pub mod groups;
pub mod keys;
pub mod pagination;
pub mod v1;

pub mod uuid;

pub use error::{Error, Result};

use std::{
	future::IntoFuture,
	net::{Ipv6Addr, SocketAddr},
};

use axum::routing::get;
use color_eyre::eyre::WrapErr as _;
use futures::FutureExt;
use sqlx::sqlite::SqlitePool;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HttpConfig;

pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A [`SqlitePool`] that has already been migrated.
#[derive(Debug, Clone)]
pub struct MigratedDbPool(SqlitePool);

impl MigratedDbPool {
	pub async fn new(pool: SqlitePool) -> color_eyre::Result<Self> {
		MIGRATOR
			.run(&pool)
			.await
			.wrap_err("failed to run migrations")?;

		Ok(Self(pool))
	}
}

#[derive(Debug)]
pub struct RouterConfig {
	pub v1: crate::v1::RouterConfig,
}

impl RouterConfig {
	pub fn build(self) -> axum::Router<()> {
		axum::Router::new()
			.route("/health", get(health))
			.merge(self.v1.build())
			.layer(TraceLayer::new_for_http())
	}
}

async fn health() -> &'static str {
	"ok"
}

/// Runs a HTTP server on a tokio task.
pub async fn spawn_http_server(
	cfg: HttpConfig,
	router: axum::Router,
) -> color_eyre::Result<(
	JoinHandle<color_eyre::Result<()>>,
	oneshot::Sender<()>,
)> {
	let listener = bind_listener(cfg.port).await?;
	let local_addr = listener
		.local_addr()
		.wrap_err("failed to read the bound address")?;
	info!("HTTP server listening on {local_addr}");

	let (tx, rx) = oneshot::channel();
	let task_handle = tokio::spawn(async move {
		let serve_fut = axum::serve(listener, router)
			.into_future()
			.map(|r| r.wrap_err("HTTP server crashed"));
		tokio::select! {
			result = serve_fut => result,
			_ = rx => {
				info!("killing HTTP server due to shutdown signal");
				Ok(())
			}
		}
	});

	Ok((task_handle, tx))
}

async fn bind_listener(port: u16) -> color_eyre::Result<TcpListener> {
	TcpListener::bind(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), port))
		.await
		.wrap_err_with(|| format!("failed to listen to tcp on port {}", port))
}
