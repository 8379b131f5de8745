use std::{path::PathBuf, sync::Arc};

use clap::Parser as _;
use color_eyre::eyre::{Context, Result};
use futures::FutureExt;
use time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use auth_server::{
	MigratedDbPool, RouterConfig, spawn_http_server,
	authz::AuthzResolver,
	config::{Config, DatabaseConfig},
	groups::{
		memberships::MembershipStore, service::GroupService, store::GroupStore,
	},
	keys::{
		KeyStore, codec::TokenCodec, identity::IdentityProvider,
		service::KeyService,
	},
	uuid::UuidProvider,
};

#[derive(clap::Parser, Debug)]
struct Cli {
	#[clap(long, env)]
	config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or("info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let cli = Cli::parse();

	let config_file = tokio::fs::read_to_string(cli.config)
		.await
		.wrap_err("failed to read config file")?;
	let config: Config =
		config_file.parse().wrap_err("config file was invalid")?;
	config
		.validate()
		.wrap_err("config file failed validation")?;

	let db_pool = {
		let DatabaseConfig::Sqlite { ref db_file } = config.database;
		let connect_opts = sqlx::sqlite::SqliteConnectOptions::new()
			.create_if_missing(true)
			.filename(db_file);
		let pool = sqlx::sqlite::SqlitePoolOptions::new()
			.connect_with(connect_opts.clone())
			.await
			.wrap_err_with(|| {
				format!(
					"failed to connect to database with path {}",
					connect_opts.get_filename().display()
				)
			})?;
		MigratedDbPool::new(pool)
			.await
			.wrap_err("failed to migrate db pool")?
	};

	let identity_url = reqwest::Url::parse(&config.identity.base_url)
		.wrap_err("identity.base_url was not a valid url")?;

	let uuids = Arc::new(UuidProvider::new_random());
	let keys = Arc::new(KeyService::new(
		KeyStore::new(db_pool.clone()),
		TokenCodec::new(&config.auth.secret),
		IdentityProvider::http(identity_url, reqwest::Client::new()),
		Arc::clone(&uuids),
		Duration::seconds(config.auth.api_key_duration_secs as i64),
	));
	let groups = Arc::new(GroupService::new(
		GroupStore::new(db_pool.clone(), config.groups.max_level),
		MembershipStore::new(db_pool.clone()),
		Arc::clone(&keys),
		Arc::clone(&uuids),
	));
	let authz = Arc::new(AuthzResolver::new(
		MembershipStore::new(db_pool),
		config.authz.policies(),
	));

	let router = RouterConfig {
		v1: auth_server::v1::RouterConfig {
			groups,
			keys,
			authz,
		},
	}
	.build();

	let (server_task, _kill_signal) =
		spawn_http_server(config.http.clone(), router)
			.await
			.wrap_err("failed to spawn http server")?;

	let kill_fut = tokio::signal::ctrl_c().map(|r| {
		info!("detected ctrl-c, shutting down...");
		r.wrap_err("error getting ctrl-c signal")
	});

	tokio::select! {
		result = kill_fut => result,
		result = server_task => result.wrap_err("HTTP server panicked")?,
	}
}
