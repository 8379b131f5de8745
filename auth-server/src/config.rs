//! Structs representing the deserialized config file
//!
//! See [`Config`].

use std::{path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::authz::{Action, Policies};

pub const DEFAULT_CONFIG_CONTENTS: &str = include_str!("../default-config.toml");

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
	/// If `0`, uses a random available port.
	#[serde(default = "HttpConfig::default_port")]
	pub port: u16,
}

impl HttpConfig {
	const fn default_port() -> u16 {
		8190
	}
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			port: Self::default_port(),
		}
	}
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields, tag = "type", rename_all = "snake_case")]
pub enum DatabaseConfig {
	Sqlite { db_file: PathBuf },
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self::Sqlite {
			db_file: PathBuf::from(".").join("auth.db"),
		}
	}
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
	/// The process-wide token signing secret. Mandatory.
	#[serde(default)]
	pub secret: String,
	/// Expiry applied to API keys issued without one.
	#[serde(default = "AuthConfig::default_api_key_duration_secs")]
	pub api_key_duration_secs: u64,
}

impl AuthConfig {
	const fn default_api_key_duration_secs() -> u64 {
		60 * 60 * 24
	}
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			secret: String::new(),
			api_key_duration_secs: Self::default_api_key_duration_secs(),
		}
	}
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct GroupsConfig {
	/// Maximum depth of the group hierarchy, starting at 1 for roots.
	#[serde(default = "GroupsConfig::default_max_level")]
	pub max_level: u32,
}

impl GroupsConfig {
	const fn default_max_level() -> u32 {
		5
	}
}

impl Default for GroupsConfig {
	fn default() -> Self {
		Self {
			max_level: Self::default_max_level(),
		}
	}
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
	/// Actions members of `users` groups are granted.
	#[serde(default = "AuthzConfig::default_users")]
	pub users: Vec<Action>,
	/// Actions members of `things` groups are granted.
	#[serde(default = "AuthzConfig::default_things")]
	pub things: Vec<Action>,
}

impl AuthzConfig {
	fn default_users() -> Vec<Action> {
		vec![Action::Read, Action::Write]
	}

	fn default_things() -> Vec<Action> {
		vec![Action::Read]
	}

	pub fn policies(&self) -> Policies {
		Policies {
			users: self.users.clone(),
			things: self.things.clone(),
		}
	}
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			users: Self::default_users(),
			things: Self::default_things(),
		}
	}
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
	/// Where the peer user service answers identity lookups.
	#[serde(default = "IdentityConfig::default_base_url")]
	pub base_url: String,
}

impl IdentityConfig {
	fn default_base_url() -> String {
		String::from("http://localhost:8180")
	}
}

impl Default for IdentityConfig {
	fn default() -> Self {
		Self {
			base_url: Self::default_base_url(),
		}
	}
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
	#[error("error deserializing toml file: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("config file was invalid: {0}")]
	FailedValidation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ValidationError {
	#[error("auth.secret must not be empty")]
	MissingSecret,
	#[error("groups.max_level must be at least 1")]
	ZeroMaxLevel,
	#[error("identity.base_url is not a valid url")]
	InvalidIdentityUrl,
}

/// The contents of the config file. Contains all settings customizeable
/// during deployment.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub http: HttpConfig,
	#[serde(default)]
	pub database: DatabaseConfig,
	#[serde(default)]
	pub auth: AuthConfig,
	#[serde(default)]
	pub groups: GroupsConfig,
	#[serde(default)]
	pub authz: AuthzConfig,
	#[serde(default)]
	pub identity: IdentityConfig,
}

impl Config {
	/// Validates the deserialized config
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.auth.secret.is_empty() {
			return Err(ValidationError::MissingSecret);
		}
		if self.groups.max_level == 0 {
			return Err(ValidationError::ZeroMaxLevel);
		}
		if reqwest::Url::parse(&self.identity.base_url).is_err() {
			return Err(ValidationError::InvalidIdentityUrl);
		}
		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(str: &str) -> Result<Self, Self::Err> {
		let config: Self = toml::from_str(str)?;
		Ok(config)
	}
}
