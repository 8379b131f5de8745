//! Typed bearer keys and their persistence.
//!
//! A key is immutable once issued; the only lifecycle transition after
//! issuance is removal through revocation. Recovery keys are transient and
//! never reach the store.

pub mod codec;
pub mod identity;
pub mod service;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, MigratedDbPool, Result};

/// Kind of issued key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
	/// Issued on login; authorizes the full API surface.
	User,
	/// Long-lived key for programmatic access; always carries an expiry.
	Api,
	/// Transient credential for account recovery; validated by signature
	/// only and never persisted.
	Recovery,
}

impl KeyKind {
	fn from_i64(value: i64) -> Option<Self> {
		match value {
			0 => Some(Self::User),
			1 => Some(Self::Api),
			2 => Some(Self::Recovery),
			_ => None,
		}
	}

	fn as_i64(self) -> i64 {
		match self {
			Self::User => 0,
			Self::Api => 1,
			Self::Recovery => 2,
		}
	}
}

/// Credential metadata bound into a signed token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Key {
	pub id: Uuid,
	#[serde(rename = "type")]
	pub kind: KeyKind,
	pub issuer_id: Uuid,
	pub subject: String,
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	#[serde(
		skip_serializing_if = "Option::is_none",
		with = "time::serde::rfc3339::option"
	)]
	pub expires_at: Option<OffsetDateTime>,
}

impl Key {
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}

/// The principal a validated token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub id: Uuid,
	pub email: String,
}

#[derive(FromRow)]
struct KeyRow {
	id: Uuid,
	kind: i64,
	issuer_id: Uuid,
	subject: String,
	issued_at: OffsetDateTime,
	expires_at: Option<OffsetDateTime>,
}

impl TryFrom<KeyRow> for Key {
	type Error = Error;

	fn try_from(row: KeyRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			kind: KeyKind::from_i64(row.kind)
				.ok_or(Error::Malformed("unknown key kind"))?,
			issuer_id: row.issuer_id,
			subject: row.subject,
			issued_at: row.issued_at,
			expires_at: row.expires_at,
		})
	}
}

/// Persists issued, non-revoked keys, unique per `(id, issuer_id)`.
#[derive(Debug, Clone)]
pub struct KeyStore {
	pool: MigratedDbPool,
}

impl KeyStore {
	pub fn new(pool: MigratedDbPool) -> Self {
		Self { pool }
	}

	pub async fn save(&self, key: &Key) -> Result<()> {
		debug_assert_ne!(
			key.kind,
			KeyKind::Recovery,
			"recovery keys are never persisted"
		);
		if key.kind == KeyKind::Recovery {
			return Err(Error::Malformed("recovery keys are never persisted"));
		}
		if key.subject.is_empty() {
			return Err(Error::Malformed("missing key subject"));
		}

		sqlx::query(
			"INSERT INTO keys (id, kind, issuer_id, subject, issued_at, expires_at) \
			 VALUES ($1, $2, $3, $4, $5, $6)",
		)
		.bind(key.id)
		.bind(key.kind.as_i64())
		.bind(key.issuer_id)
		.bind(&key.subject)
		.bind(key.issued_at)
		.bind(key.expires_at)
		.execute(&self.pool.0)
		.await?;

		Ok(())
	}

	pub async fn retrieve(&self, issuer_id: Uuid, id: Uuid) -> Result<Key> {
		let row: Option<KeyRow> = sqlx::query_as(
			"SELECT id, kind, issuer_id, subject, issued_at, expires_at \
			 FROM keys WHERE issuer_id = $1 AND id = $2",
		)
		.bind(issuer_id)
		.bind(id)
		.fetch_optional(&self.pool.0)
		.await?;

		row.ok_or(Error::NotFound)?.try_into()
	}

	/// Removing a key that does not exist is a success.
	pub async fn remove(&self, issuer_id: Uuid, id: Uuid) -> Result<()> {
		sqlx::query("DELETE FROM keys WHERE issuer_id = $1 AND id = $2")
			.bind(issuer_id)
			.bind(id)
			.execute(&self.pool.0)
			.await?;

		Ok(())
	}
}
