//! The error classification the service emits at its boundary.
//!
//! Store and transport causes are wrapped, never surfaced as the primary
//! kind; the HTTP layer maps each kind to a status code exactly once.

use crate::groups::InvalidName;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("missing or invalid credentials")]
	Unauthorized,
	#[error("credentials expired")]
	Expired,
	#[error(transparent)]
	InvalidName(#[from] InvalidName),
	#[error("malformed entity: {0}")]
	Malformed(&'static str),
	#[error("malformed token")]
	Token(#[source] jsonwebtoken::errors::Error),
	#[error("entity not found")]
	NotFound,
	#[error("entity already exists")]
	Conflict,
	#[error("parent group does not exist")]
	MissingParent,
	#[error("group level would exceed the configured maximum of {max}")]
	MaxLevelExceeded { max: u32 },
	#[error("group has members or a descendant with members")]
	GroupNotEmpty,
	#[error("member is already assigned to the group")]
	MemberAlreadyAssigned,
	#[error("group parent and kind cannot change after creation")]
	ParentInvariant,
	#[error("database failure")]
	Database(#[source] sqlx::Error),
	#[error("identity lookup failed")]
	Peer(#[source] reqwest::Error),
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::RowNotFound => Error::NotFound,
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				Error::Conflict
			}
			err => Error::Database(err),
		}
	}
}
