//! Groups: a persistent forest of named nodes, owned by the principal whose
//! user key created them.

pub mod memberships;
pub mod service;
pub mod store;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 254;
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// Kind of a group. Fixed at the root, inherited by every descendant, and
/// copied onto membership edges at assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
	Users,
	Things,
}

impl GroupKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Users => "users",
			Self::Things => "things",
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown group kind")]
pub struct UnknownKind;

impl FromStr for GroupKind {
	type Err = UnknownKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"users" => Ok(Self::Users),
			"things" => Ok(Self::Things),
			_ => Err(UnknownKind),
		}
	}
}

/// Free-form key→value annotations on a group.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A node in the group forest.
///
/// `path` is the ordered ancestor chain from the root down to the node
/// itself; `level` is its length, starting at 1 for roots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
	pub id: Uuid,
	pub owner_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<Uuid>,
	pub name: String,
	pub description: String,
	pub metadata: Metadata,
	#[serde(rename = "type")]
	pub kind: GroupKind,
	pub path: Vec<Uuid>,
	pub level: u32,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidName {
	#[error("the name cannot be empty")]
	Empty,
	#[error("the name must be no longer than {MAX_NAME_LEN} characters")]
	TooLong,
	#[error("the name must start with a letter or a digit")]
	InvalidStart,
	#[error(
		"the only allowed characters are letters, digits, underscores, and hyphens"
	)]
	InvalidCharacter,
}

pub(crate) fn validate_name(name: &str) -> Result<(), InvalidName> {
	let Some(&first) = name.as_bytes().first() else {
		return Err(InvalidName::Empty);
	};
	if name.len() > MAX_NAME_LEN {
		return Err(InvalidName::TooLong);
	}
	if !first.is_ascii_alphanumeric() {
		return Err(InvalidName::InvalidStart);
	}
	for c in name.bytes() {
		if !c.is_ascii_alphanumeric() && c != b'_' && c != b'-' {
			return Err(InvalidName::InvalidCharacter);
		}
	}
	Ok(())
}

pub(crate) fn join_path(path: &[Uuid]) -> String {
	let ids: Vec<String> = path.iter().map(Uuid::to_string).collect();
	ids.join("/")
}

pub(crate) fn parse_path(path: &str) -> Option<Vec<Uuid>> {
	path.split('/').map(|id| id.parse().ok()).collect()
}
