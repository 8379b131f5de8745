//! Access decisions over the membership graph.

use std::{collections::HashSet, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	Error, Result,
	groups::{GroupKind, memberships::MembershipStore},
};

/// What a member may do with an object through a shared group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Read,
	Write,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown action")]
pub struct UnknownAction;

impl FromStr for Action {
	type Err = UnknownAction;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"read" => Ok(Self::Read),
			"write" => Ok(Self::Write),
			_ => Err(UnknownAction),
		}
	}
}

/// The actions each group kind grants its members. Initialized once at
/// startup, immutable thereafter.
#[derive(Debug, Clone)]
pub struct Policies {
	pub users: Vec<Action>,
	pub things: Vec<Action>,
}

impl Policies {
	fn permits(&self, kind: GroupKind, action: Action) -> bool {
		match kind {
			GroupKind::Users => self.users.contains(&action),
			GroupKind::Things => self.things.contains(&action),
		}
	}
}

/// Answers "may subject S perform action A on object O?".
///
/// Both sides resolve to their direct groups plus all ancestors. The subject
/// is allowed when it owns a group the object belongs to, or when the two
/// sets intersect in a group whose kind grants the action.
#[derive(Debug)]
pub struct AuthzResolver {
	memberships: MembershipStore,
	policies: Policies,
}

impl AuthzResolver {
	pub fn new(memberships: MembershipStore, policies: Policies) -> Self {
		Self {
			memberships,
			policies,
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn check(
		&self,
		subject: &str,
		object: &str,
		action: &str,
	) -> Result<bool> {
		if subject.is_empty() || object.is_empty() || action.is_empty() {
			return Err(Error::Malformed(
				"subject, object, and action are all required",
			));
		}
		let action: Action = action
			.parse()
			.map_err(|_| Error::Malformed("unknown action"))?;

		let object_groups = self.memberships.groups_of(object).await?;
		if object_groups
			.iter()
			.any(|group| group.owner_id.to_string() == subject)
		{
			return Ok(true);
		}

		let subject_set: HashSet<Uuid> = self
			.memberships
			.groups_of(subject)
			.await?
			.into_iter()
			.flat_map(|group| group.path)
			.collect();

		Ok(object_groups.iter().any(|group| {
			self.policies.permits(group.kind, action)
				&& group.path.iter().any(|id| subject_set.contains(id))
		}))
	}
}
