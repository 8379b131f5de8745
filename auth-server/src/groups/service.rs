//! Token-gated group operations.
//!
//! Every operation resolves the presented token to an identity first. Writes
//! require the caller to own the group; reads are also open to members of
//! the group or of any of its ancestors.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
	Error, Result,
	keys::{Identity, service::KeyService},
	pagination::{Page, PageMetadata},
	uuid::UuidProvider,
};

use super::{
	Group, GroupKind, Metadata,
	memberships::MembershipStore,
	store::{GroupStore, ListParams, NewGroup},
};

/// What a caller supplies when creating a group. `kind` is mandatory for
/// roots and ignored otherwise.
#[derive(Debug, Clone, Default)]
pub struct CreateGroupParams {
	pub name: String,
	pub parent_id: Option<Uuid>,
	pub description: String,
	pub metadata: Metadata,
	pub kind: Option<GroupKind>,
}

/// Field updates for a group. Parent and kind are immutable; supplying
/// either fails the update.
#[derive(Debug, Clone, Default)]
pub struct UpdateGroupParams {
	pub name: Option<String>,
	pub description: Option<String>,
	pub metadata: Option<Metadata>,
	pub parent_id: Option<Uuid>,
	pub kind: Option<GroupKind>,
}

/// A group with its in-page children attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
	#[serde(flatten)]
	pub group: Group,
	pub children: Vec<GroupNode>,
}

/// Assembles a forest out of a flat page of groups.
///
/// Each group is attached to its parent when the parent is part of the same
/// page; groups whose parents fall outside the page become roots of the
/// forest. Input order is preserved on every level.
pub fn build_tree(groups: Vec<Group>) -> Vec<GroupNode> {
	let ids: HashSet<Uuid> = groups.iter().map(|group| group.id).collect();
	let mut children: HashMap<Uuid, Vec<Group>> = HashMap::new();
	let mut roots = Vec::new();
	for group in groups {
		match group.parent_id.filter(|parent| ids.contains(parent)) {
			Some(parent) => children.entry(parent).or_default().push(group),
			None => roots.push(group),
		}
	}

	fn attach(
		group: Group,
		children: &mut HashMap<Uuid, Vec<Group>>,
	) -> GroupNode {
		let own = children.remove(&group.id).unwrap_or_default();
		GroupNode {
			children: own
				.into_iter()
				.map(|child| attach(child, children))
				.collect(),
			group,
		}
	}

	roots
		.into_iter()
		.map(|group| attach(group, &mut children))
		.collect()
}

#[derive(Debug)]
pub struct GroupService {
	groups: GroupStore,
	memberships: MembershipStore,
	keys: Arc<KeyService>,
	uuids: Arc<UuidProvider>,
}

impl GroupService {
	pub fn new(
		groups: GroupStore,
		memberships: MembershipStore,
		keys: Arc<KeyService>,
		uuids: Arc<UuidProvider>,
	) -> Self {
		Self {
			groups,
			memberships,
			keys,
			uuids,
		}
	}

	#[tracing::instrument(skip_all, fields(name = %params.name))]
	pub async fn create_group(
		&self,
		token: &str,
		params: CreateGroupParams,
	) -> Result<Group> {
		let caller = self.keys.identify(token).await?;
		self.groups
			.save(NewGroup {
				id: self.uuids.next_v4(),
				owner_id: caller.id,
				parent_id: params.parent_id,
				name: params.name,
				description: params.description,
				metadata: params.metadata,
				kind: params.kind,
			})
			.await
	}

	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn update_group(
		&self,
		token: &str,
		id: Uuid,
		params: UpdateGroupParams,
	) -> Result<Group> {
		if params.parent_id.is_some() || params.kind.is_some() {
			return Err(Error::ParentInvariant);
		}
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(id).await?;
		self.authorize_write(&caller, &group)?;
		self.groups
			.update(id, params.name, params.description, params.metadata)
			.await
	}

	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn view_group(&self, token: &str, id: Uuid) -> Result<Group> {
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(id).await?;
		self.authorize_read(&caller, &group).await?;
		Ok(group)
	}

	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn remove_group(&self, token: &str, id: Uuid) -> Result<()> {
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(id).await?;
		self.authorize_write(&caller, &group)?;
		self.groups.delete(id).await
	}

	/// Lists the caller's own groups.
	#[tracing::instrument(skip_all)]
	pub async fn list_groups(
		&self,
		token: &str,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let caller = self.keys.identify(token).await?;
		self.groups.retrieve_all(caller.id, params).await
	}

	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn list_children(
		&self,
		token: &str,
		id: Uuid,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let caller = self.keys.identify(token).await?;
		let anchor = self.groups.retrieve_by_id(id).await?;
		self.authorize_read(&caller, &anchor).await?;
		self.groups.retrieve_descendants(id, params).await
	}

	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn list_parents(
		&self,
		token: &str,
		id: Uuid,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let caller = self.keys.identify(token).await?;
		let anchor = self.groups.retrieve_by_id(id).await?;
		self.authorize_read(&caller, &anchor).await?;
		self.groups.retrieve_ancestors(id, params).await
	}

	#[tracing::instrument(skip_all, fields(%group_id))]
	pub async fn assign(
		&self,
		token: &str,
		group_id: Uuid,
		kind: GroupKind,
		member_ids: &[String],
	) -> Result<()> {
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(group_id).await?;
		self.authorize_write(&caller, &group)?;
		self.memberships.assign(group_id, kind, member_ids).await
	}

	#[tracing::instrument(skip_all, fields(%group_id))]
	pub async fn unassign(
		&self,
		token: &str,
		group_id: Uuid,
		member_ids: &[String],
	) -> Result<()> {
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(group_id).await?;
		self.authorize_write(&caller, &group)?;
		self.memberships.unassign(group_id, member_ids).await
	}

	#[tracing::instrument(skip_all, fields(%group_id))]
	pub async fn list_members(
		&self,
		token: &str,
		group_id: Uuid,
		kind: GroupKind,
		page: PageMetadata,
	) -> Result<Page<String>> {
		let caller = self.keys.identify(token).await?;
		let group = self.groups.retrieve_by_id(group_id).await?;
		self.authorize_read(&caller, &group).await?;
		self.memberships.members(group_id, kind, page).await
	}

	/// Lists the groups a member belongs to. Unless the caller asks about
	/// themselves, only groups the caller owns are visible.
	#[tracing::instrument(skip_all)]
	pub async fn list_memberships(
		&self,
		token: &str,
		member_id: &str,
		page: PageMetadata,
	) -> Result<Page<Group>> {
		let caller = self.keys.identify(token).await?;
		let owner_id = if caller.id.to_string() == member_id {
			None
		} else {
			Some(caller.id)
		};
		self.memberships.memberships(member_id, owner_id, page).await
	}

	fn authorize_write(&self, caller: &Identity, group: &Group) -> Result<()> {
		if group.owner_id == caller.id {
			Ok(())
		} else {
			Err(Error::Unauthorized)
		}
	}

	async fn authorize_read(
		&self,
		caller: &Identity,
		group: &Group,
	) -> Result<()> {
		if group.owner_id == caller.id {
			return Ok(());
		}
		// Membership in the group or in any of its ancestors grants access.
		if self
			.memberships
			.is_member_of_any(&caller.id.to_string(), &group.path)
			.await?
		{
			return Ok(());
		}
		Err(Error::Unauthorized)
	}
}
