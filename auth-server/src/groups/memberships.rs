//! The group↔member relation.
//!
//! Edges are tagged with the group's kind at assignment time and are unique
//! per `(group, member)`. Batch mutations are all-or-none.

use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, MigratedDbPool, Result,
	pagination::{Page, PageMetadata},
};

use super::{Group, GroupKind, store::GroupRow};

#[derive(Debug, Clone)]
pub struct MembershipStore {
	pool: MigratedDbPool,
}

impl MembershipStore {
	pub fn new(pool: MigratedDbPool) -> Self {
		Self { pool }
	}

	/// Assigns all the given members to the group, or none of them.
	///
	/// The supplied kind must match the group's kind, and none of the edges
	/// may already exist.
	pub async fn assign(
		&self,
		group_id: Uuid,
		kind: GroupKind,
		member_ids: &[String],
	) -> Result<()> {
		let mut tx = self.pool.0.begin().await?;

		let group_kind: Option<String> =
			sqlx::query_scalar("SELECT kind FROM groups WHERE id = $1")
				.bind(group_id)
				.fetch_optional(&mut *tx)
				.await?;
		let group_kind = group_kind.ok_or(Error::NotFound)?;
		if group_kind != kind.as_str() {
			return Err(Error::Malformed(
				"assignment kind does not match the group kind",
			));
		}

		// A member repeated within one batch is inserted once; only an edge
		// that predates the batch is a duplicate.
		let mut seen = std::collections::HashSet::new();
		let now = OffsetDateTime::now_utc();
		for member_id in member_ids {
			if !seen.insert(member_id.as_str()) {
				continue;
			}
			sqlx::query(
				"INSERT INTO group_relations \
				 (group_id, member_id, kind, created_at, updated_at) \
				 VALUES ($1, $2, $3, $4, $5)",
			)
			.bind(group_id)
			.bind(member_id)
			.bind(kind.as_str())
			.bind(now)
			.bind(now)
			.execute(&mut *tx)
			.await
			.map_err(|err| match Error::from(err) {
				Error::Conflict => Error::MemberAlreadyAssigned,
				err => err,
			})?;
		}

		tx.commit().await?;
		Ok(())
	}

	/// Removes the given members from the group. Removing a member that is
	/// not assigned is a success.
	pub async fn unassign(
		&self,
		group_id: Uuid,
		member_ids: &[String],
	) -> Result<()> {
		let mut tx = self.pool.0.begin().await?;

		let exists: Option<i64> =
			sqlx::query_scalar("SELECT 1 FROM groups WHERE id = $1")
				.bind(group_id)
				.fetch_optional(&mut *tx)
				.await?;
		if exists.is_none() {
			return Err(Error::NotFound);
		}
		if member_ids.is_empty() {
			return Ok(());
		}

		let mut builder = QueryBuilder::new(
			"DELETE FROM group_relations WHERE group_id = ",
		);
		builder.push_bind(group_id);
		builder.push(" AND member_id IN (");
		let mut separated = builder.separated(", ");
		for member_id in member_ids {
			separated.push_bind(member_id);
		}
		separated.push_unseparated(")");
		builder.build().execute(&mut *tx).await?;

		tx.commit().await?;
		Ok(())
	}

	/// Lists member ids assigned to the group under the given kind, ordered
	/// by assignment time.
	pub async fn members(
		&self,
		group_id: Uuid,
		kind: GroupKind,
		page: PageMetadata,
	) -> Result<Page<String>> {
		let exists: Option<i64> =
			sqlx::query_scalar("SELECT 1 FROM groups WHERE id = $1")
				.bind(group_id)
				.fetch_optional(&self.pool.0)
				.await?;
		if exists.is_none() {
			return Err(Error::NotFound);
		}

		let total: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM group_relations \
			 WHERE group_id = $1 AND kind = $2",
		)
		.bind(group_id)
		.bind(kind.as_str())
		.fetch_one(&self.pool.0)
		.await?;

		let members: Vec<String> = sqlx::query_scalar(
			"SELECT member_id FROM group_relations \
			 WHERE group_id = $1 AND kind = $2 \
			 ORDER BY created_at, member_id LIMIT $3 OFFSET $4",
		)
		.bind(group_id)
		.bind(kind.as_str())
		.bind(page.limit as i64)
		.bind(page.offset as i64)
		.fetch_all(&self.pool.0)
		.await?;

		Ok(Page::new(total as u64, page, members))
	}

	/// Lists the groups a member is assigned to, ordered by assignment time.
	/// With `owner_id` set, only that owner's groups are visible.
	pub async fn memberships(
		&self,
		member_id: &str,
		owner_id: Option<Uuid>,
		page: PageMetadata,
	) -> Result<Page<Group>> {
		let mut count = QueryBuilder::new(
			"SELECT COUNT(*) FROM group_relations r \
			 JOIN groups g ON g.id = r.group_id WHERE r.member_id = ",
		);
		count.push_bind(member_id);
		if let Some(owner_id) = owner_id {
			count.push(" AND g.owner_id = ");
			count.push_bind(owner_id);
		}
		let total: i64 =
			count.build_query_scalar().fetch_one(&self.pool.0).await?;

		let mut builder = QueryBuilder::new(
			"SELECT g.id, g.owner_id, g.parent_id, g.name, g.description, \
			 g.metadata, g.kind, g.path, g.level, g.created_at, g.updated_at \
			 FROM group_relations r JOIN groups g ON g.id = r.group_id \
			 WHERE r.member_id = ",
		);
		builder.push_bind(member_id);
		if let Some(owner_id) = owner_id {
			builder.push(" AND g.owner_id = ");
			builder.push_bind(owner_id);
		}
		builder.push(" ORDER BY r.created_at, g.id");
		builder.push(" LIMIT ");
		builder.push_bind(page.limit as i64);
		builder.push(" OFFSET ");
		builder.push_bind(page.offset as i64);

		let rows: Vec<GroupRow> =
			builder.build_query_as().fetch_all(&self.pool.0).await?;
		let groups: Result<Vec<Group>> =
			rows.into_iter().map(Group::try_from).collect();
		Ok(Page::new(total as u64, page, groups?))
	}

	/// All groups the member is directly assigned to, without paging.
	pub(crate) async fn groups_of(&self, member_id: &str) -> Result<Vec<Group>> {
		let rows: Vec<GroupRow> = sqlx::query_as(
			"SELECT g.id, g.owner_id, g.parent_id, g.name, g.description, \
			 g.metadata, g.kind, g.path, g.level, g.created_at, g.updated_at \
			 FROM group_relations r JOIN groups g ON g.id = r.group_id \
			 WHERE r.member_id = $1",
		)
		.bind(member_id)
		.fetch_all(&self.pool.0)
		.await?;

		rows.into_iter().map(Group::try_from).collect()
	}

	/// Whether the member is directly assigned to any of the given groups.
	pub(crate) async fn is_member_of_any(
		&self,
		member_id: &str,
		group_ids: &[Uuid],
	) -> Result<bool> {
		let mut builder = QueryBuilder::new(
			"SELECT COUNT(*) FROM group_relations WHERE member_id = ",
		);
		builder.push_bind(member_id);
		builder.push(" AND group_id IN (");
		let mut separated = builder.separated(", ");
		for group_id in group_ids {
			separated.push_bind(*group_id);
		}
		separated.push_unseparated(")");

		let found: i64 =
			builder.build_query_scalar().fetch_one(&self.pool.0).await?;
		Ok(found > 0)
	}
}
