//! Group persistence with materialized ancestry.
//!
//! Every row stores the full ancestor chain (`path`) next to its depth
//! (`level`), which makes ancestor lookups a single indexed read and
//! descendant listing a prefix scan.

use sqlx::{QueryBuilder, Sqlite, prelude::FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, MigratedDbPool, Result,
	pagination::{Page, PageMetadata},
};

use super::{
	Group, GroupKind, MAX_DESCRIPTION_LEN, Metadata, join_path, parse_path,
	validate_name,
};

const COLUMNS: &str = "id, owner_id, parent_id, name, description, metadata, \
	kind, path, level, created_at, updated_at";

/// Filters shared by the listing queries.
///
/// `level` caps the absolute level for owner-wide listing and the relative
/// depth for ancestor/descendant queries. The metadata filter is containment:
/// a row matches when its metadata includes every given pair.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
	pub level: Option<u32>,
	pub metadata: Metadata,
	pub page: PageMetadata,
}

/// What a caller supplies when creating a group. The store computes `path`,
/// `level`, and the timestamps; `kind` is only read for roots.
#[derive(Debug, Clone)]
pub struct NewGroup {
	pub id: Uuid,
	pub owner_id: Uuid,
	pub parent_id: Option<Uuid>,
	pub name: String,
	pub description: String,
	pub metadata: Metadata,
	pub kind: Option<GroupKind>,
}

#[derive(FromRow)]
pub(crate) struct GroupRow {
	id: Uuid,
	owner_id: Uuid,
	parent_id: Option<Uuid>,
	name: String,
	description: String,
	metadata: String,
	kind: String,
	path: String,
	level: i64,
	created_at: OffsetDateTime,
	updated_at: OffsetDateTime,
}

impl TryFrom<GroupRow> for Group {
	type Error = Error;

	fn try_from(row: GroupRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			owner_id: row.owner_id,
			parent_id: row.parent_id,
			name: row.name,
			description: row.description,
			metadata: serde_json::from_str(&row.metadata)
				.map_err(|_| Error::Malformed("corrupt group metadata"))?,
			kind: row
				.kind
				.parse()
				.map_err(|_| Error::Malformed("unknown group kind"))?,
			path: parse_path(&row.path)
				.ok_or(Error::Malformed("corrupt group path"))?,
			level: u32::try_from(row.level)
				.map_err(|_| Error::Malformed("corrupt group level"))?,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

fn push_metadata_filter(
	builder: &mut QueryBuilder<'_, Sqlite>,
	metadata: &Metadata,
) {
	for (key, value) in metadata {
		builder.push(" AND json_extract(metadata, ");
		builder.push_bind(format!("$.\"{key}\""));
		builder.push(") = json_extract(");
		builder.push_bind(value.to_string());
		builder.push(", '$')");
	}
}

fn push_page(builder: &mut QueryBuilder<'_, Sqlite>, page: PageMetadata) {
	builder.push(" LIMIT ");
	builder.push_bind(page.limit as i64);
	builder.push(" OFFSET ");
	builder.push_bind(page.offset as i64);
}

fn rows_into_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>> {
	rows.into_iter().map(Group::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct GroupStore {
	pool: MigratedDbPool,
	max_level: u32,
}

impl GroupStore {
	pub fn new(pool: MigratedDbPool, max_level: u32) -> Self {
		Self { pool, max_level }
	}

	/// Inserts a group, computing its path and level from the parent inside
	/// one transaction.
	pub async fn save(&self, new: NewGroup) -> Result<Group> {
		validate_name(&new.name)?;
		if new.description.len() > MAX_DESCRIPTION_LEN {
			return Err(Error::Malformed("description too long"));
		}

		let mut tx = self.pool.0.begin().await?;

		let (path, level, kind) = match new.parent_id {
			None => {
				let kind = new
					.kind
					.ok_or(Error::Malformed("root groups require a kind"))?;
				(vec![new.id], 1, kind)
			}
			Some(parent_id) => {
				let parent: Option<GroupRow> = sqlx::query_as(
					"SELECT id, owner_id, parent_id, name, description, \
					 metadata, kind, path, level, created_at, updated_at \
					 FROM groups WHERE id = $1",
				)
				.bind(parent_id)
				.fetch_optional(&mut *tx)
				.await?;
				let parent: Group =
					parent.ok_or(Error::MissingParent)?.try_into()?;
				if parent.owner_id != new.owner_id {
					return Err(Error::MissingParent);
				}

				let level = parent.level + 1;
				if level > self.max_level {
					return Err(Error::MaxLevelExceeded {
						max: self.max_level,
					});
				}
				let mut path = parent.path;
				path.push(new.id);
				(path, level, parent.kind)
			}
		};

		let now = OffsetDateTime::now_utc();
		let group = Group {
			id: new.id,
			owner_id: new.owner_id,
			parent_id: new.parent_id,
			name: new.name,
			description: new.description,
			metadata: new.metadata,
			kind,
			path,
			level,
			created_at: now,
			updated_at: now,
		};

		sqlx::query(
			"INSERT INTO groups (id, owner_id, parent_id, name, description, \
			 metadata, kind, path, level, created_at, updated_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
		)
		.bind(group.id)
		.bind(group.owner_id)
		.bind(group.parent_id)
		.bind(&group.name)
		.bind(&group.description)
		.bind(serde_json::to_string(&group.metadata).expect("map serializes"))
		.bind(group.kind.as_str())
		.bind(join_path(&group.path))
		.bind(i64::from(group.level))
		.bind(group.created_at)
		.bind(group.updated_at)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		Ok(group)
	}

	/// Updates name, description, and metadata. Parent and kind are fixed at
	/// creation; enforcing that is the service's concern.
	pub async fn update(
		&self,
		id: Uuid,
		name: Option<String>,
		description: Option<String>,
		metadata: Option<Metadata>,
	) -> Result<Group> {
		let mut tx = self.pool.0.begin().await?;

		let row: Option<GroupRow> = sqlx::query_as(
			"SELECT id, owner_id, parent_id, name, description, metadata, \
			 kind, path, level, created_at, updated_at \
			 FROM groups WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&mut *tx)
		.await?;
		let mut group: Group = row.ok_or(Error::NotFound)?.try_into()?;

		if let Some(name) = name {
			validate_name(&name)?;
			group.name = name;
		}
		if let Some(description) = description {
			if description.len() > MAX_DESCRIPTION_LEN {
				return Err(Error::Malformed("description too long"));
			}
			group.description = description;
		}
		if let Some(metadata) = metadata {
			group.metadata = metadata;
		}
		group.updated_at = OffsetDateTime::now_utc();

		sqlx::query(
			"UPDATE groups SET name = $1, description = $2, metadata = $3, \
			 updated_at = $4 WHERE id = $5",
		)
		.bind(&group.name)
		.bind(&group.description)
		.bind(serde_json::to_string(&group.metadata).expect("map serializes"))
		.bind(group.updated_at)
		.bind(group.id)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		Ok(group)
	}

	pub async fn retrieve_by_id(&self, id: Uuid) -> Result<Group> {
		let row: Option<GroupRow> = sqlx::query_as(
			"SELECT id, owner_id, parent_id, name, description, metadata, \
			 kind, path, level, created_at, updated_at \
			 FROM groups WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool.0)
		.await?;

		row.ok_or(Error::NotFound)?.try_into()
	}

	pub async fn retrieve_by_name(
		&self,
		owner_id: Uuid,
		parent_id: Option<Uuid>,
		name: &str,
	) -> Result<Group> {
		let mut builder = QueryBuilder::new("SELECT ");
		builder.push(COLUMNS);
		builder.push(" FROM groups WHERE owner_id = ");
		builder.push_bind(owner_id);
		builder.push(" AND name = ");
		builder.push_bind(name);
		match parent_id {
			None => {
				builder.push(" AND parent_id IS NULL");
			}
			Some(parent_id) => {
				builder.push(" AND parent_id = ");
				builder.push_bind(parent_id);
			}
		}

		let row: Option<GroupRow> = builder
			.build_query_as()
			.fetch_optional(&self.pool.0)
			.await?;
		row.ok_or(Error::NotFound)?.try_into()
	}

	/// Lists the owner's groups with `level` at most the cap, ordered by
	/// path.
	pub async fn retrieve_all(
		&self,
		owner_id: Uuid,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let cap = params.level.unwrap_or(self.max_level);

		let mut count = QueryBuilder::new(
			"SELECT COUNT(*) FROM groups WHERE owner_id = ",
		);
		count.push_bind(owner_id);
		count.push(" AND level <= ");
		count.push_bind(i64::from(cap));
		push_metadata_filter(&mut count, &params.metadata);
		let total: i64 =
			count.build_query_scalar().fetch_one(&self.pool.0).await?;

		let mut builder = QueryBuilder::new("SELECT ");
		builder.push(COLUMNS);
		builder.push(" FROM groups WHERE owner_id = ");
		builder.push_bind(owner_id);
		builder.push(" AND level <= ");
		builder.push_bind(i64::from(cap));
		push_metadata_filter(&mut builder, &params.metadata);
		builder.push(" ORDER BY path");
		push_page(&mut builder, params.page);

		let rows: Vec<GroupRow> =
			builder.build_query_as().fetch_all(&self.pool.0).await?;
		Ok(Page::new(
			total as u64,
			params.page,
			rows_into_groups(rows)?,
		))
	}

	/// Returns the child plus its ancestors up to `level` steps toward the
	/// root, ordered from the child upward.
	pub async fn retrieve_ancestors(
		&self,
		child_id: Uuid,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let child = self.retrieve_by_id(child_id).await?;
		let cap = params.level.unwrap_or(self.max_level);
		let min_level = child.level.saturating_sub(cap);

		let mut count = QueryBuilder::new(
			"SELECT COUNT(*) FROM groups WHERE level >= ",
		);
		count.push_bind(i64::from(min_level));
		push_id_filter(&mut count, &child.path);
		push_metadata_filter(&mut count, &params.metadata);
		let total: i64 =
			count.build_query_scalar().fetch_one(&self.pool.0).await?;

		let mut builder = QueryBuilder::new("SELECT ");
		builder.push(COLUMNS);
		builder.push(" FROM groups WHERE level >= ");
		builder.push_bind(i64::from(min_level));
		push_id_filter(&mut builder, &child.path);
		push_metadata_filter(&mut builder, &params.metadata);
		builder.push(" ORDER BY level DESC");
		push_page(&mut builder, params.page);

		let rows: Vec<GroupRow> =
			builder.build_query_as().fetch_all(&self.pool.0).await?;
		Ok(Page::new(
			total as u64,
			params.page,
			rows_into_groups(rows)?,
		))
	}

	/// Returns the parent plus every descendant whose depth below it is at
	/// most `level`, ordered by path. Within the cap, each returned group's
	/// ancestors are part of the result set as well.
	pub async fn retrieve_descendants(
		&self,
		parent_id: Uuid,
		params: &ListParams,
	) -> Result<Page<Group>> {
		let parent = self.retrieve_by_id(parent_id).await?;
		let cap = params.level.unwrap_or(self.max_level);
		let max_level = parent.level.saturating_add(cap);
		let prefix = join_path(&parent.path);

		let mut count = QueryBuilder::new(
			"SELECT COUNT(*) FROM groups WHERE level <= ",
		);
		count.push_bind(i64::from(max_level));
		push_path_filter(&mut count, &prefix);
		push_metadata_filter(&mut count, &params.metadata);
		let total: i64 =
			count.build_query_scalar().fetch_one(&self.pool.0).await?;

		let mut builder = QueryBuilder::new("SELECT ");
		builder.push(COLUMNS);
		builder.push(" FROM groups WHERE level <= ");
		builder.push_bind(i64::from(max_level));
		push_path_filter(&mut builder, &prefix);
		push_metadata_filter(&mut builder, &params.metadata);
		builder.push(" ORDER BY path");
		push_page(&mut builder, params.page);

		let rows: Vec<GroupRow> =
			builder.build_query_as().fetch_all(&self.pool.0).await?;
		Ok(Page::new(
			total as u64,
			params.page,
			rows_into_groups(rows)?,
		))
	}

	/// Deletes the group and its whole subtree in one transaction, provided
	/// no group in the subtree has members.
	pub async fn delete(&self, id: Uuid) -> Result<()> {
		let mut tx = self.pool.0.begin().await?;

		let row: Option<GroupRow> = sqlx::query_as(
			"SELECT id, owner_id, parent_id, name, description, metadata, \
			 kind, path, level, created_at, updated_at \
			 FROM groups WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&mut *tx)
		.await?;
		let group: Group = row.ok_or(Error::NotFound)?.try_into()?;
		let prefix = join_path(&group.path);
		let like = format!("{prefix}/%");

		let members: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM group_relations WHERE group_id IN \
			 (SELECT id FROM groups WHERE path = $1 OR path LIKE $2)",
		)
		.bind(&prefix)
		.bind(&like)
		.fetch_one(&mut *tx)
		.await?;
		if members > 0 {
			return Err(Error::GroupNotEmpty);
		}

		sqlx::query(
			"DELETE FROM group_relations WHERE group_id IN \
			 (SELECT id FROM groups WHERE path = $1 OR path LIKE $2)",
		)
		.bind(&prefix)
		.bind(&like)
		.execute(&mut *tx)
		.await?;
		sqlx::query("DELETE FROM groups WHERE path = $1 OR path LIKE $2")
			.bind(&prefix)
			.bind(&like)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(())
	}
}

fn push_id_filter(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
	builder.push(" AND id IN (");
	let mut separated = builder.separated(", ");
	for id in ids {
		separated.push_bind(*id);
	}
	separated.push_unseparated(")");
}

fn push_path_filter(builder: &mut QueryBuilder<'_, Sqlite>, prefix: &str) {
	builder.push(" AND (path = ");
	builder.push_bind(prefix.to_owned());
	builder.push(" OR path LIKE ");
	builder.push_bind(format!("{prefix}/%"));
	builder.push(")");
}
