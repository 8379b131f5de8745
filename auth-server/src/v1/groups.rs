//! Group management endpoints.

use axum::{
	Json,
	extract::{Path, Query, State},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	Error,
	groups::{
		Group, GroupKind, Metadata,
		service::{CreateGroupParams, GroupNode, UpdateGroupParams, build_tree},
		store::ListParams,
	},
	pagination::{Page, PageMetadata},
};

use super::{ApiError, RouterState, Token};

fn default_limit() -> u64 {
	PageMetadata::DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
	#[serde(default)]
	offset: u64,
	#[serde(default = "default_limit")]
	limit: u64,
	#[serde(default)]
	level: Option<u32>,
	/// JSON-encoded metadata containment filter.
	#[serde(default)]
	metadata: Option<String>,
	#[serde(default)]
	tree: bool,
}

impl ListQuery {
	fn params(&self) -> Result<ListParams, ApiError> {
		let metadata: Metadata = match self.metadata {
			None => Metadata::new(),
			Some(ref raw) => serde_json::from_str(raw).map_err(|_| {
				ApiError::from(Error::Malformed(
					"metadata filter must be a json object",
				))
			})?,
		};
		Ok(ListParams {
			level: self.level,
			metadata,
			page: PageMetadata {
				offset: self.offset,
				limit: self.limit,
			},
		})
	}
}

#[derive(Debug, Serialize)]
pub(super) struct GroupPage {
	total: u64,
	offset: u64,
	limit: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	level: Option<u32>,
	groups: Vec<Group>,
}

#[derive(Debug, Serialize)]
pub(super) struct GroupForest {
	total: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	level: Option<u32>,
	groups: Vec<GroupNode>,
}

fn page_response(query: &ListQuery, page: Page<Group>) -> Response {
	if query.tree {
		Json(GroupForest {
			total: page.total,
			level: query.level,
			groups: build_tree(page.items),
		})
		.into_response()
	} else {
		Json(GroupPage {
			total: page.total,
			offset: page.offset,
			limit: page.limit,
			level: query.level,
			groups: page.items,
		})
		.into_response()
	}
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateGroupReq {
	name: String,
	#[serde(default)]
	parent_id: Option<Uuid>,
	#[serde(default)]
	description: String,
	#[serde(default)]
	metadata: Metadata,
	#[serde(rename = "type", default)]
	kind: Option<GroupKind>,
}

#[tracing::instrument(skip_all)]
pub(super) async fn create(
	state: State<RouterState>,
	Token(token): Token,
	Json(req): Json<CreateGroupReq>,
) -> Result<impl IntoResponse, ApiError> {
	let group = state
		.groups
		.create_group(
			&token,
			CreateGroupParams {
				name: req.name,
				parent_id: req.parent_id,
				description: req.description,
				metadata: req.metadata,
				kind: req.kind,
			},
		)
		.await?;

	let location = format!("/groups/{}", group.id);
	Ok((
		StatusCode::CREATED,
		[(header::LOCATION, location)],
		Json(group),
	))
}

#[tracing::instrument(skip_all)]
pub(super) async fn list(
	state: State<RouterState>,
	Token(token): Token,
	Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
	let params = query.params()?;
	let page = state.groups.list_groups(&token, &params).await?;
	Ok(page_response(&query, page))
}

#[tracing::instrument(skip_all)]
pub(super) async fn view(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
) -> Result<Json<Group>, ApiError> {
	Ok(Json(state.groups.view_group(&token, id).await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateGroupReq {
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	metadata: Option<Metadata>,
}

#[tracing::instrument(skip_all)]
pub(super) async fn update(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
	Json(req): Json<UpdateGroupReq>,
) -> Result<Json<Group>, ApiError> {
	let group = state
		.groups
		.update_group(
			&token,
			id,
			UpdateGroupParams {
				name: req.name,
				description: req.description,
				metadata: req.metadata,
				parent_id: None,
				kind: None,
			},
		)
		.await?;
	Ok(Json(group))
}

#[tracing::instrument(skip_all)]
pub(super) async fn remove(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.groups.remove_group(&token, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub(super) async fn children(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
	Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
	let params = query.params()?;
	let page = state.groups.list_children(&token, id, &params).await?;
	Ok(page_response(&query, page))
}

#[tracing::instrument(skip_all)]
pub(super) async fn parents(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
	Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
	let params = query.params()?;
	let page = state.groups.list_parents(&token, id, &params).await?;
	Ok(page_response(&query, page))
}

#[derive(Debug, Deserialize)]
pub(super) struct MembersQuery {
	#[serde(rename = "type")]
	kind: GroupKind,
	#[serde(default)]
	offset: u64,
	#[serde(default = "default_limit")]
	limit: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct MembersPage {
	total: u64,
	offset: u64,
	limit: u64,
	#[serde(rename = "type")]
	kind: GroupKind,
	members: Vec<String>,
}

#[tracing::instrument(skip_all)]
pub(super) async fn members(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
	Query(query): Query<MembersQuery>,
) -> Result<Json<MembersPage>, ApiError> {
	let page = state
		.groups
		.list_members(
			&token,
			id,
			query.kind,
			PageMetadata {
				offset: query.offset,
				limit: query.limit,
			},
		)
		.await?;
	Ok(Json(MembersPage {
		total: page.total,
		offset: page.offset,
		limit: page.limit,
		kind: query.kind,
		members: page.items,
	}))
}

#[derive(Debug, Deserialize)]
pub(super) struct MembersReq {
	members: Vec<String>,
}

#[tracing::instrument(skip_all)]
pub(super) async fn assign(
	state: State<RouterState>,
	Token(token): Token,
	Path((id, kind)): Path<(Uuid, GroupKind)>,
	Json(req): Json<MembersReq>,
) -> Result<StatusCode, ApiError> {
	state.groups.assign(&token, id, kind, &req.members).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub(super) async fn unassign(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
	Json(req): Json<MembersReq>,
) -> Result<StatusCode, ApiError> {
	state.groups.unassign(&token, id, &req.members).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(super) struct PageQuery {
	#[serde(default)]
	offset: u64,
	#[serde(default = "default_limit")]
	limit: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct MembershipsPage {
	total: u64,
	offset: u64,
	limit: u64,
	groups: Vec<Group>,
}

#[tracing::instrument(skip_all)]
pub(super) async fn memberships(
	state: State<RouterState>,
	Token(token): Token,
	Path(member_id): Path<String>,
	Query(query): Query<PageQuery>,
) -> Result<Json<MembershipsPage>, ApiError> {
	let page = state
		.groups
		.list_memberships(
			&token,
			&member_id,
			PageMetadata {
				offset: query.offset,
				limit: query.limit,
			},
		)
		.await?;
	Ok(Json(MembershipsPage {
		total: page.total,
		offset: page.offset,
		limit: page.limit,
		groups: page.items,
	}))
}

#[cfg(test)]
mod tests {
	use axum::{body::Body, http::Request};
	use sqlx::SqlitePool;
	use tower::ServiceExt as _;

	use crate::v1::testutil::{TestServer, alice, bob, body_json, test_server};

	use super::*;

	async fn create_group(
		server: &TestServer,
		token: &str,
		name: &str,
		parent_id: Option<&str>,
		kind: Option<&str>,
	) -> serde_json::Value {
		let mut body = serde_json::json!({ "name": name });
		if let Some(parent_id) = parent_id {
			body["parent_id"] = parent_id.into();
		}
		if let Some(kind) = kind {
			body["type"] = kind.into();
		}
		let response = server
			.request("POST", "/groups", Some(token), Some(body))
			.await;
		assert_eq!(response.status(), StatusCode::CREATED);
		body_json(response).await
	}

	fn id_of(group: &serde_json::Value) -> String {
		group["id"].as_str().expect("group id").to_owned()
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_create_root_and_child(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;

		let root = create_group(&server, &token, "root", None, Some("things"))
			.await;
		assert_eq!(root["level"], 1);
		assert_eq!(root["type"], "things");
		assert_eq!(root["path"], serde_json::json!([root["id"]]));

		let sub = create_group(
			&server,
			&token,
			"sub",
			Some(&id_of(&root)),
			None,
		)
		.await;
		assert_eq!(sub["level"], 2);
		assert_eq!(sub["type"], "things");
		assert_eq!(
			sub["path"],
			serde_json::json!([root["id"], sub["id"]])
		);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_create_sets_location_header(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;

		let response = server
			.request(
				"POST",
				"/groups",
				Some(&token),
				Some(serde_json::json!({ "name": "root", "type": "users" })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::CREATED);
		let location = response.headers()[header::LOCATION]
			.to_str()
			.unwrap()
			.to_owned();
		let group = body_json(response).await;
		assert_eq!(location, format!("/groups/{}", id_of(&group)));
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_invalid_name_is_bad_request(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;

		let response = server
			.request(
				"POST",
				"/groups",
				Some(&token),
				Some(serde_json::json!({ "name": "x^%", "type": "users" })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_duplicate_name_conflicts(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		create_group(&server, &token, "root", None, Some("users")).await;

		let response = server
			.request(
				"POST",
				"/groups",
				Some(&token),
				Some(serde_json::json!({ "name": "root", "type": "users" })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::CONFLICT);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_body_without_content_type_is_unsupported(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;

		let request = Request::builder()
			.method("POST")
			.uri("/groups")
			.header(header::AUTHORIZATION, &token)
			.body(Body::from(r#"{"name":"root","type":"users"}"#))
			.unwrap();
		let response = server.router.clone().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_missing_token_is_unauthorized(pool: SqlitePool) {
		let server = test_server(pool);
		let response = server.request("GET", "/groups", None, None).await;
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_bearer_prefix_is_accepted(pool: SqlitePool) {
		let server = test_server(pool);
		let token = format!("Bearer {}", server.login(&alice()).await);
		let response =
			server.request("GET", "/groups", Some(&token), None).await;
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_view_missing_group_is_not_found(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let response = server
			.request(
				"GET",
				&format!("/groups/{}", uuid::Uuid::nil()),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_update_changes_mutable_fields(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let group =
			create_group(&server, &token, "root", None, Some("users")).await;

		let response = server
			.request(
				"PUT",
				&format!("/groups/{}", id_of(&group)),
				Some(&token),
				Some(serde_json::json!({
					"name": "renamed",
					"metadata": { "region": "emea" },
				})),
			)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let updated = body_json(response).await;
		assert_eq!(updated["name"], "renamed");
		assert_eq!(updated["metadata"]["region"], "emea");
		assert_eq!(updated["type"], "users");
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_list_groups_flat_and_paged(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let root =
			create_group(&server, &token, "root", None, Some("users")).await;
		create_group(&server, &token, "sub", Some(&id_of(&root)), None).await;

		let response = server
			.request("GET", "/groups?limit=1", Some(&token), None)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let page = body_json(response).await;
		assert_eq!(page["total"], 2);
		assert_eq!(page["limit"], 1);
		assert_eq!(page["groups"].as_array().unwrap().len(), 1);
		assert_eq!(page["groups"][0]["name"], "root");
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_list_groups_as_tree(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let root =
			create_group(&server, &token, "root", None, Some("users")).await;
		create_group(&server, &token, "left", Some(&id_of(&root)), None).await;
		create_group(&server, &token, "right", Some(&id_of(&root)), None)
			.await;
		create_group(&server, &token, "lone", None, Some("things")).await;

		let response = server
			.request("GET", "/groups?tree=true", Some(&token), None)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let forest = body_json(response).await;
		assert_eq!(forest["total"], 4);
		let roots = forest["groups"].as_array().unwrap();
		assert_eq!(roots.len(), 2);
		assert_eq!(roots[0]["name"], "root");
		let children = roots[0]["children"].as_array().unwrap();
		assert_eq!(children.len(), 2);
		assert_eq!(children[0]["name"], "left");
		assert_eq!(children[1]["name"], "right");
		assert!(roots[1]["children"].as_array().unwrap().is_empty());
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_orphans_become_tree_roots(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let root =
			create_group(&server, &token, "root", None, Some("users")).await;
		create_group(&server, &token, "sub", Some(&id_of(&root)), None).await;

		// Skip the parent: the child's parent is absent from the page, so
		// the child is promoted to a root of the in-page forest.
		let response = server
			.request("GET", "/groups?tree=true&offset=1", Some(&token), None)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let forest = body_json(response).await;
		assert_eq!(forest["total"], 2);
		let roots = forest["groups"].as_array().unwrap();
		assert_eq!(roots.len(), 1);
		assert_eq!(roots[0]["name"], "sub");
		assert!(roots[0]["children"].as_array().unwrap().is_empty());
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_metadata_filter_query_param(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let response = server
			.request(
				"POST",
				"/groups",
				Some(&token),
				Some(serde_json::json!({
					"name": "annotated",
					"type": "users",
					"metadata": { "region": "emea" },
				})),
			)
			.await;
		assert_eq!(response.status(), StatusCode::CREATED);
		create_group(&server, &token, "bare", None, Some("users")).await;

		let response = server
			.request(
				"GET",
				"/groups?metadata=%7B%22region%22%3A%22emea%22%7D",
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let page = body_json(response).await;
		assert_eq!(page["total"], 1);
		assert_eq!(page["groups"][0]["name"], "annotated");
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_remove_group_with_descendant_members(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let parent =
			create_group(&server, &token, "parent", None, Some("users")).await;
		let c1 = create_group(&server, &token, "c1", Some(&id_of(&parent)), None)
			.await;
		let c2 = create_group(&server, &token, "c2", Some(&id_of(&parent)), None)
			.await;

		let response = server
			.request(
				"POST",
				&format!("/groups/{}/members/users", id_of(&c1)),
				Some(&token),
				Some(serde_json::json!({ "members": ["m"] })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request(
				"DELETE",
				&format!("/groups/{}", id_of(&parent)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::CONFLICT);

		let response = server
			.request(
				"DELETE",
				&format!("/groups/{}", id_of(&c2)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request(
				"DELETE",
				&format!("/groups/{}/members", id_of(&c1)),
				Some(&token),
				Some(serde_json::json!({ "members": ["m"] })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request(
				"DELETE",
				&format!("/groups/{}", id_of(&parent)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request(
				"GET",
				&format!("/groups/{}", id_of(&c1)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_membership_opens_the_read_gate(pool: SqlitePool) {
		let server = test_server(pool);
		let alice_token = server.login(&alice()).await;
		let bob_token = server.login(&bob()).await;
		let group =
			create_group(&server, &alice_token, "root", None, Some("users"))
				.await;
		let children_uri = format!("/groups/{}/children", id_of(&group));

		let response = server
			.request("GET", &children_uri, Some(&bob_token), None)
			.await;
		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

		let response = server
			.request(
				"POST",
				&format!("/groups/{}/members/users", id_of(&group)),
				Some(&alice_token),
				Some(serde_json::json!({
					"members": [bob().id.to_string()],
				})),
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request("GET", &children_uri, Some(&bob_token), None)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_parents_walk_toward_the_root(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let root =
			create_group(&server, &token, "g1", None, Some("users")).await;
		let mid =
			create_group(&server, &token, "g2", Some(&id_of(&root)), None).await;
		let leaf =
			create_group(&server, &token, "g3", Some(&id_of(&mid)), None).await;

		let response = server
			.request(
				"GET",
				&format!("/groups/{}/parents?level=1", id_of(&leaf)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let page = body_json(response).await;
		assert_eq!(page["total"], 2);
		assert_eq!(page["groups"][0]["name"], "g3");
		assert_eq!(page["groups"][1]["name"], "g2");
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_assign_twice_conflicts(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let group =
			create_group(&server, &token, "root", None, Some("users")).await;
		let uri = format!("/groups/{}/members/users", id_of(&group));
		let body = serde_json::json!({ "members": ["m"] });

		let response = server
			.request("POST", &uri, Some(&token), Some(body.clone()))
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response =
			server.request("POST", &uri, Some(&token), Some(body)).await;
		assert_eq!(response.status(), StatusCode::CONFLICT);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_assign_with_wrong_kind_is_bad_request(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let group =
			create_group(&server, &token, "root", None, Some("things")).await;

		let response = server
			.request(
				"POST",
				&format!("/groups/{}/members/users", id_of(&group)),
				Some(&token),
				Some(serde_json::json!({ "members": ["m"] })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_members_listing(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let group =
			create_group(&server, &token, "root", None, Some("things")).await;

		let response = server
			.request(
				"POST",
				&format!("/groups/{}/members/things", id_of(&group)),
				Some(&token),
				Some(serde_json::json!({ "members": ["m1", "m2"] })),
			)
			.await;
		assert_eq!(response.status(), StatusCode::NO_CONTENT);

		let response = server
			.request(
				"GET",
				&format!("/groups/{}/members?type=things", id_of(&group)),
				Some(&token),
				None,
			)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let page = body_json(response).await;
		assert_eq!(page["total"], 2);
		assert_eq!(page["type"], "things");
		assert_eq!(page["members"], serde_json::json!(["m1", "m2"]));

		// A kind that does not match the group's lists nothing.
		let response = server
			.request(
				"GET",
				&format!("/groups/{}/members?type=users", id_of(&group)),
				Some(&token),
				None,
			)
			.await;
		let page = body_json(response).await;
		assert_eq!(page["total"], 0);
	}

	#[sqlx::test(migrator = "crate::MIGRATOR")]
	async fn test_memberships_listing(pool: SqlitePool) {
		let server = test_server(pool);
		let token = server.login(&alice()).await;
		let fleet =
			create_group(&server, &token, "fleet", None, Some("things")).await;
		let lab =
			create_group(&server, &token, "lab", None, Some("things")).await;
		for group in [&fleet, &lab] {
			let response = server
				.request(
					"POST",
					&format!("/groups/{}/members/things", id_of(group)),
					Some(&token),
					Some(serde_json::json!({ "members": ["m"] })),
				)
				.await;
			assert_eq!(response.status(), StatusCode::NO_CONTENT);
		}

		let response = server
			.request("GET", "/members/m/groups", Some(&token), None)
			.await;
		assert_eq!(response.status(), StatusCode::OK);
		let page = body_json(response).await;
		assert_eq!(page["total"], 2);
		let names: Vec<&str> = page["groups"]
			.as_array()
			.unwrap()
			.iter()
			.map(|g| g["name"].as_str().unwrap())
			.collect();
		assert_eq!(names, vec!["fleet", "lab"]);
	}
}
