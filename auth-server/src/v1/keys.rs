//! Key lifecycle and access-check endpoints.

use axum::{
	Json,
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::keys::{Identity, Key, KeyKind, service::KeyRequest};

use super::{ApiError, RouterState, Token, bearer_token};

#[derive(Debug, Deserialize)]
pub(super) struct IssueReq {
	#[serde(rename = "type")]
	kind: KeyKind,
	/// The principal the key is for. Ignored for API keys.
	#[serde(default)]
	subject: String,
	#[serde(default, with = "time::serde::rfc3339::option")]
	expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub(super) struct IssueRes {
	id: Uuid,
	/// The signed token. Handed out exactly once.
	value: String,
	#[serde(with = "time::serde::rfc3339")]
	issued_at: OffsetDateTime,
	#[serde(skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	expires_at: Option<OffsetDateTime>,
}

/// User and recovery keys are issued without a caller token, so the
/// `Authorization` header is optional here.
#[tracing::instrument(skip_all)]
pub(super) async fn issue(
	state: State<RouterState>,
	headers: HeaderMap,
	Json(req): Json<IssueReq>,
) -> Result<(StatusCode, Json<IssueRes>), ApiError> {
	let caller_token = bearer_token(&headers).unwrap_or_default();
	let (key, value) = state
		.keys
		.issue(
			&caller_token,
			KeyRequest {
				kind: req.kind,
				subject: req.subject,
				issued_at: Some(OffsetDateTime::now_utc()),
				expires_at: req.expires_at,
			},
		)
		.await?;

	Ok((
		StatusCode::CREATED,
		Json(IssueRes {
			id: key.id,
			value,
			issued_at: key.issued_at,
			expires_at: key.expires_at,
		}),
	))
}

#[tracing::instrument(skip_all)]
pub(super) async fn retrieve(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
) -> Result<Json<Key>, ApiError> {
	Ok(Json(state.keys.retrieve(&token, id).await?))
}

#[tracing::instrument(skip_all)]
pub(super) async fn revoke(
	state: State<RouterState>,
	Token(token): Token,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.keys.revoke(&token, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(super) struct IdentifyReq {
	token: String,
}

#[tracing::instrument(skip_all)]
pub(super) async fn identify(
	state: State<RouterState>,
	Json(req): Json<IdentifyReq>,
) -> Result<Json<Identity>, ApiError> {
	Ok(Json(state.keys.identify(&req.token).await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthorizeReq {
	subject: String,
	object: String,
	action: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthorizeRes {
	authorized: bool,
}

#[tracing::instrument(skip_all)]
pub(super) async fn authorize(
	state: State<RouterState>,
	Json(req): Json<AuthorizeReq>,
) -> Result<Json<AuthorizeRes>, ApiError> {
	let authorized = state
		.authz
		.check(&req.subject, &req.object, &req.action)
		.await?;
	Ok(Json(AuthorizeRes { authorized }))
}
