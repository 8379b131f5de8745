//! V1 of the management API.
//!
//! All endpoints speak JSON. The `Authorization` header carries the opaque
//! token string (a `Bearer ` prefix is accepted); bodied requests must be
//! `application/json`.

pub(crate) mod groups;
pub(crate) mod keys;

use std::sync::Arc;

use axum::{
	Router,
	extract::FromRequestParts,
	http::{HeaderMap, StatusCode, header, request::Parts},
	response::IntoResponse,
	routing::{get, post},
};
use tracing::error;

use crate::{
	Error, authz::AuthzResolver, groups::service::GroupService,
	keys::service::KeyService,
};

/// Configuration for the V1 api's router.
#[derive(Debug)]
pub struct RouterConfig {
	pub groups: Arc<GroupService>,
	pub keys: Arc<KeyService>,
	pub authz: Arc<AuthzResolver>,
}

#[derive(Debug, Clone)]
struct RouterState {
	groups: Arc<GroupService>,
	keys: Arc<KeyService>,
	authz: Arc<AuthzResolver>,
}

impl RouterConfig {
	pub fn build(self) -> Router {
		Router::new()
			.route("/groups", post(groups::create).get(groups::list))
			.route(
				"/groups/{id}",
				get(groups::view).put(groups::update).delete(groups::remove),
			)
			.route("/groups/{id}/children", get(groups::children))
			.route("/groups/{id}/parents", get(groups::parents))
			.route(
				"/groups/{id}/members",
				get(groups::members).delete(groups::unassign),
			)
			.route("/groups/{id}/members/{kind}", post(groups::assign))
			.route("/members/{id}/groups", get(groups::memberships))
			.route("/keys", post(keys::issue))
			.route("/keys/{id}", get(keys::retrieve).delete(keys::revoke))
			.route("/identify", post(keys::identify))
			.route("/authorize", post(keys::authorize))
			.with_state(RouterState {
				groups: self.groups,
				keys: self.keys,
				authz: self.authz,
			})
	}
}

/// Maps the service error taxonomy onto status codes, exactly once.
#[derive(Debug)]
pub(crate) struct ApiError(Error);

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		error!("{:?}", self.0);
		let status = match self.0 {
			Error::Unauthorized | Error::Expired => StatusCode::UNAUTHORIZED,
			Error::InvalidName(_)
			| Error::Malformed(_)
			| Error::Token(_)
			| Error::MissingParent
			| Error::MaxLevelExceeded { .. }
			| Error::ParentInvariant => StatusCode::BAD_REQUEST,
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::Conflict
			| Error::GroupNotEmpty
			| Error::MemberAlreadyAssigned => StatusCode::CONFLICT,
			Error::Database(_) | Error::Peer(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		};
		(status, self.0.to_string()).into_response()
	}
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let value = value.strip_prefix("Bearer ").unwrap_or(value);
	Some(value.to_owned())
}

/// The opaque token string from the `Authorization` header.
pub(crate) struct Token(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Token {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		_state: &S,
	) -> Result<Self, Self::Rejection> {
		bearer_token(&parts.headers)
			.map(Self)
			.ok_or(ApiError(Error::Unauthorized))
	}
}
