//! Key issuance, identification, and revocation.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, Result, uuid::UuidProvider};

use super::{
	Identity, Key, KeyKind, KeyStore, codec::TokenCodec,
	identity::IdentityProvider,
};

/// What a caller supplies when requesting a new key.
#[derive(Debug, Clone)]
pub struct KeyRequest {
	pub kind: KeyKind,
	/// The principal the key is for. Ignored for API keys, which are always
	/// issued to the caller.
	pub subject: String,
	pub issued_at: Option<OffsetDateTime>,
	pub expires_at: Option<OffsetDateTime>,
}

/// Coordinates the key lifecycle across the store, the codec, and the peer
/// identity lookup.
#[derive(Debug)]
pub struct KeyService {
	store: KeyStore,
	codec: TokenCodec,
	identities: IdentityProvider,
	uuids: Arc<UuidProvider>,
	api_key_duration: Duration,
}

impl KeyService {
	pub fn new(
		store: KeyStore,
		codec: TokenCodec,
		identities: IdentityProvider,
		uuids: Arc<UuidProvider>,
		api_key_duration: Duration,
	) -> Self {
		Self {
			store,
			codec,
			identities,
			uuids,
			api_key_duration,
		}
	}

	/// Issues a new key and returns it along with its signed token.
	///
	/// User and recovery keys belong to the login flow: they require no
	/// caller token and resolve their subject through the peer user service.
	/// API keys are issued to the caller of a valid user key.
	#[tracing::instrument(skip_all, fields(kind = ?request.kind))]
	pub async fn issue(
		&self,
		caller_token: &str,
		request: KeyRequest,
	) -> Result<(Key, String)> {
		let issued_at = request
			.issued_at
			.ok_or(Error::Malformed("missing key issue time"))?;

		let key = match request.kind {
			KeyKind::User => {
				if !caller_token.is_empty() {
					return Err(Error::Unauthorized);
				}
				let identity =
					self.identities.retrieve(&request.subject).await?;
				Key {
					id: self.uuids.next_v4(),
					kind: KeyKind::User,
					issuer_id: identity.id,
					subject: identity.email,
					issued_at,
					expires_at: request.expires_at,
				}
			}
			KeyKind::Api => {
				let caller = self.identify_user(caller_token).await?;
				let expires_at = request
					.expires_at
					.unwrap_or(issued_at + self.api_key_duration);
				Key {
					id: self.uuids.next_v4(),
					kind: KeyKind::Api,
					issuer_id: caller.id,
					subject: caller.email,
					issued_at,
					expires_at: Some(expires_at),
				}
			}
			KeyKind::Recovery => {
				if !caller_token.is_empty() {
					return Err(Error::Unauthorized);
				}
				let identity =
					self.identities.retrieve(&request.subject).await?;
				Key {
					id: self.uuids.next_v4(),
					kind: KeyKind::Recovery,
					issuer_id: identity.id,
					subject: identity.email,
					issued_at,
					expires_at: None,
				}
			}
		};

		if key.kind != KeyKind::Recovery {
			self.store.save(&key).await?;
		}
		let token = self.codec.sign(&key)?;
		Ok((key, token))
	}

	/// Removes one of the caller's keys. Removing a key that no longer
	/// exists is a success.
	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn revoke(&self, caller_token: &str, id: Uuid) -> Result<()> {
		let caller = self.identify_user(caller_token).await?;
		self.store.remove(caller.id, id).await
	}

	/// Looks up one of the caller's keys. Only user keys may browse keys.
	#[tracing::instrument(skip_all, fields(%id))]
	pub async fn retrieve(&self, caller_token: &str, id: Uuid) -> Result<Key> {
		let caller = self.identify_user(caller_token).await?;
		self.store.retrieve(caller.id, id).await
	}

	/// Resolves a token to the identity it was issued for.
	///
	/// User and API keys must still be present in the store; a revoked key
	/// fails even when its signature is intact. Recovery keys are validated
	/// by signature alone.
	#[tracing::instrument(skip_all)]
	pub async fn identify(&self, token: &str) -> Result<Identity> {
		let key = self.codec.verify(token)?;
		if key.kind != KeyKind::Recovery {
			self.ensure_active(&key).await?;
		}
		Ok(Identity {
			id: key.issuer_id,
			email: key.subject,
		})
	}

	async fn identify_user(&self, token: &str) -> Result<Identity> {
		if token.is_empty() {
			return Err(Error::Unauthorized);
		}
		let key = self.codec.verify(token)?;
		if key.kind != KeyKind::User {
			return Err(Error::Unauthorized);
		}
		self.ensure_active(&key).await?;
		Ok(Identity {
			id: key.issuer_id,
			email: key.subject,
		})
	}

	async fn ensure_active(&self, key: &Key) -> Result<()> {
		match self.store.retrieve(key.issuer_id, key.id).await {
			Ok(_) => Ok(()),
			Err(Error::NotFound) => Err(Error::Unauthorized),
			Err(err) => Err(err),
		}
	}
}
