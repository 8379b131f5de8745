//! Signed token encoding for issued keys.
//!
//! Tokens are compact JWTs signed with a single process-wide secret that is
//! configured at startup. Rotation is out of scope.

use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
	errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};

use super::{Key, KeyKind};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	jti: Uuid,
	iss: Uuid,
	sub: String,
	iat: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	exp: Option<i64>,
	#[serde(rename = "type")]
	kind: KeyKind,
}

/// Encodes and decodes the signed tokens carrying key metadata.
pub struct TokenCodec {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenCodec").finish_non_exhaustive()
	}
}

impl TokenCodec {
	pub fn new(secret: &str) -> Self {
		let mut validation = Validation::new(Algorithm::HS512);
		// Expiry is checked by hand so that an expired-but-well-signed token
		// is distinguishable from a forged one.
		validation.validate_exp = false;
		validation.required_spec_claims = Default::default();

		Self {
			encoding: EncodingKey::from_secret(secret.as_bytes()),
			decoding: DecodingKey::from_secret(secret.as_bytes()),
			validation,
		}
	}

	/// Signs the key's metadata into a token. Deterministic over the key;
	/// refuses to emit a token that is already expired.
	pub fn sign(&self, key: &Key) -> Result<String> {
		if key.kind == KeyKind::Api
			&& !key
				.expires_at
				.is_some_and(|expires_at| expires_at > key.issued_at)
		{
			return Err(Error::Malformed(
				"api keys require an expiry after their issue time",
			));
		}
		if key.is_expired(OffsetDateTime::now_utc()) {
			return Err(Error::Expired);
		}

		self.encode(key)
	}

	fn encode(&self, key: &Key) -> Result<String> {
		let claims = Claims {
			jti: key.id,
			iss: key.issuer_id,
			sub: key.subject.clone(),
			iat: key.issued_at.unix_timestamp(),
			exp: key.expires_at.map(OffsetDateTime::unix_timestamp),
			kind: key.kind,
		};

		encode(&Header::new(Algorithm::HS512), &claims, &self.encoding)
			.map_err(Error::Token)
	}

	#[cfg(test)]
	pub(crate) fn sign_unchecked(&self, key: &Key) -> String {
		self.encode(key).unwrap()
	}

	/// Checks signature and structural integrity, then expiry against the
	/// current clock. Recovery keys carry no expiry and verify purely
	/// structurally.
	pub fn verify(&self, token: &str) -> Result<Key> {
		let data = decode::<Claims>(token, &self.decoding, &self.validation)
			.map_err(|err| match err.kind() {
				ErrorKind::InvalidSignature => Error::Unauthorized,
				_ => Error::Token(err),
			})?;
		let claims = data.claims;

		let issued_at = OffsetDateTime::from_unix_timestamp(claims.iat)
			.map_err(|_| Error::Malformed("invalid key issue time"))?;
		let expires_at = claims
			.exp
			.map(OffsetDateTime::from_unix_timestamp)
			.transpose()
			.map_err(|_| Error::Malformed("invalid key expiry time"))?;

		let key = Key {
			id: claims.jti,
			kind: claims.kind,
			issuer_id: claims.iss,
			subject: claims.sub,
			issued_at,
			expires_at,
		};

		if key.kind == KeyKind::Api
			&& !key
				.expires_at
				.is_some_and(|expires_at| expires_at > key.issued_at)
		{
			return Err(Error::Malformed(
				"api keys require an expiry after their issue time",
			));
		}
		if key.is_expired(OffsetDateTime::now_utc()) {
			return Err(Error::Expired);
		}

		Ok(key)
	}
}
