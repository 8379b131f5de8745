use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::{Error, Result};

use super::Identity;

/// Resolves an email to the principal registered in the peer user service.
///
/// Credentials live with that peer; issuing a key for a subject only
/// requires knowing that the subject exists and which id it maps to.
///
/// This provider exists to support mocking of the external interface, for
/// the purposes of testing.
#[derive(Debug)]
pub struct IdentityProvider {
	#[cfg(not(test))]
	provider: HttpProvider,
	#[cfg(test)]
	provider: Box<dyn IdentityProviderT>,
}

impl IdentityProvider {
	pub fn http(base_url: Url, client: reqwest::Client) -> Self {
		Self {
			#[cfg(not(test))]
			provider: HttpProvider::new(base_url, client),
			#[cfg(test)]
			provider: Box::new(HttpProvider::new(base_url, client)),
		}
	}

	/// A provider that always resolves from a fixed set.
	#[cfg(test)]
	pub(crate) fn fixed(identities: impl IntoIterator<Item = Identity>) -> Self {
		Self {
			provider: Box::new(StaticProvider(identities.into_iter().collect())),
		}
	}

	pub async fn retrieve(&self, email: &str) -> Result<Identity> {
		self.provider.retrieve(email).await
	}
}

#[async_trait]
trait IdentityProviderT: std::fmt::Debug + Send + Sync + 'static {
	/// Resolves the principal behind `email`, or [`Error::NotFound`].
	async fn retrieve(&self, email: &str) -> Result<Identity>;
}

/// Uses the peer user service's HTTP lookup endpoint.
#[derive(Debug)]
struct HttpProvider {
	base_url: Url,
	client: reqwest::Client,
}

impl HttpProvider {
	fn new(base_url: Url, client: reqwest::Client) -> Self {
		Self { base_url, client }
	}
}

#[async_trait]
impl IdentityProviderT for HttpProvider {
	async fn retrieve(&self, email: &str) -> Result<Identity> {
		let mut url = self
			.base_url
			.join("identities")
			.map_err(|_| Error::Malformed("invalid identity service url"))?;
		url.query_pairs_mut().append_pair("email", email);

		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(Error::Peer)?;
		if response.status() == StatusCode::NOT_FOUND {
			return Err(Error::NotFound);
		}
		let response = response.error_for_status().map_err(Error::Peer)?;

		let identity: Identity = response.json().await.map_err(Error::Peer)?;
		debug!(?identity, "resolved identity");
		Ok(identity)
	}
}

/// Always resolves from the same fixed set.
#[cfg(test)]
#[derive(Debug)]
struct StaticProvider(Vec<Identity>);

#[cfg(test)]
#[async_trait]
impl IdentityProviderT for StaticProvider {
	async fn retrieve(&self, email: &str) -> Result<Identity> {
		self.0
			.iter()
			.find(|identity| identity.email == email)
			.cloned()
			.ok_or(Error::NotFound)
	}
}
