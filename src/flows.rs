//! Token endpoint orchestration for the client-credentials grant.
//!
//! [`TokenEndpoint`] owns the HTTP transport and the [`ClientCredentialsProvider`] describing
//! where and how to authenticate. Each request is built from an [`AccessTokenRequest`], signed by
//! the provider's authorizer, executed, and parsed into an
//! [`AccessTokenResponse`](crate::oauth::AccessTokenResponse) or a typed error.
//! [`TokenEndpoint::request_auto_refreshing_token`] wraps the same call in a self-refreshing
//! [`Fresh`](crate::fresh::Fresh) cache.
//!
//! [`AccessTokenRequest`]: crate::oauth::AccessTokenRequest

pub mod common;

mod client_credentials;

pub use client_credentials::*;
pub use common::*;

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	error::ConfigError,
	fresh::RefreshPolicy,
	http::HttpProvider,
	provider::ClientCredentialsProvider,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpProvider;

#[cfg(feature = "reqwest")]
/// Token endpoint specialized for the crate's default reqwest transport.
pub type ReqwestTokenEndpoint = TokenEndpoint<ReqwestHttpProvider>;

/// Issues client-credentials token requests against a single provider.
///
/// The endpoint is cheap to clone; clones share the transport, provider, and clock.
pub struct TokenEndpoint<H>
where
	H: ?Sized + HttpProvider,
{
	http: Arc<H>,
	provider: Arc<dyn ClientCredentialsProvider>,
	clock: Arc<dyn Clock>,
	refresh_policy: RefreshPolicy,
	body_encoding: BodyEncoding,
}
impl<H> TokenEndpoint<H>
where
	H: ?Sized + HttpProvider,
{
	/// Creates an endpoint, rejecting providers that report a blank token endpoint URL.
	///
	/// URL syntax is not checked here; a malformed URL surfaces from
	/// [`request_token`](Self::request_token) as a request execution failure.
	pub fn new(
		http: Arc<H>,
		provider: Arc<dyn ClientCredentialsProvider>,
	) -> Result<Self, ConfigError> {
		if provider.token_endpoint_url().trim().is_empty() {
			return Err(ConfigError::BlankTokenEndpoint);
		}

		Ok(Self {
			http,
			provider,
			clock: SystemClock::shared(),
			refresh_policy: RefreshPolicy::default(),
			body_encoding: BodyEncoding::default(),
		})
	}

	/// Drives auto-refreshing caches with `clock` instead of the system clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the timing rules of auto-refreshing caches.
	pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Selects how request parameters are encoded in non-`GET` request bodies.
	pub fn with_body_encoding(mut self, encoding: BodyEncoding) -> Self {
		self.body_encoding = encoding;

		self
	}

	/// Provider supplying the endpoint URL, method, and authorizer.
	pub fn provider(&self) -> &Arc<dyn ClientCredentialsProvider> {
		&self.provider
	}

	/// Clock driving auto-refreshing caches.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Timing rules of auto-refreshing caches.
	pub fn refresh_policy(&self) -> RefreshPolicy {
		self.refresh_policy
	}

	/// Body encoding used for non-`GET` requests.
	pub fn body_encoding(&self) -> BodyEncoding {
		self.body_encoding
	}
}
#[cfg(feature = "reqwest")]
impl TokenEndpoint<ReqwestHttpProvider> {
	/// Creates an endpoint backed by a fresh redirect-free reqwest client.
	pub fn with_reqwest(provider: Arc<dyn ClientCredentialsProvider>) -> Result<Self> {
		Ok(Self::new(Arc::new(ReqwestHttpProvider::new()?), provider)?)
	}
}
impl<H> Clone for TokenEndpoint<H>
where
	H: ?Sized + HttpProvider,
{
	fn clone(&self) -> Self {
		Self {
			http: self.http.clone(),
			provider: self.provider.clone(),
			clock: self.clock.clone(),
			refresh_policy: self.refresh_policy,
			body_encoding: self.body_encoding,
		}
	}
}
impl<H> Debug for TokenEndpoint<H>
where
	H: ?Sized + HttpProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("token_endpoint_url", &self.provider.token_endpoint_url())
			.field("http_method", &self.provider.http_method())
			.field("refresh_policy", &self.refresh_policy)
			.field("body_encoding", &self.body_encoding)
			.finish_non_exhaustive()
	}
}
