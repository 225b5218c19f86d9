//! Client-credentials providers: the capability bundle a token endpoint is configured with.
//!
//! A provider answers three questions and never performs I/O: where the token endpoint lives, how
//! requests to it are authenticated, and which HTTP method to use.
//! [`OAuth1ClientCredentialsProvider`] is the stock implementation, built from explicit
//! [`Credentials`] or from one of their configuration sources.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, OAuth1Signer},
	clock::Clock,
	error::ConfigError,
	ext::HttpRequestAuthorizer,
};

/// Supplies the endpoint, authorizer, and method used by a
/// [`TokenEndpoint`](crate::flows::TokenEndpoint).
pub trait ClientCredentialsProvider
where
	Self: Send + Sync,
{
	/// Token endpoint URL, unparsed.
	fn token_endpoint_url(&self) -> &str;

	/// Authorizer applied to every token request.
	fn client_authorizer(&self) -> Arc<dyn HttpRequestAuthorizer>;

	/// HTTP method used for token requests.
	fn http_method(&self) -> Method {
		Method::POST
	}
}

/// Provider that authenticates with OAuth1 HMAC-SHA256 signatures.
#[derive(Clone, Debug)]
pub struct OAuth1ClientCredentialsProvider {
	credentials: Credentials,
	signer: Arc<OAuth1Signer>,
	method: Method,
}
impl OAuth1ClientCredentialsProvider {
	/// Builds a provider from validated credentials.
	pub fn new(credentials: Credentials) -> Self {
		let signer = Arc::new(OAuth1Signer::from_credentials(&credentials));

		Self { credentials, signer, method: Method::POST }
	}

	/// Reads credentials from a properties map.
	pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
		Credentials::from_properties(properties).map(Self::new)
	}

	/// Reads credentials from the `OAUTH_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Credentials::from_env().map(Self::new)
	}

	/// Timestamps signatures with `clock` instead of the system clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.signer = Arc::new(OAuth1Signer::from_credentials(&self.credentials).with_clock(clock));

		self
	}

	/// Overrides the HTTP method (`POST` by default).
	pub fn with_http_method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Credentials backing this provider.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}
}
impl ClientCredentialsProvider for OAuth1ClientCredentialsProvider {
	fn token_endpoint_url(&self) -> &str {
		self.credentials.token_endpoint_url()
	}

	fn client_authorizer(&self) -> Arc<dyn HttpRequestAuthorizer> {
		self.signer.clone()
	}

	fn http_method(&self) -> Method {
		self.method.clone()
	}
}
