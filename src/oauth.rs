//! Token endpoint wire models and their encodings.
//!
//! [`AccessTokenRequest`] is encoded either as form parameters or as JSON.
//! [`AccessTokenResponse`] and [`ErrorResponse`] are decoded with
//! [`serde_path_to_error`] so a malformed body reports the offending field.

pub use oauth2;

// crates.io
use oauth2::basic::BasicErrorResponseType;
use serde::de::{DeserializeOwned, IntoDeserializer, value::Error as ValueError};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, JsonPathError},
	fresh::Expiring,
};

/// `grant_type` value of the client-credentials grant.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Body of a token request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
	/// OAuth grant type.
	pub grant_type: String,
	/// Requested token lifetime in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Requested scope, space-delimited.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Additional named parameters sent alongside the standard ones.
	#[serde(flatten)]
	pub extra: BTreeMap<String, String>,
}
impl AccessTokenRequest {
	/// Base client-credentials grant without optional parameters.
	pub fn client_credentials() -> Self {
		Self {
			grant_type: CLIENT_CREDENTIALS_GRANT.into(),
			expires_in: None,
			scope: None,
			extra: Default::default(),
		}
	}

	/// Requests a specific token lifetime.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Requests a scope.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Adds (or replaces) an extra named parameter.
	pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.insert(name.into(), value.into());

		self
	}

	/// Encodes the request as a JSON object.
	pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
		Ok(serde_json::to_vec(self)?)
	}

	/// Flattens the request into ordered name/value pairs: standard parameters first, then the
	/// extras in name order.
	pub fn to_form_params(&self) -> Vec<(String, String)> {
		let mut params = vec![("grant_type".to_owned(), self.grant_type.clone())];

		if let Some(expires_in) = self.expires_in {
			params.push(("expires_in".into(), expires_in.to_string()));
		}
		if let Some(scope) = &self.scope {
			params.push(("scope".into(), scope.clone()));
		}

		params.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

		params
	}
}
impl Default for AccessTokenRequest {
	fn default() -> Self {
		Self::client_credentials()
	}
}

/// Successful token endpoint response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
	/// Issued bearer token.
	pub access_token: TokenSecret,
	/// Token type, usually `Bearer`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Lifetime in seconds; absent when the token does not expire.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Refresh token, when the server issues one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Granted scope, when it differs from the requested one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl AccessTokenResponse {
	/// Creates a response carrying only an access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			token_type: None,
			expires_in: None,
			refresh_token: None,
			scope: None,
		}
	}

	/// Sets the lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Bearer token value. Callers must avoid logging this string.
	pub fn access_token(&self) -> &str {
		self.access_token.expose()
	}
}
impl Expiring for AccessTokenResponse {
	fn expires_in(&self) -> Option<Duration> {
		self.expires_in.map(|seconds| Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX)))
	}
}

/// Structured OAuth error returned with a non-2xx status (RFC 6749 §5.2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error code; unknown codes are preserved as extensions.
	pub error: BasicErrorResponseType,
	/// Human-readable explanation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
	/// Page describing the error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_uri: Option<String>,
}
impl ErrorResponse {
	/// Creates an error response with the given code.
	pub fn new(error: impl AsRef<str>) -> Self {
		let code = error.as_ref();
		let error = BasicErrorResponseType::deserialize(code.into_deserializer())
			.unwrap_or_else(|_: ValueError| BasicErrorResponseType::Extension(code.to_owned()));

		Self { error, error_description: None, error_uri: None }
	}

	/// Sets the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Error code as sent on the wire.
	pub fn error(&self) -> &str {
		self.error.as_ref()
	}
}
impl Display for ErrorResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.error())?;

		if let Some(description) = &self.error_description {
			write!(f, " ({description})")?;
		}

		Ok(())
	}
}

/// Encodes `params` as an `application/x-www-form-urlencoded` string.
pub fn form_urlencode(params: &[(String, String)]) -> String {
	url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish()
}

/// Decodes `bytes` as JSON, reporting the path of the first offending field.
pub fn parse_json<T>(bytes: &[u8]) -> Result<T, JsonPathError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
}
