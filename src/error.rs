//! Crate-level error types shared across the signer, transport, endpoint, and freshness cache.
//!
//! Every source is held behind an [`Arc`] so [`Error`] stays [`Clone`]. A [`Fresh`] cache hands the
//! same failure to every caller that waited on a refresh, and keeps a copy on its failure channel.
//!
//! [`Fresh`]: crate::fresh::Fresh

// crates.io
use oauth2::http::Error as HttpError;
// self
use crate::{_prelude::*, oauth::ErrorResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or violated precondition; never reaches the network.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The token request could not be executed (malformed URL, DNS, connect, I/O).
	#[error("Token request could not be executed.")]
	RequestExecution(
		#[from]
		#[source]
		TransportError,
	),
	/// The response body matched neither the success nor the error schema.
	#[error(transparent)]
	ResponseParsing(#[from] ResponseParsingError),
	/// A background refresh could not be scheduled.
	#[error(transparent)]
	Schedule(#[from] ScheduleError),

	/// The token endpoint rejected the request with a structured OAuth error.
	#[error("Token endpoint rejected the request with HTTP {status}: {response}.")]
	AccessToken {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Parsed RFC 6749 error body.
		response: ErrorResponse,
	},
}
impl Error {
	/// Returns the structured OAuth error, when the endpoint supplied one.
	pub fn error_response(&self) -> Option<&ErrorResponse> {
		match self {
			Self::AccessToken { response, .. } => Some(response),
			_ => None,
		}
	}

	/// Returns the HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AccessToken { status, .. } => Some(*status),
			Self::ResponseParsing(e) => e.status(),
			_ => None,
		}
	}
}

/// Configuration and precondition failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// A required credential value was absent or blank.
	#[error("Credential `{field}` is required and must not be blank.")]
	MissingCredential {
		/// Name of the missing credential field.
		field: &'static str,
	},
	/// The client-credentials provider reported a blank token endpoint URL.
	#[error("Token endpoint URL must not be blank.")]
	BlankTokenEndpoint,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// The access token request could not be encoded.
	#[error("Access token request could not be encoded as JSON.")]
	RequestEncoding {
		/// Underlying serializer failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// The HMAC key derived from the access key secret was rejected.
	#[error("Access key secret cannot be used as an HMAC key.")]
	InvalidSigningKey,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<serde_json::Error> for ConfigError {
	fn from(e: serde_json::Error) -> Self {
		Self::RequestEncoding { source: Arc::new(e) }
	}
}

/// Transport-level failures (URL, request construction, network, I/O).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// The token endpoint URL could not be parsed.
	#[error("Token endpoint URL is malformed.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The HTTP request could not be assembled.
	#[error("HTTP request could not be assembled.")]
	InvalidRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<HttpError>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying I/O failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[source] Arc<std::io::Error>),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<url::ParseError> for TransportError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
impl From<HttpError> for TransportError {
	fn from(e: HttpError) -> Self {
		Self::InvalidRequest { source: Arc::new(e) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Structured JSON failure with the path of the offending field.
pub type JsonPathError = serde_path_to_error::Error<serde_json::Error>;

/// The response body did not conform to the expected schema.
#[derive(Clone, Debug, ThisError)]
pub enum ResponseParsingError {
	/// The response body could not be read.
	#[error("Token endpoint response body could not be read.")]
	ReadBody {
		/// HTTP status code of the response.
		status: u16,
		/// Underlying read failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// A 2xx body was not a valid access token response.
	#[error("Token endpoint returned HTTP {status} with a malformed access token response.")]
	TokenResponse {
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: Arc<JsonPathError>,
	},
	/// A non-2xx body was not a valid OAuth error response.
	#[error("Token endpoint returned HTTP {status} with a malformed error response.")]
	ErrorResponse {
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: Arc<JsonPathError>,
	},
}
impl ResponseParsingError {
	/// HTTP status code of the response that failed to parse.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::ReadBody { status, .. }
			| Self::TokenResponse { status, .. }
			| Self::ErrorResponse { status, .. } => Some(*status),
		}
	}
}

/// Closing a response body failed.
///
/// Reported through the observability layer only; it never replaces the outcome of the request
/// whose body was being closed.
#[derive(Debug, ThisError)]
#[error("Response body could not be closed.")]
pub struct BodyCloseError(#[source] pub std::io::Error);

/// Failures raised while handing a task to a [`Clock`](crate::clock::Clock).
#[derive(Clone, Debug, ThisError)]
pub enum ScheduleError {
	/// The shared timer runtime could not be started.
	#[error("Timer runtime could not be started.")]
	TimerRuntime {
		/// Underlying runtime builder failure.
		#[source]
		source: Arc<std::io::Error>,
	},
}
