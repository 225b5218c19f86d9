//! OAuth 1.0 HMAC-SHA256 signing of token endpoint requests.
//!
//! The client proves possession of its access key secret by signing every token request: the
//! method, base URL, and parameters are folded into a canonical base string, MACed with the secret,
//! and sent in an `Authorization: OAuth ...` header. Signing is a pure function of its inputs once
//! the timestamp and nonce are fixed; [`OAuth1Signer::authorization`] supplies both from the
//! injected [`Clock`] and a random source.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use oauth2::http::{HeaderValue, Method, header::AUTHORIZATION};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::{Rng, distr::Alphanumeric};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	clock::{Clock, SystemClock},
	error::{ConfigError, TransportError},
	ext::HttpRequestAuthorizer,
	http::HttpRequest,
};

/// Value of `oauth_signature_method`.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA256";
/// Value of `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

const NONCE_LEN: usize = 16;
// RFC 3986 unreserved characters stay literal.
const OAUTH_ENCODE_SET: &AsciiSet =
	&NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Signs token requests with an access key pair.
#[derive(Clone)]
pub struct OAuth1Signer {
	access_key_id: String,
	access_key_secret: TokenSecret,
	clock: Arc<dyn Clock>,
}
impl OAuth1Signer {
	/// Creates a signer that timestamps requests with the shared [`SystemClock`].
	pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<TokenSecret>) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			access_key_secret: access_key_secret.into(),
			clock: SystemClock::shared(),
		}
	}

	/// Creates a signer from validated credentials.
	pub fn from_credentials(credentials: &Credentials) -> Self {
		Self::new(credentials.access_key_id(), credentials.access_key_secret().clone())
	}

	/// Replaces the clock used for `oauth_timestamp`.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Access key identifier sent as `oauth_consumer_key`.
	pub fn access_key_id(&self) -> &str {
		&self.access_key_id
	}

	/// Produces an `Authorization` header value stamped with the current time and a fresh nonce.
	pub fn authorization(
		&self,
		method: &Method,
		url: &Url,
		form_params: &[(String, String)],
	) -> Result<String> {
		let timestamp = self.clock.now().unix_timestamp();

		self.sign(method, url, form_params, timestamp, &generate_nonce())
	}

	/// Produces the `Authorization` header value for fixed `timestamp` and `nonce`.
	///
	/// Query parameters already present on `url` are signed alongside `form_params`.
	pub fn sign(
		&self,
		method: &Method,
		url: &Url,
		form_params: &[(String, String)],
		timestamp: i64,
		nonce: &str,
	) -> Result<String> {
		let timestamp = timestamp.to_string();
		let mut oauth_params = vec![
			("oauth_consumer_key", self.access_key_id.clone()),
			("oauth_nonce", nonce.to_owned()),
			("oauth_signature_method", SIGNATURE_METHOD.to_owned()),
			("oauth_timestamp", timestamp),
			("oauth_version", OAUTH_VERSION.to_owned()),
		];
		let query_params = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()));
		let params = oauth_params
			.iter()
			.map(|(k, v)| ((*k).to_owned(), v.clone()))
			.chain(form_params.iter().cloned())
			.chain(query_params)
			.collect::<Vec<_>>();
		let base_string = signature_base_string(method, url, &params);
		let key = format!("{}&", percent_encode(self.access_key_secret.expose()));
		let mut mac = <Hmac<Sha256>>::new_from_slice(key.as_bytes())
			.map_err(|_| ConfigError::InvalidSigningKey)?;

		mac.update(base_string.as_bytes());
		oauth_params.push(("oauth_signature", STANDARD.encode(mac.finalize().into_bytes())));
		oauth_params.sort_unstable_by(|a, b| a.0.cmp(b.0));

		let fields = oauth_params
			.iter()
			.map(|(k, v)| format!("{k}=\"{}\"", percent_encode(v)))
			.collect::<Vec<_>>()
			.join(", ");

		Ok(format!("OAuth {fields}"))
	}
}
impl Debug for OAuth1Signer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth1Signer")
			.field("access_key_id", &self.access_key_id)
			.field("access_key_secret", &self.access_key_secret)
			.finish_non_exhaustive()
	}
}
impl HttpRequestAuthorizer for OAuth1Signer {
	fn authorize(&self, request: &mut HttpRequest, form_params: &[(String, String)]) -> Result<()> {
		let url = Url::parse(&request.uri().to_string()).map_err(TransportError::from)?;
		let authorization = self.authorization(request.method(), &url, form_params)?;
		let value = HeaderValue::from_str(&authorization)
			.map_err(|e| TransportError::from(oauth2::http::Error::from(e)))?;

		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Percent-encodes `value`, leaving only `A-Za-z0-9-._~` literal.
pub fn percent_encode(value: &str) -> String {
	utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Builds `METHOD&enc(base_url)&enc(sorted_params)` for `params`.
///
/// The base URL drops the query and fragment; `url` already normalizes scheme and host case and
/// omits default ports.
pub fn signature_base_string(method: &Method, url: &Url, params: &[(String, String)]) -> String {
	let mut base_url = url.clone();

	base_url.set_query(None);
	base_url.set_fragment(None);

	let mut encoded = params
		.iter()
		.map(|(k, v)| (percent_encode(k), percent_encode(v)))
		.collect::<Vec<_>>();

	encoded.sort_unstable();

	let param_string =
		encoded.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

	format!(
		"{}&{}&{}",
		method.as_str().to_ascii_uppercase(),
		percent_encode(base_url.as_str()),
		percent_encode(&param_string)
	)
}

fn generate_nonce() -> String {
	rand::rng().sample_iter(&Alphanumeric).take(NONCE_LEN).map(char::from).collect()
}
