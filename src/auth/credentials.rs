//! Client credentials for the token endpoint and the sources they can be read from.
//!
//! Credentials are validated when they are built: a missing or blank value is rejected right
//! away, long before a request could be signed. The endpoint URL is kept verbatim and only parsed
//! when a request is executed.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Token endpoint used by the property and environment sources when no URL is configured.
pub const DEFAULT_TOKEN_ENDPOINT_URL: &str = "https://account.api.here.com/oauth2/token";
/// Property key holding the token endpoint URL.
pub const TOKEN_ENDPOINT_URL_PROPERTY: &str = "token.endpoint.url";
/// Property key holding the access key identifier.
pub const ACCESS_KEY_ID_PROPERTY: &str = "access.key.id";
/// Property key holding the access key secret.
pub const ACCESS_KEY_SECRET_PROPERTY: &str = "access.key.secret";
/// Environment variable holding the token endpoint URL.
pub const TOKEN_ENDPOINT_URL_ENV: &str = "OAUTH_TOKEN_ENDPOINT_URL";
/// Environment variable holding the access key identifier.
pub const ACCESS_KEY_ID_ENV: &str = "OAUTH_ACCESS_KEY_ID";
/// Environment variable holding the access key secret.
pub const ACCESS_KEY_SECRET_ENV: &str = "OAUTH_ACCESS_KEY_SECRET";

const PROPERTY_WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Immutable access key pair plus the token endpoint it authenticates against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
	token_endpoint_url: String,
	access_key_id: String,
	access_key_secret: TokenSecret,
}
impl Credentials {
	/// Builds credentials from explicit values.
	pub fn new(
		token_endpoint_url: impl Into<String>,
		access_key_id: impl Into<String>,
		access_key_secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		Self::builder()
			.token_endpoint_url(token_endpoint_url)
			.access_key_id(access_key_id)
			.access_key_secret(access_key_secret)
			.build()
	}

	/// Returns an empty builder.
	pub fn builder() -> CredentialsBuilder {
		CredentialsBuilder::default()
	}

	/// Reads credentials from a properties map keyed by [`TOKEN_ENDPOINT_URL_PROPERTY`],
	/// [`ACCESS_KEY_ID_PROPERTY`], and [`ACCESS_KEY_SECRET_PROPERTY`].
	///
	/// An absent endpoint key selects [`DEFAULT_TOKEN_ENDPOINT_URL`]; a present but blank one is
	/// still rejected.
	pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
		Self::from_lookup(
			|key| properties.get(key).cloned(),
			[TOKEN_ENDPOINT_URL_PROPERTY, ACCESS_KEY_ID_PROPERTY, ACCESS_KEY_SECRET_PROPERTY],
		)
	}

	/// Parses Java properties text and reads the credentials from it.
	///
	/// Keys end at the first unescaped `=`, `:`, or whitespace. Lines ending in an odd number of
	/// backslashes continue on the next line, and `\t`, `\n`, `\r`, `\f`, `\uXXXX`, and
	/// `\<char>` escapes are decoded in keys and values.
	pub fn from_properties_str(text: &str) -> Result<Self, ConfigError> {
		Self::from_properties(&parse_properties(text))
	}

	/// Reads credentials from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_env_with(|key| std::env::var(key).ok())
	}

	/// Reads credentials through `lookup`, using the environment variable names.
	///
	/// Falls back to [`DEFAULT_TOKEN_ENDPOINT_URL`] when [`TOKEN_ENDPOINT_URL_ENV`] is unset.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Self::from_lookup(lookup, [TOKEN_ENDPOINT_URL_ENV, ACCESS_KEY_ID_ENV, ACCESS_KEY_SECRET_ENV])
	}

	/// Token endpoint URL, exactly as configured.
	pub fn token_endpoint_url(&self) -> &str {
		&self.token_endpoint_url
	}

	/// Access key identifier (`oauth_consumer_key`).
	pub fn access_key_id(&self) -> &str {
		&self.access_key_id
	}

	/// Access key secret used to derive the HMAC key.
	pub fn access_key_secret(&self) -> &TokenSecret {
		&self.access_key_secret
	}

	fn from_lookup<F>(lookup: F, [url, id, secret]: [&str; 3]) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let token_endpoint_url = lookup(url).unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT_URL.into());

		CredentialsBuilder {
			token_endpoint_url: Some(token_endpoint_url),
			access_key_id: lookup(id),
			access_key_secret: lookup(secret),
		}
		.build()
	}
}

/// Builder for [`Credentials`] values.
#[derive(Clone, Default)]
pub struct CredentialsBuilder {
	/// Token endpoint URL.
	pub token_endpoint_url: Option<String>,
	/// Access key identifier.
	pub access_key_id: Option<String>,
	/// Access key secret.
	pub access_key_secret: Option<String>,
}
impl CredentialsBuilder {
	/// Sets the token endpoint URL.
	pub fn token_endpoint_url(mut self, url: impl Into<String>) -> Self {
		self.token_endpoint_url = Some(url.into());

		self
	}

	/// Sets the access key identifier.
	pub fn access_key_id(mut self, id: impl Into<String>) -> Self {
		self.access_key_id = Some(id.into());

		self
	}

	/// Sets the access key secret.
	pub fn access_key_secret(mut self, secret: impl Into<String>) -> Self {
		self.access_key_secret = Some(secret.into());

		self
	}

	/// Validates that every value is present and not blank.
	pub fn build(self) -> Result<Credentials, ConfigError> {
		let token_endpoint_url = require("token_endpoint_url", self.token_endpoint_url)?;
		let access_key_id = require("access_key_id", self.access_key_id)?;
		let access_key_secret = require("access_key_secret", self.access_key_secret)?;

		Ok(Credentials {
			token_endpoint_url: token_endpoint_url.trim().to_owned(),
			access_key_id,
			access_key_secret: TokenSecret::new(access_key_secret),
		})
	}
}
impl Debug for CredentialsBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialsBuilder")
			.field("token_endpoint_url", &self.token_endpoint_url)
			.field("access_key_id", &self.access_key_id)
			.field("access_key_secret_set", &self.access_key_secret.is_some())
			.finish()
	}
}

fn require(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
	value.filter(|value| !value.trim().is_empty()).ok_or(ConfigError::MissingCredential { field })
}

fn parse_properties(text: &str) -> HashMap<String, String> {
	let mut properties = HashMap::new();
	let mut lines = text.lines();

	while let Some(line) = lines.next() {
		let line = line.trim_start_matches(PROPERTY_WHITESPACE);

		if line.is_empty() || line.starts_with(['#', '!']) {
			continue;
		}

		let mut logical = line.to_owned();

		while continues(&logical) {
			logical.pop();

			match lines.next() {
				Some(next) => logical.push_str(next.trim_start_matches(PROPERTY_WHITESPACE)),
				None => break,
			}
		}

		let (key, value) = split_entry(&logical);

		properties.insert(unescape(key), unescape(value));
	}

	properties
}

fn continues(line: &str) -> bool {
	line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
	let mut escaped = false;
	let mut key_end = line.len();

	for (i, c) in line.char_indices() {
		if escaped {
			escaped = false;

			continue;
		}

		match c {
			'\\' => escaped = true,
			'=' | ':' | ' ' | '\t' | '\x0c' => {
				key_end = i;

				break;
			},
			_ => (),
		}
	}

	let rest = line[key_end..].trim_start_matches(PROPERTY_WHITESPACE);
	let rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);

	(&line[..key_end], rest.trim_start_matches(PROPERTY_WHITESPACE))
}

fn unescape(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	let mut chars = raw.chars();

	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);

			continue;
		}

		match chars.next() {
			Some('t') => out.push('\t'),
			Some('n') => out.push('\n'),
			Some('r') => out.push('\r'),
			Some('f') => out.push('\x0c'),
			Some('u') => {
				let hex = chars.clone().take(4).collect::<String>();
				let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);

				match decoded.filter(|_| hex.len() == 4) {
					Some(decoded) => {
						out.push(decoded);
						chars.nth(3);
					},
					None => out.push('u'),
				}
			},
			Some(other) => out.push(other),
			None => (),
		}
	}

	out
}
