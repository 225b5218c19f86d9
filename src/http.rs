//! Transport primitives for token endpoint calls.
//!
//! The module exposes [`HttpProvider`] alongside [`HttpResponse`] and [`ResponseBody`] so
//! downstream crates can plug in their own HTTP stack. The endpoint owns every response it
//! receives and closes its body through [`close_response_body`] once parsing finishes, whatever the
//! outcome.

// std
use std::io::{Cursor, Read};
// self
use crate::{
	_prelude::*,
	error::{BodyCloseError, TransportError},
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Outbound request handed to an [`HttpProvider`].
pub type HttpRequest = oauth2::HttpRequest;

/// Boxed future returned by [`HttpProvider::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing signed token requests.
///
/// The trait is the crate's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so a single transport can be shared by a foreground caller and the
/// background refreshes scheduled on a [`Clock`](crate::clock::Clock).
pub trait HttpProvider
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the raw response, or the transport failure that prevented
	/// one.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Readable response body that must be closed once consumed.
pub trait ResponseBody
where
	Self: Read + Send,
{
	/// Releases the resources behind the body.
	fn close(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

/// Response body that is already fully buffered in memory.
#[derive(Clone, Debug, Default)]
pub struct BufferedBody(Cursor<Vec<u8>>);
impl BufferedBody {
	/// Wraps buffered bytes.
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(Cursor::new(bytes.into()))
	}
}
impl Read for BufferedBody {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.0.read(buf)
	}
}
impl ResponseBody for BufferedBody {}

/// Raw response returned by an [`HttpProvider`].
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Declared body length, when the transport knows it.
	pub content_length: Option<u64>,
	/// Response body; closed by the consumer.
	pub body: Box<dyn ResponseBody>,
}
impl HttpResponse {
	/// Assembles a response from its parts.
	pub fn new(status: u16, content_length: Option<u64>, body: Box<dyn ResponseBody>) -> Self {
		Self { status, content_length, body }
	}

	/// Builds a response around an in-memory body.
	pub fn buffered(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
		let bytes = bytes.into();
		let content_length = Some(bytes.len() as u64);

		Self::new(status, content_length, Box::new(BufferedBody::new(bytes)))
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}
impl Debug for HttpResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpResponse")
			.field("status", &self.status)
			.field("content_length", &self.content_length)
			.finish_non_exhaustive()
	}
}

/// Closes `body` if present, converting a failure into the dedicated [`BodyCloseError`].
pub fn close_response_body(body: Option<&mut dyn ResponseBody>) -> Result<(), BodyCloseError> {
	match body {
		Some(body) => body.close().map_err(BodyCloseError),
		None => Ok(()),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests should not follow redirects: a token endpoint answers directly, and a redirect
/// would replay the signed request against a URL it was not signed for. [`ReqwestHttpProvider::new`]
/// disables them; configure any custom client passed to [`ReqwestHttpProvider::with_client`] the
/// same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpProvider(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpProvider {
	/// Builds a provider around a client that never follows redirects.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpProvider {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpProvider for ReqwestHttpProvider {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status().as_u16();
			let content_length = response.content_length();
			let bytes = response.bytes().await?;

			Ok(HttpResponse::new(status, content_length, Box::new(BufferedBody::new(bytes.to_vec()))))
		})
	}
}
