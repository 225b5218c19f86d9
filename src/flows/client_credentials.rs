//! One-shot and auto-refreshing client-credentials token requests.

// self
use crate::{
	_prelude::*,
	error::TransportError,
	flows::{TokenEndpoint, common},
	fresh::{Fresh, Refresh, RefreshFuture},
	http::HttpProvider,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	oauth::{AccessTokenRequest, AccessTokenResponse},
};

impl<H> TokenEndpoint<H>
where
	H: ?Sized + HttpProvider,
{
	/// Requests a token once.
	///
	/// # Errors
	///
	/// - [`Error::RequestExecution`] when the URL is malformed, the request cannot be assembled, or
	///   the transport fails.
	/// - [`Error::ResponseParsing`] when the body matches neither the token nor the error schema.
	/// - [`Error::AccessToken`] when the endpoint answers with a structured OAuth error.
	pub async fn request_token(&self, request: &AccessTokenRequest) -> Result<AccessTokenResponse> {
		const KIND: FlowKind = FlowKind::TokenRequest;

		let span = FlowSpan::new(KIND, "request_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.exchange(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Returns a cache that fetches `request` on first access and keeps it refreshed in the
	/// background, driven by this endpoint's clock and refresh policy.
	pub fn request_auto_refreshing_token(
		&self,
		request: AccessTokenRequest,
	) -> Fresh<AccessTokenResponse> {
		let refresher = TokenRefresher { endpoint: self.clone(), request };

		Fresh::auto_refreshing(self.clock.clone(), refresher, self.refresh_policy)
	}

	async fn exchange(&self, request: &AccessTokenRequest) -> Result<AccessTokenResponse> {
		let url = Url::parse(self.provider.token_endpoint_url()).map_err(TransportError::from)?;
		let common::PreparedRequest { mut request, signed_params } = common::prepare_request(
			self.provider.http_method(),
			url,
			request,
			self.body_encoding,
		)?;

		self.provider.client_authorizer().authorize(&mut request, &signed_params)?;

		let response = self.http.execute(request).await?;

		common::parse_response(response)
	}
}

/// [`Refresh`] source that re-issues a fixed token request.
pub struct TokenRefresher<H>
where
	H: ?Sized + HttpProvider,
{
	endpoint: TokenEndpoint<H>,
	request: AccessTokenRequest,
}
impl<H> TokenRefresher<H>
where
	H: ?Sized + HttpProvider,
{
	/// Creates a refresher for `request` against `endpoint`.
	pub fn new(endpoint: TokenEndpoint<H>, request: AccessTokenRequest) -> Self {
		Self { endpoint, request }
	}
}
impl<H> Refresh<AccessTokenResponse> for TokenRefresher<H>
where
	H: ?Sized + HttpProvider,
{
	fn refresh(&self) -> RefreshFuture<'_, AccessTokenResponse> {
		Box::pin(self.endpoint.request_token(&self.request))
	}
}
impl<H> Debug for TokenRefresher<H>
where
	H: ?Sized + HttpProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("endpoint", &self.endpoint)
			.field("request", &self.request)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::Method;
	use time::macros::datetime;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::Credentials,
		clock::ManualClock,
		error::{ConfigError, ResponseParsingError},
		ext::HttpRequestAuthorizer,
		flows::BodyEncoding,
		provider::{ClientCredentialsProvider, OAuth1ClientCredentialsProvider},
	};

	const TOKEN_12345: &str = r#"{"access_token":"12345","token_type":"Bearer","expires_in":30}"#;
	const TOKEN_67890: &str = r#"{"access_token":"67890","token_type":"Bearer","expires_in":30}"#;

	fn provider() -> OAuth1ClientCredentialsProvider {
		OAuth1ClientCredentialsProvider::new(test_credentials())
	}

	fn endpoint(http: &Arc<ScriptedHttpProvider>) -> TokenEndpoint<ScriptedHttpProvider> {
		TokenEndpoint::new(http.clone(), Arc::new(provider())).expect("Endpoint should build.")
	}

	struct BlankProvider;
	impl ClientCredentialsProvider for BlankProvider {
		fn token_endpoint_url(&self) -> &str {
			"   "
		}

		fn client_authorizer(&self) -> Arc<dyn HttpRequestAuthorizer> {
			provider().client_authorizer()
		}
	}

	#[tokio::test]
	async fn signed_form_request_yields_token() {
		let http = Arc::new(ScriptedHttpProvider::default().respond(200, TOKEN_12345));
		let token = endpoint(&http)
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect("Token request should succeed.");

		assert_eq!(token.access_token(), "12345");
		assert_eq!(token.expires_in, Some(30));

		let requests = http.requests();
		let sent = &requests[0];
		let authorization = sent.authorization.as_deref().expect("Request must be signed.");

		assert_eq!(sent.method, "POST");
		assert_eq!(sent.uri, "https://token.example.com/oauth2/token");
		assert_eq!(sent.content_type.as_deref(), Some("application/x-www-form-urlencoded"));
		assert_eq!(sent.body, b"grant_type=client_credentials");
		assert!(authorization.starts_with("OAuth "));
		assert!(authorization.contains("oauth_consumer_key=\"test-key-id\""));
		assert!(authorization.contains("oauth_signature_method=\"HMAC-SHA256\""));
		assert!(http.body_closed());
	}

	#[tokio::test]
	async fn structured_error_surfaces_status_and_code() {
		let http = Arc::new(ScriptedHttpProvider::default().respond(
			401,
			r#"{"error":"unauthorized_client","error_description":"Key revoked."}"#,
		));
		let err = endpoint(&http)
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect_err("A 401 must fail.");

		assert_eq!(err.status(), Some(401));
		assert_eq!(
			err.error_response().and_then(|response| response.error_description.as_deref()),
			Some("Key revoked.")
		);
		assert!(http.body_closed());
	}

	#[tokio::test]
	async fn invalid_json_is_a_parsing_failure_for_any_status() {
		for status in [200, 400, 503] {
			let http = Arc::new(ScriptedHttpProvider::default().respond(status, "not json"));
			let err = endpoint(&http)
				.request_token(&AccessTokenRequest::client_credentials())
				.await
				.expect_err("Invalid JSON must fail.");

			assert!(matches!(err, Error::ResponseParsing(_)), "status {status}: {err:?}");
			assert!(http.body_closed());
		}
	}

	#[tokio::test]
	async fn close_failure_never_masks_result() {
		let http = Arc::new(ScriptedHttpProvider::default().respond_failing_close(200, TOKEN_12345));
		let token = endpoint(&http)
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect("Close failure must not replace a successful result.");

		assert_eq!(token.access_token(), "12345");

		let http = Arc::new(ScriptedHttpProvider::default().respond_failing_close(400, "{}"));
		let err = endpoint(&http)
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect_err("Close failure must not replace a parsing failure.");

		assert!(matches!(
			err,
			Error::ResponseParsing(ResponseParsingError::ErrorResponse { status: 400, .. })
		));
	}

	#[tokio::test]
	async fn transport_failure_preserves_cause() {
		let http = Arc::new(ScriptedHttpProvider::default().fail(TransportError::network(
			std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
		)));
		let err = endpoint(&http)
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect_err("A transport failure must fail.");

		assert!(matches!(err, Error::RequestExecution(TransportError::Network { .. })));
		assert!(err.source().and_then(|cause| cause.source()).is_some());
	}

	#[tokio::test]
	async fn malformed_url_fails_before_any_io() {
		let credentials = Credentials::new("not a url", "id", "secret")
			.expect("URL syntax is checked lazily.");
		let http = Arc::new(ScriptedHttpProvider::default().respond(200, TOKEN_12345));
		let endpoint = TokenEndpoint::new(
			http.clone(),
			Arc::new(OAuth1ClientCredentialsProvider::new(credentials)),
		)
		.expect("Endpoint should build.");
		let err = endpoint
			.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect_err("A malformed URL must fail.");

		assert!(matches!(err, Error::RequestExecution(TransportError::InvalidUrl { .. })));
		assert_eq!(http.calls(), 0);
	}

	#[test]
	fn blank_endpoint_is_rejected_at_construction() {
		let http = Arc::new(ScriptedHttpProvider::default());
		let err = TokenEndpoint::new(http.clone(), Arc::new(BlankProvider))
			.expect_err("A blank endpoint must be rejected.");

		assert!(matches!(err, ConfigError::BlankTokenEndpoint));
		assert_eq!(http.calls(), 0);
	}

	#[tokio::test]
	async fn json_and_get_variants_shape_the_request() {
		let http = Arc::new(ScriptedHttpProvider::default().respond(200, TOKEN_12345));

		endpoint(&http)
			.with_body_encoding(BodyEncoding::Json)
			.request_token(&AccessTokenRequest::client_credentials().with_expires_in(600))
			.await
			.expect("JSON request should succeed.");

		let get =
			TokenEndpoint::new(http.clone(), Arc::new(provider().with_http_method(Method::GET)))
				.expect("Endpoint should build.");

		get.request_token(&AccessTokenRequest::client_credentials())
			.await
			.expect("GET request should succeed.");

		let requests = http.requests();

		assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
		assert_eq!(requests[0].body, br#"{"grant_type":"client_credentials","expires_in":600}"#);
		assert_eq!(requests[1].method, "GET");
		assert_eq!(
			requests[1].uri,
			"https://token.example.com/oauth2/token?grant_type=client_credentials"
		);
		assert!(requests[1].body.is_empty());
		assert!(requests[1].authorization.is_some());
	}

	#[tokio::test]
	async fn auto_refreshing_token_rotates_in_background() {
		let clock = ManualClock::new(datetime!(2024-06-01 12:00 UTC));
		let http = Arc::new(
			ScriptedHttpProvider::default().respond(200, TOKEN_12345).respond(200, TOKEN_67890),
		);
		let fresh = endpoint(&http)
			.with_clock(Arc::new(clock.clone()))
			.request_auto_refreshing_token(AccessTokenRequest::client_credentials());

		assert_eq!(http.calls(), 0);
		assert_eq!(fresh.get().await.expect("First access should fetch.").access_token(), "12345");
		assert_eq!(clock.advance(Duration::seconds(30)).await, 1);
		assert_eq!(fresh.get().await.expect("Rotated token should be served.").access_token(), "67890");
		assert_eq!(http.calls(), 2);
		assert!(fresh.has_pending_refresh());
	}
}
