// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
// self
use oauth2_fresh::{
	auth::Credentials,
	clock::SettableClock,
	error::TransportError,
	flows::TokenEndpoint,
	fresh::RefreshPolicy,
	http::{HttpFuture, HttpProvider, HttpRequest, HttpResponse},
	oauth::AccessTokenRequest,
	provider::OAuth1ClientCredentialsProvider,
};

/// Issues `token-1`, `token-2`, ... and can be switched into an outage.
#[derive(Default)]
struct RotatingTokens {
	issued: AtomicUsize,
	down: AtomicBool,
}
impl RotatingTokens {
	fn issued(&self) -> usize {
		self.issued.load(Ordering::SeqCst)
	}
}
impl HttpProvider for RotatingTokens {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			assert!(request.headers().contains_key("authorization"), "Requests must be signed.");

			if self.down.load(Ordering::SeqCst) {
				return Err(TransportError::network(std::io::Error::new(
					std::io::ErrorKind::ConnectionReset,
					"token endpoint offline",
				)));
			}

			let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
			let body = format!(r#"{{"access_token":"token-{n}","expires_in":30}}"#);

			Ok(HttpResponse::buffered(200, body))
		})
	}
}

fn endpoint(http: Arc<RotatingTokens>, clock: SettableClock) -> TokenEndpoint<RotatingTokens> {
	let credentials = Credentials::new("https://auth.example.com/oauth2/token", "id", "secret")
		.expect("Credentials fixture should build.");

	TokenEndpoint::new(http, Arc::new(OAuth1ClientCredentialsProvider::new(credentials)))
		.expect("Endpoint should build.")
		.with_clock(Arc::new(clock))
}

#[tokio::test(flavor = "multi_thread")]
async fn background_refresh_rotates_tokens_on_compressed_clock() -> Result<()> {
	// 30 simulated seconds pass in 30ms.
	let clock = SettableClock::new().compressed(1_000);
	let http = Arc::new(RotatingTokens::default());
	let fresh = endpoint(http.clone(), clock)
		.request_auto_refreshing_token(AccessTokenRequest::client_credentials());

	assert_eq!(fresh.get().await?.access_token(), "token-1");

	tokio::time::sleep(std::time::Duration::from_millis(250)).await;

	assert!(http.issued() >= 3, "Only {} tokens were issued.", http.issued());
	assert_ne!(fresh.get().await?.access_token(), "token-1");
	assert!(fresh.has_pending_refresh());

	Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn outage_keeps_serving_last_token_and_recovers() -> Result<()> {
	let clock = SettableClock::new().compressed(1_000);
	let http = Arc::new(RotatingTokens::default());
	let fresh = endpoint(http.clone(), clock)
		.with_refresh_policy(
			RefreshPolicy::default().with_minimum_refresh_interval(time::Duration::seconds(10)),
		)
		.request_auto_refreshing_token(AccessTokenRequest::client_credentials());

	fresh.get().await?;
	http.down.store(true, Ordering::SeqCst);

	tokio::time::sleep(std::time::Duration::from_millis(120)).await;

	let during = fresh.get().await?;
	let failure = fresh.last_failure().expect("The outage should be recorded.");

	assert!(during.access_token().starts_with("token-"));
	assert!(failure.background);
	assert!(fresh.metrics().failures() >= 1);

	http.down.store(false, Ordering::SeqCst);

	tokio::time::sleep(std::time::Duration::from_millis(120)).await;

	assert!(fresh.last_failure().is_none());
	assert!(fresh.has_pending_refresh());

	Ok(())
}
