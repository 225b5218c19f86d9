//! Fetches a signed client-credentials token from a local mock endpoint, then keeps it fresh in
//! the background.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_fresh::{
	auth::Credentials,
	flows::TokenEndpoint,
	oauth::AccessTokenRequest,
	provider::OAuth1ClientCredentialsProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").header_exists("authorization");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;
	// Real deployments call `OAuth1ClientCredentialsProvider::from_env()` instead.
	let credentials = Credentials::builder()
		.token_endpoint_url(format!("http://{}/oauth2/token", server.address()))
		.access_key_id("demo-key-id")
		.access_key_secret("demo-key-secret")
		.build()?;
	let endpoint =
		TokenEndpoint::with_reqwest(Arc::new(OAuth1ClientCredentialsProvider::new(credentials)))?;
	let token = endpoint
		.request_token(&AccessTokenRequest::client_credentials().with_scope("reports.read"))
		.await?;

	println!("One-shot access token: {}.", token.access_token());

	let fresh = endpoint.request_auto_refreshing_token(AccessTokenRequest::client_credentials());
	let cached = fresh.get().await?;

	println!(
		"Cached access token: {}, expires at {:?}, next refresh scheduled: {}.",
		cached.access_token(),
		fresh.expires_at(),
		fresh.has_pending_refresh()
	);

	token_mock.assert_calls_async(2).await;

	Ok(())
}
