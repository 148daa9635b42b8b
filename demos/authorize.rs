//! Walks through the authorization-code login: print the marketplace authorization URL,
//! exchange the code the redirect handler received, and call the API with the stored tokens.
//!
//! A local mock server stands in for the token endpoint and the `/users/me` resource.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use meli_sdk::{
	auth::{Credentials, MeliSite},
	client::{MeliClient, ReqwestMeliClient},
	config::ClientConfig,
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	reqwest::Client,
};

const REDIRECT_URI: &str = "https://app.example.com/meli/callback";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.query_param("grant_type", "authorization_code")
				.query_param("code", "TG-demo-code");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"APP_USR-demo\",\"refresh_token\":\"TG-demo\",\"expires_in\":21600,\"user_id\":42}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me").header("authorization", "Bearer APP_USR-demo");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":42,\"nickname\":\"DEMO_SELLER\"}");
		})
		.await;

	let config = ClientConfig::builder()
		.api_base(Url::parse(&server.base_url())?)
		.allow_insecure_http(true)
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let credentials = Arc::new(Credentials::new(MeliSite::Argentina, 123456, "demo-secret"));

	credentials.on_tokens_changed(|event| {
		println!(
			"Persist the new token pair for user {:?} (refresh token present: {}).",
			event.user_id,
			event.refresh_token.is_some()
		);
	});

	let client: ReqwestMeliClient =
		MeliClient::with_http_client(config, http_client, ReqwestTransportErrorMapper)
			.with_credentials(credentials.clone());

	println!("Send your user to {}.", client.authorization_url(REDIRECT_URI)?);

	// Simulate the redirect handler receiving `?code=TG-demo-code`.
	if !client.authorize("TG-demo-code", REDIRECT_URI).await? {
		eprintln!("The token endpoint refused the authorization code.");

		return Ok(());
	}

	token_mock.assert_async().await;

	let me = client.get("/users/me").send_json::<serde_json::Value>().await?;

	println!("Signed in as {}.", me["nickname"]);

	Ok(())
}
