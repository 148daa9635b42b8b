#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::*;
use meli_sdk::{
	auth::{Credentials, MeliSite},
};

const REDIRECT: &str = "https://example.com/callback";

fn setup(server: &MockServer) -> (ReqwestMeliClient, Arc<Credentials>) {
	let credentials = Arc::new(Credentials::new(MeliSite::Brazil, 123456, "secret"));
	let client = test_client(server).with_credentials(credentials.clone());

	(client, credentials)
}

#[tokio::test]
async fn authorize_stores_tokens_and_notifies() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.query_param("grant_type", "authorization_code")
				.query_param("client_id", "123456")
				.query_param("client_secret", "secret")
				.query_param("code", "TG-code")
				.query_param("redirect_uri", REDIRECT);
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"APP_USR-1","token_type":"bearer","expires_in":21600,"scope":"offline_access read write","user_id":99,"refresh_token":"TG-1"}"#,
			);
		})
		.await;
	let (client, credentials) = setup(&server);
	let events = Arc::new(Mutex::new(Vec::new()));
	let sink = events.clone();

	credentials.on_tokens_changed(move |event| sink.lock().push(event.clone()));

	assert!(client.authorize("TG-code", REDIRECT).await.expect("Authorize should not error."));

	mock.assert_async().await;

	let tokens = credentials.tokens().expect("Tokens should be stored.");
	let events = events.lock();

	assert_eq!(tokens.access_token.expose(), "APP_USR-1");
	assert_eq!(tokens.refresh_token.as_ref().map(|t| t.expose()), Some("TG-1"));
	assert_eq!(tokens.user_id, Some(99));
	assert_eq!(events.len(), 1);
	assert!(events[0].previous_access_token.is_none());
}

#[tokio::test]
async fn invalid_code_yields_false_without_tokens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").query_param("code", "bad-code");
			then.status(401)
				.body(r#"{"message":"invalid code","error":"invalid_grant","status":401}"#);
		})
		.await;
	let (client, credentials) = setup(&server);

	assert!(!client.authorize("bad-code", REDIRECT).await.expect("Authorize should not error."));

	mock.assert_async().await;

	assert!(credentials.tokens().is_none());
	assert!(credentials.authorization_header_value().is_none());
}

#[test]
fn authorization_url_is_pure_and_ordered() {
	let credentials = Credentials::new(MeliSite::Brazil, 123456, "secret");
	let first = credentials.authorization_url(REDIRECT);

	assert_eq!(
		first,
		"https://auth.mercadolivre.com.br/authorization?response_type=code&client_id=123456&redirect_uri=https%3A%2F%2Fexample.com%2Fcallback"
	);
	assert_eq!(first, credentials.authorization_url(REDIRECT));
}
