#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use meli_sdk::{
	auth::{Credentials, MeliSite},
	error::ExchangeError,
	policy::RefreshAttempt,
};

const REFRESH_FORM: &str =
	"grant_type=refresh_token&client_id=123456&client_secret=secret&refresh_token=TG-old";
const INVALID_TOKEN: &str = r#"{"message":"invalid_token","error":"not_found","status":401}"#;

fn setup(server: &MockServer) -> (ReqwestMeliClient, Arc<Credentials>) {
	let credentials = Arc::new(
		Credentials::new(MeliSite::Argentina, 123456, "secret").with_tokens("AT-old", "TG-old"),
	);
	let client = test_client(server).with_credentials(credentials.clone());

	(client, credentials)
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_resent() {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me").header("authorization", "Bearer AT-old");
			then.status(401).header("content-type", "application/json").body(INVALID_TOKEN);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body(REFRESH_FORM);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"AT-new","refresh_token":"TG-new","expires_in":21600}"#);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me").header("authorization", "Bearer AT-new");
			then.status(200).header("content-type", "application/json").body(r#"{"id":42}"#);
		})
		.await;
	let (client, credentials) = setup(&server);
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();

	credentials.on_tokens_changed(move |event| {
		sink.lock().push((
			event.previous_access_token.as_ref().map(|token| token.expose().to_owned()),
			event.access_token.expose().to_owned(),
		));
	});

	let me = client
		.get("/users/me")
		.send_json::<serde_json::Value>()
		.await
		.expect("Call should succeed after refresh.");

	stale.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(me["id"], 42);
	assert_eq!(credentials.access_token().map(|t| t.expose().to_owned()).as_deref(), Some("AT-new"));
	assert_eq!(credentials.refresh_token().map(|t| t.expose().to_owned()).as_deref(), Some("TG-new"));
	assert_eq!(*seen.lock(), vec![(Some("AT-old".to_owned()), "AT-new".to_owned())]);
}

#[tokio::test]
async fn persistent_401_stops_after_one_retry() {
	let server = MockServer::start_async().await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders/search");
			then.status(401).body(INVALID_TOKEN);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body(r#"{"access_token":"AT-new"}"#);
		})
		.await;
	let (client, _) = setup(&server);
	let response = client
		.get("/orders/search")
		.param("seller", 1)
		.send()
		.await
		.expect("Raw call should return the final response.");

	assert_eq!(response.status().as_u16(), 401);
	assert!(matches!(response.refresh(), RefreshAttempt::Refreshed));

	resource.assert_calls_async(2).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn refresh_rejection_preserves_original_failure() {
	let server = MockServer::start_async().await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me");
			then.status(401).body(INVALID_TOKEN);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400).body(r#"{"message":"invalid_grant","error":"invalid_grant","status":400}"#);
		})
		.await;

	let (client, credentials) = setup(&server);
	let notified = Arc::new(AtomicUsize::new(0));
	let counter = notified.clone();

	credentials.on_tokens_changed(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	let err = client
		.get("/users/me")
		.send_json::<serde_json::Value>()
		.await
		.expect_err("Call should fail with the original authorization error.");

	match err {
		Error::Authorization { status: 401, error, refresh: Some(refresh) } => {
			assert_eq!(error.map(|body| body.message).as_deref(), Some("invalid_token"));
			assert!(matches!(
				*refresh,
				Error::RefreshFailed(ExchangeError::Rejected { status: 400, .. })
			));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	resource.assert_calls_async(1).await;

	assert_eq!(credentials.access_token().map(|t| t.expose().to_owned()).as_deref(), Some("AT-old"));
	assert_eq!(credentials.refresh_token().map(|t| t.expose().to_owned()).as_deref(), Some("TG-old"));
	assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_refresh_token_means_no_refresh() {
	let server = MockServer::start_async().await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me");
			then.status(401).body(INVALID_TOKEN);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body(r#"{"access_token":"AT-new"}"#);
		})
		.await;
	let credentials =
		Arc::new(Credentials::new(MeliSite::Chile, 123456, "secret").with_access_token("AT-only"));
	let err = test_client(&server)
		.with_credentials(credentials)
		.get("/users/me")
		.send_json::<serde_json::Value>()
		.await
		.expect_err("401 should surface.");

	assert!(matches!(err, Error::Authorization { status: 401, refresh: None, .. }));

	resource.assert_calls_async(1).await;
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn prefixed_api_base_routes_token_exchange_under_prefix() {
	let server = MockServer::start_async().await;
	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", "Bearer AT-old");
			then.status(401).body(INVALID_TOKEN);
		})
		.await;
	let prefixed_token = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/oauth/token").body(REFRESH_FORM);
			then.status(200).body(r#"{"access_token":"AT-new","refresh_token":"TG-new"}"#);
		})
		.await;
	let root_token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body(r#"{"access_token":"AT-wrong"}"#);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me").header("authorization", "Bearer AT-new");
			then.status(200).body(r#"{"id":42}"#);
		})
		.await;
	let credentials = Arc::new(
		Credentials::new(MeliSite::Argentina, 123456, "secret").with_tokens("AT-old", "TG-old"),
	);
	let response = test_client_with(test_config_at(&server, "/api/"))
		.with_credentials(credentials.clone())
		.get("/users/me")
		.send()
		.await
		.expect("Call should succeed after refresh.");

	assert_eq!(response.status().as_u16(), 200);

	resource.assert_calls_async(1).await;
	prefixed_token.assert_calls_async(1).await;
	root_token.assert_calls_async(0).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(credentials.access_token().map(|t| t.expose().to_owned()).as_deref(), Some("AT-new"));
}
