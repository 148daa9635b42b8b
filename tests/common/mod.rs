//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub use std::sync::Arc;

pub use httpmock::MockServer;
pub use meli_sdk::{
	client::{MeliClient, ReqwestMeliClient},
	config::ClientConfig,
	error::Error,
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	reqwest::Client,
	url::Url,
};
pub use parking_lot::Mutex;
pub use serde::Deserialize;

/// Builds a configuration pointing at the mock server.
///
/// The mock server may listen on plain HTTP or on HTTPS with a self-signed certificate.
pub fn test_config(server: &MockServer) -> ClientConfig {
	test_config_at(server, "/")
}

/// Builds a configuration whose API base is `prefix` on the mock server.
pub fn test_config_at(server: &MockServer, prefix: &str) -> ClientConfig {
	ClientConfig::builder()
		.api_base(Url::parse(&server.url(prefix)).expect("Mock server URL should parse."))
		.allow_insecure_http(true)
		.build()
		.expect("Test configuration should build.")
}

/// Builds a reqwest transport that accepts the self-signed certificates served by `httpmock`.
pub fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Builds a reqwest-backed client for `config` without credentials.
pub fn test_client_with(config: ClientConfig) -> ReqwestMeliClient {
	MeliClient::with_http_client(config, test_http_client(), ReqwestTransportErrorMapper)
}

/// Builds a reqwest-backed client against the mock server without credentials.
pub fn test_client(server: &MockServer) -> ReqwestMeliClient {
	test_client_with(test_config(server))
}
