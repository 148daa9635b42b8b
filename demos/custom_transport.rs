//! Demonstrates plugging a non-reqwest transport and error mapper into the client.
//!
//! 1. Implement [`ApiHttpClient`] and honor the [`SendTimeout`] extension when present.
//! 2. Provide a [`TransportErrorMapper`] that turns the transport's own error type into the
//!    client's [`Error`].
//! 3. Pass both to [`MeliClient::with_http_client`]; the refresh-and-retry policy runs on top
//!    of any transport.

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use color_eyre::Result;
// self
use meli_sdk::{
	auth::{Credentials, MeliSite},
	client::MeliClient,
	config::ClientConfig,
	error::{Error, TransportError},
	http::{
		ApiHttpClient, HttpFuture, HttpRequest, HttpResponse, SendTimeout, TransportErrorMapper,
	},
	http_types::{StatusCode, header::AUTHORIZATION},
	obs::CallKind,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let credentials = Arc::new(
		Credentials::new(MeliSite::Argentina, 123456, "demo-secret")
			.with_tokens("APP_USR-expired", "TG-demo"),
	);
	let transport = Arc::new(MockTransport::default());
	let client: MeliClient<MockTransport, MockTransportErrorMapper> =
		MeliClient::with_http_client(
			ClientConfig::production()?,
			transport.clone(),
			MockTransportErrorMapper,
		)
		.with_credentials(credentials.clone());
	let response = client.get("/users/me").send().await?;

	println!(
		"Answered {} after {} sends (refresh: {}).",
		response.status(),
		transport.sends.load(Ordering::SeqCst),
		response.refresh().as_str()
	);
	println!(
		"Stored access token rotated: {}.",
		credentials.access_token().is_some_and(|token| token.expose() == "APP_USR-fresh")
	);

	let offline: MeliClient<MockTransport, MockTransportErrorMapper> =
		MeliClient::with_http_client(
			ClientConfig::production()?,
			MockTransport { offline: true, ..MockTransport::default() },
			MockTransportErrorMapper,
		);

	match offline.get("/sites").send().await {
		Ok(response) => println!("Offline transport unexpectedly answered {}.", response.status()),
		Err(e) => println!("Transport failure mapped by the client: {e}"),
	}

	Ok(())
}

#[derive(Debug)]
enum MockTransportError {
	Offline { host: String },
	DeadlineExceeded,
}
impl Display for MockTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Offline { host } => write!(f, "host {host} is unreachable"),
			Self::DeadlineExceeded => write!(f, "deadline exceeded"),
		}
	}
}
impl StdError for MockTransportError {}

#[derive(Default)]
struct MockTransport {
	offline: bool,
	sends: AtomicUsize,
}
impl ApiHttpClient for MockTransport {
	type TransportError = MockTransportError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		self.sends.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.offline {
				let host = request.uri().host().unwrap_or_default().to_owned();

				return Err(MockTransportError::Offline { host });
			}
			if request.extensions().get::<SendTimeout>().is_some_and(|timeout| timeout.0.is_zero()) {
				return Err(MockTransportError::DeadlineExceeded);
			}

			let bearer = request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());
			let (status, body) = match (request.uri().path(), bearer) {
				("/oauth/token", _) => (
					StatusCode::OK,
					"{\"access_token\":\"APP_USR-fresh\",\"refresh_token\":\"TG-rotated\"}",
				),
				(_, Some("Bearer APP_USR-fresh")) => (StatusCode::OK, "{\"id\":42}"),
				_ => (
					StatusCode::UNAUTHORIZED,
					"{\"message\":\"invalid_token\",\"error\":\"not_found\",\"status\":401}",
				),
			};
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = status;

			Ok(response)
		})
	}
}

#[derive(Clone, Default)]
struct MockTransportErrorMapper;
impl TransportErrorMapper<MockTransportError> for MockTransportErrorMapper {
	fn map_transport_error(&self, call: CallKind, error: MockTransportError) -> Error {
		match error {
			MockTransportError::DeadlineExceeded => TransportError::timeout(call, error).into(),
			MockTransportError::Offline { .. } => TransportError::network(call, error).into(),
		}
	}
}
