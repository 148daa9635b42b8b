//! Async Mercado Libre REST client with OAuth 2.0 authorization-code login and transparent,
//! single-shot access token refresh.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meli_sdk::{
//! 	auth::{Credentials, MeliSite},
//! 	client::MeliClient,
//! 	config::ClientConfig,
//! };
//!
//! # async fn run() -> meli_sdk::error::Result<()> {
//! let credentials =
//! 	Arc::new(Credentials::new(MeliSite::Argentina, 123456, "secret").with_tokens("AT", "TG"));
//!
//! credentials.on_tokens_changed(|event| println!("persist {:?}", event.refresh_token));
//!
//! let client = MeliClient::new(ClientConfig::production()?).with_credentials(credentials);
//! let me: serde_json::Value = client.get("/users/me").send_json().await?;
//! # let _ = me;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod obs;
pub mod policy;
pub mod request;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		task::{Context, Poll},
	};
	// crates.io
	use ::http::{HeaderMap, Method, StatusCode};
	// self
	use crate::{
		client::MeliClient,
		config::ClientConfig,
		error::TransportError,
		http::{
			ApiHttpClient, ApiResponse, HttpFuture, HttpRequest, HttpResponse, TransportErrorMapper,
		},
		obs::CallKind,
	};

	/// Client type alias used by tests driven through [`ScriptedHttpClient`].
	pub type ScriptedMeliClient = MeliClient<ScriptedHttpClient, ScriptedErrorMapper>;

	/// Canned answer served by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// Response with the given status and body.
		Respond {
			/// HTTP status.
			status: u16,
			/// Response body.
			body: String,
		},
		/// Transport failure.
		Fail,
		/// Never answers; models a stalled peer.
		Hang,
	}
	impl ScriptedReply {
		/// Builds a response reply.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self::Respond { status, body: body.into() }
		}
	}

	/// Error produced by [`ScriptedReply::Fail`].
	#[derive(Debug, ThisError)]
	#[error("Scripted transport failure.")]
	pub struct ScriptedTransportError;

	/// Maps [`ScriptedTransportError`] into a network error.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedErrorMapper;
	impl TransportErrorMapper<ScriptedTransportError> for ScriptedErrorMapper {
		fn map_transport_error(&self, call: CallKind, error: ScriptedTransportError) -> Error {
			TransportError::network(call, error).into()
		}
	}

	/// Snapshot of a request seen by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Request method.
		pub method: Method,
		/// Request path.
		pub path: String,
		/// Raw query string.
		pub query: Option<String>,
		/// `Authorization` header value.
		pub authorization: Option<String>,
		/// Request headers.
		pub headers: HeaderMap,
		/// Request body.
		pub body: Vec<u8>,
	}
	impl RecordedRequest {
		/// Returns the body as UTF-8 text.
		pub fn body_text(&self) -> String {
			String::from_utf8_lossy(&self.body).into_owned()
		}

		/// Returns a header value as text.
		pub fn header(&self, name: &str) -> Option<String> {
			self.headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
		}
	}

	struct ScriptedRoute {
		path: String,
		bearer: Option<String>,
		replies: VecDeque<ScriptedReply>,
	}

	/// In-memory transport that answers from per-path scripts and records every request.
	///
	/// Each route serves its replies in order and keeps repeating the last one. Routes bound to
	/// a bearer token win over plain routes for the same path. Every send yields to the executor
	/// once before answering so concurrent calls interleave.
	#[derive(Default)]
	pub struct ScriptedHttpClient {
		routes: Mutex<Vec<ScriptedRoute>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}
	impl ScriptedHttpClient {
		/// Creates a transport with no routes; unknown paths answer `404`.
		pub fn new() -> Self {
			Self::default()
		}

		/// Scripts the replies for `path`.
		pub fn route<I>(self, path: &str, replies: I) -> Self
		where
			I: IntoIterator<Item = ScriptedReply>,
		{
			self.push_route(path, None, replies)
		}

		/// Scripts the replies for `path` when the request carries `Bearer <token>`.
		pub fn route_for_token<I>(self, path: &str, token: &str, replies: I) -> Self
		where
			I: IntoIterator<Item = ScriptedReply>,
		{
			self.push_route(path, Some(format!("Bearer {token}")), replies)
		}

		/// Returns every request seen so far, in send order.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		/// Returns how many requests hit `path`.
		pub fn count(&self, path: &str) -> usize {
			self.requests.lock().iter().filter(|request| request.path == path).count()
		}

		fn push_route<I>(self, path: &str, bearer: Option<String>, replies: I) -> Self
		where
			I: IntoIterator<Item = ScriptedReply>,
		{
			self.routes.lock().push(ScriptedRoute {
				path: path.into(),
				bearer,
				replies: replies.into_iter().collect(),
			});

			self
		}

		fn next_reply(&self, recorded: &RecordedRequest) -> Option<ScriptedReply> {
			let mut routes = self.routes.lock();
			let route = routes
				.iter_mut()
				.filter(|route| route.path == recorded.path)
				.filter(|route| route.bearer.is_none() || route.bearer == recorded.authorization)
				.max_by_key(|route| route.bearer.is_some())?;

			if route.replies.len() > 1 {
				route.replies.pop_front()
			} else {
				route.replies.front().cloned()
			}
		}
	}
	impl ApiHttpClient for ScriptedHttpClient {
		type TransportError = ScriptedTransportError;

		fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			let (parts, body) = request.into_parts();
			let recorded = RecordedRequest {
				method: parts.method,
				path: parts.uri.path().to_owned(),
				query: parts.uri.query().map(str::to_owned),
				authorization: parts
					.headers
					.get(::http::header::AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned),
				headers: parts.headers,
				body,
			};
			let reply = self.next_reply(&recorded);

			self.requests.lock().push(recorded);

			Box::pin(async move {
				YieldOnce(false).await;

				match reply {
					Some(ScriptedReply::Respond { status, body }) => {
						let mut response = HttpResponse::new(body.into_bytes());

						*response.status_mut() =
							StatusCode::from_u16(status).map_err(|_| ScriptedTransportError)?;

						Ok(response)
					},
					Some(ScriptedReply::Fail) => Err(ScriptedTransportError),
					Some(ScriptedReply::Hang) => std::future::pending().await,
					None => {
						let mut response = HttpResponse::new(Vec::new());

						*response.status_mut() = StatusCode::NOT_FOUND;

						Ok(response)
					},
				}
			})
		}
	}

	struct YieldOnce(bool);
	impl Future for YieldOnce {
		type Output = ();

		fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
			if self.0 {
				return Poll::Ready(());
			}

			self.0 = true;
			cx.waker().wake_by_ref();

			Poll::Pending
		}
	}

	/// Builds a client over `transport` without credentials.
	pub fn scripted_client(
		transport: Arc<ScriptedHttpClient>,
		config: ClientConfig,
	) -> ScriptedMeliClient {
		MeliClient::with_http_client(config, transport, ScriptedErrorMapper)
	}

	/// Client type alias used by reqwest-backed integration tests.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestClient =
		MeliClient<crate::http::ReqwestHttpClient, crate::http::ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> crate::http::ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::http::ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`MeliClient`] over [`test_reqwest_http_client`] without credentials.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(config: ClientConfig) -> ReqwestTestClient {
		MeliClient::with_http_client(
			config,
			test_reqwest_http_client(),
			crate::http::ReqwestTransportErrorMapper,
		)
	}

	/// Wraps a status + body into an [`ApiResponse`].
	pub fn scripted_response(status: u16, body: &str) -> ApiResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Test status should be valid.");

		ApiResponse::from_http(response)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
