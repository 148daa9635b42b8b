//! Transport primitives shared by resource calls and token exchanges.
//!
//! The module exposes [`ApiHttpClient`] so downstream crates can plug in custom HTTP
//! stacks, [`TransportErrorMapper`] to classify their failures, and [`ApiResponse`], the
//! buffered response handed back to callers. Requests and responses are plain
//! [`http`](::http) messages with owned byte bodies, so every attempt is built from scratch and
//! nothing is reused across the original send and the retry.

// std
use std::{borrow::Cow, time::Duration as StdDuration};
// crates.io
use ::http::{HeaderMap, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::DecodeError, obs::CallKind, policy::RefreshAttempt};
#[cfg(feature = "reqwest")]
use crate::error::{ConfigError, TransportError};

/// Outbound request handed to an [`ApiHttpClient`].
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Buffered response produced by an [`ApiHttpClient`].
pub type HttpResponse = ::http::Response<Vec<u8>>;
/// Boxed future returned by [`ApiHttpClient::execute`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports used for both resource calls and token exchanges.
///
/// The trait is the client's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so one transport can back many concurrent calls, and the returned
/// future must be `Send` so callers can drive it on any executor.
///
/// # Deadline Contract
///
/// When the request carries a [`SendTimeout`] extension, the implementation must abandon the
/// send once the duration elapses and report a timeout error.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends the request and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Maps transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport into a client error.
	fn map_transport_error(&self, call: CallKind, error: E) -> Error;
}

/// Per-send deadline attached to a request as an [`http`](::http) extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendTimeout(pub StdDuration);

/// Error payload returned by the API for unsuccessful calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
	/// Human-readable message (e.g. `invalid_token`).
	pub message: String,
	/// Machine-readable error code (e.g. `not_found`).
	#[serde(default)]
	pub error: Option<String>,
	/// HTTP status echoed in the payload.
	#[serde(default)]
	pub status: Option<u16>,
}
impl ApiErrorBody {
	/// Returns `true` when the message marks an invalid or expired access token.
	///
	/// Matching ignores case and treats `_`/`-` as spaces, so `invalid_token`,
	/// `Invalid token`, and `INVALID-TOKEN` all qualify.
	pub fn is_invalid_token(&self) -> bool {
		let normalized = self
			.message
			.chars()
			.map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
			.collect::<String>();

		normalized.contains("invalid token")
	}
}

/// Buffered response returned by the public call surface.
#[derive(Debug)]
pub struct ApiResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
	refresh: RefreshAttempt,
}
impl ApiResponse {
	/// Wraps a transport response.
	pub fn from_http(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self {
			status: parts.status,
			headers: parts.headers,
			body,
			refresh: RefreshAttempt::default(),
		}
	}

	pub(crate) fn with_refresh(mut self, refresh: RefreshAttempt) -> Self {
		self.refresh = refresh;

		self
	}

	/// Returns the HTTP status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the raw response body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Returns the body as text, replacing invalid UTF-8 sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Reports whether the refresh policy exchanged tokens for this call.
	pub fn refresh(&self) -> &RefreshAttempt {
		&self.refresh
	}

	/// Deserializes the body into `T`, surfacing the failing JSON path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodeError { status: Some(self.status.as_u16()), source }.into())
	}

	/// Parses the body as an [`ApiErrorBody`]; returns `None` when it has another shape.
	pub fn error_body(&self) -> Option<ApiErrorBody> {
		serde_json::from_slice(&self.body).ok()
	}

	/// Returns the `Retry-After` hint, expressed as seconds or an RFC 2822 date.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}

	/// Converts non-success statuses into [`Error::Authorization`] or [`Error::Status`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}

		let status = self.status.as_u16();
		let error = self.error_body();

		if self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN {
			let refresh = match self.refresh {
				RefreshAttempt::Failed(err) => Some(err),
				_ => None,
			};

			Err(Error::Authorization { status, error, refresh })
		} else {
			Err(Error::Status { status, error })
		}
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, call: CallKind, error: ReqwestError) -> Error {
		if error.is_builder() {
			return ConfigError::from(error).into();
		}
		if error.is_timeout() {
			return TransportError::timeout(call, error).into();
		}

		TransportError::network(call, error).into()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async move {
			let timeout = request.extensions().get::<SendTimeout>().map(|deadline| deadline.0);
			let mut request = reqwest::Request::try_from(request)?;

			if timeout.is_some() {
				*request.timeout_mut() = timeout;
			}

			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut buffered = HttpResponse::new(response.bytes().await?.to_vec());

			*buffered.status_mut() = status;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> ApiResponse {
		let mut raw = HttpResponse::new(body.as_bytes().to_vec());

		*raw.status_mut() = StatusCode::from_u16(status).expect("Test status should be valid.");

		ApiResponse::from_http(raw)
	}

	#[test]
	fn invalid_token_marker_matching() {
		let body = |message: &str| ApiErrorBody {
			message: message.into(),
			error: Some("not_found".into()),
			status: Some(401),
		};

		assert!(body("invalid_token").is_invalid_token());
		assert!(body("Invalid token").is_invalid_token());
		assert!(body("INVALID-TOKEN").is_invalid_token());
		assert!(!body("invalid_grant").is_invalid_token());
		assert!(!body("forbidden").is_invalid_token());
	}

	#[test]
	fn error_body_fails_open() {
		assert!(response(401, "<html>nope</html>").error_body().is_none());
		assert!(response(401, "").error_body().is_none());
		assert!(response(401, r#"{"error":"no message"}"#).error_body().is_none());

		let parsed =
			response(401, r#"{"message":"invalid_token","error":"not_found","status":401}"#)
				.error_body()
				.expect("Well-formed error payload should parse.");

		assert_eq!(parsed.status, Some(401));
	}

	#[test]
	fn json_decode_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Site {
			#[allow(dead_code)]
			id: String,
		}

		let err = response(200, r#"[{"id":"MLA"},{"id":7}]"#)
			.json::<Vec<Site>>()
			.expect_err("Mismatched payload should fail to decode.");

		match err {
			Error::Decode(decode) => {
				assert_eq!(decode.status, Some(200));
				assert!(decode.source.path().to_string().ends_with("id"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn error_for_status_classifies_authorization() {
		let err = response(401, r#"{"message":"invalid_token","error":"not_found","status":401}"#)
			.error_for_status()
			.expect_err("401 should become an error.");

		assert!(matches!(err, Error::Authorization { status: 401, error: Some(_), refresh: None }));

		let err = response(500, "boom").error_for_status().expect_err("500 should become an error.");

		assert!(matches!(err, Error::Status { status: 500, error: None }));
		assert!(response(201, "").error_for_status().is_ok());
	}

	#[test]
	fn retry_after_seconds() {
		let mut raw = HttpResponse::new(Vec::new());

		raw.headers_mut().insert(RETRY_AFTER, ::http::HeaderValue::from_static("7"));

		assert_eq!(ApiResponse::from_http(raw).retry_after(), Some(Duration::seconds(7)));
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn reqwest_transport_reaches_self_signed_mock_server() {
		// crates.io
		use httpmock::prelude::*;
		// self
		use crate::_preludet::build_reqwest_test_client;

		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/sites/MLA");
				then.status(429).header("retry-after", "3").body(r#"{"id":"MLA"}"#);
			})
			.await;
		let config = crate::config::ClientConfig::builder()
			.api_base(Url::parse(&server.base_url()).expect("Mock server URL should parse."))
			.allow_insecure_http(true)
			.build()
			.expect("Test configuration should build.");
		let response = build_reqwest_test_client(config)
			.get("/sites/MLA")
			.send()
			.await
			.expect("Transport should accept the mock server certificate.");

		mock.assert_async().await;

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.retry_after(), Some(Duration::seconds(3)));
		assert_eq!(response.text(), r#"{"id":"MLA"}"#);
	}
}
