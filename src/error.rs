//! Client-level error types shared across the call surface, token exchanges, and transports.

// self
use crate::{_prelude::*, config::ClientConfigError, http::ApiErrorBody, obs::CallKind};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or caller bug.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout); never retried by the client.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body does not match the requested shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// API rejected the credentials (HTTP 401/403) after the refresh policy ran.
	#[error("API rejected the credentials with HTTP {status}.")]
	Authorization {
		/// HTTP status code returned by the API.
		status: u16,
		/// Structured error payload, when the body carried one.
		error: Option<ApiErrorBody>,
		/// Refresh failure observed while trying to recover, if any.
		#[source]
		refresh: Option<Box<Error>>,
	},
	/// API returned a non-success status unrelated to credentials.
	#[error("API returned HTTP {status}.")]
	Status {
		/// HTTP status code returned by the API.
		status: u16,
		/// Structured error payload, when the body carried one.
		error: Option<ApiErrorBody>,
	},
	/// Token endpoint rejected the `refresh_token` grant.
	#[error("Token refresh failed.")]
	RefreshFailed(#[source] ExchangeError),
	/// Token endpoint rejected the `authorization_code` grant.
	#[error("Authorization code exchange failed.")]
	AuthExchangeFailed(#[source] ExchangeError),
}
impl Error {
	/// Returns the HTTP status carried by the error, when one is known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Authorization { status, .. } | Self::Status { status, .. } => Some(*status),
			Self::Decode(e) => e.status,
			Self::RefreshFailed(e) | Self::AuthExchangeFailed(e) => e.status(),
			_ => None,
		}
	}
}

impl From<ClientConfigError> for Error {
	fn from(e: ClientConfigError) -> Self {
		Self::Config(e.into())
	}
}

/// Configuration and caller-side failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client configuration failed validation.
	#[error(transparent)]
	Client(#[from] ClientConfigError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// Resource path could not be joined onto the API base.
	#[error("Resource `{resource}` does not form a valid URL.")]
	InvalidUrl {
		/// Resource path supplied by the caller.
		resource: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Resource resolves outside the configured API origin.
	#[error("Resource `{resource}` resolves outside the API origin.")]
	ForeignResource {
		/// Resource path supplied by the caller.
		resource: String,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized to JSON.")]
	BodySerialize(#[source] serde_json::Error),

	/// An authenticated operation ran without credentials attached to the client.
	#[error("Credentials are not attached to the client.")]
	MissingCredentials,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures: the peer was unreachable or the deadline elapsed.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred during the {call} call.")]
	Network {
		/// Call kind that was in flight.
		call: CallKind,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The per-send deadline elapsed before a response arrived.
	#[error("The {call} call timed out.")]
	Timeout {
		/// Call kind that was in flight.
		call: CallKind,
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(call: CallKind, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { call, source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(call: CallKind, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { call, source: Box::new(src) }
	}
}

/// Failures produced by the token endpoint.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the {grant} grant with HTTP {status}.")]
	Rejected {
		/// Grant label.
		grant: &'static str,
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Structured error payload, when the body carried one.
		error: Option<ApiErrorBody>,
	},
	/// Token endpoint answered with a body that is not a token response.
	#[error("Token endpoint returned a malformed {grant} response.")]
	Malformed {
		/// Grant label.
		grant: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint answered successfully but issued no access token.
	#[error("Token endpoint issued no access token for the {grant} grant.")]
	MissingAccessToken {
		/// Grant label.
		grant: &'static str,
	},
	/// Token endpoint could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl ExchangeError {
	/// Returns the HTTP status reported by the token endpoint, if it answered with one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Response body did not deserialize into the requested shape.
#[derive(Debug, ThisError)]
#[error("Response body does not match the expected shape at `{path}`.", path = .source.path())]
pub struct DecodeError {
	/// HTTP status of the decoded response, when known.
	pub status: Option<u16>,
	/// Structured parsing failure including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}
