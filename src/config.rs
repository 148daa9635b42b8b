//! Validated client configuration and its builder.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, policy::ExpiryDetection, request::TokenPlacement};

/// Production API base used when no override is configured.
pub const DEFAULT_API_BASE: &str = "https://api.mercadolibre.com";
/// Token endpoint path relative to the API base.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Endpoints must use HTTPS unless insecure HTTP was explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint cannot serve as a base for resource paths.
	#[error("The {endpoint} endpoint is not a usable base URL: {url}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Token path must be absolute.
	#[error("Token path `{path}` must start with `/`.")]
	InvalidTokenPath {
		/// Rejected path.
		path: String,
	},
	/// User agent must be a valid, non-empty header value.
	#[error("User agent `{value}` is not a valid header value.")]
	InvalidUserAgent {
		/// Rejected value.
		value: String,
	},
}

/// Immutable configuration consumed by [`MeliClient`](crate::client::MeliClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URL every resource path and the token endpoint are resolved against.
	pub api_base: Url,
	/// Token endpoint path.
	pub token_path: String,
	/// `User-Agent` header value sent with every request.
	pub user_agent: String,
	/// How unauthorized responses are classified as token expiry.
	pub expiry_detection: ExpiryDetection,
	/// Where the access token travels on resource calls.
	pub token_placement: TokenPlacement,
	/// Serializes concurrent refreshes that share one credential.
	pub coalesce_refresh: bool,
	/// Default per-send deadline.
	pub timeout: Option<StdDuration>,
}
impl ClientConfig {
	/// Creates a new builder seeded with production defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::new()
	}

	/// Returns the production configuration.
	pub fn production() -> Result<Self, ClientConfigError> {
		Self::builder().build()
	}

	/// Resolves the token endpoint URL.
	///
	/// The token path sits under the API base, so a base carrying a path prefix
	/// (`https://gateway.example.com/meli/`) keeps it for token exchanges too.
	pub fn token_endpoint(&self) -> Result<Url, ClientConfigError> {
		self.resolve(&self.token_path)
			.map_err(|_| ClientConfigError::InvalidTokenPath { path: self.token_path.clone() })
	}

	/// Joins `path` onto the API base, keeping any path prefix the base carries.
	pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
		let mut base = self.api_base.clone();

		if !base.path().ends_with('/') {
			let with_slash = format!("{}/", base.path());

			base.set_path(&with_slash);
		}

		base.join(path.trim_start_matches('/'))
	}

	fn validate(&self, allow_insecure_http: bool) -> Result<(), ClientConfigError> {
		validate_endpoint("api", &self.api_base, allow_insecure_http)?;

		if !self.token_path.starts_with('/') {
			return Err(ClientConfigError::InvalidTokenPath { path: self.token_path.clone() });
		}

		self.token_endpoint()?;

		if self.user_agent.trim().is_empty()
			|| ::http::HeaderValue::from_str(&self.user_agent).is_err()
		{
			return Err(ClientConfigError::InvalidUserAgent { value: self.user_agent.clone() });
		}

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Optional API base override.
	pub api_base: Option<Url>,
	/// Token endpoint path.
	pub token_path: String,
	/// `User-Agent` header value.
	pub user_agent: String,
	/// Expiry classification strategy.
	pub expiry_detection: ExpiryDetection,
	/// Token placement for resource calls.
	pub token_placement: TokenPlacement,
	/// Refresh coalescing toggle.
	pub coalesce_refresh: bool,
	/// Default per-send deadline.
	pub timeout: Option<StdDuration>,
	/// Accepts `http` endpoints (loopback servers, tests).
	pub allow_insecure_http: bool,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with production defaults.
	pub fn new() -> Self {
		Self {
			api_base: None,
			token_path: DEFAULT_TOKEN_PATH.into(),
			user_agent: concat!("MELI-RUST-SDK/", env!("CARGO_PKG_VERSION")).into(),
			expiry_detection: ExpiryDetection::default(),
			token_placement: TokenPlacement::default(),
			coalesce_refresh: true,
			timeout: None,
			allow_insecure_http: false,
		}
	}

	/// Overrides the API base.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the token endpoint path.
	pub fn token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Overrides the `User-Agent` header value.
	pub fn user_agent(mut self, value: impl Into<String>) -> Self {
		self.user_agent = value.into();

		self
	}

	/// Selects the expiry classification strategy.
	pub fn expiry_detection(mut self, detection: ExpiryDetection) -> Self {
		self.expiry_detection = detection;

		self
	}

	/// Selects where access tokens travel on resource calls.
	pub fn token_placement(mut self, placement: TokenPlacement) -> Self {
		self.token_placement = placement;

		self
	}

	/// Enables or disables refresh coalescing (enabled by default).
	pub fn coalesce_refresh(mut self, enabled: bool) -> Self {
		self.coalesce_refresh = enabled;

		self
	}

	/// Sets the default per-send deadline.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Accepts plain `http` endpoints.
	pub fn allow_insecure_http(mut self, allow: bool) -> Self {
		self.allow_insecure_http = allow;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let api_base = match self.api_base {
			Some(url) => url,
			None => Url::parse(DEFAULT_API_BASE).map_err(|_| ClientConfigError::InvalidEndpoint {
				endpoint: "api",
				url: DEFAULT_API_BASE.into(),
			})?,
		};
		let config = ClientConfig {
			api_base,
			token_path: self.token_path,
			user_agent: self.user_agent,
			expiry_detection: self.expiry_detection,
			token_placement: self.token_placement,
			coalesce_refresh: self.coalesce_refresh,
			timeout: self.timeout,
		};

		config.validate(self.allow_insecure_http)?;

		Ok(config)
	}
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn validate_endpoint(
	name: &'static str,
	url: &Url,
	allow_insecure_http: bool,
) -> Result<(), ClientConfigError> {
	if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
		return Err(ClientConfigError::InvalidEndpoint { endpoint: name, url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if allow_insecure_http => Ok(()),
		"http" =>
			Err(ClientConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
		_ => Err(ClientConfigError::InvalidEndpoint { endpoint: name, url: url.to_string() }),
	}
}
