//! Client facade and the verb-shaped call surface.
//!
//! [`MeliClient`] owns the transport, the validated [`ClientConfig`], and an optional shared
//! [`Credentials`] cell. Calls start from [`MeliClient::get`], [`MeliClient::post`],
//! [`MeliClient::put`], or [`MeliClient::delete`], which return an [`ApiCall`] builder; the
//! builder hands a [`PendingRequest`] to the refresh policy ([`MeliClient::execute`]).

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::Method;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	config::ClientConfig,
	error::ConfigError,
	http::{ApiHttpClient, ApiResponse, HttpRequest, TransportErrorMapper},
	obs::CallKind,
	policy::RefreshMetrics,
	request::{PendingRequest, QueryParams},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestMeliClient = MeliClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Per-call knobs that travel with a [`PendingRequest`] into the refresh policy.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
	/// Access token overriding the one stored in the attached credentials.
	///
	/// Calls made with an override never trigger a refresh, because the attached refresh
	/// token belongs to a different identity.
	pub access_token: Option<TokenSecret>,
	/// Per-send deadline overriding [`ClientConfig::timeout`].
	pub timeout: Option<StdDuration>,
}

/// Mercado Libre API client.
///
/// The client is cheap to clone; clones share the transport, credentials, and metrics.
#[derive(Clone)]
pub struct MeliClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Validated configuration.
	pub config: ClientConfig,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	credentials: Option<Arc<Credentials>>,
}
impl<C, M> MeliClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config,
			refresh_metrics: Default::default(),
			credentials: None,
		}
	}

	/// Attaches shared credentials; every holder of the [`Arc`] observes refreshed tokens.
	pub fn with_credentials(mut self, credentials: Arc<Credentials>) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Returns the attached credentials, if any.
	pub fn credentials(&self) -> Option<&Arc<Credentials>> {
		self.credentials.as_ref()
	}

	/// Builds the user-facing authorization URL for the attached application.
	pub fn authorization_url(&self, redirect_uri: &str) -> Result<String> {
		Ok(self.require_credentials()?.authorization_url(redirect_uri))
	}

	/// Starts a `GET` call.
	pub fn get(&self, resource: impl Into<String>) -> ApiCall<'_, C, M> {
		self.call(Method::GET, resource)
	}

	/// Starts a `POST` call.
	pub fn post(&self, resource: impl Into<String>) -> ApiCall<'_, C, M> {
		self.call(Method::POST, resource)
	}

	/// Starts a `PUT` call.
	pub fn put(&self, resource: impl Into<String>) -> ApiCall<'_, C, M> {
		self.call(Method::PUT, resource)
	}

	/// Starts a `DELETE` call.
	pub fn delete(&self, resource: impl Into<String>) -> ApiCall<'_, C, M> {
		self.call(Method::DELETE, resource)
	}

	/// Starts a call with an arbitrary method.
	pub fn call(&self, method: Method, resource: impl Into<String>) -> ApiCall<'_, C, M> {
		ApiCall {
			client: self,
			request: PendingRequest::new(method, resource),
			options: CallOptions::default(),
			body_error: None,
		}
	}

	pub(crate) fn require_credentials(&self) -> Result<&Arc<Credentials>> {
		self.credentials.as_ref().ok_or_else(|| ConfigError::MissingCredentials.into())
	}

	/// Sends one request without any retry behavior.
	pub(crate) async fn dispatch(
		&self,
		kind: CallKind,
		request: HttpRequest,
	) -> Result<ApiResponse> {
		self.http_client
			.execute(request)
			.await
			.map(ApiResponse::from_http)
			.map_err(|e| self.transport_mapper.map_transport_error(kind, e))
	}
}
#[cfg(feature = "reqwest")]
impl MeliClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by a fresh reqwest transport.
	pub fn new(config: ClientConfig) -> Self {
		Self::with_http_client(
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for MeliClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MeliClient")
			.field("config", &self.config)
			.field("credentials", &self.credentials)
			.finish()
	}
}

/// Builder for one logical call; finish it with [`ApiCall::send`] or [`ApiCall::send_json`].
#[must_use = "calls do nothing until `send` or `send_json` is awaited"]
pub struct ApiCall<'a, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: &'a MeliClient<C, M>,
	request: PendingRequest,
	options: CallOptions,
	body_error: Option<Error>,
}
impl<C, M> ApiCall<'_, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Appends a query parameter; duplicates and order are preserved.
	pub fn param(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.request = self.request.param(key, value);

		self
	}

	/// Appends a list of query parameters.
	pub fn params(mut self, params: QueryParams) -> Self {
		self.request = self.request.params(params);

		self
	}

	/// Attaches a JSON body; serialization failures surface from `send`.
	pub fn body<B>(mut self, body: &B) -> Self
	where
		B: ?Sized + Serialize,
	{
		match self.request.clone().json_body(body) {
			Ok(request) => self.request = request,
			Err(e) => self.body_error = Some(e),
		}

		self
	}

	/// Uses `token` instead of the credentials' access token for this call.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.options.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the per-send deadline for this call.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.options.timeout = Some(timeout);

		self
	}

	/// Returns the request this call will send.
	pub fn pending(&self) -> &PendingRequest {
		&self.request
	}

	/// Runs the call and returns the raw response, whatever its status.
	pub async fn send(self) -> Result<ApiResponse> {
		if let Some(e) = self.body_error {
			return Err(e);
		}

		self.client.execute(&self.request, &self.options).await
	}

	/// Runs the call and decodes a successful body into `T`.
	///
	/// Non-success statuses become [`Error::Authorization`] or [`Error::Status`]; a body
	/// that does not match `T` becomes [`Error::Decode`].
	pub async fn send_json<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send().await?.error_for_status()?.json()
	}
}
impl<C, M> Debug for ApiCall<'_, C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiCall")
			.field("request", &self.request)
			.field("options", &self.options)
			.finish()
	}
}
