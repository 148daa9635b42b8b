//! Immutable request descriptions and the per-attempt transport request builder.
//!
//! A [`PendingRequest`] captures one logical call (method, resource, ordered parameters,
//! optional JSON body). The refresh policy calls [`PendingRequest::build`] once per attempt,
//! so headers and the serialized body are never shared between the original send and the
//! retry.

mod query;

pub use query::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::{
	Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	error::ConfigError,
	http::{HttpRequest, SendTimeout},
};

/// Query parameter carrying the access token in [`TokenPlacement::Query`] mode.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Where the access token travels on resource calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPlacement {
	/// `Authorization: Bearer <token>` header.
	#[default]
	Header,
	/// Legacy mode: `access_token=<token>` appended to the query string.
	Query,
}

/// Description of one logical call, rebuilt into a fresh transport request per attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRequest {
	method: Method,
	resource: String,
	params: QueryParams,
	body: Option<serde_json::Value>,
}
impl PendingRequest {
	/// Creates a request for `resource`, a path relative to the API base.
	///
	/// The resource may already carry a query string (`/users/me?attributes=id`); parameters
	/// added later are appended after it.
	pub fn new(method: Method, resource: impl Into<String>) -> Self {
		Self { method, resource: resource.into(), params: QueryParams::new(), body: None }
	}

	/// Appends a single query parameter.
	pub fn param(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.params.push(key, value);

		self
	}

	/// Appends every parameter from `params`, keeping their order.
	pub fn params(mut self, params: QueryParams) -> Self {
		self.params.extend(params);

		self
	}

	/// Attaches a JSON body.
	pub fn json_body<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_value(body).map_err(ConfigError::BodySerialize)?);

		Ok(self)
	}

	/// Returns the HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the resource as supplied by the caller.
	pub fn resource(&self) -> &str {
		&self.resource
	}

	/// Returns the appended query parameters.
	pub fn query_params(&self) -> &QueryParams {
		&self.params
	}

	/// Returns the JSON body, if any.
	pub fn body(&self) -> Option<&serde_json::Value> {
		self.body.as_ref()
	}

	/// Produces a fresh transport request for one attempt.
	///
	/// The body is serialized on every call. `access_token` is attached according to the
	/// configured [`TokenPlacement`]; `timeout` becomes a [`SendTimeout`] extension.
	pub fn build(
		&self,
		config: &ClientConfig,
		access_token: Option<&TokenSecret>,
		timeout: Option<StdDuration>,
	) -> Result<HttpRequest> {
		let url = self.resolve_url(config, access_token)?;
		let mut builder = ::http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.header(ACCEPT, JSON_CONTENT_TYPE)
			.header(USER_AGENT, config.user_agent.as_str());

		if let (TokenPlacement::Header, Some(token)) = (config.token_placement, access_token) {
			builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
		}

		let body = match &self.body {
			Some(value) => {
				builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);

				serde_json::to_vec(value).map_err(ConfigError::BodySerialize)?
			},
			None => Vec::new(),
		};
		let mut request = builder.body(body).map_err(ConfigError::from)?;

		if let Some(timeout) = timeout {
			request.extensions_mut().insert(SendTimeout(timeout));
		}

		Ok(request)
	}

	/// Rewrites every caller-embedded copy of the token `old` to `new`.
	///
	/// Two places are rewritten: `access_token` parameters whose decoded value equals `old`,
	/// and resource path segments equal to `old`. Every other parameter, its encoding, and the
	/// parameter order stay untouched.
	pub fn replace_embedded_token(&self, old: &str, new: &str) -> Self {
		let (path, query) = match self.resource.split_once('?') {
			Some((path, query)) => (path, Some(query)),
			None => (self.resource.as_str(), None),
		};
		let path = if old.is_empty() {
			path.to_owned()
		} else {
			path.split('/')
				.map(|segment| if segment == old { new } else { segment })
				.collect::<Vec<_>>()
				.join("/")
		};
		let resource = match query {
			Some(query) =>
				format!("{path}?{}", rewrite_raw_query(query, ACCESS_TOKEN_PARAM, old, new)),
			None => path,
		};

		Self {
			method: self.method.clone(),
			resource,
			params: self.params.replace_value(ACCESS_TOKEN_PARAM, old, new),
			body: self.body.clone(),
		}
	}

	fn resolve_url(
		&self,
		config: &ClientConfig,
		access_token: Option<&TokenSecret>,
	) -> Result<Url> {
		let (path, embedded_query) = match self.resource.split_once('?') {
			Some((path, query)) => (path, Some(query)),
			None => (self.resource.as_str(), None),
		};
		let mut url = config.resolve(path).map_err(|source| ConfigError::InvalidUrl {
			resource: self.resource.clone(),
			source,
		})?;

		if url.origin() != config.api_base.origin() {
			return Err(ConfigError::ForeignResource { resource: self.resource.clone() }.into());
		}

		let mut appended = self.params.clone();

		if let (TokenPlacement::Query, Some(token)) = (config.token_placement, access_token) {
			appended.push(ACCESS_TOKEN_PARAM, token.expose());
		}

		let query = [embedded_query.unwrap_or_default().to_owned(), appended.encode()]
			.into_iter()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join("&");

		url.set_query(if query.is_empty() { None } else { Some(&query) });

		Ok(url)
	}
}
