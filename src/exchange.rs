//! Token endpoint exchanges for the `authorization_code` and `refresh_token` grants.
//!
//! Both exchanges are bare sends: no bearer header and no refresh policy, so a rejected
//! refresh can never recurse into another refresh.

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::{
	Method,
	header::{ACCEPT, CONTENT_TYPE, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenResponse, TokenSecret},
	client::MeliClient,
	error::{ConfigError, ExchangeError},
	http::{ApiHttpClient, ApiResponse, HttpRequest, SendTimeout, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::QueryParams,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// OAuth 2.0 grants the token endpoint accepts from this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// `authorization_code`
	AuthorizationCode,
	/// `refresh_token`
	RefreshToken,
}
impl GrantType {
	/// Returns the `grant_type` parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
		}
	}

	const fn call_kind(self) -> CallKind {
		match self {
			Self::AuthorizationCode => CallKind::AuthorizationCode,
			Self::RefreshToken => CallKind::Refresh,
		}
	}

	fn fail(self, error: ExchangeError) -> Error {
		match self {
			Self::AuthorizationCode => Error::AuthExchangeFailed(error),
			Self::RefreshToken => Error::RefreshFailed(error),
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

impl<C, M> MeliClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges an authorization code for tokens without touching the credentials.
	///
	/// The grant parameters travel in the query string of `POST /oauth/token`. Any
	/// non-success answer becomes [`Error::AuthExchangeFailed`].
	pub async fn exchange_authorization_code(
		&self,
		code: &str,
		redirect_uri: &str,
	) -> Result<TokenResponse> {
		const GRANT: GrantType = GrantType::AuthorizationCode;

		let credentials = self.require_credentials()?;
		let params = QueryParams::new()
			.add("grant_type", GRANT)
			.add("client_id", credentials.client_id())
			.add("client_secret", credentials.client_secret().expose())
			.add("code", code)
			.add("redirect_uri", redirect_uri);
		let mut url = self.config.token_endpoint().map_err(ConfigError::from)?;

		url.set_query(Some(&params.encode()));

		let request = self.token_request(url, None, self.config.timeout)?;

		self.exchange(GRANT, request).await
	}

	/// Exchanges a refresh token for a new token pair without touching the credentials.
	///
	/// The grant parameters travel as a form body. Any non-success answer becomes
	/// [`Error::RefreshFailed`].
	pub async fn exchange_refresh_token(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<TokenResponse> {
		self.exchange_refresh_token_within(refresh_token, self.config.timeout).await
	}

	/// Exchanges the attached refresh token and stores the result in the credentials.
	///
	/// Fails with [`ConfigError::MissingCredentials`] when nothing can be refreshed.
	pub async fn refresh_credentials(&self) -> Result<TokenResponse> {
		let credentials = self.require_credentials()?;
		let refresh_token =
			credentials.refresh_token().ok_or(Error::Config(ConfigError::MissingCredentials))?;
		let tokens = self.exchange_refresh_token(&refresh_token).await?;

		credentials.set_tokens(&tokens);

		Ok(tokens)
	}

	/// Completes the authorization-code login and stores the issued tokens.
	///
	/// Returns `Ok(false)`, leaving the credentials untouched, when the token endpoint refuses
	/// the code or answers with something other than a token. Transport and configuration
	/// failures are still errors.
	pub async fn authorize(&self, code: &str, redirect_uri: &str) -> Result<bool> {
		let credentials = self.require_credentials()?;

		match self.exchange_authorization_code(code, redirect_uri).await {
			Ok(tokens) => {
				credentials.set_tokens(&tokens);

				Ok(true)
			},
			Err(Error::AuthExchangeFailed(ExchangeError::Transport(e))) => Err(e.into()),
			Err(Error::AuthExchangeFailed(_)) => Ok(false),
			Err(e) => Err(e),
		}
	}

	pub(crate) async fn exchange_refresh_token_within(
		&self,
		refresh_token: &TokenSecret,
		timeout: Option<StdDuration>,
	) -> Result<TokenResponse> {
		const GRANT: GrantType = GrantType::RefreshToken;

		let credentials = self.require_credentials()?;
		let form = QueryParams::new()
			.add("grant_type", GRANT)
			.add("client_id", credentials.client_id())
			.add("client_secret", credentials.client_secret().expose())
			.add("refresh_token", refresh_token.expose());
		let url = self.config.token_endpoint().map_err(ConfigError::from)?;
		let request = self.token_request(url, Some(form), timeout)?;

		self.exchange(GRANT, request).await
	}

	fn token_request(
		&self,
		url: Url,
		form: Option<QueryParams>,
		timeout: Option<StdDuration>,
	) -> Result<HttpRequest> {
		let mut builder = ::http::Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(ACCEPT, "application/json")
			.header(USER_AGENT, self.config.user_agent.as_str());
		let body = match form {
			Some(form) => {
				builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);

				form.encode().into_bytes()
			},
			None => Vec::new(),
		};

		if let Some(timeout) = timeout {
			builder = builder.extension(SendTimeout(timeout));
		}

		builder.body(body).map_err(|e| ConfigError::from(e).into())
	}

	async fn exchange(&self, grant: GrantType, request: HttpRequest) -> Result<TokenResponse> {
		let kind = grant.call_kind();
		let span = CallSpan::new(kind, grant.as_str());

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.dispatch(kind, request).await.map_err(|e| match e {
					Error::Transport(e) => grant.fail(ExchangeError::Transport(e)),
					other => other,
				})?;

				parse_token_response(grant, &response).map_err(|e| grant.fail(e))
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		result
	}
}

fn parse_token_response(
	grant: GrantType,
	response: &ApiResponse,
) -> Result<TokenResponse, ExchangeError> {
	if !response.is_success() {
		return Err(ExchangeError::Rejected {
			grant: grant.as_str(),
			status: response.status().as_u16(),
			error: response.error_body(),
		});
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());
	let tokens: TokenResponse = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ExchangeError::Malformed { grant: grant.as_str(), source })?;

	if tokens.access_token.is_empty() {
		return Err(ExchangeError::MissingAccessToken { grant: grant.as_str() });
	}

	Ok(tokens)
}
