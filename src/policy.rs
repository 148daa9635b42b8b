//! Refresh-and-retry policy wrapped around every resource call.
//!
//! Each logical call walks `Initial → Sent → {Succeeded | ExpiryDetected → Refreshing →
//! Retried → {Succeeded | Failed}}`. The retry allowance lives in a [`RetryBudget`] created
//! per call, so concurrent calls never share a counter. A call sends at most twice: the
//! original request and one retry carrying the refreshed token.

mod metrics;

pub use metrics::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	client::{CallOptions, MeliClient},
	http::{ApiHttpClient, ApiResponse, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
	request::PendingRequest,
};

/// Strategy used to decide whether an unauthorized response means the access token expired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryDetection {
	/// Any `401 Unauthorized` qualifies.
	#[default]
	StatusOnly,
	/// A `401` qualifies only when its body is an [`ApiErrorBody`](crate::http::ApiErrorBody)
	/// whose message marks an invalid token. Bodies of any other shape never qualify.
	StatusAndErrorBody,
}
impl ExpiryDetection {
	/// Classifies `response`; never fails, unparseable bodies count as "not expired".
	pub fn is_expiry(self, response: &ApiResponse) -> bool {
		if response.status() != StatusCode::UNAUTHORIZED {
			return false;
		}

		match self {
			Self::StatusOnly => true,
			Self::StatusAndErrorBody =>
				response.error_body().is_some_and(|body| body.is_invalid_token()),
		}
	}
}

/// Retry allowance scoped to one logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBudget {
	used: u8,
}
impl RetryBudget {
	/// Maximum number of refresh-driven retries per logical call.
	pub const LIMIT: u8 = 1;

	/// Creates an untouched budget.
	pub const fn new() -> Self {
		Self { used: 0 }
	}

	/// Returns `true` while another retry is allowed.
	pub const fn has_remaining(&self) -> bool {
		self.used < Self::LIMIT
	}

	/// Spends one retry; returns `false` when the budget was already exhausted.
	pub fn consume(&mut self) -> bool {
		if !self.has_remaining() {
			return false;
		}

		self.used += 1;

		true
	}

	/// Returns the number of retries spent so far.
	pub const fn used(&self) -> u8 {
		self.used
	}
}
impl Default for RetryBudget {
	fn default() -> Self {
		Self::new()
	}
}

/// States a logical call moves through; emitted as tracing events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallState {
	/// Request described, nothing sent yet.
	Initial,
	/// Original request answered.
	Sent,
	/// Answer classified as an expired access token.
	ExpiryDetected,
	/// Waiting for the refresh exchange (or a coalesced one).
	Refreshing,
	/// Retry answered.
	Retried,
	/// Final answer is a success status.
	Succeeded,
	/// Final answer is a non-success status.
	Failed,
}
impl CallState {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Initial => "initial",
			Self::Sent => "sent",
			Self::ExpiryDetected => "expiry_detected",
			Self::Refreshing => "refreshing",
			Self::Retried => "retried",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
		}
	}

	fn enter(self, status: Option<StatusCode>) {
		obs::trace_transition(self.as_str(), status.map(|status| status.as_u16()));
	}
}
impl Display for CallState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// What the policy did about credentials during one logical call.
#[derive(Debug, Default)]
pub enum RefreshAttempt {
	/// The response never qualified as an expiry failure.
	#[default]
	NotAttempted,
	/// A refresh exchange produced the token used by the retry.
	Refreshed,
	/// Another call refreshed the credentials first; the retry reused that token.
	Reused,
	/// The refresh exchange failed; the response is the original unauthorized one.
	Failed(Box<Error>),
}
impl RefreshAttempt {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::NotAttempted => "not_attempted",
			Self::Refreshed => "refreshed",
			Self::Reused => "reused",
			Self::Failed(_) => "failed",
		}
	}

	/// Returns `true` when the call went through the refresh step.
	pub fn is_attempted(&self) -> bool {
		!matches!(self, Self::NotAttempted)
	}

	/// Returns the refresh failure, if any.
	pub fn failure(&self) -> Option<&Error> {
		match self {
			Self::Failed(e) => Some(e),
			_ => None,
		}
	}
}

impl<C, M> MeliClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Sends `request`, refreshing the credentials and retrying once on token expiry.
	///
	/// Any HTTP status is returned as `Ok`; only request construction and transport failures
	/// are errors. When the refresh exchange fails the original unauthorized response comes
	/// back with [`RefreshAttempt::Failed`] attached and the credentials stay untouched.
	///
	/// Dropping the returned future abandons the call. A call dropped while refreshing never
	/// sends its retry.
	pub async fn execute(
		&self,
		request: &PendingRequest,
		options: &CallOptions,
	) -> Result<ApiResponse> {
		const KIND: CallKind = CallKind::Resource;

		let span = CallSpan::new(KIND, "execute");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.run_policy(request, options)).await;

		match &result {
			Ok(response) if response.is_success() =>
				obs::record_call_outcome(KIND, CallOutcome::Success),
			_ => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn run_policy(
		&self,
		request: &PendingRequest,
		options: &CallOptions,
	) -> Result<ApiResponse> {
		let timeout = options.timeout.or(self.config.timeout);
		let mut budget = RetryBudget::new();
		// Override tokens belong to another identity; only credential tokens get refreshed.
		let (token, refreshable) = match &options.access_token {
			Some(token) => (Some(token.clone()), None),
			None => {
				let credentials = self.credentials().map(|credentials| &**credentials);

				(credentials.and_then(Credentials::access_token), credentials)
			},
		};

		CallState::Initial.enter(None);

		let response = self
			.dispatch(CallKind::Resource, request.build(&self.config, token.as_ref(), timeout)?)
			.await?;

		CallState::Sent.enter(Some(response.status()));

		let Some((credentials, refresh_token)) = refreshable
			.and_then(|credentials| Some((credentials, credentials.refresh_token()?)))
			.filter(|_| budget.has_remaining())
			.filter(|_| self.config.expiry_detection.is_expiry(&response))
		else {
			return Ok(finish(response));
		};

		budget.consume();
		CallState::ExpiryDetected.enter(Some(response.status()));
		CallState::Refreshing.enter(None);

		let (fresh, attempt) =
			match self.refresh_for_retry(credentials, token.as_ref(), refresh_token, timeout).await {
				Ok(refreshed) => refreshed,
				Err(e) => {
					let attempt = RefreshAttempt::Failed(Box::new(e));

					if let Some(e) = attempt.failure() {
						obs::trace_refresh_failure(e);
					}

					obs::record_refresh_outcome(&attempt);

					return Ok(finish(response.with_refresh(attempt)));
				},
			};

		obs::record_refresh_outcome(&attempt);

		let retry = match &token {
			Some(stale) => request.replace_embedded_token(stale.expose(), fresh.expose()),
			None => request.clone(),
		};
		let response = self
			.dispatch(CallKind::Resource, retry.build(&self.config, Some(&fresh), timeout)?)
			.await?;

		CallState::Retried.enter(Some(response.status()));

		Ok(finish(response.with_refresh(attempt)))
	}

	/// Produces the token for the retry, exchanging the refresh token unless a coalesced
	/// refresh already replaced `stale`.
	async fn refresh_for_retry(
		&self,
		credentials: &Credentials,
		stale: Option<&TokenSecret>,
		refresh_token: TokenSecret,
		timeout: Option<StdDuration>,
	) -> Result<(TokenSecret, RefreshAttempt)> {
		self.refresh_metrics.record_attempt();

		let guard = if self.config.coalesce_refresh {
			Some(credentials.refresh_guard().lock().await)
		} else {
			None
		};

		if guard.is_some() {
			if let Some(current) = credentials.access_token() {
				if stale != Some(&current) {
					self.refresh_metrics.record_reuse();

					return Ok((current, RefreshAttempt::Reused));
				}
			}
		}

		// A coalesced refresh may have rotated the refresh token while this call waited.
		let refresh_token = credentials.refresh_token().unwrap_or(refresh_token);

		match self.exchange_refresh_token_within(&refresh_token, timeout).await {
			Ok(tokens) => {
				credentials.set_tokens(&tokens);
				self.refresh_metrics.record_success();

				Ok((tokens.access_token, RefreshAttempt::Refreshed))
			},
			Err(e) => {
				self.refresh_metrics.record_failure();

				Err(e)
			},
		}
	}
}

fn finish(response: ApiResponse) -> ApiResponse {
	let state = if response.is_success() { CallState::Succeeded } else { CallState::Failed };

	state.enter(Some(response.status()));

	response
}
