// self
use crate::{
	obs::{CallKind, CallOutcome},
	policy::RefreshAttempt,
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"meli_sdk_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how the refresh policy resolved an expired access token (when enabled).
///
/// Increments `meli_sdk_refresh_total`, labeled by `result` (`refreshed`, `reused`, or
/// `failed`) and `retried` (whether the call went on to resend the request).
pub fn record_refresh_outcome(attempt: &RefreshAttempt) {
	if !attempt.is_attempted() {
		return;
	}

	#[cfg(feature = "metrics")]
	{
		let retried = if attempt.failure().is_some() { "false" } else { "true" };

		metrics::counter!(
			"meli_sdk_refresh_total",
			"result" => attempt.as_str(),
			"retried" => retried
		)
		.increment(1);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_call_outcome_noop_without_metrics() {
		record_call_outcome(CallKind::Refresh, CallOutcome::Failure);
	}

	#[test]
	fn record_refresh_outcome_accepts_every_attempt() {
		record_refresh_outcome(&RefreshAttempt::NotAttempted);
		record_refresh_outcome(&RefreshAttempt::Refreshed);
		record_refresh_outcome(&RefreshAttempt::Reused);
		record_refresh_outcome(&RefreshAttempt::Failed(Box::new(
			crate::error::ConfigError::MissingCredentials.into(),
		)));
	}
}
