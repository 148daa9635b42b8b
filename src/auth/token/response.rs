//! Token endpoint payloads.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Payload returned by the token endpoint for both authorization-code and refresh exchanges.
///
/// Only `access_token` is mandatory; the endpoint may omit the refresh token when it keeps
/// the previous one valid.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the endpoint issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the endpoint (usually `bearer`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Lifetime of the access token in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<i64>,
	/// Space-separated scopes granted (`read`, `write`, `offline_access`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Marketplace user the tokens act for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<u64>,
}
impl TokenResponse {
	/// Creates a response carrying only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			token_type: None,
			expires_in: None,
			scope: None,
			user_id: None,
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Attaches a lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: i64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Returns the refresh token only when it is present and non-empty.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Computes the expiry instant relative to `issued_at`, ignoring non-positive lifetimes.
	pub fn expires_at(&self, issued_at: OffsetDateTime) -> Option<OffsetDateTime> {
		self.expires_in
			.filter(|secs| *secs > 0)
			.and_then(|secs| issued_at.checked_add(Duration::seconds(secs)))
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.field("user_id", &self.user_id)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn minimal_payload_deserializes() {
		let response: TokenResponse =
			serde_json::from_str(r#"{"access_token":"AT-new","refresh_token":"TG-new"}"#)
				.expect("Minimal token payload should deserialize.");

		assert_eq!(response.access_token.expose(), "AT-new");
		assert_eq!(response.usable_refresh_token().map(TokenSecret::expose), Some("TG-new"));
		assert!(response.expires_in.is_none());
	}

	#[test]
	fn full_payload_deserializes() {
		let response: TokenResponse = serde_json::from_str(
			r#"{"access_token":"APP_USR-1","token_type":"bearer","expires_in":21600,"scope":"offline_access read write","user_id":8675309,"refresh_token":"TG-1"}"#,
		)
		.expect("Full token payload should deserialize.");
		let issued = OffsetDateTime::UNIX_EPOCH;

		assert_eq!(response.user_id, Some(8675309));
		assert_eq!(response.scope.as_deref(), Some("offline_access read write"));
		assert_eq!(response.expires_at(issued), Some(issued + Duration::hours(6)));
	}

	#[test]
	fn empty_refresh_token_is_unusable() {
		let response = TokenResponse::new("AT").with_refresh_token("");

		assert!(response.usable_refresh_token().is_none());
		assert!(response.with_expires_in(0).expires_at(OffsetDateTime::UNIX_EPOCH).is_none());
	}

	#[test]
	fn debug_redacts_secrets() {
		let rendered = format!("{:?}", TokenResponse::new("AT-secret").with_refresh_token("TG"));

		assert!(!rendered.contains("AT-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
