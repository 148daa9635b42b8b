//! Shared credential cell with atomic token replacement and change notifications.
//!
//! A [`Credentials`] value is created by the caller, wrapped in an [`Arc`], and handed to the
//! client. Every holder observes refreshed tokens immediately because the client never copies
//! the cell. Token pairs are replaced as a whole (`Arc<TokenPair>` swap under a write lock), so
//! concurrent readers never see an access token from one exchange next to a refresh token from
//! another.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{MeliSite, TokenResponse, TokenSecret, authorization_url},
};

type TokenListener = Arc<dyn Fn(&TokensChanged) + Send + Sync>;

/// Access/refresh token pair stored inside [`Credentials`].
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
	/// Access token attached to API calls.
	pub access_token: TokenSecret,
	/// Refresh token used to mint new access tokens; absent for flows that never issue one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant derived from the last exchange, when the endpoint reported one.
	pub expires_at: Option<OffsetDateTime>,
	/// Marketplace user the tokens act for, when known.
	pub user_id: Option<u64>,
}
impl TokenPair {
	/// Creates a pair from raw token strings; an empty refresh token counts as absent.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.filter(|value| !value.is_empty()).map(TokenSecret::new),
			expires_at: None,
			user_id: None,
		}
	}

	/// Returns the refresh token only when it is present and non-empty.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("user_id", &self.user_id)
			.finish()
	}
}

/// Notification emitted after [`Credentials::set_tokens`] replaced the stored pair.
///
/// Embedding applications use it to persist rotated tokens (e.g. into a secret store).
#[derive(Clone, Debug)]
pub struct TokensChanged {
	/// Access token that was stored before the replacement.
	pub previous_access_token: Option<TokenSecret>,
	/// Newly stored access token.
	pub access_token: TokenSecret,
	/// Refresh token stored after the replacement (rotated or retained).
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant of the new access token, when known.
	pub expires_at: Option<OffsetDateTime>,
	/// Marketplace user the tokens act for, when known.
	pub user_id: Option<u64>,
}

/// Handle returned by [`Credentials::on_tokens_changed`] for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Application identity plus the mutable token pair used by the client.
pub struct Credentials {
	client_id: u64,
	client_secret: TokenSecret,
	site: MeliSite,
	tokens: RwLock<Option<Arc<TokenPair>>>,
	listeners: Mutex<Vec<(ListenerId, TokenListener)>>,
	next_listener: AtomicU64,
	refresh_guard: AsyncMutex<()>,
}
impl Credentials {
	/// Creates unauthenticated credentials for the provided application.
	pub fn new(site: MeliSite, client_id: u64, client_secret: impl Into<String>) -> Self {
		Self {
			client_id,
			client_secret: TokenSecret::new(client_secret),
			site,
			tokens: RwLock::new(None),
			listeners: Mutex::new(Vec::new()),
			next_listener: AtomicU64::new(0),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Seeds an access/refresh token pair obtained earlier (e.g. loaded from storage).
	///
	/// An empty refresh token is stored as absent. No notification fires.
	pub fn with_tokens(
		self,
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		*self.tokens.write() =
			Some(Arc::new(TokenPair::new(access_token, Some(refresh_token.into()))));

		self
	}

	/// Seeds an access token without a refresh token.
	pub fn with_access_token(self, access_token: impl Into<String>) -> Self {
		*self.tokens.write() = Some(Arc::new(TokenPair::new(access_token, None)));

		self
	}

	/// Returns the application (client) identifier.
	pub fn client_id(&self) -> u64 {
		self.client_id
	}

	/// Returns the application secret.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}

	/// Returns the marketplace site used for authorization URLs.
	pub fn site(&self) -> MeliSite {
		self.site
	}

	/// Returns a consistent snapshot of the stored token pair.
	pub fn tokens(&self) -> Option<Arc<TokenPair>> {
		self.tokens.read().clone()
	}

	/// Returns the current access token, if a non-empty one is stored.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.tokens
			.read()
			.as_ref()
			.map(|pair| pair.access_token.clone())
			.filter(|secret| !secret.is_empty())
	}

	/// Returns the current refresh token, if a non-empty one is stored.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.tokens.read().as_ref().and_then(|pair| pair.usable_refresh_token().cloned())
	}

	/// Returns the `Authorization` header value, or `None` when no access token is stored.
	pub fn authorization_header_value(&self) -> Option<String> {
		self.access_token().map(|token| format!("Bearer {}", token.expose()))
	}

	/// Builds the authorization URL for this application's site.
	pub fn authorization_url(&self, redirect_uri: &str) -> String {
		authorization_url(self.client_id, self.site, redirect_uri)
	}

	/// Atomically replaces the stored tokens with the exchange result.
	///
	/// When the response omits the refresh token the previous one is retained. Listeners run
	/// after the write completes, once per call that actually changed the pair. Returns `true`
	/// when the pair changed.
	pub fn set_tokens(&self, response: &TokenResponse) -> bool {
		let issued_at = OffsetDateTime::now_utc();
		let (previous, next) = {
			let mut slot = self.tokens.write();
			let previous = slot.clone();
			let refresh_token = response
				.usable_refresh_token()
				.cloned()
				.or_else(|| {
					previous.as_ref().and_then(|pair| pair.usable_refresh_token().cloned())
				});
			let next = Arc::new(TokenPair {
				access_token: response.access_token.clone(),
				refresh_token,
				expires_at: response.expires_at(issued_at),
				user_id: response
					.user_id
					.or_else(|| previous.as_ref().and_then(|pair| pair.user_id)),
			});

			*slot = Some(next.clone());

			(previous, next)
		};
		let changed = previous.as_deref().is_none_or(|pair| {
			pair.access_token != next.access_token || pair.refresh_token != next.refresh_token
		});

		if changed {
			let event = TokensChanged {
				previous_access_token: previous.map(|pair| pair.access_token.clone()),
				access_token: next.access_token.clone(),
				refresh_token: next.refresh_token.clone(),
				expires_at: next.expires_at,
				user_id: next.user_id,
			};

			self.notify(&event);
		}

		changed
	}

	/// Registers a listener invoked every time the token pair changes.
	pub fn on_tokens_changed<F>(&self, listener: F) -> ListenerId
	where
		F: 'static + Fn(&TokensChanged) + Send + Sync,
	{
		let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));

		self.listeners.lock().push((id, Arc::new(listener)));

		id
	}

	/// Removes a listener; returns `false` if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.lock();
		let before = listeners.len();

		listeners.retain(|(existing, _)| *existing != id);

		listeners.len() != before
	}

	pub(crate) fn refresh_guard(&self) -> &AsyncMutex<()> {
		&self.refresh_guard
	}

	fn notify(&self, event: &TokensChanged) {
		// Listeners may call back into the cell, so the list is cloned before dispatch.
		let listeners =
			self.listeners.lock().iter().map(|(_, listener)| listener.clone()).collect::<Vec<_>>();

		for listener in listeners {
			listener(event);
		}
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("site", &self.site)
			.field("tokens", &self.tokens())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;

	fn credentials() -> Credentials {
		Credentials::new(MeliSite::Argentina, 123456, "secret")
	}

	#[test]
	fn header_value_requires_access_token() {
		let creds = credentials();

		assert_eq!(creds.authorization_header_value(), None);

		let creds = creds.with_access_token("APP_USR-1");

		assert_eq!(creds.authorization_header_value().as_deref(), Some("Bearer APP_USR-1"));
		assert!(creds.refresh_token().is_none());
	}

	#[test]
	fn set_tokens_retains_refresh_token_when_omitted() {
		let creds = credentials().with_tokens("AT-old", "TG-old");

		assert!(creds.set_tokens(&TokenResponse::new("AT-new")));
		assert_eq!(creds.access_token().map(|t| t.expose().to_owned()).as_deref(), Some("AT-new"));
		assert_eq!(creds.refresh_token().map(|t| t.expose().to_owned()).as_deref(), Some("TG-old"));

		assert!(creds.set_tokens(&TokenResponse::new("AT-newer").with_refresh_token("TG-new")));
		assert_eq!(creds.refresh_token().map(|t| t.expose().to_owned()).as_deref(), Some("TG-new"));
	}

	#[test]
	fn listeners_receive_previous_and_new_tokens() {
		let creds = credentials().with_tokens("AT-old", "TG-old");
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();

		creds.on_tokens_changed(move |event| sink.lock().push(event.clone()));
		creds.set_tokens(&TokenResponse::new("AT-new").with_refresh_token("TG-new"));

		let events = events.lock();

		assert_eq!(events.len(), 1);
		assert_eq!(
			events[0].previous_access_token.as_ref().map(TokenSecret::expose),
			Some("AT-old")
		);
		assert_eq!(events[0].access_token.expose(), "AT-new");
		assert_eq!(events[0].refresh_token.as_ref().map(TokenSecret::expose), Some("TG-new"));
	}

	#[test]
	fn unchanged_pair_does_not_notify() {
		let creds = credentials().with_tokens("AT", "TG");
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();

		creds.on_tokens_changed(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		assert!(!creds.set_tokens(&TokenResponse::new("AT")));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn removed_listener_stops_receiving() {
		let creds = credentials();
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let id = creds.on_tokens_changed(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		creds.set_tokens(&TokenResponse::new("AT-1"));

		assert!(creds.remove_listener(id));
		assert!(!creds.remove_listener(id));

		creds.set_tokens(&TokenResponse::new("AT-2"));

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn listener_may_read_the_cell() {
		let creds = Arc::new(credentials());
		let observed = Arc::new(Mutex::new(None));
		let (cell, sink) = (Arc::downgrade(&creds), observed.clone());

		creds.on_tokens_changed(move |_| {
			if let Some(cell) = cell.upgrade() {
				*sink.lock() = cell.authorization_header_value();
			}
		});
		creds.set_tokens(&TokenResponse::new("AT-reentrant"));

		assert_eq!(observed.lock().as_deref(), Some("Bearer AT-reentrant"));
	}

	#[test]
	fn debug_redacts_secrets() {
		let rendered = format!("{:?}", credentials().with_tokens("AT-secret", "TG-secret"));

		assert!(!rendered.contains("AT-secret"));
		assert!(!rendered.contains("TG-secret"));
	}
}
