//! Credential broker: turns an [`AuthConfig`] into per-request auth headers.
//!
//! In delegated mode the broker caches one short-lived [`Credential`] and collapses
//! concurrent refreshes into a single identity broker round trip. Every clone of a
//! [`CredentialBroker`] shares the same cache, provider, and counters.

mod metrics;
mod state;

pub use metrics::*;
pub use state::CachePhase;

// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	auth::{AuthConfig, AuthMode, AuthStrategy, Credential, DelegatedAuth},
	error::{AuthError, ConfigError, ErrorKind},
	http::HttpClient,
	identity::{CognitoIdentityProvider, IdentityProvider, IdentityStep},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	sign::{self, AuthHeaders, SigningScope},
};
use state::{Acquired, CredentialCache};

/// Header carrying the static key in [`AuthMode::ApiKey`].
pub const API_KEY_HEADER: &str = "x-api-key";
/// Marker header asking a sidecar proxy to sign the request in [`AuthMode::Proxy`].
pub const PROXY_SIGN_HEADER: &str = "x-sigv4-proxy";

/// Shared, cloneable source of auth headers.
#[derive(Clone)]
pub struct CredentialBroker {
	config: Arc<AuthConfig>,
	provider: Option<Arc<dyn IdentityProvider>>,
	cache: CredentialCache,
	metrics: Arc<BrokerMetrics>,
}
impl CredentialBroker {
	/// Creates a broker; delegated mode talks to the configured identity endpoint.
	pub fn new(config: AuthConfig) -> Self {
		Self::with_http_client(config, HttpClient::default())
	}

	/// Creates a broker whose identity broker calls use `http`.
	pub fn with_http_client(config: AuthConfig, http: HttpClient) -> Self {
		let provider = match config.strategy() {
			AuthStrategy::Delegated(delegated) => Some(Arc::new(
				CognitoIdentityProvider::with_http_client(http, delegated.identity_endpoint.clone()),
			) as Arc<dyn IdentityProvider>),
			_ => None,
		};

		Self::from_parts(config, provider)
	}

	/// Creates a broker backed by a custom [`IdentityProvider`].
	pub fn with_identity_provider(config: AuthConfig, provider: Arc<dyn IdentityProvider>) -> Self {
		Self::from_parts(config, Some(provider))
	}

	fn from_parts(config: AuthConfig, provider: Option<Arc<dyn IdentityProvider>>) -> Self {
		Self {
			config: Arc::new(config),
			provider,
			cache: CredentialCache::default(),
			metrics: Arc::new(BrokerMetrics::default()),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Active mode.
	pub fn mode(&self) -> AuthMode {
		self.config.mode()
	}

	/// Refresh and cache counters shared by every clone.
	pub fn metrics(&self) -> &BrokerMetrics {
		&self.metrics
	}

	/// Current phase of the credential cache.
	pub fn cache_phase(&self) -> CachePhase {
		self.cache.phase()
	}

	/// Produces the auth headers for one request signed at the current instant.
	///
	/// `url` must be the exact URL the request is sent to and `body` the exact bytes sent.
	pub async fn get_headers(&self, method: &str, url: &Url, body: &[u8]) -> Result<AuthHeaders> {
		self.get_headers_at(method, url, body, OffsetDateTime::now_utc()).await
	}

	/// Like [`get_headers`](Self::get_headers) with an explicit signing instant.
	pub async fn get_headers_at(
		&self,
		method: &str,
		url: &Url,
		body: &[u8],
		timestamp: OffsetDateTime,
	) -> Result<AuthHeaders> {
		match self.config.strategy() {
			AuthStrategy::None => Ok(AuthHeaders::new()),
			AuthStrategy::ApiKey { key } =>
				Ok(AuthHeaders::from([(API_KEY_HEADER.to_owned(), key.expose().to_owned())])),
			AuthStrategy::Proxy =>
				Ok(AuthHeaders::from([(PROXY_SIGN_HEADER.to_owned(), "true".to_owned())])),
			AuthStrategy::Delegated(delegated) => {
				let credential = self.credential().await?;
				let scope = SigningScope {
					region: &delegated.region,
					service: &delegated.service,
					timestamp,
				};

				Ok(sign::delegated_headers(method, url, body, &credential, &scope)?)
			},
		}
	}

	/// Returns a credential fresh for at least the expiry buffer, refreshing if needed.
	///
	/// Concurrent callers that find the cache stale share one refresh and receive the same
	/// credential or the same error. Only available in [`AuthMode::Delegated`].
	pub async fn credential(&self) -> Result<Credential> {
		let (delegated, provider) = self.delegated()?;
		let acquired = self.cache.acquire(OffsetDateTime::now_utc(), |ticket| {
			let pool = delegated.identity_pool.clone();
			let limit = delegated.identity_timeout;
			let provider = provider.clone();
			let metrics = self.metrics.clone();

			async move {
				const KIND: FlowKind = FlowKind::CredentialRefresh;

				let span = FlowSpan::new(KIND, "credential");

				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
				metrics.record_attempt();

				let result = span
					.instrument(async {
						let identity = bounded(
							IdentityStep::ResolveIdentity,
							limit,
							provider.resolve_identity(&pool),
						)
						.await?;

						bounded(
							IdentityStep::ExchangeCredentials,
							limit,
							provider.exchange_credentials(&identity),
						)
						.await
					})
					.await;

				match &result {
					Ok(_) => metrics.record_success(),
					Err(e) => {
						metrics.record_failure();
						obs::flow_failed(KIND, ErrorKind::Auth, e);
					},
				}

				obs::record_flow_outcome(KIND, FlowOutcome::from_success(result.is_ok()));
				ticket.resolve(&result);

				result
			}
			.boxed()
		});

		match acquired {
			Acquired::Cached(credential) => {
				self.metrics.record_cache_hit();
				obs::credential_lookup("cache");

				Ok(credential)
			},
			Acquired::Started(pending) => {
				obs::credential_lookup("refresh");

				pending.await.map_err(Error::from)
			},
			Acquired::Joined(pending) => {
				obs::credential_lookup("in_flight");

				pending.await.map_err(Error::from)
			},
		}
	}

	/// Drops the cached credential so the next lookup refreshes.
	///
	/// A refresh already in flight still answers its waiters, but its result is not cached.
	pub fn invalidate(&self) {
		self.cache.invalidate();
		obs::credentials_invalidated();
	}

	fn delegated(&self) -> Result<(&DelegatedAuth, &Arc<dyn IdentityProvider>), ConfigError> {
		let mode = self.mode();

		match (self.config.strategy(), self.provider.as_ref()) {
			(AuthStrategy::Delegated(delegated), Some(provider)) => Ok((delegated, provider)),
			_ => Err(ConfigError::CredentialsUnavailable { mode }),
		}
	}
}
impl Debug for CredentialBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBroker")
			.field("config", &self.config)
			.field("cache", &self.cache)
			.field("metrics", &self.metrics)
			.finish()
	}
}

// An elapsed deadline settles the refresh as `Unreachable`, returning the cache to `Empty`.
async fn bounded<T, F>(step: IdentityStep, limit: StdDuration, call: F) -> Result<T, AuthError>
where
	F: Future<Output = Result<T, AuthError>>,
{
	tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
		Err(AuthError::Unreachable {
			step,
			message: format!("no response within {} ms", limit.as_millis()),
		})
	})
}
