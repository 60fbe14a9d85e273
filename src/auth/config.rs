//! Auth mode selection and the validated per-mode configuration.

// self
use crate::{
	_prelude::*,
	auth::{CredentialSecret, IdentityPoolId, Region},
	error::ConfigError,
	http,
};

/// Signing service name used when none is configured.
pub const DEFAULT_SIGNING_SERVICE: &str = "execute-api";
/// Deadline for each identity broker round trip when none is configured.
pub const DEFAULT_IDENTITY_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Closed set of ways a request can be authenticated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
	/// No auth headers.
	#[default]
	None,
	/// Static key sent in the `x-api-key` header.
	ApiKey,
	/// A sidecar proxy signs the request; only a marker header is sent.
	Proxy,
	/// Requests are signed with short-lived credentials from the identity broker.
	Delegated,
}
impl AuthMode {
	/// Returns a stable label suitable for logs and config files.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthMode::None => "none",
			AuthMode::ApiKey => "api-key",
			AuthMode::Proxy => "proxy",
			AuthMode::Delegated => "delegated",
		}
	}
}
impl Display for AuthMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Settings required by [`AuthMode::Delegated`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedAuth {
	/// Region used for the credential scope.
	pub region: Region,
	/// Identity pool credentials are issued from.
	pub identity_pool: IdentityPoolId,
	/// Signing service name.
	pub service: String,
	/// Identity broker endpoint.
	pub identity_endpoint: Url,
	/// Deadline for each identity broker round trip.
	pub identity_timeout: StdDuration,
}

/// Validated per-mode data; each variant carries exactly what its mode needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStrategy {
	/// See [`AuthMode::None`].
	None,
	/// See [`AuthMode::ApiKey`].
	ApiKey {
		/// Key placed in the `x-api-key` header.
		key: CredentialSecret,
	},
	/// See [`AuthMode::Proxy`].
	Proxy,
	/// See [`AuthMode::Delegated`].
	Delegated(DelegatedAuth),
}
impl AuthStrategy {
	/// Returns the mode this strategy implements.
	pub fn mode(&self) -> AuthMode {
		match self {
			AuthStrategy::None => AuthMode::None,
			AuthStrategy::ApiKey { .. } => AuthMode::ApiKey,
			AuthStrategy::Proxy => AuthMode::Proxy,
			AuthStrategy::Delegated(_) => AuthMode::Delegated,
		}
	}
}

/// Immutable auth configuration consumed by [`crate::broker::CredentialBroker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
	strategy: AuthStrategy,
}
impl AuthConfig {
	/// Starts a builder for the given mode.
	pub fn builder(mode: AuthMode) -> AuthConfigBuilder {
		AuthConfigBuilder::new(mode)
	}

	/// Configuration that sends no auth headers.
	pub fn none() -> Self {
		Self { strategy: AuthStrategy::None }
	}

	/// Configuration that defers signing to a sidecar proxy.
	pub fn proxy() -> Self {
		Self { strategy: AuthStrategy::Proxy }
	}

	/// Active mode.
	pub fn mode(&self) -> AuthMode {
		self.strategy.mode()
	}

	/// Validated per-mode data.
	pub fn strategy(&self) -> &AuthStrategy {
		&self.strategy
	}
}
impl Default for AuthConfig {
	fn default() -> Self {
		Self::none()
	}
}

/// Builder for [`AuthConfig`], also deserializable from configuration files.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfigBuilder {
	/// Selected auth mode.
	pub mode: AuthMode,
	/// Region for [`AuthMode::Delegated`].
	pub region: Option<String>,
	/// Identity pool for [`AuthMode::Delegated`].
	pub identity_pool_id: Option<String>,
	/// Static key for [`AuthMode::ApiKey`].
	pub api_key: Option<CredentialSecret>,
	/// Signing service override for [`AuthMode::Delegated`].
	pub service: Option<String>,
	/// Identity broker endpoint override for [`AuthMode::Delegated`].
	pub identity_endpoint: Option<Url>,
	/// Identity broker round trip deadline override for [`AuthMode::Delegated`].
	pub identity_timeout: Option<StdDuration>,
}
impl AuthConfigBuilder {
	/// Creates a builder for the given mode with every optional field unset.
	pub fn new(mode: AuthMode) -> Self {
		Self { mode, ..Default::default() }
	}

	/// Sets the region.
	pub fn region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into());

		self
	}

	/// Sets the identity pool.
	pub fn identity_pool_id(mut self, pool: impl Into<String>) -> Self {
		self.identity_pool_id = Some(pool.into());

		self
	}

	/// Sets the static API key.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(CredentialSecret::new(key));

		self
	}

	/// Overrides the signing service (defaults to [`DEFAULT_SIGNING_SERVICE`]).
	pub fn service(mut self, service: impl Into<String>) -> Self {
		self.service = Some(service.into());

		self
	}

	/// Overrides the identity broker endpoint (defaults to the regional endpoint).
	pub fn identity_endpoint(mut self, url: Url) -> Self {
		self.identity_endpoint = Some(url);

		self
	}

	/// Overrides the identity broker round trip deadline (defaults to
	/// [`DEFAULT_IDENTITY_TIMEOUT`]).
	pub fn identity_timeout(mut self, timeout: StdDuration) -> Self {
		self.identity_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the fields the selected mode requires.
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		let mode = self.mode;
		let strategy = match mode {
			AuthMode::None => AuthStrategy::None,
			AuthMode::Proxy => AuthStrategy::Proxy,
			AuthMode::ApiKey => {
				let key = self
					.api_key
					.filter(|key| !key.is_empty())
					.ok_or(ConfigError::MissingField { mode, field: "api_key" })?;

				AuthStrategy::ApiKey { key }
			},
			AuthMode::Delegated => {
				let region = self
					.region
					.filter(|region| !region.is_empty())
					.ok_or(ConfigError::MissingField { mode, field: "region" })?;
				let region = Region::new(region)?;
				let identity_pool = self
					.identity_pool_id
					.filter(|pool| !pool.is_empty())
					.ok_or(ConfigError::MissingField { mode, field: "identity_pool_id" })?;
				let identity_pool = IdentityPoolId::new(identity_pool)?;
				let service = self
					.service
					.filter(|service| !service.is_empty())
					.unwrap_or_else(|| DEFAULT_SIGNING_SERVICE.to_owned());
				let identity_endpoint = match self.identity_endpoint {
					Some(url) => url,
					None => default_identity_endpoint(&region)?,
				};

				let identity_timeout = self.identity_timeout.unwrap_or(DEFAULT_IDENTITY_TIMEOUT);

				http::validate_endpoint(&identity_endpoint)?;

				if identity_timeout.is_zero() {
					return Err(ConfigError::ZeroTimeout { field: "identity_timeout" });
				}

				AuthStrategy::Delegated(DelegatedAuth {
					region,
					identity_pool,
					service,
					identity_endpoint,
					identity_timeout,
				})
			},
		};

		Ok(AuthConfig { strategy })
	}
}

/// Regional identity broker endpoint.
pub fn default_identity_endpoint(region: &Region) -> Result<Url, ConfigError> {
	Ok(Url::parse(&format!("https://cognito-identity.{region}.amazonaws.com/"))?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn api_key_mode_requires_a_key() {
		let err = AuthConfig::builder(AuthMode::ApiKey)
			.build()
			.expect_err("API key mode without a key must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "api_key", .. }));
		assert!(AuthConfig::builder(AuthMode::ApiKey).api_key("").build().is_err());

		let config = AuthConfig::builder(AuthMode::ApiKey)
			.api_key("fixture-key")
			.build()
			.expect("API key fixture should be valid.");

		assert_eq!(config.mode(), AuthMode::ApiKey);
	}

	#[test]
	fn delegated_mode_requires_region_and_pool() {
		let missing_region = AuthConfig::builder(AuthMode::Delegated)
			.identity_pool_id("us-east-1:pool")
			.build()
			.expect_err("Delegated mode without a region must fail.");
		let missing_pool = AuthConfig::builder(AuthMode::Delegated)
			.region("us-east-1")
			.build()
			.expect_err("Delegated mode without a pool must fail.");

		assert!(matches!(missing_region, ConfigError::MissingField { field: "region", .. }));
		assert!(matches!(missing_pool, ConfigError::MissingField { field: "identity_pool_id", .. }));
	}

	#[test]
	fn delegated_defaults_fill_service_and_endpoint() {
		let config = AuthConfig::builder(AuthMode::Delegated)
			.region("eu-west-1")
			.identity_pool_id("eu-west-1:pool")
			.build()
			.expect("Delegated fixture should be valid.");
		let AuthStrategy::Delegated(delegated) = config.strategy() else {
			panic!("Delegated mode should produce a delegated strategy.");
		};

		assert_eq!(delegated.service, DEFAULT_SIGNING_SERVICE);
		assert_eq!(delegated.identity_timeout, DEFAULT_IDENTITY_TIMEOUT);
		assert_eq!(
			delegated.identity_endpoint.as_str(),
			"https://cognito-identity.eu-west-1.amazonaws.com/"
		);
	}

	#[test]
	fn delegated_rejects_non_http_identity_endpoint() {
		let err = AuthConfig::builder(AuthMode::Delegated)
			.region("eu-west-1")
			.identity_pool_id("eu-west-1:pool")
			.identity_endpoint(Url::parse("ftp://identity.example.com/").expect("Fixture URL parses."))
			.build()
			.expect_err("Non-HTTP identity endpoints must be rejected.");

		assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
	}

	#[test]
	fn delegated_rejects_zero_identity_timeout() {
		let err = AuthConfig::builder(AuthMode::Delegated)
			.region("eu-west-1")
			.identity_pool_id("eu-west-1:pool")
			.identity_timeout(StdDuration::ZERO)
			.build()
			.expect_err("A zero identity deadline must be rejected.");

		assert!(matches!(err, ConfigError::ZeroTimeout { field: "identity_timeout" }));
	}

	#[test]
	fn builder_deserializes_from_config_documents() {
		let builder: AuthConfigBuilder = serde_json::from_str(
			r#"{"mode":"delegated","region":"us-west-2","identity_pool_id":"us-west-2:pool","service":"lambda"}"#,
		)
		.expect("Delegated config document should deserialize.");
		let config = builder.build().expect("Deserialized delegated config should be valid.");

		assert_eq!(config.mode(), AuthMode::Delegated);

		let AuthStrategy::Delegated(delegated) = config.strategy() else {
			panic!("Delegated mode should produce a delegated strategy.");
		};

		assert_eq!(delegated.service, "lambda");

		let empty: AuthConfigBuilder =
			serde_json::from_str("{}").expect("Empty config document should deserialize.");

		assert_eq!(empty.build().expect("Default mode needs no fields.").mode(), AuthMode::None);
	}

	#[test]
	fn debug_output_redacts_api_key() {
		let config = AuthConfig::builder(AuthMode::ApiKey)
			.api_key("fixture-key")
			.build()
			.expect("API key fixture should be valid.");

		assert!(!format!("{config:?}").contains("fixture-key"));
	}
}
