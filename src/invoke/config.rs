// self
use crate::{_prelude::*, error::ConfigError, http};

/// Request deadline used when none is configured.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(300);
/// Health probe deadline used when none is configured.
pub const DEFAULT_HEALTH_TIMEOUT: StdDuration = StdDuration::from_secs(5);
/// Unary invocation path, relative to the endpoint.
pub const INVOKE_PATH: &str = "invoke";
/// Streaming invocation path, relative to the endpoint.
pub const STREAMING_PATH: &str = "invoke-streaming";
/// Health probe path, relative to the endpoint.
pub const HEALTH_PATH: &str = "health";

/// Validated gateway client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	endpoint: Url,
	timeout: StdDuration,
	health_timeout: StdDuration,
}
impl ClientConfig {
	/// Starts a builder for `endpoint`.
	pub fn builder(endpoint: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(endpoint)
	}

	/// Base endpoint, always ending in `/`.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Deadline applied to each invocation.
	pub fn timeout(&self) -> StdDuration {
		self.timeout
	}

	/// Deadline applied to each health probe.
	pub fn health_timeout(&self) -> StdDuration {
		self.health_timeout
	}

	/// `{endpoint}/invoke`.
	pub fn invoke_url(&self) -> Result<Url, ConfigError> {
		Ok(self.endpoint.join(INVOKE_PATH)?)
	}

	/// `{endpoint}/invoke-streaming`.
	pub fn streaming_url(&self) -> Result<Url, ConfigError> {
		Ok(self.endpoint.join(STREAMING_PATH)?)
	}

	/// `{endpoint}/health`.
	pub fn health_url(&self) -> Result<Url, ConfigError> {
		Ok(self.endpoint.join(HEALTH_PATH)?)
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	/// Gateway base endpoint.
	pub endpoint: Url,
	/// Invocation deadline.
	pub timeout: StdDuration,
	/// Health probe deadline.
	pub health_timeout: StdDuration,
}
impl ClientConfigBuilder {
	/// Creates a builder with default deadlines.
	pub fn new(endpoint: Url) -> Self {
		Self { endpoint, timeout: DEFAULT_TIMEOUT, health_timeout: DEFAULT_HEALTH_TIMEOUT }
	}

	/// Overrides the invocation deadline.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the health probe deadline.
	pub fn health_timeout(mut self, timeout: StdDuration) -> Self {
		self.health_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the endpoint and deadlines.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut endpoint = self.endpoint;

		http::validate_endpoint(&endpoint)?;

		if self.timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { field: "timeout" });
		}
		if self.health_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout { field: "health_timeout" });
		}
		// Relative joins replace the last segment unless the path ends with `/`.
		if !endpoint.path().ends_with('/') {
			let path = format!("{}/", endpoint.path());

			endpoint.set_path(&path);
		}

		endpoint.set_query(None);
		endpoint.set_fragment(None);

		Ok(ClientConfig {
			endpoint,
			timeout: self.timeout,
			health_timeout: self.health_timeout,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Fixture URL should parse.")
	}

	#[test]
	fn paths_join_below_the_endpoint() {
		let config = ClientConfig::builder(url("https://gateway.example.com/prod"))
			.build()
			.expect("Gateway fixture should be valid.");

		assert_eq!(
			config.invoke_url().expect("Invoke URL joins.").as_str(),
			"https://gateway.example.com/prod/invoke"
		);
		assert_eq!(
			config.streaming_url().expect("Streaming URL joins.").as_str(),
			"https://gateway.example.com/prod/invoke-streaming"
		);
		assert_eq!(
			config.health_url().expect("Health URL joins.").as_str(),
			"https://gateway.example.com/prod/health"
		);
	}

	#[test]
	fn defaults_apply() {
		let config = ClientConfig::builder(url("http://127.0.0.1:8080"))
			.build()
			.expect("Local fixture should be valid.");

		assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
		assert_eq!(config.health_timeout(), DEFAULT_HEALTH_TIMEOUT);
		assert_eq!(config.endpoint().as_str(), "http://127.0.0.1:8080/");
	}

	#[test]
	fn rejects_zero_timeouts_and_bad_schemes() {
		let zero = ClientConfig::builder(url("https://gateway.example.com/"))
			.timeout(StdDuration::ZERO)
			.build()
			.expect_err("Zero timeout must be rejected.");
		let scheme = ClientConfig::builder(url("ws://gateway.example.com/"))
			.build()
			.expect_err("Non-HTTP endpoints must be rejected.");

		assert!(matches!(zero, ConfigError::ZeroTimeout { field: "timeout" }));
		assert!(matches!(scheme, ConfigError::InvalidEndpoint { .. }));
	}
}
