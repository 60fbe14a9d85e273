//! Crate-level error types shared by the credential broker and the invocation client.

// self
use crate::{_prelude::*, auth::AuthMode, identity::IdentityStep};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity broker round trip failed while obtaining delegated credentials.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Network failure (DNS, TCP, TLS, broken body stream).
	#[error(transparent)]
	Network(#[from] NetworkError),

	/// Gateway rejected the request credentials.
	#[error("Gateway rejected the request credentials with HTTP {status}: {message}.")]
	Authentication {
		/// HTTP status code (401 or 403).
		status: u16,
		/// Gateway-supplied detail or a body preview.
		message: String,
	},
	/// Call was cancelled or exceeded its deadline.
	#[error("{cause}")]
	Timeout {
		/// Which of the two timers fired.
		cause: TimeoutCause,
	},
	/// Gateway answered with a non-success status other than 401/403.
	#[error("Gateway returned HTTP {status}: {message}.")]
	Transport {
		/// HTTP status code.
		status: u16,
		/// Gateway-supplied detail or a body preview.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Gateway answered 2xx with a body that does not match the response schema.
	#[error("Gateway returned a malformed response body.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}
impl Error {
	/// Returns the caller-facing classification of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Configuration,
			Self::Auth(_) => ErrorKind::Auth,
			Self::Network(_) => ErrorKind::Network,
			Self::Authentication { .. } => ErrorKind::Authentication,
			Self::Timeout { .. } => ErrorKind::Timeout,
			Self::Transport { .. } | Self::Decode { .. } => ErrorKind::Transport,
		}
	}

	/// Returns `true` when repeating the same call may succeed without changing inputs.
	///
	/// The crate never retries on its own; this is a hint for callers.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Network(_) | Self::Timeout { .. } => true,
			Self::Auth(err) => matches!(err, AuthError::Unreachable { .. }),
			Self::Transport { status, .. } => *status == 429 || *status >= 500,
			Self::Config(_) | Self::Authentication { .. } | Self::Decode { .. } => false,
		}
	}
}

/// Closed classification attached to every failed invocation and error chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Local configuration is incomplete or invalid.
	Configuration,
	/// Delegated credentials could not be obtained from the identity broker.
	Auth,
	/// The gateway rejected the request credentials (401/403).
	Authentication,
	/// The call was cancelled or its deadline elapsed.
	Timeout,
	/// The gateway could not be reached or the connection broke.
	Network,
	/// The gateway answered with another non-success status or an unreadable body.
	Transport,
	/// The gateway reported a failure inside an otherwise healthy event stream.
	Remote,
}
impl ErrorKind {
	/// Returns a stable label suitable for logs and serialized results.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Configuration => "configuration",
			ErrorKind::Auth => "auth",
			ErrorKind::Authentication => "authentication",
			ErrorKind::Timeout => "timeout",
			ErrorKind::Network => "network",
			ErrorKind::Transport => "transport",
			ErrorKind::Remote => "remote",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reason a call ended with [`Error::Timeout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeoutCause {
	/// [`crate::invoke::InvocationClient::cancel`] aborted the call.
	Cancelled,
	/// The configured request deadline elapsed.
	DeadlineElapsed,
}
impl Display for TimeoutCause {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			TimeoutCause::Cancelled => f.write_str("Call was cancelled before it completed."),
			TimeoutCause::DeadlineElapsed => f.write_str("Call exceeded its deadline."),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed or a request could not be built.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// An endpoint URL could not be parsed or joined.
	#[error("Endpoint URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An endpoint URL parsed but is unusable.
	#[error("Endpoint `{url}` is invalid: {reason}.")]
	InvalidEndpoint {
		/// Offending URL.
		url: String,
		/// Human-readable reason.
		reason: &'static str,
	},
	/// An identifier failed validation.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// The selected auth mode requires a field that was not supplied.
	#[error("The {mode} auth mode requires `{field}`.")]
	MissingField {
		/// Selected auth mode.
		mode: AuthMode,
		/// Missing field name.
		field: &'static str,
	},
	/// Delegated credentials were requested outside delegated mode.
	#[error("Delegated credentials are unavailable in the {mode} auth mode.")]
	CredentialsUnavailable {
		/// Active auth mode.
		mode: AuthMode,
	},
	/// A produced header cannot be sent over HTTP.
	#[error("Header `{name}` cannot be sent over HTTP.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// A timeout was configured as zero.
	#[error("The {field} must be greater than zero.")]
	ZeroTimeout {
		/// Timeout field name.
		field: &'static str,
	},
	/// The signing timestamp could not be rendered.
	#[error("Signing timestamp could not be formatted.")]
	TimestampFormat(#[from] time::error::Format),
	/// The outbound request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}

/// Identity broker failures. Cloneable so a single refresh result can reach every waiter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// The identity broker answered with a non-success status.
	#[error("Identity broker rejected the {step} call with HTTP {status}: {message}.")]
	Rejected {
		/// Round trip that failed.
		step: IdentityStep,
		/// HTTP status code.
		status: u16,
		/// Broker-supplied detail or a body preview.
		message: String,
	},
	/// The identity broker answered 2xx with an unusable document.
	#[error("Identity broker returned a malformed {step} document: {message}.")]
	InvalidDocument {
		/// Round trip that failed.
		step: IdentityStep,
		/// Parsing or validation detail.
		message: String,
	},
	/// The identity broker could not be reached.
	#[error("Identity broker could not be reached during the {step} call: {message}.")]
	Unreachable {
		/// Round trip that failed.
		step: IdentityStep,
		/// Transport detail.
		message: String,
	},
}
impl AuthError {
	/// Returns the identity round trip that produced this error.
	pub fn step(&self) -> IdentityStep {
		match self {
			Self::Rejected { step, .. }
			| Self::InvalidDocument { step, .. }
			| Self::Unreachable { step, .. } => *step,
		}
	}
}

/// Network-level failures (connect, TLS, broken streams, IO).
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the gateway.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the gateway.")]
	Io(#[from] std::io::Error),
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_follow_variants() {
		let timeout = Error::Timeout { cause: TimeoutCause::Cancelled };
		let forbidden = Error::Authentication { status: 403, message: "denied".into() };
		let missing = Error::from(ConfigError::MissingField {
			mode: AuthMode::ApiKey,
			field: "api_key",
		});

		assert_eq!(timeout.kind(), ErrorKind::Timeout);
		assert_eq!(forbidden.kind(), ErrorKind::Authentication);
		assert_eq!(missing.kind(), ErrorKind::Configuration);
		assert_eq!(
			Error::from(NetworkError::Io(std::io::Error::other("reset"))).kind(),
			ErrorKind::Network
		);
	}

	#[test]
	fn retry_hints_cover_transient_statuses() {
		let throttled = Error::Transport { status: 429, message: "slow".into(), retry_after: None };
		let bad_request =
			Error::Transport { status: 400, message: "bad".into(), retry_after: None };
		let unreachable = Error::from(AuthError::Unreachable {
			step: IdentityStep::ResolveIdentity,
			message: "refused".into(),
		});
		let rejected = Error::from(AuthError::Rejected {
			step: IdentityStep::ExchangeCredentials,
			status: 400,
			message: "nope".into(),
		});

		assert!(throttled.is_retryable());
		assert!(!bad_request.is_retryable());
		assert!(unreachable.is_retryable());
		assert!(!rejected.is_retryable());
	}

	#[test]
	fn messages_read_as_sentences() {
		let timeout = Error::Timeout { cause: TimeoutCause::DeadlineElapsed };
		let missing = ConfigError::MissingField { mode: AuthMode::Delegated, field: "region" };

		assert_eq!(timeout.to_string(), "Call exceeded its deadline.");
		assert_eq!(missing.to_string(), "The delegated auth mode requires `region`.");
		assert_eq!(ErrorKind::Remote.to_string(), "remote");
	}
}
