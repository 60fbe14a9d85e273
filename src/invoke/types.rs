// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, error::ErrorKind};

/// Prefix of generated session identifiers.
pub const SESSION_ID_PREFIX: &str = "session-";

/// One invocation of the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
	/// Opaque prompt or input text.
	pub payload: String,
	/// Session to continue; a fresh one is generated when absent.
	#[serde(default)]
	pub session_id: Option<String>,
	/// Asks the gateway to include trace records.
	#[serde(default)]
	pub enable_trace: bool,
}
impl InvocationRequest {
	/// Creates a request for `payload` without a session or traces.
	pub fn new(payload: impl Into<String>) -> Self {
		Self { payload: payload.into(), ..Default::default() }
	}

	/// Continues an existing session.
	pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());

		self
	}

	/// Enables or disables trace records.
	pub fn with_trace(mut self, enable: bool) -> Self {
		self.enable_trace = enable;

		self
	}
}

/// Classified failure carried by an [`InvocationResult`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationError {
	/// Closed classification.
	pub kind: ErrorKind,
	/// Human-readable detail.
	pub message: String,
}
impl From<&Error> for InvocationError {
	fn from(error: &Error) -> Self {
		Self { kind: error.kind(), message: error.to_string() }
	}
}

/// Outcome of one invocation; failures are values, never panics or raw errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvocationResult {
	/// `true` exactly when [`error`](Self::error) is `None`.
	pub success: bool,
	/// Response text; for failed streams, the text accumulated before the failure.
	pub completion: String,
	/// Session the call ran in.
	pub session_id: String,
	/// Trace records, in arrival order.
	pub traces: Vec<Value>,
	/// Failure detail, when the call failed.
	pub error: Option<InvocationError>,
}
impl InvocationResult {
	pub(crate) fn succeeded(completion: String, session_id: String, traces: Vec<Value>) -> Self {
		Self { success: true, completion, session_id, traces, error: None }
	}

	pub(crate) fn failed(
		completion: String,
		session_id: String,
		traces: Vec<Value>,
		error: &Error,
	) -> Self {
		Self { success: false, completion, session_id, traces, error: Some(error.into()) }
	}

	/// Failure classification, when the call failed.
	pub fn error_kind(&self) -> Option<ErrorKind> {
		self.error.as_ref().map(|error| error.kind)
	}
}

/// Unit delivered to the streaming callback.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
	/// Incremental response text.
	Text(String),
	/// Trace record.
	Trace(Value),
	/// Successful end of stream.
	Done {
		/// Session the call ran in.
		session_id: String,
	},
	/// Failure; terminal unless `kind` is [`ErrorKind::Remote`].
	Error {
		/// Closed classification.
		kind: ErrorKind,
		/// Human-readable detail.
		message: String,
	},
}
impl StreamChunk {
	/// Returns `true` for the chunk that ends a stream.
	pub fn is_terminal(&self) -> bool {
		match self {
			StreamChunk::Done { .. } => true,
			StreamChunk::Error { kind, .. } => *kind != ErrorKind::Remote,
			StreamChunk::Text(_) | StreamChunk::Trace(_) => false,
		}
	}
}

/// Generates `session-` followed by 32 random lower-case hex digits.
pub fn generate_session_id() -> String {
	format!("{SESSION_ID_PREFIX}{:032x}", rand::random::<u128>())
}

#[derive(Serialize)]
pub(crate) struct GatewayRequest<'a> {
	pub(crate) payload: &'a str,
	pub(crate) session_id: &'a str,
	pub(crate) enable_trace: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayResponse {
	#[serde(default)]
	pub(crate) completion: String,
	#[serde(default, alias = "sessionId")]
	pub(crate) session_id: Option<String>,
	#[serde(default)]
	pub(crate) traces: Vec<Value>,
}
