//! Optional observability helpers for broker and invocation flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `gateway_broker.flow` with the
//!   `flow` and `stage` fields, plus debug/trace events for notable transitions.
//! - Enable `metrics` to increment the `gateway_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Delegated credential refresh against the identity broker.
	CredentialRefresh,
	/// Unary gateway invocation.
	Invoke,
	/// Event-stream gateway invocation.
	InvokeStreaming,
	/// Gateway health probe.
	HealthCheck,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::CredentialRefresh => "credential_refresh",
			FlowKind::Invoke => "invoke",
			FlowKind::InvokeStreaming => "invoke_streaming",
			FlowKind::HealthCheck => "health_check",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a boolean success flag onto an outcome.
	pub const fn from_success(success: bool) -> Self {
		if success { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
