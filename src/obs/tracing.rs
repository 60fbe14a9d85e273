// self
use crate::{_prelude::*, error::ErrorKind, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker and invocation flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("gateway_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event describing a failed flow.
pub(crate) fn flow_failed(kind: FlowKind, error_kind: ErrorKind, message: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = kind.as_str(), error_kind = error_kind.as_str(), %message, "flow failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, error_kind, message);
	}
}

/// Emits a trace event for a stream line that was not a decodable event.
pub(crate) fn stream_line_skipped(line: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::trace!(len = line.len(), "skipped undecodable stream line");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = line;
	}
}

/// Emits a trace event recording how a credential lookup was served.
pub(crate) fn credential_lookup(source: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::trace!(flow = FlowKind::CredentialRefresh.as_str(), source, "credential lookup");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = source;
	}
}

/// Emits a debug event when cached credentials are dropped.
pub(crate) fn credentials_invalidated() {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = FlowKind::CredentialRefresh.as_str(), "cached credentials invalidated");
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = FlowSpan::new(FlowKind::Invoke, "instrument_passes_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn event_helpers_accept_any_flow() {
		flow_failed(FlowKind::HealthCheck, ErrorKind::Network, &"connection refused");
		stream_line_skipped("data: {not json");
		credential_lookup("cache");
		credentials_invalidated();
	}
}
