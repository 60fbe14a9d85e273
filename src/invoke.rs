//! Gateway invocation client: unary and event-stream calls with per-call deadlines,
//! cooperative cancellation, and a lightweight health probe.
//!
//! Every public operation returns a value instead of an error. Unary calls produce an
//! [`InvocationResult`]; streaming calls additionally deliver [`StreamChunk`]s to a callback
//! and always end with exactly one terminal chunk.

mod call;
mod classify;
mod config;
mod event_stream;
mod types;

pub use classify::{GatewayErrorContext, classify_status};
pub use config::*;
pub use event_stream::{EVENT_PREFIX, EventStreamDecoder, GatewayEvent};
pub use types::*;

// crates.io
use reqwest::{
	Response,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	broker::CredentialBroker,
	error::ConfigError,
	ext::{ReqwestHeaderSigner, RequestSignerExt},
	http::HttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	sign::{CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE},
};
use call::CallSlot;
use event_stream::StreamAccumulator;

/// `Accept` value sent with streaming calls.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Cloneable gateway client; clones share the HTTP pool, broker, and cancellation slot.
#[derive(Clone, Debug)]
pub struct InvocationClient {
	http: HttpClient,
	broker: CredentialBroker,
	config: Arc<ClientConfig>,
	calls: CallSlot,
}
impl InvocationClient {
	/// Creates a client with a default HTTP client.
	pub fn new(config: ClientConfig, broker: CredentialBroker) -> Self {
		Self::with_http_client(config, broker, HttpClient::default())
	}

	/// Creates a client that sends gateway calls through `http`.
	pub fn with_http_client(
		config: ClientConfig,
		broker: CredentialBroker,
		http: HttpClient,
	) -> Self {
		Self { http, broker, config: Arc::new(config), calls: CallSlot::default() }
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Broker producing this client's auth headers.
	pub fn broker(&self) -> &CredentialBroker {
		&self.broker
	}

	/// Returns `true` when no call is registered for cancellation.
	pub fn is_idle(&self) -> bool {
		self.calls.is_idle()
	}

	/// Aborts the most recently started in-flight call, which then fails with
	/// [`ErrorKind::Timeout`](crate::error::ErrorKind::Timeout). No effect when idle.
	pub fn cancel(&self) {
		self.calls.cancel();
	}

	/// Sends one unary invocation and waits for the full response.
	pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
		const KIND: FlowKind = FlowKind::Invoke;

		let span = FlowSpan::new(KIND, "invoke");
		let session_id = request.session_id.clone().unwrap_or_else(generate_session_id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let call = self.calls.begin();
		let outcome = span
			.instrument(call.run(self.config.timeout(), self.invoke_once(&request, &session_id)))
			.await;

		drop(call);

		match outcome {
			Ok(result) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				result
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::flow_failed(KIND, e.kind(), &e);

				InvocationResult::failed(String::new(), session_id, Vec::new(), &e)
			},
		}
	}

	/// Sends one streaming invocation, delivering chunks to `on_chunk` as they arrive.
	///
	/// Exactly one terminal chunk is delivered, and it is the last one: [`StreamChunk::Done`]
	/// on success, otherwise a [`StreamChunk::Error`] whose kind matches the returned result.
	/// Text received before a failure is kept in the result's completion.
	pub async fn invoke_streaming<F>(
		&self,
		request: InvocationRequest,
		mut on_chunk: F,
	) -> InvocationResult
	where
		F: FnMut(StreamChunk) + Send,
	{
		const KIND: FlowKind = FlowKind::InvokeStreaming;

		let span = FlowSpan::new(KIND, "invoke_streaming");
		let session_id = request.session_id.clone().unwrap_or_else(generate_session_id);
		let mut acc = StreamAccumulator::new(session_id.clone());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let call = self.calls.begin();
		let outcome = span
			.instrument(call.run(
				self.config.timeout(),
				self.stream_once(&request, &session_id, &mut acc, &mut on_chunk),
			))
			.await;

		drop(call);

		let StreamAccumulator { completion, traces, session_id } = acc;

		match outcome {
			Ok(()) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				on_chunk(StreamChunk::Done { session_id: session_id.clone() });

				InvocationResult::succeeded(completion, session_id, traces)
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::flow_failed(KIND, e.kind(), &e);
				on_chunk(StreamChunk::Error { kind: e.kind(), message: e.to_string() });

				InvocationResult::failed(completion, session_id, traces, &e)
			},
		}
	}

	/// Probes `{endpoint}/health` without auth headers; any failure reads as unhealthy.
	pub async fn health_check(&self) -> bool {
		const KIND: FlowKind = FlowKind::HealthCheck;

		let span = FlowSpan::new(KIND, "health_check");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let healthy = span
			.instrument(async {
				let url = self.config.health_url()?;
				let response =
					self.http.get(url).timeout(self.config.health_timeout()).send().await?;

				Ok::<_, Error>(response.status().is_success())
			})
			.await
			.unwrap_or_else(|e| {
				obs::flow_failed(KIND, e.kind(), &e);

				false
			});

		obs::record_flow_outcome(KIND, FlowOutcome::from_success(healthy));

		healthy
	}

	async fn invoke_once(
		&self,
		request: &InvocationRequest,
		session_id: &str,
	) -> Result<InvocationResult> {
		let url = self.config.invoke_url()?;
		let response = self.send(&url, request, session_id, false).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(classify::response_error(response).await);
		}

		let bytes = response.bytes().await?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let body: GatewayResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source, status: status.as_u16() })?;
		let session_id = body
			.session_id
			.filter(|id| !id.is_empty())
			.unwrap_or_else(|| session_id.to_owned());

		Ok(InvocationResult::succeeded(body.completion, session_id, body.traces))
	}

	async fn stream_once<F>(
		&self,
		request: &InvocationRequest,
		session_id: &str,
		acc: &mut StreamAccumulator,
		on_chunk: &mut F,
	) -> Result<()>
	where
		F: FnMut(StreamChunk),
	{
		let url = self.config.streaming_url()?;
		let response = self.send(&url, request, session_id, true).await?;

		if !response.status().is_success() {
			return Err(classify::response_error(response).await);
		}

		event_stream::consume_event_stream(response.bytes_stream(), acc, on_chunk).await
	}

	// Headers are produced from the exact URL and bytes that go on the wire.
	async fn send(
		&self,
		url: &Url,
		request: &InvocationRequest,
		session_id: &str,
		streaming: bool,
	) -> Result<Response> {
		let body = serde_json::to_vec(&GatewayRequest {
			payload: &request.payload,
			session_id,
			enable_trace: request.enable_trace,
		})
		.map_err(ConfigError::from)?;
		let headers = self.broker.get_headers("POST", url, &body).await?;
		let mut builder =
			ReqwestHeaderSigner.attach_headers(self.http.post(url.clone()), &headers)?;

		if !headers.contains_key(CONTENT_TYPE_HEADER) {
			builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
		}
		if streaming {
			builder = builder.header(ACCEPT, EVENT_STREAM_CONTENT_TYPE);
		}

		Ok(builder.body(body).send().await?)
	}
}
