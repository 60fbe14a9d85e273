//! Incremental decoder for the gateway's line-delimited `data:` event stream.
//!
//! Bytes may arrive split at any position, including inside a multi-byte character. The
//! decoder keeps undecoded bytes and partial lines between pushes, so chunk boundaries never
//! change the decoded events.

// crates.io
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
// self
use crate::{_prelude::*, error::ErrorKind, invoke::StreamChunk, obs};

/// Prefix of every event line.
pub const EVENT_PREFIX: &str = "data:";

/// One decoded gateway event.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayEvent {
	/// Incremental response text.
	Text {
		/// Text fragment.
		text: String,
	},
	/// Trace record.
	Trace {
		/// Arbitrary trace value.
		#[serde(default)]
		trace: Value,
	},
	/// Failure reported by the gateway while the stream stays healthy.
	Error {
		/// Failure detail.
		#[serde(alias = "message")]
		error: String,
	},
	/// End of stream.
	Done {
		/// Session echoed by the gateway.
		#[serde(default, rename = "sessionId", alias = "session_id")]
		session_id: Option<String>,
	},
	/// Event type this client does not understand.
	#[serde(other)]
	Unknown,
}

/// Stateful UTF-8 and line decoder.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
	// Trailing bytes of an incomplete UTF-8 sequence.
	pending: Vec<u8>,
	// Decoded text not yet terminated by a newline.
	line: String,
	// Prefix of `line` already searched for a newline.
	scanned: usize,
}
impl EventStreamDecoder {
	/// Creates an empty decoder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Feeds `chunk` and returns the events completed by it.
	pub fn push(&mut self, chunk: &[u8]) -> Vec<GatewayEvent> {
		self.pending.extend_from_slice(chunk);
		self.decode_pending(false);

		self.drain_lines()
	}

	/// Flushes buffered input at end of stream, treating a final unterminated line as complete.
	pub fn finish(&mut self) -> Vec<GatewayEvent> {
		self.decode_pending(true);

		let mut events = self.drain_lines();
		let tail = std::mem::take(&mut self.line);

		self.scanned = 0;

		events.extend(parse_line(&tail));

		events
	}

	fn decode_pending(&mut self, flush: bool) {
		loop {
			let (valid, invalid) = match std::str::from_utf8(&self.pending) {
				Ok(_) => (self.pending.len(), None),
				Err(e) => (e.valid_up_to(), Some(e.error_len())),
			};

			if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
				self.line.push_str(text);
			}

			match invalid {
				None => {
					self.pending.clear();

					return;
				},
				Some(Some(len)) => {
					self.line.push(char::REPLACEMENT_CHARACTER);
					self.pending.drain(..valid + len);
				},
				Some(None) if flush => {
					self.line.push(char::REPLACEMENT_CHARACTER);
					self.pending.clear();

					return;
				},
				Some(None) => {
					self.pending.drain(..valid);

					return;
				},
			}
		}
	}

	fn drain_lines(&mut self) -> Vec<GatewayEvent> {
		let Some(offset) = self.line[self.scanned..].rfind('\n') else {
			self.scanned = self.line.len();

			return Vec::new();
		};
		let rest = self.line.split_off(self.scanned + offset + 1);
		let complete = std::mem::replace(&mut self.line, rest);

		self.scanned = self.line.len();

		complete.lines().filter_map(parse_line).collect()
	}
}

fn parse_line(line: &str) -> Option<GatewayEvent> {
	let data = line.trim_end_matches('\r').strip_prefix(EVENT_PREFIX)?.trim();

	if data.is_empty() {
		return None;
	}

	match serde_json::from_str(data) {
		Ok(event) => Some(event),
		Err(_) => {
			obs::stream_line_skipped(line);

			None
		},
	}
}

/// Running totals of one streamed invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct StreamAccumulator {
	pub(crate) completion: String,
	pub(crate) traces: Vec<Value>,
	pub(crate) session_id: String,
}
impl StreamAccumulator {
	pub(crate) fn new(session_id: String) -> Self {
		Self { session_id, ..Default::default() }
	}

	fn apply<F>(&mut self, event: GatewayEvent, on_chunk: &mut F)
	where
		F: FnMut(StreamChunk),
	{
		match event {
			GatewayEvent::Text { text } => {
				self.completion.push_str(&text);
				on_chunk(StreamChunk::Text(text));
			},
			GatewayEvent::Trace { trace } => {
				self.traces.push(trace.clone());
				on_chunk(StreamChunk::Trace(trace));
			},
			GatewayEvent::Error { error } =>
				on_chunk(StreamChunk::Error { kind: ErrorKind::Remote, message: error }),
			GatewayEvent::Done { session_id } =>
				if let Some(session_id) = session_id.filter(|id| !id.is_empty()) {
					self.session_id = session_id;
				},
			GatewayEvent::Unknown => {},
		}
	}
}

/// Drains `stream`, forwarding decoded events to `on_chunk` and folding them into `acc`.
///
/// Terminal chunks are left to the caller. A body error stops consumption and is returned
/// after every event decoded before it has been delivered.
pub(crate) async fn consume_event_stream<S, E, F>(
	stream: S,
	acc: &mut StreamAccumulator,
	on_chunk: &mut F,
) -> Result<()>
where
	S: Stream<Item = Result<Bytes, E>>,
	E: Into<Error>,
	F: FnMut(StreamChunk),
{
	let mut decoder = EventStreamDecoder::new();
	let mut stream = std::pin::pin!(stream);

	while let Some(chunk) = stream.next().await {
		let chunk = chunk.map_err(Into::into)?;

		for event in decoder.push(&chunk) {
			acc.apply(event, on_chunk);
		}
	}
	for event in decoder.finish() {
		acc.apply(event, on_chunk);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::stream;
	// self
	use super::*;
	use crate::error::NetworkError;

	const STREAM: &str = concat!(
		"data: {\"type\":\"text\",\"text\":\"Hé\"}\n",
		": keep-alive\n",
		"\n",
		"data: {\"type\":\"trace\",\"trace\":{\"step\":1}}\r\n",
		"data: not-json\n",
		"event: ignored\n",
		"data: {\"type\":\"error\",\"error\":\"tool failed\"}\n",
		"data: {\"type\":\"heartbeat\"}\n",
		"data: {\"type\":\"text\",\"text\":\"llo\"}\n",
		"data: {\"type\":\"done\",\"sessionId\":\"s-42\"}",
	);

	fn expected() -> Vec<GatewayEvent> {
		vec![
			GatewayEvent::Text { text: "Hé".into() },
			GatewayEvent::Trace { trace: serde_json::json!({"step": 1}) },
			GatewayEvent::Error { error: "tool failed".into() },
			GatewayEvent::Unknown,
			GatewayEvent::Text { text: "llo".into() },
			GatewayEvent::Done { session_id: Some("s-42".into()) },
		]
	}

	fn decode_in_pieces(size: usize) -> Vec<GatewayEvent> {
		let mut decoder = EventStreamDecoder::new();
		let mut events = Vec::new();

		for piece in STREAM.as_bytes().chunks(size) {
			events.extend(decoder.push(piece));
		}

		events.extend(decoder.finish());

		events
	}

	#[test]
	fn chunk_boundaries_do_not_change_events() {
		for size in [1, 2, 3, 7, 64, STREAM.len()] {
			assert_eq!(decode_in_pieces(size), expected(), "Chunk size {size} changed the events.");
		}
	}

	#[test]
	fn split_multibyte_character_is_reassembled() {
		let mut decoder = EventStreamDecoder::new();
		let line = "data: {\"type\":\"text\",\"text\":\"é\"}\n".as_bytes();
		let split = line.iter().position(|byte| *byte == 0xC3).expect("Fixture contains é.") + 1;

		assert!(decoder.push(&line[..split]).is_empty());
		assert_eq!(decoder.push(&line[split..]), vec![GatewayEvent::Text { text: "é".into() }]);
	}

	#[test]
	fn long_unterminated_line_is_scanned_once() {
		let mut decoder = EventStreamDecoder::new();
		let text = "x".repeat(16 * 1024);
		let line = format!("data: {{\"type\":\"text\",\"text\":\"{text}\"}}");

		for piece in line.as_bytes().chunks(3) {
			assert!(decoder.push(piece).is_empty());
			assert_eq!(decoder.scanned, decoder.line.len(), "Buffered text must not be rescanned.");
		}

		assert_eq!(decoder.push(b"\r\ndata: "), vec![GatewayEvent::Text { text }]);
		assert_eq!(decoder.line, "data: ");
		assert_eq!(decoder.scanned, decoder.line.len());
	}

	#[test]
	fn invalid_utf8_is_replaced_not_fatal() {
		let mut decoder = EventStreamDecoder::new();
		let mut bytes = b"data: {\"type\":\"text\",\"text\":\"a".to_vec();

		bytes.push(0xFF);
		bytes.extend_from_slice(b"b\"}\n");

		assert_eq!(decoder.push(&bytes), vec![GatewayEvent::Text { text: "a\u{FFFD}b".into() }]);
	}

	#[tokio::test]
	async fn consumer_forwards_chunks_and_accumulates() {
		let pieces = STREAM
			.as_bytes()
			.chunks(5)
			.map(|piece| Ok::<_, Error>(Bytes::copy_from_slice(piece)))
			.collect::<Vec<_>>();
		let mut acc = StreamAccumulator::new("session-local".into());
		let mut chunks = Vec::new();
		let mut on_chunk = |chunk: StreamChunk| chunks.push(chunk);

		consume_event_stream(stream::iter(pieces), &mut acc, &mut on_chunk)
			.await
			.expect("Healthy stream should be consumed.");

		assert_eq!(acc.completion, "Héllo");
		assert_eq!(acc.session_id, "s-42");
		assert_eq!(acc.traces.len(), 1);
		assert_eq!(chunks.len(), 4, "Done and unknown events are not forwarded.");
		assert_eq!(
			chunks[2],
			StreamChunk::Error { kind: ErrorKind::Remote, message: "tool failed".into() }
		);
		assert!(chunks.iter().all(|chunk| !chunk.is_terminal()));
	}

	#[tokio::test]
	async fn body_error_keeps_partial_completion() {
		let pieces = vec![
			Ok(Bytes::from_static(b"data: {\"type\":\"text\",\"text\":\"par\"}\n")),
			Err(Error::from(NetworkError::Io(std::io::Error::other("reset")))),
			Ok(Bytes::from_static(b"data: {\"type\":\"text\",\"text\":\"never\"}\n")),
		];
		let mut acc = StreamAccumulator::new("session-local".into());
		let mut chunks = Vec::new();
		let mut on_chunk = |chunk: StreamChunk| chunks.push(chunk);
		let err = consume_event_stream(stream::iter(pieces), &mut acc, &mut on_chunk)
			.await
			.expect_err("Body error must stop consumption.");

		assert_eq!(err.kind(), ErrorKind::Network);
		assert_eq!(acc.completion, "par");
		assert_eq!(chunks, vec![StreamChunk::Text("par".into())]);
		assert_eq!(acc.session_id, "session-local");
	}
}
