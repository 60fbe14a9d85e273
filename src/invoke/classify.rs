//! Maps non-success gateway responses onto the crate error taxonomy.

// self
use crate::{_prelude::*, error::ErrorKind, http::{self, ResponseMetadata}};

/// Context describing a non-success gateway response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayErrorContext {
	/// HTTP status code.
	pub http_status: u16,
	/// Message extracted from a JSON error body.
	pub message: Option<String>,
	/// Lossy preview of a non-JSON body.
	pub body_preview: Option<String>,
	/// Retry-After hint, if supplied.
	pub retry_after: Option<Duration>,
}
impl GatewayErrorContext {
	/// Builds context from a status and raw body.
	pub fn from_body(http_status: u16, body: &[u8]) -> Self {
		let message = serde_json::from_slice::<ErrorDocument>(body)
			.ok()
			.and_then(|doc| doc.message.or(doc.error))
			.filter(|message| !message.trim().is_empty());
		let body_preview = if message.is_none() { http::body_preview(body) } else { None };

		Self { http_status, message, body_preview, retry_after: None }
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Classification for this status: 401 and 403 are credential rejections.
	pub fn kind(&self) -> ErrorKind {
		classify_status(self.http_status)
	}

	fn detail(&self) -> String {
		self.message
			.as_deref()
			.or(self.body_preview.as_deref())
			.map(|detail| detail.trim().trim_end_matches('.').to_owned())
			.unwrap_or_else(|| "empty response body".into())
	}

	/// Converts the context into an [`Error`].
	pub fn into_error(self) -> Error {
		let message = self.detail();

		match self.kind() {
			ErrorKind::Authentication => Error::Authentication { status: self.http_status, message },
			_ => Error::Transport {
				status: self.http_status,
				message,
				retry_after: self.retry_after,
			},
		}
	}
}

/// Maps an HTTP status onto [`ErrorKind::Authentication`] or [`ErrorKind::Transport`].
pub fn classify_status(status: u16) -> ErrorKind {
	match status {
		401 | 403 => ErrorKind::Authentication,
		_ => ErrorKind::Transport,
	}
}

/// Consumes a non-success response and classifies it.
pub(crate) async fn response_error(response: reqwest::Response) -> Error {
	let metadata = ResponseMetadata::from_response(&response);
	let body = response.bytes().await.unwrap_or_default();

	GatewayErrorContext::from_body(metadata.status, &body)
		.with_retry_after(metadata.retry_after)
		.into_error()
}

#[derive(Deserialize)]
struct ErrorDocument {
	#[serde(default, alias = "Message")]
	message: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_rejections_are_authentication_errors() {
		for status in [401, 403] {
			let error = GatewayErrorContext::from_body(status, br#"{"message":"Forbidden"}"#)
				.into_error();

			assert_eq!(error.kind(), ErrorKind::Authentication);
			assert!(error.to_string().contains("Forbidden"));
		}
	}

	#[test]
	fn other_statuses_are_transport_errors_with_detail() {
		let json = GatewayErrorContext::from_body(500, br#"{"error":"boom."}"#)
			.with_retry_after(Some(Duration::seconds(3)))
			.into_error();
		let text = GatewayErrorContext::from_body(502, b"<html>bad gateway</html>").into_error();

		assert!(matches!(
			&json,
			Error::Transport { status: 500, message, retry_after: Some(_) } if message == "boom"
		));
		assert_eq!(json.to_string(), "Gateway returned HTTP 500: boom.");
		assert!(matches!(
			text,
			Error::Transport { status: 502, ref message, .. } if message == "<html>bad gateway</html>"
		));
		assert_eq!(classify_status(404), ErrorKind::Transport);
	}

	#[test]
	fn empty_bodies_still_produce_a_message() {
		let error = GatewayErrorContext::from_body(503, b"").into_error();

		assert_eq!(error.to_string(), "Gateway returned HTTP 503: empty response body.");
	}
}
