//! HTTP primitives shared by the identity provider and the invocation client.
//!
//! [`HttpClient`] wraps the reqwest client both sides use, [`ResponseMetadata`] captures the
//! status and retry hint of a response before its body is consumed, and the crate-internal
//! helpers map reqwest failures onto [`Error`].

// std
use std::ops::Deref;
// crates.io
use reqwest::header::{HeaderMap, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, NetworkError, TimeoutCause},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Per-call deadlines are enforced by the invocation client itself, so a custom
/// [`ReqwestClient`] does not need a global timeout.
#[derive(Clone, Debug, Default)]
pub struct HttpClient(pub ReqwestClient);
impl HttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for HttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for HttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Status and retry hint captured from a response before its body is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Captures metadata from a live response.
	pub fn from_response(response: &reqwest::Response) -> Self {
		Self {
			status: response.status().as_u16(),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		if e.is_builder() {
			return ConfigError::from(e).into();
		}
		if e.is_timeout() {
			return Error::Timeout { cause: TimeoutCause::DeadlineElapsed };
		}

		NetworkError::network(e).into()
	}
}

/// Rejects endpoints the client cannot call.
pub(crate) fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::InvalidEndpoint {
			url: url.to_string(),
			reason: "scheme must be http or https",
		});
	}
	if url.host_str().is_none_or(str::is_empty) {
		return Err(ConfigError::InvalidEndpoint { url: url.to_string(), reason: "host is missing" });
	}

	Ok(())
}

/// Lossy, length-capped rendering of a response body for error messages.
pub(crate) fn body_preview(body: &[u8]) -> Option<String> {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return None;
	}

	let mut preview = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
		preview.push('…');
	}

	Some(preview)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(parse_retry_after(&headers), None, "Past dates carry no hint.");

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn endpoints_must_be_http_with_host() {
		let ok = Url::parse("https://gateway.example.com/prod").expect("Fixture URL parses.");
		let ftp = Url::parse("ftp://gateway.example.com/").expect("Fixture URL parses.");
		let mailto = Url::parse("mailto:ops@example.com").expect("Fixture URL parses.");

		assert!(validate_endpoint(&ok).is_ok());
		assert!(validate_endpoint(&ftp).is_err());
		assert!(validate_endpoint(&mailto).is_err());
	}

	#[test]
	fn body_preview_trims_and_caps() {
		assert_eq!(body_preview(b"  \n"), None);
		assert_eq!(body_preview(b" boom \n").as_deref(), Some("boom"));

		let long = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let preview = body_preview(long.as_bytes()).expect("Long body should have a preview.");

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
