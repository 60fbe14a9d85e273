//! Delegated-credential broker with SigV4 request signing, paired with a unary and
//! event-stream invocation client for remote gateways.
//!
//! [`broker::CredentialBroker`] turns an [`auth::AuthConfig`] into per-request headers,
//! caching short-lived credentials from the identity broker behind a single-flight refresh.
//! [`invoke::InvocationClient`] attaches those headers to gateway calls and normalizes
//! timeouts, cancellation, and failures into [`invoke::InvocationResult`] values.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(test)] use gateway_broker as _;

pub mod auth;
pub mod broker;
pub mod error;
pub mod ext;
pub mod http;
pub mod identity;
pub mod invoke;
pub mod obs;
pub mod sign;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::AuthConfig,
		broker::CredentialBroker,
		http::HttpClient,
		invoke::{ClientConfig, InvocationClient},
	};

	/// Builds a reqwest client that talks to `httpmock` servers directly, bypassing any
	/// proxy configured in the environment.
	pub fn test_http_client() -> HttpClient {
		let client = ReqwestClient::builder()
			.no_proxy()
			.build()
			.expect("Failed to build proxy-free Reqwest client for tests.");

		HttpClient::with_client(client)
	}

	/// Constructs a [`CredentialBroker`] whose identity provider uses [`test_http_client`].
	pub fn build_test_broker(config: AuthConfig) -> CredentialBroker {
		CredentialBroker::with_http_client(config, test_http_client())
	}

	/// Constructs an [`InvocationClient`] against `endpoint`, sharing the returned broker.
	pub fn build_test_client(
		endpoint: &str,
		auth: AuthConfig,
	) -> (InvocationClient, CredentialBroker) {
		let endpoint = Url::parse(endpoint).expect("Failed to parse mock gateway endpoint.");
		let config = ClientConfig::builder(endpoint)
			.build()
			.expect("Mock gateway configuration should be valid.");
		let broker = build_test_broker(auth);
		let client = InvocationClient::with_http_client(config, broker.clone(), test_http_client());

		(client, broker)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
