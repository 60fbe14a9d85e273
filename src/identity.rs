//! Identity broker seam: resolve an identity handle for a pool, then exchange it for a
//! short-lived [`Credential`].
//!
//! [`CognitoIdentityProvider`] speaks the JSON-RPC dialect of the regional identity broker.
//! Tests and embedders can swap in any [`IdentityProvider`].

// crates.io
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Credential, EXPIRY_BUFFER, IdentityId, IdentityPoolId},
	error::AuthError,
	http::{self, HttpClient},
};

/// Content type of identity broker requests.
pub const IDENTITY_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
/// Header naming the identity broker operation.
pub const TARGET_HEADER: &str = "x-amz-target";

/// Boxed future returned by [`IdentityProvider`] methods.
pub type IdentityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + 'a + Send>>;

/// The two identity broker round trips behind one credential refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityStep {
	/// Pool to identity handle.
	ResolveIdentity,
	/// Identity handle to credential.
	ExchangeCredentials,
}
impl IdentityStep {
	/// Returns a stable label suitable for span fields and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			IdentityStep::ResolveIdentity => "resolve_identity",
			IdentityStep::ExchangeCredentials => "exchange_credentials",
		}
	}

	/// Operation name sent in the [`TARGET_HEADER`].
	pub const fn target(self) -> &'static str {
		match self {
			IdentityStep::ResolveIdentity => "AWSCognitoIdentityService.GetId",
			IdentityStep::ExchangeCredentials => "AWSCognitoIdentityService.GetCredentialsForIdentity",
		}
	}
}
impl Display for IdentityStep {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Source of delegated credentials.
///
/// Implementations are shared behind an `Arc` by every clone of a broker and must not cache;
/// the broker owns caching and single-flight coordination.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Resolves the identity handle for `pool`.
	fn resolve_identity<'a>(&'a self, pool: &'a IdentityPoolId) -> IdentityFuture<'a, IdentityId>;

	/// Exchanges `identity` for a short-lived credential.
	fn exchange_credentials<'a>(&'a self, identity: &'a IdentityId) -> IdentityFuture<'a, Credential>;
}

/// [`IdentityProvider`] backed by the regional identity broker's HTTP API.
#[derive(Clone, Debug)]
pub struct CognitoIdentityProvider {
	http: HttpClient,
	endpoint: Url,
}
impl CognitoIdentityProvider {
	/// Creates a provider that calls `endpoint` with a default HTTP client.
	pub fn new(endpoint: Url) -> Self {
		Self::with_http_client(HttpClient::default(), endpoint)
	}

	/// Creates a provider that calls `endpoint` with the supplied HTTP client.
	pub fn with_http_client(http: HttpClient, endpoint: Url) -> Self {
		Self { http, endpoint }
	}

	/// Identity broker endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn call<B, T>(&self, step: IdentityStep, body: &B) -> Result<T, AuthError>
	where
		B: Serialize,
		T: DeserializeOwned,
	{
		let payload = serde_json::to_vec(body)
			.map_err(|e| AuthError::InvalidDocument { step, message: e.to_string() })?;
		let response = self
			.http
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, IDENTITY_CONTENT_TYPE)
			.header(TARGET_HEADER, step.target())
			.body(payload)
			.send()
			.await
			.map_err(|e| AuthError::Unreachable { step, message: e.to_string() })?;
		let status = response.status();
		let bytes = response
			.bytes()
			.await
			.map_err(|e| AuthError::Unreachable { step, message: e.to_string() })?;

		if !status.is_success() {
			return Err(AuthError::Rejected {
				step,
				status: status.as_u16(),
				message: failure_detail(&bytes),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| AuthError::InvalidDocument { step, message: e.to_string() })
	}
}
impl IdentityProvider for CognitoIdentityProvider {
	fn resolve_identity<'a>(&'a self, pool: &'a IdentityPoolId) -> IdentityFuture<'a, IdentityId> {
		Box::pin(async move {
			const STEP: IdentityStep = IdentityStep::ResolveIdentity;

			let response: GetIdResponse =
				self.call(STEP, &GetIdRequest { identity_pool_id: pool }).await?;

			IdentityId::new(response.identity_id)
				.map_err(|e| AuthError::InvalidDocument { step: STEP, message: e.to_string() })
		})
	}

	fn exchange_credentials<'a>(
		&'a self,
		identity: &'a IdentityId,
	) -> IdentityFuture<'a, Credential> {
		Box::pin(async move {
			let response: GetCredentialsResponse = self
				.call(
					IdentityStep::ExchangeCredentials,
					&GetCredentialsRequest { identity_id: identity },
				)
				.await?;

			response.credentials.into_credential()
		})
	}
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
	identity_pool_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
	identity_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
	identity_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
	credentials: CredentialsDocument,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsDocument {
	access_key_id: String,
	secret_key: String,
	#[serde(default)]
	session_token: Option<String>,
	// Epoch seconds, possibly fractional.
	expiration: f64,
}
impl CredentialsDocument {
	fn into_credential(self) -> Result<Credential, AuthError> {
		const STEP: IdentityStep = IdentityStep::ExchangeCredentials;

		if self.access_key_id.is_empty() || self.secret_key.is_empty() {
			return Err(AuthError::InvalidDocument {
				step: STEP,
				message: "credential keys must not be empty".into(),
			});
		}

		let expires_at = OffsetDateTime::from_unix_timestamp(self.expiration.trunc() as i64)
			.map_err(|e| AuthError::InvalidDocument { step: STEP, message: e.to_string() })?;

		if expires_at.checked_sub(EXPIRY_BUFFER).is_none() {
			return Err(AuthError::InvalidDocument {
				step: STEP,
				message: format!("expiration {expires_at} is out of range"),
			});
		}

		let credential = Credential::new(self.access_key_id, self.secret_key, expires_at);

		Ok(match self.session_token.filter(|token| !token.is_empty()) {
			Some(token) => credential.with_session_token(token),
			None => credential,
		})
	}
}

#[derive(Deserialize)]
struct FailureDocument {
	#[serde(rename = "__type", default)]
	kind: Option<String>,
	#[serde(alias = "Message", default)]
	message: Option<String>,
}

fn failure_detail(body: &[u8]) -> String {
	let detail = serde_json::from_slice::<FailureDocument>(body).ok().and_then(|doc| {
		match (doc.kind, doc.message) {
			(Some(kind), Some(message)) => Some(format!("{kind}: {message}")),
			(kind, message) => message.or(kind),
		}
	});

	detail
		.or_else(|| http::body_preview(body))
		.map(|detail| detail.trim_end_matches('.').to_owned())
		.unwrap_or_else(|| "empty response body".into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_document_parses_epoch_expiry() {
		let document: GetCredentialsResponse = serde_json::from_str(
			r#"{"IdentityId":"us-east-1:abc","Credentials":{"AccessKeyId":"ASIA1","SecretKey":"s3cr3t","SessionToken":"tok","Expiration":1714566645.5}}"#,
		)
		.expect("Credentials document should deserialize.");
		let credential =
			document.credentials.into_credential().expect("Credentials document should convert.");

		assert_eq!(credential.access_key_id(), "ASIA1");
		assert_eq!(credential.expires_at().unix_timestamp(), 1_714_566_645);
		assert_eq!(credential.session_token().map(|token| token.expose()), Some("tok"));
	}

	#[test]
	fn empty_keys_are_rejected() {
		let document = CredentialsDocument {
			access_key_id: String::new(),
			secret_key: "secret".into(),
			session_token: None,
			expiration: 0.0,
		};

		assert!(matches!(
			document.into_credential(),
			Err(AuthError::InvalidDocument { step: IdentityStep::ExchangeCredentials, .. })
		));
	}

	#[test]
	fn expiry_at_calendar_floor_is_rejected() {
		let document: GetCredentialsResponse = serde_json::from_str(
			r#"{"Credentials":{"AccessKeyId":"ASIA1","SecretKey":"s3cr3t","Expiration":-377705116800}}"#,
		)
		.expect("Credentials document should deserialize.");

		assert!(matches!(
			document.credentials.into_credential(),
			Err(AuthError::InvalidDocument { step: IdentityStep::ExchangeCredentials, ref message })
				if message.contains("out of range")
		));
	}

	#[test]
	fn failure_detail_prefers_typed_message() {
		assert_eq!(
			failure_detail(br#"{"__type":"NotAuthorizedException","message":"Access denied."}"#),
			"NotAuthorizedException: Access denied"
		);
		assert_eq!(failure_detail(br#"{"Message":"Throttled"}"#), "Throttled");
		assert_eq!(failure_detail(b"upstream exploded"), "upstream exploded");
		assert_eq!(failure_detail(b""), "empty response body");
	}
}
