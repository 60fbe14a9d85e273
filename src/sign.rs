//! AWS Signature Version 4 request signing.
//!
//! [`delegated_headers`] produces the complete header set a delegated-mode request carries.
//! The lower-level [`CanonicalRequest`] and [`sign_canonical`] pair signs arbitrary header
//! sets so the signer can be checked against published test vectors.

// crates.io
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, auth::Credential, error::ConfigError};

/// Signing algorithm label.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
/// Final component of every credential scope.
pub const SCOPE_TERMINATOR: &str = "aws4_request";
/// Signed `host` header.
pub const HOST_HEADER: &str = "host";
/// Signed timestamp header.
pub const DATE_HEADER: &str = "x-amz-date";
/// Signed content type header.
pub const CONTENT_TYPE_HEADER: &str = "content-type";
/// Signed payload digest header.
pub const CONTENT_SHA256_HEADER: &str = "x-amz-content-sha256";
/// Signed session token header, present only for temporary credentials.
pub const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";
/// Header carrying the final signature.
pub const AUTHORIZATION_HEADER: &str = "authorization";
/// Content type of every gateway request body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

type HmacSha256 = Hmac<Sha256>;

const AMZ_DATE_FORMAT: &[BorrowedFormatItem] =
	format_description!("[year][month][day]T[hour][minute][second]Z");
const DATE_STAMP_FORMAT: &[BorrowedFormatItem] = format_description!("[year][month][day]");

/// Lower-case header names mapped to values, iterated in sorted order.
pub type AuthHeaders = BTreeMap<String, String>;

/// Credential scope inputs shared by every stage of one signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigningScope<'a> {
	/// Region component.
	pub region: &'a str,
	/// Service component.
	pub service: &'a str,
	/// Signing instant; converted to UTC before formatting.
	pub timestamp: OffsetDateTime,
}
impl SigningScope<'_> {
	/// `YYYYMMDDTHHMMSSZ` rendering of the timestamp.
	pub fn amz_date(&self) -> Result<String, ConfigError> {
		self.format_timestamp(AMZ_DATE_FORMAT)
	}

	/// `YYYYMMDD` rendering of the timestamp.
	pub fn date_stamp(&self) -> Result<String, ConfigError> {
		self.format_timestamp(DATE_STAMP_FORMAT)
	}

	/// `date/region/service/aws4_request`.
	pub fn credential_scope(&self) -> Result<String, ConfigError> {
		Ok(format!("{}/{}/{}/{SCOPE_TERMINATOR}", self.date_stamp()?, self.region, self.service))
	}

	fn format_timestamp(&self, format: &[BorrowedFormatItem]) -> Result<String, ConfigError> {
		Ok(self.timestamp.to_offset(UtcOffset::UTC).format(format)?)
	}
}

/// Canonical form of one request, ready to be hashed into the string to sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequest {
	method: String,
	uri: String,
	query: String,
	headers: BTreeMap<String, String>,
	payload_hash: String,
}
impl CanonicalRequest {
	/// Canonicalizes `method`, the path and query of `url`, and `headers`.
	///
	/// Header names are lower-cased and values trimmed; every supplied header is signed.
	pub fn new<I, K, V>(method: &str, url: &Url, headers: I, payload_hash: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let headers = headers
			.into_iter()
			.map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.as_ref().trim().to_owned()))
			.collect();

		Self {
			method: method.to_ascii_uppercase(),
			uri: canonical_uri(url.path()),
			query: canonical_query(url),
			headers,
			payload_hash: payload_hash.into(),
		}
	}

	/// Semicolon-joined sorted header names.
	pub fn signed_headers(&self) -> String {
		self.headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
	}

	/// Newline-joined canonical request text.
	pub fn render(&self) -> String {
		let canonical_headers =
			self.headers.iter().map(|(name, value)| format!("{name}:{value}\n")).collect::<String>();

		format!(
			"{}\n{}\n{}\n{canonical_headers}\n{}\n{}",
			self.method,
			self.uri,
			self.query,
			self.signed_headers(),
			self.payload_hash
		)
	}
}

/// Result of signing one canonical request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
	/// Semicolon-joined signed header names.
	pub signed_headers: String,
	/// Lower-case hex signature.
	pub signature: String,
	/// Complete `authorization` header value.
	pub authorization: String,
}

/// Signs `request` with `credential` under `scope`.
pub fn sign_canonical(
	request: &CanonicalRequest,
	credential: &Credential,
	scope: &SigningScope,
) -> Result<Signature, ConfigError> {
	let credential_scope = scope.credential_scope()?;
	let string_to_sign = format!(
		"{ALGORITHM}\n{}\n{credential_scope}\n{}",
		scope.amz_date()?,
		sha256_hex(request.render().as_bytes())
	);
	let key = derive_signing_key(
		credential.secret_access_key().expose(),
		&scope.date_stamp()?,
		scope.region,
		scope.service,
	);
	let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));
	let signed_headers = request.signed_headers();
	let authorization = format!(
		"{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
		credential.access_key_id()
	);

	Ok(Signature { signed_headers, signature, authorization })
}

/// Builds the full signed header set for a delegated-mode request.
///
/// The result always contains `host`, `x-amz-date`, `content-type`, `x-amz-content-sha256`,
/// and `authorization`, plus `x-amz-security-token` when the credential carries a session
/// token. The same inputs always produce the same headers.
pub fn delegated_headers(
	method: &str,
	url: &Url,
	body: &[u8],
	credential: &Credential,
	scope: &SigningScope,
) -> Result<AuthHeaders, ConfigError> {
	let payload_hash = sha256_hex(body);
	let mut headers = AuthHeaders::new();

	headers.insert(HOST_HEADER.into(), host_header(url)?);
	headers.insert(DATE_HEADER.into(), scope.amz_date()?);
	headers.insert(CONTENT_TYPE_HEADER.into(), JSON_CONTENT_TYPE.into());
	headers.insert(CONTENT_SHA256_HEADER.into(), payload_hash.clone());

	if let Some(token) = credential.session_token() {
		headers.insert(SECURITY_TOKEN_HEADER.into(), token.expose().into());
	}

	let canonical = CanonicalRequest::new(method, url, &headers, payload_hash);
	let signature = sign_canonical(&canonical, credential, scope)?;

	headers.insert(AUTHORIZATION_HEADER.into(), signature.authorization);

	Ok(headers)
}

/// Four-stage HMAC key derivation: date, region, service, terminator.
pub fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> [u8; 32] {
	let date_key = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
	let region_key = hmac_sha256(&date_key, region.as_bytes());
	let service_key = hmac_sha256(&region_key, service.as_bytes());

	hmac_sha256(&service_key, SCOPE_TERMINATOR.as_bytes())
}

/// Lower-case hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
	hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
	let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length.");

	mac.update(data);

	let mut out = [0; 32];

	out.copy_from_slice(&mac.finalize().into_bytes());

	out
}

// Host as it goes on the wire; default ports are omitted by `Url::port`.
fn host_header(url: &Url) -> Result<String, ConfigError> {
	let host = url.host_str().ok_or_else(|| ConfigError::InvalidEndpoint {
		url: url.to_string(),
		reason: "host is missing",
	})?;

	Ok(match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_owned(),
	})
}

// Segments are encoded as they appear on the wire, so escapes are encoded a second time.
fn canonical_uri(path: &str) -> String {
	if path.is_empty() {
		return "/".into();
	}

	path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(url: &Url) -> String {
	let mut pairs = url
		.query_pairs()
		.map(|(name, value)| (uri_encode(&name), uri_encode(&value)))
		.collect::<Vec<_>>();

	pairs.sort();

	pairs.into_iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&")
}

fn uri_encode(value: &str) -> String {
	let mut encoded = String::with_capacity(value.len());

	for byte in value.bytes() {
		match byte {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' =>
				encoded.push(byte as char),
			_ => encoded.push_str(&format!("%{byte:02X}")),
		}
	}

	encoded
}
