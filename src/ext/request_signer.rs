//! Request signing contracts that attach broker-produced headers to outbound requests.

// crates.io
use reqwest::{
	RequestBuilder,
	header::{HeaderName, HeaderValue},
};
// self
use crate::{_prelude::*, error::ConfigError, sign::{AuthHeaders, HOST_HEADER}};

/// Describes how to attach [`AuthHeaders`] to an outbound request without constraining the
/// HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects every header in `headers`.
	fn attach_headers(&self, request: Request, headers: &AuthHeaders) -> Result<Request, Error>;
}

/// [`RequestSignerExt`] for reqwest builders that validates each header before attaching it.
///
/// The signed `host` header is skipped; reqwest derives the identical value from the URL.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestHeaderSigner;
impl RequestSignerExt<RequestBuilder, ConfigError> for ReqwestHeaderSigner {
	fn attach_headers(
		&self,
		mut request: RequestBuilder,
		headers: &AuthHeaders,
	) -> Result<RequestBuilder, ConfigError> {
		for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != HOST_HEADER) {
			let invalid = || ConfigError::InvalidHeader { name: name.clone() };
			let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
			let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

			request = request.header(header_name, header_value);
		}

		Ok(request)
	}
}
