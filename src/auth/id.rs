//! Strongly typed identifiers used when talking to the identity broker.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $check:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$check($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (identity pool, identity, region).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (identity pool, identity, region).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (identity pool, identity, region).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier contains a character outside its alphabet.
	#[error("{kind} identifier contains the unsupported character {character:?}.")]
	UnsupportedCharacter {
		/// Kind of identifier (identity pool, identity, region).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
}

def_id! {
	IdentityPoolId,
	"Identity pool the delegated credentials are issued from.",
	"IdentityPool",
	validate_view
}
def_id! { IdentityId, "Identity handle resolved from an identity pool.", "Identity", validate_view }
def_id! {
	Region,
	"Cloud region used for credential scope and the default identity endpoint.",
	"Region",
	validate_region
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

// Regions end up inside endpoint host names.
fn validate_region(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	validate_view(kind, view)?;

	match view.chars().find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')) {
		Some(character) => Err(IdentifierError::UnsupportedCharacter { kind, character }),
		None => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty() {
		assert!(IdentityPoolId::new(" us-east-1:pool").is_err(), "Leading whitespace must be rejected.");
		assert!(IdentityPoolId::new("us-east-1:pool ").is_err(), "Trailing whitespace must be rejected.");

		let pool = IdentityPoolId::new("us-east-1:0f3c-pool")
			.expect("Identity pool fixture should be considered valid.");

		assert_eq!(pool.as_ref(), "us-east-1:0f3c-pool");
		assert!(IdentityId::new("").is_err());
		assert_eq!(
			IdentityId::new("with space"),
			Err(IdentifierError::ContainsWhitespace { kind: "Identity" })
		);
	}

	#[test]
	fn regions_are_host_safe() {
		Region::new("eu-central-1").expect("Lower-case region should be accepted.");

		assert_eq!(
			Region::new("us-east-1.evil.com"),
			Err(IdentifierError::UnsupportedCharacter { kind: "Region", character: '.' })
		);
		assert!(Region::new("US-EAST-1").is_err());
	}

	#[test]
	fn serde_enforces_validation() {
		let region: Region =
			serde_json::from_str("\"us-west-2\"").expect("Region should deserialize successfully.");

		assert_eq!(region.as_ref(), "us-west-2");
		assert!(serde_json::from_str::<Region>("\"us west\"").is_err());
		assert!(serde_json::from_str::<IdentityId>("\"\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		IdentityId::new(&exact).expect("Exact length should succeed.");

		assert!(IdentityId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<IdentityPoolId, u8> = HashMap::from_iter([(
			IdentityPoolId::new("us-east-1:pool").expect("Pool used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("us-east-1:pool"), Some(&7));
	}
}
