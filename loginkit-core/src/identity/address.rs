use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::LoginKitError,
    identity::IdentityToken,
    primitives::{LedgerAddress, ParseFromForeignBinding},
};

/// Domain separation tag for derived addresses.
const DERIVATION_TAG: &[u8] = b"loginkit/address/v1";

/// How the ledger address of a session is obtained from an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressResolution {
    /// Every login is bound to one fixed address. For development networks.
    TestIdentity {
        /// The fixed address.
        address: String,
    },
    /// The address is derived from the token's issuer, audience and subject plus a
    /// user salt, so the same account always maps to the same address.
    Derived {
        /// User salt.
        salt: String,
    },
}

impl AddressResolution {
    /// Resolves the address for `token`.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed test address, `InvalidToken` when derivation
    /// needs claims the token does not have.
    pub fn resolve(&self, token: &IdentityToken) -> Result<LedgerAddress, LoginKitError> {
        match self {
            Self::TestIdentity { address } => {
                LedgerAddress::parse_from_ffi(address, "address.address")
            }
            Self::Derived { salt } => {
                let claims = token
                    .claims()
                    .map_err(|reason| LoginKitError::InvalidToken { reason })?;
                let aud = claims
                    .aud
                    .primary()
                    .ok_or_else(|| LoginKitError::InvalidToken {
                        reason: "token has an empty audience".to_string(),
                    })?;
                Ok(derive_address(&claims.iss, aud, &claims.sub, salt))
            }
        }
    }
}

fn derive_address(iss: &str, aud: &str, sub: &str, salt: &str) -> LedgerAddress {
    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_TAG);
    for field in [iss, aud, sub, salt] {
        let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
        hasher.update(len.to_be_bytes());
        hasher.update(field.as_bytes());
    }
    LedgerAddress::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::defaults::DEVNET_TEST_ADDRESS;
    use crate::identity::encode_test_jwt;

    fn token(sub: &str) -> IdentityToken {
        IdentityToken::new(encode_test_jwt(&json!({
            "iss": "https://accounts.google.com",
            "sub": sub,
            "aud": "client-123",
        })))
    }

    #[test]
    fn test_test_identity_ignores_token() {
        let resolution = AddressResolution::TestIdentity {
            address: DEVNET_TEST_ADDRESS.to_string(),
        };
        let address = resolution.resolve(&IdentityToken::new("abc.def.ghi")).unwrap();
        assert_eq!(address.to_string(), DEVNET_TEST_ADDRESS);
    }

    #[test]
    fn test_derived_is_stable_per_subject_and_salt() {
        let salted = |salt: &str| AddressResolution::Derived {
            salt: salt.to_string(),
        };
        let a = salted("s").resolve(&token("alice")).unwrap();
        assert_eq!(a, salted("s").resolve(&token("alice")).unwrap());
        assert_ne!(a, salted("s").resolve(&token("bob")).unwrap());
        assert_ne!(a, salted("t").resolve(&token("alice")).unwrap());
    }

    #[test]
    fn test_fields_are_length_prefixed() {
        assert_ne!(
            derive_address("ab", "c", "d", ""),
            derive_address("a", "bc", "d", "")
        );
    }

    #[test]
    fn test_derived_needs_claims() {
        let resolution = AddressResolution::Derived {
            salt: String::new(),
        };
        assert!(matches!(
            resolution.resolve(&IdentityToken::new("abc.def.ghi")),
            Err(LoginKitError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_serde_shape() {
        let parsed: AddressResolution =
            serde_json::from_value(json!({ "kind": "derived", "salt": "42" })).unwrap();
        assert_eq!(
            parsed,
            AddressResolution::Derived {
                salt: "42".to_string()
            }
        );
    }
}
