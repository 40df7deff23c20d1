//! Identity tokens and the claims the bridge reads from them.

use std::fmt;

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::logger::redact;

/// The provider's signed assertion, as received in the callback.
///
/// The bridge does not verify the signature; the ledger does when the token is used
/// in a proof. The raw value is kept behind [`SecretString`] and is never persisted.
pub struct IdentityToken(SecretString);

impl IdentityToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    /// The raw token, for embedding in a transaction argument.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Decodes the payload segment of a JWT.
    ///
    /// # Errors
    /// Returns a description of the problem when the token is not a three-part JWT
    /// or its payload is not the expected JSON.
    pub fn claims(&self) -> Result<TokenClaims, String> {
        serde_json::from_slice(&self.payload()?)
            .map_err(|e| format!("payload is not a claim set: {e}"))
    }

    /// Reads only the `nonce` claim, independently of the other claims.
    ///
    /// `Ok(None)` when the payload is a JSON object without a `nonce`.
    ///
    /// # Errors
    /// Returns a description of the problem when the payload cannot be decoded into
    /// a JSON object.
    pub fn nonce_claim(&self) -> Result<Option<String>, String> {
        let payload: Value = serde_json::from_slice(&self.payload()?)
            .map_err(|e| format!("payload is not JSON: {e}"))?;
        let Value::Object(mut claims) = payload else {
            return Err("payload is not a JSON object".to_string());
        };
        Ok(match claims.remove("nonce") {
            None | Some(Value::Null) => None,
            Some(Value::String(nonce)) => Some(nonce),
            Some(other) => Some(other.to_string()),
        })
    }

    fn payload(&self) -> Result<Vec<u8>, String> {
        let mut parts = self.expose().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err("token is not a three-part JWT".to_string());
        };

        URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| URL_SAFE.decode(payload))
            .map_err(|e| format!("payload is not base64url: {e}"))
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityToken({})", redact(self.expose()))
    }
}

/// The subset of OpenID Connect claims the bridge uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject, the provider's stable user id.
    pub sub: String,
    /// Audience, the OAuth client id(s) the token was minted for.
    pub aud: Audience,
    /// Nonce echoed back from the authorization request.
    #[serde(default)]
    pub nonce: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<u64>,
}

/// JWT `aud`, which may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    One(String),
    /// Several audiences; the first is the primary one.
    Many(Vec<String>),
}

impl TokenClaims {
    /// Whether the token expired before `now` (seconds since the Unix epoch). A token
    /// without `exp` never expires.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

impl Audience {
    /// The audience used for address derivation.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::One(aud) => Some(aud),
            Self::Many(auds) => auds.first().map(String::as_str),
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_test_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
