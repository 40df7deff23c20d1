//! Identity exchange with the OAuth provider.
//!
//! Outbound, the bridge builds the authorization URL carrying the pending nonce.
//! Inbound, it parses the callback fragment, checks how the token relates to the
//! pending attempt and resolves the ledger address the session is bound to.

mod address;
mod callback;
mod token;

pub use address::AddressResolution;
pub use callback::CallbackParams;
pub use token::{Audience, IdentityToken, TokenClaims};

#[cfg(test)]
pub(crate) use token::encode_test_jwt;

use serde::{Deserialize, Serialize};

use crate::{
    config::IdentityProviderConfig, error::LoginKitError, logger::redact, nonce::LoginNonce,
    nonce::PendingLogin,
};

/// How strictly a callback token is tied to the pending nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceBinding {
    /// A pending nonce only has to exist.
    PresenceOnly,
    /// If the token payload can be read and carries a `nonce` claim, that claim must
    /// equal the pending nonce. Opaque tokens are accepted on presence alone.
    #[default]
    WhenReadable,
    /// The payload must decode and its `nonce` claim must equal the pending nonce.
    Required,
}

impl NonceBinding {
    /// Checks `token` against the pending attempt.
    ///
    /// # Errors
    /// `MissingNonce` when the token was issued for a different attempt.
    /// `InvalidToken` when the policy requires claims the token does not carry, or
    /// the token has expired.
    pub fn check(self, token: &IdentityToken, pending: &PendingLogin) -> Result<(), LoginKitError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| LoginKitError::Generic {
                error: format!("Critical. Unable to determine SystemTime: {e}"),
            })?
            .as_secs();
        self.check_at(token, pending, now)
    }

    /// [`Self::check`] with an explicit current time, in seconds since the Unix epoch.
    ///
    /// # Errors
    /// See [`Self::check`].
    pub fn check_at(
        self,
        token: &IdentityToken,
        pending: &PendingLogin,
        now: u64,
    ) -> Result<(), LoginKitError> {
        match self {
            Self::PresenceOnly => Ok(()),
            Self::WhenReadable => match token.nonce_claim() {
                Ok(Some(claim)) if !pending.nonce.matches(&claim) => {
                    log::warn!(
                        "token {} was issued for another login attempt",
                        redact(token.expose())
                    );
                    Err(LoginKitError::MissingNonce)
                }
                Ok(_) => Ok(()),
                Err(reason) => {
                    log::debug!("token payload not readable ({reason}), accepting on presence");
                    Ok(())
                }
            },
            Self::Required => {
                let claims = token
                    .claims()
                    .map_err(|reason| LoginKitError::InvalidToken { reason })?;
                match claims.nonce.as_deref() {
                    Some(claim) if pending.nonce.matches(claim) => {}
                    Some(_) => return Err(LoginKitError::MissingNonce),
                    None => {
                        return Err(LoginKitError::InvalidToken {
                            reason: "token carries no nonce claim".to_string(),
                        })
                    }
                }
                if claims.is_expired(now) {
                    return Err(LoginKitError::InvalidToken {
                        reason: "token has expired".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Builds the provider authorization URL for the implicit `id_token` flow.
///
/// # Errors
/// `InvalidInput` if the configured authorization endpoint is not a URL.
pub fn authorization_url(
    provider: &IdentityProviderConfig,
    nonce: &LoginNonce,
) -> Result<String, LoginKitError> {
    let mut url = url::Url::parse(&provider.authorize_url).map_err(|e| {
        LoginKitError::InvalidInput {
            attribute: "identity.authorize_url".to_string(),
            reason: e.to_string(),
        }
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", &provider.client_id)
        .append_pair("response_type", "id_token")
        .append_pair("redirect_uri", &provider.redirect_uri)
        .append_pair("scope", &provider.scope)
        .append_pair("nonce", nonce.as_str())
        .append_pair("prompt", &provider.prompt);
    Ok(url.into())
}
