use crate::{error::LoginKitError, identity::IdentityToken};

/// Parameters the provider returns in the redirect fragment.
#[derive(Debug, Default)]
pub struct CallbackParams {
    /// The identity token, if any.
    pub id_token: Option<IdentityToken>,
    /// OAuth `error` code, set when the user cancelled or the provider refused.
    pub error: Option<String>,
    /// OAuth `error_description`.
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parses a callback. Accepts the fragment with or without its leading `#`, or
    /// the whole redirect URL; only the fragment is read.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let fragment = match input.split_once('#') {
            Some((_, fragment)) => fragment,
            None if input.contains("://") => "",
            None => input,
        };

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "id_token" if !value.is_empty() => {
                    params.id_token = Some(IdentityToken::new(value.into_owned()));
                }
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// The token, or `MissingToken` when the fragment has none.
    ///
    /// # Errors
    /// `MissingToken` if `id_token` is absent or empty.
    pub fn into_token(self) -> Result<IdentityToken, LoginKitError> {
        if let Some(error) = &self.error {
            log::warn!(
                "identity provider returned {error}: {}",
                self.error_description.as_deref().unwrap_or("no description")
            );
        }
        self.id_token.ok_or(LoginKitError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("#id_token=abc.def.ghi&state=x" ; "leading hash")]
    #[test_case("id_token=abc.def.ghi" ; "bare fragment")]
    #[test_case("https://app.example.com/cb?id_token=wrong#id_token=abc.def.ghi" ; "full url")]
    fn test_reads_token(input: &str) {
        let token = CallbackParams::parse(input).into_token().unwrap();
        assert_eq!(token.expose(), "abc.def.ghi");
    }

    #[test_case("" ; "empty")]
    #[test_case("#state=x" ; "no token")]
    #[test_case("#id_token=" ; "empty token")]
    #[test_case("https://app.example.com/cb?id_token=abc" ; "query only")]
    fn test_missing_token(input: &str) {
        assert!(matches!(
            CallbackParams::parse(input).into_token(),
            Err(LoginKitError::MissingToken)
        ));
    }

    #[test]
    fn test_provider_error_is_captured() {
        let params = CallbackParams::parse("#error=access_denied&error_description=User+cancelled");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
        assert!(params.into_token().is_err());
    }

    #[test]
    fn test_percent_encoded_token() {
        let token = CallbackParams::parse("#id_token=a%2Eb.c").into_token().unwrap();
        assert_eq!(token.expose(), "a.b.c");
    }
}
