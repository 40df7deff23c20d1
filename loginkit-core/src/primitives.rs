use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LoginKitError;

/// Length in bytes of ledger addresses and object ids.
pub const ADDRESS_LENGTH: usize = 32;

/// A 32-byte ledger account address.
///
/// Parsing accepts the short form the ledger prints for system objects (`0x6`) and
/// left-pads it, so two spellings of the same address compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerAddress([u8; ADDRESS_LENGTH]);

/// Object ids share the address format.
pub type ObjectId = LedgerAddress;

impl LedgerAddress {
    /// Wraps raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl FromStr for LedgerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| "address must start with 0x".to_string())?;
        if digits.is_empty() || digits.len() > ADDRESS_LENGTH * 2 {
            return Err(format!(
                "address must have between 1 and {} hex digits",
                ADDRESS_LENGTH * 2
            ));
        }
        let padded = format!("{digits:0>width$}", width = ADDRESS_LENGTH * 2);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(padded, &mut bytes).map_err(|e| e.to_string())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerAddress({self})")
    }
}

impl Serialize for LedgerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LedgerAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A trait for parsing primitive types from foreign bindings.
///
/// Values crossing the FFI boundary are plain strings; this turns them into typed
/// values and reports which attribute was malformed.
///
/// # Examples
/// ```rust,ignore
/// let address = LedgerAddress::parse_from_ffi("0x6", "sender");
/// ```
///
/// # Errors
/// - `LoginKitError::InvalidInput` if the provided string is not valid.
pub trait ParseFromForeignBinding {
    /// Parses `s`, naming `attr` in the error.
    ///
    /// # Errors
    /// `LoginKitError::InvalidInput` if `s` is malformed.
    fn parse_from_ffi(s: &str, attr: &'static str) -> Result<Self, LoginKitError>
    where
        Self: Sized;

    /// Parses `s` when present.
    ///
    /// # Errors
    /// `LoginKitError::InvalidInput` if `s` is present and malformed.
    fn parse_from_ffi_optional(
        s: Option<String>,
        attr: &'static str,
    ) -> Result<Option<Self>, LoginKitError>
    where
        Self: Sized;
}

impl ParseFromForeignBinding for LedgerAddress {
    fn parse_from_ffi(s: &str, attr: &'static str) -> Result<Self, LoginKitError> {
        Self::from_str(s).map_err(|reason| LoginKitError::InvalidInput {
            attribute: attr.to_string(),
            reason,
        })
    }

    fn parse_from_ffi_optional(
        s: Option<String>,
        attr: &'static str,
    ) -> Result<Option<Self>, LoginKitError> {
        if let Some(s) = s {
            return Self::parse_from_ffi(s.as_str(), attr).map(Some);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_short_form_is_padded() {
        let clock = LedgerAddress::from_str("0x6").unwrap();
        assert_eq!(
            clock.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000006"
        );
        assert_eq!(clock, LedgerAddress::from_str(&clock.to_string()).unwrap());
    }

    #[test]
    fn test_mixed_case_compares_equal() {
        let lower = LedgerAddress::from_str("0xabcdef").unwrap();
        let upper = LedgerAddress::from_str("0XABCDEF").unwrap();
        assert_eq!(lower, upper);
    }

    #[test_case("" ; "empty")]
    #[test_case("0x" ; "prefix only")]
    #[test_case("42dd" ; "missing prefix")]
    #[test_case("0xTEST" ; "not hex")]
    #[test_case("0x00000000000000000000000000000000000000000000000000000000000000001" ; "too long")]
    fn test_rejects_malformed(input: &str) {
        let err = LedgerAddress::parse_from_ffi(input, "sender").unwrap_err();
        assert!(
            matches!(err, LoginKitError::InvalidInput { ref attribute, .. } if attribute == "sender")
        );
    }

    #[test]
    fn test_serde_uses_display_form() {
        let address = LedgerAddress::from_str("0x2a").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(
            json,
            "\"0x000000000000000000000000000000000000000000000000000000000000002a\""
        );
        let back: LedgerAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(
            LedgerAddress::parse_from_ffi_optional(None, "owner").unwrap(),
            None
        );
        assert!(LedgerAddress::parse_from_ffi_optional(Some("0x1".to_string()), "owner")
            .unwrap()
            .is_some());
    }
}
