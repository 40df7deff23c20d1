//! Key names of the login namespace.
//!
//! These match the keys the web client has always used, so sessions written by
//! earlier builds keep loading.

/// Authenticated user record, JSON `{"address": "0x..."}`.
pub const USER_KEY: &str = "zkLogin_user";

/// Nonce of the pending login attempt.
pub const NONCE_KEY: &str = "zkLogin_nonce";

/// Epoch the pending nonce was minted against, as a decimal string.
pub const EPOCH_KEY: &str = "zkLogin_epoch";

/// Every key owned by the bridge, in the order `logout` removes them.
///
/// The nonce goes first so that a failure halfway can never leave a consumable
/// nonce behind.
pub const ALL_KEYS: [&str; 3] = [NONCE_KEY, EPOCH_KEY, USER_KEY];
