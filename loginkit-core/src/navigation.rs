/// Moves the user agent. Implemented by the host application.
///
/// The bridge calls it with the provider authorization URL when a login starts and
/// with an in-app route once a callback has been handled, so the UI never stays on
/// the callback screen.
#[uniffi::export(with_foreign)]
pub trait Navigator: Send + Sync {
    /// Navigates to `url`, either absolute or an in-app route such as `/dashboard`.
    fn navigate(&self, url: String);
}
