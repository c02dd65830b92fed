use crate::connection::Connection;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Backend-specific factory that turns a URL into a [`Connection`].
///
/// Adapters carry no per-connection state; one instance is registered at
/// startup and shared for the life of the process.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Human-readable backend name
    fn localized_name(&self) -> &str;

    /// Scheme this adapter claims by default, used to break ties
    fn primary_url_scheme(&self) -> &str;

    /// Pure predicate over the URL; must not block or perform I/O
    fn can_connect_to_url(&self, url: &Url) -> bool;

    /// Perform the handshake and hand back an open connection
    async fn connect_to_url(&self, url: &Url) -> Result<Arc<dyn Connection>>;
}

/// Render a URL for logs and error messages without its password
pub fn redact_url(url: &Url) -> String {
    if url.password().is_none() {
        return url.to_string();
    }
    let mut redacted = url.clone();
    // Only fails for URLs that cannot carry credentials, which have no password
    let _ = redacted.set_password(Some("***"));
    redacted.to_string()
}
