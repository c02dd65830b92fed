use crate::adapter::{redact_url, Adapter};
use crate::connection::Connection;
use crate::error::{DataError, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

static GLOBAL_REGISTRY: OnceCell<AdapterRegistry> = OnceCell::new();

/// Ordered list of installed adapters.
///
/// Populated at startup and read-only afterwards; registration needs `&mut`,
/// so lookups can never race with it.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an adapter; earlier registrations win ties
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        let name = adapter.localized_name();
        if self
            .adapters
            .iter()
            .any(|existing| existing.localized_name() == name)
        {
            warn!("Registering a second adapter named: {}", name);
        }

        debug!(
            "Registered adapter {} for scheme: {}",
            name,
            adapter.primary_url_scheme()
        );
        self.adapters.push(adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapters in registration order
    pub fn adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Every adapter willing to handle `url`, in registration order
    pub fn candidates_for_url(&self, url: &Url) -> Vec<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .filter(|adapter| adapter.can_connect_to_url(url))
            .cloned()
            .collect()
    }

    /// Pick the adapter for `url`.
    ///
    /// Among the accepting adapters the first one whose primary scheme equals
    /// the URL scheme wins; otherwise the first-registered accepting adapter.
    pub fn adapter_for_url(&self, url: &Url) -> Option<Arc<dyn Adapter>> {
        let candidates = self.candidates_for_url(url);
        if candidates.len() > 1 {
            debug!(
                "{} adapters accept {}, applying tie-break",
                candidates.len(),
                redact_url(url)
            );
        }

        candidates
            .iter()
            .find(|adapter| adapter.primary_url_scheme() == url.scheme())
            .or_else(|| candidates.first())
            .cloned()
    }

    /// Resolve the adapter for `url` and run its handshake
    pub async fn connect(&self, url: &Url) -> Result<Arc<dyn Connection>> {
        let adapter = self
            .adapter_for_url(url)
            .ok_or_else(|| DataError::NoAdapter(redact_url(url)))?;

        debug!(
            "Connecting to {} with adapter: {}",
            redact_url(url),
            adapter.localized_name()
        );

        adapter.connect_to_url(url).await
    }

    /// Parse `url` and connect
    pub async fn connect_str(&self, url: &str) -> Result<Arc<dyn Connection>> {
        let url = Url::parse(url)?;
        self.connect(&url).await
    }

    /// Like [`connect`](Self::connect) but gives up after `timeout`
    pub async fn connect_with_timeout(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<Arc<dyn Connection>> {
        match tokio::time::timeout(timeout, self.connect(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Connection to {} timed out", redact_url(url));
                Err(DataError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// (name, primary scheme) pairs in registration order
    pub fn list_backends(&self) -> Vec<(String, String)> {
        self.adapters
            .iter()
            .map(|a| {
                (
                    a.localized_name().to_string(),
                    a.primary_url_scheme().to_string(),
                )
            })
            .collect()
    }
}

/// Install the process-wide registry; only the first call succeeds
pub fn install_global(registry: AdapterRegistry) -> Result<&'static AdapterRegistry> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| DataError::invalid_state("adapter registry already installed"))?;
    GLOBAL_REGISTRY
        .get()
        .ok_or_else(|| DataError::internal("adapter registry missing after install"))
}

/// The process-wide registry, if one has been installed
pub fn global() -> Option<&'static AdapterRegistry> {
    GLOBAL_REGISTRY.get()
}
