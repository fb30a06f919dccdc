use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use super::{NetworkBridge, Request};
use crate::core::Config;
use crate::error::{ConfigError, TransportError};

/// Fetches per-tool credentials from the host site.
///
/// The host renders the key of an external tool inside a disclaimer page;
/// the fetcher requests that page and extracts the key with a pattern whose
/// first capture group is the credential.
#[derive(Clone)]
pub struct ApiKeyFetcher {
    bridge: Arc<dyn NetworkBridge>,
    path: String,
    pattern: Regex,
}

impl ApiKeyFetcher {
    /// Builds a fetcher from the credential settings of `cfg`.
    pub fn new(bridge: Arc<dyn NetworkBridge>, cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            bridge,
            path: cfg.credential_path.clone(),
            pattern: cfg.credential_regex()?,
        })
    }

    /// Requests the key of `directory_id`.
    ///
    /// `Ok(None)` means the page was served but held no key.
    pub async fn try_fetch(&self, directory_id: &str) -> Result<Option<String>, TransportError> {
        let path = self.path.replace("{id}", directory_id);
        let response = self.bridge.request(Request::get(path)).await?;
        Ok(self
            .pattern
            .captures(&response.body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()))
    }

    /// Requests the key of `directory_id`, folding every failure into
    /// `None`.
    pub async fn fetch(&self, directory_id: &str) -> Option<String> {
        match self.try_fetch(directory_id).await {
            Ok(Some(key)) => {
                debug!(directory_id, "credential fetched");
                Some(key)
            }
            Ok(None) => {
                debug!(directory_id, "no credential on page");
                None
            }
            Err(e) => {
                warn!(directory_id, error = %e, label = e.as_label(), "credential fetch failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ApiKeyFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyFetcher")
            .field("path", &self.path)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Method, Response};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const KEY: &str = "0123456789abcdef0123456789abcdef012345";

    struct Scripted {
        reply: Result<Response, TransportError>,
        seen: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl NetworkBridge for Scripted {
        async fn request(&self, request: Request) -> Result<Response, TransportError> {
            self.seen.lock().push(request);
            self.reply.clone()
        }
    }

    fn fetcher(reply: Result<Response, TransportError>) -> (Arc<Scripted>, ApiKeyFetcher) {
        let bridge = Arc::new(Scripted {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let fetcher = ApiKeyFetcher::new(bridge.clone(), &Config::default()).unwrap();
        (bridge, fetcher)
    }

    #[tokio::test]
    async fn extracts_key_from_disclaimer() {
        let page = format!(r#"<form><input type="hidden" name="key" value="{KEY}"/></form>"#);
        let (bridge, fetcher) = fetcher(Ok(Response::new(page)));

        assert_eq!(fetcher.fetch("12").await.as_deref(), Some(KEY));

        let seen = bridge.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(seen[0].path, "/disclaimer?id=12");
    }

    #[tokio::test]
    async fn page_without_key_yields_none() {
        let (_, fetcher) = fetcher(Ok(Response::new("<p>log in first</p>")));
        assert_eq!(fetcher.try_fetch("12").await, Ok(None));
        assert_eq!(fetcher.fetch("12").await, None);
    }

    #[tokio::test]
    async fn transport_failure_yields_none() {
        let (_, fetcher) = fetcher(Err(TransportError::Failed {
            method: "GET".into(),
            path: "/disclaimer?id=12".into(),
            reason: "status 500".into(),
        }));
        assert_eq!(fetcher.fetch("12").await, None);
    }
}
