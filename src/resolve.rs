use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::fetch::{Deadline, FetchError};

/// URL fragment identifying links that must be followed to find the real
/// article. Google News feeds wrap every article URL this way.
const REDIRECT_MARKER: &str = "news.google.com/rss/articles/";

/// Default capacity for the redirect cache.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Returns true when the URL matches the known indirect-redirect pattern.
pub fn is_redirect_link(url: &str) -> bool {
    url.contains(REDIRECT_MARKER)
}

/// Process-lifetime memo of resolved redirect URLs.
///
/// Bounded LRU rather than an ever-growing map: entries are idempotent
/// (the same redirect URL always resolves to the same destination), so
/// evicting a hot entry costs at most one extra outbound call. Shared
/// across concurrent resolutions; a lost update on racing inserts is
/// harmless for the same reason.
pub struct RedirectCache {
    entries: Mutex<LruCache<String, String>>,
}

impl RedirectCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        RedirectCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, url: &str) -> Option<String> {
        self.lock().get(url).cloned()
    }

    pub fn insert(&self, url: String, resolved: String) {
        self.lock().put(url, resolved);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, String>> {
        // A poisoned lock only means another resolution panicked mid-insert;
        // the cache itself stays usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RedirectCache {
    fn default() -> Self {
        RedirectCache::new(
            NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        )
    }
}

/// Resolves an indirect redirect link to its final destination URL.
///
/// A no-op for URLs that don't match the redirect pattern. Matching URLs
/// hit the cache first; a miss performs one timed GET that follows
/// redirects without reading the body, and the final observed URL is
/// memoized. On any failure the original URL is returned unchanged and
/// the cache is left cold so a later invocation may retry.
pub async fn resolve_link(
    client: &reqwest::Client,
    cache: &RedirectCache,
    url: &str,
    deadline: Deadline,
) -> String {
    if url.is_empty() || !is_redirect_link(url) {
        return url.to_string();
    }

    if let Some(resolved) = cache.get(url) {
        return resolved;
    }

    match final_location(client, url, deadline).await {
        Ok(resolved) => {
            cache.insert(url.to_string(), resolved.clone());
            resolved
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Redirect resolution failed, keeping original link");
            url.to_string()
        }
    }
}

/// Follows redirects and reports the final URL. The status code is
/// irrelevant here (whatever URL the chain lands on is the answer) and
/// the body is never read.
async fn final_location(
    client: &reqwest::Client,
    url: &str,
    deadline: Deadline,
) -> Result<String, FetchError> {
    let response = tokio::time::timeout(deadline.duration(), client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    Ok(response.url().as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn redirect_url(server: &MockServer) -> String {
        // The marker is matched as a substring, so it can live in the path
        // of a local mock server.
        format!("{}/news.google.com/rss/articles/abc123", server.uri())
    }

    #[tokio::test]
    async fn test_non_matching_url_untouched() {
        let client = build_client().unwrap();
        let cache = RedirectCache::default();
        let resolved =
            resolve_link(&client, &cache, "http://example.com/story", Deadline::default()).await;
        assert_eq!(resolved, "http://example.com/story");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_resolves_to_final_destination() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news.google.com/rss/articles/abc123"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/article/final"),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/article/final"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let cache = RedirectCache::default();
        let resolved =
            resolve_link(&client, &cache, &redirect_url(&mock_server), Deadline::default()).await;
        assert_eq!(resolved, format!("{}/article/final", mock_server.uri()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_second_resolution_hits_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news.google.com/rss/articles/abc123"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/article/final"),
            )
            .expect(1) // the second call must not reach the network
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/article/final"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let cache = RedirectCache::default();
        let url = redirect_url(&mock_server);

        let first = resolve_link(&client, &cache, &url, Deadline::default()).await;
        let second = resolve_link(&client, &cache, &url, Deadline::default()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failure_keeps_original_and_cache_cold() {
        // Unreachable port: connection refused
        let url = "http://127.0.0.1:1/news.google.com/rss/articles/broken";
        let client = build_client().unwrap();
        let cache = RedirectCache::default();

        let resolved = resolve_link(&client, &cache, url, Deadline::default()).await;
        assert_eq!(resolved, url);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_keeps_original() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let cache = RedirectCache::default();
        let url = redirect_url(&mock_server);

        let resolved = resolve_link(&client, &cache, &url, Deadline::from_millis(100)).await;
        assert_eq!(resolved, url);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_is_redirect_link() {
        assert!(is_redirect_link(
            "https://news.google.com/rss/articles/CBMiK2h0dHA"
        ));
        assert!(!is_redirect_link("https://news.google.com/rss/search?q=x"));
        assert!(!is_redirect_link("https://example.com/article"));
        assert!(!is_redirect_link(""));
    }
}
