//! Logo cache service with single-flight fetch coalescing

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, watch};
use tracing::{debug, trace, warn};

use super::entry::CacheEntry;
use crate::config::LogoCacheConfig;
use crate::context::OrganizationContext;
use crate::errors::LogoResult;
use crate::models::EncodedLogo;
use crate::utils::http_client::{LogoHttpClient, StandardHttpClient};
use crate::utils::url::UrlUtils;

/// What a lookup ultimately resolves to. `None` means "omit the logo" and
/// covers both "no logo configured" and every normalized failure.
type Resolved = Option<EncodedLogo>;

/// Published state of an in-flight fetch, observed over a watch channel
#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    Done(Resolved),
}

enum Flight {
    Owner(watch::Sender<FlightState>),
    Waiter(watch::Receiver<FlightState>),
}

enum Lookup {
    Fresh(Resolved),
    Stale(Resolved),
    Miss,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    refreshes: AtomicU64,
}

/// Point-in-time cache diagnostics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub refreshes: u64,
}

/// Fetch-and-cache service for organization logos.
///
/// Owns its cache explicitly (no ambient global state), so lifecycle and
/// teardown are controllable: drop the service and the cache is gone, or
/// call [`clear`](Self::clear) in tests.
///
/// The caller-facing operation is [`encoded_logo`](Self::encoded_logo): it
/// always resolves to a value, never an error. A `None` result means "omit
/// the logo"; the failure that produced it is logged, not raised, because a
/// missing logo must never block the document generation that asked for it.
pub struct LogoCacheService {
    config: LogoCacheConfig,
    http_client: Arc<dyn LogoHttpClient>,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    in_flight: Arc<RwLock<HashMap<String, watch::Receiver<FlightState>>>>,
    counters: CacheCounters,
}

impl LogoCacheService {
    /// Create a service with the default reqwest-backed HTTP client
    pub fn new(config: LogoCacheConfig) -> LogoResult<Self> {
        let http_client = Arc::new(StandardHttpClient::new(
            config.connect_timeout,
            &config.user_agent,
            config.max_body_bytes,
        )?);
        Self::with_http_client(config, http_client)
    }

    /// Create a service with a custom transport (tests, instrumented clients)
    pub fn with_http_client(
        config: LogoCacheConfig,
        http_client: Arc<dyn LogoHttpClient>,
    ) -> LogoResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(RwLock::new(HashMap::new())),
            counters: CacheCounters::default(),
        })
    }

    pub fn config(&self) -> &LogoCacheConfig {
        &self.config
    }

    /// Resolve a locator to an embeddable encoded logo.
    ///
    /// An absent locator completes immediately with `None` and performs no
    /// network activity. Otherwise the cache is consulted first; a fresh
    /// entry is served as-is, a stale entry triggers a refresh (falling back
    /// to the retained stale value if the refresh fails), and a miss fetches
    /// from the origin. Concurrent callers for the same locator share one
    /// fetch.
    pub async fn encoded_logo(&self, locator: Option<&str>) -> Option<EncodedLogo> {
        let url = locator?;

        let lookup = {
            let mut cache = self.cache.write().await;
            match cache.get_mut(url) {
                Some(entry) if entry.is_idle_expired(self.config.retention) => {
                    trace!(
                        "Evicting idle logo entry on access: {}",
                        UrlUtils::obfuscate_credentials(url)
                    );
                    cache.remove(url);
                    Lookup::Miss
                }
                Some(entry) => {
                    entry.touch();
                    if entry.is_fresh(self.config.freshness) {
                        Lookup::Fresh(entry.value.clone())
                    } else {
                        Lookup::Stale(entry.value.clone())
                    }
                }
                None => Lookup::Miss,
            }
        };

        let stale_fallback = match lookup {
            Lookup::Fresh(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Logo cache hit: {}", UrlUtils::obfuscate_credentials(url));
                return value;
            }
            Lookup::Stale(value) => {
                self.counters.refreshes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Logo entry stale, refreshing: {}",
                    UrlUtils::obfuscate_credentials(url)
                );
                value
            }
            Lookup::Miss => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        };

        self.fetch_coalesced(url, stale_fallback).await
    }

    /// Resolve the logo for the organization supplied by a context provider
    pub async fn encoded_logo_for<C: OrganizationContext + ?Sized>(
        &self,
        context: &C,
    ) -> Option<EncodedLogo> {
        self.encoded_logo(context.logo_url()).await
    }

    /// Join or start the single fetch for a locator.
    ///
    /// At most one retrieval per distinct locator is in flight at any time:
    /// the first caller becomes the owner and performs the fetch, later
    /// callers subscribe to its watch channel and receive the same resolved
    /// result.
    async fn fetch_coalesced(&self, url: &str, stale_fallback: Resolved) -> Resolved {
        let flight = {
            let mut in_flight = self.in_flight.write().await;
            match in_flight.get(url) {
                Some(rx) => Flight::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(FlightState::Pending);
                    in_flight.insert(url.to_string(), rx);
                    Flight::Owner(tx)
                }
            }
        };

        match flight {
            Flight::Waiter(mut rx) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                loop {
                    {
                        let state = rx.borrow_and_update();
                        if let FlightState::Done(value) = &*state {
                            return value.clone();
                        }
                    }
                    if rx.changed().await.is_err() {
                        warn!(
                            "In-flight logo fetch abandoned: {}",
                            UrlUtils::obfuscate_credentials(url)
                        );
                        return None;
                    }
                }
            }
            Flight::Owner(tx) => {
                let resolved = self.resolve(url, stale_fallback).await;
                // Cache is updated before the flight is retired, so a caller
                // arriving in between sees either the entry or the flight.
                self.in_flight.write().await.remove(url);
                let _ = tx.send(FlightState::Done(resolved.clone()));
                resolved
            }
        }
    }

    /// Fetch, encode and cache; normalize failures to `None`
    async fn resolve(&self, url: &str, stale_fallback: Resolved) -> Resolved {
        match self.fetch_encoded(url).await {
            Ok(logo) => {
                debug!(
                    "Cached logo: {} ({} bytes, {})",
                    UrlUtils::obfuscate_credentials(url),
                    logo.byte_len,
                    logo.mime_type
                );
                let mut cache = self.cache.write().await;
                cache.insert(url.to_string(), CacheEntry::new(Some(logo.clone())));
                Some(logo)
            }
            Err(e) => {
                warn!(
                    "Logo unavailable, omitting: {} ({})",
                    UrlUtils::obfuscate_credentials(url),
                    e
                );
                if let Some(stale) = stale_fallback {
                    debug!(
                        "Serving retained stale logo: {}",
                        UrlUtils::obfuscate_credentials(url)
                    );
                    return Some(stale);
                }
                // Record the resolved failure so a broken origin is retried
                // at freshness-window granularity, not on every request
                let mut cache = self.cache.write().await;
                cache.insert(url.to_string(), CacheEntry::new(None));
                None
            }
        }
    }

    async fn fetch_encoded(&self, url: &str) -> LogoResult<EncodedLogo> {
        UrlUtils::parse_and_validate(url)?;
        let fetched = self.http_client.fetch_image(url).await?;
        EncodedLogo::from_fetched(url, &fetched)
    }

    /// Point-in-time diagnostics
    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let fresh_entries = cache
            .values()
            .filter(|e| e.is_fresh(self.config.freshness))
            .count();

        CacheStats {
            entries: cache.len(),
            fresh_entries,
            stale_entries: cache.len() - fresh_entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            refreshes: self.counters.refreshes.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub(super) fn cache(&self) -> &Arc<RwLock<HashMap<String, CacheEntry>>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LogoError;
    use crate::utils::http_client::FetchedImage;
    use async_trait::async_trait;
    use image::{ImageBuffer, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn png_bytes() -> Vec<u8> {
        let img: RgbImage = ImageBuffer::new(1, 1);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("Failed to write PNG to memory");
        bytes
    }

    /// Scripted transport: counts fetches, optionally delays, optionally
    /// fails after being switched
    struct ScriptedClient {
        calls: AtomicUsize,
        delay: Duration,
        failing: std::sync::atomic::AtomicBool,
    }

    impl ScriptedClient {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                failing: std::sync::atomic::AtomicBool::new(false),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LogoHttpClient for ScriptedClient {
        async fn fetch_image(&self, url: &str) -> LogoResult<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(LogoError::fetch(503, url));
            }
            Ok(FetchedImage {
                bytes: png_bytes(),
                content_type: Some("image/png".to_string()),
            })
        }
    }

    fn service_with(
        client: Arc<ScriptedClient>,
        freshness: Duration,
        retention: Duration,
    ) -> LogoCacheService {
        let config = LogoCacheConfig {
            freshness,
            retention,
            ..Default::default()
        };
        LogoCacheService::with_http_client(config, client).unwrap()
    }

    #[tokio::test]
    async fn test_absent_locator_is_none_without_network() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        assert!(service.encoded_logo(None).await.is_none());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_refetch() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        let first = service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();
        let second = service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(first, second);

        let stats = service.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_failure_resolves_to_none_and_is_negative_cached() {
        let client = ScriptedClient::new();
        client.set_failing(true);
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        assert!(
            service
                .encoded_logo(Some("http://example.com/logo.png"))
                .await
                .is_none()
        );
        // Second request inside the freshness window does not hammer the
        // broken origin
        assert!(
            service
                .encoded_logo(Some("http://example.com/logo.png"))
                .await
                .is_none()
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_locator_resolves_to_none() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        assert!(service.encoded_logo(Some("not a url")).await.is_none());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_one_refresh() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_millis(50),
            Duration::from_secs(120),
        );

        service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(service.stats().await.refreshes, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_retained_stale_value() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_millis(50),
            Duration::from_secs(120),
        );

        let original = service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        client.set_failing(true);

        let fallback = service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(original, fallback);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let client = ScriptedClient::with_delay(Duration::from_millis(100));
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        let (a, b, c) = tokio::join!(
            service.encoded_logo(Some("http://example.com/logo.png")),
            service.encoded_logo(Some("http://example.com/logo.png")),
            service.encoded_logo(Some("http://example.com/logo.png")),
        );

        assert_eq!(client.call_count(), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.is_some());
        assert_eq!(service.stats().await.coalesced, 2);
    }

    #[tokio::test]
    async fn test_distinct_locators_do_not_coalesce() {
        let client = ScriptedClient::with_delay(Duration::from_millis(50));
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        let (a, b) = tokio::join!(
            service.encoded_logo(Some("http://example.com/a.png")),
            service.encoded_logo(Some("http://example.com/b.png")),
        );

        assert_eq!(client.call_count(), 2);
        assert!(a.is_some());
        assert!(b.is_some());
    }

    #[tokio::test]
    async fn test_idle_entry_evicted_on_access() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_millis(40),
            Duration::from_millis(80),
        );

        service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        // Entry idled out; this is a miss and a fresh fetch, not a refresh
        service
            .encoded_logo(Some("http://example.com/logo.png"))
            .await
            .unwrap();

        assert_eq!(client.call_count(), 2);
        let stats = service.stats().await;
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.refreshes, 0);
    }

    #[tokio::test]
    async fn test_context_provider_boundary() {
        let client = ScriptedClient::new();
        let service = service_with(
            client.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        let no_logo: Option<String> = None;
        assert!(service.encoded_logo_for(&no_logo).await.is_none());
        assert_eq!(client.call_count(), 0);

        let with_logo = Some("http://example.com/logo.png".to_string());
        assert!(service.encoded_logo_for(&with_logo).await.is_some());
        assert_eq!(client.call_count(), 1);
    }
}
