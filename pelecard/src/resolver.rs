//! Per-tenant credential resolution.
//!
//! [`CredentialsResolver::resolve`] tries, in order:
//!
//! 1. the credential cache (when enabled in [`CacheConfig`](crate::config::CacheConfig))
//! 2. a user-supplied [`CredentialsCallback`]
//! 3. the tenant's own credentials ([`Tenant::owned_credentials`]), active only
//! 4. a [`CredentialStore`] lookup by tenant type and id, active only
//! 5. the global credentials from [`PelecardConfig`]
//!
//! Steps 2 to 4 populate the cache. Global credentials are never cached.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::PelecardConfig;
use crate::credentials::Credentials;
use crate::error::{BoxError, PelecardError};

/// An entity that may own gateway credentials (a team, a merchant, a user).
#[async_trait]
pub trait Tenant: Send + Sync {
    /// Fully qualified type name of the tenant, used in cache keys and store lookups.
    fn tenant_type(&self) -> &str;

    /// Primary key of the tenant.
    fn tenant_id(&self) -> String;

    /// Credentials associated directly with the tenant, if any.
    ///
    /// Inactive credentials returned here are ignored.
    async fn owned_credentials(&self) -> Result<Option<Credentials>, BoxError> {
        Ok(None)
    }
}

/// Persistent credential storage keyed by owner.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active credentials owned by `(tenant_type, tenant_id)`.
    async fn find_active(
        &self,
        tenant_type: &str,
        tenant_id: &str,
    ) -> Result<Option<Credentials>, BoxError>;
}

/// Custom resolution hook, consulted before any other source.
///
/// Plain closures `Fn(&dyn Tenant) -> Option<Credentials>` implement this trait.
#[async_trait]
pub trait CredentialsCallback: Send + Sync {
    /// Credentials for `tenant`, or `None` to fall through.
    async fn resolve(&self, tenant: &dyn Tenant) -> Result<Option<Credentials>, BoxError>;
}

#[async_trait]
impl<F> CredentialsCallback for F
where
    F: Fn(&dyn Tenant) -> Option<Credentials> + Send + Sync,
{
    async fn resolve(&self, tenant: &dyn Tenant) -> Result<Option<Credentials>, BoxError> {
        Ok(self(tenant))
    }
}

/// Key-value cache holding resolved credentials.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Returns the entry for `key` unless absent or expired.
    async fn get(&self, key: &str) -> Option<Credentials>;

    /// Stores `credentials` under `key` for `ttl`.
    async fn put(&self, key: &str, credentials: Credentials, ttl: Duration);

    /// Removes the entry for `key`.
    async fn forget(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    credentials: Credentials,
    /// `None` when the TTL overflows the clock.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process TTL cache.
#[derive(Debug, Default)]
pub struct MemoryCredentialCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCredentialCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries. Expired entries count until a lookup prunes them.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn get(&self, key: &str) -> Option<Credentials> {
        let now = Instant::now();
        {
            let guard = self.entries.read().await;
            let entry = guard.get(key)?;
            if entry.is_live(now) {
                return Some(entry.credentials.clone());
            }
        }

        let mut guard = self.entries.write().await;
        if guard.get(key).is_some_and(|entry| !entry.is_live(now)) {
            guard.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, credentials: Credentials, ttl: Duration) {
        let mut guard = self.entries.write().await;
        guard.insert(
            key.to_owned(),
            CacheEntry {
                credentials,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    async fn forget(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Resolves gateway credentials for tenants.
#[derive(Clone)]
pub struct CredentialsResolver {
    config: Arc<PelecardConfig>,
    cache: Arc<dyn CredentialCache>,
    callback: Option<Arc<dyn CredentialsCallback>>,
    store: Option<Arc<dyn CredentialStore>>,
}

impl Debug for CredentialsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsResolver")
            .field("cache_enabled", &self.config.cache.enabled)
            .field("callback", &self.callback.is_some())
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialsResolver {
    /// Creates a resolver backed by an in-memory cache.
    #[must_use]
    pub fn new(config: impl Into<Arc<PelecardConfig>>) -> Self {
        Self {
            config: config.into(),
            cache: Arc::new(MemoryCredentialCache::new()),
            callback: None,
            store: None,
        }
    }

    /// Replaces the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the custom resolution hook.
    #[must_use]
    pub fn with_callback(mut self, callback: impl CredentialsCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Sets the credential store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The configuration this resolver falls back to.
    #[must_use]
    pub fn config(&self) -> &PelecardConfig {
        &self.config
    }

    /// Resolves credentials for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::CredentialLookup`] if the callback, the tenant
    /// or the store fails, and [`PelecardError::Authentication`] if nothing
    /// matches and no global credentials are configured.
    pub async fn resolve(&self, tenant: &dyn Tenant) -> Result<Credentials, PelecardError> {
        let key = self.cache_key(tenant);

        if self.config.cache.enabled
            && let Some(credentials) = self.cache.get(&key).await
        {
            #[cfg(feature = "telemetry")]
            tracing::debug!(cache_key = %key, "pelecard.resolver.cache_hit");
            return Ok(credentials);
        }

        if let Some(callback) = &self.callback
            && let Some(credentials) = callback
                .resolve(tenant)
                .await
                .map_err(PelecardError::CredentialLookup)?
        {
            self.remember(&key, &credentials).await;
            return Ok(credentials);
        }

        if let Some(credentials) = tenant
            .owned_credentials()
            .await
            .map_err(PelecardError::CredentialLookup)?
            .filter(Credentials::is_active)
        {
            self.remember(&key, &credentials).await;
            return Ok(credentials);
        }

        if let Some(store) = &self.store
            && let Some(credentials) = store
                .find_active(tenant.tenant_type(), &tenant.tenant_id())
                .await
                .map_err(PelecardError::CredentialLookup)?
                .filter(Credentials::is_active)
        {
            self.remember(&key, &credentials).await;
            return Ok(credentials);
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(
            tenant_type = tenant.tenant_type(),
            "pelecard.resolver.config_fallback"
        );
        self.resolve_from_config()
    }

    /// The global credentials from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PelecardError::Authentication`] if any part is missing.
    pub fn resolve_from_config(&self) -> Result<Credentials, PelecardError> {
        Ok(self.config.credentials()?)
    }

    /// Forgets the cached entry of `tenant`.
    pub async fn clear_cache(&self, tenant: &dyn Tenant) {
        self.cache.forget(&self.cache_key(tenant)).await;
    }

    /// Cache key of `tenant`: `<prefix>_credentials_<type>_<id>`, with `::`
    /// and `\` in the type replaced by `_`.
    #[must_use]
    pub fn cache_key(&self, tenant: &dyn Tenant) -> String {
        let kind = tenant.tenant_type().replace("::", "_").replace('\\', "_");
        format!(
            "{}_credentials_{}_{}",
            self.config.cache.prefix,
            kind,
            tenant.tenant_id()
        )
    }

    async fn remember(&self, key: &str, credentials: &Credentials) {
        if !self.config.cache.enabled {
            return;
        }
        self.cache
            .put(key, credentials.clone(), self.config.cache.ttl())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Environment;
    use crate::error::AuthenticationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Team {
        id: u64,
        credentials: Option<Credentials>,
        lookups: AtomicUsize,
    }

    impl Team {
        fn new(id: u64, credentials: Option<Credentials>) -> Self {
            Self {
                id,
                credentials,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Tenant for Team {
        fn tenant_type(&self) -> &str {
            "app::models::Team"
        }

        fn tenant_id(&self) -> String {
            self.id.to_string()
        }

        async fn owned_credentials(&self) -> Result<Option<Credentials>, BoxError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.credentials.clone())
        }
    }

    struct Anonymous;

    #[async_trait]
    impl Tenant for Anonymous {
        fn tenant_type(&self) -> &str {
            "App\\Models\\Guest"
        }

        fn tenant_id(&self) -> String {
            "7".to_owned()
        }
    }

    struct Store(Vec<(String, String, Credentials)>);

    #[async_trait]
    impl CredentialStore for Store {
        async fn find_active(
            &self,
            tenant_type: &str,
            tenant_id: &str,
        ) -> Result<Option<Credentials>, BoxError> {
            Ok(self
                .0
                .iter()
                .find(|(t, id, c)| t == tenant_type && id == tenant_id && c.is_active())
                .map(|(_, _, c)| c.clone()))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn find_active(&self, _: &str, _: &str) -> Result<Option<Credentials>, BoxError> {
            Err("database unavailable".into())
        }
    }

    fn config_with_globals() -> PelecardConfig {
        PelecardConfig {
            terminal: Some("global".to_owned()),
            user: Some("global-user".to_owned()),
            password: Some("global-pass".to_owned()),
            ..PelecardConfig::default()
        }
    }

    fn creds(terminal: &str) -> Credentials {
        Credentials::new(terminal, "user", "pass", Environment::Sandbox)
    }

    #[tokio::test]
    async fn test_owned_credentials_are_cached() {
        let resolver = CredentialsResolver::new(config_with_globals());
        let team = Team::new(1, Some(creds("team-1")));

        let first = resolver.resolve(&team).await.unwrap();
        let second = resolver.resolve(&team).await.unwrap();
        assert_eq!(first.terminal(), "team-1");
        assert_eq!(second.terminal(), "team-1");
        assert_eq!(team.lookups.load(Ordering::SeqCst), 1);

        resolver.clear_cache(&team).await;
        resolver.resolve(&team).await.unwrap();
        assert_eq!(team.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inactive_owned_credentials_fall_through() {
        let resolver = CredentialsResolver::new(config_with_globals());
        let team = Team::new(2, Some(creds("team-2").with_active(false)));
        let resolved = resolver.resolve(&team).await.unwrap();
        assert_eq!(resolved.terminal(), "global");
    }

    #[tokio::test]
    async fn test_callback_takes_precedence() {
        let resolver =
            CredentialsResolver::new(config_with_globals()).with_callback(|tenant: &dyn Tenant| {
                Some(creds(&format!("cb-{}", tenant.tenant_id())))
            });
        let team = Team::new(3, Some(creds("team-3")));
        let resolved = resolver.resolve(&team).await.unwrap();
        assert_eq!(resolved.terminal(), "cb-3");
        assert_eq!(team.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_returning_none_falls_through() {
        let resolver = CredentialsResolver::new(config_with_globals())
            .with_callback(|_: &dyn Tenant| None);
        let team = Team::new(4, Some(creds("team-4")));
        assert_eq!(resolver.resolve(&team).await.unwrap().terminal(), "team-4");
    }

    #[tokio::test]
    async fn test_store_lookup() {
        let store = Store(vec![
            ("App\\Models\\Guest".to_owned(), "7".to_owned(), creds("old").with_active(false)),
            ("App\\Models\\Guest".to_owned(), "7".to_owned(), creds("stored")),
        ]);
        let resolver =
            CredentialsResolver::new(config_with_globals()).with_store(Arc::new(store));
        assert_eq!(resolver.resolve(&Anonymous).await.unwrap().terminal(), "stored");
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let resolver =
            CredentialsResolver::new(config_with_globals()).with_store(Arc::new(FailingStore));
        let err = resolver.resolve(&Anonymous).await.unwrap_err();
        assert!(matches!(err, PelecardError::CredentialLookup(_)));
    }

    #[tokio::test]
    async fn test_config_fallback_is_not_cached() {
        let cache = Arc::new(MemoryCredentialCache::new());
        let shared: Arc<dyn CredentialCache> = Arc::<MemoryCredentialCache>::clone(&cache);
        let resolver = CredentialsResolver::new(config_with_globals()).with_cache(shared);
        let resolved = resolver.resolve(&Anonymous).await.unwrap();
        assert_eq!(resolved.terminal(), "global");
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let mut config = config_with_globals();
        config.cache.ttl = u64::MAX;
        let resolver = CredentialsResolver::new(config);
        let team = Team::new(6, Some(creds("team-6")));

        assert_eq!(resolver.resolve(&team).await.unwrap().terminal(), "team-6");
        assert_eq!(resolver.resolve(&team).await.unwrap().terminal(), "team-6");
        assert_eq!(team.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let cache = MemoryCredentialCache::new();
        cache.put("short", creds("a"), Duration::ZERO).await;
        cache.put("long", creds("b"), Duration::from_secs(60)).await;
        assert_eq!(cache.len().await, 2);

        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("long").await.unwrap().terminal(), "b");
    }

    #[tokio::test]
    async fn test_missing_everything() {
        let resolver = CredentialsResolver::new(PelecardConfig::default());
        let err = resolver.resolve(&Anonymous).await.unwrap_err();
        assert!(matches!(
            err,
            PelecardError::Authentication(AuthenticationError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let mut config = config_with_globals();
        config.cache.enabled = false;
        let cache = Arc::new(MemoryCredentialCache::new());
        let shared: Arc<dyn CredentialCache> = Arc::<MemoryCredentialCache>::clone(&cache);
        let resolver = CredentialsResolver::new(config).with_cache(shared);
        let team = Team::new(5, Some(creds("team-5")));
        resolver.resolve(&team).await.unwrap();
        resolver.resolve(&team).await.unwrap();
        assert_eq!(team.lookups.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_key() {
        let resolver = CredentialsResolver::new(PelecardConfig::default());
        assert_eq!(
            resolver.cache_key(&Team::new(9, None)),
            "pelecard_credentials_app_models_Team_9"
        );
        assert_eq!(
            resolver.cache_key(&Anonymous),
            "pelecard_credentials_App_Models_Guest_7"
        );
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCredentialCache::new();
        cache
            .put("k", creds("short"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get("k").await.is_none());

        cache.put("k", creds("long"), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await.unwrap().terminal(), "long");
        cache.forget("k").await;
        assert!(cache.get("k").await.is_none());
    }
}
