//! Per-tenant gateway credentials.
//!
//! [`ConfigResolver`] hands out `Arc<TenantConfig>` values. A value is never modified after it has been handed out: a
//! check-in or activation that rotates the terminal key builds a new value and swaps it into the cache, so any request
//! already holding the old value keeps signing with a consistent set of credentials.
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Local, Utc};
use dashmap::DashMap;
use log::*;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    db_types::{TenantConfig, TerminalCredentials},
    dpe_api::errors::OrderFlowError,
    gateway::GatewayApi,
    traits::TenantManagement,
};

pub const DEFAULT_CONFIG_CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Clone)]
struct CachedConfig {
    config: Arc<TenantConfig>,
    loaded_at: Instant,
}

pub struct ConfigResolver<B, G> {
    db: B,
    gateway: Arc<G>,
    ttl: Duration,
    default_config: Arc<RwLock<Arc<TenantConfig>>>,
    cache: Arc<DashMap<String, CachedConfig>>,
    sign_in_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<B: Clone, G> Clone for ConfigResolver<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: Arc::clone(&self.gateway),
            ttl: self.ttl,
            default_config: Arc::clone(&self.default_config),
            cache: Arc::clone(&self.cache),
            sign_in_locks: Arc::clone(&self.sign_in_locks),
        }
    }
}

impl<B, G> ConfigResolver<B, G> {
    /// `default_config` is used for requests that name no tenant, and whenever a named tenant cannot be loaded.
    pub fn new(db: B, gateway: Arc<G>, default_config: TenantConfig, ttl: Duration) -> Self {
        Self {
            db,
            gateway,
            ttl,
            default_config: Arc::new(RwLock::new(Arc::new(default_config))),
            cache: Arc::new(DashMap::new()),
            sign_in_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn default_config(&self) -> Arc<TenantConfig> {
        match self.default_config.read() {
            Ok(config) => Arc::clone(&config),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn is_default(&self, id: &str) -> bool {
        id.is_empty() || id == self.default_config().id
    }

    /// Evicts a tenant from the cache. The next `resolve` reloads it from the database.
    pub fn invalidate(&self, id: &str) {
        if self.cache.remove(id).is_some() {
            debug!("🪛️ Tenant config '{id}' evicted from the cache");
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, id: &str) -> Option<Arc<TenantConfig>> {
        let fresh = self.cache.get(id).map(|entry| (entry.loaded_at.elapsed() < self.ttl, Arc::clone(&entry.config)));
        match fresh {
            Some((true, config)) => Some(config),
            Some((false, _)) => {
                trace!("🪛️ Cached config for tenant '{id}' has expired");
                self.cache.remove(id);
                None
            },
            None => None,
        }
    }

    /// Replaces the stored value for `config.id`. This is the invalidation hook for credential rotation.
    fn store(&self, config: Arc<TenantConfig>) {
        if self.is_default(&config.id) {
            match self.default_config.write() {
                Ok(mut current) => *current = config,
                Err(poisoned) => *poisoned.into_inner() = config,
            }
        } else {
            self.cache.insert(config.id.clone(), CachedConfig { config, loaded_at: Instant::now() });
        }
    }
}

fn signed_in_today(at: Option<DateTime<Utc>>) -> bool {
    at.map(|t| t.with_timezone(&Local).date_naive() == Local::now().date_naive()).unwrap_or(false)
}

fn apply_credentials(config: &TenantConfig, credentials: &TerminalCredentials) -> TenantConfig {
    let mut updated = config.with_terminal_credentials(&credentials.terminal_sn, credentials.terminal_key.clone());
    if let Some(name) = &credentials.merchant_name {
        updated.merchant_name = name.clone();
    }
    if let Some(name) = &credentials.store_name {
        updated.store_name = name.clone();
    }
    updated
}

impl<B, G> ConfigResolver<B, G>
where
    B: TenantManagement + Clone + Send + Sync + 'static,
    G: GatewayApi,
{
    /// Returns the configuration for tenant `id`. This never fails: an empty id, an unknown tenant, or a database
    /// error all resolve to the default configuration.
    pub async fn resolve(&self, id: &str) -> Arc<TenantConfig> {
        if self.is_default(id) {
            return self.default_config();
        }
        if let Some(config) = self.cached(id) {
            return config;
        }
        match self.db.fetch_tenant_config(id).await {
            Ok(Some(config)) => {
                debug!("🪛️ Loaded tenant config '{id}' from the database");
                let config = Arc::new(config);
                self.store(Arc::clone(&config));
                config
            },
            Ok(None) => {
                warn!("🪛️ Tenant config '{id}' does not exist. Using the default configuration.");
                self.default_config()
            },
            Err(e) => {
                error!("🪛️ Could not load tenant config '{id}'. Using the default configuration. {e}");
                self.default_config()
            },
        }
    }

    /// Performs the gateway check-in at most once per tenant per calendar day.
    ///
    /// Returns the configuration to use from now on. If the check-in fails, the error is logged and `config` is
    /// returned as is, so that order creation is never blocked by a failed sign-in.
    pub async fn ensure_signed_in(&self, config: Arc<TenantConfig>) -> Arc<TenantConfig> {
        if signed_in_today(config.last_sign_in_at) {
            return config;
        }
        let lock = Arc::clone(self.sign_in_locks.entry(config.id.clone()).or_default().value());
        let _guard = lock.lock().await;
        // Someone else may have signed in while we were waiting
        let current = if self.is_default(&config.id) { Some(self.default_config()) } else { self.cached(&config.id) };
        if let Some(current) = current.filter(|c| signed_in_today(c.last_sign_in_at)) {
            trace!("🪛️ Tenant '{}' was signed in by a concurrent request", config.id);
            return current;
        }
        match self.gateway.check_in(&config).await {
            Ok(credentials) => {
                let now = Utc::now();
                let updated = Arc::new(apply_credentials(&config, &credentials).signed_in_at(now));
                if !self.is_default(&config.id) {
                    if let Err(e) = self.db.update_terminal_credentials(&config.id, &credentials, Some(now)).await {
                        warn!("🪛️ Signed in tenant '{}', but could not save the new credentials. {e}", config.id);
                    }
                }
                self.store(Arc::clone(&updated));
                info!("🪛️ Daily sign-in complete for tenant '{}'", config.id);
                updated
            },
            Err(e) => {
                warn!("🪛️ Daily sign-in failed for tenant '{}'. Continuing with the current credentials. {e}", config.id);
                config
            },
        }
    }

    /// Activates the tenant's terminal with a one-time code and stores the credentials the gateway returns.
    pub async fn activate(&self, id: &str, code: &str) -> Result<Arc<TenantConfig>, OrderFlowError> {
        let config = self.resolve(id).await;
        let credentials = self.gateway.activate(&config, code).await?;
        if !self.is_default(&config.id) {
            self.db.update_terminal_credentials(&config.id, &credentials, None).await?;
        }
        let updated = Arc::new(apply_credentials(&config, &credentials));
        self.store(Arc::clone(&updated));
        info!("🪛️ Terminal {} is now active for tenant '{}'", updated.terminal_sn, updated.id);
        Ok(updated)
    }
}
