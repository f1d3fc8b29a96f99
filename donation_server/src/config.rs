use std::{env, fmt::Display, str::FromStr, time::Duration};

use donation_engine::{db_types::TenantConfig, DEFAULT_CONFIG_CACHE_TTL};
use dpg_common::{parse_boolean_flag, Secret};
use log::*;

const DEFAULT_DPG_HOST: &str = "127.0.0.1";
const DEFAULT_DPG_PORT: u16 = 8360;
const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a donor waits for an order to be created before giving up.
pub const DEFAULT_DONATE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// The externally visible base URL of this server, used to build the gateway callback URLs. When empty, the
    /// request's scheme and `Host` header are used instead.
    pub public_base_url: String,
    /// PEM-encoded public key of the gateway, for checking the `Authorization` header on payment notifications. Without
    /// it, only the legacy embedded signature is accepted.
    pub gateway_public_key: Option<String>,
    /// The tenant configuration used when a request names no tenant, or one we don't know about.
    pub default_tenant: TenantConfig,
    pub config_cache_ttl: Duration,
    pub heartbeat_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub gateway_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DPG_HOST.to_string(),
            port: DEFAULT_DPG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            public_base_url: String::default(),
            gateway_public_key: None,
            default_tenant: TenantConfig::default(),
            config_cache_ttl: DEFAULT_CONFIG_CACHE_TTL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DPG_HOST").ok().unwrap_or_else(|| DEFAULT_DPG_HOST.into());
        let port = parse_env("DPG_PORT", DEFAULT_DPG_PORT);
        let database_url = env::var("DPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DPG_DATABASE_URL is not set. Please set it to the URL for the donation database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("DPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("DPG_USE_FORWARDED").ok(), false);
        let public_base_url =
            env::var("DPG_PUBLIC_BASE_URL").map(|s| s.trim_end_matches('/').to_string()).unwrap_or_default();
        if public_base_url.is_empty() {
            info!("🪛️ DPG_PUBLIC_BASE_URL is not set. Callback URLs will be built from the incoming request.");
        }
        let gateway_public_key = env::var("DPG_GATEWAY_PUBLIC_KEY").ok().filter(|s| !s.trim().is_empty());
        if gateway_public_key.is_none() {
            warn!(
                "🪛️ DPG_GATEWAY_PUBLIC_KEY is not set. Payment notifications will only be accepted with the embedded \
                 MD5 signature."
            );
        }
        let default_tenant = default_tenant_from_env();
        let config_cache_ttl = parse_seconds("DPG_CONFIG_CACHE_TTL", DEFAULT_CONFIG_CACHE_TTL);
        let heartbeat_timeout = parse_seconds("DPG_HEARTBEAT_TIMEOUT", DEFAULT_HEARTBEAT_TIMEOUT);
        let heartbeat_interval = parse_seconds("DPG_HEARTBEAT_INTERVAL", DEFAULT_HEARTBEAT_INTERVAL);
        let gateway_timeout = parse_seconds("DPG_GATEWAY_TIMEOUT", DEFAULT_GATEWAY_TIMEOUT);
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            public_base_url,
            gateway_public_key,
            default_tenant,
            config_cache_ttl,
            heartbeat_timeout,
            heartbeat_interval,
            gateway_timeout,
        }
    }
}

/// The default tenant has an empty id. It is never stored in the database.
fn default_tenant_from_env() -> TenantConfig {
    let var = |name: &str| env::var(name).unwrap_or_default();
    let config = TenantConfig {
        id: String::default(),
        vendor_sn: var("DPG_VENDOR_SN"),
        vendor_key: Secret::new(var("DPG_VENDOR_KEY")),
        app_id: var("DPG_APP_ID"),
        terminal_sn: var("DPG_TERMINAL_SN"),
        terminal_key: Secret::new(var("DPG_TERMINAL_KEY")),
        merchant_name: var("DPG_MERCHANT_NAME"),
        store_name: var("DPG_STORE_NAME"),
        device_id: var("DPG_DEVICE_ID"),
        api_url: var("DPG_GATEWAY_API_URL"),
        gateway_url: var("DPG_GATEWAY_URL"),
        is_active: true,
        last_sign_in_at: None,
    };
    if config.terminal_sn.is_empty() || config.terminal_key.reveal().is_empty() {
        warn!(
            "🪛️ The default terminal is not configured (DPG_TERMINAL_SN / DPG_TERMINAL_KEY). Donations for unknown \
             tenants will be refused until it is activated."
        );
    }
    if config.api_url.is_empty() {
        warn!("🪛️ DPG_GATEWAY_API_URL is not set. The default tenant cannot reach the gateway.");
    }
    config
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn parse_seconds(name: &str, default: Duration) -> Duration {
    let secs = parse_env(name, default.as_secs());
    if secs == 0 {
        warn!("🪛️ {name} cannot be zero. Using the default of {}s.", default.as_secs());
        return default;
    }
    Duration::from_secs(secs)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub public_base_url: String,
    pub donate_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            use_x_forwarded_for: false,
            use_forwarded: false,
            public_base_url: String::default(),
            donate_timeout: DEFAULT_DONATE_TIMEOUT,
        }
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            public_base_url: config.public_base_url.clone(),
            donate_timeout: DEFAULT_DONATE_TIMEOUT,
        }
    }
}
