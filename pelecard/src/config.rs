//! SDK configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! terminal = "0962210"
//! user = "testpelecard"
//! password = "$PELECARD_SECRET"
//! environment = "sandbox"
//! currency = "ILS"
//!
//! [webhook]
//! path = "pelecard/webhook"
//!
//! [cache]
//! ttl = 600
//! ```
//!
//! # Environment Variables
//!
//! - `PELECARD_CONFIG`: path to the configuration file (default: `pelecard.toml`)
//! - `PELECARD_TERMINAL`, `PELECARD_USER`, `PELECARD_PASSWORD`, `PELECARD_ENV`
//! - `PELECARD_CURRENCY`, `PELECARD_LANGUAGE`, `PELECARD_MULTI_TENANT`
//! - `PELECARD_WEBHOOK_ENABLED`, `PELECARD_WEBHOOK_PATH`,
//!   `PELECARD_WEBHOOK_SIGNATURE_VALIDATION`
//! - `PELECARD_LOGGING_ENABLED`, `PELECARD_CACHE_ENABLED`, `PELECARD_CACHE_TTL`
//!
//! Environment values override the file.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::{Credentials, Environment, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
use crate::error::{AuthenticationError, ConfigError};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "pelecard.toml";

/// Top-level SDK configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PelecardConfig {
    /// Default terminal number.
    pub terminal: Option<String>,
    /// Default API user.
    pub user: Option<String>,
    /// Default API password.
    pub password: Option<String>,
    /// Gateway environment (default: `sandbox`).
    pub environment: Environment,
    /// Gateway base URLs per environment.
    pub gateway_urls: GatewayUrls,
    /// Default ISO 4217 currency (default: `ILS`).
    pub currency: String,
    /// Default response language, `he` or `en` (default: `he`).
    pub language: String,
    /// Resolve credentials per tenant.
    pub multi_tenant: bool,
    /// Column identifying the tenant in host records (default: `team_id`).
    pub tenant_column: String,
    /// Webhook listener settings.
    pub webhook: WebhookConfig,
    /// Request logging settings.
    pub logging: LoggingConfig,
    /// Credential cache settings.
    pub cache: CacheConfig,
    /// Bind address of the webhook listener.
    pub server: ServerConfig,
}

/// Base URLs of the two gateway environments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayUrls {
    /// Sandbox base URL.
    pub sandbox: String,
    /// Production base URL.
    pub production: String,
}

/// Webhook settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Mount the webhook route (default: `true`).
    pub enabled: bool,
    /// Route path, without leading slash (default: `pelecard/webhook`).
    pub path: String,
    /// Check webhook signatures (default: `true`).
    pub signature_validation: bool,
}

/// Request logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log sanitized request payloads at debug level (default: `false`).
    pub enabled: bool,
}

/// Credential cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache resolved credentials (default: `true`).
    pub enabled: bool,
    /// Entry lifetime in seconds (default: `3600`).
    pub ttl: u64,
    /// Cache key prefix (default: `pelecard`).
    pub prefix: String,
}

/// Listener bind address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Port (default: `8080`).
    pub port: u16,
}

impl Default for PelecardConfig {
    fn default() -> Self {
        Self {
            terminal: None,
            user: None,
            password: None,
            environment: Environment::default(),
            gateway_urls: GatewayUrls::default(),
            currency: "ILS".to_owned(),
            language: "he".to_owned(),
            multi_tenant: false,
            tenant_column: "team_id".to_owned(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for GatewayUrls {
    fn default() -> Self {
        Self {
            sandbox: SANDBOX_BASE_URL.to_owned(),
            production: PRODUCTION_BASE_URL.to_owned(),
        }
    }
}

impl GatewayUrls {
    /// Base URL of `environment`.
    #[must_use]
    pub fn get(&self, environment: Environment) -> &str {
        match environment {
            Environment::Sandbox => &self.sandbox,
            Environment::Production => &self.production,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "pelecard/webhook".to_owned(),
            signature_validation: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 3600,
            prefix: "pelecard".to_owned(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl fmt::Debug for PelecardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PelecardConfig")
            .field("terminal", &self.terminal)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("gateway_urls", &self.gateway_urls)
            .field("currency", &self.currency)
            .field("language", &self.language)
            .field("multi_tenant", &self.multi_tenant)
            .field("tenant_column", &self.tenant_column)
            .field("webhook", &self.webhook)
            .field("logging", &self.logging)
            .field("cache", &self.cache)
            .field("server", &self.server)
            .finish()
    }
}

impl PelecardConfig {
    /// Loads configuration from the path given by the `PELECARD_CONFIG`
    /// environment variable, falling back to `pelecard.toml` in the current
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// environment override holds an invalid value.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("PELECARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path, then applies
    /// environment overrides. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };

        let mut config = Self::from_toml_str(&content, |name| std::env::var(name).ok())?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parses TOML after expanding `$VAR` references through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }

    /// Applies `PELECARD_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparsable value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PELECARD_TERMINAL") {
            self.terminal = Some(v);
        }
        if let Some(v) = lookup("PELECARD_USER") {
            self.user = Some(v);
        }
        if let Some(v) = lookup("PELECARD_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("PELECARD_ENV") {
            self.environment = v.parse()?;
        }
        if let Some(v) = lookup("PELECARD_CURRENCY") {
            self.currency = v;
        }
        if let Some(v) = lookup("PELECARD_LANGUAGE") {
            self.language = v;
        }
        if let Some(v) = lookup("PELECARD_TENANT_COLUMN") {
            self.tenant_column = v;
        }
        if let Some(v) = lookup("PELECARD_MULTI_TENANT") {
            self.multi_tenant = parse_bool("PELECARD_MULTI_TENANT", &v)?;
        }
        if let Some(v) = lookup("PELECARD_WEBHOOK_ENABLED") {
            self.webhook.enabled = parse_bool("PELECARD_WEBHOOK_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PELECARD_WEBHOOK_PATH") {
            self.webhook.path = v;
        }
        if let Some(v) = lookup("PELECARD_WEBHOOK_SIGNATURE_VALIDATION") {
            self.webhook.signature_validation =
                parse_bool("PELECARD_WEBHOOK_SIGNATURE_VALIDATION", &v)?;
        }
        if let Some(v) = lookup("PELECARD_LOGGING_ENABLED") {
            self.logging.enabled = parse_bool("PELECARD_LOGGING_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PELECARD_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("PELECARD_CACHE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PELECARD_CACHE_TTL") {
            self.cache.ttl = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PELECARD_CACHE_TTL",
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    /// Base URL of the configured environment.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.gateway_urls.get(self.environment)
    }

    /// The global credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::MissingCredentials`] if terminal, user
    /// or password is unset or empty.
    pub fn credentials(&self) -> Result<Credentials, AuthenticationError> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.is_empty())
        }

        match (
            non_empty(self.terminal.as_deref()),
            non_empty(self.user.as_deref()),
            non_empty(self.password.as_deref()),
        ) {
            (Some(terminal), Some(user), Some(password)) => {
                Ok(Credentials::new(terminal, user, password, self.environment))
            }
            _ => Err(AuthenticationError::MissingCredentials),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "(true)" | "yes" | "on" => Ok(true),
        "0" | "false" | "(false)" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
        }),
    }
}

/// Expands `$VAR` and `${VAR}` patterns through `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_env_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match (var_name.is_empty(), lookup(&var_name)) {
            (false, Some(val)) => result.push_str(&val),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&var_name);
                if braced && !var_name.is_empty() {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PelecardConfig::from_toml_str("", env(&[])).unwrap();
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.currency, "ILS");
        assert_eq!(config.language, "he");
        assert_eq!(config.tenant_column, "team_id");
        assert!(!config.multi_tenant);
        assert!(config.webhook.enabled);
        assert_eq!(config.webhook.path, "pelecard/webhook");
        assert!(!config.logging.enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache.prefix, "pelecard");
        assert_eq!(config.base_url(), SANDBOX_BASE_URL);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_toml_with_expansion() {
        let toml = r#"
            terminal = "0962210"
            user = "testpelecard"
            password = "${SECRET}"
            environment = "production"

            [gateway_urls]
            production = "$GATEWAY"

            [cache]
            ttl = 60
        "#;
        let config = PelecardConfig::from_toml_str(
            toml,
            env(&[("SECRET", "s3cr3t"), ("GATEWAY", "http://localhost:9000")]),
        )
        .unwrap();
        assert_eq!(config.password.as_deref(), Some("s3cr3t"));
        assert_eq!(config.base_url(), "http://localhost:9000");
        assert_eq!(config.gateway_urls.sandbox, SANDBOX_BASE_URL);
        assert_eq!(config.cache.ttl, 60);
        assert!(config.cache.enabled);

        let creds = config.credentials().unwrap();
        assert_eq!(creds.terminal(), "0962210");
        assert!(creds.is_production());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PelecardConfig::default();
        config
            .apply_overrides(env(&[
                ("PELECARD_TERMINAL", "123"),
                ("PELECARD_USER", "u"),
                ("PELECARD_PASSWORD", "p"),
                ("PELECARD_ENV", "PRODUCTION"),
                ("PELECARD_MULTI_TENANT", "true"),
                ("PELECARD_CACHE_ENABLED", "0"),
                ("PELECARD_CACHE_TTL", "120"),
                ("PELECARD_WEBHOOK_PATH", "hooks/pelecard"),
            ]))
            .unwrap();
        assert_eq!(config.terminal.as_deref(), Some("123"));
        assert_eq!(config.environment, Environment::Production);
        assert!(config.multi_tenant);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, 120);
        assert_eq!(config.webhook.path, "hooks/pelecard");
    }

    #[test]
    fn test_invalid_override() {
        let mut config = PelecardConfig::default();
        let err = config
            .apply_overrides(env(&[("PELECARD_CACHE_TTL", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "PELECARD_CACHE_TTL",
                ..
            }
        ));
        assert!(
            config
                .apply_overrides(env(&[("PELECARD_ENV", "staging")]))
                .is_err()
        );
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = PelecardConfig::default();
        assert_eq!(
            config.credentials().unwrap_err(),
            AuthenticationError::MissingCredentials
        );
        config.terminal = Some("1".to_owned());
        config.user = Some("u".to_owned());
        config.password = Some(String::new());
        assert!(config.credentials().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = PelecardConfig {
            password: Some("hunter2".to_owned()),
            ..PelecardConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_expand_env_vars() {
        let lookup = env(&[("A", "1")]);
        assert_eq!(expand_env_vars("x=$A", &lookup), "x=1");
        assert_eq!(expand_env_vars("x=${A}y", &lookup), "x=1y");
        assert_eq!(expand_env_vars("x=$B", &lookup), "x=$B");
        assert_eq!(expand_env_vars("x=${B}", &lookup), "x=${B}");
        assert_eq!(expand_env_vars("cost $ 5", &lookup), "cost $ 5");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = PelecardConfig::load_from("/nonexistent/pelecard.toml").unwrap();
        assert_eq!(config.cache.prefix, "pelecard");
    }
}
