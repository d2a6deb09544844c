//! Terminal credentials and gateway environments.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AuthenticationError, ConfigError};

/// Default sandbox gateway base URL.
pub const SANDBOX_BASE_URL: &str = "https://gateway20.pelecard.biz/services";

/// Default production gateway base URL.
pub const PRODUCTION_BASE_URL: &str = "https://gateway21.pelecard.biz/services";

/// Gateway environment a terminal belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test gateway.
    #[default]
    Sandbox,
    /// Live gateway.
    Production,
}

impl Environment {
    /// Lowercase name as used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }

    /// Built-in base URL of this environment.
    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }

    /// Returns `true` for the sandbox gateway.
    #[must_use]
    pub const fn is_sandbox(&self) -> bool {
        matches!(self, Self::Sandbox)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "environment",
                value: s.to_owned(),
            }),
        }
    }
}

/// API credentials of a Pelecard terminal.
///
/// The password is held as a [`SecretString`] and is redacted from `Debug`
/// output.
#[derive(Debug, Clone)]
pub struct Credentials {
    terminal: String,
    user: String,
    password: SecretString,
    environment: Environment,
    is_active: bool,
}

impl Credentials {
    /// Creates active credentials for the given environment.
    #[must_use]
    pub fn new(
        terminal: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            terminal: terminal.into(),
            user: user.into(),
            password: SecretString::from(password.into()),
            environment,
            is_active: true,
        }
    }

    /// Marks the credentials active or inactive.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Moves the credentials to another environment.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Terminal number.
    #[must_use]
    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    /// API user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Plain-text password. Never log the returned value.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Environment the terminal belongs to.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Whether these credentials may be used.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Whether these credentials target the sandbox.
    #[must_use]
    pub const fn is_sandbox(&self) -> bool {
        self.environment.is_sandbox()
    }

    /// Whether these credentials target production.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        !self.environment.is_sandbox()
    }

    /// Fails if terminal, user or password is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::MissingCredentials`] when any part is empty.
    pub fn ensure_complete(&self) -> Result<(), AuthenticationError> {
        if self.terminal.is_empty() || self.user.is_empty() || self.password().is_empty() {
            return Err(AuthenticationError::MissingCredentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("0962210", "testpelecard", "hunter2", Environment::Sandbox);
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("0962210"));
        assert_eq!(creds.password(), "hunter2");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" sandbox ".parse::<Environment>().unwrap(), Environment::Sandbox);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_base_urls() {
        assert_eq!(Environment::Sandbox.default_base_url(), SANDBOX_BASE_URL);
        assert_eq!(Environment::Production.default_base_url(), PRODUCTION_BASE_URL);
    }

    #[test]
    fn test_ensure_complete() {
        let creds = Credentials::new("1", "u", "", Environment::Sandbox);
        assert_eq!(
            creds.ensure_complete(),
            Err(AuthenticationError::MissingCredentials)
        );
        let creds = Credentials::new("1", "u", "p", Environment::Production);
        assert!(creds.ensure_complete().is_ok());
        assert!(creds.is_production());
    }
}
