//! Configuration with validation at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use blog_core::validation::domain;
use blog_core::{FieldValue, DEFAULT_IDENTITY_KEY};
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use crate::aggregate::DEFAULT_MAX_FAN_OUT;
use crate::server::{ServerMode, TransportConfig};

/// Minimum required JWT secret length for security (256 bits).
const MIN_JWT_SECRET_LEN: usize = 32;

/// Blog API server configuration.
///
/// All values can be set via environment variables or CLI arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "blog-apiserver", about = "Blog gRPC service with an HTTP/JSON gateway")]
pub struct Config {
    /// Listeners to run: `grpc` or `grpc-gateway`
    #[arg(long, env = "SERVER_MODE", value_enum, default_value = "grpc-gateway")]
    pub server_mode: ServerMode,

    /// gRPC listen address
    #[arg(long, env = "GRPC_ADDRESS", default_value = "0.0.0.0:6666")]
    pub grpc_address: String,

    /// HTTP gateway listen address
    #[arg(long, env = "HTTP_ADDRESS", default_value = "0.0.0.0:5555")]
    pub http_address: String,

    /// JWT secret key for signing tokens (min 32 chars)
    #[arg(long, env = "JWT_SECRET_KEY")]
    pub jwt_secret_key: SecretString,

    /// JWT claim carrying the user id
    #[arg(long, env = "JWT_IDENTITY_KEY", default_value = DEFAULT_IDENTITY_KEY)]
    pub jwt_identity_key: String,

    /// Token lifetime in minutes
    #[arg(long, env = "JWT_EXPIRATION_MINUTES", default_value = "120")]
    pub jwt_expiration_minutes: u64,

    /// CSV policy file seeding the policy table (casbin `p`/`g` rows)
    #[arg(long, env = "POLICY_FILE")]
    pub policy_file: Option<PathBuf>,

    /// Policy reload period in seconds; 0 keeps the startup policy
    #[arg(long, env = "POLICY_RELOAD_SECS", default_value = "5")]
    pub policy_reload_secs: u64,

    /// Graceful shutdown deadline in seconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value = "10")]
    pub shutdown_timeout_secs: u64,

    /// HTTP gateway request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Max concurrent lookups when enriching list responses
    #[arg(long, env = "MAX_FAN_OUT", default_value_t = DEFAULT_MAX_FAN_OUT)]
    pub max_fan_out: usize,

    /// Extra methods exempt from authentication (comma-separated full names)
    #[arg(long, env = "WHITELIST_METHODS", value_delimiter = ',')]
    pub whitelist_methods: Vec<String>,

    /// Password of the bootstrap `root` account; no root account when unset
    #[arg(long, env = "ROOT_PASSWORD")]
    pub root_password: Option<SecretString>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Use JSON log format
    #[arg(long, env = "JSON_LOGS", default_value = "false")]
    pub json_logs: bool,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT secret must be at least {MIN_JWT_SECRET_LEN} characters")]
    JwtSecretTooShort,
    #[error("JWT identity key must not be empty")]
    EmptyIdentityKey,
    #[error("JWT expiration must be > 0")]
    InvalidExpiration,
    #[error("JWT expiration of {0} minutes is out of range")]
    ExpirationOutOfRange(u64),
    #[error("Invalid {name} address {value:?}")]
    InvalidAddress { name: &'static str, value: String },
    #[error("Shutdown timeout must be > 0")]
    InvalidShutdownTimeout,
    #[error("Request timeout must be > 0")]
    InvalidRequestTimeout,
    #[error("Max fan-out must be > 0")]
    InvalidFanOut,
    #[error("Whitelisted method {0:?} must be a full method name")]
    InvalidWhitelistMethod(String),
    #[error("Root password is too weak: {0}")]
    WeakRootPassword(String),
}

/// Token signing and verification settings.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SecretString,
    pub identity_key: String,
    pub expiration: Duration,
}

/// Where the policy comes from and how often it is refreshed.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    pub file: Option<PathBuf>,
    /// `None` selects the static engine.
    pub reload_interval: Option<Duration>,
}

/// Everything the application needs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub token: TokenConfig,
    pub policy: PolicyConfig,
    pub transport: TransportConfig,
    pub whitelist_methods: Vec<String>,
    pub max_fan_out: usize,
    pub root_password: Option<SecretString>,
}

impl Config {
    /// Parse and validate configuration.
    pub fn init() -> anyhow::Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret_key.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::JwtSecretTooShort);
        }
        if self.jwt_identity_key.trim().is_empty() {
            return Err(ConfigError::EmptyIdentityKey);
        }
        if self.jwt_expiration_minutes == 0 {
            return Err(ConfigError::InvalidExpiration);
        }
        if self.jwt_expiration_secs().is_none() {
            return Err(ConfigError::ExpirationOutOfRange(self.jwt_expiration_minutes));
        }
        parse_address("gRPC", &self.grpc_address)?;
        parse_address("HTTP", &self.http_address)?;
        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidShutdownTimeout);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout);
        }
        if self.max_fan_out == 0 {
            return Err(ConfigError::InvalidFanOut);
        }
        if let Some(method) = self.public_methods().find(|m| !m.starts_with('/')) {
            return Err(ConfigError::InvalidWhitelistMethod(method.to_string()));
        }
        if let Some(password) = &self.root_password {
            domain::password(FieldValue::Str(password.expose_secret()))
                .map_err(|e| ConfigError::WeakRootPassword(e.to_string()))?;
        }
        Ok(())
    }

    fn public_methods(&self) -> impl Iterator<Item = &str> {
        self.whitelist_methods
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
    }

    fn jwt_expiration_secs(&self) -> Option<u64> {
        self.jwt_expiration_minutes.checked_mul(60)
    }

    /// Saturates on an expiration `validate` would have rejected.
    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret_key.clone(),
            identity_key: self.jwt_identity_key.clone(),
            expiration: Duration::from_secs(self.jwt_expiration_secs().unwrap_or(u64::MAX)),
        }
    }

    #[must_use]
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            file: self.policy_file.clone(),
            reload_interval: (self.policy_reload_secs > 0)
                .then(|| Duration::from_secs(self.policy_reload_secs)),
        }
    }

    /// # Errors
    /// Returns `ConfigError::InvalidAddress` for an unparsable listen address.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        Ok(TransportConfig {
            mode: self.server_mode,
            grpc_addr: parse_address("gRPC", &self.grpc_address)?,
            http_addr: parse_address("HTTP", &self.http_address)?,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    /// # Errors
    /// Returns `ConfigError::InvalidAddress` for an unparsable listen address.
    pub fn settings(&self) -> Result<AppSettings, ConfigError> {
        Ok(AppSettings {
            token: self.token_config(),
            policy: self.policy_config(),
            transport: self.transport_config()?,
            whitelist_methods: self.public_methods().map(str::to_string).collect(),
            max_fan_out: self.max_fan_out,
            root_password: self.root_password.clone(),
        })
    }
}

fn parse_address(name: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server_mode: ServerMode::GrpcGateway,
            grpc_address: "0.0.0.0:6666".to_string(),
            http_address: "0.0.0.0:5555".to_string(),
            jwt_secret_key: SecretString::from("this_is_a_very_long_secret_key_32"),
            jwt_identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            jwt_expiration_minutes: 120,
            policy_file: None,
            policy_reload_secs: 5,
            shutdown_timeout_secs: 10,
            request_timeout_secs: 30,
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            whitelist_methods: Vec::new(),
            root_password: None,
            log_level: "INFO".to_string(),
            json_logs: false,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn jwt_secret_too_short_fails() {
        let mut config = test_config();
        config.jwt_secret_key = SecretString::from("short");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::JwtSecretTooShort)
        ));
    }

    #[test]
    fn overflowing_expiration_fails() {
        let mut config = test_config();
        config.jwt_expiration_minutes = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ExpirationOutOfRange(u64::MAX))
        ));
        assert_eq!(config.token_config().expiration, Duration::from_secs(u64::MAX));

        config.jwt_expiration_minutes = u64::MAX / 60;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.token_config().expiration,
            Duration::from_secs(u64::MAX / 60 * 60)
        );
    }

    #[test]
    fn bad_address_fails() {
        let mut config = test_config();
        config.http_address = ":5555".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { name: "HTTP", .. })
        ));
    }

    #[test]
    fn weak_root_password_fails() {
        let mut config = test_config();
        config.root_password = Some(SecretString::from("root"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeakRootPassword(_))
        ));
    }

    #[test]
    fn whitelist_entries_must_be_full_method_names() {
        let mut config = test_config();
        config.whitelist_methods = vec!["GetPost".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWhitelistMethod(_))
        ));

        config.whitelist_methods = vec![" /blog.v1.BlogService/GetPost ".to_string(), String::new()];
        assert!(config.validate().is_ok());
        assert_eq!(
            config.settings().unwrap().whitelist_methods,
            ["/blog.v1.BlogService/GetPost"]
        );
    }

    #[test]
    fn zero_reload_period_selects_static_policy() {
        let mut config = test_config();
        assert_eq!(
            config.policy_config().reload_interval,
            Some(Duration::from_secs(5))
        );

        config.policy_reload_secs = 0;
        assert!(config.policy_config().reload_interval.is_none());
    }

    #[test]
    fn settings_carry_durations() {
        let settings = test_config().settings().unwrap();
        assert_eq!(settings.token.expiration, Duration::from_secs(120 * 60));
        assert_eq!(settings.transport.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(settings.transport.grpc_addr.port(), 6666);
    }
}
