use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::workflows::rewards::performance::GradeBands;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rewards: RewardSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rewards: RewardSettings::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the reward calculator that are deployment policy rather than program data.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardSettings {
    /// When set, `payable_amount` on a calculation never drops below zero. The stored
    /// reward, penalty and net figures are unaffected.
    pub clamp_net_at_zero: bool,
    /// Monetary value of one reward point. `None` leaves points without cash value.
    pub points_rate: Option<Decimal>,
    pub grade_bands: GradeBands,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            clamp_net_at_zero: false,
            points_rate: None,
            grade_bands: GradeBands::default(),
        }
    }
}

impl RewardSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = GradeBands::default();

        let clamp_net_at_zero = match env::var("REWARD_CLAMP_NET") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                variable: "REWARD_CLAMP_NET",
                value: raw,
            })?,
            Err(_) => false,
        };

        let points_rate = optional_decimal("REWARD_POINTS_RATE")?;

        let grade_bands = GradeBands {
            a_min: optional_decimal("GRADE_A_MIN")?.unwrap_or(defaults.a_min),
            b_min: optional_decimal("GRADE_B_MIN")?.unwrap_or(defaults.b_min),
            c_min: optional_decimal("GRADE_C_MIN")?.unwrap_or(defaults.c_min),
        };

        if !(grade_bands.a_min >= grade_bands.b_min && grade_bands.b_min >= grade_bands.c_min) {
            return Err(ConfigError::UnorderedGradeBands);
        }

        Ok(Self {
            clamp_net_at_zero,
            points_rate,
            grade_bands,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn optional_decimal(variable: &'static str) -> Result<Option<Decimal>, ConfigError> {
    match env::var(variable) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Decimal::from_str(raw.trim())
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                variable,
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { variable: &'static str, value: String },
    UnorderedGradeBands,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has an invalid value '{value}'")
            }
            ConfigError::UnorderedGradeBands => {
                write!(f, "grade thresholds must satisfy GRADE_A_MIN >= GRADE_B_MIN >= GRADE_C_MIN")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidValue { .. }
            | ConfigError::UnorderedGradeBands => None,
        }
    }
}
