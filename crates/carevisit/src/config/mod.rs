use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::workflows::evv::EvvConfig;
use crate::workflows::scheduling::SchedulingConfig;

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
    pub policy: VisitPolicyConfig,
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
            policy: VisitPolicyConfig::from_env()?,
        })
    }
}

/// Tunable scoring, routing and verification constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitPolicyConfig {
    pub scheduling: SchedulingConfig,
    pub evv: EvvConfig,
}

impl VisitPolicyConfig {
    /// Defaults, overridden by any of the policy variables present in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut policy = Self::default();

        if let Some(radius) = env_override::<u32>("EVV_GEOFENCE_RADIUS_M")? {
            policy.evv.default_geofence_radius_meters = radius;
        }
        if let Some(minutes) = env_override::<i64>("EVV_TIMING_TOLERANCE_MIN")? {
            policy.evv.timing_tolerance_minutes = minutes;
        }
        if let Some(minutes) = env_override::<i64>("EVV_DURATION_TOLERANCE_MIN")? {
            policy.evv.duration_tolerance_minutes = minutes;
        }
        if let Some(speed) = env_override::<f64>("ROUTE_AVG_SPEED_MPH")? {
            policy.scheduling.route_average_speed_mph = positive("ROUTE_AVG_SPEED_MPH", speed)?;
        }
        if let Some(speed) = env_override::<f64>("ETA_AVG_SPEED_MPH")? {
            policy.scheduling.eta_average_speed_mph = positive("ETA_AVG_SPEED_MPH", speed)?;
        }
        if let Some(rate) = env_override::<f64>("MILEAGE_RATE_PER_MILE")? {
            policy.scheduling.mileage_rate_per_mile = positive("MILEAGE_RATE_PER_MILE", rate)?;
        }
        if let Some(step) = env_override::<u32>("MATCH_SLOT_INCREMENT_MIN")? {
            if step == 0 {
                return Err(ConfigError::InvalidPolicy {
                    key: "MATCH_SLOT_INCREMENT_MIN",
                    value: step.to_string(),
                });
            }
            policy.scheduling.matching.slot_increment_minutes = step;
        }

        Ok(policy)
    }
}

fn env_override<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidPolicy { key, value: raw }),
        _ => Ok(None),
    }
}

fn positive(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidPolicy {
            key,
            value: value.to_string(),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPolicy { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPolicy { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidPolicy { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
