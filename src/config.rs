use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
    pub assignment_fallback_delay_ms: u64,
    pub heartbeat_timeout_seconds: i64,
    pub event_bus_capacity: usize,
    pub realtime_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| "oxichat".to_string());
        let otel_exporter_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty());

        let event_bus_capacity = parse_var(&lookup, "EVENT_BUS_CAPACITY", 1000)?;
        let realtime_channel_capacity = parse_var(&lookup, "REALTIME_CHANNEL_CAPACITY", 100)?;
        // broadcast and mpsc channels panic on zero capacity
        for (name, value) in [
            ("EVENT_BUS_CAPACITY", event_bus_capacity),
            ("REALTIME_CHANNEL_CAPACITY", realtime_channel_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        Ok(Config {
            server_host,
            server_port: parse_var(&lookup, "SERVER_PORT", 3000)?,
            otel_exporter_endpoint,
            service_name,
            metrics_port: parse_var(&lookup, "METRICS_PORT", 9000)?,
            assignment_fallback_delay_ms: parse_var(&lookup, "ASSIGNMENT_FALLBACK_DELAY_MS", 5000)?,
            heartbeat_timeout_seconds: parse_var(&lookup, "HEARTBEAT_TIMEOUT_SECONDS", 60)?,
            event_bus_capacity,
            realtime_channel_capacity,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.assignment_fallback_delay_ms)
    }

    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.heartbeat_timeout_seconds)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
}
