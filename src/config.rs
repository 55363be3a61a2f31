//! Configuration file loading.
//!
//! Everything the gateway needs at startup comes from one YAML file: listen
//! address, signing secret, tracker toggles, breaker tuning, and the route
//! table. See `gateway.yml` at the repository root for a worked example.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::breaker::BreakerConfig;
use crate::error::Error;
use crate::route::Route;
use crate::track::TrackerConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// `host:port` to bind.
    pub listen: String,
    /// Base64-encoded HS256 signing secret.
    pub jwt_secret: String,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    pub routes: Vec<RouteSettings>,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&raw)?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, Error> {
        self.listen.parse().map_err(|_| Error::Listen(self.listen.clone()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSettings {
    pub id: String,
    pub path: String,
    pub backend: String,
    pub fallback_message: String,
}

impl From<RouteSettings> for Route {
    fn from(settings: RouteSettings) -> Self {
        Route {
            id: settings.id,
            pattern: settings.path,
            backend: settings.backend,
            fallback_message: settings.fallback_message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerSettings {
    pub base_message: String,
    pub pre_logger: bool,
    pub post_logger: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        let defaults = TrackerConfig::default();
        Self {
            base_message: defaults.base_message,
            pre_logger: defaults.pre_logger,
            post_logger: defaults.post_logger,
        }
    }
}

impl From<TrackerSettings> for TrackerConfig {
    fn from(settings: TrackerSettings) -> Self {
        TrackerConfig {
            base_message: settings.base_message,
            pre_logger: settings.pre_logger,
            post_logger: settings.post_logger,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSettings {
    pub failure_rate_threshold: f64,
    pub window_size: usize,
    pub minimum_calls: usize,
    pub cooldown_secs: u64,
    pub half_open_calls: usize,
    pub call_timeout_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            failure_rate_threshold: defaults.failure_rate_threshold,
            window_size: defaults.window_size,
            minimum_calls: defaults.minimum_calls,
            cooldown_secs: defaults.cooldown.as_secs(),
            half_open_calls: defaults.half_open_calls,
            call_timeout_secs: defaults.call_timeout.as_secs(),
        }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        BreakerConfig {
            failure_rate_threshold: settings.failure_rate_threshold,
            window_size: settings.window_size,
            minimum_calls: settings.minimum_calls,
            cooldown: Duration::from_secs(settings.cooldown_secs),
            half_open_calls: settings.half_open_calls,
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
listen: "0.0.0.0:8000"
jwt_secret: "c2VjcmV0"
tracker:
  base_message: "edge gateway"
  pre_logger: true
  post_logger: false
breaker:
  failure_rate_threshold: 50.0
  window_size: 10
  minimum_calls: 5
  cooldown_secs: 30
  half_open_calls: 2
  call_timeout_secs: 4
routes:
  - id: catalog
    path: "/catalog-service/{*rest}"
    backend: "http://127.0.0.1:8081"
    fallback_message: "The catalog service is temporarily unavailable. Sorry for the inconvenience."
"#;

    #[test]
    fn parses_full_config() {
        let config: GatewayConfig = serde_yml::from_str(SAMPLE).unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 8000);
        assert!(!config.tracker.post_logger);

        let breaker = BreakerConfig::from(&config.breaker);
        assert_eq!(breaker.minimum_calls, 5);
        assert_eq!(breaker.cooldown, Duration::from_secs(30));

        let route = Route::from(
            config.routes.into_iter().next().unwrap(),
        );
        assert_eq!(route.id, "catalog");
        assert_eq!(route.pattern, "/catalog-service/{*rest}");
    }

    #[test]
    fn tracker_and_breaker_sections_are_optional() {
        let config: GatewayConfig = serde_yml::from_str(
            r#"
listen: "127.0.0.1:0"
jwt_secret: "c2VjcmV0"
routes: []
"#,
        )
        .unwrap();
        assert_eq!(config.breaker.call_timeout_secs, 4);
        assert!(config.tracker.pre_logger);
    }

    #[test]
    fn bad_listen_address_is_an_error() {
        let config: GatewayConfig = serde_yml::from_str(
            r#"
listen: "not-an-address"
jwt_secret: "c2VjcmV0"
routes: []
"#,
        )
        .unwrap();
        assert!(matches!(config.listen_addr(), Err(Error::Listen(_))));
    }
}
