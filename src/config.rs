//! Scene service configuration
//!
//! Defaults live in [`ServiceConfig::default`]; [`ServiceConfig::from_env`]
//! overrides them from `SCENE_*` environment variables.

use scene_shared::timing;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sender identity stamped on outgoing frames
    pub service_id: String,
    /// Address peers connect to for scene operations
    pub listen_addr: String,
    /// Broker that routes requests to device managers and devices
    pub broker_addr: String,
    /// Device manager routes, picked round-robin
    pub device_manager_routes: Vec<String>,
    /// Upper bound on in-flight forwards during a PARALLEL run
    pub max_parallel_commands: usize,
    /// How long a single RPC waits for its reply
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_id: "scene-service".into(),
            listen_addr: "0.0.0.0:8090".into(),
            broker_addr: "127.0.0.1:8080".into(),
            device_manager_routes: vec!["device-manager".into()],
            max_parallel_commands: timing::MAX_PARALLEL_COMMANDS,
            request_timeout: Duration::from_millis(timing::REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(timing::CONNECT_TIMEOUT_MS),
            reconnect_delay: Duration::from_millis(timing::RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(timing::MAX_RECONNECT_DELAY_MS),
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from `SCENE_*` environment variables
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let device_manager_routes = lookup("SCENE_DEVICE_MANAGERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|route| !route.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|routes| !routes.is_empty())
            .unwrap_or(defaults.device_manager_routes);

        let max_parallel_commands: usize = parse_or(
            &lookup,
            "SCENE_MAX_PARALLEL",
            defaults.max_parallel_commands,
        );

        Self {
            service_id: lookup("SCENE_SERVICE_ID").unwrap_or(defaults.service_id),
            listen_addr: lookup("SCENE_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            broker_addr: lookup("SCENE_BROKER_ADDR").unwrap_or(defaults.broker_addr),
            device_manager_routes,
            max_parallel_commands: max_parallel_commands.max(1),
            request_timeout: Duration::from_millis(parse_or(
                &lookup,
                "SCENE_REQUEST_TIMEOUT_MS",
                timing::REQUEST_TIMEOUT_MS,
            )),
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "SCENE_CONNECT_TIMEOUT_MS",
                timing::CONNECT_TIMEOUT_MS,
            )),
            reconnect_delay: Duration::from_millis(parse_or(
                &lookup,
                "SCENE_RECONNECT_DELAY_MS",
                timing::RECONNECT_DELAY_MS,
            )),
            max_reconnect_delay: Duration::from_millis(parse_or(
                &lookup,
                "SCENE_MAX_RECONNECT_DELAY_MS",
                timing::MAX_RECONNECT_DELAY_MS,
            )),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
