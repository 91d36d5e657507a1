//! Device manager configuration (`DEVICE_MANAGER_*` environment variables)

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Sender identity stamped on replies
    pub manager_id: String,
    pub listen_addr: String,
    /// Route this instance answers `getDevice`/`deviceUpdate` on; requests for
    /// any other route are treated as addressed to a device controller
    pub route: String,
    /// JSON file holding an array of device records to start with
    pub seed_path: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            manager_id: "device-manager".into(),
            listen_addr: "0.0.0.0:8080".into(),
            route: "device-manager".into(),
            seed_path: None,
        }
    }
}

impl ManagerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            manager_id: non_empty("DEVICE_MANAGER_ID").unwrap_or(defaults.manager_id),
            listen_addr: non_empty("DEVICE_MANAGER_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            route: non_empty("DEVICE_MANAGER_ROUTE").unwrap_or(defaults.route),
            seed_path: non_empty("DEVICE_MANAGER_SEED").map(PathBuf::from).or(defaults.seed_path),
        }
    }
}
