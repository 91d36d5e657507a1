//! In-memory device records keyed by uuid

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("device {0} not found")]
    NotFound(String),

    #[error("cannot set `{0}`: an intermediate value is not an object")]
    NotAnObject(String),

    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed seed file: {0}")]
    Seed(#[from] serde_json::Error),
}

pub struct DeviceStore {
    devices: RwLock<HashMap<String, Value>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Records without a string `uuid` are skipped
    pub fn from_records(records: Vec<Value>) -> Self {
        let devices = records
            .into_iter()
            .filter_map(|record| {
                let uuid = record.get("uuid")?.as_str()?.to_string();
                Some((uuid, record))
            })
            .collect();

        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Load a JSON array of device records
    pub fn load_seed(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<Value> = serde_json::from_str(&raw)?;
        let store = Self::from_records(records);
        info!("Seeded device store from {}", path.display());
        Ok(store)
    }

    pub async fn get(&self, uuid: &str) -> Option<Value> {
        self.devices.read().await.get(uuid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Apply a partial update to one device
    ///
    /// Keys are dotted paths into the record (`extra.scenes`); missing
    /// intermediate objects are created. The `uuid` key identifies the record
    /// and is never written.
    pub async fn apply_update(&self, uuid: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(uuid)
            .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;

        // Stage on a copy so a bad path leaves the record untouched
        let mut updated = device.clone();
        for (path, value) in fields.iter().filter(|(key, _)| key.as_str() != "uuid") {
            set_path(&mut updated, path, value.clone())?;
        }
        *device = updated;
        Ok(())
    }
}

fn set_path(target: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);

    let mut node = target;
    for segment in segments {
        let object = node
            .as_object_mut()
            .ok_or_else(|| StoreError::NotAnObject(path.to_string()))?;
        node = object
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
    }

    node.as_object_mut()
        .ok_or_else(|| StoreError::NotAnObject(path.to_string()))?
        .insert(last.to_string(), value);
    Ok(())
}
