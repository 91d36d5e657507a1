//! Scene lookup against the device manager

use crate::error::SceneError;
use crate::rpc::RpcTransport;
use scene_shared::{codes, stored_scene_id, DeviceRecord, RpcPayload, Scene};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scene id that selects a device's whole collection
pub const WILDCARD: &str = "*";

/// What a scene id resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSelection {
    One(Scene),
    All(Vec<Scene>),
}

/// Device-manager access: fetches device records and writes scene collections
/// back
pub struct DeviceDirectory {
    transport: Arc<dyn RpcTransport>,
    routes: Vec<String>,
    next_route: AtomicUsize,
}

impl DeviceDirectory {
    /// `routes` are the device manager instances to spread calls over
    pub fn new(transport: Arc<dyn RpcTransport>, routes: Vec<String>) -> Self {
        Self {
            transport,
            routes,
            next_route: AtomicUsize::new(0),
        }
    }

    fn route(&self) -> Result<&str, SceneError> {
        if self.routes.is_empty() {
            return Err(SceneError::DeviceLookup {
                ret_code: codes::TRANSPORT_UNAVAILABLE,
                description: "no device manager route configured".into(),
            });
        }
        let index = self.next_route.fetch_add(1, Ordering::Relaxed) % self.routes.len();
        Ok(&self.routes[index])
    }

    /// Fetch one device record (single RPC round-trip)
    pub async fn fetch_device(&self, device_id: &str) -> Result<DeviceRecord, SceneError> {
        let route = self.route()?;
        debug!("Fetching device {} from {}", device_id, route);

        let response = self
            .transport
            .call(route, RpcPayload::get_device(device_id))
            .await
            .unwrap_or_else(|e| e.into_response());

        if !response.is_success() {
            return Err(SceneError::DeviceLookup {
                ret_code: response.ret_code,
                description: response.description,
            });
        }

        normalize_device(device_id, response.data)
    }

    /// Fetch a device's scene collection for editing
    pub async fn fetch_scenes(&self, device_id: &str) -> Result<SceneCollection, SceneError> {
        let device = self.fetch_device(device_id).await?;
        Ok(SceneCollection::from_device(&device))
    }

    /// Replace the device's stored scene collection
    pub async fn store_scenes(&self, scenes: &SceneCollection) -> Result<(), SceneError> {
        let route = self.route()?;

        let response = self
            .transport
            .call(route, RpcPayload::update_scenes(scenes.device_id(), scenes.to_value()))
            .await
            .unwrap_or_else(|e| e.into_response());

        if !response.is_success() {
            return Err(SceneError::DeviceUpdate {
                ret_code: response.ret_code,
                description: response.description,
            });
        }

        Ok(())
    }

    /// Fetch the device and select `scene_id` (or everything for `*`)
    pub async fn resolve(&self, device_id: &str, scene_id: &str) -> Result<SceneSelection, SceneError> {
        let scenes = self.fetch_scenes(device_id).await?;
        select_scene(&scenes, scene_id)
    }
}

/// The device manager may answer with a record or an array of records
fn normalize_device(device_id: &str, data: Value) -> Result<DeviceRecord, SceneError> {
    let record = match data {
        Value::Array(items) => items.into_iter().next(),
        Value::Object(_) => Some(data),
        _ => None,
    }
    .ok_or_else(|| SceneError::DeviceLookup {
        ret_code: codes::DEVICE_RECORD_INVALID,
        description: format!("no device record returned for uuid:[{device_id}]"),
    })?;

    serde_json::from_value(record).map_err(|e| SceneError::DeviceLookup {
        ret_code: codes::DEVICE_RECORD_INVALID,
        description: format!("malformed device record for uuid:[{device_id}]: {e}"),
    })
}

/// A device's stored scene collection
///
/// Every entry keeps the JSON it was stored as and is written back as is
/// unless an edit targets it. Entries that don't decode as a [`Scene`] are
/// left out of reads.
#[derive(Debug, Clone)]
pub struct SceneCollection {
    device_id: String,
    entries: Vec<StoredScene>,
}

#[derive(Debug, Clone)]
struct StoredScene {
    raw: Value,
    scene: Option<Scene>,
}

impl StoredScene {
    fn from_scene(scene: Scene) -> Result<Self, SceneError> {
        Ok(Self {
            raw: serde_json::to_value(&scene)?,
            scene: Some(scene),
        })
    }
}

impl SceneCollection {
    pub fn from_device(device: &DeviceRecord) -> Self {
        let entries = device
            .raw_scenes()
            .iter()
            .map(|raw| {
                let scene = match serde_json::from_value::<Scene>(raw.clone()) {
                    Ok(scene) => Some(scene),
                    Err(e) => {
                        warn!(
                            "Device {}: skipping unreadable scene {}: {}",
                            device.uuid,
                            stored_scene_id(raw).unwrap_or("<no sceneId>"),
                            e
                        );
                        None
                    }
                };
                StoredScene {
                    raw: raw.clone(),
                    scene,
                }
            })
            .collect();

        Self {
            device_id: device.uuid.clone(),
            entries,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Readable scenes in stored order
    pub fn readable(&self) -> Vec<Scene> {
        self.entries
            .iter()
            .filter_map(|entry| entry.scene.clone())
            .collect()
    }

    /// First readable scene with this id
    pub fn find(&self, scene_id: &str) -> Result<Scene, SceneError> {
        self.entries
            .iter()
            .filter_map(|entry| entry.scene.as_ref())
            .find(|scene| scene.scene_id == scene_id)
            .cloned()
            .ok_or_else(|| not_found(scene_id))
    }

    /// First stored entry with this id, readable or not
    fn position(&self, scene_id: &str) -> Result<usize, SceneError> {
        self.entries
            .iter()
            .position(|entry| stored_scene_id(&entry.raw) == Some(scene_id))
            .ok_or_else(|| not_found(scene_id))
    }

    pub fn push(&mut self, scene: Scene) -> Result<(), SceneError> {
        self.entries.push(StoredScene::from_scene(scene)?);
        Ok(())
    }

    /// Replace the stored entry carrying `scene`'s id
    pub fn replace(&mut self, scene: Scene) -> Result<(), SceneError> {
        let index = self.position(&scene.scene_id)?;
        self.entries[index] = StoredScene::from_scene(scene)?;
        Ok(())
    }

    pub fn remove(&mut self, scene_id: &str) -> Result<(), SceneError> {
        let index = self.position(scene_id)?;
        self.entries.remove(index);
        Ok(())
    }

    /// Set `notify` on the stored entry; its other keys stay as stored
    pub fn set_notify(&mut self, scene_id: &str, notify: bool) -> Result<(), SceneError> {
        let index = self.position(scene_id)?;
        let entry = &mut self.entries[index];

        if let Some(object) = entry.raw.as_object_mut() {
            object.insert("notify".into(), Value::Bool(notify));
        }
        if let Some(scene) = entry.scene.as_mut() {
            scene.notify = notify;
        }
        Ok(())
    }

    /// The collection as it goes back into `extra.scenes`
    pub fn to_value(&self) -> Value {
        Value::Array(self.entries.iter().map(|entry| entry.raw.clone()).collect())
    }
}

fn not_found(scene_id: &str) -> SceneError {
    SceneError::SceneNotFound {
        scene_id: scene_id.to_string(),
    }
}

/// Pick the scene(s) a `get` asks for
fn select_scene(scenes: &SceneCollection, scene_id: &str) -> Result<SceneSelection, SceneError> {
    if scene_id == WILDCARD {
        return Ok(SceneSelection::All(scenes.readable()));
    }
    scenes.find(scene_id).map(SceneSelection::One)
}
