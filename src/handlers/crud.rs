//! Scene CRUD handlers (get, add, update, delete, settings)
//!
//! Each edit is a read-modify-write of the device's whole `extra.scenes`
//! collection through the device manager.

use super::requests::{self, AddRequest, SceneRef, SettingsRequest, UpdateRequest};
use crate::error::SceneError;
use crate::scene::lookup::SceneSelection;
use crate::scene::DeviceDirectory;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Handle `get`: one scene, or every scene for `*`
pub async fn handle_get(directory: &DeviceDirectory, parameters: Value) -> Result<Value, SceneError> {
    let request: SceneRef = requests::parse(parameters)?;

    match directory.resolve(&request.device_id, &request.scene_id).await? {
        SceneSelection::One(scene) => Ok(serde_json::to_value(scene)?),
        SceneSelection::All(scenes) => Ok(serde_json::to_value(scenes)?),
    }
}

/// Handle `add`: store a new scene under a fresh id and return that id
pub async fn handle_add(directory: &DeviceDirectory, parameters: Value) -> Result<Value, SceneError> {
    let request: AddRequest = requests::parse(parameters)?;
    let mut scenes = directory.fetch_scenes(&request.device_id).await?;

    let scene_id = Uuid::new_v4().to_string();
    scenes.push(request.scene.into_scene(scene_id.clone()))?;

    directory.store_scenes(&scenes).await?;

    info!("Added scene {} to device {}", scene_id, scenes.device_id());
    Ok(json!(scene_id))
}

/// Handle `update`: replace a stored scene, keeping its id
pub async fn handle_update(directory: &DeviceDirectory, parameters: Value) -> Result<Value, SceneError> {
    let request: UpdateRequest = requests::parse(parameters)?;
    let scene_id = request
        .target_scene_id()
        .map(String::from)
        .ok_or_else(|| SceneError::Validation("`sceneId` is required".into()))?;

    let mut scenes = directory.fetch_scenes(&request.device_id).await?;
    scenes.replace(request.scene.into_scene(scene_id.clone()))?;

    directory.store_scenes(&scenes).await?;

    info!("Updated scene {} on device {}", scene_id, scenes.device_id());
    Ok(json!({}))
}

/// Handle `delete`
pub async fn handle_delete(directory: &DeviceDirectory, parameters: Value) -> Result<Value, SceneError> {
    let request: SceneRef = requests::parse(parameters)?;
    let mut scenes = directory.fetch_scenes(&request.device_id).await?;

    scenes.remove(&request.scene_id)?;
    directory.store_scenes(&scenes).await?;

    info!("Deleted scene {} from device {}", request.scene_id, scenes.device_id());
    Ok(json!({}))
}

/// Handle `settings`: currently only the `notify` flag
pub async fn handle_settings(directory: &DeviceDirectory, parameters: Value) -> Result<Value, SceneError> {
    let request: SettingsRequest = requests::parse(parameters)?;
    let mut scenes = directory.fetch_scenes(&request.device_id).await?;

    scenes.set_notify(&request.scene_id, request.settings.notify)?;
    directory.store_scenes(&scenes).await?;

    info!(
        "Scene {} on device {}: notify={}",
        request.scene_id,
        scenes.device_id(),
        request.settings.notify
    );
    Ok(json!({}))
}
