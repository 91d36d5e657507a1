//! Typed request bodies and their shape checks

use crate::error::SceneError;
use scene_shared::{CommandSpec, ExecutionMode, Scene};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Checks serde cannot express
pub trait Validate {
    fn validate(&self) -> Result<(), SceneError>;
}

/// Deserialize and validate request parameters
pub fn parse<T: DeserializeOwned + Validate>(parameters: Value) -> Result<T, SceneError> {
    let request: T =
        serde_json::from_value(parameters).map_err(|e| SceneError::Validation(e.to_string()))?;
    request.validate()?;
    Ok(request)
}

fn require_non_empty(field: &str, value: &str) -> Result<(), SceneError> {
    if value.trim().is_empty() {
        return Err(SceneError::Validation(format!("`{field}` must not be empty")));
    }
    Ok(())
}

/// `get`, `delete` and `action`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRef {
    pub device_id: String,
    pub scene_id: String,
}

impl Validate for SceneRef {
    fn validate(&self) -> Result<(), SceneError> {
        require_non_empty("deviceId", &self.device_id)?;
        require_non_empty("sceneId", &self.scene_id)
    }
}

/// Scene definition as a client submits it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    #[serde(default)]
    pub scene_id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub scene_type: String,
    #[serde(default)]
    pub notify: bool,
    pub mode: ExecutionMode,
    #[serde(alias = "cmds")]
    pub commands: Vec<CommandSpec>,
    /// Extra keys are stored with the scene
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl SceneDraft {
    pub fn into_scene(self, scene_id: String) -> Scene {
        Scene {
            scene_id,
            name: self.name,
            description: self.description,
            scene_type: self.scene_type,
            notify: self.notify,
            mode: self.mode,
            commands: self.commands,
            other: self.other,
        }
    }
}

impl Validate for SceneDraft {
    fn validate(&self) -> Result<(), SceneError> {
        for (index, command) in self.commands.iter().enumerate() {
            match command.cmd.parameters {
                Value::Object(_) | Value::String(_) | Value::Array(_) => {}
                _ => {
                    return Err(SceneError::Validation(format!(
                        "commands[{index}].cmd.parameters must be an object, string or array"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub device_id: String,
    pub scene: SceneDraft,
}

impl Validate for AddRequest {
    fn validate(&self) -> Result<(), SceneError> {
        require_non_empty("deviceId", &self.device_id)?;
        self.scene.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub device_id: String,
    #[serde(default)]
    pub scene_id: Option<String>,
    pub scene: SceneDraft,
}

impl UpdateRequest {
    /// Id of the scene being replaced: top-level `sceneId`, else the one
    /// inside `scene`
    pub fn target_scene_id(&self) -> Option<&str> {
        self.scene_id
            .as_deref()
            .or(self.scene.scene_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

impl Validate for UpdateRequest {
    fn validate(&self) -> Result<(), SceneError> {
        require_non_empty("deviceId", &self.device_id)?;
        if self.target_scene_id().is_none() {
            return Err(SceneError::Validation(
                "`sceneId` is required, either top-level or inside `scene`".into(),
            ));
        }
        self.scene.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneSettings {
    pub notify: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub device_id: String,
    pub scene_id: String,
    pub settings: SceneSettings,
}

impl Validate for SettingsRequest {
    fn validate(&self) -> Result<(), SceneError> {
        require_non_empty("deviceId", &self.device_id)?;
        require_non_empty("sceneId", &self.scene_id)
    }
}
