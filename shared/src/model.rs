//! Scene data model
//!
//! These types mirror the JSON stored by the device manager under a device's
//! `extra.scenes` and the outcome reported back to a peer that triggers a
//! scene.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::codes;

/// How a scene's command list is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// All commands at once, independent of each other
    Parallel,
    /// One at a time in order, failures do not stop the run
    Series,
    /// One at a time in order, each step feeds the next and a failure stops the run
    Waterfall,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Parallel => write!(f, "PARALLEL"),
            ExecutionMode::Series => write!(f, "SERIES"),
            ExecutionMode::Waterfall => write!(f, "WATERFALL"),
        }
    }
}

/// The payload delivered to the target device
///
/// Keys beyond the ones below are kept in `other` so the command reaches the
/// device as it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    pub cmd_name: String,
    pub cmd_code: String,
    /// Object, string or array
    pub parameters: Value,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One entry of a scene's command list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Client-assigned correlation tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub cmd: CommandPayload,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CommandSpec {
    /// Correlation tag, empty when the command has none
    pub fn uuid(&self) -> &str {
        self.uuid.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub scene_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub scene_type: String,
    #[serde(default)]
    pub notify: bool,
    pub mode: ExecutionMode,
    #[serde(default, alias = "cmds")]
    pub commands: Vec<CommandSpec>,
    /// Stored keys this model does not name (icons, ordering, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Device record as returned by the device manager's `getDevice`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub uuid: String,
    /// Route of the controller that owns this device
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub extra: Option<DeviceExtra>,
}

/// `extra` section of a device record
///
/// Scenes stay raw JSON here: one entry that doesn't decode as a [`Scene`]
/// must not make the rest of the collection unreachable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceExtra {
    #[serde(default)]
    pub scenes: Option<Vec<Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl DeviceRecord {
    /// Stored scene entries as raw JSON; a missing `extra` or `extra.scenes`
    /// reads as empty
    pub fn raw_scenes(&self) -> &[Value] {
        self.extra
            .as_ref()
            .and_then(|extra| extra.scenes.as_deref())
            .unwrap_or(&[])
    }
}

/// `sceneId` of a raw stored scene entry
pub fn stored_scene_id(entry: &Value) -> Option<&str> {
    entry.get("sceneId").and_then(Value::as_str)
}

/// Outcome of forwarding a single command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub uuid: String,
    pub ret_code: i32,
    pub description: String,
    /// Reply data from the device, handed to the next WATERFALL step
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.ret_code == codes::SUCCESS
    }
}

/// Overall status of one scene run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    AllDone,
    PartialFailure,
    /// WATERFALL halted at this 1-based step
    StoppedAtStep(usize),
}

const STOPPED_AT_STEP_PREFIX: &str = "STOPPED_AT_STEP_";

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::AllDone => write!(f, "ALL_DONE"),
            OverallStatus::PartialFailure => write!(f, "PARTIAL_FAILURE"),
            OverallStatus::StoppedAtStep(step) => write!(f, "{STOPPED_AT_STEP_PREFIX}{step}"),
        }
    }
}

impl FromStr for OverallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL_DONE" => Ok(OverallStatus::AllDone),
            "PARTIAL_FAILURE" => Ok(OverallStatus::PartialFailure),
            other => other
                .strip_prefix(STOPPED_AT_STEP_PREFIX)
                .and_then(|step| step.parse().ok())
                .map(OverallStatus::StoppedAtStep)
                .ok_or_else(|| format!("unknown overall status: {other}")),
        }
    }
}

impl Serialize for OverallStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OverallStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Aggregated result of one scene trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneExecutionOutcome {
    pub scene_id: String,
    pub mode: ExecutionMode,
    pub per_command_results: Vec<ExecutionResult>,
    pub overall_status: OverallStatus,
}
