//! Errors that end a scene operation before or instead of dispatch

use scene_shared::{codes, ResponseMessage};
use thiserror::Error;

/// Whole-operation failures
///
/// Per-command forward failures are never represented here; they are
/// recorded in the run's result list instead.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// `getDevice` failed, or its record is unusable
    #[error("{description}")]
    DeviceLookup { ret_code: i32, description: String },

    #[error("no scene found by given uuid:[{scene_id}]")]
    SceneNotFound { scene_id: String },

    /// `deviceUpdate` failed while writing back the scene collection
    #[error("{description}")]
    DeviceUpdate { ret_code: i32, description: String },

    #[error("failed to encode scene data: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SceneError {
    pub fn ret_code(&self) -> i32 {
        match self {
            SceneError::Validation(_) => codes::VALIDATION_FAILED,
            SceneError::UnknownOperation(_) => codes::UNKNOWN_OPERATION,
            SceneError::DeviceLookup { ret_code, .. } => *ret_code,
            SceneError::SceneNotFound { .. } => codes::SCENE_NOT_FOUND,
            SceneError::DeviceUpdate { ret_code, .. } => *ret_code,
            SceneError::Encoding(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn to_response(&self) -> ResponseMessage {
        ResponseMessage::failure(self.ret_code(), self.to_string())
    }
}
