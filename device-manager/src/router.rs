//! Request routing for the device manager endpoint
//!
//! Requests addressed to the manager's own route are device-record
//! operations. Anything else is treated as delivery to a device controller:
//! `forward` is acknowledged and logged.

use crate::store::{DeviceStore, StoreError};
use scene_shared::{codes, commands, Request, ResponseMessage, RpcPayload};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Router {
    route: String,
    store: Arc<DeviceStore>,
}

impl Router {
    pub fn new(route: impl Into<String>, store: Arc<DeviceStore>) -> Self {
        Self {
            route: route.into(),
            store,
        }
    }

    pub async fn handle(&self, request: &Request) -> ResponseMessage {
        let payload = match RpcPayload::from_request(request) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Bad parameters for {} on {}: {}", request.cmd_name, request.route, e);
                return ResponseMessage::failure(codes::VALIDATION_FAILED, e.to_string());
            }
        };

        if request.route == self.route {
            self.handle_manager(payload).await
        } else {
            handle_controller(&request.route, payload)
        }
    }

    async fn handle_manager(&self, payload: RpcPayload) -> ResponseMessage {
        match payload.cmd_name.as_str() {
            commands::GET_DEVICE => self.get_device(&payload.parameters).await,
            commands::DEVICE_UPDATE => self.device_update(&payload.parameters).await,
            other => ResponseMessage::failure(
                codes::UNKNOWN_OPERATION,
                format!("unknown operation: {other}"),
            ),
        }
    }

    /// Answers with a one-element array, as device queries do
    async fn get_device(&self, parameters: &Value) -> ResponseMessage {
        let Some(uuid) = parameters.get("uuid").and_then(Value::as_str) else {
            return ResponseMessage::failure(codes::VALIDATION_FAILED, "`uuid` is required");
        };

        match self.store.get(uuid).await {
            Some(device) => {
                debug!("getDevice {}", uuid);
                ResponseMessage::success(json!([device]))
            }
            None => ResponseMessage::failure(codes::DEVICE_NOT_FOUND, StoreError::NotFound(uuid.into()).to_string()),
        }
    }

    async fn device_update(&self, parameters: &Value) -> ResponseMessage {
        let (Some(uuid), Some(fields)) = (
            parameters.get("uuid").and_then(Value::as_str),
            parameters.as_object(),
        ) else {
            return ResponseMessage::failure(codes::VALIDATION_FAILED, "`uuid` is required");
        };

        match self.store.apply_update(uuid, fields).await {
            Ok(()) => {
                info!("Updated device {} ({} fields)", uuid, fields.len().saturating_sub(1));
                ResponseMessage::success(json!({}))
            }
            Err(e @ StoreError::NotFound(_)) => ResponseMessage::failure(codes::DEVICE_NOT_FOUND, e.to_string()),
            Err(e) => ResponseMessage::failure(codes::VALIDATION_FAILED, e.to_string()),
        }
    }
}

fn handle_controller(route: &str, payload: RpcPayload) -> ResponseMessage {
    if payload.cmd_name != commands::FORWARD {
        return ResponseMessage::failure(
            codes::UNKNOWN_OPERATION,
            format!("unknown operation: {}", payload.cmd_name),
        );
    }

    let uuid = payload.parameters["uuid"].as_str().unwrap_or_default();
    let cmd_name = payload.parameters["cmd"]["cmdName"].as_str().unwrap_or_default();
    info!("[{}] forward {} (uuid={})", route, cmd_name, uuid);

    ResponseMessage::success(json!({ "acknowledged": uuid }))
}
