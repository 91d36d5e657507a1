//! Scene operation handlers
//!
//! [`SceneService`] decodes a request's parameters, dispatches on its
//! `cmdName` and turns the outcome into a [`ResponseMessage`].

mod action;
mod crud;
mod requests;

use crate::config::ServiceConfig;
use crate::error::SceneError;
use crate::rpc::RpcTransport;
use crate::scene::{CommandForwarder, DeviceDirectory, ModeExecutor};
use scene_shared::{Request, ResponseMessage, RpcPayload};
use std::sync::Arc;
use tracing::{debug, warn};

/// Operation names accepted on the scene route
pub mod operations {
    pub const GET: &str = "get";
    pub const ADD: &str = "add";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const SETTINGS: &str = "settings";
    pub const ACTION: &str = "action";
}

pub struct SceneService {
    service_id: String,
    directory: DeviceDirectory,
    executor: ModeExecutor,
}

impl SceneService {
    pub fn new(config: &ServiceConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            service_id: config.service_id.clone(),
            directory: DeviceDirectory::new(transport.clone(), config.device_manager_routes.clone()),
            executor: ModeExecutor::new(CommandForwarder::new(transport), config.max_parallel_commands),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Handle one inbound request; always produces a response
    pub async fn handle(&self, request: &Request) -> ResponseMessage {
        let payload = match RpcPayload::from_request(request) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Rejecting {} request: bad parameters: {}", request.cmd_name, e);
                return SceneError::Validation(e.to_string()).to_response();
            }
        };

        debug!("Handling {} ({})", payload.cmd_name, payload.cmd_code);

        match self.dispatch(payload).await {
            Ok(data) => ResponseMessage::success(data),
            Err(e) => {
                warn!("{} failed: {} (ret_code={})", request.cmd_name, e, e.ret_code());
                e.to_response()
            }
        }
    }

    async fn dispatch(&self, payload: RpcPayload) -> Result<serde_json::Value, SceneError> {
        let parameters = payload.parameters;
        match payload.cmd_name.as_str() {
            operations::GET => crud::handle_get(&self.directory, parameters).await,
            operations::ADD => crud::handle_add(&self.directory, parameters).await,
            operations::UPDATE => crud::handle_update(&self.directory, parameters).await,
            operations::DELETE => crud::handle_delete(&self.directory, parameters).await,
            operations::SETTINGS => crud::handle_settings(&self.directory, parameters).await,
            operations::ACTION => action::handle_action(&self.directory, &self.executor, parameters).await,
            other => Err(SceneError::UnknownOperation(other.to_string())),
        }
    }
}
