//! Command forwarder - ships one scene command to the owning controller

use crate::rpc::RpcTransport;
use scene_shared::{codes, CommandSpec, ExecutionResult, RpcPayload};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Sends single commands and folds every failure into an [`ExecutionResult`]
pub struct CommandForwarder {
    transport: Arc<dyn RpcTransport>,
}

impl CommandForwarder {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    /// Forward `command` to `route` exactly once
    ///
    /// Never fails: transport errors and non-200 replies both come back as a
    /// result carrying the error code and message.
    pub async fn forward(&self, route: &str, command: &CommandSpec) -> ExecutionResult {
        let parameters = match serde_json::to_value(command) {
            Ok(parameters) => parameters,
            Err(e) => {
                return ExecutionResult {
                    uuid: command.uuid().to_string(),
                    ret_code: codes::INTERNAL_ERROR,
                    description: format!("failed to encode command: {e}"),
                    data: Value::Null,
                };
            }
        };

        debug!(
            "Forwarding {} ({}) to {}",
            command.uuid(), command.cmd.cmd_name, route
        );

        let response = self
            .transport
            .call(route, RpcPayload::forward(parameters))
            .await
            .unwrap_or_else(|e| e.into_response());

        if !response.is_success() {
            error!(
                "Forward of {} to {} failed: {} {}",
                command.uuid(), route, response.ret_code, response.description
            );
        }

        ExecutionResult {
            uuid: command.uuid().to_string(),
            ret_code: response.ret_code,
            description: response.description,
            data: response.data,
        }
    }
}
