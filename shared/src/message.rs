//! JSON request/response bodies carried inside the protobuf envelope

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{codes, commands, Reply, Request};

/// The `{retCode, description, data}` envelope every operation answers with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub ret_code: i32,
    pub description: String,
    #[serde(default)]
    pub data: Value,
}

impl ResponseMessage {
    /// A 200 response carrying `data`
    pub fn success(data: Value) -> Self {
        Self {
            ret_code: codes::SUCCESS,
            description: "Success.".into(),
            data,
        }
    }

    pub fn failure(ret_code: i32, description: impl Into<String>) -> Self {
        Self {
            ret_code,
            description: description.into(),
            data: json!({}),
        }
    }

    pub fn is_success(&self) -> bool {
        self.ret_code == codes::SUCCESS
    }

    /// Decode a wire reply; an empty `data_json` reads as null
    pub fn from_reply(reply: &Reply) -> Result<Self, serde_json::Error> {
        let data = if reply.data_json.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&reply.data_json)?
        };

        Ok(Self {
            ret_code: reply.ret_code,
            description: reply.description.clone(),
            data,
        })
    }

    pub fn to_reply(&self) -> Reply {
        Reply {
            ret_code: self.ret_code,
            description: self.description.clone(),
            data_json: if self.data.is_null() {
                String::new()
            } else {
                self.data.to_string()
            },
        }
    }
}

/// A command addressed to some route, before it is put on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RpcPayload {
    pub cmd_name: String,
    pub cmd_code: String,
    pub parameters: Value,
}

impl RpcPayload {
    pub fn new(cmd_name: impl Into<String>, cmd_code: impl Into<String>, parameters: Value) -> Self {
        Self {
            cmd_name: cmd_name.into(),
            cmd_code: cmd_code.into(),
            parameters,
        }
    }

    /// `getDevice` for the device manager
    pub fn get_device(uuid: &str) -> Self {
        Self::new(
            commands::GET_DEVICE,
            commands::GET_DEVICE_CODE,
            json!({ "uuid": uuid }),
        )
    }

    /// `deviceUpdate` rewriting a device's whole scene collection
    pub fn update_scenes(uuid: &str, scenes: Value) -> Self {
        Self::new(
            commands::DEVICE_UPDATE,
            commands::DEVICE_UPDATE_CODE,
            json!({ "uuid": uuid, "extra.scenes": scenes }),
        )
    }

    /// `forward` delivering one scene command to the owning controller
    pub fn forward(command: Value) -> Self {
        Self::new(commands::FORWARD, commands::FORWARD_CODE, command)
    }

    pub fn into_request(self, route: &str) -> Request {
        Request {
            route: route.to_string(),
            cmd_name: self.cmd_name,
            cmd_code: self.cmd_code,
            parameters_json: self.parameters.to_string(),
        }
    }

    /// Decode a wire request; empty parameters read as an empty object
    pub fn from_request(request: &Request) -> Result<Self, serde_json::Error> {
        let parameters = if request.parameters_json.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&request.parameters_json)?
        };

        Ok(Self {
            cmd_name: request.cmd_name.clone(),
            cmd_code: request.cmd_code.clone(),
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_data_reads_as_null() {
        let reply = Reply {
            ret_code: 404,
            description: "no such device".into(),
            data_json: String::new(),
        };

        let response = ResponseMessage::from_reply(&reply).expect("decode");
        assert!(!response.is_success());
        assert!(response.data.is_null());
        assert_eq!(response.to_reply(), reply);
    }

    #[test]
    fn test_update_scenes_uses_dotted_key() {
        let payload = RpcPayload::update_scenes("hub-1", json!([]));
        assert_eq!(payload.cmd_name, "deviceUpdate");
        assert_eq!(payload.cmd_code, "0004");
        assert_eq!(payload.parameters["extra.scenes"], json!([]));
    }

    #[test]
    fn test_request_with_invalid_json_is_an_error() {
        let request = Request {
            route: "scene".into(),
            cmd_name: "get".into(),
            cmd_code: String::new(),
            parameters_json: "{not json".into(),
        };
        assert!(RpcPayload::from_request(&request).is_err());
    }
}
