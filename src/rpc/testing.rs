//! In-memory transport for tests
//!
//! Plays both the device manager (`getDevice`, `deviceUpdate`) and the owning
//! controller (`forward`), recording every forwarded command with its start
//! and end instants.

use crate::rpc::traits::{RpcTransport, TransportError};
use async_trait::async_trait;
use scene_shared::{codes, commands, ExecutionMode, ResponseMessage, RpcPayload};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEVICE_ID: &str = "hub-1";
pub const OWNER: &str = "gateway-1";

#[derive(Debug, Clone)]
pub struct ForwardCall {
    pub route: String,
    pub command: Value,
    pub started: Instant,
    pub finished: Instant,
}

impl ForwardCall {
    pub fn uuid(&self) -> &str {
        self.command["uuid"].as_str().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct FakeTransport {
    devices: Mutex<HashMap<String, Value>>,
    device_error: Option<(i32, String)>,
    failures: HashMap<String, (i32, String)>,
    reply_data: HashMap<String, Value>,
    forward_delay: Duration,
    forwards: Mutex<Vec<ForwardCall>>,
    updates: Mutex<Vec<Value>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: Value) -> Self {
        let uuid = device["uuid"].as_str().unwrap_or_default().to_string();
        self.devices
            .lock()
            .expect("devices lock")
            .insert(uuid, device);
        self
    }

    /// Every `getDevice` answers with this error
    pub fn with_device_error(mut self, ret_code: i32, description: &str) -> Self {
        self.device_error = Some((ret_code, description.to_string()));
        self
    }

    /// Forwarding the command tagged `uuid` fails with `ret_code`
    pub fn failing(mut self, uuid: &str, ret_code: i32, description: &str) -> Self {
        self.failures
            .insert(uuid.to_string(), (ret_code, description.to_string()));
        self
    }

    /// Forwarding the command tagged `uuid` replies with `data`
    pub fn replying(mut self, uuid: &str, data: Value) -> Self {
        self.reply_data.insert(uuid.to_string(), data);
        self
    }

    pub fn with_forward_delay(mut self, delay: Duration) -> Self {
        self.forward_delay = delay;
        self
    }

    /// Forwards in completion order
    pub fn forwards(&self) -> Vec<ForwardCall> {
        self.forwards.lock().expect("forwards lock").clone()
    }

    pub fn forwarded_uuids(&self) -> Vec<String> {
        self.forwards().iter().map(|c| c.uuid().to_string()).collect()
    }

    /// Parameters of every `deviceUpdate` received
    pub fn updates(&self) -> Vec<Value> {
        self.updates.lock().expect("updates lock").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn get_device(&self, parameters: &Value) -> ResponseMessage {
        if let Some((ret_code, description)) = &self.device_error {
            return ResponseMessage::failure(*ret_code, description.clone());
        }

        let uuid = parameters["uuid"].as_str().unwrap_or_default();
        match self.devices.lock().expect("devices lock").get(uuid) {
            // The real device manager answers with a one-element array
            Some(device) => ResponseMessage::success(json!([device])),
            None => ResponseMessage::failure(codes::DEVICE_NOT_FOUND, format!("device {uuid} not found")),
        }
    }

    fn device_update(&self, parameters: Value) -> ResponseMessage {
        let uuid = parameters["uuid"].as_str().unwrap_or_default().to_string();
        if let Some(device) = self.devices.lock().expect("devices lock").get_mut(&uuid) {
            device["extra"]["scenes"] = parameters["extra.scenes"].clone();
        }
        self.updates.lock().expect("updates lock").push(parameters);
        ResponseMessage::success(json!({}))
    }

    async fn forward(&self, route: &str, command: Value) -> ResponseMessage {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let started = Instant::now();

        if !self.forward_delay.is_zero() {
            tokio::time::sleep(self.forward_delay).await;
        }

        let finished = Instant::now();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let uuid = command["uuid"].as_str().unwrap_or_default().to_string();
        self.forwards.lock().expect("forwards lock").push(ForwardCall {
            route: route.to_string(),
            command,
            started,
            finished,
        });

        match self.failures.get(&uuid) {
            Some((ret_code, description)) => ResponseMessage::failure(*ret_code, description.clone()),
            None => ResponseMessage::success(
                self.reply_data
                    .get(&uuid)
                    .cloned()
                    .unwrap_or_else(|| json!({ "acknowledged": uuid })),
            ),
        }
    }
}

#[async_trait]
impl RpcTransport for FakeTransport {
    async fn call(&self, route: &str, payload: RpcPayload) -> Result<ResponseMessage, TransportError> {
        let response = match payload.cmd_name.as_str() {
            commands::GET_DEVICE => self.get_device(&payload.parameters),
            commands::DEVICE_UPDATE => self.device_update(payload.parameters),
            commands::FORWARD => self.forward(route, payload.parameters).await,
            other => ResponseMessage::failure(codes::UNKNOWN_OPERATION, format!("unknown command {other}")),
        };
        Ok(response)
    }
}

/// Transport whose broker is never reachable
pub struct DownTransport;

#[async_trait]
impl RpcTransport for DownTransport {
    async fn call(&self, _route: &str, _payload: RpcPayload) -> Result<ResponseMessage, TransportError> {
        Err(TransportError::Unavailable("broker unreachable".into()))
    }
}

/// Stored scene JSON with one `setPower` command per uuid
pub fn scene_json(scene_id: &str, mode: ExecutionMode, command_uuids: &[&str]) -> Value {
    let commands: Vec<Value> = command_uuids
        .iter()
        .map(|uuid| {
            json!({
                "uuid": uuid,
                "deviceType": "switch",
                "cmd": {"cmdName": "setPower", "cmdCode": "0101", "parameters": {"on": false}}
            })
        })
        .collect();

    json!({
        "sceneId": scene_id,
        "name": format!("scene {scene_id}"),
        "description": "test scene",
        "type": "home",
        "notify": false,
        "mode": mode,
        "commands": commands
    })
}

/// Device record for [`DEVICE_ID`] owned by [`OWNER`]
pub fn device_json(scenes: Vec<Value>) -> Value {
    json!({
        "uuid": DEVICE_ID,
        "owner": OWNER,
        "extra": { "scenes": scenes }
    })
}
