//! Scene Service Shared Protocol Types
//!
//! This crate provides the wire protocol, codec and scene data model shared
//! by the scene service and the device manager it talks to.

pub mod codec;
pub mod message;
pub mod model;
pub mod proto;

use std::time::{SystemTime, UNIX_EPOCH};

pub use message::{ResponseMessage, RpcPayload};
pub use model::{
    CommandPayload, CommandSpec, DeviceExtra, DeviceRecord, ExecutionMode, ExecutionResult,
    OverallStatus, Scene, SceneExecutionOutcome, stored_scene_id,
};
pub use proto::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Return codes used in `retCode`
pub mod codes {
    pub const SUCCESS: i32 = 200;

    /// Request failed shape validation
    pub const VALIDATION_FAILED: i32 = 400;

    /// Device manager has no record for the uuid
    pub const DEVICE_NOT_FOUND: i32 = 404;

    /// Operation name not served by this peer
    pub const UNKNOWN_OPERATION: i32 = 405;

    /// Remote side failed while handling the request
    pub const INTERNAL_ERROR: i32 = 500;

    /// No connection to the broker, or it closed mid-request
    pub const TRANSPORT_UNAVAILABLE: i32 = 503;

    /// No reply within the transport's request timeout
    pub const TRANSPORT_TIMEOUT: i32 = 504;

    /// No scene with the requested id on the device
    pub const SCENE_NOT_FOUND: i32 = 208001;

    /// Device record could not be used (empty, malformed, or without owner)
    pub const DEVICE_RECORD_INVALID: i32 = 208002;
}

/// RPC command names and codes
pub mod commands {
    pub const FORWARD: &str = "forward";
    pub const FORWARD_CODE: &str = "0001";

    pub const GET_DEVICE: &str = "getDevice";
    pub const GET_DEVICE_CODE: &str = "0003";

    pub const DEVICE_UPDATE: &str = "deviceUpdate";
    pub const DEVICE_UPDATE_CODE: &str = "0004";
}

/// Timing and sizing defaults
pub mod timing {
    /// Time a caller waits for a reply before giving up
    pub const REQUEST_TIMEOUT_MS: u64 = 5000;

    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Initial reconnection delay, doubled up to the maximum
    pub const RECONNECT_DELAY_MS: u64 = 1000;

    pub const MAX_RECONNECT_DELAY_MS: u64 = 30000;

    /// Upper bound on in-flight forwards for one PARALLEL run
    pub const MAX_PARALLEL_COMMANDS: usize = 8;
}

impl Header {
    /// Create a new header for the given sender and message type
    pub fn new(sender: impl Into<String>, msg_type: MessageType, request_id: u64) -> Self {
        Self {
            sender: sender.into(),
            request_id,
            timestamp_ms: now_ms(),
            msg_type: msg_type.into(),
        }
    }
}

impl Envelope {
    /// Wrap a request for the wire
    pub fn request(sender: &str, request_id: u64, request: Request) -> Self {
        Self {
            header: Some(Header::new(sender, MessageType::MsgRequest, request_id)),
            payload: Some(envelope::Payload::Request(request)),
        }
    }

    /// Wrap a reply to `request_id`
    pub fn reply(sender: &str, request_id: u64, reply: Reply) -> Self {
        Self {
            header: Some(Header::new(sender, MessageType::MsgReply, request_id)),
            payload: Some(envelope::Payload::Reply(reply)),
        }
    }

    /// Request id from the header, zero when the header is missing
    pub fn request_id(&self) -> u64 {
        self.header.as_ref().map(|h| h.request_id).unwrap_or_default()
    }
}
