//! Transport trait abstraction for the RPC channel

use async_trait::async_trait;
use scene_shared::{codec::CodecError, codes, ResponseMessage, RpcPayload};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("no reply from {route} within {timeout_ms}ms")]
    Timeout { route: String, timeout_ms: u64 },

    #[error("failed to encode request: {0}")]
    Encode(#[from] CodecError),

    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl TransportError {
    pub fn ret_code(&self) -> i32 {
        match self {
            TransportError::Unavailable(_) => codes::TRANSPORT_UNAVAILABLE,
            TransportError::Timeout { .. } => codes::TRANSPORT_TIMEOUT,
            TransportError::Encode(_) | TransportError::MalformedReply(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Fold the failure into the same shape a remote error reply has
    pub fn into_response(self) -> ResponseMessage {
        ResponseMessage::failure(self.ret_code(), self.to_string())
    }
}

/// Request/reply channel to routes (device manager instances or devices)
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send `payload` to `route` and wait for its reply
    ///
    /// Remote non-200 replies are returned as `Ok`; `Err` means no usable
    /// reply arrived.
    async fn call(&self, route: &str, payload: RpcPayload) -> Result<ResponseMessage, TransportError>;
}
