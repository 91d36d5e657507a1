//! Protobuf wire messages
//!
//! Every frame on the wire is an [`Envelope`]: a [`Header`] plus either a
//! [`Request`] or a [`Reply`]. JSON bodies travel as strings so that
//! arbitrary command parameters survive the trip untouched.

/// Kind of message carried by an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    MsgUnknown = 0,
    MsgRequest = 1,
    MsgReply = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Identity of the sending peer
    #[prost(string, tag = "1")]
    pub sender: String,

    /// Correlates a reply with its request
    #[prost(uint64, tag = "2")]
    pub request_id: u64,

    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,

    #[prost(enumeration = "MessageType", tag = "4")]
    pub msg_type: i32,
}

/// An RPC call addressed to a route (a device manager instance or a device)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub route: String,

    #[prost(string, tag = "2")]
    pub cmd_name: String,

    #[prost(string, tag = "3")]
    pub cmd_code: String,

    /// JSON-encoded parameters
    #[prost(string, tag = "4")]
    pub parameters_json: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reply {
    #[prost(int32, tag = "1")]
    pub ret_code: i32,

    #[prost(string, tag = "2")]
    pub description: String,

    /// JSON-encoded data, empty when there is none
    #[prost(string, tag = "3")]
    pub data_json: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,

    #[prost(oneof = "envelope::Payload", tags = "2, 3")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Request(super::Request),

        #[prost(message, tag = "3")]
        Reply(super::Reply),
    }
}
