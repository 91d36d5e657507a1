//! Frame codec shared by the scene service, its peers and the broker
//!
//! A frame on the wire is a big-endian `u32` body length followed by that
//! many bytes of protobuf-encoded [`Envelope`]:
//! ```text
//! | len: u32 BE | Envelope (len bytes) |
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::Envelope;

/// Size of the length prefix in bytes
const PREFIX_LEN: usize = 4;

/// Largest envelope body accepted in either direction (10 MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("envelope of {0} bytes exceeds the {MAX_MESSAGE_SIZE} byte frame limit")]
    FrameTooLarge(usize),

    #[error("peer announced a {0} byte frame, over the limit")]
    PrefixTooLarge(u32),

    #[error("undecodable envelope: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("envelope encoding failed: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Serialize `envelope` as one complete frame
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let body_len = envelope.encoded_len();
    let prefix = u32::try_from(body_len)
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_SIZE)
        .ok_or(CodecError::FrameTooLarge(body_len))?;

    let mut frame = BytesMut::with_capacity(PREFIX_LEN + body_len);
    frame.put_u32(prefix);
    envelope.encode(&mut frame)?;
    Ok(frame.freeze())
}

/// Take the first complete frame off `buf`
///
/// A partial frame yields `Ok(None)` and leaves `buf` as it was, so callers
/// can append more bytes and try again.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    let Some(mut prefix) = buf.get(..PREFIX_LEN) else {
        return Ok(None);
    };

    let body_len = prefix.get_u32();
    if body_len > MAX_MESSAGE_SIZE {
        return Err(CodecError::PrefixTooLarge(body_len));
    }

    let body_len = body_len as usize;
    if buf.len() < PREFIX_LEN + body_len {
        return Ok(None);
    }

    let mut frame = buf.split_to(PREFIX_LEN + body_len);
    frame.advance(PREFIX_LEN);
    Ok(Some(Envelope::decode(frame.freeze())?))
}

/// Reassembles frames from arbitrarily split socket reads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Next complete envelope, if one has fully arrived
    ///
    /// Loop until `Ok(None)`: a single read may carry several frames.
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.pending)
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }
}
