//! One connected peer: read request frames, answer each with a reply

use crate::router::Router;
use anyhow::Result;
use scene_shared::{
    codec::{self, FrameDecoder},
    envelope, Envelope,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error};

pub struct PeerSession {
    addr: SocketAddr,
    reader: ReadHalf<TcpStream>,
    writer: Arc<Mutex<WriteHalf<TcpStream>>>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl PeerSession {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            addr,
            reader,
            writer: Arc::new(Mutex::new(writer)),
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }

    /// Read the next envelope; `Ok(None)` once the peer hangs up
    pub async fn recv(&mut self) -> Result<Option<Envelope>> {
        loop {
            if let Some(envelope) = self.decoder.decode_next()? {
                return Ok(Some(envelope));
            }

            let n = self.reader.read(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    /// Serve requests until the peer disconnects
    ///
    /// Each request is answered from its own task, so replies may go out in a
    /// different order than the requests came in.
    pub async fn run(mut self, router: Arc<Router>, sender_id: Arc<str>) -> Result<()> {
        while let Some(envelope) = self.recv().await? {
            let request_id = envelope.request_id();
            let Some(envelope::Payload::Request(request)) = envelope.payload else {
                debug!("Ignoring non-request envelope {} from {}", request_id, self.addr);
                continue;
            };

            let router = router.clone();
            let writer = self.writer.clone();
            let sender_id = sender_id.clone();
            let addr = self.addr;
            tokio::spawn(async move {
                let response = router.handle(&request).await;
                let reply = Envelope::reply(&sender_id, request_id, response.to_reply());
                if let Err(e) = send(&writer, &reply).await {
                    error!("Failed to reply to {} (request_id={}): {}", addr, request_id, e);
                }
            });
        }
        Ok(())
    }
}

async fn send(writer: &Mutex<WriteHalf<TcpStream>>, envelope: &Envelope) -> Result<()> {
    let encoded = codec::encode(envelope)?;
    writer.lock().await.write_all(&encoded).await?;
    Ok(())
}
