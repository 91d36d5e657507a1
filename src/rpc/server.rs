//! Inbound RPC server: peers send scene operations, get one reply per request

use crate::handlers::SceneService;
use anyhow::Result;
use scene_shared::{
    codec::{self, FrameDecoder},
    envelope, Envelope,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Accept peers forever, one task per connection
pub async fn serve(listener: TcpListener, service: Arc<SceneService>) -> Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Peer connected: {}", addr);

        let service = service.clone();
        tokio::spawn(async move {
            match handle_peer(socket, addr, service).await {
                Ok(()) => info!("Peer disconnected: {}", addr),
                Err(e) => warn!("Dropping peer {}: {}", addr, e),
            }
        });
    }
}

/// Read requests from one peer; each request is handled in its own task so a
/// long scene run does not hold up the next request
async fn handle_peer(stream: TcpStream, addr: SocketAddr, service: Arc<SceneService>) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        let n = reader.read(&mut read_buf).await?;
        if n == 0 {
            return Ok(());
        }
        decoder.extend(&read_buf[..n]);

        while let Some(envelope) = decoder.decode_next()? {
            let request_id = envelope.request_id();
            let request = match envelope.payload {
                Some(envelope::Payload::Request(request)) => request,
                _ => {
                    debug!("Ignoring non-request envelope {} from {}", request_id, addr);
                    continue;
                }
            };

            let service = service.clone();
            let writer = writer.clone();
            tokio::spawn(async move {
                let response = service.handle(&request).await;
                let reply = Envelope::reply(service.service_id(), request_id, response.to_reply());
                if let Err(e) = send_reply(&writer, &reply).await {
                    error!("Failed to reply to {} (request_id={}): {}", addr, request_id, e);
                }
            });
        }
    }
}

async fn send_reply(writer: &Mutex<OwnedWriteHalf>, reply: &Envelope) -> Result<()> {
    let encoded = codec::encode(reply)?;
    writer.lock().await.write_all(&encoded).await?;
    Ok(())
}
