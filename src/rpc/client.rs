//! Broker client with a persistent connection and automatic reconnection

use crate::config::ServiceConfig;
use crate::rpc::traits::{RpcTransport, TransportError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use scene_shared::{
    codec::{self, FrameDecoder},
    envelope, Envelope, Reply, ResponseMessage, RpcPayload,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Replies awaited by in-flight calls, keyed by request id
type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Encoded request frame tagged with its request id
type OutboundFrame = (u64, Bytes);

/// Connection settings the background loop needs
#[derive(Debug, Clone)]
struct LinkSettings {
    broker_addr: String,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
}

/// RPC client multiplexing concurrent calls over one broker connection
pub struct RpcClient {
    sender_id: String,
    request_timeout: Duration,
    next_request_id: AtomicU64,
    /// Encoded frames waiting to be written
    outbound_tx: mpsc::Sender<OutboundFrame>,
    pending: PendingReplies,
    /// Set while a broker connection is up
    connected: Arc<AtomicBool>,
}

impl RpcClient {
    /// Create the client and start the connection loop
    pub fn connect(config: &ServiceConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(256);
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(false));

        let settings = LinkSettings {
            broker_addr: config.broker_addr.clone(),
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
            max_reconnect_delay: config.max_reconnect_delay,
        };
        let pending_clone = pending.clone();
        let connected_clone = connected.clone();
        tokio::spawn(async move {
            connection_loop(settings, outbound_rx, pending_clone, connected_clone).await;
        });

        Self {
            sender_id: config.service_id.clone(),
            request_timeout: config.request_timeout,
            next_request_id: AtomicU64::new(0),
            outbound_tx,
            pending,
            connected,
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl RpcTransport for RpcClient {
    async fn call(&self, route: &str, payload: RpcPayload) -> Result<ResponseMessage, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("not connected to broker".into()));
        }

        let request_id = self.next_request_id();
        let cmd_name = payload.cmd_name.clone();
        let envelope = Envelope::request(&self.sender_id, request_id, payload.into_request(route));
        let frame = codec::encode(&envelope)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, reply_tx);

        if self.outbound_tx.send((request_id, frame)).await.is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(TransportError::Unavailable("connection task stopped".into()));
        }

        debug!("Sent {} to {} (request_id={})", cmd_name, route, request_id);

        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => ResponseMessage::from_reply(&reply)
                .map_err(|e| TransportError::MalformedReply(e.to_string())),
            Ok(Err(_)) => Err(TransportError::Unavailable(
                "connection to broker lost before reply".into(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(TransportError::Timeout {
                    route: route.to_string(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    settings: LinkSettings,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    pending: PendingReplies,
    connected: Arc<AtomicBool>,
) {
    let mut reconnect_delay = settings.reconnect_delay;

    loop {
        match timeout(settings.connect_timeout, TcpStream::connect(&settings.broker_addr)).await {
            Ok(Ok(stream)) => {
                reconnect_delay = settings.reconnect_delay;
                connected.store(true, Ordering::SeqCst);
                info!("Connected to broker at {}", settings.broker_addr);

                match handle_connection(stream, &mut outbound_rx, &pending).await {
                    Ok(()) => {
                        info!("RPC client dropped, closing broker connection");
                        return;
                    }
                    Err(reason) => {
                        warn!("Disconnected from broker: {}", reason);
                    }
                }

                connected.store(false, Ordering::SeqCst);
                // Whoever was waiting on this connection will never get a reply
                pending.lock().await.clear();
            }
            Ok(Err(e)) => {
                warn!("Failed to connect to broker {}: {}", settings.broker_addr, e);
            }
            Err(_) => {
                warn!("Timed out connecting to broker {}", settings.broker_addr);
            }
        }

        tokio::time::sleep(reconnect_delay).await;

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, settings.max_reconnect_delay);
    }
}

/// Pump one live connection
///
/// Returns `Ok(())` once the client side has gone away, `Err` when the
/// connection broke.
async fn handle_connection(
    stream: TcpStream,
    outbound_rx: &mut mpsc::Receiver<OutboundFrame>,
    pending: &PendingReplies,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some((request_id, frame)) = frame else {
                    return Ok(());
                };
                // Queued during an outage whose caller has already been failed
                if !pending.lock().await.contains_key(&request_id) {
                    debug!("Dropping stale request {}", request_id);
                    continue;
                }
                writer.write_all(&frame).await?;
            }

            result = reader.read(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    return Err(anyhow!("Broker closed connection"));
                }

                decoder.extend(&read_buf[..n]);
                while let Some(envelope) = decoder.decode_next()? {
                    deliver_reply(envelope, pending).await;
                }
            }
        }
    }
}

async fn deliver_reply(envelope: Envelope, pending: &PendingReplies) {
    let request_id = envelope.request_id();

    match envelope.payload {
        Some(envelope::Payload::Reply(reply)) => {
            match pending.lock().await.remove(&request_id) {
                Some(waiter) => {
                    // The caller may have timed out in the meantime
                    let _ = waiter.send(reply);
                }
                None => debug!("Reply for unknown request {}", request_id),
            }
        }
        Some(envelope::Payload::Request(request)) => {
            debug!("Ignoring unsolicited {} request from broker", request.cmd_name);
        }
        None => debug!("Envelope {} without payload", request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use scene_shared::codes;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn config_for(addr: String, request_timeout: Duration) -> ServiceConfig {
        ServiceConfig {
            broker_addr: addr,
            request_timeout,
            reconnect_delay: Duration::from_millis(20),
            max_reconnect_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    async fn wait_connected(client: &RpcClient) {
        for _ in 0..200 {
            if client.connected.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("client never connected to the broker");
    }

    /// Read request envelopes until the peer hangs up
    async fn read_requests(socket: &mut TcpStream) -> Vec<Envelope> {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; 4096];
        let mut seen = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                return seen;
            }
            decoder.extend(&buf[..n]);
            while let Some(envelope) = decoder.decode_next().expect("decode") {
                seen.push(envelope);
            }
        }
    }

    /// Broker that answers every request with `{"route": <route>}` and
    /// reports each request's parameters on `seen`
    fn spawn_echo_broker_on(listener: TcpListener, seen: mpsc::UnboundedSender<Value>) {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut decoder = FrameDecoder::new();
            let mut buf = vec![0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    return;
                }
                decoder.extend(&buf[..n]);
                while let Some(envelope) = decoder.decode_next().expect("decode") {
                    let request_id = envelope.request_id();
                    let Some(envelope::Payload::Request(request)) = envelope.payload else {
                        continue;
                    };
                    let parameters = serde_json::from_str(&request.parameters_json).expect("parameters");
                    let _ = seen.send(parameters);
                    let reply = ResponseMessage::success(json!({ "route": request.route }));
                    let frame = codec::encode(&Envelope::reply("broker", request_id, reply.to_reply()))
                        .expect("encode");
                    socket.write_all(&frame).await.expect("write");
                }
            }
        });
    }

    async fn spawn_echo_broker() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let (seen, _) = mpsc::unbounded_channel();
        spawn_echo_broker_on(listener, seen);
        addr
    }

    #[tokio::test]
    async fn test_call_receives_matching_reply() {
        let addr = spawn_echo_broker().await;
        let client = RpcClient::connect(&config_for(addr, Duration::from_secs(2)));
        wait_connected(&client).await;

        let first = client
            .call("device-manager", RpcPayload::get_device("hub-1"))
            .await
            .expect("reply");
        let second = client
            .call("gateway-1", RpcPayload::forward(json!({})))
            .await
            .expect("reply");

        assert!(first.is_success());
        assert_eq!(first.data["route"], "device-manager");
        assert_eq!(second.data["route"], "gateway-1");
    }

    #[tokio::test]
    async fn test_silent_broker_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        tokio::spawn(async move {
            // Accept and read, never answer
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut sink = BytesMut::with_capacity(1024);
            while socket.read_buf(&mut sink).await.map(|n| n > 0).unwrap_or(false) {}
        });

        let client = RpcClient::connect(&config_for(addr, Duration::from_millis(100)));
        wait_connected(&client).await;
        let err = client
            .call("device-manager", RpcPayload::get_device("hub-1"))
            .await
            .expect_err("should time out");

        assert!(matches!(err, TransportError::Timeout { .. }));
        assert_eq!(err.ret_code(), codes::TRANSPORT_TIMEOUT);
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_call_without_broker_fails_fast_and_is_never_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = RpcClient::connect(&config_for(addr.to_string(), Duration::from_secs(2)));
        let err = client
            .call("gateway-1", RpcPayload::forward(json!({"uuid": "c-1"})))
            .await
            .expect_err("no broker yet");
        assert_eq!(err.ret_code(), codes::TRANSPORT_UNAVAILABLE);

        let listener = TcpListener::bind(addr).await.expect("rebind");
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        spawn_echo_broker_on(listener, seen_tx);
        wait_connected(&client).await;

        let reply = client
            .call("gateway-1", RpcPayload::forward(json!({"uuid": "c-2"})))
            .await
            .expect("reply");
        assert!(reply.is_success());

        let first = seen_rx.recv().await.expect("broker saw a request");
        assert_eq!(first["uuid"], "c-2");
        assert!(seen_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_of_abandoned_calls_are_not_written() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            read_requests(&mut socket).await
        });

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(8);
        for request_id in [1u64, 2] {
            let request = RpcPayload::forward(json!({})).into_request("gateway-1");
            let frame = codec::encode(&Envelope::request("scene-service", request_id, request)).expect("encode");
            outbound_tx.send((request_id, frame)).await.expect("queue");
        }
        // Only request 2 still has a caller waiting
        let (reply_tx, _reply_rx) = oneshot::channel();
        pending.lock().await.insert(2, reply_tx);
        drop(outbound_tx);

        let stream = TcpStream::connect(addr).await.expect("connect");
        handle_connection(stream, &mut outbound_rx, &pending)
            .await
            .expect("closes cleanly once the client is gone");

        let written: Vec<_> = broker.await.expect("broker").iter().map(Envelope::request_id).collect();
        assert_eq!(written, vec![2]);
    }
}
