//! Client side of the real-time event channel
//!
//! A [`RoomLink`] is the only way screens talk to the real-time server:
//! outbound events go through an mpsc queue, inbound events fan out over a
//! broadcast channel. Subscribing hands out a receiver; dropping it is the
//! unsubscribe. The transport behind it is a relay speaking newline-delimited
//! JSON frames; reconnection is the relay's job.

use crate::protocol::{ClientEvent, ServerEvent};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const INBOUND_CAPACITY: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to connect to relay at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
}

/// Cloneable handle to the real-time channel
#[derive(Clone)]
pub struct RoomLink {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    inbound: broadcast::Sender<ServerEvent>,
}

impl RoomLink {
    /// Create a link without a transport. The returned receiver yields every
    /// emitted event; inbound events are injected with [`RoomLink::deliver`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, _rx) = broadcast::channel(INBOUND_CAPACITY);
        (Self { outbound, inbound }, outbound_rx)
    }

    /// Queue an event for the server. A closed transport is logged, not fatal.
    pub fn emit(&self, event: ClientEvent) {
        tracing::debug!("Emitting {:?}", event);
        if self.outbound.send(event).is_err() {
            tracing::warn!("Real-time channel closed, dropping outbound event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inbound.subscribe()
    }

    /// Fan an inbound event out to all current subscribers
    pub fn deliver(&self, event: ServerEvent) {
        // No subscribers is fine: nobody is listening for this event right now
        let _ = self.inbound.send(event);
    }

    /// Pump newline-delimited JSON frames over an arbitrary byte stream pair
    pub fn attach<R, W>(reader: R, writer: W) -> (Self, RelayHandle)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (link, outbound_rx) = Self::new();
        let reader = tokio::spawn(read_frames(reader, link.inbound.clone()));
        let writer = tokio::spawn(write_frames(writer, outbound_rx));
        (link, RelayHandle { reader, writer })
    }

    /// Connect to the relay over TCP
    pub async fn connect(addr: &str) -> Result<(Self, RelayHandle), ChannelError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ChannelError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        tracing::info!("Connected to relay at {}", addr);

        let (read_half, write_half) = stream.into_split();
        Ok(Self::attach(read_half, write_half))
    }
}

/// Owns the transport pump tasks
pub struct RelayHandle {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RelayHandle {
    /// Stop both pumps immediately
    pub fn shutdown(self) {
        self.reader.abort();
        self.writer.abort();
    }

    /// Wait until the server side closes the stream
    pub async fn closed(&mut self) {
        let _ = (&mut self.reader).await;
    }
}

async fn read_frames<R>(reader: R, inbound: broadcast::Sender<ServerEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ServerEvent>(line) {
                    Ok(event) => {
                        tracing::debug!("Received {:?}", event);
                        let _ = inbound.send(event);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping undecodable frame: {} ({})", line, e);
                    }
                }
            }
            Ok(None) => {
                tracing::info!("Relay closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!("Relay read failed: {}", e);
                break;
            }
        }
    }
}

async fn write_frames<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<ClientEvent>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = outbound.recv().await {
        let mut frame = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode {:?}: {}", event, e);
                continue;
            }
        };
        frame.push('\n');

        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            tracing::error!("Relay write failed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::error!("Relay flush failed: {}", e);
            break;
        }
    }
}
