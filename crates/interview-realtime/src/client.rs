use crate::client::backoff::Backoff;
use crate::client::codec::Packet;
use crate::client::stats::Stats;
use crate::types;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

pub mod codec;
pub(crate) mod config;
mod backoff;
mod consts;
pub(crate) mod stats;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// The seam the session layer talks to. Implemented by [`Client`]; mocked in tests.
#[async_trait]
pub trait RealtimeClient: Send {
    /// Queue an outbound event. Events queued while the socket is down are
    /// flushed after the next namespace connect.
    async fn send_event(&mut self, event: types::ClientEvent) -> Result<()>;

    /// Subscribe to decoded inbound events.
    async fn server_events(&mut self) -> Result<ServerRx>;

    /// Stop reconnecting and close the socket. Idempotent.
    fn close(&mut self);
}

// Why a connection attempt ended.
enum ConnectionEnd {
    Shutdown,
    Lost(String),
}

// Holds the channel capacity, client/server transmitters, configuration,
// the shutdown signal for the socket supervisor, and stats guarded by a Mutex.
pub struct Client {
    capacity: usize,
    config: Arc<config::Config>,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    // Subscribed before the supervisor starts so the first `connect` is never missed.
    first_rx: Option<ServerRx>,
    shutdown: Option<tokio::sync::watch::Sender<bool>>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config: Arc::new(config),
            c_tx: None,
            s_tx: None,
            first_rx: None,
            shutdown: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    fn connect(&mut self) -> Result<()> {
        // Ensure that we haven't already connected.
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        // Outbound events are buffered here until the namespace is connected.
        let (c_tx, c_rx) = tokio::sync::mpsc::channel(self.capacity);
        // Inbound events are broadcast to every subscriber.
        let (s_tx, first_rx) = tokio::sync::broadcast::channel(self.capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());
        self.first_rx = Some(first_rx);
        self.shutdown = Some(shutdown_tx);

        tokio::spawn(supervise(
            self.config.clone(),
            c_rx,
            s_tx,
            shutdown_rx,
            self.stats.clone(),
        ));
        Ok(())
    }

    // Return a stats object that we can use to inspect the stats.
    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }
}

#[async_trait]
impl RealtimeClient for Client {
    async fn send_event(&mut self, event: types::ClientEvent) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(event).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    async fn server_events(&mut self) -> Result<ServerRx> {
        if let Some(rx) = self.first_rx.take() {
            return Ok(rx);
        }
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The supervisor may already be gone; nothing left to stop then.
            let _ = shutdown.send(true);
            tracing::debug!("realtime client closing");
        }
        self.c_tx = None;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

// Keeps one socket alive at a time, reconnecting with backoff until shut down.
async fn supervise(
    config: Arc<config::Config>,
    mut c_rx: tokio::sync::mpsc::Receiver<types::ClientEvent>,
    s_tx: ServerTx,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
    stats: Arc<Mutex<Stats>>,
) {
    let mut backoff = Backoff::new(config.reconnect_delay(), config.reconnect_delay_max());

    loop {
        let end = run_connection(&config, &mut c_rx, &s_tx, &mut shutdown, &stats, &mut backoff)
            .await
            .unwrap_or_else(|e| ConnectionEnd::Lost(e.to_string()));

        let reason = match end {
            ConnectionEnd::Shutdown => {
                tracing::info!("realtime client shut down");
                break;
            }
            ConnectionEnd::Lost(reason) => reason,
        };

        tracing::warn!("connection lost: {}", reason);
        if let Ok(mut stats_guard) = stats.lock() {
            stats_guard.record_disconnect();
        }
        if let Err(e) = s_tx.send(types::ServerEvent::Close {
            reason: Some(reason),
        }) {
            tracing::debug!("no subscriber for close event: {}", e);
        }

        if let Some(max) = config.reconnect_attempts() {
            if backoff.attempts() >= max {
                tracing::error!("giving up after {} reconnection attempts", max);
                break;
            }
        }

        let delay = backoff.next_delay();
        tracing::info!("reconnecting in {:?} (attempt {})", delay, backoff.attempts());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                tracing::info!("realtime client shut down while waiting to reconnect");
                break;
            }
        }
    }
}

async fn run_connection(
    config: &config::Config,
    c_rx: &mut tokio::sync::mpsc::Receiver<types::ClientEvent>,
    s_tx: &ServerTx,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
    stats: &Arc<Mutex<Stats>>,
    backoff: &mut Backoff,
) -> Result<ConnectionEnd> {
    if *shutdown.borrow() {
        return Ok(ConnectionEnd::Shutdown);
    }

    let request = utils::build_request(config)?;
    let (ws_stream, _) = tokio::select! {
        connected = tokio::time::timeout(config.connect_timeout(), tokio_tungstenite::connect_async(request)) => {
            connected.map_err(|_| anyhow::anyhow!("connect timed out"))??
        }
        _ = shutdown.changed() => return Ok(ConnectionEnd::Shutdown),
    };
    tracing::debug!("websocket opened");

    let (mut write, mut read) = ws_stream.split();
    let mut namespace_connected = false;
    // Until the handshake tells us the heartbeat interval, the connect timeout applies.
    let heartbeat = tokio::time::sleep(config.connect_timeout());
    tokio::pin!(heartbeat);
    let mut heartbeat_window = config.connect_timeout();

    loop {
        tokio::select! {
            message = read.next() => {
                let message = match message {
                    None => return Ok(ConnectionEnd::Lost("stream ended".to_string())),
                    Some(Err(e)) => {
                        tracing::error!("failed to read message: {}", e);
                        return Ok(ConnectionEnd::Lost(e.to_string()));
                    }
                    Some(Ok(message)) => message,
                };
                match message {
                    Message::Text(text) => match codec::decode(&text) {
                        Ok(Packet::Open(handshake)) => {
                            tracing::debug!("engine.io open: sid={}", handshake.sid);
                            heartbeat_window = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                            heartbeat.as_mut().reset(tokio::time::Instant::now() + heartbeat_window);
                            let connect = codec::encode_connect(config.token().expose_secret());
                            write.send(Message::Text(connect)).await?;
                        }
                        Ok(Packet::Ping) => {
                            heartbeat.as_mut().reset(tokio::time::Instant::now() + heartbeat_window);
                            write.send(Message::Text(codec::PONG.to_string())).await?;
                        }
                        Ok(Packet::Connect { sid }) => {
                            tracing::info!("namespace connected: sid={:?}", sid);
                            namespace_connected = true;
                            backoff.reset();
                            if let Ok(mut stats_guard) = stats.lock() {
                                stats_guard.record_connect();
                            }
                            if let Err(e) = s_tx.send(types::ServerEvent::Connected { sid }) {
                                tracing::error!("failed to send event: {}", e);
                            }
                        }
                        Ok(Packet::Event(event)) => {
                            tracing::debug!("received message: {}", event.name());
                            if let Ok(mut stats_guard) = stats.lock() {
                                stats_guard.record_received();
                            }
                            if let Err(e) = s_tx.send(event) {
                                tracing::error!("failed to send event: {}", e);
                            }
                        }
                        Ok(Packet::ConnectError(message)) => {
                            tracing::error!("namespace connect refused: {}", message);
                            let event = types::ServerEvent::Error(
                                types::events::server::ErrorEvent::new(&message),
                            );
                            if let Err(e) = s_tx.send(event) {
                                tracing::error!("failed to send event: {}", e);
                            }
                            return Ok(ConnectionEnd::Lost(message));
                        }
                        Ok(Packet::Disconnect) => {
                            return Ok(ConnectionEnd::Lost("server disconnected the namespace".to_string()));
                        }
                        Ok(Packet::Close) => {
                            return Ok(ConnectionEnd::Lost("server closed the transport".to_string()));
                        }
                        Ok(Packet::Pong) | Ok(Packet::Noop) => {}
                        Err(e) => {
                            tracing::error!("failed to decode frame: {}, text=> {:?}", e, text);
                        }
                    },
                    // We received a binary message; the interview server never sends attachments.
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        return Ok(ConnectionEnd::Lost(
                            reason.map(|v| format!("{:?}", v)).unwrap_or_else(|| "closed".to_string()),
                        ));
                    }
                    _ => {}
                }
            }
            event = c_rx.recv(), if namespace_connected => {
                let Some(event) = event else {
                    // Every sender is gone: the owning client was dropped.
                    let _ = write.send(Message::Text(codec::DISCONNECT.to_string())).await;
                    let _ = write.close().await;
                    return Ok(ConnectionEnd::Shutdown);
                };
                match codec::encode_event(&event) {
                    Ok(text) => {
                        tracing::debug!("sending event: {}", event.name());
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            return Ok(ConnectionEnd::Lost(e.to_string()));
                        }
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_sent();
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            _ = &mut heartbeat => {
                return Ok(ConnectionEnd::Lost("heartbeat timed out".to_string()));
            }
            _ = shutdown.changed() => {
                if namespace_connected {
                    let _ = write.send(Message::Text(codec::DISCONNECT.to_string())).await;
                }
                let _ = write.close().await;
                return Ok(ConnectionEnd::Shutdown);
            }
        }
    }
}

// Public function to create a client with a specific config and start connecting.
pub async fn connect_with_config(capacity: usize, config: config::Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect()?;
    Ok(client)
}

// Public function to connect with default settings.
pub async fn connect() -> Result<Client> {
    let config = config::Config::new();
    connect_with_config(consts::DEFAULT_CAPACITY, config).await
}
