use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn, Instrument};
use crate::config::exchange::Credentials;
use crate::config::retry::RetryPolicy;
use crate::decoder::{Decoded, ExchangeAdapter, ExchangeProtocol, Keepalive, LoginAck, MessageDecoder};
use crate::error::{Error, Result};
use crate::ingest::backoff::Backoff;
use crate::ingest::sharder::Shard;
use crate::ingest::state::ConnectionState;
use crate::ingest::{RequestOp, SubscriptionRequest, Topic};
use crate::interfaces::TickSink;
use crate::observability::metrics::{self, DECODE_FAILURES, FRAMES_RECEIVED, PINGS_SENT, PONGS_SENT, RECONNECTS, TICKS_DECODED};
use crate::observability::tracing::shard_span;
use crate::types::ids::{CorrelationId, ShardId};
use crate::utils::helper::shutdown_requested;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

#[derive(Clone, Debug)]
pub struct ConnectionSettings {
    pub url: String,
    pub ping_interval: Duration,
    /// Upper bound on a single read attempt; keeps the loop responsive while idle.
    pub recv_poll_interval: Duration,
    pub login_timeout: Duration,
    pub retry: RetryPolicy,
}

/// One persistent websocket session for one shard, reconnecting until shut down.
///
/// Requests enqueued through [`Connection::subscribe`] or a [`ConnectionHandle`] are delivered
/// in enqueue order once the socket is OPEN. Every subscribe ever sent is remembered and replayed
/// with fresh correlation ids when a later session opens.
pub struct Connection {
    settings: ConnectionSettings,
    shard: ShardId,
    adapter: ExchangeAdapter,
    credentials: Option<Credentials>,
    sink: Arc<dyn TickSink>,
    state_tx: watch::Sender<ConnectionState>,
    request_tx: mpsc::UnboundedSender<SubscriptionRequest>,
    requests: mpsc::UnboundedReceiver<SubscriptionRequest>,
    next_id: Arc<AtomicU64>,
    subscriptions: Vec<Vec<Topic>>,
}

/// Cloneable control surface for a running Connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shard: ShardId,
    request_tx: mpsc::UnboundedSender<SubscriptionRequest>,
    next_id: Arc<AtomicU64>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Enqueues a subscribe; fails only once the Connection has been dropped.
    pub fn subscribe(&self, topics: Vec<Topic>) -> Result<CorrelationId> {
        let id = CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.request_tx
            .send(SubscriptionRequest::subscribe(id, topics))
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(id)
    }

    /// Resolves once the Connection reports `state`.
    pub async fn wait_for_state(&self, state: ConnectionState) -> Result<()> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Connection {
    pub fn new(
        settings: ConnectionSettings,
        shard: ShardId,
        adapter: ExchangeAdapter,
        credentials: Option<Credentials>,
        sink: Arc<dyn TickSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (request_tx, requests) = mpsc::unbounded_channel();
        Connection {
            settings,
            shard,
            adapter,
            credentials,
            sink,
            state_tx,
            request_tx,
            requests,
            next_id: Arc::new(AtomicU64::new(1)),
            subscriptions: Vec::new(),
        }
    }

    /// Builds a Connection for `shard` with its whole topic batch already enqueued.
    pub fn for_shard(
        settings: ConnectionSettings,
        shard: Shard,
        adapter: ExchangeAdapter,
        credentials: Option<Credentials>,
        sink: Arc<dyn TickSink>,
    ) -> Self {
        let mut connection = Connection::new(settings, shard.id, adapter, credentials, sink);
        connection.subscribe(shard.topics);
        connection
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Always enqueues, whatever the socket state.
    pub fn subscribe(&mut self, topics: Vec<Topic>) -> CorrelationId {
        let id = self.next_correlation_id();
        // The receiver lives in `self`, so this send cannot fail.
        let _ = self.request_tx.send(SubscriptionRequest::subscribe(id, topics));
        id
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shard: self.shard,
            request_tx: self.request_tx.clone(),
            next_id: self.next_id.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Drives sessions until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Returns `Ok` on shutdown and `MaxReconnectAttemptsExceeded` when a bounded retry policy
    /// runs out.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let span = shard_span(self.adapter.exchange(), self.shard);
        async move {
            let mut backoff = Backoff::new(self.settings.retry.clone());

            loop {
                if *shutdown.borrow() {
                    break;
                }

                self.set_state(ConnectionState::Connecting);
                let lost = match self.session(&mut backoff, &mut shutdown).await {
                    Ok(()) => break,
                    Err(e) => e,
                };

                metrics::inc(&RECONNECTS, self.adapter.exchange());
                self.set_state(ConnectionState::Reconnecting);

                let Some(delay) = backoff.next_delay() else {
                    error!(error = %lost, attempts = backoff.attempts(), "giving up on connection");
                    self.set_state(ConnectionState::Disconnected);
                    return Err(Error::MaxReconnectAttemptsExceeded);
                };

                warn!(
                    error = %lost,
                    delay_ms = delay.as_millis() as u64,
                    attempt = backoff.attempts(),
                    "session lost, reconnecting"
                );

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }

            self.set_state(ConnectionState::Disconnected);
            info!("connection stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// One socket lifetime. `Ok` means shutdown was requested; any error means reconnect.
    async fn session(
        &mut self,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let connected = tokio::select! {
            res = connect_async(&self.settings.url) => res,
            _ = shutdown_requested(shutdown) => return Ok(()),
        };
        let (ws_stream, _) = connected.map_err(|e| Error::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        debug!(url = %self.settings.url, "transport connected");

        if let Some(credentials) = self.credentials.clone() {
            self.login(&mut write, &mut read, credentials).await?;
            info!("login accepted");
        }

        self.set_state(ConnectionState::Open);
        backoff.reset();
        info!(
            url = %self.settings.url,
            replayed = self.subscriptions.len(),
            "connection open"
        );

        for topics in self.subscriptions.clone() {
            let request = SubscriptionRequest::subscribe(self.next_correlation_id(), topics);
            self.send_request(&mut write, &request).await?;
        }

        let ping_interval = self.settings.ping_interval;
        let mut keepalive = interval_at(Instant::now() + ping_interval, ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = keepalive.tick() => {
                    if self.state().is_open() {
                        self.send_keepalive(&mut write).await?;
                    }
                }
                Some(request) = self.requests.recv() => {
                    if let RequestOp::Subscribe(topics) = &request.op {
                        self.subscriptions.push(topics.clone());
                    }
                    self.send_request(&mut write, &request).await?;
                }
                polled = timeout(self.settings.recv_poll_interval, read.next()) => {
                    match polled {
                        Err(_) => {}
                        Ok(None) => return Err(Error::ConnectionClosed),
                        Ok(Some(Err(e))) => return Err(Error::Transport(e.to_string())),
                        Ok(Some(Ok(message))) => self.handle_message(&mut write, message).await?,
                    }
                }
            }
        }
    }

    async fn login(
        &mut self,
        write: &mut WsWrite,
        read: &mut WsRead,
        credentials: Credentials,
    ) -> Result<()> {
        let request = SubscriptionRequest::login(self.next_correlation_id(), credentials);
        self.send_request(write, &request).await?;

        let adapter = self.adapter;
        let ack = async {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => match adapter.login_ack(&text) {
                        Some(LoginAck::Accepted) => return Ok(()),
                        Some(LoginAck::Rejected(reason)) => {
                            return Err(Error::AuthenticationError(reason))
                        }
                        None => debug!(frame = %text, "ignoring frame before login ack"),
                    },
                    Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                }
            }
        };

        timeout(self.settings.login_timeout, ack)
            .await
            .map_err(|_| Error::LoginTimeout)?
    }

    async fn handle_message(&mut self, write: &mut WsWrite, message: Message) -> Result<()> {
        match message {
            Message::Text(text) => self.handle_text(write, &text).await,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => self.handle_text(write, &text).await,
                Err(e) => {
                    metrics::inc(&DECODE_FAILURES, self.adapter.exchange());
                    warn!(error = %e, "dropping non-utf8 binary frame");
                    Ok(())
                }
            },
            // tungstenite queues the protocol pong itself
            Message::Ping(_) => {
                metrics::inc(&PONGS_SENT, self.adapter.exchange());
                Ok(())
            }
            Message::Pong(_) => Ok(()),
            Message::Close(frame) => {
                info!(?frame, "close frame received");
                Err(Error::ConnectionClosed)
            }
            Message::Frame(_) => Ok(()),
        }
    }

    async fn handle_text(&mut self, write: &mut WsWrite, text: &str) -> Result<()> {
        let exchange = self.adapter.exchange();
        metrics::inc(&FRAMES_RECEIVED, exchange);

        if text == "ping" {
            let pong = match self.adapter.keepalive() {
                Keepalive::Frame => Message::Pong(Vec::new()),
                Keepalive::Text => Message::Text("pong".to_string()),
            };
            write
                .send(pong)
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            metrics::inc(&PONGS_SENT, exchange);
            return Ok(());
        }

        match self.adapter.decode(text) {
            Ok(Decoded::Ticks(ticks)) => {
                metrics::inc_by(&TICKS_DECODED, exchange, ticks.len() as u64);
                for tick in ticks {
                    self.sink.on_tick(tick);
                }
            }
            Ok(Decoded::Control) => debug!(frame = %text, "control frame"),
            Err(e) => {
                metrics::inc(&DECODE_FAILURES, exchange);
                warn!(error = %e, frame = %text, "dropping undecodable frame");
            }
        }
        Ok(())
    }

    async fn send_keepalive(&self, write: &mut WsWrite) -> Result<()> {
        let ping = match self.adapter.keepalive() {
            Keepalive::Frame => Message::Ping(Vec::new()),
            Keepalive::Text => Message::Text("ping".to_string()),
        };
        write
            .send(ping)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        metrics::inc(&PINGS_SENT, self.adapter.exchange());
        debug!("keepalive sent");
        Ok(())
    }

    async fn send_request(&self, write: &mut WsWrite, request: &SubscriptionRequest) -> Result<()> {
        let payload = self.adapter.encode(request)?;
        write
            .send(Message::Text(payload))
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!(id = %request.id, "request sent");
        Ok(())
    }

    fn next_correlation_id(&self) -> CorrelationId {
        CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next && !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "unexpected state transition");
        }
        debug!(from = %previous, to = %next, "state");
    }
}
