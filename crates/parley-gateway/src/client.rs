//! Gateway client: one persistent connection, many correlated calls.
//!
//! A reader task owns the incoming half of the transport and dispatches every
//! frame: `res` frames resolve entries in the [`CorrelationTable`], `chat`
//! events feed the active stream subscription, and the handshake challenge is
//! answered once per connection. Callers wait on oneshot receivers with their
//! own deadlines.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use uuid::Uuid;

use parley_core::{ChatStreamSink, ChatTimeoutPolicy, GatewayError, truncate_for_log};

use crate::config::GatewayConfig;
use crate::correlation::CorrelationTable;
use crate::protocol::{
    CONNECT_REQUEST_ID, ChatHistory, ChatHistoryParams, ChatSendParams, Frame, GatewayEvent,
    LooseText, NO_CONTENT_REPLY, error_message, loose_text,
};
use crate::transport::{Connector, TransportEvent, WebSocketConnector};

/// Lifecycle of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingAuth,
    Ready,
    /// The server rejected the handshake or the client was closed.
    Closed,
}

type ChatResolution = Result<String, GatewayError>;

/// Drops a chat call's subscription when its caller stops waiting early.
struct SubscriptionGuard<'a> {
    inner: &'a Inner,
    request_id: &'a str,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        if shared
            .stream
            .as_ref()
            .is_some_and(|stream| stream.request_id == self.request_id)
        {
            shared.stream = None;
            tracing::info!(request_id = self.request_id, "Chat turn dropped by its caller");
        }
    }
}

/// The single in-flight chat turn.
struct StreamSubscription {
    request_id: String,
    accumulated: String,
    sink: Option<Box<dyn ChatStreamSink>>,
    resolver: oneshot::Sender<ChatResolution>,
}

impl StreamSubscription {
    fn push_fragment(&mut self, fragment: &str) {
        self.accumulated.push_str(fragment);
        if let Some(sink) = self.sink.as_mut() {
            sink.on_text(fragment);
        }
    }

    fn complete(mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_complete();
        }
        let _ = self.resolver.send(Ok(self.accumulated));
    }

    fn fail(self, error: GatewayError) {
        let _ = self.resolver.send(Err(error));
    }
}

struct Shared {
    state: ConnectionState,
    /// Bumped on every new socket so a stale reader cannot touch newer state.
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    handshake: Option<oneshot::Sender<Result<(), GatewayError>>>,
    challenge_answered: bool,
    table: CorrelationTable,
    stream: Option<StreamSubscription>,
    reader: Option<JoinHandle<()>>,
}

impl Shared {
    fn transmit(&self, text: String) -> Result<(), GatewayError> {
        let outgoing = self.outgoing.as_ref().ok_or(GatewayError::NotConnected)?;
        outgoing
            .send(text)
            .map_err(|_| GatewayError::ConnectionLost)
    }

    /// Drop the socket and fail everything waiting on it.
    fn teardown(&mut self, state: ConnectionState, error: &GatewayError) -> usize {
        self.state = state;
        self.outgoing = None;
        self.challenge_answered = false;
        if let Some(stream) = self.stream.take() {
            stream.fail(error.clone());
        }
        self.table.reject_all(error)
    }
}

struct Inner {
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    next_id: AtomicU64,
    /// Serializes concurrent `connect()` calls.
    connect_gate: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
}

/// Client for the agent gateway.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                next_id: AtomicU64::new(1),
                connect_gate: tokio::sync::Mutex::new(()),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    outgoing: None,
                    handshake: None,
                    challenge_answered: false,
                    table: CorrelationTable::new(),
                    stream: None,
                    reader: None,
                }),
            }),
        }
    }

    /// Client that talks WebSocket to `config.url`.
    pub fn websocket(config: GatewayConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.shared.lock().table.len()
    }

    pub fn has_active_stream(&self) -> bool {
        self.inner.shared.lock().stream.is_some()
    }

    /// Open the connection and authenticate, unless already ready.
    ///
    /// Fails with [`GatewayError::Connection`] if the socket cannot be opened
    /// or the handshake does not finish within the connect timeout, and with
    /// [`GatewayError::Auth`] if the server rejects the credentials.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let _gate = self.inner.connect_gate.lock().await;
        if self.state() == ConnectionState::Ready {
            return Ok(());
        }

        let config = &self.inner.config;
        let deadline = Instant::now() + config.connect_timeout;
        self.inner.shared.lock().state = ConnectionState::Connecting;
        tracing::info!(url = %config.url, "Connecting to gateway");

        let channel = match timeout_at(deadline, self.inner.connector.open(&config.url)).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                self.inner.shared.lock().state = ConnectionState::Disconnected;
                tracing::warn!(error = %e, "Gateway connection failed");
                return Err(e);
            }
            Err(_) => {
                self.inner.shared.lock().state = ConnectionState::Disconnected;
                tracing::warn!("Gateway connection timed out");
                return Err(GatewayError::Connection("connection timed out".to_string()));
            }
        };

        let (handshake_tx, handshake_rx) = oneshot::channel();
        let generation = {
            let mut shared = self.inner.shared.lock();
            if let Some(reader) = shared.reader.take() {
                reader.abort();
            }
            shared.generation += 1;
            shared.state = ConnectionState::AwaitingAuth;
            shared.outgoing = Some(channel.outgoing);
            shared.handshake = Some(handshake_tx);
            shared.challenge_answered = false;
            shared.generation
        };
        tracing::debug!(generation, "Socket open, waiting for challenge");

        let reader = tokio::spawn(Arc::clone(&self.inner).read_loop(generation, channel.incoming));
        self.inner.shared.lock().reader = Some(reader);

        match timeout_at(deadline, handshake_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::Connection(
                "handshake abandoned".to_string(),
            )),
            Err(_) => {
                let mut shared = self.inner.shared.lock();
                if shared.generation == generation {
                    shared.handshake = None;
                    shared.teardown(ConnectionState::Disconnected, &GatewayError::ConnectionLost);
                    if let Some(reader) = shared.reader.take() {
                        reader.abort();
                    }
                }
                tracing::warn!("Gateway handshake timed out");
                Err(GatewayError::Connection("handshake timed out".to_string()))
            }
        }
    }

    /// Send a correlated request and wait for its payload.
    pub async fn request<P>(&self, method: &str, params: &P) -> Result<Value, GatewayError>
    where
        P: Serialize + Sync + ?Sized,
    {
        let id = format!("req-{}", self.inner.next_id());
        let text = Frame::request_text(&id, method, params)?;
        let request_timeout = self.inner.config.request_timeout;

        let receiver = {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Ready {
                return Err(GatewayError::NotConnected);
            }
            let receiver = shared.table.insert(id.clone(), method, request_timeout);
            if let Err(e) = shared.transmit(text) {
                shared.table.remove(&id);
                return Err(e);
            }
            receiver
        };
        tracing::debug!(id, method, "Gateway request sent");

        match timeout(request_timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::ConnectionLost),
            Err(_) => {
                self.inner.shared.lock().table.remove(&id);
                tracing::warn!(id, method, "Gateway request timed out");
                Err(GatewayError::RequestTimeout)
            }
        }
    }

    /// Send one chat message and wait for the complete reply.
    ///
    /// Streamed text is forwarded to `sink` as it arrives. If the turn ends
    /// without any streamed text the reply is read back from `chat.history`.
    /// When the chat window elapses, the configured [`ChatTimeoutPolicy`]
    /// decides whether accumulated text is returned or the call fails.
    ///
    /// Dropping the returned future releases this call's subscription and no
    /// other.
    pub async fn invoke_chat(
        &self,
        session_key: &str,
        message: &str,
        sink: Option<Box<dyn ChatStreamSink>>,
    ) -> Result<String, GatewayError> {
        let request_id = format!("chat-{}", self.inner.next_id());
        let params = ChatSendParams {
            session_key,
            idempotency_key: format!("parley-{}", Uuid::new_v4()),
            message,
        };
        let text = Frame::request_text(&request_id, "chat.send", &params)?;

        let (resolver, receiver) = oneshot::channel();
        {
            let mut shared = self.inner.shared.lock();
            if shared.state != ConnectionState::Ready {
                return Err(GatewayError::NotConnected);
            }
            if let Some(previous) = shared.stream.take() {
                tracing::warn!(previous = %previous.request_id, "Superseding in-flight chat turn");
                previous.fail(GatewayError::Abandoned);
            }
            shared.transmit(text)?;
            shared.stream = Some(StreamSubscription {
                request_id: request_id.clone(),
                accumulated: String::new(),
                sink,
                resolver,
            });
        }
        let _guard = SubscriptionGuard {
            inner: &self.inner,
            request_id: &request_id,
        };
        tracing::info!(
            request_id,
            message = %truncate_for_log(message, 80),
            "Chat turn sent"
        );

        let deadline = Instant::now() + self.inner.config.chat_timeout;
        let reply = match timeout_at(deadline, receiver).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(GatewayError::Abandoned),
            Err(_) => return self.expire_chat(&request_id),
        };

        if !reply.is_empty() {
            tracing::info!(request_id, chars = reply.len(), "Chat reply complete");
            return Ok(reply);
        }

        tracing::debug!(request_id, "No streamed text, reading chat history");
        let history_params = ChatHistoryParams {
            session_key,
            limit: 2,
        };
        let payload = timeout_at(deadline, self.request("chat.history", &history_params))
            .await
            .map_err(|_| GatewayError::RequestTimeout)??;
        let history: ChatHistory = serde_json::from_value(payload).unwrap_or_default();

        Ok(history
            .assistant_text()
            .map_or_else(|| NO_CONTENT_REPLY.to_string(), str::to_string))
    }

    /// Stop waiting for whichever chat turn is in flight on this client.
    ///
    /// The caller of [`invoke_chat`](Self::invoke_chat) receives
    /// [`GatewayError::Abandoned`]; the remote agent is not told. Callers that
    /// share the client through [`GatewayChat`](crate::GatewayChat) cancel by
    /// dropping their own call instead.
    pub fn abandon_chat(&self) {
        let stream = self.inner.shared.lock().stream.take();
        if let Some(stream) = stream {
            tracing::info!(request_id = %stream.request_id, "Chat turn abandoned");
            stream.fail(GatewayError::Abandoned);
        }
    }

    /// Close the connection and fail everything outstanding.
    pub fn close(&self) {
        let mut shared = self.inner.shared.lock();
        if let Some(reader) = shared.reader.take() {
            reader.abort();
        }
        if let Some(handshake) = shared.handshake.take() {
            let _ = handshake.send(Err(GatewayError::Connection("client closed".to_string())));
        }
        let rejected = shared.teardown(ConnectionState::Closed, &GatewayError::ConnectionLost);
        tracing::info!(rejected, "Gateway client closed");
    }

    fn expire_chat(&self, request_id: &str) -> Result<String, GatewayError> {
        let stream = {
            let mut shared = self.inner.shared.lock();
            if shared
                .stream
                .as_ref()
                .is_some_and(|stream| stream.request_id == request_id)
            {
                shared.stream.take()
            } else {
                None
            }
        };
        let Some(mut stream) = stream else {
            return Err(GatewayError::RequestTimeout);
        };

        let partial = std::mem::take(&mut stream.accumulated);
        if let Some(sink) = stream.sink.as_mut() {
            sink.on_complete();
        }

        match self.inner.config.timeout_policy {
            ChatTimeoutPolicy::ReturnPartial if !partial.is_empty() => {
                tracing::warn!(
                    request_id,
                    chars = partial.len(),
                    "Chat timed out, returning partial reply"
                );
                Ok(partial)
            }
            _ => {
                tracing::warn!(request_id, "Chat timed out");
                Err(GatewayError::RequestTimeout)
            }
        }
    }
}

impl Inner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn read_loop(
        self: Arc<Self>,
        generation: u64,
        mut incoming: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = incoming.recv().await {
            match event {
                TransportEvent::Text(text) => {
                    self.handle_text(generation, &text);
                    if !self.is_live(generation) {
                        return;
                    }
                }
                TransportEvent::Closed => {
                    self.connection_lost(generation, "socket closed");
                    return;
                }
                TransportEvent::Error(e) => {
                    self.connection_lost(generation, &e);
                    return;
                }
            }
        }
        self.connection_lost(generation, "transport ended");
    }

    fn is_live(&self, generation: u64) -> bool {
        let shared = self.shared.lock();
        shared.generation == generation
            && matches!(
                shared.state,
                ConnectionState::AwaitingAuth | ConnectionState::Ready
            )
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    frame = %truncate_for_log(text, 120),
                    "Dropping unparseable gateway frame"
                );
                return;
            }
        };

        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return;
        }
        match frame {
            Frame::Res {
                id,
                ok,
                payload,
                error,
            } => Self::handle_response(&mut shared, &id, ok, payload, error.as_ref()),
            Frame::Event { event, payload } => self.handle_event(&mut shared, &event, payload),
            Frame::Req { method, .. } => {
                tracing::debug!(method, "Ignoring server-initiated request");
            }
        }
    }

    fn handle_response(
        shared: &mut Shared,
        id: &str,
        ok: bool,
        payload: Value,
        error: Option<&Value>,
    ) {
        if id == CONNECT_REQUEST_ID {
            let Some(handshake) = shared.handshake.take() else {
                tracing::debug!("Ignoring connect response outside a handshake");
                return;
            };
            if ok {
                shared.state = ConnectionState::Ready;
                tracing::info!("Gateway authenticated");
                let _ = handshake.send(Ok(()));
            } else {
                let message = error_message(error, "Authentication failed");
                tracing::error!(%message, "Gateway rejected the handshake");
                let auth_error = GatewayError::Auth(message);
                shared.teardown(ConnectionState::Closed, &auth_error);
                shared.reader = None;
                let _ = handshake.send(Err(auth_error));
            }
            return;
        }

        if shared
            .stream
            .as_ref()
            .is_some_and(|stream| stream.request_id == id)
        {
            if ok {
                tracing::debug!(id, "chat.send accepted");
            } else if let Some(stream) = shared.stream.take() {
                let message = error_message(error, "chat.send request failed");
                tracing::warn!(id, %message, "chat.send rejected");
                stream.fail(GatewayError::RequestRejected(message));
            }
            return;
        }

        let result = if ok {
            Ok(payload)
        } else {
            Err(GatewayError::RequestRejected(error_message(
                error,
                "Request failed",
            )))
        };
        if !shared.table.resolve(id, result) {
            tracing::debug!(id, "Ignoring response with unknown id");
        }
    }

    fn handle_event(&self, shared: &mut Shared, name: &str, payload: Value) {
        match GatewayEvent::classify(name, payload) {
            GatewayEvent::Challenge => {
                if shared.state != ConnectionState::AwaitingAuth || shared.challenge_answered {
                    tracing::debug!(state = ?shared.state, "Ignoring repeated challenge");
                    return;
                }
                match Frame::request_text(CONNECT_REQUEST_ID, "connect", &self.config.connect) {
                    Ok(text) => {
                        shared.challenge_answered = true;
                        tracing::info!("Received challenge, sending authentication");
                        if let Err(e) = shared.transmit(text) {
                            tracing::warn!(error = %e, "Failed to send connect request");
                        }
                    }
                    Err(e) => {
                        if let Some(handshake) = shared.handshake.take() {
                            let _ = handshake.send(Err(e));
                        }
                    }
                }
            }
            GatewayEvent::Chat(chat) => {
                let Some(stream) = shared.stream.as_mut() else {
                    tracing::debug!("Chat event with no active turn");
                    return;
                };
                if let Some(fragment) = chat.fragment() {
                    stream.push_fragment(fragment);
                }
                if chat.is_terminal() {
                    if let Some(stream) = shared.stream.take() {
                        tracing::debug!(
                            request_id = %stream.request_id,
                            chars = stream.accumulated.len(),
                            "Chat final event"
                        );
                        stream.complete();
                    }
                }
            }
            GatewayEvent::Other { name, payload } => {
                let Some(stream) = shared.stream.as_mut() else {
                    return;
                };
                match loose_text(&payload) {
                    Some(LooseText::Fragment(text)) => {
                        tracing::debug!(event = %name, "Text from unrecognized event");
                        stream.push_fragment(&text);
                    }
                    Some(LooseText::Summary(text)) => {
                        if stream.accumulated.is_empty() {
                            tracing::debug!(event = %name, "Summary from unrecognized event");
                            stream.accumulated = text;
                        }
                    }
                    None => {}
                }
            }
        }
    }

    fn connection_lost(&self, generation: u64, reason: &str) {
        let mut shared = self.shared.lock();
        if shared.generation != generation
            || matches!(
                shared.state,
                ConnectionState::Closed | ConnectionState::Disconnected
            )
        {
            return;
        }
        let rejected = shared.teardown(ConnectionState::Disconnected, &GatewayError::ConnectionLost);
        if let Some(handshake) = shared.handshake.take() {
            let _ = handshake.send(Err(GatewayError::Connection(format!(
                "connection closed during handshake: {reason}"
            ))));
        }
        shared.reader = None;
        tracing::warn!(reason, rejected, "Gateway connection lost");
    }
}
