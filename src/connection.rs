//! Connection management: the control loop, handshake and receive loop
//!
//! One control task owns the socket writer, the connection state and the
//! pending-request table. Client handles talk to it over an unbounded command
//! channel; the handshake and reader tasks report back over a second channel.
//! Messages from a superseded socket are recognised by their generation
//! number and ignored.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::{
    action::AmiAction,
    config::AmiConfig,
    constants::SOCKET_BUF_SIZE,
    correlation::{next_key, PendingTable, ReplySender},
    error::{AmiError, AmiResult},
    event::AmiEvent,
    protocol::{AmiMessage, FrameCodec},
    registry::{EventListener, ListenerRegistry},
    response::AmiResponse,
};

/// Lifecycle of the manager connection.
///
/// `Stopped -> Connecting -> Connected -> Authenticating -> Ready`, and back to
/// `Stopped` from any state on close or socket failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConnectionState {
    /// No socket. Actions submitted now are queued.
    Stopped,
    /// TCP connect in progress.
    Connecting,
    /// Socket open, waiting for the server greeting.
    Connected,
    /// Login sent, waiting for its response.
    Authenticating,
    /// Logged in; actions are written as they are submitted.
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Stopped => "stopped",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// State observer callback.
///
/// Called from the control task on every state transition, and on errors
/// that hit the connection while its state does not change. It must not
/// block and must not call [`AmiClient::on_state_change`].
pub type StateObserver = Box<dyn Fn(ConnectionState, Option<&AmiError>) + Send + Sync>;

/// Requests from client handles to the control loop.
enum ClientCommand {
    Start {
        reply: oneshot::Sender<AmiResult<()>>,
    },
    Submit {
        id: String,
        wire: String,
        summary: String,
        reply: ReplySender,
    },
    /// The submitter timed out. A queued action is still written.
    Forget(String),
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Reports from the handshake and reader tasks.
enum LinkEvent {
    Progress {
        generation: u64,
        state: ConnectionState,
    },
    Established {
        generation: u64,
        stream: TcpStream,
        codec: FrameCodec,
    },
    Failed {
        generation: u64,
        error: AmiError,
    },
    Inbound {
        generation: u64,
        message: AmiMessage,
    },
    Lost {
        generation: u64,
        error: AmiError,
    },
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(host: &str, port: u16, limit: Duration) -> AmiResult<TcpStream> {
    let timeout_ms = limit.as_millis() as u64;
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(s)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(s)
        }
        Ok(Err(e)) => {
            warn!("[CONNECT] TCP connect failed: {}", e);
            Err(AmiError::Io(e))
        }
        Err(_) => {
            warn!("[CONNECT] TCP connect timed out after {}ms", timeout_ms);
            Err(AmiError::ConnectTimeout { timeout_ms })
        }
    }
}

/// Read more bytes from the unsplit stream into the codec.
async fn fill_codec(
    stream: &mut TcpStream,
    codec: &mut FrameCodec,
    read_buffer: &mut [u8],
    limit: Duration,
) -> AmiResult<()> {
    let bytes_read = match timeout(limit, stream.read(read_buffer)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(AmiError::Io(e)),
        Err(_) => {
            warn!("[AUTH] No data from server within {}ms", limit.as_millis());
            return Err(AmiError::HandshakeTimeout {
                timeout_ms: limit.as_millis() as u64,
            });
        }
    };

    trace!("[RECV] Read {} bytes from socket", bytes_read);
    if bytes_read == 0 {
        return Err(AmiError::ConnectionClosed);
    }
    codec.add_data(&read_buffer[..bytes_read])
}

/// Read the one-line server greeting.
async fn read_greeting(
    stream: &mut TcpStream,
    codec: &mut FrameCodec,
    read_buffer: &mut [u8],
    limit: Duration,
) -> AmiResult<String> {
    loop {
        if let Some(line) = codec.take_line() {
            return Ok(line);
        }
        fill_codec(stream, codec, read_buffer, limit).await?;
    }
}

/// Send `Login` and wait for its response on the unsplit stream.
///
/// Events and unrelated responses that arrive first are forwarded to the
/// control loop, as is anything buffered behind the login response.
async fn authenticate(
    stream: &mut TcpStream,
    codec: &mut FrameCodec,
    read_buffer: &mut [u8],
    config: &AmiConfig,
    generation: u64,
    link_tx: &mpsc::UnboundedSender<LinkEvent>,
) -> AmiResult<()> {
    let id = next_key();
    let mut login = AmiAction::login(&config.username, &config.secret);
    login.set_action_id(&id);
    let wire = login.to_wire_format(config.variable_separator)?;

    debug!("[AUTH] Sending {}", login.log_line());
    stream
        .write_all(wire.as_bytes())
        .await?;

    let mut outcome = None;
    loop {
        for envelope in codec.extract() {
            let message = AmiMessage::from_envelope(envelope);
            if outcome.is_none() {
                if let AmiMessage::Response(response) = &message {
                    if response
                        .action_id()
                        .map_or(true, |echoed| echoed == id)
                    {
                        outcome = Some(if response.is_error() {
                            Err(AmiError::auth_failed(
                                response
                                    .message()
                                    .unwrap_or("Authentication failed"),
                            ))
                        } else {
                            Ok(())
                        });
                        continue;
                    }
                }
            }
            let _ = link_tx.send(LinkEvent::Inbound {
                generation,
                message,
            });
        }
        if let Some(outcome) = outcome {
            return outcome;
        }
        fill_codec(stream, codec, read_buffer, config.handshake_timeout).await?;
    }
}

async fn establish(
    config: &AmiConfig,
    generation: u64,
    link_tx: &mpsc::UnboundedSender<LinkEvent>,
) -> AmiResult<(TcpStream, FrameCodec)> {
    config.validate()?;
    info!("Connecting to Asterisk manager at {}:{}", config.host, config.port);

    let mut stream = tcp_connect_with_timeout(&config.host, config.port, config.connect_timeout).await?;
    let _ = link_tx.send(LinkEvent::Progress {
        generation,
        state: ConnectionState::Connected,
    });

    let mut codec = FrameCodec::new();
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

    debug!("[AUTH] Waiting for server greeting");
    let greeting = read_greeting(&mut stream, &mut codec, &mut read_buffer, config.handshake_timeout).await?;
    debug!("[AUTH] Server greeting: {}", greeting);

    let _ = link_tx.send(LinkEvent::Progress {
        generation,
        state: ConnectionState::Authenticating,
    });
    authenticate(
        &mut stream,
        &mut codec,
        &mut read_buffer,
        config,
        generation,
        link_tx,
    )
    .await?;

    info!("Authenticated as {}", config.username);
    Ok((stream, codec))
}

async fn handshake_task(
    config: Arc<AmiConfig>,
    generation: u64,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let event = match establish(&config, generation, &link_tx).await {
        Ok((stream, codec)) => LinkEvent::Established {
            generation,
            stream,
            codec,
        },
        Err(error) => LinkEvent::Failed { generation, error },
    };
    let _ = link_tx.send(event);
}

/// Background reader loop
async fn reader_loop(
    reader: OwnedReadHalf,
    codec: FrameCodec,
    generation: u64,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(
        reader,
        codec,
        generation,
        link_tx.clone(),
    ));
    if futures_util::FutureExt::catch_unwind(result)
        .await
        .is_err()
    {
        tracing::error!("reader task panicked");
        let _ = link_tx.send(LinkEvent::Lost {
            generation,
            error: AmiError::protocol_error("reader task panicked"),
        });
    }
}

async fn reader_loop_inner(
    mut reader: OwnedReadHalf,
    mut codec: FrameCodec,
    generation: u64,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

    loop {
        // Drain complete frames first; the handshake may have left some behind.
        for envelope in codec.extract() {
            let message = AmiMessage::from_envelope(envelope);
            if link_tx
                .send(LinkEvent::Inbound {
                    generation,
                    message,
                })
                .is_err()
            {
                debug!("Control loop gone, reader exiting");
                return;
            }
        }

        let error = match reader
            .read(&mut read_buffer)
            .await
        {
            Ok(0) => {
                info!("Connection closed (EOF)");
                AmiError::ConnectionClosed
            }
            Ok(n) => {
                trace!("[RECV] Read {} bytes from socket", n);
                match codec.add_data(&read_buffer[..n]) {
                    Ok(()) => continue,
                    Err(e) => {
                        warn!("Buffer error: {}", e);
                        e
                    }
                }
            }
            Err(e) => {
                warn!("Read error: {}", e);
                AmiError::Io(e)
            }
        };

        let _ = link_tx.send(LinkEvent::Lost { generation, error });
        return;
    }
}

/// Bounded global event sink with the overflow bookkeeping of the event stream.
struct EventSink {
    tx: mpsc::Sender<AmiResult<AmiEvent>>,
    overflow: bool,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Try to hand an event to the application.
    ///
    /// If the channel is full the event is dropped and counted. Once room
    /// frees up, one `QueueFull` error is delivered ahead of the next event.
    /// Returns `false` once the stream has been dropped.
    fn dispatch(&mut self, event: AmiEvent) -> bool {
        if self.overflow {
            match self
                .tx
                .try_send(Err(AmiError::QueueFull))
            {
                Ok(()) => self.overflow = false,
                Err(mpsc::error::TrySendError::Closed(_)) => return false,
                Err(mpsc::error::TrySendError::Full(_)) => {}
            }
        }

        match self
            .tx
            .try_send(Ok(event))
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.overflow = true;
                self.dropped
                    .fetch_add(1, Ordering::Relaxed);
                warn!("Event queue full, dropping event");
                true
            }
        }
    }
}

type SharedObserver = Arc<Mutex<Option<StateObserver>>>;

/// The single task that owns connection state.
struct ControlLoop {
    config: Arc<AmiConfig>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    observer: SharedObserver,
    registry: ListenerRegistry,
    pending: PendingTable,
    sink: Option<EventSink>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    generation: u64,
    writer: Option<OwnedWriteHalf>,
    handshake: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    start_reply: Option<oneshot::Sender<AmiResult<()>>>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
        mut link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        let period = self
            .config
            .sweep_interval
            .max(Duration::from_millis(1));
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(ClientCommand::Close { reply }) => {
                            info!("Client requested close");
                            self.shutdown(&mut command_rx).await;
                            let _ = reply.send(());
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("All client handles dropped, shutting down");
                            self.shutdown(&mut command_rx).await;
                            break;
                        }
                    }
                }

                Some(event) = link_rx.recv() => {
                    self.handle_link(event).await;
                }

                _ = sweep.tick() => {
                    let expired = self
                        .registry
                        .sweep_expired(self.config.listener_idle_timeout);
                    if expired > 0 {
                        debug!(
                            "Swept {} idle listeners, {} remain",
                            expired,
                            self.registry
                                .len()
                        );
                    }
                }
            }
        }

        debug!("Control loop terminated");
    }

    fn set_state(&mut self, state: ConnectionState, error: Option<&AmiError>) {
        let changed = self.state != state;
        if changed {
            info!("Connection state: {} -> {}", self.state, state);
            self.state = state;
            self.state_tx
                .send_replace(state);
        }
        if changed || error.is_some() {
            if let Some(observer) = self
                .observer
                .lock()
                .as_ref()
            {
                observer(state, error);
            }
        }
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Start { reply } => {
                if self.state != ConnectionState::Stopped || self.start_reply.is_some() {
                    let _ = reply.send(Err(AmiError::AlreadyRunning));
                    return;
                }
                self.generation += 1;
                self.start_reply = Some(reply);
                self.set_state(ConnectionState::Connecting, None);
                self.handshake = Some(tokio::spawn(handshake_task(
                    self.config
                        .clone(),
                    self.generation,
                    self.link_tx
                        .clone(),
                )));
            }
            ClientCommand::Submit {
                id,
                wire,
                summary,
                reply,
            } => {
                self.pending
                    .insert(id, wire, summary, reply);
                if self.state == ConnectionState::Ready {
                    self.flush_outbox()
                        .await;
                }
            }
            ClientCommand::Forget(id) => {
                if self
                    .pending
                    .forget(&id)
                {
                    debug!("Caller of action {} timed out", id);
                }
            }
            // Handled by run().
            ClientCommand::Close { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_link(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Progress { generation, state } if generation == self.generation => {
                self.set_state(state, None);
            }
            LinkEvent::Established {
                generation,
                stream,
                codec,
            } if generation == self.generation => {
                self.handshake = None;
                let (read_half, write_half) = stream.into_split();
                self.writer = Some(write_half);
                self.reader = Some(tokio::spawn(reader_loop(
                    read_half,
                    codec,
                    generation,
                    self.link_tx
                        .clone(),
                )));
                self.set_state(ConnectionState::Ready, None);
                if let Some(reply) = self
                    .start_reply
                    .take()
                {
                    let _ = reply.send(Ok(()));
                }
                self.flush_outbox()
                    .await;
            }
            LinkEvent::Failed { generation, error } if generation == self.generation => {
                warn!("Connection setup failed: {}", error);
                self.handshake = None;
                self.set_state(ConnectionState::Stopped, Some(&error));
                if let Some(reply) = self
                    .start_reply
                    .take()
                {
                    let _ = reply.send(Err(error));
                }
            }
            LinkEvent::Inbound {
                generation,
                message,
            } if generation == self.generation => {
                self.handle_inbound(message);
            }
            LinkEvent::Lost { generation, error } if generation == self.generation => {
                self.link_lost(error);
            }
            _ => trace!("Ignoring report from a superseded connection"),
        }
    }

    fn handle_inbound(&mut self, message: AmiMessage) {
        match message {
            AmiMessage::Response(response) => {
                self.pending
                    .resolve(response);
            }
            AmiMessage::Event(event) => {
                let terminal = self
                    .config
                    .is_terminal_event(event.name());
                self.registry
                    .dispatch(&event, terminal);
                if let Some(sink) = self
                    .sink
                    .as_mut()
                {
                    if !sink.dispatch(event) {
                        debug!("Event stream dropped, no longer forwarding events");
                        self.sink = None;
                    }
                }
            }
        }
    }

    /// Write queued actions in submission order.
    async fn flush_outbox(&mut self) {
        loop {
            let Some(writer) = self
                .writer
                .as_mut()
            else {
                return;
            };
            let Some((id, wire)) = self
                .pending
                .pop_unsent()
            else {
                return;
            };
            let written = writer
                .write_all(wire.as_bytes())
                .await;
            if let Err(e) = written {
                warn!("Write of action {} failed: {}", id, e);
                self.link_lost(AmiError::Io(e));
                return;
            }
        }
    }

    /// Socket is gone: fail what was written, keep what was queued and the listeners.
    fn link_lost(&mut self, error: AmiError) {
        warn!("Connection lost: {}", error);
        self.generation += 1;
        self.writer = None;
        if let Some(reader) = self
            .reader
            .take()
        {
            reader.abort();
        }
        let failed = self
            .pending
            .fail_sent();
        if failed > 0 {
            debug!("Failed {} in-flight actions", failed);
        }
        if self
            .pending
            .len()
            > 0
        {
            debug!(
                "{} queued actions wait for the next connection",
                self.pending
                    .unsent_len()
            );
        }
        self.set_state(ConnectionState::Stopped, Some(&error));
    }

    async fn shutdown(&mut self, command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>) {
        self.generation += 1;
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            match command {
                ClientCommand::Start { reply } => {
                    let _ = reply.send(Err(AmiError::NotRunning));
                }
                ClientCommand::Submit { reply, .. } => {
                    let _ = reply.send(Err(AmiError::NotRunning));
                }
                ClientCommand::Forget(_) => {}
                ClientCommand::Close { reply } => {
                    let _ = reply.send(());
                }
            }
        }

        if let Some(handshake) = self
            .handshake
            .take()
        {
            handshake.abort();
        }
        if let Some(reader) = self
            .reader
            .take()
        {
            reader.abort();
        }
        if let Some(mut writer) = self
            .writer
            .take()
        {
            let _ = writer
                .shutdown()
                .await;
        }
        if let Some(reply) = self
            .start_reply
            .take()
        {
            let _ = reply.send(Err(AmiError::ConnectionClosed));
        }

        let failed = self
            .pending
            .fail_all();
        let closed = self
            .registry
            .close_all();
        debug!(
            "Shutdown failed {} pending actions and closed {} listeners",
            failed, closed
        );
        self.sink = None;
        self.set_state(ConnectionState::Stopped, None);
    }
}

/// Manager client handle (Clone + Send)
///
/// Every clone talks to the same control task. The control task ends on
/// [`close`](Self::close) or once every handle has been dropped.
#[derive(Clone)]
pub struct AmiClient {
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    registry: ListenerRegistry,
    state_rx: watch::Receiver<ConnectionState>,
    observer: SharedObserver,
    dropped_events: Arc<AtomicU64>,
    config: Arc<AmiConfig>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Global event stream (!Clone)
///
/// Receives every event from the control task, whether or not a session
/// listener also got it.
///
/// Events are delivered as `Result<AmiEvent, AmiError>`. An `Err(AmiError::QueueFull)`
/// indicates that one or more events were dropped because the application fell behind.
/// Use [`AmiClient::dropped_event_count`] for the exact count.
pub struct AmiEventStream {
    rx: mpsc::Receiver<AmiResult<AmiEvent>>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("state", &self.state())
            .finish()
    }
}

impl AmiClient {
    /// Create a client and spawn its control task. No connection is made
    /// until [`start`](Self::start).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: AmiConfig) -> (Self, AmiEventStream) {
        let config = Arc::new(config);
        let queue_size = config
            .event_queue_size
            .max(1);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(queue_size);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Stopped);
        let observer: SharedObserver = Arc::new(Mutex::new(None));
        let dropped_events = Arc::new(AtomicU64::new(0));
        let registry = ListenerRegistry::new();

        let control = ControlLoop {
            config: config.clone(),
            state: ConnectionState::Stopped,
            state_tx,
            observer: observer.clone(),
            registry: registry.clone(),
            pending: PendingTable::new(),
            sink: Some(EventSink {
                tx: event_tx,
                overflow: false,
                dropped: dropped_events.clone(),
            }),
            link_tx,
            generation: 0,
            writer: None,
            handshake: None,
            reader: None,
            start_reply: None,
        };
        tokio::spawn(control.run(command_rx, link_rx));

        let stream = AmiEventStream {
            rx: event_rx,
            state_rx: state_rx.clone(),
        };
        let client = AmiClient {
            command_tx,
            registry,
            state_rx,
            observer,
            dropped_events,
            config,
        };
        (client, stream)
    }

    /// Install the state observer, replacing any previous one.
    ///
    /// ```rust,no_run
    /// # fn example(client: &asterisk_ami_tokio::AmiClient) {
    /// use asterisk_ami_tokio::ConnectionState;
    ///
    /// client.on_state_change(|state, error| {
    ///     if state == ConnectionState::Stopped {
    ///         eprintln!("manager connection stopped: {:?}", error);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn on_state_change<F>(&self, observer: F)
    where
        F: Fn(ConnectionState, Option<&AmiError>) + Send + Sync + 'static,
    {
        *self
            .observer
            .lock() = Some(Box::new(observer));
    }

    /// Connect, read the greeting and log in.
    ///
    /// Resolves once the connection is `Ready`, or with the error that sent
    /// it back to `Stopped`. Fails with [`AmiError::AlreadyRunning`] unless
    /// the state is `Stopped`. Calling it again after a socket loss
    /// reconnects; queued actions are flushed once `Ready`.
    pub async fn start(&self) -> AmiResult<()> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::Start { reply })
            .map_err(|_| AmiError::NotRunning)?;
        rx.await
            .unwrap_or(Err(AmiError::ConnectionClosed))
    }

    /// Submit an action and wait for its response.
    ///
    /// A fresh `ActionID` is assigned, replacing any set on `action`. While
    /// the connection is not `Ready` the action is queued and written once
    /// it is. A zero `timeout` waits until the response arrives or the
    /// connection closes.
    ///
    /// An `Error` response is returned as `Ok`; use
    /// [`AmiResponse::into_result`] to turn it into an error.
    ///
    /// ```rust,no_run
    /// # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
    /// use asterisk_ami_tokio::AmiAction;
    /// use std::time::Duration;
    ///
    /// let resp = client
    ///     .submit(
    ///         AmiAction::new("Getvar")
    ///             .param("Channel", "PJSIP/100-00000001")
    ///             .param("Variable", "CALLERID(num)"),
    ///         Duration::from_secs(5),
    ///     )
    ///     .await?
    ///     .into_result()?;
    /// println!("{}", resp.get("Value").unwrap_or(""));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(&self, mut action: AmiAction, timeout: Duration) -> AmiResult<AmiResponse> {
        let id = next_key();
        action.set_action_id(&id);
        let wire = action.to_wire_format(
            self.config
                .variable_separator,
        )?;

        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(ClientCommand::Submit {
                id: id.clone(),
                wire,
                summary: action.log_line(),
                reply,
            })
            .map_err(|_| AmiError::NotRunning)?;

        if timeout.is_zero() {
            return rx
                .await
                .unwrap_or(Err(AmiError::ConnectionClosed));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AmiError::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ClientCommand::Forget(id));
                Err(AmiError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send `Ping` and require a success response within the request timeout.
    pub async fn ping(&self) -> AmiResult<AmiResponse> {
        self.submit(
            AmiAction::ping(),
            self.config
                .request_timeout,
        )
        .await?
        .into_result()
    }

    /// Register a listener for every event whose `Uniqueid` is `session_key`.
    ///
    /// Registering a key that already has a listener replaces it.
    pub fn register(&self, session_key: &str) -> AmiResult<EventListener> {
        if self
            .command_tx
            .is_closed()
        {
            return Err(AmiError::NotRunning);
        }
        self.registry
            .register(session_key)
    }

    /// Close the connection and stop the control task.
    ///
    /// Pending actions fail with [`AmiError::ConnectionClosed`] and every
    /// listener's sequence ends. Idempotent.
    pub async fn close(&self) -> AmiResult<()> {
        let (reply, rx) = oneshot::channel();
        if self
            .command_tx
            .send(ClientCommand::Close { reply })
            .is_err()
        {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self
            .state_rx
            .borrow()
    }

    /// Whether the connection is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// A receiver that observes every state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx
            .clone()
    }

    /// Number of events dropped due to a full event stream.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped_events
            .load(Ordering::Relaxed)
    }

    /// Configuration this client was created with.
    pub fn config(&self) -> &AmiConfig {
        &self.config
    }
}

impl AmiEventStream {
    /// Receive the next event, or None once the client has shut down.
    ///
    /// Returns `Err(AmiError::QueueFull)` if events were dropped because the
    /// application was not draining events fast enough. This is a one-time
    /// notification per overflow episode; subsequent calls return real events.
    pub async fn recv(&mut self) -> Option<AmiResult<AmiEvent>> {
        self.rx
            .recv()
            .await
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self
            .state_rx
            .borrow()
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = AmiResult<AmiEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}
