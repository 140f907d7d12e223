//! Twitch chat client over IRC.
//!
//! This is the entry point for host frameworks. A [`Client`] owns one
//! connection to the chat gateway: it performs the `PASS`/`NICK`/`CAP`
//! login, answers keep-alive probes once booted, keeps the channel registry
//! and fans every decoded line out to subscribers.
//!
//! ## Reconnection
//!
//! The client does not reconnect. When the server closes the socket the
//! reader task stops, pending joins and leaves fail with
//! [`Error::ConnectionClosed`] and later writes fail with
//! [`Error::NotConnected`]. Hosts that want to stay online call
//! [`Client::connect`] again, which closes any previous socket first.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::event::{EventKind, Listener, ListenerId, Subscribers};
use crate::line::{self, LineKind};
use crate::message::Message;

/// Public chat gateway.
pub const DEFAULT_HOST: &str = "irc.twitch.tv";
/// Plaintext IRC port.
pub const DEFAULT_PORT: u16 = 6667;
/// Connections to this port are wrapped in TLS even if `tls` is off.
pub const TLS_PORT: u16 = 6697;

/// Connection settings. Deserializable so hosts can embed it in their
/// own config files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Use TLS. Implied when connecting to [`TLS_PORT`].
    pub tls: bool,
    /// How long `connect` waits for the server's first line.
    pub login_timeout_secs: u64,
    /// How long `join`/`leave` wait for the server's acknowledgement.
    pub ack_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: false,
            login_timeout_secs: 10,
            ack_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

/// Lifecycle of a client. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootableState {
    Uninitialized,
    Booting,
    Initialized,
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) struct ClientInner {
    config: ClientConfig,
    username: RwLock<String>,
    state: Mutex<BootableState>,
    /// Flips on every connect and socket release; ack waiters watch it.
    connected: watch::Sender<bool>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    joined: Mutex<Vec<Channel>>,
    registry: Mutex<Vec<Channel>>,
    subscribers: Mutex<Subscribers>,
}

/// Handle to a Twitch chat connection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                username: RwLock::new(String::new()),
                state: Mutex::new(BootableState::Uninitialized),
                connected: watch::Sender::new(false),
                writer: tokio::sync::Mutex::new(None),
                reader: Mutex::new(None),
                joined: Mutex::new(Vec::new()),
                registry: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Subscribers::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Nick we logged in with. Empty before `connect`.
    pub fn username(&self) -> String {
        self.inner.username.read().clone()
    }

    pub fn state(&self) -> BootableState {
        *self.inner.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    pub fn platform_command_trigger(&self) -> &'static str {
        "!"
    }

    pub fn platform_name(&self) -> &'static str {
        "Twitch"
    }

    pub fn vendor_name(&self) -> &'static str {
        ""
    }

    /// Register the keep-alive responder and mark the client initialized.
    ///
    /// Calling this again once booted does nothing.
    pub fn boot(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != BootableState::Uninitialized {
                tracing::debug!(state = ?*state, "Client already booted");
                return;
            }
            *state = BootableState::Booting;
        }

        let weak = Arc::downgrade(&self.inner);
        self.on_line(move |l| {
            if line::classify(l) != LineKind::Ping {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let client = Client::from_inner(inner);
            tokio::spawn(async move {
                if let Err(e) = client.write_line(line::PONG).await {
                    tracing::warn!(error = %e, "Failed to answer PING");
                }
            });
        });

        *self.inner.state.lock() = BootableState::Initialized;
    }

    /// Nothing to release beyond what `disconnect` does; the lifecycle
    /// state stays where it is.
    pub async fn teardown(&self) -> Result<()> {
        tracing::debug!("Client teardown");
        Ok(())
    }

    /// Connect to the chat gateway and log in.
    ///
    /// `host` and `port` override the configured ones. TLS is used when the
    /// config asks for it or the port is [`TLS_PORT`].
    pub async fn connect(
        &self,
        username: &str,
        password: &str,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<Client> {
        let config = &self.inner.config;
        let host = host.unwrap_or(config.host.as_str());
        let port = port.unwrap_or(config.port);
        let addr = format!("{host}:{port}");
        let use_tls = config.tls || port == TLS_PORT;

        tracing::debug!("Connecting to {addr}...");
        let tcp = tokio::time::timeout(config.login_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout {
                waiting_for: format!("TCP connect to {addr}"),
            })??;
        tracing::debug!("TCP connected to {addr} (tls: {use_tls})");

        if use_tls {
            let connector = TlsConnector::from(Arc::new(rustls_default_config()));
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| Error::Tls(format!("invalid server name {host}: {e}")))?;
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| Error::Tls(format!("handshake with {addr} failed: {e}")))?;
            tracing::debug!("TLS handshake complete");
            self.connect_with_stream(tls, username, password).await
        } else {
            self.connect_with_stream(tcp, username, password).await
        }
    }

    /// Log in over an already established stream and start reading from it.
    ///
    /// The first line the server sends decides the login: if it contains
    /// `failed` this returns [`Error::AuthFailed`] and the stream is
    /// dropped. Otherwise the line is dispatched to subscribers like any
    /// other.
    pub async fn connect_with_stream<S>(
        &self,
        stream: S,
        username: &str,
        password: &str,
    ) -> Result<Client>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if let Some(previous) = self.inner.reader.lock().take() {
            previous.abort();
        }
        self.release_socket().await;

        let (reader, writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        *self.inner.writer.lock().await = Some(Box::new(writer));
        self.inner.connected.send_replace(true);
        *self.inner.username.write() = username.to_string();

        let first = match self.login(&mut reader, username, password).await {
            Ok(first) => first,
            Err(e) => {
                self.release_socket().await;
                return Err(e);
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            if let Some(inner) = weak.upgrade() {
                Client::from_inner(inner).dispatch(&first);
            }
            read_loop(weak, reader).await;
        });
        *self.inner.reader.lock() = Some(handle);

        Ok(self.clone())
    }

    async fn login<R>(&self, reader: &mut R, username: &str, password: &str) -> Result<String>
    where
        R: AsyncBufRead + Unpin,
    {
        self.write_line(&line::pass(password)).await?;
        self.write_line(&line::nick(username)).await?;
        self.write_line(line::CAP_REQ_TAGS).await?;

        let mut buf = Vec::new();
        let first = tokio::time::timeout(
            self.inner.config.login_timeout(),
            next_line(reader, &mut buf),
        )
        .await
        .map_err(|_| Error::Timeout {
            waiting_for: "login response".to_string(),
        })??
        .ok_or(Error::ConnectionClosed)?;

        if line::is_login_failure(&first) {
            tracing::warn!(line = %first, "Login rejected by server");
            return Err(Error::AuthFailed(first));
        }
        tracing::debug!(username, "Logged in");
        Ok(first)
    }

    /// Drop the socket without sending `QUIT`. Always succeeds.
    pub async fn disconnect(&self) {
        if let Some(reader) = self.inner.reader.lock().take() {
            reader.abort();
        }
        self.release_socket().await;
        tracing::debug!("Disconnected");
    }

    async fn release_socket(&self) {
        self.inner.connected.send_replace(false);
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Write raw text to the socket. Returns what was written.
    ///
    /// Each call is written as a unit, but concurrent calls are not ordered
    /// relative to each other; await one before issuing the next if order
    /// matters.
    pub async fn write(&self, data: &str) -> Result<String> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        if data.starts_with("PASS ") {
            tracing::trace!("-> PASS ***");
        } else {
            tracing::trace!("-> {}", data.trim_end());
        }
        writer.write_all(data.as_bytes()).await?;
        writer.flush().await?;
        Ok(data.to_string())
    }

    /// [`write`](Self::write) with the line terminator appended.
    pub async fn write_line(&self, data: &str) -> Result<String> {
        self.write(&format!("{data}{}", line::CRLF)).await
    }

    /// Registered channel for `name`, created on first use.
    pub fn channel(&self, name: &str) -> Channel {
        let name = name.to_lowercase();
        let mut registry = self.inner.registry.lock();
        if let Some(existing) = registry.iter().find(|c| c.name() == name) {
            return existing.clone();
        }
        let channel = Channel::new(Arc::downgrade(&self.inner), &name);
        registry.push(channel.clone());
        channel
    }

    /// Every channel created so far, joined or not.
    pub fn channel_register(&self) -> Vec<Channel> {
        self.inner.registry.lock().clone()
    }

    pub fn joined_channels(&self) -> Vec<Channel> {
        self.inner.joined.lock().clone()
    }

    pub(crate) fn is_joined(&self, channel: &Channel) -> bool {
        self.inner.joined.lock().contains(channel)
    }

    pub(crate) fn mark_joined(&self, channel: &Channel) {
        let mut joined = self.inner.joined.lock();
        if !joined.contains(channel) {
            joined.push(channel.clone());
        }
    }

    pub(crate) fn mark_parted(&self, channel: &Channel) {
        self.inner.joined.lock().retain(|c| c != channel);
    }

    pub fn on(&self, listener: Listener) -> ListenerId {
        self.inner.subscribers.lock().add(listener)
    }

    pub fn on_line<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(Listener::Line(Arc::new(callback)))
    }

    pub fn on_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.on(Listener::Message(Arc::new(callback)))
    }

    /// Unsubscribe. Unknown ids are ignored.
    pub fn remove_listener(&self, kind: EventKind, id: ListenerId) -> &Self {
        self.inner.subscribers.lock().remove(kind, id);
        self
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.subscribers.lock().len(kind)
    }

    /// Parse a chat line into a [`Message`] on its registered channel.
    pub fn parse_line(&self, line: &str) -> Message {
        let parsed = line::parse_privmsg(line);
        Message::new(
            self.channel(&parsed.channel),
            parsed.content,
            parsed.mentions,
            parsed.sender,
        )
    }

    fn dispatch(&self, l: &str) {
        tracing::trace!("<- {l}");

        let line_callbacks = self.inner.subscribers.lock().line_snapshot();
        for callback in line_callbacks {
            callback(l);
        }

        if line::classify(l) == LineKind::ChatMessage {
            let message = self.parse_line(l);
            let message_callbacks = self.inner.subscribers.lock().message_snapshot();
            for callback in message_callbacks {
                callback(&message);
            }
        }
    }

    /// Subscribe for a matching line, write `outbound`, and wait for the
    /// match within the acknowledgement timeout. Losing the connection ends
    /// the wait early with [`Error::ConnectionClosed`]. The subscription is
    /// removed however the wait ends, including when the future is dropped.
    pub(crate) async fn send_and_await<F>(
        &self,
        outbound: String,
        waiting_for: String,
        matches: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let _subscription = Subscription {
            client: self,
            kind: EventKind::Line,
            id: self.on_line(move |l| {
                if matches(l)
                    && let Some(tx) = tx.lock().take()
                {
                    let _ = tx.send(());
                }
            }),
        };
        let mut connection = self.inner.connected.subscribe();

        self.write_line(&outbound).await?;
        let ack = async {
            tokio::select! {
                acked = rx => acked.map_err(|_| Error::ConnectionClosed),
                _ = connection.changed() => Err(Error::ConnectionClosed),
            }
        };
        tokio::time::timeout(self.inner.config.ack_timeout(), ack)
            .await
            .map_err(|_| Error::Timeout { waiting_for })?
    }
}

/// Removes a listener when dropped.
struct Subscription<'a> {
    client: &'a Client,
    kind: EventKind,
    id: ListenerId,
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.client.remove_listener(self.kind, self.id);
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // The reader only holds a weak reference; stop it so the socket
        // closes with the last handle.
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("username", &self.username())
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Dispatch lines until EOF or a read error, then release the socket.
/// Stops quietly once every [`Client`] handle is gone.
async fn read_loop<R>(weak: Weak<ClientInner>, mut reader: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let next = next_line(&mut reader, &mut buf).await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let client = Client::from_inner(inner);
        match next {
            Ok(Some(l)) => client.dispatch(&l),
            Ok(None) => {
                tracing::info!("Server closed the connection");
                client.release_socket().await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Socket read failed");
                client.release_socket().await;
                return;
            }
        }
    }
}

/// Next non-empty line with trailing whitespace trimmed, or `None` at EOF.
/// Invalid UTF-8 is replaced rather than rejected.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        if reader.read_until(b'\n', buf).await? == 0 {
            return Ok(None);
        }
        let decoded = String::from_utf8_lossy(buf);
        let trimmed = decoded.trim_end();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

fn install_crypto_provider() {
    #[cfg(feature = "ring")]
    {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
    #[cfg(all(feature = "aws-lc-rs", not(feature = "ring")))]
    {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

fn rustls_default_config() -> rustls::ClientConfig {
    install_crypto_provider();

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}
