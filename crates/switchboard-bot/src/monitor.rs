// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot-side connection monitor.
//!
//! Keeps one WebSocket connection to the relay alive for the lifetime of the
//! bot: connects, registers, answers pings, hands admitted chat events to an
//! [`InboundHandler`], and reconnects after the connection drops until it is
//! stopped or its [`ReconnectStrategy`] gives up.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use strum::Display;
use switchboard_config::{BotConfig, DmPolicy};
use switchboard_core::frame::{self, BotFrame, RelayFrame};
use switchboard_core::{ChatEvent, SwitchboardError};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::{Admission, InboundFilter};
use crate::link::{BotLink, OUTBOUND_QUEUE};

/// How long the writer may keep flushing after the reader has finished.
const WRITER_GRACE: Duration = Duration::from_secs(2);

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives chat events admitted by the monitor.
///
/// Each event runs on its own task, so a slow handler does not hold up
/// pings or other events. `link` belongs to the connection the event arrived
/// on and stops accepting frames once that connection ends.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn on_chat(&self, event: ChatEvent, link: BotLink);
}

/// Decides how long to wait before the next connection attempt.
pub trait ReconnectStrategy: Send {
    /// Delay before the next attempt, or `None` to stop reconnecting.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Called once a connection has been accepted by the relay.
    fn reset(&mut self);
}

/// Constant delay between attempts, optionally capped in number.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            attempts: 0,
        }
    }

    /// Give up after `max` consecutive reconnects without a successful registration.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }
}

impl ReconnectStrategy for FixedInterval {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && self.attempts >= max
        {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Lifecycle of a [`ConnectionMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MonitorState {
    Disconnected,
    Connecting,
    /// The register frame was sent; waiting for the relay's answer.
    Registered,
    /// The relay accepted the registration.
    Active,
    Stopped,
}

/// Settings for one monitored bot identity.
#[derive(Clone)]
pub struct MonitorConfig {
    pub server_url: String,
    pub bot_id: String,
    pub bot_name: String,
    pub token: Option<String>,
    pub reconnect_interval: Duration,
    pub dm_policy: DmPolicy,
    pub allow_from: Vec<String>,
}

impl MonitorConfig {
    pub fn new(server_url: impl Into<String>, bot_id: impl Into<String>) -> Self {
        let bot_id = bot_id.into();
        let defaults = BotConfig::default();
        Self {
            server_url: server_url.into(),
            bot_name: bot_id.clone(),
            bot_id,
            token: None,
            reconnect_interval: defaults.reconnect_interval(),
            dm_policy: defaults.dm_policy,
            allow_from: Vec::new(),
        }
    }

    /// Build from the `[bot]` section; `server_url` and `bot_id` are required.
    pub fn from_bot_config(config: &BotConfig) -> Result<Self, SwitchboardError> {
        let server_url = non_blank(config.server_url.as_deref())
            .ok_or_else(|| SwitchboardError::Config("bot.server_url is required".into()))?;
        let bot_id = non_blank(config.bot_id.as_deref())
            .ok_or_else(|| SwitchboardError::Config("bot.bot_id is required".into()))?;

        let mut monitor = Self::new(server_url, bot_id);
        if let Some(name) = non_blank(config.bot_name.as_deref()) {
            monitor.bot_name = name.to_string();
        }
        monitor.token = config.token.clone();
        monitor.reconnect_interval = config.reconnect_interval();
        monitor.dm_policy = config.dm_policy;
        monitor.allow_from = config.allow_from.clone();
        Ok(monitor)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("server_url", &self.server_url)
            .field("bot_id", &self.bot_id)
            .field("bot_name", &self.bot_name)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("reconnect_interval", &self.reconnect_interval)
            .field("dm_policy", &self.dm_policy)
            .field("allow_from", &self.allow_from)
            .finish()
    }
}

/// Observer and control handle for a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    stop: CancellationToken,
    state: watch::Receiver<MonitorState>,
    link: watch::Receiver<Option<BotLink>>,
}

impl MonitorHandle {
    /// Stop the monitor and close its connection. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// The link of the current connection, if one is open.
    pub fn current_link(&self) -> Option<BotLink> {
        self.link.borrow().clone()
    }

    /// Wait until the monitor reports `target`.
    ///
    /// Fails if the monitor is dropped before reaching it.
    pub async fn wait_for_state(&self, target: MonitorState) -> Result<(), SwitchboardError> {
        let mut state = self.state.clone();
        let reached = state.wait_for(|current| *current == target).await.is_ok();
        if reached {
            Ok(())
        } else {
            Err(SwitchboardError::Internal(format!(
                "monitor ended before reaching {target}"
            )))
        }
    }
}

/// Keeps a bot connected and registered with the relay.
pub struct ConnectionMonitor<H> {
    config: MonitorConfig,
    handler: Arc<H>,
    strategy: Box<dyn ReconnectStrategy>,
    filter: InboundFilter,
    stop: CancellationToken,
    state: watch::Sender<MonitorState>,
    link: watch::Sender<Option<BotLink>>,
}

impl<H: InboundHandler> ConnectionMonitor<H> {
    pub fn new(config: MonitorConfig, handler: H) -> Self {
        let strategy = FixedInterval::new(config.reconnect_interval);
        let filter = InboundFilter::new(config.dm_policy, config.allow_from.iter().cloned());
        let (state, _) = watch::channel(MonitorState::Disconnected);
        let (link, _) = watch::channel(None);
        Self {
            config,
            handler: Arc::new(handler),
            strategy: Box::new(strategy),
            filter,
            stop: CancellationToken::new(),
            state,
            link,
        }
    }

    pub fn with_strategy(mut self, strategy: impl ReconnectStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            stop: self.stop.clone(),
            state: self.state.subscribe(),
            link: self.link.subscribe(),
        }
    }

    /// Run until `lifetime` is cancelled, the handle stops the monitor, or
    /// the reconnect strategy gives up.
    pub async fn run(mut self, lifetime: CancellationToken) {
        let halt = lifetime.child_token();
        let stop = self.stop.clone();
        let relay_stop = halt.clone();
        let stop_watcher = tokio::spawn(async move {
            tokio::select! {
                () = stop.cancelled() => relay_stop.cancel(),
                () = relay_stop.cancelled() => {}
            }
        });

        if !self.stop.is_cancelled() && !halt.is_cancelled() {
            self.connect_loop(&halt).await;
        }

        self.link.send_replace(None);
        self.set_state(MonitorState::Stopped);
        halt.cancel();
        let _ = stop_watcher.await;
        info!(bot_id = %self.config.bot_id, "connection monitor stopped");
    }

    async fn connect_loop(&mut self, halt: &CancellationToken) {
        loop {
            self.set_state(MonitorState::Connecting);
            info!(
                bot_id = %self.config.bot_id,
                url = %self.config.server_url,
                "connecting to relay"
            );

            let url = self.config.server_url.clone();
            let connected = tokio::select! {
                () = halt.cancelled() => return,
                result = connect_async(url.as_str()) => result,
            };
            match connected {
                Ok((socket, _)) => {
                    if self.session(socket, halt).await {
                        self.strategy.reset();
                    }
                }
                Err(e) => warn!(error = %e, "relay connection failed"),
            }

            self.link.send_replace(None);
            self.set_state(MonitorState::Disconnected);
            if halt.is_cancelled() {
                return;
            }

            let Some(delay) = self.strategy.next_delay() else {
                warn!(bot_id = %self.config.bot_id, "giving up on reconnecting to relay");
                return;
            };
            debug!(?delay, "reconnecting to relay");
            tokio::select! {
                () = halt.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drive one connection. Returns whether the relay accepted the registration.
    async fn session(&mut self, socket: RelaySocket, halt: &CancellationToken) -> bool {
        let (sink, mut stream) = socket.split();
        let (link, rx) = BotLink::channel(OUTBOUND_QUEUE);
        let mut writer = tokio::spawn(write_loop(sink, rx, link.clone()));
        self.link.send_replace(Some(link.clone()));

        let register = BotFrame::Register {
            bot_id: self.config.bot_id.clone(),
            bot_name: self.config.bot_name.clone(),
            token: self.config.token.clone().unwrap_or_default(),
        };
        let mut activated = false;
        match link.send(&register).await {
            Ok(()) => {
                self.set_state(MonitorState::Registered);
                loop {
                    tokio::select! {
                        () = halt.cancelled() => break,
                        () = link.closed() => break,
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                activated |= self.route_frame(text.as_str(), &link).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("relay closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "relay socket read failed");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to send register frame"),
        }

        link.close();
        if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
        activated
    }

    /// Handle one frame from the relay. Returns `true` on a successful registration ack.
    async fn route_frame(&mut self, raw: &str, link: &BotLink) -> bool {
        let frame: RelayFrame = match frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed relay frame");
                return false;
            }
        };

        match frame {
            RelayFrame::Chat(event) => match self.filter.admit(&event) {
                Admission::Accept => {
                    let handler = self.handler.clone();
                    let link = link.clone();
                    tokio::spawn(async move { handler.on_chat(event, link).await });
                }
                Admission::Duplicate => {
                    debug!(event_id = %event.id, "dropping duplicate chat event");
                }
                Admission::NotAllowed => {
                    info!(from = %event.from, "dropping direct message from sender outside allowlist");
                }
            },
            RelayFrame::Ping => {
                if let Err(e) = link.send(&BotFrame::Pong).await {
                    warn!(error = %e, "failed to answer ping");
                }
            }
            RelayFrame::Registered { success: true, .. } => {
                info!(bot_id = %self.config.bot_id, "registered with relay");
                self.set_state(MonitorState::Active);
                return true;
            }
            RelayFrame::Registered {
                success: false,
                error,
            } => {
                warn!(
                    bot_id = %self.config.bot_id,
                    error = error.as_deref().unwrap_or("unspecified"),
                    "relay rejected registration"
                );
            }
            RelayFrame::Error { message } => warn!(%message, "relay reported an error"),
            RelayFrame::Unknown => {
                debug!(
                    frame_type = frame::frame_type(raw).as_deref().unwrap_or("<none>"),
                    "ignoring unknown relay frame"
                );
            }
        }
        false
    }

    fn set_state(&self, next: MonitorState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "monitor state changed");
        }
    }
}

/// Forward queued frames to the socket in order, then close it.
async fn write_loop<S>(mut sink: S, mut rx: mpsc::Receiver<String>, link: BotLink)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        error!(error = %e, "relay socket write failed");
                        link.close();
                        return;
                    }
                }
                None => break,
            },
            () = link.closed() => break,
        }
    }

    while let Ok(text) = rx.try_recv() {
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Run a monitor for the `[bot]` section until `lifetime` is cancelled.
pub async fn start_monitor<H: InboundHandler>(
    config: &BotConfig,
    handler: H,
    lifetime: CancellationToken,
) -> Result<(), SwitchboardError> {
    let config = MonitorConfig::from_bot_config(config)?;
    ConnectionMonitor::new(config, handler).run(lifetime).await;
    Ok(())
}
