//! Per-connection task
//!
//! Upgrades the socket to WebSocket, registers the peer, then pumps frames
//! in both directions until the client goes away, the socket fails or a
//! close is requested through the peer's handle. However the loop ends, the
//! peer is disconnected from the router exactly once.
//!
//! Every socket write races the peer's stall signal and `write_timeout`, so
//! a client that stops reading is dropped instead of pinning its task.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::protocol::{self, OutboundEvent};
use crate::registry::PeerId;
use crate::session::{Mailbox, Outbox, PeerHandle, SessionState};

use super::config::ServerConfig;
use super::router::Router;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// One client connection
pub struct Connection {
    state: SessionState,
    config: ServerConfig,
    router: Arc<Router>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Arc<Router>,
    ) -> Self {
        Self {
            state: SessionState::new(session_id, peer_addr),
            config,
            router,
        }
    }

    /// Serve `socket` until the connection ends
    pub async fn run(mut self, socket: TcpStream) -> Result<()> {
        let handshake = tokio_tungstenite::accept_async(socket);
        let ws = match time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                self.router.stats().connection_rejected();
                return Err(e.into());
            }
            Err(_) => {
                self.router.stats().connection_rejected();
                return Err(Error::HandshakeTimeout);
            }
        };
        self.router.stats().connection_accepted();

        let (handle, mut mailbox) = PeerHandle::channel(self.state.id, self.config.outbound_capacity);
        let peer_id = self.router.connect(handle).await;
        self.state.activate(peer_id.clone());

        let result = self.pump(ws, &peer_id, &mut mailbox).await;
        if let Err(Error::Stalled) = result {
            tracing::warn!(session_id = self.state.id, peer = %peer_id, "Dropping stalled connection");
        }

        self.state.close();
        self.router.disconnect(&peer_id).await;
        self.state.finish();

        tracing::debug!(
            session_id = self.state.id,
            peer = %peer_id,
            addr = %self.state.peer_addr,
            duration_secs = self.state.duration().as_secs(),
            frames_received = self.state.frames_received,
            frames_sent = self.state.frames_sent,
            malformed_frames = self.state.malformed_frames,
            "Session finished"
        );

        result
    }

    async fn pump(
        &mut self,
        ws: WebSocketStream<TcpStream>,
        peer_id: &PeerId,
        mailbox: &mut Mailbox,
    ) -> Result<()> {
        let (mut sink, mut source) = ws.split();

        let period = self.config.ping_interval;
        let mut ping = time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(peer_id, &text).await,
                    Some(Ok(Message::Binary(data))) => {
                        self.malformed(peer_id, &format!("binary frame of {} bytes", data.len()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = self.state.id, peer = %peer_id, "Closed by client");
                        return Ok(());
                    }
                    // Ping, pong and raw frames are handled by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                next = mailbox.next() => match next {
                    Outbox::Event(event) => self.send_event(&mut sink, mailbox, &event).await?,
                    Outbox::Close => {
                        for event in mailbox.drain() {
                            self.send_event(&mut sink, mailbox, &event).await?;
                        }
                        tracing::debug!(session_id = self.state.id, peer = %peer_id, "Closing connection");
                        self.write(&mut sink, mailbox, Message::Close(None)).await?;
                        return Ok(());
                    }
                    Outbox::Abort => return Err(Error::Stalled),
                },
                _ = ping.tick() => self.write(&mut sink, mailbox, Message::Ping(Vec::new())).await?,
            }
        }
    }

    async fn handle_text(&mut self, peer_id: &PeerId, text: &str) {
        self.state.frames_received += 1;

        match protocol::decode(text) {
            Ok(event) => {
                tracing::trace!(session_id = self.state.id, event = event.name(), "Inbound event");
                self.router.dispatch(peer_id, event).await;
            }
            Err(e) => self.malformed(peer_id, &e.to_string()),
        }
    }

    fn malformed(&mut self, peer_id: &PeerId, reason: &str) {
        self.state.malformed_frames += 1;
        self.router.stats().malformed_frame();
        tracing::debug!(
            session_id = self.state.id,
            peer = %peer_id,
            reason,
            "Malformed frame dropped"
        );
    }

    async fn send_event(
        &mut self,
        sink: &mut WsSink,
        mailbox: &Mailbox,
        event: &OutboundEvent,
    ) -> Result<()> {
        let text = protocol::encode(event)?;
        self.write(sink, mailbox, Message::Text(text)).await?;
        self.state.frames_sent += 1;
        Ok(())
    }

    async fn write(&self, sink: &mut WsSink, mailbox: &Mailbox, message: Message) -> Result<()> {
        tokio::select! {
            sent = time::timeout(self.config.write_timeout, sink.send(message)) => match sent {
                Ok(result) => Ok(result?),
                Err(_) => Err(Error::Stalled),
            },
            _ = mailbox.stalled() => Err(Error::Stalled),
        }
    }
}
