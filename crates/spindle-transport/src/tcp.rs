//! TCP transport.
//!
//! Each node listens for inbound connections and keeps one outbound
//! connection per peer. Traffic on a connection is one-directional: the
//! dialer sends messages, the listener answers with status frames.
//!
//! ```text
//!   node A                                         node B
//!  ┌──────────────┐  Hello(a), Message(lead)   ┌──────────────┐
//!  │ dialer → b   │───────────────────────────▶│ inbound conn │──▶ B.on_message
//!  │              │◀───────────────────────────│              │
//!  └──────────────┘   Status(lead sid, good)   └──────────────┘
//!      │
//!      └──▶ A.on_status
//! ```
//!
//! A failed write of an acknowledged message is reported to the local
//! observer as a bad status from the target. Inbound failures just close the
//! connection.

use crate::error::{Result, TransportError};
use crate::frame::{codec, Frame};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use spindle_gossip::{NetworkSender, TransportObserver};
use spindle_types::{GossipMessage, NodeId, StatusAck};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type Connection = Framed<TcpStream, LengthDelimitedCodec>;

/// Outbound queue for one peer.
struct PeerLink {
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<GossipMessage>,
}

/// TCP implementation of [`NetworkSender`].
pub struct TcpTransport {
    local: NodeId,
    local_addr: SocketAddr,
    observer: Arc<dyn TransportObserver>,
    peers: RwLock<HashMap<NodeId, PeerLink>>,
    shutdown: CancellationToken,
}

impl TcpTransport {
    /// Binds the listener and starts accepting connections.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(
        local: NodeId,
        addr: SocketAddr,
        observer: Arc<dyn TransportObserver>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        tokio::spawn(accept_loop(
            listener,
            observer.clone(),
            shutdown.clone(),
        ));

        info!(node = %local, addr = %local_addr, "tcp transport listening");

        Ok(Self {
            local,
            local_addr,
            observer,
            peers: RwLock::new(HashMap::new()),
            shutdown,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns this node's identity.
    pub fn local_id(&self) -> &NodeId {
        &self.local
    }

    /// Registers a peer and starts its dialer.
    ///
    /// Re-registering a known peer replaces its address; the previous dialer
    /// exits once its queue is dropped.
    pub fn add_peer(&self, peer: NodeId, addr: SocketAddr) {
        let (outbound, queue) = mpsc::unbounded_channel();
        let dialer = Dialer {
            local: self.local.clone(),
            target: peer.clone(),
            addr,
            observer: self.observer.clone(),
            shutdown: self.shutdown.clone(),
        };
        tokio::spawn(dialer.run(queue));

        debug!(peer = %peer, addr = %addr, "registered peer");
        self.peers.write().insert(peer, PeerLink { addr, outbound });
    }

    /// Forgets a peer. Returns false if it was not known.
    pub fn remove_peer(&self, peer: &NodeId) -> bool {
        self.peers.write().remove(peer).is_some()
    }

    /// Returns the address registered for a peer.
    pub fn peer_addr(&self, peer: &NodeId) -> Result<SocketAddr> {
        self.peers
            .read()
            .get(peer)
            .map(|link| link.addr)
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))
    }

    /// Returns the number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Stops the listener, all inbound connections and all dialers.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(node = %self.local, "tcp transport shutting down");
            self.shutdown.cancel();
        }
    }

    fn report_bad(&self, target: &NodeId, message: &GossipMessage) {
        if message.expects_ack() {
            let status = StatusAck::bad(message.session_id());
            if self.observer.on_status(target.clone(), status).is_err() {
                trace!(peer = %target, "engine gone, bad status dropped");
            }
        }
    }
}

impl NetworkSender for TcpTransport {
    fn send(&self, target: &NodeId, message: GossipMessage) {
        let result = match self.peers.read().get(target) {
            Some(link) => link.outbound.send(message).map_err(|e| e.0),
            None => {
                warn!(peer = %target, kind = message.kind(), "no address for peer");
                Err(message)
            }
        };
        if let Err(message) = result {
            self.report_bad(target, &message);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local", &self.local)
            .field("local_addr", &self.local_addr)
            .field("peer_count", &self.peer_count())
            .finish()
    }
}

async fn accept_loop(
    listener: TcpListener,
    observer: Arc<dyn TransportObserver>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote)) => {
                let observer = observer.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_inbound(stream, observer, shutdown).await {
                        debug!(remote = %remote, error = %e, "inbound connection closed");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
    trace!("accept loop stopped");
}

/// Serves one inbound connection until it closes or fails.
async fn handle_inbound(
    stream: TcpStream,
    observer: Arc<dyn TransportObserver>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut conn = Framed::new(stream, codec());

    let peer = match conn.next().await {
        Some(body) => match Frame::decode(&body?)? {
            Frame::Hello { node_id } if !node_id.is_empty() => node_id,
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected hello, got {}",
                    other.kind()
                )))
            }
        },
        None => return Ok(()),
    };
    debug!(peer = %peer, "inbound connection established");

    loop {
        let body = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            next = conn.next() => match next {
                Some(body) => body?,
                None => return Ok(()),
            },
        };

        match Frame::decode(&body)? {
            Frame::Message(message) => {
                let ack = message
                    .expects_ack()
                    .then(|| StatusAck::good(message.session_id()));
                trace!(peer = %peer, kind = message.kind(), "received message");
                observer.on_message(peer.clone(), message)?;
                if let Some(ack) = ack {
                    conn.send(Frame::Status(ack).encode()?).await?;
                }
            }
            other => {
                debug!(peer = %peer, kind = other.kind(), "unexpected frame on inbound connection");
            }
        }
    }
}

/// Owns the outbound connection to one peer.
struct Dialer {
    local: NodeId,
    target: NodeId,
    addr: SocketAddr,
    observer: Arc<dyn TransportObserver>,
    shutdown: CancellationToken,
}

impl Dialer {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<GossipMessage>) {
        let mut writer: Option<SplitSink<Connection, bytes::Bytes>> = None;

        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = queue.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            if writer.is_none() {
                match self.connect().await {
                    Ok(sink) => writer = Some(sink),
                    Err(e) => {
                        warn!(peer = %self.target, addr = %self.addr, error = %e, "connect failed");
                    }
                }
            }

            let delivered = match writer.as_mut() {
                Some(sink) => match self.write(sink, &message).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(peer = %self.target, error = %e, "write failed, dropping connection");
                        false
                    }
                },
                None => false,
            };

            if !delivered {
                writer = None;
                if message.expects_ack() {
                    let status = StatusAck::bad(message.session_id());
                    if self.observer.on_status(self.target.clone(), status).is_err() {
                        break;
                    }
                }
            }
        }
        trace!(peer = %self.target, "dialer stopped");
    }

    async fn connect(&self) -> Result<SplitSink<Connection, bytes::Bytes>> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;

        let mut conn = Framed::new(stream, codec());
        conn.send(
            Frame::Hello {
                node_id: self.local.clone(),
            }
            .encode()?,
        )
        .await?;

        let (sink, stream) = conn.split();
        tokio::spawn(read_statuses(
            stream,
            self.target.clone(),
            self.observer.clone(),
            self.shutdown.clone(),
        ));

        debug!(peer = %self.target, addr = %self.addr, "outbound connection established");
        Ok(sink)
    }

    async fn write(
        &self,
        sink: &mut SplitSink<Connection, bytes::Bytes>,
        message: &GossipMessage,
    ) -> Result<()> {
        trace!(peer = %self.target, kind = message.kind(), "sending message");
        sink.send(Frame::Message(message.clone()).encode()?).await?;
        Ok(())
    }
}

/// Delivers status frames from an outbound connection.
async fn read_statuses(
    mut stream: SplitStream<Connection>,
    target: NodeId,
    observer: Arc<dyn TransportObserver>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = stream.next() => next,
        };

        let body = match next {
            Some(Ok(body)) => body,
            Some(Err(e)) => {
                debug!(peer = %target, error = %e, "status stream failed");
                return;
            }
            None => return,
        };

        match Frame::decode(&body) {
            Ok(Frame::Status(status)) => {
                if observer.on_status(target.clone(), status).is_err() {
                    return;
                }
            }
            Ok(other) => {
                debug!(peer = %target, kind = other.kind(), "unexpected frame on outbound connection");
            }
            Err(e) => {
                debug!(peer = %target, error = %e, "undecodable status frame");
                return;
            }
        }
    }
}
