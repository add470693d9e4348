//! # TCP Peer Network
//!
//! A plain-TCP [`PeerNetwork`]. Every stream is its own connection and
//! starts with a preamble naming the protocol and the dialer's listening
//! port:
//!
//! ```text
//! [u8 protocol_len][protocol id][u16 BE listen_port]
//! ```
//!
//! The remote identity is `ip:listen_port`, so both ends agree on it. A
//! peer enters the table through a handshake stream in which each side
//! sends the JSON list of protocols it serves.
//!
//! Discovery, NAT traversal and encryption are out of scope.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use df_03_gossip::{BoxedStream, GossipError, PeerNetwork, StreamHandler};
use parking_lot::{Mutex, RwLock};
use shared_types::PeerId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Protocol of the stream that exchanges supported protocol lists.
pub const HANDSHAKE_PROTOCOL: &str = "/dforum/handshake/0.0.1";

/// Ceiling on a handshake body.
const MAX_HANDSHAKE_BYTES: u64 = 64 * 1024;

#[derive(Clone, Debug)]
pub struct TcpNetworkConfig {
    /// Interface to bind.
    pub listen_host: String,
    /// Port to bind. 0 picks a free one.
    pub listen_port: u16,
    /// Largest peer table.
    pub connection_high: usize,
    /// Deadline for dialing and for the handshake exchange.
    pub connect_timeout: Duration,
}

impl Default for TcpNetworkConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 6870,
            connection_high: 200,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
struct PeerEntry {
    address: SocketAddr,
    protocols: Vec<String>,
}

pub struct TcpPeerNetwork {
    local: PeerId,
    listen_port: u16,
    config: TcpNetworkConfig,
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
    handlers: RwLock<HashMap<String, Weak<dyn StreamHandler>>>,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpPeerNetwork {
    /// Bind the listener and start accepting streams.
    pub async fn bind(config: TcpNetworkConfig) -> Result<Arc<Self>, GossipError> {
        let listener =
            TcpListener::bind((config.listen_host.as_str(), config.listen_port)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening for peer streams");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let network = Arc::new(Self {
            local: PeerId::new(local_addr.to_string()),
            listen_port: local_addr.port(),
            config,
            peers: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            shutdown_tx,
            accept_task: Mutex::new(None),
        });

        let task = tokio::spawn(run_listener(
            listener,
            Arc::downgrade(&network),
            shutdown_rx,
        ));
        *network.accept_task.lock() = Some(task);
        Ok(network)
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Route inbound streams of `protocol` to `handler`.
    pub fn register_handler<H: StreamHandler + 'static>(&self, protocol: &str, handler: &Arc<H>) {
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn StreamHandler> = weak;
        self.handlers.write().insert(protocol.to_string(), weak);
    }

    pub fn supported_protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.handlers.read().keys().cloned().collect();
        protocols.sort();
        protocols
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Dial `address` (`ip:port`) and exchange protocol lists.
    pub async fn connect(&self, address: &str) -> Result<PeerId, GossipError> {
        if self.is_closed() {
            return Err(GossipError::StreamUnavailable {
                peer: address.to_string(),
                message: "network is closed".to_string(),
            });
        }

        let exchange = async {
            let mut stream = TcpStream::connect(address).await?;
            let remote = stream.peer_addr()?;
            write_preamble(&mut stream, HANDSHAKE_PROTOCOL, self.listen_port).await?;
            write_protocols(&mut stream, &self.supported_protocols()).await?;
            let protocols = read_protocols(&mut stream).await?;
            Ok::<_, GossipError>((remote, protocols))
        };
        let (remote, protocols) = timeout(self.config.connect_timeout, exchange)
            .await
            .map_err(|_| GossipError::Timeout {
                operation: "peer handshake",
            })??;

        let peer = PeerId::new(remote.to_string());
        if !self.add_peer(peer.clone(), remote, protocols) {
            return Err(GossipError::StreamUnavailable {
                peer: peer.to_string(),
                message: "peer rejected".to_string(),
            });
        }
        info!(peer = %peer, "connected to peer");
        Ok(peer)
    }

    /// Insert or refresh a peer. False for the local peer or when the table
    /// is full.
    fn add_peer(&self, peer: PeerId, address: SocketAddr, protocols: Vec<String>) -> bool {
        if peer == self.local {
            return false;
        }
        let mut peers = self.peers.write();
        if !peers.contains_key(&peer) && peers.len() >= self.config.connection_high {
            warn!(peer = %peer, limit = self.config.connection_high, "peer table full, rejecting");
            return false;
        }
        peers.insert(peer, PeerEntry { address, protocols });
        true
    }

    fn handler(&self, protocol: &str) -> Option<Arc<dyn StreamHandler>> {
        self.handlers.read().get(protocol).and_then(Weak::upgrade)
    }

    async fn accept_stream(&self, mut stream: TcpStream, remote: SocketAddr) {
        let preamble = timeout(self.config.connect_timeout, read_preamble(&mut stream)).await;
        let (protocol, listen_port) = match preamble {
            Ok(Ok(preamble)) => preamble,
            Ok(Err(e)) => {
                debug!(addr = %remote, error = %e, "dropping stream with bad preamble");
                return;
            }
            Err(_) => {
                debug!(addr = %remote, "dropping stream, preamble timed out");
                return;
            }
        };
        let address = SocketAddr::new(remote.ip(), listen_port);
        let peer = PeerId::new(address.to_string());

        if protocol == HANDSHAKE_PROTOCOL {
            self.answer_handshake(stream, peer, address).await;
            return;
        }

        match self.handler(&protocol) {
            Some(handler) => handler.handle_stream(peer, Box::new(stream)).await,
            None => debug!(peer = %peer, protocol = %protocol, "no handler for protocol"),
        }
    }

    async fn answer_handshake(&self, mut stream: TcpStream, peer: PeerId, address: SocketAddr) {
        let exchange = async {
            let protocols = read_protocols(&mut stream).await?;
            write_protocols(&mut stream, &self.supported_protocols()).await?;
            Ok::<_, GossipError>(protocols)
        };
        match timeout(self.config.connect_timeout, exchange).await {
            Ok(Ok(protocols)) => {
                if self.add_peer(peer.clone(), address, protocols) {
                    info!(peer = %peer, "peer connected");
                }
            }
            Ok(Err(e)) => warn!(peer = %peer, error = %e, "handshake failed"),
            Err(_) => warn!(peer = %peer, "handshake timed out"),
        }
    }
}

async fn run_listener(
    listener: TcpListener,
    network: Weak<TcpPeerNetwork>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("peer listener shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "error accepting connection");
                        continue;
                    }
                };
                let Some(network) = network.upgrade() else {
                    break;
                };
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(addr = %addr, error = %e, "failed to set TCP_NODELAY");
                }
                tokio::spawn(async move {
                    network.accept_stream(stream, addr).await;
                });
            }
        }
    }
}

async fn write_preamble<W: AsyncWrite + Unpin>(
    stream: &mut W,
    protocol: &str,
    listen_port: u16,
) -> Result<(), GossipError> {
    let id = protocol.as_bytes();
    let len = u8::try_from(id.len()).map_err(|_| GossipError::StreamUnavailable {
        peer: String::new(),
        message: format!("protocol id too long: {protocol}"),
    })?;
    let mut preamble = Vec::with_capacity(id.len() + 3);
    preamble.push(len);
    preamble.extend_from_slice(id);
    preamble.extend_from_slice(&listen_port.to_be_bytes());
    stream.write_all(&preamble).await?;
    Ok(())
}

async fn read_preamble<R: AsyncRead + Unpin>(stream: &mut R) -> Result<(String, u16), GossipError> {
    let len = stream.read_u8().await?;
    let mut id = vec![0u8; len as usize];
    stream.read_exact(&mut id).await?;
    let port = stream.read_u16().await?;
    let protocol = String::from_utf8(id).map_err(|e| GossipError::StreamUnavailable {
        peer: String::new(),
        message: format!("protocol id is not utf-8: {e}"),
    })?;
    Ok((protocol, port))
}

/// Length-prefixed (u32 BE) JSON list of protocol ids.
async fn write_protocols<W: AsyncWrite + Unpin>(
    stream: &mut W,
    protocols: &[String],
) -> Result<(), GossipError> {
    let body = serde_json::to_vec(protocols).map_err(|e| GossipError::StreamUnavailable {
        peer: String::new(),
        message: e.to_string(),
    })?;
    stream.write_u32(body.len() as u32).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_protocols<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<String>, GossipError> {
    let len = u64::from(stream.read_u32().await?);
    if len > MAX_HANDSHAKE_BYTES {
        return Err(GossipError::ResponseTooLarge {
            limit: MAX_HANDSHAKE_BYTES as usize,
        });
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    serde_json::from_slice(&body).map_err(|e| GossipError::StreamUnavailable {
        peer: String::new(),
        message: format!("invalid handshake: {e}"),
    })
}

#[async_trait]
impl PeerNetwork for TcpPeerNetwork {
    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.peers.read().keys().cloned().collect();
        peers.sort();
        peers
    }

    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxedStream, GossipError> {
        if self.is_closed() {
            return Err(GossipError::UnknownPeer(peer.to_string()));
        }
        let address = self
            .peers
            .read()
            .get(peer)
            .map(|entry| entry.address)
            .ok_or_else(|| GossipError::UnknownPeer(peer.to_string()))?;

        let dial = async {
            let mut stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            write_preamble(&mut stream, protocol, self.listen_port).await?;
            Ok::<_, GossipError>(stream)
        };
        let stream = timeout(self.config.connect_timeout, dial)
            .await
            .map_err(|_| GossipError::Timeout {
                operation: "stream open",
            })?
            .map_err(|e| GossipError::StreamUnavailable {
                peer: peer.to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(stream))
    }

    fn supports_protocol(&self, peer: &PeerId, protocol: &str) -> bool {
        self.peers
            .read()
            .get(peer)
            .is_some_and(|entry| entry.protocols.iter().any(|p| p == protocol))
    }

    fn peer_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .peers
            .read()
            .values()
            .map(|entry| entry.address.to_string())
            .collect();
        addresses.sort();
        addresses
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.peers.write().clear();
        info!("peer network closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_03_gossip::MESSAGE_PROTOCOL;

    struct Echo;

    #[async_trait]
    impl StreamHandler for Echo {
        async fn handle_stream(&self, _remote: PeerId, mut stream: BoxedStream) {
            let mut buf = Vec::new();
            if stream.read_to_end(&mut buf).await.is_ok() {
                let _ = stream.write_all(&buf).await;
                let _ = stream.shutdown().await;
            }
        }
    }

    fn local_config() -> TcpNetworkConfig {
        TcpNetworkConfig {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            connection_high: 8,
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_preamble_layout() {
        let mut buf = Vec::new();
        write_preamble(&mut buf, "/p", 6870).await.unwrap();
        assert_eq!(buf, vec![2, b'/', b'p', 0x1a, 0xd6]);

        let (protocol, port) = read_preamble(&mut buf.as_slice()).await.unwrap();
        assert_eq!(protocol, "/p");
        assert_eq!(port, 6870);
    }

    #[tokio::test]
    async fn test_handshake_registers_both_sides() {
        let echo = Arc::new(Echo);
        let a = TcpPeerNetwork::bind(local_config()).await.unwrap();
        let b = TcpPeerNetwork::bind(local_config()).await.unwrap();
        b.register_handler(MESSAGE_PROTOCOL, &echo);

        let peer_b = a.connect(&format!("127.0.0.1:{}", b.listen_port())).await.unwrap();
        assert_eq!(peer_b, b.local_peer());
        assert!(a.supports_protocol(&peer_b, MESSAGE_PROTOCOL));
        assert!(!a.supports_protocol(&peer_b, "/other"));

        // The answering side records the dialer once the handshake completes.
        for _ in 0..50 {
            if !b.connected_peers().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(b.connected_peers(), vec![a.local_peer()]);
        assert!(!b.supports_protocol(&a.local_peer(), MESSAGE_PROTOCOL));
        assert_eq!(a.peer_addresses(), vec![peer_b.to_string()]);
    }

    #[tokio::test]
    async fn test_stream_reaches_registered_handler() {
        let echo = Arc::new(Echo);
        let a = TcpPeerNetwork::bind(local_config()).await.unwrap();
        let b = TcpPeerNetwork::bind(local_config()).await.unwrap();
        b.register_handler(MESSAGE_PROTOCOL, &echo);
        let peer_b = a.connect(&format!("127.0.0.1:{}", b.listen_port())).await.unwrap();

        let mut stream = a.open_stream(&peer_b, MESSAGE_PROTOCOL).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        stream.shutdown().await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"ping");
    }

    #[tokio::test]
    async fn test_unknown_peer_and_closed_network() {
        let a = TcpPeerNetwork::bind(local_config()).await.unwrap();
        let stranger = PeerId::from("127.0.0.1:1");
        assert!(matches!(
            a.open_stream(&stranger, MESSAGE_PROTOCOL).await,
            Err(GossipError::UnknownPeer(_))
        ));

        a.close().await;
        assert!(a.is_closed());
        assert!(a.connect("127.0.0.1:1").await.is_err());
    }

    #[tokio::test]
    async fn test_peer_table_respects_high_watermark() {
        let a = TcpPeerNetwork::bind(TcpNetworkConfig {
            connection_high: 1,
            ..local_config()
        })
        .await
        .unwrap();
        let b = TcpPeerNetwork::bind(local_config()).await.unwrap();
        let c = TcpPeerNetwork::bind(local_config()).await.unwrap();

        assert!(a.connect(&format!("127.0.0.1:{}", b.listen_port())).await.is_ok());
        assert!(a.connect(&format!("127.0.0.1:{}", c.listen_port())).await.is_err());
        assert_eq!(a.connected_peers().len(), 1);
    }
}
