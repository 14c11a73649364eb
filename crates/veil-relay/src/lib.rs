//! Veil relay server.
//!
//! The relay is deliberately dumb: it holds the set of connected peers and
//! forwards every received envelope, verbatim, to every peer except the
//! sender. It never decrypts relayed traffic. Its one cryptographic duty is
//! cover traffic: an independent scheduler periodically broadcasts a dummy
//! envelope indistinguishable from a real message, so a passive observer
//! cannot infer conversation activity from wire volume.
//!
//! # Architecture
//!
//! One task per accepted connection, all sharing the peer map behind an
//! async `RwLock` (add on connect, remove on disconnect or send failure).
//! Broadcast snapshots the peer set, then writes to each peer's half behind
//! its own `Mutex`; a failed write removes that peer without aborting the
//! rest of the broadcast. Frames from one peer are forwarded in receive
//! order; no cross-peer ordering is promised.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use rand::{RngCore, rngs::OsRng};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::{Mutex, RwLock},
};
use veil_channel::{ObfuscationConfig, READ_CHUNK};
use veil_crypto::{ChannelError, CipherEngine, KeyMaterial};

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Listener or accept failure.
    #[error("relay i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel-layer failure (cover-traffic generation).
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Relay runtime configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Local address to bind; the rendezvous layer forwards to it.
    pub bind_address: String,
    /// Timing parameters for the cover-traffic scheduler.
    pub obfuscation: ObfuscationConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            obfuscation: ObfuscationConfig::default(),
        }
    }
}

/// Connected peers, keyed by random session id.
///
/// All mutation happens here: insert on connect, remove on disconnect or
/// send failure. Broadcasts iterate a snapshot of the ids so a concurrent
/// add or remove can never invalidate an iteration in progress.
#[derive(Default)]
struct PeerMap {
    writers: RwLock<HashMap<u64, Mutex<OwnedWriteHalf>>>,
}

impl PeerMap {
    async fn insert(&self, peer_id: u64, writer: OwnedWriteHalf) {
        self.writers.write().await.insert(peer_id, Mutex::new(writer));
    }

    async fn remove(&self, peer_id: u64) {
        self.writers.write().await.remove(&peer_id);
    }

    async fn is_empty(&self) -> bool {
        self.writers.read().await.is_empty()
    }

    /// Forward one envelope line to every peer except `exclude`.
    ///
    /// Failed peers are removed and closed after the broadcast completes;
    /// one bad peer never stalls delivery to the rest.
    async fn broadcast(&self, exclude: Option<u64>, line: &str) {
        let mut failed = Vec::new();

        {
            let writers = self.writers.read().await;
            let targets: Vec<u64> = writers.keys().copied().collect();

            for peer_id in targets {
                if Some(peer_id) == exclude {
                    continue;
                }
                let Some(writer) = writers.get(&peer_id) else {
                    continue;
                };

                let mut writer = writer.lock().await;
                let result = async {
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await
                }
                .await;

                if let Err(e) = result {
                    tracing::warn!("broadcast write failed for peer {peer_id}: {e}");
                    failed.push(peer_id);
                }
            }
        }

        for peer_id in failed {
            self.remove(peer_id).await;
            tracing::info!("peer {peer_id} removed after send failure");
        }
    }
}

/// Production relay: TCP listener plus cover-traffic scheduler.
pub struct Relay {
    listener: TcpListener,
    peers: Arc<PeerMap>,
    engine: Arc<Mutex<CipherEngine>>,
    config: RelayConfig,
}

impl Relay {
    /// Bind the relay's local listener.
    ///
    /// The key material is used only to generate cover traffic; relayed
    /// envelopes pass through untouched.
    pub async fn bind(config: RelayConfig, material: KeyMaterial) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self {
            listener,
            peers: Arc::new(PeerMap::default()),
            engine: Arc::new(Mutex::new(CipherEngine::with_material(material))),
            config,
        })
    }

    /// Local address the relay is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the relay: accept peers and fan out until shut down.
    pub async fn run(self) -> Result<(), RelayError> {
        tracing::info!("relay listening on {}", self.listener.local_addr()?);

        tokio::spawn(run_dummy_scheduler(
            Arc::clone(&self.engine),
            Arc::clone(&self.peers),
            self.config.obfuscation,
        ));

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let peer_id = {
                        let mut buf = [0u8; 8];
                        OsRng.fill_bytes(&mut buf);
                        u64::from_le_bytes(buf)
                    };

                    tracing::debug!("accepted {addr} as peer {peer_id}");

                    let peers = Arc::clone(&self.peers);
                    tokio::spawn(async move {
                        handle_peer(peer_id, stream, peers).await;
                    });
                },
                Err(e) => {
                    tracing::error!("accept failed: {e}");
                },
            }
        }
    }
}

/// Serve one peer: register its write half, forward every received line.
async fn handle_peer(peer_id: u64, stream: TcpStream, peers: Arc<PeerMap>) {
    let (reader, writer) = stream.into_split();
    peers.insert(peer_id, writer).await;
    tracing::info!("peer {peer_id} connected");

    let mut lines = BufReader::with_capacity(READ_CHUNK, reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                // Verbatim fan-out; the relay never decrypts
                peers.broadcast(Some(peer_id), &line).await;
            },
            Ok(None) => {
                tracing::debug!("peer {peer_id} closed the connection");
                break;
            },
            Err(e) => {
                tracing::debug!("peer {peer_id} read failed: {e}");
                break;
            },
        }
    }

    peers.remove(peer_id).await;
    tracing::info!("peer {peer_id} disconnected");
}

/// Independent cover-traffic loop, alive for the relay's lifetime.
///
/// Wakes every `dummy_interval + Uniform[0, dummy_jitter]`; when at least
/// one peer is connected, broadcasts one dummy envelope exactly like a real
/// message. Never blocks real-message handling.
async fn run_dummy_scheduler(
    engine: Arc<Mutex<CipherEngine>>,
    peers: Arc<PeerMap>,
    config: ObfuscationConfig,
) {
    loop {
        tokio::time::sleep(config.next_dummy_interval()).await;

        if peers.is_empty().await {
            continue;
        }

        let envelope = engine.lock().await.generate_dummy();
        match envelope {
            Ok(envelope) => {
                peers.broadcast(None, &envelope).await;
                tracing::trace!("broadcast cover traffic");
            },
            Err(e) => {
                tracing::warn!("cover traffic generation failed: {e}");
            },
        }
    }
}
