//! Channel client.
//!
//! Owns one outbound connection and the cipher engine backing it. The send
//! path is caller-blocking (pace → encrypt → write); the receive path runs
//! as a spawned task that decrypts each envelope, discards cover traffic,
//! and hands real plaintext to the caller's sink channel.
//!
//! Envelopes travel as newline-terminated base64 text. The alphabet never
//! contains a newline, so the terminator is unambiguous and the stream needs
//! no binary length framing.
//!
//! Failure policy (mirrors the channel error taxonomy): a frame that fails
//! to decrypt is logged and skipped — the loop never terminates on a single
//! bad frame. An I/O failure marks the channel disconnected and surfaces
//! `ConnectionLost`; the client never reconnects on its own.

use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
};
use veil_crypto::{ChannelError, CipherEngine, KeyMaterial, envelope};
use veil_proto::FRAME_BUCKETS;

use crate::obfuscator::{ObfuscationConfig, TrafficObfuscator};

/// Read buffer size: holds at least one complete envelope.
pub const READ_CHUNK: usize = 8192;

/// Largest possible envelope text: biggest frame in the forward-secrecy
/// layout, base64-expanded.
const MAX_ENVELOPE_TEXT: usize = (envelope::MIN_FORWARD_SIZE + FRAME_BUCKETS[3]).div_ceil(3) * 4;

const _: () = assert!(READ_CHUNK >= MAX_ENVELOPE_TEXT);

/// Buffered plaintexts awaiting the caller.
const SINK_CAPACITY: usize = 64;

/// One secure channel to a relay.
pub struct ChannelClient {
    engine: Arc<Mutex<CipherEngine>>,
    obfuscator: TrafficObfuscator,
    writer: OwnedWriteHalf,
    connected: bool,
    reader_abort: tokio::task::AbortHandle,
}

impl ChannelClient {
    /// Connect to a relay address (as resolved by the transport layer) and
    /// start the receive loop.
    ///
    /// Returns the client and the sink receiving decrypted plaintexts.
    ///
    /// # Errors
    ///
    /// - `ChannelError::ConnectionLost` if the connection cannot be
    ///   established
    pub async fn connect(
        addr: &str,
        material: KeyMaterial,
        config: ObfuscationConfig,
    ) -> Result<(Self, mpsc::Receiver<String>), ChannelError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ChannelError::ConnectionLost { reason: e.to_string() })?;

        Ok(Self::from_stream(stream, material, config))
    }

    /// Wrap an already-connected stream (used by tests and by transports
    /// that dial through a proxy).
    pub fn from_stream(
        stream: TcpStream,
        material: KeyMaterial,
        config: ObfuscationConfig,
    ) -> (Self, mpsc::Receiver<String>) {
        let (reader, writer) = stream.into_split();
        let engine = Arc::new(Mutex::new(CipherEngine::with_material(material)));
        let (sink, plaintexts) = mpsc::channel(SINK_CAPACITY);

        let handle = tokio::spawn(receive_loop(reader, Arc::clone(&engine), sink));

        let client = Self {
            engine,
            obfuscator: TrafficObfuscator::new(config),
            writer,
            connected: true,
            reader_abort: handle.abort_handle(),
        };

        (client, plaintexts)
    }

    /// Encrypt and send one message, paced by the obfuscator.
    ///
    /// # Errors
    ///
    /// - `ChannelError::ConnectionLost` if the channel is already closed or
    ///   the write fails; the channel is unusable afterwards
    /// - `ChannelError::Frame` for oversize plaintexts
    pub async fn send(&mut self, plaintext: &str) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::ConnectionLost { reason: "channel closed".to_string() });
        }

        self.obfuscator.pace().await;

        let mut envelope = self.engine.lock().await.encrypt(plaintext)?;
        envelope.push('\n');

        if let Err(e) = self.writer.write_all(envelope.as_bytes()).await {
            tracing::warn!("send failed, closing channel: {e}");
            self.connected = false;
            self.reader_abort.abort();
            return Err(ChannelError::ConnectionLost { reason: e.to_string() });
        }

        Ok(())
    }

    /// Whether the channel is still usable.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Close the channel: stop the receive loop, shut the socket down, and
    /// cleanse the key material.
    pub async fn close(&mut self) {
        self.connected = false;
        self.reader_abort.abort();
        let _ = self.writer.shutdown().await;
        self.engine.lock().await.cleanse();
    }
}

/// Blocking read loop: one line, one envelope.
async fn receive_loop(
    reader: OwnedReadHalf,
    engine: Arc<Mutex<CipherEngine>>,
    sink: mpsc::Sender<String>,
) {
    let mut lines = BufReader::with_capacity(READ_CHUNK, reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("peer closed the connection");
                break;
            },
            Err(e) => {
                tracing::debug!("read failed: {e}");
                break;
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let plaintext = match engine.lock().await.decrypt(&line) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                // Mode mismatch or corruption; the session survives
                tracing::debug!("dropping undecryptable frame: {e}");
                continue;
            },
        };

        if CipherEngine::is_dummy(&plaintext) {
            tracing::trace!("discarding cover traffic");
            continue;
        }

        if sink.send(plaintext).await.is_err() {
            // Caller dropped the receiver; nothing left to deliver to
            break;
        }
    }
}
