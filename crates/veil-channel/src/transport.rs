//! Collaborator seam for the anonymizing transport.
//!
//! The core never manages the anonymizing network itself; it consumes an
//! opaque listener address from whatever [`Rendezvous`] implementation the
//! embedding application provides (an onion-service controller in
//! production). [`LoopbackRendezvous`] is the development stand-in: the
//! "anonymous" address is just the local listener.

use async_trait::async_trait;

use veil_crypto::ChannelError;

/// Provider of anonymizing listener addresses.
#[async_trait]
pub trait Rendezvous {
    /// Create a listener reachable at the returned opaque address, forwarding
    /// to the given local port.
    async fn create_listener(&self, port: u16) -> Result<String, ChannelError>;

    /// Tear down any listener state created by this provider.
    async fn teardown(&self) -> Result<(), ChannelError>;
}

/// Development rendezvous: the listener address is the local port itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackRendezvous;

#[async_trait]
impl Rendezvous for LoopbackRendezvous {
    async fn create_listener(&self, port: u16) -> Result<String, ChannelError> {
        Ok(format!("127.0.0.1:{port}"))
    }

    async fn teardown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
