//! Group channel abstraction.
//!
//! The sync engine needs exactly two things from the underlying messaging
//! layer: publish an opaque payload to every peer in the room, and receive
//! payloads tagged with their sender. Ordering must hold per sender; nothing
//! else is assumed (no acknowledgements, no global order).

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::warn;

use crate::ChannelError;

/// A payload received from the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Raw payload
    pub payload: Bytes,
    /// Channel-level identity of the publisher
    pub sender_id: String,
}

/// Group messaging channel for one peer.
pub trait Channel: Send {
    /// Channel-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Publish a payload to every peer in the room.
    ///
    /// Fire-and-forget: the runtime logs failures and moves on.
    fn publish(&mut self, payload: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receive the next payload.
    ///
    /// Returns `None` once the channel is closed, which ends the session.
    fn recv(&mut self) -> impl Future<Output = Option<Inbound>> + Send;
}

/// In-process room backed by [`tokio::sync::broadcast`].
///
/// Every payload is delivered to every member, the publisher included, in
/// publish order.
#[derive(Debug, Clone)]
pub struct BroadcastRoom {
    sender: broadcast::Sender<Inbound>,
    members: Arc<AtomicUsize>,
}

impl BroadcastRoom {
    /// Create a room buffering up to `capacity` undelivered payloads per
    /// member.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, members: Arc::new(AtomicUsize::new(0)) }
    }

    /// Join the room as `peer_id`.
    ///
    /// The member only sees payloads published after it joined.
    pub fn join(&self, peer_id: impl Into<String>) -> BroadcastChannel {
        self.members.fetch_add(1, Ordering::SeqCst);
        BroadcastChannel {
            peer_id: peer_id.into(),
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
            members: Arc::clone(&self.members),
        }
    }

    /// Number of members currently joined.
    pub fn member_count(&self) -> usize {
        self.members.load(Ordering::SeqCst)
    }
}

/// One member's view of a [`BroadcastRoom`]. Leaves the room on drop.
#[derive(Debug)]
pub struct BroadcastChannel {
    peer_id: String,
    sender: broadcast::Sender<Inbound>,
    receiver: broadcast::Receiver<Inbound>,
    members: Arc<AtomicUsize>,
}

impl BroadcastChannel {
    /// Identity this member publishes as.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Number of other members in the room.
    pub fn remote_peer_count(&self) -> usize {
        self.members.load(Ordering::SeqCst).saturating_sub(1)
    }
}

impl Channel for BroadcastChannel {
    type Error = ChannelError;

    fn publish(&mut self, payload: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let inbound = Inbound { payload, sender_id: self.peer_id.clone() };
        let result = self.sender.send(inbound).map(|_| ()).map_err(|_| ChannelError::Closed);
        std::future::ready(result)
    }

    async fn recv(&mut self) -> Option<Inbound> {
        loop {
            match self.receiver.recv().await {
                Ok(inbound) => return Some(inbound),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(peer = %self.peer_id, skipped, "receiver lagged, payloads dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.members.fetch_sub(1, Ordering::SeqCst);
    }
}
