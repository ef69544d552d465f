//! The two ends of a host ↔ embedded channel.
//!
//! A [`ContextPort`] is everything one context owns of the channel: a
//! cloneable [`PortSender`] that posts to the peer and a [`PortReceiver`]
//! for inbound messages.  Messages cross as JSON values, never as shared
//! Rust objects.

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Origin;

use super::envelope::CrossContextMessage;
use super::origin::OriginConstraint;

// ---------------------------------------------------------------------------
// BusError
// ---------------------------------------------------------------------------

/// Errors raised while decoding inbound messages.
#[derive(Debug, Error)]
pub enum BusError {
    /// The inbound data is not a known envelope.
    #[error("cannot decode cross-context message: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// InboundMessage
// ---------------------------------------------------------------------------

/// A delivered message together with the origin the sender declared.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Origin of the sending context at the time it posted.
    pub origin: Origin,
    /// Raw envelope.
    pub data: serde_json::Value,
}

impl InboundMessage {
    /// Whether the sender's origin equals `expected`.
    pub fn is_from(&self, expected: &Origin) -> bool {
        &self.origin == expected
    }

    /// Decode the envelope.  Only call this after the origin was checked.
    pub fn decode(&self) -> Result<CrossContextMessage, BusError> {
        serde_json::from_value(self.data.clone()).map_err(|e| BusError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Shared origin cell
// ---------------------------------------------------------------------------

/// Current origin of one context.  Written only by that context (on
/// navigation); read by the peer's sender to enforce target constraints.
#[derive(Debug, Clone)]
struct OriginCell(Arc<RwLock<Origin>>);

impl OriginCell {
    fn new(origin: Origin) -> Self {
        Self(Arc::new(RwLock::new(origin)))
    }

    fn get(&self) -> Origin {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, origin: Origin) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = origin;
    }
}

// ---------------------------------------------------------------------------
// PortSender
// ---------------------------------------------------------------------------

/// Posting half of a port.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct PortSender {
    label: &'static str,
    own: OriginCell,
    peer: OriginCell,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

impl PortSender {
    /// Post `message` to the peer context.
    ///
    /// Fire-and-forget: returns `true` when the message was handed to the
    /// channel, `false` when it was dropped because the peer's origin does
    /// not satisfy `target` or the peer is gone.  Delivery order is FIFO for
    /// messages posted through the same port.
    pub fn send(&self, message: &CrossContextMessage, target: &OriginConstraint) -> bool {
        let peer_origin = self.peer.get();
        if !target.admits(&peer_origin) {
            log::debug!(
                "bus[{}]: dropping {}, target origin {} does not match {}",
                self.label,
                message.kind(),
                target,
                peer_origin.ascii_serialization()
            );
            return false;
        }

        let data = match serde_json::to_value(message) {
            Ok(data) => data,
            Err(e) => {
                log::error!("bus[{}]: cannot serialise {}: {e}", self.label, message.kind());
                return false;
            }
        };

        let delivered = self
            .tx
            .send(InboundMessage {
                origin: self.own.get(),
                data,
            })
            .is_ok();

        if delivered {
            log::debug!("bus[{}]: posted {}", self.label, message.kind());
        } else {
            log::debug!("bus[{}]: peer closed, {} lost", self.label, message.kind());
        }
        delivered
    }

    /// This context's current origin.
    pub fn origin(&self) -> Origin {
        self.own.get()
    }

    /// The peer context's current origin.
    pub fn peer_origin(&self) -> Origin {
        self.peer.get()
    }

    /// Record that this context now hosts a document from `origin`.
    pub fn relocate(&self, origin: Origin) {
        log::debug!(
            "bus[{}]: relocated to {}",
            self.label,
            origin.ascii_serialization()
        );
        self.own.set(origin);
    }
}

// ---------------------------------------------------------------------------
// PortReceiver
// ---------------------------------------------------------------------------

/// Receiving half of a port.
#[derive(Debug)]
pub struct PortReceiver {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl PortReceiver {
    /// Wait for the next inbound message.  `None` once the peer is dropped.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// ContextPort
// ---------------------------------------------------------------------------

/// One context's end of the bus.
#[derive(Debug)]
pub struct ContextPort {
    sender: PortSender,
    receiver: PortReceiver,
}

impl ContextPort {
    /// Posting half.
    pub fn sender(&self) -> &PortSender {
        &self.sender
    }

    /// Separate the halves so they can live in different tasks.
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }

    /// Invoke `handler` for every inbound message on a spawned task.
    ///
    /// The handler receives the message with the sender's declared origin
    /// and is responsible for validating it.  Returns the posting half and
    /// the task handle; the task ends when the peer is dropped.
    pub fn on_receive<F>(self, mut handler: F) -> (PortSender, JoinHandle<()>)
    where
        F: FnMut(InboundMessage) + Send + 'static,
    {
        let (sender, mut receiver) = self.split();
        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                handler(message);
            }
        });
        (sender, handle)
    }
}

// ---------------------------------------------------------------------------
// MessageBus
// ---------------------------------------------------------------------------

/// Factory for connected host / embedded ports.
pub struct MessageBus;

impl MessageBus {
    /// Create a connected pair: `(host_port, embedded_port)`.
    pub fn pair(host_origin: Origin, embedded_origin: Origin) -> (ContextPort, ContextPort) {
        let host_cell = OriginCell::new(host_origin);
        let embedded_cell = OriginCell::new(embedded_origin);

        let (to_embedded, embedded_rx) = mpsc::unbounded_channel();
        let (to_host, host_rx) = mpsc::unbounded_channel();

        let host = ContextPort {
            sender: PortSender {
                label: "host",
                own: host_cell.clone(),
                peer: embedded_cell.clone(),
                tx: to_embedded,
            },
            receiver: PortReceiver { rx: host_rx },
        };
        let embedded = ContextPort {
            sender: PortSender {
                label: "embedded",
                own: embedded_cell,
                peer: host_cell,
                tx: to_host,
            },
            receiver: PortReceiver { rx: embedded_rx },
        };

        (host, embedded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
