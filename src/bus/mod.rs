//! Cross-context message bus.
//!
//! The host context and the embedded context share nothing but this channel.
//!
//! ```text
//!  host ContextPort                         embedded ContextPort
//!  ┌──────────────┐   PREFILL_FORM (JSON)   ┌──────────────┐
//!  │ PortSender   │ ──────────────────────▶ │ PortReceiver │
//!  │ PortReceiver │ ◀────────────────────── │ PortSender   │
//!  └──────────────┘ FORM_SUBMITTED_IN_IFRAME└──────────────┘
//! ```
//!
//! Senders name a target-origin constraint; receivers get the sender's
//! declared origin with every message and must check it before decoding.
//!
//! # Quick start
//!
//! ```rust
//! use voice_form_assistant::bus::{origin_of, CrossContextMessage, FieldMap, MessageBus, OriginConstraint};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let host = origin_of("http://localhost:5050").unwrap();
//! let (host_port, embedded_port) = MessageBus::pair(host.clone(), host.clone());
//!
//! host_port.sender().send(
//!     &CrossContextMessage::PrefillForm(FieldMap::new()),
//!     &OriginConstraint::Exact(host.clone()),
//! );
//!
//! let (_tx, mut rx) = embedded_port.split();
//! let inbound = rx.recv().await.unwrap();
//! assert!(inbound.is_from(&host));
//! # }
//! ```

pub mod envelope;
pub mod origin;
pub mod port;

pub use envelope::{CrossContextMessage, FieldMap, SubmissionNotice};
pub use origin::{blank_origin, origin_of, OriginConstraint};
pub use port::{BusError, ContextPort, InboundMessage, MessageBus, PortReceiver, PortSender};
