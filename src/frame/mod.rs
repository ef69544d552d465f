//! The embedded context.
//!
//! The host only sees an [`EmbeddedFrame`]: it can point it at an address
//! and blank it.  Everything else (prefill, submission) crosses the
//! [`MessageBus`](crate::bus::MessageBus).
//!
//! [`LocalFrame`] runs the embedded side in-process, loading documents
//! through a [`FormLoader`] such as [`CatalogLoader`].

pub mod loader;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;
use url::Origin;

pub use loader::{CatalogLoader, FormLoader};
pub use local::{FrameNotice, LocalFrame};

#[derive(Debug, Clone, Error)]
pub enum FrameError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("form not found: {0}")]
    NotFound(String),

    /// A later navigation or reset replaced this load.
    #[error("navigation superseded")]
    Superseded,

    /// The load task ended without a result.
    #[error("form load aborted: {0}")]
    Aborted(String),
}

/// Host-side handle to the embedded context.
#[async_trait]
pub trait EmbeddedFrame: Send + Sync {
    /// Load `address` (absolute, or relative to the host page).  Resolves
    /// once the new document is ready and returns its origin.
    async fn navigate(&self, address: &str) -> Result<Origin, FrameError>;

    /// Replace the embedded document with a blank one.
    fn reset(&self);
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn EmbeddedFrame>, _: Box<dyn FormLoader>) {}
};
