//! Origins and target-origin constraints.
//!
//! Origins are `url::Origin` values: a `(scheme, host, port)` tuple for real
//! documents, or an opaque origin for blank / sandboxed documents.  An opaque
//! origin never equals anything but itself, so a blanked context silently
//! stops matching every `Exact` constraint.

use url::{Origin, Url};

/// Parse the origin of `address` (`"http://localhost:5050/forms/x"` →
/// `http://localhost:5050`).
pub fn origin_of(address: &str) -> Result<Origin, url::ParseError> {
    Ok(Url::parse(address)?.origin())
}

/// A fresh opaque origin, used for `about:blank` documents.
pub fn blank_origin() -> Origin {
    Origin::new_opaque()
}

/// Restricts which receiving origin a message may be delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginConstraint {
    /// Deliver only if the target's current origin equals this one.
    Exact(Origin),
    /// Deliver regardless of the target's origin (`"*"`).
    ///
    /// Only acceptable host → embedded, when the embedded document is not
    /// known yet.
    Any,
}

impl OriginConstraint {
    /// Whether a target currently at `origin` satisfies the constraint.
    pub fn admits(&self, origin: &Origin) -> bool {
        match self {
            OriginConstraint::Exact(expected) => expected == origin,
            OriginConstraint::Any => true,
        }
    }
}

impl std::fmt::Display for OriginConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginConstraint::Exact(origin) => write!(f, "{}", origin.ascii_serialization()),
            OriginConstraint::Any => write!(f, "*"),
        }
    }
}
