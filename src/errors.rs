use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::base::Capability;

/// Vendor-reported failure classes, normalized from HTTP status codes and
/// vendor error payloads so callers can branch without parsing vendor text.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorErrorKind {
    #[error("authentication rejected")]
    Auth,
    #[error("rate limited")]
    RateLimit,
    #[error("invalid request")]
    InvalidRequest,
    #[error("server error")]
    Server,
    #[error("vendor error")]
    Other,
}

impl VendorErrorKind {
    /// Classify an HTTP status the way every vendor in practice uses it.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => VendorErrorKind::Auth,
            429 => VendorErrorKind::RateLimit,
            400 | 404 | 422 => VendorErrorKind::InvalidRequest,
            s if s >= 500 => VendorErrorKind::Server,
            _ => VendorErrorKind::Other,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ChatError {
    /// Malformed canonical input: content neither string nor part sequence,
    /// mixed roles inside a turn, unknown role.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unconfigured or unknown adapter name. Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request needs a capability the active adapter does not advertise.
    #[error("Adapter '{adapter}' does not support {capability}")]
    UnsupportedCapability {
        adapter: &'static str,
        capability: Capability,
    },

    /// Network or connection failure, surfaced from the transport unchanged.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A well-formed vendor response carrying a vendor-reported failure.
    #[error("Vendor failure ({kind}): {message}")]
    Vendor {
        kind: VendorErrorKind,
        message: String,
    },

    /// Response or stream frame missing fields the adapter requires.
    #[error("Could not decode vendor response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(VendorErrorKind::from_status(401), VendorErrorKind::Auth);
        assert_eq!(VendorErrorKind::from_status(403), VendorErrorKind::Auth);
        assert_eq!(
            VendorErrorKind::from_status(429),
            VendorErrorKind::RateLimit
        );
        assert_eq!(
            VendorErrorKind::from_status(400),
            VendorErrorKind::InvalidRequest
        );
        assert_eq!(VendorErrorKind::from_status(503), VendorErrorKind::Server);
        assert_eq!(VendorErrorKind::from_status(302), VendorErrorKind::Other);
    }
}
