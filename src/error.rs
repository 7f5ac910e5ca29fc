//! Error and Result types.
//!
//! Three of the four kinds in spec §7 are connection-fate-bearing
//! ([`TransportError`] kills it, [`ProtocolError`] should) and one is
//! per-request ([`BackendError`]); row-decoding errors live in
//! [`crate::rowset`] since they are a client-side concern of the result-set
//! interface, not of the dispatcher.

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Socket-level failure. Terminal for the connection: once observed, every
/// outstanding and future [`crate::Request`] resolves with a clone of it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub Arc<str>);

impl TransportError {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Arc::from(text.into()))
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Inbound bytes did not satisfy the expected parse. Terminal for the
/// current request; per spec §9 Open Question (a), implementations should
/// close the connection rather than attempt to resynchronize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ProtocolError(pub String);

/// A structured `ErrorResponse` from the backend, scoped to one request.
/// Field mapping per the v3 protocol: `S`/`C`/`M`/`D`/`H` →
/// severity/sqlstate/message/detail/hint (spec §6).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{severity}: {message} ({sqlstate})")]
pub struct BackendError {
    pub severity: String,
    pub sqlstate: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

/// Top-level error enum. `Transport` and `Protocol` are connection-terminal;
/// `Backend` is not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub fn protocol(text: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError(text.into()))
    }
}
