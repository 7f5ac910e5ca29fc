//! Connection dispatcher and wire protocol core for a PostgreSQL-compatible
//! server, speaking the frontend/backend protocol version 3.0.
//!
//! This crate does not parse SQL, does not pool connections, and does not
//! negotiate TLS. It owns exactly one job: given an already-connected byte
//! stream, pipeline [`Request`]s onto the wire and route the responses back
//! to their callers in order.

#[macro_use]
mod macros;

pub mod error;
pub mod io;
pub mod message;
pub mod parser;
pub mod value;

mod auth;
mod dispatcher;
mod notification;
mod request;
mod rowset;
mod session;
mod settings;

pub use auth::{
    encode_cancel_request, encode_cleartext_password, encode_startup, startup_session, AuthRequest,
    StartupInfo,
};
pub use dispatcher::{Dispatcher, DispatcherOptions};
pub use error::{BackendError, Error, ProtocolError, TransportError};
pub use notification::{BackendEvent, Notification};
pub use parser::{
    describe_response, ChooseByFirstTag, CollectRows, ExpectBindComplete, ExpectCloseComplete,
    ExpectCommandComplete, ExpectNoData, ExpectParameterDescription, ExpectParseComplete,
    ExpectPortalSuspended, ExpectRowDescription, ParseStep, QueryOutcome, ResponseParser,
    SkipUntilReadyForQuery, ThenReadyForQuery,
};
pub use request::Request;
pub use rowset::{RowDecodeError, RowDecoder, ResultSet};
pub use session::Session;
pub use settings::{ConnectionFields, Settings};
pub use value::{PgValue, ValueCodec};

#[cfg(feature = "md5-auth")]
pub use auth::encode_md5_password;
