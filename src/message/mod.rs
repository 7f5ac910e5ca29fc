//! PostgreSQL frontend/backend protocol v3.0 message codecs.
//!
//! Every message on the wire is `[tag: u8][len: i32 BE, length-including-
//! itself][payload: len - 4 bytes]`, except `StartupMessage` and
//! `CancelRequest`, which are untagged (spec §4.4, §6). This module holds
//! the per-message encode/decode logic; framing the raw byte stream into
//! `(tag, payload)` pairs is the dispatcher's [`crate::dispatcher`] job, not
//! this one's — the split mirrors the teacher's `postgres/message/` (codecs)
//! vs. `postgres/connection/stream.rs` (framing) boundary.

pub mod backend;
pub mod frontend;

use bytes::Bytes;

use crate::error::Error;

/// One framed, already-length-delimited backend message: the tag byte and
/// its payload (length prefix consumed, not retained).
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub tag: u8,
    pub payload: Bytes,
}

/// Encodes a frontend message into a caller-supplied buffer. Mirrors the
/// teacher's `Encode` trait (`postgres/message/query.rs` et al.): the buffer
/// is appended to directly, never built up through an intermediate value.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// Decodes a backend message body. `payload` has already had its 4-byte
/// length prefix stripped by the framer.
pub trait Decode: Sized {
    fn decode(payload: Bytes) -> Result<Self, Error>;
}

macro_rules! backend_tags {
    ($($name:ident => $tag:literal),* $(,)?) => {
        /// The single-byte tag identifying a backend message's shape.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum BackendTag {
            $($name,)*
            Unknown(u8),
        }

        impl BackendTag {
            pub fn from_u8(b: u8) -> Self {
                match b {
                    $($tag => BackendTag::$name,)*
                    other => BackendTag::Unknown(other),
                }
            }

            pub fn as_u8(self) -> u8 {
                match self {
                    $(BackendTag::$name => $tag,)*
                    BackendTag::Unknown(b) => b,
                }
            }
        }
    };
}

backend_tags! {
    Authentication => b'R',
    BackendKeyData => b'K',
    BindComplete => b'2',
    CloseComplete => b'3',
    CommandComplete => b'C',
    DataRow => b'D',
    EmptyQueryResponse => b'I',
    ErrorResponse => b'E',
    NoData => b'n',
    NoticeResponse => b'N',
    NotificationResponse => b'A',
    ParameterDescription => b't',
    ParameterStatus => b'S',
    ParseComplete => b'1',
    PortalSuspended => b's',
    ReadyForQuery => b'Z',
    RowDescription => b'T',
}
