//! The boundary value representation (spec §6): the primitive shapes a
//! high-level layer encodes parameters into and decodes columns out of.
//! Concrete per-type codecs (chrono/time types, bigdecimal, etc.) are
//! pluggable and out of scope for this crate — see spec §1's "per-type
//! value encoders/decoders" exclusion — but the sum type itself is part of
//! the wire boundary and belongs here.

use std::borrow::Cow;

/// A primitive value crossing the client/server boundary, in the shape the
/// wire format can express it (before any typed codec interprets the bytes).
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue<'a> {
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Int4(i32),
    Int8(i64),
    UInt4(u32),
    BigInt(Cow<'a, [u8]>), // arbitrary-precision, textual two's-complement-agnostic digits
    Bool(bool),
    Char(char),
    Double(f64),
    /// Numerator/denominator pair for an exact rational.
    Rational(i64, i64),
    Date { year: i32, month: u8, day: u8 },
    Timestamp { unix_micros: i64 },
    TimestampTz { unix_micros: i64, offset_secs: i32 },
    Time { micros_since_midnight: u64 },
    Duration { micros: i64 },
    Null,
}

/// Plugged in by a higher layer to turn wire bytes into a [`PgValue`] for a
/// given column, and back. The core never calls this itself — it exists so
/// the result-set interface in [`crate::rowset`] has somewhere to delegate
/// column interpretation without the dispatcher depending on any specific
/// type's codec.
pub trait ValueCodec {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(type_oid: u32, format: i16, raw: Option<&[u8]>) -> Result<PgValue<'static>, Self::Error>;
}
