/// Lazily-evaluated conversion to [`crate::error::Error::Protocol`], mirroring the
/// teacher's `protocol_err!()` so call sites read like `return Err(protocol_err!("..."))`
/// without paying for a `String` allocation on the success path.
macro_rules! protocol_err {
    ($($args:tt)*) => {
        $crate::error::Error::Protocol($crate::error::ProtocolError(format!($($args)*)))
    };
}
