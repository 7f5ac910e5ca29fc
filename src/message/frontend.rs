//! Frontend (client → server) messages.

use crate::io::BufMutExt;
use crate::message::Encode;

/// The first message on a connection. Untagged — no leading type byte —
/// unlike every other frontend message.
#[derive(Debug)]
pub struct StartupMessage<'a> {
    pub params: &'a [(&'a str, &'a str)],
}

const PROTOCOL_VERSION_3_0: i32 = 0x0003_0000;

impl Encode for StartupMessage<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.with_length_prefix(|buf| {
            buf.put_i32(PROTOCOL_VERSION_3_0);

            for (key, value) in self.params {
                buf.put_str_nul(key);
                buf.put_str_nul(value);
            }

            buf.put_u8(0);
        });
    }
}

/// Sent in response to an `AuthenticationCleartextPassword` or
/// `AuthenticationMD5Password` request. The wire shape is identical either
/// way; only the string contents differ (spec §6).
#[derive(Debug)]
pub struct PasswordMessage<'a>(pub &'a str);

impl Encode for PasswordMessage<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'p');
        buf.with_length_prefix(|buf| buf.put_str_nul(self.0));
    }
}

#[derive(Debug)]
pub struct Query<'a>(pub &'a str);

impl Encode for Query<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'Q');
        buf.with_length_prefix(|buf| buf.put_str_nul(self.0));
    }
}

/// Parses a query string into a prepared statement. `statement` is the
/// (possibly empty, for the unnamed statement) destination name.
#[derive(Debug)]
pub struct Parse<'a> {
    pub statement: &'a str,
    pub query: &'a str,
    pub param_types: &'a [u32],
}

impl Encode for Parse<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'P');
        buf.with_length_prefix(|buf| {
            buf.put_str_nul(self.statement);
            buf.put_str_nul(self.query);

            buf.put_i16(self.param_types.len() as i16);
            for &oid in self.param_types {
                buf.put_u32(oid);
            }
        });
    }
}

/// One bound parameter, either the text or the binary wire format.
#[derive(Debug)]
pub enum BindFormat {
    Text,
    Binary,
}

#[derive(Debug)]
pub struct Bind<'a> {
    pub portal: &'a str,
    pub statement: &'a str,
    pub formats: &'a [BindFormat],
    /// `None` encodes SQL NULL.
    pub params: &'a [Option<&'a [u8]>],
    pub result_formats: &'a [BindFormat],
}

impl Encode for Bind<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'B');
        buf.with_length_prefix(|buf| {
            buf.put_str_nul(self.portal);
            buf.put_str_nul(self.statement);

            buf.put_i16(self.formats.len() as i16);
            for fmt in self.formats {
                buf.put_i16(match fmt {
                    BindFormat::Text => 0,
                    BindFormat::Binary => 1,
                });
            }

            buf.put_i16(self.params.len() as i16);
            for param in self.params {
                match param {
                    None => buf.put_i32(-1),
                    Some(bytes) => {
                        buf.put_i32(bytes.len() as i32);
                        buf.put_bytes(bytes);
                    }
                }
            }

            buf.put_i16(self.result_formats.len() as i16);
            for fmt in self.result_formats {
                buf.put_i16(match fmt {
                    BindFormat::Text => 0,
                    BindFormat::Binary => 1,
                });
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DescribeTarget<'a> {
    Statement(&'a str),
    Portal(&'a str),
}

#[derive(Debug)]
pub struct Describe<'a>(pub DescribeTarget<'a>);

impl Encode for Describe<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'D');
        buf.with_length_prefix(|buf| match self.0 {
            DescribeTarget::Statement(name) => {
                buf.put_u8(b'S');
                buf.put_str_nul(name);
            }
            DescribeTarget::Portal(name) => {
                buf.put_u8(b'P');
                buf.put_str_nul(name);
            }
        });
    }
}

#[derive(Debug)]
pub struct Execute<'a> {
    pub portal: &'a str,
    /// Maximum rows to return; `0` means no limit.
    pub max_rows: u32,
}

impl Encode for Execute<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'E');
        buf.with_length_prefix(|buf| {
            buf.put_str_nul(self.portal);
            buf.put_u32(self.max_rows);
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CloseTarget<'a> {
    Statement(&'a str),
    Portal(&'a str),
}

#[derive(Debug)]
pub struct Close<'a>(pub CloseTarget<'a>);

impl Encode for Close<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'C');
        buf.with_length_prefix(|buf| match self.0 {
            CloseTarget::Statement(name) => {
                buf.put_u8(b'S');
                buf.put_str_nul(name);
            }
            CloseTarget::Portal(name) => {
                buf.put_u8(b'P');
                buf.put_str_nul(name);
            }
        });
    }
}

#[derive(Debug)]
pub struct Sync;

impl Encode for Sync {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'S');
        buf.put_i32(4);
    }
}

#[derive(Debug)]
pub struct Flush;

impl Encode for Flush {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'H');
        buf.put_i32(4);
    }
}

#[derive(Debug)]
pub struct Terminate;

impl Encode for Terminate {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(b'X');
        buf.put_i32(4);
    }
}

/// Sent on a dedicated, short-lived connection (not through the dispatcher's
/// pipeline — it is unpaired with a response). See `encode_cancel_request`
/// in [`crate::auth`].
#[derive(Debug)]
pub struct CancelRequest {
    pub process_id: i32,
    pub secret_key: i32,
}

const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678;

impl Encode for CancelRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.with_length_prefix(|buf| {
            buf.put_i32(CANCEL_REQUEST_CODE);
            buf.put_i32(self.process_id);
            buf.put_i32(self.secret_key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_query() {
        let mut buf = Vec::new();
        Query("SELECT 1").encode(&mut buf);
        assert_eq!(buf, b"Q\0\0\0\rSELECT 1\0");
    }

    #[test]
    fn encode_parse() {
        let mut buf = Vec::new();
        Parse {
            statement: "",
            query: "SELECT $1",
            param_types: &[25],
        }
        .encode(&mut buf);

        assert_eq!(buf, b"P\0\0\0\x15\0SELECT $1\0\0\x01\0\0\0\x19");
    }

    #[test]
    fn encode_sync_and_terminate_are_fixed_size() {
        let mut buf = Vec::new();
        Sync.encode(&mut buf);
        assert_eq!(buf, b"S\0\0\0\x04");

        let mut buf = Vec::new();
        Terminate.encode(&mut buf);
        assert_eq!(buf, b"X\0\0\0\x04");
    }

    #[test]
    fn encode_bind_with_null_parameter() {
        let mut buf = Vec::new();
        Bind {
            portal: "",
            statement: "",
            formats: &[BindFormat::Binary],
            params: &[None],
            result_formats: &[],
        }
        .encode(&mut buf);

        // tag + len + 2 nul names + format count/value(i16) + param count(i16) + len(-1, i32) + result format count(i16)
        assert_eq!(buf, b"B\0\0\0\x12\0\0\0\x01\0\x01\0\x01\xff\xff\xff\xff\0\0");
    }
}
