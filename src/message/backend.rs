//! Backend (server → client) messages.

use bytes::Bytes;

use crate::error::Error;
use crate::io::BufExt;
use crate::message::Decode;

/// Sent in response to `StartupMessage`, possibly repeated across a SASL or
/// GSSAPI exchange before `Authentication::Ok` (spec §6).
#[derive(Debug)]
pub enum Authentication {
    Ok,
    CleartextPassword,
    Md5Password { salt: [u8; 4] },
    SaslInitial { mechanisms: Vec<String> },
    SaslContinue(Bytes),
    SaslFinal(Bytes),
}

impl Decode for Authentication {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let code = buf.get_u32()?;

        Ok(match code {
            0 => Authentication::Ok,
            3 => Authentication::CleartextPassword,
            5 => {
                let salt_bytes = buf.get_bytes(4)?;
                let mut salt = [0u8; 4];
                salt.copy_from_slice(salt_bytes);
                Authentication::Md5Password { salt }
            }
            10 => {
                let mut mechanisms = Vec::new();
                while !buf.is_empty() {
                    let m = buf.get_str_nul()?;
                    if m.is_empty() {
                        break;
                    }
                    mechanisms.push(m.to_string());
                }
                Authentication::SaslInitial { mechanisms }
            }
            11 => Authentication::SaslContinue(payload.slice(4..)),
            12 => Authentication::SaslFinal(payload.slice(4..)),
            other => return Err(protocol_err!("unsupported authentication method: {other}")),
        })
    }
}

#[derive(Debug)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl Decode for ParameterStatus {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let name = buf.get_str_nul()?.to_string();
        let value = buf.get_str_nul()?.to_string();
        Ok(Self { name, value })
    }
}

#[derive(Debug)]
pub struct BackendKeyData {
    pub process_id: i32,
    pub secret_key: i32,
}

impl Decode for BackendKeyData {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        Ok(Self {
            process_id: buf.get_i32()?,
            secret_key: buf.get_i32()?,
        })
    }
}

/// Transaction status: `'I'`dle, `'T'`ransaction, `'E'`rror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    Failed,
}

#[derive(Debug)]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

impl Decode for ReadyForQuery {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let status = match buf.get_u8()? {
            b'I' => TransactionStatus::Idle,
            b'T' => TransactionStatus::InTransaction,
            b'E' => TransactionStatus::Failed,
            other => return Err(protocol_err!("unknown transaction status: {other}")),
        };
        Ok(Self { status })
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_attr_num: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: i16,
}

#[derive(Debug)]
pub struct RowDescription {
    pub fields: Vec<FieldDescription>,
}

impl Decode for RowDescription {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let count = buf.get_i16()?;

        let mut fields = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            fields.push(FieldDescription {
                name: buf.get_str_nul()?.to_string(),
                table_oid: buf.get_u32()?,
                column_attr_num: buf.get_i16()?,
                type_oid: buf.get_u32()?,
                type_size: buf.get_i16()?,
                type_modifier: buf.get_i32()?,
                format: buf.get_i16()?,
            });
        }

        Ok(Self { fields })
    }
}

#[derive(Debug)]
pub struct ParameterDescription {
    pub param_types: Vec<u32>,
}

impl Decode for ParameterDescription {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let count = buf.get_i16()?;
        let mut param_types = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            param_types.push(buf.get_u32()?);
        }
        Ok(Self { param_types })
    }
}

/// One row of data. Holds the raw payload and exposes per-column slices
/// without copying — the teacher's zero-copy ethos (spec §4.4: "emitted
/// payloads may be slices... only if the interpreter consumes them before
/// the next slice", which holds here since `Bytes` is a refcounted view).
#[derive(Debug, Clone)]
pub struct DataRow {
    raw: Bytes,
}

impl Decode for DataRow {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        Ok(Self { raw: payload })
    }
}

impl DataRow {
    pub fn column_count(&self) -> Result<i16, Error> {
        let mut buf: &[u8] = &self.raw;
        buf.get_i16()
    }

    /// Returns the `index`th column, `None` for SQL NULL. Walks the row
    /// from the front each call (rows are small and this is only called a
    /// handful of times per row by a decoder), trading a little CPU for not
    /// having to maintain an offset table.
    pub fn get(&self, index: usize) -> Result<Option<Bytes>, Error> {
        let mut buf: &[u8] = &self.raw;
        let count = buf.get_i16()? as usize;

        if index >= count {
            return Err(protocol_err!(
                "column index {index} out of bounds (row has {count} columns)"
            ));
        }

        let mut offset = 2usize;
        for i in 0..=index {
            let mut len_buf: &[u8] = &self.raw[offset..];
            let len = len_buf.get_i32()?;
            offset += 4;

            if len < 0 {
                if i == index {
                    return Ok(None);
                }
                continue;
            }

            let len = len as usize;
            if i == index {
                return Ok(Some(self.raw.slice(offset..offset + len)));
            }
            offset += len;
        }

        unreachable!("loop always returns by index == count - 1 at the latest")
    }
}

#[derive(Debug)]
pub struct CommandComplete {
    pub tag: String,
}

impl Decode for CommandComplete {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        Ok(Self {
            tag: buf.get_str_nul()?.to_string(),
        })
    }
}

impl CommandComplete {
    /// The trailing integer in tags like `"UPDATE 3"` or `"SELECT 1"`; `None`
    /// for tags that carry no count (e.g. `"BEGIN"`).
    pub fn rows_affected(&self) -> Option<u64> {
        self.tag.rsplit(' ').next()?.parse().ok()
    }
}

#[derive(Debug)]
pub struct NotificationResponse {
    pub process_id: i32,
    pub channel: String,
    pub payload: String,
}

impl Decode for NotificationResponse {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        Ok(Self {
            process_id: buf.get_i32()?,
            channel: buf.get_str_nul()?.to_string(),
            payload: buf.get_str_nul()?.to_string(),
        })
    }
}

/// Severity enumerated from the `S`/`V` field of an `ErrorResponse` or
/// `NoticeResponse`; unknown strings are not expected but are tolerated by
/// the fallback in [`Response::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warning,
    Notice,
    Debug,
    Info,
    Log,
}

/// Shared decoder for `ErrorResponse` and `NoticeResponse`: both carry the
/// same sequence of `[tag: u8][value: nul-terminated string]` pairs,
/// terminated by a final NUL (spec §6). Mirrors the teacher's single
/// `Response` type reused for both message formats
/// (`postgres/message/response.rs`).
#[derive(Debug)]
pub struct Response {
    pub severity: Option<Severity>,
    pub sqlstate: Option<String>,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl Decode for Response {
    fn decode(payload: Bytes) -> Result<Self, Error> {
        let mut buf: &[u8] = &payload;
        let mut out = Response {
            severity: None,
            sqlstate: None,
            message: None,
            detail: None,
            hint: None,
        };

        loop {
            let field = buf.get_u8()?;
            if field == 0 {
                break;
            }

            let value = buf.get_str_nul()?;

            match field {
                b'S' | b'V' => {
                    out.severity = Some(match value {
                        "PANIC" => Severity::Panic,
                        "FATAL" => Severity::Fatal,
                        "ERROR" => Severity::Error,
                        "WARNING" => Severity::Warning,
                        "NOTICE" => Severity::Notice,
                        "DEBUG" => Severity::Debug,
                        "INFO" => Severity::Info,
                        "LOG" => Severity::Log,
                        other => return Err(protocol_err!("unknown severity: {other:?}")),
                    });
                }
                b'C' => out.sqlstate = Some(value.to_string()),
                b'M' => out.message = Some(value.to_string()),
                b'D' => out.detail = Some(value.to_string()),
                b'H' => out.hint = Some(value.to_string()),
                _ => {} // remaining fields (position, file, line, ...) are not surfaced
            }
        }

        Ok(out)
    }
}

impl Response {
    /// Builds the per-request [`crate::error::BackendError`]; sqlstate and
    /// message are required fields (spec §6), others default to empty.
    pub fn into_backend_error(self) -> Result<crate::error::BackendError, Error> {
        Ok(crate::error::BackendError {
            severity: self
                .severity
                .map(|s| format!("{s:?}"))
                .unwrap_or_else(|| "ERROR".to_string()),
            sqlstate: self
                .sqlstate
                .ok_or_else(|| protocol_err!("ErrorResponse missing sqlstate (C) field"))?,
            message: self
                .message
                .ok_or_else(|| protocol_err!("ErrorResponse missing message (M) field"))?,
            detail: self.detail,
            hint: self.hint,
        })
    }
}

macro_rules! unit_message {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl Decode for $name {
            fn decode(_payload: Bytes) -> Result<Self, Error> {
                Ok($name)
            }
        }
    };
}

unit_message!(ParseComplete);
unit_message!(BindComplete);
unit_message!(CloseComplete);
unit_message!(NoData);
unit_message!(EmptyQueryResponse);
unit_message!(PortalSuspended);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_response_fields() {
        const DATA: &[u8] =
            b"SERROR\0C22012\0Mdivision by zero\0Dthe divisor was zero\0Hcheck your inputs\0\0";

        let r = Response::decode(Bytes::from_static(DATA)).unwrap();
        assert_eq!(r.severity, Some(Severity::Error));
        assert_eq!(r.sqlstate.as_deref(), Some("22012"));
        assert_eq!(r.message.as_deref(), Some("division by zero"));
        assert_eq!(r.detail.as_deref(), Some("the divisor was zero"));
        assert_eq!(r.hint.as_deref(), Some("check your inputs"));
    }

    #[test]
    fn command_complete_rows_affected() {
        let cc = CommandComplete {
            tag: "UPDATE 3".to_string(),
        };
        assert_eq!(cc.rows_affected(), Some(3));

        let cc = CommandComplete {
            tag: "BEGIN".to_string(),
        };
        assert_eq!(cc.rows_affected(), None);
    }

    #[test]
    fn data_row_null_and_value_columns() {
        let mut raw = Vec::new();
        crate::io::BufMutExt::put_i16(&mut raw, 2);
        crate::io::BufMutExt::put_i32(&mut raw, -1); // column 0: NULL
        crate::io::BufMutExt::put_i32(&mut raw, 1); // column 1: one byte
        raw.push(b'1');

        let row = DataRow::decode(Bytes::from(raw)).unwrap();
        assert_eq!(row.column_count().unwrap(), 2);
        assert_eq!(row.get(0).unwrap(), None);
        assert_eq!(row.get(1).unwrap().as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn decode_authentication_md5() {
        let mut raw = Vec::new();
        crate::io::BufMutExt::put_u32(&mut raw, 5);
        raw.extend_from_slice(&[1, 2, 3, 4]);

        match Authentication::decode(Bytes::from(raw)).unwrap() {
            Authentication::Md5Password { salt } => assert_eq!(salt, [1, 2, 3, 4]),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
