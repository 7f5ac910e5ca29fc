use byteorder::{BigEndian, ByteOrder};
use memchr::memchr;

use crate::error::Error;

/// Reads primitives off the front of a byte slice, advancing it as it goes.
/// The protocol is always big-endian (spec §6) so, unlike the teacher's
/// `Buf<'a>` (generic over `ByteOrder`), this is hardcoded to `BigEndian` —
/// there is never a reason to read a little-endian integer off the wire here.
pub trait BufExt<'a> {
    fn get_u8(&mut self) -> Result<u8, Error>;
    fn get_i16(&mut self) -> Result<i16, Error>;
    fn get_u16(&mut self) -> Result<u16, Error>;
    fn get_i32(&mut self) -> Result<i32, Error>;
    fn get_u32(&mut self) -> Result<u32, Error>;
    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], Error>;
    fn get_str(&mut self, len: usize) -> Result<&'a str, Error>;
    /// Reads a NUL-terminated string, per spec §6 ("Strings: NUL-terminated
    /// UTF-8 unless typed as bytea").
    fn get_str_nul(&mut self) -> Result<&'a str, Error>;
    fn remaining(&self) -> &'a [u8];
}

impl<'a> BufExt<'a> for &'a [u8] {
    fn get_u8(&mut self) -> Result<u8, Error> {
        let val = *self
            .first()
            .ok_or_else(|| protocol_err!("unexpected eof reading u8"))?;
        *self = &self[1..];
        Ok(val)
    }

    fn get_i16(&mut self) -> Result<i16, Error> {
        Ok(self.get_u16()? as i16)
    }

    fn get_u16(&mut self) -> Result<u16, Error> {
        let bytes = self.get_bytes(2)?;
        Ok(BigEndian::read_u16(bytes))
    }

    fn get_i32(&mut self) -> Result<i32, Error> {
        Ok(self.get_u32()? as i32)
    }

    fn get_u32(&mut self) -> Result<u32, Error> {
        let bytes = self.get_bytes(4)?;
        Ok(BigEndian::read_u32(bytes))
    }

    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.len() < len {
            return Err(protocol_err!(
                "unexpected eof: wanted {} bytes, have {}",
                len,
                self.len()
            ));
        }

        let (head, tail) = self.split_at(len);
        *self = tail;
        Ok(head)
    }

    fn get_str(&mut self, len: usize) -> Result<&'a str, Error> {
        std::str::from_utf8(self.get_bytes(len)?)
            .map_err(|e| protocol_err!("invalid utf-8 in message payload: {e}"))
    }

    fn get_str_nul(&mut self) -> Result<&'a str, Error> {
        let nul = memchr(b'\0', self).ok_or_else(|| protocol_err!("unterminated string"))?;
        let s = self.get_str(nul)?;
        self.get_u8()?; // consume the NUL
        Ok(s)
    }

    fn remaining(&self) -> &'a [u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nul_terminated_string() {
        let mut buf: &[u8] = b"hello\0world";
        assert_eq!(buf.get_str_nul().unwrap(), "hello");
        assert_eq!(buf, b"world");
    }

    #[test]
    fn reads_be_integers() {
        let mut buf: &[u8] = &[0x00, 0x00, 0x00, 0x2a];
        assert_eq!(buf.get_u32().unwrap(), 42);
    }

    #[test]
    fn eof_is_a_protocol_error() {
        let mut buf: &[u8] = &[0x00, 0x01];
        assert!(buf.get_u32().is_err());
    }
}
