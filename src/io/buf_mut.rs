use byteorder::{BigEndian, ByteOrder};

/// Appends primitives to an outbound buffer. Encoding is total (spec §4.1:
/// "Failure mode: none") so these never return a `Result`.
pub trait BufMutExt {
    fn put_u8(&mut self, val: u8);
    fn put_i16(&mut self, val: i16);
    fn put_i32(&mut self, val: i32);
    fn put_u32(&mut self, val: u32);
    fn put_bytes(&mut self, val: &[u8]);
    fn put_str_nul(&mut self, val: &str);

    /// Writes a placeholder `i32` length, runs `f`, then backpatches the
    /// placeholder with the number of bytes `f` appended plus its own 4
    /// bytes. This is the zero-copy append spec §4.1 and §9 call for: one
    /// contiguous buffer, filled once, no intermediate allocation.
    fn with_length_prefix(&mut self, f: impl FnOnce(&mut Vec<u8>));
}

impl BufMutExt for Vec<u8> {
    fn put_u8(&mut self, val: u8) {
        self.push(val);
    }

    fn put_i16(&mut self, val: i16) {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, val);
        self.extend_from_slice(&buf);
    }

    fn put_i32(&mut self, val: i32) {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, val);
        self.extend_from_slice(&buf);
    }

    fn put_u32(&mut self, val: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, val);
        self.extend_from_slice(&buf);
    }

    fn put_bytes(&mut self, val: &[u8]) {
        self.extend_from_slice(val);
    }

    fn put_str_nul(&mut self, val: &str) {
        self.extend_from_slice(val.as_bytes());
        self.push(0);
    }

    fn with_length_prefix(&mut self, f: impl FnOnce(&mut Vec<u8>)) {
        let len_at = self.len();
        self.put_i32(0); // placeholder, backpatched below

        f(self);

        let len = (self.len() - len_at) as i32;
        BigEndian::write_i32(&mut self[len_at..len_at + 4], len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_backpatches_correctly() {
        let mut buf = Vec::new();
        buf.put_u8(b'Q');
        buf.with_length_prefix(|buf| {
            buf.put_str_nul("SELECT 1");
        });

        assert_eq!(buf, b"Q\0\0\0\rSELECT 1\0");
    }
}
