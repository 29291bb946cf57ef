/// A typed view over a fixed-size byte buffer. Integers are 4-byte
/// big-endian; byte blobs and strings are stored with a 4-byte length
/// prefix. Offsets are caller-managed; the page enforces no schema.
#[derive(Debug)]
pub struct Page {
    bb: Vec<u8>,
}

const INT_BYTES: usize = 4;

impl Page {
    /// A blank page for data buffers.
    pub fn new(block_size: usize) -> Self {
        Self {
            bb: vec![0; block_size],
        }
    }

    /// Wrap an existing byte vector, used for log records.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bb: bytes }
    }

    pub fn get_int(&self, offset: usize) -> i32 {
        let mut buf = [0u8; INT_BYTES];
        buf.copy_from_slice(&self.bb[offset..offset + INT_BYTES]);
        i32::from_be_bytes(buf)
    }

    pub fn set_int(&mut self, offset: usize, n: i32) {
        self.bb[offset..offset + INT_BYTES].copy_from_slice(&n.to_be_bytes());
    }

    pub fn get_bytes(&self, offset: usize) -> &[u8] {
        let length = self.get_int(offset) as usize;
        let start = offset + INT_BYTES;
        &self.bb[start..start + length]
    }

    /// Stores a blob as two values: the length and the bytes themselves.
    pub fn set_bytes(&mut self, offset: usize, b: &[u8]) {
        self.set_int(offset, b.len() as i32);
        let start = offset + INT_BYTES;
        self.bb[start..start + b.len()].copy_from_slice(b);
    }

    pub fn get_string(&self, offset: usize) -> String {
        String::from_utf8_lossy(self.get_bytes(offset)).into_owned()
    }

    pub fn set_string(&mut self, offset: usize, s: &str) {
        self.set_bytes(offset, s.as_bytes());
    }

    /// Worst-case byte length of a string field holding `strlen` characters:
    /// the length prefix plus four bytes per character (UTF-8 maximum).
    /// Callers use this to size fields; the page does not enforce it.
    pub fn max_length(strlen: usize) -> usize {
        INT_BYTES + strlen * 4
    }

    pub fn contents(&self) -> &[u8] {
        &self.bb
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.bb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        let mut p = Page::new(64);
        p.set_int(8, -12345);
        assert_eq!(p.get_int(8), -12345);
        assert_eq!(p.get_int(0), 0);
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut p = Page::new(64);
        p.set_string(4, "hello");
        assert_eq!(p.get_int(4), 5);
        assert_eq!(p.get_string(4), "hello");
    }

    #[test]
    fn max_length_covers_multibyte() {
        assert!(Page::max_length(3) >= 4 + "円".len() * 3);
    }
}
