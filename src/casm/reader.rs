//! Cursor over a byte slice
//!
//! Reads return `None` once the data runs out; the position is left where it
//! was so callers can decide whether a short read ends the whole block.

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Advance by `n` bytes, stopping at the end of the data.
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    pub fn read_u16_be(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_tag(&mut self) -> Option<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.remaining() {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(bytes)
    }
}

/// A tagged, length-prefixed block.
pub(crate) struct Section<'a> {
    pub tag: [u8; 4],
    pub body: &'a [u8],
}

impl Section<'_> {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Iterator over consecutive `tag + u32 BE length + body` blocks.
///
/// Iteration ends when fewer than 8 bytes remain or when a declared length
/// runs past the end of the data; `truncated` records the latter.
pub(crate) struct Sections<'a> {
    reader: ByteReader<'a>,
    pub truncated: Option<([u8; 4], u32)>,
}

impl<'a> Sections<'a> {
    pub fn new(reader: ByteReader<'a>) -> Self {
        Self {
            reader,
            truncated: None,
        }
    }
}

impl<'a> Iterator for Sections<'a> {
    type Item = Section<'a>;

    fn next(&mut self) -> Option<Section<'a>> {
        if self.truncated.is_some() || self.reader.remaining() < 8 {
            return None;
        }
        let tag = self.reader.read_tag()?;
        let len = self.reader.read_u32_be()?;
        match self.reader.read_bytes(len as usize) {
            Some(body) => Some(Section { tag, body }),
            None => {
                self.truncated = Some((tag, len));
                self.reader.skip(usize::MAX);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_reads() {
        let data = [0x12, 0x34, 0x00, 0x00, 0x01, 0x00, 0xFF];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u16_be(), Some(0x1234));
        assert_eq!(reader.read_u32_be(), Some(0x100));
        assert_eq!(reader.read_u16_be(), None);
        assert_eq!(reader.read_u8(), Some(0xFF));
        assert_eq!(reader.read_u8(), None);
    }

    #[test]
    fn test_skip_saturates() {
        let data = [1, 2, 3];
        let mut reader = ByteReader::new(&data);
        reader.skip(10);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_sections_stop_on_oversized_length() {
        let mut data = Vec::new();
        data.extend_from_slice(b"AAAA");
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&[9, 9]);
        data.extend_from_slice(b"BBBB");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        let mut sections = Sections::new(ByteReader::new(&data));
        let first = sections.next().map(|s| (s.tag, s.body.to_vec()));
        assert_eq!(first, Some((*b"AAAA", vec![9, 9])));
        assert!(sections.next().is_none());
        assert_eq!(sections.truncated, Some((*b"BBBB", 100)));
    }
}
