/// Flag bit in [`ChunkHeader`]'s size field marking a chunk of chunks.
pub const CONTAINS_CHUNKS: u32 = 0x8000_0000;
/// Largest chunk payload in bytes.
pub const MAX_CHUNK_LEN: u32 = CONTAINS_CHUNKS - 1;
/// Largest micro-chunk payload in bytes.
pub const MAX_MICRO_CHUNK_LEN: usize = u8::MAX as usize;

/// `[u32 id][u32 size]`, little-endian; the top bit of size flags nested
/// chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u32,
    /// Payload length, excluding this header.
    pub len: u32,
    pub contains_chunks: bool,
}

impl ChunkHeader {
    pub const LEN: usize = 8;

    pub fn new(id: u32) -> Self {
        Self {
            id,
            len: 0,
            contains_chunks: false,
        }
    }

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let size = if self.contains_chunks {
            self.len | CONTAINS_CHUNKS
        } else {
            self.len
        };
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..].copy_from_slice(&size.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            id,
            len: size & MAX_CHUNK_LEN,
            contains_chunks: size & CONTAINS_CHUNKS != 0,
        }
    }

    /// Bytes this chunk occupies in its parent, header included.
    pub fn total_len(self) -> u64 {
        u64::from(self.len) + Self::LEN as u64
    }
}

/// `[u8 id][u8 size]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MicroChunkHeader {
    pub id: u8,
    pub len: u8,
}

impl MicroChunkHeader {
    pub const LEN: usize = 2;

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        [self.id, self.len]
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self {
            id: bytes[0],
            len: bytes[1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_header_layout() {
        let header = ChunkHeader {
            id: 0x0403_0201,
            len: 0x10,
            contains_chunks: true,
        };
        assert_eq!(header.to_bytes(), [1, 2, 3, 4, 0x10, 0, 0, 0x80]);
        assert_eq!(ChunkHeader::from_bytes(header.to_bytes()), header);
        assert_eq!(header.total_len(), 24);
    }

    #[test]
    fn data_chunk_has_clear_top_bit() {
        let header = ChunkHeader {
            id: 7,
            len: MAX_CHUNK_LEN,
            contains_chunks: false,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes[7], 0x7f);
        assert!(!ChunkHeader::from_bytes(bytes).contains_chunks);
    }

    #[test]
    fn micro_header_layout() {
        let header = MicroChunkHeader { id: 9, len: 255 };
        assert_eq!(header.to_bytes(), [9, 255]);
        assert_eq!(MicroChunkHeader::from_bytes([9, 255]), header);
    }
}
