//! Index buffer format (§4.1: `set_index_buffer(buf, fmt)`).

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    R16Uint,
    R32Uint,
}

impl IndexFormat {
    pub fn byte_size(self) -> u64 {
        match self {
            IndexFormat::R16Uint => 2,
            IndexFormat::R32Uint => 4,
        }
    }
}
