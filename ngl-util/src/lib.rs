//! Leaf utilities shared by the GPU abstraction and the scene runtime:
//! reference counting, a growable array, a hash map alias, CRC-32, an
//! aligned allocator, time helpers, and std140/std430 block layout.

pub mod block;
pub mod crc32;
pub mod darray;
pub mod error;
pub mod hashmap;
pub mod memalign;
pub mod rc;
pub mod time;

pub use error::{NglError, Result};
