//! Concrete pull and push filters.

pub mod base64;
pub mod buffer;
pub mod cache;
pub mod checksum;
pub mod lzo;
pub mod storage;
