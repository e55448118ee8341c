//! Protocol module - wire format tags, stream header, and byte cursors.
//!
//! This module implements the byte level of the format:
//! - Tag byte space and the one-byte endianness header
//! - `WireWriter` for appending tagged records
//! - `WireReader` for consuming them with offset tracking

mod frame_reader;
mod frame_writer;
mod wire_format;

pub use frame_reader::WireReader;
pub use frame_writer::{WireWriter, DEFAULT_WRITER_CAPACITY};
pub use wire_format::{
    encode_header, validate_header, Endianness, Tag, DEFAULT_MAX_CHAIN_DEPTH,
    STREAM_HEADER_SIZE,
};
