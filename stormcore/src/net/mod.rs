//! Byte-level plumbing shared by the BGP and LDP engines: framed I/O
//! buffers, bounds-checked decoding and the stream-transport contract.

pub mod buffer;
pub mod cursor;
pub mod support;
pub mod transport;
