#![doc = include_str!("../README.md")]
//! # API Notes
//!
//! * Output buffers are owned by the caller and passed by mutable reference;
//! the library only appends. If a call returns an error, the destination may
//! have been partially written.
//! * Input buffers are borrowed for the duration of the call; a `Decoder`
//! never retains references into them.

pub use constants::DEFAULT_REJECTION_THRESHOLD;
pub use decoder::Decoder;
pub use encoder::{Encoder, Part, PartConfig};
pub use mode::{Encoding, EntropyMode};
pub use simple::{simple_compress, simple_decompress};

/// error types returned by compression and decompression
pub mod errors;

mod ans;
mod bits;
mod command;
mod constants;
mod decoder;
mod encoder;
mod input;
mod lz;
mod mode;
mod output;
mod simple;
