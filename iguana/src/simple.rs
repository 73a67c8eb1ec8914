use crate::decoder::Decoder;
use crate::encoder::{Encoder, PartConfig};
use crate::errors::IguanaResult;

/// Compresses `src` as a single part with the given settings and returns the
/// complete stream.
///
/// Will return an error if the configuration is invalid.
pub fn simple_compress(src: &[u8], config: &PartConfig) -> IguanaResult<Vec<u8>> {
  let mut dst = Vec::new();
  Encoder::new().encode(&mut dst, src, config)?;
  Ok(dst)
}

/// Recovers the original octet sequence of a complete iguana stream.
///
/// Will return an error if the stream is truncated, corrupt, or carries an
/// unknown command.
pub fn simple_decompress(src: &[u8]) -> IguanaResult<Vec<u8>> {
  let mut dst = Vec::new();
  Decoder::new().decode(src, &mut dst)?;
  Ok(dst)
}
