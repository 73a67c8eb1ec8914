//! Scalar 8-bit rANS codec.
//!
//! The state recursion follows J. Duda's rANS construction in the
//! byte-oriented single-state variant popularized by ryg_rans: encoding
//! scans the input right to left, so the decoder can replay it left to
//! right from the trailing bytes of the stream.

use std::sync::OnceLock;

use crate::ans::byte_statistics::ByteStatistics;
use crate::ans::{decode_step, DecodingTable, ENCODE_RENORM_SCALE};
use crate::bits;
use crate::constants::{
  CUMULATIVE_FREQUENCY_MASK, FREQUENCY_BITS, FREQUENCY_MASK, WORD_L, WORD_L_BITS, WORD_M_BITS,
};
use crate::errors::{IguanaError, IguanaResult};
use crate::input::InputStream;
use crate::output;

pub(crate) struct EncodeCtx<'a> {
  dst: &'a mut Vec<u8>,
  stats: &'a ByteStatistics,
  src: &'a [u8],
}

pub(crate) struct DecodeCtx<'a> {
  dst: &'a mut Vec<u8>,
  result_size: usize,
  src: &'a [u8],
  tab: &'a DecodingTable,
}

type EncodeKernel = fn(&mut EncodeCtx<'_>);
type DecodeKernel = fn(&mut DecodeCtx<'_>) -> IguanaResult<()>;

static ENCODE_KERNEL: OnceLock<EncodeKernel> = OnceLock::new();
static DECODE_KERNEL: OnceLock<DecodeKernel> = OnceLock::new();

// The portable kernels are always registered; accelerated variants can be
// installed here behind a runtime capability check without touching callers.
fn encode_kernel() -> EncodeKernel {
  *ENCODE_KERNEL.get_or_init(|| compress_portable)
}

fn decode_kernel() -> DecodeKernel {
  *DECODE_KERNEL.get_or_init(|| decompress_portable)
}

pub(crate) fn encode(dst: &mut Vec<u8>, stats: &ByteStatistics, src: &[u8]) {
  let mut ctx = EncodeCtx { dst, stats, src };
  encode_kernel()(&mut ctx);
}

pub(crate) fn decode(
  dst: &mut Vec<u8>,
  result_size: usize,
  src: &InputStream<'_>,
  tab: &DecodingTable,
) -> IguanaResult<()> {
  dst
    .try_reserve(result_size)
    .map_err(|_| IguanaError::out_of_memory("ans1 output reservation failed"))?;
  let mut ctx = DecodeCtx {
    dst,
    result_size,
    src: src.as_slice(),
    tab,
  };
  decode_kernel()(&mut ctx)
}

fn compress_portable(ctx: &mut EncodeCtx<'_>) {
  let mut state = WORD_L;

  for &v in ctx.src.iter().rev() {
    let q = ctx.stats.packed(v as usize);
    let freq = q & FREQUENCY_MASK;
    let start = (q >> FREQUENCY_BITS) & CUMULATIVE_FREQUENCY_MASK;
    // renormalize
    let mut x = state;
    if x >= ENCODE_RENORM_SCALE * freq {
      output::append_u16_le(ctx.dst, x as u16);
      x >>= WORD_L_BITS;
    }
    // x = C(s, x)
    state = ((x / freq) << WORD_M_BITS) + (x % freq) + start;
  }

  output::append_u32_le(ctx.dst, state);
}

fn decompress_portable(ctx: &mut DecodeCtx<'_>) -> IguanaResult<()> {
  let src = ctx.src;
  let src_len = src.len();

  if src_len < 4 {
    return Err(IguanaError::wrong_source_size(
      "ans1 stream shorter than its final state word",
    ));
  }

  let mut cursor_src = src_len - 4;
  let mut state = bits::read_u32_le(src, cursor_src);

  let mut cursor_dst = 0;
  while cursor_dst < ctx.result_size {
    let (next, sym) = decode_step(ctx.tab, state);
    state = next;
    ctx.dst.push(sym);
    cursor_dst += 1;
    if cursor_dst >= ctx.result_size {
      break;
    }

    // normalize
    if state < WORD_L {
      if cursor_src < 2 {
        return Err(IguanaError::out_of_input_data(
          "ans1 renormalization ran out of stream",
        ));
      }
      cursor_src -= 2;
      state = (state << WORD_L_BITS) | u32::from(bits::read_u16_le(src, cursor_src));
    }
  }

  if state != WORD_L {
    return Err(IguanaError::corrupted_bitstream(
      "ans1 terminal state mismatch",
    ));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::errors::ErrorKind;

  fn round_trip(src: &[u8]) -> Vec<u8> {
    let stats = ByteStatistics::new(src);
    let mut compressed = Vec::new();
    encode(&mut compressed, &stats, src);

    let tab = stats.build_decoding_table().unwrap();
    let mut recovered = Vec::new();
    decode(
      &mut recovered,
      src.len(),
      &InputStream::new(&compressed),
      &tab,
    )
    .unwrap();
    recovered
  }

  #[test]
  fn test_round_trips() {
    let inputs: Vec<Vec<u8>> = vec![
      vec![0x42],
      vec![0x42; 10_000],
      b"the rain in spain stays mainly in the plain".to_vec(),
      (0..2048_u32).map(|i| (i % 7) as u8).collect(),
      (0..=255).collect(),
    ];
    for src in inputs {
      assert_eq!(round_trip(&src), src, "len={}", src.len());
    }
  }

  #[test]
  fn test_empty_stream_is_final_state_only() {
    let stats = ByteStatistics::new(&[]);
    let mut compressed = Vec::new();
    encode(&mut compressed, &stats, &[]);
    assert_eq!(compressed, WORD_L.to_le_bytes());

    let tab = stats.build_decoding_table().unwrap();
    let mut recovered = Vec::new();
    decode(&mut recovered, 0, &InputStream::new(&compressed), &tab).unwrap();
    assert!(recovered.is_empty());
  }

  #[test]
  fn test_too_short_source() {
    let stats = ByteStatistics::new(b"xy");
    let tab = stats.build_decoding_table().unwrap();
    let mut dst = Vec::new();
    let err = decode(&mut dst, 2, &InputStream::new(&[1, 2, 3]), &tab).unwrap_err();
    assert_eq!(err.kind, ErrorKind::WrongSourceSize);
  }

  #[test]
  fn test_truncation_breaks_terminal_state() {
    let src: Vec<u8> = (0..4000_u32).map(|i| (i % 251) as u8).collect();
    let stats = ByteStatistics::new(&src);
    let mut compressed = Vec::new();
    encode(&mut compressed, &stats, &src);
    let tab = stats.build_decoding_table().unwrap();

    for cut in [2, 4, 6] {
      let truncated = &compressed[..compressed.len() - cut];
      let mut dst = Vec::new();
      let err = decode(
        &mut dst,
        src.len(),
        &InputStream::new(truncated),
        &tab,
      )
      .unwrap_err();
      assert!(
        matches!(
          err.kind,
          ErrorKind::CorruptedBitstream | ErrorKind::OutOfInputData
        ),
        "cut={} kind={:?}",
        cut,
        err.kind
      );
    }
  }
}
