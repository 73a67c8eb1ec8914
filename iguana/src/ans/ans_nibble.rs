//! Scalar 4-bit rANS codec.
//!
//! Same state machine as [`ans1`][crate::ans::ans1] over the 16-symbol
//! alphabet. Each input byte yields two coded symbols: the upper nibble is
//! encoded first, then the lower, so the decoder recovers the lower nibble
//! first and composes `(hi << 4) | lo`.

use std::sync::OnceLock;

use crate::ans::nibble_statistics::NibbleStatistics;
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
  stats: &'a NibbleStatistics,
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

fn encode_kernel() -> EncodeKernel {
  *ENCODE_KERNEL.get_or_init(|| compress_portable)
}

fn decode_kernel() -> DecodeKernel {
  *DECODE_KERNEL.get_or_init(|| decompress_portable)
}

pub(crate) fn encode(dst: &mut Vec<u8>, stats: &NibbleStatistics, src: &[u8]) {
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
    .map_err(|_| IguanaError::out_of_memory("ans_nibble output reservation failed"))?;
  let mut ctx = DecodeCtx {
    dst,
    result_size,
    src: src.as_slice(),
    tab,
  };
  decode_kernel()(&mut ctx)
}

#[inline]
fn encode_nibble(dst: &mut Vec<u8>, stats: &NibbleStatistics, state: u32, nib: u8) -> u32 {
  let q = stats.packed(nib as usize);
  let freq = q & FREQUENCY_MASK;
  let cum = (q >> FREQUENCY_BITS) & CUMULATIVE_FREQUENCY_MASK;
  // renormalize
  let mut x = state;
  if x >= ENCODE_RENORM_SCALE * freq {
    output::append_u16_le(dst, x as u16);
    x >>= WORD_L_BITS;
  }
  // x = C(s, x)
  ((x / freq) << WORD_M_BITS) + (x % freq) + cum
}

fn compress_portable(ctx: &mut EncodeCtx<'_>) {
  let mut state = WORD_L;

  for &v in ctx.src.iter().rev() {
    state = encode_nibble(ctx.dst, ctx.stats, state, v >> 4);
    state = encode_nibble(ctx.dst, ctx.stats, state, v & 0x0f);
  }

  output::append_u32_le(ctx.dst, state);
}

fn decompress_portable(ctx: &mut DecodeCtx<'_>) -> IguanaResult<()> {
  let src = ctx.src;
  let src_len = src.len();

  if src_len < 4 {
    return Err(IguanaError::wrong_source_size(
      "ans_nibble stream shorter than its final state word",
    ));
  }

  let mut cursor_src = src_len - 4;
  let mut state = bits::read_u32_le(src, cursor_src);

  let normalize = |state: u32, cursor_src: &mut usize| -> IguanaResult<u32> {
    if state < WORD_L {
      if *cursor_src < 2 {
        return Err(IguanaError::out_of_input_data(
          "ans_nibble renormalization ran out of stream",
        ));
      }
      *cursor_src -= 2;
      Ok((state << WORD_L_BITS) | u32::from(bits::read_u16_le(src, *cursor_src)))
    } else {
      Ok(state)
    }
  };

  let mut cursor_dst = 0;
  while cursor_dst < ctx.result_size {
    let (next, lo_nib) = decode_step(ctx.tab, state);
    state = normalize(next, &mut cursor_src)?;

    let (next, hi_nib) = decode_step(ctx.tab, state);
    state = normalize(next, &mut cursor_src)?;

    ctx.dst.push((hi_nib << 4) | lo_nib);
    cursor_dst += 1;
  }

  if state != WORD_L {
    return Err(IguanaError::corrupted_bitstream(
      "ans_nibble terminal state mismatch",
    ));
  }

  Ok(())
}
