//! 32-way interleaved 8-bit rANS codec.
//!
//! Thirty-two coder states advance in lockstep over 32-byte chunks. Lanes
//! 0..16 renormalize into a forward region that is byte-reversed at flush
//! time, lanes 16..32 into a reverse scratch buffer appended as-is; the
//! resulting segment leads with the sixteen forward-lane states and ends
//! with the sixteen reverse-lane states, leaving the renormalization words
//! in the middle for the decoder's two cursors to meet over.

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

const NUM_LANES: usize = 32;
// forward- and reverse-lane final states, 64 bytes each
const STATE_BLOCK_SIZE: usize = NUM_LANES / 2 * 4;

pub(crate) struct EncodeCtx<'a> {
  fwd: &'a mut Vec<u8>,
  rev: &'a mut Vec<u8>,
  stats: &'a ByteStatistics,
  src: &'a [u8],
  state: [u32; NUM_LANES],
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

/// The encoder keeps its reverse-half scratch buffer across calls; its
/// capacity only ever grows.
pub(crate) struct Ans32Encoder {
  rev: Vec<u8>,
}

impl Ans32Encoder {
  pub fn new() -> Self {
    Self { rev: Vec::new() }
  }

  pub fn encode(&mut self, dst: &mut Vec<u8>, stats: &ByteStatistics, src: &[u8]) {
    self.rev.clear();
    let segment_start = dst.len();
    let mut ctx = EncodeCtx {
      fwd: dst,
      rev: &mut self.rev,
      stats,
      src,
      state: [WORD_L; NUM_LANES],
    };
    encode_kernel()(&mut ctx);

    // The forward half was emitted big-endian and newest-first; reversing
    // the region in place yields the little-endian oldest-first layout the
    // decoder expects, with the forward states leading the segment.
    dst[segment_start..].reverse();
    dst.extend_from_slice(&self.rev);
  }
}

fn put(ctx: &mut EncodeCtx<'_>, start: usize, n: usize) {
  // the forward half
  for lane in (0..NUM_LANES / 2).rev() {
    if lane < n {
      let q = ctx.stats.packed(ctx.src[start + lane] as usize);
      let freq = q & FREQUENCY_MASK;
      let cum = (q >> FREQUENCY_BITS) & CUMULATIVE_FREQUENCY_MASK;
      // renormalize
      let mut x = ctx.state[lane];
      if x >= ENCODE_RENORM_SCALE * freq {
        output::append_u16_be(ctx.fwd, x as u16);
        x >>= WORD_L_BITS;
      }
      // x = C(s, x)
      ctx.state[lane] = ((x / freq) << WORD_M_BITS) + (x % freq) + cum;
    }
  }
  // the reverse half
  for lane in (NUM_LANES / 2..NUM_LANES).rev() {
    if lane < n {
      let q = ctx.stats.packed(ctx.src[start + lane] as usize);
      let freq = q & FREQUENCY_MASK;
      let cum = (q >> FREQUENCY_BITS) & CUMULATIVE_FREQUENCY_MASK;
      // renormalize
      let mut x = ctx.state[lane];
      if x >= ENCODE_RENORM_SCALE * freq {
        output::append_u16_le(ctx.rev, x as u16);
        x >>= WORD_L_BITS;
      }
      // x = C(s, x)
      ctx.state[lane] = ((x / freq) << WORD_M_BITS) + (x % freq) + cum;
    }
  }
}

fn compress_portable(ctx: &mut EncodeCtx<'_>) {
  let n_last = ctx.src.len() % NUM_LANES;
  let mut k = ctx.src.len() - n_last;

  // The trailing short chunk goes first, so every lane shares one logical
  // timeline when the decoder runs forward.
  put(ctx, k, n_last);

  while k >= NUM_LANES {
    k -= NUM_LANES;
    put(ctx, k, NUM_LANES);
  }

  // flush
  for lane in (0..NUM_LANES / 2).rev() {
    output::append_u32_be(ctx.fwd, ctx.state[lane]);
  }
  for lane in NUM_LANES / 2..NUM_LANES {
    output::append_u32_le(ctx.rev, ctx.state[lane]);
  }
}

pub(crate) fn decode(
  dst: &mut Vec<u8>,
  result_size: usize,
  src: &InputStream<'_>,
  tab: &DecodingTable,
) -> IguanaResult<()> {
  dst
    .try_reserve(result_size)
    .map_err(|_| IguanaError::out_of_memory("ans32 output reservation failed"))?;
  let mut ctx = DecodeCtx {
    dst,
    result_size,
    src: src.as_slice(),
    tab,
  };
  decode_kernel()(&mut ctx)
}

fn decompress_portable(ctx: &mut DecodeCtx<'_>) -> IguanaResult<()> {
  let src = ctx.src;
  let src_len = src.len();

  if src_len < 2 * STATE_BLOCK_SIZE {
    return Err(IguanaError::wrong_source_size(
      "ans32 stream shorter than its lane state blocks",
    ));
  }

  let mut cursor_fwd = STATE_BLOCK_SIZE;
  let mut cursor_rev = src_len - STATE_BLOCK_SIZE;

  let mut state = [0_u32; NUM_LANES];
  for lane in 0..NUM_LANES / 2 {
    state[lane] = bits::read_u32_le(src, lane * 4);
    state[lane + NUM_LANES / 2] = bits::read_u32_le(src, cursor_rev + lane * 4);
  }

  let mut cursor_dst = 0;
  'rounds: while cursor_dst < ctx.result_size {
    for lane in 0..NUM_LANES {
      if cursor_dst >= ctx.result_size {
        break 'rounds;
      }
      let (next, sym) = decode_step(ctx.tab, state[lane]);
      state[lane] = next;
      ctx.dst.push(sym);
      cursor_dst += 1;
    }
    // normalize the forward part
    for lane in 0..NUM_LANES / 2 {
      let x = state[lane];
      if x < WORD_L {
        if cursor_fwd + 2 > cursor_rev {
          return Err(IguanaError::out_of_input_data(
            "ans32 forward renormalization ran out of stream",
          ));
        }
        state[lane] = (x << WORD_L_BITS) | u32::from(bits::read_u16_le(src, cursor_fwd));
        cursor_fwd += 2;
      }
    }
    // normalize the reverse part
    for lane in NUM_LANES / 2..NUM_LANES {
      let x = state[lane];
      if x < WORD_L {
        if cursor_rev < cursor_fwd + 2 {
          return Err(IguanaError::out_of_input_data(
            "ans32 reverse renormalization ran out of stream",
          ));
        }
        cursor_rev -= 2;
        state[lane] = (x << WORD_L_BITS) | u32::from(bits::read_u16_le(src, cursor_rev));
      }
    }
  }

  if state.iter().any(|&x| x != WORD_L) {
    return Err(IguanaError::corrupted_bitstream(
      "ans32 terminal state mismatch",
    ));
  }

  Ok(())
}
