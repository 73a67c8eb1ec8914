//! Six-substream sequence expander.
//!
//! Each token from the `tokens` sub-stream describes one (literal run,
//! match) pair; offsets are carried as negative distances and the previous
//! offset can be reused. When the token stream runs dry, whatever remains in
//! `literals` is appended verbatim.

use std::sync::OnceLock;

use crate::errors::{IguanaError, IguanaResult};
use crate::lz::substream::Substream;
use crate::lz::{
  INIT_LAST_OFFSET, LAST_LONG_OFFSET, LITERAL_LEN_BITS, MATCH_LEN_LONG_OFFSETS,
  MAX_SHORT_LIT_LEN, MAX_SHORT_MATCH_LEN, NUM_STREAMS, STREAM_LITERALS, STREAM_OFFSET16,
  STREAM_OFFSET24, STREAM_TOKENS, STREAM_VAR_LIT_LEN, STREAM_VAR_MATCH_LEN,
};

pub(crate) struct SequenceContext<'a, 'b> {
  pub dst: &'a mut Vec<u8>,
  pub streams: [Substream<'b>; NUM_STREAMS],
  pub last_offset: i64,
}

impl<'a, 'b> SequenceContext<'a, 'b> {
  pub fn new(dst: &'a mut Vec<u8>, streams: [Substream<'b>; NUM_STREAMS]) -> Self {
    Self {
      dst,
      streams,
      last_offset: INIT_LAST_OFFSET,
    }
  }
}

type DecodeKernel = for<'a, 'b> fn(&mut SequenceContext<'a, 'b>) -> IguanaResult<()>;

static DECODE_KERNEL: OnceLock<DecodeKernel> = OnceLock::new();

fn decode_kernel() -> DecodeKernel {
  *DECODE_KERNEL.get_or_init(|| decompress_portable)
}

pub(crate) fn decompress(ctx: &mut SequenceContext<'_, '_>) -> IguanaResult<()> {
  decode_kernel()(ctx)
}

fn decompress_portable(ctx: &mut SequenceContext<'_, '_>) -> IguanaResult<()> {
  let mut last_offs = ctx.last_offset;

  while !ctx.streams[STREAM_TOKENS].is_empty() {
    let token = ctx.streams[STREAM_TOKENS].fetch8()?;
    let match_len;

    if token >= 32 {
      // short token: literal run, then a short match against a fresh 16-bit
      // offset (high bit clear) or the previous offset (high bit set)
      let mut lit_len = u32::from(token) & MAX_SHORT_LIT_LEN;
      if lit_len == MAX_SHORT_LIT_LEN {
        lit_len = ctx.streams[STREAM_VAR_LIT_LEN].fetch_var_uint()? + MAX_SHORT_LIT_LEN;
      }
      if lit_len > 0 {
        let seq = ctx.streams[STREAM_LITERALS].fetch_sequence(lit_len as usize)?;
        ctx.dst.extend_from_slice(seq);
      }

      if token & 0x80 == 0 {
        let new_offs = ctx.streams[STREAM_OFFSET16].fetch16()?;
        last_offs = -i64::from(new_offs);
      }

      let mut len = (u32::from(token) >> LITERAL_LEN_BITS) & MAX_SHORT_MATCH_LEN;
      if len == MAX_SHORT_MATCH_LEN {
        len = ctx.streams[STREAM_VAR_MATCH_LEN].fetch_var_uint()? + MAX_SHORT_MATCH_LEN;
      }
      match_len = len;
    } else if u32::from(token) < LAST_LONG_OFFSET {
      // long offset, short length
      match_len = u32::from(token) + MATCH_LEN_LONG_OFFSETS;
      let new_offs = ctx.streams[STREAM_OFFSET24].fetch24()?;
      last_offs = -i64::from(new_offs);
    } else {
      // long offset, long length
      let val = ctx.streams[STREAM_VAR_MATCH_LEN].fetch_var_uint()?;
      match_len = val + LAST_LONG_OFFSET + MATCH_LEN_LONG_OFFSETS;
      let new_offs = ctx.streams[STREAM_OFFSET24].fetch24()?;
      last_offs = -i64::from(new_offs);
    }

    wild_copy(ctx.dst, last_offs, match_len as usize)?;
  }

  // last literals
  let remainder_len = ctx.streams[STREAM_LITERALS].remaining();
  if remainder_len > 0 {
    let seq = ctx.streams[STREAM_LITERALS].fetch_sequence(remainder_len)?;
    ctx.dst.extend_from_slice(seq);
  }

  ctx.last_offset = last_offs;
  Ok(())
}

// Appends match_len bytes of dst starting at dst.len() + offs, chunked so
// that an overlapping match never reads bytes this copy has not produced yet.
fn wild_copy(dst: &mut Vec<u8>, offs: i64, match_len: usize) -> IguanaResult<()> {
  if match_len == 0 {
    return Ok(());
  }

  let pos = dst.len() as i64 + offs;
  if offs >= 0 || pos < 0 {
    return Err(IguanaError::corrupted_bitstream(
      "match offset outside the produced output",
    ));
  }

  let mut pos = pos as usize;
  let mut remaining = match_len;
  while remaining > 0 {
    let dist = (dst.len() - pos).min(remaining);
    dst.extend_from_within(pos..pos + dist);
    pos += dist;
    remaining -= dist;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::errors::ErrorKind;
  use crate::lz::substream::append_var_uint;

  fn run(
    tokens: &[u8],
    offset16: &[u8],
    offset24: &[u8],
    var_lit_len: &[u8],
    var_match_len: &[u8],
    literals: &[u8],
  ) -> IguanaResult<Vec<u8>> {
    let mut dst = Vec::new();
    let streams = [
      Substream::new(tokens),
      Substream::new(offset16),
      Substream::new(offset24),
      Substream::new(var_lit_len),
      Substream::new(var_match_len),
      Substream::new(literals),
    ];
    let mut ctx = SequenceContext::new(&mut dst, streams);
    decompress(&mut ctx)?;
    Ok(dst)
  }

  #[test]
  fn test_wild_copy_overlap() {
    let mut dst = b"abc".to_vec();
    wild_copy(&mut dst, -3, 9).unwrap();
    assert_eq!(dst, b"abcabcabcabc");
  }

  #[test]
  fn test_wild_copy_non_overlapping() {
    let mut dst = b"abcdef".to_vec();
    wild_copy(&mut dst, -6, 3).unwrap();
    assert_eq!(dst, b"abcdefabc");
  }

  #[test]
  fn test_wild_copy_rejects_forward_offsets() {
    let mut dst = b"abc".to_vec();
    assert_eq!(
      wild_copy(&mut dst, 0, 1).unwrap_err().kind,
      ErrorKind::CorruptedBitstream
    );
    assert_eq!(
      wild_copy(&mut dst, -4, 1).unwrap_err().kind,
      ErrorKind::CorruptedBitstream
    );
  }

  #[test]
  fn test_short_token_with_fresh_offset() {
    // three literals then a 9-byte match at distance 3
    let token = (9 << LITERAL_LEN_BITS) as u8 | 3;
    let out = run(&[token], &3_u16.to_le_bytes(), &[], &[], &[], b"abc").unwrap();
    assert_eq!(out, b"abcabcabcabc");
  }

  #[test]
  fn test_repeat_offset_token() {
    // first token sets the offset, second reuses it
    let t1 = (4 << LITERAL_LEN_BITS) as u8 | 2;
    let t2 = 0x80 | (4 << LITERAL_LEN_BITS) as u8;
    let out = run(
      &[t1, t2],
      &2_u16.to_le_bytes(),
      &[],
      &[],
      &[],
      b"ab",
    )
    .unwrap();
    // "ab" + 4 @ -2 -> "abab" ; + 4 more @ -2 -> "abab"
    assert_eq!(out, b"ababababab");
  }

  #[test]
  fn test_extended_lengths() {
    // literal length 7 + var(3) = 10; match length 15 + var(4) = 19
    let token = (15 << LITERAL_LEN_BITS) as u8 | 7;
    let mut vl = Vec::new();
    append_var_uint(&mut vl, 3);
    let mut vm = Vec::new();
    append_var_uint(&mut vm, 4);
    let out = run(
      &[token],
      &1_u16.to_le_bytes(),
      &[],
      &vl,
      &vm,
      b"0123456789",
    )
    .unwrap();
    let mut expected = b"0123456789".to_vec();
    expected.extend(std::iter::repeat(b'9').take(19));
    assert_eq!(out, expected);
  }

  #[test]
  fn test_long_offset_tokens() {
    // A literal-only token (repeat offset, zero match) first pushes 70000
    // bytes, putting the 24-bit distance within reach.
    let filler: Vec<u8> = (0..70_000_u32).map(|i| (i % 256) as u8).collect();
    let lit_token = 0x80_u8 | 7;
    let mut vl = Vec::new();
    append_var_uint(&mut vl, 70_000 - 7);
    let dist = 70_000_u32;

    // token 4 => match length 20 at a 24-bit distance of 70000
    let out = run(
      &[lit_token, 4],
      &[],
      &dist.to_le_bytes()[..3],
      &vl,
      &[],
      &filler,
    )
    .unwrap();
    let mut expected = filler.clone();
    expected.extend_from_within(0..20);
    assert_eq!(out, expected);

    // token 31 => var-uint match length 47 + 13 = 60
    let mut vm = Vec::new();
    append_var_uint(&mut vm, 13);
    let out = run(
      &[lit_token, 31],
      &[],
      &dist.to_le_bytes()[..3],
      &vl,
      &vm,
      &filler,
    )
    .unwrap();
    let mut expected = filler.clone();
    expected.extend_from_within(0..60);
    assert_eq!(out, expected);
  }

  #[test]
  fn test_trailing_literals_only() {
    let out = run(&[], &[], &[], &[], &[], b"plain literals").unwrap();
    assert_eq!(out, b"plain literals");
  }

  #[test]
  fn test_missing_offset_is_an_error() {
    let token = (4 << LITERAL_LEN_BITS) as u8;
    let err = run(&[token], &[], &[], &[], &[], &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::OutOfInputData);
  }
}
