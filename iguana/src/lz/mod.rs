pub(crate) mod decoder;
pub(crate) mod encoder;
pub(crate) mod substream;

pub(crate) const NUM_STREAMS: usize = 6;

// sub-stream roles, in wire order
pub(crate) const STREAM_TOKENS: usize = 0;
pub(crate) const STREAM_OFFSET16: usize = 1;
pub(crate) const STREAM_OFFSET24: usize = 2;
pub(crate) const STREAM_VAR_LIT_LEN: usize = 3;
pub(crate) const STREAM_VAR_MATCH_LEN: usize = 4;
pub(crate) const STREAM_LITERALS: usize = 5;

// token layout:
// [0_MMMM_LLL] fresh 16-bit offset, 4-bit match length, 3-bit literal length
// [1_MMMM_LLL] repeat offset, 4-bit match length, 3-bit literal length
// 0..=30       fresh 24-bit offset, match lengths 16..=46, no literals
// 31           fresh 24-bit offset, var-uint match length 47+, no literals
pub(crate) const LITERAL_LEN_BITS: u32 = 3;
pub(crate) const MAX_SHORT_LIT_LEN: u32 = 7;
pub(crate) const MAX_SHORT_MATCH_LEN: u32 = 15;
pub(crate) const MATCH_LEN_LONG_OFFSETS: u32 = 16;
pub(crate) const LAST_LONG_OFFSET: u32 = 31;
pub(crate) const INIT_LAST_OFFSET: i64 = 0;
