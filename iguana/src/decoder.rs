use crate::ans::{ans1, ans32, ans_nibble, ByteStatistics, NibbleStatistics};
use crate::command::{Command, LAST_COMMAND_MARKER};
use crate::constants::PAD_SIZE;
use crate::errors::{IguanaError, IguanaResult};
use crate::input::InputStream;
use crate::lz;
use crate::lz::decoder::SequenceContext;
use crate::lz::substream::Substream;
use crate::lz::NUM_STREAMS;
use crate::mode::EntropyMode;

/// Decodes complete iguana streams by scanning the control list backwards
/// from the final byte while consuming data segments forward.
pub struct Decoder {
  // entropy-decoded sub-streams land here; capacity only ever grows
  ent_buf: Vec<u8>,
}

impl Default for Decoder {
  fn default() -> Self {
    Self::new()
  }
}

impl Decoder {
  pub fn new() -> Self {
    Self { ent_buf: Vec::new() }
  }

  /// Appends the recovered octet sequence to `dst`. On failure `dst` may
  /// hold a partial prefix of the output.
  pub fn decode(&mut self, src: &[u8], dst: &mut Vec<u8>) -> IguanaResult<()> {
    if src.is_empty() {
      return Err(IguanaError::out_of_input_data("empty stream"));
    }

    let mut ctrl_cursor = src.len() as isize - 1;
    let uncompressed_len = read_control_var_uint(src, &mut ctrl_cursor)?;
    if uncompressed_len == 0 {
      return Ok(());
    }

    let uncompressed_len = usize::try_from(uncompressed_len).map_err(|_| {
      IguanaError::corrupted_bitstream("uncompressed length overflows the address space")
    })?;
    dst
      .try_reserve(uncompressed_len)
      .map_err(|_| IguanaError::out_of_memory("output reservation failed"))?;

    let base = dst.len();
    self.decompress(dst, src, &mut ctrl_cursor)?;
    if dst.len() - base != uncompressed_len {
      return Err(IguanaError::corrupted_bitstream(
        "stream decoded to an unexpected length",
      ));
    }
    Ok(())
  }

  fn decompress(
    &mut self,
    dst: &mut Vec<u8>,
    src: &[u8],
    ctrl_cursor: &mut isize,
  ) -> IguanaResult<()> {
    let mut data_cursor = 0_usize;

    loop {
      if *ctrl_cursor < 0 {
        return Err(IguanaError::out_of_input_data(
          "control stream exhausted before the last-command marker",
        ));
      }
      let cmd_byte = src[*ctrl_cursor as usize];
      *ctrl_cursor -= 1;

      let cmd = Command::from_byte(cmd_byte).ok_or_else(|| {
        IguanaError::unrecognized_command(format!(
          "unknown command byte {:#04x}",
          cmd_byte
        ))
      })?;

      match cmd {
        Command::CopyRaw => {
          let n = read_control_var_uint(src, ctrl_cursor)?;
          let segment = data_slice(src, data_cursor, n)?;
          dst.extend_from_slice(segment);
          data_cursor += segment.len();
        }

        Command::DecodeAns32 => {
          data_cursor =
            entropy_command(dst, src, ctrl_cursor, data_cursor, EntropyMode::Ans32)?;
        }

        Command::DecodeAns1 => {
          data_cursor =
            entropy_command(dst, src, ctrl_cursor, data_cursor, EntropyMode::Ans1)?;
        }

        Command::DecodeAnsNibble => {
          data_cursor =
            entropy_command(dst, src, ctrl_cursor, data_cursor, EntropyMode::AnsNibble)?;
        }

        Command::DecodeIguana => {
          data_cursor = self.decode_iguana(dst, src, ctrl_cursor, data_cursor)?;
        }
      }

      if cmd_byte & LAST_COMMAND_MARKER != 0 {
        return Ok(());
      }
    }
  }

  fn decode_iguana(
    &mut self,
    dst: &mut Vec<u8>,
    src: &[u8],
    ctrl_cursor: &mut isize,
    mut data_cursor: usize,
  ) -> IguanaResult<usize> {
    let hdr = read_control_var_uint(src, ctrl_cursor)?;

    // Fetch the sub-stream lengths and entropy modes.
    let mut u_lens = [0_usize; NUM_STREAMS];
    let mut modes = [EntropyMode::None; NUM_STREAMS];
    let mut entropy_total = 0_usize;
    for i in 0..NUM_STREAMS {
      let u_len = read_control_var_uint(src, ctrl_cursor)?;
      u_lens[i] = usize::try_from(u_len).map_err(|_| {
        IguanaError::corrupted_bitstream("sub-stream length overflows the address space")
      })?;
      let nibble = ((hdr >> (i * 4)) & 0x0f) as u8;
      modes[i] = EntropyMode::from_nibble(nibble).ok_or_else(|| {
        IguanaError::corrupted_bitstream("unrecognized entropy mode in the sub-stream header")
      })?;
      if modes[i] != EntropyMode::None {
        entropy_total = entropy_total.checked_add(u_lens[i]).ok_or_else(|| {
          IguanaError::corrupted_bitstream("sub-stream lengths overflow the address space")
        })?;
      }
    }

    self.ent_buf.clear();
    self
      .ent_buf
      .try_reserve(entropy_total.saturating_add(PAD_SIZE))
      .map_err(|_| IguanaError::out_of_memory("entropy scratch reservation failed"))?;

    // Raw sub-streams are borrowed straight from the source; entropy-coded
    // ones are decoded into the scratch buffer first.
    let mut in_scratch = [false; NUM_STREAMS];
    let mut ranges = [(0_usize, 0_usize); NUM_STREAMS];
    for i in 0..NUM_STREAMS {
      if modes[i] == EntropyMode::None {
        let segment = data_slice(src, data_cursor, u_lens[i] as u64)?;
        ranges[i] = (data_cursor, segment.len());
        data_cursor += segment.len();
      } else {
        let c_len = read_control_var_uint(src, ctrl_cursor)?;
        let segment = data_slice(src, data_cursor, c_len)?;
        data_cursor += segment.len();

        let start = self.ent_buf.len();
        decode_entropy_segment(&mut self.ent_buf, modes[i], segment, u_lens[i])?;
        in_scratch[i] = true;
        ranges[i] = (start, u_lens[i]);
      }
    }

    let streams = core::array::from_fn(|i| {
      let (start, len) = ranges[i];
      let data = if in_scratch[i] {
        &self.ent_buf[start..start + len]
      } else {
        &src[start..start + len]
      };
      Substream::new(data)
    });

    let mut ctx = SequenceContext::new(dst, streams);
    lz::decoder::decompress(&mut ctx)?;
    Ok(data_cursor)
  }
}

// Body of the three standalone entropy commands: two control var-uints for
// the uncompressed and compressed lengths, then one forward data segment.
fn entropy_command(
  dst: &mut Vec<u8>,
  src: &[u8],
  ctrl_cursor: &mut isize,
  mut data_cursor: usize,
  mode: EntropyMode,
) -> IguanaResult<usize> {
  let u_len = read_control_var_uint(src, ctrl_cursor)?;
  let c_len = read_control_var_uint(src, ctrl_cursor)?;
  let u_len = usize::try_from(u_len).map_err(|_| {
    IguanaError::corrupted_bitstream("uncompressed length overflows the address space")
  })?;

  let segment = data_slice(src, data_cursor, c_len)?;
  data_cursor += segment.len();
  decode_entropy_segment(dst, mode, segment, u_len)?;
  Ok(data_cursor)
}

// Pops control bytes downward, accumulating base-128 big-endian digits until
// the byte with the marker bit, which is read first on the wire but holds
// the most significant group of the original value.
fn read_control_var_uint(src: &[u8], cursor: &mut isize) -> IguanaResult<u64> {
  let mut r = 0_u64;
  while *cursor >= 0 {
    let v = src[*cursor as usize];
    *cursor -= 1;
    r = (r << 7) | u64::from(v & 0x7f);
    if v & 0x80 != 0 {
      return Ok(r);
    }
  }

  Err(IguanaError::out_of_input_data(
    "control stream exhausted inside a var-uint",
  ))
}

fn data_slice(src: &[u8], cursor: usize, n: u64) -> IguanaResult<&[u8]> {
  let n = usize::try_from(n)
    .map_err(|_| IguanaError::corrupted_bitstream("segment length overflows the address space"))?;
  cursor
    .checked_add(n)
    .and_then(|end| src.get(cursor..end))
    .ok_or_else(|| {
      IguanaError::out_of_input_data("data segment extends past the end of the stream")
    })
}

fn decode_entropy_segment(
  dst: &mut Vec<u8>,
  mode: EntropyMode,
  segment: &[u8],
  u_len: usize,
) -> IguanaResult<()> {
  let mut stream = InputStream::new(segment);
  match mode {
    EntropyMode::None => {
      dst.extend_from_slice(segment);
      Ok(())
    }
    EntropyMode::Ans32 => {
      let stats = ByteStatistics::deserialize(&mut stream)?;
      let tab = stats.build_decoding_table()?;
      ans32::decode(dst, u_len, &stream, &tab)
    }
    EntropyMode::Ans1 => {
      let stats = ByteStatistics::deserialize(&mut stream)?;
      let tab = stats.build_decoding_table()?;
      ans1::decode(dst, u_len, &stream, &tab)
    }
    EntropyMode::AnsNibble => {
      let stats = NibbleStatistics::deserialize(&mut stream)?;
      let tab = stats.build_decoding_table()?;
      ans_nibble::decode(dst, u_len, &stream, &tab)
    }
  }
}
