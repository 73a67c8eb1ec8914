use crate::ans::ans32::Ans32Encoder;
use crate::ans::{ans1, ans_nibble, ByteStatistics, NibbleStatistics};
use crate::bits;
use crate::command::{Command, COMMAND_MASK, LAST_COMMAND_MARKER};
use crate::constants::DEFAULT_REJECTION_THRESHOLD;
use crate::errors::{IguanaError, IguanaResult};
use crate::lz::encoder::LzEncoder;
use crate::lz::NUM_STREAMS;
use crate::mode::{Encoding, EntropyMode};
use crate::output;

/// Per-part compression settings.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PartConfig {
  /// Structural encoding (default: [`Encoding::Iguana`]).
  pub encoding: Encoding,
  /// Entropy coding applied to the part, or to each iguana sub-stream
  /// (default: [`EntropyMode::Ans32`]).
  pub entropy_mode: EntropyMode,
  /// Entropy output at or above this fraction of its source size is
  /// rejected and the segment stored raw (default: 1.0).
  pub rejection_threshold: f64,
}

impl Default for PartConfig {
  fn default() -> Self {
    Self {
      encoding: Encoding::default(),
      entropy_mode: EntropyMode::default(),
      rejection_threshold: DEFAULT_REJECTION_THRESHOLD,
    }
  }
}

/// One input part paired with its settings, for multi-part streams.
#[derive(Clone, Copy, Debug)]
pub struct Part<'a> {
  pub data: &'a [u8],
  pub config: PartConfig,
}

/// Builds iguana streams: data segments appended forward, the control list
/// accumulated separately and appended in reverse at finalization.
pub struct Encoder {
  control: Vec<u8>,
  last_command_offset: Option<usize>,
  entropy_data: Vec<u8>,
  ans32: Ans32Encoder,
  lz: LzEncoder,
}

impl Default for Encoder {
  fn default() -> Self {
    Self::new()
  }
}

impl Encoder {
  pub fn new() -> Self {
    Self {
      control: Vec::new(),
      last_command_offset: None,
      entropy_data: Vec::new(),
      ans32: Ans32Encoder::new(),
      lz: LzEncoder::new(),
    }
  }

  /// Compresses `src` as a single part, appending the complete stream to
  /// `dst`.
  pub fn encode(&mut self, dst: &mut Vec<u8>, src: &[u8], config: &PartConfig) -> IguanaResult<()> {
    self.control.clear();
    self.last_command_offset = None;
    self.append_control_var_uint(src.len() as u64);

    if src.is_empty() {
      // A zero-length stream still ends with one last-marked copy_raw
      // command after the length var-uint; the decoder stops at the length.
      self.append_control_command(Command::CopyRaw);
    } else {
      self.encode_part(dst, src, config)?;
    }

    self.finish(dst);
    Ok(())
  }

  /// Compresses several parts into one stream; each part keeps its own
  /// settings, and the leading var-uint carries the summed length.
  pub fn encode_parts(&mut self, dst: &mut Vec<u8>, parts: &[Part<'_>]) -> IguanaResult<()> {
    self.control.clear();
    self.last_command_offset = None;
    let total: u64 = parts.iter().map(|p| p.data.len() as u64).sum();
    self.append_control_var_uint(total);

    for p in parts {
      if p.data.is_empty() {
        continue;
      }
      self.encode_part(dst, p.data, &p.config)?;
    }

    self.finish(dst);
    Ok(())
  }

  // Appends the control bytes in reverse order, yielding the
  // backward-readable tail.
  fn finish(&mut self, dst: &mut Vec<u8>) {
    output::append_reverse(dst, &self.control);
    self.control.clear();
  }

  fn encode_part(&mut self, dst: &mut Vec<u8>, src: &[u8], config: &PartConfig) -> IguanaResult<()> {
    if !config.rejection_threshold.is_finite() || config.rejection_threshold < 0.0 {
      return Err(IguanaError::invalid_argument(
        "rejection threshold must be finite and non-negative",
      ));
    }

    match config.encoding {
      Encoding::Raw => self.encode_entropy(dst, src, config),
      Encoding::Iguana => self.encode_iguana(dst, src, config),
    }
    Ok(())
  }

  fn encode_entropy_raw(&mut self, dst: &mut Vec<u8>, src: &[u8]) {
    self.append_control_command(Command::CopyRaw);
    self.append_control_var_uint(src.len() as u64);
    dst.extend_from_slice(src);
  }

  fn encode_entropy(&mut self, dst: &mut Vec<u8>, src: &[u8], config: &PartConfig) {
    let mode = config.entropy_mode;
    if mode == EntropyMode::None || src.is_empty() {
      self.encode_entropy_raw(dst, src);
      return;
    }

    self.entropy_data.clear();
    encode_entropy_stream(&mut self.entropy_data, &mut self.ans32, mode, src);

    let ratio = self.entropy_data.len() as f64 / src.len() as f64;
    if ratio >= config.rejection_threshold {
      self.encode_entropy_raw(dst, src);
    } else {
      self.append_control_command(decoding_command(mode));
      self.append_control_var_uint(src.len() as u64);
      self.append_control_var_uint(self.entropy_data.len() as u64);
      dst.extend_from_slice(&self.entropy_data);
    }
  }

  fn encode_iguana(&mut self, dst: &mut Vec<u8>, src: &[u8], config: &PartConfig) {
    self.append_control_command(Command::DecodeIguana);

    let mut modes = [EntropyMode::None; NUM_STREAMS];
    let mut ranges = [(0_usize, 0_usize); NUM_STREAMS];
    {
      let Self {
        lz,
        entropy_data,
        ans32,
        ..
      } = self;
      lz.compress(src);
      entropy_data.clear();

      if config.entropy_mode != EntropyMode::None {
        for (i, (mode, range)) in modes.iter_mut().zip(&mut ranges).enumerate() {
          let stream = lz.stream(i);
          if stream.is_empty() {
            continue;
          }
          let start = entropy_data.len();
          encode_entropy_stream(entropy_data, ans32, config.entropy_mode, stream);
          let c_len = entropy_data.len() - start;
          if c_len as f64 / stream.len() as f64 >= config.rejection_threshold {
            // rejected: this sub-stream travels raw
            entropy_data.truncate(start);
          } else {
            *mode = config.entropy_mode;
            *range = (start, c_len);
          }
        }
      }
    }

    let mut hdr = 0_u64;
    for (i, mode) in modes.iter().enumerate() {
      hdr |= u64::from(mode.to_nibble()) << (i * 4);
    }
    self.append_control_var_uint(hdr);
    for i in 0..NUM_STREAMS {
      self.append_control_var_uint(self.lz.stream(i).len() as u64);
    }
    for (mode, range) in modes.iter().zip(&ranges) {
      if *mode != EntropyMode::None {
        self.append_control_var_uint(range.1 as u64);
      }
    }

    for (i, (mode, range)) in modes.iter().zip(&ranges).enumerate() {
      if *mode == EntropyMode::None {
        dst.extend_from_slice(self.lz.stream(i));
      } else {
        dst.extend_from_slice(&self.entropy_data[range.0..range.0 + range.1]);
      }
    }
  }

  // Control var-uints are written most significant 7-bit group first, with
  // the marker bit on the group pushed last; the backward-scanning decoder
  // therefore sees the marker first and accumulates toward it.
  fn append_control_var_uint(&mut self, v: u64) {
    let cnt = bits::bit_length(v) / 7 + 1;
    for i in (0..cnt).rev() {
      let mut x = ((v >> (i * 7)) & 0x7f) as u8;
      if i == 0 {
        x |= 0x80;
      }
      self.control.push(x);
    }
  }

  // The freshly pushed command carries the last-command marker; the marker
  // of the previously pushed command is cleared in place.
  fn append_control_command(&mut self, cmd: Command) {
    if let Some(offset) = self.last_command_offset {
      self.control[offset] &= COMMAND_MASK;
    }
    self.last_command_offset = Some(self.control.len());
    self.control.push(cmd as u8 | LAST_COMMAND_MARKER);
  }
}

fn decoding_command(mode: EntropyMode) -> Command {
  match mode {
    EntropyMode::None => Command::CopyRaw,
    EntropyMode::Ans32 => Command::DecodeAns32,
    EntropyMode::Ans1 => Command::DecodeAns1,
    EntropyMode::AnsNibble => Command::DecodeAnsNibble,
  }
}

// Appends the entropy-coded segment: ANS payload first, serialized
// statistics as the tail.
fn encode_entropy_stream(
  dst: &mut Vec<u8>,
  ans32: &mut Ans32Encoder,
  mode: EntropyMode,
  src: &[u8],
) {
  match mode {
    EntropyMode::None => dst.extend_from_slice(src),
    EntropyMode::Ans32 => {
      let stats = ByteStatistics::new(src);
      ans32.encode(dst, &stats, src);
      stats.serialize(dst);
    }
    EntropyMode::Ans1 => {
      let stats = ByteStatistics::new(src);
      ans1::encode(dst, &stats, src);
      stats.serialize(dst);
    }
    EntropyMode::AnsNibble => {
      let stats = NibbleStatistics::new(src);
      ans_nibble::encode(dst, &stats, src);
      stats.serialize(dst);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_control_var_uint_layout() {
    let mut enc = Encoder::new();
    enc.append_control_var_uint(0);
    assert_eq!(enc.control, vec![0x80]);

    enc.control.clear();
    enc.append_control_var_uint(0x7f);
    assert_eq!(enc.control, vec![0x00, 0xff]);

    enc.control.clear();
    enc.append_control_var_uint(300); // 300 = 2 * 128 + 44
    assert_eq!(enc.control, vec![0x02, 0x80 | 44]);
  }

  #[test]
  fn test_last_command_marker_moves() {
    let mut enc = Encoder::new();
    enc.append_control_command(Command::CopyRaw);
    assert_eq!(enc.control, vec![0x80]);
    enc.append_control_command(Command::DecodeAns1);
    assert_eq!(enc.control, vec![0x00, 0x83]);
    enc.append_control_command(Command::DecodeIguana);
    assert_eq!(enc.control, vec![0x00, 0x03, 0x81]);
  }

  #[test]
  fn test_invalid_threshold() {
    let mut enc = Encoder::new();
    let mut dst = Vec::new();
    for bad in [f64::NAN, f64::INFINITY, -0.5] {
      let config = PartConfig {
        rejection_threshold: bad,
        ..Default::default()
      };
      let err = enc.encode(&mut dst, b"payload", &config).unwrap_err();
      assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }
  }
}
