use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::IguanaError;

/// Structural encoding applied to a part before entropy coding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
  /// The part's bytes reach the entropy stage unchanged.
  Raw,
  /// The iguana LZ layer splits the part into six sub-streams, each
  /// entropy-coded independently.
  #[default]
  Iguana,
}

impl Encoding {
  pub fn as_str(&self) -> &'static str {
    match self {
      Encoding::Raw => "raw",
      Encoding::Iguana => "iguana",
    }
  }
}

impl Display for Encoding {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Encoding {
  type Err = IguanaError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "raw" => Ok(Encoding::Raw),
      "iguana" => Ok(Encoding::Iguana),
      _ => Err(IguanaError::invalid_argument(format!(
        "unrecognized encoding '{}'",
        s
      ))),
    }
  }
}

/// Entropy coding applied to a part, or to each iguana sub-stream.
///
/// The discriminants are the 4-bit values packed into the sub-stream header
/// word of `decode_iguana` commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum EntropyMode {
  /// No entropy compression is applied.
  None = 0,
  /// 32-way interleaved 8-bit rANS.
  #[default]
  Ans32 = 1,
  /// Scalar, one-way 8-bit rANS.
  Ans1 = 2,
  /// Scalar, one-way 4-bit rANS.
  AnsNibble = 3,
}

impl EntropyMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntropyMode::None => "none",
      EntropyMode::Ans32 => "ans32",
      EntropyMode::Ans1 => "ans1",
      EntropyMode::AnsNibble => "ans_nibble",
    }
  }

  pub(crate) fn to_nibble(self) -> u8 {
    self as u8
  }

  pub(crate) fn from_nibble(v: u8) -> Option<Self> {
    match v {
      0 => Some(EntropyMode::None),
      1 => Some(EntropyMode::Ans32),
      2 => Some(EntropyMode::Ans1),
      3 => Some(EntropyMode::AnsNibble),
      _ => None,
    }
  }
}

impl Display for EntropyMode {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntropyMode {
  type Err = IguanaError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "none" => Ok(EntropyMode::None),
      "ans32" => Ok(EntropyMode::Ans32),
      "ans1" => Ok(EntropyMode::Ans1),
      "ans_nibble" => Ok(EntropyMode::AnsNibble),
      _ => Err(IguanaError::invalid_argument(format!(
        "unrecognized entropy mode '{}'",
        s
      ))),
    }
  }
}
