use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use iguana::{Encoding, EntropyMode};

#[derive(Clone, Debug, Parser)]
#[command(name = "iguana", about = "compresses and decompresses iguana streams")]
pub struct Opt {
  /// File to compress.
  #[arg(
    value_name = "INPUT",
    required_unless_present = "decompress",
    conflicts_with = "decompress"
  )]
  pub input: Option<PathBuf>,
  /// Where to write the result; stdout when omitted.
  #[arg(short, long, value_name = "PATH")]
  pub output: Option<PathBuf>,
  /// Decompress the given file instead of compressing.
  #[arg(short, long, value_name = "PATH")]
  pub decompress: Option<PathBuf>,
  /// Entropy output at or above this fraction of the source size falls back
  /// to raw storage.
  #[arg(
    short,
    long,
    value_name = "FLOAT",
    default_value_t = iguana::DEFAULT_REJECTION_THRESHOLD,
    value_parser = parse_threshold
  )]
  pub threshold: f64,
  /// Entropy coding: none, ans1, ans32 or ans_nibble.
  #[arg(
    short,
    long,
    value_name = "MODE",
    default_value = "ans32",
    value_parser = EntropyMode::from_str
  )]
  pub entropy: EntropyMode,
  /// Structural encoding: raw or iguana.
  #[arg(
    short = 'x',
    long,
    value_name = "ENCODING",
    default_value = "iguana",
    value_parser = Encoding::from_str
  )]
  pub encoding: Encoding,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
  let v: f64 = s
    .parse()
    .map_err(|_| format!("'{}' is not a number", s))?;
  if (0.0..=1.0).contains(&v) {
    Ok(v)
  } else {
    Err(format!("{} is outside the range [0.0, 1.0]", v))
  }
}
