use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use iguana::{Encoder, PartConfig};

use crate::opt::Opt;

pub fn compress(opt: &Opt) -> Result<()> {
  let input = opt
    .input
    .as_deref()
    .context("an input file is required when compressing")?;
  let src =
    fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

  let mut config = PartConfig::default();
  config.encoding = opt.encoding;
  config.entropy_mode = opt.entropy;
  config.rejection_threshold = opt.threshold;

  let mut dst = Vec::new();
  Encoder::new().encode(&mut dst, &src, &config)?;

  write_output(opt.output.as_deref(), &dst)
}

pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
  match path {
    Some(path) => fs::write(path, bytes)
      .with_context(|| format!("failed to write {}", path.display())),
    None => io::stdout()
      .write_all(bytes)
      .context("failed to write to stdout"),
  }
}
