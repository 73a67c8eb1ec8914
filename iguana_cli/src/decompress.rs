use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use iguana::Decoder;

use crate::compress::write_output;

pub fn decompress(input: &Path, output: Option<&Path>) -> Result<()> {
  let src =
    fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

  let mut dst = Vec::new();
  Decoder::new()
    .decode(&src, &mut dst)
    .with_context(|| format!("failed to decompress {}", input.display()))?;

  write_output(output, &dst)
}
