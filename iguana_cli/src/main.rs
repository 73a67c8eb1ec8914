use anyhow::Result;
use clap::Parser;

use crate::opt::Opt;

mod compress;
mod decompress;
mod opt;

fn main() -> Result<()> {
  let opt = Opt::parse();
  match &opt.decompress {
    Some(path) => decompress::decompress(path, opt.output.as_deref()),
    None => compress::compress(&opt),
  }
}
