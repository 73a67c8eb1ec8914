/// Non-owning view over a byte range with a movable logical end.
///
/// Entropy decoders consume serialized statistics from the tail of a segment
/// and then run on the remaining prefix, so the view supports shrinking from
/// the end as well as indexed access.
#[derive(Clone, Copy, Debug)]
pub struct InputStream<'a> {
  data: &'a [u8],
}

impl<'a> InputStream<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { data }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn as_slice(&self) -> &'a [u8] {
    self.data
  }

  #[inline]
  pub fn byte(&self, idx: usize) -> u8 {
    self.data[idx]
  }

  /// Shrinks the logical range to its first `new_len` bytes.
  pub fn truncate(&mut self, new_len: usize) {
    self.data = &self.data[..new_len];
  }
}
