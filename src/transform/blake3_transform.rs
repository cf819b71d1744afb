//! `blake3`-backed content transform.

use crate::oid::Oid;
use crate::transform::ContentTransform;

/// Content transform driven by `blake3`'s incremental hasher.
pub struct Blake3Transform {
    hasher: blake3::Hasher,
}

impl Blake3Transform {
    /// Construct a transform ready for its first `init`/`update`/`finalize`
    /// cycle.
    #[must_use]
    pub fn new() -> Self { Self { hasher: blake3::Hasher::new() } }
}

impl Default for Blake3Transform {
    fn default() -> Self { Self::new() }
}

impl ContentTransform for Blake3Transform {
    fn name(&self) -> &str { "blake3" }

    fn init(&mut self) { self.hasher = blake3::Hasher::new(); }

    fn update(&mut self, input: &[u8]) { self.hasher.update(input); }

    fn finalize(&mut self) -> Option<Oid> {
        Some(Oid::from_slice(self.hasher.finalize().as_bytes()))
    }
}
