//! `sha2-256`-backed content transform.

use sha2::{Digest, Sha256};

use crate::oid::Oid;
use crate::transform::ContentTransform;

/// Content transform driven by `sha2`'s `Sha256` incremental hasher.
pub struct Sha256Transform {
    hasher: Sha256,
}

impl Sha256Transform {
    /// Construct a transform ready for its first `init`/`update`/`finalize`
    /// cycle.
    #[must_use]
    pub fn new() -> Self { Self { hasher: Sha256::new() } }
}

impl Default for Sha256Transform {
    fn default() -> Self { Self::new() }
}

impl ContentTransform for Sha256Transform {
    fn name(&self) -> &str { "sha2-256" }

    fn init(&mut self) { self.hasher = Sha256::new(); }

    fn update(&mut self, input: &[u8]) { Digest::update(&mut self.hasher, input); }

    fn finalize(&mut self) -> Option<Oid> {
        let digest = std::mem::replace(&mut self.hasher, Sha256::new()).finalize();
        Some(Oid::from_slice(&digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let mut t = Sha256Transform::new();
        t.init();
        t.update(b"abc");
        let id = t.finalize().unwrap();
        assert_eq!(
            id.to_hex()[..64],
            *"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015a"
        );
    }
}
