//! Object/overlay identifiers and the content-addressed path scheme (spec §3, §8).

use camino::{Utf8Path, Utf8PathBuf};

/// Default identifier width in bytes.
///
/// Transforms are free to produce shorter IDs (see [`Oid::from_slice`]); the
/// registry pads remaining bytes with zero, matching the source's
/// fixed-`ID_SIZE`-buffer convention where a shorter digest simply leaves the
/// buffer's tail untouched.
pub const ID_SIZE: usize = 32;

/// A fixed-width opaque object identifier.
///
/// Equality is byte-equality; ordering is lexicographic, matching the
/// overlay's addressing contract (spec §3, "Object identifier").
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid([u8; ID_SIZE]);

impl Oid {
    /// The all-zero identifier, used as a sentinel and in tests.
    pub const ZERO: Self = Self([0u8; ID_SIZE]);

    /// Build an `Oid` from raw bytes, zero-padding or truncating to
    /// [`ID_SIZE`].
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; ID_SIZE];
        let n = bytes.len().min(ID_SIZE);
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), bytes.get(..n)) {
            dst.copy_from_slice(src);
        }
        Self(buf)
    }

    /// Borrow the identifier as raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] { &self.0 }

    /// Lower-case hex encoding of the full identifier (`H` in spec §4.E).
    #[must_use]
    pub fn to_hex(&self) -> String { hex::encode(self.0) }

    /// Parse a lower- or upper-case hex string into an `Oid`.
    ///
    /// # Errors
    /// Returns an error if `s` is not valid hex or decodes to more than
    /// [`ID_SIZE`] bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let decoded = hex::decode(s)?;
        Ok(Self::from_slice(&decoded))
    }

    /// The on-disk object path relative to the storage root: `HH/H`, where
    /// `HH` is the hex of the first byte and `H` the full hex identifier
    /// (spec §4.E, §8 "OID addressing").
    ///
    /// The result never contains `..` or a path separator beyond the two
    /// components produced here, so it can never escape the root it is
    /// joined against.
    #[must_use]
    pub fn relative_path(&self) -> Utf8PathBuf {
        let full = self.to_hex();
        let Some(prefix) = full.get(0..2) else {
            return Utf8PathBuf::from(full);
        };
        Utf8Path::new(prefix).join(full)
    }

    /// The history log path relative to the storage root: `HH/H.history`.
    #[must_use]
    pub fn history_path(&self) -> Utf8PathBuf {
        let mut path = self.relative_path();
        let name = format!("{}.history", path.file_name().unwrap_or_default());
        path.set_file_name(name);
        path
    }
}

impl std::fmt::Debug for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.to_hex()) }
}

impl From<[u8; ID_SIZE]> for Oid {
    fn from(bytes: [u8; ID_SIZE]) -> Self { Self(bytes) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn zero_pads_short_input() {
        let oid = Oid::from_slice(&[1, 2, 3, 4]);
        assert_eq!(oid.as_bytes()[0], 1);
        assert_eq!(oid.as_bytes()[4], 0);
    }

    #[test]
    fn truncates_long_input() {
        let long = vec![7u8; ID_SIZE + 10];
        let oid = Oid::from_slice(&long);
        assert_eq!(oid.as_bytes().len(), ID_SIZE);
    }

    #[test]
    fn hex_round_trips() {
        let oid = Oid::from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        let hex = oid.to_hex();
        assert_eq!(Oid::from_hex(&hex).unwrap(), oid);
    }

    #[rstest]
    #[case(&[0x01, 0x02, 0x03, 0x04], "01")]
    #[case(&[0xff, 0x00], "ff")]
    fn relative_path_splits_on_first_byte(#[case] input: &[u8], #[case] expected_dir: &str) {
        let oid = Oid::from_slice(input);
        let path = oid.relative_path();
        assert_eq!(path.parent().unwrap().as_str(), expected_dir);
        assert_eq!(path.file_name().unwrap(), oid.to_hex());
    }

    #[test]
    fn history_path_appends_suffix() {
        let oid = Oid::from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        let history = oid.history_path();
        assert!(history.as_str().ends_with(".history"));
        assert_eq!(history.parent(), oid.relative_path().parent());
    }

    #[test]
    fn relative_path_never_escapes_root() {
        let oid = Oid::ZERO;
        let path = oid.relative_path();
        assert!(!path.as_str().contains(".."));
        assert_eq!(path.components().count(), 2);
    }
}
