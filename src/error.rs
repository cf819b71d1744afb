//! Error taxonomy shared by the wire, storage, and routing layers.
//!
//! The wire protocol reports failures as a signed status: negative values are
//! negated host errno codes, zero is success, and (for the transform driver
//! loop only, see [`crate::transform`]) a positive value is a terminal
//! sentinel rather than an error. [`NodeError`] models the in-process side of
//! that taxonomy; [`NodeError::to_status`] and [`NodeError::from_status`]
//! cross the wire boundary.

use thiserror::Error;

/// Errors produced by the dispatcher, storage engine, peer table, and
/// transaction table.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Framing or attribute parsing violated the protocol (§7: `Proto`).
    #[error("protocol error")]
    Proto,
    /// A filesystem operation failed; carries the originating error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Allocation or buffer sizing failure.
    #[error("out of memory")]
    NoMem,
    /// No peer or transform matched the request.
    #[error("not found")]
    NotFound,
    /// A registration collided with an existing entry.
    #[error("already exists")]
    Exists,
    /// A peer receive exceeded its configured timeout.
    #[error("timed out")]
    Timeout,
}

impl NodeError {
    /// Convert to the wire's negated-errno status convention.
    ///
    /// `Proto` maps to `-EPROTO`, `NotFound` to `-ENOENT`, `Exists` to
    /// `-EEXIST`, `NoMem` to `-ENOMEM`, and `Timeout` to `-ETIMEDOUT`. `Io`
    /// forwards the wrapped error's raw OS error when available, falling
    /// back to `-EIO`.
    #[must_use]
    pub fn to_status(&self) -> i32 {
        let errno = match self {
            Self::Proto => libc_errno::EPROTO,
            Self::NotFound => libc_errno::ENOENT,
            Self::Exists => libc_errno::EEXIST,
            Self::NoMem => libc_errno::ENOMEM,
            Self::Timeout => libc_errno::ETIMEDOUT,
            Self::Io(e) => e.raw_os_error().unwrap_or(libc_errno::EIO),
        };
        -errno
    }

    /// Reconstruct an error from a wire status received from a peer.
    ///
    /// Recognised negated-errno values map back to their named variant;
    /// anything else becomes `NodeError::Io` wrapping a raw-OS-error
    /// `std::io::Error`, so a client-side driver loop retains the peer's
    /// errno even for codes this crate has no dedicated variant for.
    /// `status == 0` is not an error and has no meaningful reconstruction;
    /// callers are expected to check for success before calling this.
    #[must_use]
    pub fn from_status(status: i32) -> Self {
        match -status {
            libc_errno::EPROTO => Self::Proto,
            libc_errno::ENOENT => Self::NotFound,
            libc_errno::EEXIST => Self::Exists,
            libc_errno::ENOMEM => Self::NoMem,
            libc_errno::ETIMEDOUT => Self::Timeout,
            errno => Self::Io(std::io::Error::from_raw_os_error(errno)),
        }
    }
}

/// Minimal errno constants, avoiding a direct `libc` dependency for four
/// well-known values used only to populate the wire status field.
mod libc_errno {
    pub const EPROTO: i32 = 71;
    pub const ENOENT: i32 = 2;
    pub const EEXIST: i32 = 17;
    pub const ENOMEM: i32 = 12;
    pub const ETIMEDOUT: i32 = 110;
    pub const EIO: i32 = 5;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::proto(NodeError::Proto, -71)]
    #[case::not_found(NodeError::NotFound, -2)]
    #[case::exists(NodeError::Exists, -17)]
    #[case::no_mem(NodeError::NoMem, -12)]
    #[case::timeout(NodeError::Timeout, -110)]
    fn status_matches_negated_errno(#[case] err: NodeError, #[case] expected: i32) {
        assert_eq!(err.to_status(), expected);
    }

    #[rstest]
    #[case::proto(-71)]
    #[case::not_found(-2)]
    #[case::exists(-17)]
    #[case::no_mem(-12)]
    #[case::timeout(-110)]
    fn from_status_round_trips_named_variants(#[case] status: i32) {
        assert_eq!(NodeError::from_status(status).to_status(), status);
    }

    #[test]
    fn from_status_preserves_unrecognised_errno() {
        let err = NodeError::from_status(-9);
        assert_eq!(err.to_status(), -9);
    }
}
