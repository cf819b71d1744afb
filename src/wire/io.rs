//! Async framed send/receive over a peer connection (spec §4.A, §5).

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::header::{CMD_HEADER_LEN, CmdHeader};
use crate::error::NodeError;

/// Maximum size of the attribute payload following a `cmd` header.
///
/// There is no equivalent constant in the source beyond the implicit limit
/// of available memory; this bound exists to keep a single frame's payload
/// from exhausting the process, mirroring the teacher's `MAX_PAYLOAD_SIZE`.
pub const MAX_CMD_SIZE: u64 = 16 * 1024 * 1024;

/// Default receive timeout for a peer connection (spec §3 "Peer state",
/// "a receive timeout").
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

async fn read_timeout_exact<R: AsyncRead + Unpin>(
    r: &mut R,
    buf: &mut [u8],
    dur: Duration,
) -> Result<(), NodeError> {
    timeout(dur, r.read_exact(buf))
        .await
        .map_err(|_| NodeError::Timeout)??;
    Ok(())
}

async fn write_timeout_all<W: AsyncWrite + Unpin>(
    w: &mut W,
    buf: &[u8],
    dur: Duration,
) -> Result<(), NodeError> {
    timeout(dur, w.write_all(buf))
        .await
        .map_err(|_| NodeError::Timeout)??;
    Ok(())
}

/// Read one `cmd` header and its `cmd.size`-byte payload from `r`.
///
/// # Errors
/// Returns [`NodeError::Timeout`] if no data arrives within `dur`,
/// [`NodeError::Proto`] if the declared size exceeds [`MAX_CMD_SIZE`], or
/// [`NodeError::Io`] on a lower-level read failure.
pub async fn read_cmd<R: AsyncRead + Unpin>(
    r: &mut R,
    dur: Duration,
) -> Result<(CmdHeader, Vec<u8>), NodeError> {
    let mut hdr_buf = [0u8; CMD_HEADER_LEN];
    read_timeout_exact(r, &mut hdr_buf, dur).await?;
    let header = CmdHeader::from_bytes(&hdr_buf);
    if header.size > MAX_CMD_SIZE {
        return Err(NodeError::Proto);
    }
    let mut payload = vec![0u8; usize::try_from(header.size).unwrap_or(usize::MAX)];
    read_timeout_exact(r, &mut payload, dur).await?;
    Ok((header, payload))
}

/// Serialise `header` and write it plus `payload` to `w` under the caller's
/// send-lock acquisition (spec §4.F, §5 `peer.send_lock`).
///
/// # Errors
/// Returns [`NodeError::Timeout`] if the write stalls past `dur`, or
/// [`NodeError::Io`] on a lower-level write failure.
pub async fn write_cmd<W: AsyncWrite + Unpin>(
    w: &mut W,
    header: &CmdHeader,
    payload: &[u8],
    dur: Duration,
) -> Result<(), NodeError> {
    write_timeout_all(w, &header.to_bytes(), dur).await?;
    write_timeout_all(w, payload, dur).await?;
    timeout(dur, w.flush()).await.map_err(|_| NodeError::Timeout)??;
    Ok(())
}
