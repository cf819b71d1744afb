//! Content-addressed object I/O: write, chunked read, and history log
//! (spec §4.E).

use std::io::{Read, Seek, SeekFrom, Write};

use cap_std::fs_utf8::OpenOptions;
use tracing::{debug, info};

use super::paths::StorageRoot;
use crate::error::NodeError;
use crate::flags::IoFlags;
use crate::oid::Oid;
use crate::wire::header::{IO_ATTR_LEN, IoAttr};

/// Reads bounded by this size are emitted as one reply chunk; larger reads
/// are split across several, each carrying `MORE` until the last
/// (spec §4.E "Read").
pub const MAX_READ_TRANS_SIZE: usize = 64 * 1024;

/// One chunk of a (possibly multi-chunk) read reply.
pub struct ReadChunk {
    /// The `io_attr` describing this chunk's offset and size.
    pub io: IoAttr,
    /// The chunk's data.
    pub data: Vec<u8>,
    /// Whether more chunks follow.
    pub more: bool,
}

/// Write `data` to the object named by `io.id` at `io.offset` (or in append
/// mode if `io.flags` carries `APPEND`), then append a history record if
/// `io.flags` carries `UPDATE` (spec §4.E "Write").
///
/// # Errors
/// Returns [`NodeError::Proto`] if `data.len()` does not match `io.size`, or
/// [`NodeError::Io`] on any filesystem failure. A partial write is not
/// rolled back, matching the source ("write is not transactional").
pub fn write_object(root: &StorageRoot, io: &IoAttr, data: &[u8]) -> Result<(), NodeError> {
    if data.len() as u64 != io.size {
        return Err(NodeError::Proto);
    }
    let relative = io.id.relative_path();
    root.ensure_shard_dir(&relative)?;

    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true);
    if io.flags.is_append() {
        opts.append(true);
    }
    let mut file = root.dir().open_with(&relative, &opts)?;
    if !io.flags.is_append() {
        file.seek(SeekFrom::Start(io.offset))?;
    }
    file.write_all(data)?;

    debug!(id = %io.id, offset = io.offset, size = io.size, "wrote object");

    if io.flags.is_update() {
        append_history(root, io)?;
    }
    Ok(())
}

/// Append a copy of `io` to the object's history log (spec §4.E "History
/// log").
///
/// # Errors
/// Returns [`NodeError::Io`] if the log cannot be opened or written.
fn append_history(root: &StorageRoot, io: &IoAttr) -> Result<(), NodeError> {
    let history_path = io.id.history_path();
    root.ensure_shard_dir(&history_path)?;
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).append(true);
    let mut file = root.dir().open_with(&history_path, &opts)?;
    file.write_all(&io.to_bytes())?;
    info!(id = %io.id, "appended history record");
    Ok(())
}

/// Read the object named by `io.id`, splitting it into reply chunks of at
/// most [`MAX_READ_TRANS_SIZE`] bytes in ascending-offset order
/// (spec §4.E "Read").
///
/// `io.size == 0` is replaced with the current file size (matching the
/// source's `fstat`-on-zero-size convention).
///
/// # Errors
/// Returns [`NodeError::NotFound`] if the object does not exist, or
/// [`NodeError::Io`] on any other filesystem failure.
pub fn read_object(root: &StorageRoot, io: &IoAttr) -> Result<Vec<ReadChunk>, NodeError> {
    let relative = io.id.relative_path();
    let mut opts = OpenOptions::new();
    opts.read(true);
    let mut file = root.dir().open_with(&relative, &opts).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            NodeError::NotFound
        } else {
            NodeError::Io(e)
        }
    })?;

    let file_len = file.metadata()?.len();
    let total = if io.size == 0 { file_len.saturating_sub(io.offset) } else { io.size };

    file.seek(SeekFrom::Start(io.offset))?;

    let mut chunks = Vec::new();
    let mut remaining = total;
    let mut offset = io.offset;
    while remaining > 0 || chunks.is_empty() {
        let chunk_len = remaining.min(MAX_READ_TRANS_SIZE as u64);
        let mut buf = vec![0u8; usize::try_from(chunk_len).unwrap_or(0)];
        if !buf.is_empty() {
            file.read_exact(&mut buf)?;
        }
        remaining -= chunk_len;
        let more = remaining > 0;
        chunks.push(ReadChunk {
            io: IoAttr { id: io.id, offset, size: chunk_len, flags: IoFlags::empty() },
            data: buf,
            more,
        });
        offset += chunk_len;
        if chunk_len == 0 {
            break;
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    use super::*;

    fn root() -> (tempfile::TempDir, StorageRoot) {
        let tmp = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let root = StorageRoot::open(&path).unwrap();
        (tmp, root)
    }

    #[test]
    fn write_then_read_identity() {
        let (_tmp, root) = root();
        let id = Oid::from_slice(&[1, 2, 3, 4]);
        let io = IoAttr { id, offset: 0, size: 5, flags: IoFlags::empty() };
        write_object(&root, &io, b"hello").unwrap();

        let read_io = IoAttr { id, offset: 0, size: 0, flags: IoFlags::empty() };
        let chunks = read_object(&root, &read_io).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data, b"hello");
        assert!(!chunks[0].more);
    }

    #[test]
    fn large_read_splits_into_multiple_chunks() {
        let (_tmp, root) = root();
        let id = Oid::from_slice(&[9]);
        let size = MAX_READ_TRANS_SIZE as u64 + 10;
        let data = vec![0x42u8; size as usize];
        let io = IoAttr { id, offset: 0, size, flags: IoFlags::empty() };
        write_object(&root, &io, &data).unwrap();

        let read_io = IoAttr { id, offset: 0, size: 0, flags: IoFlags::empty() };
        let chunks = read_object(&root, &read_io).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].more);
        assert!(!chunks[1].more);
        assert_eq!(chunks[0].io.offset, 0);
        assert_eq!(chunks[1].io.offset, MAX_READ_TRANS_SIZE as u64);
        assert_eq!(chunks[0].data.len() + chunks[1].data.len(), size as usize);
    }

    #[test]
    fn read_missing_object_is_not_found() {
        let (_tmp, root) = root();
        let io = IoAttr { id: Oid::from_slice(&[5]), offset: 0, size: 0, flags: IoFlags::empty() };
        let err = read_object(&root, &io).unwrap_err();
        assert!(matches!(err, NodeError::NotFound));
    }

    #[test]
    fn update_flag_appends_history_record() {
        let (_tmp, root) = root();
        let id = Oid::from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        let io = IoAttr { id, offset: 0, size: 3, flags: IoFlags::UPDATE };
        write_object(&root, &io, b"abc").unwrap();

        let history_path = id.history_path();
        let mut opts = OpenOptions::new();
        opts.read(true);
        let mut file = root.dir().open_with(&history_path, &opts).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), IO_ATTR_LEN);
    }

    #[test]
    fn history_log_is_monotonic_across_writes() {
        let (_tmp, root) = root();
        let id = Oid::from_slice(&[0x11]);
        for offset in [0u64, 3, 6] {
            let io = IoAttr { id, offset, size: 3, flags: IoFlags::UPDATE };
            write_object(&root, &io, b"xyz").unwrap();
        }

        let history_path = id.history_path();
        let mut opts = OpenOptions::new();
        opts.read(true);
        let mut file = root.dir().open_with(&history_path, &opts).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), IO_ATTR_LEN * 3);

        for (i, expected_offset) in [0u64, 3, 6].into_iter().enumerate() {
            let start = i * IO_ATTR_LEN;
            let bytes: [u8; IO_ATTR_LEN] =
                contents[start..start + IO_ATTR_LEN].try_into().unwrap();
            let parsed = IoAttr::from_bytes(&bytes);
            assert_eq!(parsed.offset, expected_offset);
        }
    }

    #[test]
    fn append_semantics_ignore_supplied_offset() {
        let (_tmp, root) = root();
        let id = Oid::from_slice(&[0x22]);
        let first = IoAttr { id, offset: 1000, size: 1, flags: IoFlags::APPEND };
        write_object(&root, &first, b"a").unwrap();
        let second = IoAttr { id, offset: 0, size: 2, flags: IoFlags::APPEND };
        write_object(&root, &second, b"bb").unwrap();

        let read_io = IoAttr { id, offset: 0, size: 0, flags: IoFlags::empty() };
        let chunks = read_object(&root, &read_io).unwrap();
        let total: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(total, b"abb");
    }
}
