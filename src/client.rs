//! Client entry points: `write_file`, `read_file`, `update_file` (spec §4.H).
//!
//! These drive the transform registry's dual-convention loop directly
//! against the local storage engine rather than over the wire, mirroring
//! the source's `dnet_write_file`/`dnet_read_file`/`dnet_update_file`
//! (`examples/original_source/library/dnet.c:799-1186`). `write_file` and
//! `update_file` cycle through every registered transform, writing a
//! redundant copy under each one's id, and stop only when the registry
//! reports [`TransformOutcome::Exhausted`] (`dnet.c:826-859`, `:923-956`).
//! `read_file` tries the next transform whenever a read under the current
//! one fails, stopping at the first that resolves (`dnet.c:1076-1104`).

use std::fs;

use camino::Utf8Path;

use crate::error::NodeError;
use crate::flags::IoFlags;
use crate::oid::Oid;
use crate::storage::{self, StorageRoot};
use crate::transform::{TransformOutcome, TransformRegistry};
use crate::wire::header::IoAttr;

/// Derive the content-id for `path`'s contents by driving the transform
/// registry to its first success (spec §4.B, §4.H).
///
/// # Errors
/// Returns [`NodeError::NotFound`] if every registered transform failed or
/// none are registered, or [`NodeError::Io`] if the file cannot be read.
pub fn content_id(registry: &mut TransformRegistry, path: &Utf8Path) -> Result<Oid, NodeError> {
    match registry.apply_file(path, 0, 0, 0)? {
        TransformOutcome::Ok { id, .. } => Ok(id),
        TransformOutcome::Exhausted => Err(NodeError::NotFound),
    }
}

/// Derive the name-id for `path` itself (its path bytes, not its contents),
/// used to address the `WRITE` that records the path→content-id binding
/// (spec §4.H "name-id").
///
/// # Errors
/// Returns [`NodeError::NotFound`] if every registered transform failed.
pub fn name_id(registry: &mut TransformRegistry, path: &Utf8Path) -> Result<Oid, NodeError> {
    match registry.apply(path.as_str().as_bytes(), 0) {
        TransformOutcome::Ok { id, .. } => Ok(id),
        TransformOutcome::Exhausted => Err(NodeError::NotFound),
    }
}

/// Write `path`'s contents into the local store under both its name-id and
/// its content-id, once per registered transform (spec §4.H `write_file`).
///
/// Each transform that yields an id drives its own pair of writes before the
/// loop advances to the next one, matching `dnet_write_file`'s redundant
/// per-transform copies rather than stopping at the first success.
///
/// # Errors
/// Returns [`NodeError::Io`] on a filesystem failure, or
/// [`NodeError::NotFound`] if no transform produced an id.
pub fn write_file(
    registry: &mut TransformRegistry,
    root: &StorageRoot,
    path: &Utf8Path,
) -> Result<Oid, NodeError> {
    let data = fs::read(path)?;
    #[expect(clippy::cast_possible_truncation, reason = "object sizes are bounded by available memory")]
    let size = data.len() as u64;

    let mut cursor = 0;
    let mut first_content = None;
    loop {
        let (name, next_cursor) = match registry.apply(path.as_str().as_bytes(), cursor) {
            TransformOutcome::Ok { id, next_cursor } => (id, next_cursor),
            TransformOutcome::Exhausted => break,
        };
        let content = match registry.apply_file(path, 0, 0, cursor)? {
            TransformOutcome::Ok { id, .. } => id,
            TransformOutcome::Exhausted => break,
        };

        let name_io = IoAttr { id: name, offset: 0, size, flags: IoFlags::empty() };
        storage::write_object(root, &name_io, &data)?;

        let content_io = IoAttr { id: content, offset: 0, size, flags: IoFlags::empty() };
        storage::write_object(root, &content_io, &data)?;

        first_content.get_or_insert(content);
        cursor = next_cursor;
    }

    first_content.ok_or(NodeError::NotFound)
}

/// Read the object addressed by `path`'s name-id into a local file at
/// `dest`, writing each chunk at its reported offset as it arrives rather
/// than coalescing first (spec §4.H `read_file`).
///
/// If the name-id produced by one transform doesn't resolve to a stored
/// object, the next transform is tried in turn, matching `dnet_read_file`'s
/// retry-on-failure loop.
///
/// # Errors
/// Returns [`NodeError::NotFound`] if no transform's name-id resolves to a
/// stored object, or [`NodeError::Io`] on a filesystem failure.
pub fn read_file(
    registry: &mut TransformRegistry,
    root: &StorageRoot,
    path: &Utf8Path,
    dest: &Utf8Path,
    offset: u64,
    size: u64,
) -> Result<(), NodeError> {
    use std::io::{Seek, SeekFrom, Write};

    let mut cursor = 0;
    loop {
        let (id, next_cursor) = match registry.apply(path.as_str().as_bytes(), cursor) {
            TransformOutcome::Ok { id, next_cursor } => (id, next_cursor),
            TransformOutcome::Exhausted => return Err(NodeError::NotFound),
        };

        let io = IoAttr { id, offset, size, flags: IoFlags::empty() };
        let chunks = match storage::read_object(root, &io) {
            Ok(chunks) => chunks,
            Err(_) => {
                cursor = next_cursor;
                continue;
            }
        };

        let mut out = fs::OpenOptions::new().create(true).write(true).open(dest)?;
        for chunk in chunks {
            out.seek(SeekFrom::Start(chunk.io.offset))?;
            out.write_all(&chunk.data)?;
        }
        return Ok(());
    }
}

/// Write `data` under both `path`'s name-id and its content-id, once per
/// registered transform (spec §4.H `update_file`).
///
/// Resolves the source's ambiguous double-write (spec §9 "Open questions",
/// `update_file`): the second write's `io_attr.id` targets the content-id,
/// matching `dnet_update_file`'s overwrite of `io.id` with the content hash
/// before its second `dnet_write_object` call
/// (`examples/original_source/library/dnet.c:951`). Both writes use the
/// same offset, size, and data. As in `write_file`, every transform that
/// yields an id drives its own pair of writes rather than stopping at the
/// first success (`dnet.c:923-956`).
///
/// # Errors
/// Returns [`NodeError::Io`] on a filesystem failure, or
/// [`NodeError::NotFound`] if no transform produced a content-id.
pub fn update_file(
    registry: &mut TransformRegistry,
    root: &StorageRoot,
    path: &Utf8Path,
    offset: u64,
    data: &[u8],
    append: bool,
) -> Result<Oid, NodeError> {
    #[expect(clippy::cast_possible_truncation, reason = "object sizes are bounded by available memory")]
    let size = data.len() as u64;
    let flags = if append { IoFlags::UPDATE | IoFlags::APPEND } else { IoFlags::UPDATE };

    let mut cursor = 0;
    let mut first_content = None;
    loop {
        let (name, next_cursor) = match registry.apply(path.as_str().as_bytes(), cursor) {
            TransformOutcome::Ok { id, next_cursor } => (id, next_cursor),
            TransformOutcome::Exhausted => break,
        };
        let content = match registry.apply(data, cursor) {
            TransformOutcome::Ok { id, .. } => id,
            TransformOutcome::Exhausted => break,
        };

        let name_io = IoAttr { id: name, offset, size, flags };
        storage::write_object(root, &name_io, data)?;

        let content_io = IoAttr { id: content, offset, size, flags };
        storage::write_object(root, &content_io, data)?;

        first_content.get_or_insert(content);
        cursor = next_cursor;
    }

    first_content.ok_or(NodeError::NotFound)
}
