//! Write orchestration: patch `ilst` in place when the new list fits in the
//! space it already occupies, otherwise rebuild `moov` into a temporary file
//! and rename it over the original.

use crate::boxes::{FourCC, MIN_HEADER_SIZE, header_len_for, write_free_box, write_header};
use crate::error::{Error, Result};
use crate::ilst::{build_ilst, build_udta};
use crate::io::FileHandle;
use crate::known_boxes::KnownBox;
use crate::parser::{parse_children, read_box_header_at};
use crate::structure::{FileStructure, parse_structure};
use crate::tags::TagCollection;
use crate::util::{copy_range, read_slice};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

/// How the last successful write reached the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteStrategy {
    /// `ilst` was overwritten inside its existing footprint
    InPlace,
    /// The file was rebuilt and atomically replaced
    Rewrite,
}

/// Tunables for the write path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Size of the `free` box reserved after `ilst` when a rewrite creates
    /// new metadata. 0 disables padding.
    pub padding: u32,
}

/// Write `coll` to the file behind `fh` and return the strategy used plus
/// the structure of the file as it now stands.
pub fn write_tags(
    fh: &mut FileHandle,
    info: &FileStructure,
    coll: &TagCollection,
    options: WriteOptions,
) -> Result<(WriteStrategy, FileStructure)> {
    if !fh.is_writable() {
        return Err(Error::ReadOnly);
    }

    let strategy = match write_in_place(fh, info, coll) {
        Ok(()) => WriteStrategy::InPlace,
        Err(Error::NoSpace) => {
            tracing::debug!("ilst does not fit in place, rewriting file");
            rewrite(fh, info, coll, options)?;
            WriteStrategy::Rewrite
        }
        Err(e) => return Err(e),
    };

    let size = fh.size()?;
    let rescanned = parse_structure(fh, size)?;
    tracing::info!(path = %fh.path().display(), ?strategy, "tags written");
    Ok((strategy, rescanned))
}

/// Overwrite `ilst` (and any `free` box right after it) with the new list.
///
/// Fails with [`Error::NoSpace`] when there is no `ilst` or the new one is
/// larger than the space available. Nothing is written in that case.
pub fn write_in_place(fh: &mut FileHandle, info: &FileStructure, coll: &TagCollection) -> Result<()> {
    let (Some(ilst), Some(budget)) = (info.ilst, info.in_place_budget()) else {
        return Err(Error::NoSpace);
    };

    let mut buf = build_ilst(coll);
    let used = buf.len() as u64;
    if used > budget {
        tracing::debug!(needed = used, budget, "in-place budget exceeded");
        return Err(Error::NoSpace);
    }

    let leftover = budget - used;
    if leftover >= MIN_HEADER_SIZE {
        write_free_box(&mut buf, leftover)?;
    } else {
        // too small for a box header; parsers stop at the parent end
        buf.resize(buf.len() + leftover as usize, 0);
    }

    fh.write_all_at(ilst.offset, &buf)?;
    fh.sync()?;
    tracing::debug!(offset = ilst.offset, ilst_size = used, free = leftover, "patched ilst in place");
    Ok(())
}

/// Rebuild the file with a fresh `udta` and atomically replace the original.
///
/// Top-level boxes other than `moov` are streamed through unchanged. `moov`
/// keeps every child except `udta`, gains the new `udta`, and has its chunk
/// offsets shifted when media data follows it. On success `fh` is reopened
/// on the new file; on failure the original file is untouched.
pub fn rewrite(fh: &mut FileHandle, info: &FileStructure, coll: &TagCollection, options: WriteOptions) -> Result<()> {
    let file_size = fh.size()?;
    let moov = read_box_header_at(fh, info.moov.offset, file_size)?;
    let moov_end = moov.end().min(file_size);

    let mut body = Vec::new();
    for child in parse_children(fh, moov.payload_offset(), moov_end, file_size)? {
        if KnownBox::from(child.typ) == KnownBox::Udta {
            continue;
        }
        body.extend(read_slice(fh, child.start, child.size)?);
    }
    body.extend(build_udta(coll, options.padding)?);

    let new_size = header_len_for(body.len() as u64) + body.len() as u64;
    let delta = new_size as i64 - (moov_end - moov.start) as i64;
    if delta != 0 {
        shift_chunk_offsets(&mut body, moov_end, delta)?;
    }

    let path = fh.path().to_path_buf();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut out = BufWriter::new(temp.as_file_mut());
        let mut pos = 0;
        while pos + MIN_HEADER_SIZE <= file_size {
            let h = match read_box_header_at(fh, pos, file_size) {
                Ok(h) => h,
                Err(Error::Truncated) => break,
                Err(e) => return Err(e),
            };
            let end = h.end().min(file_size);
            if h.start == moov.start {
                let mut header = Vec::with_capacity(16);
                write_header(&mut header, FourCC(*b"moov"), new_size);
                out.write_all(&header).map_err(Error::WriteFailed)?;
                out.write_all(&body).map_err(Error::WriteFailed)?;
            } else {
                copy_range(fh, &mut out, h.start, end - h.start)?;
            }
            pos = end;
        }
        // anything after the last whole box is carried over as-is
        if pos < file_size {
            copy_range(fh, &mut out, pos, file_size - pos)?;
        }
        out.flush().map_err(Error::WriteFailed)?;
    }

    let perms = std::fs::metadata(&path)?.permissions();
    std::fs::set_permissions(temp.path(), perms)?;
    temp.as_file().sync_all().map_err(Error::WriteFailed)?;

    if let Err(e) = temp.persist(&path) {
        // dropping the returned file removes the temporary
        tracing::warn!(path = %path.display(), error = %e.error, "rename over original failed");
        return Err(Error::Rename(e.error));
    }

    *fh = FileHandle::reopen(&path, fh.is_writable())?;
    tracing::debug!(old_moov = moov.size, new_moov = new_size, "rewrote file");
    Ok(())
}

/// Shift every `stco`/`co64` entry pointing at or past `threshold` by
/// `delta` bytes. `buf` holds the children of a `moov` box.
fn shift_chunk_offsets(buf: &mut [u8], threshold: u64, delta: i64) -> Result<()> {
    let len = buf.len() as u64;
    let children = parse_children(&mut Cursor::new(&*buf), 0, len, len)?;

    for child in children {
        let start = child.payload_offset() as usize;
        let end = child.end() as usize;
        match KnownBox::from(child.typ) {
            k if k.leads_to_chunk_offsets() => {
                shift_chunk_offsets(&mut buf[start..end], threshold, delta)?;
            }
            KnownBox::Stco => shift_table(&mut buf[start..end], 4, threshold, delta)?,
            KnownBox::Co64 => shift_table(&mut buf[start..end], 8, threshold, delta)?,
            _ => {}
        }
    }
    Ok(())
}

/// `payload` is a chunk offset full box: version/flags, entry count, then
/// `width`-byte offsets.
fn shift_table(payload: &mut [u8], width: usize, threshold: u64, delta: i64) -> Result<()> {
    if payload.len() < 8 {
        return Err(Error::Corrupt("chunk offset table shorter than its header".into()));
    }
    let declared = BigEndian::read_u32(&payload[4..8]) as usize;
    let available = (payload.len() - 8) / width;
    if declared > available {
        tracing::warn!(declared, available, "chunk offset table truncated, shifting present entries");
    }

    for entry in payload[8..].chunks_exact_mut(width).take(declared.min(available)) {
        let old = if width == 4 { BigEndian::read_u32(entry) as u64 } else { BigEndian::read_u64(entry) };
        if old < threshold {
            continue;
        }
        let new = old
            .checked_add_signed(delta)
            .ok_or_else(|| Error::Corrupt(format!("chunk offset {} cannot move by {}", old, delta)))?;
        if width == 4 {
            let new = u32::try_from(new)
                .map_err(|_| Error::Unsupported("chunk offset no longer fits in stco".into()))?;
            BigEndian::write_u32(entry, new);
        } else {
            BigEndian::write_u64(entry, new);
        }
    }
    Ok(())
}
