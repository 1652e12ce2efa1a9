//! Structure locator: validates the container brand and finds the boxes the
//! tag reader and writer need (`moov > udta > meta > ilst` plus any `free`
//! space directly after `ilst`).

use crate::boxes::{BoxHeader, FourCC, MIN_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::known_boxes::{KnownBox, is_known_compatible_brand, is_known_major_brand};
use crate::parser::{find_child, read_box_header_at};
use serde::Serialize;
use std::io::{Read, Seek};

/// Position of one box in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoxSpan {
    /// Absolute offset of the box header
    pub offset: u64,
    /// Total size including header
    pub size: u64,
}

impl BoxSpan {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

impl From<&BoxHeader> for BoxSpan {
    fn from(h: &BoxHeader) -> Self {
        BoxSpan { offset: h.start, size: h.size }
    }
}

/// Result of one structural scan.
///
/// `ilst` implies `meta`, and `meta` implies `udta`. The scan is repeated
/// after every write because offsets may move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStructure {
    pub file_size: u64,
    pub ftyp: Option<BoxSpan>,
    pub moov: BoxSpan,
    pub mdat: Option<BoxSpan>,
    pub udta: Option<BoxSpan>,
    pub meta: Option<BoxSpan>,
    /// Whether `meta` already holds a handler reference
    pub meta_has_hdlr: bool,
    pub ilst: Option<BoxSpan>,
    /// `free`/`skip` box starting exactly where `ilst` ends, inside `meta`
    pub free_after_ilst: Option<BoxSpan>,
}

impl FileStructure {
    pub fn has_udta(&self) -> bool {
        self.udta.is_some()
    }

    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    pub fn has_ilst(&self) -> bool {
        self.ilst.is_some()
    }

    /// Bytes an in-place `ilst` rewrite may occupy: the current `ilst` plus
    /// the trailing free box, if any.
    pub fn in_place_budget(&self) -> Option<u64> {
        let ilst = self.ilst?;
        Some(ilst.size + self.free_after_ilst.map_or(0, |f| f.size))
    }
}

/// Check that the stream starts with an `ftyp` box naming a recognized brand.
///
/// Every failure, I/O included, is reported as [`Error::NotMp4`].
pub fn validate_container<R: Read + Seek>(r: &mut R, file_size: u64) -> Result<()> {
    let ftyp = read_box_header_at(r, 0, file_size).map_err(|_| Error::NotMp4)?;
    if KnownBox::from(ftyp.typ) != KnownBox::Ftyp || ftyp.payload_size() < 4 {
        return Err(Error::NotMp4);
    }

    let mut brand = [0u8; 4];
    r.read_exact(&mut brand).map_err(|_| Error::NotMp4)?;
    if is_known_major_brand(FourCC(brand)) {
        return Ok(());
    }

    // major brand (4) + minor version (4), then the compatible list
    if ftyp.payload_size() >= 12 {
        let end = ftyp.end().min(file_size);
        let mut pos = ftyp.payload_offset() + 8;
        r.seek(std::io::SeekFrom::Start(pos)).map_err(|_| Error::NotMp4)?;
        while pos + 4 <= end {
            if r.read_exact(&mut brand).is_err() {
                break;
            }
            if is_known_compatible_brand(FourCC(brand)) {
                return Ok(());
            }
            pos += 4;
        }
    }

    Err(Error::NotMp4)
}

/// Scan the file once and record where the metadata boxes live.
pub fn parse_structure<R: Read + Seek>(r: &mut R, file_size: u64) -> Result<FileStructure> {
    if file_size < MIN_HEADER_SIZE {
        return Err(Error::Truncated);
    }

    let mut info = FileStructure { file_size, ..Default::default() };
    let mut moov = None;

    let mut pos = 0;
    while pos + MIN_HEADER_SIZE <= file_size {
        let h = match read_box_header_at(r, pos, file_size) {
            Ok(h) => h,
            Err(Error::Truncated) => {
                tracing::warn!(offset = pos, "unreadable top-level box, ignoring rest of file");
                break;
            }
            Err(e) => return Err(e),
        };

        match KnownBox::from(h.typ) {
            KnownBox::Ftyp if info.ftyp.is_none() => info.ftyp = Some((&h).into()),
            KnownBox::Moov if moov.is_none() => moov = Some(h),
            KnownBox::Mdat if info.mdat.is_none() => info.mdat = Some((&h).into()),
            _ => {}
        }
        pos = h.end();
    }

    let moov = moov.ok_or(Error::NotMp4)?;
    info.moov = (&moov).into();
    let moov_end = moov.end().min(file_size);

    let Some(udta) = find_tolerant(r, moov.payload_offset(), moov_end, file_size, KnownBox::Udta)? else {
        tracing::debug!(moov = ?info.moov, "no udta in moov");
        return Ok(info);
    };
    info.udta = Some((&udta).into());

    let Some(meta) = find_tolerant(r, udta.payload_offset(), udta.end(), file_size, KnownBox::Meta)? else {
        tracing::debug!(udta = ?info.udta, "no meta in udta");
        return Ok(info);
    };
    info.meta = Some((&meta).into());

    // meta is a full box: skip version + flags
    let content_start = (meta.payload_offset() + 4).min(meta.end());
    info.meta_has_hdlr = find_tolerant(r, content_start, meta.end(), file_size, KnownBox::Hdlr)?.is_some();

    if let Some(ilst) = find_tolerant(r, content_start, meta.end(), file_size, KnownBox::Ilst)? {
        info.ilst = Some((&ilst).into());
        info.free_after_ilst = free_after(r, ilst.end(), meta.end(), file_size)?;
    }

    // Free space after udta is not contiguous with ilst, so it is never
    // offered to the in-place writer.

    tracing::debug!(
        ilst = ?info.ilst,
        free_after_ilst = ?info.free_after_ilst,
        has_hdlr = info.meta_has_hdlr,
        "parsed metadata structure"
    );
    Ok(info)
}

/// `find_child`, but a malformed region counts as "not found".
fn find_tolerant<R: Read + Seek>(
    r: &mut R,
    start: u64,
    end: u64,
    file_size: u64,
    want: KnownBox,
) -> Result<Option<BoxHeader>> {
    match find_child(r, start, end, file_size, want) {
        Ok(found) => Ok(found),
        Err(Error::Corrupt(msg)) => {
            tracing::warn!("stopped looking for {}: {}", want.full_name(), msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn free_after<R: Read + Seek>(r: &mut R, offset: u64, container_end: u64, file_size: u64) -> Result<Option<BoxSpan>> {
    if offset + MIN_HEADER_SIZE > container_end {
        return Ok(None);
    }
    let h = match read_box_header_at(r, offset, file_size) {
        Ok(h) => h,
        Err(Error::Truncated) => return Ok(None),
        Err(e) => return Err(e),
    };
    if KnownBox::from(h.typ).is_free_space() && h.end() <= container_end {
        Ok(Some((&h).into()))
    } else {
        Ok(None)
    }
}
