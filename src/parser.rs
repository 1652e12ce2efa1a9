use crate::boxes::{BoxHeader, FourCC, LARGE_HEADER_SIZE, MIN_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::known_boxes::KnownBox;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Read one box header at the current stream position.
///
/// `file_size` resolves boxes whose declared size is 0 ("extends to end of
/// file"). The stream is left positioned at the start of the payload.
pub fn read_box_header<R: Read + Seek>(r: &mut R, file_size: u64) -> Result<BoxHeader> {
    let start = r.stream_position()?;
    let size32 = r.read_u32::<BigEndian>().map_err(Error::from_read)?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ).map_err(Error::from_read)?;

    let (size, header_size) = match size32 {
        1 => {
            let size = r.read_u64::<BigEndian>().map_err(Error::from_read)?;
            (size, LARGE_HEADER_SIZE)
        }
        0 => (file_size.saturating_sub(start), MIN_HEADER_SIZE),
        n => (n as u64, MIN_HEADER_SIZE),
    };

    if size < header_size {
        return Err(Error::Truncated);
    }
    // a declared size past the end of the file cannot be followed
    if size > file_size.saturating_sub(start) {
        return Err(Error::Truncated);
    }

    Ok(BoxHeader { typ: FourCC(typ), start, size, header_size })
}

/// Read the header of the box that starts at `offset`.
pub fn read_box_header_at<R: Read + Seek>(r: &mut R, offset: u64, file_size: u64) -> Result<BoxHeader> {
    r.seek(SeekFrom::Start(offset)).map_err(Error::Seek)?;
    read_box_header(r, file_size)
}

/// List the direct children of the region `[start, end)`.
///
/// Scanning stops at the region end. A child that is shorter than a box
/// header or runs past `end` makes the region corrupt.
pub fn parse_children<R: Read + Seek>(r: &mut R, start: u64, end: u64, file_size: u64) -> Result<Vec<BoxHeader>> {
    let mut kids = Vec::new();
    let mut pos = start;
    while pos + MIN_HEADER_SIZE <= end {
        let h = read_child(r, pos, end, file_size)?;
        pos = h.end();
        kids.push(h);
    }
    Ok(kids)
}

/// Find the first direct child of kind `want` in the region `[start, end)`.
/// Unlisted types are matched with `KnownBox::Unknown(fourcc)`.
pub fn find_child<R: Read + Seek>(
    r: &mut R,
    start: u64,
    end: u64,
    file_size: u64,
    want: KnownBox,
) -> Result<Option<BoxHeader>> {
    let mut pos = start;
    while pos + MIN_HEADER_SIZE <= end {
        let h = read_child(r, pos, end, file_size)?;
        if KnownBox::from(h.typ) == want {
            return Ok(Some(h));
        }
        pos = h.end();
    }
    Ok(None)
}

fn read_child<R: Read + Seek>(r: &mut R, pos: u64, end: u64, file_size: u64) -> Result<BoxHeader> {
    let h = match read_box_header_at(r, pos, file_size) {
        Ok(h) => h,
        Err(Error::Truncated) => {
            return Err(Error::Corrupt(format!("short box header at offset {}", pos)));
        }
        Err(e) => return Err(e),
    };
    if h.end() > end {
        return Err(Error::Corrupt(format!(
            "{} box at offset {} overruns its parent ({} > {})",
            h.typ,
            pos,
            h.end(),
            end
        )));
    }
    Ok(h)
}
