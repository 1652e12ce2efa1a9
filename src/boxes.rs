use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Smallest legal box: 4-byte size + 4-byte type.
pub const MIN_HEADER_SIZE: u64 = 8;
/// Header with the 64-bit extended size field.
pub const LARGE_HEADER_SIZE: u64 = 16;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Parse a four-character name. Each character maps to one byte using
    /// Latin-1, so `"©nam"` becomes `[0xA9, b'n', b'a', b'm']`.
    pub fn from_name(s: &str) -> Option<Self> {
        let mut out = [0u8; 4];
        let mut n = 0;
        for c in s.chars() {
            if n == 4 {
                return None;
            }
            out[n] = u8::try_from(u32::from(c)).ok()?;
            n += 1;
        }
        if n == 4 { Some(FourCC(out)) } else { None }
    }

    /// Inverse of [`FourCC::from_name`]; lossless for every byte value.
    pub fn to_name(&self) -> String {
        self.0.iter().map(|&b| b as char).collect()
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| match c {
                32..=126 => c as char,
                0xA9 => '©',
                _ => '.',
            })
            .collect()
    }
}
impl fmt::Debug for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }
impl fmt::Display for FourCC { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str_lossy()) } }

impl Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub typ: FourCC,
    pub start: u64,       // file offset of header start
    pub size: u64,        // total size including header, resolved for size==0 boxes
    pub header_size: u64, // 8 or 16
}

impl BoxHeader {
    pub fn payload_offset(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn payload_size(&self) -> u64 {
        self.size - self.header_size
    }

    /// Offset just past the box. Saturates instead of wrapping.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }
}

/// Header length needed for a box carrying `payload_len` bytes.
pub fn header_len_for(payload_len: u64) -> u64 {
    if payload_len + MIN_HEADER_SIZE > u32::MAX as u64 {
        LARGE_HEADER_SIZE
    } else {
        MIN_HEADER_SIZE
    }
}

/// Append a box header for a box of `size` total bytes.
///
/// Sizes that do not fit 32 bits are written as the 16-byte extended form;
/// `size` must already include those 16 header bytes.
pub fn write_header(buf: &mut Vec<u8>, typ: FourCC, size: u64) {
    if size > u32::MAX as u64 {
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&typ.0);
        buf.extend_from_slice(&size.to_be_bytes());
    } else {
        buf.extend_from_slice(&(size as u32).to_be_bytes());
        buf.extend_from_slice(&typ.0);
    }
}

/// Wrap `payload` in a box of type `typ`.
pub fn write_box(buf: &mut Vec<u8>, typ: FourCC, payload: &[u8]) {
    let len = payload.len() as u64;
    write_header(buf, typ, header_len_for(len) + len);
    buf.extend_from_slice(payload);
}

/// Append a `free` box whose total size, header included, is `total_size`.
pub fn write_free_box(buf: &mut Vec<u8>, total_size: u64) -> Result<()> {
    if total_size < MIN_HEADER_SIZE {
        return Err(Error::InvalidArgument(format!(
            "free box of {} bytes is smaller than a box header",
            total_size
        )));
    }
    let header = header_len_for(total_size - MIN_HEADER_SIZE);
    write_header(buf, FourCC(*b"free"), total_size);
    buf.resize(buf.len() + (total_size - header) as usize, 0);
    Ok(())
}
