use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};

pub fn read_slice<R: Read + Seek>(r: &mut R, offset: u64, len: u64) -> Result<Vec<u8>> {
    r.seek(SeekFrom::Start(offset)).map_err(Error::Seek)?;
    let mut v = vec![0u8; len as usize];
    r.read_exact(&mut v).map_err(Error::from_read)?;
    Ok(v)
}

/// Stream `len` bytes starting at `offset` from `r` into `w`.
pub fn copy_range<R: Read + Seek, W: Write>(r: &mut R, w: &mut W, offset: u64, len: u64) -> Result<()> {
    r.seek(SeekFrom::Start(offset)).map_err(Error::Seek)?;
    let copied = std::io::copy(&mut r.take(len), w).map_err(|e| match e.kind() {
        std::io::ErrorKind::WriteZero => Error::WriteFailed(e),
        _ => Error::Io(e),
    })?;
    if copied != len {
        return Err(Error::Truncated);
    }
    Ok(())
}

/// Hex + ASCII rows of at most `limit` bytes of `bytes`, 16 per row.
/// A final line counts whatever was left out.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..bytes.len().min(limit)];
    let mut out = String::new();
    for (row, chunk) in shown.chunks(16).enumerate() {
        let hex = chunk.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("  {:04x}  {:<47}  {}\n", row * 16, hex, ascii));
    }
    let hidden = bytes.len() - shown.len();
    if hidden > 0 {
        out.push_str(&format!("  ... {} more bytes\n", hidden));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn copy_range_copies_exact_span() {
        let mut src = Cursor::new((0u8..32).collect::<Vec<_>>());
        let mut dst = Vec::new();
        copy_range(&mut src, &mut dst, 4, 8).unwrap();
        assert_eq!(dst, (4u8..12).collect::<Vec<_>>());
    }

    #[test]
    fn copy_range_past_eof_is_truncated() {
        let mut src = Cursor::new(vec![0u8; 10]);
        let mut dst = Vec::new();
        assert!(matches!(copy_range(&mut src, &mut dst, 6, 8), Err(Error::Truncated)));
    }

    #[test]
    fn hex_preview_rows_and_ascii() {
        let dump = hex_preview(b"\x89PNG", 32);
        assert_eq!(dump, format!("  0000  {:<47}  .PNG\n", "89 50 4e 47"));
    }

    #[test]
    fn hex_preview_counts_hidden_bytes() {
        let data = vec![0u8; 40];
        let dump = hex_preview(&data, 20);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("  0010  00 00 00 00"));
        assert_eq!(lines[2], "  ... 20 more bytes");
        assert_eq!(hex_preview(&data, 0), "  ... 40 more bytes\n");
    }
}
