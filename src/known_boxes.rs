use crate::boxes::FourCC;

/// Typed view over the boxes the tagging engine navigates or rewrites.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)` and is
/// carried through rewrites byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Free,
    Skip,

    // moov children
    Trak,
    Udta,

    // trak children down to the chunk offset tables
    Mdia,
    Minf,
    Stbl,
    Stco,
    Co64,

    // udta > meta > ilst
    Meta,
    Hdlr,
    Ilst,
    Data,

    // Anything else
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,

            b"trak" => KnownBox::Trak,
            b"udta" => KnownBox::Udta,

            b"mdia" => KnownBox::Mdia,
            b"minf" => KnownBox::Minf,
            b"stbl" => KnownBox::Stbl,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,

            b"meta" => KnownBox::Meta,
            b"hdlr" => KnownBox::Hdlr,
            b"ilst" => KnownBox::Ilst,
            b"data" => KnownBox::Data,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Boxes on the path from `moov` to the chunk offset tables.
    pub fn leads_to_chunk_offsets(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov | KnownBox::Trak | KnownBox::Mdia | KnownBox::Minf | KnownBox::Stbl
        )
    }

    /// Padding boxes whose space may be reclaimed.
    pub fn is_free_space(&self) -> bool {
        matches!(self, KnownBox::Free | KnownBox::Skip)
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Free => "Free Space Box",
            KnownBox::Skip => "Skip Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Stco => "Chunk Offset Box",
            KnownBox::Co64 => "64-bit Chunk Offset Box",
            KnownBox::Meta => "Meta Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Ilst => "Item List Box",
            KnownBox::Data => "Data Box",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}

/// Major brands accepted by the container check: ISO base media, iTunes
/// audio/video, QuickTime, Flash video, DASH and the 3GPP family.
const MAJOR_BRANDS: &[&[u8; 4]] = &[
    b"isom", b"iso2", b"iso5", b"iso6", b"mp41", b"mp42",
    b"M4A ", b"M4B ", b"M4P ", b"M4V ", b"M4VH",
    b"avc1", b"f4v ", b"qt  ", b"MSNV", b"dash",
    b"3gp4", b"3gp5", b"3gp6", b"3g2a",
];

/// Brands accepted when they appear in the compatible-brand list.
const COMPATIBLE_BRANDS: &[&[u8; 4]] = &[
    b"isom", b"mp41", b"mp42", b"M4A ", b"M4B ", b"M4V ", b"avc1",
];

pub fn is_known_major_brand(brand: FourCC) -> bool {
    MAJOR_BRANDS.iter().any(|b| **b == brand.0)
}

pub fn is_known_compatible_brand(brand: FourCC) -> bool {
    COMPATIBLE_BRANDS.iter().any(|b| **b == brand.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_free_space() {
        assert!(KnownBox::from(FourCC(*b"free")).is_free_space());
        assert!(KnownBox::from(FourCC(*b"skip")).is_free_space());
        assert!(!KnownBox::from(FourCC(*b"mdat")).is_free_space());
    }

    #[test]
    fn chunk_offset_path() {
        for cc in [b"moov", b"trak", b"mdia", b"minf", b"stbl"] {
            assert!(KnownBox::from(FourCC(*cc)).leads_to_chunk_offsets());
        }
        assert!(!KnownBox::from(FourCC(*b"udta")).leads_to_chunk_offsets());
    }

    #[test]
    fn brand_lists() {
        assert!(is_known_major_brand(FourCC(*b"M4A ")));
        assert!(is_known_major_brand(FourCC(*b"3gp6")));
        assert!(!is_known_major_brand(FourCC(*b"heic")));
        // qt is only honoured as the major brand
        assert!(!is_known_compatible_brand(FourCC(*b"qt  ")));
        assert!(is_known_compatible_brand(FourCC(*b"mp42")));
    }

    #[test]
    fn unknown_keeps_fourcc() {
        let kb = KnownBox::from(FourCC(*b"abcd"));
        assert_eq!(kb, KnownBox::Unknown(FourCC(*b"abcd")));
        assert_eq!(kb.full_name(), "Unknown Box");
    }
}
