#![allow(dead_code)]

use std::path::PathBuf;

pub const MDAT_PAYLOAD: [u8; 64] = {
    let mut p = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        p[i] = (i as u8).wrapping_mul(37);
        i += 1;
    }
    p
};

pub fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// Item atom wrapping one `data` box.
pub fn item(typ: &[u8; 4], data_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = data_type.to_be_bytes().to_vec();
    data.extend_from_slice(&[0; 4]); // locale
    data.extend_from_slice(payload);
    boxed(typ, &boxed(b"data", &data))
}

pub fn text_item(typ: &[u8; 4], text: &str) -> Vec<u8> {
    item(typ, 1, text.as_bytes())
}

pub fn ftyp(major: &[u8; 4], compatible: &[&[u8; 4]]) -> Vec<u8> {
    let mut p = major.to_vec();
    p.extend_from_slice(&0x200u32.to_be_bytes());
    for c in compatible {
        p.extend_from_slice(*c);
    }
    boxed(b"ftyp", &p)
}

fn hdlr() -> Vec<u8> {
    let mut p = vec![0u8; 8];
    p.extend_from_slice(b"mdir");
    p.extend_from_slice(b"appl");
    p.extend_from_slice(&[0; 9]);
    boxed(b"hdlr", &p)
}

fn stco(offsets: &[u32]) -> Vec<u8> {
    let mut p = vec![0, 0, 0, 0];
    p.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for o in offsets {
        p.extend_from_slice(&o.to_be_bytes());
    }
    boxed(b"stco", &p)
}

/// Synthetic audio file: `ftyp`, `moov` with one track whose single chunk
/// points at the `mdat` payload, optional `udta` metadata, and `mdat`.
pub struct Fixture {
    pub major: [u8; 4],
    pub compatible: Vec<[u8; 4]>,
    pub items: Vec<Vec<u8>>,
    pub udta: bool,
    /// Total size of a `free` box after `ilst`; 0 for none
    pub free_after_ilst: usize,
    pub mdat_first: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            major: *b"M4A ",
            compatible: vec![*b"M4A ", *b"mp42", *b"isom"],
            items: Vec::new(),
            udta: true,
            free_after_ilst: 0,
            mdat_first: false,
        }
    }
}

impl Fixture {
    pub fn with_items(items: Vec<Vec<u8>>) -> Self {
        Fixture { items, ..Default::default() }
    }

    fn moov(&self, chunk_offset: u32) -> Vec<u8> {
        let mut body = boxed(b"mvhd", &[0; 100]);
        let stbl = boxed(b"stbl", &stco(&[chunk_offset]));
        body.extend(boxed(b"trak", &boxed(b"mdia", &boxed(b"minf", &stbl))));

        if self.udta {
            let mut meta = vec![0, 0, 0, 0];
            meta.extend(hdlr());
            meta.extend(boxed(b"ilst", &self.items.concat()));
            if self.free_after_ilst >= 8 {
                meta.extend(boxed(b"free", &vec![0; self.free_after_ilst - 8]));
            }
            body.extend(boxed(b"udta", &boxed(b"meta", &meta)));
        }
        boxed(b"moov", &body)
    }

    pub fn build(&self) -> Vec<u8> {
        let compatible: Vec<&[u8; 4]> = self.compatible.iter().collect();
        let mut file = ftyp(&self.major, &compatible);
        let mdat = boxed(b"mdat", &MDAT_PAYLOAD);

        if self.mdat_first {
            let chunk = (file.len() + 8) as u32;
            file.extend(&mdat);
            file.extend(self.moov(chunk));
        } else {
            let moov_len = self.moov(0).len();
            let chunk = (file.len() + moov_len + 8) as u32;
            file.extend(self.moov(chunk));
            file.extend(&mdat);
        }
        file
    }

    /// Write the fixture into `dir` and return its path.
    pub fn write(&self, dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("fixture.m4a");
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// The single `stco` entry of the fixture track.
pub fn chunk_offset(file: &[u8]) -> u32 {
    let at = file.windows(4).position(|w| w == b"stco").expect("no stco box");
    u32::from_be_bytes(file[at + 12..at + 16].try_into().unwrap())
}
