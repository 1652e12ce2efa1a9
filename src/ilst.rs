//! `ilst` item codec: turns item atoms into a [`TagCollection`] and back, and
//! builds a complete `udta` subtree for files that have none.

use crate::boxes::{FourCC, MIN_HEADER_SIZE, write_box, write_free_box};
use crate::error::{Error, Result};
use crate::known_boxes::KnownBox;
use crate::parser::{find_child, read_box_header_at};
use crate::registry::{ItemValue, default_registry, fourcc_for_name, name_for_fourcc};
use crate::structure::FileStructure;
use crate::tags::{SimpleTag, TagCollection, TargetType};
use crate::util::read_slice;
use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Seek};

/// Type indicator (4) + locale (4) at the start of every `data` payload.
const DATA_PREFIX: u64 = 8;

/// Handler reference payload marking the metadata as iTunes item lists.
const HDLR_PAYLOAD: [u8; 25] = [
    0, 0, 0, 0, // version + flags
    0, 0, 0, 0, // pre_defined
    b'm', b'd', b'i', b'r', // handler type
    b'a', b'p', b'p', b'l', // manufacturer
    0, 0, 0, 0, 0, 0, 0, 0, // reserved
    0, // empty name
];

/// Decode every item under `ilst` into one album-scope tag.
///
/// Items that cannot be read are skipped; a malformed item header ends the
/// scan but keeps what was decoded so far.
pub fn decode_ilst<R: Read + Seek>(r: &mut R, info: &FileStructure) -> Result<TagCollection> {
    let ilst = info.ilst.ok_or(Error::NoTags)?;
    let registry = default_registry();

    let mut coll = TagCollection::new();
    let tag = coll.add_tag(TargetType::Album);

    let end = ilst.end().min(info.file_size);
    let mut pos = ilst.offset + MIN_HEADER_SIZE;
    while pos + MIN_HEADER_SIZE <= end {
        let item = match read_box_header_at(r, pos, info.file_size) {
            Ok(h) if h.end() <= end => h,
            Ok(h) => {
                tracing::warn!(item = %h.typ, offset = pos, "ilst item overruns ilst, stopping");
                break;
            }
            Err(e) => {
                tracing::warn!(offset = pos, error = %e, "unreadable ilst item header, stopping");
                break;
            }
        };
        pos = item.end();

        let data = match find_child(r, item.payload_offset(), item.end(), info.file_size, KnownBox::Data) {
            Ok(Some(d)) if d.payload_size() >= DATA_PREFIX => d,
            Ok(_) => {
                tracing::warn!(item = %item.typ, "ilst item has no usable data box, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(item = %item.typ, error = %e, "skipping malformed ilst item");
                continue;
            }
        };

        let raw = match read_slice(r, data.payload_offset(), data.payload_size()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(item = %item.typ, error = %e, "short read in ilst item, skipping");
                continue;
            }
        };
        let data_type = BigEndian::read_u32(&raw[0..4]).into();
        let payload = &raw[DATA_PREFIX as usize..];

        let mut st = SimpleTag::new(name_for_fourcc(item.typ), None);
        st.is_default = true;
        match registry.decode(item.typ, data_type, payload) {
            Some(ItemValue::Text(s)) => st.value = Some(s),
            Some(ItemValue::Binary(b)) => st.binary = Some(b),
            None => {}
        }
        tracing::trace!(item = %item.typ, ?data_type, len = payload.len(), "decoded item");
        tag.push(st);
    }

    Ok(coll)
}

/// Serialize the top-level simple tags of `coll` into an `ilst` payload
/// (the bytes after the `ilst` header).
///
/// Tags whose name maps to no atom, and cover art without image bytes, are
/// left out.
pub fn encode_ilst(coll: &TagCollection) -> Vec<u8> {
    let registry = default_registry();
    let mut out = Vec::new();

    for st in coll.simple_tags() {
        let Some(cc) = fourcc_for_name(&st.name) else {
            tracing::debug!(name = %st.name, "no item atom for tag name, dropping");
            continue;
        };
        let Some(item) = registry.encode(cc, st) else {
            tracing::debug!(name = %st.name, "tag has no encodable value, dropping");
            continue;
        };

        let mut data = Vec::with_capacity(DATA_PREFIX as usize + item.payload.len());
        data.extend_from_slice(&item.data_type.code().to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // locale
        data.extend_from_slice(&item.payload);

        let mut data_box = Vec::new();
        write_box(&mut data_box, FourCC(*b"data"), &data);
        write_box(&mut out, cc, &data_box);
    }

    out
}

/// Complete `ilst` box for `coll`.
pub fn build_ilst(coll: &TagCollection) -> Vec<u8> {
    let mut out = Vec::new();
    write_box(&mut out, FourCC(*b"ilst"), &encode_ilst(coll));
    out
}

/// `udta > meta > (hdlr, ilst[, free])` for a file with no metadata yet.
///
/// `padding` reserves a trailing `free` box of that many bytes so later
/// edits can be made in place; values below a box header are ignored.
pub fn build_udta(coll: &TagCollection, padding: u32) -> Result<Vec<u8>> {
    let mut meta = vec![0u8; 4]; // version + flags
    write_box(&mut meta, FourCC(*b"hdlr"), &HDLR_PAYLOAD);
    meta.extend(build_ilst(coll));
    if padding as u64 >= MIN_HEADER_SIZE {
        write_free_box(&mut meta, padding as u64)?;
    }

    let mut udta_body = Vec::new();
    write_box(&mut udta_body, FourCC(*b"meta"), &meta);

    let mut udta = Vec::new();
    write_box(&mut udta, FourCC(*b"udta"), &udta_body);
    Ok(udta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::parse_structure;
    use std::io::Cursor;

    fn boxed(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        v.extend_from_slice(typ);
        v.extend_from_slice(payload);
        v
    }

    fn item(typ: &[u8; 4], data_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut data = data_type.to_be_bytes().to_vec();
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(payload);
        boxed(typ, &boxed(b"data", &data))
    }

    fn file_with_ilst(ilst_payload: &[u8]) -> Vec<u8> {
        let mut meta = vec![0, 0, 0, 0];
        meta.extend(boxed(b"hdlr", &HDLR_PAYLOAD));
        meta.extend(boxed(b"ilst", ilst_payload));
        let moov = boxed(b"moov", &boxed(b"udta", &boxed(b"meta", &meta)));

        let mut file = boxed(b"ftyp", b"M4A \0\0\0\0");
        file.extend(moov);
        file.extend(boxed(b"mdat", &[0xaa; 4]));
        file
    }

    fn decode(file: Vec<u8>) -> TagCollection {
        let len = file.len() as u64;
        let mut cur = Cursor::new(file);
        let info = parse_structure(&mut cur, len).unwrap();
        decode_ilst(&mut cur, &info).unwrap()
    }

    #[test]
    fn decodes_text_and_integer_items() {
        let mut ilst = item(b"\xA9nam", 1, b"Test Song");
        ilst.extend(item(b"trkn", 0, &[0, 0, 0, 3, 0, 12, 0, 0]));
        ilst.extend(item(b"tmpo", 21, &[0, 128]));
        ilst.extend(item(b"covr", 13, &[0xff, 0xd8]));

        let coll = decode(file_with_ilst(&ilst));
        assert_eq!(coll.len(), 1);
        assert_eq!(coll.tags[0].target_type, TargetType::Album);
        assert_eq!(coll.find_value("TITLE"), Some("Test Song"));
        assert_eq!(coll.find_value("TRACK_NUMBER"), Some("3/12"));
        assert_eq!(coll.find_value("BPM"), Some("128"));

        let cover = coll.simple_tags().find(|s| s.is_named("COVER_ART")).unwrap();
        assert_eq!(cover.binary.as_deref(), Some(&[0xff, 0xd8][..]));
        assert!(coll.simple_tags().all(|s| s.is_default));
    }

    #[test]
    fn skips_items_without_data() {
        let mut ilst = boxed(b"\xA9ART", &boxed(b"name", b"x"));
        ilst.extend(item(b"\xA9alb", 1, b"Album"));
        let coll = decode(file_with_ilst(&ilst));
        let names: Vec<_> = coll.simple_tags().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ALBUM"]);
    }

    #[test]
    fn unmapped_atom_keeps_fourcc_name() {
        let coll = decode(file_with_ilst(&item(b"\xA9xyz", 1, b"v")));
        assert_eq!(coll.find_value("©xyz"), Some("v"));
    }

    #[test]
    fn missing_ilst_is_no_tags() {
        let info = FileStructure::default();
        let mut cur = Cursor::new(Vec::new());
        assert!(matches!(decode_ilst(&mut cur, &info), Err(Error::NoTags)));
    }

    #[test]
    fn encode_drops_unknown_names_and_nested_tags() {
        let mut coll = TagCollection::new();
        let tag = coll.add_tag(TargetType::Album);
        tag.add_simple("TITLE", Some("Song")).add_nested("IGNORED", Some("x"));
        tag.add_simple("NOT_A_REAL_TAG", Some("x"));

        let out = encode_ilst(&coll);
        assert_eq!(out, item(b"\xA9nam", 1, b"Song"));
    }

    #[test]
    fn encoded_tags_decode_back() {
        let mut coll = TagCollection::new();
        let tag = coll.add_tag(TargetType::Album);
        tag.add_simple("ARTIST", Some("Someone"));
        tag.add_simple("DISC_NUMBER", Some("1/2"));
        tag.add_simple("COMPILATION", Some("1"));
        tag.push(SimpleTag::with_binary("COVER_ART", vec![0x89, b'P', b'N', b'G']));

        let decoded = decode(file_with_ilst(&encode_ilst(&coll)));
        assert_eq!(decoded.find_value("ARTIST"), Some("Someone"));
        assert_eq!(decoded.find_value("DISC_NUMBER"), Some("1/2"));
        assert_eq!(decoded.find_value("COMPILATION"), Some("1"));
        let cover = decoded.simple_tags().find(|s| s.is_named("COVER_ART")).unwrap();
        assert_eq!(cover.binary.as_deref(), Some(&[0x89, b'P', b'N', b'G'][..]));
    }

    #[test]
    fn udta_layout() {
        let mut coll = TagCollection::new();
        coll.add_tag(TargetType::Album).add_simple("TITLE", Some("T"));

        let udta = build_udta(&coll, 0).unwrap();
        assert_eq!(&udta[4..8], b"udta");
        assert_eq!(&udta[12..16], b"meta");
        assert_eq!(&udta[16..20], &[0, 0, 0, 0]);
        assert_eq!(&udta[20..24], &33u32.to_be_bytes());
        assert_eq!(&udta[24..28], b"hdlr");
        assert_eq!(&udta[36..40], b"mdir");
        assert_eq!(&udta[40..44], b"appl");
        assert_eq!(&udta[57..61], b"ilst");

        let padded = build_udta(&coll, 64).unwrap();
        assert_eq!(padded.len(), udta.len() + 64);
        assert_eq!(&padded[udta.len() + 4..udta.len() + 8], b"free");
    }
}
