use crate::boxes::FourCC;
use crate::tags::SimpleTag;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Type indicator stored in the first four bytes of a `data` atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Implicit,
    Utf8,
    Utf16,
    Jpeg,
    Png,
    Integer,
    Other(u32),
}

impl From<u32> for DataType {
    fn from(code: u32) -> Self {
        match code {
            0 => DataType::Implicit,
            1 => DataType::Utf8,
            2 => DataType::Utf16,
            13 => DataType::Jpeg,
            14 => DataType::Png,
            21 => DataType::Integer,
            n => DataType::Other(n),
        }
    }
}

impl DataType {
    pub fn code(self) -> u32 {
        match self {
            DataType::Implicit => 0,
            DataType::Utf8 => 1,
            DataType::Utf16 => 2,
            DataType::Jpeg => 13,
            DataType::Png => 14,
            DataType::Integer => 21,
            DataType::Other(n) => n,
        }
    }
}

/// A decoded `data` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValue {
    Text(String),
    Binary(Vec<u8>),
}

/// Payload ready to be wrapped in a `data` atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedItem {
    pub data_type: DataType,
    pub payload: Vec<u8>,
}

/// Value encoding for one item atom type.
///
/// Items without a registered codec use [`decode_generic`] and
/// [`encode_generic`].
pub trait ItemCodec: Send + Sync {
    /// Decode `payload`. `None` defers to the generic, type-indicator driven
    /// decoding.
    fn decode(&self, data_type: DataType, payload: &[u8]) -> Option<ItemValue>;

    /// Encode `st`. `None` drops the tag from the output.
    fn encode(&self, st: &SimpleTag) -> Option<EncodedItem>;
}

// ---------- Name table ----------

/// Human-readable names for the well-known item atoms.
const TAG_NAMES: &[(&str, [u8; 4])] = &[
    ("TITLE", *b"\xA9nam"),
    ("ARTIST", *b"\xA9ART"),
    ("ALBUM", *b"\xA9alb"),
    ("ALBUM_ARTIST", *b"aART"),
    ("DATE_RELEASED", *b"\xA9day"),
    ("TRACK_NUMBER", *b"trkn"),
    ("DISC_NUMBER", *b"disk"),
    ("GENRE", *b"\xA9gen"),
    ("COMPOSER", *b"\xA9wrt"),
    ("COMMENT", *b"\xA9cmt"),
    ("ENCODER", *b"\xA9too"),
    ("COPYRIGHT", *b"cprt"),
    ("BPM", *b"tmpo"),
    ("LYRICS", *b"\xA9lyr"),
    ("GROUPING", *b"\xA9grp"),
    ("DESCRIPTION", *b"desc"),
    ("COVER_ART", *b"covr"),
    ("COMPILATION", *b"cpil"),
    ("GAPLESS", *b"pgap"),
    ("SORT_NAME", *b"sonm"),
    ("SORT_ARTIST", *b"soar"),
    ("SORT_ALBUM", *b"soal"),
    ("SORT_ALBUM_ARTIST", *b"soaa"),
    ("SORT_COMPOSER", *b"soco"),
];

/// Map a tag name to its item atom type.
///
/// Table names match case-insensitively; any other four-character name is
/// taken as a literal FourCC.
pub fn fourcc_for_name(name: &str) -> Option<FourCC> {
    TAG_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, cc)| FourCC(*cc))
        .or_else(|| FourCC::from_name(name))
}

/// Inverse of [`fourcc_for_name`]: unmapped atoms keep their literal name.
pub fn name_for_fourcc(cc: FourCC) -> String {
    TAG_NAMES
        .iter()
        .find(|(_, c)| *c == cc.0)
        .map(|(n, _)| n.to_string())
        .unwrap_or_else(|| cc.to_name())
}

// ---------- Helpers ----------

/// Big-endian unsigned integer of 1 to 8 bytes.
fn be_uint(payload: &[u8]) -> Option<u64> {
    if payload.is_empty() || payload.len() > 8 {
        return None;
    }
    Some(payload.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Leading decimal digits after optional whitespace; anything else is 0.
fn parse_uint(s: &str) -> u64 {
    let digits: String = s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn parse_u16(s: &str) -> u16 {
    parse_uint(s).min(u16::MAX as u64) as u16
}

fn decode_integer(payload: &[u8]) -> Option<ItemValue> {
    be_uint(payload).map(|v| ItemValue::Text(v.to_string()))
}

/// Decode by type indicator alone.
pub fn decode_generic(data_type: DataType, payload: &[u8]) -> Option<ItemValue> {
    if payload.is_empty() {
        return None;
    }
    match data_type {
        DataType::Utf8 | DataType::Implicit => match std::str::from_utf8(payload) {
            Ok(s) => Some(ItemValue::Text(s.to_string())),
            Err(_) => Some(ItemValue::Binary(payload.to_vec())),
        },
        DataType::Integer => {
            decode_integer(payload).or_else(|| Some(ItemValue::Binary(payload.to_vec())))
        }
        _ => Some(ItemValue::Binary(payload.to_vec())),
    }
}

/// Text as UTF-8; a binary-only entry is stored raw with the implicit type.
pub fn encode_generic(st: &SimpleTag) -> Option<EncodedItem> {
    match (&st.value, &st.binary) {
        (None, Some(bin)) => Some(EncodedItem { data_type: DataType::Implicit, payload: bin.clone() }),
        (value, _) => Some(EncodedItem {
            data_type: DataType::Utf8,
            payload: value.as_deref().unwrap_or_default().as_bytes().to_vec(),
        }),
    }
}

// ---------- Codecs ----------

/// `trkn` / `disk`: 8 bytes, number at 2..4 and total at 4..6.
pub struct NumberPairCodec;

impl ItemCodec for NumberPairCodec {
    fn decode(&self, _data_type: DataType, payload: &[u8]) -> Option<ItemValue> {
        if payload.len() < 6 || payload.len() > 8 {
            return decode_integer(payload);
        }
        let num = u16::from_be_bytes([payload[2], payload[3]]);
        let total = u16::from_be_bytes([payload[4], payload[5]]);
        Some(ItemValue::Text(if total > 0 {
            format!("{}/{}", num, total)
        } else {
            num.to_string()
        }))
    }

    fn encode(&self, st: &SimpleTag) -> Option<EncodedItem> {
        let text = st.value.as_deref().unwrap_or_default();
        let mut parts = text.splitn(2, '/');
        let num = parts.next().map(parse_u16).unwrap_or(0);
        let total = parts.next().map(parse_u16).unwrap_or(0);

        let mut payload = vec![0u8; 8];
        payload[2..4].copy_from_slice(&num.to_be_bytes());
        payload[4..6].copy_from_slice(&total.to_be_bytes());
        Some(EncodedItem { data_type: DataType::Implicit, payload })
    }
}

/// Plain big-endian integer of a fixed width (`tmpo`, `gnre`).
pub struct IntegerCodec {
    pub width: usize,
    pub data_type: DataType,
}

impl ItemCodec for IntegerCodec {
    fn decode(&self, _data_type: DataType, payload: &[u8]) -> Option<ItemValue> {
        decode_integer(payload)
    }

    fn encode(&self, st: &SimpleTag) -> Option<EncodedItem> {
        let v = parse_uint(st.value.as_deref().unwrap_or_default());
        let bytes = v.to_be_bytes();
        let payload = bytes[8 - self.width..].to_vec();
        Some(EncodedItem { data_type: self.data_type, payload })
    }
}

/// One-byte boolean (`cpil`, `pgap`).
pub struct FlagCodec;

impl ItemCodec for FlagCodec {
    fn decode(&self, _data_type: DataType, payload: &[u8]) -> Option<ItemValue> {
        decode_integer(payload)
    }

    fn encode(&self, st: &SimpleTag) -> Option<EncodedItem> {
        let set = parse_uint(st.value.as_deref().unwrap_or_default()) != 0;
        Some(EncodedItem { data_type: DataType::Integer, payload: vec![set as u8] })
    }
}

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G'];

/// `covr`: raw image bytes typed as PNG or JPEG.
pub struct CoverCodec;

impl ItemCodec for CoverCodec {
    fn decode(&self, _data_type: DataType, _payload: &[u8]) -> Option<ItemValue> {
        None
    }

    fn encode(&self, st: &SimpleTag) -> Option<EncodedItem> {
        let image = st.binary.as_ref().filter(|b| !b.is_empty())?;
        let data_type = if image.starts_with(PNG_SIGNATURE) {
            DataType::Png
        } else {
            DataType::Jpeg
        };
        Some(EncodedItem { data_type, payload: image.clone() })
    }
}

// ---------- Registry ----------

/// Codecs keyed by item atom type.
pub struct Registry {
    map: HashMap<FourCC, Box<dyn ItemCodec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn with_codec(mut self, cc: FourCC, codec: Box<dyn ItemCodec>) -> Self {
        self.map.insert(cc, codec);
        self
    }

    /// Decode the payload of item `cc`, consulting its codec first.
    pub fn decode(&self, cc: FourCC, data_type: DataType, payload: &[u8]) -> Option<ItemValue> {
        self.map
            .get(&cc)
            .and_then(|c| c.decode(data_type, payload))
            .or_else(|| decode_generic(data_type, payload))
    }

    pub fn encode(&self, cc: FourCC, st: &SimpleTag) -> Option<EncodedItem> {
        match self.map.get(&cc) {
            Some(c) => c.encode(st),
            None => encode_generic(st),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::new()
            .with_codec(FourCC(*b"trkn"), Box::new(NumberPairCodec))
            .with_codec(FourCC(*b"disk"), Box::new(NumberPairCodec))
            .with_codec(
                FourCC(*b"tmpo"),
                Box::new(IntegerCodec { width: 2, data_type: DataType::Integer }),
            )
            .with_codec(
                FourCC(*b"gnre"),
                Box::new(IntegerCodec { width: 2, data_type: DataType::Implicit }),
            )
            .with_codec(FourCC(*b"cpil"), Box::new(FlagCodec))
            .with_codec(FourCC(*b"pgap"), Box::new(FlagCodec))
            .with_codec(FourCC(*b"covr"), Box::new(CoverCodec))
    })
}
