//! In-memory tag tree: a [`TagCollection`] owns [`Tag`]s, each tag owns its
//! [`SimpleTag`]s, and a simple tag owns its nested children.

use serde::Serialize;

/// Scope a tag applies to. MP4 files only ever use [`TargetType::Album`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TargetType {
    Collection = 70,
    Edition = 60,
    #[default]
    Album = 50,
    Part = 40,
    Track = 30,
    Subtrack = 20,
    Shot = 10,
}

impl TargetType {
    pub fn level(self) -> u32 {
        self as u32
    }
}

/// One name/value entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimpleTag {
    pub name: String,
    pub value: Option<String>,
    #[serde(serialize_with = "serialize_binary")]
    pub binary: Option<Vec<u8>>,
    pub language: Option<String>,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SimpleTag>,
}

fn serialize_binary<S: serde::Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(bytes) => s.serialize_some(&hex::encode(bytes)),
        None => s.serialize_none(),
    }
}

impl SimpleTag {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        SimpleTag {
            name: name.into(),
            value: value.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_binary(name: impl Into<String>, data: Vec<u8>) -> Self {
        SimpleTag {
            name: name.into(),
            binary: Some(data),
            ..Default::default()
        }
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Language code, `"und"` when unset.
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("und")
    }

    pub fn set_language(&mut self, language: Option<&str>) {
        self.language = language.map(str::to_string);
    }

    pub fn add_nested(&mut self, name: impl Into<String>, value: Option<&str>) -> &mut SimpleTag {
        self.children.push(SimpleTag::new(name, value));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub target_type: TargetType,
    pub target_type_name: Option<String>,
    pub track_uids: Vec<u64>,
    pub edition_uids: Vec<u64>,
    pub chapter_uids: Vec<u64>,
    pub attachment_uids: Vec<u64>,
    pub simple_tags: Vec<SimpleTag>,
}

impl Tag {
    pub fn new(target_type: TargetType) -> Self {
        Tag { target_type, ..Default::default() }
    }

    pub fn add_simple(&mut self, name: impl Into<String>, value: Option<&str>) -> &mut SimpleTag {
        self.push(SimpleTag::new(name, value))
    }

    pub fn push(&mut self, st: SimpleTag) -> &mut SimpleTag {
        self.simple_tags.push(st);
        let last = self.simple_tags.len() - 1;
        &mut self.simple_tags[last]
    }

    pub fn add_track_uid(&mut self, uid: u64) {
        self.track_uids.push(uid);
    }
}

/// Ordered list of tags; insertion order is preserved on write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagCollection {
    pub tags: Vec<Tag>,
}

impl TagCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, target_type: TargetType) -> &mut Tag {
        self.tags.push(Tag::new(target_type));
        let last = self.tags.len() - 1;
        &mut self.tags[last]
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// All top-level simple tags, in order, across every tag.
    pub fn simple_tags(&self) -> impl Iterator<Item = &SimpleTag> {
        self.tags.iter().flat_map(|t| t.simple_tags.iter())
    }

    /// First simple tag with a text value whose name matches case-insensitively.
    pub fn find_value(&self, name: &str) -> Option<&str> {
        self.simple_tags()
            .find(|st| st.is_named(name) && st.value.is_some())
            .and_then(|st| st.value.as_deref())
    }

    /// Copy of this collection flattened into one album-scope tag, without
    /// entries named `name`.
    pub fn without(&self, name: &str) -> TagCollection {
        let mut out = TagCollection::new();
        let tag = out.add_tag(TargetType::Album);
        for st in self.simple_tags().filter(|st| !st.is_named(name)) {
            tag.push(SimpleTag { children: Vec::new(), ..st.clone() });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_tree() {
        let mut coll = TagCollection::new();
        let tag = coll.add_tag(TargetType::Album);
        tag.add_track_uid(7);
        let artist = tag.add_simple("ARTIST", Some("Someone"));
        artist.set_language(Some("eng"));
        artist.add_nested("SORT_WITH", Some("One, Some"));

        assert_eq!(coll.len(), 1);
        let st = &coll.tags[0].simple_tags[0];
        assert_eq!(st.language(), "eng");
        assert_eq!(st.children[0].name, "SORT_WITH");
        assert_eq!(coll.tags[0].track_uids, vec![7]);
    }

    #[test]
    fn language_defaults_to_und() {
        assert_eq!(SimpleTag::new("TITLE", Some("x")).language(), "und");
    }

    #[test]
    fn find_value_ignores_case_and_binary_entries() {
        let mut coll = TagCollection::new();
        let tag = coll.add_tag(TargetType::Album);
        tag.push(SimpleTag::with_binary("title", vec![1]));
        tag.add_simple("Title", Some("Hello"));
        assert_eq!(coll.find_value("TITLE"), Some("Hello"));
        assert_eq!(coll.find_value("ALBUM"), None);
    }

    #[test]
    fn without_flattens_and_filters() {
        let mut coll = TagCollection::new();
        coll.add_tag(TargetType::Track).add_simple("TITLE", Some("a"));
        let second = coll.add_tag(TargetType::Album);
        second.add_simple("ARTIST", Some("b"));
        second.add_simple("title", Some("c"));

        let out = coll.without("Title");
        assert_eq!(out.len(), 1);
        assert_eq!(out.tags[0].target_type, TargetType::Album);
        let names: Vec<_> = out.simple_tags().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ARTIST"]);
    }

    #[test]
    fn target_levels() {
        assert_eq!(TargetType::default().level(), 50);
        assert_eq!(TargetType::Collection.level(), 70);
    }
}
