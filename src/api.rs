use crate::{
    error::{Error, Result},
    ilst::decode_ilst,
    io::FileHandle,
    structure::{FileStructure, parse_structure, validate_container},
    tags::{SimpleTag, TagCollection, TargetType},
    writer::{self, WriteOptions, WriteStrategy},
};
use std::path::Path;

/// A tagging context bound to at most one open MP4 file.
///
/// The context owns the file handle, the structure found when the file was
/// opened (refreshed after every write) and at most one decoded
/// [`TagCollection`]. Any mutation drops the decoded collection so a later
/// read always reflects the file.
///
/// # Example
/// ```no_run
/// use mp4tag::Mp4Tag;
///
/// let mut tag = Mp4Tag::new();
/// tag.open_rw("song.m4a")?;
/// println!("{}", tag.read_tag_string("TITLE")?);
/// tag.set_tag_string("ARTIST", Some("Someone"))?;
/// tag.close();
/// # Ok::<(), mp4tag::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Mp4Tag {
    handle: Option<FileHandle>,
    info: Option<FileStructure>,
    cached: Option<TagCollection>,
    options: WriteOptions,
    last_write: Option<WriteStrategy>,
}

impl Mp4Tag {
    /// A context with no file attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for reading. The file must start with an `ftyp` box
    /// naming a recognized brand and must contain a `moov` box.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.attach(path.as_ref(), false)
    }

    /// Open `path` for reading and writing.
    pub fn open_rw(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.attach(path.as_ref(), true)
    }

    fn attach(&mut self, path: &Path, writable: bool) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("empty path".into()));
        }

        let mut fh = FileHandle::reopen(path, writable)?;
        let size = fh.size()?;
        validate_container(&mut fh, size)?;
        let info = parse_structure(&mut fh, size)?;
        tracing::debug!(path = %path.display(), writable, has_ilst = info.has_ilst(), "opened");

        self.handle = Some(fh);
        self.info = Some(info);
        self.cached = None;
        self.last_write = None;
        Ok(())
    }

    /// Release the file and everything cached for it. Closing a closed
    /// context does nothing.
    pub fn close(&mut self) {
        self.handle = None;
        self.info = None;
        self.cached = None;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.handle.as_ref().is_some_and(FileHandle::is_writable)
    }

    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(FileHandle::path)
    }

    /// Box positions found by the most recent scan.
    pub fn structure(&self) -> Result<&FileStructure> {
        self.info.as_ref().ok_or(Error::NotOpen)
    }

    pub fn set_write_options(&mut self, options: WriteOptions) {
        self.options = options;
    }

    /// Strategy used by the most recent successful write, if any.
    pub fn last_write(&self) -> Option<WriteStrategy> {
        self.last_write
    }

    /// All tags in the file, decoded on first use and cached afterwards.
    ///
    /// Fails with [`Error::NoTags`] when the file has no `ilst`.
    pub fn read_tags(&mut self) -> Result<&TagCollection> {
        if self.cached.is_none() {
            let (Some(fh), Some(info)) = (self.handle.as_mut(), self.info.as_ref()) else {
                return Err(Error::NotOpen);
            };
            self.cached = Some(decode_ilst(fh, info)?);
        }
        self.cached.as_ref().ok_or(Error::NoTags)
    }

    /// Text value of the first tag named `name` (case-insensitive).
    pub fn read_tag_string(&mut self, name: &str) -> Result<String> {
        check_name(name)?;
        self.read_tags()?
            .find_value(name)
            .map(str::to_string)
            .ok_or(Error::TagNotFound)
    }

    /// Copy the value of `name` into `buf` followed by a NUL byte and return
    /// the value length.
    ///
    /// Fails with [`Error::TagTooLarge`] when `buf` cannot hold the value and
    /// its terminator; `buf` is left untouched in that case.
    pub fn read_tag_into(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        check_name(name)?;
        let value = self.read_tags()?.find_value(name).ok_or(Error::TagNotFound)?;
        let bytes = value.as_bytes();
        if bytes.len() + 1 > buf.len() {
            return Err(Error::TagTooLarge);
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        buf[bytes.len()] = 0;
        Ok(bytes.len())
    }

    /// Replace every tag in the file with `coll`.
    ///
    /// The new item list is patched in place when it fits in the existing
    /// `ilst` plus any free box right after it; otherwise the file is
    /// rebuilt and atomically swapped in.
    pub fn write_tags(&mut self, coll: &TagCollection) -> Result<()> {
        let fh = self.handle.as_mut().ok_or(Error::NotOpen)?;
        if !fh.is_writable() {
            return Err(Error::ReadOnly);
        }
        self.cached = None;

        let info = self.info.as_ref().ok_or(Error::NotOpen)?;
        let (strategy, rescanned) = writer::write_tags(fh, info, coll, self.options)?;
        self.info = Some(rescanned);
        self.last_write = Some(strategy);
        Ok(())
    }

    /// Set `name` to `value`, or remove it when `value` is `None`. Every
    /// other tag in the file is kept.
    pub fn set_tag_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        check_name(name)?;
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        if !self.is_writable() {
            return Err(Error::ReadOnly);
        }

        let mut coll = match self.read_tags() {
            Ok(existing) => existing.without(name),
            Err(Error::NoTags) => TagCollection::new(),
            Err(e) => return Err(e),
        };
        if let Some(value) = value {
            if coll.is_empty() {
                coll.add_tag(TargetType::Album);
            }
            coll.tags[0].push(SimpleTag::new(name, Some(value)));
        }
        self.write_tags(&coll)
    }

    pub fn remove_tag(&mut self, name: &str) -> Result<()> {
        self.set_tag_string(name, None)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("empty tag name".into()));
    }
    Ok(())
}
