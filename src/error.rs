/// Every failure the tagging engine can report.
///
/// Each variant carries a stable numeric code (see [`Error::code`]) so callers
/// that persist or forward errors across an FFI boundary can keep matching on
/// integers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("File not open")]
    NotOpen,
    #[error("File already open")]
    AlreadyOpen,
    #[error("File opened read-only")]
    ReadOnly,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Seek operation failed: {0}")]
    Seek(std::io::Error),
    #[error("Write operation failed: {0}")]
    WriteFailed(std::io::Error),
    #[error("File rename failed: {0}")]
    Rename(std::io::Error),

    #[error("Not a supported MP4 file")]
    NotMp4,
    #[error("Invalid box structure: {0}")]
    BadBox(String),
    #[error("File is corrupted: {0}")]
    Corrupt(String),
    #[error("Unexpected end of file")]
    Truncated,
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("No tags found")]
    NoTags,
    #[error("Tag not found")]
    TagNotFound,
    #[error("Tag data too large for buffer")]
    TagTooLarge,

    #[error("Not enough space for in-place write")]
    NoSpace,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable integer code for this error kind.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -1,
            Error::Io(_) => -3,
            Error::NotOpen => -4,
            Error::AlreadyOpen => -5,
            Error::ReadOnly => -6,
            Error::NotMp4 => -10,
            Error::BadBox(_) => -11,
            Error::Corrupt(_) => -12,
            Error::Truncated => -13,
            Error::Unsupported(_) => -14,
            Error::NoTags => -20,
            Error::TagNotFound => -21,
            Error::TagTooLarge => -22,
            Error::NoSpace => -30,
            Error::WriteFailed(_) => -31,
            Error::Seek(_) => -32,
            Error::Rename(_) => -33,
        }
    }

    /// Map a read error: a short read becomes [`Error::Truncated`].
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(e)
        }
    }
}
