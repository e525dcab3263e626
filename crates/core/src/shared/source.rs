use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifies what a decode source should open.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// A file path or a URL/URI understood by the demuxer.
    Path(PathBuf),
    /// A capture device index (`0` is usually the default camera).
    Device(u32),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn device(index: u32) -> Self {
        Source::Device(index)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Device(index) => write!(f, "device #{index}"),
        }
    }
}

/// An all-digit string is a device index; anything else is a path or URI.
impl FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = s.parse::<u32>() {
                return Ok(Source::Device(index));
            }
        }
        Ok(Source::Path(PathBuf::from(s)))
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<u32> for Source {
    fn from(index: u32) -> Self {
        Source::Device(index)
    }
}
