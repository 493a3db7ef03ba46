mod cache;
mod fs;
mod map;

pub use cache::{PerfCache, PerfCacheOptions};
pub use fs::{FileSystem, RealFs};
pub use map::{PerfMap, PerfMapAddr};

#[cfg(test)]
pub(crate) use fs::testing;

#[derive(Debug, thiserror::Error)]
pub enum PerfMapError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("splitting failed: {line:?}")]
    Split { line: String },

    #[error("parsing start failed on {line:?}")]
    ParseStart { line: String },

    #[error("parsing size failed on {line:?}")]
    ParseSize { line: String },

    #[error("overflowed mapping: {line:?}")]
    Overflow { line: String },

    #[error("perf map is larger than {limit} bytes")]
    TooLarge { limit: u64 },
}

impl PerfMapError {
    /// True when the perf map simply does not exist, which is the normal case
    /// for processes that don't emit one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
