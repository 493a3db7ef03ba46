//! Content fingerprints used to notice that a file changed. Not for integrity.

use crate::perf::FileSystem;
use std::io::{self, Read};
use std::path::Path;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Hashes the whole content of `path`.
pub fn file(fs: &dyn FileSystem, path: &Path) -> io::Result<u64> {
    let mut r = fs.open(path)?;
    let mut h = Xxh3::new();
    let mut buf = [0u8; 8 * 1024];
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        h.update(&buf[..n]);
    }
    Ok(h.digest())
}

pub fn bytes(data: &[u8]) -> u64 {
    xxh3_64(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perf::RealFs;
    use std::io::Write;

    #[test]
    fn test_file_matches_bytes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let content = "1a 5 symbolA\n".repeat(2000);
        f.write_all(content.as_bytes()).unwrap();

        let h = file(&RealFs, f.path()).unwrap();
        assert_eq!(h, bytes(content.as_bytes()));
    }

    #[test]
    fn test_content_change() {
        assert_ne!(bytes(b"1a 5 symbolA\n"), bytes(b"1a 6 symbolA\n"));
    }

    #[test]
    fn test_missing_file() {
        let err = file(&RealFs, Path::new("/nonexistent/perf-0.map")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
