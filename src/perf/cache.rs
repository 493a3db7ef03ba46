use super::{FileSystem, PerfMap, PerfMapError, RealFs};
use crate::hash;
use crate::symbols::Demangler;
use moka::sync::Cache;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PerfCacheOptions {
    /// Directory holding `perf-<pid>.map` files.
    pub perf_map_dir: PathBuf,
    /// Maximum number of pids kept.
    pub capacity: u64,
    /// Perf maps are written by the profiled process and can be arbitrarily
    /// large; anything bigger than this is refused.
    pub max_size: u64,
    pub demangle: bool,
}

impl Default for PerfCacheOptions {
    fn default() -> Self {
        Self {
            perf_map_dir: PathBuf::from("/tmp"),
            capacity: 10_000,
            max_size: 64 * 1024 * 1024,
            demangle: false,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    hash: u64,
    map: Arc<PerfMap>,
}

/// PerfCache keeps the parsed perf map of each pid and only re-parses it
/// when the file content changes.
///
/// Paths are taken as-is: a process in another mount or pid namespace writes
/// its map under its own `/tmp` and namespaced pid, which is not translated.
pub struct PerfCache {
    fs: Arc<dyn FileSystem>,
    perf_map_dir: PathBuf,
    max_size: u64,
    demangler: Option<Demangler>,
    cache: Cache<u32, CacheEntry>,
}

impl Default for PerfCache {
    fn default() -> Self {
        Self::new(PerfCacheOptions::default())
    }
}

impl PerfCache {
    pub fn new(opts: PerfCacheOptions) -> Self {
        Self::with_fs(Arc::new(RealFs), opts)
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>, opts: PerfCacheOptions) -> Self {
        Self {
            fs,
            perf_map_dir: opts.perf_map_dir,
            max_size: opts.max_size,
            demangler: opts.demangle.then(|| Demangler::new(false)),
            cache: Cache::new(opts.capacity),
        }
    }

    pub fn perf_map_path(&self, pid: u32) -> PathBuf {
        self.perf_map_dir.join(format!("perf-{}.map", pid))
    }

    /// Returns the perf map of `pid`.
    ///
    /// A missing file is returned as an error (see
    /// [`PerfMapError::is_not_found`]). The fingerprint and the parse come
    /// from the same read, so a file rewritten mid-call cannot be cached under
    /// the wrong fingerprint. A failed parse leaves the cached entry alone.
    pub fn cache_for_pid(&self, pid: u32) -> Result<Arc<PerfMap>, PerfMapError> {
        let path = self.perf_map_path(pid);
        let content = self.read_capped(&path)?;
        let h = hash::bytes(&content);

        if let Some(entry) = self.cache.get(&pid) {
            if entry.hash == h {
                return Ok(entry.map);
            }
        }

        let map = Arc::new(PerfMap::parse_with(
            content.as_slice(),
            self.demangler.as_ref(),
        )?);
        log::debug!(
            "Parsed {} with {} symbols",
            path.display(),
            map.len()
        );

        self.cache.insert(
            pid,
            CacheEntry {
                hash: h,
                map: Arc::clone(&map),
            },
        );
        Ok(map)
    }

    /// Resolves `addr` in the perf map of `pid`. `Ok(None)` means the map
    /// exists but has no symbol for the address.
    pub fn lookup(&self, pid: u32, addr: u64) -> Result<Option<String>, PerfMapError> {
        let map = self.cache_for_pid(pid)?;
        Ok(map.lookup(addr).map(str::to_string))
    }

    /// Reports whether the perf map of `pid` differs from the cached one,
    /// without parsing it. A pid with nothing cached counts as changed.
    pub fn changed(&self, pid: u32) -> Result<bool, PerfMapError> {
        let h = hash::file(self.fs.as_ref(), &self.perf_map_path(pid))?;
        Ok(self.cache.get(&pid).map_or(true, |entry| entry.hash != h))
    }

    fn read_capped(&self, path: &std::path::Path) -> Result<Vec<u8>, PerfMapError> {
        let mut content = Vec::new();
        self.fs
            .open(path)?
            .take(self.max_size.saturating_add(1))
            .read_to_end(&mut content)?;

        if content.len() as u64 > self.max_size {
            return Err(PerfMapError::TooLarge {
                limit: self.max_size,
            });
        }
        Ok(content)
    }
}
