use std::io::{self, Read};
use std::path::Path;

/// FileSystem is where perf maps are read from. It exists so the cache can be
/// pointed at something other than the host filesystem.
pub trait FileSystem: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    /// In-memory filesystem that counts opens.
    #[derive(Default)]
    pub struct MemFs {
        files: RwLock<HashMap<PathBuf, Vec<u8>>>,
        opens: AtomicUsize,
    }

    impl MemFs {
        pub fn write(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
            self.files
                .write()
                .unwrap()
                .insert(path.into(), content.into());
        }

        pub fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    impl FileSystem for MemFs {
        fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.files.read().unwrap().get(path) {
                Some(content) => Ok(Box::new(io::Cursor::new(content.clone()))),
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )),
            }
        }
    }
}
