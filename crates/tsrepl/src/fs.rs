//! Filesystem access used by module resolution and loading.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use ahash::AHashMap;

/// The filesystem operations the resolver and module loader need.
///
/// [`OsFileSystem`] talks to the real disk; [`MemoryFileSystem`] keeps files in memory so
/// resolution can be tested without touching it.
pub trait FileSystem {
    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

/// Files held in memory, keyed by normalized absolute path.
///
/// Directories exist implicitly: every ancestor of a stored file is a directory, as is
/// anything added with [`MemoryFileSystem::add_dir`].
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: AHashMap<PathBuf, String>,
    dirs: Vec<PathBuf>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), contents.into());
    }

    /// Builder form of [`MemoryFileSystem::add_file`].
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        if !self.dirs.contains(&path) {
            self.dirs.push(path);
        }
    }

    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> Option<String> {
        self.files.remove(&normalize(path.as_ref()))
    }
}

impl FileSystem for MemoryFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.dirs.iter().any(|dir| dir.starts_with(&path))
            || self.files.keys().any(|file| file != &path && file.starts_with(&path))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path.display()))
        })
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let normalized = normalize(path);
        if self.is_file(&normalized) || self.is_dir(&normalized) {
            Ok(normalized)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file or directory: {}", path.display()),
            ))
        }
    }
}

/// Resolves `.` and `..` components lexically, without touching the disk.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.ts")), PathBuf::from("/a/c/d.ts"));
        assert_eq!(normalize(Path::new("/a/..")), PathBuf::from("/"));
    }

    #[test]
    fn memory_directories_are_implied_by_files() {
        let fs = MemoryFileSystem::new().with_file("/project/src/a.ts", "");
        assert!(fs.is_dir(Path::new("/project")));
        assert!(fs.is_dir(Path::new("/project/src")));
        assert!(!fs.is_dir(Path::new("/project/src/a.ts")));
        assert!(!fs.is_dir(Path::new("/elsewhere")));
    }
}
