//! Maps `require` ids to sibling namespaces or files.
//!
//! Resolution only reads through a [`FileSystem`], so it is deterministic given the files it
//! can see. Successful file resolutions are remembered per `(directory, id)` until evicted.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use log::debug;

use crate::fs::{FileSystem, normalize};

/// What a `require` id refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Another namespace of the same session, by id.
    Namespace(String),
    /// A file on disk, canonicalized where possible.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No candidate path exists.
    ModuleNotFound { id: String, from: PathBuf },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleNotFound { id, from } => {
                write!(f, "Cannot find module '{id}' from '{}'", from.display())
            }
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug, Clone)]
pub struct Resolver {
    prefix: String,
    extensions: Vec<String>,
    cache: AHashMap<(PathBuf, String), PathBuf>,
}

impl Resolver {
    /// Creates a resolver treating ids that start with `prefix` as namespace references and
    /// trying `extensions` in order for extension-less paths.
    #[must_use]
    pub fn new(prefix: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extensions,
            cache: AHashMap::new(),
        }
    }

    /// Resolves `id` as required from a module living in `dir`.
    pub fn resolve(&mut self, fs: &dyn FileSystem, dir: &Path, id: &str) -> Result<Resolution, ResolveError> {
        if let Some(namespace) = id.strip_prefix(self.prefix.as_str()) {
            return Ok(Resolution::Namespace(namespace.to_owned()));
        }
        let key = (dir.to_path_buf(), id.to_owned());
        if let Some(path) = self.cache.get(&key) {
            return Ok(Resolution::File(path.clone()));
        }
        let found = if is_path_like(id) {
            self.resolve_path(fs, &normalize(&dir.join(id)))
        } else {
            self.resolve_package(fs, dir, id)
        };
        let Some(found) = found else {
            return Err(ResolveError::ModuleNotFound {
                id: id.to_owned(),
                from: dir.to_path_buf(),
            });
        };
        let path = fs.canonicalize(&found).unwrap_or(found);
        debug!("resolved '{id}' from {} to {}", dir.display(), path.display());
        self.cache.insert(key, path.clone());
        Ok(Resolution::File(path))
    }

    /// Forgets every cached resolution that points at one of `paths`.
    pub fn evict(&mut self, paths: &[PathBuf]) {
        self.cache.retain(|_, resolved| !paths.contains(resolved));
    }

    /// Number of cached resolutions.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// The literal path, then the path with each extension appended, then index files.
    fn resolve_path(&self, fs: &dyn FileSystem, base: &Path) -> Option<PathBuf> {
        self.resolve_file(fs, base).or_else(|| self.resolve_index(fs, base))
    }

    fn resolve_file(&self, fs: &dyn FileSystem, base: &Path) -> Option<PathBuf> {
        if fs.is_file(base) {
            return Some(base.to_path_buf());
        }
        self.extensions
            .iter()
            .map(|ext| with_suffix(base, ext))
            .find(|candidate| fs.is_file(candidate))
    }

    fn resolve_index(&self, fs: &dyn FileSystem, dir: &Path) -> Option<PathBuf> {
        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{ext}")))
            .find(|candidate| fs.is_file(candidate))
    }

    /// Walks up from `dir` looking for `node_modules/<id>`.
    fn resolve_package(&self, fs: &dyn FileSystem, dir: &Path, id: &str) -> Option<PathBuf> {
        for ancestor in dir.ancestors() {
            let modules = ancestor.join("node_modules");
            if !fs.is_dir(&modules) {
                continue;
            }
            let base = modules.join(id);
            if let Some(file) = self.resolve_file(fs, &base) {
                return Some(file);
            }
            if let Some(main) = self.package_main(fs, &base) {
                return Some(main);
            }
            if let Some(index) = self.resolve_index(fs, &base) {
                return Some(index);
            }
        }
        None
    }

    /// The file named by `main` in `package.json`, if there is one and it exists.
    fn package_main(&self, fs: &dyn FileSystem, package: &Path) -> Option<PathBuf> {
        let manifest = fs.read_to_string(&package.join("package.json")).ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&manifest).ok()?;
        let main = manifest.get("main")?.as_str()?;
        self.resolve_path(fs, &normalize(&package.join(main)))
    }
}

fn is_path_like(id: &str) -> bool {
    id == "." || id == ".." || id.starts_with("./") || id.starts_with("../") || Path::new(id).is_absolute()
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}
