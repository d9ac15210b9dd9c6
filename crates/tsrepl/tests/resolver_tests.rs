//! `require` id resolution against in-memory and on-disk trees.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tsrepl::{EngineConfig, MemoryFileSystem, OsFileSystem, Resolution, ResolveError, Resolver};

fn resolver() -> Resolver {
    let config = EngineConfig::default();
    Resolver::new(config.virtual_prefix, config.source_extensions)
}

fn file(path: &str) -> Result<Resolution, ResolveError> {
    Ok(Resolution::File(PathBuf::from(path)))
}

fn project() -> MemoryFileSystem {
    MemoryFileSystem::new()
        .with_file("/p/src/main.ts", "")
        .with_file("/p/src/util.ts", "")
        .with_file("/p/src/util.js", "")
        .with_file("/p/src/data.json", "{}")
        .with_file("/p/src/lib/index.ts", "")
        .with_file("/p/src/raw.txt", "")
        .with_file("/p/node_modules/left-pad/index.js", "")
        .with_file("/p/node_modules/pkg/package.json", r#"{ "main": "dist/entry" }"#)
        .with_file("/p/node_modules/pkg/dist/entry.js", "")
        .with_file("/p/node_modules/single.js", "")
}

#[test]
fn prefixed_ids_name_namespaces() {
    let fs = project();
    let resolved = resolver().resolve(&fs, Path::new("/p/src"), "ns:other.ts");
    assert_eq!(resolved, Ok(Resolution::Namespace("other.ts".to_owned())));
}

#[test]
fn relative_ids_try_extensions_in_order() {
    let fs = project();
    let mut resolver = resolver();
    let dir = Path::new("/p/src");
    assert_eq!(resolver.resolve(&fs, dir, "./util"), file("/p/src/util.ts"));
    assert_eq!(resolver.resolve(&fs, dir, "./util.js"), file("/p/src/util.js"));
    assert_eq!(resolver.resolve(&fs, dir, "./data"), file("/p/src/data.json"));
    assert_eq!(resolver.resolve(&fs, dir, "./raw.txt"), file("/p/src/raw.txt"));
}

#[test]
fn directories_resolve_to_index_files() {
    let fs = project();
    let resolved = resolver().resolve(&fs, Path::new("/p/src"), "./lib");
    assert_eq!(resolved, file("/p/src/lib/index.ts"));
}

#[test]
fn parent_and_absolute_ids() {
    let fs = project();
    let mut resolver = resolver();
    assert_eq!(resolver.resolve(&fs, Path::new("/p/src/lib"), "../util"), file("/p/src/util.ts"));
    assert_eq!(resolver.resolve(&fs, Path::new("/elsewhere"), "/p/src/main"), file("/p/src/main.ts"));
}

#[test]
fn bare_ids_search_node_modules_upwards() {
    let fs = project();
    let mut resolver = resolver();
    let dir = Path::new("/p/src/lib");
    assert_eq!(resolver.resolve(&fs, dir, "left-pad"), file("/p/node_modules/left-pad/index.js"));
    assert_eq!(resolver.resolve(&fs, dir, "pkg"), file("/p/node_modules/pkg/dist/entry.js"));
    assert_eq!(resolver.resolve(&fs, dir, "single"), file("/p/node_modules/single.js"));
}

#[test]
fn missing_modules_name_the_id_and_directory() {
    let fs = project();
    let err = resolver().resolve(&fs, Path::new("/p/src"), "./missing");
    assert_eq!(
        err,
        Err(ResolveError::ModuleNotFound {
            id: "./missing".to_owned(),
            from: PathBuf::from("/p/src"),
        })
    );
    let message = err.map(|_| String::new()).unwrap_or_else(|err| err.to_string());
    assert_eq!(message, "Cannot find module './missing' from '/p/src'");
    assert!(resolver().resolve(&fs, Path::new("/p/src"), "not-installed").is_err());
}

#[test]
fn resolutions_are_cached_until_evicted() {
    let mut fs = project();
    let mut resolver = resolver();
    let dir = Path::new("/p/src");
    assert_eq!(resolver.resolve(&fs, dir, "./util"), file("/p/src/util.ts"));
    assert_eq!(resolver.cached(), 1);

    fs.remove_file("/p/src/util.ts");
    assert_eq!(resolver.resolve(&fs, dir, "./util"), file("/p/src/util.ts"));

    resolver.evict(&[PathBuf::from("/p/src/util.ts")]);
    assert_eq!(resolver.cached(), 0);
    assert_eq!(resolver.resolve(&fs, dir, "./util"), file("/p/src/util.js"));
}

#[test]
fn failures_are_not_cached() {
    let mut fs = project();
    let mut resolver = resolver();
    let dir = Path::new("/p/src");
    assert!(resolver.resolve(&fs, dir, "./later").is_err());
    assert_eq!(resolver.cached(), 0);
    fs.add_file("/p/src/later.ts", "");
    assert_eq!(resolver.resolve(&fs, dir, "./later"), file("/p/src/later.ts"));
}

#[test]
fn on_disk_resolution_is_canonical() {
    let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = dir.path();
    let write = |relative: &str, contents: &str| {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|err| panic!("mkdir: {err}"));
        }
        std::fs::write(&path, contents).unwrap_or_else(|err| panic!("write: {err}"));
    };
    write("src/a.ts", "");
    write("node_modules/dep/package.json", r#"{ "main": "lib.js" }"#);
    write("node_modules/dep/lib.js", "");

    let canonical = |relative: &str| {
        std::fs::canonicalize(root.join(relative)).unwrap_or_else(|err| panic!("canonicalize: {err}"))
    };
    let mut resolver = resolver();
    let src = root.join("src");
    assert_eq!(
        resolver.resolve(&OsFileSystem, &src, "./a"),
        Ok(Resolution::File(canonical("src/a.ts")))
    );
    assert_eq!(
        resolver.resolve(&OsFileSystem, &src, "../src/./a.ts"),
        Ok(Resolution::File(canonical("src/a.ts")))
    );
    assert_eq!(
        resolver.resolve(&OsFileSystem, &src, "dep"),
        Ok(Resolution::File(canonical("node_modules/dep/lib.js")))
    );
}
