//! Namespace sandboxes.
//!
//! A namespace is a realm of its own whose global object holds everything the user has
//! defined for one logical file, plus the bindings the sandbox installs for itself.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};
use log::info;

use crate::{
    config::EngineConfig,
    fs::FileSystem,
    interp::{Class, Interp, JsObject, ObjRef, Origin, Realm, Slot, Value, make_console},
    modules::{NamespaceDirectory, RequireContext, make_require},
    repl_error::ReplError,
    resolver::Resolver,
};

/// Shallow copy of a namespace's definitions: name to current value.
///
/// Accessor properties are recorded by their getter, so redefining the accessor counts as a
/// change while the value it computes does not.
pub(crate) type Snapshot = IndexMap<String, Value>;

pub(crate) struct Namespace {
    pub id: String,
    pub realm: Rc<Realm>,
    /// Own keys of the sandbox global that are not reserved, in insertion order.
    pub definitions: IndexSet<String>,
    /// Charged with console output, timers and faults of code running here.
    pub origin: Rc<Origin>,
    pub resolver: Rc<RefCell<Resolver>>,
}

impl Namespace {
    /// Allocates a sandbox for `id` and registers its global in `directory`.
    pub fn create(
        interp: &Interp,
        config: &EngineConfig,
        fs: &Rc<dyn FileSystem>,
        directory: &NamespaceDirectory,
        session_id: &str,
        id: &str,
        working_dir: &Path,
    ) -> Result<Self, ReplError> {
        if !fs.is_dir(working_dir) {
            return Err(ReplError::NamespaceCreation {
                namespace: id.to_owned(),
                reason: format!("working directory '{}' is not a directory", working_dir.display()),
            });
        }
        let realm = interp.new_realm();
        let global = realm.global.clone();

        let host_global = &interp.host.global;
        for key in host_global.borrow().own_keys() {
            if config.intrinsics.contains(&key) {
                continue;
            }
            if let Some(prop) = host_global.get_own(&key) {
                global.define(&key, prop);
            }
        }

        let resolver = Rc::new(RefCell::new(Resolver::new(
            config.virtual_prefix.clone(),
            config.source_extensions.clone(),
        )));
        let ctx = RequireContext {
            fs: fs.clone(),
            resolver: resolver.clone(),
            directory: directory.clone(),
        };
        let filename = if Path::new(id).is_absolute() {
            PathBuf::from(id)
        } else {
            working_dir.join(id)
        };
        let dirname = filename.parent().map_or_else(|| working_dir.to_path_buf(), Path::to_path_buf);
        let filename = filename.to_string_lossy().into_owned();
        let dirname = dirname.to_string_lossy().into_owned();

        let new_object = || ObjRef::new(JsObject::new(Class::Ordinary, Some(realm.intrinsics.object_proto.clone())));
        let exports = new_object();
        let module = new_object();
        module.define_data("id", id);
        module.define_data("filename", filename.as_str());
        module.define_data("path", dirname.as_str());
        module.define_data("exports", exports.clone());
        module.define_data("loaded", false);

        let origin = Rc::new(Origin {
            session_id: session_id.to_owned(),
            namespace_id: id.to_owned(),
        });
        global.define_data("require", make_require(&ctx, working_dir, &realm.intrinsics.function_proto));
        global.define_data("module", module);
        global.define_data("exports", exports);
        global.define_data("__filename", filename);
        global.define_data("__dirname", dirname);
        global.define_data("console", make_console(&realm, Some(origin.clone())));
        global.define_data("global", global.clone());
        global.define_hidden("globalThis", global.clone());
        global.define_data("$1", Value::Undefined);
        global.define_data("$2", Value::Undefined);

        directory.borrow_mut().insert(id.to_owned(), global);
        info!("created namespace {id} in session {session_id}");
        let mut namespace = Self {
            id: id.to_owned(),
            realm,
            definitions: IndexSet::new(),
            origin,
            resolver,
        };
        namespace.sync_definitions(config);
        Ok(namespace)
    }

    pub fn global(&self) -> &ObjRef {
        &self.realm.global
    }

    /// Recomputes the definition set from the sandbox global.
    pub fn sync_definitions(&mut self, config: &EngineConfig) {
        let keys = self.global().borrow().own_keys();
        self.definitions = keys
            .into_iter()
            .filter(|key| !config.is_reserved(key))
            .map(|key| key.to_string())
            .collect();
    }

    /// Current definitions with their values, read without running getters.
    pub fn snapshot(&self, config: &EngineConfig) -> Snapshot {
        let global = self.global().borrow();
        global
            .own_keys()
            .into_iter()
            .filter(|key| !config.is_reserved(key))
            .map(|key| {
                let value = match global.get_own(&key).map(|prop| prop.slot) {
                    Some(Slot::Data(value)) => value,
                    Some(Slot::Accessor { get, .. }) => get.unwrap_or_default(),
                    None => Value::Undefined,
                };
                (key.to_string(), value)
            })
            .collect()
    }

    /// Shifts the last-result slots: `$2 = $1; $1 = value`.
    pub fn record_result(&self, value: Value) {
        let global = self.global();
        let previous = global.own_value("$1").unwrap_or_default();
        global.define_data("$2", previous);
        global.define_data("$1", value);
    }

    /// Removes a definition from the sandbox. Returns `false` if there was none.
    pub fn unmap(&mut self, symbol: &str) -> bool {
        if !self.definitions.shift_remove(symbol) {
            return false;
        }
        self.global().borrow_mut().props.shift_remove(symbol);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn namespace(interp: &Interp, config: &EngineConfig) -> Namespace {
        let fs: Rc<dyn FileSystem> = Rc::new(MemoryFileSystem::new().with_file("/work/index.ts", ""));
        let directory = NamespaceDirectory::default();
        let created = Namespace::create(interp, config, &fs, &directory, "s", "index.ts", Path::new("/work"));
        match created {
            Ok(namespace) => namespace,
            Err(err) => panic!("namespace creation failed: {err}"),
        }
    }

    #[test]
    fn baseline_covers_every_realm_global() {
        let config = EngineConfig::default();
        let realm = Realm::new();
        let keys = realm.global.borrow().own_keys();
        let missing: Vec<_> = keys.iter().filter(|key| !config.intrinsics.contains(key)).collect();
        assert!(missing.is_empty(), "not in baseline: {missing:?}");
    }

    #[test]
    fn fresh_namespace_has_no_definitions() {
        let config = EngineConfig::default();
        let interp = Interp::new(config.recursion_limit);
        let ns = namespace(&interp, &config);
        assert!(ns.definitions.is_empty(), "{:?}", ns.definitions);
        for name in ["setTimeout", "process", "require", "module", "console"] {
            assert!(ns.global().borrow().has_own(name), "missing {name}");
        }
    }

    #[test]
    fn missing_working_dir_fails() {
        let config = EngineConfig::default();
        let interp = Interp::new(config.recursion_limit);
        let fs: Rc<dyn FileSystem> = Rc::new(MemoryFileSystem::new());
        let directory = NamespaceDirectory::default();
        let created = Namespace::create(&interp, &config, &fs, &directory, "s", "a.ts", Path::new("/nowhere"));
        assert!(matches!(created, Err(ReplError::NamespaceCreation { .. })));
    }

    #[test]
    fn last_results_shift() {
        let config = EngineConfig::default();
        let interp = Interp::new(config.recursion_limit);
        let ns = namespace(&interp, &config);
        ns.record_result(Value::from(1.0));
        ns.record_result(Value::from(2.0));
        assert!(matches!(ns.global().own_value("$1"), Some(Value::Number(n)) if n.to_bits() == 2.0f64.to_bits()));
        assert!(matches!(ns.global().own_value("$2"), Some(Value::Number(n)) if n.to_bits() == 1.0f64.to_bits()));
    }
}
