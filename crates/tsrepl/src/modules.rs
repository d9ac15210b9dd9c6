//! `require` and the filesystem module loader.
//!
//! Each namespace gets a `require` bound to its own directory and resolver. File modules
//! are loaded once into the host realm and shared by every namespace of the registry,
//! the way a single process shares its module cache.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use ahash::AHashMap;
use log::debug;

use crate::{
    fs::FileSystem,
    interp::{ErrorType, Interp, JsResult, NativeFn, ObjRef, Realm, Throw, Value, from_json, native_function},
    resolver::{Resolution, Resolver},
    transform::transform_module,
};

/// `code` of the error thrown when an `ns:` import names a namespace that does not exist.
pub(crate) const NAMESPACE_NOT_FOUND: &str = "NAMESPACE_NOT_FOUND";

/// Sandbox globals of a session's namespaces, by namespace id.
pub(crate) type NamespaceDirectory = Rc<RefCell<AHashMap<String, ObjRef>>>;

/// Everything a `require` function needs to find modules.
#[derive(Clone)]
pub(crate) struct RequireContext {
    pub fs: Rc<dyn FileSystem>,
    pub resolver: Rc<RefCell<Resolver>>,
    pub directory: NamespaceDirectory,
}

/// Creates a `require` function resolving ids relative to `dir`, with `require.resolve`.
pub(crate) fn make_require(ctx: &RequireContext, dir: &Path, function_proto: &ObjRef) -> ObjRef {
    let require_ctx = ctx.clone();
    let require_dir = dir.to_path_buf();
    let call: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
        let id = module_id(interp, args)?;
        require(interp, &require_ctx, &require_dir, &id)
    });
    let require_fn = native_function(function_proto, "require", 1, Some(call), None);

    let resolve_ctx = ctx.clone();
    let resolve_dir = dir.to_path_buf();
    let resolve: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
        let id = module_id(interp, args)?;
        match resolve_id(interp, &resolve_ctx, &resolve_dir, &id)? {
            Resolution::Namespace(_) => Ok(Value::from(id)),
            Resolution::File(path) => Ok(Value::from(path.to_string_lossy().into_owned())),
        }
    });
    require_fn.define_hidden("resolve", native_function(function_proto, "resolve", 1, Some(resolve), None));
    require_fn
}

fn module_id(interp: &mut Interp, args: &[Value]) -> JsResult<String> {
    match args.first() {
        Some(Value::String(id)) => Ok(id.to_string()),
        other => Err(interp.type_error(format!(
            "The \"id\" argument must be of type string. Received {}",
            interp.describe_for_error(&other.cloned().unwrap_or_default())
        ))),
    }
}

fn resolve_id(interp: &Interp, ctx: &RequireContext, dir: &Path, id: &str) -> JsResult<Resolution> {
    let resolved = ctx.resolver.borrow_mut().resolve(ctx.fs.as_ref(), dir, id);
    resolved.map_err(|err| {
        debug!("{err}");
        let error = interp.make_error(ErrorType::Error, &format!("Cannot find module '{id}'"));
        error.define_hidden("code", "MODULE_NOT_FOUND");
        Throw(Value::Object(error))
    })
}

fn require(interp: &mut Interp, ctx: &RequireContext, dir: &Path, id: &str) -> JsResult<Value> {
    match resolve_id(interp, ctx, dir, id)? {
        Resolution::Namespace(namespace) => {
            let global = ctx.directory.borrow().get(&namespace).cloned();
            let Some(global) = global else {
                let error = interp.make_error(ErrorType::Error, &format!("Namespace not found: {namespace}"));
                error.define_hidden("code", NAMESPACE_NOT_FOUND);
                error.define_hidden("namespace", namespace.as_str());
                return Err(Throw(Value::Object(error)));
            };
            let exports = interp.get(&Value::Object(global), "exports")?;
            if Interp::to_boolean(&exports) {
                Ok(exports)
            } else {
                Ok(Value::Object(interp.new_object()))
            }
        }
        Resolution::File(path) => load_module(interp, ctx, &path),
    }
}

/// Loads a file module, or returns the exports of the cached copy.
fn load_module(interp: &mut Interp, ctx: &RequireContext, path: &Path) -> JsResult<Value> {
    if let Some(module) = interp.modules.get(path).cloned() {
        return interp.get(&Value::Object(module), "exports");
    }
    let source = ctx
        .fs
        .read_to_string(path)
        .map_err(|err| interp.throw(ErrorType::Error, format!("Cannot read module '{}': {err}", path.display())))?;
    debug!("loading module {}", path.display());
    let host = interp.host.clone();
    in_realm(interp, &host, |interp| {
        if path.extension().is_some_and(|ext| ext == "json") {
            load_json(interp, path, &source)
        } else {
            load_source(interp, ctx, path, &source)
        }
    })
}

/// Runs `f` with `realm` as the allocation realm.
fn in_realm<T>(interp: &mut Interp, realm: &Rc<Realm>, f: impl FnOnce(&mut Interp) -> T) -> T {
    let saved = std::mem::replace(&mut interp.realm, realm.clone());
    let result = f(interp);
    interp.realm = saved;
    result
}

fn module_object(interp: &Interp, path: &Path, exports: Value) -> ObjRef {
    let filename = path.to_string_lossy().into_owned();
    let dirname = path.parent().map(|dir| dir.to_string_lossy().into_owned()).unwrap_or_default();
    let module = interp.new_object();
    module.define_data("id", filename.clone());
    module.define_data("filename", filename);
    module.define_data("path", dirname);
    module.define_data("exports", exports);
    module.define_data("loaded", false);
    module
}

fn load_json(interp: &mut Interp, path: &Path, source: &str) -> JsResult<Value> {
    let json: serde_json::Value = serde_json::from_str(source)
        .map_err(|err| interp.syntax_error(format!("{}: Unexpected token in JSON: {err}", path.display())))?;
    let exports = from_json(interp, &json);
    let module = module_object(interp, path, exports.clone());
    module.define_data("loaded", true);
    interp.modules.insert(path.to_path_buf(), module);
    Ok(exports)
}

fn load_source(interp: &mut Interp, ctx: &RequireContext, path: &Path, source: &str) -> JsResult<Value> {
    let filename = path.to_string_lossy().into_owned();
    let transformed = transform_module(source).map_err(|err| {
        let loc = err.loc();
        interp.syntax_error(format!("{} ({filename}:{}:{})", err.message(), loc.line, loc.column))
    })?;
    let wrapper = format!(
        "(function (exports, require, module, __filename, __dirname) {{\n{}\n}})",
        transformed.code
    );
    let dir = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
    let exports = interp.new_object();
    let module = module_object(interp, path, Value::Object(exports.clone()));
    // cached before the body runs so cyclic requires see the partial exports
    interp.modules.insert(path.to_path_buf(), module.clone());

    let host = interp.host.clone();
    let require_fn = make_require(ctx, &dir, &host.intrinsics.function_proto);
    let args = [
        Value::Object(exports.clone()),
        Value::Object(require_fn),
        Value::Object(module.clone()),
        Value::from(filename.as_str()),
        Value::from(dir.to_string_lossy().into_owned()),
    ];
    let result = interp
        .run_script(&wrapper, &host, &filename)
        .and_then(|function| interp.call(&function, Value::Object(exports), &args));
    if let Err(thrown) = result {
        interp.modules.remove(path);
        return Err(thrown);
    }
    module.define_data("loaded", true);
    interp.get(&Value::Object(module), "exports")
}
