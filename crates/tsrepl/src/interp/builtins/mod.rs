//! The standard library installed into every realm, plus the host globals.
//!
//! Each submodule installs one family of built-ins onto the prototypes created by
//! [`create_realm`]. Natives never capture their realm: they allocate through
//! `interp.realm`, which is the realm of the calling code.

mod array;
mod collections;
mod console;
mod date;
mod error;
mod function;
mod host;
mod json;
mod math;
mod number;
mod object;
mod promise;
mod string;

use std::rc::Rc;

pub(crate) use self::{
    console::make_console,
    date::iso_string,
    host::install_host_globals,
    json::from_json,
};
use super::{
    Interp, JsResult,
    function::{NativeFn, native_function},
    object::{Class, JsObject, ObjRef, Property},
    realm::{Intrinsics, Realm},
    regexp,
    scope::Scope,
    value::Value,
};

/// A built-in implemented as a plain function.
pub(super) type Builtin = fn(&mut Interp, &Value, &[Value]) -> JsResult<Value>;

/// Helper for defining natives against one realm's `Function.prototype`.
pub(super) struct Installer<'a> {
    pub function_proto: &'a ObjRef,
}

impl Installer<'_> {
    pub fn function(&self, name: &str, length: usize, f: Builtin) -> ObjRef {
        native_function(self.function_proto, name, length, Some(Rc::new(f) as NativeFn), None)
    }

    /// Installs a non-enumerable method.
    pub fn method(&self, target: &ObjRef, name: &str, length: usize, f: Builtin) {
        target.define_hidden(name, self.function(name, length, f));
    }

    /// Installs a non-enumerable getter.
    pub fn getter(&self, target: &ObjRef, name: &str, f: Builtin) {
        let getter = self.function(&format!("get {name}"), 0, f);
        target.define(name, Property::accessor(Some(Value::Object(getter)), None, false));
    }

    /// Creates a constructor wired to `prototype`. A missing `call` makes plain calls
    /// throw "requires 'new'".
    pub fn constructor(
        &self,
        name: &str,
        length: usize,
        call: Option<Builtin>,
        construct: Builtin,
        prototype: &ObjRef,
    ) -> ObjRef {
        let ctor = native_function(
            self.function_proto,
            name,
            length,
            call.map(|f| Rc::new(f) as NativeFn),
            Some(Rc::new(construct) as NativeFn),
        );
        ctor.define(
            "prototype",
            Property {
                writable: false,
                enumerable: false,
                configurable: false,
                ..Property::data(Value::Object(prototype.clone()))
            },
        );
        prototype.define_hidden("constructor", ctor.clone());
        ctor
    }
}

/// Argument `index`, or `undefined` when absent.
pub(super) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn proto(parent: Option<&ObjRef>) -> ObjRef {
    ObjRef::new(JsObject::new(Class::Ordinary, parent.cloned()))
}

pub(super) fn create_realm() -> Rc<Realm> {
    let object_proto = proto(None);
    let child = || proto(Some(&object_proto));
    let error_proto = child();
    let error_child = || proto(Some(&error_proto));
    let intrinsics = Intrinsics {
        function_proto: child(),
        array_proto: child(),
        string_proto: child(),
        number_proto: child(),
        boolean_proto: child(),
        type_error_proto: error_child(),
        range_error_proto: error_child(),
        syntax_error_proto: error_child(),
        reference_error_proto: error_child(),
        error_proto,
        promise_proto: child(),
        map_proto: child(),
        set_proto: child(),
        regexp_proto: child(),
        date_proto: child(),
        iterator_proto: child(),
        object_proto,
    };
    let global = ObjRef::new(JsObject::new(Class::Ordinary, Some(intrinsics.object_proto.clone())));
    let installer = Installer {
        function_proto: &intrinsics.function_proto,
    };
    object::install(&installer, &intrinsics, &global);
    function::install(&installer, &intrinsics, &global);
    array::install(&installer, &intrinsics, &global);
    string::install(&installer, &intrinsics, &global);
    number::install(&installer, &intrinsics, &global);
    math::install(&installer, &intrinsics, &global);
    error::install(&installer, &intrinsics, &global);
    promise::install(&installer, &intrinsics, &global);
    collections::install(&installer, &intrinsics, &global);
    regexp::install(&installer, &intrinsics, &global);
    date::install(&installer, &intrinsics, &global);
    json::install(&installer, &intrinsics, &global);

    global.define_hidden("globalThis", global.clone());
    global.define("undefined", frozen(Value::Undefined));
    global.define("NaN", frozen(Value::Number(f64::NAN)));
    global.define("Infinity", frozen(Value::Number(f64::INFINITY)));

    let global_scope = Scope::global(global.clone());
    Rc::new(Realm {
        global,
        global_scope,
        intrinsics,
    })
}

/// A non-writable, non-enumerable, non-configurable value.
fn frozen(value: Value) -> Property {
    Property {
        configurable: false,
        ..Property::readonly(value)
    }
}
