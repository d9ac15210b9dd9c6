use std::rc::Rc;

use super::{ErrorType, builtins, object::ObjRef, scope::ScopeRef};

/// Prototype objects shared by everything allocated in one realm.
pub(crate) struct Intrinsics {
    pub object_proto: ObjRef,
    pub function_proto: ObjRef,
    pub array_proto: ObjRef,
    pub string_proto: ObjRef,
    pub number_proto: ObjRef,
    pub boolean_proto: ObjRef,
    pub error_proto: ObjRef,
    pub type_error_proto: ObjRef,
    pub range_error_proto: ObjRef,
    pub syntax_error_proto: ObjRef,
    pub reference_error_proto: ObjRef,
    pub promise_proto: ObjRef,
    pub map_proto: ObjRef,
    pub set_proto: ObjRef,
    pub regexp_proto: ObjRef,
    pub date_proto: ObjRef,
    pub iterator_proto: ObjRef,
}

impl Intrinsics {
    pub fn error_proto(&self, kind: ErrorType) -> &ObjRef {
        match kind {
            ErrorType::Error => &self.error_proto,
            ErrorType::TypeError => &self.type_error_proto,
            ErrorType::RangeError => &self.range_error_proto,
            ErrorType::SyntaxError => &self.syntax_error_proto,
            ErrorType::ReferenceError => &self.reference_error_proto,
        }
    }
}

/// A global object, its scope and the intrinsics it was created with.
pub(crate) struct Realm {
    pub global: ObjRef,
    pub global_scope: ScopeRef,
    pub intrinsics: Intrinsics,
}

impl Realm {
    /// Creates a realm whose global object carries the standard intrinsics.
    pub fn new() -> Rc<Self> {
        builtins::create_realm()
    }
}
