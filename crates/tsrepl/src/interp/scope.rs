use std::{
    cell::RefCell,
    rc::Rc,
};

use ahash::AHashMap;

use super::{function::ClassCtor, object::ObjRef, value::Value};

pub(crate) type ScopeRef = Rc<Scope>;

/// A lexical environment.
///
/// The global scope stores its bindings as properties of the global object, so every
/// top-level `var`, function and (after the REPL rewrite) former `let`/`const` shows up
/// as an own key of the sandbox.
pub(crate) struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeRef>,
    bindings: RefCell<AHashMap<Rc<str>, Binding>>,
}

pub(crate) enum ScopeKind {
    Global(ObjRef),
    /// A non-arrow function body: owns `this`, `arguments` and `super`.
    Function(Box<FunctionFrame>),
    /// An arrow function body: a var scope that inherits `this`.
    Arrow,
    Block,
}

pub(crate) struct FunctionFrame {
    /// `None` inside a derived constructor until `super()` returns.
    pub this: RefCell<Option<Value>>,
    /// Object whose prototype `super.x` reads from.
    pub home: Option<ObjRef>,
    pub args: Rc<[Value]>,
    pub derived: Option<DerivedCtor>,
}

/// State of a derived class constructor waiting for its `super()` call.
pub(crate) struct DerivedCtor {
    pub class: Rc<ClassCtor>,
    pub parent: Value,
    pub pending_this: ObjRef,
}

#[derive(Clone)]
struct Binding {
    value: Option<Value>,
    mutable: bool,
}

/// Outcome of reading a binding from a declarative scope.
pub(crate) enum BindingValue {
    Value(Value),
    /// Temporal dead zone: declared with `let`/`const`/`class` but not yet initialised.
    Uninitialized,
}

/// Outcome of writing a binding from a declarative scope.
pub(crate) enum BindingWrite {
    Done,
    Uninitialized,
    Immutable,
}

impl Scope {
    pub fn global(global: ObjRef) -> ScopeRef {
        Rc::new(Self {
            kind: ScopeKind::Global(global),
            parent: None,
            bindings: RefCell::default(),
        })
    }

    pub fn child(parent: &ScopeRef, kind: ScopeKind) -> ScopeRef {
        Rc::new(Self {
            kind,
            parent: Some(parent.clone()),
            bindings: RefCell::default(),
        })
    }

    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Self::child(parent, ScopeKind::Block)
    }

    pub fn global_object(&self) -> Option<&ObjRef> {
        match &self.kind {
            ScopeKind::Global(obj) => Some(obj),
            _ => None,
        }
    }

    /// Declares an initialised binding, replacing any previous one in this scope.
    pub fn declare(&self, name: Rc<str>, value: Value, mutable: bool) {
        self.bindings.borrow_mut().insert(name, Binding {
            value: Some(value),
            mutable,
        });
    }

    /// Declares a binding in its temporal dead zone.
    pub fn declare_uninitialized(&self, name: Rc<str>, mutable: bool) {
        self.bindings.borrow_mut().insert(name, Binding { value: None, mutable });
    }

    /// Declares `name` as `undefined` unless it already exists (the `var` rule).
    pub fn declare_var(&self, name: &Rc<str>) {
        self.bindings
            .borrow_mut()
            .entry(name.clone())
            .or_insert(Binding {
                value: Some(Value::Undefined),
                mutable: true,
            });
    }

    /// Gives a binding in its dead zone its first value.
    pub fn initialize(&self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn read(&self, name: &str) -> Option<BindingValue> {
        self.bindings.borrow().get(name).map(|binding| match &binding.value {
            Some(value) => BindingValue::Value(value.clone()),
            None => BindingValue::Uninitialized,
        })
    }

    pub fn write(&self, name: &str, value: Value) -> Option<BindingWrite> {
        let mut bindings = self.bindings.borrow_mut();
        let binding = bindings.get_mut(name)?;
        Some(if binding.value.is_none() {
            BindingWrite::Uninitialized
        } else if !binding.mutable {
            BindingWrite::Immutable
        } else {
            binding.value = Some(value);
            BindingWrite::Done
        })
    }

    /// Nearest enclosing scope that `var` declarations land in.
    pub fn var_scope(self: &Rc<Self>) -> ScopeRef {
        let mut current = self.clone();
        loop {
            match current.kind {
                ScopeKind::Block => match &current.parent {
                    Some(parent) => current = parent.clone(),
                    None => return current,
                },
                _ => return current,
            }
        }
    }

    /// Nearest enclosing non-arrow function frame, if any.
    pub fn function_frame(&self) -> Option<&FunctionFrame> {
        let mut current = self;
        loop {
            match &current.kind {
                ScopeKind::Function(frame) => return Some(frame),
                ScopeKind::Global(_) => return None,
                ScopeKind::Arrow | ScopeKind::Block => current = current.parent.as_deref()?,
            }
        }
    }

    /// The global object at the root of this scope chain.
    pub fn root_global(&self) -> Option<&ObjRef> {
        let mut current = self;
        loop {
            match &current.kind {
                ScopeKind::Global(obj) => return Some(obj),
                _ => current = current.parent.as_deref()?,
            }
        }
    }
}
