//! Function objects and the call/construct machinery.

use std::rc::Rc;

use super::{
    Interp, JsResult,
    code::{FunctionCode, FunctionNode},
    object::{Class, JsObject, ObjRef, Property},
    realm::Realm,
    scope::{DerivedCtor, FunctionFrame, Scope, ScopeKind, ScopeRef},
    value::Value,
};

/// Signature shared by every built-in: `(interp, this, args)`.
pub(crate) type NativeFn = Rc<dyn Fn(&mut Interp, &Value, &[Value]) -> JsResult<Value>>;

pub(crate) struct FunctionData {
    pub kind: FunctionKind,
    pub is_constructor: bool,
}

pub(crate) enum FunctionKind {
    Closure(Rc<Closure>),
    Class(Rc<ClassCtor>),
    Native(NativeFunction),
    Bound(Rc<BoundFunction>),
}

/// A user function together with the environment it closes over.
pub(crate) struct Closure {
    pub code: Rc<FunctionCode>,
    pub env: ScopeRef,
    pub realm: Rc<Realm>,
    pub home: Option<ObjRef>,
    pub filename: Rc<str>,
}

/// A class constructor. Instance fields are initialised when the base constructor
/// runs, or right after `super()` returns in a derived class.
pub(crate) struct ClassCtor {
    pub name: Rc<str>,
    pub ctor: Option<Rc<FunctionCode>>,
    /// Source of the whole class, for `toString`.
    pub text: Rc<str>,
    pub env: ScopeRef,
    pub realm: Rc<Realm>,
    pub parent: Option<Value>,
    pub prototype: ObjRef,
    pub fields: Vec<FieldDef>,
    pub filename: Rc<str>,
}

pub(crate) struct FieldDef {
    pub key: Rc<str>,
    pub value: Option<Rc<FunctionCode>>,
}

/// A built-in. `construct` receives the freshly allocated `this` object.
pub(crate) struct NativeFunction {
    pub call: Option<NativeFn>,
    pub construct: Option<NativeFn>,
}

pub(crate) struct BoundFunction {
    pub target: ObjRef,
    pub this: Value,
    pub args: Vec<Value>,
}

/// Creates a native function object with `name` and `length` set.
pub(crate) fn native_function(
    function_proto: &ObjRef,
    name: &str,
    length: usize,
    call: Option<NativeFn>,
    construct: Option<NativeFn>,
) -> ObjRef {
    let is_constructor = construct.is_some();
    let obj = ObjRef::new(JsObject::new(
        Class::Function(FunctionData {
            kind: FunctionKind::Native(NativeFunction { call, construct }),
            is_constructor,
        }),
        Some(function_proto.clone()),
    ));
    define_name_and_length(&obj, name, length);
    obj
}

fn define_name_and_length(obj: &ObjRef, name: &str, length: usize) {
    obj.define("length", Property::readonly(Value::from(length)));
    obj.define("name", Property::readonly(Value::from(name)));
}

impl Interp {
    /// Creates a function object for a function-like node of the running code.
    /// Methods get a `home` object and are never constructors.
    pub(crate) fn make_closure(
        &mut self,
        node: FunctionNode<'_>,
        name: &str,
        env: &ScopeRef,
        home: Option<ObjRef>,
    ) -> ObjRef {
        let code = self.code.nested(node);
        let is_constructor = !code.is_arrow && !code.is_async && home.is_none();
        let length = code.expected_args();
        let obj = ObjRef::new(JsObject::new(
            Class::Function(FunctionData {
                kind: FunctionKind::Closure(Rc::new(Closure {
                    code,
                    env: env.clone(),
                    realm: self.realm.clone(),
                    home,
                    filename: self.filename.clone(),
                })),
                is_constructor,
            }),
            Some(self.realm.intrinsics.function_proto.clone()),
        ));
        define_name_and_length(&obj, name, length);
        if is_constructor {
            let prototype = self.new_object();
            prototype.define_hidden("constructor", obj.clone());
            obj.define(
                "prototype",
                Property {
                    enumerable: false,
                    configurable: false,
                    ..Property::data(Value::Object(prototype))
                },
            );
        }
        obj
    }

    /// Creates the constructor object for a class.
    pub(crate) fn make_class_ctor(&mut self, ctor: ClassCtor, proto_of_ctor: ObjRef) -> ObjRef {
        let length = ctor.ctor.as_deref().map_or(0, FunctionCode::expected_args);
        let name = ctor.name.clone();
        let prototype = ctor.prototype.clone();
        let obj = ObjRef::new(JsObject::new(
            Class::Function(FunctionData {
                kind: FunctionKind::Class(Rc::new(ctor)),
                is_constructor: true,
            }),
            Some(proto_of_ctor),
        ));
        define_name_and_length(&obj, &name, length);
        obj.define(
            "prototype",
            Property {
                writable: false,
                enumerable: false,
                configurable: false,
                ..Property::data(Value::Object(prototype.clone()))
            },
        );
        prototype.define_hidden("constructor", obj.clone());
        obj
    }

    /// `[[Call]]`
    pub(crate) fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> JsResult<Value> {
        let Some(obj) = callee.as_object() else {
            return Err(self.type_error(format!("{} is not a function", self.describe_for_error(callee))));
        };
        enum Target {
            Native(NativeFn),
            Closure(Rc<Closure>),
            Bound(Rc<BoundFunction>),
            ClassCtor(Rc<str>),
            RequiresNew,
            NotCallable,
        }
        let target = match obj.borrow().function().map(|f| &f.kind) {
            Some(FunctionKind::Native(native)) => match &native.call {
                Some(call) => Target::Native(call.clone()),
                None => Target::RequiresNew,
            },
            Some(FunctionKind::Closure(closure)) => Target::Closure(closure.clone()),
            Some(FunctionKind::Bound(bound)) => Target::Bound(bound.clone()),
            Some(FunctionKind::Class(class)) => Target::ClassCtor(class.name.clone()),
            None => Target::NotCallable,
        };
        match target {
            Target::Native(call) => {
                self.enter_frame()?;
                let result = call(self, &this, args);
                self.leave_frame();
                result
            }
            Target::Closure(closure) => self.call_closure(&closure, this, args),
            Target::Bound(bound) => {
                let mut all_args = bound.args.clone();
                all_args.extend_from_slice(args);
                self.call(&Value::Object(bound.target.clone()), bound.this.clone(), &all_args)
            }
            Target::ClassCtor(name) => Err(self.type_error(format!(
                "Class constructor {name} cannot be invoked without 'new'"
            ))),
            Target::RequiresNew => Err(self.type_error(format!(
                "Constructor {} requires 'new'",
                self.describe_for_error(callee)
            ))),
            Target::NotCallable => {
                Err(self.type_error(format!("{} is not a function", self.describe_for_error(callee))))
            }
        }
    }

    /// `new callee(...args)`
    pub(crate) fn construct(&mut self, callee: &Value, args: &[Value]) -> JsResult<Value> {
        let Some(obj) = callee.as_object().filter(|obj| obj.is_constructor()) else {
            return Err(self.type_error(format!("{} is not a constructor", self.describe_for_error(callee))));
        };
        let proto = match self.get(callee, "prototype")? {
            Value::Object(proto) => proto,
            _ => self.realm.intrinsics.object_proto.clone(),
        };
        let this = ObjRef::new(JsObject::new(Class::Ordinary, Some(proto)));
        self.construct_into(obj, &this, args)
    }

    /// Runs `ctor` against an already allocated `this`, returning the constructed object.
    pub(crate) fn construct_into(&mut self, ctor: &ObjRef, this: &ObjRef, args: &[Value]) -> JsResult<Value> {
        enum Target {
            Native(NativeFn),
            Closure(Rc<Closure>),
            Class(Rc<ClassCtor>),
            Bound(Rc<BoundFunction>),
            None,
        }
        let target = match ctor.borrow().function().map(|f| &f.kind) {
            Some(FunctionKind::Native(native)) => native.construct.clone().map_or(Target::None, Target::Native),
            Some(FunctionKind::Closure(closure)) => Target::Closure(closure.clone()),
            Some(FunctionKind::Class(class)) => Target::Class(class.clone()),
            Some(FunctionKind::Bound(bound)) => Target::Bound(bound.clone()),
            None => Target::None,
        };
        let this_value = Value::Object(this.clone());
        let result = match target {
            Target::Native(construct) => {
                self.enter_frame()?;
                let result = construct(self, &this_value, args);
                self.leave_frame();
                result?
            }
            Target::Closure(closure) => self.call_closure(&closure, this_value.clone(), args)?,
            Target::Class(class) => self.run_class_ctor(&class, this, args)?,
            Target::Bound(bound) => {
                let mut all_args = bound.args.clone();
                all_args.extend_from_slice(args);
                self.construct_into(&bound.target, this, &all_args)?
            }
            Target::None => {
                return Err(self.type_error(format!(
                    "{} is not a constructor",
                    self.describe_for_error(&Value::Object(ctor.clone()))
                )));
            }
        };
        Ok(match result {
            Value::Object(obj) => Value::Object(obj),
            _ => this_value,
        })
    }

    fn run_class_ctor(&mut self, class: &Rc<ClassCtor>, this: &ObjRef, args: &[Value]) -> JsResult<Value> {
        let Some(code) = class.ctor.clone() else {
            // implicit constructor: forward everything to the parent
            let instance = match &class.parent {
                Some(Value::Object(parent)) => match self.construct_into(parent, this, args)? {
                    Value::Object(obj) => obj,
                    _ => this.clone(),
                },
                _ => this.clone(),
            };
            self.init_fields(class, &instance)?;
            return Ok(Value::Object(instance));
        };
        let derived = match &class.parent {
            Some(parent) => Some(DerivedCtor {
                class: class.clone(),
                parent: parent.clone(),
                pending_this: this.clone(),
            }),
            None => {
                self.init_fields(class, this)?;
                None
            }
        };
        let is_derived = derived.is_some();
        let frame = FunctionFrame {
            this: std::cell::RefCell::new((!is_derived).then(|| Value::Object(this.clone()))),
            home: Some(class.prototype.clone()),
            args: args.into(),
            derived,
        };
        let scope = Scope::child(&class.env, ScopeKind::Function(Box::new(frame)));
        self.enter_frame()?;
        let saved_realm = std::mem::replace(&mut self.realm, class.realm.clone());
        let saved_filename = std::mem::replace(&mut self.filename, class.filename.clone());
        let saved_code = std::mem::replace(&mut self.code, code.clone());
        let result = self.run_function_body(&code, &scope, args);
        self.code = saved_code;
        self.realm = saved_realm;
        self.filename = saved_filename;
        self.leave_frame();
        let returned = result?;
        if let Value::Object(obj) = returned {
            return Ok(Value::Object(obj));
        }
        let this_value = scope.function_frame().and_then(|frame| frame.this.borrow().clone());
        this_value.ok_or_else(|| {
            self.reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
        })
    }

    /// Handles `super(...args)` inside a derived constructor.
    pub(crate) fn super_call(&mut self, scope: &ScopeRef, args: &[Value]) -> JsResult<Value> {
        let Some(frame) = scope.function_frame() else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        let Some(derived) = &frame.derived else {
            return Err(self.syntax_error("'super' keyword unexpected here"));
        };
        if frame.this.borrow().is_some() {
            return Err(self.reference_error("Super constructor may only be called once"));
        }
        let (class, parent, pending) = (derived.class.clone(), derived.parent.clone(), derived.pending_this.clone());
        let Some(parent_obj) = parent.as_object().filter(|p| p.is_constructor()) else {
            return Err(self.type_error("Super constructor is not a constructor"));
        };
        let instance = match self.construct_into(parent_obj, &pending, args)? {
            Value::Object(obj) => obj,
            _ => pending,
        };
        if let Some(frame) = scope.function_frame() {
            *frame.this.borrow_mut() = Some(Value::Object(instance.clone()));
        }
        self.init_fields(&class, &instance)?;
        Ok(Value::Undefined)
    }

    fn init_fields(&mut self, class: &ClassCtor, this: &ObjRef) -> JsResult<()> {
        for field in &class.fields {
            let value = match &field.value {
                Some(code) => {
                    let frame = FunctionFrame {
                        this: std::cell::RefCell::new(Some(Value::Object(this.clone()))),
                        home: Some(class.prototype.clone()),
                        args: Rc::from([]),
                        derived: None,
                    };
                    let scope = Scope::child(&class.env, ScopeKind::Function(Box::new(frame)));
                    let saved_code = std::mem::replace(&mut self.code, code.clone());
                    let value = self.run_function_body(code, &scope, &[]);
                    self.code = saved_code;
                    let value = value?;
                    self.name_anonymous(&value, &field.key);
                    value
                }
                None => Value::Undefined,
            };
            this.define(&field.key, Property::data(value));
        }
        Ok(())
    }

    /// Calls a user function. `this` is ignored for arrows, which inherit it lexically.
    pub(crate) fn call_closure(
        &mut self,
        closure: &Closure,
        this: Value,
        args: &[Value],
    ) -> JsResult<Value> {
        let code = closure.code.clone();
        let kind = if code.is_arrow {
            ScopeKind::Arrow
        } else {
            // sloppy mode: a missing receiver becomes the global object
            let this = if this.is_nullish() {
                closure
                    .env
                    .root_global()
                    .map_or(Value::Undefined, |global| Value::Object(global.clone()))
            } else {
                this
            };
            ScopeKind::Function(Box::new(FunctionFrame {
                this: std::cell::RefCell::new(Some(this)),
                home: closure.home.clone(),
                args: args.into(),
                derived: None,
            }))
        };
        let scope = Scope::child(&closure.env, kind);
        let saved_realm = std::mem::replace(&mut self.realm, closure.realm.clone());
        let saved_filename = std::mem::replace(&mut self.filename, closure.filename.clone());
        let saved_completion = std::mem::take(&mut self.completion);
        let saved_code = std::mem::replace(&mut self.code, code.clone());
        let result = match self.enter_frame() {
            Ok(()) => {
                let result = self.run_function_body(&code, &scope, args);
                self.leave_frame();
                result
            }
            Err(thrown) => Err(thrown),
        };
        self.code = saved_code;
        self.completion = saved_completion;
        self.filename = saved_filename;
        let result = if code.is_async {
            let promise = self.new_promise();
            match result {
                Ok(value) => self.resolve_promise(&promise, value),
                Err(thrown) => self.reject_promise(&promise, thrown.0),
            }
            Ok(Value::Object(promise))
        } else {
            result
        };
        self.realm = saved_realm;
        result
    }

    /// `Function.prototype.bind`
    pub(crate) fn bind_function(&mut self, target: &ObjRef, this: Value, args: Vec<Value>) -> JsResult<ObjRef> {
        let name = match self.get(&Value::Object(target.clone()), "name")? {
            Value::String(name) => name,
            _ => Rc::from(""),
        };
        let length = match target.own_value("length") {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "lengths are small non-negative integers")]
            Some(Value::Number(n)) => (n as usize).saturating_sub(args.len()),
            _ => 0,
        };
        let is_constructor = target.is_constructor();
        let obj = ObjRef::new(JsObject::new(
            Class::Function(FunctionData {
                kind: FunctionKind::Bound(Rc::new(BoundFunction {
                    target: target.clone(),
                    this,
                    args,
                })),
                is_constructor,
            }),
            target.proto(),
        ));
        define_name_and_length(&obj, &format!("bound {name}"), length);
        Ok(obj)
    }

    /// Gives an anonymous function or class the name it is being bound to.
    pub(crate) fn name_anonymous(&self, value: &Value, name: &str) {
        let Value::Object(obj) = value else { return };
        if !obj.is_callable() {
            return;
        }
        let unnamed = matches!(obj.own_value("name"), Some(Value::String(n)) if n.is_empty());
        if unnamed {
            obj.define("name", Property::readonly(Value::from(name)));
        }
    }

    /// Short rendering of a value for "x is not a function" style messages.
    pub(crate) fn describe_for_error(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{s}\""),
            Value::Object(obj) if obj.is_callable() => match obj.own_value("name") {
                Some(Value::String(name)) if !name.is_empty() => name.to_string(),
                _ => "function".to_owned(),
            },
            Value::Object(_) => "object".to_owned(),
            other => format!("{other:?}"),
        }
    }
}
