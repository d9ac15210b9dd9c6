//! Object storage: the property table, internal slots and own-property operations.
//!
//! Everything here works on a single object and never runs JavaScript. Prototype walks,
//! accessor invocation and coercions live in `convert.rs`, where the interpreter is at hand.

use std::{
    cell::{Ref, RefCell, RefMut},
    collections::BTreeSet,
    fmt,
    rc::Rc,
};

use ahash::RandomState;
use indexmap::{IndexMap, IndexSet};

use super::{
    function::FunctionData,
    iter::IterCursor,
    promise::PromiseData,
    regexp::RegExpData,
    value::{HashKey, Value},
};

pub(crate) type PropMap = IndexMap<Rc<str>, Property, RandomState>;

#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor { get: Option<Value>, set: Option<Value> },
}

/// A property descriptor together with its value or accessor pair.
#[derive(Clone)]
pub(crate) struct Property {
    pub slot: Slot,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable, configurable: what plain assignment creates.
    pub fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable but not enumerable, like built-in methods.
    pub fn hidden(value: Value) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    pub fn readonly(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn accessor(get: Option<Value>, set: Option<Value>, enumerable: bool) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            writable: false,
            enumerable,
            configurable: true,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data(value) => Some(value),
            Slot::Accessor { .. } => None,
        }
    }
}

/// Internal slots distinguishing exotic and built-in objects.
pub(crate) enum Class {
    Ordinary,
    Array(Vec<Value>),
    Function(FunctionData),
    Error,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Date(f64),
    RegExp(Rc<RegExpData>),
    Map(IndexMap<HashKey, Value, RandomState>),
    Set(IndexSet<HashKey, RandomState>),
    Promise(PromiseData),
    Iterator(IterCursor),
}

pub(crate) struct JsObject {
    pub class: Class,
    pub proto: Option<ObjRef>,
    pub props: PropMap,
    pub extensible: bool,
    /// Set by `Object.freeze`; also blocks array element writes.
    pub frozen: bool,
    /// Array indices below the length that hold no element.
    pub holes: BTreeSet<usize>,
}

impl JsObject {
    pub fn new(class: Class, proto: Option<ObjRef>) -> Self {
        Self {
            class,
            proto,
            props: PropMap::default(),
            extensible: true,
            frozen: false,
            holes: BTreeSet::new(),
        }
    }

    pub fn get_own(&self, key: &str) -> Option<Property> {
        match &self.class {
            Class::Array(items) => {
                if key == "length" {
                    return Some(Property {
                        slot: Slot::Data(Value::from(items.len())),
                        writable: !self.frozen,
                        enumerable: false,
                        configurable: false,
                    });
                }
                if let Some(index) = array_index(key).filter(|index| !self.holes.contains(index)) {
                    return items.get(index).map(|value| Property {
                        slot: Slot::Data(value.clone()),
                        writable: !self.frozen,
                        enumerable: true,
                        configurable: !self.frozen,
                    });
                }
            }
            Class::String(s) => {
                if key == "length" {
                    return Some(Property {
                        slot: Slot::Data(Value::from(s.encode_utf16().count())),
                        writable: false,
                        enumerable: false,
                        configurable: false,
                    });
                }
                if let Some(index) = array_index(key) {
                    return utf16_unit_at(s, index).map(|unit| Property {
                        slot: Slot::Data(Value::from(unit)),
                        writable: false,
                        enumerable: true,
                        configurable: false,
                    });
                }
            }
            _ => {}
        }
        self.props.get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.get_own(key).is_some()
    }

    /// Writes an existing own data property or creates a new one, honouring
    /// writability and extensibility. Returns false when the write was refused.
    pub fn put_own(&mut self, key: &str, value: Value) -> bool {
        if self.frozen {
            return false;
        }
        if let Class::Array(items) = &mut self.class {
            if key == "length" {
                let Value::Number(len) = value else {
                    return false;
                };
                if len < 0.0 || len.fract() != 0.0 {
                    return false;
                }
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked non-negative integer")]
                resize_items(items, &mut self.holes, len as usize);
                return true;
            }
            if let Some(index) = array_index(key) {
                if index >= items.len() {
                    if !self.extensible {
                        return false;
                    }
                    resize_items(items, &mut self.holes, index + 1);
                }
                items[index] = value;
                self.holes.remove(&index);
                return true;
            }
        }
        match self.props.get_mut(key) {
            Some(prop) => match &mut prop.slot {
                Slot::Data(slot) if prop.writable => {
                    *slot = value;
                    true
                }
                _ => false,
            },
            None if self.extensible => {
                self.props.insert(key.into(), Property::data(value));
                true
            }
            None => false,
        }
    }

    /// `[[DefineOwnProperty]]` without validation beyond configurability.
    pub fn define(&mut self, key: &str, prop: Property) -> bool {
        if let Class::Array(items) = &mut self.class {
            if let (Some(index), Slot::Data(value)) = (array_index(key), &prop.slot) {
                if self.frozen {
                    return false;
                }
                if index >= items.len() {
                    resize_items(items, &mut self.holes, index + 1);
                }
                items[index] = value.clone();
                self.holes.remove(&index);
                return true;
            }
            if key == "length" {
                if let Slot::Data(value) = prop.slot {
                    return self.put_own(key, value);
                }
                return false;
            }
        }
        match self.props.get(key) {
            Some(existing) if !existing.configurable => {
                // a non-configurable data property may still change value while writable
                match (&existing.slot, prop.slot) {
                    (Slot::Data(_), Slot::Data(value)) if existing.writable => {
                        self.props.insert(key.into(), Property {
                            slot: Slot::Data(value),
                            ..existing.clone()
                        });
                        true
                    }
                    _ => false,
                }
            }
            Some(_) => {
                self.props.insert(key.into(), prop);
                true
            }
            None if self.extensible => {
                self.props.insert(key.into(), prop);
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if let Class::Array(items) = &mut self.class {
            if key == "length" {
                return false;
            }
            if let Some(index) = array_index(key) {
                if self.frozen {
                    return false;
                }
                if let Some(slot) = items.get_mut(index) {
                    *slot = Value::Undefined;
                    self.holes.insert(index);
                }
                return true;
            }
        }
        match self.props.get(key) {
            Some(prop) if !prop.configurable || self.frozen => false,
            Some(_) => {
                self.props.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Own property keys in ECMAScript order: integer keys ascending, then strings in
    /// insertion order.
    pub fn own_keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = Vec::new();
        match &self.class {
            Class::Array(items) => keys.extend(
                (0..items.len())
                    .filter(|i| !self.holes.contains(i))
                    .map(|i| Rc::from(i.to_string())),
            ),
            Class::String(s) => keys.extend((0..s.encode_utf16().count()).map(|i| Rc::from(i.to_string()))),
            _ => {}
        }
        let mut integer_keys: Vec<(usize, &Rc<str>)> =
            self.props.keys().filter_map(|k| array_index(k).map(|i| (i, k))).collect();
        integer_keys.sort_by_key(|(i, _)| *i);
        keys.extend(integer_keys.into_iter().map(|(_, k)| k.clone()));
        keys.extend(self.props.keys().filter(|k| array_index(k).is_none()).cloned());
        keys
    }

    pub fn own_enumerable_keys(&self) -> Vec<Rc<str>> {
        self.own_keys()
            .into_iter()
            .filter(|key| self.get_own(key).is_some_and(|p| p.enumerable))
            .collect()
    }

    pub fn array_items(&self) -> Option<&Vec<Value>> {
        match &self.class {
            Class::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<&FunctionData> {
        match &self.class {
            Class::Function(data) => Some(data),
            _ => None,
        }
    }
}

/// Shared handle to a heap object. Equality is identity.
#[derive(Clone)]
pub(crate) struct ObjRef(Rc<RefCell<JsObject>>);

impl ObjRef {
    pub fn new(obj: JsObject) -> Self {
        Self(Rc::new(RefCell::new(obj)))
    }

    pub fn borrow(&self) -> Ref<'_, JsObject> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, JsObject> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.borrow().class, Class::Function(_))
    }

    pub fn is_constructor(&self) -> bool {
        self.borrow().function().is_some_and(|f| f.is_constructor)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().class, Class::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.borrow().class, Class::Error)
    }

    pub fn proto(&self) -> Option<Self> {
        self.borrow().proto.clone()
    }

    pub fn get_own(&self, key: &str) -> Option<Property> {
        self.borrow().get_own(key)
    }

    pub fn define(&self, key: &str, prop: Property) -> bool {
        self.borrow_mut().define(key, prop)
    }

    /// Defines a non-enumerable data property, the shape used for built-ins.
    pub fn define_hidden(&self, key: &str, value: impl Into<Value>) {
        self.borrow_mut().define(key, Property::hidden(value.into()));
    }

    /// Defines an ordinary enumerable data property.
    pub fn define_data(&self, key: &str, value: impl Into<Value>) {
        self.borrow_mut().define(key, Property::data(value.into()));
    }

    /// Own data value, without invoking getters.
    pub fn own_value(&self, key: &str) -> Option<Value> {
        self.get_own(key).and_then(|p| p.value().cloned())
    }

    /// Searches the prototype chain for `key` without running accessors.
    pub fn lookup(&self, key: &str) -> Option<Property> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(prop) = obj.get_own(key) {
                return Some(prop);
            }
            current = obj.proto();
        }
        None
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Walks the prototype chain looking for `target`.
    pub fn inherits_from(&self, target: &Self) -> bool {
        let mut current = self.proto();
        while let Some(obj) = current {
            if obj.ptr_eq(target) {
                return true;
            }
            current = obj.proto();
        }
        false
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(obj) => match &obj.class {
                Class::Array(items) => write!(f, "[Array({})]", items.len()),
                Class::Function(_) => write!(f, "[Function]"),
                _ => write!(f, "[object #{:x}]", self.addr()),
            },
            Err(_) => write!(f, "[object (borrowed)]"),
        }
    }
}

/// Sets the array length; new slots are holes and holes past the end are dropped.
fn resize_items(items: &mut Vec<Value>, holes: &mut BTreeSet<usize>, len: usize) {
    if len < items.len() {
        holes.split_off(&len);
    } else {
        holes.extend(items.len()..len);
    }
    items.resize(len, Value::Undefined);
}

/// Parses a canonical array index (`"0"`, `"17"`, never `"01"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    key.parse::<u32>().ok().filter(|&i| i != u32::MAX).map(|i| i as usize)
}

/// The UTF-16 code unit at `index`, as a one-unit string.
pub(crate) fn utf16_unit_at(s: &str, index: usize) -> Option<String> {
    let unit = s.encode_utf16().nth(index)?;
    Some(String::from_utf16_lossy(&[unit]))
}
