//! Iteration over arrays, strings, maps, sets and `next()`-protocol objects.
//!
//! There are no symbols, so an object is iterable when it is one of the built-in
//! collections or has a callable `next` method.

use super::{
    Interp, JsResult,
    object::{Class, JsObject, ObjRef},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterKind {
    Keys,
    Values,
    Entries,
}

/// Position within an iteration.
#[derive(Clone)]
pub(crate) enum IterCursor {
    /// Reads the array live, so pushes during iteration are observed.
    Array { array: ObjRef, index: usize, kind: IterKind },
    /// Walks code points; `offset` is a byte offset.
    String { text: std::rc::Rc<str>, offset: usize },
    Map { map: ObjRef, index: usize, kind: IterKind },
    Set { set: ObjRef, index: usize, kind: IterKind },
    /// A user object with a `next` method.
    Protocol { iterator: Value, next: Value },
    Done,
}

impl Interp {
    pub(crate) fn get_iterator(&mut self, value: &Value) -> JsResult<IterCursor> {
        let obj = match value {
            Value::String(text) => {
                return Ok(IterCursor::String {
                    text: text.clone(),
                    offset: 0,
                });
            }
            Value::Object(obj) => obj.clone(),
            other => return Err(self.type_error(format!("{other:?} is not iterable"))),
        };
        let cursor = match &obj.borrow().class {
            Class::Array(_) => Some(IterCursor::Array {
                array: obj.clone(),
                index: 0,
                kind: IterKind::Values,
            }),
            Class::String(text) => Some(IterCursor::String {
                text: text.clone(),
                offset: 0,
            }),
            Class::Map(_) => Some(IterCursor::Map {
                map: obj.clone(),
                index: 0,
                kind: IterKind::Entries,
            }),
            Class::Set(_) => Some(IterCursor::Set {
                set: obj.clone(),
                index: 0,
                kind: IterKind::Values,
            }),
            _ => None,
        };
        if let Some(cursor) = cursor {
            return Ok(cursor);
        }
        let next = self.get(value, "next")?;
        if next.is_callable() {
            return Ok(IterCursor::Protocol {
                iterator: value.clone(),
                next,
            });
        }
        Err(self.type_error(format!("{} is not iterable", self.describe_for_error(value))))
    }

    /// Advances `cursor`, returning `None` once it is exhausted.
    pub(crate) fn iter_next(&mut self, cursor: &mut IterCursor) -> JsResult<Option<Value>> {
        if let IterCursor::Protocol { iterator, next } = cursor {
            let result = self.call(next, iterator.clone(), &[])?;
            if !matches!(result, Value::Object(_)) {
                return Err(self.type_error(format!(
                    "Iterator result {result:?} is not an object"
                )));
            }
            let done = self.get(&result, "done")?;
            if Self::to_boolean(&done) {
                *cursor = IterCursor::Done;
                return Ok(None);
            }
            return self.get(&result, "value").map(Some);
        }
        let item = self.step_builtin(cursor);
        if item.is_none() {
            *cursor = IterCursor::Done;
        }
        Ok(item)
    }

    fn step_builtin(&self, cursor: &mut IterCursor) -> Option<Value> {
        match cursor {
            IterCursor::Array { array, index, kind } => {
                let item = array.borrow().array_items()?.get(*index).cloned()?;
                let position = *index;
                *index += 1;
                Some(self.shape_item(*kind, Value::from(position), item))
            }
            IterCursor::String { text, offset } => {
                let ch = text.get(*offset..)?.chars().next()?;
                *offset += ch.len_utf8();
                Some(Value::from(ch.to_string()))
            }
            IterCursor::Map { map, index, kind } => {
                let (key, value) = match &map.borrow().class {
                    Class::Map(entries) => entries
                        .get_index(*index)
                        .map(|(key, value)| (key.0.clone(), value.clone()))?,
                    _ => return None,
                };
                *index += 1;
                Some(self.shape_item(*kind, key, value))
            }
            IterCursor::Set { set, index, kind } => {
                let value = match &set.borrow().class {
                    Class::Set(items) => items.get_index(*index).map(|key| key.0.clone())?,
                    _ => return None,
                };
                *index += 1;
                Some(self.shape_item(*kind, value.clone(), value))
            }
            IterCursor::Protocol { .. } | IterCursor::Done => None,
        }
    }

    fn shape_item(&self, kind: IterKind, key: Value, value: Value) -> Value {
        match kind {
            IterKind::Keys => key,
            IterKind::Values => value,
            IterKind::Entries => Value::Object(self.new_array(vec![key, value])),
        }
    }

    /// Drains an iterable into a vector, as spread and `Array.from` do.
    pub(crate) fn collect_iterable(&mut self, value: &Value) -> JsResult<Vec<Value>> {
        if let Value::Object(obj) = value {
            if let Some(items) = obj.borrow().array_items() {
                return Ok(items.clone());
            }
        }
        let mut cursor = self.get_iterator(value)?;
        let mut items = Vec::new();
        while let Some(item) = self.iter_next(&mut cursor)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Wraps a cursor in an iterator object whose `next` comes from `Iterator.prototype`.
    pub(crate) fn make_iterator(&self, cursor: IterCursor) -> ObjRef {
        ObjRef::new(JsObject::new(
            Class::Iterator(cursor),
            Some(self.realm.intrinsics.iterator_proto.clone()),
        ))
    }
}

/// `%IteratorPrototype%.next`
pub(super) fn iterator_next(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let Some(obj) = this.as_object() else {
        return Err(interp.type_error("next method called on incompatible receiver"));
    };
    let taken = match &mut obj.borrow_mut().class {
        Class::Iterator(cursor) => Some(std::mem::replace(cursor, IterCursor::Done)),
        _ => None,
    };
    let Some(mut cursor) = taken else {
        return Err(interp.type_error("next method called on incompatible receiver"));
    };
    let item = interp.iter_next(&mut cursor);
    if let Class::Iterator(slot) = &mut obj.borrow_mut().class {
        *slot = cursor;
    }
    let item = item?;
    let result = interp.new_object();
    result.define_data("value", item.clone().unwrap_or_default());
    result.define_data("done", item.is_none());
    Ok(Value::Object(result))
}
