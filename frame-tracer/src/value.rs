//! The traced VM's value model.
//!
//! Containers carry reference semantics: cloning a [`Value`] shares the
//! backing storage, the way the traced VM aliases objects. The explicit
//! [`Value::snapshot`] operation is what decouples recorded history from
//! later in-place mutation of the live object.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Shared backing storage for list values.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared backing storage for dictionary values.
pub type DictRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// Shared backing storage for object values.
pub type ObjectRef = Rc<RefCell<ObjectData>>;

/// Class name and attribute map of an object value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub class: String,
    pub attrs: BTreeMap<String, Value>,
}

/// An unclonable host reference, tracked by identity only.
///
/// Snapshotting an opaque handle copies the identity tag and nothing else,
/// so in-place mutations of the referent are not historized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueHandle {
    pub type_name: String,
    pub identity: u64,
}

/// A value as seen through a frame's name scopes or on the operand stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Dict(DictRef),
    Object(ObjectRef),
    Opaque(OpaqueHandle),
}

impl Value {
    /// Builds a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Builds a list value with fresh backing storage.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Builds a dictionary value with fresh backing storage.
    pub fn dict(entries: BTreeMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Builds an object value with fresh backing storage.
    pub fn object(class: impl Into<String>, attrs: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectData {
            class: class.into(),
            attrs,
        })))
    }

    /// Takes a deep, independent copy of this value.
    ///
    /// Containers are copied recursively into fresh backing storage, so the
    /// returned value is unaffected by later mutation of the live value.
    /// A memo of already-copied containers keeps aliasing and cycles intact
    /// within one snapshot: a self-referencing list copies to a
    /// self-referencing list instead of recursing forever. Opaque handles
    /// fall back to copying the identity tag.
    pub fn snapshot(&self) -> Value {
        self.snapshot_with(&mut HashMap::new())
    }

    fn snapshot_with(&self, seen: &mut HashMap<*const (), Value>) -> Value {
        match self {
            Value::List(items) => {
                let key = Rc::as_ptr(items) as *const ();
                if let Some(copy) = seen.get(&key) {
                    return copy.clone();
                }
                // Register the empty copy before descending so a cycle back
                // to this list links to the copy, not the live value.
                let copy = Rc::new(RefCell::new(Vec::new()));
                seen.insert(key, Value::List(Rc::clone(&copy)));
                let copied: Vec<Value> = items
                    .borrow()
                    .iter()
                    .map(|value| value.snapshot_with(seen))
                    .collect();
                *copy.borrow_mut() = copied;
                Value::List(copy)
            }
            Value::Dict(entries) => {
                let key = Rc::as_ptr(entries) as *const ();
                if let Some(copy) = seen.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(BTreeMap::new()));
                seen.insert(key, Value::Dict(Rc::clone(&copy)));
                let copied: BTreeMap<String, Value> = entries
                    .borrow()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.snapshot_with(seen)))
                    .collect();
                *copy.borrow_mut() = copied;
                Value::Dict(copy)
            }
            Value::Object(object) => {
                let key = Rc::as_ptr(object) as *const ();
                if let Some(copy) = seen.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(ObjectData {
                    class: object.borrow().class.clone(),
                    attrs: BTreeMap::new(),
                }));
                seen.insert(key, Value::Object(Rc::clone(&copy)));
                let attrs: BTreeMap<String, Value> = object
                    .borrow()
                    .attrs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.snapshot_with(seen)))
                    .collect();
                copy.borrow_mut().attrs = attrs;
                Value::Object(copy)
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_backing_storage() {
        let live = Value::list(vec![Value::Int(1)]);
        let alias = live.clone();

        if let Value::List(items) = &live {
            items.borrow_mut().push(Value::Int(2));
        }

        assert_eq!(
            alias,
            Value::list(vec![Value::Int(1), Value::Int(2)]),
            "a plain clone should alias the live list"
        );
    }

    #[test]
    fn test_snapshot_is_independent_of_later_mutation() {
        let live = Value::list(vec![Value::Int(1)]);
        let copy = live.snapshot();

        if let Value::List(items) = &live {
            items.borrow_mut().push(Value::Int(2));
        }

        assert_eq!(
            copy,
            Value::list(vec![Value::Int(1)]),
            "snapshot should not see mutations made after it was taken"
        );
    }

    #[test]
    fn test_snapshot_copies_nested_containers() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone()]);
        let copy = outer.snapshot();

        if let Value::List(items) = &inner {
            items.borrow_mut().push(Value::Int(2));
        }

        assert_eq!(copy, Value::list(vec![Value::list(vec![Value::Int(1)])]));
    }

    #[test]
    fn test_snapshot_of_self_referencing_list_terminates() {
        let live = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &live {
            let alias = live.clone();
            items.borrow_mut().push(alias);
        }

        let copy = live.snapshot();

        let Value::List(copied_items) = &copy else {
            panic!("snapshot of a list should be a list");
        };
        let copied_items_ref = copied_items.borrow();
        assert_eq!(copied_items_ref.len(), 2);
        assert_eq!(copied_items_ref[0], Value::Int(1));

        let Value::List(inner) = &copied_items_ref[1] else {
            panic!("the cyclic element should still be a list");
        };
        assert!(
            Rc::ptr_eq(inner, copied_items),
            "the copy should close its own cycle"
        );
        if let Value::List(live_items) = &live {
            assert!(
                !Rc::ptr_eq(inner, live_items),
                "the copy must not point back into the live value"
            );
        }
    }

    #[test]
    fn test_snapshot_of_self_referencing_object_terminates() {
        let node = Value::object("Node", BTreeMap::new());
        if let Value::Object(object) = &node {
            object
                .borrow_mut()
                .attrs
                .insert("next".to_owned(), node.clone());
        }

        let copy = node.snapshot();

        let Value::Object(copied) = &copy else {
            panic!("snapshot of an object should be an object");
        };
        let copied_ref = copied.borrow();
        let Some(Value::Object(next)) = copied_ref.attrs.get("next") else {
            panic!("the cyclic attribute should still be an object");
        };
        assert!(Rc::ptr_eq(next, copied), "the copy should close its own cycle");
    }

    #[test]
    fn test_snapshot_preserves_aliasing_within_one_value() {
        let shared = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![shared.clone(), shared.clone()]);

        let copy = outer.snapshot();

        let Value::List(copied_items) = &copy else {
            panic!("snapshot of a list should be a list");
        };
        let copied_items_ref = copied_items.borrow();
        let (Value::List(first), Value::List(second)) =
            (&copied_items_ref[0], &copied_items_ref[1])
        else {
            panic!("both elements should still be lists");
        };
        assert!(
            Rc::ptr_eq(first, second),
            "one live list should copy to one shared list"
        );
    }

    #[test]
    fn test_opaque_snapshot_keeps_identity_tag() {
        let handle = Value::Opaque(OpaqueHandle {
            type_name: "file".to_owned(),
            identity: 0x7f3a,
        });
        assert_eq!(handle.snapshot(), handle);
    }
}
