use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::Value;
use crate::error::{LarchError, Result};

pub type GroupRef = Rc<RefCell<Group>>;

/// A named, ordered namespace. Groups nest to form the symbol tree; the
/// parent link is weak and only used to report full paths.
#[derive(Debug, Default)]
pub struct Group {
    name: String,
    symbols: IndexMap<String, Value>,
    parent: Weak<RefCell<Group>>,
    doc: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> GroupRef {
        Rc::new(RefCell::new(Group {
            name: name.into(),
            ..Group::default()
        }))
    }

    /// Create a group and register it as `name` inside `parent`.
    pub fn new_child(name: impl Into<String>, parent: &GroupRef) -> GroupRef {
        let name = name.into();
        let child = Rc::new(RefCell::new(Group {
            name: name.clone(),
            parent: Rc::downgrade(parent),
            ..Group::default()
        }));
        parent
            .borrow_mut()
            .symbols
            .insert(name, Value::Group(child.clone()));
        child
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn set_doc(&mut self, doc: impl Into<String>) {
        self.doc = Some(doc.into());
    }

    pub fn parent(&self) -> Option<GroupRef> {
        self.parent.upgrade()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.symbols.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Bind `name`. A parentless group stored here adopts this group as
    /// its parent, and the binding name if it has none. Groups form a tree:
    /// a group cannot be bound inside itself or any group it contains.
    pub fn set(this: &GroupRef, name: &str, value: Value) -> Result<()> {
        if let Value::Group(child) = &value {
            if Group::reaches(child, this) {
                return Err(LarchError::value(format!(
                    "cannot bind group '{}' inside itself as '{}'",
                    child.borrow().name,
                    name
                )));
            }
            let mut child = child.borrow_mut();
            if child.parent.upgrade().is_none() {
                child.parent = Rc::downgrade(this);
                if child.name.is_empty() {
                    child.name = name.to_string();
                }
            }
        }
        this.borrow_mut().symbols.insert(name.to_string(), value);
        Ok(())
    }

    /// Whether `target` is `from` or nested anywhere below it.
    fn reaches(from: &GroupRef, target: &GroupRef) -> bool {
        let mut pending = vec![from.clone()];
        let mut seen = HashSet::new();
        while let Some(group) = pending.pop() {
            if Rc::ptr_eq(&group, target) {
                return true;
            }
            if seen.insert(Rc::as_ptr(&group)) {
                pending.extend(group.borrow().subgroups().into_iter().map(|(_, g)| g));
            }
        }
        false
    }

    /// Bind without touching parent links.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.symbols.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.symbols.shift_remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    pub fn items(&self) -> Vec<(String, Value)> {
        self.symbols
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn subgroups(&self) -> Vec<(String, GroupRef)> {
        self.symbols
            .iter()
            .filter_map(|(k, v)| match v {
                Value::Group(g) => Some((k.clone(), g.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Dotted path from the root, e.g. `_main.data.scan1`.
    pub fn path(this: &GroupRef) -> String {
        let mut parts = vec![this.borrow().name.clone()];
        let mut current = this.borrow().parent();
        let mut depth = 0;
        while let Some(group) = current {
            parts.push(group.borrow().name.clone());
            current = group.borrow().parent();
            depth += 1;
            if depth > 64 {
                break;
            }
        }
        parts.reverse();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_registration_and_path() {
        let root = Group::new("_main");
        let data = Group::new_child("data", &root);
        let scan = Group::new_child("scan1", &data);
        assert!(root.borrow().contains("data"));
        assert_eq!(Group::path(&scan), "_main.data.scan1");
    }

    #[test]
    fn test_set_adopts_orphan_group() {
        let root = Group::new("_main");
        let orphan = Group::new("g1");
        Group::set(&root, "g", Value::Group(orphan.clone())).unwrap();
        assert_eq!(Group::path(&orphan), "_main.g1");

        // Rebinding elsewhere keeps the original parent.
        let other = Group::new_child("other", &root);
        Group::set(&other, "alias", Value::Group(orphan.clone())).unwrap();
        assert_eq!(Group::path(&orphan), "_main.g1");

        let anonymous = Group::new("");
        Group::set(&root, "scan", Value::Group(anonymous.clone())).unwrap();
        assert_eq!(anonymous.borrow().name(), "scan");
    }

    #[test]
    fn test_set_refuses_cycles() {
        let a = Group::new("a");
        let b = Group::new_child("b", &a);
        let c = Group::new_child("c", &b);

        let err = Group::set(&a, "me", Value::Group(a.clone())).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
        assert!(Group::set(&c, "up", Value::Group(a.clone())).is_err());
        assert!(!a.borrow().contains("me"));
        assert!(!c.borrow().contains("up"));

        // aliases that keep the tree acyclic are fine
        let other = Group::new("other");
        Group::set(&other, "alias", Value::Group(b.clone())).unwrap();
        Group::set(&a, "sibling", Value::Group(other.clone())).unwrap();
        assert!(Group::set(&c, "loop", Value::Group(other)).is_err());
    }

    #[test]
    fn test_insertion_order_and_remove() {
        let g = Group::new("g");
        g.borrow_mut().insert("b", Value::Int(1));
        g.borrow_mut().insert("a", Value::Int(2));
        assert_eq!(g.borrow().names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(g.borrow_mut().remove("b"), Some(Value::Int(1)));
        assert_eq!(g.borrow().len(), 1);
    }
}
