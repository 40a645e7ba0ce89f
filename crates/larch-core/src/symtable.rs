//! The tree of groups and the rules for finding names in it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::{LarchError, Result};
use crate::value::{Group, GroupRef, Value};

pub const MAIN: &str = "_main";
pub const BUILTIN: &str = "_builtin";
pub const SYS: &str = "_sys";
pub const MATH: &str = "_math";

const DEFAULT_COMMANDS: [&str; 4] = ["run", "help", "show", "which"];

/// Scope of one procedure activation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub local: GroupRef,
    pub defining: GroupRef,
}

/// Invoked with the group, the symbol name and the new value after
/// `set_symbol` assigns a watched symbol.
pub type SymbolCallback = Rc<dyn Fn(&GroupRef, &str, &Value)>;

struct Watch {
    group: Weak<RefCell<Group>>,
    name: String,
    callback: SymbolCallback,
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch").field("name", &self.name).finish()
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    root: GroupRef,
    builtin: GroupRef,
    sys: GroupRef,
    math: GroupRef,
    data_group: GroupRef,
    func_group: GroupRef,
    frames: Vec<Frame>,
    extra_groups: Vec<GroupRef>,
    group_counter: usize,
    watches: Vec<Watch>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let root = Group::new(MAIN);
        root.borrow_mut()
            .set_doc("top-level group holding all data and procedures");
        let builtin = Group::new_child(BUILTIN, &root);
        builtin.borrow_mut().set_doc("builtin functions");
        let sys = Group::new_child(SYS, &root);
        sys.borrow_mut().set_doc("interpreter state");
        let math = Group::new_child(MATH, &root);
        math.borrow_mut().set_doc("numeric functions and arrays");

        {
            let mut s = sys.borrow_mut();
            s.insert("path", Value::list(vec![Value::from(".")]));
            s.insert(
                "valid_commands",
                Value::list(DEFAULT_COMMANDS.iter().map(|c| Value::from(*c)).collect()),
            );
        }
        let modules = Group::new_child("modules", &sys);
        modules.borrow_mut().set_doc("imported modules");
        Group::new_child("last_error", &sys);

        let mut table = SymbolTable {
            data_group: root.clone(),
            func_group: root.clone(),
            root,
            builtin,
            sys,
            math: math.clone(),
            frames: Vec::new(),
            extra_groups: vec![math],
            group_counter: 0,
            watches: Vec::new(),
        };
        table.refresh_search_groups();
        table
    }

    pub fn root(&self) -> &GroupRef {
        &self.root
    }

    pub fn builtin(&self) -> &GroupRef {
        &self.builtin
    }

    pub fn sys(&self) -> &GroupRef {
        &self.sys
    }

    pub fn math(&self) -> &GroupRef {
        &self.math
    }

    pub fn data_group(&self) -> &GroupRef {
        &self.data_group
    }

    pub fn func_group(&self) -> &GroupRef {
        &self.func_group
    }

    pub fn in_procedure(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Where unqualified assignments land: the local group inside a
    /// procedure, the default data group otherwise.
    pub fn assignment_group(&self) -> GroupRef {
        match self.frames.last() {
            Some(frame) => frame.local.clone(),
            None => self.data_group.clone(),
        }
    }

    /// Groups consulted for an unqualified name, in order, without
    /// duplicates.
    pub fn search_order(&self) -> Vec<GroupRef> {
        let mut order: Vec<GroupRef> = Vec::new();
        let mut add = |group: &GroupRef| {
            if !order.iter().any(|g| Rc::ptr_eq(g, group)) {
                order.push(group.clone());
            }
        };
        if let Some(frame) = self.frames.last() {
            add(&frame.local);
            add(&frame.defining);
        }
        add(&self.data_group);
        add(&self.func_group);
        add(&self.root);
        add(&self.builtin);
        for group in &self.extra_groups {
            add(group);
        }
        order
    }

    /// Resolve an unqualified name.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if name == MAIN {
            return Some(Value::Group(self.root.clone()));
        }
        self.search_order()
            .iter()
            .find_map(|group| group.borrow().get(name))
    }

    /// Resolve `a.b.c`. With `create`, missing groups along the path are
    /// made (the first segment in the assignment group) and kept even when
    /// a later segment fails.
    pub fn get_symbol(&mut self, dotted: &str, create: bool) -> Result<Value> {
        let mut parts = dotted.split('.');
        let first = parts.next().unwrap_or_default();
        let mut current = match self.lookup(first) {
            Some(value) => value,
            None if create => {
                let parent = self.assignment_group();
                Value::Group(Group::new_child(first, &parent))
            }
            None => return Err(LarchError::undefined(first)),
        };
        let mut walked = first.to_string();
        for part in parts {
            let next = match &current {
                Value::Group(group) => {
                    let found = group.borrow().get(part);
                    match found {
                        Some(value) => value,
                        None if create => Value::Group(Group::new_child(part, group)),
                        None => {
                            return Err(LarchError::lookup(format!(
                                "group '{}' has no symbol '{}'",
                                walked, part
                            )))
                        }
                    }
                }
                other => other.get_attr(part).ok_or_else(|| {
                    LarchError::attribute(format!(
                        "'{}' object has no attribute '{}'",
                        other.type_name(),
                        part
                    ))
                })?,
            };
            walked.push('.');
            walked.push_str(part);
            current = next;
        }
        Ok(current)
    }

    pub fn try_get_symbol(&mut self, dotted: &str) -> Option<Value> {
        self.get_symbol(dotted, false).ok()
    }

    /// Bind `dotted` to `value`, creating intermediate groups.
    pub fn set_symbol(&mut self, dotted: &str, value: Value) -> Result<()> {
        let (group, name) = match dotted.rsplit_once('.') {
            None => (self.assignment_group(), dotted),
            Some((parent, name)) => match self.get_symbol(parent, true)? {
                Value::Group(group) => (group, name),
                other => {
                    return Err(LarchError::attribute(format!(
                        "cannot set attribute '{}' on {} '{}'",
                        name,
                        other.type_name(),
                        parent
                    )))
                }
            },
        };
        Group::set(&group, name, value.clone())?;
        self.notify(&group, name, &value);
        Ok(())
    }

    fn notify(&self, group: &GroupRef, name: &str, value: &Value) {
        let callbacks: Vec<SymbolCallback> = self
            .watches
            .iter()
            .filter(|w| w.name == name && w.group.upgrade().map_or(false, |g| Rc::ptr_eq(&g, group)))
            .map(|w| w.callback.clone())
            .collect();
        for callback in callbacks {
            callback(group, name, value);
        }
    }

    /// The group holding an existing symbol and its last name segment.
    /// Unqualified names are found in the search order.
    fn holder_of<'a>(&mut self, dotted: &'a str) -> Result<(GroupRef, &'a str)> {
        match dotted.rsplit_once('.') {
            Some((parent, name)) => Ok((self.get_symbol(parent, false)?.as_group()?, name)),
            None => {
                let holder = self
                    .search_order()
                    .into_iter()
                    .find(|g| g.borrow().contains(dotted))
                    .ok_or_else(|| LarchError::undefined(dotted))?;
                Ok((holder, dotted))
            }
        }
    }

    /// Remove a binding and its callbacks. Unqualified names are removed
    /// from the first group in the search order that holds them.
    pub fn del_symbol(&mut self, dotted: &str) -> Result<()> {
        let (group, name) = self.holder_of(dotted)?;
        let removed = group.borrow_mut().remove(name);
        self.watches
            .retain(|w| !(w.name == name && w.group.upgrade().map_or(false, |g| Rc::ptr_eq(&g, &group))));
        removed
            .map(|_| ())
            .ok_or_else(|| LarchError::lookup(format!("no symbol '{}' to delete", dotted)))
    }

    /// Call `callback` each time `set_symbol` assigns the existing symbol
    /// `dotted`.
    pub fn add_callback(
        &mut self,
        dotted: &str,
        callback: impl Fn(&GroupRef, &str, &Value) + 'static,
    ) -> Result<()> {
        let missing = || LarchError::Name {
            message: format!("cannot locate symbol '{}' for callback", dotted),
        };
        let (group, name) = self.holder_of(dotted).map_err(|_| missing())?;
        if !group.borrow().contains(name) {
            return Err(missing());
        }
        debug!(symbol = dotted, "callback added");
        self.watches.push(Watch {
            group: Rc::downgrade(&group),
            name: name.to_string(),
            callback: Rc::new(callback),
        });
        Ok(())
    }

    /// Drop the callbacks of `dotted`: all of them, or only the one at
    /// `index` in the order they were added.
    pub fn clear_callbacks(&mut self, dotted: &str, index: Option<usize>) -> Result<()> {
        let (group, name) = self.holder_of(dotted)?;
        let mut position = 0;
        self.watches.retain(|w| {
            let same = w.name == name && w.group.upgrade().map_or(false, |g| Rc::ptr_eq(&g, &group));
            if !same {
                return true;
            }
            let keep = index.map_or(false, |i| i != position);
            position += 1;
            keep
        });
        Ok(())
    }

    pub fn has_symbol(&mut self, dotted: &str) -> bool {
        self.try_get_symbol(dotted).is_some()
    }

    pub fn has_group(&mut self, dotted: &str) -> bool {
        matches!(self.try_get_symbol(dotted), Some(Value::Group(_)))
    }

    /// Create a group registered under `parent` (default: the assignment
    /// group). Without a name, a fresh `groupNNN` name is chosen.
    pub fn new_group(&mut self, name: Option<&str>, parent: Option<&GroupRef>) -> Result<GroupRef> {
        let parent = parent.cloned().unwrap_or_else(|| self.assignment_group());
        let name = match name {
            Some(name) => {
                if parent.borrow().contains(name) {
                    return Err(LarchError::NameCollision {
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => loop {
                self.group_counter += 1;
                let candidate = format!("group{:03}", self.group_counter);
                if !parent.borrow().contains(&candidate) {
                    break candidate;
                }
            },
        };
        Ok(Group::new_child(name, &parent))
    }

    /// Group at a dotted path measured from `_main`, created if missing.
    fn ensure_group(&mut self, dotted: &str) -> Result<GroupRef> {
        let mut current = self.root.clone();
        let path = dotted.strip_prefix("_main.").unwrap_or(dotted);
        if path == MAIN {
            return Ok(current);
        }
        for part in path.split('.') {
            let found = current.borrow().get(part);
            current = match found {
                Some(Value::Group(group)) => group,
                Some(other) => {
                    return Err(LarchError::type_error(format!(
                        "'{}' is a {}, not a group",
                        part,
                        other.type_name()
                    )))
                }
                None => Group::new_child(part, &current),
            };
        }
        Ok(current)
    }

    pub fn set_default_data_group(&mut self, dotted: &str) -> Result<GroupRef> {
        let group = self.ensure_group(dotted)?;
        debug!(group = %Group::path(&group), "default data group");
        self.data_group = group.clone();
        self.refresh_search_groups();
        Ok(group)
    }

    pub fn set_default_func_group(&mut self, dotted: &str) -> Result<GroupRef> {
        let group = self.ensure_group(dotted)?;
        debug!(group = %Group::path(&group), "default function group");
        self.func_group = group.clone();
        self.refresh_search_groups();
        Ok(group)
    }

    /// Append a group consulted after `_builtin`.
    pub fn add_search_group(&mut self, group: GroupRef) {
        if !self.extra_groups.iter().any(|g| Rc::ptr_eq(g, &group)) {
            self.extra_groups.push(group);
            self.refresh_search_groups();
        }
    }

    pub fn search_group_names(&self) -> Vec<String> {
        self.search_order().iter().map(Group::path).collect()
    }

    fn refresh_search_groups(&mut self) {
        let names = self
            .search_group_names()
            .into_iter()
            .map(Value::from)
            .collect();
        self.sys.borrow_mut().insert("searchGroups", Value::list(names));
    }

    fn sys_strings(&self, name: &str) -> Vec<String> {
        match self.sys.borrow().get(name) {
            Some(Value::List(items)) => items
                .borrow()
                .iter()
                .filter_map(|v| v.as_str().ok().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Names that may be called without parentheses.
    pub fn valid_commands(&self) -> Vec<String> {
        self.sys_strings("valid_commands")
    }

    /// Directories searched by `import`.
    pub fn module_path(&self) -> Vec<String> {
        self.sys_strings("path")
    }

    pub fn prepend_module_path(&mut self, dirs: &[String]) {
        let current = self.module_path();
        let mut merged: Vec<String> = dirs.to_vec();
        merged.extend(current.into_iter().filter(|d| !dirs.contains(d)));
        self.sys.borrow_mut().insert(
            "path",
            Value::list(merged.into_iter().map(Value::from).collect()),
        );
    }

    pub fn modules(&self) -> Result<GroupRef> {
        match self.sys.borrow().get("modules") {
            Some(Value::Group(g)) => Ok(g),
            _ => Err(LarchError::runtime("_sys.modules is not a group")),
        }
    }

    /// Record the error most recently handled by an `except` clause.
    pub fn set_last_error(&mut self, kind: &str, message: &str, filename: &str, lineno: usize) {
        let group = Group::new_child("last_error", &self.sys);
        let mut g = group.borrow_mut();
        g.insert("kind", Value::from(kind));
        g.insert("msg", Value::from(message));
        g.insert("filename", Value::from(filename));
        g.insert("lineno", Value::Int(lineno as i64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolution_order() {
        let mut st = SymbolTable::new();
        st.builtin().borrow_mut().insert("x", Value::from("builtin"));
        assert_eq!(st.lookup("x"), Some(Value::from("builtin")));

        st.root().borrow_mut().insert("x", Value::from("main"));
        assert_eq!(st.lookup("x"), Some(Value::from("main")));

        let funcs = st.set_default_func_group("lib").unwrap();
        funcs.borrow_mut().insert("x", Value::from("func"));
        assert_eq!(st.lookup("x"), Some(Value::from("func")));

        let data = st.set_default_data_group("scans").unwrap();
        data.borrow_mut().insert("x", Value::from("data"));
        assert_eq!(st.lookup("x"), Some(Value::from("data")));

        let local = Group::new("local");
        local.borrow_mut().insert("x", Value::from("local"));
        st.push_frame(Frame {
            local,
            defining: st.root().clone(),
        });
        assert_eq!(st.lookup("x"), Some(Value::from("local")));
        st.pop_frame();
        assert_eq!(st.lookup("x"), Some(Value::from("data")));
    }

    #[test]
    fn test_qualified_and_unqualified_are_independent() {
        let mut st = SymbolTable::new();
        st.set_symbol("x", Value::Int(1)).unwrap();
        st.set_symbol("g.x", Value::Int(2)).unwrap();
        assert_eq!(st.get_symbol("x", false).unwrap(), Value::Int(1));
        assert_eq!(st.get_symbol("g.x", false).unwrap(), Value::Int(2));
        assert!(st.has_group("g"));
        assert!(!st.has_group("x"));
    }

    #[test]
    fn test_set_symbol_creates_path() {
        let mut st = SymbolTable::new();
        st.set_symbol("a.b.c", Value::Int(3)).unwrap();
        let b = st.get_symbol("a.b", false).unwrap().as_group().unwrap();
        assert_eq!(Group::path(&b), "_main.a.b");

        st.set_symbol("n", Value::Int(1)).unwrap();
        assert!(st.set_symbol("n.m.k", Value::Int(1)).is_err());
    }

    #[test]
    fn test_non_group_in_path() {
        let mut st = SymbolTable::new();
        st.set_symbol("p.q", Value::Int(1)).unwrap();
        assert!(st.set_symbol("r.s.q.z", Value::Int(1)).is_ok());
        assert!(st.set_symbol("p.q.z", Value::Int(1)).is_err());
        assert!(st.has_group("r.s.q"));
    }

    #[test]
    fn test_missing_names() {
        let mut st = SymbolTable::new();
        let err = st.get_symbol("nothing", false).unwrap_err();
        assert_eq!(err.kind(), "NameError");
        st.set_symbol("g.a", Value::Int(1)).unwrap();
        let err = st.get_symbol("g.b", false).unwrap_err();
        assert_eq!(err.kind(), "LookupError");
        assert_eq!(st.try_get_symbol("g.b"), None);
    }

    #[test]
    fn test_new_group_names() {
        let mut st = SymbolTable::new();
        let g = st.new_group(Some("g"), None).unwrap();
        assert_eq!(Group::path(&g), "_main.g");
        let err = st.new_group(Some("g"), None).unwrap_err();
        assert_eq!(err.kind(), "NameCollisionError");
        let auto = st.new_group(None, Some(&g)).unwrap();
        assert_eq!(Group::path(&auto), "_main.g.group001");
    }

    #[test]
    fn test_assignment_inside_frame_is_local() {
        let mut st = SymbolTable::new();
        let local = Group::new("proc");
        st.push_frame(Frame {
            local: local.clone(),
            defining: st.root().clone(),
        });
        st.set_symbol("y", Value::Int(5)).unwrap();
        st.pop_frame();
        assert!(local.borrow().contains("y"));
        assert!(!st.has_symbol("y"));
    }

    #[test]
    fn test_search_groups_and_sys() {
        let mut st = SymbolTable::new();
        let plugin = st.new_group(Some("xafs"), None).unwrap();
        plugin.borrow_mut().insert("k", Value::Int(9));
        st.add_search_group(plugin);
        assert_eq!(st.lookup("k"), Some(Value::Int(9)));
        assert_eq!(
            st.search_group_names(),
            vec!["_main", "_main._builtin", "_main._math", "_main.xafs"]
        );
        assert_eq!(st.valid_commands(), vec!["run", "help", "show", "which"]);
        assert!(st.has_group("_sys.modules"));

        st.set_last_error("ValueError", "bad", "f.lar", 3);
        assert_eq!(
            st.get_symbol("_sys.last_error.lineno", false).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_symbol_callbacks() {
        let mut st = SymbolTable::new();
        st.set_symbol("scan.energy", Value::Int(1)).unwrap();
        st.set_symbol("energy", Value::Int(0)).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        st.add_callback("scan.energy", move |group, name, value| {
            log.borrow_mut().push(format!("{}.{}={}", group.borrow().name(), name, value));
        })
        .unwrap();
        let log = seen.clone();
        st.add_callback("scan.energy", move |_, _, value| {
            log.borrow_mut().push(format!("second {}", value));
        })
        .unwrap();

        st.set_symbol("scan.energy", Value::Int(2)).unwrap();
        // same name in another group does not fire
        st.set_symbol("energy", Value::Int(5)).unwrap();
        assert_eq!(*seen.borrow(), vec!["scan.energy=2", "second 2"]);

        st.clear_callbacks("scan.energy", Some(0)).unwrap();
        st.set_symbol("scan.energy", Value::Int(3)).unwrap();
        assert_eq!(seen.borrow().last().map(String::as_str), Some("second 3"));
        assert_eq!(seen.borrow().len(), 3);

        st.clear_callbacks("scan.energy", None).unwrap();
        st.set_symbol("scan.energy", Value::Int(4)).unwrap();
        assert_eq!(seen.borrow().len(), 3);

        assert_eq!(st.add_callback("scan.nothing", |_, _, _| {}).unwrap_err().kind(), "NameError");
    }

    #[test]
    fn test_del_symbol() {
        let mut st = SymbolTable::new();
        st.set_symbol("x", Value::Int(1)).unwrap();
        st.del_symbol("x").unwrap();
        assert!(!st.has_symbol("x"));
        assert!(st.del_symbol("x").is_err());
    }
}
