use indexmap::IndexMap;
use tracing::debug;

use larch_core::{Group, LarchError, NativeFunction, Result, SymbolTable, Value};

/// Symbols a host library contributes, bound under one group.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistration {
    pub group: String,
    pub symbols: IndexMap<String, Value>,
}

impl PluginRegistration {
    pub fn new(group: impl Into<String>) -> Self {
        PluginRegistration {
            group: group.into(),
            symbols: IndexMap::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.symbols.insert(name.into(), value);
        self
    }

    pub fn function(self, native: NativeFunction) -> Self {
        let name = native.name.clone();
        self.value(name, Value::from(native))
    }
}

/// Bind a registration: the group is created if absent, each symbol set
/// inside it, and the group appended to the plugin search list.
pub fn register(symtable: &mut SymbolTable, plugin: PluginRegistration) -> Result<()> {
    if plugin.group.is_empty() {
        return Err(LarchError::value("plugin group name must not be empty"));
    }
    let group = match symtable.try_get_symbol(&plugin.group) {
        Some(Value::Group(group)) => group,
        Some(other) => {
            return Err(LarchError::type_error(format!(
                "cannot register plugin into '{}': it is a {}",
                plugin.group,
                other.type_name()
            )))
        }
        None => {
            let root = symtable.root().clone();
            let path = plugin.group.strip_prefix("_main.").unwrap_or(&plugin.group);
            let mut current = root;
            for part in path.split('.') {
                let existing = current.borrow().get(part);
                current = match existing {
                    Some(Value::Group(group)) => group,
                    Some(_) => {
                        return Err(LarchError::type_error(format!(
                            "cannot register plugin into '{}': '{}' is not a group",
                            plugin.group, part
                        )))
                    }
                    None => Group::new_child(part, &current),
                };
            }
            current
        }
    };

    let path = Group::path(&group);
    let count = plugin.symbols.len();
    for (name, value) in plugin.symbols {
        symtable.set_symbol(&format!("{}.{}", path, name), value)?;
    }
    symtable.add_search_group(group);
    debug!(group = %path, symbols = count, "registered plugin");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registration_creates_group_and_search_entry() {
        let mut symtable = SymbolTable::new();
        let plugin = PluginRegistration::new("_xafs")
            .value("edge_energy", Value::Float(8979.0))
            .function(NativeFunction::pure("double", |args, _| {
                Ok(Value::Float(args[0].as_float()? * 2.0))
            }));
        register(&mut symtable, plugin).unwrap();

        assert!(symtable.has_group("_xafs"));
        assert_eq!(symtable.lookup("edge_energy"), Some(Value::Float(8979.0)));
        assert!(symtable
            .search_group_names()
            .contains(&"_main._xafs".to_string()));
    }

    #[test]
    fn test_builtins_shadow_plugins() {
        let mut symtable = SymbolTable::new();
        symtable
            .builtin()
            .borrow_mut()
            .insert("scale", Value::Int(1));
        register(
            &mut symtable,
            PluginRegistration::new("_plug").value("scale", Value::Int(2)),
        )
        .unwrap();
        assert_eq!(symtable.lookup("scale"), Some(Value::Int(1)));
        assert_eq!(symtable.get_symbol("_plug.scale", false).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_registration_into_existing_group_and_bad_target() {
        let mut symtable = SymbolTable::new();
        register(&mut symtable, PluginRegistration::new("_plug").value("a", Value::Int(1))).unwrap();
        register(&mut symtable, PluginRegistration::new("_plug").value("b", Value::Int(2))).unwrap();
        assert_eq!(symtable.get_symbol("_plug.a", false).unwrap(), Value::Int(1));
        assert_eq!(symtable.get_symbol("_plug.b", false).unwrap(), Value::Int(2));

        symtable.set_symbol("flat", Value::Int(0)).unwrap();
        let err = register(&mut symtable, PluginRegistration::new("flat")).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }
}
