// ABOUTME: Environment module for managing variable bindings and scopes
// Each frame stores its bindings as shared cells so that `&`-parameters can
// alias the caller's storage: passing a binding by reference hands the same
// Rc<RefCell<Value>> to the callee, and forwarding a reference parameter
// hands the identical cell through any number of call levels.

use crate::ast::TypeAnnot;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A struct definition visible to `new(T)` and field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<(String, TypeAnnot)>,
}

/// An enum definition with each variant's underlying value.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<(String, Value)>,
}

impl EnumDef {
    pub fn variant(&self, name: &str) -> Option<&Value> {
        self.variants
            .iter()
            .find(|(v, _)| v == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    cell: Rc<RefCell<Value>>,
    mutable: bool,
}

/// Why an `update` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFault {
    NotFound,
    Immutable,
}

#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Binding>>,
    structs: RefCell<HashMap<String, StructDef>>,
    enums: RefCell<HashMap<String, EnumDef>>,
    imports: RefCell<HashMap<String, String>>,
    using: RefCell<Vec<String>>,
    loop_depth: Cell<usize>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment::default())
    }

    /// Creates a child environment; loop depth carries over.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        let depth = parent.loop_depth.get();
        let env = Environment {
            parent: Some(parent),
            ..Environment::default()
        };
        env.loop_depth.set(depth);
        Rc::new(env)
    }

    /// Child environment for a loop body: depth increments.
    pub fn for_loop(parent: Rc<Environment>) -> Rc<Self> {
        let env = Environment::with_parent(parent);
        env.loop_depth.set(env.loop_depth.get() + 1);
        env
    }

    /// Child environment for a function body: depth resets, so `break`
    /// inside a called function cannot escape into the caller's loop.
    pub fn for_call(parent: Rc<Environment>) -> Rc<Self> {
        let env = Environment::with_parent(parent);
        env.loop_depth.set(0);
        env
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_depth.get()
    }

    /// Defines a binding in THIS frame (does not walk the parent chain).
    pub fn define(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.bindings.borrow_mut().insert(
            name.into(),
            Binding {
                cell: Rc::new(RefCell::new(value)),
                mutable,
            },
        );
    }

    /// Defines a binding that shares an existing cell (`&`-parameters).
    pub fn define_cell(&self, name: impl Into<String>, cell: Rc<RefCell<Value>>, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.into(), Binding { cell, mutable });
    }

    /// Looks a name up in this frame and its ancestors.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.cell.borrow().clone());
        }
        self.parent.as_ref()?.get(name)
    }

    /// The storage cell behind a name, with its mutability flag.
    pub fn cell(&self, name: &str) -> Option<(Rc<RefCell<Value>>, bool)> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some((binding.cell.clone(), binding.mutable));
        }
        self.parent.as_ref()?.cell(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
            || self.parent.as_ref().is_some_and(|p| p.is_defined(name))
    }

    /// Walks the chain, finds the binding, checks mutability, writes.
    pub fn update(&self, name: &str, value: Value) -> Result<(), UpdateFault> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            if !binding.mutable {
                return Err(UpdateFault::Immutable);
            }
            *binding.cell.borrow_mut() = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.update(name, value),
            None => Err(UpdateFault::NotFound),
        }
    }

    /// All binding names reachable from this frame, for suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        if let Some(parent) = &self.parent {
            names.extend(parent.visible_names());
        }
        names
    }

    pub fn define_struct(&self, def: StructDef) {
        self.structs.borrow_mut().insert(def.name.clone(), def);
    }

    pub fn struct_def(&self, name: &str) -> Option<StructDef> {
        if let Some(def) = self.structs.borrow().get(name) {
            return Some(def.clone());
        }
        self.parent.as_ref()?.struct_def(name)
    }

    pub fn define_enum(&self, def: EnumDef) {
        self.enums.borrow_mut().insert(def.name.clone(), def);
    }

    pub fn enum_def(&self, name: &str) -> Option<EnumDef> {
        if let Some(def) = self.enums.borrow().get(name) {
            return Some(def.clone());
        }
        self.parent.as_ref()?.enum_def(name)
    }

    pub fn add_import(&self, alias: impl Into<String>, module: impl Into<String>) {
        self.imports
            .borrow_mut()
            .insert(alias.into(), module.into());
    }

    pub fn import(&self, alias: &str) -> Option<String> {
        if let Some(module) = self.imports.borrow().get(alias) {
            return Some(module.clone());
        }
        self.parent.as_ref()?.import(alias)
    }

    pub fn add_using(&self, name: impl Into<String>) {
        self.using.borrow_mut().push(name.into());
    }

    /// Aliases whose functions are reachable unqualified, innermost first.
    pub fn usings(&self) -> Vec<String> {
        let mut list = self.using.borrow().clone();
        if let Some(parent) = &self.parent {
            list.extend(parent.usings());
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::int(42), true);
        assert_eq!(env.get("x").unwrap().try_eq(&Value::int(42)), Some(true));
        assert!(env.get("missing").is_none());
    }

    #[test]
    fn test_shadowing_and_parent_lookup() {
        let parent = Environment::new();
        parent.define("x", Value::int(1), true);
        parent.define("y", Value::int(2), true);

        let child = Environment::with_parent(parent.clone());
        child.define("x", Value::int(10), true);

        assert_eq!(child.get("x").unwrap().try_eq(&Value::int(10)), Some(true));
        assert_eq!(child.get("y").unwrap().try_eq(&Value::int(2)), Some(true));
        assert_eq!(parent.get("x").unwrap().try_eq(&Value::int(1)), Some(true));
    }

    #[test]
    fn test_update_walks_chain_and_checks_mutability() {
        let parent = Environment::new();
        parent.define("m", Value::int(1), true);
        parent.define("c", Value::int(2), false);

        let child = Environment::with_parent(parent.clone());
        assert_eq!(child.update("m", Value::int(9)), Ok(()));
        assert_eq!(parent.get("m").unwrap().try_eq(&Value::int(9)), Some(true));

        assert_eq!(child.update("c", Value::int(9)), Err(UpdateFault::Immutable));
        assert_eq!(
            child.update("nope", Value::Nil),
            Err(UpdateFault::NotFound)
        );
    }

    #[test]
    fn test_shared_cell_aliases_storage() {
        let caller = Environment::new();
        caller.define("x", Value::int(10), true);
        let (cell, _) = caller.cell("x").unwrap();

        let callee = Environment::for_call(caller.clone());
        callee.define_cell("p", cell, true);
        callee.update("p", Value::int(99)).unwrap();

        assert_eq!(caller.get("x").unwrap().try_eq(&Value::int(99)), Some(true));
    }

    #[test]
    fn test_loop_depth_resets_across_calls() {
        let global = Environment::new();
        let body = Environment::for_loop(global.clone());
        assert_eq!(body.loop_depth(), 1);

        let nested = Environment::for_loop(body.clone());
        assert_eq!(nested.loop_depth(), 2);

        let call = Environment::for_call(nested);
        assert_eq!(call.loop_depth(), 0);
    }

    #[test]
    fn test_struct_and_enum_defs_walk_chain() {
        let global = Environment::new();
        global.define_struct(StructDef {
            name: "Point".into(),
            fields: vec![
                ("x".into(), TypeAnnot::Named("int".into())),
                ("y".into(), TypeAnnot::Named("int".into())),
            ],
        });
        global.define_enum(EnumDef {
            name: "Color".into(),
            variants: vec![("Red".into(), Value::int(0))],
        });

        let child = Environment::with_parent(global);
        assert!(child.struct_def("Point").is_some());
        assert_eq!(
            child.enum_def("Color").unwrap().variant("Red").is_some(),
            true
        );
    }

    #[test]
    fn test_usings_accumulate_through_chain() {
        let global = Environment::new();
        global.add_import("strings", "strings");
        global.add_using("strings");

        let child = Environment::with_parent(global);
        child.add_using("math");
        assert_eq!(child.usings(), vec!["math".to_string(), "strings".to_string()]);
        assert_eq!(child.import("strings").as_deref(), Some("strings"));
    }
}
