// ABOUTME: Process-wide registry of standard-library builtins
// Every #[builtin]-annotated function in src/builtins/ submits a BuiltinDef
// at link time via inventory; constants (math.pi) submit a ConstDef with a
// builder. The registry is assembled on first access and frozen: lookups
// after that never observe mutation.

use crate::value::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Signature of every builtin: already-evaluated arguments in, value out.
/// Failures are `Value::Error`; an error argument must be returned unchanged.
pub type BuiltinFn = fn(&[Value]) -> Value;

/// A callable registered under its qualified EZ name.
pub struct BuiltinDef {
    pub name: &'static str,
    pub summary: &'static str,
    pub func: BuiltinFn,
}

inventory::collect!(BuiltinDef);

/// A stdlib constant, built fresh on each lookup.
pub struct ConstDef {
    pub name: &'static str,
    pub summary: &'static str,
    pub build: fn() -> Value,
}

inventory::collect!(ConstDef);

enum Entry {
    Func { summary: &'static str, func: BuiltinFn },
    Const { summary: &'static str, build: fn() -> Value },
}

fn table() -> &'static HashMap<&'static str, Entry> {
    static TABLE: OnceLock<HashMap<&'static str, Entry>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for def in inventory::iter::<BuiltinDef> {
            map.insert(
                def.name,
                Entry::Func {
                    summary: def.summary,
                    func: def.func,
                },
            );
        }
        for def in inventory::iter::<ConstDef> {
            map.insert(
                def.name,
                Entry::Const {
                    summary: def.summary,
                    build: def.build,
                },
            );
        }
        log::debug!("builtin registry seeded with {} entries", map.len());
        map
    })
}

fn lookup_entry(name: &str) -> Option<(&'static str, &'static Entry)> {
    let table = table();
    if let Some((key, entry)) = table.get_key_value(name) {
        return Some((*key, entry));
    }
    // Bare names fall back to the `std` module: `len` is `std.len`.
    if !name.contains('.') {
        let qualified = format!("std.{}", name);
        if let Some((key, entry)) = table.get_key_value(qualified.as_str()) {
            return Some((*key, entry));
        }
    }
    None
}

/// Resolve a qualified name (`strings.upper`) or a bare `std` name (`len`)
/// to its registry value.
pub fn lookup(name: &str) -> Option<Value> {
    match lookup_entry(name)? {
        (key, Entry::Func { func, .. }) => Some(Value::Builtin {
            name: key,
            func: *func,
        }),
        (_, Entry::Const { build, .. }) => Some(build()),
    }
}

pub fn contains(name: &str) -> bool {
    lookup_entry(name).is_some()
}

/// True if `module` is a stdlib module name (some entry is `module.x`).
pub fn module_exists(module: &str) -> bool {
    let prefix = format!("{}.", module);
    table().keys().any(|k| k.starts_with(&prefix))
}

/// Every registered qualified name, for suggestions and the REPL listing.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = table().keys().copied().collect();
    names.sort_unstable();
    names
}

/// Qualified names of one module's members.
pub fn module_members(module: &str) -> Vec<&'static str> {
    let prefix = format!("{}.", module);
    let mut members: Vec<&'static str> = table()
        .keys()
        .copied()
        .filter(|k| k.starts_with(&prefix))
        .collect();
    members.sort_unstable();
    members
}

/// `(name, summary)` pairs for the REPL's builtin listing.
pub fn summaries() -> Vec<(&'static str, &'static str)> {
    let mut out: Vec<(&'static str, &'static str)> = table()
        .iter()
        .map(|(name, entry)| match entry {
            Entry::Func { summary, .. } | Entry::Const { summary, .. } => (*name, *summary),
        })
        .collect();
    out.sort_unstable_by_key(|(name, _)| *name);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_seeded() {
        assert!(contains("len"), "std.len must be registered bare");
        assert!(contains("strings.upper"));
        assert!(contains("math.pi"));
        assert!(module_exists("strings"));
        assert!(!module_exists("nope"));
    }

    #[test]
    fn test_lookup_builtin_is_callable() {
        let Some(Value::Builtin { func, .. }) = lookup("strings.upper") else {
            panic!("strings.upper should be a builtin");
        };
        let result = func(&[Value::Str("abc".into())]);
        assert_eq!(result.try_eq(&Value::Str("ABC".into())), Some(true));
    }

    #[test]
    fn test_lookup_const_builds_value() {
        let Some(Value::Float(pi)) = lookup("math.pi") else {
            panic!("math.pi should be a float constant");
        };
        assert!((pi - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_module_members_filtered() {
        let members = module_members("crypto");
        assert!(members.contains(&"crypto.sha256"));
        assert!(members.iter().all(|m| m.starts_with("crypto.")));
    }
}
