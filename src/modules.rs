// ABOUTME: Import path resolution and the module cache
// Each resolved absolute path maps to one cache entry, which moves through
// Loading -> Loaded and is never evicted. An import that observes Loading has
// found a cycle and receives the partially populated entry, so forward
// references resolve once the cycle closes.

use crate::diagnostics::Diagnostic;
use crate::env::Environment;
use crate::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub state: ModuleState,
    pub env: Rc<Environment>,
    pub name: String,
}

#[derive(Debug)]
pub struct ModuleLoader {
    project_root: PathBuf,
    cache: HashMap<String, ModuleEntry>,
    warnings: Vec<Diagnostic>,
}

impl ModuleLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        ModuleLoader {
            project_root: project_root.into(),
            cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.warnings)
    }

    pub fn push_warning(&mut self, warning: Diagnostic) {
        self.warnings.push(warning);
    }

    /// Resolve an import path to an absolute file or directory path.
    ///
    /// `./` and `../` paths are relative to the importing file, absolute
    /// paths are taken verbatim, bare paths are relative to the project
    /// root. A path with no extension also tries `<path>.ez`.
    pub fn resolve(&self, path: &str, importing: Option<&Path>) -> Result<PathBuf, Value> {
        if path.trim().is_empty() {
            return Err(Value::error("E6004", "import path is empty"));
        }

        let base: PathBuf = if path.starts_with("./") || path.starts_with("../") {
            let dir = importing
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.project_root.clone());
            dir.join(path)
        } else if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.project_root.join(path)
        };

        let mut candidates = vec![base.clone()];
        if base.extension().is_none() {
            candidates.push(base.with_extension("ez"));
        }

        for candidate in candidates {
            if candidate.exists() {
                let resolved = candidate.canonicalize().unwrap_or(candidate);
                log::debug!("import `{}` resolved to {}", path, resolved.display());
                return Ok(resolved);
            }
        }

        Err(Value::error(
            "E6001",
            format!("cannot resolve import `{}`", path),
        ))
    }

    /// Enforce the `internal/` visibility rule: a module under a directory
    /// named `internal` may only be imported from inside the tree that
    /// contains that `internal` directory.
    pub fn check_internal(&self, resolved: &Path, importing: Option<&Path>) -> Result<(), Value> {
        let mut guard_base: Option<&Path> = None;
        let mut current = resolved;
        while let Some(parent) = current.parent() {
            if current.file_name().is_some_and(|n| n == "internal") {
                guard_base = Some(parent);
            }
            current = parent;
        }

        let Some(base) = guard_base else {
            return Ok(());
        };

        let importer_dir = importing
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_root.clone());
        let importer_dir = importer_dir.canonicalize().unwrap_or(importer_dir);
        let base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());

        if importer_dir.starts_with(&base) {
            Ok(())
        } else {
            Err(Value::error(
                "E6007",
                format!(
                    "`{}` is internal to `{}`",
                    resolved.display(),
                    base.display()
                ),
            ))
        }
    }

    /// Source files making up the module: one file, or every `.ez` child of
    /// a directory, sorted by name.
    pub fn sources(&self, resolved: &Path) -> Result<Vec<(PathBuf, String)>, Value> {
        if resolved.is_file() {
            let text = std::fs::read_to_string(resolved).map_err(|e| {
                Value::error(
                    "E6003",
                    format!("cannot read `{}`: {}", resolved.display(), e),
                )
            })?;
            return Ok(vec![(resolved.to_path_buf(), text)]);
        }

        let entries = std::fs::read_dir(resolved).map_err(|e| {
            Value::error(
                "E6003",
                format!("cannot read `{}`: {}", resolved.display(), e),
            )
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ez"))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Value::error(
                "E6001",
                format!("`{}` contains no .ez files", resolved.display()),
            ));
        }

        let mut out = Vec::new();
        for file in files {
            let text = std::fs::read_to_string(&file).map_err(|e| {
                Value::error("E6003", format!("cannot read `{}`: {}", file.display(), e))
            })?;
            out.push((file, text));
        }
        Ok(out)
    }

    pub fn entry(&self, key: &str) -> Option<&ModuleEntry> {
        self.cache.get(key)
    }

    /// Mark a module as being loaded; its (still empty) environment is
    /// visible to cyclic importers from this point on.
    pub fn begin(&mut self, key: String, env: Rc<Environment>, name: String) {
        self.cache.insert(
            key,
            ModuleEntry {
                state: ModuleState::Loading,
                env,
                name,
            },
        );
    }

    pub fn set_name(&mut self, key: &str, name: String) {
        if let Some(entry) = self.cache.get_mut(key) {
            entry.name = name;
        }
    }

    pub fn finish(&mut self, key: &str) {
        if let Some(entry) = self.cache.get_mut(key) {
            entry.state = ModuleState::Loaded;
        }
    }

    pub fn module_env(&self, key: &str) -> Option<Rc<Environment>> {
        self.cache.get(key).map(|entry| entry.env.clone())
    }
}

/// File stem used as the default module name.
pub fn module_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_relative_to_importer() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dir.path().join("main.ez");
        let module = dir.path().join("util.ez");
        fs::write(&importer, "").unwrap();
        fs::write(&module, "").unwrap();

        let loader = ModuleLoader::new(dir.path());
        let resolved = loader.resolve("./util.ez", Some(&importer)).unwrap();
        assert_eq!(resolved, module.canonicalize().unwrap());

        // Bare path resolves from the project root, with `.ez` inferred
        let resolved = loader.resolve("util", None).unwrap();
        assert_eq!(resolved, module.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_missing_is_e6001() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModuleLoader::new(dir.path());
        let err = loader.resolve("./ghost.ez", None).unwrap_err();
        let Value::Error(e) = err else { panic!() };
        assert_eq!(e.code, "E6001");
    }

    #[test]
    fn test_internal_rule() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        let internal = pkg.join("internal");
        fs::create_dir_all(&internal).unwrap();
        let secret = internal.join("secret.ez");
        fs::write(&secret, "").unwrap();

        let loader = ModuleLoader::new(dir.path());
        let resolved = secret.canonicalize().unwrap();

        // Importer inside pkg/ may use it
        let insider = pkg.join("lib.ez");
        fs::write(&insider, "").unwrap();
        assert!(loader.check_internal(&resolved, Some(&insider)).is_ok());

        // Importer outside pkg/ may not
        let outsider = dir.path().join("main.ez");
        fs::write(&outsider, "").unwrap();
        let err = loader
            .check_internal(&resolved, Some(&outsider))
            .unwrap_err();
        let Value::Error(e) = err else { panic!() };
        assert_eq!(e.code, "E6007");
    }

    #[test]
    fn test_directory_sources_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("pkg");
        fs::create_dir(&module).unwrap();
        fs::write(module.join("b.ez"), "module pkg").unwrap();
        fs::write(module.join("a.ez"), "module pkg").unwrap();
        fs::write(module.join("notes.txt"), "ignored").unwrap();

        let loader = ModuleLoader::new(dir.path());
        let sources = loader.sources(&module).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].0.ends_with("a.ez"));
        assert!(sources[1].0.ends_with("b.ez"));
    }

    #[test]
    fn test_cache_states() {
        let mut loader = ModuleLoader::new(".");
        let env = Environment::new();
        loader.begin("k".into(), env.clone(), "m".into());
        assert_eq!(loader.entry("k").unwrap().state, ModuleState::Loading);
        loader.finish("k");
        assert_eq!(loader.entry("k").unwrap().state, ModuleState::Loaded);
        assert!(Rc::ptr_eq(&loader.module_env("k").unwrap(), &env));
    }
}
