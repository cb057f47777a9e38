use std::collections::HashMap;

use log::{debug, info};

use crate::error::{ClouError, Result};
use crate::value::Value;

/// Key→source store plus the exports cache backing `require`.
///
/// Paths are plain string keys; `./` prefixes are normalised away so a
/// module registered as `math.clou` resolves for `require("./math.clou")`
/// and friends.  The cache is keyed by *resolved* path, so a module
/// reachable under several spellings still loads exactly once.
#[derive(Debug, Default)]
pub struct ModuleSystem {
    files: HashMap<String, String>,
    cache: HashMap<String, Value>,
}

impl ModuleSystem {
    pub fn new() -> Self {
        ModuleSystem {
            files: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Register a source under a key.
    pub fn add_file<P: Into<String>, C: Into<String>>(&mut self, path: P, content: C) {
        let key = normalize(&path.into());

        debug!("Registering module source under '{}'", key);

        self.files.insert(key, content.into());
    }

    pub fn get_file(&self, path: &str) -> Option<&String> {
        self.files.get(&normalize(path))
    }

    /// Resolve `path` against the store: as-is, with `.clou` appended,
    /// joined under `current_dir`, then joined with the extension.  The
    /// first hit wins.  Returns the resolved key together with the source.
    pub fn resolve(&self, path: &str, current_dir: &str) -> Option<(String, String)> {
        for candidate in candidates(path, current_dir) {
            if let Some(content) = self.files.get(&candidate) {
                debug!("Resolved module '{}' as '{}'", path, candidate);

                return Some((candidate, content.clone()));
            }
        }

        None
    }

    /// Public resolution entry point; a miss is an error.
    pub fn get_module_source(&self, path: &str, current_dir: &str) -> Result<String> {
        self.resolve(path, current_dir)
            .map(|(_, content)| content)
            .ok_or_else(|| ClouError::runtime(0, format!("Module not found: '{}'", path)))
    }

    pub fn get_cached(&self, path: &str) -> Option<Value> {
        let cached = self.cache.get(path).cloned();

        if cached.is_some() {
            info!("Module cache hit for '{}'", path);
        }

        cached
    }

    /// Install an exports value under a resolved path.  `require` calls
    /// this *before* executing the module body; that ordering is the
    /// cycle-tolerance contract.
    pub fn cache(&mut self, path: &str, exports: Value) {
        self.cache.insert(path.to_string(), exports);
    }

    pub fn clear_cache(&mut self) {
        info!("Clearing module exports cache");

        self.cache.clear();
    }
}

/// The directory component of a resolved key, for relative resolution of
/// nested `require` calls.
pub fn dir_of(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..pos].to_string(),
        None => String::new(),
    }
}

fn candidates(path: &str, current_dir: &str) -> Vec<String> {
    let base = normalize(path);

    let mut out: Vec<String> = vec![base.clone(), format!("{}.clou", base)];

    if !current_dir.is_empty() {
        let joined = format!("{}/{}", current_dir.trim_end_matches('/'), base);

        out.push(joined.clone());
        out.push(format!("{}.clou", joined));
    }

    out
}

fn normalize(path: &str) -> String {
    let mut p = path;

    while let Some(stripped) = p.strip_prefix("./") {
        p = stripped;
    }

    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_key_first() {
        let mut modules = ModuleSystem::new();
        modules.add_file("math.clou", "let a = 1;");

        let (resolved, content) = modules.resolve("math.clou", "").unwrap();
        assert_eq!(resolved, "math.clou");
        assert_eq!(content, "let a = 1;");
    }

    #[test]
    fn appends_extension_when_missing() {
        let mut modules = ModuleSystem::new();
        modules.add_file("math.clou", "let a = 1;");

        let (resolved, _) = modules.resolve("math", "").unwrap();
        assert_eq!(resolved, "math.clou");
    }

    #[test]
    fn dot_slash_prefix_is_transparent() {
        let mut modules = ModuleSystem::new();
        modules.add_file("math.clou", "let a = 1;");

        assert!(modules.resolve("./math.clou", "").is_some());
        assert!(modules.get_file("./math").is_none());
        assert!(modules.get_file("./math.clou").is_some());
    }

    #[test]
    fn joins_under_current_dir() {
        let mut modules = ModuleSystem::new();
        modules.add_file("lib/util.clou", "let a = 1;");

        let (resolved, _) = modules.resolve("util", "lib").unwrap();
        assert_eq!(resolved, "lib/util.clou");
    }

    #[test]
    fn missing_module_is_an_error() {
        let modules = ModuleSystem::new();
        let err = modules.get_module_source("ghost", "").unwrap_err();

        assert!(err.to_string().contains("Module not found: 'ghost'"));
    }

    #[test]
    fn cache_round_trips_identity() {
        use std::cell::RefCell;
        use std::rc::Rc;

        use crate::value::ClouObject;

        let mut modules = ModuleSystem::new();
        let exports = Value::Object(Rc::new(RefCell::new(ClouObject::new())));

        modules.cache("math.clou", exports.clone());

        match (modules.get_cached("math.clou").unwrap(), exports) {
            (Value::Object(a), Value::Object(b)) => assert!(Rc::ptr_eq(&a, &b)),
            _ => panic!("expected object exports"),
        }

        modules.clear_cache();
        assert!(modules.get_cached("math.clou").is_none());
    }

    #[test]
    fn dir_of_strips_last_component() {
        assert_eq!(dir_of("lib/math.clou"), "lib");
        assert_eq!(dir_of("math.clou"), "");
    }
}
