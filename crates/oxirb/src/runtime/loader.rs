//! The `require`/`load` registry.
//!
//! Compiled files register an [`Initializer`] under their path. Paths are
//! normalized before use: joined to the current directory, with `./`
//! stripped, the `.rb`, `.opal` and `.js` extensions dropped and `.`/`..`
//! segments resolved. `require` runs an initializer at most once; `load`
//! runs it every time.

use crate::config::MissingRequire;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use fxhash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// Body of a registered file.
pub type Initializer = Rc<dyn Fn(&mut Runtime) -> Result<()>>;

const EXTENSIONS: [&str; 3] = [".rb", ".opal", ".js"];

/// Normalizes `path` against `current_dir`.
#[must_use]
pub fn normalize_path(path: &str, current_dir: &str) -> String {
    let mut joined = String::with_capacity(current_dir.len() + path.len() + 1);
    if !path.starts_with('/') && !current_dir.is_empty() && current_dir != "." {
        joined.push_str(current_dir.trim_end_matches('/'));
        joined.push('/');
    }
    joined.push_str(path);

    let trimmed = joined.strip_prefix("./").unwrap_or(&joined);
    let stem = EXTENSIONS
        .iter()
        .find_map(|ext| trimmed.strip_suffix(ext))
        .unwrap_or(trimmed);

    let mut parts: Vec<&str> = Vec::new();
    for part in stem.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if stem.starts_with('/') {
        format!("/{body}")
    } else {
        body
    }
}

pub(crate) struct Loader {
    modules: FxHashMap<String, Initializer>,
    loaded: FxHashSet<String>,
    /// Loaded paths in load order.
    features: Vec<String>,
    current_dir: String,
    policy: MissingRequire,
}

impl Loader {
    pub(crate) fn new(current_dir: String, policy: MissingRequire) -> Self {
        Loader {
            modules: FxHashMap::default(),
            loaded: FxHashSet::default(),
            features: Vec::new(),
            current_dir,
            policy,
        }
    }

    fn mark(&mut self, path: &str) {
        if self.loaded.insert(path.to_string()) {
            self.features.push(path.to_string());
        }
    }

    fn unmark(&mut self, path: &str) {
        if self.loaded.remove(path) {
            self.features.retain(|p| p != path);
        }
    }
}

impl Runtime {
    /// Registers `init` as the body of `path` (normalized without the
    /// current directory).
    pub fn register_module<F>(&mut self, path: &str, init: F)
    where
        F: Fn(&mut Runtime) -> Result<()> + 'static,
    {
        let key = normalize_path(path, ".");
        oxirb_log::trace!("registered {key}");
        self.loader.modules.insert(key, Rc::new(init));
    }

    fn missing_file(&self, path: String) -> Result<bool> {
        match self.loader.policy {
            MissingRequire::Error => Err(Error::LoadError { path }),
            MissingRequire::Warn => {
                oxirb_log::warn!("cannot load such file -- {path}");
                Ok(false)
            }
            MissingRequire::Ignore => Ok(false),
        }
    }

    /// `require path`. Returns `true` when the file ran now, `false` when
    /// it had already been loaded (or was missing and the policy allows
    /// that). A file whose initializer fails is not marked as loaded.
    ///
    /// # Errors
    ///
    /// `LoadError` for unregistered paths under the `error` policy, plus
    /// whatever the initializer raises.
    pub fn require(&mut self, path: &str) -> Result<bool> {
        let key = normalize_path(path, &self.loader.current_dir);
        if self.loader.loaded.contains(&key) {
            return Ok(false);
        }
        let Some(init) = self.loader.modules.get(&key).cloned() else {
            return self.missing_file(key);
        };

        // Marked first so circular requires see the file as loaded.
        self.loader.mark(&key);
        oxirb_log::debug!("require {key}");
        if let Err(e) = (*init)(self) {
            self.loader.unmark(&key);
            return Err(e);
        }
        Ok(true)
    }

    /// `load path`: runs the file even if it ran before.
    ///
    /// # Errors
    ///
    /// As [`require`](Self::require).
    pub fn load(&mut self, path: &str) -> Result<bool> {
        let key = normalize_path(path, &self.loader.current_dir);
        let Some(init) = self.loader.modules.get(&key).cloned() else {
            return self.missing_file(key);
        };
        self.loader.mark(&key);
        oxirb_log::debug!("load {key}");
        (*init)(self)?;
        Ok(true)
    }

    /// Whether `path` has been loaded.
    #[must_use]
    pub fn is_loaded(&self, path: &str) -> bool {
        let key = normalize_path(path, &self.loader.current_dir);
        self.loader.loaded.contains(&key)
    }

    /// Loaded paths in load order.
    #[must_use]
    pub fn loaded_features(&self) -> &[String] {
        &self.loader.features
    }

    #[must_use]
    pub fn current_dir(&self) -> &str {
        &self.loader.current_dir
    }

    pub fn set_current_dir(&mut self, dir: &str) {
        self.loader.current_dir = dir.to_string();
    }

    pub fn set_missing_require(&mut self, policy: MissingRequire) {
        self.loader.policy = policy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Value;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./foo.rb", "."), "foo");
        assert_eq!(normalize_path("lib/bar.opal", "."), "lib/bar");
        assert_eq!(normalize_path("baz.js", "lib"), "lib/baz");
        assert_eq!(normalize_path("../x", "lib/sub"), "lib/x");
        assert_eq!(normalize_path("/abs/./y.rb", "lib"), "/abs/y");
        assert_eq!(normalize_path("a//b", "."), "a/b");
    }

    #[test]
    fn test_require_runs_once() {
        let mut rt = Runtime::new().unwrap();
        rt.register_module("counter", |rt| {
            let object = rt.core().object;
            let count = rt
                .const_get_qualified(object, "Count")
                .ok()
                .and_then(|v| v.as_int())
                .unwrap_or(0);
            rt.const_set(object, "Count", (count + 1).into())
        });

        assert!(rt.require("counter.rb").unwrap());
        assert!(!rt.require("./counter").unwrap());
        assert!(rt.load("counter").unwrap());

        let object = rt.core().object;
        assert_eq!(rt.const_get_qualified(object, "Count").unwrap(), Value::Integer(2));
        assert_eq!(rt.loaded_features(), ["counter".to_string()]);
    }

    #[test]
    fn test_missing_require_policies() {
        let mut rt = Runtime::new().unwrap();
        let err = rt.require("nowhere").unwrap_err();
        assert_eq!(err.to_string(), "cannot load such file -- nowhere");

        rt.set_missing_require(MissingRequire::Ignore);
        assert!(!rt.require("nowhere").unwrap());
        assert!(!rt.is_loaded("nowhere"));
    }

    #[test]
    fn test_failed_initializer_is_not_marked() {
        let mut rt = Runtime::new().unwrap();
        rt.register_module("broken", |_rt| Err(Error::runtime("boom")));
        assert!(rt.require("broken").is_err());
        assert!(!rt.is_loaded("broken"));
        assert!(rt.loaded_features().is_empty());
    }
}
