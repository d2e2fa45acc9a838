//! Constant tables, lexical nesting, autoload and class variables.
//!
//! # Lookup Orders
//!
//! - qualified (`A::X`): own table of `A`, then its ancestors
//! - relative (`X` written inside nesting `[inner, .., outer]`): own tables
//!   of every enclosing scope innermost first, then the innermost scope's
//!   ancestors, then `Object` and its ancestors when the innermost scope is
//!   a module (or there is no nesting at all)
//!
//! Both results are cached against the global version counter; failures
//! are cached too. A cache is emptied the first time it is touched after
//! the version moves, so it only ever holds entries for one version. A miss goes through `const_missing` on the scope, whose
//! default implementation triggers a registered autoload before raising.

use crate::error::{Error, Result};
use crate::runtime::class::{Attached, ModuleId, ModuleKind};
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use fxhash::FxHashSet;
use oxirb_mem::Symbol;
use std::rc::Rc;

/// A lexical nesting: the modules enclosing a piece of code, innermost
/// first. Relative lookups are cached per nesting.
#[derive(Debug, Clone)]
pub struct Nesting {
    id: u64,
    scopes: Rc<[ModuleId]>,
}

impl Nesting {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn scopes(&self) -> &[ModuleId] {
        &self.scopes
    }

    #[must_use]
    pub fn innermost(&self) -> Option<ModuleId> {
        self.scopes.first().copied()
    }
}

impl Runtime {
    /// Registers a nesting, innermost scope first. Equal scope lists get
    /// the same id and so share cached lookups.
    pub fn nesting(&mut self, scopes: &[ModuleId]) -> Nesting {
        if let Some((scopes, id)) = self.nestings.get_key_value(scopes) {
            return Nesting {
                id: *id,
                scopes: Rc::clone(scopes),
            };
        }
        let id = self.nestings.len() as u64 + 1;
        let scopes: Rc<[ModuleId]> = scopes.into();
        self.nestings.insert(Rc::clone(&scopes), id);
        Nesting { id, scopes }
    }

    fn constant_symbol(&mut self, name: &str) -> Result<Symbol> {
        if !names::is_constant_name(name) {
            return Err(Error::name_error(name, format!("wrong constant name {name}")));
        }
        Ok(self.intern(name))
    }

    fn own_constant(&self, scope: ModuleId, name: Symbol) -> Option<Value> {
        self.record(scope).constants.get(&name).cloned()
    }

    fn inherited_constant(&mut self, scope: ModuleId, name: Symbol) -> Option<Value> {
        let ancestors = self.ancestors(scope);
        ancestors.iter().find_map(|m| self.own_constant(*m, name))
    }

    /// Binds `name` in `scope`. An anonymous module or class stored this
    /// way takes the name.
    ///
    /// # Errors
    ///
    /// `NameError` for names that are not constant names.
    pub fn const_set(&mut self, scope: ModuleId, name: &str, value: Value) -> Result<()> {
        let sym = self.constant_symbol(name)?;
        if let Value::Module(id) = &value {
            let object = self.core.object;
            let rec = self.record_mut(*id);
            if rec.name.is_none() && rec.kind != ModuleKind::Singleton {
                rec.name = Some(Rc::from(name));
                rec.base = (scope != object).then_some(scope);
            }
        }

        let rec = self.record_mut(scope);
        if rec.constants.insert(sym, value).is_none() {
            rec.const_order.push(sym);
        }
        rec.autoloads.remove(&sym);
        self.bump_version();
        Ok(())
    }

    /// `scope`'s own binding for `name`, without inheritance.
    ///
    /// # Errors
    ///
    /// Whatever `const_missing` raises.
    pub fn const_get_local(&mut self, scope: ModuleId, name: &str) -> Result<Value> {
        let sym = self.constant_symbol(name)?;
        match self.own_constant(scope, sym) {
            Some(value) => Ok(value),
            None => self.const_missing(scope, name),
        }
    }

    /// `scope::name`.
    ///
    /// # Errors
    ///
    /// Whatever `const_missing` raises (`NameError` by default).
    pub fn const_get_qualified(&mut self, scope: ModuleId, name: &str) -> Result<Value> {
        let sym = self.constant_symbol(name)?;
        let version = self.version;
        let rec = self.record_mut(scope);
        if rec.const_cache_stamp != version {
            rec.const_cache.clear();
            rec.const_cache_stamp = version;
        }
        let cached = rec.const_cache.get(&sym).cloned();

        let found = match cached {
            Some(hit) => {
                self.stats.const_cache_hits += 1;
                hit
            }
            None => {
                self.stats.const_cache_misses += 1;
                let found = self.inherited_constant(scope, sym);
                self.record_mut(scope).const_cache.insert(sym, found.clone());
                found
            }
        };

        match found {
            Some(value) => Ok(value),
            None => self.const_missing(scope, name),
        }
    }

    /// `name` written inside `nesting`.
    ///
    /// # Errors
    ///
    /// Whatever `const_missing` on the innermost scope raises.
    pub fn const_get_relative(&mut self, nesting: &Nesting, name: &str) -> Result<Value> {
        let sym = self.constant_symbol(name)?;
        let version = self.version;
        let key = (nesting.id, sym);
        if self.relative_cache_stamp != version {
            self.relative_cache.clear();
            self.relative_cache_stamp = version;
        }
        let cached = self.relative_cache.get(&key).cloned();

        let found = match cached {
            Some(hit) => {
                self.stats.const_cache_hits += 1;
                hit
            }
            None => {
                self.stats.const_cache_misses += 1;
                let found = self.relative_lookup(nesting, sym);
                self.relative_cache.insert(key, found.clone());
                found
            }
        };

        match found {
            Some(value) => Ok(value),
            None => {
                let scope = nesting.innermost().unwrap_or(self.core.object);
                self.const_missing(scope, name)
            }
        }
    }

    fn relative_lookup(&mut self, nesting: &Nesting, name: Symbol) -> Option<Value> {
        let object = self.core.object;
        let Some(innermost) = nesting.innermost() else {
            return self.inherited_constant(object, name);
        };
        if let Some(value) = nesting
            .scopes
            .iter()
            .find_map(|scope| self.own_constant(*scope, name))
        {
            return Some(value);
        }
        if let Some(value) = self.inherited_constant(innermost, name) {
            return Some(value);
        }
        if self.kind(innermost) == ModuleKind::Module {
            return self.inherited_constant(object, name);
        }
        None
    }

    /// `A::B::C` from `scope`; a leading `::` starts at `Object`.
    ///
    /// # Errors
    ///
    /// `TypeError` when an intermediate segment is not a module, plus
    /// whatever the segment lookups raise.
    pub fn const_get_path(&mut self, scope: ModuleId, path: &str) -> Result<Value> {
        let (mut current, rest) = match path.strip_prefix("::") {
            Some(rest) => (self.core.object, rest),
            None => (scope, path),
        };
        let mut segments = rest.split("::").peekable();
        let mut value = Value::Module(current);
        while let Some(segment) = segments.next() {
            value = self.const_get_qualified(current, segment)?;
            if segments.peek().is_some() {
                current = value.as_module().ok_or_else(|| {
                    Error::type_error(format!("{segment} does not refer to class/module"))
                })?;
            }
        }
        Ok(value)
    }

    /// Dispatches `const_missing(name)` to `scope`.
    ///
    /// # Errors
    ///
    /// `NameError` from the default handler, or whatever an override raises.
    pub fn const_missing(&mut self, scope: ModuleId, name: &str) -> Result<Value> {
        self.send(Value::Module(scope), names::CONST_MISSING, vec![Value::str(name)])
    }

    /// Built-in `const_missing`: loads a registered autoload for `name` and
    /// retries once, else raises `NameError`.
    pub(crate) fn default_const_missing(&mut self, scope: ModuleId, name: &str) -> Result<Value> {
        let sym = self.intern(name);
        let mut search = self.ancestors(scope).to_vec();
        if self.kind(scope) == ModuleKind::Module {
            let object = self.core.object;
            search.extend(self.ancestors(object).iter().copied());
        }

        let pending = search.iter().find_map(|m| {
            self.record(*m)
                .autoloads
                .get(&sym)
                .map(|path| (*m, Rc::clone(path)))
        });
        if let Some((owner, path)) = pending {
            self.record_mut(owner).autoloads.remove(&sym);
            oxirb_log::debug!("autoloading {name} from {path}");
            self.require(&path)?;
            if let Some(value) = search.iter().find_map(|m| self.own_constant(*m, sym)) {
                return Ok(value);
            }
        }

        let qualified = if scope == self.core.object {
            name.to_string()
        } else {
            format!("{}::{name}", self.display_name(scope))
        };
        Err(Error::name_error(
            name,
            format!("uninitialized constant {qualified}"),
        ))
    }

    /// Registers `path` to be required the first time `name` is missed in
    /// `scope`. Ignored when `name` is already bound there.
    ///
    /// # Errors
    ///
    /// `NameError` for names that are not constant names.
    pub fn autoload(&mut self, scope: ModuleId, name: &str, path: &str) -> Result<()> {
        let sym = self.constant_symbol(name)?;
        let rec = self.record_mut(scope);
        if !rec.constants.contains_key(&sym) {
            rec.autoloads.insert(sym, Rc::from(path));
        }
        Ok(())
    }

    /// Path registered for `name` in `scope` and not yet loaded.
    #[must_use]
    pub fn autoload_path(&self, scope: ModuleId, name: &str) -> Option<String> {
        let sym = self.symbols.get(name)?;
        self.record(scope).autoloads.get(&sym).map(|p| p.to_string())
    }

    /// `const_defined?`. Pending autoloads count as defined.
    pub fn const_defined(&mut self, scope: ModuleId, name: &str, inherit: bool) -> bool {
        let Ok(sym) = self.constant_symbol(name) else {
            return false;
        };
        let defined_in = |rt: &Runtime, m: ModuleId| {
            let rec = rt.record(m);
            rec.constants.contains_key(&sym) || rec.autoloads.contains_key(&sym)
        };
        if !inherit {
            return defined_in(&*self, scope);
        }
        let mut search = self.ancestors(scope).to_vec();
        if self.kind(scope) == ModuleKind::Module {
            let object = self.core.object;
            search.extend(self.ancestors(object).iter().copied());
        }
        search.iter().any(|m| defined_in(&*self, *m))
    }

    /// Constant names visible on `scope` in definition order. Inherited
    /// names exclude those from `Object` and above unless `scope` is
    /// `Object` itself.
    pub fn constants(&mut self, scope: ModuleId, inherit: bool) -> Vec<String> {
        let mut scopes = vec![scope];
        if inherit {
            let object = self.core.object;
            let hidden: FxHashSet<ModuleId> = if scope == object {
                FxHashSet::default()
            } else {
                self.ancestors(object).iter().copied().collect()
            };
            scopes.extend(
                self.ancestors(scope)
                    .iter()
                    .copied()
                    .filter(|m| *m != scope && !hidden.contains(m)),
            );
        }

        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for m in scopes {
            let rec = self.record(m);
            for sym in rec.const_order.iter().chain(rec.autoloads.keys()) {
                if seen.insert(*sym) {
                    found.push(self.symbol_name(*sym).to_string());
                }
            }
        }
        found
    }

    /// `remove_const`: unbinds `name` from `scope` and returns its value.
    ///
    /// # Errors
    ///
    /// `NameError` when `scope` has no own binding for `name`.
    pub fn remove_const(&mut self, scope: ModuleId, name: &str) -> Result<Value> {
        let sym = self.constant_symbol(name)?;
        let rec = self.record_mut(scope);
        let Some(value) = rec.constants.remove(&sym) else {
            return Err(Error::name_error(
                name,
                format!("constant {}::{name} not defined", self.display_name(scope)),
            ));
        };
        rec.const_order.retain(|s| *s != sym);
        self.bump_version();
        Ok(value)
    }

    fn cvar_symbol(&mut self, name: &str) -> Result<Symbol> {
        if !name.starts_with("@@") || name.len() < 3 {
            return Err(Error::name_error(
                name,
                format!("'{name}' is not allowed as a class variable name"),
            ));
        }
        Ok(self.intern(name))
    }

    /// Class variables of a singleton class live on the module it is
    /// attached to.
    fn cvar_base(&self, module: ModuleId) -> ModuleId {
        match self.record(module).attached.as_ref() {
            Some(Attached::Module(target)) => *target,
            Some(Attached::Object(obj)) => obj
                .upgrade()
                .map_or(module, |o| o.class),
            None => module,
        }
    }

    fn cvar_owner(&mut self, base: ModuleId, name: Symbol) -> Option<ModuleId> {
        let ancestors = self.ancestors(base);
        ancestors
            .iter()
            .copied()
            .find(|m| self.record(*m).cvars.contains_key(&name))
    }

    /// `@@name` read from code in `module`.
    ///
    /// # Errors
    ///
    /// `NameError` when no ancestor defines it.
    pub fn cvar_get(&mut self, module: ModuleId, name: &str) -> Result<Value> {
        let sym = self.cvar_symbol(name)?;
        let base = self.cvar_base(module);
        match self.cvar_owner(base, sym) {
            Some(owner) => Ok(self.record(owner).cvars[&sym].clone()),
            None => Err(Error::name_error(
                name,
                format!(
                    "uninitialized class variable {name} in {}",
                    self.display_name(base)
                ),
            )),
        }
    }

    /// `@@name = value` from code in `module`: updates the ancestor that
    /// already defines it, else defines it on `module`.
    ///
    /// # Errors
    ///
    /// `NameError` for names not starting with `@@`.
    pub fn cvar_set(&mut self, module: ModuleId, name: &str, value: Value) -> Result<()> {
        let sym = self.cvar_symbol(name)?;
        let base = self.cvar_base(module);
        let owner = self.cvar_owner(base, sym).unwrap_or(base);
        self.record_mut(owner).cvars.insert(sym, value);
        Ok(())
    }

    /// `class_variable_defined?`.
    pub fn cvar_defined(&mut self, module: ModuleId, name: &str) -> bool {
        let Ok(sym) = self.cvar_symbol(name) else {
            return false;
        };
        let base = self.cvar_base(module);
        self.cvar_owner(base, sym).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_constant_name() {
        let mut rt = Runtime::new().unwrap();
        let object = rt.core().object;
        let err = rt.const_set(object, "lower", Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "wrong constant name lower");
    }

    #[test]
    fn test_qualified_lookup_caches_failures() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "M").unwrap();

        rt.reset_stats();
        assert!(rt.const_get_qualified(m, "Missing").is_err());
        assert!(rt.const_get_qualified(m, "Missing").is_err());
        assert_eq!(rt.stats().const_cache_hits, 1);

        rt.const_set(m, "Missing", Value::Integer(1)).unwrap();
        assert_eq!(rt.const_get_qualified(m, "Missing").unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_equal_nestings_share_an_id() {
        let mut rt = Runtime::new().unwrap();
        let outer = rt.define_or_reopen_module(&Value::Nil, "Outer").unwrap();
        let inner = rt.define_or_reopen_module(&Value::Module(outer), "Inner").unwrap();

        let first = rt.nesting(&[inner, outer]);
        let again = rt.nesting(&[inner, outer]);
        let other = rt.nesting(&[outer]);
        assert_eq!(first.id(), again.id());
        assert_ne!(first.id(), other.id());
        assert_eq!(rt.nestings.len(), 2);
    }

    #[test]
    fn test_stale_lookups_are_dropped_after_a_write() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "M").unwrap();
        let nesting = rt.nesting(&[m]);
        for name in ["A", "B", "C"] {
            let _ = rt.const_get_relative(&nesting, name);
            let _ = rt.const_get_qualified(m, name);
        }
        assert_eq!(rt.relative_cache.len(), 3);
        assert_eq!(rt.record(m).const_cache.len(), 3);

        rt.const_set(m, "A", Value::Integer(1)).unwrap();
        assert_eq!(rt.const_get_relative(&nesting, "A").unwrap(), Value::Integer(1));
        assert_eq!(rt.const_get_qualified(m, "A").unwrap(), Value::Integer(1));
        assert_eq!(rt.relative_cache.len(), 1);
        assert_eq!(rt.record(m).const_cache.len(), 1);
    }

    #[test]
    fn test_const_set_names_anonymous_module() {
        let mut rt = Runtime::new().unwrap();
        let outer = rt.define_or_reopen_module(&Value::Nil, "Outer").unwrap();
        let anon = rt.allocate_module(None);
        assert_eq!(rt.module_name(anon), None);

        rt.const_set(outer, "Inner", Value::Module(anon)).unwrap();
        assert_eq!(rt.module_name(anon).as_deref(), Some("Outer::Inner"));

        // The first name sticks.
        let object = rt.core().object;
        rt.const_set(object, "Alias", Value::Module(anon)).unwrap();
        assert_eq!(rt.display_name(anon), "Outer::Inner");
    }

    #[test]
    fn test_const_get_path() {
        let mut rt = Runtime::new().unwrap();
        let object = rt.core().object;
        let a = rt.define_or_reopen_module(&Value::Nil, "A").unwrap();
        let b = rt.define_or_reopen_module(&Value::Module(a), "B").unwrap();
        rt.const_set(b, "C", Value::Integer(3)).unwrap();

        assert_eq!(rt.const_get_path(object, "A::B::C").unwrap(), Value::Integer(3));
        assert_eq!(rt.const_get_path(b, "::A").unwrap(), Value::Module(a));
    }

    #[test]
    fn test_remove_const() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "M").unwrap();
        rt.const_set(m, "X", Value::Integer(1)).unwrap();
        assert_eq!(rt.remove_const(m, "X").unwrap(), Value::Integer(1));
        assert!(!rt.const_defined(m, "X", false));
        assert_eq!(
            rt.remove_const(m, "X").unwrap_err().to_string(),
            "constant M::X not defined"
        );
    }

    #[test]
    fn test_constants_listing() {
        let mut rt = Runtime::new().unwrap();
        let parent = rt.define_or_reopen_class(&Value::Nil, None, "Parent").unwrap();
        let child = rt.define_or_reopen_class(&Value::Nil, Some(parent), "Child").unwrap();
        rt.const_set(parent, "P", Value::Integer(1)).unwrap();
        rt.const_set(child, "B", Value::Integer(2)).unwrap();
        rt.const_set(child, "A", Value::Integer(3)).unwrap();

        assert_eq!(rt.constants(child, false), vec!["B", "A"]);
        assert_eq!(rt.constants(child, true), vec!["B", "A", "P"]);
    }

    #[test]
    fn test_class_variables_shared_with_subclasses() {
        let mut rt = Runtime::new().unwrap();
        let parent = rt.define_or_reopen_class(&Value::Nil, None, "Parent").unwrap();
        let child = rt.define_or_reopen_class(&Value::Nil, Some(parent), "Child").unwrap();

        rt.cvar_set(parent, "@@count", Value::Integer(1)).unwrap();
        rt.cvar_set(child, "@@count", Value::Integer(2)).unwrap();
        assert_eq!(rt.cvar_get(parent, "@@count").unwrap(), Value::Integer(2));

        let meta = rt.singleton_class(&Value::Module(child)).unwrap();
        assert_eq!(rt.cvar_get(meta, "@@count").unwrap(), Value::Integer(2));

        let err = rt.cvar_get(child, "@@nope").unwrap_err();
        assert_eq!(err.to_string(), "uninitialized class variable @@nope in Child");
        assert!(rt.cvar_set(child, "plain", Value::Nil).is_err());
    }
}
