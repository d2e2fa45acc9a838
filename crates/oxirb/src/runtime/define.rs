//! Method definition, removal, undefinition and aliasing.
//!
//! Every method-table write bumps the method serial, which invalidates the
//! per-class lookup caches, and then fires the matching hook on the owner:
//! `method_added` (or `singleton_method_added` on the object a singleton
//! class belongs to), `method_removed` or `method_undefined`.

use crate::error::{Error, Result};
use crate::runtime::class::{ModuleId, ModuleKind};
use crate::runtime::frame::Frame;
use crate::runtime::method::{Arity, Lookup, Method, MethodEntry, NativeFn};
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use fxhash::FxHashSet;
use oxirb_mem::Symbol;
use std::rc::Rc;

impl Runtime {
    /// Defines `name` on `owner` with a host closure as body.
    ///
    /// # Errors
    ///
    /// Whatever a `method_added` hook raises.
    pub fn define_method<F>(
        &mut self,
        owner: ModuleId,
        name: &str,
        arity: Arity,
        body: F,
    ) -> Result<Rc<Method>>
    where
        F: Fn(&mut Runtime, &Frame) -> Result<Value> + 'static,
    {
        let name = self.intern(names::strip_dispatch_prefix(name));
        self.define_native(owner, name, arity, Rc::new(body))
    }

    /// Defines `name` on `owner` from an already shared body.
    ///
    /// # Errors
    ///
    /// Whatever a `method_added` hook raises.
    pub fn define_native(
        &mut self,
        owner: ModuleId,
        name: Symbol,
        arity: Arity,
        body: Rc<NativeFn>,
    ) -> Result<Rc<Method>> {
        let method = Rc::new(Method::native(name, owner, arity, body));
        self.install_method(owner, Rc::clone(&method))?;
        Ok(method)
    }

    /// Defines `name` on the singleton class of `target`.
    ///
    /// # Errors
    ///
    /// `SingletonUnsupported` for native values, plus whatever the
    /// `singleton_method_added` hook raises.
    pub fn define_singleton_method<F>(
        &mut self,
        target: &Value,
        name: &str,
        arity: Arity,
        body: F,
    ) -> Result<Rc<Method>>
    where
        F: Fn(&mut Runtime, &Frame) -> Result<Value> + 'static,
    {
        let singleton = self.singleton_class(target)?;
        self.define_method(singleton, name, arity, body)
    }

    fn install_method(&mut self, owner: ModuleId, method: Rc<Method>) -> Result<()> {
        let name = method.name;
        self.record_mut(owner)
            .methods
            .insert(name, MethodEntry::Defined(Rc::clone(&method)));
        self.bump_method_serial();

        let rec = self.record(owner);
        if rec.module_function && rec.kind == ModuleKind::Module {
            let singleton = self.module_singleton(owner);
            let copy = Rc::new(method.copy_to(singleton));
            self.record_mut(singleton)
                .methods
                .insert(name, MethodEntry::Defined(copy));
        }

        oxirb_log::trace!(
            "defined {}#{}",
            self.display_name(owner),
            self.symbol_name(name)
        );
        self.method_added(owner, name)
    }

    fn method_added(&mut self, owner: ModuleId, name: Symbol) -> Result<()> {
        let arg = vec![Value::str(&self.symbol_name(name))];
        if self.is_singleton(owner) {
            match self.singleton_target(owner) {
                Some(target) => self.fire_hook(target, names::SINGLETON_METHOD_ADDED, arg),
                None => Ok(()),
            }
        } else {
            self.fire_hook(Value::Module(owner), names::METHOD_ADDED, arg)
        }
    }

    /// Finds `name` for `alias_method`/`undef_method` on `owner`: along its
    /// ancestors and, for modules, along `Object`'s.
    fn resolve_for_definition(&mut self, owner: ModuleId, name: Symbol) -> Option<Rc<Method>> {
        if let Lookup::Found(method) = self.find_method(owner, name) {
            return Some(method);
        }
        if self.kind(owner) == ModuleKind::Module {
            let object = self.core.object;
            if let Lookup::Found(method) = self.find_method(object, name) {
                return Some(method);
            }
        }
        None
    }

    fn kind_label(&self, owner: ModuleId) -> &'static str {
        if self.is_class(owner) { "class" } else { "module" }
    }

    /// `remove_method`: deletes `owner`'s own definition so inherited ones
    /// show through again.
    ///
    /// # Errors
    ///
    /// `NameError` when `owner` has no own real method `name`.
    pub fn remove_method(&mut self, owner: ModuleId, name: &str) -> Result<()> {
        let sym = self.intern(name);
        if !matches!(
            self.record(owner).methods.get(&sym),
            Some(MethodEntry::Defined(_))
        ) {
            return Err(Error::name_error(
                name,
                format!("method '{name}' not defined in {}", self.display_name(owner)),
            ));
        }
        self.record_mut(owner).methods.remove(&sym);
        self.bump_method_serial();
        self.fire_hook(
            Value::Module(owner),
            names::METHOD_REMOVED,
            vec![Value::str(name)],
        )
    }

    /// `undef_method`: hides `name` from `owner` and everything below it.
    ///
    /// # Errors
    ///
    /// `NameError` when `name` does not resolve to a real method.
    pub fn undef_method(&mut self, owner: ModuleId, name: &str) -> Result<()> {
        let sym = self.intern(name);
        if self.resolve_for_definition(owner, sym).is_none() {
            return Err(Error::name_error(
                name,
                format!(
                    "undefined method '{name}' for {} '{}'",
                    self.kind_label(owner),
                    self.display_name(owner)
                ),
            ));
        }
        self.record_mut(owner)
            .methods
            .insert(sym, MethodEntry::Undefined);
        self.bump_method_serial();
        self.fire_hook(
            Value::Module(owner),
            names::METHOD_UNDEFINED,
            vec![Value::str(name)],
        )
    }

    /// `alias_method new_name, old_name` on `owner`.
    ///
    /// The alias links straight to the non-alias original, so aliasing an
    /// alias still costs a single hop at call time.
    ///
    /// # Errors
    ///
    /// `NameError` when `old_name` does not resolve to a real method.
    pub fn alias_method(
        &mut self,
        owner: ModuleId,
        new_name: &str,
        old_name: &str,
    ) -> Result<Rc<Method>> {
        let old = self.intern(old_name);
        let Some(found) = self.resolve_for_definition(owner, old) else {
            return Err(Error::name_error(
                old_name,
                format!(
                    "undefined method '{old_name}' for {} '{}'",
                    self.kind_label(owner),
                    self.display_name(owner)
                ),
            ));
        };
        let new = self.intern(new_name);
        let alias = Rc::new(Method::alias(new, owner, &found));
        self.install_method(owner, Rc::clone(&alias))?;
        Ok(alias)
    }

    /// Registers names compiled code may call. Each becomes a stub on
    /// `BasicObject` unless that slot is already taken, so calling a name
    /// nobody defined lands in `method_missing`.
    pub fn add_stubs(&mut self, stubs: &[&str]) {
        let root = self.core.basic_object;
        let mut added = 0usize;
        for stub in stubs {
            let sym = self.intern(names::strip_dispatch_prefix(stub));
            let methods = &mut self.record_mut(root).methods;
            if !methods.contains_key(&sym) {
                methods.insert(sym, MethodEntry::Stub);
                added += 1;
            }
        }
        if added > 0 {
            self.bump_method_serial();
            oxirb_log::debug!("registered {added} method stubs");
        }
    }

    /// `module_function`. With no names, methods defined on `module` from
    /// now on are also copied to its singleton class; with names, those
    /// methods are copied right away.
    ///
    /// # Errors
    ///
    /// `TypeError` for classes; `NameError` for names that do not resolve.
    pub fn module_function(&mut self, module: ModuleId, methods: &[&str]) -> Result<()> {
        if self.kind(module) != ModuleKind::Module {
            return Err(Error::type_error(format!(
                "module_function must be called for modules, not {}",
                self.display_name(module)
            )));
        }
        if methods.is_empty() {
            self.record_mut(module).module_function = true;
            return Ok(());
        }

        let singleton = self.module_singleton(module);
        for name in methods {
            let sym = self.intern(name);
            let Lookup::Found(method) = self.find_method(module, sym) else {
                return Err(Error::name_error(
                    *name,
                    format!(
                        "undefined method '{name}' for module '{}'",
                        self.display_name(module)
                    ),
                ));
            };
            let copy = Rc::new(method.copy_to(singleton));
            self.record_mut(singleton)
                .methods
                .insert(sym, MethodEntry::Defined(copy));
        }
        self.bump_method_serial();
        Ok(())
    }

    /// Sorted names of the real methods instances of `module` respond to.
    /// Undefined markers hide the names they shadow; stubs never show.
    pub fn instance_methods(&mut self, module: ModuleId, inherited: bool) -> Vec<String> {
        let scopes: Vec<ModuleId> = if inherited {
            self.ancestors(module).to_vec()
        } else {
            vec![module]
        };

        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for scope in scopes {
            for (sym, entry) in &self.record(scope).methods {
                if seen.insert(*sym) && matches!(entry, MethodEntry::Defined(_)) {
                    found.push(self.symbol_name(*sym).to_string());
                }
            }
        }
        found.sort();
        found
    }

    /// `method_defined?`.
    pub fn method_defined(&mut self, module: ModuleId, name: &str) -> bool {
        self.instance_method(module, name).is_some()
    }

    /// Method instances of `module` would run for `name`.
    pub fn instance_method(&mut self, module: ModuleId, name: &str) -> Option<Rc<Method>> {
        let sym = self.intern(names::strip_dispatch_prefix(name));
        self.find_method(module, sym).found().cloned()
    }

    /// Module holding the method instances of `module` would run for `name`.
    pub fn owner_of(&mut self, module: ModuleId, name: &str) -> Option<ModuleId> {
        self.instance_method(module, name).map(|m| m.owner)
    }
}
