//! Include, prepend and the linearized ancestor list.
//!
//! Each record keeps its mixins as [`MixinEntry`] snapshots. The ancestor
//! list of a record is
//!
//! ```text
//! prepend chains (most recent first) ++ [self] ++
//! include chains (most recent first) ++ ancestors(superclass)
//! ```
//!
//! with no dedupe across records: a module mixed into both a class and its
//! superclass appears once for each. Include and prepend keep a single
//! record free of repeats. The flattened list is cached per record and
//! stamped with the global version counter, which every include,
//! prepend and constant write bumps.

use crate::error::{Error, Result};
use crate::runtime::class::{MixinEntry, ModuleId, ModuleKind};
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use fxhash::FxHashSet;
use std::rc::Rc;

impl Runtime {
    /// Linearized lookup order for `id`.
    pub fn ancestors(&mut self, id: ModuleId) -> Rc<[ModuleId]> {
        if let Some((stamp, list)) = &self.record(id).ancestors_cache {
            if *stamp == self.version {
                return Rc::clone(list);
            }
        }

        let rec = self.record(id);
        let mut list: Vec<ModuleId> = Vec::new();
        for entry in &rec.prepends {
            list.extend_from_slice(&entry.chain);
        }
        list.push(id);
        for entry in &rec.includes {
            list.extend_from_slice(&entry.chain);
        }
        let superclass = rec.superclass;
        if let Some(sup) = superclass {
            let inherited = self.ancestors(sup);
            list.extend_from_slice(&inherited);
        }

        let list: Rc<[ModuleId]> = list.into();
        let version = self.version;
        self.record_mut(id).ancestors_cache = Some((version, Rc::clone(&list)));
        list
    }

    fn require_module(&self, module: ModuleId) -> Result<()> {
        if self.kind(module) == ModuleKind::Module {
            Ok(())
        } else {
            Err(Error::type_error(format!(
                "wrong argument type {} (expected Module)",
                self.display_name(module)
            )))
        }
    }

    /// Mixes `module` into `target` without firing hooks.
    fn append_features(&mut self, target: ModuleId, module: ModuleId) -> Result<()> {
        self.require_module(module)?;
        let module_ancestors = self.ancestors(module);
        if module_ancestors.contains(&target) {
            return Err(Error::CyclicInclude {
                module: self.display_name(module),
                target: self.display_name(target),
            });
        }

        let current = self.ancestors(target);
        let existing = self
            .record(target)
            .includes
            .iter()
            .position(|e| e.module == module);

        match existing {
            Some(pos) => {
                // Re-inclusion: refresh this site's snapshot so mixins the
                // module gained since show up, without duplicating anything
                // the target already reaches another way.
                let own = &self.record(target).includes[pos].chain;
                let chain: Vec<ModuleId> = module_ancestors
                    .iter()
                    .copied()
                    .filter(|m| own.contains(m) || !current.contains(m))
                    .collect();
                if chain == *own {
                    return Ok(());
                }
                self.record_mut(target).includes[pos].chain = chain;
            }
            None => {
                let chain: Vec<ModuleId> = module_ancestors
                    .iter()
                    .copied()
                    .filter(|m| !current.contains(m))
                    .collect();
                if chain.is_empty() {
                    return Ok(());
                }
                self.record_mut(target)
                    .includes
                    .insert(0, MixinEntry { module, chain });
            }
        }

        self.bump_version();
        oxirb_log::debug!(
            "included {} into {}",
            self.display_name(module),
            self.display_name(target)
        );
        Ok(())
    }

    /// `target.include(module)`; fires `module.included(target)`.
    ///
    /// Including an already-included module again picks up modules it has
    /// gained since, in place.
    ///
    /// # Errors
    ///
    /// `TypeError` when `module` is a class; `CyclicInclude` when `module`
    /// already has `target` among its ancestors.
    pub fn include(&mut self, target: ModuleId, module: ModuleId) -> Result<()> {
        self.append_features(target, module)?;
        self.fire_hook(Value::Module(module), names::INCLUDED, vec![Value::Module(target)])
    }

    /// `target.prepend(module)`; fires `module.prepended(target)`.
    ///
    /// # Errors
    ///
    /// `TypeError` when `module` is a class; `CyclicInclude` for cycles;
    /// `DuplicatePrepend` when `module` was already prepended to `target`.
    pub fn prepend(&mut self, target: ModuleId, module: ModuleId) -> Result<()> {
        self.require_module(module)?;
        let module_ancestors = self.ancestors(module);
        if module_ancestors.contains(&target) {
            return Err(Error::CyclicInclude {
                module: self.display_name(module),
                target: self.display_name(target),
            });
        }

        let rec = self.record(target);
        if rec.prepends.iter().any(|e| e.module == module) {
            return Err(Error::DuplicatePrepend {
                module: self.display_name(module),
                target: self.display_name(target),
            });
        }
        let taken: FxHashSet<ModuleId> = rec
            .prepends
            .iter()
            .flat_map(|e| e.chain.iter().copied())
            .collect();
        let chain: Vec<ModuleId> = module_ancestors
            .iter()
            .copied()
            .filter(|m| !taken.contains(m))
            .collect();

        self.record_mut(target)
            .prepends
            .insert(0, MixinEntry { module, chain });
        self.bump_version();
        oxirb_log::debug!(
            "prepended {} to {}",
            self.display_name(module),
            self.display_name(target)
        );
        self.fire_hook(Value::Module(module), names::PREPENDED, vec![Value::Module(target)])
    }

    /// `value.extend(module)`: includes `module` into the singleton class of
    /// `value` and fires `module.extended(value)`.
    ///
    /// # Errors
    ///
    /// As [`include`](Self::include), plus `SingletonUnsupported`.
    pub fn extend(&mut self, value: &Value, module: ModuleId) -> Result<()> {
        let singleton = self.singleton_class(value)?;
        self.append_features(singleton, module)?;
        self.fire_hook(Value::Module(module), names::EXTENDED, vec![value.clone()])
    }

    /// Modules (not classes) among the ancestors of `id`.
    pub fn included_modules(&mut self, id: ModuleId) -> Vec<ModuleId> {
        self.ancestors(id)
            .iter()
            .copied()
            .filter(|m| self.kind(*m) == ModuleKind::Module && *m != id)
            .collect()
    }

    /// `id.include?(module)`.
    pub fn includes_module(&mut self, id: ModuleId, module: ModuleId) -> bool {
        module != id
            && self.kind(module) == ModuleKind::Module
            && self.ancestors(id).contains(&module)
    }

    /// `value.is_a?(module)`.
    pub fn is_a(&mut self, value: &Value, module: ModuleId) -> bool {
        let class = self.class_of(value);
        self.ancestors(class).contains(&module)
    }
}
