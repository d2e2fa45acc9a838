//! Module and class records.
//!
//! Records live in the runtime's arena and are addressed by [`ModuleId`].
//! A record is never freed; reopening a class hands back the same id.

use crate::error::{Error, Result};
use crate::runtime::method::{Lookup, MethodEntry};
use crate::runtime::names;
use crate::runtime::value::{NativeKind, RObject, Value};
use crate::runtime::Runtime;
use fxhash::FxHashMap;
use oxirb_mem::Symbol;
use std::rc::{Rc, Weak};

/// Handle to a module or class record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        ModuleId(raw)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_index(index: usize) -> Self {
        ModuleId(index as u32)
    }

    /// Position in the module arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Module,
    Class,
    /// Singleton class of exactly one object, class or module.
    Singleton,
}

impl ModuleKind {
    /// Singleton classes are classes.
    #[must_use]
    pub const fn is_class(self) -> bool {
        !matches!(self, ModuleKind::Module)
    }
}

/// Owner of a singleton class.
#[derive(Clone)]
pub(crate) enum Attached {
    Module(ModuleId),
    Object(Weak<RObject>),
}

/// One include or prepend site: the mixed-in module and the snapshot of its
/// ancestor list taken when it was mixed in, minus modules the target
/// already had.
#[derive(Debug, Clone)]
pub(crate) struct MixinEntry {
    pub(crate) module: ModuleId,
    pub(crate) chain: Vec<ModuleId>,
}

pub(crate) struct ModuleRecord {
    pub(crate) kind: ModuleKind,
    /// Own name segment, set once.
    pub(crate) name: Option<Rc<str>>,
    /// Scope the record was first named in, for `Outer::Inner` names.
    pub(crate) base: Option<ModuleId>,
    pub(crate) superclass: Option<ModuleId>,
    pub(crate) methods: FxHashMap<Symbol, MethodEntry>,
    pub(crate) constants: FxHashMap<Symbol, Value>,
    pub(crate) const_order: Vec<Symbol>,
    pub(crate) cvars: FxHashMap<Symbol, Value>,
    pub(crate) ivars: FxHashMap<Symbol, Value>,
    /// Most recent first.
    pub(crate) includes: Vec<MixinEntry>,
    /// Most recent first.
    pub(crate) prepends: Vec<MixinEntry>,
    pub(crate) ancestors_cache: Option<(u64, Rc<[ModuleId]>)>,
    pub(crate) singleton: Option<ModuleId>,
    pub(crate) attached: Option<Attached>,
    pub(crate) autoloads: FxHashMap<Symbol, Rc<str>>,
    pub(crate) module_function: bool,
    /// Native kind instances wrap, inherited from a bridged superclass.
    pub(crate) native: Option<NativeKind>,
    pub(crate) method_cache: FxHashMap<Symbol, Lookup>,
    pub(crate) method_cache_stamp: (u64, u64),
    pub(crate) const_cache: FxHashMap<Symbol, Option<Value>>,
    pub(crate) const_cache_stamp: u64,
}

impl ModuleRecord {
    pub(crate) fn new(kind: ModuleKind, name: Option<Rc<str>>, superclass: Option<ModuleId>) -> Self {
        ModuleRecord {
            kind,
            name,
            base: None,
            superclass,
            methods: FxHashMap::default(),
            constants: FxHashMap::default(),
            const_order: Vec::new(),
            cvars: FxHashMap::default(),
            ivars: FxHashMap::default(),
            includes: Vec::new(),
            prepends: Vec::new(),
            ancestors_cache: None,
            singleton: None,
            attached: None,
            autoloads: FxHashMap::default(),
            module_function: false,
            native: None,
            method_cache: FxHashMap::default(),
            method_cache_stamp: (u64::MAX, u64::MAX),
            const_cache: FxHashMap::default(),
            const_cache_stamp: u64::MAX,
        }
    }
}

impl Runtime {
    pub(crate) fn record(&self, id: ModuleId) -> &ModuleRecord {
        &self.modules[id.index()]
    }

    pub(crate) fn record_mut(&mut self, id: ModuleId) -> &mut ModuleRecord {
        &mut self.modules[id.index()]
    }

    pub(crate) fn push_record(&mut self, record: ModuleRecord) -> ModuleId {
        let id = ModuleId::from_index(self.modules.len());
        self.modules.push(record);
        id
    }

    #[must_use]
    pub fn kind(&self, id: ModuleId) -> ModuleKind {
        self.record(id).kind
    }

    #[must_use]
    pub fn is_class(&self, id: ModuleId) -> bool {
        self.record(id).kind.is_class()
    }

    #[must_use]
    pub fn is_singleton(&self, id: ModuleId) -> bool {
        self.record(id).kind == ModuleKind::Singleton
    }

    /// Recorded superclass; `None` for modules and the root class.
    #[must_use]
    pub fn superclass(&self, id: ModuleId) -> Option<ModuleId> {
        self.record(id).superclass
    }

    /// Allocates a class under `superclass` (or a new root when `None`).
    ///
    /// Instances of the class wrap the native kind of a bridged superclass.
    /// When the superclass already has a singleton class, the new class gets
    /// one immediately so singleton methods stay inherited.
    ///
    /// # Errors
    ///
    /// `TypeError` when `superclass` is a module, a singleton class or
    /// `Class` itself.
    pub fn allocate_class(&mut self, name: Option<&str>, superclass: Option<ModuleId>) -> Result<ModuleId> {
        let native = match superclass {
            Some(sup) => {
                let rec = self.record(sup);
                if rec.kind == ModuleKind::Module {
                    return Err(Error::type_error(format!(
                        "superclass must be a Class ({} given)",
                        self.display_name(sup)
                    )));
                }
                if rec.kind == ModuleKind::Singleton {
                    return Err(Error::type_error("can't make subclass of singleton class"));
                }
                if sup == self.core.class {
                    return Err(Error::type_error("can't make subclass of Class"));
                }
                rec.native
            }
            None => None,
        };

        let mut record = ModuleRecord::new(ModuleKind::Class, name.map(Rc::from), superclass);
        record.native = native;
        let id = self.push_record(record);
        oxirb_log::debug!("allocated class {}", self.display_name(id));

        if let Some(sup) = superclass {
            if self.record(sup).singleton.is_some() {
                self.module_singleton(id);
            }
        }
        Ok(id)
    }

    /// Allocates a module. Its ancestor list is just itself.
    pub fn allocate_module(&mut self, name: Option<&str>) -> ModuleId {
        let id = self.push_record(ModuleRecord::new(ModuleKind::Module, name.map(Rc::from), None));
        oxirb_log::debug!("allocated module {}", self.display_name(id));
        id
    }

    /// Module a definition in `scope` targets: modules stand for
    /// themselves, `nil` for `Object`, anything else for its class.
    pub(crate) fn definition_scope(&self, scope: &Value) -> ModuleId {
        match scope {
            Value::Module(id) => *id,
            Value::Nil => self.core.object,
            other => self.real_class_of(other),
        }
    }

    /// Existing constant a class or module definition would reopen. At the
    /// top level, constants inherited by `Object` count as well.
    fn existing_definition(&mut self, scope: ModuleId, name: Symbol) -> Option<Value> {
        if let Some(v) = self.record(scope).constants.get(&name) {
            return Some(v.clone());
        }
        if scope != self.core.object {
            return None;
        }
        let ancestors = self.ancestors(scope);
        ancestors
            .iter()
            .find_map(|m| self.record(*m).constants.get(&name).cloned())
    }

    /// `class Name < superclass` inside `scope`.
    ///
    /// Reopens an existing class when the superclass matches (or none was
    /// requested); otherwise allocates the class, binds it as a constant of
    /// `scope` and fires `inherited` on the superclass.
    ///
    /// # Errors
    ///
    /// `TypeError` for a non-class superclass, a constant that is not a
    /// class, or a superclass mismatch.
    pub fn define_or_reopen_class(
        &mut self,
        scope: &Value,
        superclass: Option<ModuleId>,
        name: &str,
    ) -> Result<ModuleId> {
        let scope = self.definition_scope(scope);
        if let Some(sup) = superclass {
            if !self.is_class(sup) {
                return Err(Error::type_error(format!(
                    "superclass must be a Class ({} given)",
                    self.display_name(sup)
                )));
            }
        }

        let sym = self.intern(name);
        if let Some(existing) = self.existing_definition(scope, sym) {
            let Value::Module(id) = existing else {
                return Err(Error::type_error(format!("{name} is not a class")));
            };
            if !self.is_class(id) {
                return Err(Error::type_error(format!("{name} is not a class")));
            }
            if let Some(sup) = superclass {
                if self.superclass(id) != Some(sup) {
                    return Err(Error::type_error(format!(
                        "superclass mismatch for class {name}"
                    )));
                }
            }
            return Ok(id);
        }

        let sup = superclass.unwrap_or(self.core.object);
        let id = self.allocate_class(None, Some(sup))?;
        self.const_set(scope, name, Value::Module(id))?;
        self.fire_hook(Value::Module(sup), names::INHERITED, vec![Value::Module(id)])?;
        Ok(id)
    }

    /// `module Name` inside `scope`.
    ///
    /// # Errors
    ///
    /// `TypeError` when the name is bound to something other than a module.
    /// `Object` itself may be reopened this way.
    pub fn define_or_reopen_module(&mut self, scope: &Value, name: &str) -> Result<ModuleId> {
        let scope = self.definition_scope(scope);
        let sym = self.intern(name);
        if let Some(existing) = self.existing_definition(scope, sym) {
            return match existing {
                Value::Module(id)
                    if self.kind(id) == ModuleKind::Module || id == self.core.object =>
                {
                    Ok(id)
                }
                _ => Err(Error::type_error(format!("{name} is not a module"))),
            };
        }

        let id = self.allocate_module(None);
        self.const_set(scope, name, Value::Module(id))?;
        Ok(id)
    }

    /// Bridges a native kind onto `class`: afterwards every host value of
    /// that kind dispatches as an instance of `class`, and subclasses of
    /// `class` construct instances wrapping a value of that kind.
    ///
    /// # Errors
    ///
    /// `AlreadyBridged` when `kind` was bridged before; `TypeError` when
    /// `class` is a module.
    pub fn bridge(&mut self, kind: NativeKind, class: ModuleId) -> Result<()> {
        if self.bridges.contains_key(&kind) {
            return Err(Error::AlreadyBridged { kind });
        }
        if !self.is_class(class) {
            return Err(Error::type_error(format!(
                "can't bridge {kind:?} onto module {}",
                self.display_name(class)
            )));
        }
        self.bridges.insert(kind, class);
        self.record_mut(class).native = Some(kind);
        self.bump_method_serial();
        Ok(())
    }

    /// Class a native kind is bridged to.
    #[must_use]
    pub fn bridged_class(&self, kind: NativeKind) -> Option<ModuleId> {
        self.bridges.get(&kind).copied()
    }

    /// Fully qualified name (`Outer::Inner`), or `None` while anonymous.
    #[must_use]
    pub fn module_name(&self, id: ModuleId) -> Option<String> {
        let mut segments: Vec<Rc<str>> = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let rec = self.record(current);
            let Some(name) = rec.name.clone() else {
                // Named inside an anonymous scope.
                if current == id {
                    return None;
                }
                break;
            };
            segments.push(name);
            cursor = rec.base.filter(|b| *b != self.core.object);
            if segments.len() > 64 {
                break;
            }
        }
        segments.reverse();
        Some(segments.join("::"))
    }

    /// Name for display: the qualified name, `#<Class:Target>` for
    /// singleton classes, or an address-style placeholder when anonymous.
    #[must_use]
    pub fn display_name(&self, id: ModuleId) -> String {
        if let Some(name) = self.module_name(id) {
            return name;
        }
        let rec = self.record(id);
        match &rec.attached {
            Some(Attached::Module(target)) => {
                format!("#<Class:{}>", self.display_name(*target))
            }
            Some(Attached::Object(target)) => match target.upgrade() {
                Some(obj) => format!(
                    "#<Class:#<{}:0x{:016x}>>",
                    self.display_name(obj.class),
                    obj.id.as_u64()
                ),
                None => "#<Class:#<Object>>".to_string(),
            },
            None => {
                let label = if rec.kind == ModuleKind::Module { "Module" } else { "Class" };
                format!(
                    "#<{label}:0x{:016x}>",
                    Value::Module(id).object_id().unsigned_abs()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reopen_class_returns_same_record() {
        let mut rt = Runtime::new().unwrap();
        let object = rt.core().object;
        let first = rt.define_or_reopen_class(&Value::Nil, None, "Foo").unwrap();
        let again = rt.define_or_reopen_class(&Value::Nil, Some(object), "Foo").unwrap();
        let bare = rt.define_or_reopen_class(&Value::Nil, None, "Foo").unwrap();
        assert_eq!(first, again);
        assert_eq!(first, bare);
        assert_eq!(rt.superclass(first), Some(object));
    }

    #[test]
    fn test_superclass_mismatch() {
        let mut rt = Runtime::new().unwrap();
        let base = rt.define_or_reopen_class(&Value::Nil, None, "Base").unwrap();
        rt.define_or_reopen_class(&Value::Nil, None, "Leaf").unwrap();
        let err = rt
            .define_or_reopen_class(&Value::Nil, Some(base), "Leaf")
            .unwrap_err();
        assert_eq!(err.to_string(), "superclass mismatch for class Leaf");
    }

    #[test]
    fn test_module_and_class_names_collide() {
        let mut rt = Runtime::new().unwrap();
        rt.define_or_reopen_module(&Value::Nil, "Mixin").unwrap();
        rt.define_or_reopen_class(&Value::Nil, None, "Thing").unwrap();

        let err = rt.define_or_reopen_class(&Value::Nil, None, "Mixin").unwrap_err();
        assert_eq!(err.to_string(), "Mixin is not a class");
        let err = rt.define_or_reopen_module(&Value::Nil, "Thing").unwrap_err();
        assert_eq!(err.to_string(), "Thing is not a module");
    }

    #[test]
    fn test_object_reopens_as_module() {
        let mut rt = Runtime::new().unwrap();
        let object = rt.core().object;
        assert_eq!(rt.define_or_reopen_module(&Value::Nil, "Object").unwrap(), object);
    }

    #[test]
    fn test_module_superclass_rejected() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "M").unwrap();
        let err = rt.define_or_reopen_class(&Value::Nil, Some(m), "C").unwrap_err();
        assert_eq!(err.to_string(), "superclass must be a Class (M given)");
    }

    #[test]
    fn test_nested_names() {
        let mut rt = Runtime::new().unwrap();
        let outer = rt.define_or_reopen_module(&Value::Nil, "Outer").unwrap();
        let inner = rt
            .define_or_reopen_class(&Value::Module(outer), None, "Inner")
            .unwrap();
        assert_eq!(rt.module_name(inner).as_deref(), Some("Outer::Inner"));

        let anon = rt.allocate_class(None, Some(rt.core().object)).unwrap();
        assert_eq!(rt.module_name(anon), None);
        assert!(rt.display_name(anon).starts_with("#<Class:0x"));
    }

    #[test]
    fn test_bridge_twice_fails() {
        let mut rt = Runtime::new().unwrap();
        let class = rt.allocate_class(Some("Text"), Some(rt.core().object)).unwrap();
        let err = rt.bridge(NativeKind::String, class).unwrap_err();
        assert_eq!(err, Error::AlreadyBridged { kind: NativeKind::String });
        assert_eq!(rt.bridged_class(NativeKind::String), Some(rt.core().string));
    }

    #[test]
    fn test_subclass_inherits_native_kind() {
        let mut rt = Runtime::new().unwrap();
        let string = rt.core().string;
        let sub = rt.define_or_reopen_class(&Value::Nil, Some(string), "Text").unwrap();
        assert_eq!(rt.record(sub).native, Some(NativeKind::String));
    }

    #[test]
    fn test_eager_singleton_cascade() {
        let mut rt = Runtime::new().unwrap();
        let parent = rt.define_or_reopen_class(&Value::Nil, None, "Parent").unwrap();
        rt.singleton_class(&Value::Module(parent)).unwrap();
        let child = rt.define_or_reopen_class(&Value::Nil, Some(parent), "Child").unwrap();
        assert!(rt.record(child).singleton.is_some());
    }
}
