//! The object runtime.
//!
//! A [`Runtime`] owns every piece of process-wide state the object model
//! needs: the module arena, the global version counter that invalidates
//! ancestor and constant caches, the bridge table for native value kinds,
//! the loader registry and the output sink.
//!
//! # Architecture
//!
//! - [`class`]: module and class records, allocation, reopening, bridging
//! - [`ancestors`]: include/prepend/extend and the cached linearization
//! - [`singleton`]: singleton classes and `class_of`
//! - [`dispatch`]: method lookup, sends, `method_missing`, `super`, blocks
//! - [`define`]: method definition, removal, undefinition, aliasing, stubs
//! - [`constant`]: constant tables, lexical nesting, class variables
//! - [`object`]: instances, instance variables, hash keys
//! - [`hash`]: the insertion-ordered hash table
//! - [`loader`]: `require`/`load` registry
//! - `builtins`: the core library methods registered at boot
//!
//! # Example
//!
//! ```
//! use oxirb::{Arity, Runtime, Value};
//!
//! let mut rt = Runtime::new().unwrap();
//! let object = rt.core().object;
//! let greeter = rt
//!     .define_or_reopen_class(&Value::Nil, Some(object), "Greeter")
//!     .unwrap();
//! rt.define_method(greeter, "greet", Arity::exact(0), |_rt, _frame| {
//!     Ok(Value::str("hello"))
//! })
//! .unwrap();
//!
//! let obj = rt.new_instance(greeter, vec![], None).unwrap();
//! let reply = rt.call(obj, "greet", vec![]).unwrap();
//! assert_eq!(reply.as_str(), Some("hello"));
//! ```

pub mod ancestors;
mod builtins;
pub mod class;
pub mod constant;
pub mod define;
pub mod dispatch;
pub mod frame;
pub mod hash;
pub mod io;
pub mod loader;
pub mod method;
pub mod names;
pub mod object;
pub mod singleton;
pub mod stats;
pub mod value;

pub use class::{ModuleId, ModuleKind};
pub use constant::Nesting;
pub use frame::{BlockCall, Frame, Proc, Tag};
pub use hash::{DefaultPolicy, HashTable, KeyProtocol};
pub use io::{CaptureSink, OutputSink, StdSink};
pub use loader::Initializer;
pub use method::{Arity, Lookup, Method, MethodEntry};
pub use stats::RuntimeStats;
pub use value::{NativeKind, ObjectId, Value};

use crate::config::RuntimeConfig;
use crate::error::Result;
use class::ModuleRecord;
use fxhash::FxHashMap;
use loader::Loader;
use oxirb_mem::{Symbol, SymbolTable};
use std::rc::Rc;

/// Handles to the classes and modules created at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreClasses {
    pub basic_object: ModuleId,
    pub object: ModuleId,
    pub module: ModuleId,
    pub class: ModuleId,
    pub kernel: ModuleId,
    pub comparable: ModuleId,
    pub nil_class: ModuleId,
    pub true_class: ModuleId,
    pub false_class: ModuleId,
    pub numeric: ModuleId,
    pub integer: ModuleId,
    pub float: ModuleId,
    pub string: ModuleId,
    pub array: ModuleId,
    pub hash: ModuleId,
    pub range: ModuleId,
    pub regexp: ModuleId,
    pub proc_class: ModuleId,
}

impl CoreClasses {
    /// Class a native kind is bridged to at boot.
    #[must_use]
    pub fn for_kind(&self, kind: NativeKind) -> ModuleId {
        match kind {
            NativeKind::Nil => self.nil_class,
            NativeKind::True => self.true_class,
            NativeKind::False => self.false_class,
            NativeKind::Integer => self.integer,
            NativeKind::Float => self.float,
            NativeKind::String => self.string,
            NativeKind::Array => self.array,
            NativeKind::Hash => self.hash,
            NativeKind::Range => self.range,
            NativeKind::Regexp => self.regexp,
            NativeKind::Proc => self.proc_class,
        }
    }
}

/// The object runtime. See the [module docs](self).
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) symbols: SymbolTable,
    /// Records are never freed: a `ModuleId` stays valid for the life of the
    /// runtime, including the singleton class of an object that has since
    /// been dropped.
    pub(crate) modules: Vec<ModuleRecord>,
    /// Bumped on include, prepend, extend and every constant write.
    pub(crate) version: u64,
    /// Bumped on every method-table write.
    pub(crate) method_serial: u64,
    pub(crate) core: CoreClasses,
    pub(crate) bridges: FxHashMap<NativeKind, ModuleId>,
    /// Relative lookups for the current version only, keyed by nesting id.
    pub(crate) relative_cache: FxHashMap<(u64, Symbol), Option<Value>>,
    pub(crate) relative_cache_stamp: u64,
    /// Nesting ids, shared by structurally equal scope lists.
    pub(crate) nestings: FxHashMap<Rc<[ModuleId]>, u64>,
    next_tag: u64,
    pub(crate) depth: usize,
    pub(crate) booting: bool,
    pub(crate) loader: Loader,
    pub(crate) output: Box<dyn OutputSink>,
    pub(crate) stats: RuntimeStats,
    pub(crate) default_method_missing: Option<Rc<Method>>,
    pub(crate) main: Value,
}

impl Runtime {
    /// Boots a runtime with [`RuntimeConfig::default`].
    ///
    /// # Errors
    ///
    /// Fails only if core library registration fails.
    pub fn new() -> Result<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Boots a runtime with `config`.
    ///
    /// # Errors
    ///
    /// Fails only if core library registration fails.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        if let Some(level) = config.log_level {
            oxirb_log::set_level(level);
        }

        let mut modules = Vec::new();
        let mut raw = |kind: ModuleKind, name: &str, superclass: Option<ModuleId>| {
            let id = ModuleId::from_index(modules.len());
            modules.push(ModuleRecord::new(kind, Some(Rc::from(name)), superclass));
            id
        };

        let basic_object = raw(ModuleKind::Class, "BasicObject", None);
        let object = raw(ModuleKind::Class, "Object", Some(basic_object));
        let module = raw(ModuleKind::Class, "Module", Some(object));
        let class = raw(ModuleKind::Class, "Class", Some(module));
        let kernel = raw(ModuleKind::Module, "Kernel", None);
        let comparable = raw(ModuleKind::Module, "Comparable", None);
        let nil_class = raw(ModuleKind::Class, "NilClass", Some(object));
        let true_class = raw(ModuleKind::Class, "TrueClass", Some(object));
        let false_class = raw(ModuleKind::Class, "FalseClass", Some(object));
        let numeric = raw(ModuleKind::Class, "Numeric", Some(object));
        let integer = raw(ModuleKind::Class, "Integer", Some(numeric));
        let float = raw(ModuleKind::Class, "Float", Some(numeric));
        let string = raw(ModuleKind::Class, "String", Some(object));
        let array = raw(ModuleKind::Class, "Array", Some(object));
        let hash = raw(ModuleKind::Class, "Hash", Some(object));
        let range = raw(ModuleKind::Class, "Range", Some(object));
        let regexp = raw(ModuleKind::Class, "Regexp", Some(object));
        let proc_class = raw(ModuleKind::Class, "Proc", Some(object));

        let core = CoreClasses {
            basic_object,
            object,
            module,
            class,
            kernel,
            comparable,
            nil_class,
            true_class,
            false_class,
            numeric,
            integer,
            float,
            string,
            array,
            hash,
            range,
            regexp,
            proc_class,
        };

        let loader = Loader::new(config.current_dir.clone(), config.missing_require);
        let mut rt = Runtime {
            config,
            symbols: SymbolTable::with_prelude(names::PRELUDE),
            modules,
            version: 0,
            method_serial: 0,
            core,
            bridges: FxHashMap::default(),
            relative_cache: FxHashMap::default(),
            relative_cache_stamp: 0,
            nestings: FxHashMap::default(),
            next_tag: 0,
            depth: 0,
            booting: true,
            loader,
            output: Box::new(StdSink),
            stats: RuntimeStats::default(),
            default_method_missing: None,
            main: Value::Nil,
        };
        rt.boot()?;
        Ok(rt)
    }

    fn boot(&mut self) -> Result<()> {
        let core = self.core;
        for index in 0..self.modules.len() {
            let id = ModuleId::from_index(index);
            let name = self.record(id).name.clone();
            if let Some(name) = name {
                self.const_set(core.object, &name, Value::Module(id))?;
            }
        }

        self.include(core.object, core.kernel)?;
        self.include(core.numeric, core.comparable)?;
        self.include(core.string, core.comparable)?;

        for kind in NativeKind::ALL {
            self.bridge(kind, core.for_kind(kind))?;
        }

        builtins::install(self)?;

        let main = self.allocate(core.object)?;
        self.define_singleton_method(&main, "to_s", Arity::exact(0), |_rt, _frame| {
            Ok(Value::str("main"))
        })?;
        let main_class = self.singleton_class(&main)?;
        self.alias_method(main_class, "inspect", "to_s")?;
        self.main = main;

        self.booting = false;
        self.stats = RuntimeStats::default();
        oxirb_log::debug!("runtime booted with {} modules", self.modules.len());
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn core(&self) -> CoreClasses {
        self.core
    }

    /// The top-level `self`.
    #[must_use]
    pub fn main(&self) -> Value {
        self.main.clone()
    }

    /// Current value of the global version counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Name of `sym`; empty for symbols from another table.
    #[must_use]
    pub fn symbol_name(&self, sym: Symbol) -> Rc<str> {
        self.symbols.resolve_shared(sym).unwrap_or_else(|| Rc::from(""))
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RuntimeStats::default();
    }

    /// Replaces the sink `puts`, `print` and `warn` write to.
    pub fn set_output(&mut self, sink: Box<dyn OutputSink>) {
        self.output = sink;
    }

    pub(crate) fn next_tag(&mut self) -> Tag {
        self.next_tag += 1;
        Tag::new(self.next_tag)
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub(crate) fn bump_method_serial(&mut self) {
        self.method_serial += 1;
    }
}
