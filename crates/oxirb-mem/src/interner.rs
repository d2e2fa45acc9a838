//! Bidirectional name interning.
//!
//! The table keeps two structures in step:
//! - `names`: `Symbol` id → name (resolution is a vector index)
//! - `ids`: name → `Symbol` (interning is one hash probe)
//!
//! Names are stored as `Rc<str>` so resolved names can be handed out to
//! runtime values without copying.
//!
//! ```
//! use oxirb_mem::SymbolTable;
//!
//! let mut table = SymbolTable::with_prelude(&["initialize", "method_missing"]);
//!
//! // Prelude names keep their positions as ids.
//! assert_eq!(table.intern("method_missing").as_u32(), 1);
//!
//! let foo = table.intern("foo");
//! assert_eq!(table.intern("foo"), foo);
//! assert_eq!(table.resolve(foo), Some("foo"));
//! ```

use crate::symbol::Symbol;
use hashbrown::HashMap;
use std::rc::Rc;

/// Interner for method, constant and variable names.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Rc<str>>,
    ids: HashMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table whose first ids are `prelude[0]`, `prelude[1]`, ...
    ///
    /// Duplicate prelude entries collapse onto the first occurrence, which
    /// shifts every later id; callers that rely on fixed ids must pass a
    /// duplicate-free list.
    #[must_use]
    pub fn with_prelude(prelude: &[&str]) -> Self {
        let mut table = Self {
            names: Vec::with_capacity(prelude.len() * 2),
            ids: HashMap::with_capacity(prelude.len() * 2),
        };
        for name in prelude {
            table.intern(name);
        }
        table
    }

    /// Returns the symbol for `name`, adding it if unseen.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` distinct names are interned.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.ids.get(name) {
            return sym;
        }

        let id = u32::try_from(self.names.len()).expect("symbol table exhausted");
        let sym = Symbol::new(id);
        let shared: Rc<str> = Rc::from(name);
        self.names.push(Rc::clone(&shared));
        self.ids.insert(shared, sym);
        sym
    }

    /// Returns the symbol for `name` without adding it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.ids.get(name).copied()
    }

    /// Returns the name behind `sym`.
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.names.get(sym.index()).map(|name| &**name)
    }

    /// Returns a shared handle to the name behind `sym`.
    #[must_use]
    pub fn resolve_shared(&self, sym: Symbol) -> Option<Rc<str>> {
        self.names.get(sym.index()).cloned()
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
