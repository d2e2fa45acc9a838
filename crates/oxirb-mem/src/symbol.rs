//! Interned name handles.
//!
//! ```
//! use oxirb_mem::Symbol;
//!
//! let a = Symbol::new(7);
//! assert_eq!(a, Symbol::new(7));
//! assert_eq!(a.index(), 7);
//! ```

use std::fmt;

/// A handle to a name stored in a [`SymbolTable`](crate::SymbolTable).
///
/// Two symbols from the same table are equal exactly when their names are
/// equal. Symbols from different tables must not be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    /// Wraps a raw id. Prelude constants are built this way.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Raw id as an index into the table's storage.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Symbol> for u32 {
    fn from(sym: Symbol) -> u32 {
        sym.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_symbol_equality_by_id() {
        assert_eq!(Symbol::new(3), Symbol::new(3));
        assert_ne!(Symbol::new(3), Symbol::new(4));
    }

    #[test]
    fn test_symbol_ordering_follows_ids() {
        let mut syms = vec![Symbol::new(9), Symbol::new(1), Symbol::new(5)];
        syms.sort();
        assert_eq!(syms, vec![Symbol::new(1), Symbol::new(5), Symbol::new(9)]);
    }

    #[test]
    fn test_symbol_hashes_as_set_member() {
        let set: HashSet<Symbol> = [1, 2, 2, 3].into_iter().map(Symbol::new).collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_symbol_display() {
        assert_eq!(Symbol::new(12).to_string(), "#12");
        assert_eq!(u32::from(Symbol::new(12)), 12);
    }
}
