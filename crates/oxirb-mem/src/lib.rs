//! Name storage for the `oxirb` object runtime.
//!
//! Method names, constant names and instance-variable names are interned
//! once and passed around as 4-byte [`Symbol`] handles:
//!
//! - **Symbols**: `Copy` identifiers with O(1) equality and hashing
//! - **Symbol table**: bidirectional `&str` ⇄ [`Symbol`] mapping with an
//!   optional prelude of names that always receive the same ids

pub mod interner;
pub mod symbol;

pub use interner::SymbolTable;
pub use symbol::Symbol;
