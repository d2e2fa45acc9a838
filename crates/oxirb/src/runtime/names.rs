//! Well-known names.
//!
//! The runtime's symbol table is seeded with [`PRELUDE`], so each constant
//! below is the symbol its name interns to. Keep the two lists in step.

use oxirb_mem::Symbol;

pub const INITIALIZE: Symbol = Symbol::new(0);
pub const METHOD_MISSING: Symbol = Symbol::new(1);
pub const CONST_MISSING: Symbol = Symbol::new(2);
pub const INHERITED: Symbol = Symbol::new(3);
pub const INCLUDED: Symbol = Symbol::new(4);
pub const EXTENDED: Symbol = Symbol::new(5);
pub const PREPENDED: Symbol = Symbol::new(6);
pub const METHOD_ADDED: Symbol = Symbol::new(7);
pub const SINGLETON_METHOD_ADDED: Symbol = Symbol::new(8);
pub const METHOD_REMOVED: Symbol = Symbol::new(9);
pub const METHOD_UNDEFINED: Symbol = Symbol::new(10);
pub const HASH: Symbol = Symbol::new(11);
pub const EQL: Symbol = Symbol::new(12);
pub const EQ: Symbol = Symbol::new(13);
pub const INSPECT: Symbol = Symbol::new(14);
pub const TO_S: Symbol = Symbol::new(15);
pub const CALL: Symbol = Symbol::new(16);
pub const COERCE: Symbol = Symbol::new(17);
pub const CMP: Symbol = Symbol::new(18);

/// Names interned first, in id order.
pub const PRELUDE: &[&str] = &[
    "initialize",
    "method_missing",
    "const_missing",
    "inherited",
    "included",
    "extended",
    "prepended",
    "method_added",
    "singleton_method_added",
    "method_removed",
    "method_undefined",
    "hash",
    "eql?",
    "==",
    "inspect",
    "to_s",
    "call",
    "coerce",
    "<=>",
];

/// Prefix compiled call sites put on method names.
pub const DISPATCH_PREFIX: char = '$';

/// Strips the compiler's dispatch prefix, if present.
#[must_use]
pub fn strip_dispatch_prefix(name: &str) -> &str {
    name.strip_prefix(DISPATCH_PREFIX).unwrap_or(name)
}

/// Constant names start with an ASCII uppercase letter.
#[must_use]
pub fn is_constant_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
