//! Method bodies, method-table entries and arity.

use crate::error::Result;
use crate::runtime::frame::Frame;
use crate::runtime::{ModuleId, Runtime};
use crate::runtime::value::Value;
use oxirb_mem::Symbol;
use std::fmt;
use std::rc::Rc;

/// Native method body.
pub type NativeFn = dyn Fn(&mut Runtime, &Frame) -> Result<Value>;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arity {
    required: usize,
    optional: usize,
    rest: bool,
}

impl Arity {
    /// Accepts any number of arguments.
    pub const ANY: Arity = Arity::rest(0);

    /// Exactly `n` arguments.
    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Arity {
            required: n,
            optional: 0,
            rest: false,
        }
    }

    /// `required` arguments plus up to `optional` more.
    #[must_use]
    pub const fn range(required: usize, optional: usize) -> Self {
        Arity {
            required,
            optional,
            rest: false,
        }
    }

    /// At least `required` arguments.
    #[must_use]
    pub const fn rest(required: usize) -> Self {
        Arity {
            required,
            optional: 0,
            rest: true,
        }
    }

    #[must_use]
    pub const fn required(self) -> usize {
        self.required
    }

    /// Maximum count, or `None` when a rest parameter is present.
    #[must_use]
    pub const fn max(self) -> Option<usize> {
        if self.rest {
            None
        } else {
            Some(self.required + self.optional)
        }
    }

    #[must_use]
    pub const fn check(self, got: usize) -> bool {
        got >= self.required && (self.rest || got <= self.required + self.optional)
    }

    /// Ruby's `arity` integer: `n` when fixed, `-(required + 1)` otherwise.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn value(self) -> i64 {
        if self.rest || self.optional > 0 {
            -(self.required as i64) - 1
        } else {
            self.required as i64
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "{}+", self.required)
        } else if self.optional > 0 {
            write!(f, "{}..{}", self.required, self.required + self.optional)
        } else {
            write!(f, "{}", self.required)
        }
    }
}

/// A method as stored in a method table.
///
/// Aliases share the body of the method they alias and link to it through
/// `alias_of`. The link always points at a non-alias method, so calling an
/// alias costs exactly one trampoline hop however deep the aliasing goes.
pub struct Method {
    pub(crate) name: Symbol,
    pub(crate) owner: ModuleId,
    pub(crate) arity: Arity,
    pub(crate) body: Rc<NativeFn>,
    pub(crate) alias_of: Option<Rc<Method>>,
}

impl Method {
    pub(crate) fn native(name: Symbol, owner: ModuleId, arity: Arity, body: Rc<NativeFn>) -> Self {
        Method {
            name,
            owner,
            arity,
            body,
            alias_of: None,
        }
    }

    /// Builds an alias of `original` named `name` on `owner`.
    pub(crate) fn alias(name: Symbol, owner: ModuleId, original: &Rc<Method>) -> Self {
        let original = original.original();
        Method {
            name,
            owner,
            arity: original.arity,
            body: Rc::clone(&original.body),
            alias_of: Some(original),
        }
    }

    /// Same body re-owned by `owner`; used for `module_function` copies.
    pub(crate) fn copy_to(&self, owner: ModuleId) -> Self {
        Method {
            name: self.name,
            owner,
            arity: self.arity,
            body: Rc::clone(&self.body),
            alias_of: self.alias_of.clone(),
        }
    }

    /// Name the method was defined or aliased under.
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Module whose table holds this method.
    #[must_use]
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    /// The ultimate aliased method, or a clone of `self` for non-aliases.
    #[must_use]
    pub fn original(self: &Rc<Self>) -> Rc<Method> {
        match &self.alias_of {
            Some(original) => Rc::clone(original),
            None => Rc::clone(self),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("arity", &self.arity)
            .field("alias", &self.alias_of.is_some())
            .finish_non_exhaustive()
    }
}

/// A method-table slot.
///
/// `Undefined` hides inherited definitions from this module down; `Stub`
/// marks a name registered as a possible call site so that calling it
/// redirects to `method_missing`. Neither counts as a real method.
#[derive(Debug, Clone)]
pub enum MethodEntry {
    Defined(Rc<Method>),
    Undefined,
    Stub,
}

impl MethodEntry {
    #[must_use]
    pub fn method(&self) -> Option<&Rc<Method>> {
        match self {
            MethodEntry::Defined(m) => Some(m),
            _ => None,
        }
    }
}

/// Outcome of a method lookup along an ancestor list.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// A real method.
    Found(Rc<Method>),
    /// Hidden by `undef_method`.
    Hidden,
    /// Only a `method_missing` stub.
    Stub,
    /// Nothing registered under the name.
    Missing,
}

impl Lookup {
    #[must_use]
    pub fn found(&self) -> Option<&Rc<Method>> {
        match self {
            Lookup::Found(m) => Some(m),
            _ => None,
        }
    }
}
