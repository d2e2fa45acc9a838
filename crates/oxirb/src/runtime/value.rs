//! Runtime values, identity and truthiness.
//!
//! Immediates (`nil`, booleans, integers, floats) are stored inline. Every
//! other value is a reference-counted host allocation stamped with an
//! [`ObjectId`] when it is created, so `object_id` is stable for the life of
//! the value and distinct between values that merely look alike.
//!
//! # Identity scheme
//!
//! | Value        | `object_id`                  |
//! |--------------|------------------------------|
//! | `false`      | `0`                          |
//! | `nil`        | `8`                          |
//! | `true`       | `20`                         |
//! | Integer `n`  | `2n + 1` (always odd)        |
//! | Float        | `(bits << 2) \| 2` (≡ 2 mod 4) |
//! | heap values  | multiples of 8 from `1024`   |
//! | modules      | `-8 * (index + 1)`           |

use crate::runtime::frame::Proc;
use crate::runtime::hash::HashTable;
use crate::runtime::ModuleId;
use fxhash::FxHashMap;
use oxirb_mem::Symbol;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// First id handed to a heap value.
const FIRST_HEAP_ID: u64 = 1024;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(FIRST_HEAP_ID);

/// Identity of a heap-allocated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocates a fresh id. Ids are never reused within a process.
    #[must_use]
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(8, Ordering::Relaxed))
    }

    /// Raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Native value kinds that can be bridged onto a class record.
///
/// Each kind is bridged at most once; afterwards every host value of that
/// kind answers class and dispatch queries as an instance of the bridged
/// class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Nil,
    True,
    False,
    Integer,
    Float,
    String,
    Array,
    Hash,
    Range,
    Regexp,
    Proc,
}

impl NativeKind {
    /// Every kind, in bridging order.
    pub const ALL: [NativeKind; 11] = [
        NativeKind::Nil,
        NativeKind::True,
        NativeKind::False,
        NativeKind::Integer,
        NativeKind::Float,
        NativeKind::String,
        NativeKind::Array,
        NativeKind::Hash,
        NativeKind::Range,
        NativeKind::Regexp,
        NativeKind::Proc,
    ];

    /// Name of the class this kind is bridged to at boot.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            NativeKind::Nil => "NilClass",
            NativeKind::True => "TrueClass",
            NativeKind::False => "FalseClass",
            NativeKind::Integer => "Integer",
            NativeKind::Float => "Float",
            NativeKind::String => "String",
            NativeKind::Array => "Array",
            NativeKind::Hash => "Hash",
            NativeKind::Range => "Range",
            NativeKind::Regexp => "Regexp",
            NativeKind::Proc => "Proc",
        }
    }
}

/// Immutable string value. Strings double as symbols.
#[derive(Clone)]
pub struct RString {
    id: ObjectId,
    text: Rc<str>,
}

impl RString {
    /// Creates a new string with its own identity.
    #[must_use]
    pub fn new(text: impl Into<Rc<str>>) -> Self {
        RString {
            id: ObjectId::next(),
            text: text.into(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text, used as the fast-path hash key.
    #[must_use]
    pub fn shared(&self) -> Rc<str> {
        Rc::clone(&self.text)
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl fmt::Debug for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.text)
    }
}

/// Growable array.
pub struct RArray {
    pub(crate) id: ObjectId,
    pub(crate) items: RefCell<Vec<Value>>,
}

impl RArray {
    #[must_use]
    pub fn items(&self) -> std::cell::Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Hash value; the table itself lives in [`HashTable`].
pub struct RHash {
    pub(crate) id: ObjectId,
    pub(crate) table: RefCell<HashTable>,
}

impl RHash {
    /// Borrows the underlying table for inspection.
    ///
    /// # Panics
    ///
    /// Panics if the table is being mutated by a runtime operation.
    #[must_use]
    pub fn table(&self) -> std::cell::Ref<'_, HashTable> {
        self.table.borrow()
    }
}

/// Range of two endpoint values.
pub struct RRange {
    pub(crate) id: ObjectId,
    pub start: Value,
    pub end: Value,
    pub exclusive: bool,
}

/// Regular expression. Matching is delegated to external string
/// collaborators; the runtime only needs source and options for
/// identity, equality and hashing.
pub struct RRegexp {
    pub(crate) id: ObjectId,
    pub source: Box<str>,
    pub options: u32,
}

/// Instance of a user-level class.
pub struct RObject {
    pub(crate) id: ObjectId,
    pub(crate) class: ModuleId,
    pub(crate) ivars: RefCell<FxHashMap<Symbol, Value>>,
    pub(crate) singleton: Cell<Option<ModuleId>>,
    /// Native value wrapped by instances of subclasses of bridged classes.
    pub(crate) payload: Option<Value>,
}

impl RObject {
    #[must_use]
    pub fn class(&self) -> ModuleId {
        self.class
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Nil,
    True,
    False,
    Integer(i64),
    Float(f64),
    String(RString),
    Array(Rc<RArray>),
    Hash(Rc<RHash>),
    Range(Rc<RRange>),
    Regexp(Rc<RRegexp>),
    Proc(Rc<Proc>),
    Object(Rc<RObject>),
    Module(ModuleId),
}

impl Value {
    #[must_use]
    pub fn bool(b: bool) -> Value {
        if b { Value::True } else { Value::False }
    }

    #[must_use]
    pub fn str(text: &str) -> Value {
        Value::String(RString::new(text))
    }

    #[must_use]
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RArray {
            id: ObjectId::next(),
            items: RefCell::new(items),
        }))
    }

    #[must_use]
    pub fn hash(table: HashTable) -> Value {
        Value::Hash(Rc::new(RHash {
            id: ObjectId::next(),
            table: RefCell::new(table),
        }))
    }

    #[must_use]
    pub fn range(start: Value, end: Value, exclusive: bool) -> Value {
        Value::Range(Rc::new(RRange {
            id: ObjectId::next(),
            start,
            end,
            exclusive,
        }))
    }

    #[must_use]
    pub fn regexp(source: &str, options: u32) -> Value {
        Value::Regexp(Rc::new(RRegexp {
            id: ObjectId::next(),
            source: source.into(),
            options,
        }))
    }

    /// Only `nil` and `false` are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::False)
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Stable identity; see the module docs for the encoding.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn object_id(&self) -> i64 {
        match self {
            Value::False => 0,
            Value::Nil => 8,
            Value::True => 20,
            Value::Integer(n) => n.wrapping_mul(2).wrapping_add(1),
            Value::Float(f) => ((f.to_bits() << 2) | 2) as i64,
            Value::Module(m) => -8 * (m.index() as i64 + 1),
            other => other.heap_id().map_or(0, |id| id.as_u64() as i64),
        }
    }

    /// Identity for heap values; `None` for immediates and modules.
    #[must_use]
    pub fn heap_id(&self) -> Option<ObjectId> {
        match self {
            Value::String(s) => Some(s.id),
            Value::Array(a) => Some(a.id),
            Value::Hash(h) => Some(h.id),
            Value::Range(r) => Some(r.id),
            Value::Regexp(r) => Some(r.id),
            Value::Proc(p) => Some(p.id()),
            Value::Object(o) => Some(o.id),
            _ => None,
        }
    }

    /// Reference identity (`equal?`).
    #[must_use]
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)
            | (Value::True, Value::True)
            | (Value::False, Value::False) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Module(a), Value::Module(b)) => a == b,
            (a, b) => match (a.heap_id(), b.heap_id()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Native kind used for bridging; `None` for objects and modules.
    #[must_use]
    pub fn native_kind(&self) -> Option<NativeKind> {
        Some(match self {
            Value::Nil => NativeKind::Nil,
            Value::True => NativeKind::True,
            Value::False => NativeKind::False,
            Value::Integer(_) => NativeKind::Integer,
            Value::Float(_) => NativeKind::Float,
            Value::String(_) => NativeKind::String,
            Value::Array(_) => NativeKind::Array,
            Value::Hash(_) => NativeKind::Hash,
            Value::Range(_) => NativeKind::Range,
            Value::Regexp(_) => NativeKind::Regexp,
            Value::Proc(_) => NativeKind::Proc,
            Value::Object(_) | Value::Module(_) => return None,
        })
    }

    /// The native value carried by an instance of a bridged subclass, or
    /// `self` for everything else.
    #[must_use]
    pub fn unwrap_native(&self) -> &Value {
        match self {
            Value::Object(o) => o.payload.as_ref().unwrap_or(self),
            _ => self,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Value::Module(id) => Some(*id),
            _ => None,
        }
    }

    /// Short description of the value's shape, used in error messages
    /// where no runtime is at hand.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Object(_) => "Object",
            Value::Module(_) => "Module",
            other => other.native_kind().map_or("Object", NativeKind::class_name),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

/// Host-level equality: by value for immediates and string text, by
/// identity for everything else. Ruby-level `==` goes through dispatch.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.as_str() == b.as_str(),
            (Value::Float(a), Value::Float(b)) => a == b,
            (a, b) => a.identical(b),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::True => f.write_str("true"),
            Value::False => f.write_str("false"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(a) => f.debug_list().entries(a.items.borrow().iter()).finish(),
            Value::Hash(h) => write!(f, "#<Hash:{} entries>", h.table.borrow().len()),
            Value::Range(r) => {
                let dots = if r.exclusive { "..." } else { ".." };
                write!(f, "{:?}{dots}{:?}", r.start, r.end)
            }
            Value::Regexp(r) => write!(f, "/{}/", r.source),
            Value::Proc(p) => write!(f, "#<Proc:{}>", p.id().as_u64()),
            Value::Object(o) => write!(f, "#<Object:{}>", o.id.as_u64()),
            Value::Module(m) => write!(f, "#<Module:{}>", m.index()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<ModuleId> for Value {
    fn from(id: ModuleId) -> Self {
        Value::Module(id)
    }
}
