//! Call frames, blocks and control-transfer tags.

use crate::error::{Error, Result};
use crate::runtime::method::{Arity, Method};
use crate::runtime::value::{ObjectId, Value};
use crate::runtime::Runtime;
use oxirb_mem::Symbol;
use std::fmt;
use std::rc::Rc;

/// Unique token for one method activation or one block-passing call site.
///
/// `return` from a block carries the home method's tag, `break` carries the
/// tag of the call that received the block; only the frame that allocated a
/// tag catches signals bearing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(u64);

impl Tag {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Tag(raw)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Activation record passed to native method bodies.
pub struct Frame {
    pub receiver: Value,
    pub args: Vec<Value>,
    pub block: Option<Rc<Proc>>,
    /// The executing method; for an alias call this is the aliased original.
    pub method: Rc<Method>,
    /// Name the method was called by.
    pub name: Symbol,
    pub tag: Tag,
    /// Where `method` sits in the receiver's ancestor list when a `super`
    /// chain put it there; `super` resumes after this slot.
    pub(crate) ancestor_index: Option<usize>,
}

impl Frame {
    /// Argument `index`, or `nil` past the end.
    #[must_use]
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Builds the `return` signal for this activation.
    #[must_use]
    pub fn return_with(&self, value: Value) -> Error {
        Error::NonLocalReturn {
            tag: self.tag,
            value,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("receiver", &self.receiver)
            .field("args", &self.args)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Block body.
pub type BlockFn = dyn Fn(&mut Runtime, &BlockCall) -> Result<Value>;

/// A block, proc or lambda.
pub struct Proc {
    id: ObjectId,
    pub(crate) body: Rc<BlockFn>,
    pub(crate) arity: Arity,
    pub(crate) lambda: bool,
    pub(crate) self_value: Value,
    /// Activation a `return` inside the block returns from.
    pub(crate) home: Option<Tag>,
    /// Call site a `break` inside the block terminates.
    pub(crate) break_tag: Option<Tag>,
}

impl Proc {
    pub(crate) fn new(
        body: Rc<BlockFn>,
        arity: Arity,
        self_value: Value,
        home: Option<Tag>,
        break_tag: Option<Tag>,
    ) -> Self {
        Proc {
            id: ObjectId::next(),
            body,
            arity,
            lambda: false,
            self_value,
            home,
            break_tag,
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    #[must_use]
    pub fn is_lambda(&self) -> bool {
        self.lambda
    }

    /// Arguments as a non-lambda block receives them: a lone array is
    /// splatted across multiple parameters, missing ones read as `nil` and
    /// extras are dropped.
    pub(crate) fn adapt_args(&self, mut args: Vec<Value>) -> Vec<Value> {
        let wants = self.arity.required() + usize::from(self.arity.max() != Some(self.arity.required()));
        if wants > 1 && args.len() == 1 {
            if let Value::Array(items) = &args[0] {
                let spread = items.items().clone();
                args = spread;
            }
        }
        if args.len() < self.arity.required() {
            args.resize(self.arity.required(), Value::Nil);
        }
        if let Some(max) = self.arity.max() {
            args.truncate(max);
        }
        args
    }
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proc")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .field("lambda", &self.lambda)
            .finish_non_exhaustive()
    }
}

/// Activation record passed to block bodies.
pub struct BlockCall {
    pub args: Vec<Value>,
    pub self_value: Value,
    pub block: Option<Rc<Proc>>,
    pub(crate) home: Option<Tag>,
    pub(crate) break_tag: Option<Tag>,
}

impl BlockCall {
    /// Argument `index`, or `nil` past the end.
    #[must_use]
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Builds the `break` signal; without a receiving call site this is a
    /// `LocalJumpError`.
    #[must_use]
    pub fn break_with(&self, value: Value) -> Error {
        match self.break_tag {
            Some(tag) => Error::Break { tag, value },
            None => Error::runtime("break from proc-closure (LocalJumpError)"),
        }
    }

    /// Builds the `return` signal targeting the home activation.
    #[must_use]
    pub fn return_with(&self, value: Value) -> Error {
        match self.home {
            Some(tag) => Error::NonLocalReturn { tag, value },
            None => Error::runtime("unexpected return (LocalJumpError)"),
        }
    }
}
