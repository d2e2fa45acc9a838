//! Error types for the `oxirb` runtime.
//!
//! Every failure in the object model is reported through [`Error`]. Non-local
//! control transfer (`break` out of a block, `return` from a block to its
//! home method) travels through the same channel as [`Error::Break`] and
//! [`Error::NonLocalReturn`] so that `?` carries it up the host stack until
//! the frame owning the matching [`Tag`] catches it.

use crate::runtime::frame::Tag;
use crate::runtime::method::Arity;
use crate::runtime::value::{NativeKind, Value};
use std::fmt;

/// Errors raised by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Constant or class variable not found.
    NameError {
        /// The name that failed to resolve.
        name: String,
        /// Full human-readable message.
        message: String,
    },

    /// Method not found on the receiver (raised by the default
    /// `method_missing`).
    NoMethodError {
        /// Method name, without any dispatch prefix.
        name: String,
        /// Description of the receiver, e.g. `an instance of Foo`.
        receiver: String,
        /// Arguments passed at the call site.
        args: Vec<Value>,
    },

    /// `super` found no next method and `method_missing` is not overridden.
    NoSuperMethod {
        /// Method name being super-called.
        name: String,
        /// Description of the receiver.
        receiver: String,
    },

    /// Wrong kind of value supplied.
    TypeError {
        /// Full human-readable message.
        message: String,
    },

    /// Wrong number of arguments for a method or lambda.
    ArgumentError {
        /// Accepted argument counts.
        expected: Arity,
        /// Number of arguments supplied.
        got: usize,
    },

    /// Missing hash key on `fetch`.
    KeyError {
        /// Inspected key.
        key: String,
    },

    /// Including or prepending a module that already contains the target.
    CyclicInclude {
        /// Module being mixed in.
        module: String,
        /// Class or module receiving it.
        target: String,
    },

    /// Prepending the same module to the same target twice.
    DuplicatePrepend {
        /// Module being prepended.
        module: String,
        /// Target it was already prepended to.
        target: String,
    },

    /// Native kind bridged more than once.
    AlreadyBridged {
        /// The native kind.
        kind: NativeKind,
    },

    /// Value kind that cannot carry a singleton class.
    SingletonUnsupported {
        /// Class name of the value.
        kind: String,
    },

    /// `require` of a path with no registered initializer.
    LoadError {
        /// Normalized path.
        path: String,
    },

    /// Call depth exceeded the configured limit.
    StackOverflow {
        /// Depth at which the call was rejected.
        depth: usize,
    },

    /// A hash was mutated from inside one of its own key callbacks.
    Reentrant {
        /// What was being accessed.
        what: &'static str,
    },

    /// Generic runtime failure raised by method bodies.
    Runtime {
        /// Full human-readable message.
        message: String,
    },

    /// `break` from a block; caught by the call site that created it.
    Break {
        /// Break tag of the owning call site.
        tag: Tag,
        /// Value the call evaluates to.
        value: Value,
    },

    /// `return` from a block; caught by the home method's activation.
    NonLocalReturn {
        /// Activation tag of the home method.
        tag: Tag,
        /// Value the home method returns.
        value: Value,
    },
}

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Constant, class variable, method or super method not found.
    NameLookup,
    /// Wrong kind of value supplied.
    TypeMismatch,
    /// Cyclic include, double prepend, double bridge, unsupported singleton.
    Structural,
    /// Wrong argument count.
    Arity,
    /// Loader failure.
    Load,
    /// Any other failure raised while running method bodies.
    Runtime,
    /// Non-local control transfer, not a failure.
    Control,
}

impl Error {
    /// Builds a [`Error::TypeError`].
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError {
            message: message.into(),
        }
    }

    /// Builds a [`Error::Runtime`].
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime {
            message: message.into(),
        }
    }

    /// Builds a [`Error::NameError`].
    pub fn name_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NameError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NameError { .. }
            | Error::NoMethodError { .. }
            | Error::NoSuperMethod { .. }
            | Error::KeyError { .. } => ErrorKind::NameLookup,
            Error::TypeError { .. } => ErrorKind::TypeMismatch,
            Error::CyclicInclude { .. }
            | Error::DuplicatePrepend { .. }
            | Error::AlreadyBridged { .. }
            | Error::SingletonUnsupported { .. } => ErrorKind::Structural,
            Error::ArgumentError { .. } => ErrorKind::Arity,
            Error::LoadError { .. } => ErrorKind::Load,
            Error::StackOverflow { .. } | Error::Reentrant { .. } | Error::Runtime { .. } => {
                ErrorKind::Runtime
            }
            Error::Break { .. } | Error::NonLocalReturn { .. } => ErrorKind::Control,
        }
    }

    /// Name of the Ruby exception class this error surfaces as.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Error::NameError { .. } => "NameError",
            Error::NoMethodError { .. } | Error::NoSuperMethod { .. } => "NoMethodError",
            Error::TypeError { .. } => "TypeError",
            Error::ArgumentError { .. } | Error::CyclicInclude { .. } => "ArgumentError",
            Error::KeyError { .. } => "KeyError",
            Error::DuplicatePrepend { .. }
            | Error::AlreadyBridged { .. }
            | Error::Reentrant { .. }
            | Error::Runtime { .. } => "RuntimeError",
            Error::SingletonUnsupported { .. } => "TypeError",
            Error::LoadError { .. } => "LoadError",
            Error::StackOverflow { .. } => "SystemStackError",
            Error::Break { .. } | Error::NonLocalReturn { .. } => "LocalJumpError",
        }
    }

    /// Returns `true` for `break`/`return` signals.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.kind() == ErrorKind::Control
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NameError { message, .. }
            | Error::TypeError { message }
            | Error::Runtime { message } => f.write_str(message),
            Error::NoMethodError { name, receiver, .. } => {
                write!(f, "undefined method '{name}' for {receiver}")
            }
            Error::NoSuperMethod { name, receiver } => {
                write!(f, "super: no superclass method '{name}' for {receiver}")
            }
            Error::ArgumentError { expected, got } => {
                write!(
                    f,
                    "wrong number of arguments (given {got}, expected {expected})"
                )
            }
            Error::KeyError { key } => write!(f, "key not found: {key}"),
            Error::CyclicInclude { module, target } => {
                write!(f, "cyclic include detected: {module} into {target}")
            }
            Error::DuplicatePrepend { module, target } => {
                write!(f, "{module} already prepended to {target}")
            }
            Error::AlreadyBridged { kind } => {
                write!(f, "native type {kind:?} is already bridged")
            }
            Error::SingletonUnsupported { kind } => {
                write!(f, "can't define singleton for {kind}")
            }
            Error::LoadError { path } => write!(f, "cannot load such file -- {path}"),
            Error::StackOverflow { depth } => {
                write!(f, "stack level too deep (depth {depth})")
            }
            Error::Reentrant { what } => {
                write!(f, "{what} modified during key comparison")
            }
            Error::Break { .. } => f.write_str("break from proc-closure"),
            Error::NonLocalReturn { .. } => f.write_str("unexpected return"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
