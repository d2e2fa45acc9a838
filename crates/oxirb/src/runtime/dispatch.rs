//! Method lookup and dispatch.
//!
//! # Dispatch Flow
//!
//! 1. `class_of(receiver)`: singleton class if any, else class or bridge
//! 2. [`Runtime::find_method`]: per-class cache stamped with
//!    `(version, method_serial)`, else a walk of the ancestor list that
//!    stops at the first real method, undefined marker or stub
//! 3. A real method is invoked with a fresh activation [`Tag`]; anything
//!    else goes to `method_missing` with the stripped name prepended to the
//!    arguments
//!
//! `break` and `return` out of blocks travel as tagged errors and are turned
//! back into values by the frame that owns the tag.

use crate::error::{Error, Result};
use crate::runtime::class::ModuleId;
use crate::runtime::frame::{BlockCall, BlockFn, Frame, Proc, Tag};
use crate::runtime::method::{Arity, Lookup, Method, MethodEntry};
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use oxirb_mem::Symbol;
use std::rc::Rc;

impl Runtime {
    /// Looks `name` up along the ancestors of `class`.
    pub fn find_method(&mut self, class: ModuleId, name: Symbol) -> Lookup {
        let stamp = (self.version, self.method_serial);
        let rec = &self.modules[class.index()];
        if rec.method_cache_stamp == stamp {
            if let Some(hit) = rec.method_cache.get(&name) {
                let hit = hit.clone();
                self.stats.method_cache_hits += 1;
                return hit;
            }
        }
        self.stats.method_cache_misses += 1;

        let ancestors = self.ancestors(class);
        let mut result = Lookup::Missing;
        for module in ancestors.iter() {
            match self.record(*module).methods.get(&name) {
                Some(MethodEntry::Defined(method)) => {
                    result = Lookup::Found(Rc::clone(method));
                    break;
                }
                Some(MethodEntry::Undefined) => {
                    result = Lookup::Hidden;
                    break;
                }
                Some(MethodEntry::Stub) => {
                    result = Lookup::Stub;
                    break;
                }
                None => {}
            }
        }

        let rec = self.record_mut(class);
        if rec.method_cache_stamp != stamp {
            rec.method_cache.clear();
            rec.method_cache_stamp = stamp;
        }
        rec.method_cache.insert(name, result.clone());
        result
    }

    /// Sends `name` to `receiver`.
    ///
    /// # Errors
    ///
    /// Whatever the method body (or `method_missing`) raises.
    pub fn send(&mut self, receiver: Value, name: Symbol, args: Vec<Value>) -> Result<Value> {
        self.send_with_block(receiver, name, args, None)
    }

    /// Sends `name` to `receiver` passing `block`.
    ///
    /// # Errors
    ///
    /// Whatever the method body (or `method_missing`) raises.
    pub fn send_with_block(
        &mut self,
        receiver: Value,
        name: Symbol,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
    ) -> Result<Value> {
        self.stats.dispatches += 1;
        let class = self.class_of(&receiver);
        match self.find_method(class, name) {
            Lookup::Found(method) => self.invoke(method, receiver, args, block, name),
            Lookup::Hidden | Lookup::Stub | Lookup::Missing => {
                self.method_missing(receiver, name, args, block)
            }
        }
    }

    /// Sends by name. A leading dispatch prefix (`$name`) is stripped.
    ///
    /// # Errors
    ///
    /// Whatever the method body (or `method_missing`) raises.
    pub fn call(&mut self, receiver: Value, name: &str, args: Vec<Value>) -> Result<Value> {
        let name = self.intern(names::strip_dispatch_prefix(name));
        self.send_with_block(receiver, name, args, None)
    }

    /// Sends by name with a block built from `body`. A `break` inside the
    /// block ends this call with the break value.
    ///
    /// # Errors
    ///
    /// Whatever the method body, the block or `method_missing` raises.
    pub fn call_with_block<F>(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        arity: Arity,
        body: F,
    ) -> Result<Value>
    where
        F: Fn(&mut Runtime, &BlockCall) -> Result<Value> + 'static,
    {
        let name = self.intern(names::strip_dispatch_prefix(name));
        let block = Proc::new(Rc::new(body), arity, self.main(), None, None);
        self.send_with_fresh_block(receiver, name, args, block)
    }

    /// As [`call_with_block`](Self::call_with_block) for a block written
    /// inside the method running in `frame`: the block's `self` is the
    /// frame's receiver and a `return` in it returns from that method.
    ///
    /// # Errors
    ///
    /// Whatever the method body, the block or `method_missing` raises.
    pub fn call_with_block_from<F>(
        &mut self,
        frame: &Frame,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        arity: Arity,
        body: F,
    ) -> Result<Value>
    where
        F: Fn(&mut Runtime, &BlockCall) -> Result<Value> + 'static,
    {
        let name = self.intern(names::strip_dispatch_prefix(name));
        let block = Proc::new(
            Rc::new(body),
            arity,
            frame.receiver.clone(),
            Some(frame.tag),
            None,
        );
        self.send_with_fresh_block(receiver, name, args, block)
    }

    fn send_with_fresh_block(
        &mut self,
        receiver: Value,
        name: Symbol,
        args: Vec<Value>,
        mut block: Proc,
    ) -> Result<Value> {
        let tag = self.next_tag();
        block.break_tag = Some(tag);
        match self.send_with_block(receiver, name, args, Some(Rc::new(block))) {
            Err(Error::Break { tag: t, value }) if t == tag => Ok(value),
            other => other,
        }
    }

    /// A detached proc: `break` inside it is a `LocalJumpError` and
    /// `return` has no home method.
    pub fn new_proc<F>(&mut self, self_value: Value, arity: Arity, body: F) -> Rc<Proc>
    where
        F: Fn(&mut Runtime, &BlockCall) -> Result<Value> + 'static,
    {
        Rc::new(Proc::new(Rc::new(body), arity, self_value, None, None))
    }

    /// A lambda: strict arity, and `return`/`break` leave the lambda itself.
    pub fn new_lambda<F>(&mut self, self_value: Value, arity: Arity, body: F) -> Rc<Proc>
    where
        F: Fn(&mut Runtime, &BlockCall) -> Result<Value> + 'static,
    {
        let mut lambda = Proc::new(Rc::new(body) as Rc<BlockFn>, arity, self_value, None, None);
        lambda.lambda = true;
        Rc::new(lambda)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_call_depth {
            return Err(Error::StackOverflow { depth: self.depth });
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `method` on `receiver`. Aliases forward to their original in
    /// one hop; the arity is checked before the body runs.
    pub(crate) fn invoke(
        &mut self,
        method: Rc<Method>,
        receiver: Value,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
        name: Symbol,
    ) -> Result<Value> {
        self.invoke_at(method, receiver, args, block, name, None)
    }

    fn invoke_at(
        &mut self,
        method: Rc<Method>,
        receiver: Value,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
        name: Symbol,
        ancestor_index: Option<usize>,
    ) -> Result<Value> {
        let target = if let Some(original) = method.alias_of.clone() {
            self.stats.alias_hops += 1;
            original
        } else {
            method
        };

        if !target.arity.check(args.len()) {
            return Err(Error::ArgumentError {
                expected: target.arity,
                got: args.len(),
            });
        }

        self.enter()?;
        let tag = self.next_tag();
        let body = Rc::clone(&target.body);
        let frame = Frame {
            receiver,
            args,
            block,
            method: target,
            name,
            tag,
            ancestor_index,
        };
        let result = (*body)(self, &frame);
        self.depth -= 1;

        match result {
            Err(Error::NonLocalReturn { tag: t, value }) if t == tag => Ok(value),
            other => other,
        }
    }

    /// Calls a block, proc or lambda.
    ///
    /// # Errors
    ///
    /// `ArgumentError` for a lambda given the wrong count, plus whatever the
    /// body raises.
    pub fn call_proc(&mut self, block: &Rc<Proc>, args: Vec<Value>) -> Result<Value> {
        self.call_proc_with_block(block, args, None)
    }

    /// Calls a block, proc or lambda, passing it a block of its own.
    ///
    /// # Errors
    ///
    /// As [`call_proc`](Self::call_proc).
    pub fn call_proc_with_block(
        &mut self,
        block: &Rc<Proc>,
        args: Vec<Value>,
        block_arg: Option<Rc<Proc>>,
    ) -> Result<Value> {
        if block.lambda && !block.arity.check(args.len()) {
            return Err(Error::ArgumentError {
                expected: block.arity,
                got: args.len(),
            });
        }

        self.enter()?;
        let result = if block.lambda {
            let tag = self.next_tag();
            let call = BlockCall {
                args,
                self_value: block.self_value.clone(),
                block: block_arg,
                home: Some(tag),
                break_tag: Some(tag),
            };
            match (*block.body)(self, &call) {
                Err(
                    Error::NonLocalReturn { tag: t, value } | Error::Break { tag: t, value },
                ) if t == tag => Ok(value),
                other => other,
            }
        } else {
            let call = BlockCall {
                args: block.adapt_args(args),
                self_value: block.self_value.clone(),
                block: block_arg,
                home: block.home,
                break_tag: block.break_tag,
            };
            (*block.body)(self, &call)
        };
        self.depth -= 1;
        result
    }

    /// `yield` inside the method running in `frame`.
    ///
    /// # Errors
    ///
    /// A `LocalJumpError` when no block was given, plus whatever the block
    /// raises.
    pub fn yield_block(&mut self, frame: &Frame, args: Vec<Value>) -> Result<Value> {
        let Some(block) = frame.block.clone() else {
            return Err(Error::runtime("no block given (yield)"));
        };
        self.call_proc(&block, args)
    }

    /// Runs `block` as the body of the method activation in `frame`: `self`
    /// is the frame's receiver and `return` leaves the method.
    pub(crate) fn call_block_as_method(&mut self, block: &Rc<Proc>, frame: &Frame) -> Result<Value> {
        let call = BlockCall {
            args: frame.args.clone(),
            self_value: frame.receiver.clone(),
            block: frame.block.clone(),
            home: Some(frame.tag),
            break_tag: None,
        };
        (*block.body)(self, &call)
    }

    /// Routes a failed lookup to `method_missing`, passing the name without
    /// its dispatch prefix ahead of the original arguments and block.
    ///
    /// # Errors
    ///
    /// `NoMethodError` from the default handler, or whatever an override
    /// raises.
    pub fn method_missing(
        &mut self,
        receiver: Value,
        name: Symbol,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
    ) -> Result<Value> {
        self.stats.method_missing_calls += 1;
        let full_name = self.symbol_name(name);
        let stripped = names::strip_dispatch_prefix(&full_name);
        oxirb_log::trace!("method_missing: {stripped}");

        let class = self.class_of(&receiver);
        match self.find_method(class, names::METHOD_MISSING) {
            Lookup::Found(handler) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(Value::str(stripped));
                full.extend(args);
                self.invoke(handler, receiver, full, block, names::METHOD_MISSING)
            }
            _ => Err(Error::NoMethodError {
                name: stripped.to_string(),
                receiver: self.describe(&receiver),
                args,
            }),
        }
    }

    fn has_default_method_missing(&mut self, class: ModuleId) -> bool {
        match (self.find_method(class, names::METHOD_MISSING), &self.default_method_missing) {
            (Lookup::Found(found), Some(default)) => Rc::ptr_eq(&found.original(), default),
            _ => true,
        }
    }

    /// Next method after `current` for a `super` call on `receiver`.
    ///
    /// Scans the receiver's ancestors after `current`'s owner, skipping
    /// stubs and stopping at undefined markers. `Ok(None)` means the call
    /// should go to an overridden `method_missing`.
    ///
    /// # Errors
    ///
    /// `NoSuperMethod` when nothing follows and `method_missing` is the
    /// default one.
    pub fn find_super_dispatcher(
        &mut self,
        receiver: &Value,
        current: &Method,
    ) -> Result<Option<Rc<Method>>> {
        Ok(self
            .super_after(receiver, current, None)?
            .map(|(method, _)| method))
    }

    /// As [`find_super_dispatcher`](Self::find_super_dispatcher), resuming
    /// at `from` when that slot still holds `current`'s owner. A module
    /// can occur more than once in one ancestor list, so the first
    /// occurrence of the owner is only right for the first call in a chain.
    fn super_after(
        &mut self,
        receiver: &Value,
        current: &Method,
        from: Option<usize>,
    ) -> Result<Option<(Rc<Method>, usize)>> {
        let class = self.class_of(receiver);
        let ancestors = self.ancestors(class);
        let name = current.name;

        let start = from
            .filter(|i| ancestors.get(*i) == Some(&current.owner))
            .or_else(|| ancestors.iter().position(|m| *m == current.owner));
        if let Some(index) = start {
            for (offset, module) in ancestors[index + 1..].iter().enumerate() {
                match self.record(*module).methods.get(&name) {
                    Some(MethodEntry::Defined(next)) => {
                        return Ok(Some((Rc::clone(next), index + 1 + offset)));
                    }
                    Some(MethodEntry::Undefined) => break,
                    Some(MethodEntry::Stub) | None => {}
                }
            }
        }

        if self.has_default_method_missing(class) {
            return Err(Error::NoSuperMethod {
                name: self.symbol_name(name).to_string(),
                receiver: self.describe(receiver),
            });
        }
        Ok(None)
    }

    /// `super(args)` from the method running in `frame`, passing the
    /// frame's block along.
    ///
    /// # Errors
    ///
    /// `NoSuperMethod`, or whatever the next method raises.
    pub fn call_super(&mut self, frame: &Frame, args: Vec<Value>) -> Result<Value> {
        self.call_super_with_block(frame, args, frame.block.clone())
    }

    /// `super(args, &block)` from the method running in `frame`.
    ///
    /// # Errors
    ///
    /// `NoSuperMethod`, or whatever the next method raises.
    pub fn call_super_with_block(
        &mut self,
        frame: &Frame,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
    ) -> Result<Value> {
        let current = Rc::clone(&frame.method);
        match self.super_after(&frame.receiver, &current, frame.ancestor_index)? {
            Some((next, index)) => self.invoke_at(
                next,
                frame.receiver.clone(),
                args,
                block,
                current.name,
                Some(index),
            ),
            None => self.method_missing(frame.receiver.clone(), current.name, args, block),
        }
    }

    /// Bare `super`: re-sends the frame's own arguments and block.
    ///
    /// # Errors
    ///
    /// As [`call_super`](Self::call_super).
    pub fn zsuper(&mut self, frame: &Frame) -> Result<Value> {
        self.call_super(frame, frame.args.clone())
    }

    /// Whether `value` has a real method `name`.
    pub fn respond_to(&mut self, value: &Value, name: &str) -> bool {
        let name = self.intern(names::strip_dispatch_prefix(name));
        let class = self.class_of(value);
        matches!(self.find_method(class, name), Lookup::Found(_))
    }

    /// Invokes hook `hook` on `receiver` when a real method answers it.
    /// Hooks are not fired while the core library boots.
    pub(crate) fn fire_hook(&mut self, receiver: Value, hook: Symbol, args: Vec<Value>) -> Result<()> {
        if self.booting {
            return Ok(());
        }
        let class = self.class_of(&receiver);
        if let Lookup::Found(method) = self.find_method(class, hook) {
            self.stats.dispatches += 1;
            self.invoke(method, receiver, args, None, hook)?;
        }
        Ok(())
    }

    /// `value.inspect` as a host string.
    ///
    /// # Errors
    ///
    /// Whatever `inspect` raises.
    pub fn inspect(&mut self, value: &Value) -> Result<String> {
        let shown = self.send(value.clone(), names::INSPECT, vec![])?;
        Ok(match shown.as_str() {
            Some(text) => text.to_string(),
            None => format!("{shown:?}"),
        })
    }

    /// `value.to_s` as a host string.
    ///
    /// # Errors
    ///
    /// Whatever `to_s` raises.
    pub fn to_s(&mut self, value: &Value) -> Result<String> {
        let shown = self.send(value.clone(), names::TO_S, vec![])?;
        Ok(match shown.as_str() {
            Some(text) => text.to_string(),
            None => format!("{shown:?}"),
        })
    }

    /// `a == b` through dispatch.
    ///
    /// # Errors
    ///
    /// Whatever `==` raises.
    pub fn equals(&mut self, a: &Value, b: &Value) -> Result<bool> {
        if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
            return Ok(x == y);
        }
        Ok(self.send(a.clone(), names::EQ, vec![b.clone()])?.truthy())
    }

    /// Receiver description used in error messages.
    #[must_use]
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::True => "true".to_string(),
            Value::False => "false".to_string(),
            Value::Module(id) => {
                let label = if self.is_class(*id) { "class" } else { "module" };
                format!("{label} {}", self.display_name(*id))
            }
            other => format!(
                "an instance of {}",
                self.display_name(self.real_class_of(other))
            ),
        }
    }

    /// Activation tag of a fresh frame; exposed for hosts that build their
    /// own block-passing call sites.
    pub fn fresh_tag(&mut self) -> Tag {
        self.next_tag()
    }
}
