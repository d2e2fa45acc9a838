//! Instances, instance variables and hash keys.
//!
//! Instances of a class bridged to a native kind are the native value
//! itself; instances of its subclasses are objects carrying the native
//! value as payload. Hash tables ask the runtime for key hashes and key
//! equality through [`KeyProtocol`], which dispatches `hash` and `eql?` to
//! user-defined keys.

use crate::error::{Error, Result};
use crate::runtime::class::{ModuleId, ModuleKind};
use crate::runtime::frame::Proc;
use crate::runtime::hash::{DefaultPolicy, HashTable, KeyProtocol};
use crate::runtime::method::Arity;
use crate::runtime::names;
use crate::runtime::value::{NativeKind, ObjectId, RHash, RObject, Value};
use crate::runtime::Runtime;
use fxhash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn reentrant(_: std::cell::BorrowMutError) -> Error {
    Error::Reentrant { what: "hash" }
}

fn reentrant_read(_: std::cell::BorrowError) -> Error {
    Error::Reentrant { what: "hash" }
}

impl Runtime {
    fn wrap(class: ModuleId, payload: Option<Value>) -> Value {
        Value::Object(Rc::new(RObject {
            id: ObjectId::next(),
            class,
            ivars: RefCell::new(FxHashMap::default()),
            singleton: Cell::new(None),
            payload,
        }))
    }

    /// `class.allocate`: an instance with no `initialize` run.
    ///
    /// # Errors
    ///
    /// `TypeError` for modules, singleton classes and native kinds without
    /// an empty value (integers, ranges and so on).
    pub fn allocate(&mut self, class: ModuleId) -> Result<Value> {
        match self.kind(class) {
            ModuleKind::Module => {
                return Err(Error::type_error(format!(
                    "module {} cannot be instantiated",
                    self.display_name(class)
                )));
            }
            ModuleKind::Singleton => {
                return Err(Error::type_error("can't create instance of singleton class"));
            }
            ModuleKind::Class => {}
        }

        let Some(kind) = self.record(class).native else {
            return Ok(Self::wrap(class, None));
        };
        let payload = match kind {
            NativeKind::String => Value::str(""),
            NativeKind::Array => Value::array(Vec::new()),
            NativeKind::Hash => Value::hash(HashTable::new()),
            _ => {
                return Err(Error::type_error(format!(
                    "allocator undefined for {}",
                    self.display_name(class)
                )));
            }
        };
        if self.bridged_class(kind) == Some(class) {
            Ok(payload)
        } else {
            Ok(Self::wrap(class, Some(payload)))
        }
    }

    /// `class.new(*args, &block)`: allocates and runs `initialize`.
    ///
    /// # Errors
    ///
    /// As [`allocate`](Self::allocate), plus whatever `initialize` raises.
    pub fn new_instance(
        &mut self,
        class: ModuleId,
        args: Vec<Value>,
        block: Option<Rc<Proc>>,
    ) -> Result<Value> {
        if self.kind(class) != ModuleKind::Class {
            return self.allocate(class);
        }
        if let Some(kind) = self.record(class).native {
            let payload = self.construct_native(kind, &args, block.clone())?;
            if self.bridged_class(kind) == Some(class) {
                return Ok(payload);
            }
            let obj = Self::wrap(class, Some(payload));
            self.send_with_block(obj.clone(), names::INITIALIZE, args, block)?;
            return Ok(obj);
        }

        let obj = self.allocate(class)?;
        self.send_with_block(obj.clone(), names::INITIALIZE, args, block)?;
        Ok(obj)
    }

    /// Native value built by `Kind.new(*args)`.
    fn construct_native(
        &mut self,
        kind: NativeKind,
        args: &[Value],
        block: Option<Rc<Proc>>,
    ) -> Result<Value> {
        let arity_error = |expected, got| Error::ArgumentError { expected, got };
        let arg = |i: usize| args.get(i).map(|v| v.unwrap_native().clone()).unwrap_or_default();
        match kind {
            NativeKind::String => match args.len() {
                0 => Ok(Value::str("")),
                1 => match arg(0) {
                    Value::String(s) => Ok(Value::str(s.as_str())),
                    other => Err(self.conversion_error(&other, "String")),
                },
                n => Err(arity_error(Arity::range(0, 1), n)),
            },
            NativeKind::Array => {
                if args.len() > 2 {
                    return Err(arity_error(Arity::range(0, 2), args.len()));
                }
                match arg(0) {
                    Value::Array(items) if args.len() == 1 => {
                        Ok(Value::array(items.items().clone()))
                    }
                    Value::Nil if args.is_empty() => Ok(Value::array(Vec::new())),
                    Value::Integer(n) => {
                        let size = usize::try_from(n)
                            .map_err(|_| Error::runtime("negative array size"))?;
                        let mut items = Vec::with_capacity(size);
                        for i in 0..size {
                            items.push(match &block {
                                Some(b) => self.call_proc(b, vec![Value::Integer(i as i64)])?,
                                None => arg(1),
                            });
                        }
                        Ok(Value::array(items))
                    }
                    other => Err(self.conversion_error(&other, "Integer")),
                }
            }
            NativeKind::Hash => {
                if args.len() > 1 {
                    return Err(arity_error(Arity::range(0, 1), args.len()));
                }
                let mut table = HashTable::new();
                match block {
                    Some(b) if args.is_empty() => table.set_default_proc(b),
                    Some(_) => return Err(arity_error(Arity::exact(0), args.len())),
                    None => table.set_default(arg(0)),
                }
                Ok(Value::hash(table))
            }
            NativeKind::Range => {
                if !(2..=3).contains(&args.len()) {
                    return Err(arity_error(Arity::range(2, 1), args.len()));
                }
                Ok(Value::range(arg(0), arg(1), arg(2).truthy()))
            }
            NativeKind::Regexp => match arg(0) {
                Value::String(s) => Ok(Value::regexp(s.as_str(), 0)),
                Value::Regexp(r) => Ok(Value::regexp(&r.source, r.options)),
                other => Err(self.conversion_error(&other, "String")),
            },
            NativeKind::Proc => match block {
                Some(b) => Ok(Value::Proc(b)),
                None => Err(Error::runtime("tried to create Proc object without a block")),
            },
            NativeKind::Nil
            | NativeKind::True
            | NativeKind::False
            | NativeKind::Integer
            | NativeKind::Float => Err(Error::type_error(format!(
                "allocator undefined for {}",
                kind.class_name()
            ))),
        }
    }

    /// `nil`, `true` and `false` by value, anything else by class name.
    pub(crate) fn class_label(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::True => "true".to_string(),
            Value::False => "false".to_string(),
            other => self.display_name(self.real_class_of(other)),
        }
    }

    pub(crate) fn conversion_error(&self, value: &Value, target: &str) -> Error {
        Error::type_error(format!(
            "no implicit conversion of {} into {target}",
            self.class_label(value)
        ))
    }

    fn ivar_symbol(&mut self, name: &str) -> Result<oxirb_mem::Symbol> {
        if !name.starts_with('@') || name.starts_with("@@") || name.len() < 2 {
            return Err(Error::name_error(
                name,
                format!("'{name}' is not allowed as an instance variable name"),
            ));
        }
        Ok(self.intern(name))
    }

    /// `@name` of `value`; `nil` when unset.
    ///
    /// # Errors
    ///
    /// `NameError` for names not starting with a single `@`.
    pub fn ivar_get(&mut self, value: &Value, name: &str) -> Result<Value> {
        let sym = self.ivar_symbol(name)?;
        Ok(match value {
            Value::Object(obj) => obj.ivars.borrow().get(&sym).cloned().unwrap_or_default(),
            Value::Module(id) => self.record(*id).ivars.get(&sym).cloned().unwrap_or_default(),
            _ => Value::Nil,
        })
    }

    /// Sets `@name` on `value`.
    ///
    /// # Errors
    ///
    /// `NameError` for bad names; `TypeError` for native values, which are
    /// frozen.
    pub fn ivar_set(&mut self, value: &Value, name: &str, new: Value) -> Result<Value> {
        let sym = self.ivar_symbol(name)?;
        match value {
            Value::Object(obj) => {
                obj.ivars.borrow_mut().insert(sym, new.clone());
            }
            Value::Module(id) => {
                self.record_mut(*id).ivars.insert(sym, new.clone());
            }
            other => {
                return Err(Error::type_error(format!(
                    "can't modify frozen {}",
                    self.display_name(self.real_class_of(other))
                )));
            }
        }
        Ok(new)
    }

    /// Names of the instance variables set on `value`, sorted.
    pub fn instance_variables(&self, value: &Value) -> Vec<String> {
        let mut found: Vec<String> = match value {
            Value::Object(obj) => obj
                .ivars
                .borrow()
                .keys()
                .map(|sym| self.symbol_name(*sym).to_string())
                .collect(),
            Value::Module(id) => self
                .record(*id)
                .ivars
                .keys()
                .map(|sym| self.symbol_name(*sym).to_string())
                .collect(),
            _ => Vec::new(),
        };
        found.sort();
        found
    }

    /// Hash code of `value` as a hash key. Immediates and strings hash
    /// natively; everything else dispatches `hash`.
    ///
    /// # Errors
    ///
    /// `TypeError` when a user `hash` does not return an integer.
    pub fn hash_of(&mut self, value: &Value) -> Result<u64> {
        match value {
            Value::Nil | Value::True | Value::False | Value::Integer(_) | Value::Module(_) => {
                Ok(fxhash::hash64(&value.object_id()))
            }
            Value::Float(x) => Ok(fxhash::hash64(&x.to_bits())),
            Value::String(s) => Ok(fxhash::hash64(s.as_str())),
            _ => match self.send(value.clone(), names::HASH, vec![])? {
                Value::Integer(n) => Ok(n as u64),
                other => Err(Error::type_error(format!(
                    "hash must return an Integer, not {}",
                    self.display_name(self.real_class_of(&other))
                ))),
            },
        }
    }

    /// `a.eql?(b)` for hash-key matching; `a` decides.
    ///
    /// # Errors
    ///
    /// Whatever a user `eql?` raises.
    pub fn eql(&mut self, a: &Value, b: &Value) -> Result<bool> {
        match (a, b) {
            (Value::String(x), Value::String(y)) => Ok(x.as_str() == y.as_str()),
            (
                Value::Object(_)
                | Value::Array(_)
                | Value::Hash(_)
                | Value::Range(_)
                | Value::Regexp(_)
                | Value::Proc(_),
                _,
            ) => Ok(self.send(a.clone(), names::EQL, vec![b.clone()])?.truthy()),
            _ => Ok(a.identical(b)),
        }
    }

    fn hash_ref(&self, value: &Value) -> Result<Rc<RHash>> {
        match value.unwrap_native() {
            Value::Hash(h) => Ok(Rc::clone(h)),
            other => Err(self.conversion_error(other, "Hash")),
        }
    }

    /// `hash[key] = value`.
    ///
    /// # Errors
    ///
    /// `Reentrant` when a key callback touches the same hash, plus whatever
    /// `hash`/`eql?` raise.
    pub fn hash_put(&mut self, hash: &Value, key: Value, value: Value) -> Result<()> {
        let h = self.hash_ref(hash)?;
        let mut table = h.table.try_borrow_mut().map_err(reentrant)?;
        let result = table.put(self, key, value);
        drop(table);
        result
    }

    /// Stored value for `key`, ignoring the default.
    ///
    /// # Errors
    ///
    /// As [`hash_put`](Self::hash_put).
    pub fn hash_lookup(&mut self, hash: &Value, key: &Value) -> Result<Option<Value>> {
        let h = self.hash_ref(hash)?;
        let table = h.table.try_borrow().map_err(reentrant_read)?;
        let result = table.get(self, key);
        drop(table);
        result
    }

    /// `hash[key]`: the stored value, else the default value or the result
    /// of the default proc called with the hash and the key.
    ///
    /// # Errors
    ///
    /// As [`hash_put`](Self::hash_put), plus whatever the default proc raises.
    pub fn hash_get(&mut self, hash: &Value, key: &Value) -> Result<Value> {
        if let Some(found) = self.hash_lookup(hash, key)? {
            return Ok(found);
        }
        let h = self.hash_ref(hash)?;
        let policy = h
            .table
            .try_borrow()
            .map_err(reentrant_read)?
            .default_policy()
            .clone();
        match policy {
            DefaultPolicy::Value(value) => Ok(value),
            DefaultPolicy::Proc(block) => self.call_proc(&block, vec![hash.clone(), key.clone()]),
        }
    }

    /// `hash.fetch(key)`.
    ///
    /// # Errors
    ///
    /// `KeyError` when `key` is absent.
    pub fn hash_fetch(&mut self, hash: &Value, key: &Value) -> Result<Value> {
        match self.hash_lookup(hash, key)? {
            Some(found) => Ok(found),
            None => Err(Error::KeyError {
                key: self.inspect(key)?,
            }),
        }
    }

    /// `hash.delete(key)`.
    ///
    /// # Errors
    ///
    /// As [`hash_put`](Self::hash_put).
    pub fn hash_delete(&mut self, hash: &Value, key: &Value) -> Result<Option<Value>> {
        let h = self.hash_ref(hash)?;
        let mut table = h.table.try_borrow_mut().map_err(reentrant)?;
        let result = table.delete(self, key);
        drop(table);
        result
    }

    /// `hash.rehash`: recomputes every key's hash code.
    ///
    /// # Errors
    ///
    /// As [`hash_put`](Self::hash_put).
    pub fn hash_rehash(&mut self, hash: &Value) -> Result<()> {
        let h = self.hash_ref(hash)?;
        let mut table = h.table.try_borrow_mut().map_err(reentrant)?;
        let result = table.rehash(self);
        drop(table);
        result
    }

    /// `hash.compare_by_identity`.
    ///
    /// # Errors
    ///
    /// `TypeError` for non-hashes.
    pub fn hash_compare_by_identity(&mut self, hash: &Value) -> Result<()> {
        let h = self.hash_ref(hash)?;
        h.table.try_borrow_mut().map_err(reentrant)?.compare_by_identity();
        Ok(())
    }
}

impl KeyProtocol for Runtime {
    fn key_hash(&mut self, key: &Value) -> Result<u64> {
        self.hash_of(key)
    }

    fn key_eql(&mut self, probe: &Value, stored: &Value) -> Result<bool> {
        self.eql(probe, stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_rejects_modules() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "M").unwrap();
        let err = rt.allocate(m).unwrap_err();
        assert_eq!(err.to_string(), "module M cannot be instantiated");

        let integer = rt.core().integer;
        assert!(rt.allocate(integer).is_err());
    }

    #[test]
    fn test_native_subclass_wraps_payload() {
        let mut rt = Runtime::new().unwrap();
        let core = rt.core();
        let text = rt.define_or_reopen_class(&Value::Nil, Some(core.string), "Text").unwrap();

        let plain = rt.new_instance(core.string, vec![Value::str("a")], None).unwrap();
        assert_eq!(plain.as_str(), Some("a"));

        let wrapped = rt.new_instance(text, vec![Value::str("b")], None).unwrap();
        assert_eq!(rt.real_class_of(&wrapped), text);
        assert_eq!(wrapped.unwrap_native().as_str(), Some("b"));
        assert!(rt.is_a(&wrapped, core.string));
    }

    #[test]
    fn test_initialize_receives_arguments() {
        let mut rt = Runtime::new().unwrap();
        let point = rt.define_or_reopen_class(&Value::Nil, None, "Point").unwrap();
        rt.define_method(point, "initialize", Arity::exact(2), |rt, f| {
            rt.ivar_set(&f.receiver, "@x", f.arg(0))?;
            rt.ivar_set(&f.receiver, "@y", f.arg(1))
        })
        .unwrap();

        let p = rt
            .new_instance(point, vec![Value::Integer(1), Value::Integer(2)], None)
            .unwrap();
        assert_eq!(rt.ivar_get(&p, "@y").unwrap(), Value::Integer(2));
        assert_eq!(rt.ivar_get(&p, "@z").unwrap(), Value::Nil);
        assert_eq!(rt.instance_variables(&p), vec!["@x", "@y"]);
        assert!(rt.new_instance(point, vec![], None).is_err());
    }

    #[test]
    fn test_native_values_are_frozen() {
        let mut rt = Runtime::new().unwrap();
        let err = rt.ivar_set(&Value::Integer(1), "@a", Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "can't modify frozen Integer");
        assert!(rt.ivar_get(&Value::Nil, "bad").is_err());
    }

    #[test]
    fn test_hash_default_proc_sees_hash_and_key() {
        let mut rt = Runtime::new().unwrap();
        let main = rt.main();
        let block = rt.new_proc(main, Arity::exact(2), |rt, call| {
            let key = call.arg(1);
            let doubled = Value::Integer(key.as_int().unwrap_or(0) * 2);
            rt.hash_put(&call.arg(0), key, doubled.clone())?;
            Ok(doubled)
        });
        let mut table = HashTable::new();
        table.set_default_proc(block);
        let hash = Value::hash(table);

        assert_eq!(rt.hash_get(&hash, &Value::Integer(4)).unwrap(), Value::Integer(8));
        assert_eq!(
            rt.hash_lookup(&hash, &Value::Integer(4)).unwrap(),
            Some(Value::Integer(8))
        );
        assert!(matches!(
            rt.hash_fetch(&hash, &Value::Integer(5)),
            Err(Error::KeyError { .. })
        ));
    }

    #[test]
    fn test_reentrant_key_callback_is_reported() {
        let mut rt = Runtime::new().unwrap();
        let key_class = rt.define_or_reopen_class(&Value::Nil, None, "Key").unwrap();
        let hash = Value::hash(HashTable::new());
        let target = hash.clone();
        rt.define_method(key_class, "hash", Arity::exact(0), move |rt, f| {
            rt.hash_put(&target, f.receiver.clone(), Value::Nil)?;
            Ok(Value::Integer(1))
        })
        .unwrap();

        let key = rt.new_instance(key_class, vec![], None).unwrap();
        let err = rt.hash_put(&hash, key, Value::Nil).unwrap_err();
        assert_eq!(err, Error::Reentrant { what: "hash" });
    }
}
