//! Singleton classes and the class a value dispatches through.
//!
//! Superclass of a new singleton class:
//!
//! | Target            | Superclass                                   |
//! |-------------------|----------------------------------------------|
//! | plain object      | the object's class                           |
//! | class             | singleton class of its superclass            |
//! | root class        | `Class`                                      |
//! | module            | `Module`                                     |
//!
//! `nil`, `true` and `false` answer with `NilClass`, `TrueClass` and
//! `FalseClass`; other native values cannot carry one.

use crate::error::{Error, Result};
use crate::runtime::class::{Attached, ModuleId, ModuleKind, ModuleRecord};
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use std::rc::Rc;

impl Runtime {
    /// Singleton class of `value`, built on first request.
    ///
    /// # Errors
    ///
    /// `SingletonUnsupported` for integers, floats, strings and the other
    /// bridged native values.
    pub fn singleton_class(&mut self, value: &Value) -> Result<ModuleId> {
        match value {
            Value::Module(id) => Ok(self.module_singleton(*id)),
            Value::Object(obj) => {
                if let Some(existing) = obj.singleton.get() {
                    return Ok(existing);
                }
                let mut record = ModuleRecord::new(ModuleKind::Singleton, None, Some(obj.class));
                record.attached = Some(Attached::Object(Rc::downgrade(obj)));
                let id = self.push_record(record);
                obj.singleton.set(Some(id));
                oxirb_log::debug!("built singleton class for {}", self.display_name(obj.class));
                Ok(id)
            }
            Value::Nil => Ok(self.core.nil_class),
            Value::True => Ok(self.core.true_class),
            Value::False => Ok(self.core.false_class),
            other => Err(Error::SingletonUnsupported {
                kind: self.display_name(self.real_class_of(other)),
            }),
        }
    }

    pub(crate) fn module_singleton(&mut self, id: ModuleId) -> ModuleId {
        if let Some(existing) = self.record(id).singleton {
            return existing;
        }
        let superclass = if self.is_class(id) {
            match self.superclass(id) {
                Some(sup) => self.module_singleton(sup),
                None => self.core.class,
            }
        } else {
            self.core.module
        };

        let mut record = ModuleRecord::new(ModuleKind::Singleton, None, Some(superclass));
        record.attached = Some(Attached::Module(id));
        let singleton = self.push_record(record);
        self.record_mut(id).singleton = Some(singleton);
        oxirb_log::debug!("built singleton class for {}", self.display_name(id));
        singleton
    }

    /// Singleton class of `value` if one was built.
    #[must_use]
    pub fn existing_singleton(&self, value: &Value) -> Option<ModuleId> {
        match value {
            Value::Module(id) => self.record(*id).singleton,
            Value::Object(obj) => obj.singleton.get(),
            _ => None,
        }
    }

    /// Class `value` dispatches through: its singleton class when it has one
    /// (always, for classes and modules), else its class.
    pub fn class_of(&mut self, value: &Value) -> ModuleId {
        match value {
            Value::Module(id) => self.module_singleton(*id),
            Value::Object(obj) => obj.singleton.get().unwrap_or(obj.class),
            other => self.real_class_of(other),
        }
    }

    /// Class of `value` ignoring singleton classes (Ruby's `#class`).
    #[must_use]
    pub fn real_class_of(&self, value: &Value) -> ModuleId {
        match value {
            Value::Module(id) => {
                if self.is_class(*id) {
                    self.core.class
                } else {
                    self.core.module
                }
            }
            Value::Object(obj) => obj.class,
            other => other
                .native_kind()
                .and_then(|kind| self.bridged_class(kind))
                .unwrap_or(self.core.object),
        }
    }

    /// The object, class or module a singleton class belongs to.
    #[must_use]
    pub fn singleton_target(&self, id: ModuleId) -> Option<Value> {
        match self.record(id).attached.as_ref()? {
            Attached::Module(m) => Some(Value::Module(*m)),
            Attached::Object(obj) => obj.upgrade().map(Value::Object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_singleton_sits_above_class() {
        let mut rt = Runtime::new().unwrap();
        let class = rt.define_or_reopen_class(&Value::Nil, None, "Widget").unwrap();
        let obj = rt.allocate(class).unwrap();

        assert_eq!(rt.class_of(&obj), class);
        let singleton = rt.singleton_class(&obj).unwrap();
        assert_eq!(rt.singleton_class(&obj).unwrap(), singleton);
        assert_eq!(rt.class_of(&obj), singleton);
        assert_eq!(rt.real_class_of(&obj), class);
        assert_eq!(rt.superclass(singleton), Some(class));
        assert!(rt.singleton_target(singleton).unwrap().identical(&obj));
    }

    #[test]
    fn test_class_singleton_chain() {
        let mut rt = Runtime::new().unwrap();
        let core = rt.core();
        let parent = rt.define_or_reopen_class(&Value::Nil, None, "Parent").unwrap();
        let child = rt.define_or_reopen_class(&Value::Nil, Some(parent), "Child").unwrap();

        let child_meta = rt.singleton_class(&Value::Module(child)).unwrap();
        let parent_meta = rt.singleton_class(&Value::Module(parent)).unwrap();
        assert_eq!(rt.superclass(child_meta), Some(parent_meta));

        let root_meta = rt.singleton_class(&Value::Module(core.basic_object)).unwrap();
        assert_eq!(rt.superclass(root_meta), Some(core.class));
        assert_eq!(rt.display_name(parent_meta), "#<Class:Parent>");
    }

    #[test]
    fn test_module_singleton_under_module() {
        let mut rt = Runtime::new().unwrap();
        let m = rt.define_or_reopen_module(&Value::Nil, "Helpers").unwrap();
        let meta = rt.singleton_class(&Value::Module(m)).unwrap();
        assert_eq!(rt.superclass(meta), Some(rt.core().module));
    }

    #[test]
    fn test_special_constants_and_natives() {
        let mut rt = Runtime::new().unwrap();
        let core = rt.core();
        assert_eq!(rt.singleton_class(&Value::Nil).unwrap(), core.nil_class);
        assert_eq!(rt.singleton_class(&Value::True).unwrap(), core.true_class);

        let err = rt.singleton_class(&Value::Integer(1)).unwrap_err();
        assert_eq!(err, Error::SingletonUnsupported { kind: "Integer".into() });
        assert!(rt.singleton_class(&Value::str("s")).is_err());
    }

    #[test]
    fn test_real_class_of_natives() {
        let rt = Runtime::new().unwrap();
        let core = rt.core();
        assert_eq!(rt.real_class_of(&Value::Integer(1)), core.integer);
        assert_eq!(rt.real_class_of(&Value::Float(1.0)), core.float);
        assert_eq!(rt.real_class_of(&Value::array(vec![])), core.array);
        assert_eq!(rt.real_class_of(&Value::Module(core.kernel)), core.module);
        assert_eq!(rt.real_class_of(&Value::Module(core.string)), core.class);
    }
}
