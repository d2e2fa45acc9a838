//! `Module` and `Class`.

use super::{define_all, flag_arg, module_arg, name_arg, receiver_module, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let core = rt.core();
    let module: &[(&str, Arity, Builtin)] = &[
        ("name", Arity::exact(0), name),
        ("to_s", Arity::exact(0), to_s),
        ("inspect", Arity::exact(0), to_s),
        ("ancestors", Arity::exact(0), ancestors),
        ("include", Arity::rest(1), include),
        ("prepend", Arity::rest(1), prepend),
        ("include?", Arity::exact(1), includes),
        ("included_modules", Arity::exact(0), included_modules),
        ("const_get", Arity::range(1, 1), const_get),
        ("const_set", Arity::exact(2), const_set),
        ("const_defined?", Arity::range(1, 1), const_defined),
        ("constants", Arity::range(0, 1), constants),
        ("const_missing", Arity::exact(1), const_missing),
        ("remove_const", Arity::exact(1), remove_const),
        ("class_variable_get", Arity::exact(1), cvar_get),
        ("class_variable_set", Arity::exact(2), cvar_set),
        ("class_variable_defined?", Arity::exact(1), cvar_defined),
        ("instance_methods", Arity::range(0, 1), instance_methods),
        ("method_defined?", Arity::exact(1), method_defined),
        ("define_method", Arity::exact(1), define_method),
        ("alias_method", Arity::exact(2), alias_method),
        ("remove_method", Arity::ANY, remove_method),
        ("undef_method", Arity::ANY, undef_method),
        ("module_function", Arity::ANY, module_function),
        ("autoload", Arity::exact(2), autoload),
        ("===", Arity::exact(1), case_eq),
        ("included", Arity::ANY, hook),
        ("extended", Arity::ANY, hook),
        ("prepended", Arity::ANY, hook),
        ("method_added", Arity::ANY, hook),
        ("method_removed", Arity::ANY, hook),
        ("method_undefined", Arity::ANY, hook),
    ];
    define_all(rt, core.module, module)?;

    let class: &[(&str, Arity, Builtin)] = &[
        ("new", Arity::ANY, new),
        ("allocate", Arity::exact(0), allocate),
        ("superclass", Arity::exact(0), superclass),
        ("inherited", Arity::ANY, hook),
    ];
    define_all(rt, core.class, class)
}

fn hook(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::Nil)
}

fn name(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    Ok(rt.module_name(module).map_or(Value::Nil, |n| Value::str(&n)))
}

fn to_s(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    Ok(Value::str(&rt.display_name(module)))
}

fn ancestors(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let list = rt.ancestors(module);
    Ok(Value::array(list.iter().copied().map(Value::Module).collect()))
}

fn include(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let target = receiver_module(rt, frame)?;
    for arg in frame.args.iter().rev() {
        let module = module_arg(rt, arg)?;
        rt.include(target, module)?;
    }
    Ok(frame.receiver.clone())
}

fn prepend(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let target = receiver_module(rt, frame)?;
    for arg in frame.args.iter().rev() {
        let module = module_arg(rt, arg)?;
        rt.prepend(target, module)?;
    }
    Ok(frame.receiver.clone())
}

fn includes(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let target = receiver_module(rt, frame)?;
    let module = module_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.includes_module(target, module)))
}

fn included_modules(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let target = receiver_module(rt, frame)?;
    let list = rt.included_modules(target);
    Ok(Value::array(list.into_iter().map(Value::Module).collect()))
}

fn const_get(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let path = name_arg(rt, &frame.arg(0))?;
    if path.contains("::") {
        return rt.const_get_path(scope, &path);
    }
    if flag_arg(frame, 1) {
        rt.const_get_qualified(scope, &path)
    } else {
        rt.const_get_local(scope, &path)
    }
}

fn const_set(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    let value = frame.arg(1);
    rt.const_set(scope, &name, value.clone())?;
    Ok(value)
}

fn const_defined(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.const_defined(scope, &name, flag_arg(frame, 1))))
}

fn constants(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let found = rt.constants(scope, flag_arg(frame, 0));
    Ok(Value::array(found.iter().map(|n| Value::str(n)).collect()))
}

fn const_missing(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    rt.default_const_missing(scope, &name)
}

fn remove_const(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    rt.remove_const(scope, &name)
}

fn cvar_get(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    rt.cvar_get(scope, &name)
}

fn cvar_set(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    let value = frame.arg(1);
    rt.cvar_set(scope, &name, value.clone())?;
    Ok(value)
}

fn cvar_defined(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.cvar_defined(scope, &name)))
}

fn instance_methods(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let found = rt.instance_methods(module, flag_arg(frame, 0));
    Ok(Value::array(found.iter().map(|n| Value::str(n)).collect()))
}

fn method_defined(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.method_defined(module, &name)))
}

/// `define_method(name) { |*args| ... }`: the block becomes the body, with
/// `self` rebound to each receiver.
fn define_method(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    let Some(block) = frame.block.clone() else {
        return Err(Error::runtime("tried to create Proc object without a block"));
    };
    let arity = block.arity();
    rt.define_method(module, &name, arity, move |rt, f| rt.call_block_as_method(&block, f))?;
    Ok(Value::str(&name))
}

fn alias_method(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let new_name = name_arg(rt, &frame.arg(0))?;
    let old_name = name_arg(rt, &frame.arg(1))?;
    rt.alias_method(module, &new_name, &old_name)?;
    Ok(Value::str(&new_name))
}

fn remove_method(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    for arg in &frame.args {
        let name = name_arg(rt, arg)?;
        rt.remove_method(module, &name)?;
    }
    Ok(frame.receiver.clone())
}

fn undef_method(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    for arg in &frame.args {
        let name = name_arg(rt, arg)?;
        rt.undef_method(module, &name)?;
    }
    Ok(frame.receiver.clone())
}

fn module_function(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    let mut list = Vec::with_capacity(frame.args.len());
    for arg in &frame.args {
        list.push(name_arg(rt, arg)?);
    }
    let borrowed: Vec<&str> = list.iter().map(|n| &**n).collect();
    rt.module_function(module, &borrowed)?;
    Ok(Value::Nil)
}

fn autoload(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let scope = receiver_module(rt, frame)?;
    let name = name_arg(rt, &frame.arg(0))?;
    let path = name_arg(rt, &frame.arg(1))?;
    rt.autoload(scope, &name, &path)?;
    Ok(Value::Nil)
}

fn case_eq(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = receiver_module(rt, frame)?;
    Ok(Value::bool(rt.is_a(&frame.arg(0), module)))
}

/// `Class#new`. On `Class` and `Module` themselves this builds an anonymous
/// class or module.
fn new(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let class = receiver_module(rt, frame)?;
    let core = rt.core();
    if class == core.class {
        let superclass = match frame.args.first() {
            Some(arg) => module_arg(rt, arg)?,
            None => core.object,
        };
        let id = rt.allocate_class(None, Some(superclass))?;
        rt.fire_hook(Value::Module(superclass), names::INHERITED, vec![Value::Module(id)])?;
        return Ok(Value::Module(id));
    }
    if class == core.module {
        return Ok(Value::Module(rt.allocate_module(None)));
    }
    rt.new_instance(class, frame.args.clone(), frame.block.clone())
}

fn allocate(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let class = receiver_module(rt, frame)?;
    rt.allocate(class)
}

fn superclass(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let class = receiver_module(rt, frame)?;
    Ok(rt.superclass(class).map_or(Value::Nil, Value::Module))
}
