//! Block control flow tests
//!
//! Tests for non-local exits from blocks:
//! - `break` ending the call that received the block
//! - `return` leaving the method the block was written in
//! - lambdas catching both for themselves
//! - detached procs reporting LocalJumpError
//! - call depth limits
//!
//! Run with: `cargo test --test control_flow_test`

mod common;

use common::{Trace, boot, class};
use oxirb::{Arity, Error, ErrorKind, Runtime, RuntimeConfig, Value};

fn numbers() -> Value {
    Value::array((1..=5).map(Value::Integer).collect())
}

// ============================================================================
// break
// ============================================================================

#[test]
fn test_break_ends_iteration_with_value() {
    let (mut rt, _) = boot();
    let trace = Trace::new();
    let seen = trace.clone();
    let result = rt
        .call_with_block(numbers(), "each", vec![], Arity::exact(1), move |rt, call| {
            let n = call.arg(0);
            seen.push(rt.inspect(&n)?);
            if n == Value::Integer(3) {
                return Err(call.break_with(Value::str("stopped")));
            }
            Ok(Value::Nil)
        })
        .unwrap();

    assert_eq!(result, Value::str("stopped"));
    assert_eq!(trace.events(), vec!["1", "2", "3"]);
}

#[test]
fn test_break_skips_rest_of_yielding_method() {
    let (mut rt, _) = boot();
    let trace = Trace::new();
    let c = class(&mut rt, "Runner", None);
    let after = trace.clone();
    rt.define_method(c, "run", Arity::exact(0), move |rt, frame| {
        rt.yield_block(frame, vec![])?;
        after.push("after yield");
        Ok(Value::str("finished"))
    })
    .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    let result = rt
        .call_with_block(obj.clone(), "run", vec![], Arity::exact(0), |_rt, call| {
            Err(call.break_with(Value::Integer(42)))
        })
        .unwrap();
    assert_eq!(result, Value::Integer(42));
    assert!(trace.events().is_empty());

    let normal = rt
        .call_with_block(obj, "run", vec![], Arity::exact(0), |_rt, _call| Ok(Value::Nil))
        .unwrap();
    assert_eq!(normal, Value::str("finished"));
}

#[test]
fn test_yield_without_block() {
    let (mut rt, _) = boot();
    let c = class(&mut rt, "Yielder", None);
    rt.define_method(c, "go", Arity::exact(0), |rt, frame| rt.yield_block(frame, vec![]))
        .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    let err = rt.call(obj, "go", vec![]).unwrap_err();
    assert_eq!(err.to_string(), "no block given (yield)");
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

// ============================================================================
// return
// ============================================================================

#[test]
fn test_return_from_block_leaves_home_method() {
    let (mut rt, _) = boot();
    let c = class(&mut rt, "Finder", None);
    rt.define_method(c, "first_over_two", Arity::exact(1), |rt, frame| {
        rt.call_with_block_from(frame, frame.arg(0), "each", vec![], Arity::exact(1), |rt, call| {
            let n = call.arg(0);
            if rt.call(n.clone(), ">", vec![Value::Integer(2)])? == Value::True {
                return Err(call.return_with(n));
            }
            Ok(Value::Nil)
        })?;
        Ok(Value::str("none"))
    })
    .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    assert_eq!(rt.call(obj.clone(), "first_over_two", vec![numbers()]).unwrap(), Value::Integer(3));
    let small = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
    assert_eq!(rt.call(obj, "first_over_two", vec![small]).unwrap(), Value::str("none"));
    assert_eq!(rt.stats().method_missing_calls, 0);
}

#[test]
fn test_return_inside_define_method_body() {
    let (mut rt, _) = boot();
    let c = class(&mut rt, "Early", None);
    rt.call_with_block(
        Value::Module(c),
        "define_method",
        vec![Value::str("bail")],
        Arity::exact(0),
        |_rt, call| Err(call.return_with(Value::str("bailed"))),
    )
    .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    assert_eq!(rt.call(obj, "bail", vec![]).unwrap(), Value::str("bailed"));
}

// ============================================================================
// Procs and lambdas
// ============================================================================

#[test]
fn test_lambda_return_and_break_stay_local() {
    let (mut rt, _) = boot();
    let main = rt.main();
    let returns = rt.new_lambda(main.clone(), Arity::exact(0), |_rt, call| {
        Err(call.return_with(Value::Integer(5)))
    });
    let breaks = rt.new_lambda(main, Arity::exact(0), |_rt, call| {
        Err(call.break_with(Value::Integer(6)))
    });

    assert_eq!(rt.call_proc(&returns, vec![]).unwrap(), Value::Integer(5));
    assert_eq!(rt.call_proc(&breaks, vec![]).unwrap(), Value::Integer(6));
    assert_eq!(rt.call(Value::Proc(returns), "call", vec![]).unwrap(), Value::Integer(5));
}

#[test]
fn test_detached_proc_signals_are_local_jump_errors() {
    let (mut rt, _) = boot();
    let main = rt.main();
    let returns = rt.new_proc(main.clone(), Arity::exact(0), |_rt, call| {
        Err(call.return_with(Value::Nil))
    });
    let breaks = rt.new_proc(main, Arity::exact(0), |_rt, call| Err(call.break_with(Value::Nil)));

    let err = rt.call_proc(&returns, vec![]).unwrap_err();
    assert_eq!(err.to_string(), "unexpected return (LocalJumpError)");
    assert!(!err.is_control());
    let err = rt.call_proc(&breaks, vec![]).unwrap_err();
    assert_eq!(err.to_string(), "break from proc-closure (LocalJumpError)");
}

#[test]
fn test_proc_arguments_are_lenient_lambda_arguments_strict() {
    let (mut rt, _) = boot();
    let main = rt.main();
    let pair = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
    let loose = rt.new_proc(main.clone(), Arity::exact(2), |_rt, call| Ok(call.arg(1)));
    assert_eq!(rt.call_proc(&loose, vec![pair.clone()]).unwrap(), Value::Integer(2));

    let strict = rt.new_lambda(main, Arity::exact(2), |_rt, call| Ok(call.arg(1)));
    let err = rt.call_proc(&strict, vec![pair]).unwrap_err();
    assert!(matches!(err, Error::ArgumentError { got: 1, .. }));
}

#[test]
fn test_block_self_is_defining_receiver() {
    let (mut rt, _) = boot();
    let c = class(&mut rt, "Owner", None);
    rt.define_method(c, "collect_self", Arity::exact(0), |rt, frame| {
        let list = Value::array(vec![Value::Integer(1)]);
        rt.call_with_block_from(frame, list, "map", vec![], Arity::exact(1), |_rt, call| {
            Ok(call.self_value.clone())
        })
    })
    .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    let mapped = rt.call(obj.clone(), "collect_self", vec![]).unwrap();
    let Value::Array(items) = mapped else { panic!("map returns an array") };
    assert!(items.items()[0].identical(&obj));
}

// ============================================================================
// Depth
// ============================================================================

#[test]
fn test_runaway_recursion_reports_stack_overflow() {
    let config = RuntimeConfig {
        max_call_depth: 64,
        ..RuntimeConfig::default()
    };
    let mut rt = Runtime::with_config(config).unwrap();
    let c = class(&mut rt, "Forever", None);
    rt.define_method(c, "again", Arity::exact(0), |rt, frame| {
        rt.call(frame.receiver.clone(), "again", vec![])
    })
    .unwrap();
    let obj = rt.new_instance(c, vec![], None).unwrap();

    let err = rt.call(obj.clone(), "again", vec![]).unwrap_err();
    assert!(matches!(err, Error::StackOverflow { depth: 64 }));

    // The runtime is usable afterwards.
    assert_eq!(rt.call(obj, "nil?", vec![]).unwrap(), Value::False);
}
