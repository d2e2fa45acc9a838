//! Loader and core library tests
//!
//! Tests for file registration and the boot-time library:
//! - `require` vs `load`, through the API and through Kernel
//! - missing-file policies
//! - path normalization against the current directory
//! - output captured from `puts`
//!
//! Run with: `cargo test --test loader_test`

mod common;

use common::{Trace, boot, class, define_returning};
use oxirb::{Error, MissingRequire, Runtime, RuntimeConfig, Value};

// ============================================================================
// require / load
// ============================================================================

#[test]
fn test_kernel_require_runs_file_once() {
    let (mut rt, _) = boot();
    let trace = Trace::new();
    let runs = trace.clone();
    rt.register_module("app/models", move |rt| {
        runs.push("models");
        let model = class(rt, "Model", None);
        define_returning(rt, model, "table", "models");
        Ok(())
    });
    let main = rt.main();

    let first = rt.call(main.clone(), "require", vec![Value::str("app/models")]).unwrap();
    let second = rt.call(main.clone(), "require", vec![Value::str("./app/models.rb")]).unwrap();
    assert_eq!(first, Value::True);
    assert_eq!(second, Value::False);
    assert_eq!(trace.events(), vec!["models"]);

    let again = rt.call(main, "load", vec![Value::str("app/models")]).unwrap();
    assert_eq!(again, Value::True);
    assert_eq!(trace.events(), vec!["models", "models"]);
    assert_eq!(rt.loaded_features(), ["app/models".to_string()]);
}

#[test]
fn test_circular_require_sees_file_as_loaded() {
    let (mut rt, _) = boot();
    let trace = Trace::new();
    let a_trace = trace.clone();
    rt.register_module("a", move |rt| {
        a_trace.push("a start");
        rt.require("b")?;
        a_trace.push("a end");
        Ok(())
    });
    let b_trace = trace.clone();
    rt.register_module("b", move |rt| {
        b_trace.push(format!("b requires a: {}", rt.require("a")?));
        Ok(())
    });

    assert!(rt.require("a").unwrap());
    assert_eq!(trace.events(), vec!["a start", "b requires a: false", "a end"]);
}

#[test]
fn test_relative_require_uses_current_dir() {
    let config = RuntimeConfig::default().with_current_dir("lib");
    let mut rt = Runtime::with_config(config).unwrap();
    rt.register_module("lib/util", |_rt| Ok(()));

    assert!(rt.require("util.rb").unwrap());
    assert!(rt.is_loaded("util"));
    assert!(!rt.require("../lib/util").unwrap());
}

// ============================================================================
// Missing files
// ============================================================================

#[test]
fn test_missing_require_policies() {
    let (mut rt, _) = boot();
    let main = rt.main();
    let err = rt.call(main.clone(), "require", vec![Value::str("ghost")]).unwrap_err();
    assert!(matches!(err, Error::LoadError { ref path } if path == "ghost"));
    assert_eq!(err.class_name(), "LoadError");

    rt.set_missing_require(MissingRequire::Warn);
    assert_eq!(rt.call(main.clone(), "require", vec![Value::str("ghost")]).unwrap(), Value::False);

    rt.set_missing_require(MissingRequire::Ignore);
    assert_eq!(rt.call(main, "load", vec![Value::str("ghost")]).unwrap(), Value::False);
    assert!(!rt.is_loaded("ghost"));
}

#[test]
fn test_policy_parses_from_text() {
    assert_eq!("warning".parse::<MissingRequire>(), Ok(MissingRequire::Warn));
    assert_eq!(" IGNORE ".parse::<MissingRequire>(), Ok(MissingRequire::Ignore));
    assert!("loud".parse::<MissingRequire>().is_err());
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_puts_uses_to_s_overrides() {
    let (mut rt, sink) = boot();
    let c = class(&mut rt, "Badge", None);
    define_returning(&mut rt, c, "to_s", "[badge]");
    let badge = rt.new_instance(c, vec![], None).unwrap();
    let main = rt.main();

    let list = Value::array(vec![Value::Integer(1), Value::Float(2.5), badge]);
    rt.call(main.clone(), "puts", vec![list]).unwrap();
    rt.call(main, "puts", vec![Value::Float(1e20), Value::True]).unwrap();

    assert_eq!(sink.stdout(), "1\n2.5\n[badge]\n1.0e+20\ntrue\n");
}

#[test]
fn test_inspect_of_nested_values() {
    let (mut rt, _) = boot();
    let range_class = rt.core().range;
    let range = rt
        .call(Value::Module(range_class), "new", vec![Value::Integer(1), Value::Integer(3), Value::True])
        .unwrap();
    let nested = Value::array(vec![Value::Nil, Value::str("q\""), range, Value::Float(3.0)]);

    assert_eq!(rt.inspect(&nested).unwrap(), r#"[nil, "q\"", 1...3, 3.0]"#);
}
