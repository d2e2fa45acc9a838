// Dispatch benchmarks
//
// This benchmark suite measures:
// - Cached sends vs sends after a cache flush
// - Lookup depth across superclasses and mixins
// - method_missing fallback cost
// - Relative constant lookup with and without the cache
// - Block iteration through Array#each

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oxirb::{Arity, ModuleId, Runtime, Value};

fn runtime() -> Runtime {
    Runtime::new().unwrap()
}

fn class_with_method(rt: &mut Runtime, name: &str, superclass: Option<ModuleId>) -> ModuleId {
    let class = rt.define_or_reopen_class(&Value::Nil, superclass, name).unwrap();
    rt.define_method(class, "ping", Arity::exact(0), |_rt, _frame| Ok(Value::Integer(1)))
        .unwrap();
    class
}

/// Repeated sends of the same method to the same receiver
fn bench_cached_send(c: &mut Criterion) {
    let mut rt = runtime();
    let class = class_with_method(&mut rt, "Cached", None);
    let obj = rt.new_instance(class, vec![], None).unwrap();
    rt.call(obj.clone(), "ping", vec![]).unwrap();

    c.bench_function("cached_send", |b| {
        b.iter(|| black_box(rt.call(obj.clone(), "ping", vec![]).unwrap()))
    });
}

/// Sends after a method-table write invalidates the cache
fn bench_send_after_invalidation(c: &mut Criterion) {
    let mut rt = runtime();
    let class = class_with_method(&mut rt, "Flushed", None);
    let obj = rt.new_instance(class, vec![], None).unwrap();

    c.bench_function("send_after_invalidation", |b| {
        b.iter(|| {
            rt.define_method(class, "other", Arity::exact(0), |_rt, _frame| Ok(Value::Nil))
                .unwrap();
            black_box(rt.call(obj.clone(), "ping", vec![]).unwrap())
        })
    });
}

/// Uncached lookup cost as the method sits deeper in the ancestor chain
fn bench_lookup_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_depth");

    for depth in &[1usize, 4, 16] {
        let mut rt = runtime();
        let mut class = class_with_method(&mut rt, "Root", None);
        for level in 0..*depth {
            class = rt
                .define_or_reopen_class(&Value::Nil, Some(class), &format!("Level{level}"))
                .unwrap();
            let mixin = rt
                .define_or_reopen_module(&Value::Nil, &format!("Mixin{level}"))
                .unwrap();
            rt.include(class, mixin).unwrap();
        }
        let obj = rt.new_instance(class, vec![], None).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| {
                rt.define_method(class, "other", Arity::exact(0), |_rt, _frame| Ok(Value::Nil))
                    .unwrap();
                black_box(rt.call(obj.clone(), "ping", vec![]).unwrap())
            })
        });
    }

    group.finish();
}

/// Sends that fall through to a user method_missing
fn bench_method_missing(c: &mut Criterion) {
    let mut rt = runtime();
    let class = rt.define_or_reopen_class(&Value::Nil, None, "Ghost").unwrap();
    rt.define_method(class, "method_missing", Arity::rest(1), |_rt, frame| Ok(frame.arg(0)))
        .unwrap();
    let obj = rt.new_instance(class, vec![], None).unwrap();

    c.bench_function("method_missing", |b| {
        b.iter(|| black_box(rt.call(obj.clone(), "vanish", vec![]).unwrap()))
    });
}

/// Relative constant lookup through a three-level nesting
fn bench_const_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("const_lookup");
    let mut rt = runtime();
    let outer = rt.define_or_reopen_module(&Value::Nil, "Outer").unwrap();
    let middle = rt.define_or_reopen_module(&Value::Module(outer), "Middle").unwrap();
    let inner = rt.define_or_reopen_class(&Value::Module(middle), None, "Inner").unwrap();
    let object = rt.core().object;
    rt.const_set(object, "TOP", Value::Integer(1)).unwrap();
    let nesting = rt.nesting(&[inner, middle, outer]);

    group.bench_function("cached", |b| {
        b.iter(|| black_box(rt.const_get_relative(&nesting, "TOP").unwrap()))
    });
    group.bench_function("after_write", |b| {
        b.iter(|| {
            rt.const_set(outer, "SCRATCH", Value::Nil).unwrap();
            black_box(rt.const_get_relative(&nesting, "TOP").unwrap())
        })
    });

    group.finish();
}

/// Array#each with a block over arrays of increasing length
fn bench_block_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_iteration");

    for len in &[10i64, 100, 1000] {
        let mut rt = runtime();
        let array = Value::array((0..*len).map(Value::Integer).collect());
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                black_box(
                    rt.call_with_block(array.clone(), "each", vec![], Arity::exact(1), |_rt, call| {
                        Ok(call.arg(0))
                    })
                    .unwrap(),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_send,
    bench_send_after_invalidation,
    bench_lookup_depth,
    bench_method_missing,
    bench_const_lookup,
    bench_block_iteration
);
criterion_main!(benches);
