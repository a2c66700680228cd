//! Performance benchmarks for the compilation pipeline.
//!
//! Programs are generated with [`AstBuilder`] so only the semantic passes
//! are measured:
//! - Scale: chains of small functions called from one exported entry point
//! - Optimizations: the same programs with and without folding and inlining
//! - Evaluation: constants computed by running loops at compile time

use corvid::syntax::{BinaryOp, Item};
use corvid::{AstBuilder, Bump, CompilerInputs, CompilerSettings, FileId, ParsedFile, compile};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

/// `i32 step_i(i32 a) { return step_{i-1}(a) + i; }` for every `i`, plus an
/// exported `main` calling the last one.
fn function_chain<'a>(b: &AstBuilder<'a>, count: usize) -> ParsedFile<'a> {
    let mut items: Vec<Item<'a>> = Vec::with_capacity(count + 1);
    for i in 0..count {
        let name = format!("step_{i}");
        let value = if i == 0 {
            b.name("a")
        } else {
            b.call_named(&format!("step_{}", i - 1), &[b.name("a")])
        };
        let body = [b.ret(Some(b.binary(value, BinaryOp::Add, b.int(i as i64))))];
        items.push(b.fn_item(b.function(b.ty("i32"), &name, &[b.param(b.ty("i32"), "a")], &body)));
    }
    let last = format!("step_{}", count.saturating_sub(1));
    let main = b.function(
        b.ty("i32"),
        "main",
        &[b.param(b.ty("i32"), "v")],
        &[b.ret(Some(b.call_named(&last, &[b.name("v")])))],
    );
    items.push(b.fn_item(b.with_attributes(main, &[b.attribute("export", &[])])));
    b.file("chain.cv", &items)
}

/// A summing function and `count` constants computed from it.
fn evaluated_constants<'a>(b: &AstBuilder<'a>, count: usize) -> ParsedFile<'a> {
    let body = [
        b.var(b.ty("i32"), "total", Some(b.int(0))),
        b.for_stmt(
            Some(b.var(b.ty("i32"), "i", Some(b.int(1)))),
            Some(b.binary(b.name("i"), BinaryOp::LessEqual, b.name("n"))),
            Some(b.increment(b.name("i"))),
            b.block_stmt(&[b.assign(
                b.name("total"),
                b.binary(b.name("total"), BinaryOp::Add, b.name("i")),
            )]),
        ),
        b.ret(Some(b.name("total"))),
    ];
    let mut items =
        vec![b.fn_item(b.function(b.ty("i32"), "sum", &[b.param(b.ty("i32"), "n")], &body))];
    for i in 0..count {
        let value = b.call_named("sum", &[b.int((i % 100) as i64)]);
        items.push(b.stmt_item(b.constant(b.ty("i32"), &format!("SUM_{i}"), value)));
    }
    b.file("constants.cv", &items)
}

fn bench_scale(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/scale");
    let inputs = CompilerInputs::default();

    for count in [10usize, 50, 200] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("chain_{count}"), |bencher| {
            bencher.iter(|| {
                let arena = Bump::new();
                let b = AstBuilder::new(&arena, FileId(0));
                let files = [function_chain(&b, count)];
                let result = compile(black_box(&files), &inputs);
                black_box(result.is_success())
            });
        });
    }

    group.finish();
}

fn bench_optimizations(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/optimizations");
    let optimized = CompilerInputs::new(CompilerSettings::default());
    let unoptimized = CompilerInputs::new(CompilerSettings::unoptimized());

    for (label, inputs) in [("optimized", &optimized), ("unoptimized", &unoptimized)] {
        group.bench_function(format!("chain_100_{label}"), |bencher| {
            bencher.iter(|| {
                let arena = Bump::new();
                let b = AstBuilder::new(&arena, FileId(0));
                let files = [function_chain(&b, 100)];
                let result = compile(black_box(&files), inputs);
                black_box(result.diagnostics.len())
            });
        });
    }

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/evaluation");
    let inputs = CompilerInputs::default();

    for count in [10usize, 200] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("constants_{count}"), |bencher| {
            bencher.iter(|| {
                let arena = Bump::new();
                let b = AstBuilder::new(&arena, FileId(0));
                let files = [evaluated_constants(&b, count)];
                let result = compile(black_box(&files), &inputs);
                black_box(result.constants().len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scale, bench_optimizations, bench_evaluation);
criterion_main!(benches);
