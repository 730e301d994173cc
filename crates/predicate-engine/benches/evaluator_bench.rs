//! 条件评估器性能基准测试
//!
//! 针对 ConditionEvaluator 的各种比较操作进行细粒度的性能测试。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use predicate_engine::{CompareOp, ConditionEvaluator, EvaluationContext, MathOperator, Operand};
use serde_json::{Value, json};
use std::hint::black_box;

fn create_context() -> EvaluationContext {
    EvaluationContext::new(json!({
        "times": 1000,
        "limit": 500,
        "email": "user@example.com",
        "tag": "target",
        "profile": {"age": 30}
    }))
}

fn compare(ctx: &EvaluationContext, field: &str, op: &CompareOp) -> bool {
    ConditionEvaluator::compare(op, field, ctx.get_field(field), ctx, false).unwrap_or(false)
}

/// 数值比较操作基准
fn bench_numeric_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_operations");
    let ctx = create_context();

    let cases = [
        ("eq", CompareOp::Eq(Operand::literal(500))),
        ("neq", CompareOp::Neq(Operand::literal(500))),
        ("gt", CompareOp::Gt(Operand::literal(500))),
        ("gte", CompareOp::Gte(Operand::literal(500))),
        ("lt", CompareOp::Lt(Operand::literal(500))),
        ("lte", CompareOp::Lte(Operand::literal(500))),
        (
            "between",
            CompareOp::Between(Operand::literal(100), Operand::literal(2000)),
        ),
    ];

    for (name, op) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| compare(black_box(&ctx), "times", black_box(op)))
        });
    }

    group.finish();
}

/// 引用与算术操作数基准
fn bench_operand_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("operand_resolution");
    let ctx = create_context();

    let reference = CompareOp::Gt(Operand::reference("limit"));
    group.bench_function("reference", |b| {
        b.iter(|| compare(black_box(&ctx), "times", black_box(&reference)))
    });

    let nested_ref = CompareOp::Lt(Operand::reference("profile.age"));
    group.bench_function("nested_reference", |b| {
        b.iter(|| compare(black_box(&ctx), "times", black_box(&nested_ref)))
    });

    // times > limit * 2 - 1
    let math = CompareOp::Gt(Operand::math(
        MathOperator::Sub,
        Operand::math(
            MathOperator::Mul,
            Operand::reference("limit"),
            Operand::literal(2),
        ),
        Operand::literal(1),
    ));
    group.bench_function("math", |b| {
        b.iter(|| compare(black_box(&ctx), "times", black_box(&math)))
    });

    group.finish();
}

/// 正则表达式操作基准
fn bench_regex_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_operations");
    let ctx = create_context();

    // 简单正则
    let simple = CompareOp::Regexp(Operand::literal(r"^user"));
    group.bench_function("simple_regex", |b| {
        b.iter(|| compare(black_box(&ctx), "email", black_box(&simple)))
    });

    // 复杂正则
    let complex = CompareOp::Regexp(Operand::literal(r"^[\w.-]+@[\w.-]+\.\w+$"));
    group.bench_function("complex_regex", |b| {
        b.iter(|| compare(black_box(&ctx), "email", black_box(&complex)))
    });

    let caseless = CompareOp::Regexpi(Operand::literal(r"^USER"));
    group.bench_function("case_insensitive_regex", |b| {
        b.iter(|| compare(black_box(&ctx), "email", black_box(&caseless)))
    });

    group.finish();
}

/// inq 操作符不同列表大小的性能
fn bench_inq_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("inq_scaling");
    let ctx = create_context();

    for size in [5, 10, 50, 100, 500].iter() {
        let items: Vec<Operand> = (0..*size)
            .map(|i| {
                if i == size - 1 {
                    Operand::literal("target")
                } else {
                    Operand::literal(format!("item_{i}"))
                }
            })
            .collect();
        let op = CompareOp::Inq(items);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| compare(black_box(&ctx), "tag", black_box(&op)))
        });
    }

    group.finish();
}

/// 缺失字段处理基准
fn bench_missing_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("missing_field");
    let ctx = create_context();

    let eq = CompareOp::Eq(Operand::literal(Value::Null));
    group.bench_function("eq_missing", |b| {
        b.iter(|| compare(black_box(&ctx), "missing", black_box(&eq)))
    });

    let exists = CompareOp::Exists(true);
    group.bench_function("exists_missing", |b| {
        b.iter(|| compare(black_box(&ctx), "missing", black_box(&exists)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_numeric_operations,
    bench_operand_resolution,
    bench_regex_operations,
    bench_inq_scaling,
    bench_missing_field,
);

criterion_main!(benches);
