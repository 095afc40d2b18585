//! Engine benchmarking suite

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use prolog_core::{
    call, clause,
    config::EngineConfig,
    list,
    prolog::Prolog,
    query::Query,
    rules::Clause,
    terms::*,
    var,
};

fn engine(clauses: Vec<Clause>) -> Prolog {
    let prolog = Prolog::with_config(EngineConfig::default());
    prolog.add_clauses(clauses).unwrap();
    prolog
}

fn run(mut query: Query) {
    let result = query.next().expect("expected a solution");
    assert!(result.is_ok());
}

pub fn simple_queries(c: &mut Criterion) {
    let prolog = engine(vec![]);
    c.bench_function("unify_once", |b| {
        b.iter_batched(
            || prolog.new_query(&call!("=", [1, 1])).unwrap(),
            run,
            criterion::BatchSize::SmallInput,
        )
    });
    c.bench_function("unify_twice", |b| {
        b.iter_batched(
            || {
                prolog
                    .new_query(&call!(",", [call!("=", [1, 1]), call!("=", [2, 2])]))
                    .unwrap()
            },
            run,
            criterion::BatchSize::SmallInput,
        )
    });
}

fn append_clauses() -> Vec<Clause> {
    vec![
        clause!(call!("append", [list!(), var!("L"), var!("L")])),
        clause!(
            call!("append", [Term::cons(var!("H"), var!("T")), var!("L"), Term::cons(var!("H"), var!("R"))])
                => call!("append", [var!("T"), var!("L"), var!("R")])
        ),
    ]
}

/// Bench: naive reverse of a list of `n` integers, quadratic in `n`.
pub fn naive_reverse(c: &mut Criterion) {
    let mut clauses = append_clauses();
    clauses.push(clause!(call!("nrev", [list!(), list!()])));
    clauses.push(clause!(
        call!("nrev", [Term::cons(var!("H"), var!("T")), var!("R")])
            => call!("nrev", [var!("T"), var!("RT")]),
            call!("append", [var!("RT"), list!(var!("H")), var!("R")])
    ));
    let prolog = engine(clauses);

    let mut group = c.benchmark_group("nrev");
    for n in &[10i64, 30, 100] {
        let input = Term::list((0..*n).map(Term::integer).collect());
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter_batched(
                || prolog.new_query(&call!("nrev", [input.clone(), var!("R")])).unwrap(),
                run,
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

/// Bench: a last-call loop counting up to `n`.
pub fn tail_count(c: &mut Criterion) {
    let prolog = engine(vec![
        clause!(call!("count", [var!("N"), var!("N")]) => call!("!")),
        clause!(
            call!("count", [var!("I"), var!("N")])
                => call!("is", [var!("J"), call!("+", [var!("I"), 1])]),
                call!("count", [var!("J"), var!("N")])
        ),
    ]);

    let mut group = c.benchmark_group("count");
    for n in &[1_000i64, 10_000] {
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter_batched(
                || prolog.new_query(&call!("count", [0, *n])).unwrap(),
                run,
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

/// Bench: collect every solution of `between/3` with `findall/3`.
pub fn findall(c: &mut Criterion) {
    let prolog = engine(vec![]);

    let mut group = c.benchmark_group("findall");
    for n in &[100i64, 1_000] {
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter_batched(
                || {
                    prolog
                        .new_query(&call!(
                            "findall",
                            [var!("X"), call!("between", [1, *n, var!("X")]), var!("L")]
                        ))
                        .unwrap()
                },
                run,
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

/// Bench: `f(i) :- f(i-1)` for `TARGET` rules, measuring clause selection
/// over a predicate with many clauses.
pub fn many_rules(c: &mut Criterion) {
    const TARGET: i64 = 50;
    let mut clauses = vec![clause!(call!("f", [0]))];
    for i in 1..=TARGET {
        clauses.push(clause!(call!("f", [i]) => call!("f", [i - 1])));
    }
    let prolog = engine(clauses);

    c.bench_function("many_rules", |b| {
        b.iter_batched(
            || prolog.new_query(&call!("f", [TARGET])).unwrap(),
            run,
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    simple_queries,
    naive_reverse,
    tail_count,
    findall,
    many_rules
);
criterion_main!(benches);
