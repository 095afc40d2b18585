use maplit::hashmap;
use permute::permute;

use prolog_core::{
    bindings::Bindings,
    call, clause, list,
    config::{EngineConfig, Unknown},
    error::PrologError,
    partial_list,
    prolog::Prolog,
    rules::Clause,
    sym, term,
    terms::*,
    var,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn prolog(clauses: Vec<Clause>) -> Prolog {
    init_logging();
    let prolog = Prolog::with_config(EngineConfig::default());
    prolog.add_clauses(clauses).unwrap();
    prolog
}

fn query_results(prolog: &Prolog, goal: Term) -> Vec<Bindings> {
    prolog
        .new_query(&goal)
        .unwrap()
        .map(|result| result.unwrap())
        .collect()
}

fn qeval(prolog: &Prolog, goal: Term) -> bool {
    !query_results(prolog, goal).is_empty()
}

fn qnull(prolog: &Prolog, goal: Term) -> bool {
    query_results(prolog, goal).is_empty()
}

fn qvar(prolog: &Prolog, goal: Term, var: &str) -> Vec<Term> {
    query_results(prolog, goal)
        .into_iter()
        .map(|bindings| bindings[&sym!(var)].clone())
        .collect()
}

fn qvars(prolog: &Prolog, goal: Term, vars: &[&str]) -> Vec<Vec<Term>> {
    query_results(prolog, goal)
        .into_iter()
        .map(|bindings| vars.iter().map(|var| bindings[&sym!(*var)].clone()).collect())
        .collect()
}

/// The error the query ends with.
fn qerr(prolog: &Prolog, goal: Term) -> PrologError {
    prolog
        .new_query(&goal)
        .unwrap()
        .find_map(Result::err)
        .expect("query did not raise an error")
}

fn append() -> Vec<Clause> {
    vec![
        clause!(call!("append", [list![], var!("L"), var!("L")])),
        clause!(call!("append", [partial_list!([var!("H")], var!("T")), var!("L"), partial_list!([var!("H")], var!("R"))]) =>
            call!("append", [var!("T"), var!("L"), var!("R")])),
    ]
}

fn member() -> Vec<Clause> {
    vec![
        clause!(call!("member", [var!("X"), partial_list!([var!("X")], var!("_"))])),
        clause!(call!("member", [var!("X"), partial_list!([var!("_")], var!("T"))]) =>
            call!("member", [var!("X"), var!("T")])),
    ]
}

fn legs() -> Vec<Clause> {
    vec![
        clause!(call!("insect", ["bee"])),
        clause!(call!("insect", ["ant"])),
        clause!(call!("animal", ["horse"])),
        clause!(call!("animal", ["cat"])),
        clause!(call!("animal", ["dog"])),
        clause!(call!("spider", ["tarantula"])),
        clause!(call!("legs", [var!("A"), 6]) => call!("insect", [var!("A")])),
        clause!(call!("legs", [var!("A"), 4]) => call!("animal", [var!("A")])),
        clause!(call!("legs", [var!("A"), 8]) => call!("spider", [var!("A")])),
    ]
}

#[test]
fn test_facts_and_conjunction() {
    let prolog = prolog(vec![
        clause!(call!("parent", ["tom", "bob"])),
        clause!(call!("parent", ["bob", "ann"])),
        clause!(call!("parent", ["bob", "pat"])),
        clause!(call!("grandparent", [var!("X"), var!("Z")]) =>
            call!("parent", [var!("X"), var!("Y")]),
            call!("parent", [var!("Y"), var!("Z")])),
    ]);
    assert_eq!(
        query_results(&prolog, call!("grandparent", ["tom", var!("Who")])),
        vec![
            hashmap! {sym!("Who") => term!("ann")},
            hashmap! {sym!("Who") => term!("pat")},
        ]
    );
    assert!(qnull(&prolog, call!("grandparent", ["bob", var!("_")])));
}

#[test]
fn test_append_modes() {
    let prolog = prolog(append());
    assert_eq!(
        qvar(&prolog, call!("append", [list![1, 2], list![3], var!("L")]), "L"),
        vec![list![1, 2, 3]]
    );
    assert_eq!(
        qvars(&prolog, call!("append", [var!("X"), var!("Y"), list![1, 2]]), &["X", "Y"]),
        vec![
            vec![list![], list![1, 2]],
            vec![list![1], list![2]],
            vec![list![1, 2], list![]],
        ]
    );
}

#[test]
fn test_trail_soundness() {
    // X is bound before the choice; Y and Z are bound inside the branch that
    // fails. Afterwards Y and Z are free again and X keeps its value.
    let prolog = prolog(vec![]);
    let goal = call!(
        ",",
        [
            call!("=", [var!("X"), "kept"]),
            call!(
                ";",
                [
                    call!(",", [call!("=", [var!("Y"), 1]), call!(",", [call!("=", [var!("Z"), call!("f", [var!("Y")])]), "fail"])]),
                    "true"
                ]
            )
        ]
    );
    let results = query_results(&prolog, goal);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0][&sym!("X")], term!("kept"));
    assert!(results[0][&sym!("Y")].is_var());
    assert!(results[0][&sym!("Z")].is_var());
}

#[test]
fn test_cut_determinism() {
    let prolog = prolog(vec![
        clause!(call!("max", [var!("X"), var!("Y"), var!("X")]) => call!(">=", [var!("X"), var!("Y")]), "!"),
        clause!(call!("max", [var!("_"), var!("Y"), var!("Y")])),
        clause!(call!("first", [var!("X"), var!("L")]) => call!("member", [var!("X"), var!("L")]), "!"),
    ]);
    prolog.add_clauses(member()).unwrap();
    assert_eq!(qvar(&prolog, call!("max", [3, 2, var!("M")]), "M"), vec![term!(3)]);
    assert_eq!(qvar(&prolog, call!("max", [2, 3, var!("M")]), "M"), vec![term!(3)]);
    assert_eq!(
        qvar(&prolog, call!("first", [var!("X"), list!["a", "b", "c"]]), "X"),
        vec![term!("a")]
    );
}

#[test]
fn test_cut_inside_call_is_local() {
    let prolog = prolog(member());
    let goal = call!(
        ",",
        [
            call!("member", [var!("X"), list![1, 2, 3]]),
            call!("call", [call!(",", ["!", "true"])])
        ]
    );
    assert_eq!(qvar(&prolog, goal, "X"), vec![term!(1), term!(2), term!(3)]);
}

#[test]
fn test_cut_through_disjunction() {
    let prolog = prolog(vec![
        clause!(call!("t", [var!("X")]) => call!(";", [call!(",", [call!("=", [var!("X"), 1]), "!"]), call!("=", [var!("X"), 2])])),
        clause!(call!("t", [3])),
    ]);
    assert_eq!(qvar(&prolog, call!("t", [var!("X")]), "X"), vec![term!(1)]);
}

#[test]
fn test_negation() {
    let prolog = prolog(member());
    assert!(qeval(&prolog, call!("\\+", [call!("member", [4, list![1, 2, 3]])])));
    assert!(qnull(&prolog, call!("\\+", [call!("member", [2, list![1, 2, 3]])])));
    assert!(qeval(&prolog, call!("not", [call!("=", [1, 2])])));
    // Negation never binds.
    let results = query_results(&prolog, call!("\\+", [call!("\\+", [call!("=", [var!("X"), 1])])]));
    assert!(results[0][&sym!("X")].is_var());
}

#[test]
fn test_if_then_else() {
    let prolog = prolog(vec![
        clause!(call!("classify", [var!("N"), var!("C")]) =>
            call!(";", [
                call!("->", [call!("<", [var!("N"), 0]), call!("=", [var!("C"), "negative"])]),
                call!(";", [
                    call!("->", [call!("=:=", [var!("N"), 0]), call!("=", [var!("C"), "zero"])]),
                    call!("=", [var!("C"), "positive"])
                ])
            ])),
    ]);
    assert_eq!(qvar(&prolog, call!("classify", [-5, var!("C")]), "C"), vec![term!("negative")]);
    assert_eq!(qvar(&prolog, call!("classify", [0, var!("C")]), "C"), vec![term!("zero")]);
    assert_eq!(qvar(&prolog, call!("classify", [7, var!("C")]), "C"), vec![term!("positive")]);
}

#[test]
fn test_catch_unifies_ball() {
    let prolog = prolog(vec![]);
    let goal = call!(
        "catch",
        [call!("throw", [call!("err", [1])]), call!("err", [var!("X")]), "true"]
    );
    assert_eq!(query_results(&prolog, goal), vec![hashmap! {sym!("X") => term!(1)}]);
}

#[test]
fn test_catch_from_deep_recursion() {
    let prolog = prolog(vec![
        clause!(call!("down", [0]) => call!("throw", [call!("bottom", ["reached"])])),
        clause!(call!("down", [var!("N")]) =>
            call!("is", [var!("M"), call!("-", [var!("N"), 1])]),
            call!("down", [var!("M")]),
            "true"),
    ]);
    let goal = call!(
        "catch",
        [call!("down", [500]), call!("bottom", [var!("W")]), "true"]
    );
    assert_eq!(qvar(&prolog, goal, "W"), vec![term!("reached")]);
}

#[test]
fn test_runtime_errors_are_terms() {
    let prolog = prolog(vec![]);
    let goal = call!(
        "catch",
        [
            call!("is", [var!("X"), call!("+", [var!("Y"), 1])]),
            call!("error", [var!("E"), var!("C")]),
            "true"
        ]
    );
    assert_eq!(
        qvars(&prolog, goal, &["E", "C"]),
        vec![vec![term!("instantiation_error"), call!("/", ["is", 2])]]
    );

    let err = qerr(&prolog, call!("atom_codes", ["a", var!("L")]));
    assert_eq!(
        err.formal(),
        Some(&call!("existence_error", ["procedure", call!("/", ["atom_codes", 2])]))
    );
}

#[test]
fn test_uncaught_error_ends_query() {
    let prolog = prolog(member());
    let goal = call!(
        ",",
        [
            call!("member", [var!("X"), list![1, 2, 3]]),
            call!(";", [call!("->", [call!("<", [var!("X"), 2]), "true"]), call!("throw", [call!("too_big", [var!("X")])])])
        ]
    );
    let mut query = prolog.new_query(&goal).unwrap();
    assert_eq!(query.next().unwrap().unwrap()[&sym!("X")], term!(1));
    match query.next() {
        Some(Err(PrologError::Uncaught { ball })) => assert_eq!(ball, call!("too_big", [2])),
        other => panic!("unexpected {:?}", other),
    }
    assert!(query.next().is_none());
}

#[test]
fn test_findall_emptiness() {
    let prolog = prolog(vec![]);
    assert_eq!(
        qvar(&prolog, call!("findall", [var!("X"), "fail", var!("L")]), "L"),
        vec![list![]]
    );
}

#[test]
fn test_tail_call_boundedness() {
    let prolog = prolog(vec![
        clause!(call!("count", [var!("N"), var!("N")]) => "!"),
        clause!(call!("count", [var!("I"), var!("N")]) =>
            call!("is", [var!("J"), call!("+", [var!("I"), 1])]),
            call!("count", [var!("J"), var!("N")])),
    ]);
    let mut query = prolog.new_query(&call!("count", [0, 100_000])).unwrap();
    assert!(query.next().unwrap().is_ok());
    assert!(query.max_depth() <= 4, "depth grew to {}", query.max_depth());
    assert!(query.next().is_none());
}

#[test]
fn test_long_list_recursion() {
    let prolog = prolog(vec![
        clause!(call!("len", [list![], 0])),
        clause!(call!("len", [partial_list!([var!("_")], var!("T")), var!("N")]) =>
            call!("len", [var!("T"), var!("M")]),
            call!("is", [var!("N"), call!("+", [var!("M"), 1])])),
    ]);
    let goal = call!(
        ",",
        [
            call!("findall", [var!("X"), call!("between", [1, 100_000, var!("X")]), var!("L")]),
            call!("len", [var!("L"), var!("N")])
        ]
    );
    assert_eq!(qvar(&prolog, goal, "N"), vec![term!(100_000)]);
}

#[test]
fn test_long_list_accumulator() {
    let prolog = prolog(vec![
        clause!(call!("len", [list![], var!("N"), var!("N")])),
        clause!(call!("len", [partial_list!([var!("_")], var!("T")), var!("A"), var!("N")]) =>
            call!("is", [var!("A1"), call!("+", [var!("A"), 1])]),
            call!("len", [var!("T"), var!("A1"), var!("N")])),
    ]);
    let goal = call!(
        ",",
        [
            call!("findall", [var!("X"), call!("between", [1, 100_000, var!("X")]), var!("L")]),
            call!("len", [var!("L"), 0, var!("N")])
        ]
    );
    assert_eq!(qvar(&prolog, goal, "N"), vec![term!(100_000)]);
}

#[test]
fn test_long_lists_of_fresh_terms() {
    let prolog = prolog(vec![]);
    let goal = call!(
        ",",
        [
            call!(
                "findall",
                [call!("f", [var!("_")]), call!("between", [1, 100_000, var!("_")]), var!("L")]
            ),
            call!("length", [var!("L"), var!("N")])
        ]
    );
    assert_eq!(qvar(&prolog, goal, "N"), vec![term!(100_000)]);

    let between = |v: &str| call!("findall", [var!("X"), call!("between", [1, 100_000, var!("X")]), var!(v)]);
    let goal = call!(
        ",",
        [
            between("A"),
            call!(",", [between("B"), call!("==", [var!("A"), var!("B")])])
        ]
    );
    let mut query = prolog.new_query(&goal).unwrap();
    assert!(query.next().unwrap().is_ok());
}

#[test]
fn test_bagof_grouping() {
    let prolog = prolog(legs());
    let goal = call!("bagof", [var!("A"), call!("legs", [var!("A"), var!("N")]), var!("B")]);
    assert_eq!(
        qvars(&prolog, goal, &["N", "B"]),
        vec![
            vec![term!(6), list!["bee", "ant"]],
            vec![term!(4), list!["horse", "cat", "dog"]],
            vec![term!(8), list!["tarantula"]],
        ]
    );
}

#[test]
fn test_setof_dedup_and_order() {
    let prolog = prolog(vec![
        clause!(call!("p", [1, "x", "c"])),
        clause!(call!("p", [2, "y", "a"])),
        clause!(call!("p", [3, "x", "b"])),
        clause!(call!("p", [4, "z", "a"])),
        clause!(call!("p", [5, "y", "c"])),
    ]);
    let goal = call!(
        "setof",
        [
            var!("Z"),
            call!("^", [var!("X"), call!("^", [var!("Y"), call!("p", [var!("X"), var!("Y"), var!("Z")])])]),
            var!("Bag")
        ]
    );
    assert_eq!(qvar(&prolog, goal, "Bag"), vec![list!["a", "b", "c"]]);
}

#[test]
fn test_setof_without_solutions_fails() {
    let prolog = prolog(legs());
    assert!(qnull(
        &prolog,
        call!("setof", [var!("A"), call!("legs", [var!("A"), 100]), var!("S")])
    ));
}

#[test]
fn test_clause_order_permutations() {
    let parts = vec![
        clause!(call!("f", [1])),
        clause!(call!("f", [2])),
        clause!(call!("g", [1])),
        clause!(call!("g", [2])),
        clause!(call!("h", [2])),
        clause!(call!("k", [var!("X")]) =>
            call!("f", [var!("X")]),
            call!("g", [var!("X")]),
            call!("h", [var!("X")])),
    ];

    for permutation in permute(parts) {
        let prolog = prolog(permutation.clone());
        assert!(
            qnull(&prolog, call!("k", [1])),
            "k(1) was true for permutation {:?}",
            &permutation
        );
        assert!(
            qeval(&prolog, call!("k", [2])),
            "k(2) failed for permutation {:?}",
            &permutation
        );
        assert_eq!(
            qvar(&prolog, call!("k", [var!("A")]), "A"),
            vec![term!(2)],
            "k(A) failed for permutation {:?}",
            &permutation
        );
    }
}

#[test]
fn test_results_follow_clause_order() {
    let parts = vec![
        (1, clause!(call!("foo", [1]))),
        (2, clause!(call!("foo", [2]))),
        (3, clause!(call!("foo", [3]))),
        (4, clause!(call!("foo", [4]))),
    ];
    for permutation in permute(parts) {
        let (results, clauses): (Vec<_>, Vec<_>) = permutation.into_iter().unzip();
        let prolog = prolog(clauses);
        assert_eq!(
            qvar(&prolog, call!("foo", [var!("A")]), "A"),
            results.into_iter().map(|v: i64| term!(v)).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_once_ignore_forall() {
    let prolog = prolog(member());
    assert_eq!(
        qvar(&prolog, call!("once", [call!("member", [var!("X"), list!["a", "b"]])]), "X"),
        vec![term!("a")]
    );
    assert!(qeval(&prolog, call!("ignore", [call!("member", [var!("X"), list![]])])));
    assert!(qeval(
        &prolog,
        call!("forall", [call!("member", [var!("X"), list![1, 2, 3]]), call!("integer", [var!("X")])])
    ));
    assert!(qnull(
        &prolog,
        call!("forall", [call!("member", [var!("X"), list![1, "a"]]), call!("integer", [var!("X")])])
    ));
}

#[test]
fn test_assert_and_retract_through_queries() {
    let prolog = prolog(vec![]);
    prolog.declare_dynamic("seen", 1).unwrap();
    for i in 1..=3i64 {
        assert!(qeval(&prolog, call!("assertz", [call!("seen", [i])])));
    }
    assert_eq!(
        qvar(&prolog, call!("seen", [var!("X")]), "X"),
        vec![term!(1), term!(2), term!(3)]
    );
    assert!(qeval(&prolog, call!("retract", [call!("seen", [2])])));
    assert_eq!(
        qvar(&prolog, call!("aggregate_all", ["count", call!("seen", [var!("_")]), var!("N")]), "N"),
        vec![term!(2)]
    );
}

#[test]
fn test_unknown_procedure_modes() {
    let prolog = prolog(vec![]);
    let err = qerr(&prolog, call!("undefined_thing", []));
    assert_eq!(
        err.formal(),
        Some(&call!("existence_error", ["procedure", call!("/", ["undefined_thing", 0])]))
    );

    let quiet = Prolog::with_config(EngineConfig {
        unknown: Unknown::Fail,
        ..EngineConfig::default()
    });
    assert!(qnull(&quiet, call!("undefined_thing", [])));
}

#[test]
fn test_stack_limit() {
    let prolog = Prolog::with_config(EngineConfig {
        stack_limit: 10_000,
        ..EngineConfig::default()
    });
    prolog
        .add_clause(clause!(call!("grow", [var!("N")]) =>
            call!("is", [var!("M"), call!("+", [var!("N"), 1])]),
            call!("grow", [var!("M")]),
            call!("atom", ["a"])))
        .unwrap();
    let err = qerr(&prolog, call!("grow", [0]));
    assert_eq!(err.formal(), Some(&call!("resource_error", ["stack"])));
}

#[test]
fn test_timeout() {
    let prolog = Prolog::with_config(EngineConfig {
        timeout_ms: 50,
        ..EngineConfig::default()
    });
    prolog
        .add_clause(clause!(call!("spin", []) => call!("spin", [])))
        .unwrap();
    let err = qerr(&prolog, call!("spin", []));
    let formal = err.formal().cloned().unwrap();
    assert_eq!(formal.name_arity().map(|(name, arity)| (name.0.clone(), arity)), Some(("system_error".to_string(), 1)));
}

#[test]
fn test_occurs_check_config() {
    let prolog = Prolog::with_config(EngineConfig {
        occurs_check: true,
        ..EngineConfig::default()
    });
    assert!(qnull(&prolog, call!("=", [var!("X"), call!("f", [var!("X")])])));
    let prolog = prolog_without_occurs_check();
    assert!(qeval(&prolog, call!("=", [var!("X"), call!("f", [var!("Y")])])));
}

fn prolog_without_occurs_check() -> Prolog {
    Prolog::with_config(EngineConfig::default())
}

#[test]
fn test_halt_ends_query() {
    let prolog = prolog(member());
    let goal = call!(",", [call!("member", [var!("X"), list![1, 2, 3]]), "halt"]);
    assert!(qnull(&prolog, goal));
}
