/// Helper macros to build terms and clauses without a reader.
///
/// `&str` converts to an atom, integers and floats to numbers. Variables are
/// written with `var!`, strings with `Term::string`.
use crate::terms::*;

#[macro_export]
macro_rules! value {
    ($arg:expr) => {
        $crate::macros::TestHelper::<$crate::terms::Value>::from($arg).0
    };
}

#[macro_export]
macro_rules! values {
    ($($args:expr),*) => {
        vec![$($crate::value!($args)),*]
    };
}

#[macro_export]
macro_rules! term {
    ($($expr:tt)*) => {
        $crate::macros::TestHelper::<$crate::terms::Term>::from($crate::value!($($expr)*)).0
    };
}

#[macro_export]
macro_rules! sym {
    ($arg:expr) => {
        $crate::macros::TestHelper::<$crate::terms::Symbol>::from($arg).0
    };
}

/// A source variable.
#[macro_export]
macro_rules! var {
    ($arg:expr) => {
        $crate::terms::Term::var($arg)
    };
}

/// A compound term (or an atom when there are no arguments).
#[macro_export]
macro_rules! call {
    ($name:expr) => {
        $crate::terms::Term::atom($name)
    };
    ($name:expr, [$($args:expr),* $(,)?]) => {
        $crate::terms::Term::compound($name, vec![$($crate::term!($args)),*])
    };
}

#[macro_export]
macro_rules! list {
    ($($items:expr),* $(,)?) => {
        $crate::terms::Term::list(vec![$($crate::term!($items)),*])
    };
}

/// A list with an explicit tail, `[a, b | T]`.
#[macro_export]
macro_rules! partial_list {
    ([$($items:expr),* $(,)?], $tail:expr) => {
        $crate::terms::Term::list_with_tail(vec![$($crate::term!($items)),*], $crate::term!($tail))
    };
}

/// `clause!(head)` builds a fact, `clause!(head => g1, g2)` a rule whose
/// body is the conjunction of the goals.
#[macro_export]
macro_rules! clause {
    ($head:expr => $($body:expr),+ $(,)?) => {
        $crate::rules::Clause::new(
            $crate::term!($head),
            $crate::rules::conjunction(vec![$($crate::term!($body)),+]),
        )
    };
    ($head:expr) => {
        $crate::rules::Clause::fact($crate::term!($head))
    };
}

/// Special struct which is way more eager at implementing `From`
/// for a bunch of things, so that in the macros we can use `TestHelper<Term>::from`
/// and try and convert things as often as possible.
pub struct TestHelper<T>(pub T);

impl<T> From<T> for TestHelper<T> {
    fn from(other: T) -> Self {
        Self(other)
    }
}

impl From<Value> for TestHelper<Term> {
    fn from(other: Value) -> Self {
        Self(Term::from(other))
    }
}

impl<S: AsRef<str>> From<S> for TestHelper<Symbol> {
    fn from(other: S) -> Self {
        Self(Symbol(other.as_ref().to_string()))
    }
}

impl From<i64> for TestHelper<Value> {
    fn from(other: i64) -> Self {
        Self(Value::Number(other.into()))
    }
}

impl From<f64> for TestHelper<Value> {
    fn from(other: f64) -> Self {
        Self(Value::Number(other.into()))
    }
}

impl From<&str> for TestHelper<Value> {
    fn from(other: &str) -> Self {
        Self(Value::Atom(Symbol::new(other)))
    }
}

impl From<Symbol> for TestHelper<Value> {
    fn from(other: Symbol) -> Self {
        Self(Value::Atom(other))
    }
}

impl From<Variable> for TestHelper<Value> {
    fn from(other: Variable) -> Self {
        Self(Value::Variable(other))
    }
}

impl From<Term> for TestHelper<Value> {
    fn from(other: Term) -> Self {
        Self(other.value().clone())
    }
}

impl From<Compound> for TestHelper<Value> {
    fn from(other: Compound) -> Self {
        Self(Value::Compound(other))
    }
}

impl<'a, T> From<&'a T> for TestHelper<Value>
where
    T: Clone + Into<TestHelper<Value>>,
{
    fn from(other: &'a T) -> Self {
        other.clone().into()
    }
}
