use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::constants::{CONS, NIL};
use super::counter::next_variable_id;
pub use super::numerics::Numeric;
use super::visitor::{walk_term, Visitor};

pub type TermList = Vec<Term>;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A logic variable.
///
/// `id == 0` marks a source variable: the name is its identity and it is only
/// meaningful inside the clause or query it was written in. Activation in a
/// [`LocalContext`](crate::context::LocalContext) replaces it with a variable
/// carrying a process-unique id. Field order matters: the derived `Ord` sorts
/// activated variables by age.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Variable {
    pub id: u64,
    pub name: Symbol,
}

impl Variable {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: Symbol::new(name),
        }
    }

    /// A variable with a fresh id, keeping `name` for display.
    pub fn fresh(name: Symbol) -> Self {
        Self {
            id: next_variable_id(),
            name,
        }
    }

    pub fn is_source(&self) -> bool {
        self.id == 0
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.0 == "_"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct Compound {
    pub name: Symbol,
    pub args: TermList,
}

impl Compound {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Variable(Variable),
    Number(Numeric),
    Atom(Symbol),
    String(String),
    Compound(Compound),
}

impl Value {
    /// Position of the variant in the standard order of terms.
    fn rank(&self) -> u8 {
        match self {
            Value::Variable(_) => 0,
            Value::Number(_) => 1,
            Value::Atom(_) => 2,
            Value::String(_) => 3,
            Value::Compound(_) => 4,
        }
    }
}

// Equality, hashing and ordering walk compounds with an explicit stack, so
// long lists are handled in constant host stack.

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((left, right)) = stack.pop() {
            match (left, right) {
                (Value::Variable(l), Value::Variable(r)) if l == r => {}
                (Value::Number(l), Value::Number(r)) if l == r => {}
                (Value::Atom(l), Value::Atom(r)) if l == r => {}
                (Value::String(l), Value::String(r)) if l == r => {}
                (Value::Compound(l), Value::Compound(r)) => {
                    if l.name != r.name || l.args.len() != r.args.len() {
                        return false;
                    }
                    for (l, r) in l.args.iter().zip(&r.args) {
                        if !l.same_ref(r) {
                            stack.push((l.value(), r.value()));
                        }
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            value.rank().hash(state);
            match value {
                Value::Variable(v) => v.hash(state),
                Value::Number(n) => n.hash(state),
                Value::Atom(a) => a.hash(state),
                Value::String(s) => s.hash(state),
                Value::Compound(Compound { name, args }) => {
                    name.hash(state);
                    args.len().hash(state);
                    stack.extend(args.iter().rev().map(Term::value));
                }
            }
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut stack = vec![(self, other)];
        while let Some((left, right)) = stack.pop() {
            let ordering = match (left, right) {
                (Value::Variable(l), Value::Variable(r)) => l.cmp(r),
                (Value::Number(l), Value::Number(r)) => l.cmp(r),
                (Value::Atom(l), Value::Atom(r)) => l.cmp(r),
                (Value::String(l), Value::String(r)) => l.cmp(r),
                (Value::Compound(l), Value::Compound(r)) => {
                    let ordering = l.arity().cmp(&r.arity()).then_with(|| l.name.cmp(&r.name));
                    if ordering == Ordering::Equal {
                        // Reversed, so the leftmost pair is compared first.
                        for (l, r) in l.args.iter().zip(&r.args).rev() {
                            if !l.same_ref(r) {
                                stack.push((l.value(), r.value()));
                            }
                        }
                    }
                    ordering
                }
                (l, r) => l.rank().cmp(&r.rank()),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A term: a shared value plus its cached groundedness.
///
/// `ground` is computed once at construction from the structure of the value.
/// A term built without variables never acquires one, so the flag never flips
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Term {
    value: Arc<Value>,
    ground: bool,
}

// Take exclusively owned compounds apart one level at a time, so that
// dropping a long list does not recurse.
impl Drop for Term {
    fn drop(&mut self) {
        let mut pending = match Arc::get_mut(&mut self.value) {
            Some(Value::Compound(Compound { args, .. })) if !args.is_empty() => {
                std::mem::take(args)
            }
            _ => return,
        };
        while let Some(mut term) = pending.pop() {
            if let Some(Value::Compound(Compound { args, .. })) = Arc::get_mut(&mut term.value) {
                pending.append(args);
            }
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::new(value)
    }
}

impl From<Term> for Value {
    fn from(term: Term) -> Self {
        term.value().clone()
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value) || self.value == other.value
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.value().hash(state)
    }
}

/// The standard order of terms. Variables are compared as they stand, so
/// callers resolve both sides first.
impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.value, &other.value) {
            return Ordering::Equal;
        }
        self.value.cmp(&other.value)
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Term {
    pub fn new(value: Value) -> Self {
        let ground = match &value {
            Value::Variable(_) => false,
            Value::Compound(Compound { args, .. }) => args.iter().all(Term::is_ground),
            Value::Number(_) | Value::Atom(_) | Value::String(_) => true,
        };
        Self {
            value: Arc::new(value),
            ground,
        }
    }

    pub fn atom(name: &str) -> Self {
        Self::new(Value::Atom(Symbol::new(name)))
    }

    pub fn integer(i: i64) -> Self {
        Self::new(Value::Number(Numeric::Integer(i)))
    }

    pub fn float(f: f64) -> Self {
        Self::new(Value::Number(Numeric::Float(f)))
    }

    pub fn number(n: Numeric) -> Self {
        Self::new(Value::Number(n))
    }

    pub fn string(s: &str) -> Self {
        Self::new(Value::String(s.to_string()))
    }

    /// A source variable named `name`.
    pub fn var(name: &str) -> Self {
        Self::new(Value::Variable(Variable::new(name)))
    }

    /// A variable with a fresh id.
    pub fn fresh_var() -> Self {
        Self::new(Value::Variable(Variable::fresh(Symbol::new("_"))))
    }

    pub fn compound(name: &str, args: TermList) -> Self {
        if args.is_empty() {
            return Self::atom(name);
        }
        Self::new(Value::Compound(Compound {
            name: Symbol::new(name),
            args,
        }))
    }

    pub fn nil() -> Self {
        Self::atom(NIL)
    }

    pub fn cons(head: Term, tail: Term) -> Self {
        Self::compound(CONS, vec![head, tail])
    }

    pub fn list(items: TermList) -> Self {
        Self::list_with_tail(items, Self::nil())
    }

    pub fn list_with_tail(items: TermList, tail: Term) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |tail, head| Self::cons(head, tail))
    }

    /// Get a reference to the underlying data of this term
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_ground(&self) -> bool {
        self.ground
    }

    pub fn is_var(&self) -> bool {
        matches!(self.value(), Value::Variable(_))
    }

    pub fn is_atomic(&self) -> bool {
        matches!(
            self.value(),
            Value::Atom(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.value(), Value::Atom(_) | Value::Compound(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.value(), Value::Atom(Symbol(name)) if name == NIL)
    }

    pub fn as_var(&self) -> Option<&Variable> {
        match self.value() {
            Value::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Symbol> {
        match self.value() {
            Value::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value() {
            Value::Number(Numeric::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self.value() {
            Value::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// Split a `'.'/2` cell into head and tail.
    pub fn as_cons(&self) -> Option<(&Term, &Term)> {
        match self.value() {
            Value::Compound(Compound { name, args }) if name.0 == CONS && args.len() == 2 => {
                Some((&args[0], &args[1]))
            }
            _ => None,
        }
    }

    /// Name and arity of a callable term.
    pub fn name_arity(&self) -> Option<(&Symbol, usize)> {
        match self.value() {
            Value::Atom(name) => Some((name, 0)),
            Value::Compound(Compound { name, args }) => Some((name, args.len())),
            _ => None,
        }
    }

    /// Arguments of a callable term; empty for atoms.
    pub fn args(&self) -> &[Term] {
        match self.value() {
            Value::Compound(Compound { args, .. }) => args,
            _ => &[],
        }
    }

    /// Does `self` share its value allocation with `other`?
    pub fn same_ref(&self, other: &Term) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Get the variables of a term, in order of first occurrence, without
    /// duplicates.
    pub fn variables(&self) -> Vec<Variable> {
        struct VariableVisitor {
            seen: HashSet<Variable>,
            vars: Vec<Variable>,
        }

        impl Visitor for VariableVisitor {
            fn visit_variable(&mut self, v: &Variable) {
                if self.seen.insert(v.clone()) {
                    self.vars.push(v.clone());
                }
            }
        }

        let mut visitor = VariableVisitor {
            seen: HashSet::new(),
            vars: vec![],
        };
        walk_term(&mut visitor, self);
        visitor.vars
    }

    /// Does the given variable occur in this term?
    /// Should be much faster than accumulating the set and checking.
    pub fn contains_variable(&self, var: &Variable) -> bool {
        struct VariableChecker<'var> {
            var: &'var Variable,
            occurs: bool,
        }

        impl<'var> Visitor for VariableChecker<'var> {
            fn visit_variable(&mut self, v: &Variable) {
                if !self.occurs && *v == *self.var {
                    self.occurs = true;
                }
            }

            fn enter_term(&mut self, t: &Term) -> bool {
                // Don't bother descending once we've found an occurrence.
                !self.occurs && !t.is_ground()
            }
        }

        let mut visitor = VariableChecker { var, occurs: false };
        visitor.visit_term(self);
        visitor.occurs
    }
}

impl From<i64> for Term {
    fn from(other: i64) -> Self {
        Term::integer(other)
    }
}

impl From<f64> for Term {
    fn from(other: f64) -> Self {
        Term::float(other)
    }
}

impl From<Symbol> for Term {
    fn from(other: Symbol) -> Self {
        Term::new(Value::Atom(other))
    }
}

impl From<Variable> for Term {
    fn from(other: Variable) -> Self {
        Term::new(Value::Variable(other))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_value_hash() {
        let mut table = HashMap::new();
        table.insert(value!(0), "0");
        table.insert(value!(1), "1");
        table.insert(value!("one"), "one");
        table.insert(value!(1.0), "1.0");
        assert_eq!(*table.get(&value!(0)).unwrap(), "0");
        assert_eq!(*table.get(&value!(1)).unwrap(), "1");
        assert_eq!(*table.get(&value!(1.0)).unwrap(), "1.0");
        assert_eq!(*table.get(&value!("one")).unwrap(), "one");
    }

    #[test]
    fn test_groundness_is_cached_structurally() {
        assert!(term!(call!("f", [1, "a"])).is_ground());
        assert!(!term!(call!("f", [1, var!("X")])).is_ground());
        assert!(Term::list(vec![term!(1), term!(2)]).is_ground());
        assert!(!Term::list_with_tail(vec![term!(1)], var!("T")).is_ground());
    }

    #[test]
    fn test_standard_order_ranks() {
        let mut terms = vec![
            term!(call!("f", [1])),
            Term::string("s"),
            term!("a"),
            term!(1),
            var!("X"),
        ];
        terms.sort();
        assert_eq!(
            terms,
            vec![
                var!("X"),
                term!(1),
                term!("a"),
                Term::string("s"),
                term!(call!("f", [1]))
            ]
        );
    }

    #[test]
    fn test_compound_order_arity_then_name_then_args() {
        assert!(term!(call!("z", [1])) < term!(call!("a", [1, 1])));
        assert!(term!(call!("a", [2])) < term!(call!("b", [1])));
        assert!(term!(call!("f", [1, 2])) < term!(call!("f", [1, 3])));
        assert_eq!(
            term!(call!("f", [1, 2])).cmp(&term!(call!("f", [1, 2]))),
            Ordering::Equal
        );
    }

    #[test]
    fn test_variables_first_occurrence() {
        let t = term!(call!("f", [var!("B"), var!("A"), var!("B")]));
        let names: Vec<String> = t.variables().into_iter().map(|v| v.name.0).collect();
        assert_eq!(names, vec!["B".to_string(), "A".to_string()]);
        assert!(t.contains_variable(&Variable::new("A")));
        assert!(!t.contains_variable(&Variable::new("C")));
    }

    fn long_list(n: i64) -> Term {
        Term::list((0..n).map(Term::integer).collect())
    }

    #[test]
    fn test_long_lists_drop_and_compare() {
        drop(long_list(100_000));

        let (a, b) = (long_list(100_000), long_list(100_000));
        assert!(!a.same_ref(&b));
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);

        let mut hashes = HashSet::new();
        hashes.insert(a.clone());
        assert!(hashes.contains(&b));

        let c = Term::list_with_tail((0..99_999).map(Term::integer).collect(), list!(7));
        assert_ne!(a, c);
        assert!(c < a);
        assert!(a > c);
    }

    #[test]
    fn test_long_list_variables() {
        let vars: Vec<Term> = (0..100_000).map(|_| Term::fresh_var()).collect();
        let list = Term::list(vars.clone());
        assert_eq!(list.variables().len(), 100_000);
        assert!(list.contains_variable(vars[99_999].as_var().unwrap()));
    }

    #[test]
    fn test_list_construction() {
        let list = Term::list(vec![term!(1), term!(2)]);
        let (head, tail) = list.as_cons().unwrap();
        assert_eq!(head, &term!(1));
        let (head, tail) = tail.as_cons().unwrap();
        assert_eq!(head, &term!(2));
        assert!(tail.is_nil());
    }
}
