use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::compile::{compile, Block};
use super::constants::{CLAUSE, CONJUNCTION, INDICATOR, TRUE};
use super::error::{PrologResult, RuntimeError};
use super::terms::*;

/// A predicate indicator, `name/arity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Indicator {
    pub name: Symbol,
    pub arity: usize,
}

impl Indicator {
    pub fn new(name: &str, arity: usize) -> Self {
        Self {
            name: Symbol::new(name),
            arity,
        }
    }

    /// The indicator of a callable term.
    pub fn of(term: &Term) -> Option<Self> {
        term.name_arity().map(|(name, arity)| Self {
            name: name.clone(),
            arity,
        })
    }

    pub fn to_term(&self) -> Term {
        Term::compound(
            INDICATOR,
            vec![Term::from(self.name.clone()), Term::integer(self.arity as i64)],
        )
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// Build the right-nested conjunction of `goals`; `true` when empty.
pub fn conjunction(goals: Vec<Term>) -> Term {
    goals
        .into_iter()
        .rev()
        .reduce(|rest, goal| Term::compound(CONJUNCTION, vec![goal, rest]))
        .unwrap_or_else(|| Term::atom(TRUE))
}

/// A clause as written: a head and a body goal. Facts have body `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub head: Term,
    pub body: Term,
}

impl Clause {
    pub fn new(head: Term, body: Term) -> Self {
        Self { head, body }
    }

    pub fn fact(head: Term) -> Self {
        Self::new(head, Term::atom(TRUE))
    }

    /// Split a `Head :- Body` term, or treat the term as a fact.
    pub fn from_term(term: &Term) -> Self {
        match term.value() {
            Value::Compound(Compound { name, args }) if name.0 == CLAUSE && args.len() == 2 => {
                Self::new(args[0].clone(), args[1].clone())
            }
            _ => Self::fact(term.clone()),
        }
    }

    pub fn is_fact(&self) -> bool {
        matches!(self.body.as_atom(), Some(name) if name.0 == TRUE)
    }

    pub fn to_term(&self) -> Term {
        Term::compound(CLAUSE, vec![self.head.clone(), self.body.clone()])
    }

    /// The indicator of the head. Fails for heads that are not callable.
    pub fn indicator(&self) -> PrologResult<Indicator> {
        match self.head.value() {
            Value::Variable(_) => Err(RuntimeError::Instantiation.into()),
            _ => Indicator::of(&self.head)
                .ok_or_else(|| RuntimeError::type_error("callable", self.head.clone()).into()),
        }
    }
}

/// First-argument key used to skip clauses that cannot match a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Atomic(Value),
    Functor(Symbol, usize),
}

impl Key {
    fn of(term: &Term) -> Option<Self> {
        match term.value() {
            Value::Variable(_) => None,
            Value::Compound(Compound { name, args }) => Some(Key::Functor(name.clone(), args.len())),
            atomic => Some(Key::Atomic(atomic.clone())),
        }
    }
}

/// A stored clause: the clause with its body compiled once up front.
#[derive(Debug)]
pub struct Rule {
    pub id: u64,
    pub clause: Clause,
    pub body: Block,
    key: Option<Key>,
}

impl Rule {
    pub fn new(id: u64, clause: Clause) -> PrologResult<Self> {
        clause.indicator()?;
        let body = compile(&clause.body)?;
        let key = clause.head.args().first().and_then(Key::of);
        Ok(Self {
            id,
            clause,
            body,
            key,
        })
    }

    pub fn head(&self) -> &Term {
        &self.clause.head
    }
}

pub type Rules = Vec<Arc<Rule>>;

/// All clauses of one predicate, in database order.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub indicator: Indicator,
    pub rules: Rules,
    pub dynamic: bool,
}

impl Predicate {
    pub fn new(indicator: Indicator, dynamic: bool) -> Self {
        Self {
            indicator,
            rules: vec![],
            dynamic,
        }
    }

    pub fn add_rule(&mut self, rule: Arc<Rule>, front: bool) {
        if front {
            self.rules.insert(0, rule);
        } else {
            self.rules.push(rule);
        }
    }

    /// Remove the rule with `id`. Returns whether it was present.
    pub fn remove_rule(&mut self, id: u64) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id != id);
        self.rules.len() != before
    }

    /// The rules whose first argument could match the call's first argument,
    /// in order. `first_arg` must already be dereferenced.
    pub fn applicable_rules(&self, first_arg: Option<&Term>) -> Rules {
        match first_arg.and_then(Key::of) {
            None => self.rules.clone(),
            Some(key) => self
                .rules
                .iter()
                .filter(|rule| rule.key.as_ref().map_or(true, |k| *k == key))
                .cloned()
                .collect(),
        }
    }
}
