/// Manage binding state in the machine.
///
/// Bindings associate activated variables with terms. Every binding is
/// recorded on a trail so that it can be undone on backtracking.
use std::collections::HashMap;

use tracing::trace;

use crate::folder::{Folder, Step};
use crate::terms::{Symbol, Term, Value, Variable};

pub type Bindings = HashMap<Symbol, Term>;

/// Binding stack pointer: the depth of the trail.
pub type Bsp = usize;

/// Shape of a list after dereferencing its spine.
#[derive(Debug, Clone, PartialEq)]
pub enum ListShape {
    /// `[a, b, c]`
    Proper(Vec<Term>),
    /// `[a, b|T]` with `T` unbound.
    Partial(Vec<Term>, Term),
    /// Anything else; carries the offending tail.
    Improper(Term),
}

/// The `BindingManager` maintains associations between variables and values.
///
/// A variable may be bound to any term, including another variable. Bindings
/// are never changed in place: a bound variable stays bound until the trail
/// is unwound past the point where it was bound.
#[derive(Clone, Debug, Default)]
pub struct BindingManager {
    bindings: HashMap<Variable, Term>,
    trail: Vec<Variable>,
}

// Public interface.
impl BindingManager {
    pub fn new() -> Self {
        Self::default()
    }

    // **** State Mutation ***

    /// Bind the unbound variable `var` to `value` and record it on the trail.
    pub fn bind(&mut self, var: &Variable, value: Term) {
        trace!(var = %var, value = %value, "bind");
        self.bindings.insert(var.clone(), value);
        self.trail.push(var.clone());
    }

    /// Reset the state of `BindingManager` to what it was at `to`. Bindings
    /// are undone most recent first.
    pub fn backtrack(&mut self, to: Bsp) {
        while self.trail.len() > to {
            if let Some(var) = self.trail.pop() {
                self.bindings.remove(&var);
            }
        }
    }

    /// Retrieve an opaque value representing the current state of `BindingManager`.
    /// Can be used to reset state with `backtrack`.
    pub fn bsp(&self) -> Bsp {
        self.trail.len()
    }

    // *** Binding Inspection ***

    pub fn value(&self, var: &Variable) -> Option<&Term> {
        self.bindings.get(var)
    }

    pub fn is_bound(&self, var: &Variable) -> bool {
        self.bindings.contains_key(var)
    }

    /// Follow a chain of variable bindings at the top level of `term`.
    pub fn deref(&self, term: &Term) -> Term {
        let mut current = term;
        while let Value::Variable(v) = current.value() {
            match self.bindings.get(v) {
                Some(value) => current = value,
                None => break,
            }
        }
        current.clone()
    }

    /// Dereference all variables in `term`, including within nested
    /// compounds. A ground term is returned as is, without being walked.
    pub fn resolve(&self, term: &Term) -> Term {
        if term.is_ground() {
            return term.clone();
        }
        Resolver { bindings: self }.fold_term(term.clone())
    }

    /// Unify `left` with `right`, binding variables as needed.
    ///
    /// Returns `false` on a mismatch. Bindings made before the mismatch
    /// stay on the trail; undoing them is the caller's job.
    pub fn unify(&mut self, left: &Term, right: &Term, occurs_check: bool) -> bool {
        let mut stack = vec![(left.clone(), right.clone())];
        while let Some((left, right)) = stack.pop() {
            let left = self.deref(&left);
            let right = self.deref(&right);
            if left.same_ref(&right) {
                continue;
            }
            match (left.value(), right.value()) {
                (Value::Variable(l), Value::Variable(r)) => {
                    if l == r {
                        continue;
                    }
                    // The younger variable points at the older one.
                    if l < r {
                        self.bind(r, left.clone());
                    } else {
                        self.bind(l, right.clone());
                    }
                }
                (Value::Variable(var), _) => {
                    if occurs_check && self.occurs(var, &right) {
                        return false;
                    }
                    self.bind(var, right.clone());
                }
                (_, Value::Variable(var)) => {
                    if occurs_check && self.occurs(var, &left) {
                        return false;
                    }
                    self.bind(var, left.clone());
                }
                (Value::Compound(l), Value::Compound(r)) => {
                    if l.name != r.name || l.args.len() != r.args.len() {
                        return false;
                    }
                    // Pushed in reverse so that arguments unify left to right.
                    for (l, r) in l.args.iter().zip(r.args.iter()).rev() {
                        stack.push((l.clone(), r.clone()));
                    }
                }
                (Value::Number(l), Value::Number(r)) if l == r => {}
                (Value::Atom(l), Value::Atom(r)) if l == r => {}
                (Value::String(l), Value::String(r)) if l == r => {}
                _ => return false,
            }
        }
        true
    }

    /// Does `var` occur in `term` once bindings are followed?
    pub fn occurs(&self, var: &Variable, term: &Term) -> bool {
        let mut stack = vec![term.clone()];
        while let Some(term) = stack.pop() {
            if term.is_ground() {
                continue;
            }
            let term = self.deref(&term);
            match term.value() {
                Value::Variable(v) if v == var => return true,
                Value::Compound(c) => stack.extend(c.args.iter().cloned()),
                _ => {}
            }
        }
        false
    }

    /// A copy of `term` with its unbound variables renamed to fresh ones.
    /// Variables shared inside `term` stay shared in the copy.
    pub fn copy_term(&self, term: &Term) -> Term {
        let resolved = self.resolve(term);
        if resolved.is_ground() {
            return resolved;
        }
        let mut renamer = Renamer {
            renamed: HashMap::new(),
        };
        renamer.fold_term(resolved)
    }

    /// Are `left` and `right` equal up to a consistent renaming of variables?
    pub fn variant(&self, left: &Term, right: &Term) -> bool {
        let mut forward: HashMap<Variable, Variable> = HashMap::new();
        let mut backward: HashMap<Variable, Variable> = HashMap::new();
        let mut stack = vec![(left.clone(), right.clone())];
        while let Some((left, right)) = stack.pop() {
            let left = self.deref(&left);
            let right = self.deref(&right);
            match (left.value(), right.value()) {
                (Value::Variable(l), Value::Variable(r)) => {
                    let l_ok = *forward.entry(l.clone()).or_insert_with(|| r.clone()) == *r;
                    let r_ok = *backward.entry(r.clone()).or_insert_with(|| l.clone()) == *l;
                    if !(l_ok && r_ok) {
                        return false;
                    }
                }
                (Value::Compound(l), Value::Compound(r)) => {
                    if l.name != r.name || l.args.len() != r.args.len() {
                        return false;
                    }
                    for (l, r) in l.args.iter().zip(r.args.iter()) {
                        stack.push((l.clone(), r.clone()));
                    }
                }
                (Value::Variable(_), _) | (_, Value::Variable(_)) => return false,
                _ if left == right => {}
                _ => return false,
            }
        }
        true
    }

    /// Walk the spine of a list, following bindings.
    pub fn list_shape(&self, term: &Term) -> ListShape {
        let mut items = vec![];
        let mut rest = self.deref(term);
        loop {
            if rest.is_nil() {
                return ListShape::Proper(items);
            }
            if rest.is_var() {
                return ListShape::Partial(items, rest);
            }
            let next = match rest.as_cons() {
                Some((head, tail)) => {
                    items.push(head.clone());
                    self.deref(tail)
                }
                None => return ListShape::Improper(rest),
            };
            rest = next;
        }
    }
}

struct Resolver<'a> {
    bindings: &'a BindingManager,
}

impl<'a> Folder for Resolver<'a> {
    fn enter_term(&mut self, t: Term) -> Step {
        if t.is_ground() {
            return Step::Done(t);
        }
        let t = self.bindings.deref(&t);
        if t.is_ground() || t.is_var() {
            Step::Done(t)
        } else {
            Step::Descend(t)
        }
    }
}

struct Renamer {
    renamed: HashMap<Variable, Variable>,
}

impl Folder for Renamer {
    fn enter_term(&mut self, t: Term) -> Step {
        if t.is_ground() {
            Step::Done(t)
        } else {
            Step::Descend(t)
        }
    }

    fn fold_variable(&mut self, v: Variable) -> Variable {
        self.renamed
            .entry(v.clone())
            .or_insert_with(|| Variable::fresh(v.name))
            .clone()
    }
}
