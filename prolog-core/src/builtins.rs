//! The builtin predicate table and the builtins that are not control
//! constructs, aggregation or arithmetic.
use std::cmp::Ordering;
use std::fmt;

use crate::aggregate;
use crate::arithmetic;
use crate::bindings::ListShape;
use crate::constants::*;
use crate::context::LocalContext;
use crate::control;
use crate::error::{PrologResult, RuntimeError};
use crate::folder::{Folder, Step};
use crate::kb::Definition;
use crate::rules::{Clause, Indicator, Rules};
use crate::terms::*;
use crate::vm::{Alternative, Machine};

/// A builtin gets the call's arguments. `Ok(false)` means the call fails;
/// `Ok(true)` means it succeeded or has pushed the work still to do.
pub type BuiltinFn = fn(&mut Machine, &[Term]) -> PrologResult<bool>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub run: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Builtin({}/{})", self.name, self.arity)
    }
}

const fn builtin(name: &'static str, arity: usize, run: BuiltinFn) -> Builtin {
    Builtin { name, arity, run }
}

/// Every builtin predicate. Each knowledge base registers these once.
pub static BUILTINS: &[Builtin] = &[
    // Control.
    builtin("true", 0, control::succeed),
    builtin("otherwise", 0, control::succeed),
    builtin("fail", 0, control::fail),
    builtin("false", 0, control::fail),
    builtin("!", 0, control::cut),
    builtin(",", 2, control::conjunction),
    builtin(";", 2, control::disjunction),
    builtin("->", 2, control::if_then),
    builtin("*->", 2, control::soft_if_then),
    builtin("\\+", 1, control::not_provable),
    builtin("not", 1, control::not_provable),
    builtin("call", 1, control::call),
    builtin("call", 2, control::call),
    builtin("call", 3, control::call),
    builtin("call", 4, control::call),
    builtin("call", 5, control::call),
    builtin("call", 6, control::call),
    builtin("call", 7, control::call),
    builtin("call", 8, control::call),
    builtin("once", 1, control::once),
    builtin("ignore", 1, control::ignore),
    builtin("catch", 3, control::catch),
    builtin("throw", 1, control::throw),
    builtin("forall", 2, control::forall),
    builtin("halt", 0, control::halt),
    builtin("repeat", 0, control::repeat),
    // Solution collection.
    builtin("findall", 3, aggregate::findall),
    builtin("findall", 4, aggregate::findall_tail),
    builtin("bagof", 3, aggregate::bagof),
    builtin("setof", 3, aggregate::setof),
    builtin("^", 2, aggregate::existential),
    builtin("aggregate_all", 3, aggregate::aggregate_all),
    // Unification and comparison.
    builtin("=", 2, unify),
    builtin("\\=", 2, not_unifiable),
    builtin("unify_with_occurs_check", 2, unify_with_occurs_check),
    builtin("==", 2, identical),
    builtin("\\==", 2, not_identical),
    builtin("@<", 2, term_less),
    builtin("@>", 2, term_greater),
    builtin("@=<", 2, term_less_or_equal),
    builtin("@>=", 2, term_greater_or_equal),
    builtin("compare", 3, compare),
    // Type checks.
    builtin("var", 1, is_var),
    builtin("nonvar", 1, is_nonvar),
    builtin("atom", 1, is_atom),
    builtin("number", 1, is_number),
    builtin("integer", 1, is_integer),
    builtin("float", 1, is_float),
    builtin("atomic", 1, is_atomic),
    builtin("compound", 1, is_compound),
    builtin("callable", 1, is_callable),
    builtin("is_list", 1, is_list),
    builtin("ground", 1, is_ground),
    builtin("string", 1, is_string),
    // Term construction.
    builtin("functor", 3, functor),
    builtin("arg", 3, arg),
    builtin("=..", 2, univ),
    builtin("copy_term", 2, copy_term),
    // Arithmetic.
    builtin("is", 2, arithmetic::is),
    builtin("=:=", 2, arithmetic::equal),
    builtin("=\\=", 2, arithmetic::not_equal),
    builtin("<", 2, arithmetic::less),
    builtin(">", 2, arithmetic::greater),
    builtin("=<", 2, arithmetic::less_or_equal),
    builtin(">=", 2, arithmetic::greater_or_equal),
    builtin("succ", 2, arithmetic::succ),
    builtin("between", 3, arithmetic::between),
    // Lists.
    builtin("length", 2, length),
    builtin("msort", 2, msort),
    builtin("sort", 2, sort),
    // Database.
    builtin("asserta", 1, asserta),
    builtin("assertz", 1, assertz),
    builtin("assert", 1, assertz),
    builtin("retract", 1, retract),
    builtin("clause", 2, clause),
    builtin("abolish", 1, abolish),
    builtin("dynamic", 1, dynamic),
];

// Unification and comparison.

fn unify(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.unify(&args[0], &args[1]))
}

fn not_unifiable(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let bsp = m.bindings.bsp();
    let unified = m.unify(&args[0], &args[1]);
    m.bindings.backtrack(bsp);
    Ok(!unified)
}

fn unify_with_occurs_check(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.bindings.unify(&args[0], &args[1], true))
}

/// Compare two terms in the standard order.
fn standard_order(m: &Machine, args: &[Term]) -> Ordering {
    m.resolve(&args[0]).cmp(&m.resolve(&args[1]))
}

fn identical(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) == Ordering::Equal)
}

fn not_identical(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) != Ordering::Equal)
}

fn term_less(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) == Ordering::Less)
}

fn term_greater(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) == Ordering::Greater)
}

fn term_less_or_equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) != Ordering::Greater)
}

fn term_greater_or_equal(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(standard_order(m, args) != Ordering::Less)
}

/// `compare(Order, Left, Right)`.
fn compare(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let order = m.deref(&args[0]);
    match order.value() {
        Value::Variable(_) => {}
        Value::Atom(name) if ["<", "=", ">"].contains(&name.as_str()) => {}
        Value::Atom(_) => return Err(RuntimeError::domain_error("order", order.clone()).into()),
        _ => return Err(RuntimeError::type_error("atom", order.clone()).into()),
    }
    let result = match standard_order(m, &args[1..]) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    Ok(m.unify(&order, &Term::atom(result)))
}

// Type checks.

fn is_var(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).is_var())
}

fn is_nonvar(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(!m.deref(&args[0]).is_var())
}

fn is_atom(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).as_atom().is_some())
}

fn is_number(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(m.deref(&args[0]).value(), Value::Number(_)))
}

fn is_integer(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).as_integer().is_some())
}

fn is_float(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(
        m.deref(&args[0]).value(),
        Value::Number(Numeric::Float(_))
    ))
}

fn is_atomic(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).is_atomic())
}

fn is_compound(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).as_compound().is_some())
}

fn is_callable(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.deref(&args[0]).is_callable())
}

fn is_list(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(
        m.bindings.list_shape(&args[0]),
        ListShape::Proper(_)
    ))
}

fn is_ground(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(m.resolve(&args[0]).is_ground())
}

fn is_string(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    Ok(matches!(m.deref(&args[0]).value(), Value::String(_)))
}

// Term construction.

/// An integer argument that must be bound.
fn integer_arg(m: &Machine, term: &Term) -> PrologResult<i64> {
    let term = m.deref(term);
    match term.value() {
        Value::Variable(_) => Err(RuntimeError::Instantiation.into()),
        Value::Number(Numeric::Integer(i)) => Ok(*i),
        _ => Err(RuntimeError::type_error("integer", term.clone()).into()),
    }
}

fn fresh_args(arity: usize) -> Vec<Term> {
    (0..arity).map(|_| Term::fresh_var()).collect()
}

/// `functor(Term, Name, Arity)`.
fn functor(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let term = m.deref(&args[0]);
    match term.value() {
        Value::Variable(_) => {}
        Value::Compound(Compound { name, args: term_args }) => {
            let name = Term::from(name.clone());
            let arity = Term::integer(term_args.len() as i64);
            return Ok(m.unify(&args[1], &name) && m.unify(&args[2], &arity));
        }
        _ => {
            return Ok(m.unify(&args[1], &term) && m.unify(&args[2], &Term::integer(0)));
        }
    }

    let name = m.deref(&args[1]);
    let arity = integer_arg(m, &args[2])?;
    if name.is_var() {
        return Err(RuntimeError::Instantiation.into());
    }
    if arity < 0 {
        return Err(RuntimeError::domain_error("not_less_than_zero", Term::integer(arity)).into());
    }
    if arity as usize > MAX_ARITY {
        return Err(RuntimeError::representation_error("max_arity").into());
    }
    let built = match (name.value(), arity) {
        (Value::Compound(_), _) => {
            return Err(RuntimeError::type_error("atomic", name.clone()).into())
        }
        (_, 0) => name.clone(),
        (Value::Atom(atom), _) => Term::compound(atom.as_str(), fresh_args(arity as usize)),
        _ => return Err(RuntimeError::type_error("atom", name.clone()).into()),
    };
    Ok(m.unify(&term, &built))
}

/// `arg(N, Term, Arg)`.
fn arg(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let n = integer_arg(m, &args[0])?;
    let term = m.deref(&args[1]);
    let compound = match term.value() {
        Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
        Value::Compound(compound) => compound,
        _ => return Err(RuntimeError::type_error("compound", term.clone()).into()),
    };
    if n < 0 {
        return Err(RuntimeError::domain_error("not_less_than_zero", Term::integer(n)).into());
    }
    match (n as usize).checked_sub(1).and_then(|i| compound.args.get(i)) {
        Some(value) => {
            let value = value.clone();
            Ok(m.unify(&args[2], &value))
        }
        None => Ok(false),
    }
}

/// `Term =.. List`.
fn univ(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let term = m.deref(&args[0]);
    match term.value() {
        Value::Variable(_) => {}
        Value::Compound(Compound { name, args: term_args }) => {
            let mut items = vec![Term::from(name.clone())];
            items.extend(term_args.iter().cloned());
            return Ok(m.unify(&args[1], &Term::list(items)));
        }
        _ => return Ok(m.unify(&args[1], &Term::list(vec![term.clone()]))),
    }

    let items = match m.bindings.list_shape(&args[1]) {
        ListShape::Proper(items) => items,
        ListShape::Partial(..) => return Err(RuntimeError::Instantiation.into()),
        ListShape::Improper(_) => {
            return Err(RuntimeError::type_error("list", m.resolve(&args[1])).into())
        }
    };
    let (head, rest) = match items.split_first() {
        Some((head, rest)) => (m.deref(head), rest),
        None => return Err(RuntimeError::domain_error("non_empty_list", Term::nil()).into()),
    };
    if rest.len() > MAX_ARITY {
        return Err(RuntimeError::representation_error("max_arity").into());
    }
    let built = match (head.value(), rest.is_empty()) {
        (Value::Variable(_), _) => return Err(RuntimeError::Instantiation.into()),
        (Value::Compound(_), _) => {
            return Err(RuntimeError::type_error("atomic", head.clone()).into())
        }
        (_, true) => head.clone(),
        (Value::Atom(name), false) => Term::compound(name.as_str(), rest.to_vec()),
        (_, false) => return Err(RuntimeError::type_error("atom", head.clone()).into()),
    };
    Ok(m.unify(&term, &built))
}

fn copy_term(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let copy = m.bindings.copy_term(&args[0]);
    Ok(m.unify(&args[1], &copy))
}

// Lists.

/// `length(List, Length)` for a proper list, or for a partial list with a
/// known length. Extending a partial list by more than the stack limit is a
/// resource error.
fn length(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let n = m.deref(&args[1]);
    let wanted = match n.value() {
        Value::Variable(_) => None,
        Value::Number(Numeric::Integer(i)) if *i < 0 => {
            return Err(RuntimeError::domain_error("not_less_than_zero", n.clone()).into())
        }
        Value::Number(Numeric::Integer(i)) => Some(*i as usize),
        _ => return Err(RuntimeError::type_error("integer", n.clone()).into()),
    };
    match (m.bindings.list_shape(&args[0]), wanted) {
        (ListShape::Proper(items), _) => Ok(m.unify(&n, &Term::integer(items.len() as i64))),
        (ListShape::Partial(items, tail), Some(wanted)) => {
            if wanted < items.len() {
                return Ok(false);
            }
            let missing = wanted - items.len();
            if missing > m.config.stack_limit {
                return Err(RuntimeError::resource_error("memory").into());
            }
            let rest = Term::list(fresh_args(missing));
            Ok(m.unify(&tail, &rest))
        }
        (ListShape::Partial(..), None) => Err(RuntimeError::Instantiation.into()),
        (ListShape::Improper(_), _) => Ok(false),
    }
}

/// The resolved items of a proper list.
fn proper_list(m: &Machine, list: &Term) -> PrologResult<Vec<Term>> {
    match m.bindings.list_shape(list) {
        ListShape::Proper(items) => Ok(items.iter().map(|item| m.resolve(item)).collect()),
        ListShape::Partial(..) => Err(RuntimeError::Instantiation.into()),
        ListShape::Improper(_) => Err(RuntimeError::type_error("list", m.resolve(list)).into()),
    }
}

/// `msort(List, Sorted)`: standard order, duplicates kept.
fn msort(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let mut items = proper_list(m, &args[0])?;
    items.sort();
    Ok(m.unify(&args[1], &Term::list(items)))
}

/// `sort(List, Sorted)`: standard order, duplicates removed.
fn sort(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let mut items = proper_list(m, &args[0])?;
    items.sort();
    items.dedup();
    Ok(m.unify(&args[1], &Term::list(items)))
}

// Database.

/// Turns the variables of a resolved term back into source variables, so
/// that a stored clause gets fresh variables at each activation.
struct Generalizer;

impl Folder for Generalizer {
    fn enter_term(&mut self, t: Term) -> Step {
        if t.is_ground() {
            Step::Done(t)
        } else {
            Step::Descend(t)
        }
    }

    fn fold_variable(&mut self, v: Variable) -> Variable {
        if v.is_source() {
            v
        } else {
            Variable::new(&format!("_G{}", v.id))
        }
    }
}

fn clause_arg(m: &Machine, term: &Term) -> PrologResult<Clause> {
    let term = m.resolve(term);
    if term.is_var() {
        return Err(RuntimeError::Instantiation.into());
    }
    let clause = Clause::from_term(&term);
    match clause.body.value() {
        Value::Number(_) | Value::String(_) => {
            Err(RuntimeError::type_error("callable", clause.body.clone()).into())
        }
        _ => Ok(clause),
    }
}

fn add_clause(m: &mut Machine, args: &[Term], front: bool) -> PrologResult<bool> {
    let clause = clause_arg(m, &args[0])?;
    let clause = Clause::new(
        Generalizer.fold_term(clause.head),
        Generalizer.fold_term(clause.body),
    );
    m.kb_mut()?.add_clause(clause, front, true)?;
    Ok(true)
}

fn asserta(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    add_clause(m, args, true)
}

fn assertz(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    add_clause(m, args, false)
}

/// Clauses still to try for `clause/2` or `retract/1`.
#[derive(Debug)]
pub struct ClauseMatch {
    head: Term,
    body: Term,
    indicator: Indicator,
    rules: Rules,
    index: usize,
    retract: bool,
}

impl Machine {
    /// Find the next clause whose head and body unify with the pattern. A
    /// retracting match removes the clause from the database.
    pub(crate) fn next_clause_match(&mut self, mut clause_match: ClauseMatch) -> PrologResult<()> {
        let depth_bsp = self.bindings.bsp();
        while clause_match.index < clause_match.rules.len() {
            let rule = clause_match.rules[clause_match.index].clone();
            clause_match.index += 1;
            let context = LocalContext::new();
            let head = context.activate(rule.head());
            let body = context.activate(&rule.clause.body);
            if self.unify(&head, &clause_match.head) && self.unify(&body, &clause_match.body) {
                let removed = !clause_match.retract
                    || self.kb_mut()?.retract(&clause_match.indicator, rule.id)?;
                if removed {
                    if clause_match.index < clause_match.rules.len() {
                        self.push_choice_at(Alternative::ClauseMatch(clause_match), depth_bsp)?;
                    }
                    return Ok(());
                }
            }
            self.bindings.backtrack(depth_bsp);
        }
        self.fail();
        Ok(())
    }
}

/// Start a clause search over a snapshot of the predicate's clauses.
fn match_clauses(m: &mut Machine, head: Term, body: Term, retract: bool) -> PrologResult<bool> {
    let head = m.deref(&head);
    let indicator = match head.value() {
        Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
        _ => Indicator::of(&head)
            .ok_or_else(|| RuntimeError::type_error("callable", head.clone()))?,
    };
    let rules = {
        let kb = m.kb()?;
        match kb.lookup(&indicator.name, indicator.arity) {
            Definition::Builtin(_) if retract => {
                return Err(RuntimeError::permission_error(
                    "modify",
                    "static_procedure",
                    indicator.to_term(),
                )
                .into())
            }
            Definition::Builtin(_) => {
                return Err(RuntimeError::permission_error(
                    "access",
                    "private_procedure",
                    indicator.to_term(),
                )
                .into())
            }
            Definition::Clauses(predicate) if retract && !predicate.dynamic => {
                return Err(RuntimeError::permission_error(
                    "modify",
                    "static_procedure",
                    indicator.to_term(),
                )
                .into())
            }
            Definition::Clauses(predicate) => predicate.rules.clone(),
            Definition::Missing => return Ok(false),
        }
    };
    m.next_clause_match(ClauseMatch {
        head,
        body,
        indicator,
        rules,
        index: 0,
        retract,
    })?;
    Ok(true)
}

/// `clause(Head, Body)`.
fn clause(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let body = m.deref(&args[1]);
    if matches!(body.value(), Value::Number(_) | Value::String(_)) {
        return Err(RuntimeError::type_error("callable", body).into());
    }
    match_clauses(m, args[0].clone(), body, false)
}

/// `retract(Clause)`: remove the first matching clause, and further ones on
/// backtracking.
fn retract(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let clause = clause_arg(m, &args[0])?;
    match_clauses(m, clause.head, clause.body, true)
}

/// Parse a `Name/Arity` argument.
fn indicator_arg(m: &Machine, term: &Term) -> PrologResult<Indicator> {
    let term = m.resolve(term);
    let not_indicator = || RuntimeError::type_error("predicate_indicator", term.clone());
    let (name, arity) = match term.value() {
        Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
        Value::Compound(Compound { name, args }) if name.0 == INDICATOR && args.len() == 2 => {
            (&args[0], &args[1])
        }
        _ => return Err(not_indicator().into()),
    };
    if name.is_var() || arity.is_var() {
        return Err(RuntimeError::Instantiation.into());
    }
    let name = name.as_atom().ok_or_else(|| RuntimeError::type_error("atom", name.clone()))?;
    let arity = arity
        .as_integer()
        .ok_or_else(|| RuntimeError::type_error("integer", arity.clone()))?;
    if arity < 0 {
        return Err(RuntimeError::domain_error("not_less_than_zero", Term::integer(arity)).into());
    }
    Ok(Indicator {
        name: name.clone(),
        arity: arity as usize,
    })
}

/// `abolish(Name/Arity)`.
fn abolish(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let indicator = indicator_arg(m, &args[0])?;
    m.kb_mut()?.abolish(&indicator)?;
    Ok(true)
}

/// `dynamic(Name/Arity)`.
fn dynamic(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let indicator = indicator_arg(m, &args[0])?;
    m.kb_mut()?.declare_dynamic(indicator)?;
    Ok(true)
}
