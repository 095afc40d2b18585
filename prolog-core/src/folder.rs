//! Inspiration:
//! - https://github.com/rust-unofficial/patterns/blob/607fcb00c4ecb9c6317e4e101e16dc15717758bd/patterns/fold.md
//! - https://docs.rs/rustc-ap-syntax/71.0.0/src/syntax/fold.rs.html
//!
//! A Folder represents a Term->Term fold; it consumes a term and returns a term of the same shape,
//! possibly with some leaves replaced.
//!
//! The traversal keeps its own work stack, so folding a list of any length uses constant host
//! stack. Folders steer it through `enter_term` rather than by recursing themselves.

use crate::terms::*;

/// What to do with a subterm reached by the fold.
pub enum Step {
    /// Use this term as the result; its children are not visited.
    Done(Term),
    /// Fold the children of this term (or the leaf itself).
    Descend(Term),
}

/// Each method of the Folder trait is a hook to be potentially overridden. `fold_term` is the
/// entry point; `enter_term` is called on every subterm before it is taken apart, and the leaf
/// hooks on every leaf that is descended into.
pub trait Folder: Sized {
    fn fold_number(&mut self, n: Numeric) -> Numeric {
        n
    }
    fn fold_atom(&mut self, a: Symbol) -> Symbol {
        a
    }
    fn fold_string(&mut self, s: String) -> String {
        s
    }
    fn fold_variable(&mut self, v: Variable) -> Variable {
        v
    }
    fn enter_term(&mut self, t: Term) -> Step {
        Step::Descend(t)
    }
    fn fold_term(&mut self, t: Term) -> Term {
        fold_term(t, self)
    }
}

fn fold_leaf<T: Folder>(v: &Value, fld: &mut T) -> Value {
    match v.clone() {
        Value::Number(n) => Value::Number(fld.fold_number(n)),
        Value::Atom(a) => Value::Atom(fld.fold_atom(a)),
        Value::String(s) => Value::String(fld.fold_string(s)),
        Value::Variable(v) => Value::Variable(fld.fold_variable(v)),
        compound @ Value::Compound(_) => compound,
    }
}

enum Task {
    Visit(Term),
    /// Rebuild `original` from the results of its children, reusing it when
    /// nothing underneath changed.
    Build { original: Term, name: Symbol },
}

pub fn fold_term<T: Folder>(term: Term, fld: &mut T) -> Term {
    let mut tasks = vec![Task::Visit(term)];
    let mut results: Vec<Term> = vec![];
    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(t) => match fld.enter_term(t) {
                Step::Done(t) => results.push(t),
                Step::Descend(t) => match t.value() {
                    Value::Compound(Compound { name, args }) => {
                        let name = fld.fold_atom(name.clone());
                        let args = args.clone();
                        // Below the children, so it runs once they are all folded.
                        tasks.push(Task::Build { original: t, name });
                        tasks.extend(args.into_iter().rev().map(Task::Visit));
                    }
                    leaf => {
                        let folded = fold_leaf(leaf, fld);
                        if folded == *leaf {
                            results.push(t);
                        } else {
                            results.push(Term::new(folded));
                        }
                    }
                },
            },
            Task::Build { original, name } => {
                let arity = original.args().len();
                let args = results.split_off(results.len() - arity);
                let unchanged = match original.as_compound() {
                    Some(compound) => {
                        compound.name == name
                            && compound.args.iter().zip(&args).all(|(l, r)| l.same_ref(r))
                    }
                    None => false,
                };
                if unchanged {
                    results.push(original);
                } else {
                    results.push(Term::new(Value::Compound(Compound { name, args })));
                }
            }
        }
    }
    results.pop().expect("a fold produces exactly one term")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Renamer;

    impl Folder for Renamer {
        fn fold_variable(&mut self, v: Variable) -> Variable {
            Variable::new(&format!("{}_renamed", v.name.0))
        }
    }

    #[test]
    fn test_fold_variables() {
        let term = call!("f", [var!("X"), call!("g", [var!("Y"), 1])]);
        let folded = Renamer.fold_term(term);
        assert_eq!(
            folded,
            call!("f", [var!("X_renamed"), call!("g", [var!("Y_renamed"), 1])])
        );
    }

    #[test]
    fn test_fold_without_changes_shares() {
        let term = call!("f", [1, call!("g", ["a"])]);
        assert!(Renamer.fold_term(term.clone()).same_ref(&term));
    }

    #[test]
    fn test_fold_long_list() {
        let vars: Vec<Term> = (0..100_000).map(|_| var!("X")).collect();
        let folded = Renamer.fold_term(Term::list(vars));
        let mut rest = &folded;
        let mut count = 0;
        while let Some((head, tail)) = rest.as_cons() {
            assert_eq!(head.as_var().unwrap().name.0, "X_renamed");
            count += 1;
            rest = tail;
        }
        assert_eq!(count, 100_000);
    }
}
