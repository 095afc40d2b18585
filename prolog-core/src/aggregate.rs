//! Solution collection: `findall/3,4`, `bagof/3`, `setof/3` and
//! `aggregate_all/3`.
//!
//! All of them run the goal to exhaustion through the same loop. An
//! accumulator is pushed on the data stack, a `Collected` choice marks where
//! the loop ends, and a `Collect` frame after the goal records a copy of the
//! template and fails back into the goal.
use std::collections::{HashSet, VecDeque};

use tracing::trace;

use crate::constants::{EXISTENTIAL, PAIR};
use crate::error::{PrologResult, RuntimeError};
use crate::scope::CutPoint;
use crate::terms::*;
use crate::vm::{Alternative, FrameKind, Machine};

/// What to do with the collected solutions once the goal is exhausted.
#[derive(Debug)]
pub enum Collection {
    /// Unify `list` with the solutions followed by `tail`.
    Findall { list: Term, tail: Term },
    /// Like `Findall`, sorted with duplicates removed.
    Set { list: Term },
    /// Unify `count` with the number of solutions.
    Count { count: Term },
    /// Solutions are `Witness-Template` pairs, grouped by witness.
    Bag {
        witness: Term,
        list: Term,
        sorted: bool,
    },
}

/// Groups of `bagof/3` or `setof/3` solutions not yet returned. Each group
/// holds the `(witness, template)` pairs that share a witness.
#[derive(Debug)]
pub struct Groups {
    witness: Term,
    list: Term,
    sorted: bool,
    groups: VecDeque<Vec<(Term, Term)>>,
}

fn split_pair(term: &Term) -> Option<(Term, Term)> {
    match term.value() {
        Value::Compound(Compound { name, args }) if name.0 == PAIR && args.len() == 2 => {
            Some((args[0].clone(), args[1].clone()))
        }
        _ => None,
    }
}

fn sort_unique(mut items: Vec<Term>) -> Vec<Term> {
    items.sort();
    items.dedup();
    items
}

impl Machine {
    /// Start collecting copies of `template` for each solution of `goal`.
    fn start_collection(
        &mut self,
        template: Term,
        goal: &Term,
        collection: Collection,
    ) -> PrologResult<()> {
        self.data.push(vec![]);
        self.push_choice(Alternative::Collected(collection))?;
        self.push_frame(FrameKind::Collect { template })?;
        let cut = self.opaque_cut();
        self.push_goal(goal, cut)
    }

    /// Record one solution and ask for the next.
    pub(crate) fn collect(&mut self, template: &Term) -> PrologResult<()> {
        let copy = self.bindings.copy_term(template);
        trace!(solution = %copy, "collect");
        match self.data.last_mut() {
            Some(solutions) => solutions.push(copy),
            None => {
                return Err(RuntimeError::System {
                    msg: "solution collected without an accumulator".to_owned(),
                }
                .into())
            }
        }
        self.fail();
        Ok(())
    }

    /// The goal is exhausted: hand the solutions over.
    pub(crate) fn finish_collection(&mut self, collection: Collection) -> PrologResult<()> {
        let solutions = self.data.pop().unwrap_or_default();
        let unified = match collection {
            Collection::Findall { list, tail } => {
                let result = Term::list_with_tail(solutions, tail);
                self.unify(&list, &result)
            }
            Collection::Set { list } => {
                let result = Term::list(sort_unique(solutions));
                self.unify(&list, &result)
            }
            Collection::Count { count } => {
                let result = Term::integer(solutions.len() as i64);
                self.unify(&count, &result)
            }
            Collection::Bag {
                witness,
                list,
                sorted,
            } => {
                let groups = self.group_solutions(solutions);
                if groups.is_empty() {
                    false
                } else {
                    return self.next_group(Groups {
                        witness,
                        list,
                        sorted,
                        groups,
                    });
                }
            }
        };
        if !unified {
            self.fail();
        }
        Ok(())
    }

    /// Partition `Witness-Template` pairs into groups of variant witnesses,
    /// in the order each witness was first seen.
    fn group_solutions(&self, solutions: Vec<Term>) -> VecDeque<Vec<(Term, Term)>> {
        let mut groups: VecDeque<Vec<(Term, Term)>> = VecDeque::new();
        for (witness, template) in solutions.iter().filter_map(split_pair) {
            let existing = groups
                .iter_mut()
                .find(|group| self.bindings.variant(&group[0].0, &witness));
            match existing {
                Some(group) => group.push((witness, template)),
                None => groups.push_back(vec![(witness, template)]),
            }
        }
        groups
    }

    /// Return the next group, leaving a choice for the rest.
    pub(crate) fn next_group(&mut self, mut groups: Groups) -> PrologResult<()> {
        let group = match groups.groups.pop_front() {
            Some(group) => group,
            None => {
                self.fail();
                return Ok(());
            }
        };
        let witness = groups.witness.clone();
        let list = groups.list.clone();
        let sorted = groups.sorted;
        if !groups.groups.is_empty() {
            self.push_choice(Alternative::Groups(groups))?;
        }

        let mut templates = Vec::with_capacity(group.len());
        for (member, template) in group {
            if !self.unify(&witness, &member) {
                self.fail();
                return Ok(());
            }
            templates.push(template);
        }
        let templates = if sorted {
            let resolved = templates.iter().map(|t| self.resolve(t)).collect();
            sort_unique(resolved)
        } else {
            templates
        };
        if !self.unify(&list, &Term::list(templates)) {
            self.fail();
        }
        Ok(())
    }
}

/// `findall(Template, Goal, List)`.
pub(crate) fn findall(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let collection = Collection::Findall {
        list: args[2].clone(),
        tail: Term::nil(),
    };
    m.start_collection(args[0].clone(), &args[1], collection)?;
    Ok(true)
}

/// `findall(Template, Goal, List, Tail)`.
pub(crate) fn findall_tail(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let collection = Collection::Findall {
        list: args[2].clone(),
        tail: args[3].clone(),
    };
    m.start_collection(args[0].clone(), &args[1], collection)?;
    Ok(true)
}

/// Strip `V^` prefixes from a goal. Returns the inner goal and the
/// existentially quantified variables.
fn strip_existential(goal: &Term) -> (Term, Vec<Variable>) {
    let mut vars = vec![];
    let mut goal = goal.clone();
    loop {
        let inner = match goal.value() {
            Value::Compound(Compound { name, args }) if name.0 == EXISTENTIAL && args.len() == 2 => {
                vars.extend(args[0].variables());
                args[1].clone()
            }
            _ => break,
        };
        goal = inner;
    }
    (goal, vars)
}

fn bag(m: &mut Machine, args: &[Term], sorted: bool) -> PrologResult<bool> {
    let template = m.resolve(&args[0]);
    let goal = m.resolve(&args[1]);
    if goal.is_var() {
        return Err(RuntimeError::Instantiation.into());
    }
    let (goal, existential) = strip_existential(&goal);

    let bound: HashSet<Variable> = template.variables().into_iter().chain(existential).collect();
    let free: Vec<Term> = goal
        .variables()
        .into_iter()
        .filter(|var| !bound.contains(var))
        .map(Term::from)
        .collect();
    let witness = Term::list(free);

    let pair = Term::compound(PAIR, vec![witness.clone(), template]);
    let collection = Collection::Bag {
        witness,
        list: args[2].clone(),
        sorted,
    };
    m.start_collection(pair, &goal, collection)?;
    Ok(true)
}

/// `bagof(Template, Goal, Bag)`.
pub(crate) fn bagof(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    bag(m, args, false)
}

/// `setof(Template, Goal, Set)`.
pub(crate) fn setof(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    bag(m, args, true)
}

/// `V^Goal` called outside `bagof/3` or `setof/3` just runs `Goal`.
pub(crate) fn existential(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let cut = CutPoint::transparent(m.choices.len(), m.cut.clone());
    m.push_goal(&args[1], cut)?;
    Ok(true)
}

/// `aggregate_all(Spec, Goal, Result)` for `count`, `bag(T)` and `set(T)`.
pub(crate) fn aggregate_all(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let spec = m.deref(&args[0]);
    let result = args[2].clone();
    let (template, collection) = match spec.value() {
        Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
        Value::Atom(name) if name.0 == "count" => {
            (Term::nil(), Collection::Count { count: result })
        }
        Value::Compound(Compound { name, args: spec_args }) if spec_args.len() == 1 => {
            match name.0.as_str() {
                "bag" => (
                    spec_args[0].clone(),
                    Collection::Findall {
                        list: result,
                        tail: Term::nil(),
                    },
                ),
                "set" => (spec_args[0].clone(), Collection::Set { list: result }),
                _ => return Err(RuntimeError::domain_error("aggregate_spec", spec.clone()).into()),
            }
        }
        _ => return Err(RuntimeError::domain_error("aggregate_spec", spec.clone()).into()),
    };
    m.start_collection(template, &args[1], collection)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bindings::Bindings;
    use crate::config::EngineConfig;
    use crate::kb::KnowledgeBase;
    use crate::rules::Clause;
    use crate::vm::ExecutionState;

    fn solutions(clauses: Vec<Clause>, goal: Term) -> Vec<Bindings> {
        let mut kb = KnowledgeBase::new();
        for clause in clauses {
            kb.add_clause(clause, false, false).unwrap();
        }
        let mut m =
            Machine::with_goal(Arc::new(RwLock::new(kb)), EngineConfig::default(), &goal).unwrap();
        let mut results = vec![];
        let mut state = m.run().unwrap();
        while state == ExecutionState::Success {
            results.push(m.bindings());
            state = m.redo().unwrap();
        }
        results
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
    fn test_findall() {
        let results = solutions(
            legs(),
            call!("findall", [var!("A"), call!("insect", [var!("A")]), var!("L")]),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0][&sym!("L")], list!["bee", "ant"]);

        let results = solutions(vec![], call!("findall", [var!("X"), "fail", var!("L")]));
        assert_eq!(results[0][&sym!("L")], list![]);
    }

    #[test]
    fn test_findall_copies_fresh_variables() {
        let goal = call!(
            "findall",
            [
                call!("f", [var!("X"), var!("Y"), var!("X")]),
                call!(";", ["true", "true"]),
                var!("L")
            ]
        );
        let results = solutions(vec![], goal);
        let list = results[0][&sym!("L")].clone();
        let (first, rest) = list.as_cons().unwrap();
        let (second, _) = rest.as_cons().unwrap();
        let first = first.args();
        let second = second.args();
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
        assert_ne!(first[0], second[0]);
        assert!(results[0][&sym!("X")].is_var());
    }

    #[test]
    fn test_findall_with_tail() {
        let goal = call!(
            "findall",
            [var!("A"), call!("insect", [var!("A")]), var!("L"), list!["end"]]
        );
        let results = solutions(legs(), goal);
        assert_eq!(results[0][&sym!("L")], list!["bee", "ant", "end"]);
    }

    #[test]
    fn test_nested_findall() {
        let goal = call!(
            "findall",
            [
                var!("Xs"),
                call!(
                    ";",
                    [
                        call!("findall", [var!("A"), call!("insect", [var!("A")]), var!("Xs")]),
                        call!("findall", [var!("A"), call!("spider", [var!("A")]), var!("Xs")])
                    ]
                ),
                var!("L")
            ]
        );
        let results = solutions(legs(), goal);
        assert_eq!(
            results[0][&sym!("L")],
            list![list!["bee", "ant"], list!["tarantula"]]
        );
    }

    #[test]
    fn test_bagof_groups_by_free_variables() {
        let goal = call!("bagof", [var!("A"), call!("legs", [var!("A"), var!("N")]), var!("B")]);
        let results = solutions(legs(), goal);
        let groups: Vec<(Term, Term)> = results
            .iter()
            .map(|r| (r[&sym!("N")].clone(), r[&sym!("B")].clone()))
            .collect();
        assert_eq!(
            groups,
            vec![
                (term!(6), list!["bee", "ant"]),
                (term!(4), list!["horse", "cat", "dog"]),
                (term!(8), list!["tarantula"]),
            ]
        );
    }

    #[test]
    fn test_bagof_existential_and_failure() {
        let goal = call!(
            "bagof",
            [
                var!("A"),
                call!("^", [var!("N"), call!("legs", [var!("A"), var!("N")])]),
                var!("B")
            ]
        );
        let results = solutions(legs(), goal);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0][&sym!("B")],
            list!["bee", "ant", "horse", "cat", "dog", "tarantula"]
        );

        let goal = call!("bagof", [var!("A"), call!("legs", [var!("A"), 3]), var!("B")]);
        assert!(solutions(legs(), goal).is_empty());
    }

    #[test]
    fn test_setof_sorts_and_dedups() {
        let clauses = vec![
            clause!(call!("p", [1, "a", "c"])),
            clause!(call!("p", [2, "b", "a"])),
            clause!(call!("p", [3, "a", "c"])),
            clause!(call!("p", [4, "c", "b"])),
        ];
        let goal = call!(
            "setof",
            [
                var!("Z"),
                call!("^", [var!("X"), call!("^", [var!("Y"), call!("p", [var!("X"), var!("Y"), var!("Z")])])]),
                var!("S")
            ]
        );
        let results = solutions(clauses.clone(), goal);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0][&sym!("S")], list!["a", "b", "c"]);

        let goal = call!(
            "setof",
            [
                var!("X"),
                call!("^", [var!("Z"), call!("p", [var!("X"), var!("Y"), var!("Z")])]),
                var!("S")
            ]
        );
        let results = solutions(clauses, goal);
        let groups: Vec<(Term, Term)> = results
            .iter()
            .map(|r| (r[&sym!("Y")].clone(), r[&sym!("S")].clone()))
            .collect();
        assert_eq!(
            groups,
            vec![
                (term!("a"), list![1, 3]),
                (term!("b"), list![2]),
                (term!("c"), list![4]),
            ]
        );
    }

    #[test]
    fn test_bagof_groups_variant_witnesses() {
        // Both solutions leave the witness as f(_), so they form one group.
        let clauses = vec![
            clause!(call!("q", [1, call!("f", [var!("_")])])),
            clause!(call!("q", [2, call!("f", [var!("_")])])),
            clause!(call!("q", [3, call!("g", [1])])),
        ];
        let goal = call!("bagof", [var!("X"), call!("q", [var!("X"), var!("W")]), var!("L")]);
        let results = solutions(clauses, goal);
        let lists: Vec<Term> = results.iter().map(|r| r[&sym!("L")].clone()).collect();
        assert_eq!(lists, vec![list![1, 2], list![3]]);
    }

    #[test]
    fn test_aggregate_all() {
        let goal = call!("aggregate_all", ["count", call!("animal", [var!("_")]), var!("N")]);
        assert_eq!(solutions(legs(), goal)[0][&sym!("N")], term!(3));

        let goal = call!(
            "aggregate_all",
            [call!("set", [var!("N")]), call!("legs", [var!("_"), var!("N")]), var!("S")]
        );
        assert_eq!(solutions(legs(), goal)[0][&sym!("S")], list![4, 6, 8]);

        let goal = call!("aggregate_all", ["count", "fail", var!("N")]);
        assert_eq!(solutions(legs(), goal)[0][&sym!("N")], term!(0));
    }
}
