use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::folder::{Folder, Step};
use crate::terms::{Symbol, Term, Variable};

#[derive(Debug, Default)]
struct Table {
    by_name: HashMap<Symbol, Variable>,
    order: Vec<Symbol>,
}

/// The variable table of one clause activation (or of a top-level query).
///
/// Source variables (`id == 0`) are mapped to fresh variables the first time
/// a term mentioning them is activated. Every frame and choice created under
/// the activation holds a handle to the same table, so later goals of the
/// same body see the same variables. The anonymous variable `_` gets a fresh
/// variable at every occurrence.
#[derive(Clone, Debug, Default)]
pub struct LocalContext {
    table: Rc<RefCell<Table>>,
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source variables of `term` by this activation's variables.
    /// Ground terms and already activated variables are left alone.
    pub fn activate(&self, term: &Term) -> Term {
        if term.is_ground() {
            return term.clone();
        }
        Activator { context: self }.fold_term(term.clone())
    }

    /// The activated variable for a source name, creating it if needed.
    pub fn variable(&self, name: &Symbol) -> Variable {
        let mut table = self.table.borrow_mut();
        if let Some(var) = table.by_name.get(name) {
            return var.clone();
        }
        let var = Variable::fresh(name.clone());
        table.by_name.insert(name.clone(), var.clone());
        table.order.push(name.clone());
        var
    }

    /// Named variables activated so far, in order of first activation.
    pub fn named_variables(&self) -> Vec<(Symbol, Variable)> {
        let table = self.table.borrow();
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    pub fn same_context(&self, other: &LocalContext) -> bool {
        Rc::ptr_eq(&self.table, &other.table)
    }
}

struct Activator<'a> {
    context: &'a LocalContext,
}

impl<'a> Folder for Activator<'a> {
    fn enter_term(&mut self, t: Term) -> Step {
        if t.is_ground() {
            Step::Done(t)
        } else {
            Step::Descend(t)
        }
    }

    fn fold_variable(&mut self, v: Variable) -> Variable {
        if !v.is_source() {
            v
        } else if v.is_anonymous() {
            Variable::fresh(v.name)
        } else {
            self.context.variable(&v.name)
        }
    }
}
