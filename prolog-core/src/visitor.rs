//! Inspiration:
//! - https://github.com/rust-unofficial/patterns/blob/607fcb00c4ecb9c6317e4e101e16dc15717758bd/patterns/visitor.md
//! - https://docs.rs/rustc-ap-syntax/645.0.0/src/rustc_ap_syntax/visit.rs.html
//!
//! Paraphrasing the above, this is a term walker. Visitors see every leaf and may prune whole
//! subterms from `enter_term`; the walk itself never recurses on the host stack.

use crate::terms::*;

/// Each method of the Visitor trait is a hook to be potentially overridden. `walk_term` visits
/// subterms depth first, left to right, with its own work stack. `enter_term` is asked before each
/// subterm is taken apart; returning `false` skips it and everything below it.
pub trait Visitor: Sized {
    // Atoms. These may be overridden as needed.
    fn visit_number(&mut self, _n: &Numeric) {}
    fn visit_atom(&mut self, _a: &Symbol) {}
    fn visit_string(&mut self, _s: &str) {}
    fn visit_variable(&mut self, _v: &Variable) {}

    fn enter_term(&mut self, _t: &Term) -> bool {
        true
    }
    fn visit_term(&mut self, t: &Term) {
        walk_term(self, t)
    }
}

pub fn walk_term<V: Visitor>(visitor: &mut V, term: &Term) {
    let mut stack = vec![term];
    while let Some(term) = stack.pop() {
        if !visitor.enter_term(term) {
            continue;
        }
        match term.value() {
            Value::Number(n) => visitor.visit_number(n),
            Value::Atom(a) => visitor.visit_atom(a),
            Value::String(s) => visitor.visit_string(s),
            Value::Variable(v) => visitor.visit_variable(v),
            Value::Compound(c) => {
                visitor.visit_atom(&c.name);
                stack.extend(c.args.iter().rev());
            }
        }
    }
}
