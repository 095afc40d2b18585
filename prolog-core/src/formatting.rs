//! # Formatting
//!
//! There are two forms of formatting for terms:
//!
//! 1. Debug strings: verbose, derived from `fmt::Debug`
//! 2. Display strings: canonical syntax, operators written as plain compounds
//!    (`','(a, b)`), lists in bracket notation (`[a, b|T]`).
//!
//! Activated variables print as `_` followed by their id, so that two distinct
//! variables never print the same.

use std::fmt;

use super::constants::{CLAUSE, NIL};
use super::rules::Clause;
use super::terms::*;

fn is_solo(name: &str) -> bool {
    matches!(name, "!" | ";" | "[]" | "{}" | ",")
}

fn is_symbol_char(c: char) -> bool {
    "+-*/\\^<>=~:.?@#&$".contains(c)
}

/// Does this atom need quotes to read back as the same atom?
fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) if name.chars().all(is_symbol_char) => false,
        Some(_) => !is_solo(name),
    }
}

fn write_atom(f: &mut fmt::Formatter, name: &str) -> fmt::Result {
    if name == "," {
        return write!(f, "','");
    }
    if !needs_quotes(name) {
        return write!(f, "{}", name);
    }
    write!(f, "'")?;
    for c in name.chars() {
        match c {
            '\'' => write!(f, "\\'")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "'")
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_atom(f, &self.0)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_source() {
            write!(f, "{}", self.name.0)
        } else {
            write!(f, "_{}", self.id)
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Write a list, starting at its first cell. Walks the spine iteratively.
fn write_list(f: &mut fmt::Formatter, list: &Term) -> fmt::Result {
    write!(f, "[")?;
    let mut first = true;
    let mut rest = list;
    while let Some((head, tail)) = rest.as_cons() {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{}", head)?;
        rest = tail;
    }
    if !rest.is_nil() {
        write!(f, "|{}", rest)?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Variable(v) => write!(f, "{}", v),
            Value::Number(n) => write!(f, "{}", n),
            Value::Atom(a) if a.0 == NIL => write!(f, "[]"),
            Value::Atom(a) => write!(f, "{}", a),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Compound(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.as_cons().is_some() {
            write_list(f, self)
        } else {
            write!(f, "{}", self.value())
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_fact() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "'{}'({}, {}).", CLAUSE, self.head, self.body)
        }
    }
}
