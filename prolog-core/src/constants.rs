//! Names the engine treats specially.

pub const NIL: &str = "[]";
pub const CONS: &str = ".";
pub const TRUE: &str = "true";
pub const FAIL: &str = "fail";
pub const FALSE: &str = "false";
pub const CUT: &str = "!";
pub const CONJUNCTION: &str = ",";
pub const DISJUNCTION: &str = ";";
pub const IF_THEN: &str = "->";
pub const SOFT_IF_THEN: &str = "*->";
pub const NOT_PROVABLE: &str = "\\+";
pub const UNIFY: &str = "=";
pub const CALL: &str = "call";
pub const CLAUSE: &str = ":-";
pub const EXISTENTIAL: &str = "^";
pub const INDICATOR: &str = "/";
pub const PAIR: &str = "-";
pub const ERROR: &str = "error";

/// Largest arity `functor/3` and `=../2` will build.
pub const MAX_ARITY: usize = 1024;
