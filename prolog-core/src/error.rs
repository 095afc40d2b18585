use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::ERROR;
use crate::terms::*;

/// Errors surfaced to the host.
///
/// Inside a run, every runtime error is a term thrown through the catch
/// chain. Only a ball that no `catch/3` handles leaves the engine, as
/// `Uncaught`.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum PrologError {
    #[error("uncaught exception: {ball}")]
    Uncaught { ball: Term },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Operational(#[from] OperationalError),
}

pub type PrologResult<T> = std::result::Result<T, PrologError>;

impl PrologError {
    /// The thrown term, if this error is an uncaught exception.
    pub fn ball(&self) -> Option<&Term> {
        match self {
            Self::Uncaught { ball } => Some(ball),
            _ => None,
        }
    }

    /// The formal part of an uncaught `error(Formal, Context)` ball.
    pub fn formal(&self) -> Option<&Term> {
        self.ball().and_then(|ball| match ball.as_compound() {
            Some(Compound { name, args }) if name.0 == ERROR && args.len() == 2 => Some(&args[0]),
            _ => None,
        })
    }
}

/// The error taxonomy of the language. Each variant maps to the formal term
/// of an `error/2` ball.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RuntimeError {
    #[error("arguments are not sufficiently instantiated")]
    Instantiation,
    #[error("type error: expected {expected}, found {culprit}")]
    Type { expected: String, culprit: Term },
    #[error("domain error: expected {domain}, found {culprit}")]
    Domain { domain: String, culprit: Term },
    #[error("unknown {kind}: {culprit}")]
    Existence { kind: String, culprit: Term },
    #[error("no permission to {action} {kind} {culprit}")]
    Permission {
        action: String,
        kind: String,
        culprit: Term,
    },
    #[error("arithmetic: {error}")]
    Evaluation { error: String },
    #[error("cannot represent {what}")]
    Representation { what: String },
    #[error("resource exhausted: {resource}")]
    Resource { resource: String },
    #[error("system error: {msg}")]
    System { msg: String },
}

impl RuntimeError {
    pub fn type_error(expected: &str, culprit: Term) -> Self {
        Self::Type {
            expected: expected.to_string(),
            culprit,
        }
    }

    pub fn domain_error(domain: &str, culprit: Term) -> Self {
        Self::Domain {
            domain: domain.to_string(),
            culprit,
        }
    }

    pub fn existence_error(kind: &str, culprit: Term) -> Self {
        Self::Existence {
            kind: kind.to_string(),
            culprit,
        }
    }

    pub fn permission_error(action: &str, kind: &str, culprit: Term) -> Self {
        Self::Permission {
            action: action.to_string(),
            kind: kind.to_string(),
            culprit,
        }
    }

    pub fn evaluation_error(error: &str) -> Self {
        Self::Evaluation {
            error: error.to_string(),
        }
    }

    pub fn representation_error(what: &str) -> Self {
        Self::Representation {
            what: what.to_string(),
        }
    }

    pub fn resource_error(resource: &str) -> Self {
        Self::Resource {
            resource: resource.to_string(),
        }
    }

    /// The formal term, e.g. `type_error(integer, foo)`.
    pub fn formal(&self) -> Term {
        match self {
            Self::Instantiation => Term::atom("instantiation_error"),
            Self::Type { expected, culprit } => Term::compound(
                "type_error",
                vec![Term::atom(expected), culprit.clone()],
            ),
            Self::Domain { domain, culprit } => Term::compound(
                "domain_error",
                vec![Term::atom(domain), culprit.clone()],
            ),
            Self::Existence { kind, culprit } => Term::compound(
                "existence_error",
                vec![Term::atom(kind), culprit.clone()],
            ),
            Self::Permission {
                action,
                kind,
                culprit,
            } => Term::compound(
                "permission_error",
                vec![Term::atom(action), Term::atom(kind), culprit.clone()],
            ),
            Self::Evaluation { error } => {
                Term::compound("evaluation_error", vec![Term::atom(error)])
            }
            Self::Representation { what } => {
                Term::compound("representation_error", vec![Term::atom(what)])
            }
            Self::Resource { resource } => {
                Term::compound("resource_error", vec![Term::atom(resource)])
            }
            Self::System { msg } => Term::compound("system_error", vec![Term::string(msg)]),
        }
    }

    /// Build the thrown term `error(Formal, Context)`. Without a known
    /// context, the context is a fresh variable.
    pub fn to_term(&self, context: Option<Term>) -> Term {
        Term::compound(
            ERROR,
            vec![self.formal(), context.unwrap_or_else(Term::fresh_var)],
        )
    }
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum OperationalError {
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_formal_terms() {
        assert_eq!(
            RuntimeError::Instantiation.formal(),
            term!("instantiation_error")
        );
        assert_eq!(
            RuntimeError::type_error("integer", term!("foo")).formal(),
            call!("type_error", ["integer", "foo"])
        );
        assert_eq!(
            RuntimeError::permission_error(
                "modify",
                "static_procedure",
                call!("/", ["foo", 1])
            )
            .formal(),
            call!(
                "permission_error",
                ["modify", "static_procedure", call!("/", ["foo", 1])]
            )
        );
        assert_eq!(
            RuntimeError::evaluation_error("zero_divisor").formal(),
            call!("evaluation_error", ["zero_divisor"])
        );
    }

    #[test]
    fn test_to_term_context() {
        let err = RuntimeError::evaluation_error("zero_divisor");
        let ball = err.to_term(Some(call!("/", ["is", 2])));
        assert_eq!(
            ball,
            call!(
                "error",
                [
                    call!("evaluation_error", ["zero_divisor"]),
                    call!("/", ["is", 2])
                ]
            )
        );
        let ball = err.to_term(None);
        assert!(ball.args()[1].is_var());
    }

    #[test]
    fn test_uncaught_formal() {
        let err = PrologError::Uncaught {
            ball: RuntimeError::Instantiation.to_term(None),
        };
        assert_eq!(err.formal(), Some(&term!("instantiation_error")));
        assert!(err.to_string().starts_with("uncaught exception: error(instantiation_error"));

        let err = PrologError::Uncaught {
            ball: call!("oops", [1]),
        };
        assert_eq!(err.formal(), None);
        assert_eq!(err.to_string(), "uncaught exception: oops(1)");
    }
}
