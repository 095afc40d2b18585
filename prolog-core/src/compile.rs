//! Goal compiler.
//!
//! A goal term becomes a flat block of instructions. Conjunctions are spliced
//! into the enclosing block, so a block never contains another block at the
//! top level. The control constructs the machine handles natively get their
//! own instructions; every other goal is a `Call`.
use std::fmt;
use std::sync::Arc;

use super::constants::*;
use super::context::LocalContext;
use super::error::{PrologResult, RuntimeError};
use super::terms::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Fail,
    Cut,
    Unify {
        left: Term,
        right: Term,
    },
    Call {
        goal: Term,
    },
    Disjunction {
        left: Block,
        right: Block,
    },
    /// `(Condition -> Then ; Otherwise)`, or with `soft` set,
    /// `(Condition *-> Then ; Otherwise)`.
    IfThenElse {
        condition: Block,
        then: Block,
        otherwise: Block,
        soft: bool,
    },
}

/// A sequence of instructions. The last one is the tail instruction: the
/// machine drops the block's frame before running it.
#[derive(Debug, Clone, PartialEq)]
pub struct Block(Arc<[Instruction]>);

impl Block {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self(instructions.into())
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.0.get(pc)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Cut => write!(f, "!"),
            Self::Unify { left, right } => write!(f, "{} = {}", left, right),
            Self::Call { goal } => write!(f, "call {}", goal),
            Self::Disjunction { .. } => write!(f, "disjunction"),
            Self::IfThenElse { soft: false, .. } => write!(f, "if-then-else"),
            Self::IfThenElse { soft: true, .. } => write!(f, "soft-if-then-else"),
        }
    }
}

/// A compiled top-level goal together with the variables of its activation.
#[derive(Debug, Clone)]
pub struct PreparedGoal {
    pub goal: Term,
    pub block: Block,
    pub context: LocalContext,
}

impl PreparedGoal {
    /// Activate `goal` in a fresh context and compile it.
    pub fn new(goal: &Term) -> PrologResult<Self> {
        let context = LocalContext::new();
        let goal = context.activate(goal);
        let block = compile(&goal)?;
        Ok(Self {
            goal,
            block,
            context,
        })
    }
}

pub fn compile(goal: &Term) -> PrologResult<Block> {
    let mut instructions = vec![];
    compile_into(goal, &mut instructions)?;
    Ok(Block::new(instructions))
}

fn binary<'a>(goal: &'a Term, op: &str) -> Option<(&'a Term, &'a Term)> {
    match goal.value() {
        Value::Compound(Compound { name, args }) if name.0 == op && args.len() == 2 => {
            Some((&args[0], &args[1]))
        }
        _ => None,
    }
}

fn compile_into(goal: &Term, out: &mut Vec<Instruction>) -> PrologResult<()> {
    let mut goal = goal;
    // Walk right-nested conjunctions iteratively.
    while let Some((left, right)) = binary(goal, CONJUNCTION) {
        compile_into(left, out)?;
        goal = right;
    }

    match goal.value() {
        Value::Variable(_) => {
            out.push(Instruction::Call {
                goal: Term::compound(CALL, vec![goal.clone()]),
            });
            return Ok(());
        }
        Value::Number(_) | Value::String(_) => {
            return Err(RuntimeError::type_error("callable", goal.clone()).into());
        }
        Value::Atom(name) => {
            match name.0.as_str() {
                TRUE => {}
                FAIL | FALSE => out.push(Instruction::Fail),
                CUT => out.push(Instruction::Cut),
                _ => out.push(Instruction::Call { goal: goal.clone() }),
            }
            return Ok(());
        }
        Value::Compound(_) => {}
    }

    if let Some((left, right)) = binary(goal, DISJUNCTION) {
        let instruction = if let Some((condition, then)) = binary(left, IF_THEN) {
            Instruction::IfThenElse {
                condition: compile(condition)?,
                then: compile(then)?,
                otherwise: compile(right)?,
                soft: false,
            }
        } else if let Some((condition, then)) = binary(left, SOFT_IF_THEN) {
            Instruction::IfThenElse {
                condition: compile(condition)?,
                then: compile(then)?,
                otherwise: compile(right)?,
                soft: true,
            }
        } else {
            Instruction::Disjunction {
                left: compile(left)?,
                right: compile(right)?,
            }
        };
        out.push(instruction);
    } else if let Some((condition, then)) = binary(goal, IF_THEN) {
        out.push(Instruction::IfThenElse {
            condition: compile(condition)?,
            then: compile(then)?,
            otherwise: Block::new(vec![Instruction::Fail]),
            soft: false,
        });
    } else if let Some((condition, then)) = binary(goal, SOFT_IF_THEN) {
        out.push(Instruction::IfThenElse {
            condition: compile(condition)?,
            then: compile(then)?,
            otherwise: Block::new(vec![Instruction::Fail]),
            soft: true,
        });
    } else if let Some((left, right)) = binary(goal, UNIFY) {
        out.push(Instruction::Unify {
            left: left.clone(),
            right: right.clone(),
        });
    } else if matches!(goal.name_arity(), Some((name, 1)) if name.0 == NOT_PROVABLE) {
        out.push(Instruction::IfThenElse {
            condition: compile(&goal.args()[0])?,
            then: Block::new(vec![Instruction::Fail]),
            otherwise: Block::empty(),
            soft: false,
        });
    } else {
        out.push(Instruction::Call { goal: goal.clone() });
    }
    Ok(())
}
