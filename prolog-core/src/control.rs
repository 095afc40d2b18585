//! Control predicates: `call/N`, `once/1`, `ignore/1`, `catch/3`,
//! `throw/1`, `forall/2`, `halt/0`, `repeat/0`, and callable forms of the
//! constructs the compiler handles inline.
use std::rc::Rc;

use tracing::debug;

use crate::compile::Block;
use crate::constants::*;
use crate::context::LocalContext;
use crate::error::{PrologResult, RuntimeError};
use crate::scope::{CatchPoint, CutPoint};
use crate::terms::*;
use crate::vm::{Alternative, FrameKind, Machine};

/// Append `extra` arguments to the callable `goal`.
fn add_args(goal: &Term, extra: &[Term]) -> PrologResult<Term> {
    match goal.value() {
        Value::Variable(_) => Err(RuntimeError::Instantiation.into()),
        Value::Atom(name) => Ok(Term::compound(name.as_str(), extra.to_vec())),
        Value::Compound(Compound { name, args }) => {
            let mut args = args.clone();
            args.extend_from_slice(extra);
            Ok(Term::compound(name.as_str(), args))
        }
        _ => Err(RuntimeError::type_error("callable", goal.clone()).into()),
    }
}

/// `call/1` to `call/8`. Cuts inside the goal are local to it.
pub(crate) fn call(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let goal = m.deref(&args[0]);
    let goal = if args.len() > 1 {
        add_args(&goal, &args[1..])?
    } else {
        goal
    };
    let cut = m.opaque_cut();
    m.push_goal(&goal, cut)?;
    Ok(true)
}

/// `once/1`: the first solution of the goal, if any.
pub(crate) fn once(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let depth = m.choices.len();
    m.push_frame(FrameKind::Commit { depth })?;
    m.push_goal(&args[0], CutPoint::barrier(depth))?;
    Ok(true)
}

/// `ignore/1`: like `once/1`, but succeeds when the goal fails.
pub(crate) fn ignore(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let depth = m.choices.len();
    m.push_choice(Alternative::Resume {
        block: Block::empty(),
        context: LocalContext::new(),
        cut: m.cut.clone(),
    })?;
    m.push_frame(FrameKind::Commit { depth })?;
    m.push_goal(&args[0], CutPoint::barrier(depth + 1))?;
    Ok(true)
}

/// `catch(Goal, Catcher, Recovery)`.
pub(crate) fn catch(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let choice_depth = m.choices.len();
    let parent = m.catch.clone();
    let point = CatchPoint {
        catcher: args[1].clone(),
        recovery: args[2].clone(),
        cont: m.cont.clone(),
        choice_depth,
        bsp: m.bindings.bsp(),
        data_depth: m.data.len(),
        parent: parent.clone(),
    };
    m.push_frame(FrameKind::ExitCatch { catch: parent })?;
    m.catch = Some(Rc::new(point));
    let cut = CutPoint::transparent(choice_depth, m.cut.clone());
    m.push_goal(&args[0], cut)?;
    Ok(true)
}

/// `throw(Ball)`.
pub(crate) fn throw(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let ball = m.resolve(&args[0]);
    if ball.is_var() {
        return Err(RuntimeError::Instantiation.into());
    }
    m.throw(ball)?;
    Ok(true)
}

/// `\+ Goal` and `not(Goal)`.
pub(crate) fn not_provable(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let goal = Term::compound(NOT_PROVABLE, vec![args[0].clone()]);
    let cut = m.opaque_cut();
    m.push_goal(&goal, cut)?;
    Ok(true)
}

/// `forall(Condition, Action)`, run as `\+ (Condition, \+ Action)`.
pub(crate) fn forall(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    let goal = Term::compound(
        NOT_PROVABLE,
        vec![Term::compound(
            CONJUNCTION,
            vec![
                args[0].clone(),
                Term::compound(NOT_PROVABLE, vec![args[1].clone()]),
            ],
        )],
    );
    let cut = m.opaque_cut();
    m.push_goal(&goal, cut)?;
    Ok(true)
}

pub(crate) fn halt(m: &mut Machine, _: &[Term]) -> PrologResult<bool> {
    debug!("halt");
    m.abort();
    Ok(true)
}

pub(crate) fn repeat(m: &mut Machine, _: &[Term]) -> PrologResult<bool> {
    m.push_choice(Alternative::Repeat)?;
    Ok(true)
}

pub(crate) fn succeed(_: &mut Machine, _: &[Term]) -> PrologResult<bool> {
    Ok(true)
}

pub(crate) fn fail(_: &mut Machine, _: &[Term]) -> PrologResult<bool> {
    Ok(false)
}

/// Run a control construct reached through `call/N`. Cuts inside it reach
/// the caller's scope, as they do when the construct is compiled inline.
fn control(m: &mut Machine, name: &str, args: &[Term]) -> PrologResult<bool> {
    let goal = Term::compound(name, args.to_vec());
    let cut = CutPoint::transparent(m.choices.len(), m.cut.clone());
    m.push_goal(&goal, cut)?;
    Ok(true)
}

pub(crate) fn conjunction(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    control(m, CONJUNCTION, args)
}

pub(crate) fn disjunction(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    control(m, DISJUNCTION, args)
}

pub(crate) fn if_then(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    control(m, IF_THEN, args)
}

pub(crate) fn soft_if_then(m: &mut Machine, args: &[Term]) -> PrologResult<bool> {
    control(m, SOFT_IF_THEN, args)
}

pub(crate) fn cut(m: &mut Machine, _: &[Term]) -> PrologResult<bool> {
    let depth = m.cut.cut_depth();
    m.cut_to(depth);
    Ok(true)
}
