use std::rc::Rc;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::aggregate::{Collection, Groups};
use crate::bindings::{BindingManager, Bindings, Bsp};
use crate::builtins::{Builtin, ClauseMatch};
use crate::compile::{compile, Block, Instruction, PreparedGoal};
use crate::config::{EngineConfig, Unknown};
use crate::constants::CALL;
use crate::context::LocalContext;
use crate::error::{OperationalError, PrologError, PrologResult, RuntimeError};
use crate::kb::{Definition, KnowledgeBase};
use crate::rules::{Indicator, Rules};
use crate::scope::{CatchPoint, CutPoint};
use crate::terms::*;

/// The run loop looks at the clock once every this many steps.
const TIMEOUT_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Running the continuation.
    Forward,
    /// Looking for the next alternative.
    Backtrack,
    /// The continuation is exhausted: the goal has a solution.
    Success,
    /// No alternatives are left, or the run was aborted.
    Failed,
}

/// What remains to be done, as a chain of frames. Cloning a `Cont` is the
/// snapshot that choices and catch points keep.
pub type Cont = Option<Rc<Frame>>;

#[derive(Debug, Clone)]
pub enum FrameKind {
    /// Run `block` from instruction `pc` on.
    Block {
        block: Block,
        pc: usize,
        context: LocalContext,
        cut: Rc<CutPoint>,
    },
    /// Prune every choice at or above `depth` (`once/1`, `->`).
    Commit { depth: usize },
    /// Disable the else branch choice at `index` (`*->`).
    SoftCommit { index: usize },
    /// The goal of a `catch/3` exited; reinstall the enclosing catch point.
    ExitCatch { catch: Option<Rc<CatchPoint>> },
    /// Record a solution of a findall-style goal, then ask for the next one.
    Collect { template: Term },
}

#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub next: Cont,
    depth: usize,
}

// Unlink the chain one frame at a time so that dropping a deep
// continuation does not recurse.
impl Drop for Frame {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(frame) = next {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.next.take(),
                Err(_) => break,
            }
        }
    }
}

fn cont_depth(cont: &Cont) -> usize {
    cont.as_ref().map_or(0, |frame| frame.depth)
}

/// The pending alternatives of a choice.
#[derive(Debug)]
pub enum Alternative {
    /// Try the remaining candidate clauses of a call, starting at `index`.
    Clauses {
        goal: Term,
        rules: Rules,
        index: usize,
    },
    /// Run `block` (the other side of a disjunction, or an else branch).
    Resume {
        block: Block,
        context: LocalContext,
        cut: Rc<CutPoint>,
    },
    /// The goal of a findall-style loop is exhausted.
    Collected(Collection),
    /// The remaining solutions of `bagof/3` or `setof/3`.
    Groups(Groups),
    /// `between/3`: bind `var` to `next`, and so on up to `high`.
    Between {
        var: Term,
        next: i64,
        high: Option<i64>,
    },
    Repeat,
    /// Remaining clauses for `clause/2` or `retract/1`.
    ClauseMatch(ClauseMatch),
    /// An else branch taken out of play by a soft cut.
    Disabled,
}

#[derive(Debug)]
pub struct Choice {
    pub alternative: Alternative,
    pub cont: Cont,
    pub catch: Option<Rc<CatchPoint>>,
    pub bsp: Bsp,
    pub data_depth: usize,
}

/// A resolution engine for one goal at a time.
///
/// The machine owns all mutable execution state: the trail (inside the
/// binding manager), the choice stack, the data stack of findall
/// accumulators, the continuation and the active catch point. The knowledge
/// base is shared.
pub struct Machine {
    pub kb: Arc<RwLock<KnowledgeBase>>,
    pub config: EngineConfig,
    pub(crate) bindings: BindingManager,
    pub(crate) choices: Vec<Choice>,
    pub(crate) data: Vec<Vec<Term>>,
    pub(crate) cont: Cont,
    pub(crate) catch: Option<Rc<CatchPoint>>,
    /// Cut point of the frame whose instruction is running.
    pub(crate) cut: Rc<CutPoint>,
    /// The builtin being run, reported as the context of its errors.
    culprit: Option<Indicator>,
    state: ExecutionState,
    query: Option<PreparedGoal>,
    max_depth: usize,
    steps: u64,
    start_time: Option<Instant>,
}

// Methods which aren't instructions.
impl Machine {
    pub fn new(kb: Arc<RwLock<KnowledgeBase>>, config: EngineConfig) -> Self {
        Self {
            kb,
            config,
            bindings: BindingManager::new(),
            choices: vec![],
            data: vec![],
            cont: None,
            catch: None,
            cut: CutPoint::barrier(0),
            culprit: None,
            state: ExecutionState::Failed,
            query: None,
            max_depth: 0,
            steps: 0,
            start_time: None,
        }
    }

    /// Make a machine ready to prove `goal`.
    pub fn with_goal(
        kb: Arc<RwLock<KnowledgeBase>>,
        config: EngineConfig,
        goal: &Term,
    ) -> PrologResult<Self> {
        let mut machine = Self::new(kb, config);
        let prepared = machine.compile(goal)?;
        machine.load(prepared)?;
        Ok(machine)
    }

    pub fn compile(&self, goal: &Term) -> PrologResult<PreparedGoal> {
        PreparedGoal::new(goal)
    }

    /// Reset the machine and make `prepared` the goal to prove.
    pub fn load(&mut self, prepared: PreparedGoal) -> PrologResult<()> {
        self.abort();
        self.bindings = BindingManager::new();
        self.max_depth = 0;
        self.steps = 0;
        self.start_time = Some(Instant::now());
        self.cut = CutPoint::barrier(0);
        self.push_block(
            prepared.block.clone(),
            prepared.context.clone(),
            CutPoint::barrier(0),
        )?;
        self.query = Some(prepared);
        self.state = ExecutionState::Forward;
        Ok(())
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// The deepest the continuation chain has been since the goal was loaded.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Current depth of the continuation chain.
    pub fn depth(&self) -> usize {
        cont_depth(&self.cont)
    }

    pub fn choice_depth(&self) -> usize {
        self.choices.len()
    }

    /// The values of the goal's named variables. Variables whose name starts
    /// with `_` are left out.
    pub fn bindings(&self) -> Bindings {
        self.query
            .as_ref()
            .map(|query| {
                query
                    .context
                    .named_variables()
                    .into_iter()
                    .filter(|(name, _)| !name.0.starts_with('_'))
                    .map(|(name, var)| (name, self.bindings.resolve(&Term::from(var))))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run until the goal succeeds or fails for good.
    ///
    /// Runtime errors are thrown as `error/2` terms. A ball that no catch
    /// point handles aborts the run and is returned as
    /// [`PrologError::Uncaught`].
    pub fn run(&mut self) -> PrologResult<ExecutionState> {
        loop {
            let result = match self.state {
                ExecutionState::Forward => self.step(),
                ExecutionState::Backtrack => self.backtrack(),
                state => return Ok(state),
            };
            if let Err(err) = result {
                self.handle_error(err)?;
            }
            self.steps += 1;
            if self.steps % TIMEOUT_CHECK_INTERVAL == 0 {
                if let Err(err) = self.check_timeout() {
                    self.handle_error(err)?;
                }
            }
        }
    }

    /// Backtrack into the last solution and run again.
    pub fn redo(&mut self) -> PrologResult<ExecutionState> {
        if self.state == ExecutionState::Success {
            self.state = ExecutionState::Backtrack;
        }
        self.run()
    }

    fn handle_error(&mut self, mut err: PrologError) -> PrologResult<()> {
        loop {
            match err {
                PrologError::Runtime(error) => {
                    let context = self.culprit.take().map(|indicator| indicator.to_term());
                    match self.throw(error.to_term(context)) {
                        Ok(()) => return Ok(()),
                        Err(next) => err = next,
                    }
                }
                err => {
                    self.abort();
                    return Err(err);
                }
            }
        }
    }

    fn check_timeout(&mut self) -> PrologResult<()> {
        if self.config.is_timeout_disabled() {
            return Ok(());
        }
        let start = *self.start_time.get_or_insert_with(Instant::now);
        let elapsed = start.elapsed().as_millis() as u64;
        let timeout = self.config.timeout_ms;
        if elapsed > timeout {
            return Err(RuntimeError::System {
                msg: format!("query timeout: ran for {}ms, limit is {}ms", elapsed, timeout),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn kb(&self) -> PrologResult<RwLockReadGuard<'_, KnowledgeBase>> {
        self.kb.read().map_err(|_| {
            OperationalError::InvalidState("knowledge base lock poisoned".to_owned()).into()
        })
    }

    pub(crate) fn kb_mut(&self) -> PrologResult<RwLockWriteGuard<'_, KnowledgeBase>> {
        self.kb.write().map_err(|_| {
            OperationalError::InvalidState("knowledge base lock poisoned".to_owned()).into()
        })
    }

    pub(crate) fn deref(&self, term: &Term) -> Term {
        self.bindings.deref(term)
    }

    pub(crate) fn resolve(&self, term: &Term) -> Term {
        self.bindings.resolve(term)
    }

    pub(crate) fn unify(&mut self, left: &Term, right: &Term) -> bool {
        self.bindings.unify(left, right, self.config.occurs_check)
    }

    /// Set the state to backtrack.
    pub(crate) fn fail(&mut self) {
        self.state = ExecutionState::Backtrack;
    }

    /// Drop all execution state; the run ends with `Failed`.
    pub(crate) fn abort(&mut self) {
        self.choices.clear();
        self.data.clear();
        self.cont = None;
        self.catch = None;
        self.culprit = None;
        self.state = ExecutionState::Failed;
    }

    /// Push a frame onto the continuation.
    pub(crate) fn push_frame(&mut self, kind: FrameKind) -> PrologResult<()> {
        let depth = cont_depth(&self.cont) + 1;
        if depth > self.config.stack_limit {
            return Err(RuntimeError::resource_error("stack").into());
        }
        self.max_depth = self.max_depth.max(depth);
        self.cont = Some(Rc::new(Frame {
            kind,
            next: self.cont.take(),
            depth,
        }));
        Ok(())
    }

    /// Push a frame running `block`. An empty block needs no frame.
    pub(crate) fn push_block(
        &mut self,
        block: Block,
        context: LocalContext,
        cut: Rc<CutPoint>,
    ) -> PrologResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        self.push_frame(FrameKind::Block {
            block,
            pc: 0,
            context,
            cut,
        })
    }

    /// Push a choice that restores the current state.
    pub(crate) fn push_choice(&mut self, alternative: Alternative) -> PrologResult<()> {
        let bsp = self.bindings.bsp();
        self.push_choice_at(alternative, bsp)
    }

    /// Push a choice that restores the current state, except for the trail,
    /// which it unwinds to `bsp`.
    pub(crate) fn push_choice_at(&mut self, alternative: Alternative, bsp: Bsp) -> PrologResult<()> {
        if self.choices.len() >= self.config.stack_limit {
            return Err(RuntimeError::resource_error("choices").into());
        }
        self.choices.push(Choice {
            alternative,
            cont: self.cont.clone(),
            catch: self.catch.clone(),
            bsp,
            data_depth: self.data.len(),
        });
        Ok(())
    }

    /// Check that `goal` can be called, compile it and push it to run next
    /// under `cut`.
    pub(crate) fn push_goal(&mut self, goal: &Term, cut: Rc<CutPoint>) -> PrologResult<()> {
        let goal = self.resolve(goal);
        match goal.value() {
            Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
            Value::Number(_) | Value::String(_) => {
                return Err(RuntimeError::type_error("callable", goal).into())
            }
            _ => {}
        }
        let block = compile(&goal)?;
        self.push_block(block, LocalContext::new(), cut)
    }

    /// A barrier at the current choice depth: cuts in goals run under it
    /// stay local.
    pub(crate) fn opaque_cut(&self) -> Rc<CutPoint> {
        CutPoint::barrier(self.choices.len())
    }
}

/// Implementations of instructions.
impl Machine {
    /// Take the next frame off the continuation and run it.
    fn step(&mut self) -> PrologResult<()> {
        let frame = match self.cont.take() {
            Some(frame) => frame,
            None => {
                info!(steps = self.steps, "solution");
                self.state = ExecutionState::Success;
                return Ok(());
            }
        };
        self.cont = frame.next.clone();
        // The frame is dropped before its instruction runs, so a call in
        // tail position does not grow the chain.
        let kind = frame.kind.clone();
        drop(frame);
        match kind {
            FrameKind::Block {
                block,
                pc,
                context,
                cut,
            } => {
                if pc + 1 < block.len() {
                    self.push_frame(FrameKind::Block {
                        block: block.clone(),
                        pc: pc + 1,
                        context: context.clone(),
                        cut: cut.clone(),
                    })?;
                }
                match block.get(pc) {
                    Some(instruction) => self.execute(instruction, &context, &cut),
                    None => Ok(()),
                }
            }
            FrameKind::Commit { depth } => {
                self.cut_to(depth);
                Ok(())
            }
            FrameKind::SoftCommit { index } => {
                if let Some(choice) = self.choices.get_mut(index) {
                    choice.alternative = Alternative::Disabled;
                }
                Ok(())
            }
            FrameKind::ExitCatch { catch } => {
                self.catch = catch;
                Ok(())
            }
            FrameKind::Collect { template } => self.collect(&template),
        }
    }

    fn execute(
        &mut self,
        instruction: &Instruction,
        context: &LocalContext,
        cut: &Rc<CutPoint>,
    ) -> PrologResult<()> {
        match instruction {
            Instruction::Fail => self.fail(),
            Instruction::Cut => self.cut_to(cut.cut_depth()),
            Instruction::Unify { left, right } => {
                let left = context.activate(left);
                let right = context.activate(right);
                if !self.unify(&left, &right) {
                    self.fail();
                }
            }
            Instruction::Call { goal } => {
                self.cut = cut.clone();
                let goal = context.activate(goal);
                return self.call(&goal);
            }
            Instruction::Disjunction { left, right } => {
                self.push_choice(Alternative::Resume {
                    block: right.clone(),
                    context: context.clone(),
                    cut: cut.clone(),
                })?;
                self.push_block(left.clone(), context.clone(), cut.clone())?;
            }
            Instruction::IfThenElse {
                condition,
                then,
                otherwise,
                soft,
            } => {
                let depth = self.choices.len();
                self.push_choice(Alternative::Resume {
                    block: otherwise.clone(),
                    context: context.clone(),
                    cut: cut.clone(),
                })?;
                self.push_block(then.clone(), context.clone(), cut.clone())?;
                self.push_frame(if *soft {
                    FrameKind::SoftCommit { index: depth }
                } else {
                    FrameKind::Commit { depth }
                })?;
                self.push_block(condition.clone(), context.clone(), CutPoint::barrier(depth + 1))?;
            }
        }
        Ok(())
    }

    /// Prune every choice at or above `depth`.
    pub(crate) fn cut_to(&mut self, depth: usize) {
        if self.choices.len() > depth {
            debug!(from = self.choices.len(), to = depth, "cut");
            self.choices.truncate(depth);
        }
    }

    /// Call a goal: run a builtin or select clauses.
    pub(crate) fn call(&mut self, goal: &Term) -> PrologResult<()> {
        let goal = self.deref(goal);
        let (name, arity) = match goal.value() {
            Value::Variable(_) => return Err(RuntimeError::Instantiation.into()),
            Value::Atom(name) => (name.clone(), 0),
            Value::Compound(Compound { name, args }) => (name.clone(), args.len()),
            Value::Number(_) | Value::String(_) => {
                return Err(RuntimeError::type_error("callable", goal.clone()).into())
            }
        };
        trace!(goal = %goal, "call");

        enum Callee {
            Builtin(Builtin),
            Rules(Rules),
            Missing,
        }
        let callee = {
            let kb = self.kb()?;
            match kb.lookup(&name, arity) {
                Definition::Builtin(builtin) => Callee::Builtin(builtin),
                Definition::Clauses(predicate) => {
                    let first = goal.args().first().map(|arg| self.deref(arg));
                    Callee::Rules(predicate.applicable_rules(first.as_ref()))
                }
                Definition::Missing => Callee::Missing,
            }
        };

        match callee {
            Callee::Builtin(builtin) => {
                self.culprit = Some(Indicator { name, arity });
                if !(builtin.run)(self, goal.args())? {
                    self.fail();
                }
                self.culprit = None;
                Ok(())
            }
            Callee::Rules(rules) => self.try_clauses(goal, rules, 0),
            Callee::Missing => {
                let indicator = Indicator { name, arity };
                match self.config.unknown {
                    Unknown::Error => Err(RuntimeError::existence_error(
                        "procedure",
                        indicator.to_term(),
                    )
                    .into()),
                    Unknown::Warning => {
                        warn!(predicate = %indicator, "unknown procedure");
                        self.fail();
                        Ok(())
                    }
                    Unknown::Fail => {
                        self.fail();
                        Ok(())
                    }
                }
            }
        }
    }

    /// Try the candidate clauses for `goal` from `index` on.
    ///
    /// A choice for the rest is pushed only when a head matches and more
    /// candidates remain; trying the last candidate leaves no choice behind.
    pub(crate) fn try_clauses(&mut self, goal: Term, rules: Rules, mut index: usize) -> PrologResult<()> {
        let depth = self.choices.len();
        while index < rules.len() {
            let rule = rules[index].clone();
            index += 1;
            let bsp = self.bindings.bsp();
            let context = LocalContext::new();
            let head = context.activate(rule.head());
            if self.unify(&head, &goal) {
                if index < rules.len() {
                    self.push_choice_at(Alternative::Clauses { goal, rules, index }, bsp)?;
                }
                return self.push_block(rule.body.clone(), context, CutPoint::barrier(depth));
            }
            self.bindings.backtrack(bsp);
        }
        self.fail();
        Ok(())
    }

    /// Pop the newest choice, restore its state and take its next
    /// alternative. With no choice left the run fails.
    fn backtrack(&mut self) -> PrologResult<()> {
        let Choice {
            alternative,
            cont,
            catch,
            bsp,
            data_depth,
        } = match self.choices.pop() {
            Some(choice) => choice,
            None => {
                trace!("no choices left");
                self.state = ExecutionState::Failed;
                return Ok(());
            }
        };
        trace!(depth = self.choices.len(), "backtrack");
        self.bindings.backtrack(bsp);
        self.cont = cont;
        self.catch = catch;
        self.data.truncate(data_depth);
        self.state = ExecutionState::Forward;
        self.redo_alternative(alternative)
    }

    fn redo_alternative(&mut self, alternative: Alternative) -> PrologResult<()> {
        match alternative {
            Alternative::Clauses { goal, rules, index } => self.try_clauses(goal, rules, index),
            Alternative::Resume {
                block,
                context,
                cut,
            } => self.push_block(block, context, cut),
            Alternative::Collected(collection) => self.finish_collection(collection),
            Alternative::Groups(groups) => self.next_group(groups),
            Alternative::Between { var, next, high } => self.next_between(var, next, high),
            Alternative::Repeat => self.push_choice(Alternative::Repeat),
            Alternative::ClauseMatch(clause_match) => self.next_clause_match(clause_match),
            Alternative::Disabled => {
                self.fail();
                Ok(())
            }
        }
    }

    /// Throw `ball`: unwind to the innermost catch point whose catcher
    /// unifies with it and run its recovery goal.
    pub(crate) fn throw(&mut self, ball: Term) -> PrologResult<()> {
        let ball = self.bindings.copy_term(&ball);
        debug!(ball = %ball, "throw");
        while let Some(catch) = self.catch.take() {
            self.choices.truncate(catch.choice_depth);
            self.bindings.backtrack(catch.bsp);
            self.data.truncate(catch.data_depth);
            self.catch = catch.parent.clone();

            let bsp = self.bindings.bsp();
            if self.unify(&catch.catcher, &ball) {
                debug!(ball = %ball, "caught");
                self.cont = catch.cont.clone();
                let recovery = Block::new(vec![Instruction::Call {
                    goal: Term::compound(CALL, vec![catch.recovery.clone()]),
                }]);
                let cut = self.opaque_cut();
                self.push_block(recovery, LocalContext::new(), cut)?;
                self.state = ExecutionState::Forward;
                return Ok(());
            }
            self.bindings.backtrack(bsp);
        }
        debug!(ball = %ball, "uncaught");
        self.abort();
        Err(PrologError::Uncaught { ball })
    }
}
