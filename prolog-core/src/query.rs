use super::bindings::Bindings;
use super::error::PrologResult;
use super::terms::*;
use super::vm::*;

/// The solutions of one goal.
///
/// Each call to `next` resumes the machine: the first runs the goal, the
/// following ones backtrack into the previous solution.
pub struct Query {
    goal: Term,
    machine: Machine,
    started: bool,
    done: bool,
}

impl Query {
    pub fn new(machine: Machine, goal: Term) -> Self {
        Self {
            goal,
            machine,
            started: false,
            done: false,
        }
    }

    pub fn goal(&self) -> &Term {
        &self.goal
    }

    /// The deepest the continuation has grown so far.
    pub fn max_depth(&self) -> usize {
        self.machine.max_depth()
    }

    fn next_solution(&mut self) -> PrologResult<Option<Bindings>> {
        let state = if self.started {
            self.machine.redo()?
        } else {
            self.started = true;
            self.machine.run()?
        };
        match state {
            ExecutionState::Success => Ok(Some(self.machine.bindings())),
            _ => Ok(None),
        }
    }
}

// Query as an iterator returns `None` after the first failure or error.
impl Iterator for Query {
    type Item = PrologResult<Bindings>;

    fn next(&mut self) -> Option<PrologResult<Bindings>> {
        if self.done {
            return None;
        }
        match self.next_solution() {
            Ok(Some(bindings)) => Some(Ok(bindings)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
