use std::sync::{Arc, RwLock, RwLockWriteGuard};

use tracing::debug;

use super::config::EngineConfig;
use super::error::{OperationalError, PrologResult};
use super::kb::*;
use super::query::Query;
use super::rules::{Clause, Indicator};
use super::terms::*;
use super::vm::*;

/// An engine: a knowledge base plus the configuration new queries run with.
pub struct Prolog {
    pub kb: Arc<RwLock<KnowledgeBase>>,
    config: EngineConfig,
}

impl Default for Prolog {
    fn default() -> Self {
        Self::new()
    }
}

impl Prolog {
    /// An engine configured from `PROLOG_*` environment variables.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::from_env())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            kb: Arc::new(RwLock::new(KnowledgeBase::new())),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn kb_mut(&self) -> PrologResult<RwLockWriteGuard<'_, KnowledgeBase>> {
        self.kb.write().map_err(|_| {
            OperationalError::InvalidState("knowledge base lock poisoned".to_owned()).into()
        })
    }

    /// Add a clause to the end of its predicate. Predicates defined this way
    /// are static unless declared dynamic first.
    pub fn add_clause(&self, clause: Clause) -> PrologResult<()> {
        let mut kb = self.kb_mut()?;
        let dynamic = clause
            .indicator()
            .ok()
            .and_then(|indicator| kb.predicate(&indicator).map(|p| p.dynamic))
            .unwrap_or(false);
        kb.add_clause(clause, false, dynamic)
    }

    /// Add every clause in order, stopping at the first error.
    pub fn add_clauses(&self, clauses: impl IntoIterator<Item = Clause>) -> PrologResult<()> {
        for clause in clauses {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Make `name/arity` dynamic, so that `assert` and `retract` may change
    /// it.
    pub fn declare_dynamic(&self, name: &str, arity: usize) -> PrologResult<()> {
        self.kb_mut()?.declare_dynamic(Indicator::new(name, arity))
    }

    /// Clear rules from the knowledge base
    pub fn clear_rules(&self) -> PrologResult<()> {
        self.kb_mut()?.clear_rules();
        Ok(())
    }

    /// Prepare a query for `goal`. Solutions are produced lazily by
    /// iterating over the returned [`Query`].
    pub fn new_query(&self, goal: &Term) -> PrologResult<Query> {
        debug!(goal = %goal, "new query");
        let machine = Machine::with_goal(self.kb.clone(), self.config.clone(), goal)?;
        Ok(Query::new(machine, goal.clone()))
    }
}
