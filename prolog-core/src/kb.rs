use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::builtins::{Builtin, BUILTINS};
use super::counter::Counter;
use super::error::{PrologResult, RuntimeError};
use super::rules::*;
use super::terms::*;

/// What a goal's name and arity refer to.
#[derive(Debug)]
pub enum Definition<'kb> {
    Builtin(Builtin),
    Clauses(&'kb Predicate),
    Missing,
}

/// The predicate dictionary: user predicates plus the builtin registry.
#[derive(Debug)]
pub struct KnowledgeBase {
    predicates: HashMap<Indicator, Predicate>,
    builtins: HashMap<Indicator, Builtin>,
    /// For clause ids.
    id_counter: Counter,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        let builtins = BUILTINS
            .iter()
            .map(|builtin| (Indicator::new(builtin.name, builtin.arity), *builtin))
            .collect();
        Self {
            predicates: HashMap::new(),
            builtins,
            id_counter: Counter::default(),
        }
    }

    /// Return a monotonically increasing integer ID.
    pub fn new_id(&self) -> u64 {
        self.id_counter.next()
    }

    pub fn lookup(&self, name: &Symbol, arity: usize) -> Definition<'_> {
        let indicator = Indicator {
            name: name.clone(),
            arity,
        };
        if let Some(builtin) = self.builtins.get(&indicator) {
            Definition::Builtin(*builtin)
        } else if let Some(predicate) = self.predicates.get(&indicator) {
            Definition::Clauses(predicate)
        } else {
            Definition::Missing
        }
    }

    pub fn is_builtin(&self, indicator: &Indicator) -> bool {
        self.builtins.contains_key(indicator)
    }

    pub fn predicate(&self, indicator: &Indicator) -> Option<&Predicate> {
        self.predicates.get(indicator)
    }

    /// Indicators of all user predicates, sorted.
    pub fn indicators(&self) -> Vec<Indicator> {
        let mut indicators: Vec<Indicator> = self.predicates.keys().cloned().collect();
        indicators.sort();
        indicators
    }

    fn check_modifiable(&self, indicator: &Indicator, dynamic: bool) -> PrologResult<()> {
        let static_procedure = self.is_builtin(indicator)
            || (dynamic
                && self
                    .predicates
                    .get(indicator)
                    .map_or(false, |predicate| !predicate.dynamic));
        if static_procedure {
            return Err(RuntimeError::permission_error(
                "modify",
                "static_procedure",
                indicator.to_term(),
            )
            .into());
        }
        Ok(())
    }

    /// Add a clause at the end (or, with `front`, the start) of its
    /// predicate.
    ///
    /// Clauses added by the host create static predicates; clauses added
    /// through `assert` (`dynamic` set) need the predicate to be dynamic or
    /// new, and make it dynamic.
    pub fn add_clause(&mut self, clause: Clause, front: bool, dynamic: bool) -> PrologResult<()> {
        let indicator = clause.indicator()?;
        self.check_modifiable(&indicator, dynamic)?;
        let rule = Rule::new(self.new_id(), clause)?;
        debug!(predicate = %indicator, "add clause");
        self.predicates
            .entry(indicator.clone())
            .or_insert_with(|| Predicate::new(indicator, dynamic))
            .add_rule(Arc::new(rule), front);
        Ok(())
    }

    /// Declare a predicate dynamic, creating it with no clauses if needed.
    pub fn declare_dynamic(&mut self, indicator: Indicator) -> PrologResult<()> {
        self.check_modifiable(&indicator, false)?;
        self.predicates
            .entry(indicator.clone())
            .or_insert_with(|| Predicate::new(indicator, true))
            .dynamic = true;
        Ok(())
    }

    /// Remove one clause of a dynamic predicate. Returns whether the clause
    /// was still present.
    pub fn retract(&mut self, indicator: &Indicator, id: u64) -> PrologResult<bool> {
        self.check_modifiable(indicator, true)?;
        Ok(self
            .predicates
            .get_mut(indicator)
            .map_or(false, |predicate| predicate.remove_rule(id)))
    }

    /// Remove all clauses of a dynamic predicate along with the predicate
    /// itself.
    pub fn abolish(&mut self, indicator: &Indicator) -> PrologResult<()> {
        self.check_modifiable(indicator, true)?;
        self.predicates.remove(indicator);
        Ok(())
    }

    pub fn clear_rules(&mut self) {
        self.predicates.clear();
    }
}
