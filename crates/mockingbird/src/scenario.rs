//! Scenario state machines.
//!
//! A scenario is a named state shared by the mappings that reference it.
//! The resolution engine only reads it; the caller advances it after a
//! mapping wins.

use crate::mapping::Mapping;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Current position of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioState {
    pub name: String,
    /// `None` until a mapping first moves the scenario.
    pub state: Option<String>,
    pub started: bool,
    /// Wins recorded in the current state.
    pub counter: u32,
}

impl ScenarioState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: None,
            started: false,
            counter: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScenarioStore {
    scenarios: RwLock<HashMap<String, ScenarioState>>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State used to gate mappings of `name`; `None` when the scenario is
    /// unknown or has not started.
    pub fn current_state(&self, name: &str) -> Option<String> {
        self.scenarios
            .read()
            .get(name)
            .filter(|s| s.started)
            .and_then(|s| s.state.clone())
    }

    /// Make sure `name` exists, without touching an existing state.
    pub fn ensure(&self, name: &str) {
        if self.scenarios.read().contains_key(name) {
            return;
        }
        self.scenarios
            .write()
            .entry(name.to_string())
            .or_insert_with(|| ScenarioState::new(name));
    }

    /// Move `name` to `new_state` unconditionally.
    pub fn advance(&self, name: &str, new_state: &str) {
        let mut scenarios = self.scenarios.write();
        let scenario = scenarios
            .entry(name.to_string())
            .or_insert_with(|| ScenarioState::new(name));
        scenario.state = Some(new_state.to_string());
        scenario.started = true;
        scenario.counter = 0;
        info!(scenario = name, state = new_state, "Scenario advanced");
    }

    /// Apply the transition carried by a winning mapping.
    ///
    /// Returns the new state when the scenario moved.
    pub fn record_win(&self, mapping: &Mapping) -> Option<String> {
        let name = mapping.scenario.as_deref()?;
        let next_state = mapping.next_state.as_deref()?;

        let mut scenarios = self.scenarios.write();
        let scenario = scenarios
            .entry(name.to_string())
            .or_insert_with(|| ScenarioState::new(name));
        scenario.counter = scenario.counter.saturating_add(1);

        let required = mapping.times_in_same_state.unwrap_or(1);
        if scenario.counter < required {
            debug!(
                scenario = name,
                counter = scenario.counter,
                required,
                "Scenario stays in current state"
            );
            return None;
        }

        scenario.state = Some(next_state.to_string());
        scenario.started = true;
        scenario.counter = 0;
        info!(scenario = name, state = next_state, mapping = %mapping.id, "Scenario advanced");
        Some(next_state.to_string())
    }

    pub fn get(&self, name: &str) -> Option<ScenarioState> {
        self.scenarios.read().get(name).cloned()
    }

    /// All scenarios, sorted by name.
    pub fn all(&self) -> Vec<ScenarioState> {
        let mut all: Vec<_> = self.scenarios.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Put one scenario back to its initial state.
    pub fn reset_scenario(&self, name: &str) -> bool {
        match self.scenarios.write().get_mut(name) {
            Some(scenario) => {
                *scenario = ScenarioState::new(name);
                true
            }
            None => false,
        }
    }

    pub fn reset(&self) {
        self.scenarios.write().clear();
    }
}
