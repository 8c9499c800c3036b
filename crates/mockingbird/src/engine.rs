//! The mapping engine: registry, scenarios and selector behind one handle.

use crate::config::MatchingConfig;
use crate::mapping::{Mapping, MappingError, MappingRegistry};
use crate::random::RandomSource;
use crate::request::RequestMessage;
use crate::scenario::ScenarioStore;
use crate::selector::{MappingSelector, Resolution};
use std::sync::Arc;
use uuid::Uuid;

pub struct Engine {
    registry: Arc<MappingRegistry>,
    scenarios: Arc<ScenarioStore>,
    selector: MappingSelector,
}

impl Engine {
    pub fn new(settings: MatchingConfig) -> Self {
        let registry = Arc::new(MappingRegistry::new());
        let scenarios = Arc::new(ScenarioStore::new());
        let selector = MappingSelector::new(Arc::clone(&registry), Arc::clone(&scenarios), settings);
        Self {
            registry,
            scenarios,
            selector,
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.selector = self.selector.with_random(random);
        self
    }

    /// Register a mapping and make sure its scenario exists.
    pub fn register(&self, mapping: Mapping) -> Result<Arc<Mapping>, MappingError> {
        let mapping = self.registry.upsert(mapping)?;
        if let Some(scenario) = &mapping.scenario {
            self.scenarios.ensure(scenario);
        }
        Ok(mapping)
    }

    pub fn remove(&self, id: Uuid) -> Option<Arc<Mapping>> {
        self.registry.remove(id)
    }

    /// Drop every mapping and scenario.
    pub fn reset(&self) {
        self.registry.reset();
        self.scenarios.reset();
    }

    pub fn resolve(&self, request: &RequestMessage) -> Resolution {
        self.selector.resolve(request)
    }

    /// Advance the winner's scenario, if it has a transition.
    pub fn record_win(&self, mapping: &Mapping) -> Option<String> {
        self.scenarios.record_win(mapping)
    }

    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    pub fn scenarios(&self) -> &Arc<ScenarioStore> {
        &self.scenarios
    }

    pub fn settings(&self) -> &MatchingConfig {
        self.selector.settings()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}
