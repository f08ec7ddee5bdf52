use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::Agent;
use crate::error::RuntimeError;

/// Builds an agent instance for a registered type.
pub type AgentFactoryFn = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Agent>> + Send + Sync>;

/// Agent type -> implementation.
///
/// Types can be registered with a ready instance or with a factory; factory
/// instances are created on first use and cached until [`AgentRegistry::clear_instances`].
#[derive(Default)]
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactoryFn>,
    instances: Mutex<HashMap<String, Arc<dyn Agent>>>,
    fixed: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance under its own `agent_type()`.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        let agent_type = agent.agent_type().to_string();
        self.register_as(agent_type, agent)
    }

    /// Register a shared instance under an explicit type name.
    pub fn register_as(&mut self, agent_type: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
        let agent_type = agent_type.into();
        self.factories.remove(&agent_type);
        self.fixed.insert(agent_type, agent);
        self
    }

    /// Register a lazily-invoked factory.
    pub fn register_factory<F>(&mut self, agent_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Agent>> + Send + Sync + 'static,
    {
        let agent_type = agent_type.into();
        self.fixed.remove(&agent_type);
        self.factories.insert(agent_type, Arc::new(factory));
        self
    }

    pub fn contains(&self, agent_type: &str) -> bool {
        self.fixed.contains_key(agent_type) || self.factories.contains_key(agent_type)
    }

    /// Registered type names, sorted.
    pub fn agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .fixed
            .keys()
            .chain(self.factories.keys())
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Get (or create and cache) the agent for `agent_type`.
    pub fn resolve(&self, agent_type: &str) -> Result<Arc<dyn Agent>, RuntimeError> {
        if let Some(agent) = self.fixed.get(agent_type) {
            return Ok(agent.clone());
        }

        let factory = self
            .factories
            .get(agent_type)
            .ok_or_else(|| RuntimeError::AgentNotFound(agent_type.to_string()))?;

        let mut instances = match self.instances.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(agent) = instances.get(agent_type) {
            return Ok(agent.clone());
        }

        let agent = factory().map_err(|e| RuntimeError::AgentCreation {
            agent_type: agent_type.to_string(),
            reason: e.to_string(),
        })?;
        instances.insert(agent_type.to_string(), agent.clone());
        Ok(agent)
    }

    /// Drop cached factory-built instances; the next `resolve` rebuilds them.
    pub fn clear_instances(&self) {
        match self.instances.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_types", &self.agent_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentContext, AgentOutcome};
    use crate::error::AgentError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    #[async_trait]
    impl Agent for Named {
        fn agent_type(&self) -> &str {
            self.0
        }

        async fn process(&self, input: &str, _ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
            Ok(AgentOutcome::success(input))
        }
    }

    #[test]
    fn unknown_type_is_not_found() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.resolve("nope"),
            Err(RuntimeError::AgentNotFound(t)) if t == "nope"
        ));
    }

    #[test]
    fn factory_instances_are_cached_until_cleared() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut registry = AgentRegistry::new();
        registry.register_factory("analyst", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Named("analyst")) as Arc<dyn Agent>)
        });

        registry.resolve("analyst").unwrap();
        registry.resolve("analyst").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);

        registry.clear_instances();
        registry.resolve("analyst").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factory_errors_surface_as_creation_errors() {
        let mut registry = AgentRegistry::new();
        registry.register_factory("broken", || anyhow::bail!("missing binary"));
        let err = registry.resolve("broken").err().unwrap();
        assert!(err.to_string().contains("missing binary"));
    }

    #[test]
    fn lists_registered_types() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Named("echo")));
        registry.register_factory("architect", || Ok(Arc::new(Named("architect")) as Arc<dyn Agent>));
        assert_eq!(registry.agent_types(), vec!["architect", "echo"]);
        assert!(registry.contains("echo"));
    }
}
