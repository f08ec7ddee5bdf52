use std::sync::Arc;

use conductor_core::config::{AppConfig, OutputFormat};
use conductor_core::{Agent, AgentRegistry, EventBus, EventSink, Planner, Runtime};

use crate::agents::{CommandAgent, EchoAgent};
use crate::planner::CommandPlanner;
use crate::renderers::{JsonlRenderer, TextRenderer};
use crate::strategies::build_retry_strategy;

/// `echo` plus one lazily created [`CommandAgent`] per configured agent type.
/// A configured `echo` entry replaces the built-in one.
pub fn build_registry(cfg: &AppConfig) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(EchoAgent));
    for (agent_type, spec) in &cfg.agents {
        let name = agent_type.clone();
        let spec = spec.clone();
        registry.register_factory(agent_type.clone(), move || {
            let agent: Arc<dyn Agent> = Arc::new(CommandAgent::new(name.clone(), spec.clone())?);
            Ok(agent)
        });
    }
    registry
}

pub fn build_runtime(cfg: &AppConfig, events: EventBus) -> Runtime {
    Runtime::builder(cfg.runtime.clone())
        .registry(build_registry(cfg))
        .retry_strategy(build_retry_strategy(&cfg.retry))
        .event_bus(events)
        .build()
}

pub fn build_planner(cfg: &AppConfig) -> Option<Box<dyn Planner>> {
    cfg.planner
        .clone()
        .map(|spec| Box::new(CommandPlanner::new(spec)) as Box<dyn Planner>)
}

pub fn build_renderer(format: OutputFormat, ascii_only: bool) -> Box<dyn EventSink> {
    match format {
        OutputFormat::Jsonl => Box::new(JsonlRenderer::new(false)),
        OutputFormat::Text => Box::new(TextRenderer::new(ascii_only)),
    }
}
