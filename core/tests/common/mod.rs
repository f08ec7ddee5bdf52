#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conductor_core::{
    Agent, AgentContext, AgentError, AgentOutcome, AgentRegistry, LinearBackoff, Runtime,
    RuntimeConfig,
};

pub fn config(max_concurrent_agents: usize, timeout_ms: u64, retry_attempts: u32) -> RuntimeConfig {
    RuntimeConfig {
        max_concurrent_agents,
        timeout_ms,
        retry_attempts,
        ..RuntimeConfig::default()
    }
}

/// Runtime with a 10ms linear backoff so retry tests stay short.
pub fn runtime(config: RuntimeConfig, agents: Vec<Arc<dyn Agent>>) -> Runtime {
    let mut registry = AgentRegistry::new();
    for agent in agents {
        registry.register(agent);
    }
    Runtime::builder(config)
        .registry(registry)
        .retry_strategy(Arc::new(LinearBackoff::new(Duration::from_millis(10))))
        .build()
}

/// Sleeps for `delay`, then echoes its input. Tracks concurrent calls.
pub struct SleepAgent {
    name: String,
    delay: Duration,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SleepAgent {
    pub fn new(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Agent for SleepAgent {
    fn agent_type(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: &str, _ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(AgentOutcome::success(input).with_confidence(0.8))
    }
}

/// Always raises.
pub struct FailingAgent {
    name: String,
    pub calls: AtomicUsize,
}

impl FailingAgent {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn agent_type(&self) -> &str {
        &self.name
    }

    async fn process(&self, _input: &str, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::Failed(format!("{} refused attempt {}", ctx.task_id, ctx.attempt)))
    }
}

/// Never completes on its own.
pub struct HangingAgent {
    name: String,
}

impl HangingAgent {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Agent for HangingAgent {
    fn agent_type(&self) -> &str {
        &self.name
    }

    async fn process(&self, _input: &str, _ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        std::future::pending::<()>().await;
        Ok(AgentOutcome::success("unreachable"))
    }
}

type Script = dyn Fn(&str, &AgentContext) -> Result<AgentOutcome, AgentError> + Send + Sync;

/// Runs a closure and records which tasks it saw, in call order.
pub struct ScriptedAgent {
    name: String,
    script: Box<Script>,
    pub seen: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new<F>(name: &str, script: F) -> Arc<Self>
    where
        F: Fn(&str, &AgentContext) -> Result<AgentOutcome, AgentError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn agent_type(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: &str, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        self.seen.lock().unwrap().push(ctx.task_id.clone());
        // Yield so concurrently dispatched tasks interleave.
        tokio::task::yield_now().await;
        (self.script)(input, ctx)
    }
}

pub fn echo() -> Arc<ScriptedAgent> {
    ScriptedAgent::new("echo", |input, _| Ok(AgentOutcome::success(input)))
}

pub fn as_agent<A: Agent + 'static>(agent: &Arc<A>) -> Arc<dyn Agent> {
    agent.clone()
}
