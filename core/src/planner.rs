//! The boundary to whatever turns a free-text request into tasks.
//!
//! The runtime only checks plans structurally; it never asks why a plan looks
//! the way it does.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlannerError;
use crate::graph::{build_plan, ExecutionPlan};
use crate::types::Task;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &str) -> Result<PlannedTasks, PlannerError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedTasks {
    pub tasks: Vec<Task>,

    #[serde(default, alias = "executionNotes")]
    pub notes: String,
}

impl PlannedTasks {
    /// Parse planner output. A surrounding Markdown code fence or leading
    /// chatter before the JSON object is tolerated.
    pub fn from_json(text: &str) -> Result<Self, PlannerError> {
        let body = strip_code_fence(text.trim());
        match serde_json::from_str(body) {
            Ok(planned) => Ok(planned),
            Err(err) => match (body.find('{'), body.rfind('}')) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&body[start..=end]).map_err(PlannerError::from)
                }
                _ => Err(err.into()),
            },
        }
    }

    pub fn into_plan(self) -> Result<ExecutionPlan, PlannerError> {
        Ok(build_plan(self.tasks, &HashMap::new())?)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, ...) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Analysis,
    Planning,
    Architecture,
    #[default]
    FullStack,
    Refinement,
    Advisory,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Planning => "planning",
            Self::Architecture => "architecture",
            Self::FullStack => "full-stack",
            Self::Refinement => "refinement",
            Self::Advisory => "advisory",
        }
    }

    /// The objective a planner is asked to pursue for this kind of request.
    pub fn objective(self) -> &'static str {
        match self {
            Self::Analysis => "Analyze requirements, derive user stories, and identify risks and constraints",
            Self::Planning => "Produce a project plan with timeline, milestones, and resource allocation",
            Self::Architecture => "Design the system architecture, data models, and technical infrastructure",
            Self::FullStack => "Cover analysis, planning, and architecture end to end",
            Self::Refinement => "Refine prompts, tools, and agent configuration for better results",
            Self::Advisory => "Give strategic recommendations and decision support",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(Self::Analysis),
            "planning" => Ok(Self::Planning),
            "architecture" => Ok(Self::Architecture),
            "full-stack" | "fullstack" => Ok(Self::FullStack),
            "refinement" => Ok(Self::Refinement),
            "advisory" => Ok(Self::Advisory),
            other => Err(format!("unknown request kind '{other}'")),
        }
    }
}

/// A structured project request, rendered to the text handed to a [`Planner`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub description: String,

    #[serde(default, alias = "type")]
    pub kind: RequestKind,

    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    #[serde(default)]
    pub constraints: Vec<String>,

    #[serde(default)]
    pub priorities: Vec<String>,
}

impl ProjectRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}\n\nProject type: {}\nObjective: {}",
            self.description.trim(),
            self.kind,
            self.kind.objective()
        );
        push_list(&mut out, "Constraints", &self.constraints);
        push_list(&mut out, "Priorities", &self.priorities);
        if !self.context.is_empty() {
            let context = serde_json::to_string_pretty(&self.context).unwrap_or_default();
            out.push_str("\n\nAdditional context:\n");
            out.push_str(&context);
        }
        out
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str("\n\n");
    out.push_str(title);
    out.push(':');
    for item in items {
        out.push_str("\n- ");
        out.push_str(item);
    }
}
