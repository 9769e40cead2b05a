// Agent module
// Declarative agent configuration plus the runner that drives the model/tool loop

pub mod runner;


use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::config::AgentConfig;
use crate::llm::{ChatMessage, ToolDefinition};

pub use runner::{RunResult, Runner};

/// A function the model may call by name with JSON arguments
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and parameter schema advertised to the model
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

/// Name, instructions, model identifier and tools of a conversational agent
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl Agent {
    #[inline]
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            tools: Vec::new(),
        }
    }

    #[inline]
    pub fn from_config(config: &AgentConfig, model: impl Into<String>) -> Self {
        Self::new(config.name.clone(), config.instructions.clone(), model)
    }

    #[inline]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    #[inline]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Look a tool up by the name it advertises
    #[inline]
    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.definition().name == name)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools: Vec<String> = self
            .tools
            .iter()
            .map(|tool| tool.definition().name)
            .collect();
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &tools)
            .finish_non_exhaustive()
    }
}

/// What a run starts from: one query string or a whole message history
#[derive(Debug, Clone, PartialEq)]
pub enum AgentInput {
    Query(String),
    Messages(Vec<ChatMessage>),
}

impl AgentInput {
    #[inline]
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::Query(query) => vec![ChatMessage::user(query)],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<&str> for AgentInput {
    #[inline]
    fn from(query: &str) -> Self {
        Self::Query(query.to_string())
    }
}

impl From<String> for AgentInput {
    #[inline]
    fn from(query: String) -> Self {
        Self::Query(query)
    }
}

impl From<Vec<ChatMessage>> for AgentInput {
    #[inline]
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self::Messages(messages)
    }
}
