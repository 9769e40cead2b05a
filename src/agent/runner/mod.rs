
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Agent, AgentInput};
use crate::config::settings::DEFAULT_MAX_TURNS;
use crate::llm::{ChatMessage, ChatModel, CompletionRequest, ToolCall};
use crate::{RagError, Result};

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Text of the model's last message
    pub final_output: String,
    /// Model round trips used
    pub turns: u32,
    /// Messages produced during the run: tool calls, tool results and the final answer
    pub messages: Vec<ChatMessage>,
}

/// Drives an agent until its model answers without calling a tool
#[derive(Clone)]
pub struct Runner {
    model: Arc<dyn ChatModel>,
    max_turns: u32,
}

impl Runner {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    #[inline]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    #[inline]
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Run `agent` on `input`
    ///
    /// Every turn sends the instructions, the input and everything produced
    /// so far. Tool calls are executed in order and their results appended
    /// before the next turn. A tool that fails reports its error to the model;
    /// an unknown tool or unparseable arguments end the run.
    #[inline]
    pub async fn run(&self, agent: &Agent, input: impl Into<AgentInput>) -> Result<RunResult> {
        let mut conversation = Vec::new();
        if !agent.instructions.is_empty() {
            conversation.push(ChatMessage::system(agent.instructions.clone()));
        }
        conversation.extend(input.into().into_messages());

        let definitions = agent.tool_definitions();
        let mut produced = Vec::new();

        for turn in 1..=self.max_turns {
            debug!("Agent '{}' turn {}/{}", agent.name, turn, self.max_turns);

            let reply = self
                .model
                .complete(CompletionRequest {
                    model: &agent.model,
                    messages: &conversation,
                    tools: &definitions,
                })
                .await?;

            if reply.tool_calls.is_empty() {
                info!("Agent '{}' answered after {} turns", agent.name, turn);
                let final_output = reply.text().to_string();
                produced.push(reply);
                return Ok(RunResult {
                    final_output,
                    turns: turn,
                    messages: produced,
                });
            }

            conversation.push(reply.clone());
            produced.push(reply.clone());
            for call in &reply.tool_calls {
                let output = invoke_tool(agent, call).await?;
                let message = ChatMessage::tool(call.id.clone(), output);
                conversation.push(message.clone());
                produced.push(message);
            }
        }

        Err(RagError::Agent(format!(
            "Agent '{}' exceeded {} turns without a final answer",
            agent.name, self.max_turns
        )))
    }
}

async fn invoke_tool(agent: &Agent, call: &ToolCall) -> Result<String> {
    let name = call.function.name.as_str();
    let tool = agent
        .find_tool(name)
        .ok_or_else(|| RagError::Agent(format!("Model called unknown tool '{}'", name)))?;

    let raw = call.function.arguments.trim();
    let arguments: serde_json::Value = if raw.is_empty() {
        json!({})
    } else {
        serde_json::from_str(raw).map_err(|e| {
            RagError::Agent(format!("Invalid arguments for tool '{}': {}", name, e))
        })?
    };

    debug!("Calling tool '{}' with {}", name, arguments);

    match tool.call(arguments).await {
        Ok(output) => Ok(output.to_string()),
        Err(err) => {
            warn!("Tool '{}' failed: {}", name, err);
            Ok(json!({ "error": err.to_string() }).to_string())
        }
    }
}
