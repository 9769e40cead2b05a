use super::*;
use crate::RagError;
use crate::config::AgentConfig;
use crate::llm::{ChatModel, CompletionRequest, Role};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Collects everything a session renders
#[derive(Default)]
struct RecordingSink {
    sent: Vec<String>,
}

impl MessageSink for RecordingSink {
    fn send(&mut self, content: &str) -> Result<()> {
        self.sent.push(content.to_string());
        Ok(())
    }
}

/// Answers with queued replies; an empty queue fails the request
struct QueuedModel {
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<usize>>,
}

impl QueuedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for QueuedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ChatMessage> {
        self.seen.lock().expect("lock").push(request.messages.len());
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .map(ChatMessage::assistant)
            .ok_or_else(|| RagError::Network("connection refused".to_string()))
    }
}

fn session_with(model: Arc<QueuedModel>) -> ChatSession {
    let config = AgentConfig::default();
    let agent = Agent::from_config(&config, "test-model");
    ChatSession::new(agent, Runner::new(model), config.greeting)
}

#[tokio::test]
async fn hello_on_fresh_session() {
    let mut session = session_with(QueuedModel::new(&["Hi! Ask me about DACA."]));
    let mut sink = RecordingSink::default();

    session.on_session_start(&mut sink).expect("start");
    let reply = session
        .on_message_received("hello", &mut sink)
        .await
        .expect("turn");

    assert_eq!(reply, "Hi! Ask me about DACA.");
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history()[0], ChatMessage::user("hello"));
    assert_eq!(session.history()[1].role, Role::Assistant);
    assert_eq!(
        sink.sent,
        vec![
            "Welcome to the  DACA Chatbot! How can I Guide you?".to_string(),
            "Hi! Ask me about DACA.".to_string()
        ]
    );
}

#[tokio::test]
async fn every_turn_sees_the_whole_history() {
    let model = QueuedModel::new(&["first answer", "second answer"]);
    let mut session = session_with(model.clone());
    let mut sink = RecordingSink::default();

    session.on_session_start(&mut sink).expect("start");
    session
        .on_message_received("first", &mut sink)
        .await
        .expect("first turn");
    session
        .on_message_received("second", &mut sink)
        .await
        .expect("second turn");

    // system message + history
    assert_eq!(*model.seen.lock().expect("lock"), vec![2, 4]);
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn failed_turn_keeps_user_message_only() {
    let mut session = session_with(QueuedModel::new(&[]));
    let mut sink = RecordingSink::default();

    session.on_session_start(&mut sink).expect("start");
    let result = session.on_message_received("hello", &mut sink).await;

    assert!(matches!(result, Err(RagError::Network(_))));
    assert_eq!(session.history(), &[ChatMessage::user("hello")]);
    assert_eq!(sink.sent.len(), 1);
}

#[tokio::test]
async fn restarting_clears_history() {
    let mut session = session_with(QueuedModel::new(&["answer"]));
    let mut sink = RecordingSink::default();

    session.on_session_start(&mut sink).expect("start");
    session
        .on_message_received("question", &mut sink)
        .await
        .expect("turn");
    session.on_session_start(&mut sink).expect("restart");

    assert!(session.history().is_empty());
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let mut first = session_with(QueuedModel::new(&["one"]));
    let second = session_with(QueuedModel::new(&["two"]));
    let mut sink = RecordingSink::default();

    first
        .on_message_received("only in first", &mut sink)
        .await
        .expect("turn");

    assert_eq!(first.history().len(), 2);
    assert!(second.history().is_empty());
}

#[test]
fn piped_input_prints_the_prompt_and_reads_one_line() {
    let mut input = std::io::Cursor::new("What is DACA?\nsecond line\n");
    let mut output = Vec::new();

    let line = read_prompted_line(&mut input, &mut output, "Enter your query")
        .expect("read should succeed");

    assert_eq!(line.as_deref(), Some("What is DACA?"));
    assert_eq!(String::from_utf8(output).expect("utf-8"), "Enter your query: ");
}

#[test]
fn piped_input_strips_crlf() {
    let mut input = std::io::Cursor::new("hello\r\n");
    let mut output = Vec::new();

    let line = read_prompted_line(&mut input, &mut output, "You").expect("read should succeed");

    assert_eq!(line.as_deref(), Some("hello"));
}

#[test]
fn exhausted_input_reads_as_none() {
    let mut input = std::io::Cursor::new("");
    let mut output = Vec::new();

    let line = read_prompted_line(&mut input, &mut output, "You").expect("read should succeed");

    assert_eq!(line, None);
    assert_eq!(String::from_utf8(output).expect("utf-8"), "You: ");
}
