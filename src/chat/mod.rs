// Chat module
// Per-session conversation state and the terminal front-end that drives it

#[cfg(test)]
mod tests;

use console::style;
use dialoguer::Input;
use std::io::{self, BufRead, Write};
use tracing::{error, info};

use crate::Result;
use crate::agent::{Agent, Runner};
use crate::llm::ChatMessage;

/// Command that ends a terminal session
pub const EXIT_COMMAND: &str = "/exit";

/// Where a session renders the messages it produces
pub trait MessageSink {
    fn send(&mut self, content: &str) -> Result<()>;
}

/// One user's conversation: its own history, agent and runner
pub struct ChatSession {
    agent: Agent,
    runner: Runner,
    greeting: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    #[inline]
    pub fn new(agent: Agent, runner: Runner, greeting: impl Into<String>) -> Self {
        Self {
            agent,
            runner,
            greeting: greeting.into(),
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Reset the history and greet the user
    #[inline]
    pub fn on_session_start(&mut self, sink: &mut dyn MessageSink) -> Result<()> {
        self.history.clear();
        info!("Chat session started with agent '{}'", self.agent.name);
        sink.send(&self.greeting)
    }

    /// Answer one user message with the whole conversation as context
    ///
    /// When the agent fails the user message stays in the history and no
    /// reply is recorded or rendered.
    #[inline]
    pub async fn on_message_received(
        &mut self,
        text: &str,
        sink: &mut dyn MessageSink,
    ) -> Result<String> {
        self.history.push(ChatMessage::user(text));

        let result = match self.runner.run(&self.agent, self.history.clone()).await {
            Ok(result) => result,
            Err(err) => {
                error!("Agent run failed: {}", err);
                return Err(err);
            }
        };

        self.history
            .push(ChatMessage::assistant(result.final_output.clone()));
        sink.send(&result.final_output)?;

        Ok(result.final_output)
    }
}

/// Prints assistant messages to stdout
#[derive(Debug, Default)]
pub struct TerminalSink;

impl MessageSink for TerminalSink {
    fn send(&mut self, content: &str) -> Result<()> {
        println!("{} {}", style("Assistant:").bold().green(), content);
        println!();
        Ok(())
    }
}

/// Runs a single chat session on the terminal until `/exit` or end of input
pub struct TerminalFrontEnd {
    session: ChatSession,
    sink: TerminalSink,
}

impl TerminalFrontEnd {
    #[inline]
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            sink: TerminalSink,
        }
    }

    #[inline]
    pub async fn run(mut self) -> anyhow::Result<()> {
        eprintln!(
            "{}",
            style(format!("Type {} or press Ctrl-D to quit.", EXIT_COMMAND)).dim()
        );
        self.session.on_session_start(&mut self.sink)?;

        loop {
            let Some(line) = tokio::task::spawn_blocking(read_line).await?? else {
                break;
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text == EXIT_COMMAND {
                break;
            }

            if let Err(err) = self.session.on_message_received(text, &mut self.sink).await {
                eprintln!("{} {}", style("Error:").bold().red(), err);
                eprintln!();
            }
        }

        eprintln!("{}", style("Goodbye!").cyan());
        Ok(())
    }
}

fn read_line() -> anyhow::Result<Option<String>> {
    prompt_line("You", true)
}

/// Ask for one line of input
///
/// On a terminal this is a dialoguer prompt. When stdin is piped the prompt
/// is printed as `<prompt>: ` and a single line is read. `None` means end of
/// input.
#[inline]
pub fn prompt_line(prompt: &str, allow_empty: bool) -> anyhow::Result<Option<String>> {
    if !console::user_attended() {
        let stdin = io::stdin();
        let stdout = io::stdout();
        return Ok(read_prompted_line(
            &mut stdin.lock(),
            &mut stdout.lock(),
            prompt,
        )?);
    }

    match Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(allow_empty)
        .interact_text()
    {
        Ok(line) => Ok(Some(line)),
        Err(dialoguer::Error::IO(err)) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Write `<prompt>: ` and read one line without its line ending
#[inline]
pub fn read_prompted_line<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(writer, "{}: ", prompt)?;
    writer.flush()?;

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}
