//! Conversational session over an indexed corpus.
//!
//! A [`ChatSession`] owns one assistant profile and one message thread.
//! Each turn appends the user message, starts a run, and polls it at a
//! fixed interval until a terminal state. A run that ends in any
//! non-completed terminal state yields the fixed fallback reply instead of
//! an error, and the user's message stays in the thread — the next turn
//! proceeds normally. `ask` takes `&mut self` and polls to completion, so
//! at most one run is ever in flight per thread.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{IndexHandle, Role, RunState};
use crate::registry::IndexRegistry;
use crate::service::{AssistantService, OpenAiClient, RetrievalService};

/// Reply used when a run ends in failed, cancelled, or expired state.
pub const FALLBACK_REPLY: &str = "Sorry, there was an error processing your request.";
/// Reply used when a completed run produced no assistant message.
pub const NO_REPLY: &str = "Sorry, I couldn't generate a response.";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    AwaitingRun,
    Closed,
}

pub struct ChatSession {
    llm: Arc<dyn AssistantService>,
    retrieval: Arc<dyn RetrievalService>,
    profile_id: String,
    thread_id: String,
    poll_interval: Duration,
    state: SessionState,
}

impl ChatSession {
    /// Create the assistant profile and an empty thread, then attach the
    /// indexed files as grounding context. Attachment failures degrade the
    /// session (answers lose grounding) instead of blocking it.
    pub async fn start(
        llm: Arc<dyn AssistantService>,
        retrieval: Arc<dyn RetrievalService>,
        handle: &IndexHandle,
        instructions: &str,
        model: &str,
        poll_interval: Duration,
    ) -> Result<Self> {
        let profile_id = llm.create_profile(instructions, model, true).await?;
        let thread_id = llm.create_thread().await?;
        info!(profile = %profile_id, thread = %thread_id, "session created");

        let session = Self {
            llm,
            retrieval,
            profile_id,
            thread_id,
            poll_interval,
            state: SessionState::Ready,
        };
        session.attach_grounding(handle).await;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Enumerate the index's files and attach them to the profile in one
    /// batch. Per-file lookup failures are skipped; whatever subset
    /// survives is attached.
    async fn attach_grounding(&self, handle: &IndexHandle) {
        let file_ids = match self.retrieval.list_files(&handle.id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(index = %handle.id, error = %e, "could not list indexed files, continuing ungrounded");
                return;
            }
        };

        let mut attached = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            match self.retrieval.get_file_name(&file_id).await {
                Ok(name) => {
                    info!(file = %name, "grounding file");
                    attached.push(file_id);
                }
                Err(e) => {
                    warn!(file = %file_id, error = %e, "could not resolve file details, skipping");
                }
            }
        }

        if attached.is_empty() {
            warn!(index = %handle.id, "no files attached to the session");
            return;
        }

        match self.llm.attach_files(&self.profile_id, &attached).await {
            Ok(()) => info!(count = attached.len(), "attached grounding files"),
            Err(e) => {
                warn!(error = %e, "file attachment failed, continuing ungrounded");
            }
        }
    }

    /// One conversational turn.
    ///
    /// Transport failures abort the turn with an error; the session stays
    /// usable. A non-completed terminal run returns the fallback reply.
    pub async fn ask(&mut self, text: &str) -> Result<String> {
        if self.state != SessionState::Ready {
            return Err(Error::Config(format!(
                "session cannot accept a turn in state {:?}",
                self.state
            )));
        }

        self.llm
            .append_message(&self.thread_id, Role::User, text)
            .await?;

        self.state = SessionState::AwaitingRun;
        let reply = match self.run_turn().await {
            Ok(reply) => Ok(reply),
            // Cancelled and expired map to the same reply as failed.
            Err(Error::RunFailure(state)) => {
                warn!(state = state.as_str(), "run did not complete");
                Ok(FALLBACK_REPLY.to_string())
            }
            Err(e) => Err(e),
        };
        self.state = SessionState::Ready;
        reply
    }

    async fn run_turn(&self) -> Result<String> {
        let run_id = self
            .llm
            .create_run(&self.thread_id, &self.profile_id)
            .await?;

        let final_state = self.poll_run(&run_id).await?;
        if final_state != RunState::Completed {
            return Err(Error::RunFailure(final_state));
        }

        let messages = self.llm.list_messages(&self.thread_id).await?;
        Ok(messages
            .into_iter()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content)
            .unwrap_or_else(|| NO_REPLY.to_string()))
    }

    /// Poll the run at a fixed interval until it reaches a terminal state.
    async fn poll_run(&self, run_id: &str) -> Result<RunState> {
        loop {
            let state = self.llm.get_run_status(&self.thread_id, run_id).await?;
            if state.is_terminal() {
                return Ok(state);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Close the session. No further turns are accepted.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

/// CLI entry point for `vsctl chat`: interactive loop, terminated by
/// `quit` or `exit`.
pub async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let registry = IndexRegistry::new(&config.registry.path);
    let handle = registry.load()?.ok_or_else(|| {
        Error::NotFound(format!(
            "no index handle at {} — run `vsctl build` first",
            config.registry.path.display()
        ))
    })?;

    let client = Arc::new(OpenAiClient::new(&config.service)?);
    let mut session = ChatSession::start(
        client.clone(),
        client,
        &handle,
        &config.assistant.instructions,
        &config.assistant.model,
        Duration::from_millis(config.service.poll_interval_ms),
    )
    .await?;

    println!("Chatting over index {} ({})", handle.name, handle.id);
    println!("Type 'quit' or 'exit' to end the conversation.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }

        match session.ask(input).await {
            Ok(reply) => println!("\nAssistant: {}", reply),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    session.close();
    println!("\nGoodbye!");
    Ok(())
}
