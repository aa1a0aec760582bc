//! Conversation sessions.

use crate::config::ExecutionSettings;
use crate::history::ChatHistory;
use crate::model::Backend;
use crate::orchestrator::Connector;
use crate::Result;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A conversation: history plus the settings used for every turn.
pub struct Session<B> {
    pub id: Uuid,
    connector: Arc<Connector<B>>,
    history: ChatHistory,
    settings: ExecutionSettings,
}

impl<B: Backend + 'static> Session<B> {
    pub fn new(connector: Arc<Connector<B>>, settings: ExecutionSettings) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "session started");
        Self {
            id,
            connector,
            history: ChatHistory::new(),
            settings,
        }
    }

    /// Set the system prompt. Only meaningful before the first turn.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.history = ChatHistory::with_system(system);
        self
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Send a user message and get the assistant's answer.
    pub async fn chat(&mut self, input: &str, cancel: &CancellationToken) -> Result<String> {
        self.history.add_user(input);
        let answer = self
            .connector
            .complete(&mut self.history, &self.settings, cancel)
            .await?;
        self.history.add_assistant(answer.clone());
        Ok(answer)
    }

    /// Like [`Session::chat`], yielding the answer as it is produced.
    ///
    /// The answer is recorded once the stream is exhausted.
    pub fn chat_stream<'a>(
        &'a mut self,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<String>> + Send + 'a {
        let input = input.into();
        try_stream! {
            self.history.add_user(input);
            let mut answer = String::new();
            {
                let mut fragments = Box::pin(self.connector.complete_stream(
                    &mut self.history,
                    &self.settings,
                    cancel,
                ));
                while let Some(fragment) = fragments.next().await {
                    let fragment = fragment?;
                    answer.push_str(&fragment);
                    yield fragment;
                }
            }
            self.history.add_assistant(answer);
        }
    }
}
