//! Streaming completions.
//!
//! Fragments are forwarded as they arrive until the accumulated text looks
//! like a function call. Text that could still turn into one (an unclosed
//! brace or backtick, or a trailing prefix of the call marker) is held back
//! until it resolves. Once a call is detected the rest of the stream is
//! buffered, the call is handled as in a single-shot completion, and the
//! final answer is re-emitted in word-sized chunks.

use super::{Connector, cancellable};
use crate::config::{ExecutionSettings, ToolCallingConfig};
use crate::history::ChatHistory;
use crate::invoker::InvocationResult;
use crate::model::{Backend, ModelRequest, TextStream};
use crate::parser::{CALL_MARKER, contains_call_marker};
use crate::prompt;
use crate::{Error, Result};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

impl<B: Backend + 'static> Connector<B> {
    /// Stream the completion of the conversation in `history`.
    ///
    /// Concatenating the yielded fragments gives the same answer
    /// [`Connector::complete`] would return.
    pub fn complete_stream<'a>(
        &'a self,
        history: &'a mut ChatHistory,
        settings: &'a ExecutionSettings,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<String>> + Send + 'a {
        let span = tracing::info_span!("completion", request_id = %Uuid::new_v4(), mode = "stream");

        try_stream! {
            let config = ToolCallingConfig::from_settings(settings, &self.registry);
            let messages = match &config {
                Some(config) => prompt::augment(history.messages(), config),
                None => history.messages().to_vec(),
            };

            let request = ModelRequest::text(&messages, &settings.sampling);
            let mut upstream = cancellable(&cancel, self.backend.stream(request))
                .instrument(span.clone())
                .await?;
            let mut gate = StreamGate::default();

            while let Some(fragment) = next_fragment(&mut upstream, &cancel).await? {
                if config.is_none() {
                    yield fragment;
                } else if let Some(released) = gate.push(&fragment) {
                    yield released;
                }
            }

            if let Some(config) = config {
                match gate.finish() {
                    GateEnd::Flush(pending) => {
                        if !pending.is_empty() {
                            yield pending;
                        }
                    }
                    GateEnd::Call { text, withheld } => {
                        span.in_scope(|| tracing::debug!(len = text.len(), "stream carried a function call"));
                        let result = self
                            .resolve(text, &config, history, settings, &cancel)
                            .instrument(span.clone())
                            .await?;

                        match result {
                            InvocationResult::Unchanged(_) => {
                                span.in_scope(|| tracing::warn!(fragments = withheld.len(), "no call executed, replaying withheld text"));
                                for fragment in withheld {
                                    yield fragment;
                                }
                            }
                            answered => {
                                let answer = answered.into_text();
                                for (i, chunk) in segments(&answer).into_iter().enumerate() {
                                    if i > 0 {
                                        pause(self.options.chunk_delay(), &cancel).await?;
                                    }
                                    yield chunk.to_string();
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

async fn next_fragment(upstream: &mut TextStream, cancel: &CancellationToken) -> Result<Option<String>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        next = upstream.next() => next.transpose().map_err(Error::from),
    }
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Split text into chunks that each end after a run of whitespace.
///
/// Leading whitespace stays with the first word and the chunks concatenate
/// back to `text`.
fn segments(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    let mut in_gap = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_gap = seen_word;
        } else {
            if in_gap {
                chunks.push(&text[start..i]);
                start = i;
                in_gap = false;
            }
            seen_word = true;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// How the buffered stream ended.
#[derive(Debug, PartialEq, Eq)]
enum GateEnd {
    /// No call; the text still held back.
    Flush(String),
    /// A call marker was seen. `withheld` is the unreleased tail of the
    /// stream, split as the fragments arrived.
    Call { text: String, withheld: Vec<String> },
}

/// Decides which streamed text may be shown before the turn is complete.
#[derive(Debug, Default)]
struct StreamGate {
    buffer: String,
    released: usize,
    fragments: Vec<String>,
    call_seen: bool,
}

impl StreamGate {
    fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);
        self.fragments.push(fragment.to_string());
        if self.call_seen {
            return None;
        }

        let pending = &self.buffer[self.released..];
        if contains_call_marker(pending) {
            self.call_seen = true;
            return None;
        }

        let held = hold_start(pending);
        let end = held - partial_marker_len(&pending[..held]);
        if end == 0 {
            return None;
        }
        let out = pending[..end].to_string();
        self.released += end;
        Some(out)
    }

    fn finish(self) -> GateEnd {
        if !self.call_seen {
            return GateEnd::Flush(self.buffer[self.released..].to_string());
        }

        let mut withheld = Vec::new();
        let mut offset = 0;
        for fragment in &self.fragments {
            let end = offset + fragment.len();
            if end > self.released {
                let skip = self.released.saturating_sub(offset);
                withheld.push(fragment[skip..].to_string());
            }
            offset = end;
        }
        GateEnd::Call {
            text: self.buffer,
            withheld,
        }
    }
}

/// Offset of the first brace or backtick region still open at the end of
/// `text`, or its length if every region has closed.
fn hold_start(text: &str) -> usize {
    let mut region = None;
    let mut depth = 0i64;
    let mut ticks = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if region.is_none() {
            match c {
                '{' => (depth, ticks) = (1, 0),
                '`' => (depth, ticks) = (0, 1),
                _ => continue,
            }
            region = Some(i);
            in_string = false;
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            '`' => ticks += 1,
            _ => {}
        }
        if depth <= 0 && ticks % 2 == 0 {
            region = None;
        }
    }
    region.unwrap_or(text.len())
}

/// Length of a trailing word that is a proper prefix of the call marker.
fn partial_marker_len(text: &str) -> usize {
    (1..CALL_MARKER.len())
        .rev()
        .find(|&len| {
            text.ends_with(&CALL_MARKER[..len])
                && text[..text.len() - len]
                    .chars()
                    .next_back()
                    .is_none_or(|c| !c.is_alphanumeric() && c != '_')
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorOptions;
    use crate::testing::{self, Reply, ScriptedBackend};
    use policy::FunctionChoice;

    fn connector(replies: Vec<Reply>) -> Connector<ScriptedBackend> {
        Connector::new(ScriptedBackend::new(replies), testing::registry()).with_options(
            ConnectorOptions {
                chunk_delay_ms: 0,
                ..Default::default()
            },
        )
    }

    async fn collect(
        connector: &Connector<ScriptedBackend>,
        settings: &ExecutionSettings,
        cancel: CancellationToken,
    ) -> Vec<Result<String>> {
        let mut history = ChatHistory::new();
        history.add_user("What time is it?");
        connector
            .complete_stream(&mut history, settings, cancel)
            .collect()
            .await
    }

    fn texts(items: Vec<Result<String>>) -> Vec<String> {
        items.into_iter().map(|item| item.unwrap()).collect()
    }

    fn auto() -> ExecutionSettings {
        ExecutionSettings::default().with_function_choice(FunctionChoice::auto())
    }

    #[test]
    fn plain_text_flows_through() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("Hello").as_deref(), Some("Hello"));
        assert_eq!(gate.push(", world").as_deref(), Some(", world"));
        assert_eq!(gate.finish(), GateEnd::Flush(String::new()));
    }

    #[test]
    fn marker_split_across_fragments_is_withheld() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push(r#"{"function"#), None);
        assert_eq!(gate.push(r#"_call": {"name": "now"}}"#), None);

        let GateEnd::Call { text, withheld } = gate.finish() else {
            panic!("expected a call");
        };
        assert_eq!(text, r#"{"function_call": {"name": "now"}}"#);
        assert_eq!(withheld.len(), 2);
    }

    #[test]
    fn prose_before_a_call_is_released() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("Hi {").as_deref(), Some("Hi "));
        assert_eq!(gate.push(r#""function_call": 1}"#), None);
        assert_eq!(
            gate.finish(),
            GateEnd::Call {
                text: r#"Hi {"function_call": 1}"#.into(),
                withheld: vec!["{".into(), r#""function_call": 1}"#.into()],
            }
        );
    }

    #[test]
    fn closed_braces_without_marker_are_released() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("Use {x").as_deref(), Some("Use "));
        assert_eq!(gate.push("} here").as_deref(), Some("{x} here"));
    }

    #[test]
    fn code_spans_are_held_until_closed() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("Run `ls").as_deref(), Some("Run "));
        assert_eq!(gate.push(" -la` now").as_deref(), Some("`ls -la` now"));
    }

    #[test]
    fn trailing_marker_prefix_is_held() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("call func").as_deref(), Some("call "));
        assert_eq!(gate.push("tional").as_deref(), Some("functional"));
        assert_eq!(gate.push(" default").as_deref(), Some(" default"));
    }

    #[test]
    fn unclosed_text_is_flushed_at_the_end() {
        let mut gate = StreamGate::default();
        assert_eq!(gate.push("Sets are {1, 2"), Some("Sets are ".into()));
        assert_eq!(gate.finish(), GateEnd::Flush("{1, 2".into()));
    }

    #[test]
    fn segments_keep_whitespace() {
        assert_eq!(segments("It is  3 PM."), vec!["It ", "is  ", "3 ", "PM."]);
        assert_eq!(segments(" lead"), vec![" lead"]);
        assert_eq!(segments("a\nb "), vec!["a\n", "b "]);
        assert!(segments("").is_empty());
    }

    #[tokio::test]
    async fn passthrough_forwards_every_fragment() {
        let connector = connector(vec![Reply::fragments(&["{a", "} b"])]);
        let items = collect(&connector, &ExecutionSettings::default(), CancellationToken::new()).await;
        assert_eq!(texts(items), vec!["{a", "} b"]);
    }

    #[tokio::test]
    async fn plain_answer_streams_live() {
        let connector = connector(vec![Reply::fragments(&["Hello", " there", "!"])]);
        let items = collect(&connector, &auto(), CancellationToken::new()).await;
        assert_eq!(texts(items), vec!["Hello", " there", "!"]);
    }

    #[tokio::test]
    async fn call_is_executed_and_answer_rechunked() {
        let connector = connector(vec![Reply::fragments(&[
            r#"{"function"#,
            r#"_call": {"name": "now", "arguments": {}}, "#,
            r#""response_format": "The time is {result}"}"#,
        ])]);

        let chunks = texts(collect(&connector, &auto(), CancellationToken::new()).await);
        assert_eq!(chunks, vec!["The ", "time ", "is ", "3:00 ", "PM"]);
        assert!(chunks.iter().all(|chunk| !chunk.contains(CALL_MARKER)));
    }

    #[tokio::test]
    async fn unparseable_call_is_replayed_verbatim() {
        let connector = connector(vec![Reply::fragments(&["Sure: ", r#"{"function_call": "#, "oops}"])]);
        let chunks = texts(collect(&connector, &auto(), CancellationToken::new()).await);
        assert_eq!(chunks.concat(), r#"Sure: {"function_call": oops}"#);
        assert_eq!(chunks[0], "Sure: ");
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream() {
        let connector = connector(vec![Reply::fragments(&["never"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let items = collect(&connector, &auto(), cancel).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn stream_failure_surfaces() {
        let connector = connector(vec![Reply::fail("down")]);
        let items = collect(&connector, &auto(), CancellationToken::new()).await;
        assert!(matches!(items.last(), Some(Err(Error::Model(_)))));
    }
}
