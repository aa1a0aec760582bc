//! Server-sent event framing for streamed completions.

use crate::model::{ModelError, TextStream};
use bytes::Bytes;
use futures::stream::StreamExt;

const EVENT_DELIMITER: &str = "\n\n";
const DONE: &str = "[DONE]";

/// Turn a streaming HTTP response into text fragments.
///
/// `parse` receives the payload of each `data:` line and returns the text
/// delta it carries, if any.
pub(crate) fn text_stream<F>(response: reqwest::Response, parse: F) -> TextStream
where
    F: Fn(&str) -> Result<Option<String>, ModelError> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .scan(EventBuffer::default(), move |buffer, chunk| {
            let fragments = (!buffer.done).then(|| match chunk {
                Ok(bytes) => buffer.push(&bytes, &parse),
                Err(e) => vec![Err(ModelError::Stream(e.to_string()))],
            });
            async move { fragments }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

/// Accumulates bytes until complete events are available.
#[derive(Debug, Default)]
struct EventBuffer {
    text: String,
    partial_utf8: Vec<u8>,
    /// Set once `[DONE]` arrives; nothing after it is read.
    done: bool,
}

impl EventBuffer {
    fn push<F>(&mut self, bytes: &Bytes, parse: &F) -> Vec<Result<String, ModelError>>
    where
        F: Fn(&str) -> Result<Option<String>, ModelError>,
    {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }
        self.push_bytes(bytes);

        while let Some(event) = self.next_event() {
            for data in data_lines(&event) {
                if data == DONE {
                    self.done = true;
                    return fragments;
                }
                match parse(data) {
                    Ok(Some(text)) if !text.is_empty() => fragments.push(Ok(text)),
                    Ok(_) => {}
                    Err(e) => fragments.push(Err(e)),
                }
            }
        }
        fragments
    }

    /// Decode as much as possible. Invalid sequences become U+FFFD; only an
    /// incomplete sequence at the very end waits for the next chunk.
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.partial_utf8.extend_from_slice(bytes);

        let mut consumed = 0;
        while consumed < self.partial_utf8.len() {
            let rest = &self.partial_utf8[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.text.push_str(text);
                    consumed = self.partial_utf8.len();
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + invalid;
                        }
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.partial_utf8.drain(..consumed);

        // A CRLF may straddle two chunks, so normalise the joined buffer.
        if self.text.contains("\r\n") {
            self.text = self.text.replace("\r\n", "\n");
        }
    }

    fn next_event(&mut self) -> Option<String> {
        let pos = self.text.find(EVENT_DELIMITER)?;
        let event = self.text[..pos].to_string();
        self.text.drain(..pos + EVENT_DELIMITER.len());
        Some(event)
    }
}

fn data_lines(event: &str) -> impl Iterator<Item = &str> {
    event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(data: &str) -> Result<Option<String>, ModelError> {
        Ok(Some(data.to_string()))
    }

    #[test]
    fn splits_events_across_chunks() {
        let mut buffer = EventBuffer::default();
        assert!(buffer.push(&Bytes::from("data: Hel"), &echo).is_empty());

        let fragments = buffer.push(&Bytes::from("lo\n\ndata: world\n\ndata: [DONE]\n\n"), &echo);
        let fragments: Vec<String> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["Hello", "world"]);
    }

    #[test]
    fn ignores_comments_and_crlf() {
        let mut buffer = EventBuffer::default();
        let fragments = buffer.push(&Bytes::from(": keep-alive\r\n\r\ndata: hi\r\n\r\n"), &echo);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_deref().unwrap(), "hi");
    }

    #[test]
    fn stops_at_done() {
        let mut buffer = EventBuffer::default();
        let fragments = buffer.push(&Bytes::from("data: a\n\ndata: [DONE]\n\ndata: late\n\n"), &echo);
        assert_eq!(fragments.len(), 1);
        assert!(buffer.done);
        assert!(buffer.push(&Bytes::from("data: later\n\n"), &echo).is_empty());
    }

    #[test]
    fn invalid_bytes_do_not_stall_the_stream() {
        let mut buffer = EventBuffer::default();
        let first = buffer.push(&Bytes::from_static(b"data: a\xff\n\n"), &echo);
        assert_eq!(first[0].as_deref().unwrap(), "a\u{FFFD}");

        let second = buffer.push(&Bytes::from("data: hello\n\ndata: world\n\n"), &echo);
        let second: Vec<String> = second.into_iter().map(Result::unwrap).collect();
        assert_eq!(second, vec!["hello", "world"]);
        assert!(buffer.partial_utf8.is_empty());
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut buffer = EventBuffer::default();
        assert!(buffer.push(&Bytes::from("data: hi\r\n\r"), &echo).is_empty());
        let fragments = buffer.push(&Bytes::from("\ndata: there\r\n\r\n"), &echo);
        let fragments: Vec<String> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["hi", "there"]);
    }

    #[test]
    fn holds_split_utf8() {
        let mut buffer = EventBuffer::default();
        let bytes = "data: é\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;

        assert!(buffer.push(&Bytes::copy_from_slice(&bytes[..split]), &echo).is_empty());
        let fragments = buffer.push(&Bytes::copy_from_slice(&bytes[split..]), &echo);
        assert_eq!(fragments[0].as_deref().unwrap(), "é");
    }
}
