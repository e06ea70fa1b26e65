use futures::stream::Stream;
use futures::{
    StreamExt,
    stream::{self},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Debug, pin::Pin};
use tracing::{Level, event, instrument};

use crate::error::TransportError;

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Build a header map from name/value pairs, rejecting anything reqwest would.
pub(crate) fn header_map<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// What a stream line means to the caller of [`Client::post_stream`].
#[derive(Debug, PartialEq)]
pub enum StreamLine<'a> {
    /// Not an event (comments, keep-alives, blank separators)
    Skip,
    /// Payload to decode
    Event(&'a str),
    /// The server's end-of-stream marker
    Done,
}

/// Bytes carried over between network chunks, plus whether the end marker
/// has been seen.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
    done: bool,
}

impl LineBuffer {
    /// Split every complete line out of the buffer and decode the events
    /// `process` selects. A trailing partial line stays buffered, so
    /// multi-byte characters split across chunks are decoded whole.
    fn drain<T, F>(&mut self, process: &F) -> Vec<Result<T, TransportError>>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> StreamLine<'_>,
    {
        let mut messages = vec![];
        let mut consumed = 0;

        while let Some(offset) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let line = &self.pending[consumed..consumed + offset];
            consumed += offset + 1;

            let line = match std::str::from_utf8(line) {
                Ok(line) => line,
                Err(e) => {
                    messages.push(Err(TransportError::Stream(format!(
                        "invalid UTF-8 in event stream: {}",
                        e
                    ))));
                    continue;
                }
            };

            match process(line) {
                StreamLine::Skip => {}
                StreamLine::Done => {
                    self.done = true;
                    break;
                }
                StreamLine::Event(payload) => {
                    if !payload.trim().is_empty() {
                        messages.push(serde_json::from_str::<T>(payload).map_err(TransportError::from));
                    }
                }
            }
        }

        if self.done {
            self.pending.clear();
        } else {
            self.pending = self.pending.split_off(consumed);
        }
        messages
    }

    /// The error to report when the connection closes, if it closed early.
    fn finish(&self) -> Option<TransportError> {
        if self.done {
            return None;
        }
        let reason = if self.pending.iter().all(u8::is_ascii_whitespace) {
            "stream ended before [DONE]"
        } else {
            "stream ended in the middle of a line"
        };
        Some(TransportError::Stream(reason.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

impl Client {
    pub fn with_headers(headers: HeaderMap) -> Result<Self, TransportError> {
        Ok(Client {
            client: reqwest::Client::builder().default_headers(headers).build()?,
        })
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get<U, T>(&self, url: U) -> Result<T, TransportError>
    where
        U: reqwest::IntoUrl + Debug,
        T: DeserializeOwned,
    {
        let response = check_status(self.client.get(url).send().await?).await?;
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    #[instrument(level = "trace", skip(self, request, headers), fields(json_request = serde_json::to_string(request).unwrap_or_default()))]
    pub async fn post<U, S, T>(
        &self,
        url: U,
        request: &S,
        headers: HeaderMap,
    ) -> Result<T, TransportError>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    #[instrument(level = "trace", skip(self, request, headers, process), fields(json_request = serde_json::to_string(request).unwrap_or_default()))]
    pub async fn post_stream<U, S, F, T>(
        &self,
        url: U,
        request: &S,
        headers: HeaderMap,
        process: F,
    ) -> Result<BoxedStream<Result<T, TransportError>>, TransportError>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned + Send + 'static,
        F: Fn(&str) -> StreamLine<'_> + 'static + Send,
    {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;

        // A trailing `None` marks the end of the connection.
        let bytes = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(futures::future::ready(None)));

        // Use scan to maintain state (buffer) across chunks
        let buffered_stream = bytes.scan(LineBuffer::default(), move |buffer, chunk| {
            let messages = match chunk {
                _ if buffer.done => vec![],
                Some(Ok(c)) => {
                    buffer.pending.extend_from_slice(&c);
                    buffer.drain(&process)
                }
                Some(Err(e)) => {
                    buffer.done = true;
                    vec![Err(TransportError::Stream(e.to_string()))]
                }
                None => buffer.finish().map(Err).into_iter().collect(),
            };
            futures::future::ready(Some(messages))
        });

        Ok(Box::pin(buffered_stream.flat_map(stream::iter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq, Clone)]
    struct TestEvent {
        id: u32,
        text: String,
    }

    fn data_line(line: &str) -> StreamLine<'_> {
        match line.strip_prefix("data: ") {
            Some("[DONE]") => StreamLine::Done,
            Some(payload) => StreamLine::Event(payload),
            None => StreamLine::Skip,
        }
    }

    fn feed_bytes(buffer: &mut LineBuffer, chunks: &[&[u8]]) -> Vec<Result<TestEvent, TransportError>> {
        let mut events = vec![];
        for chunk in chunks {
            buffer.pending.extend_from_slice(chunk);
            events.extend(buffer.drain(&data_line));
        }
        events
    }

    fn feed(chunks: &[&str]) -> Vec<Result<TestEvent, TransportError>> {
        let chunks: Vec<&[u8]> = chunks.iter().map(|c| c.as_bytes()).collect();
        feed_bytes(&mut LineBuffer::default(), &chunks)
    }

    fn ok_events(results: Vec<Result<TestEvent, TransportError>>) -> Vec<TestEvent> {
        results.into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_stream_processing_complete_lines() {
        let results = ok_events(feed(&[
            "data: {\"id\":1,\"text\":\"hello\"}\ndata: {\"id\":2,\"text\":\"world\"}\n",
        ]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], TestEvent { id: 1, text: "hello".to_string() });
        assert_eq!(results[1], TestEvent { id: 2, text: "world".to_string() });
    }

    #[test]
    fn test_stream_processing_split_across_chunks() {
        let results = ok_events(feed(&[
            "data: {\"id\":1,\"te",
            "xt\":\"hello\"}\ndata: {\"id\":2",
            ",\"text\":\"world\"}\n",
        ]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "hello");
        assert_eq!(results[1].text, "world");
    }

    #[test]
    fn test_stream_processing_incomplete_final_line() {
        let mut buffer = LineBuffer::default();
        buffer
            .pending
            .extend_from_slice(b"data: {\"id\":1,\"text\":\"hello\"}\ndata: {\"id\":2,\"text\":\"incomp");
        let results: Vec<Result<TestEvent, _>> = buffer.drain(&data_line);

        // Only the first complete event should be parsed
        assert_eq!(results.len(), 1);
        assert_eq!(buffer.pending, b"data: {\"id\":2,\"text\":\"incomp");
        assert!(matches!(buffer.finish(), Some(TransportError::Stream(_))));
    }

    #[test]
    fn test_stream_processing_character_split_across_chunks() {
        let line = "data: {\"id\":1,\"text\":\"café\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let results = feed_bytes(&mut LineBuffer::default(), &[&line[..split], &line[split..]]);

        assert_eq!(ok_events(results), vec![TestEvent { id: 1, text: "café".to_string() }]);
    }

    #[test]
    fn test_stream_processing_invalid_utf8_is_reported() {
        let results = feed_bytes(&mut LineBuffer::default(), &[b"data: {\"id\":1,\"text\":\"\xff\"}\n"]);

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(TransportError::Stream(_))));
    }

    #[test]
    fn test_stream_processing_stops_at_done() {
        let mut buffer = LineBuffer::default();
        let results = feed_bytes(
            &mut buffer,
            &[b"data: {\"id\":1,\"text\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"id\":2,\"text\":\"b\"}\n"],
        );

        assert_eq!(ok_events(results).len(), 1);
        assert!(buffer.done);
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_stream_closed_before_done_is_an_error() {
        let mut buffer = LineBuffer::default();
        let results = feed_bytes(&mut buffer, &[b"data: {\"id\":1,\"text\":\"a\"}\n\n"]);

        assert_eq!(ok_events(results).len(), 1);
        match buffer.finish() {
            Some(TransportError::Stream(reason)) => assert!(reason.contains("[DONE]")),
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_processing_skips_unselected_lines() {
        let results = ok_events(feed(&[
            "\ndata: {\"id\":1,\"text\":\"hello\"}\n\n: keep-alive\ndata: {\"id\":2,\"text\":\"world\"}\n",
        ]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].id, 2);
    }

    #[test]
    fn test_stream_processing_single_byte_chunks() {
        let data = "data: {\"id\":1,\"text\":\"hello\"}\n";
        let chunks: Vec<&str> = (0..data.len()).map(|i| &data[i..i + 1]).collect();
        let results = ok_events(feed(&chunks));

        assert_eq!(results, vec![TestEvent { id: 1, text: "hello".to_string() }]);
    }

    #[test]
    fn test_stream_processing_malformed_json_is_reported() {
        let results = feed(&[
            "data: {\"id\":1,\"text\":\"hello\"}\ndata: {malformed json}\ndata: {\"id\":2,\"text\":\"world\"}\n",
        ]);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TransportError::Decode(_))));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_header_map_rejects_bad_values() {
        let headers = header_map([("x-test", "value")]).unwrap();
        assert_eq!(headers.get("x-test").unwrap(), "value");

        let err = header_map([("authorization", "Bearer bad\nkey")]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { ref name, .. } if name == "authorization"));
    }
}
