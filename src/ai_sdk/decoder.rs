use super::openai::{Role, StreamResponse};
use crate::error::AiError;
use futures::{Stream, StreamExt};
use std::fmt::Display;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "data: [DONE]";

/// A single delta decoded from the provider stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// The text fragment carried by this chunk, if it is non-empty.
    pub fn fragment(&self) -> Option<&str> {
        self.content.as_deref().filter(|content| !content.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

#[cfg(test)]
impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// The two frame shapes the provider ever sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Delta(StreamChunk),
    Done,
}

/// Parses one line of the provider stream.
///
/// Returns `Ok(None)` for lines that carry no frame: blanks, comments and
/// anything without the `data: ` prefix. Frames without a choice are also
/// treated as empty.
pub fn parse_frame(line: &str) -> Result<Option<Frame>, AiError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == DONE_SENTINEL {
        return Ok(Some(Frame::Done));
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    let response: StreamResponse = serde_json::from_str(payload)?;
    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(None);
    };

    Ok(Some(Frame::Delta(StreamChunk {
        role: choice.delta.role.as_deref().and_then(Role::parse),
        content: choice.delta.content,
        finish_reason: choice.finish_reason,
    })))
}

/// Incremental line decoder for the provider's `data:` stream.
///
/// Bytes are buffered until a newline arrives, so frames (and multi-byte
/// characters) split across reads are reassembled before parsing.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    buffer: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one read and returns the chunks completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);

        let Some(last_newline) = self.buffer.iter().rposition(|byte| *byte == b'\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|byte| *byte == b'\n')
            .filter_map(decode_line)
            .collect()
    }

    /// Decodes whatever is left once the upstream has ended.
    pub fn finish(self) -> Vec<StreamChunk> {
        decode_line(&self.buffer).into_iter().collect()
    }
}

fn decode_line(line: &[u8]) -> Option<StreamChunk> {
    let line = String::from_utf8_lossy(line);
    match parse_frame(&line) {
        Ok(Some(Frame::Delta(chunk))) => Some(chunk),
        Ok(Some(Frame::Done)) | Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, line = %line.trim(), "skipping malformed stream frame");
            None
        }
    }
}

/// Turns an upstream byte stream into a stream of decoded chunks.
///
/// A failed read ends the stream with [`AiError::StreamReadFailure`].
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamChunk, AiError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    async_stream::stream! {
        let mut decoder = ChunkDecoder::new();
        futures::pin_mut!(bytes);

        while let Some(read) = bytes.next().await {
            match read {
                Ok(data) => {
                    for chunk in decoder.feed(data.as_ref()) {
                        yield Ok(chunk);
                    }
                }
                Err(err) => {
                    yield Err(AiError::StreamReadFailure(err.to_string()));
                    return;
                }
            }
        }

        for chunk in decoder.finish() {
            yield Ok(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const HELLO: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        "data: [DONE]\n",
    );

    fn fragments(chunks: &[StreamChunk]) -> Vec<&str> {
        chunks.iter().filter_map(StreamChunk::fragment).collect()
    }

    #[test]
    fn decodes_content_frames_in_order() {
        let mut decoder = ChunkDecoder::new();
        let chunks = decoder.feed(HELLO.as_bytes());
        assert_eq!(fragments(&chunks), vec!["Hel", "lo"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn output_does_not_depend_on_read_boundaries() {
        let bytes = HELLO.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = ChunkDecoder::new();
            let mut chunks = decoder.feed(&bytes[..split]);
            chunks.extend(decoder.feed(&bytes[split..]));
            chunks.extend(decoder.finish());
            assert_eq!(fragments(&chunks), vec!["Hel", "lo"], "split at {split}");
        }

        let mut decoder = ChunkDecoder::new();
        let mut chunks = Vec::new();
        for byte in bytes {
            chunks.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(fragments(&chunks), vec!["Hel", "lo"]);
    }

    #[test]
    fn frame_split_mid_payload_yields_exactly_one_chunk() {
        let mut decoder = ChunkDecoder::new();
        assert!(
            decoder
                .feed(b"data: {\"choices\":[{\"delta\":{\"conte")
                .is_empty()
        );
        let chunks = decoder.feed(b"nt\":\"x\"}}]}\n");
        assert_eq!(chunks, vec![StreamChunk::text("x")]);
    }

    #[test]
    fn done_and_blank_lines_produce_nothing() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(b"\n\n   \n\r\ndata: [DONE]\n").is_empty());
        assert_eq!(parse_frame("  data: [DONE]  ").unwrap(), Some(Frame::Done));
        assert_eq!(parse_frame("   ").unwrap(), None);
    }

    #[test]
    fn lines_without_data_prefix_are_ignored() {
        let mut decoder = ChunkDecoder::new();
        let chunks = decoder.feed(b": keep-alive\nevent: message\nid: 7\n");
        assert!(chunks.is_empty());
    }

    #[test]
    fn malformed_frame_is_skipped_and_stream_continues() {
        let mut decoder = ChunkDecoder::new();
        let chunks = decoder.feed(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
                "data: {not json\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            )
            .as_bytes(),
        );
        assert_eq!(fragments(&chunks), vec!["a", "b"]);
        assert!(matches!(
            parse_frame("data: {not json"),
            Err(AiError::DecodeFrame(_))
        ));
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut decoder = ChunkDecoder::new();
        let chunks = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n");
        assert_eq!(fragments(&chunks), vec!["ok"]);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"周报\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('周').unwrap() + 1;

        let mut decoder = ChunkDecoder::new();
        let mut chunks = decoder.feed(&bytes[..split]);
        chunks.extend(decoder.feed(&bytes[split..]));
        assert_eq!(fragments(&chunks), vec!["周报"]);
    }

    #[test]
    fn trailing_line_without_newline_is_decoded_on_finish() {
        let mut decoder = ChunkDecoder::new();
        assert!(
            decoder
                .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
                .is_empty()
        );
        assert_eq!(decoder.finish(), vec![StreamChunk::text("tail")]);
    }

    #[test]
    fn role_and_finish_frames_carry_no_fragment() {
        let role = parse_frame(r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#)
            .unwrap();
        let Some(Frame::Delta(chunk)) = role else {
            panic!("expected delta frame");
        };
        assert_eq!(chunk.role, Some(Role::Assistant));
        assert_eq!(chunk.fragment(), None);
        assert!(!chunk.is_terminal());

        let finish = parse_frame(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        let Some(Frame::Delta(chunk)) = finish else {
            panic!("expected delta frame");
        };
        assert!(chunk.is_terminal());
        assert_eq!(chunk.fragment(), None);
    }

    #[test]
    fn frame_without_choices_is_empty() {
        assert_eq!(parse_frame(r#"data: {"choices":[]}"#).unwrap(), None);
    }

    #[tokio::test]
    async fn decode_stream_reassembles_reads() {
        let reads = vec![
            Ok::<_, Infallible>(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\ndata: {\"cho".to_vec()),
            Ok(b"ices\":[{\"delta\":{\"content\":\"lo\"}}]}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
        ];
        let chunks: Vec<_> = decode_stream(futures::stream::iter(reads))
            .map(|item| item.unwrap())
            .collect()
            .await;
        let text: String = chunks.iter().filter_map(StreamChunk::fragment).collect();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn decode_stream_ends_on_read_failure() {
        let reads = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n".to_vec()),
            Err("connection reset"),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n".to_vec()),
        ];
        let items: Vec<_> = decode_stream(futures::stream::iter(reads)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().fragment(), Some("a"));
        match &items[1] {
            Err(AiError::StreamReadFailure(message)) => assert_eq!(message, "connection reset"),
            other => panic!("expected read failure, got {other:?}"),
        }
    }
}
