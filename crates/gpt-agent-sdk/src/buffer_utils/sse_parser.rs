use futures::{Stream, StreamExt};

use super::buffering::CircularLineBuffer;
use crate::error::AgentError;
use crate::openai::RawEvent;
use crate::traits::RawEventStream;

enum SseLine {
    Event(RawEvent),
    Done,
    Skip,
}

fn classify_line(line: &str) -> SseLine {
    // Blank separators, `event:` names, `id:`/`retry:` fields and `:` comments
    // carry nothing the JSON payload does not already hold.
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        SseLine::Done
    } else if data.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Event(RawEvent::parse(data))
    }
}

fn utf8_failure(e: std::str::Utf8Error) -> RawEvent {
    RawEvent::Malformed {
        data: String::new(),
        reason: format!("invalid UTF-8 in event stream: {}", e),
    }
}

/// Turn a chunked SSE body into raw events.
///
/// Byte-level errors end the stream with `Err`; payload-level problems are
/// surfaced as `RawEvent::Malformed` so the decoder can report them.
pub fn parse_sse_stream<S, B, E>(bytes: S) -> RawEventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AgentError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(8192);
        let mut finished = false;

        'chunks: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.extend(chunk.as_ref());

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => match classify_line(&line) {
                                SseLine::Event(event) => yield Ok(event),
                                SseLine::Done => {
                                    finished = true;
                                    break 'chunks;
                                }
                                SseLine::Skip => {}
                            },
                            Err(e) => yield Ok(utf8_failure(e)),
                        }
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            match buffer.take_remainder() {
                Some(Ok(line)) => {
                    if let SseLine::Event(event) = classify_line(&line) {
                        yield Ok(event);
                    }
                }
                Some(Err(e)) => yield Ok(utf8_failure(e)),
                None => {}
            }
        }
    })
}
