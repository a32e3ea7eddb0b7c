//! Server-sent event framing of [`StreamingEvent`]s.
//!
//! Every event is one frame: `data: <json>\n\n`.

use crate::event::StreamingEvent;

/// Reassembles events from arbitrarily split byte chunks.
///
/// Frames are separated by a blank line. `\r\n` line endings are accepted,
/// comment lines (starting with `:`) and fields other than `data` are
/// ignored. Frames that aren't valid UTF-8 or whose data isn't a valid
/// event are skipped and logged.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamingEvent> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = vec![];
        while let Some(end) = find_boundary(&self.buf) {
            let frame = self.buf.drain(..end + 2).collect::<Vec<_>>();
            if let Some(event) = decode_frame(&frame[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the byte stream has ended.
    ///
    /// Returns the final event if the last frame wasn't followed by a
    /// blank line.
    pub fn finish(&mut self) -> Option<StreamingEvent> {
        let frame = std::mem::take(&mut self.buf);
        if frame.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        decode_frame(&frame)
    }
}

fn find_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn decode_frame(frame: &[u8]) -> Option<StreamingEvent> {
    let frame = match std::str::from_utf8(frame) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("skipping a frame with invalid UTF-8: {err}");
            return None;
        }
    };

    let mut data: Option<String> = None;
    for line in frame.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field != "data" {
            continue;
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }

    let data = data?;
    match serde_json::from_str(&data) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!("skipping a malformed frame ({err}): {data}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ToolCallStatus;

    fn encode_frame(
        event: &StreamingEvent,
    ) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(event)?;
        Ok(format!("data: {json}\n\n"))
    }

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(&StreamingEvent::ToolCall {
            name: "get_trending".to_owned(),
            status: ToolCallStatus::Completed,
        })
        .unwrap();
        assert_eq!(
            frame,
            "data: {\"type\":\"tool_call\",\"name\":\"get_trending\",\"status\":\"completed\"}\n\n"
        );
    }

    #[test]
    fn test_split_chunks() {
        let mut stream = String::new();
        stream.push_str(
            &encode_frame(&StreamingEvent::TextDelta {
                delta: "你好，世界".to_owned(),
            })
            .unwrap(),
        );
        stream.push_str(&encode_frame(&StreamingEvent::Done).unwrap());
        let bytes = stream.as_bytes();

        // Every split point, including ones inside a multi-byte character.
        for split in 0..bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut events = decoder.push(&bytes[..split]);
            events.extend(decoder.push(&bytes[split..]));
            assert_eq!(
                events,
                vec![
                    StreamingEvent::TextDelta {
                        delta: "你好，世界".to_owned()
                    },
                    StreamingEvent::Done
                ],
                "split at {split}"
            );
            assert_eq!(decoder.finish(), None);
        }
    }

    #[test]
    fn test_crlf_comments_and_malformed_frames() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(
            b": keep-alive\r\n\r\n\
              data: {\"type\":\"thinking\",\"summary\":\"Hmm\"}\r\n\r\n\
              data: {not json}\r\n\r\n\
              data: \xff\xfe\r\n\r\n\
              event: message\r\nid: 7\r\ndata: {\"type\":\"done\"}\r\n\r\n",
        );
        assert_eq!(
            events,
            vec![
                StreamingEvent::Thinking {
                    summary: "Hmm".to_owned()
                },
                StreamingEvent::Done
            ]
        );
    }

    #[test]
    fn test_finish_without_trailing_blank_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(decoder.finish(), Some(StreamingEvent::Done));
        assert_eq!(decoder.finish(), None);
    }
}
